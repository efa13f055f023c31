//! `upgrade` command

use crate::catalog::Catalog;
use crate::error::Result;
use crate::upgrade::{upgrade, UpgradeOutcome};
use colored::Colorize;

pub fn run(catalog: &mut Catalog) -> Result<()> {
    let outcome = upgrade(catalog)?;
    match outcome {
        UpgradeOutcome::Upgraded { .. } => println!("{}", outcome.to_string().green()),
        UpgradeOutcome::Current(_) => println!("{}", outcome),
        UpgradeOutcome::RolledBack { .. } | UpgradeOutcome::Unsupported(_) => {
            println!("{}", outcome.to_string().yellow())
        }
    }
    Ok(())
}
