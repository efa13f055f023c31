//! `time-series` command

use crate::catalog::Catalog;
use crate::error::Result;
use crate::lifecycle::{add_time_series, remove_time_series};
use colored::Colorize;

pub fn run(
    catalog: &mut Catalog,
    name: &str,
    datasets: &[String],
    replace: bool,
    remove: bool,
) -> Result<()> {
    if remove {
        remove_time_series(catalog, name)?;
        println!("{} time series {}", "Removed".red(), name);
        return Ok(());
    }
    let report = add_time_series(catalog, name, datasets, replace)?;
    println!(
        "{} {} dataset(s) to time series {}",
        "Added".green(),
        report.added.len(),
        name
    );
    for missing in &report.missing {
        println!("  {} {} (not in the archive)", "skipped".yellow(), missing);
    }
    Ok(())
}
