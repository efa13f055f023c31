//! `info` command

use crate::catalog::Catalog;
use crate::error::Result;
use crate::info::{collect_info, format_info, InfoOptions};
use anyhow::Context;

/// Print the archive listing as text or JSON
pub fn run(catalog: &mut Catalog, options: InfoOptions, json: bool) -> Result<()> {
    let info = collect_info(catalog, options)?;
    if json {
        let text = serde_json::to_string_pretty(&info).context("Failed to serialize listing")?;
        println!("{}", text);
    } else {
        let text = format_info(&info, &options);
        if !text.is_empty() {
            println!("{}", text);
        }
    }
    Ok(())
}
