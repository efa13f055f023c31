//! `add-archival-storage` and `archived-replica` commands

use crate::archival::{add_archival_storage, promote, ArchivalStorageRequest, PromoteRequest};
use crate::catalog::Catalog;
use crate::error::Result;
use crate::progress::create_spinner;
use colored::Colorize;

pub fn add_storage(catalog: &mut Catalog, request: &ArchivalStorageRequest) -> Result<()> {
    let spinner = request
        .tar_index
        .as_ref()
        .map(|index| create_spinner(&format!("Reading TAR index {}", index.display())));
    let storage = add_archival_storage(catalog, request);
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let storage = storage?;

    println!(
        "{} {} {}:{} as directory {} archive {}.{}",
        "Added".green(),
        request.system,
        request.host,
        request.directory,
        storage.dir_id,
        storage.dir_id,
        storage.archive_id
    );
    if let Some(index) = &storage.index {
        println!(
            "  TAR index: {} row(s), {} replica(s) archived, {} entries, {} skipped",
            index.rows, index.promoted, index.entries, index.skipped
        );
    }
    Ok(())
}

pub fn archived_replica(catalog: &mut Catalog, request: &PromoteRequest) -> Result<()> {
    let replica_id = promote(catalog, request)?;
    println!(
        "{} dataset {} as replica {}",
        "Archived".green(),
        request.dataset(),
        replica_id
    );
    Ok(())
}
