//! Soft deletion of datasets and replicas

use crate::catalog::Catalog;
use crate::error::{CampaignError, Result};
use rusqlite::params;
use tracing::{debug, info};

/// How a dataset is identified for deletion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetSelector {
    Name(String),
    Uuid(String),
}

impl std::fmt::Display for DatasetSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{}", name),
            Self::Uuid(uuid) => write!(f, "uuid {}", uuid),
        }
    }
}

/// Soft-delete a dataset and all of its live replicas.
///
/// The replicas keep their embedded files. Returns the dataset id.
pub fn delete_dataset(catalog: &mut Catalog, selector: &DatasetSelector) -> Result<i64> {
    let now = catalog.now();
    let (sql, key) = match selector {
        DatasetSelector::Name(name) => (
            "UPDATE dataset SET deltime = ?1 WHERE name = ?2 RETURNING rowid",
            name,
        ),
        DatasetSelector::Uuid(uuid) => (
            "UPDATE dataset SET deltime = ?1 WHERE uuid = ?2 RETURNING rowid",
            uuid,
        ),
    };
    info!(dataset = %selector, "Delete dataset");
    let dataset_id: i64 = catalog
        .write_one(sql, params![now, key], |row| row.get(0))
        .ok_or_else(|| CampaignError::DatasetNotFound(selector.to_string()))?;

    let live: Vec<i64> = catalog.query_all(
        "SELECT rowid FROM replica WHERE datasetid = ?1 AND deltime = 0 ORDER BY rowid",
        [dataset_id],
        |row| row.get(0),
    );
    for replica_id in live {
        delete_replica(catalog, replica_id, false)?;
    }
    Ok(dataset_id)
}

/// Soft-delete a replica.
///
/// With `cascade`, the replica's file links are dropped, files no longer
/// linked anywhere are removed, and the dataset is soft-deleted when it has
/// no live replica left.
pub fn delete_replica(catalog: &mut Catalog, replica_id: i64, cascade: bool) -> Result<()> {
    let now = catalog.now();
    let dataset_id: Option<i64> = catalog.query_one(
        "SELECT datasetid FROM replica WHERE rowid = ?1",
        [replica_id],
        |row| row.get(0),
    );
    let dataset_id = dataset_id.ok_or(CampaignError::ReplicaNotFound(replica_id))?;

    info!(replica_id, cascade, "Delete replica");
    catalog.execute(
        "UPDATE replica SET deltime = ?1 WHERE rowid = ?2",
        params![now, replica_id],
    );
    if cascade {
        catalog.execute("DELETE FROM repfiles WHERE replicaid = ?1", [replica_id]);
        let removed = catalog.execute(
            "DELETE FROM file WHERE fileid NOT IN (SELECT fileid FROM repfiles)",
            [],
        );
        debug!(replica_id, files = removed.unwrap_or(0), "Removed unreferenced files");
        delete_dataset_if_empty(catalog, dataset_id);
    }
    Ok(())
}

/// Soft-delete a dataset without live replicas; returns whether it was deleted
pub fn delete_dataset_if_empty(catalog: &mut Catalog, dataset_id: i64) -> bool {
    let live: Option<i64> = catalog.query_one(
        "SELECT count(*) FROM replica WHERE datasetid = ?1 AND deltime = 0",
        [dataset_id],
        |row| row.get(0),
    );
    if live != Some(0) {
        return false;
    }
    info!(dataset_id, "Dataset without replicas found, deleting");
    let now = catalog.now();
    catalog.execute(
        "UPDATE dataset SET deltime = ?1 WHERE rowid = ?2",
        params![now, dataset_id],
    );
    true
}

/// Remove the catalog file itself
pub fn delete_catalog_file(path: &std::path::Path) -> Result<()> {
    if !path.exists() {
        return Err(CampaignError::CatalogNotFound(path.display().to_string()));
    }
    info!(catalog = %path.display(), "Delete campaign archive");
    std::fs::remove_file(path)?;
    Ok(())
}
