//! `delete` command

use crate::catalog::Catalog;
use crate::error::{CampaignError, Result};
use crate::lifecycle::{delete_dataset, delete_replica, DatasetSelector};
use colored::Colorize;

/// Delete datasets by name or identifier and replicas by id; each item is
/// committed on its own
pub fn run(
    catalog: &mut Catalog,
    names: &[String],
    uuids: &[String],
    replicas: &[i64],
) -> Result<()> {
    if names.is_empty() && uuids.is_empty() && replicas.is_empty() {
        return Err(CampaignError::invalid_argument(
            "Nothing to delete: give --name, --uuid, --replica or --campaign",
        ));
    }

    let selectors = names
        .iter()
        .map(|n| DatasetSelector::Name(n.clone()))
        .chain(uuids.iter().map(|u| DatasetSelector::Uuid(u.clone())));
    for selector in selectors {
        let dataset_id = delete_dataset(catalog, &selector)?;
        catalog.commit();
        println!("{} dataset {} (id {})", "Deleted".red(), selector, dataset_id);
    }
    for &replica_id in replicas {
        delete_replica(catalog, replica_id, true)?;
        catalog.commit();
        println!("{} replica {}", "Deleted".red(), replica_id);
    }
    Ok(())
}
