//! Named, ordered groups of datasets

use crate::catalog::Catalog;
use crate::error::{CampaignError, Result};
use rusqlite::params;
use tracing::{info, warn};

/// Outcome of [`add_time_series`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeSeriesReport {
    pub tsid: i64,
    /// `(dataset id, order)` for every dataset added
    pub added: Vec<(i64, i64)>,
    /// Dataset names not found in the catalog
    pub missing: Vec<String>,
}

/// Create or extend the time series `name` with `datasets`, in order.
///
/// Datasets are appended after the current last member unless `replace` is
/// set, in which case the existing membership is cleared first.
pub fn add_time_series(
    catalog: &mut Catalog,
    name: &str,
    datasets: &[String],
    replace: bool,
) -> Result<TimeSeriesReport> {
    let tsid: i64 = catalog
        .write_one(
            "INSERT INTO timeseries (name) VALUES (?1) \
             ON CONFLICT (name) DO UPDATE SET name = ?1 RETURNING rowid",
            [name],
            |row| row.get(0),
        )
        .ok_or_else(|| CampaignError::WriteFailed {
            table: "timeseries",
            name: name.to_string(),
        })?;
    info!(time_series = %name, tsid, replace, "Add to time series");

    let mut order = 0;
    if replace {
        catalog.execute(
            "UPDATE dataset SET tsid = 0, tsorder = 0 WHERE tsid = ?1",
            [tsid],
        );
    } else {
        let last: Option<Option<i64>> = catalog.query_one(
            "SELECT max(tsorder) FROM dataset WHERE tsid = ?1",
            [tsid],
            |row| row.get(0),
        );
        if let Some(Some(last)) = last {
            order = last + 1;
        }
    }

    let mut report = TimeSeriesReport {
        tsid,
        ..TimeSeriesReport::default()
    };
    for dataset in datasets {
        let updated: Option<i64> = catalog.write_one(
            "UPDATE dataset SET tsid = ?1, tsorder = ?2 WHERE name = ?3 RETURNING rowid",
            params![tsid, order, dataset],
            |row| row.get(0),
        );
        match updated {
            Some(dataset_id) => {
                info!(dataset = %dataset, dataset_id, tsorder = order, "Added to time series");
                report.added.push((dataset_id, order));
                order += 1;
            }
            None => {
                warn!(dataset = %dataset, "Dataset is not in the catalog, skipping");
                report.missing.push(dataset.clone());
            }
        }
    }
    catalog.commit();
    Ok(report)
}

/// Remove a time series; its datasets stay in the catalog
pub fn remove_time_series(catalog: &mut Catalog, name: &str) -> Result<i64> {
    let tsid: Option<i64> = catalog.query_one(
        "SELECT tsid FROM timeseries WHERE name = ?1",
        [name],
        |row| row.get(0),
    );
    let tsid = tsid.ok_or_else(|| CampaignError::TimeSeriesNotFound(name.to_string()))?;
    info!(time_series = %name, tsid, "Remove time series but leave datasets alone");
    catalog.execute("DELETE FROM timeseries WHERE tsid = ?1", [tsid]);
    catalog.execute(
        "UPDATE dataset SET tsid = 0, tsorder = 0 WHERE tsid = ?1",
        [tsid],
    );
    catalog.commit();
    Ok(tsid)
}
