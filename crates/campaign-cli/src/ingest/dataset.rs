//! ADIOS and HDF5 datasets

use super::embed::embed_file;
use super::probe::{is_adios_dataset, is_hdf5_file};
use super::{file_name, register_source, stat, Collaborators, EntryOutcome, HostContext};
use crate::catalog::Catalog;
use crate::error::Result;
use campaign_common::compression::{compress_bytes, compress_file};
use campaign_common::types::system_time_ns;
use campaign_common::FileFormat;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Side files embedded for an ADIOS dataset
const ADIOS_METADATA_PATTERN: &str = "*md.*";
const ADIOS_PROFILE: &str = "profiling.json";

pub(super) fn ingest_dataset(
    catalog: &mut Catalog,
    host: &HostContext,
    entry: &str,
    name: &str,
    tools: Collaborators<'_>,
) -> Result<Option<EntryOutcome>> {
    if let Some(remote) = &host.remote {
        let (dataset_id, replica_id) =
            register_source(catalog, host, entry, name, FileFormat::Adios, remote.modtime, 0);
        return Ok(Some(EntryOutcome {
            dataset_id,
            replicas: vec![replica_id],
            files: 0,
        }));
    }

    let path = Path::new(entry);
    if is_adios_dataset(path) {
        ingest_adios(catalog, host, entry, name).map(Some)
    } else if is_hdf5_file(path) {
        ingest_hdf5(catalog, host, entry, name, tools).map(Some)
    } else {
        warn!(entry = %entry, "Data is neither an ADIOS nor an HDF5 dataset, skipping");
        Ok(None)
    }
}

fn ingest_adios(
    catalog: &mut Catalog,
    host: &HostContext,
    entry: &str,
    name: &str,
) -> Result<EntryOutcome> {
    let (mtime, _) = stat(entry)?;
    let size = folder_size(Path::new(entry));
    let side_files = metadata_side_files(Path::new(entry))?;

    let (dataset_id, replica_id) =
        register_source(catalog, host, entry, name, FileFormat::Adios, mtime, size);

    let mut files = 0;
    for path in side_files {
        let recorded = file_name(&path.to_string_lossy());
        let payload = match compress_file(&path) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(file = %path.display(), error = %err, "Cannot read metadata file, skipping");
                continue;
            }
        };
        let modtime = std::fs::metadata(&path)
            .and_then(|m| m.modified())
            .map(system_time_ns)
            .unwrap_or(mtime);
        embed_file(catalog, replica_id, &recorded, modtime, payload)?;
        files += 1;
    }
    debug!(entry = %entry, files, size, "Embedded ADIOS metadata");

    Ok(EntryOutcome {
        dataset_id,
        replicas: vec![replica_id],
        files,
    })
}

fn ingest_hdf5(
    catalog: &mut Catalog,
    host: &HostContext,
    entry: &str,
    name: &str,
    tools: Collaborators<'_>,
) -> Result<EntryOutcome> {
    let (mtime, size) = stat(entry)?;
    let skeleton = tools.stripper.strip(Path::new(entry))?;
    let payload = compress_bytes(&skeleton)?;

    let (dataset_id, replica_id) =
        register_source(catalog, host, entry, name, FileFormat::Hdf5, mtime, size);
    embed_file(catalog, replica_id, &file_name(entry), mtime, payload)?;

    Ok(EntryOutcome {
        dataset_id,
        replicas: vec![replica_id],
        files: 1,
    })
}

/// Metadata files directly inside an ADIOS dataset directory, sorted
fn metadata_side_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!(
        "{}/{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        ADIOS_METADATA_PATTERN
    );
    let mut files: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|e| anyhow::anyhow!("Bad metadata pattern {}: {}", pattern, e))?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .collect();
    files.sort();

    let profile = dir.join(ADIOS_PROFILE);
    if profile.is_file() {
        files.push(profile);
    }
    Ok(files)
}

/// Total size of all files below `dir`
fn folder_size(dir: &Path) -> i64 {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|metadata| metadata.len() as i64)
        .sum()
}
