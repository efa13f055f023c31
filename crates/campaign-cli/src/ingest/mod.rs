//! Registering datasets, replicas and embedded files from source paths
//!
//! Every source becomes one dataset (upserted by name) and one replica keyed by
//! the session's host and root directory. What gets embedded depends on the
//! kind of source:
//!
//! - ADIOS datasets: the metadata side files of the dataset directory
//! - HDF5 files: a metadata-only copy produced by a [`MetadataStripper`]
//! - text files: the compressed file, on request
//! - images: the image itself or a thumbnail replica, on request
//!
//! Unreadable sources are skipped with a warning and do not fail the batch.

mod dataset;
pub mod embed;
pub mod identity;
mod images;
pub mod probe;
mod text;

pub use embed::{embed_file, link_file, Embedded};
pub use identity::{dataset_uuid, HostIdentity, RemoteSource};
pub use probe::{
    is_adios_dataset, is_hdf5_file, CommandStripper, ImageCrateProcessor, ImageProcessor,
    MetadataStripper, Thumbnail,
};

use crate::catalog::queries::NewReplica;
use crate::catalog::Catalog;
use crate::error::{CampaignError, ErrorKind, Result};
use campaign_common::types::system_time_ns;
use campaign_common::FileFormat;
use std::path::Path;
use tracing::{info, warn};

/// Kind of source being ingested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestKind {
    /// ADIOS or HDF5 datasets
    Dataset,
    Text {
        store: bool,
    },
    Image {
        store: bool,
        /// Maximum thumbnail size; ignored when `store` is set
        thumbnail: Option<(u32, u32)>,
    },
}

/// One ingest call: a kind, its sources, and an optional dataset name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestRequest {
    kind: IngestKind,
    files: Vec<String>,
    name: Option<String>,
}

impl IngestRequest {
    pub fn new(kind: IngestKind, files: Vec<String>, name: Option<String>) -> Result<Self> {
        if files.is_empty() {
            return Err(CampaignError::invalid_argument("No source files given"));
        }
        if name.is_some() && files.len() > 1 {
            return Err(CampaignError::invalid_argument(format!(
                "A dataset name can only be given for a single source, got {} sources",
                files.len()
            )));
        }
        if matches!(kind, IngestKind::Image { .. }) && files.len() != 1 {
            return Err(CampaignError::invalid_argument(
                "Images are ingested one file at a time",
            ));
        }
        if let IngestKind::Image {
            thumbnail: Some((w, h)),
            ..
        } = kind
        {
            if w == 0 || h == 0 {
                return Err(CampaignError::invalid_argument(
                    "Thumbnail size must be positive",
                ));
            }
        }
        Ok(Self { kind, files, name })
    }

    pub fn kind(&self) -> IngestKind {
        self.kind
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Dataset name for a source
    fn dataset_name<'a>(&'a self, entry: &'a str) -> &'a str {
        self.name.as_deref().unwrap_or(entry)
    }
}

/// Rows shared by every source of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostContext {
    pub host_id: i64,
    pub dir_id: i64,
    pub key_id: i64,
    pub long_host: String,
    pub root: String,
    pub remote: Option<RemoteSource>,
}

/// Register the session's host, root directory and key
pub fn register_host(catalog: &mut Catalog, identity: &HostIdentity) -> Result<HostContext> {
    let root = identity.root_dir()?;
    let host_id = catalog.add_host(&identity.short_name, &identity.long_name, "");
    let key_id = match catalog.session().key() {
        Some(key) => {
            let id = key.id().to_string();
            catalog.add_key(Some(&id))
        }
        None => 0,
    };
    let dir_id = catalog.add_directory(host_id, &root);
    catalog.commit();
    Ok(HostContext {
        host_id,
        dir_id,
        key_id,
        long_host: identity.long_name.clone(),
        root,
        remote: identity.remote.clone(),
    })
}

/// External producers used during ingestion
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub stripper: &'a dyn MetadataStripper,
    pub images: &'a dyn ImageProcessor,
}

/// Result of an ingest call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub datasets: Vec<i64>,
    pub replicas: Vec<i64>,
    pub files: usize,
    /// Sources that could not be read or classified
    pub skipped: Vec<String>,
}

/// Rows written for one source
#[derive(Debug, Default)]
struct EntryOutcome {
    dataset_id: i64,
    replicas: Vec<i64>,
    files: usize,
}

/// Ingest every source of `request` and commit
pub fn ingest(
    catalog: &mut Catalog,
    host: &HostContext,
    request: &IngestRequest,
    tools: Collaborators<'_>,
) -> Result<IngestReport> {
    if host.remote.is_some() && request.kind != IngestKind::Dataset {
        return Err(CampaignError::invalid_argument(
            "Only datasets can be registered for a remote host",
        ));
    }

    let mut report = IngestReport::default();
    for entry in &request.files {
        info!(entry = %entry, "Process entry");
        let name = request.dataset_name(entry);
        let outcome = match request.kind {
            IngestKind::Dataset => dataset::ingest_dataset(catalog, host, entry, name, tools),
            IngestKind::Text { store } => text::ingest_text(catalog, host, entry, name, store),
            IngestKind::Image { store, thumbnail } => {
                images::ingest_image(catalog, host, entry, name, store, thumbnail, tools)
            }
        };
        match outcome {
            Ok(Some(outcome)) => {
                report.datasets.push(outcome.dataset_id);
                report.replicas.extend(outcome.replicas);
                report.files += outcome.files;
            }
            Ok(None) => report.skipped.push(entry.clone()),
            Err(err) if err.kind() == ErrorKind::Io => {
                warn!(entry = %entry, error = %err, "Cannot read source, skipping");
                report.skipped.push(entry.clone());
            }
            Err(err) => return Err(err),
        }
    }
    catalog.commit();
    Ok(report)
}

/// Source modification time and size
fn stat(entry: &str) -> Result<(i64, i64)> {
    let metadata = std::fs::metadata(entry)?;
    let mtime = system_time_ns(metadata.modified()?);
    Ok((mtime, metadata.len() as i64))
}

/// Upsert dataset and replica rows for a source
fn register_source(
    catalog: &mut Catalog,
    host: &HostContext,
    entry: &str,
    name: &str,
    format: FileFormat,
    modtime: i64,
    size: i64,
) -> (i64, i64) {
    let uuid = dataset_uuid(&host.long_host, &host.root, entry);
    let dataset_id = catalog.upsert_dataset(name, &uuid, format, modtime);
    let replica_id = catalog.upsert_replica(&NewReplica {
        dataset_id,
        host_id: host.host_id,
        dir_id: host.dir_id,
        archive_id: 0,
        name: entry.to_string(),
        modtime,
        key_id: host.key_id,
        size,
    });
    info!(dataset = %name, format = %format, dataset_id, replica_id, "Registered replica");
    (dataset_id, replica_id)
}

fn file_name(entry: &str) -> String {
    Path::new(entry)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| entry.to_string())
}
