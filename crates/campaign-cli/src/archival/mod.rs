//! Archival storage and promotion of replicas into it
//!
//! Promotion records that a dataset's content now also lives in an archive:
//! a new replica is created under the archive, carrying over the source
//! replica's attributes and embedded files. Choosing the source replica is
//! the delicate part; see [`select_source_replica`].

pub mod storage;
pub mod taridx;

pub use storage::{add_archival_storage, ArchivalStorage, ArchivalStorageRequest, StorageSystem};
pub use taridx::{ingest_tar_index, ingest_tar_index_from, TarIndexReport};

use crate::catalog::queries::NewReplica;
use crate::catalog::{ArchiveRow, Catalog, ReplicaRow};
use crate::error::{CampaignError, Result};
use crate::lifecycle::delete_replica;
use campaign_common::FileFormat;
use rusqlite::params;
use tracing::{debug, info};

/// Parameters of one promotion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromoteRequest {
    dataset: String,
    dir_id: i64,
    archive_id: Option<i64>,
    replica_id: Option<i64>,
    new_path: Option<String>,
    move_files: bool,
}

impl PromoteRequest {
    pub fn new(
        dataset: impl Into<String>,
        dir_id: i64,
        archive_id: Option<i64>,
        replica_id: Option<i64>,
        new_path: Option<String>,
        move_files: bool,
    ) -> Result<Self> {
        let dataset = dataset.into();
        if dataset.is_empty() {
            return Err(CampaignError::invalid_argument("Dataset name must not be empty"));
        }
        if dir_id <= 0 {
            return Err(CampaignError::invalid_argument(format!(
                "Invalid directory ID {}",
                dir_id
            )));
        }
        for (what, id) in [("archive", archive_id), ("replica", replica_id)] {
            if let Some(id) = id.filter(|id| *id <= 0) {
                return Err(CampaignError::invalid_argument(format!(
                    "Invalid {} ID {}",
                    what, id
                )));
            }
        }
        Ok(Self {
            dataset,
            dir_id,
            archive_id,
            replica_id,
            new_path: new_path.filter(|p| !p.is_empty()),
            move_files,
        })
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }
}

/// Pick the replica to promote when none was named.
///
/// Replicas fall into three buckets: live and not archived, live and
/// archived, deleted. A single live non-archived replica wins; otherwise a
/// single live archived one. Deleted replicas are only considered when no
/// live replica exists and the format does not depend on embedded metadata.
pub fn select_source_replica(format_tag: &str, replicas: &[ReplicaRow]) -> Result<i64> {
    let mut live = Vec::new();
    let mut archived = Vec::new();
    let mut deleted = Vec::new();
    for replica in replicas {
        if replica.is_deleted() {
            deleted.push(replica.id);
        } else if replica.is_archived() {
            archived.push(replica.id);
        } else {
            live.push(replica.id);
        }
    }

    if live.len() > 1 {
        return Err(CampaignError::AmbiguousReplica(live));
    }
    if live.is_empty() && archived.is_empty() {
        let needs_metadata = FileFormat::from_tag(format_tag)
            .map(FileFormat::requires_embedded_metadata)
            .unwrap_or(false);
        if needs_metadata {
            return Err(CampaignError::NoEmbeddedMetadataSource(format_tag.to_string()));
        }
        return match deleted.as_slice() {
            [only] => Ok(*only),
            _ => Err(CampaignError::AmbiguousDeletedReplica {
                format: format_tag.to_string(),
                ids: deleted,
            }),
        };
    }
    if let [only] = live.as_slice() {
        return Ok(*only);
    }
    match archived.as_slice() {
        [only] => Ok(*only),
        _ => Err(CampaignError::AmbiguousArchivedReplica(archived)),
    }
}

fn resolve_archive(catalog: &mut Catalog, request: &PromoteRequest, dir_name: &str) -> Result<ArchiveRow> {
    match request.archive_id {
        None => {
            let mut archives = catalog.archives_in_directory(request.dir_id);
            if archives.len() != 1 {
                return Err(CampaignError::NotAnArchiveDirectory {
                    dir_id: request.dir_id,
                    name: dir_name.to_string(),
                    archives: archives.len(),
                });
            }
            Ok(archives.remove(0))
        }
        Some(id) => {
            let archive = catalog
                .archive(id)
                .ok_or(CampaignError::ArchiveNotFound(id))?;
            if archive.dir_id != request.dir_id {
                return Err(CampaignError::ArchiveDirectoryMismatch {
                    archive_id: id,
                    actual: archive.dir_id,
                    expected: request.dir_id,
                });
            }
            Ok(archive)
        }
    }
}

/// Promote a replica of a dataset into an archive and commit.
///
/// Returns the new replica id, or 0 when its row could not be written.
pub fn promote(catalog: &mut Catalog, request: &PromoteRequest) -> Result<i64> {
    let dataset = catalog
        .dataset_by_name(&request.dataset)
        .ok_or_else(|| CampaignError::DatasetNotFound(request.dataset.clone()))?;
    let directory = catalog
        .directory(request.dir_id)
        .ok_or(CampaignError::DirectoryNotFound(request.dir_id))?;
    let archive = resolve_archive(catalog, request, &directory.name)?;

    let source_id = match request.replica_id {
        Some(id) => id,
        None => {
            let replicas = catalog.replicas_of_dataset(dataset.id);
            select_source_replica(&dataset.file_format, &replicas)?
        }
    };
    let source = catalog
        .replica(source_id)
        .ok_or(CampaignError::ReplicaNotFound(source_id))?;
    if source.dataset_id != dataset.id {
        let owner = catalog
            .dataset_by_id(source.dataset_id)
            .map(|d| d.name)
            .unwrap_or_default();
        return Err(CampaignError::ReplicaDatasetMismatch {
            replica_id: source.id,
            owner,
            dataset: dataset.name,
        });
    }

    info!(
        dataset = %dataset.name,
        replica_id = source.id,
        dir_id = directory.id,
        archive_id = archive.id,
        "Archive replica"
    );
    let replica_id = catalog.upsert_replica(&NewReplica {
        dataset_id: dataset.id,
        host_id: directory.host_id,
        dir_id: directory.id,
        archive_id: archive.id,
        name: request.new_path.clone().unwrap_or_else(|| source.name.clone()),
        modtime: source.modtime,
        key_id: source.key_id,
        size: source.size,
    });
    if replica_id == 0 {
        catalog.commit();
        return Ok(0);
    }

    if let Some((x, y)) = catalog.resolution(source.id) {
        catalog.upsert_resolution(replica_id, x, y);
    }

    if replica_id != source.id {
        if request.move_files {
            catalog.execute(
                "UPDATE OR IGNORE repfiles SET replicaid = ?1 WHERE replicaid = ?2",
                params![replica_id, source.id],
            );
            delete_replica(catalog, source.id, true)?;
        } else {
            let copied = catalog.execute(
                "INSERT INTO repfiles (replicaid, fileid) \
                 SELECT ?1, fileid FROM repfiles WHERE replicaid = ?2 \
                 ON CONFLICT (replicaid, fileid) DO NOTHING",
                params![replica_id, source.id],
            );
            debug!(replica_id, files = copied.unwrap_or(0), "Copied file links to archived replica");
        }
    }

    catalog.commit();
    Ok(replica_id)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn replica(id: i64, archive_id: i64, deltime: i64) -> ReplicaRow {
        ReplicaRow {
            id,
            dataset_id: 1,
            host_id: 1,
            dir_id: 1,
            archive_id,
            name: format!("r{}", id),
            modtime: 1,
            deltime,
            key_id: 0,
            size: 10,
        }
    }

    #[test]
    fn test_two_live_replicas_are_ambiguous() {
        let err = select_source_replica("TEXT", &[replica(1, 0, 0), replica(2, 0, 0)]).unwrap_err();
        assert!(matches!(&err, CampaignError::AmbiguousReplica(ids) if ids == &vec![1, 2]));
        assert_eq!(err.kind(), ErrorKind::Ambiguous);
    }

    #[test]
    fn test_live_preferred_over_archived() {
        let id = select_source_replica("ADIOS", &[replica(4, 2, 0), replica(5, 0, 0)]).unwrap();
        assert_eq!(id, 5);
    }

    #[test]
    fn test_single_archived_replica() {
        assert_eq!(
            select_source_replica("ADIOS", &[replica(4, 2, 0), replica(6, 0, 9)]).unwrap(),
            4
        );
        let err = select_source_replica("ADIOS", &[replica(4, 2, 0), replica(7, 3, 0)]).unwrap_err();
        assert!(matches!(err, CampaignError::AmbiguousArchivedReplica(ids) if ids == vec![4, 7]));
    }

    #[test]
    fn test_deleted_replicas() {
        assert_eq!(select_source_replica("IMAGE", &[replica(3, 0, 5)]).unwrap(), 3);
        let err = select_source_replica("TEXT", &[replica(3, 0, 5), replica(8, 1, 5)]).unwrap_err();
        assert!(matches!(err, CampaignError::AmbiguousDeletedReplica { ids, .. } if ids == vec![3, 8]));
        let err = select_source_replica("TEXT", &[]).unwrap_err();
        assert!(matches!(err, CampaignError::AmbiguousDeletedReplica { ids, .. } if ids.is_empty()));
    }

    #[test]
    fn test_metadata_formats_need_live_replica() {
        for tag in ["ADIOS", "HDF5"] {
            let err = select_source_replica(tag, &[replica(3, 0, 5)]).unwrap_err();
            assert!(matches!(err, CampaignError::NoEmbeddedMetadataSource(f) if f == tag));
        }
    }

    #[test]
    fn test_request_validation() {
        assert!(PromoteRequest::new("heat", 1, None, None, None, false).is_ok());
        assert!(PromoteRequest::new("", 1, None, None, None, false).is_err());
        assert!(PromoteRequest::new("heat", 0, None, None, None, false).is_err());
        assert!(PromoteRequest::new("heat", 1, Some(0), None, None, false).is_err());
        assert!(PromoteRequest::new("heat", 1, None, Some(-1), None, false).is_err());
        let request =
            PromoteRequest::new("heat", 1, None, None, Some(String::new()), false).unwrap();
        assert_eq!(request.new_path, None);
    }
}
