//! Error types for campaign archive operations
//!
//! Lookup, ambiguity, and argument errors fail the triggering operation and are
//! returned to the caller. Failed SQL statements are not errors at this level:
//! they are recorded in the session (see [`crate::catalog::Session`]) and only
//! surface as [`CampaignError::StatementErrors`] when the session ends.

use thiserror::Error;

/// Result type alias for campaign operations
pub type Result<T> = std::result::Result<T, CampaignError>;

/// Coarse classification of a [`CampaignError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Ambiguous,
    InvalidArgument,
    Io,
    Storage,
}

fn format_ids(ids: &[i64]) -> String {
    let list: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
    format!("[{}]", list.join(", "))
}

#[derive(Error, Debug)]
pub enum CampaignError {
    #[error("Dataset not found: '{0}'")]
    DatasetNotFound(String),

    #[error("Directory ID not found: {0}")]
    DirectoryNotFound(i64),

    #[error("Archive ID {0} is not found in the archive list")]
    ArchiveNotFound(i64),

    #[error("Replica ID not found: {0}")]
    ReplicaNotFound(i64),

    #[error("Time series not found: '{0}'")]
    TimeSeriesNotFound(String),

    #[error("Campaign archive '{0}' does not exist. Create it first with the 'create' command.")]
    CatalogNotFound(String),

    #[error("Directory {name} with ID {dir_id} is not an archival storage directory with exactly one archive (found {archives}). Use --archiveid to select one.")]
    NotAnArchiveDirectory {
        dir_id: i64,
        name: String,
        archives: usize,
    },

    #[error("Archive ID {archive_id} belongs to directory ID {actual}, not to {expected}")]
    ArchiveDirectoryMismatch {
        archive_id: i64,
        actual: i64,
        expected: i64,
    },

    #[error("There are {} non-deleted, not-in-archive replicas for this dataset. Use --replica to identify which one is archived now. Replicas: {}", .0.len(), format_ids(.0))]
    AmbiguousReplica(Vec<i64>),

    #[error("There are {} archived replicas for this dataset. Use --replica to identify which one is archived now. Replicas: {}", .0.len(), format_ids(.0))]
    AmbiguousArchivedReplica(Vec<i64>),

    #[error("There are no replicas but {} deleted replicas for this {format} dataset. Use --replica to identify which deleted replica is archived. Deleted replicas: {}", .ids.len(), format_ids(.ids))]
    AmbiguousDeletedReplica { format: String, ids: Vec<i64> },

    #[error("There are no replicas for a {0} dataset. Cannot archive without access to the embedded metadata files of a replica")]
    NoEmbeddedMetadataSource(String),

    #[error("Replica {replica_id} belongs to dataset '{owner}', not to '{dataset}'")]
    ReplicaDatasetMismatch {
        replica_id: i64,
        owner: String,
        dataset: String,
    },

    #[error("Directory.Archive {dir_id}.{archive_id} is not a TAR archive")]
    NotATarArchive { dir_id: i64, archive_id: i64 },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Archival storage system '{0}' is not supported. It must be one of: Kronos, HPSS, FS, HTTPS, HTTP, FTP, S3")]
    UnsupportedStorageSystem(String),

    #[error("Campaign archive '{0}' already exists")]
    CatalogExists(String),

    #[error("{0} SQL statement(s) failed during this session; some writes may not have been applied")]
    StatementErrors(usize),

    #[error("Failed to write {table} row '{name}' to the catalog")]
    WriteFailed { table: &'static str, name: String },

    #[error("Catalog error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read TAR index: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Common(#[from] campaign_common::CommonError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CampaignError {
    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DatasetNotFound(_)
            | Self::DirectoryNotFound(_)
            | Self::ArchiveNotFound(_)
            | Self::ReplicaNotFound(_)
            | Self::TimeSeriesNotFound(_)
            | Self::CatalogNotFound(_) => ErrorKind::NotFound,
            Self::NotAnArchiveDirectory { .. }
            | Self::ArchiveDirectoryMismatch { .. }
            | Self::AmbiguousReplica(_)
            | Self::AmbiguousArchivedReplica(_)
            | Self::AmbiguousDeletedReplica { .. }
            | Self::NoEmbeddedMetadataSource(_)
            | Self::ReplicaDatasetMismatch { .. }
            | Self::NotATarArchive { .. } => ErrorKind::Ambiguous,
            Self::InvalidArgument(_)
            | Self::UnsupportedStorageSystem(_)
            | Self::CatalogExists(_) => ErrorKind::InvalidArgument,
            Self::Io(_) | Self::Csv(_) | Self::Common(_) | Self::Other(_) => ErrorKind::Io,
            Self::Sqlite(_) | Self::StatementErrors(_) | Self::WriteFailed { .. } => {
                ErrorKind::Storage
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_ambiguous_message_lists_ids() {
        let err = CampaignError::AmbiguousReplica(vec![3, 7]);
        let msg = err.to_string();
        assert!(msg.contains("There are 2 non-deleted"));
        assert!(msg.contains("[3, 7]"));
        assert_eq!(err.kind(), ErrorKind::Ambiguous);
    }

    #[test]
    fn test_deleted_replica_message() {
        let err = CampaignError::AmbiguousDeletedReplica {
            format: "TEXT".to_string(),
            ids: vec![1, 2, 9],
        };
        assert!(err.to_string().contains("3 deleted replicas for this TEXT dataset"));
        assert!(err.to_string().contains("[1, 2, 9]"));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            CampaignError::DatasetNotFound("heat".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            CampaignError::UnsupportedStorageSystem("tape".into()).kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(CampaignError::StatementErrors(2).kind(), ErrorKind::Storage);
        assert_eq!(
            CampaignError::WriteFailed {
                table: "timeseries",
                name: "heat".into()
            }
            .kind(),
            ErrorKind::Storage
        );
        assert_eq!(
            CampaignError::NoEmbeddedMetadataSource("ADIOS".into()).kind(),
            ErrorKind::Ambiguous
        );
    }
}
