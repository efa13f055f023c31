//! Registering archival storage locations

use super::taridx::{ingest_tar_index, TarIndexReport};
use crate::catalog::Catalog;
use crate::error::{CampaignError, Result};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{error, info, warn};

/// Archival storage systems a catalog can refer to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageSystem {
    Kronos,
    Hpss,
    Fs,
    Https,
    Http,
    Ftp,
    S3,
}

impl StorageSystem {
    /// Protocol recorded on the host, empty for non-network systems
    pub fn protocol(self) -> &'static str {
        match self {
            Self::Https => "https",
            Self::Http => "http",
            Self::Ftp => "ftp",
            Self::S3 => "s3",
            Self::Kronos | Self::Hpss | Self::Fs => "",
        }
    }
}

impl FromStr for StorageSystem {
    type Err = CampaignError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "kronos" => Ok(Self::Kronos),
            "hpss" => Ok(Self::Hpss),
            "fs" => Ok(Self::Fs),
            "https" => Ok(Self::Https),
            "http" => Ok(Self::Http),
            "ftp" => Ok(Self::Ftp),
            "s3" => Ok(Self::S3),
            _ => Err(CampaignError::UnsupportedStorageSystem(s.to_string())),
        }
    }
}

impl fmt::Display for StorageSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Kronos => "Kronos",
            Self::Hpss => "HPSS",
            Self::Fs => "FS",
            Self::Https => "HTTPS",
            Self::Http => "HTTP",
            Self::Ftp => "FTP",
            Self::S3 => "S3",
        };
        write!(f, "{}", name)
    }
}

/// Parameters of `add-archival-storage`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivalStorageRequest {
    /// System name as given; stored verbatim in the archive row
    pub system_name: String,
    pub system: StorageSystem,
    pub host: String,
    pub long_host: String,
    pub directory: String,
    pub tar_name: Option<String>,
    pub tar_index: Option<PathBuf>,
    pub notes: Option<PathBuf>,
}

impl ArchivalStorageRequest {
    pub fn new(system: &str, host: &str, directory: &str) -> Result<Self> {
        let parsed = system.parse::<StorageSystem>()?;
        if host.is_empty() || directory.is_empty() {
            return Err(CampaignError::invalid_argument(
                "Archival storage needs a host and a directory",
            ));
        }
        Ok(Self {
            system_name: system.to_string(),
            system: parsed,
            host: host.to_string(),
            long_host: host.to_string(),
            directory: directory.to_string(),
            tar_name: None,
            tar_index: None,
            notes: None,
        })
    }

    pub fn with_long_host(mut self, long_host: Option<String>) -> Self {
        if let Some(name) = long_host.filter(|n| !n.is_empty()) {
            self.long_host = name;
        }
        self
    }

    pub fn with_tar(mut self, tar_name: Option<String>, tar_index: Option<PathBuf>) -> Self {
        self.tar_name = tar_name.filter(|n| !n.is_empty());
        self.tar_index = tar_index;
        self
    }

    pub fn with_notes(mut self, notes: Option<PathBuf>) -> Self {
        self.notes = notes;
        self
    }
}

/// Rows behind a registered archival storage location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivalStorage {
    pub host_id: i64,
    pub dir_id: i64,
    pub archive_id: i64,
    pub index: Option<TarIndexReport>,
}

/// Register host, directory and archive rows, then ingest the TAR index if given
pub fn add_archival_storage(
    catalog: &mut Catalog,
    request: &ArchivalStorageRequest,
) -> Result<ArchivalStorage> {
    let tar_name = request.tar_name.as_deref().unwrap_or("");
    info!(
        host = %request.host,
        directory = %request.directory,
        system = %request.system,
        tar = tar_name,
        "Add archival storage"
    );

    let host_id = catalog.add_host(&request.host, &request.long_host, request.system.protocol());
    let dir_id = catalog.add_directory(host_id, &request.directory);

    let notes = request.notes.as_ref().and_then(|path| match std::fs::read(path) {
        Ok(bytes) => Some(bytes),
        Err(err) => {
            warn!(notes = %path.display(), error = %err, "Failed to read notes");
            None
        }
    });

    let archive_id = catalog.add_archive(dir_id, tar_name, &request.system_name, notes.as_deref());
    catalog.commit();

    let mut storage = ArchivalStorage {
        host_id,
        dir_id,
        archive_id,
        index: None,
    };
    if archive_id == 0 {
        error!(dir_id, tar = tar_name, "Could not insert archive row");
    } else if let Some(index) = &request.tar_index {
        storage.index = Some(ingest_tar_index(catalog, archive_id, index)?);
    }
    Ok(storage)
}
