//! Configuration for the campaign manager
//!
//! Settings come from the environment; command-line flags override them.

use crate::error::{CampaignError, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// ============================================================================
// Configuration Constants
// ============================================================================

/// File extension every catalog path carries
pub const CATALOG_EXTENSION: &str = "aca";

pub const ENV_CAMPAIGN_STORE: &str = "HPC_CAMPAIGN_STORE";
pub const ENV_HOSTNAME: &str = "HPC_CAMPAIGN_HOSTNAME";
pub const ENV_REMOTE_HOSTS: &str = "HPC_CAMPAIGN_HOSTS";
pub const ENV_HDF5_STRIPPER: &str = "HPC_CAMPAIGN_HDF5_STRIPPER";

/// Access details of a remote host (e.g. an S3 server)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteHost {
    /// Lower-cased protocol name (`s3`, `https`, ...)
    pub protocol: String,
    pub endpoint: String,
}

impl RemoteHost {
    pub fn is_s3(&self) -> bool {
        self.protocol == "s3"
    }
}

/// Campaign manager configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Root directory for relative catalog names
    pub campaign_store: Option<PathBuf>,

    /// Short name of the local host
    pub host_name: Option<String>,

    /// Remote hosts by short name
    pub remote_hosts: BTreeMap<String, RemoteHost>,

    /// External program producing the metadata-only copy of an HDF5 file
    pub hdf5_stripper: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load config from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::new();

        if let Some(store) = non_empty_var(ENV_CAMPAIGN_STORE) {
            config.campaign_store = Some(PathBuf::from(store));
        }
        config.host_name = non_empty_var(ENV_HOSTNAME);
        if let Some(hosts) = non_empty_var(ENV_REMOTE_HOSTS) {
            config.remote_hosts = parse_remote_hosts(&hosts)?;
        }
        config.hdf5_stripper = non_empty_var(ENV_HDF5_STRIPPER);

        Ok(config)
    }

    pub fn remote_host(&self, name: &str) -> Option<&RemoteHost> {
        self.remote_hosts.get(name)
    }

    pub fn set_campaign_store(&mut self, store: PathBuf) {
        self.campaign_store = Some(store);
    }

    pub fn set_host_name(&mut self, name: String) {
        self.host_name = Some(name);
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parse a remote-host table of the form `name=protocol@endpoint[,...]`
pub fn parse_remote_hosts(text: &str) -> Result<BTreeMap<String, RemoteHost>> {
    let mut hosts = BTreeMap::new();
    for item in text.split(',').map(str::trim).filter(|item| !item.is_empty()) {
        let (name, target) = item.split_once('=').ok_or_else(|| {
            CampaignError::invalid_argument(format!(
                "{}: expected name=protocol@endpoint, got '{}'",
                ENV_REMOTE_HOSTS, item
            ))
        })?;
        let (protocol, endpoint) = target.split_once('@').ok_or_else(|| {
            CampaignError::invalid_argument(format!(
                "{}: missing protocol@endpoint for host '{}'",
                ENV_REMOTE_HOSTS, name
            ))
        })?;
        hosts.insert(
            name.trim().to_string(),
            RemoteHost {
                protocol: protocol.trim().to_lowercase(),
                endpoint: endpoint.trim().to_string(),
            },
        );
    }
    Ok(hosts)
}

/// Resolve a catalog name to a path.
///
/// Adds the `.aca` extension when missing. A relative name that does not
/// exist in the working directory is looked up under the campaign store.
pub fn resolve_catalog_path(name: &str, store: Option<&Path>) -> PathBuf {
    let mut file_name = name.to_string();
    if !file_name.ends_with(".aca") {
        file_name.push('.');
        file_name.push_str(CATALOG_EXTENSION);
    }
    let path = PathBuf::from(&file_name);
    match store {
        Some(store) if !path.exists() && path.is_relative() => store.join(path),
        _ => path,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_remote_hosts() {
        let hosts =
            parse_remote_hosts("olcf-s3=S3@https://s3.olcf.ornl.gov, web=https@data.example.org")
                .unwrap();
        assert_eq!(hosts.len(), 2);
        let s3 = &hosts["olcf-s3"];
        assert!(s3.is_s3());
        assert_eq!(s3.endpoint, "https://s3.olcf.ornl.gov");
        assert_eq!(hosts["web"].protocol, "https");
    }

    #[test]
    fn test_parse_remote_hosts_rejects_malformed() {
        assert!(parse_remote_hosts("olcf-s3").is_err());
        assert!(parse_remote_hosts("olcf-s3=s3").is_err());
        assert!(parse_remote_hosts(" , ").unwrap().is_empty());
    }

    #[test]
    fn test_resolve_catalog_path_adds_extension() {
        assert_eq!(resolve_catalog_path("demo", None), PathBuf::from("demo.aca"));
        assert_eq!(
            resolve_catalog_path("demo.aca", None),
            PathBuf::from("demo.aca")
        );
    }

    #[test]
    fn test_resolve_catalog_path_uses_store() {
        let store = tempfile::tempdir().unwrap();
        let resolved = resolve_catalog_path("project/run-missing", Some(store.path()));
        assert_eq!(resolved, store.path().join("project/run-missing.aca"));

        let absolute = store.path().join("abs");
        let resolved = resolve_catalog_path(absolute.to_str().unwrap(), Some(Path::new("/other")));
        assert_eq!(resolved, store.path().join("abs.aca"));
    }
}
