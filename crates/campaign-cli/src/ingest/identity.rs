//! Host identity and dataset identifiers

use crate::config::Config;
use crate::error::{CampaignError, Result};
use campaign_common::types::parse_datetime_ns;
use regex::Regex;
use std::sync::OnceLock;
use uuid::Uuid;

/// Ingestion from a host whose data is not readable from here
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSource {
    /// Bucket used as the root directory, if any
    pub bucket: Option<String>,
    /// Modification time recorded for every replica
    pub modtime: i64,
}

/// Names under which the session's host is registered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    pub short_name: String,
    pub long_name: String,
    pub remote: Option<RemoteSource>,
}

impl HostIdentity {
    /// Identity of the machine we are running on
    pub fn local(short_name: Option<&str>) -> Self {
        let long_name = machine_long_host_name();
        let short_name = match short_name {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => short_host_name(&long_name),
        };
        Self {
            short_name,
            long_name,
            remote: None,
        }
    }

    /// Select the host for this session.
    ///
    /// A requested host that is listed as remote and differs from the
    /// configured local host makes the session remote. S3 hosts need both a
    /// bucket and a modification date.
    pub fn resolve(
        config: &Config,
        requested: Option<&str>,
        bucket: Option<&str>,
        datetime: Option<&str>,
    ) -> Result<Self> {
        let Some(requested) = requested.filter(|name| !name.is_empty()) else {
            return Ok(Self::local(config.host_name.as_deref()));
        };
        let remote = config
            .remote_host(requested)
            .filter(|_| config.host_name.as_deref() != Some(requested));
        let Some(remote) = remote else {
            return Ok(Self::local(Some(requested)));
        };

        if remote.is_s3() {
            if bucket.is_none() {
                return Err(CampaignError::invalid_argument(
                    "Remote option for an S3 server requires --s3-bucket",
                ));
            }
            if datetime.is_none() {
                return Err(CampaignError::invalid_argument(
                    "Remote option for an S3 server requires --s3-datetime",
                ));
            }
        }
        let modtime = match datetime {
            Some(text) => parse_datetime_ns(text).ok_or_else(|| {
                CampaignError::invalid_argument(format!("Cannot parse date '{}'", text))
            })?,
            None => 0,
        };
        let long_name = if remote.is_s3() {
            remote.endpoint.clone()
        } else {
            machine_long_host_name()
        };

        Ok(Self {
            short_name: requested.to_string(),
            long_name,
            remote: Some(RemoteSource {
                bucket: bucket.map(str::to_string),
                modtime,
            }),
        })
    }

    pub fn is_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Root directory recorded for the session's sources
    pub fn root_dir(&self) -> Result<String> {
        if let Some(bucket) = self.remote.as_ref().and_then(|r| r.bucket.as_ref()) {
            return Ok(bucket.clone());
        }
        let cwd = std::env::current_dir()?;
        Ok(cwd.to_string_lossy().into_owned())
    }
}

fn node_prefix() -> Option<&'static Regex> {
    static PREFIX: OnceLock<Option<Regex>> = OnceLock::new();
    PREFIX
        .get_or_init(|| Regex::new(r"^(login|batch)[0-9]*\.").ok())
        .as_ref()
}

/// Drop a leading `login<N>.` or `batch<N>.` node label
pub fn strip_node_prefix(name: &str) -> String {
    match node_prefix() {
        Some(re) => re.replace(name, "").into_owned(),
        None => name.to_string(),
    }
}

/// Host name of this machine without login/batch node prefixes
pub fn machine_long_host_name() -> String {
    let name = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "localhost".to_string());
    strip_node_prefix(&name)
}

/// First label of a dotted host name
pub fn short_host_name(long_name: &str) -> String {
    long_name
        .split('.')
        .next()
        .unwrap_or(long_name)
        .to_string()
}

/// Stable identifier of a dataset source, usable as a cache key prefix
pub fn dataset_uuid(long_host: &str, root: &str, entry: &str) -> String {
    let location = format!("{}/{}/{}", long_host, root, entry);
    Uuid::new_v3(&Uuid::NAMESPACE_URL, location.as_bytes())
        .simple()
        .to_string()
}
