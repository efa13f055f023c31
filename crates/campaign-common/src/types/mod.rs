//! Common types used across the campaign tools

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Format tag stored in `dataset.fileformat`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileFormat {
    /// Structured multi-file simulation output (a directory with `md.idx` and `data.0`)
    Adios,
    /// Tabular container file stored as a stripped metadata skeleton
    Hdf5,
    Image,
    Text,
}

impl FileFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            FileFormat::Adios => "ADIOS",
            FileFormat::Hdf5 => "HDF5",
            FileFormat::Image => "IMAGE",
            FileFormat::Text => "TEXT",
        }
    }

    /// Parse a stored tag; unknown tags yield `None`
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "ADIOS" => Some(FileFormat::Adios),
            "HDF5" => Some(FileFormat::Hdf5),
            "IMAGE" => Some(FileFormat::Image),
            "TEXT" => Some(FileFormat::Text),
            _ => None,
        }
    }

    /// Formats whose index files only exist as embedded files of a replica
    pub fn requires_embedded_metadata(self) -> bool {
        matches!(self, FileFormat::Adios | FileFormat::Hdf5)
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// TAR header type codes understood by the index reader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TarEntryType {
    Regular,
    Directory,
}

impl TarEntryType {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(TarEntryType::Regular),
            5 => Some(TarEntryType::Directory),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            TarEntryType::Regular => 0,
            TarEntryType::Directory => 5,
        }
    }
}

/// Binary-prefixed size for listings, e.g. `"1.5 KiB"`
pub fn format_size(bytes: i64) -> String {
    const UNITS: &[&str] = &["", "Ki", "Mi", "Gi", "Ti", "Pi", "Ei"];
    let mut size = bytes as f64;
    for unit in UNITS {
        if size.abs() < 1024.0 {
            return format!("{:.1} {}B", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.1} ZiB", size)
}

// ============================================================================
// Timestamps
// ============================================================================

/// Current time as nanoseconds since the Unix epoch
pub fn now_ns() -> i64 {
    system_time_ns(SystemTime::now())
}

/// Convert a `SystemTime` (e.g. a file's mtime) to epoch nanoseconds
pub fn system_time_ns(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_nanos()).unwrap_or(i64::MAX),
        Err(e) => -i64::try_from(e.duration().as_nanos()).unwrap_or(i64::MAX),
    }
}

/// Interpret a stored timestamp whose unit is inferred from its digit count.
///
/// Older catalogs stored seconds or milliseconds; current ones store nanoseconds.
pub fn timestamp_to_datetime(timestamp: i64) -> Option<DateTime<Local>> {
    let digits = timestamp.unsigned_abs().to_string().len();
    let nanos: i64 = if digits > 18 {
        timestamp
    } else if digits > 15 {
        timestamp.saturating_mul(1_000)
    } else if digits > 12 {
        timestamp.saturating_mul(1_000_000)
    } else {
        timestamp.saturating_mul(1_000_000_000)
    };
    Local
        .timestamp_opt(nanos.div_euclid(1_000_000_000), nanos.rem_euclid(1_000_000_000) as u32)
        .single()
}

/// Render a stored timestamp for listings
pub fn timestamp_to_string(timestamp: i64) -> String {
    match timestamp_to_datetime(timestamp) {
        Some(dt) => dt.format("%b %d %Y %H:%M").to_string(),
        None => "-".to_string(),
    }
}

/// Parse a caller-supplied modification date (RFC 3339 or `YYYY-MM-DD HH:MM:SS ±ZZZZ`)
pub fn parse_datetime_ns(text: &str) -> Option<i64> {
    let text = text.trim();
    let parsed = DateTime::parse_from_rfc3339(text)
        .or_else(|_| DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S %z"))
        .ok()?;
    parsed.timestamp_nanos_opt()
}
