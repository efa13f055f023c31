//! Typed catalog rows
//!
//! Rows are addressed by SQLite `rowid`; the `*_SELECT` column lists match
//! the corresponding `from_row` constructors.

use campaign_common::FileFormat;
use rusqlite::Row;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostRow {
    pub id: i64,
    pub hostname: String,
    pub long_hostname: String,
    pub modtime: i64,
    pub deltime: i64,
    pub default_protocol: String,
}

impl HostRow {
    pub const SELECT: &'static str =
        "SELECT rowid, hostname, longhostname, modtime, deltime, default_protocol FROM host";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            hostname: row.get(1)?,
            long_hostname: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            modtime: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
            deltime: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
            default_protocol: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryRow {
    pub id: i64,
    pub host_id: i64,
    pub name: String,
    pub modtime: i64,
    pub deltime: i64,
}

impl DirectoryRow {
    pub const SELECT: &'static str = "SELECT rowid, hostid, name, modtime, deltime FROM directory";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            host_id: row.get(1)?,
            name: row.get(2)?,
            modtime: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
            deltime: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetRow {
    pub id: i64,
    pub name: String,
    pub uuid: String,
    pub modtime: i64,
    pub deltime: i64,
    /// Raw `fileformat` tag; see [`DatasetRow::format`]
    pub file_format: String,
    pub tsid: i64,
    pub tsorder: i64,
}

impl DatasetRow {
    pub const SELECT: &'static str =
        "SELECT rowid, name, uuid, modtime, deltime, fileformat, tsid, tsorder FROM dataset";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            uuid: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            modtime: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
            deltime: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
            file_format: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
            tsid: row.get::<_, Option<i64>>(6)?.unwrap_or(0),
            tsorder: row.get::<_, Option<i64>>(7)?.unwrap_or(0),
        })
    }

    pub fn format(&self) -> Option<FileFormat> {
        FileFormat::from_tag(&self.file_format)
    }

    pub fn is_deleted(&self) -> bool {
        self.deltime != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplicaRow {
    pub id: i64,
    pub dataset_id: i64,
    pub host_id: i64,
    pub dir_id: i64,
    /// 0 for a live (not archived) replica
    pub archive_id: i64,
    pub name: String,
    pub modtime: i64,
    pub deltime: i64,
    /// `key` rowid, 0 when unencrypted
    pub key_id: i64,
    pub size: i64,
}

impl ReplicaRow {
    pub const SELECT: &'static str = "SELECT rowid, datasetid, hostid, dirid, archiveid, name, \
         modtime, deltime, keyid, size FROM replica";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            dataset_id: row.get(1)?,
            host_id: row.get(2)?,
            dir_id: row.get(3)?,
            archive_id: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
            name: row.get(5)?,
            modtime: row.get::<_, Option<i64>>(6)?.unwrap_or(0),
            deltime: row.get::<_, Option<i64>>(7)?.unwrap_or(0),
            key_id: row.get::<_, Option<i64>>(8)?.unwrap_or(0),
            size: row.get::<_, Option<i64>>(9)?.unwrap_or(0),
        })
    }

    pub fn is_deleted(&self) -> bool {
        self.deltime != 0
    }

    pub fn is_archived(&self) -> bool {
        self.archive_id > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveRow {
    pub id: i64,
    pub dir_id: i64,
    /// Empty for a plain archival directory
    pub tar_name: String,
    pub system: String,
    #[serde(skip)]
    pub notes: Option<Vec<u8>>,
}

impl ArchiveRow {
    pub const SELECT: &'static str = "SELECT rowid, dirid, tarname, system, notes FROM archive";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            dir_id: row.get(1)?,
            tar_name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            system: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            notes: row.get(4)?,
        })
    }

    pub fn is_tar(&self) -> bool {
        !self.tar_name.is_empty()
    }
}

/// Byte range of one replica payload (or sub-file) inside a TAR container
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveIndexEntry {
    /// Empty for the replica's primary payload
    pub filename: String,
    pub offset: i64,
    pub offset_data: i64,
    pub size: i64,
}
