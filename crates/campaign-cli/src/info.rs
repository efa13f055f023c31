//! Catalog listing
//!
//! [`collect_info`] walks the catalog into a serialisable tree and
//! [`format_info`] renders it as the text listing printed by `info`.

use crate::catalog::{ArchiveRow, Catalog, DatasetRow, DirectoryRow, HostRow, ReplicaRow};
use crate::error::{CampaignError, Result};
use campaign_common::types::{format_size, timestamp_to_string};
use campaign_common::FileFormat;
use serde::Serialize;
use std::collections::HashMap;

/// What `info` lists besides hosts and datasets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InfoOptions {
    pub list_replicas: bool,
    pub list_files: bool,
    pub show_deleted: bool,
    pub show_checksum: bool,
}

impl InfoOptions {
    fn lists_replicas(&self) -> bool {
        self.list_replicas || self.list_files
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveHeader {
    pub id: String,
    pub name: String,
    pub version: String,
    pub modtime: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryInfo {
    #[serde(flatten)]
    pub directory: DirectoryRow,
    pub archives: Vec<ArchiveRow>,
}

impl DirectoryInfo {
    pub fn has_archive(&self) -> bool {
        !self.archives.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostInfo {
    #[serde(flatten)]
    pub host: HostRow,
    pub directories: Vec<DirectoryInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyInfo {
    pub id: i64,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub name: String,
    pub lenorig: i64,
    pub lencompressed: i64,
    pub modtime: i64,
    pub checksum: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplicaFlags {
    pub deleted: bool,
    pub encrypted: bool,
    pub accuracy: bool,
    /// The replica's directory is an archival storage directory
    pub archive: bool,
    pub embedded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplicaInfo {
    #[serde(flatten)]
    pub replica: ReplicaRow,
    pub flags: ReplicaFlags,
    pub resolution: Option<(i64, i64)>,
    pub files: Vec<FileInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetInfo {
    #[serde(flatten)]
    pub dataset: DatasetRow,
    pub replicas: Vec<ReplicaInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeSeriesInfo {
    pub id: i64,
    pub name: String,
    pub datasets: Vec<DatasetInfo>,
}

/// Everything `info` reports about one catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogInfo {
    pub archive: ArchiveHeader,
    pub hosts: Vec<HostInfo>,
    pub keys: Vec<KeyInfo>,
    pub time_series: Vec<TimeSeriesInfo>,
    pub datasets: Vec<DatasetInfo>,
}

struct Collector<'a> {
    catalog: &'a mut Catalog,
    options: InfoOptions,
    live_only: &'static str,
    dirs_archived: HashMap<i64, bool>,
}

impl Collector<'_> {
    fn hosts(&mut self) -> Vec<HostInfo> {
        let where_live = if self.options.show_deleted {
            ""
        } else {
            " WHERE deltime = 0"
        };
        let sql = format!("{}{} ORDER BY rowid", HostRow::SELECT, where_live);
        let hosts = self.catalog.query_all(&sql, [], HostRow::from_row);

        let dir_sql = format!(
            "{} WHERE hostid = ?1{} ORDER BY rowid",
            DirectoryRow::SELECT,
            self.live_only
        );
        let mut result = Vec::with_capacity(hosts.len());
        for host in hosts {
            let dirs = self
                .catalog
                .query_all(&dir_sql, [host.id], DirectoryRow::from_row);
            let directories = dirs
                .into_iter()
                .map(|directory| {
                    let archives = self.catalog.archives_in_directory(directory.id);
                    self.dirs_archived.insert(directory.id, !archives.is_empty());
                    DirectoryInfo {
                        directory,
                        archives,
                    }
                })
                .collect();
            result.push(HostInfo { host, directories });
        }
        result
    }

    fn keys(&mut self) -> Vec<KeyInfo> {
        self.catalog
            .query_all("SELECT rowid, keyid FROM key ORDER BY rowid", [], |row| {
                Ok(KeyInfo {
                    id: row.get(0)?,
                    key: row.get(1)?,
                })
            })
    }

    fn time_series(&mut self) -> Vec<TimeSeriesInfo> {
        let series: Vec<(i64, String)> = self.catalog.query_all(
            "SELECT tsid, name FROM timeseries ORDER BY tsid",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        );
        let sql = format!(
            "{} WHERE tsid = ?1{} ORDER BY tsorder, rowid",
            DatasetRow::SELECT,
            self.live_only
        );
        series
            .into_iter()
            .map(|(id, name)| {
                let rows = self.catalog.query_all(&sql, [id], DatasetRow::from_row);
                TimeSeriesInfo {
                    id,
                    name,
                    datasets: rows.into_iter().map(|ds| self.dataset(ds)).collect(),
                }
            })
            .collect()
    }

    fn other_datasets(&mut self) -> Vec<DatasetInfo> {
        let sql = format!(
            "{} WHERE tsid = 0{} ORDER BY rowid",
            DatasetRow::SELECT,
            self.live_only
        );
        let rows = self.catalog.query_all(&sql, [], DatasetRow::from_row);
        rows.into_iter().map(|ds| self.dataset(ds)).collect()
    }

    fn dataset(&mut self, dataset: DatasetRow) -> DatasetInfo {
        let mut info = DatasetInfo {
            dataset,
            replicas: Vec::new(),
        };
        if !self.options.lists_replicas() {
            return info;
        }
        let format = info.dataset.format();
        for replica in self.catalog.replicas_of_dataset(info.dataset.id) {
            if replica.is_deleted() && !self.options.show_deleted {
                continue;
            }
            info.replicas.push(self.replica(replica, format));
        }
        info
    }

    fn replica(&mut self, replica: ReplicaRow, format: Option<FileFormat>) -> ReplicaInfo {
        let mut flags = ReplicaFlags {
            deleted: replica.is_deleted(),
            encrypted: replica.key_id > 0,
            archive: self.dirs_archived.get(&replica.dir_id).copied().unwrap_or(false),
            ..ReplicaFlags::default()
        };
        match format {
            Some(FileFormat::Adios | FileFormat::Hdf5) => {
                flags.accuracy = self.has_row("SELECT 1 FROM accuracy WHERE replicaid = ?1", replica.id);
            }
            Some(FileFormat::Image | FileFormat::Text) => {
                flags.embedded = self.has_row("SELECT 1 FROM repfiles WHERE replicaid = ?1", replica.id);
            }
            None => {}
        }
        let resolution = match format {
            Some(FileFormat::Image) => self.catalog.resolution(replica.id),
            _ => None,
        };
        let files = if self.options.list_files {
            self.files(replica.id)
        } else {
            Vec::new()
        };
        ReplicaInfo {
            replica,
            flags,
            resolution,
            files,
        }
    }

    fn has_row(&mut self, sql: &str, replica_id: i64) -> bool {
        self.catalog
            .query_one(sql, [replica_id], |row| row.get::<_, i64>(0))
            .is_some()
    }

    fn files(&mut self, replica_id: i64) -> Vec<FileInfo> {
        self.catalog.query_all(
            "SELECT file.name, file.lenorig, file.lencompressed, file.modtime, file.checksum \
             FROM file JOIN repfiles ON file.fileid = repfiles.fileid \
             WHERE repfiles.replicaid = ?1 ORDER BY file.fileid",
            [replica_id],
            |row| {
                Ok(FileInfo {
                    name: row.get(0)?,
                    lenorig: row.get(1)?,
                    lencompressed: row.get(2)?,
                    modtime: row.get(3)?,
                    checksum: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                })
            },
        )
    }
}

/// Collect the catalog listing
pub fn collect_info(catalog: &mut Catalog, options: InfoOptions) -> Result<CatalogInfo> {
    let archive = catalog
        .query_one("SELECT id, name, version, modtime FROM info", [], |row| {
            Ok(ArchiveHeader {
                id: row.get(0)?,
                name: row.get(1)?,
                version: row.get(2)?,
                modtime: row.get(3)?,
            })
        })
        .ok_or_else(|| CampaignError::invalid_argument("Not a campaign archive: the info table is empty"))?;

    let mut collector = Collector {
        catalog,
        options,
        live_only: if options.show_deleted {
            ""
        } else {
            " AND deltime = 0"
        },
        dirs_archived: HashMap::new(),
    };
    let hosts = collector.hosts();
    let keys = collector.keys();
    let time_series = collector.time_series();
    let datasets = collector.other_datasets();
    Ok(CatalogInfo {
        archive,
        hosts,
        keys,
        time_series,
        datasets,
    })
}

fn flag(set: bool, on: char) -> char {
    if set {
        on
    } else {
        '-'
    }
}

fn deleted_suffix(deltime: i64) -> String {
    if deltime > 0 {
        format!("  - deleted {}", timestamp_to_string(deltime))
    } else {
        String::new()
    }
}

fn replica_line(replica: &ReplicaInfo, format: Option<FileFormat>) -> String {
    let row = &replica.replica;
    let flags = replica.flags;
    let mut line = format!(
        "  {:>7} {}{}{}{}{} {}",
        row.id,
        if flags.embedded { 'e' } else { 'r' },
        flag(flags.encrypted, 'k'),
        flag(flags.accuracy, 'a'),
        flag(flags.archive, 'A'),
        flag(flags.deleted, 'D'),
        row.dir_id
    );
    if row.archive_id > 0 {
        line.push_str(&format!(".{}", row.archive_id));
    }
    match (format, replica.resolution) {
        (Some(FileFormat::Image), Some((x, y))) => {
            line.push_str(&format!("{:>14}", format!(" {} x {}", x, y)))
        }
        _ => line.push_str(&" ".repeat(14)),
    }
    line.push_str(&format!(
        " {:>11}  {}      {}",
        format_size(row.size),
        timestamp_to_string(row.modtime),
        row.name
    ));
    line.push_str(&deleted_suffix(row.deltime));
    line
}

fn file_line(file: &FileInfo, key_id: i64, show_checksum: bool) -> String {
    let mut line = if key_id > 0 {
        format!("{}k{:<3}", " ".repeat(28), key_id)
    } else {
        " ".repeat(32)
    };
    line.push_str(&format!(
        "{:>11}  {}",
        format_size(file.lencompressed),
        timestamp_to_string(file.modtime)
    ));
    if show_checksum {
        line.push_str(&format!("         {}  {}", file.checksum, file.name));
    } else {
        line.push_str(&format!("         {}", file.name));
    }
    line
}

fn dataset_lines(info: &DatasetInfo, options: &InfoOptions, lines: &mut Vec<String>) {
    let ds = &info.dataset;
    lines.push(format!(
        "    {}  {:5}  {}   {}{}",
        ds.uuid,
        ds.file_format,
        timestamp_to_string(ds.modtime),
        ds.name,
        deleted_suffix(ds.deltime)
    ));
    if !options.lists_replicas() {
        return;
    }
    let format = ds.format();
    for replica in &info.replicas {
        lines.push(replica_line(replica, format));
        if options.list_files {
            for file in &replica.files {
                lines.push(file_line(file, replica.replica.key_id, options.show_checksum));
            }
        }
    }
}

/// Render the text listing
pub fn format_info(info: &CatalogInfo, options: &InfoOptions) -> String {
    let mut lines = vec![
        format!(
            "{}, version {}, created on {}",
            info.archive.name,
            info.archive.version,
            timestamp_to_string(info.archive.modtime)
        ),
        String::new(),
        "Hosts and directories:".to_string(),
    ];
    for host in &info.hosts {
        lines.push(format!(
            "  {}   longhostname = {}",
            host.host.hostname, host.host.long_hostname
        ));
        for dir in &host.directories {
            let system = match dir.archives.first() {
                Some(archive) => format!("  - Archive: {}", archive.system),
                None => "  ".to_string(),
            };
            lines.push(format!("     {}. {}{}", dir.directory.id, dir.directory.name, system));
            for archive in &dir.archives {
                let tar = if archive.is_tar() {
                    archive.tar_name.as_str()
                } else {
                    "."
                };
                lines.push(format!("       {}.{} {}", dir.directory.id, archive.id, tar));
            }
        }
    }
    lines.push(String::new());

    if !info.keys.is_empty() {
        lines.push("Encryption keys:".to_string());
        for key in &info.keys {
            lines.push(format!("  k{}. {}", key.id, key.key));
        }
        lines.push(String::new());
    }

    if !info.time_series.is_empty() {
        lines.push("Time-series and their datasets:".to_string());
        for ts in &info.time_series {
            lines.push(format!("  {}", ts.name));
            for dataset in &ts.datasets {
                dataset_lines(dataset, options, &mut lines);
            }
        }
        lines.push(String::new());
    }

    if !info.datasets.is_empty() {
        lines.push("Other Datasets:".to_string());
        for dataset in &info.datasets {
            dataset_lines(dataset, options, &mut lines);
        }
    }
    lines.join("\n")
}
