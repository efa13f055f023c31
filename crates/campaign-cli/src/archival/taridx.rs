//! TAR index ingestion
//!
//! A TAR index has one row per TAR entry: `type, offset, data_offset, size,
//! name`. Regular files (type 0) match replicas one-to-one. A directory
//! (type 5) of an ADIOS dataset matches one replica, and the regular files
//! listed under it become sub-file entries of that replica.

use super::{promote, PromoteRequest};
use crate::catalog::{ArchiveIndexEntry, Catalog};
use crate::error::{CampaignError, Result};
use campaign_common::{FileFormat, TarEntryType};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

/// Outcome of one index ingestion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TarIndexReport {
    pub rows: usize,
    pub promoted: usize,
    pub entries: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct IndexRow {
    type_code: i64,
    offset: i64,
    data_offset: i64,
    size: i64,
    name: String,
}

impl IndexRow {
    fn entry_type(&self) -> Option<TarEntryType> {
        TarEntryType::from_code(self.type_code)
    }

    fn entry(&self, filename: impl Into<String>) -> ArchiveIndexEntry {
        ArchiveIndexEntry {
            filename: filename.into(),
            offset: self.offset,
            offset_data: self.data_offset,
            size: self.size,
        }
    }
}

#[derive(Debug)]
enum Line {
    Row(IndexRow),
    Malformed(String),
}

fn parse_number(record: &StringRecord, index: usize) -> std::result::Result<i64, String> {
    record[index]
        .parse::<i64>()
        .map_err(|e| format!("field {} '{}': {}", index + 1, &record[index], e))
}

fn parse_record(record: &StringRecord) -> Line {
    if record.len() != 5 {
        return Line::Malformed(format!("expected 5 fields, found {}", record.len()));
    }
    let numbers = (0..4)
        .map(|i| parse_number(record, i))
        .collect::<std::result::Result<Vec<_>, _>>();
    match numbers {
        Ok(n) => Line::Row(IndexRow {
            type_code: n[0],
            offset: n[1],
            data_offset: n[2],
            size: n[3],
            name: record[4].to_string(),
        }),
        Err(msg) => Line::Malformed(msg),
    }
}

/// Line-numbered rows with a single slot of lookahead
struct Rows<R: Read> {
    records: csv::StringRecordsIntoIter<R>,
    line: usize,
    pending: Option<(usize, Line)>,
}

impl<R: Read> Rows<R> {
    fn next_line(&mut self) -> Option<(usize, Line)> {
        if let Some(pending) = self.pending.take() {
            return Some(pending);
        }
        let record = self.records.next()?;
        self.line += 1;
        let line = match record {
            Ok(record) => parse_record(&record),
            Err(err) => Line::Malformed(err.to_string()),
        };
        Some((self.line, line))
    }

    fn push_back(&mut self, line: (usize, Line)) {
        self.pending = Some(line);
    }
}

/// Ingest the TAR index file at `path` for `archive_id`
pub fn ingest_tar_index(catalog: &mut Catalog, archive_id: i64, path: &Path) -> Result<TarIndexReport> {
    let file = File::open(path).map_err(|e| {
        std::io::Error::new(e.kind(), format!("Cannot open TAR index {}: {}", path.display(), e))
    })?;
    ingest_tar_index_from(catalog, archive_id, file, &path.display().to_string())
}

/// Ingest a TAR index read from `reader`; `source` names it in diagnostics
pub fn ingest_tar_index_from<R: Read>(
    catalog: &mut Catalog,
    archive_id: i64,
    reader: R,
    source: &str,
) -> Result<TarIndexReport> {
    let archive = catalog
        .archive(archive_id)
        .ok_or(CampaignError::ArchiveNotFound(archive_id))?;
    if !archive.is_tar() {
        return Err(CampaignError::NotATarArchive {
            dir_id: archive.dir_id,
            archive_id,
        });
    }

    let records = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader)
        .into_records();
    let mut rows = Rows {
        records,
        line: 0,
        pending: None,
    };
    let mut report = TarIndexReport::default();

    while let Some((line, parsed)) = rows.next_line() {
        let row = match parsed {
            Line::Row(row) => row,
            Line::Malformed(reason) => {
                warn!(index = %source, line, reason = %reason, "Malformed TAR index row, skipping");
                report.skipped += 1;
                continue;
            }
        };
        let Some(entry_type) = row.entry_type() else {
            continue;
        };

        let name = match entry_type {
            TarEntryType::Regular => row.name.clone(),
            TarEntryType::Directory => row.name.trim_end_matches('/').to_string(),
        };
        let Some(replica) = catalog.live_replica_by_name(&name) else {
            debug!(entry = %name, "No suitable replica found, skipping");
            report.skipped += 1;
            continue;
        };
        let Some(dataset) = catalog.dataset_by_id(replica.dataset_id) else {
            report.skipped += 1;
            continue;
        };
        debug!(entry = %name, replica_id = replica.id, dataset = %dataset.name, "Matched replica");

        let mut entries = vec![row.entry("")];
        match entry_type {
            TarEntryType::Regular if row.size != replica.size => {
                warn!(
                    entry = %name,
                    replica_size = replica.size,
                    tar_size = row.size,
                    "Replica size does not match the size in the TAR file, skipping"
                );
                report.skipped += 1;
                continue;
            }
            TarEntryType::Regular => {}
            TarEntryType::Directory if dataset.format() == Some(FileFormat::Adios) => {
                let prefix = format!("{}/", name);
                while let Some((line, parsed)) = rows.next_line() {
                    match parsed {
                        Line::Row(member) if member.name.starts_with(&prefix) => {
                            if member.entry_type() == Some(TarEntryType::Regular) {
                                entries.push(member.entry(&member.name[prefix.len()..]));
                            }
                        }
                        other => {
                            rows.push_back((line, other));
                            break;
                        }
                    }
                }
            }
            TarEntryType::Directory => {
                debug!(entry = %name, format = %dataset.file_format, "Directory entry of a single-file dataset, skipping");
                report.skipped += 1;
                continue;
            }
        }

        let request = PromoteRequest::new(
            dataset.name.clone(),
            archive.dir_id,
            Some(archive_id),
            Some(replica.id),
            None,
            false,
        )?;
        match promote(catalog, &request) {
            Ok(archived) if archived > 0 => {
                for entry in &entries {
                    catalog.upsert_archive_index(archive_id, archived, entry);
                }
                catalog.commit();
                report.promoted += 1;
                report.entries += entries.len();
            }
            Ok(_) => report.skipped += 1,
            Err(err) => {
                warn!(entry = %name, error = %err, "Cannot archive replica, skipping");
                report.skipped += 1;
            }
        }
    }
    report.rows = rows.line;

    info!(
        index = %source,
        rows = report.rows,
        promoted = report.promoted,
        entries = report.entries,
        skipped = report.skipped,
        "Processed TAR index"
    );
    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn record(fields: &[&str]) -> StringRecord {
        StringRecord::from(fields.to_vec())
    }

    #[test]
    fn test_parse_record() {
        match parse_record(&record(&["0", "0", "512", "1024", "run1/a"])) {
            Line::Row(row) => {
                assert_eq!(row.entry_type(), Some(TarEntryType::Regular));
                assert_eq!(row.data_offset, 512);
                assert_eq!(row.name, "run1/a");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(parse_record(&record(&["0", "0", "512"])), Line::Malformed(_)));
        assert!(matches!(
            parse_record(&record(&["x", "0", "512", "1", "a"])),
            Line::Malformed(_)
        ));
    }

    #[test]
    fn test_non_tar_archive_rejected() {
        let mut catalog = Catalog::in_memory(crate::catalog::Session::at(1)).unwrap();
        let archive = catalog.add_archive(1, "", "HPSS", None);
        let err = ingest_tar_index_from(&mut catalog, archive, "".as_bytes(), "mem").unwrap_err();
        assert!(matches!(err, CampaignError::NotATarArchive { dir_id: 1, .. }));
        let err = ingest_tar_index_from(&mut catalog, 99, "".as_bytes(), "mem").unwrap_err();
        assert!(matches!(err, CampaignError::ArchiveNotFound(99)));
    }
}
