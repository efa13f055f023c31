//! Lookups and upserts shared by the catalog operations
//!
//! Inserts return the new rowid, or 0 when the statement failed (the failure
//! is already recorded in the session).

use super::models::{ArchiveIndexEntry, ArchiveRow, DatasetRow, DirectoryRow, ReplicaRow};
use super::Catalog;
use campaign_common::FileFormat;
use rusqlite::params;
use tracing::debug;

/// Natural key and attributes of a replica registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReplica {
    pub dataset_id: i64,
    pub host_id: i64,
    pub dir_id: i64,
    pub archive_id: i64,
    pub name: String,
    pub modtime: i64,
    pub key_id: i64,
    pub size: i64,
}

impl Catalog {
    // ========================================================================
    // Hosts, directories, keys
    // ========================================================================

    /// Find or insert a host by its short name
    pub fn add_host(&mut self, short_name: &str, long_name: &str, protocol: &str) -> i64 {
        if let Some(id) = self.query_one(
            "SELECT rowid FROM host WHERE hostname = ?1",
            [short_name],
            |row| row.get::<_, i64>(0),
        ) {
            debug!(host = %short_name, host_id = id, "Found host");
            return id;
        }
        let now = self.now();
        let id = self
            .write_one(
                "INSERT INTO host (hostname, longhostname, modtime, deltime, default_protocol) \
                 VALUES (?1, ?2, ?3, 0, ?4) RETURNING rowid",
                params![short_name, long_name, now, protocol],
                |row| row.get(0),
            )
            .unwrap_or(0);
        debug!(host = %short_name, long_host = %long_name, host_id = id, "Inserted host");
        id
    }

    /// Find or insert a directory of a host
    pub fn add_directory(&mut self, host_id: i64, path: &str) -> i64 {
        if let Some(id) = self.query_one(
            "SELECT rowid FROM directory WHERE hostid = ?1 AND name = ?2",
            params![host_id, path],
            |row| row.get::<_, i64>(0),
        ) {
            debug!(directory = %path, host_id, dir_id = id, "Found directory");
            return id;
        }
        let now = self.now();
        let id = self
            .write_one(
                "INSERT INTO directory (hostid, name, modtime, deltime) \
                 VALUES (?1, ?2, ?3, 0) RETURNING rowid",
                params![host_id, path, now],
                |row| row.get(0),
            )
            .unwrap_or(0);
        debug!(directory = %path, host_id, dir_id = id, "Inserted directory");
        id
    }

    /// Find or insert an encryption key id; no key maps to row 0
    pub fn add_key(&mut self, key_id: Option<&str>) -> i64 {
        let Some(key_id) = key_id.filter(|k| !k.is_empty()) else {
            return 0;
        };
        if let Some(id) =
            self.query_one("SELECT rowid FROM key WHERE keyid = ?1", [key_id], |row| {
                row.get::<_, i64>(0)
            })
        {
            return id;
        }
        self.write_one(
            "INSERT INTO key (keyid) VALUES (?1) RETURNING rowid",
            [key_id],
            |row| row.get(0),
        )
        .unwrap_or(0)
    }

    pub fn directory(&mut self, dir_id: i64) -> Option<DirectoryRow> {
        let sql = format!("{} WHERE rowid = ?1", DirectoryRow::SELECT);
        self.query_one(&sql, [dir_id], DirectoryRow::from_row)
    }

    // ========================================================================
    // Datasets and replicas
    // ========================================================================

    /// Insert a dataset, or resurrect the existing one of the same name
    pub fn upsert_dataset(&mut self, name: &str, uuid: &str, format: FileFormat, modtime: i64) -> i64 {
        self.write_one(
            "INSERT INTO dataset (name, uuid, modtime, deltime, fileformat, tsid, tsorder) \
             VALUES (?1, ?2, ?3, 0, ?4, 0, 0) \
             ON CONFLICT (name) DO UPDATE SET deltime = 0 \
             RETURNING rowid",
            params![name, uuid, modtime, format.as_str()],
            |row| row.get(0),
        )
        .unwrap_or(0)
    }

    /// Insert a replica or refresh the one with the same natural key
    pub fn upsert_replica(&mut self, replica: &NewReplica) -> i64 {
        let id = self
            .write_one(
                "INSERT INTO replica \
                 (datasetid, hostid, dirid, archiveid, name, modtime, deltime, keyid, size) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8) \
                 ON CONFLICT (datasetid, hostid, dirid, archiveid, name) \
                 DO UPDATE SET modtime = ?6, deltime = 0, keyid = ?7, size = ?8 \
                 RETURNING rowid",
                params![
                    replica.dataset_id,
                    replica.host_id,
                    replica.dir_id,
                    replica.archive_id,
                    replica.name,
                    replica.modtime,
                    replica.key_id,
                    replica.size,
                ],
                |row| row.get(0),
            )
            .unwrap_or(0);
        debug!(
            replica = %replica.name,
            dataset_id = replica.dataset_id,
            archive_id = replica.archive_id,
            replica_id = id,
            "Upserted replica"
        );
        id
    }

    pub fn upsert_resolution(&mut self, replica_id: i64, x: i64, y: i64) {
        self.execute(
            "INSERT INTO resolution (replicaid, x, y) VALUES (?1, ?2, ?3) \
             ON CONFLICT (replicaid) DO UPDATE SET x = ?2, y = ?3",
            params![replica_id, x, y],
        );
    }

    pub fn resolution(&mut self, replica_id: i64) -> Option<(i64, i64)> {
        self.query_one(
            "SELECT x, y FROM resolution WHERE replicaid = ?1",
            [replica_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
    }

    pub fn dataset_by_name(&mut self, name: &str) -> Option<DatasetRow> {
        let sql = format!("{} WHERE name = ?1", DatasetRow::SELECT);
        self.query_one(&sql, [name], DatasetRow::from_row)
    }

    pub fn dataset_by_id(&mut self, id: i64) -> Option<DatasetRow> {
        let sql = format!("{} WHERE rowid = ?1", DatasetRow::SELECT);
        self.query_one(&sql, [id], DatasetRow::from_row)
    }

    pub fn replica(&mut self, id: i64) -> Option<ReplicaRow> {
        let sql = format!("{} WHERE rowid = ?1", ReplicaRow::SELECT);
        self.query_one(&sql, [id], ReplicaRow::from_row)
    }

    /// All replicas of a dataset (live, archived and deleted) in rowid order
    pub fn replicas_of_dataset(&mut self, dataset_id: i64) -> Vec<ReplicaRow> {
        let sql = format!("{} WHERE datasetid = ?1 ORDER BY rowid", ReplicaRow::SELECT);
        self.query_all(&sql, [dataset_id], ReplicaRow::from_row)
    }

    /// First live replica registered under a path name
    pub fn live_replica_by_name(&mut self, name: &str) -> Option<ReplicaRow> {
        let sql = format!(
            "{} WHERE name = ?1 AND deltime = 0 ORDER BY rowid LIMIT 1",
            ReplicaRow::SELECT
        );
        self.query_one(&sql, [name], ReplicaRow::from_row)
    }

    // ========================================================================
    // Archival storage
    // ========================================================================

    pub fn archive(&mut self, archive_id: i64) -> Option<ArchiveRow> {
        let sql = format!("{} WHERE rowid = ?1", ArchiveRow::SELECT);
        self.query_one(&sql, [archive_id], ArchiveRow::from_row)
    }

    pub fn archives_in_directory(&mut self, dir_id: i64) -> Vec<ArchiveRow> {
        let sql = format!("{} WHERE dirid = ?1 ORDER BY rowid", ArchiveRow::SELECT);
        self.query_all(&sql, [dir_id], ArchiveRow::from_row)
    }

    /// Find or insert the archive `(dir_id, tar_name)`
    pub fn add_archive(
        &mut self,
        dir_id: i64,
        tar_name: &str,
        system: &str,
        notes: Option<&[u8]>,
    ) -> i64 {
        if let Some(id) = self.query_one(
            "SELECT rowid FROM archive WHERE dirid = ?1 AND tarname = ?2",
            params![dir_id, tar_name],
            |row| row.get::<_, i64>(0),
        ) {
            debug!(dir_id, tar_name, archive_id = id, "Found archive");
            return id;
        }
        self.write_one(
            "INSERT INTO archive (dirid, tarname, system, notes) VALUES (?1, ?2, ?3, ?4) \
             RETURNING rowid",
            params![dir_id, tar_name, system, notes],
            |row| row.get(0),
        )
        .unwrap_or(0)
    }

    pub fn upsert_archive_index(&mut self, archive_id: i64, replica_id: i64, entry: &ArchiveIndexEntry) {
        self.execute(
            "INSERT INTO archiveidx (archiveid, replicaid, filename, offset, offset_data, size) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT (archiveid, replicaid, filename) \
             DO UPDATE SET offset = ?4, offset_data = ?5, size = ?6",
            params![
                archive_id,
                replica_id,
                entry.filename,
                entry.offset,
                entry.offset_data,
                entry.size,
            ],
        );
    }

    /// Index entries registered for a replica, ordered by file name
    pub fn archive_index(&mut self, replica_id: i64) -> Vec<ArchiveIndexEntry> {
        self.query_all(
            "SELECT filename, offset, offset_data, size FROM archiveidx \
             WHERE replicaid = ?1 ORDER BY filename",
            [replica_id],
            |row| {
                Ok(ArchiveIndexEntry {
                    filename: row.get(0)?,
                    offset: row.get(1)?,
                    offset_data: row.get(2)?,
                    size: row.get(3)?,
                })
            },
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::catalog::Session;

    fn catalog() -> Catalog {
        Catalog::in_memory(Session::at(100)).unwrap()
    }

    #[test]
    fn test_add_host_is_find_or_insert() {
        let mut catalog = catalog();
        let first = catalog.add_host("frontier", "frontier.olcf.ornl.gov", "");
        let second = catalog.add_host("frontier", "other.name", "https");
        assert!(first > 0);
        assert_eq!(first, second);
        let long: Option<String> = catalog.query_one(
            "SELECT longhostname FROM host WHERE rowid = ?1",
            [first],
            |r| r.get(0),
        );
        assert_eq!(long.as_deref(), Some("frontier.olcf.ornl.gov"));
    }

    #[test]
    fn test_add_directory_per_host() {
        let mut catalog = catalog();
        let h1 = catalog.add_host("a", "a.example", "");
        let h2 = catalog.add_host("b", "b.example", "");
        let d1 = catalog.add_directory(h1, "/data");
        let d2 = catalog.add_directory(h2, "/data");
        assert_ne!(d1, d2);
        assert_eq!(catalog.add_directory(h1, "/data"), d1);
        let dir = catalog.directory(d1).unwrap();
        assert_eq!(dir.host_id, h1);
        assert_eq!(dir.modtime, 100);
    }

    #[test]
    fn test_add_key() {
        let mut catalog = catalog();
        assert_eq!(catalog.add_key(None), 0);
        assert_eq!(catalog.add_key(Some("")), 0);
        let k = catalog.add_key(Some("team"));
        assert!(k > 0);
        assert_eq!(catalog.add_key(Some("team")), k);
    }

    #[test]
    fn test_upsert_dataset_resurrects() {
        let mut catalog = catalog();
        let id = catalog.upsert_dataset("heat", "u-1", FileFormat::Adios, 5);
        catalog.execute("UPDATE dataset SET deltime = 9 WHERE rowid = ?1", [id]);
        let again = catalog.upsert_dataset("heat", "u-2", FileFormat::Adios, 6);
        assert_eq!(id, again);
        let row = catalog.dataset_by_name("heat").unwrap();
        assert_eq!(row.deltime, 0);
        assert_eq!(row.uuid, "u-1");
        assert_eq!(row.format(), Some(FileFormat::Adios));
    }

    #[test]
    fn test_upsert_replica_updates_in_place() {
        let mut catalog = catalog();
        let ds = catalog.upsert_dataset("heat", "u", FileFormat::Adios, 1);
        let mut replica = NewReplica {
            dataset_id: ds,
            host_id: 1,
            dir_id: 1,
            archive_id: 0,
            name: "heat.bp".into(),
            modtime: 1,
            key_id: 0,
            size: 10,
        };
        let id = catalog.upsert_replica(&replica);
        replica.size = 20;
        replica.modtime = 2;
        assert_eq!(catalog.upsert_replica(&replica), id);
        let row = catalog.replica(id).unwrap();
        assert_eq!(row.size, 20);
        assert_eq!(row.modtime, 2);
        assert_eq!(catalog.replicas_of_dataset(ds).len(), 1);
    }

    #[test]
    fn test_resolution_and_archive_index_upserts() {
        let mut catalog = catalog();
        catalog.upsert_resolution(3, 640, 480);
        catalog.upsert_resolution(3, 64, 48);
        assert_eq!(catalog.resolution(3), Some((64, 48)));

        let mut entry = ArchiveIndexEntry {
            filename: String::new(),
            offset: 0,
            offset_data: 512,
            size: 100,
        };
        catalog.upsert_archive_index(1, 3, &entry);
        entry.offset_data = 1024;
        catalog.upsert_archive_index(1, 3, &entry);
        let entries = catalog.archive_index(3);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].offset_data, 1024);
    }

    #[test]
    fn test_add_archive_is_find_or_insert() {
        let mut catalog = catalog();
        let a = catalog.add_archive(4, "", "HPSS", None);
        let b = catalog.add_archive(4, "run.tar", "HPSS", Some(b"notes"));
        assert_ne!(a, b);
        assert_eq!(catalog.add_archive(4, "", "fs", None), a);
        assert_eq!(catalog.archives_in_directory(4).len(), 2);
        let tar = catalog.archive(b).unwrap();
        assert!(tar.is_tar());
        assert_eq!(tar.notes.as_deref(), Some(&b"notes"[..]));
    }
}
