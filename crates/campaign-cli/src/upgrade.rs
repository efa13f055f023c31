//! In-place schema upgrades
//!
//! Each catalog version with a successor has one step in [`STEPS`]. A single
//! `upgrade` run applies at most one step. The step runs inside one
//! transaction: when any of its statements fails, the transaction is rolled
//! back and the stored version stays where it was.

use crate::catalog::schema::{self, create_table_sql};
use crate::catalog::Catalog;
use crate::error::Result;
use rusqlite::params;
use std::collections::HashMap;
use tracing::{error, info};

/// One migration from `from` to `to`
pub struct UpgradeStep {
    pub from: &'static str,
    pub to: &'static str,
    migrate: fn(&mut Catalog),
}

/// Known upgrade steps, oldest first
pub const STEPS: &[UpgradeStep] = &[
    UpgradeStep {
        from: "0.5",
        to: "0.6",
        migrate: upgrade_to_0_6,
    },
    UpgradeStep {
        from: "0.6",
        to: "0.7",
        migrate: upgrade_to_0_7,
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeOutcome {
    /// The catalog already has the latest version
    Current(String),
    /// One step was applied
    Upgraded { from: String, to: String },
    /// The step failed and was rolled back
    RolledBack {
        from: String,
        to: String,
        errors: usize,
    },
    /// No step starts at this version
    Unsupported(String),
}

impl std::fmt::Display for UpgradeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Current(v) => write!(f, "This archive has the latest version already: {}", v),
            Self::Upgraded { from, to } => write!(f, "Upgraded from {} to {}", from, to),
            Self::RolledBack { from, to, errors } => write!(
                f,
                "Upgrade from {} to {} dropped after {} SQL error(s)",
                from, to, errors
            ),
            Self::Unsupported(v) => write!(f, "Version '{}' cannot be upgraded", v),
        }
    }
}

fn step_from(version: &str) -> Option<&'static UpgradeStep> {
    STEPS.iter().find(|step| step.from == version)
}

/// Apply the upgrade step for the catalog's current version, if there is one
pub fn upgrade(catalog: &mut Catalog) -> Result<UpgradeOutcome> {
    catalog.commit();
    let version = catalog.version().unwrap_or_default();
    if version == schema::CATALOG_VERSION {
        info!(version = %version, "Archive has the latest version already");
        return Ok(UpgradeOutcome::Current(version));
    }
    let Some(step) = step_from(&version) else {
        error!(version = %version, "This version cannot be upgraded");
        return Ok(UpgradeOutcome::Unsupported(version));
    };

    info!(from = step.from, to = step.to, "Upgrade archive");
    let before = catalog.session().error_count();
    (step.migrate)(catalog);
    catalog.execute("UPDATE info SET version = ?1", [step.to]);

    let errors = catalog.session().error_count() - before;
    if errors > 0 {
        error!(errors, "SQL errors detected, dropping all changes");
        catalog.rollback();
        return Ok(UpgradeOutcome::RolledBack {
            from: step.from.to_string(),
            to: step.to.to_string(),
            errors,
        });
    }
    catalog.compact();
    Ok(UpgradeOutcome::Upgraded {
        from: step.from.to_string(),
        to: step.to.to_string(),
    })
}

/// Host protocols, replica archive ids, TAR-based archives and the TAR index
fn upgrade_to_0_6(catalog: &mut Catalog) {
    catalog.execute("ALTER TABLE host ADD default_protocol TEXT", []);

    catalog.execute(&create_table_sql("replica_new", schema::REPLICA_COLUMNS), []);
    catalog.execute(
        "INSERT INTO replica_new \
         (rowid, datasetid, hostid, dirid, archiveid, name, modtime, deltime, keyid, size) \
         SELECT rowid, datasetid, hostid, dirid, 0, name, modtime, deltime, keyid, size FROM replica",
        [],
    );
    catalog.execute("DROP TABLE replica", []);
    catalog.execute("ALTER TABLE replica_new RENAME TO replica", []);

    catalog.execute(&create_table_sql("archive_new", schema::ARCHIVE_COLUMNS), []);
    catalog.execute(
        "INSERT INTO archive_new (rowid, dirid, tarname, system, notes) \
         SELECT rowid, dirid, '', system, notes FROM archive",
        [],
    );
    catalog.execute("DROP TABLE archive", []);
    catalog.execute("ALTER TABLE archive_new RENAME TO archive", []);

    catalog.execute(&create_table_sql("archiveidx", schema::ARCHIVEIDX_COLUMNS), []);
}

struct LegacyFile {
    id: i64,
    replica_id: i64,
    name: String,
    compression: i64,
    lenorig: i64,
    lencompressed: i64,
    modtime: i64,
    checksum: Option<String>,
    data: Option<Vec<u8>>,
}

/// Files move out of the replica into `file` + `repfiles`; identical files
/// of one dataset collapse into a single row
fn upgrade_to_0_7(catalog: &mut Catalog) {
    catalog.execute("ALTER TABLE file RENAME TO file_old", []);
    catalog.execute(&create_table_sql("file", schema::FILE_COLUMNS), []);
    catalog.execute(&create_table_sql("repfiles", schema::REPFILES_COLUMNS), []);

    let datasets: HashMap<i64, i64> = catalog
        .query_all("SELECT rowid, datasetid FROM replica", [], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .into_iter()
        .collect();
    let files = catalog.query_all(
        "SELECT rowid, replicaid, name, compression, lenorig, lencompressed, modtime, checksum, data \
         FROM file_old ORDER BY rowid",
        [],
        |row| {
            Ok(LegacyFile {
                id: row.get(0)?,
                replica_id: row.get(1)?,
                name: row.get(2)?,
                compression: row.get(3)?,
                lenorig: row.get(4)?,
                lencompressed: row.get(5)?,
                modtime: row.get(6)?,
                checksum: row.get(7)?,
                data: row.get(8)?,
            })
        },
    );
    info!(files = files.len(), "Moving embedded files");

    for file in files {
        let dataset_id = datasets.get(&file.replica_id).copied().unwrap_or(-1);
        let existing: Option<i64> = catalog.query_one(
            "SELECT file.fileid FROM file \
             JOIN repfiles ON file.fileid = repfiles.fileid \
             JOIN replica ON repfiles.replicaid = replica.rowid \
             WHERE replica.datasetid = ?1 AND file.name = ?2 AND file.lenorig = ?3 \
             AND file.lencompressed = ?4 AND file.checksum = ?5 LIMIT 1",
            params![dataset_id, file.name, file.lenorig, file.lencompressed, file.checksum],
            |row| row.get(0),
        );
        let file_id = match existing {
            Some(id) => id,
            None => {
                catalog.execute(
                    "INSERT INTO file \
                     (fileid, name, compression, lenorig, lencompressed, modtime, checksum, data) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        file.id,
                        file.name,
                        file.compression,
                        file.lenorig,
                        file.lencompressed,
                        file.modtime,
                        file.checksum,
                        file.data
                    ],
                );
                file.id
            }
        };
        catalog.execute(
            "INSERT INTO repfiles (replicaid, fileid) VALUES (?1, ?2)",
            params![file.replica_id, file_id],
        );
    }
    catalog.execute("DROP TABLE file_old", []);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::catalog::Session;
    use rusqlite::Connection;

    const V06_FILE_COLUMNS: &str = "(replicaid INT, name TEXT, compression INT, lenorig INT, \
         lencompressed INT, modtime INT, checksum TEXT, data BLOB, PRIMARY KEY (replicaid, name))";

    fn catalog_at(version: &str) -> Catalog {
        let conn = Connection::open_in_memory().unwrap();
        schema::init_schema(&conn, 1).unwrap();
        conn.execute("UPDATE info SET version = ?1", [version]).unwrap();
        Catalog::from_connection(conn, Session::at(2))
    }

    fn v06_catalog() -> Catalog {
        let catalog = catalog_at("0.6");
        let conn = catalog.connection();
        conn.execute_batch("DROP TABLE file; DROP TABLE repfiles;").unwrap();
        conn.execute(&create_table_sql("file", V06_FILE_COLUMNS), []).unwrap();
        conn.execute_batch(
            "INSERT INTO dataset (rowid, name, uuid, modtime, deltime, fileformat, tsid, tsorder) \
                 VALUES (1, 'run', 'u1', 0, 0, 'ADIOS', 0, 0); \
             INSERT INTO replica (rowid, datasetid, hostid, dirid, archiveid, name, modtime, deltime, keyid, size) \
                 VALUES (1, 1, 1, 1, 0, 'run.bp', 0, 0, 0, 10), (2, 1, 1, 2, 0, 'run.bp', 0, 0, 0, 10); \
             INSERT INTO file VALUES (1, 'md.idx', 1, 4, 3, 0, 'aaa', x'010203'); \
             INSERT INTO file VALUES (2, 'md.idx', 1, 4, 3, 0, 'aaa', x'010203'); \
             INSERT INTO file VALUES (2, 'md.0', 1, 8, 5, 0, 'bbb', x'0405');",
        )
        .unwrap();
        catalog
    }

    fn v05_catalog() -> Catalog {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE info (id TEXT, name TEXT, version TEXT, modtime INT); \
             INSERT INTO info VALUES ('ACA', 'ADIOS Campaign Archive', '0.5', 1); \
             CREATE TABLE host (hostname TEXT PRIMARY KEY, longhostname TEXT, modtime INT, deltime INT); \
             INSERT INTO host VALUES ('frontier', 'frontier.olcf.ornl.gov', 1, 0); \
             CREATE TABLE replica (datasetid INT, hostid INT, dirid INT, name TEXT, modtime INT, \
                 deltime INT, keyid INT, size INT, PRIMARY KEY (datasetid, hostid, dirid, name)); \
             INSERT INTO replica (rowid, datasetid, hostid, dirid, name, modtime, deltime, keyid, size) \
                 VALUES (4, 1, 1, 1, 'a.bp', 0, 0, 0, 1), (9, 2, 1, 1, 'b.bp', 0, 0, 0, 2); \
             CREATE TABLE archive (dirid INT, system TEXT, notes BLOB, PRIMARY KEY (dirid)); \
             INSERT INTO archive (rowid, dirid, system, notes) VALUES (3, 5, 'HPSS', NULL);",
        )
        .unwrap();
        Catalog::from_connection(conn, Session::at(2))
    }

    #[test]
    fn test_current_version_is_noop() {
        let mut catalog = catalog_at(schema::CATALOG_VERSION);
        let outcome = upgrade(&mut catalog).unwrap();
        assert_eq!(outcome, UpgradeOutcome::Current("0.7".into()));
    }

    #[test]
    fn test_unknown_version_untouched() {
        let mut catalog = catalog_at("0.3");
        assert_eq!(
            upgrade(&mut catalog).unwrap(),
            UpgradeOutcome::Unsupported("0.3".into())
        );
        assert_eq!(catalog.version().as_deref(), Some("0.3"));
    }

    #[test]
    fn test_upgrade_0_5_keeps_row_ids() {
        let mut catalog = v05_catalog();
        let outcome = upgrade(&mut catalog).unwrap();
        assert_eq!(
            outcome,
            UpgradeOutcome::Upgraded {
                from: "0.5".into(),
                to: "0.6".into()
            }
        );
        assert_eq!(catalog.version().as_deref(), Some("0.6"));

        let replicas: Vec<(i64, i64)> = catalog.query_all(
            "SELECT rowid, archiveid FROM replica ORDER BY rowid",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        );
        assert_eq!(replicas, vec![(4, 0), (9, 0)]);
        let archive: Option<(i64, String)> = catalog.query_one(
            "SELECT rowid, tarname FROM archive",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        );
        assert_eq!(archive, Some((3, String::new())));
        let protocol: Option<Option<String>> =
            catalog.query_one("SELECT default_protocol FROM host", [], |r| r.get(0));
        assert_eq!(protocol, Some(None));
        assert!(catalog
            .query_one("SELECT count(*) FROM archiveidx", [], |r| r.get::<_, i64>(0))
            .is_some());
        assert_eq!(catalog.session().error_count(), 0);
    }

    #[test]
    fn test_upgrade_0_6_deduplicates_dataset_files() {
        let mut catalog = v06_catalog();
        upgrade(&mut catalog).unwrap();
        assert_eq!(catalog.version().as_deref(), Some("0.7"));

        let files: Vec<(i64, String)> =
            catalog.query_all("SELECT fileid, name FROM file ORDER BY fileid", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            });
        assert_eq!(files, vec![(1, "md.idx".into()), (3, "md.0".into())]);
        let links: Vec<(i64, i64)> = catalog.query_all(
            "SELECT replicaid, fileid FROM repfiles ORDER BY replicaid, fileid",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        );
        assert_eq!(links, vec![(1, 1), (2, 1), (2, 3)]);
    }

    #[test]
    fn test_failed_step_is_rolled_back() {
        let mut catalog = catalog_at("0.5");
        // a 0.7 host already has default_protocol, so the first statement fails
        let outcome = upgrade(&mut catalog).unwrap();
        assert!(matches!(outcome, UpgradeOutcome::RolledBack { errors, .. } if errors > 0));
        assert_eq!(catalog.version().as_deref(), Some("0.5"));
        let tables: Option<i64> = catalog.query_one(
            "SELECT count(*) FROM sqlite_master WHERE name = 'replica_new'",
            [],
            |r| r.get(0),
        );
        assert_eq!(tables, Some(0));
    }

    #[test]
    fn test_one_step_per_run() {
        let mut catalog = v05_catalog();
        upgrade(&mut catalog).unwrap();
        assert_eq!(catalog.version().as_deref(), Some("0.6"));
    }
}
