//! Campaign archive catalog
//!
//! A catalog is a single SQLite file (`.aca`). One [`Catalog`] owns the
//! connection for a whole invocation and funnels every statement through a
//! small set of wrappers that never abort on failure: the error is logged,
//! appended to the [`Session`], and the wrapper yields `None` so the calling
//! operation can carry on. Write statements open a transaction lazily; each
//! logical operation ends with [`Catalog::commit`].

pub mod models;
pub mod queries;
pub mod schema;
pub mod session;

pub use models::*;
pub use session::{Session, StatementError};

use crate::error::{CampaignError, Result};
use rusqlite::{Connection, OptionalExtension, Params, Row};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// How to open a catalog file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenOptions {
    /// Create a new catalog; the file must not exist yet
    pub create: bool,
    /// Wipe an existing catalog and recreate the empty schema
    pub truncate: bool,
}

pub struct Catalog {
    conn: Connection,
    path: Option<PathBuf>,
    session: Session,
}

impl Catalog {
    pub fn open_with(path: impl AsRef<Path>, options: OpenOptions, session: Session) -> Result<Self> {
        let path = path.as_ref();
        let exists = path.exists();
        let shown = path.display().to_string();

        if options.create && exists && !options.truncate {
            return Err(CampaignError::CatalogExists(shown.clone()));
        }
        if !options.create && !exists {
            return Err(CampaignError::CatalogNotFound(shown.clone()));
        }

        let conn = Connection::open(path)?;
        let mut catalog = Self {
            conn,
            path: Some(path.to_path_buf()),
            session,
        };

        if options.create && !exists {
            info!(catalog = %shown, "Create new archive");
            schema::init_schema(&catalog.conn, catalog.now())?;
        } else if options.truncate {
            catalog.truncate()?;
        }
        debug!(catalog = %shown, "Catalog opened");
        Ok(catalog)
    }

    /// Create a new catalog file
    pub fn create(path: impl AsRef<Path>, session: Session) -> Result<Self> {
        Self::open_with(
            path,
            OpenOptions {
                create: true,
                truncate: false,
            },
            session,
        )
    }

    /// Open an existing catalog file
    pub fn open(path: impl AsRef<Path>, session: Session) -> Result<Self> {
        Self::open_with(path, OpenOptions::default(), session)
    }

    /// Fresh catalog that lives only in memory
    pub fn in_memory(session: Session) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::init_schema(&conn, session.now())?;
        Ok(Self::from_connection(conn, session))
    }

    /// Wrap an already opened connection without touching its schema
    pub fn from_connection(conn: Connection, session: Session) -> Self {
        Self {
            conn,
            path: None,
            session,
        }
    }

    /// Drop all objects, reclaim space and recreate the empty schema
    pub fn truncate(&mut self) -> Result<()> {
        info!("Truncate archive");
        self.rollback();
        schema::drop_all(&self.conn)?;
        self.conn.execute_batch("VACUUM")?;
        schema::init_schema(&self.conn, self.now())?;
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Session timestamp used for all create/delete times
    pub fn now(&self) -> i64 {
        self.session.now()
    }

    fn record(&mut self, sql: &str, err: rusqlite::Error) {
        let error = StatementError::new(sql, &err);
        warn!(sql = %error.sql, error = %err, "SQL statement failed");
        self.session.record(error);
    }

    fn begin(&mut self) {
        if self.conn.is_autocommit() {
            if let Err(err) = self.conn.execute_batch("BEGIN") {
                self.record("BEGIN", err);
            }
        }
    }

    /// Run a write statement; returns the number of changed rows
    pub fn execute<P: Params>(&mut self, sql: &str, params: P) -> Option<usize> {
        self.begin();
        match self.conn.execute(sql, params) {
            Ok(changed) => Some(changed),
            Err(err) => {
                self.record(sql, err);
                None
            }
        }
    }

    /// Run a write statement with a `RETURNING` clause and map its first row
    pub fn write_one<T, P, F>(&mut self, sql: &str, params: P, f: F) -> Option<T>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.begin();
        self.query_one(sql, params, f)
    }

    /// First row of a query, `None` when there is no row or the query failed
    pub fn query_one<T, P, F>(&mut self, sql: &str, params: P, f: F) -> Option<T>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        match self.conn.query_row(sql, params, f).optional() {
            Ok(row) => row,
            Err(err) => {
                self.record(sql, err);
                None
            }
        }
    }

    /// All rows of a query; a failed query yields an empty list
    pub fn query_all<T, P, F>(&mut self, sql: &str, params: P, f: F) -> Vec<T>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        match collect_rows(&self.conn, sql, params, f) {
            Ok(rows) => rows,
            Err(err) => {
                self.record(sql, err);
                Vec::new()
            }
        }
    }

    /// Commit the open transaction, if any
    pub fn commit(&mut self) {
        if !self.conn.is_autocommit() {
            if let Err(err) = self.conn.execute_batch("COMMIT") {
                self.record("COMMIT", err);
            }
        }
    }

    /// Discard the open transaction, if any
    pub fn rollback(&mut self) {
        if !self.conn.is_autocommit() {
            if let Err(err) = self.conn.execute_batch("ROLLBACK") {
                self.record("ROLLBACK", err);
            }
        }
    }

    /// Commit and reclaim free pages
    pub fn compact(&mut self) {
        self.commit();
        if let Err(err) = self.conn.execute_batch("VACUUM") {
            self.record("VACUUM", err);
        }
    }

    /// Schema version stored in the info row
    pub fn version(&mut self) -> Option<String> {
        self.query_one(
            "SELECT version FROM info WHERE id = ?1",
            [schema::CATALOG_ID],
            |row| row.get(0),
        )
    }

    /// Dataset identifiers, usable as cache key prefixes
    pub fn dataset_identifiers(&mut self, include_deleted: bool) -> Vec<String> {
        let sql = if include_deleted {
            "SELECT uuid FROM dataset ORDER BY rowid"
        } else {
            "SELECT uuid FROM dataset WHERE deltime = 0 ORDER BY rowid"
        };
        self.query_all(sql, [], |row| row.get(0))
    }

    /// End the session. Uncommitted changes are discarded; the statement
    /// errors collected during the session are returned.
    pub fn close(mut self) -> Vec<StatementError> {
        if !self.conn.is_autocommit() {
            warn!("Discarding uncommitted changes");
            self.rollback();
        }
        let mut errors = self.session.take_errors();
        if let Err((_, err)) = self.conn.close() {
            errors.push(StatementError::new("CLOSE", &err));
        }
        errors
    }
}

fn collect_rows<T, P, F>(conn: &Connection, sql: &str, params: P, f: F) -> rusqlite::Result<Vec<T>>
where
    P: Params,
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, f)?;
    rows.collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_statement_is_recorded() {
        let mut catalog = Catalog::in_memory(Session::at(5)).unwrap();
        assert!(catalog.execute("INSERT INTO nowhere VALUES (1)", []).is_none());
        assert_eq!(catalog.session().error_count(), 1);

        // later statements still run
        assert_eq!(
            catalog.execute("INSERT INTO key (keyid) VALUES ('k1')", []),
            Some(1)
        );
        catalog.commit();
        let keys: Vec<String> = catalog.query_all("SELECT keyid FROM key", [], |row| row.get(0));
        assert_eq!(keys, vec!["k1".to_string()]);
    }

    #[test]
    fn test_query_one_no_rows_is_not_an_error() {
        let mut catalog = Catalog::in_memory(Session::at(5)).unwrap();
        let row: Option<i64> =
            catalog.query_one("SELECT rowid FROM dataset WHERE name = ?1", ["x"], |row| {
                row.get(0)
            });
        assert!(row.is_none());
        assert_eq!(catalog.session().error_count(), 0);
    }

    #[test]
    fn test_uncommitted_changes_visible_then_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.aca");
        let mut catalog = Catalog::create(&path, Session::at(1)).unwrap();
        catalog.execute("INSERT INTO key (keyid) VALUES ('pending')", []);
        let count: Option<i64> = catalog.query_one("SELECT count(*) FROM key", [], |r| r.get(0));
        assert_eq!(count, Some(1));
        assert!(catalog.close().is_empty());

        let mut reopened = Catalog::open(&path, Session::at(2)).unwrap();
        let count: Option<i64> = reopened.query_one("SELECT count(*) FROM key", [], |r| r.get(0));
        assert_eq!(count, Some(0));
    }

    #[test]
    fn test_create_and_open_modes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modes.aca");

        assert!(matches!(
            Catalog::open(&path, Session::at(1)),
            Err(CampaignError::CatalogNotFound(_))
        ));
        let catalog = Catalog::create(&path, Session::at(1)).unwrap();
        catalog.close();
        assert!(matches!(
            Catalog::create(&path, Session::at(1)),
            Err(CampaignError::CatalogExists(_))
        ));

        let mut opened = Catalog::open(&path, Session::at(1)).unwrap();
        assert_eq!(opened.version().as_deref(), Some(schema::CATALOG_VERSION));
    }

    #[test]
    fn test_truncate_recreates_empty_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wipe.aca");
        let mut catalog = Catalog::create(&path, Session::at(1)).unwrap();
        catalog.execute("INSERT INTO key (keyid) VALUES ('old')", []);
        catalog.commit();
        catalog.close();

        let options = OpenOptions {
            create: true,
            truncate: true,
        };
        let mut wiped = Catalog::open_with(&path, options, Session::at(9)).unwrap();
        let keys: Vec<String> = wiped.query_all("SELECT keyid FROM key", [], |r| r.get(0));
        assert!(keys.is_empty());
        let created: Option<i64> = wiped.query_one("SELECT modtime FROM info", [], |r| r.get(0));
        assert_eq!(created, Some(9));
    }

    #[test]
    fn test_dataset_identifiers() {
        let mut catalog = Catalog::in_memory(Session::at(1)).unwrap();
        catalog.execute(
            "INSERT INTO dataset (name, uuid, modtime, deltime, fileformat, tsid, tsorder) \
             VALUES ('a', 'u1', 0, 0, 'TEXT', 0, 0), ('b', 'u2', 0, 7, 'TEXT', 0, 0)",
            [],
        );
        catalog.commit();
        assert_eq!(catalog.dataset_identifiers(false), vec!["u1".to_string()]);
        assert_eq!(catalog.dataset_identifiers(true).len(), 2);
    }
}
