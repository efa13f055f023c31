//! Catalog table definitions
//!
//! Table and column names are part of the on-disk format shared with other
//! campaign archive readers and must not change.

use rusqlite::{params, Connection};

/// Value of `info.id`
pub const CATALOG_ID: &str = "ACA";

/// Value of `info.name`
pub const CATALOG_NAME: &str = "ADIOS Campaign Archive";

/// Schema version written by [`init_schema`]
pub const CATALOG_VERSION: &str = "0.7";

pub const INFO_COLUMNS: &str = "(id TEXT, name TEXT, version TEXT, modtime INT)";
pub const KEY_COLUMNS: &str = "(keyid TEXT PRIMARY KEY)";
pub const HOST_COLUMNS: &str =
    "(hostname TEXT PRIMARY KEY, longhostname TEXT, modtime INT, deltime INT, default_protocol TEXT)";
pub const DIRECTORY_COLUMNS: &str =
    "(hostid INT, name TEXT, modtime INT, deltime INT, PRIMARY KEY (hostid, name))";
pub const TIMESERIES_COLUMNS: &str = "(tsid INTEGER PRIMARY KEY, name TEXT UNIQUE)";
pub const DATASET_COLUMNS: &str = "(name TEXT, uuid TEXT, modtime INT, deltime INT, fileformat TEXT, \
     tsid INT, tsorder INT, PRIMARY KEY (name))";
pub const REPLICA_COLUMNS: &str = "(datasetid INT, hostid INT, dirid INT, archiveid INT, name TEXT, \
     modtime INT, deltime INT, keyid INT, size INT, \
     PRIMARY KEY (datasetid, hostid, dirid, archiveid, name))";
pub const FILE_COLUMNS: &str = "(fileid INTEGER PRIMARY KEY, name TEXT, compression INT, lenorig INT, \
     lencompressed INT, modtime INT, checksum TEXT, data BLOB)";
pub const REPFILES_COLUMNS: &str = "(replicaid INT, fileid INT, PRIMARY KEY (replicaid, fileid))";
pub const ACCURACY_COLUMNS: &str =
    "(replicaid INT, accuracy REAL, norm REAL, relative INT, PRIMARY KEY (replicaid))";
pub const RESOLUTION_COLUMNS: &str = "(replicaid INT, x INT, y INT, PRIMARY KEY (replicaid))";
pub const ARCHIVE_COLUMNS: &str =
    "(dirid INT, tarname TEXT, system TEXT, notes BLOB, PRIMARY KEY (dirid, tarname))";
pub const ARCHIVEIDX_COLUMNS: &str = "(archiveid INT, replicaid INT, filename TEXT, offset INT, \
     offset_data INT, size INT, PRIMARY KEY (archiveid, replicaid, filename))";

/// Every catalog table with its column definition, in creation order
pub const TABLES: &[(&str, &str)] = &[
    ("info", INFO_COLUMNS),
    ("key", KEY_COLUMNS),
    ("host", HOST_COLUMNS),
    ("directory", DIRECTORY_COLUMNS),
    ("timeseries", TIMESERIES_COLUMNS),
    ("dataset", DATASET_COLUMNS),
    ("replica", REPLICA_COLUMNS),
    ("file", FILE_COLUMNS),
    ("repfiles", REPFILES_COLUMNS),
    ("accuracy", ACCURACY_COLUMNS),
    ("resolution", RESOLUTION_COLUMNS),
    ("archive", ARCHIVE_COLUMNS),
    ("archiveidx", ARCHIVEIDX_COLUMNS),
];

/// `CREATE TABLE` statement for a table under a (possibly temporary) name
pub fn create_table_sql(name: &str, columns: &str) -> String {
    format!("CREATE TABLE {} {}", name, columns)
}

/// Create the full table set and the singleton info row
pub fn init_schema(conn: &Connection, created: i64) -> rusqlite::Result<()> {
    let tx = conn.unchecked_transaction()?;
    for (name, columns) in TABLES {
        tx.execute(&create_table_sql(name, columns), [])?;
    }
    tx.execute(
        "INSERT INTO info (id, name, version, modtime) VALUES (?1, ?2, ?3, ?4)",
        params![CATALOG_ID, CATALOG_NAME, CATALOG_VERSION, created],
    )?;
    tx.commit()
}

/// Drop every user object (tables, indexes, views, triggers)
pub fn drop_all(conn: &Connection) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare(
        "SELECT type, name FROM sqlite_master \
         WHERE name NOT LIKE 'sqlite_%' AND type IN ('table', 'view', 'trigger', 'index')",
    )?;
    let objects = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    drop(stmt);

    let tx = conn.unchecked_transaction()?;
    for (kind, name) in objects.iter().filter(|(kind, _)| kind == "table") {
        tx.execute(&format!("DROP {} IF EXISTS \"{}\"", kind.to_uppercase(), name), [])?;
    }
    // Indexes and triggers of dropped tables are gone already.
    for (kind, name) in objects.iter().filter(|(kind, _)| kind != "table") {
        tx.execute(&format!("DROP {} IF EXISTS \"{}\"", kind.to_uppercase(), name), [])?;
    }
    tx.commit()
}
