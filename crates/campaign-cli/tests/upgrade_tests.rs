//! Upgrading an on-disk 0.5 archive to the latest version

mod common;

use campaign_cli::catalog::schema::{self, create_table_sql};
use campaign_cli::info::{collect_info, InfoOptions};
use campaign_cli::upgrade::{upgrade, UpgradeOutcome};
use common::{count, Fixture};
use rusqlite::Connection;

const V05_HOST: &str = "(hostname TEXT PRIMARY KEY, longhostname TEXT, modtime INT, deltime INT)";
const V05_REPLICA: &str = "(datasetid INT, hostid INT, dirid INT, name TEXT, modtime INT, \
     deltime INT, keyid INT, size INT, PRIMARY KEY (datasetid, hostid, dirid, name))";
const V05_FILE: &str = "(replicaid INT, name TEXT, compression INT, lenorig INT, \
     lencompressed INT, modtime INT, checksum TEXT, data BLOB, PRIMARY KEY (replicaid, name))";
const V05_ARCHIVE: &str = "(dirid INT, system TEXT, notes BLOB, PRIMARY KEY (dirid))";

fn write_v05_archive(fx: &Fixture) {
    let conn = Connection::open(fx.catalog_path()).unwrap();
    let tables = [
        ("info", schema::INFO_COLUMNS),
        ("key", schema::KEY_COLUMNS),
        ("host", V05_HOST),
        ("directory", schema::DIRECTORY_COLUMNS),
        ("timeseries", schema::TIMESERIES_COLUMNS),
        ("dataset", schema::DATASET_COLUMNS),
        ("replica", V05_REPLICA),
        ("file", V05_FILE),
        ("accuracy", schema::ACCURACY_COLUMNS),
        ("resolution", schema::RESOLUTION_COLUMNS),
        ("archive", V05_ARCHIVE),
    ];
    for (name, columns) in tables {
        conn.execute(&create_table_sql(name, columns), []).unwrap();
    }
    conn.execute_batch(
        "INSERT INTO info VALUES ('ACA', 'ADIOS Campaign Archive', '0.5', 1); \
         INSERT INTO host (rowid, hostname, longhostname, modtime, deltime) \
             VALUES (1, 'frontier', 'frontier.olcf.ornl.gov', 1, 0); \
         INSERT INTO directory (rowid, hostid, name, modtime, deltime) \
             VALUES (1, 1, '/lustre/proj', 1, 0), (2, 1, '/lustre/copy', 1, 0); \
         INSERT INTO dataset (rowid, name, uuid, modtime, deltime, fileformat, tsid, tsorder) \
             VALUES (1, 'heat.bp', 'u-heat', 1, 0, 'ADIOS', 0, 0); \
         INSERT INTO replica (rowid, datasetid, hostid, dirid, name, modtime, deltime, keyid, size) \
             VALUES (3, 1, 1, 1, 'heat.bp', 1, 0, 0, 100), (7, 1, 1, 2, 'heat.bp', 1, 0, 0, 100); \
         INSERT INTO file VALUES (3, 'md.idx', 0, 3, 3, 1, 'c1', x'010203'); \
         INSERT INTO file VALUES (7, 'md.idx', 0, 3, 3, 1, 'c1', x'010203'); \
         INSERT INTO file VALUES (7, 'md.0', 0, 2, 2, 1, 'c2', x'0405'); \
         INSERT INTO archive (rowid, dirid, system, notes) VALUES (1, 2, 'HPSS', NULL);",
    )
    .unwrap();
}

#[test]
fn test_upgrade_from_0_5_takes_two_runs() {
    let fx = Fixture::new();
    write_v05_archive(&fx);

    let mut catalog = fx.reopen(5);
    assert_eq!(
        upgrade(&mut catalog).unwrap(),
        UpgradeOutcome::Upgraded {
            from: "0.5".into(),
            to: "0.6".into()
        }
    );
    assert!(catalog.close().is_empty());

    let mut catalog = fx.reopen(6);
    assert_eq!(catalog.version().as_deref(), Some("0.6"));
    let archive = catalog.archive(1).unwrap();
    assert!(!archive.is_tar());
    assert_eq!(catalog.replica(7).unwrap().archive_id, 0);
    assert_eq!(
        upgrade(&mut catalog).unwrap(),
        UpgradeOutcome::Upgraded {
            from: "0.6".into(),
            to: "0.7".into()
        }
    );
    assert!(catalog.close().is_empty());

    let mut catalog = fx.reopen(7);
    assert_eq!(catalog.version().as_deref(), Some(schema::CATALOG_VERSION));
    assert_eq!(count(&mut catalog, "file"), 2);
    assert_eq!(count(&mut catalog, "repfiles"), 3);

    let options = InfoOptions {
        list_replicas: true,
        list_files: true,
        ..InfoOptions::default()
    };
    let info = collect_info(&mut catalog, options).unwrap();
    let replicas = &info.datasets[0].replicas;
    assert_eq!(replicas.len(), 2);
    assert_eq!(replicas[0].files.len(), 1);
    assert_eq!(replicas[1].files.len(), 2);

    assert!(matches!(
        upgrade(&mut catalog).unwrap(),
        UpgradeOutcome::Current(_)
    ));
    assert!(catalog.close().is_empty());
}
