//! Shared fixtures for campaign-cli integration tests
//!
//! A [`Fixture`] owns a scratch directory holding source files and the
//! catalog under test. Collaborators that would call external programs are
//! replaced by in-process fakes.

#![allow(dead_code)]

use campaign_cli::catalog::{Catalog, Session};
use campaign_cli::ingest::{
    Collaborators, HostContext, HostIdentity, ImageProcessor, MetadataStripper,
    Thumbnail,
};
use campaign_cli::Result;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Session clock used by every fixture catalog
pub const SESSION_TIME: i64 = 1_700_000_000_000_000_000;

pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("Failed to create scratch directory"),
        }
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// Path as the string form ingestion takes
    pub fn entry(&self, rel: &str) -> String {
        self.path(rel).to_string_lossy().into_owned()
    }

    pub fn write(&self, rel: &str, contents: &[u8]) -> PathBuf {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(&path, contents).expect("Failed to write fixture file");
        path
    }

    /// Minimal ADIOS dataset directory: two metadata files, a profile and data
    pub fn adios_dataset(&self, rel: &str) -> PathBuf {
        self.write(&format!("{}/md.idx", rel), b"index");
        self.write(&format!("{}/md.0", rel), b"metadata block");
        self.write(&format!("{}/profiling.json", rel), b"{\"ranks\": 4}");
        self.write(&format!("{}/data.0", rel), &[7u8; 4096]);
        self.path(rel)
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.path("test.aca")
    }

    pub fn create_catalog(&self) -> Catalog {
        Catalog::create(self.catalog_path(), Session::at(SESSION_TIME))
            .expect("Failed to create catalog")
    }

    pub fn reopen(&self, at: i64) -> Catalog {
        Catalog::open(self.catalog_path(), Session::at(at)).expect("Failed to open catalog")
    }

    /// Register the test host with the scratch directory as its root
    pub fn host(&self, catalog: &mut Catalog) -> HostContext {
        let identity = test_identity();
        let root = self.dir.path().to_string_lossy().into_owned();
        let host_id = catalog.add_host(&identity.short_name, &identity.long_name, "");
        let dir_id = catalog.add_directory(host_id, &root);
        catalog.commit();
        HostContext {
            host_id,
            dir_id,
            key_id: 0,
            long_host: identity.long_name,
            root,
            remote: None,
        }
    }
}

pub fn test_identity() -> HostIdentity {
    HostIdentity {
        short_name: "testhost".to_string(),
        long_name: "testhost.example.org".to_string(),
        remote: None,
    }
}

/// Stripper producing a fixed skeleton
pub struct FakeStripper;

impl MetadataStripper for FakeStripper {
    fn strip(&self, _source: &Path) -> Result<Vec<u8>> {
        Ok(b"stripped hdf5 skeleton".to_vec())
    }
}

/// Image processor reporting 640x480 and producing a tiny thumbnail
pub struct FakeImages;

impl ImageProcessor for FakeImages {
    fn dimensions(&self, _path: &Path) -> Result<(u32, u32)> {
        Ok((640, 480))
    }

    fn thumbnail(&self, _path: &Path, max_width: u32, max_height: u32) -> Result<Thumbnail> {
        Ok(Thumbnail {
            width: max_width.min(64),
            height: max_height.min(48),
            data: b"thumb".to_vec(),
        })
    }
}

pub fn fakes() -> Collaborators<'static> {
    static STRIPPER: FakeStripper = FakeStripper;
    static IMAGES: FakeImages = FakeImages;
    Collaborators {
        stripper: &STRIPPER,
        images: &IMAGES,
    }
}

pub fn count(catalog: &mut Catalog, table: &str) -> i64 {
    catalog
        .query_one(&format!("SELECT count(*) FROM {}", table), [], |row| row.get(0))
        .unwrap_or(-1)
}
