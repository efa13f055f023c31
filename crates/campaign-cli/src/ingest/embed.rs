//! Embedding file payloads into a replica
//!
//! A replica owns its embedded files through `repfiles` links. Identical
//! files of the same dataset and key are stored once and shared.

use crate::catalog::Catalog;
use crate::error::Result;
use campaign_common::compression::Compressed;
use campaign_common::crypto::encrypt;
use rusqlite::params;
use tracing::debug;

/// What [`embed_file`] did with the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Embedded {
    /// A new file row was written and linked
    Inserted(i64),
    /// The replica's own copy was rewritten in place
    Updated(i64),
    /// An identical file already existed; only a link was added
    Linked(i64),
    /// The replica already links identical shared content
    Unchanged(i64),
}

impl Embedded {
    /// 0 when the write failed
    pub fn file_id(self) -> i64 {
        match self {
            Self::Inserted(id) | Self::Updated(id) | Self::Linked(id) | Self::Unchanged(id) => id,
        }
    }
}

struct LinkedFile {
    id: i64,
    links: i64,
    checksum: String,
    len_orig: i64,
    len_compressed: i64,
}

/// Store `payload` under `name` as an embedded file of `replica_id`.
///
/// The payload is encrypted with the session key, if one is set.
pub fn embed_file(
    catalog: &mut Catalog,
    replica_id: i64,
    name: &str,
    modtime: i64,
    payload: Compressed,
) -> Result<Embedded> {
    let len_orig = payload.len_orig as i64;
    let len_compressed = payload.len_compressed as i64;
    let compression = payload.compression_flag();
    let checksum = payload.checksum.clone();
    let data = encrypt(payload.data, catalog.session().key())?;

    let existing = catalog.query_one(
        "SELECT file.fileid, \
         (SELECT count(*) FROM repfiles AS r WHERE r.fileid = file.fileid), \
         file.checksum, file.lenorig, file.lencompressed \
         FROM file JOIN repfiles ON file.fileid = repfiles.fileid \
         WHERE repfiles.replicaid = ?1 AND file.name = ?2",
        params![replica_id, name],
        |row| {
            Ok(LinkedFile {
                id: row.get(0)?,
                links: row.get(1)?,
                checksum: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                len_orig: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
                len_compressed: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
            })
        },
    );

    if let Some(file) = existing {
        if file.links <= 1 {
            catalog.execute(
                "UPDATE file SET compression = ?1, lenorig = ?2, lencompressed = ?3, \
                 modtime = ?4, checksum = ?5, data = ?6 WHERE fileid = ?7",
                params![compression, len_orig, len_compressed, modtime, checksum, data, file.id],
            );
            debug!(file = %name, replica_id, file_id = file.id, "Updated embedded file");
            return Ok(Embedded::Updated(file.id));
        }
        if file.checksum == checksum
            && file.len_orig == len_orig
            && file.len_compressed == len_compressed
        {
            return Ok(Embedded::Unchanged(file.id));
        }
        // Other replicas keep the old content.
        catalog.execute(
            "DELETE FROM repfiles WHERE replicaid = ?1 AND fileid = ?2",
            params![replica_id, file.id],
        );
    } else if let Some(file_id) = catalog.query_one(
        "SELECT file.fileid FROM file \
         JOIN repfiles ON file.fileid = repfiles.fileid \
         JOIN replica ON replica.rowid = repfiles.replicaid \
         WHERE replica.datasetid = (SELECT datasetid FROM replica WHERE rowid = ?1) \
         AND replica.keyid = (SELECT keyid FROM replica WHERE rowid = ?1) \
         AND file.name = ?2 AND file.checksum = ?3 \
         AND file.lenorig = ?4 AND file.lencompressed = ?5 \
         ORDER BY file.fileid LIMIT 1",
        params![replica_id, name, checksum, len_orig, len_compressed],
        |row| row.get::<_, i64>(0),
    ) {
        link_file(catalog, replica_id, file_id);
        debug!(file = %name, replica_id, file_id, "Linked identical embedded file");
        return Ok(Embedded::Linked(file_id));
    }

    let file_id = catalog
        .write_one(
            "INSERT INTO file (name, compression, lenorig, lencompressed, modtime, checksum, data) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) RETURNING fileid",
            params![name, compression, len_orig, len_compressed, modtime, checksum, data],
            |row| row.get(0),
        )
        .unwrap_or(0);
    if file_id > 0 {
        link_file(catalog, replica_id, file_id);
    }
    debug!(file = %name, replica_id, file_id, len_orig, len_compressed, "Embedded file");
    Ok(Embedded::Inserted(file_id))
}

/// Link an existing file to a replica; an existing link is kept
pub fn link_file(catalog: &mut Catalog, replica_id: i64, file_id: i64) {
    catalog.execute(
        "INSERT INTO repfiles (replicaid, fileid) VALUES (?1, ?2) \
         ON CONFLICT (replicaid, fileid) DO NOTHING",
        params![replica_id, file_id],
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::catalog::queries::NewReplica;
    use crate::catalog::Session;
    use campaign_common::compression::{compress_bytes, decompress};
    use campaign_common::crypto::{decrypt, EncryptionKey};
    use campaign_common::FileFormat;

    fn replica(catalog: &mut Catalog, dataset_id: i64, name: &str) -> i64 {
        catalog.upsert_replica(&NewReplica {
            dataset_id,
            host_id: 1,
            dir_id: 1,
            archive_id: 0,
            name: name.into(),
            modtime: 1,
            key_id: 0,
            size: 1,
        })
    }

    fn file_count(catalog: &mut Catalog) -> i64 {
        catalog
            .query_one("SELECT count(*) FROM file", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_embed_then_update_in_place() {
        let mut catalog = Catalog::in_memory(Session::at(1)).unwrap();
        let ds = catalog.upsert_dataset("run", "u", FileFormat::Adios, 1);
        let rep = replica(&mut catalog, ds, "run.bp");

        let first = embed_file(&mut catalog, rep, "md.idx", 5, compress_bytes(b"v1").unwrap()).unwrap();
        assert!(matches!(first, Embedded::Inserted(_)));
        let second = embed_file(&mut catalog, rep, "md.idx", 6, compress_bytes(b"v2").unwrap()).unwrap();
        assert_eq!(second, Embedded::Updated(first.file_id()));
        assert_eq!(file_count(&mut catalog), 1);

        let data: Vec<u8> = catalog
            .query_one("SELECT data FROM file", [], |r| r.get(0))
            .unwrap();
        assert_eq!(decompress(&data).unwrap(), b"v2");
    }

    #[test]
    fn test_identical_file_shared_within_dataset() {
        let mut catalog = Catalog::in_memory(Session::at(1)).unwrap();
        let ds = catalog.upsert_dataset("run", "u", FileFormat::Adios, 1);
        let a = replica(&mut catalog, ds, "a/run.bp");
        let b = replica(&mut catalog, ds, "b/run.bp");

        let first = embed_file(&mut catalog, a, "md.0", 5, compress_bytes(b"same").unwrap()).unwrap();
        let second = embed_file(&mut catalog, b, "md.0", 5, compress_bytes(b"same").unwrap()).unwrap();
        assert_eq!(second, Embedded::Linked(first.file_id()));
        assert_eq!(file_count(&mut catalog), 1);

        // rewriting a shared file detaches the writer from it
        let third = embed_file(&mut catalog, b, "md.0", 7, compress_bytes(b"new").unwrap()).unwrap();
        assert!(matches!(third, Embedded::Inserted(id) if id != first.file_id()));
        assert_eq!(file_count(&mut catalog), 2);
        let links_a: i64 = catalog
            .query_one("SELECT count(*) FROM repfiles WHERE replicaid = ?1", [a], |r| r.get(0))
            .unwrap();
        assert_eq!(links_a, 1);
    }

    #[test]
    fn test_other_dataset_gets_own_copy() {
        let mut catalog = Catalog::in_memory(Session::at(1)).unwrap();
        let ds1 = catalog.upsert_dataset("one", "u1", FileFormat::Text, 1);
        let ds2 = catalog.upsert_dataset("two", "u2", FileFormat::Text, 1);
        let a = replica(&mut catalog, ds1, "one.txt");
        let b = replica(&mut catalog, ds2, "two.txt");
        embed_file(&mut catalog, a, "readme", 1, compress_bytes(b"hi").unwrap()).unwrap();
        let other = embed_file(&mut catalog, b, "readme", 1, compress_bytes(b"hi").unwrap()).unwrap();
        assert!(matches!(other, Embedded::Inserted(_)));
        assert_eq!(file_count(&mut catalog), 2);
    }

    #[test]
    fn test_embedded_payload_is_encrypted_with_session_key() {
        let key = EncryptionKey::new("team", [3u8; 32]);
        let session = Session::at(1).with_key(Some(key.clone()));
        let mut catalog = Catalog::in_memory(session).unwrap();
        let ds = catalog.upsert_dataset("img", "u", FileFormat::Image, 1);
        let rep = replica(&mut catalog, ds, "img.png");

        embed_file(&mut catalog, rep, "4x4.png", 1, Compressed::stored(b"pixels".to_vec())).unwrap();
        let (data, compression, len): (Vec<u8>, i64, i64) = catalog
            .query_one("SELECT data, compression, lenorig FROM file", [], |r| {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?))
            })
            .unwrap();
        assert_eq!(compression, 0);
        assert_eq!(len, 6);
        assert_ne!(data, b"pixels");
        assert_eq!(decrypt(&data, Some(&key)).unwrap(), b"pixels");
    }
}
