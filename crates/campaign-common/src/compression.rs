//! zlib compression of embedded payloads
//!
//! Payloads are compressed as one zlib stream fed in fixed-size blocks. The
//! checksum always covers the original bytes, so stored and compressed files
//! carrying the same content report the same checksum.

use crate::error::{CommonError, Result};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use sha1::{Digest, Sha1};
use std::io::{Read, Write};
use std::path::Path;

/// Read block size used when streaming a source into the encoder
pub const COMPRESS_BLOCK_SIZE: usize = 16 * 1024 * 1024;

/// A payload ready to be written into the `file` table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compressed {
    /// Stored bytes (zlib stream, or the original bytes when not compressed)
    pub data: Vec<u8>,
    /// Length of the original content
    pub len_orig: u64,
    /// Length of `data` before any encryption
    pub len_compressed: u64,
    /// Hex SHA-1 of the original content
    pub checksum: String,
    /// Whether `data` is a zlib stream
    pub compressed: bool,
}

impl Compressed {
    /// Wrap content that is stored as-is (images, thumbnails)
    pub fn stored(data: Vec<u8>) -> Self {
        let len = data.len() as u64;
        let checksum = hex::encode(Sha1::digest(&data));
        Self {
            data,
            len_orig: len,
            len_compressed: len,
            checksum,
            compressed: false,
        }
    }

    /// Value of the `compression` column
    pub fn compression_flag(&self) -> i64 {
        i64::from(self.compressed)
    }
}

/// Compress an in-memory buffer
pub fn compress_bytes(data: &[u8]) -> Result<Compressed> {
    let mut cursor = std::io::Cursor::new(data);
    compress_reader(&mut cursor)
}

/// Compress a readable source block by block
pub fn compress_reader<R: Read>(reader: &mut R) -> Result<Compressed> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    let mut hasher = Sha1::new();
    let mut len_orig: u64 = 0;

    loop {
        let block = read_block(reader)?;
        if block.is_empty() {
            break;
        }
        hasher.update(&block);
        encoder.write_all(&block)?;
        len_orig += block.len() as u64;
    }

    let data = encoder.finish()?;
    Ok(Compressed {
        len_compressed: data.len() as u64,
        data,
        len_orig,
        checksum: hex::encode(hasher.finalize()),
        compressed: true,
    })
}

/// Read up to one block; a short block only happens at end of input
fn read_block<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut block = Vec::new();
    reader
        .by_ref()
        .take(COMPRESS_BLOCK_SIZE as u64)
        .read_to_end(&mut block)?;
    Ok(block)
}

/// Compress the content of a file on disk
pub fn compress_file(path: impl AsRef<Path>) -> Result<Compressed> {
    let mut file = std::fs::File::open(path)?;
    compress_reader(&mut file)
}

/// Inflate a zlib stream produced by [`compress_reader`]
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| CommonError::Decompression(e.to_string()))?;
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::checksum::checksum_bytes;
    use proptest::prelude::*;

    #[test]
    fn test_empty_buffer_round_trip() {
        let packed = compress_bytes(b"").unwrap();
        assert_eq!(packed.len_orig, 0);
        assert!(packed.len_compressed > 0);
        assert_eq!(packed.checksum, checksum_bytes(b""));
        assert!(decompress(&packed.data).unwrap().is_empty());
    }

    #[test]
    fn test_lengths_recorded() {
        let data = vec![7u8; 100_000];
        let packed = compress_bytes(&data).unwrap();
        assert_eq!(packed.len_orig, 100_000);
        assert_eq!(packed.len_compressed, packed.data.len() as u64);
        assert!(packed.len_compressed < packed.len_orig);
        assert_eq!(packed.compression_flag(), 1);
    }

    #[test]
    fn test_stored_payload() {
        let stored = Compressed::stored(b"\x89PNG".to_vec());
        assert_eq!(stored.len_orig, 4);
        assert_eq!(stored.len_compressed, 4);
        assert_eq!(stored.compression_flag(), 0);
        assert_eq!(stored.checksum, checksum_bytes(b"\x89PNG"));
    }

    #[test]
    fn test_compress_file_matches_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("md.0");
        std::fs::write(&path, b"metadata block").unwrap();
        let from_file = compress_file(&path).unwrap();
        let from_bytes = compress_bytes(b"metadata block").unwrap();
        assert_eq!(from_file.checksum, from_bytes.checksum);
        assert_eq!(decompress(&from_file.data).unwrap(), b"metadata block");
    }

    #[test]
    fn test_decompress_rejects_garbage() {
        assert!(matches!(
            decompress(b"not a zlib stream"),
            Err(CommonError::Decompression(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_round_trip(data in proptest::collection::vec(any::<u8>(), 0..4096)) {
            let packed = compress_bytes(&data).unwrap();
            prop_assert_eq!(decompress(&packed.data).unwrap(), data.clone());
            prop_assert_eq!(packed.checksum, checksum_bytes(&data));
        }
    }
}
