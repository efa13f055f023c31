//! Source format probes and external content producers

use crate::error::{CampaignError, Result};
use anyhow::{anyhow, Context};
use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Superblock signature of an HDF5 file
pub const HDF5_SIGNATURE: [u8; 8] = *b"\x89HDF\r\n\x1a\n";

/// An ADIOS dataset is a directory holding both `md.idx` and `data.0`
pub fn is_adios_dataset(path: &Path) -> bool {
    path.is_dir() && path.join("md.idx").exists() && path.join("data.0").exists()
}

/// Look for the HDF5 signature at offset 0, 512, 1024, 2048, ...
pub fn is_hdf5_file(path: &Path) -> bool {
    let Ok(mut file) = File::open(path) else {
        return false;
    };
    let len = file.metadata().map(|m| m.len()).unwrap_or(0);
    let mut offset = 0u64;
    let mut magic = [0u8; 8];
    while offset + HDF5_SIGNATURE.len() as u64 <= len {
        if file.seek(SeekFrom::Start(offset)).is_err() || file.read_exact(&mut magic).is_err() {
            return false;
        }
        if magic == HDF5_SIGNATURE {
            return true;
        }
        offset = if offset == 0 { 512 } else { offset * 2 };
    }
    false
}

// ============================================================================
// Metadata stripping
// ============================================================================

/// Produces a copy of a tabular file without its bulk data
pub trait MetadataStripper {
    fn strip(&self, source: &Path) -> Result<Vec<u8>>;
}

/// Runs `<program> <source> <output>` and reads back the output file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandStripper {
    program: Option<String>,
}

impl CommandStripper {
    pub fn new(program: Option<String>) -> Self {
        Self { program }
    }
}

impl MetadataStripper for CommandStripper {
    fn strip(&self, source: &Path) -> Result<Vec<u8>> {
        let program = self.program.as_deref().ok_or_else(|| {
            CampaignError::invalid_argument(
                "No HDF5 metadata stripper configured (set HPC_CAMPAIGN_HDF5_STRIPPER)",
            )
        })?;
        let scratch = tempfile::tempdir()?;
        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dataset".to_string());
        let output = scratch.path().join(format!("md_{}", file_name));

        debug!(program, source = %source.display(), "Stripping HDF5 data");
        let status = Command::new(program)
            .arg(source)
            .arg(&output)
            .status()
            .with_context(|| format!("Failed to run {}", program))?;
        if !status.success() {
            return Err(anyhow!("{} failed on {}: {}", program, source.display(), status).into());
        }
        Ok(std::fs::read(&output)?)
    }
}

// ============================================================================
// Images
// ============================================================================

/// An encoded, resized copy of an image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

pub trait ImageProcessor {
    /// Width and height in pixels
    fn dimensions(&self, path: &Path) -> Result<(u32, u32)>;

    /// Resize to fit within `max_width` x `max_height`, keeping the aspect
    /// ratio, encoded in the source's format
    fn thumbnail(&self, path: &Path, max_width: u32, max_height: u32) -> Result<Thumbnail>;
}

/// [`ImageProcessor`] backed by the `image` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCrateProcessor;

impl ImageProcessor for ImageCrateProcessor {
    fn dimensions(&self, path: &Path) -> Result<(u32, u32)> {
        let dims = image::image_dimensions(path)
            .with_context(|| format!("Cannot read image {}", path.display()))?;
        Ok(dims)
    }

    fn thumbnail(&self, path: &Path, max_width: u32, max_height: u32) -> Result<Thumbnail> {
        let format = image::ImageFormat::from_path(path)
            .with_context(|| format!("Unknown image format: {}", path.display()))?;
        let img = image::open(path).with_context(|| format!("Cannot open image {}", path.display()))?;
        let thumb = img.thumbnail(max_width, max_height);

        let mut data = Vec::new();
        thumb
            .write_to(&mut Cursor::new(&mut data), format)
            .context("Failed to encode thumbnail")?;
        Ok(Thumbnail {
            width: thumb.width(),
            height: thumb.height(),
            data,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_adios_probe() {
        let dir = tempfile::tempdir().unwrap();
        let ds = dir.path().join("run.bp");
        std::fs::create_dir(&ds).unwrap();
        std::fs::write(ds.join("md.idx"), b"idx").unwrap();
        assert!(!is_adios_dataset(&ds));
        std::fs::write(ds.join("data.0"), b"data").unwrap();
        assert!(is_adios_dataset(&ds));
        assert!(!is_adios_dataset(&ds.join("md.idx")));
    }

    #[test]
    fn test_hdf5_probe_offsets() {
        let dir = tempfile::tempdir().unwrap();

        let at_zero = dir.path().join("a.h5");
        let mut bytes = HDF5_SIGNATURE.to_vec();
        bytes.extend_from_slice(&[0u8; 64]);
        std::fs::write(&at_zero, &bytes).unwrap();
        assert!(is_hdf5_file(&at_zero));

        let with_userblock = dir.path().join("b.h5");
        let mut file = File::create(&with_userblock).unwrap();
        file.write_all(&[0u8; 1024]).unwrap();
        file.write_all(&HDF5_SIGNATURE).unwrap();
        file.write_all(&[0u8; 16]).unwrap();
        drop(file);
        assert!(is_hdf5_file(&with_userblock));

        let misplaced = dir.path().join("c.h5");
        let mut bytes = vec![0u8; 700];
        bytes[100..108].copy_from_slice(&HDF5_SIGNATURE);
        std::fs::write(&misplaced, &bytes).unwrap();
        assert!(!is_hdf5_file(&misplaced));

        assert!(!is_hdf5_file(&dir.path().join("missing.h5")));
    }

    #[test]
    fn test_unconfigured_stripper_fails() {
        let stripper = CommandStripper::default();
        let err = stripper.strip(Path::new("x.h5")).unwrap_err();
        assert!(err.to_string().contains("HPC_CAMPAIGN_HDF5_STRIPPER"));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_stripper_runs_program() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("data.h5");
        std::fs::write(&source, b"skeleton").unwrap();
        let stripper = CommandStripper::new(Some("cp".to_string()));
        assert_eq!(stripper.strip(&source).unwrap(), b"skeleton");
    }

    #[cfg(unix)]
    #[test]
    fn test_command_stripper_reports_failed_program() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("data.h5");
        std::fs::write(&source, b"skeleton").unwrap();
        let stripper = CommandStripper::new(Some("false".to_string()));
        let err = stripper.strip(&source).unwrap_err();
        assert!(err.to_string().contains("false failed on"));
    }

    #[test]
    fn test_image_crate_processor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("field.png");
        image::RgbImage::new(64, 32).save(&path).unwrap();

        let processor = ImageCrateProcessor;
        assert_eq!(processor.dimensions(&path).unwrap(), (64, 32));
        let thumb = processor.thumbnail(&path, 16, 16).unwrap();
        assert_eq!((thumb.width, thumb.height), (16, 8));
        assert_eq!(image::load_from_memory(&thumb.data).unwrap().width(), 16);
    }
}
