//! Images with their resolution, optionally embedded or thumbnailed

use super::embed::embed_file;
use super::{register_source, stat, Collaborators, EntryOutcome, HostContext};
use crate::catalog::queries::NewReplica;
use crate::catalog::Catalog;
use crate::error::Result;
use campaign_common::compression::Compressed;
use campaign_common::FileFormat;
use std::path::Path;
use tracing::info;

/// Sub-root under which thumbnail replicas are recorded
pub const THUMBNAIL_ROOT: &str = "thumbnails";

pub(super) fn ingest_image(
    catalog: &mut Catalog,
    host: &HostContext,
    entry: &str,
    name: &str,
    store: bool,
    thumbnail: Option<(u32, u32)>,
    tools: Collaborators<'_>,
) -> Result<Option<EntryOutcome>> {
    let path = Path::new(entry);
    let (mtime, size) = stat(entry)?;
    let (width, height) = tools.images.dimensions(path)?;
    let suffix = image_suffix(path);

    let stored = if store {
        Some(Compressed::stored(std::fs::read(path)?))
    } else {
        None
    };
    let thumb = match (store, thumbnail) {
        (false, Some((max_w, max_h))) => Some(tools.images.thumbnail(path, max_w, max_h)?),
        _ => None,
    };

    let (dataset_id, replica_id) =
        register_source(catalog, host, entry, name, FileFormat::Image, mtime, size);
    catalog.upsert_resolution(replica_id, i64::from(width), i64::from(height));

    let mut outcome = EntryOutcome {
        dataset_id,
        replicas: vec![replica_id],
        files: 0,
    };

    if let Some(payload) = stored {
        let recorded = resolution_name(width, height, &suffix);
        info!(image = %entry, file = %recorded, "Storing the image in the archive");
        embed_file(catalog, replica_id, &recorded, mtime, payload)?;
        outcome.files += 1;
    }

    if let Some(thumb) = thumb {
        let now = catalog.now();
        let recorded = resolution_name(thumb.width, thumb.height, &suffix);
        info!(image = %entry, file = %recorded, "Adding thumbnail replica");
        let thumb_replica = catalog.upsert_replica(&NewReplica {
            dataset_id,
            host_id: host.host_id,
            dir_id: host.dir_id,
            archive_id: 0,
            name: thumbnail_entry(entry),
            modtime: now,
            key_id: host.key_id,
            size: thumb.data.len() as i64,
        });
        embed_file(catalog, thumb_replica, &recorded, now, Compressed::stored(thumb.data))?;
        catalog.upsert_resolution(thumb_replica, i64::from(thumb.width), i64::from(thumb.height));
        outcome.replicas.push(thumb_replica);
        outcome.files += 1;
    }

    Ok(Some(outcome))
}

/// Replica name of a thumbnail, under [`THUMBNAIL_ROOT`] even for absolute entries
fn thumbnail_entry(entry: &str) -> String {
    format!("{}/{}", THUMBNAIL_ROOT, entry.trim_start_matches('/'))
}

/// File suffix including the dot, or empty
fn image_suffix(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

/// Recorded name of an embedded image, e.g. `1024x768.png`
fn resolution_name(width: u32, height: u32, suffix: &str) -> String {
    format!("{}x{}{}", width, height, suffix)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_name() {
        assert_eq!(resolution_name(1024, 768, ".png"), "1024x768.png");
        assert_eq!(image_suffix(Path::new("plots/t0.jpg")), ".jpg");
        assert_eq!(image_suffix(Path::new("noext")), "");
        assert_eq!(thumbnail_entry("plots/t0.jpg"), "thumbnails/plots/t0.jpg");
        assert_eq!(thumbnail_entry("/data/t0.jpg"), "thumbnails/data/t0.jpg");
    }
}
