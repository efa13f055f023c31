use super::embed::embed_file;
use super::{file_name, register_source, stat, EntryOutcome, HostContext};
use crate::catalog::Catalog;
use crate::error::Result;
use campaign_common::compression::compress_file;
use campaign_common::FileFormat;

pub(super) fn ingest_text(
    catalog: &mut Catalog,
    host: &HostContext,
    entry: &str,
    name: &str,
    store: bool,
) -> Result<Option<EntryOutcome>> {
    let (mtime, size) = stat(entry)?;
    // An unreadable file leaves no rows behind.
    let payload = if store { Some(compress_file(entry)?) } else { None };

    let (dataset_id, replica_id) =
        register_source(catalog, host, entry, name, FileFormat::Text, mtime, size);
    let mut files = 0;
    if let Some(payload) = payload {
        embed_file(catalog, replica_id, &file_name(entry), mtime, payload)?;
        files = 1;
    }

    Ok(Some(EntryOutcome {
        dataset_id,
        replicas: vec![replica_id],
        files,
    }))
}
