use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::index::{SearchIndex, INDEX_VERSION};

/// Serialize the whole index (documents, terms, metadata) into one blob.
/// Write failures surface as `Err` so the caller can retry or alert.
pub fn write_index<W: Write>(index: &SearchIndex, mut sink: W) -> Result<()> {
    let bytes = bincode::serialize(index).context("serialize index")?;
    sink.write_all(&bytes).context("write index blob")?;
    sink.flush().context("flush index blob")?;
    Ok(())
}

pub fn save_index(index: &SearchIndex, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        }
    }
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    write_index(index, BufWriter::new(file))
}

/// Deserialize an index blob. Fails soft: unreadable bytes, a truncated
/// blob, or a version mismatch all log a warning and yield a fresh empty
/// index instead of an error.
pub fn read_index<R: Read>(mut source: R) -> SearchIndex {
    let mut buf = Vec::new();
    if let Err(err) = source.read_to_end(&mut buf) {
        tracing::warn!(%err, "unreadable index blob, starting empty");
        return SearchIndex::new();
    }
    match bincode::deserialize::<SearchIndex>(&buf) {
        Ok(index) if index.metadata().version == INDEX_VERSION => index,
        Ok(index) => {
            tracing::warn!(
                found = index.metadata().version,
                expected = INDEX_VERSION,
                "index version mismatch, starting empty"
            );
            SearchIndex::new()
        }
        Err(err) => {
            tracing::warn!(%err, "corrupt index blob, starting empty");
            SearchIndex::new()
        }
    }
}

pub fn load_index(path: &Path) -> SearchIndex {
    match File::open(path) {
        Ok(file) => read_index(BufReader::new(file)),
        Err(err) => {
            tracing::warn!(path = %path.display(), %err, "no index blob, starting empty");
            SearchIndex::new()
        }
    }
}
