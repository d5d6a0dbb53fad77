pub mod logging;

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use uuid::Uuid;

/// Replace `path` with `contents` without ever exposing a half-written file.
///
/// Writes to a uniquely named sibling temp file and renames it over the
/// target. Concurrent writers race on the rename; the last one wins, but a
/// reader always sees a complete document.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("file");
    let tmp = path.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

    {
        let mut file = fs::File::create(&tmp)
            .with_context(|| format!("failed to create temp file {}", tmp.display()))?;
        file.write_all(contents.as_bytes())
            .with_context(|| format!("failed to write temp file {}", tmp.display()))?;
    }

    if let Err(err) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(err).with_context(|| format!("failed to replace {}", path.display()));
    }
    Ok(())
}
