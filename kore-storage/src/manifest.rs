//! # MANIFEST
//!
//! The manifest enumerates the active segment files, oldest first. Together
//! with the replayed WAL it reconstructs the complete durable state.
//!
//! Advancing it is crash-safe: write `MANIFEST.tmp`, force it, rename over
//! `MANIFEST`, then force the directory so the rename itself is durable.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use tracing::debug;

use kore_core::error::Result;

pub const MANIFEST_FILE: &str = "MANIFEST";
pub const MANIFEST_TMP_FILE: &str = "MANIFEST.tmp";

/// Read the segment file names listed by the manifest, oldest first.
/// `None` when no manifest exists (fresh directory or pre-manifest layout).
pub fn load(dir: &Path) -> Result<Option<Vec<String>>> {
    let path = dir.join(MANIFEST_FILE);
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let names = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    Ok(Some(names))
}

/// Atomically replace the manifest with `names` (oldest first).
pub fn save(dir: &Path, names: &[String]) -> Result<()> {
    let tmp = dir.join(MANIFEST_TMP_FILE);
    {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)?;
        let mut writer = std::io::BufWriter::new(file);
        for name in names {
            writeln!(writer, "{name}")?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }

    std::fs::rename(&tmp, dir.join(MANIFEST_FILE))?;
    File::open(dir)?.sync_all()?;

    debug!(segments = names.len(), "advanced MANIFEST");
    Ok(())
}
