//! Locate statement exports in an input directory.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// All `*.qfx` / `*.QFX` files directly inside `dir`, sorted by path.
pub fn find_qfx_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let is_qfx = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == "qfx" || e == "QFX");
        if is_qfx {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}
