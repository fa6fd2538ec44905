//! File-system helpers for extraction output.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::Result;

/// Round `value` up to the next multiple of `align`.
///
/// `align == 0` is treated as no alignment.
#[inline]
pub fn round_up(value: u64, align: u64) -> u64 {
    if align == 0 || value % align == 0 {
        value
    } else {
        (value / align + 1) * align
    }
}

/// Replace characters that are not safe in file names with `_`.
///
/// Cue names occasionally contain path separators or control characters.
pub fn clean_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if (c as u32) < 0x20 => '_',
            c => c,
        })
        .collect()
}

/// Return a path that does not collide with an existing file.
///
/// On collision a zero-padded numeric suffix is inserted before the
/// extension: `name.adx` becomes `name_0000.adx`, `name_0001.adx`, ...
pub fn unique_output_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());
    let parent = path.parent().unwrap_or_else(|| Path::new(""));

    let mut index = 0u32;
    loop {
        let candidate = match &ext {
            Some(ext) => parent.join(format!("{stem}_{index:04}.{ext}")),
            None => parent.join(format!("{stem}_{index:04}")),
        };

        if !candidate.exists() {
            return candidate;
        }
        index += 1;
    }
}

/// Write a byte range to `dest`, creating parent directories as needed.
///
/// Returns the path actually written, which differs from `dest` when a
/// collision was deduplicated.
pub fn write_chunk(bytes: &[u8], dest: &Path) -> Result<PathBuf> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    let dest = unique_output_path(dest);
    let mut file = fs::File::create(&dest)?;
    file.write_all(bytes)?;

    Ok(dest)
}
