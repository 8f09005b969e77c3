//! File discovery for batch cuts.
//!
//! Finds video files by extension in the top level of a directory, and
//! expands a mixed list of files and directories into an ordered input list.

use crate::error::{CoreError, CoreResult};
use crate::utils::is_valid_video_file;

use std::path::{Path, PathBuf};

/// Extensions accepted as cut inputs, compared case-insensitively.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "webm", "flv", "wmv", "m4v"];

/// Finds video files in the top level of `input_dir`, sorted by path.
///
/// Subdirectories are not searched.
///
/// # Returns
///
/// * `Ok(Vec<PathBuf>)` - The discovered files
/// * `Err(CoreError::Io)` - If the directory cannot be read
/// * `Err(CoreError::NoFilesFound)` - If no video files are present
///
/// # Examples
///
/// ```rust,no_run
/// use intercut_core::find_processable_files;
/// use std::path::Path;
///
/// let files = find_processable_files(Path::new("/path/to/videos")).unwrap();
/// println!("Found {} video files", files.len());
/// ```
pub fn find_processable_files(input_dir: &Path) -> CoreResult<Vec<PathBuf>> {
    let read_dir = std::fs::read_dir(input_dir)?;
    let mut files: Vec<PathBuf> = read_dir
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| is_valid_video_file(path))
        .collect();

    if files.is_empty() {
        return Err(CoreError::NoFilesFound);
    }
    files.sort();
    Ok(files)
}

/// Expands files and directories into an ordered list of inputs.
///
/// Files keep their given order; each directory contributes its video files
/// in sorted order. Duplicate paths are dropped. Explicit files are accepted
/// whatever their extension.
pub fn collect_inputs(paths: &[PathBuf]) -> CoreResult<Vec<PathBuf>> {
    let mut inputs: Vec<PathBuf> = Vec::new();
    for path in paths {
        if path.is_dir() {
            match find_processable_files(path) {
                Ok(found) => inputs.extend(found),
                Err(CoreError::NoFilesFound) => {
                    log::warn!("No video files found in {}", path.display());
                }
                Err(e) => return Err(e),
            }
        } else if path.is_file() {
            inputs.push(path.clone());
        } else {
            return Err(CoreError::PathError(format!(
                "Input not found: {}",
                path.display()
            )));
        }
    }

    let mut seen = std::collections::HashSet::new();
    inputs.retain(|p| seen.insert(p.clone()));

    if inputs.is_empty() {
        Err(CoreError::NoFilesFound)
    } else {
        Ok(inputs)
    }
}
