//! Locating capture artifacts (frames, plots) on disk.
//!
//! The station software writes `ArchivedFiles/` and `CapturedFiles/` next to
//! the log directory, one dated subdirectory per night.  "Most recent" means
//! greatest mtime; an optional `YYYYMMDD` date narrows the candidates to
//! directory names containing it.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};

pub fn archive_root(log_dir: &Path) -> PathBuf {
    log_dir.join("..").join("ArchivedFiles")
}

pub fn capture_root(log_dir: &Path) -> PathBuf {
    log_dir.join("..").join("CapturedFiles")
}

/// Subdirectories of `root`, optionally restricted to names containing
/// `date`.  Missing root yields an empty list.
pub fn dated_dirs(root: &Path, date: Option<&str>) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(root) else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter(|e| e.path().is_dir())
        .filter(|e| match date {
            Some(date) => e.file_name().to_string_lossy().contains(date),
            None => true,
        })
        .map(|e| e.path())
        .collect()
}

/// The most recently modified night directory under `root`.
pub fn latest_dir(root: &Path, date: Option<&str>) -> Option<PathBuf> {
    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for dir in dated_dirs(root, date) {
        let Ok(modified) = fs::metadata(&dir).and_then(|m| m.modified()) else {
            continue;
        };
        if newest.as_ref().is_none_or(|(at, _)| modified > *at) {
            newest = Some((modified, dir));
        }
    }
    newest.map(|(_, dir)| dir)
}

/// Most recent captured frame: the lexicographically last `*.jpg` in the
/// night's capture directory.  With `include_stacks = false`, stacked frames
/// (filenames containing "stack") are skipped, since the live view should
/// show a single frame.
pub fn latest_frame(log_dir: &Path, date: Option<&str>, include_stacks: bool) -> Option<PathBuf> {
    let dir = latest_dir(&capture_root(log_dir), date)?;
    let mut frames: Vec<PathBuf> = fs::read_dir(&dir)
        .ok()?
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("jpg"))
        })
        .filter(|p| {
            include_stacks
                || !p
                    .file_name()
                    .map(|n| n.to_string_lossy().contains("stack"))
                    .unwrap_or(false)
        })
        .collect();
    frames.sort();
    frames.pop()
}

/// The night's radiants plot: `<dirname>_radiants.png` in the archive
/// directory.
pub fn radiants_plot(log_dir: &Path, date: Option<&str>) -> Option<PathBuf> {
    let dir = latest_dir(&archive_root(log_dir), date)?;
    let name = dir.file_name()?.to_str()?;
    let plot = dir.join(format!("{name}_radiants.png"));
    plot.exists().then_some(plot)
}

/// Content type by extension; limited to what the station produces.
pub fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("mp4") => "video/mp4",
        _ => "application/octet-stream",
    }
}

/// RFC-2822 mtime for the `Last-Modified` header; falls back to the epoch
/// when the metadata cannot be read.
pub fn last_modified(path: &Path) -> String {
    let modified = fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH);
    DateTime::<Utc>::from(modified).to_rfc2822()
}
