//! Telemetry reader: every call re-derives state from the filesystem, so
//! concurrent requests never share mutable state.
//!
//! The station software writes rotating `log_*.log` files into the log
//! directory and finalizes each night into a sibling `ArchivedFiles/<night>/`
//! directory.  A night counts as finalized once its
//! `<night>_observation_summary.json` exists.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Deserialize;
use thiserror::Error;

use skywatch_common::logparse::{parse_log, station_id_from_log_name};
use skywatch_common::state::{
    CameraQuality, CaptureSummary, OverallStatus, StationState, SummaryCapture, SummaryDetections,
};

use crate::artifacts;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("no station logs available yet")]
    DataUnavailable,
    #[error("no capture record for the requested date")]
    NotFound,
    #[error("malformed capture summary: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Read-only view over the station's log and artifact directories.
#[derive(Debug, Clone)]
pub struct Telemetry {
    log_dir: PathBuf,
}

/// The subset of the observation summary this dashboard reports.
/// Unknown keys in the file are ignored.
#[derive(Debug, Deserialize)]
struct ObservationSummary {
    #[serde(default)]
    astrometry_good: bool,
    #[serde(default)]
    photometry_good: bool,
    #[serde(default)]
    jitter_quality: f64,
    #[serde(default)]
    fits_fill: f64,
    #[serde(default)]
    n_meteor_final: u32,
}

impl Telemetry {
    pub fn new(log_dir: PathBuf) -> Self {
        Telemetry { log_dir }
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Current station state, accumulated from the newest log file.
    ///
    /// With `date`, the newest log whose filename carries that `YYYYMMDD`
    /// date is used instead.
    pub fn latest(&self, date: Option<&str>) -> Result<StationState, TelemetryError> {
        let mut newest: Option<(SystemTime, PathBuf)> = None;
        for entry in fs::read_dir(&self.log_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.starts_with("log_") || !name.ends_with(".log") {
                continue;
            }
            if let Some(date) = date {
                if !name.contains(date) {
                    continue;
                }
            }
            let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
                continue;
            };
            if newest.as_ref().is_none_or(|(at, _)| modified > *at) {
                newest = Some((modified, entry.path()));
            }
        }

        let Some((_, path)) = newest else {
            return Err(match date {
                Some(_) => TelemetryError::NotFound,
                None => TelemetryError::DataUnavailable,
            });
        };

        let station_id = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(station_id_from_log_name)
            .unwrap_or("unknown")
            .to_string();
        let body = fs::read_to_string(&path)?;
        Ok(parse_log(&station_id, &body))
    }

    /// Summary of the most recent finalized capture, or of the capture
    /// matching `date`.
    pub fn previous(&self, date: Option<&str>) -> Result<CaptureSummary, TelemetryError> {
        let root = artifacts::archive_root(&self.log_dir);
        let candidates = artifacts::dated_dirs(&root, date);

        let mut newest: Option<(SystemTime, PathBuf)> = None;
        for dir in candidates {
            let Some(summary) = summary_path(&dir) else { continue };
            if !summary.exists() {
                continue;
            }
            let Ok(modified) = fs::metadata(&dir).and_then(|m| m.modified()) else {
                continue;
            };
            if newest.as_ref().is_none_or(|(at, _)| modified > *at) {
                newest = Some((modified, dir));
            }
        }

        let Some((_, dir)) = newest else {
            return Err(TelemetryError::NotFound);
        };
        self.read_summary(&dir)
    }

    /// Dates (YYYYMMDD) of every finalized capture on disk.  Recomputed from
    /// the directory listing on each call; a night only appears once its
    /// observation summary has been written.
    pub fn history(&self) -> Result<Vec<String>, TelemetryError> {
        let root = artifacts::archive_root(&self.log_dir);
        let mut dates = std::collections::BTreeSet::new();
        for dir in artifacts::dated_dirs(&root, None) {
            let Some(summary) = summary_path(&dir) else { continue };
            if !summary.exists() {
                continue;
            }
            let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(date) = date_from_dir_name(name) {
                dates.insert(date.to_string());
            }
        }
        Ok(dates.into_iter().collect())
    }

    fn read_summary(&self, dir: &Path) -> Result<CaptureSummary, TelemetryError> {
        let path = summary_path(dir).ok_or(TelemetryError::NotFound)?;
        let body = fs::read_to_string(path)?;
        let raw: ObservationSummary = serde_json::from_str(&body)?;

        let name = dir.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let camera = CameraQuality {
            astrometry_good: raw.astrometry_good,
            photometry_good: raw.photometry_good,
            jitter_quality: raw.jitter_quality,
            fits_fill: raw.fits_fill,
        };
        let status = OverallStatus::evaluate(&camera, raw.n_meteor_final);
        Ok(CaptureSummary {
            capture: SummaryCapture {
                started: started_from_dir_name(name)
                    .unwrap_or_else(|| skywatch_common::state::DUMMY_TIME.to_string()),
            },
            camera,
            detections: SummaryDetections {
                n_meteor_final: raw.n_meteor_final,
            },
            status,
        })
    }
}

/// `<dir>/<dirname>_observation_summary.json`
fn summary_path(dir: &Path) -> Option<PathBuf> {
    let name = dir.file_name()?.to_str()?;
    Some(dir.join(format!("{name}_observation_summary.json")))
}

/// YYYYMMDD segment of a night directory name such as
/// `XX0001_20250809_202643_123456`.
fn date_from_dir_name(name: &str) -> Option<&str> {
    let date = name.split('_').nth(1)?;
    (date.len() == 8 && date.bytes().all(|b| b.is_ascii_digit())).then_some(date)
}

/// ISO-8601 session start derived from the night directory name.
fn started_from_dir_name(name: &str) -> Option<String> {
    let mut parts = name.split('_');
    let _station = parts.next()?;
    let date = parts.next()?;
    let time = parts.next()?;
    if date.len() != 8 || time.len() != 6 {
        return None;
    }
    Some(format!(
        "{}-{}-{}T{}:{}:{}Z",
        &date[..4],
        &date[4..6],
        &date[6..8],
        &time[..2],
        &time[2..4],
        &time[4..6]
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn station_fixture() -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        let logs = root.path().join("logs");
        fs::create_dir_all(&logs).unwrap();
        fs::write(
            logs.join("log_XX0001_20250809_202957.log"),
            "\
2025/08/09 20:31:05-INFO-StartCapture-line:211 - Starting capture with 9.12 hours
2025/08/09 21:33:50-INFO-DetectStarsAndMeteors-line:140 - Detected stars: 43
2025/08/09 21:33:51-INFO-DetectStarsAndMeteors-line:154 - FF_XX0001_20250809_213344_123_0001.fits detected meteors: 2
",
        )
        .unwrap();

        let night = root
            .path()
            .join("ArchivedFiles")
            .join("XX0001_20250809_202643_123456");
        fs::create_dir_all(&night).unwrap();
        fs::write(
            night.join("XX0001_20250809_202643_123456_observation_summary.json"),
            r#"{
                "astrometry_good": true,
                "photometry_good": true,
                "jitter_quality": 0.97,
                "fits_fill": 0.99,
                "n_meteor_final": 12,
                "camera_lens": "4mm"
            }"#,
        )
        .unwrap();

        // A night still being written: directory exists, no summary yet.
        fs::create_dir_all(
            root.path()
                .join("ArchivedFiles")
                .join("XX0001_20250810_202643_123456"),
        )
        .unwrap();

        root
    }

    fn telemetry(root: &tempfile::TempDir) -> Telemetry {
        Telemetry::new(root.path().join("logs"))
    }

    #[test]
    fn test_latest_reads_newest_log() {
        let root = station_fixture();
        let state = telemetry(&root).latest(None).unwrap();
        assert_eq!(state.station_id, "XX0001");
        assert!(state.capture.running);
        assert_eq!(state.detections.n_star, 43);
        assert_eq!(state.detections.n_meteor, 2);
    }

    #[test]
    fn test_latest_without_logs_is_unavailable() {
        let root = tempfile::tempdir().unwrap();
        let logs = root.path().join("logs");
        fs::create_dir_all(&logs).unwrap();
        let err = Telemetry::new(logs).latest(None).unwrap_err();
        assert!(matches!(err, TelemetryError::DataUnavailable));
    }

    #[test]
    fn test_latest_for_unknown_date_is_not_found() {
        let root = station_fixture();
        let err = telemetry(&root).latest(Some("19990101")).unwrap_err();
        assert!(matches!(err, TelemetryError::NotFound));
    }

    #[test]
    fn test_previous_reads_observation_summary() {
        let root = station_fixture();
        let summary = telemetry(&root).previous(None).unwrap();
        assert_eq!(summary.capture.started, "2025-08-09T20:26:43Z");
        assert_eq!(summary.date(), "20250809");
        assert_eq!(summary.detections.n_meteor_final, 12);
        assert!(summary.status.ok);
        assert_eq!(summary.status.summary, "OK with 12 meteors");
    }

    #[test]
    fn test_previous_by_date_roundtrip() {
        let root = station_fixture();
        let t = telemetry(&root);
        for date in t.history().unwrap() {
            let summary = t.previous(Some(&date)).unwrap();
            assert_eq!(summary.date(), date);
        }
    }

    #[test]
    fn test_previous_unknown_date_is_not_found() {
        let root = station_fixture();
        let err = telemetry(&root).previous(Some("19990101")).unwrap_err();
        assert!(matches!(err, TelemetryError::NotFound));
    }

    #[test]
    fn test_history_skips_unfinalized_nights() {
        let root = station_fixture();
        let dates = telemetry(&root).history().unwrap();
        assert_eq!(dates, vec!["20250809".to_string()]);
    }

    #[test]
    fn test_date_from_dir_name() {
        assert_eq!(
            date_from_dir_name("XX0001_20250809_202643_123456"),
            Some("20250809")
        );
        assert_eq!(date_from_dir_name("random"), None);
        assert_eq!(date_from_dir_name("XX0001_2025_202643"), None);
    }

    #[test]
    fn test_started_from_dir_name() {
        assert_eq!(
            started_from_dir_name("XX0001_20250809_202643_123456").as_deref(),
            Some("2025-08-09T20:26:43Z")
        );
        assert_eq!(started_from_dir_name("XX0001"), None);
    }
}
