//! Telemetry data model shared between the reader and the HTTP layer.
//!
//! These structs are the JSON bodies the browser client polls.  Everything is
//! re-derived from the filesystem on each request, so none of them carry
//! identity beyond "latest snapshot".

use serde::{Deserialize, Serialize};

/// Placeholder timestamp used before a real one has been observed.
pub const DUMMY_TIME: &str = "1970-01-01T00:00:00Z";

/// Minimum jitter quality for a capture to count as good.
pub const JITTER_QUALITY_MIN: f64 = 0.95;

/// Minimum FITS fill fraction for a capture to count as good.
pub const FITS_FILL_MIN: f64 = 0.95;

/// Live station state, accumulated from the newest log file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationState {
    pub station_id: String,
    /// ISO-8601 timestamp of the last parsed log line.
    pub updated: String,
    pub capture: CaptureStatus,
    pub detections: DetectionCounts,
}

impl StationState {
    pub fn new(station_id: &str) -> Self {
        StationState {
            station_id: station_id.to_string(),
            updated: DUMMY_TIME.to_string(),
            capture: CaptureStatus::default(),
            detections: DetectionCounts::default(),
        }
    }
}

/// Progress of the current (or most recent) capture run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureStatus {
    pub running: bool,
    pub duration_hr: f64,
    pub started: String,
    /// When the next capture run begins; always set once the scheduler has
    /// announced it, so the client can render a countdown.
    pub next_start: String,
    pub block_max_age_s: f64,
    pub n_frames_dropped: i64,
}

impl Default for CaptureStatus {
    fn default() -> Self {
        CaptureStatus {
            running: false,
            duration_hr: 0.0,
            started: DUMMY_TIME.to_string(),
            next_start: DUMMY_TIME.to_string(),
            block_max_age_s: 0.0,
            n_frames_dropped: 0,
        }
    }
}

/// Star/meteor counts for the night in progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionCounts {
    pub n_star: u32,
    pub n_meteor: u32,
    pub last_meteor: String,
    pub n_meteor_final: u32,
}

impl Default for DetectionCounts {
    fn default() -> Self {
        DetectionCounts {
            n_star: 0,
            n_meteor: 0,
            last_meteor: DUMMY_TIME.to_string(),
            n_meteor_final: 0,
        }
    }
}

/// Summary of one finalized capture session, keyed by its YYYYMMDD date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSummary {
    pub capture: SummaryCapture,
    pub camera: CameraQuality,
    pub detections: SummaryDetections,
    pub status: OverallStatus,
}

impl CaptureSummary {
    /// YYYYMMDD date of the session start.
    pub fn date(&self) -> String {
        let date = self.capture.started.split('T').next().unwrap_or_default();
        date.replace('-', "")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryCapture {
    pub started: String,
}

/// Quality gates computed by the upstream capture pipeline, consumed
/// read-only here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CameraQuality {
    #[serde(default)]
    pub astrometry_good: bool,
    #[serde(default)]
    pub photometry_good: bool,
    #[serde(default)]
    pub jitter_quality: f64,
    #[serde(default)]
    pub fits_fill: f64,
}

impl CameraQuality {
    /// Names of the failing quality gates, in a fixed order:
    /// astrometry, photometry, jitter, fill.
    pub fn failures(&self) -> Vec<&'static str> {
        let mut failures = Vec::new();
        if !self.astrometry_good {
            failures.push("astrometry failed");
        }
        if !self.photometry_good {
            failures.push("photometry failed");
        }
        if self.jitter_quality <= JITTER_QUALITY_MIN {
            failures.push("jitter failed");
        }
        if self.fits_fill <= FITS_FILL_MIN {
            failures.push("fill failed");
        }
        failures
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryDetections {
    pub n_meteor_final: u32,
}

/// Pass/fail verdict for a finished session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverallStatus {
    pub ok: bool,
    /// Human-readable one-liner: "OK with 12 meteors" or the joined
    /// failure list.
    pub summary: String,
    pub failures: Vec<String>,
}

impl OverallStatus {
    pub fn evaluate(camera: &CameraQuality, n_meteor_final: u32) -> Self {
        let failures = camera.failures();
        let ok = failures.is_empty();
        let summary = if ok {
            format!("OK with {n_meteor_final} meteors")
        } else {
            failures.join(", ")
        };
        OverallStatus {
            ok,
            summary,
            failures: failures.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn good_camera() -> CameraQuality {
        CameraQuality {
            astrometry_good: true,
            photometry_good: true,
            jitter_quality: 0.97,
            fits_fill: 0.99,
        }
    }

    #[test]
    fn test_overall_ok() {
        let status = OverallStatus::evaluate(&good_camera(), 12);
        assert!(status.ok);
        assert_eq!(status.summary, "OK with 12 meteors");
        assert!(status.failures.is_empty());
    }

    #[test]
    fn test_single_failure_named_exactly() {
        let mut camera = good_camera();
        camera.photometry_good = false;
        let status = OverallStatus::evaluate(&camera, 5);
        assert!(!status.ok);
        assert_eq!(status.summary, "photometry failed");
        assert_eq!(status.failures, vec!["photometry failed"]);
    }

    #[test]
    fn test_failures_keep_fixed_order() {
        let camera = CameraQuality {
            astrometry_good: false,
            photometry_good: true,
            jitter_quality: 0.5,
            fits_fill: 0.99,
        };
        let status = OverallStatus::evaluate(&camera, 0);
        assert_eq!(status.summary, "astrometry failed, jitter failed");
        assert_eq!(status.failures, vec!["astrometry failed", "jitter failed"]);
    }

    #[test]
    fn test_threshold_is_strict() {
        // Exactly at the threshold is not good enough.
        let mut camera = good_camera();
        camera.jitter_quality = JITTER_QUALITY_MIN;
        let status = OverallStatus::evaluate(&camera, 0);
        assert_eq!(status.summary, "jitter failed");

        camera.jitter_quality = 0.951;
        let status = OverallStatus::evaluate(&camera, 3);
        assert_eq!(status.summary, "OK with 3 meteors");
    }

    #[test]
    fn test_all_failures() {
        let status = OverallStatus::evaluate(&CameraQuality::default(), 0);
        assert_eq!(
            status.failures,
            vec![
                "astrometry failed",
                "photometry failed",
                "jitter failed",
                "fill failed"
            ]
        );
    }

    #[test]
    fn test_summary_date() {
        let summary = CaptureSummary {
            capture: SummaryCapture {
                started: "2025-08-09T02:26:43Z".to_string(),
            },
            camera: good_camera(),
            detections: SummaryDetections { n_meteor_final: 12 },
            status: OverallStatus::evaluate(&good_camera(), 12),
        };
        assert_eq!(summary.date(), "20250809");
    }
}
