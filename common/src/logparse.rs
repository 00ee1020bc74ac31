//! Parser for the station capture log.
//!
//! Log lines look like:
//!
//! ```text
//! 2025/08/09 13:49:52-INFO-EventMonitor-line:2148 - Next Capture start    : 02:26:43 UTC
//! 2025/08/09 20:31:05-INFO-StartCapture-line:211 - Starting capture with 9.12 hours
//! ```
//!
//! The parser accumulates a [`StationState`] across lines; anything it does
//! not recognize is skipped without error.

use chrono::{Duration, NaiveDateTime, NaiveTime};
use regex::Regex;

use crate::state::{CaptureStatus, DetectionCounts, StationState, DUMMY_TIME};

const LINE_PATTERN: &str = r"^(?P<date>\d{4}/\d{2}/\d{2}) (?P<time>\d{2}:\d{2}:\d{2})-(?P<level>[A-Z]+)-(?P<module>.+?)-line:(?P<line>\d+) - (?P<message>.*)$";

/// Accumulates station state from log lines, oldest first.
pub struct LogParser {
    line_re: Regex,
    /// Set while a capture announced in this log has not yet reached its
    /// end-of-night marker.
    capture_seen: bool,
    state: StationState,
}

impl LogParser {
    /// `station_id` comes from the log filename, not the log body.
    pub fn new(station_id: &str) -> Self {
        LogParser {
            line_re: Regex::new(LINE_PATTERN).expect("log line pattern"),
            capture_seen: false,
            state: StationState::new(station_id),
        }
    }

    /// Consume the parser and return the accumulated state.
    pub fn into_state(self) -> StationState {
        self.state
    }

    /// Feed one log line.
    pub fn push_line(&mut self, line: &str) {
        let Some(caps) = self.line_re.captures(line.trim_end()) else {
            return;
        };

        let date = &caps["date"];
        let time = &caps["time"];
        let Ok(timestamp) =
            NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y/%m/%d %H:%M:%S")
        else {
            return;
        };
        let iso = timestamp.format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let module = &caps["module"];
        let message = &caps["message"];

        self.state.updated = iso.clone();
        match module {
            "StartCapture" => self.on_start_capture(message, &iso),
            "EventMonitor" => self.on_event_monitor(message, timestamp),
            "BufferedCapture" => self.on_buffered_capture(message),
            "DetectStarsAndMeteors" => self.on_detect(message, &iso),
            "MLFilter" => self.on_ml_filter(message),
            _ => {}
        }
    }

    fn on_start_capture(&mut self, message: &str, iso: &str) {
        if message.starts_with("Starting capture") {
            // "Starting capture with 9.12 hours"
            let Some(duration) = message
                .split_whitespace()
                .nth(3)
                .and_then(|v| v.parse::<f64>().ok())
            else {
                return;
            };
            self.capture_seen = true;
            self.state.capture.running = true;
            self.state.capture.duration_hr = duration;
            self.state.capture.started = iso.to_string();
            self.state.capture.block_max_age_s = 0.0;
            self.state.capture.n_frames_dropped = 0;
            self.state.detections.n_meteor = 0;
            self.state.detections.last_meteor = DUMMY_TIME.to_string();
            self.state.detections.n_meteor_final = 0;
        } else if message.starts_with("Ending capture") {
            self.state.capture.running = false;
        } else if message.starts_with("Next start time:") && self.capture_seen {
            // End-of-night marker: the run this log announced is over.
            self.capture_seen = false;
            if !self.state.capture.running {
                let next_start = self.state.capture.next_start.clone();
                self.state.capture = CaptureStatus {
                    next_start,
                    ..CaptureStatus::default()
                };
                self.state.detections = DetectionCounts::default();
            }
        }
    }

    fn on_event_monitor(&mut self, message: &str, timestamp: NaiveDateTime) {
        // "Next Capture start    : 02:26:43 UTC"
        if !message.starts_with("Next Capture start") {
            return;
        }
        let Some((_, value)) = message.split_once(':') else {
            return;
        };
        let value = value.trim().trim_end_matches("UTC").trim();
        let Ok(time) = NaiveTime::parse_from_str(value, "%H:%M:%S") else {
            return;
        };

        // The line only carries a time of day; roll it forward to the first
        // occurrence strictly after the line's own timestamp.
        let mut next = timestamp.date().and_time(time);
        if next <= timestamp {
            next += Duration::days(1);
        }
        self.state.capture.next_start = next.format("%Y-%m-%dT%H:%M:%SZ").to_string();
    }

    fn on_buffered_capture(&mut self, message: &str) {
        // "Block's max frame age: 0.22 s: 0"
        if !message.starts_with("Block's max frame age:") {
            return;
        }
        let mut parts = message.splitn(3, ':');
        let _ = parts.next();
        let age = parts
            .next()
            .and_then(|v| v.split_whitespace().next())
            .and_then(|v| v.parse::<f64>().ok());
        let dropped = parts.next().and_then(|v| v.trim().parse::<i64>().ok());
        if let (Some(age), Some(dropped)) = (age, dropped) {
            self.state.capture.block_max_age_s = age;
            self.state.capture.n_frames_dropped = dropped;
        }
    }

    fn on_detect(&mut self, message: &str, iso: &str) {
        if message.starts_with("Detected stars:") {
            if let Some(n) = message
                .split_once(':')
                .and_then(|(_, v)| v.trim().parse::<u32>().ok())
            {
                self.state.detections.n_star = n;
            }
        } else if message.contains("detected meteors:") {
            // "FF_XX0001_20250809_213344_123_0001.fits detected meteors: 2"
            if let Some(n) = message
                .rsplit_once(':')
                .and_then(|(_, v)| v.trim().parse::<u32>().ok())
            {
                self.state.detections.n_meteor += n;
                self.state.detections.last_meteor = iso.to_string();
            }
        }
    }

    fn on_ml_filter(&mut self, message: &str) {
        // "FTPdetectinfo filtered, 12/15 meteors"
        if !message.starts_with("FTPdetectinfo filtered,") {
            return;
        }
        if let Some(n) = message
            .split('/')
            .next()
            .and_then(|head| head.split_whitespace().last())
            .and_then(|v| v.parse::<u32>().ok())
        {
            self.state.detections.n_meteor_final = n;
        }
    }
}

/// Parse a full log body.  Convenience wrapper around [`LogParser`].
pub fn parse_log(station_id: &str, body: &str) -> StationState {
    let mut parser = LogParser::new(station_id);
    for line in body.lines() {
        parser.push_line(line);
    }
    parser.into_state()
}

/// Extract the station id from a log filename such as
/// `log_XX0001_20250809_202957.log`.
pub fn station_id_from_log_name(name: &str) -> Option<&str> {
    let mut parts = name.splitn(3, '_');
    let prefix = parts.next()?;
    if prefix != "log" {
        return None;
    }
    parts.next().filter(|id| !id.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_station_id_from_log_name() {
        assert_eq!(
            station_id_from_log_name("log_XX0001_20250809_202957.log"),
            Some("XX0001")
        );
        assert_eq!(station_id_from_log_name("notalog.txt"), None);
    }

    #[test]
    fn test_capture_start_and_detections() {
        let body = "\
2025/08/09 20:31:05-INFO-StartCapture-line:211 - Starting capture with 9.12 hours
2025/08/09 21:33:50-INFO-DetectStarsAndMeteors-line:140 - Detected stars: 43
2025/08/09 21:33:51-INFO-DetectStarsAndMeteors-line:154 - FF_XX0001_20250809_213344_123_0001.fits detected meteors: 2
2025/08/09 22:10:02-INFO-DetectStarsAndMeteors-line:154 - FF_XX0001_20250809_221000_456_0002.fits detected meteors: 1
2025/08/09 22:15:00-INFO-BufferedCapture-line:509 - Block's max frame age: 0.22 s: 3
";
        let state = parse_log("XX0001", body);
        assert!(state.capture.running);
        assert_eq!(state.capture.duration_hr, 9.12);
        assert_eq!(state.capture.started, "2025-08-09T20:31:05Z");
        assert_eq!(state.detections.n_star, 43);
        assert_eq!(state.detections.n_meteor, 3);
        assert_eq!(state.detections.last_meteor, "2025-08-09T22:10:02Z");
        assert_eq!(state.capture.block_max_age_s, 0.22);
        assert_eq!(state.capture.n_frames_dropped, 3);
        assert_eq!(state.updated, "2025-08-09T22:15:00Z");
    }

    #[test]
    fn test_next_start_rolls_to_tomorrow() {
        let body = "2025/08/09 13:49:52-INFO-EventMonitor-line:2148 - Next Capture start    : 02:26:43 UTC\n";
        let state = parse_log("XX0001", body);
        // 02:26:43 has already passed on the 9th, so it must be the 10th.
        assert_eq!(state.capture.next_start, "2025-08-10T02:26:43Z");
    }

    #[test]
    fn test_next_start_later_same_day() {
        let body = "2025/08/09 13:49:52-INFO-EventMonitor-line:2148 - Next Capture start    : 20:26:43 UTC\n";
        let state = parse_log("XX0001", body);
        assert_eq!(state.capture.next_start, "2025-08-09T20:26:43Z");
    }

    #[test]
    fn test_ending_capture_and_final_count() {
        let body = "\
2025/08/09 20:31:05-INFO-StartCapture-line:211 - Starting capture with 9.12 hours
2025/08/10 05:38:12-INFO-StartCapture-line:240 - Ending capture...
2025/08/10 05:52:40-INFO-MLFilter-line:82 - FTPdetectinfo filtered, 12/15 meteors
";
        let state = parse_log("XX0001", body);
        assert!(!state.capture.running);
        assert_eq!(state.detections.n_meteor_final, 12);
    }

    #[test]
    fn test_end_of_night_resets_live_counters() {
        let body = "\
2025/08/09 20:31:05-INFO-StartCapture-line:211 - Starting capture with 9.12 hours
2025/08/09 21:33:51-INFO-DetectStarsAndMeteors-line:154 - FF_XX0001_20250809_213344_123_0001.fits detected meteors: 2
2025/08/10 05:38:12-INFO-StartCapture-line:240 - Ending capture...
2025/08/10 05:53:01-INFO-EventMonitor-line:2148 - Next Capture start    : 02:22:10 UTC
2025/08/10 05:53:02-INFO-StartCapture-line:260 - Next start time: 2025-08-11 02:22:10 UTC
";
        let state = parse_log("XX0001", body);
        assert!(!state.capture.running);
        assert_eq!(state.detections.n_meteor, 0);
        assert_eq!(state.capture.started, DUMMY_TIME);
        // The countdown target survives the reset.
        assert_eq!(state.capture.next_start, "2025-08-11T02:22:10Z");
    }

    #[test]
    fn test_garbage_lines_are_ignored() {
        let body = "\
not a log line at all
2025/08/09 21:33:50-INFO-DetectStarsAndMeteors-line:140 - Detected stars: 43
camera_fov_h                    : 88.58
";
        let state = parse_log("XX0001", body);
        assert_eq!(state.detections.n_star, 43);
        assert_eq!(state.updated, "2025-08-09T21:33:50Z");
    }

    #[test]
    fn test_starting_capture_resets_previous_night() {
        let body = "\
2025/08/08 20:30:00-INFO-StartCapture-line:211 - Starting capture with 9.00 hours
2025/08/08 21:00:00-INFO-DetectStarsAndMeteors-line:154 - FF_a.fits detected meteors: 7
2025/08/09 20:31:05-INFO-StartCapture-line:211 - Starting capture with 9.12 hours
";
        let state = parse_log("XX0001", body);
        assert!(state.capture.running);
        assert_eq!(state.detections.n_meteor, 0);
        assert_eq!(state.capture.started, "2025-08-09T20:31:05Z");
    }
}
