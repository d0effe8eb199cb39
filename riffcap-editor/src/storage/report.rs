use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::error::EditorError;
use crate::models::report::RenderReport;

pub const REPORT_FILE: &str = "render-report.json";
pub const TRACK_LIST_FILE: &str = "tracks.txt";

/// Write the render report as JSON into `folder`.
pub fn write_report(report: &RenderReport, folder: &Path) -> Result<PathBuf, EditorError> {
    let path = folder.join(REPORT_FILE);
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| EditorError::Storage(format!("failed to serialize report: {}", e)))?;
    fs::write(&path, json).map_err(|e| EditorError::Storage(format!("failed to write report: {}", e)))?;
    Ok(path)
}

pub fn read_report(folder: &Path) -> Result<RenderReport, EditorError> {
    let json = fs::read_to_string(folder.join(REPORT_FILE))
        .map_err(|e| EditorError::Storage(format!("failed to read report: {}", e)))?;
    serde_json::from_str(&json).map_err(|e| EditorError::Storage(format!("failed to parse report: {}", e)))
}

/// `m:ss`, rounded to the nearest second.
pub fn format_duration(secs: f64) -> String {
    let total = secs.max(0.0).round() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// One `<index>. <title> (<m:ss>)` line per successful track.
pub fn track_list(report: &RenderReport, titles: &[String]) -> String {
    let mut out = String::new();
    for (n, track) in report.tracks.iter().filter(|t| t.succeeded()).enumerate() {
        let title = titles.get(track.index).map(String::as_str).unwrap_or_default();
        let _ = writeln!(out, "{}. {} ({})", n + 1, title, format_duration(track.duration_secs));
    }
    out
}

pub fn write_track_list(report: &RenderReport, titles: &[String], folder: &Path) -> Result<PathBuf, EditorError> {
    let path = folder.join(TRACK_LIST_FILE);
    fs::write(&path, track_list(report, titles))
        .map_err(|e| EditorError::Storage(format!("failed to write track list: {}", e)))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::error::RenderStage;
    use crate::models::report::TrackReport;

    fn track(index: usize, secs: f64, error: Option<&str>) -> TrackReport {
        TrackReport {
            index,
            set_id: index as u16 + 1,
            source: PathBuf::from(format!("in{}.wav", index)),
            output: error.is_none().then(|| PathBuf::from(format!("out{}.wav", index))),
            duration_secs: secs,
            peak: 0.5,
            error: error.map(str::to_string),
            stage: error.map(|_| RenderStage::Trim),
        }
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(0.0), "0:00");
        assert_eq!(format_duration(59.6), "1:00");
        assert_eq!(format_duration(125.2), "2:05");
    }

    #[test]
    fn track_list_skips_failures() {
        let report = RenderReport {
            tracks: vec![track(0, 65.0, None), track(1, 3.0, Some("bad")), track(2, 9.0, None)],
            gain: 1.0,
        };
        let titles = vec!["Title".to_string(), "Broken".to_string(), "Ending".to_string()];
        assert_eq!(track_list(&report, &titles), "1. Title (1:05)\n2. Ending (0:09)\n");
    }

    #[test]
    fn report_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let report = RenderReport { tracks: vec![track(0, 1.5, None), track(1, 0.0, Some("x"))], gain: 0.75 };
        let path = write_report(&report, dir.path()).unwrap();
        assert!(path.ends_with(REPORT_FILE));
        assert_eq!(read_report(dir.path()).unwrap(), report);
    }

    #[test]
    fn missing_report() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(read_report(dir.path()), Err(EditorError::Storage(_))));
    }
}
