use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::error::RenderStage;

/// Outcome of one file set in a render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackReport {
    /// 0-based position in display order.
    pub index: usize,
    pub set_id: u16,
    pub source: PathBuf,
    /// `None` if the track failed.
    pub output: Option<PathBuf>,
    /// Seconds of rendered audio, silences included.
    pub duration_secs: f64,
    /// Peak after leveling.
    pub peak: f64,
    pub error: Option<String>,
    pub stage: Option<RenderStage>,
}

impl TrackReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of a whole render.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RenderReport {
    pub tracks: Vec<TrackReport>,
    /// The batch leveling gain.
    pub gain: f64,
}

impl RenderReport {
    pub fn succeeded(&self) -> usize {
        self.tracks.iter().filter(|t| t.succeeded()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &TrackReport> {
        self.tracks.iter().filter(|t| !t.succeeded())
    }
}
