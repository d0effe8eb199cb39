use std::path::PathBuf;

use riffcap_core::WavSpec;
use serde::{Deserialize, Serialize};

/// One probed WAV file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WavFileDescriptor {
    pub path: PathBuf,
    pub spec: WavSpec,
    /// Frames per channel.
    pub samples: u64,
}

impl WavFileDescriptor {
    pub fn duration_secs(&self) -> f64 {
        self.samples as f64 / self.spec.sample_rate as f64
    }
}

/// A line from a label file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    /// Seconds from the start of the set.
    pub time: f64,
    /// Second time column. Validated, otherwise unused.
    pub time2: f64,
    pub index: u32,
    pub text: String,
}

/// A recording: the primary file, its numbered continuations and labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WavFileSet {
    pub id: u16,
    pub file: WavFileDescriptor,
    /// `<stem>.1.wav`, `<stem>.2.wav`, … in order.
    pub extensions: Vec<WavFileDescriptor>,
    pub metadata_path: Option<PathBuf>,
    pub labels: Vec<Label>,
}

impl WavFileSet {
    /// Frames across the primary file and all extensions.
    pub fn total_samples(&self) -> u64 {
        self.file.samples + self.extensions.iter().map(|e| e.samples).sum::<u64>()
    }

    pub fn total_duration_secs(&self) -> f64 {
        self.total_samples() as f64 / self.file.spec.sample_rate as f64
    }

    /// Every input path of the set.
    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        std::iter::once(&self.file.path).chain(self.extensions.iter().map(|e| &e.path))
    }

    /// First label with the given index.
    pub fn label(&self, index: u32) -> Option<&Label> {
        self.labels.iter().find(|l| l.index == index)
    }
}
