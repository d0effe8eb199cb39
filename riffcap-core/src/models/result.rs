use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Summary of a finished stream capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamResult {
    pub file_path: PathBuf,
    /// Frames evaluated by the triggers.
    pub frames_received: u64,
    /// Frames stored in the data chunk.
    pub frames_written: u64,
    /// Batches discarded under `OverflowPolicy::DropNewest`.
    pub dropped_buffers: u64,
    pub duration_secs: f64,
    /// Whether the end condition closed the file.
    pub ended_by_trigger: bool,
    /// SHA-256 of the finished file, hex encoded.
    pub checksum: String,
}
