use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::format::{SampleFormat, WavSpec};
use crate::processing::triggers::{EndCondition, StartCondition, DEFAULT_SILENCE_EPSILON};

/// What the producer sees when the stream queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OverflowPolicy {
    /// `push` fails with `WavError::QueueFull`.
    #[default]
    Reject,
    /// The batch is discarded and counted; `push` succeeds.
    DropNewest,
}

/// Configuration for a stream-to-disk capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfiguration {
    /// Destination WAV file. Parent directories are created.
    pub path: PathBuf,

    /// Stored sample encoding (default: IEEE float).
    pub format: SampleFormat,

    /// Bits per stored sample (default: 32). PCM accepts 8, 16, 24, 32.
    pub bits_per_sample: u16,

    /// Interleaved channel count (default: 1).
    pub channels: u16,

    /// Sample rate in Hz (default: 48000).
    pub sample_rate: u32,

    /// TPDF dither when storing 16-bit PCM.
    pub dither: bool,

    pub start: StartCondition,
    pub end: EndCondition,

    /// Magnitude at or below which a sample is silent.
    pub silence_epsilon: f64,

    /// Frames accumulated by the producer before a batch is queued.
    pub buffer_frames: usize,

    /// Maximum number of batches waiting for the writer thread.
    pub queue_capacity: usize,

    pub overflow: OverflowPolicy,
}

impl StreamConfiguration {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), ..Default::default() }
    }

    pub fn spec(&self) -> WavSpec {
        WavSpec {
            format: self.format,
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: self.bits_per_sample,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        self.spec().validate().map_err(|e| e.to_string())?;
        if self.path.as_os_str().is_empty() {
            return Err("output path is empty".into());
        }
        if !(self.silence_epsilon >= 0.0) {
            return Err(format!("invalid silence epsilon: {}", self.silence_epsilon));
        }
        if self.buffer_frames == 0 {
            return Err("buffer size must be non-zero".into());
        }
        if self.queue_capacity == 0 {
            return Err("queue capacity must be non-zero".into());
        }
        match self.start {
            StartCondition::SilenceForDuration(secs) if !(secs.is_finite() && secs >= 0.0) => {
                return Err(format!("invalid start condition: silence of {} s", secs));
            }
            _ => {}
        }
        match self.end {
            EndCondition::SilenceForDuration(secs) | EndCondition::Duration(secs)
                if !(secs.is_finite() && secs >= 0.0) =>
            {
                return Err(format!("invalid end condition: {} s", secs));
            }
            _ => {}
        }
        Ok(())
    }
}

impl Default for StreamConfiguration {
    fn default() -> Self {
        Self {
            path: PathBuf::from("capture.wav"),
            format: SampleFormat::IeeeFloat,
            bits_per_sample: 32,
            channels: 1,
            sample_rate: 48000,
            dither: false,
            start: StartCondition::None,
            end: EndCondition::None,
            silence_epsilon: DEFAULT_SILENCE_EPSILON,
            buffer_frames: 10 * 1024,
            queue_capacity: 256,
            overflow: OverflowPolicy::Reject,
        }
    }
}
