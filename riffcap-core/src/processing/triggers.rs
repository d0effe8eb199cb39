//! Start/stop triggers for streamed captures.
//!
//! Both evaluators see every frame in push order and keep only running
//! counters, so their decisions depend on the sample stream alone.

use serde::{Deserialize, Serialize};

/// Magnitude at or below which a sample counts as silent. One 16-bit step.
pub const DEFAULT_SILENCE_EPSILON: f64 = 1.0 / 32768.0;

/// When a capture begins admitting samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum StartCondition {
    /// Active from the first sample.
    #[default]
    None,
    /// Active from this absolute frame index onward.
    StartAtSample(u64),
    /// Active from the first frame louder than epsilon.
    FirstNonZero,
    /// Active once the preceding run of silent frames lasts this many seconds.
    SilenceForDuration(f64),
}

/// When a capture stops writing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum EndCondition {
    #[default]
    None,
    /// Frames at or after this absolute index are not written.
    EndAtSample(u64),
    /// Ends after this many seconds of continuous silence have been written.
    SilenceForDuration(f64),
    /// Ends after this many seconds have been written since the start fired.
    Duration(f64),
}

/// Convert seconds to a frame count, rounding up.
pub fn duration_to_samples(secs: f64, sample_rate: u32) -> u64 {
    let n = (secs * sample_rate as f64).ceil();
    if n.is_finite() && n > 0.0 {
        n as u64
    } else {
        0
    }
}

/// Loudest absolute value in one frame.
pub fn frame_magnitude(frame: &[f64]) -> f64 {
    frame.iter().fold(0.0f64, |m, s| m.max(s.abs()))
}

/// Latching start evaluator.
#[derive(Debug, Clone)]
pub struct StartTrigger {
    condition: StartCondition,
    epsilon: f64,
    required: u64,
    silent_run: u64,
    latched: bool,
}

impl StartTrigger {
    pub fn new(condition: StartCondition, sample_rate: u32, epsilon: f64) -> Self {
        let required = match condition {
            StartCondition::SilenceForDuration(secs) => duration_to_samples(secs, sample_rate),
            _ => 0,
        };
        Self {
            condition,
            epsilon,
            required,
            silent_run: 0,
            latched: matches!(condition, StartCondition::None),
        }
    }

    pub fn is_started(&self) -> bool {
        self.latched
    }

    /// Feed one frame; returns whether the capture is active at `index`.
    pub fn observe(&mut self, index: u64, magnitude: f64) -> bool {
        if self.latched {
            return true;
        }
        let active = match self.condition {
            StartCondition::None => true,
            StartCondition::StartAtSample(n) => index >= n,
            StartCondition::FirstNonZero => magnitude > self.epsilon,
            StartCondition::SilenceForDuration(_) => {
                if self.silent_run >= self.required {
                    true
                } else {
                    if magnitude > self.epsilon {
                        self.silent_run = 0;
                    } else {
                        self.silent_run += 1;
                    }
                    false
                }
            }
        };
        self.latched = active;
        active
    }
}

/// End evaluator. Consulted before and after each written frame.
#[derive(Debug, Clone)]
pub struct EndTrigger {
    condition: EndCondition,
    epsilon: f64,
    limit: u64,
    silent_run: u64,
    written: u64,
    fired: bool,
}

impl EndTrigger {
    pub fn new(condition: EndCondition, sample_rate: u32, epsilon: f64) -> Self {
        let limit = match condition {
            EndCondition::SilenceForDuration(secs) | EndCondition::Duration(secs) => {
                duration_to_samples(secs, sample_rate)
            }
            _ => 0,
        };
        Self { condition, epsilon, limit, silent_run: 0, written: 0, fired: false }
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    /// Frames written since the start condition fired.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Whether the frame at `index` must be withheld because the capture ended.
    pub fn before_write(&mut self, index: u64) -> bool {
        if !self.fired {
            self.fired = match self.condition {
                EndCondition::EndAtSample(n) => index >= n,
                EndCondition::Duration(_) => self.written >= self.limit,
                EndCondition::None | EndCondition::SilenceForDuration(_) => false,
            };
        }
        self.fired
    }

    /// Record a written frame; returns whether the capture ends with it.
    pub fn after_write(&mut self, magnitude: f64) -> bool {
        self.written += 1;
        if magnitude > self.epsilon {
            self.silent_run = 0;
        } else {
            self.silent_run += 1;
        }
        if !self.fired {
            self.fired = match self.condition {
                EndCondition::Duration(_) => self.written >= self.limit,
                EndCondition::SilenceForDuration(_) => self.silent_run >= self.limit.max(1),
                EndCondition::None | EndCondition::EndAtSample(_) => false,
            };
        }
        self.fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = DEFAULT_SILENCE_EPSILON;

    #[test]
    fn none_is_always_active() {
        let mut t = StartTrigger::new(StartCondition::None, 48000, EPS);
        assert!(t.is_started());
        assert!(t.observe(0, 0.0));
    }

    #[test]
    fn start_at_sample_boundary() {
        let mut t = StartTrigger::new(StartCondition::StartAtSample(100), 48000, EPS);
        assert!(!t.observe(99, 1.0));
        assert!(t.observe(100, 0.0));
    }

    #[test]
    fn first_non_zero_latches() {
        let mut t = StartTrigger::new(StartCondition::FirstNonZero, 48000, EPS);
        assert!(!t.observe(0, 0.0));
        assert!(!t.observe(1, EPS));
        assert!(t.observe(2, 0.5));
        assert!(t.observe(3, 0.0));
    }

    #[test]
    fn silence_start_needs_full_run() {
        // 0.001 s at 10 kHz = 10 frames.
        let mut t = StartTrigger::new(StartCondition::SilenceForDuration(0.001), 10_000, EPS);
        let mut index = 0;
        for _ in 0..5 {
            assert!(!t.observe(index, 0.0));
            index += 1;
        }
        // Noise resets the run.
        assert!(!t.observe(index, 0.9));
        index += 1;
        for _ in 0..10 {
            assert!(!t.observe(index, 0.0));
            index += 1;
        }
        assert_eq!(index, 16);
        assert!(t.observe(index, 0.7));
        assert!(t.observe(index + 1, 0.0));
    }

    #[test]
    fn silence_duration_rounds_up() {
        assert_eq!(duration_to_samples(1.0, 48000), 48000);
        assert_eq!(duration_to_samples(0.00001, 48000), 1);
        assert_eq!(duration_to_samples(-1.0, 48000), 0);
        assert_eq!(duration_to_samples(f64::NAN, 48000), 0);
    }

    #[test]
    fn end_at_sample_withholds_index() {
        let mut t = EndTrigger::new(EndCondition::EndAtSample(3), 48000, EPS);
        for i in 0..3 {
            assert!(!t.before_write(i));
            assert!(!t.after_write(0.5));
        }
        assert!(t.before_write(3));
        assert!(t.has_fired());
    }

    #[test]
    fn duration_counts_written_frames() {
        let mut t = EndTrigger::new(EndCondition::Duration(1.0), 48000, EPS);
        let mut written = 0u64;
        for i in 0..100_000u64 {
            if t.before_write(i) {
                break;
            }
            written += 1;
            if t.after_write(0.1) {
                break;
            }
        }
        assert_eq!(written, 48000);
        assert_eq!(t.written(), 48000);
    }

    #[test]
    fn zero_duration_writes_nothing() {
        let mut t = EndTrigger::new(EndCondition::Duration(0.0), 48000, EPS);
        assert!(t.before_write(0));
    }

    #[test]
    fn silence_end_after_run() {
        let mut t = EndTrigger::new(EndCondition::SilenceForDuration(0.0003), 10_000, EPS);
        assert!(!t.after_write(0.0));
        assert!(!t.after_write(0.0));
        assert!(!t.after_write(0.4));
        assert!(!t.after_write(0.0));
        assert!(!t.after_write(0.0));
        assert!(t.after_write(0.0));
    }

    #[test]
    fn frame_magnitude_takes_loudest_channel() {
        assert_eq!(frame_magnitude(&[0.1, -0.6, 0.3]), 0.6);
        assert_eq!(frame_magnitude(&[]), 0.0);
    }
}
