//! Batch-wide output leveling.
//!
//! One gain is computed across every rendered track so their relative
//! levels survive.

use crate::models::settings::Leveling;

/// Block length for loudness measurement, in seconds.
const LOUDNESS_BLOCK_SECS: f64 = 0.4;
/// Blocks quieter than this never count.
const ABSOLUTE_GATE_DBFS: f64 = -70.0;
/// Blocks this far below the ungated mean are dropped.
const RELATIVE_GATE_DB: f64 = -10.0;

/// One rendered track as seen by the leveler.
pub struct TrackView<'a> {
    pub channels: &'a [Vec<f64>],
    pub sample_rate: f64,
}

pub fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

pub fn linear_to_db(linear: f64) -> f64 {
    20.0 * linear.log10()
}

/// Largest absolute sample across all tracks.
pub fn batch_peak(tracks: &[TrackView<'_>]) -> f64 {
    tracks
        .iter()
        .flat_map(|t| t.channels.iter())
        .flat_map(|ch| ch.iter())
        .fold(0.0f64, |m, s| m.max(s.abs()))
}

/// Mean power of each full block, channels averaged.
fn block_powers(track: &TrackView<'_>) -> Vec<f64> {
    let len = track.channels.first().map_or(0, Vec::len);
    let block = ((LOUDNESS_BLOCK_SECS * track.sample_rate) as usize).max(1);
    let channels = track.channels.len().max(1) as f64;
    (0..len / block)
        .map(|b| {
            let range = b * block..(b + 1) * block;
            let sum: f64 = track.channels.iter().map(|ch| ch[range.clone()].iter().map(|s| s * s).sum::<f64>()).sum();
            sum / (block as f64 * channels)
        })
        .collect()
}

/// Gated RMS level of the batch in dBFS, or `None` if every block is gated.
pub fn gated_loudness(tracks: &[TrackView<'_>]) -> Option<f64> {
    let abs_gate = db_to_linear(ABSOLUTE_GATE_DBFS).powi(2);
    let blocks: Vec<f64> = tracks.iter().flat_map(block_powers).filter(|&p| p > abs_gate).collect();
    if blocks.is_empty() {
        return None;
    }
    let mean = blocks.iter().sum::<f64>() / blocks.len() as f64;
    let rel_gate = mean * db_to_linear(RELATIVE_GATE_DB).powi(2);
    let kept: Vec<f64> = blocks.into_iter().filter(|&p| p > rel_gate).collect();
    let power = kept.iter().sum::<f64>() / kept.len() as f64;
    Some(10.0 * power.log10())
}

/// The single gain that brings the batch to its target.
///
/// A silent batch gets unity gain.
pub fn batch_gain(mode: Leveling, tracks: &[TrackView<'_>]) -> f64 {
    let peak = batch_peak(tracks);
    if peak <= 0.0 {
        return 1.0;
    }
    match mode {
        Leveling::Absolute { peak: target } => target / peak,
        Leveling::Normalize { dbfs } => db_to_linear(dbfs) / peak,
        Leveling::Loudness { dbfs } => {
            let gain = match gated_loudness(tracks) {
                Some(level) => db_to_linear(dbfs - level),
                None => 1.0,
            };
            gain.min(1.0 / peak)
        }
    }
}

pub fn apply_gain(channels: &mut [Vec<f64>], gain: f64) {
    for ch in channels.iter_mut() {
        for s in ch.iter_mut() {
            *s *= gain;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn view(channels: &[Vec<f64>]) -> TrackView<'_> {
        TrackView { channels, sample_rate: 1000.0 }
    }

    #[test]
    fn absolute_target_sets_batch_peak() {
        let a = vec![vec![0.1, -0.8, 0.2]];
        let b = vec![vec![0.4, 0.3], vec![-0.2, 0.1]];
        let gain = batch_gain(Leveling::Absolute { peak: 0.5 }, &[view(&a), view(&b)]);
        assert_relative_eq!(gain, 0.625);

        let mut a = a;
        let mut b = b;
        apply_gain(&mut a, gain);
        apply_gain(&mut b, gain);
        assert_relative_eq!(batch_peak(&[view(&a), view(&b)]), 0.5);
        // Relative levels survive.
        assert_relative_eq!(b[0][0] / a[0][1], 0.4 / -0.8);
    }

    #[test]
    fn normalize_in_dbfs() {
        let a = vec![vec![0.25, -0.5]];
        let gain = batch_gain(Leveling::Normalize { dbfs: -6.020_599_913_279_624 }, &[view(&a)]);
        assert_relative_eq!(gain, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn loudness_of_full_scale_square_is_zero() {
        let square: Vec<f64> = (0..4000).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let ch = vec![square];
        assert_relative_eq!(gated_loudness(&[view(&ch)]).unwrap(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn loudness_respects_peak_ceiling() {
        let quiet: Vec<f64> = (0..4000).map(|i| if i % 2 == 0 { 0.1 } else { -0.1 }).collect();
        let mut ch = vec![quiet];
        ch[0][10] = 0.9;
        let gain = batch_gain(Leveling::Loudness { dbfs: 0.0 }, &[view(&ch)]);
        assert_relative_eq!(gain, 1.0 / 0.9, epsilon = 1e-9);
    }

    #[test]
    fn loudness_gates_silence() {
        let mut samples = vec![0.0; 4000];
        for s in samples[..2000].iter_mut().step_by(2) {
            *s = 0.5;
        }
        for s in samples[1..2000].iter_mut().step_by(2) {
            *s = -0.5;
        }
        let ch = vec![samples];
        // The silent half is gated, so the level is that of the loud half.
        assert_relative_eq!(gated_loudness(&[view(&ch)]).unwrap(), linear_to_db(0.5), epsilon = 1e-9);
    }

    #[test]
    fn silent_batch_gets_unity() {
        let ch = vec![vec![0.0; 100]];
        assert_eq!(batch_gain(Leveling::Normalize { dbfs: -1.0 }, &[view(&ch)]), 1.0);
        assert!(gated_loudness(&[view(&ch)]).is_none());
    }
}
