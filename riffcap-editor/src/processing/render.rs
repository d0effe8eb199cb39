//! Per-file render stages: decode, trim, filter, level, loop or one-shot.

use riffcap_core::WavContainer;

use super::filters::{apply_stage, Pass};
use crate::models::error::EditorError;
use crate::models::file_set::{Label, WavFileSet};
use crate::models::settings::{PerFileOutputSettings, SnapMode, TrimPoint};

/// Longest crossfade applied at a loop seam, in seconds.
const SEAM_SECS: f64 = 0.01;

/// Decode the primary file and its extensions into one buffer per channel.
pub fn decode_set(set: &WavFileSet) -> Result<Vec<Vec<f64>>, EditorError> {
    let mut channels = WavContainer::open(&set.file.path)?.all_samples()?;
    for ext in &set.extensions {
        let more = WavContainer::open(&ext.path)?.all_samples()?;
        if more.len() != channels.len() {
            return Err(EditorError::InvalidSetting {
                field: "extension",
                reason: format!("{} has {} channels, expected {}", ext.path.display(), more.len(), channels.len()),
            });
        }
        for (ch, tail) in channels.iter_mut().zip(more) {
            ch.extend(tail);
        }
    }
    Ok(channels)
}

/// Frame index of `point`, clamped to `total`.
pub fn resolve_point(point: TrimPoint, labels: &[Label], sample_rate: f64, total: u64) -> Result<u64, EditorError> {
    let index = match point {
        TrimPoint::Sample(n) => n,
        TrimPoint::Seconds(secs) => (secs * sample_rate).round().max(0.0) as u64,
        TrimPoint::Label { index, offset } => {
            let label = labels.iter().find(|l| l.index == index).ok_or_else(|| EditorError::InvalidSetting {
                field: "trim label",
                reason: format!("no label with index {}", index),
            })?;
            ((label.time + offset) * sample_rate).round().max(0.0) as u64
        }
    };
    Ok(index.min(total))
}

/// Closest index to `index` where `samples` changes sign or is zero.
///
/// Returns `index` unchanged when there is no crossing.
pub fn nearest_zero_crossing(samples: &[f64], index: usize) -> usize {
    let is_crossing = |i: usize| {
        i < samples.len() && (samples[i] == 0.0 || (i > 0 && (samples[i - 1] < 0.0) != (samples[i] < 0.0)))
    };
    if index >= samples.len() {
        return index;
    }
    for d in 0..samples.len() {
        if d <= index && is_crossing(index - d) {
            return index - d;
        }
        if is_crossing(index + d) {
            return index + d;
        }
        if d > index && index + d >= samples.len() {
            break;
        }
    }
    index
}

fn snap(channels: &[Vec<f64>], index: u64, mode: SnapMode) -> u64 {
    match (mode, channels.first()) {
        (SnapMode::NearestZeroCrossing, Some(first)) => nearest_zero_crossing(first, index as usize) as u64,
        _ => index,
    }
}

/// The trimmed body and, when looping, where the loop region starts in it.
#[derive(Debug, Clone, PartialEq)]
pub struct Trimmed {
    pub channels: Vec<Vec<f64>>,
    pub loop_start: usize,
}

pub fn trim(
    channels: &[Vec<f64>],
    labels: &[Label],
    settings: &PerFileOutputSettings,
    sample_rate: f64,
) -> Result<Trimmed, EditorError> {
    let total = channels.first().map_or(0, Vec::len) as u64;
    let start = snap(channels, resolve_point(settings.start, labels, sample_rate, total)?, settings.start_snap);
    let stop = match settings.stop {
        Some(point) => snap(channels, resolve_point(point, labels, sample_rate, total)?, settings.stop_snap),
        None => total,
    };
    if start >= stop {
        return Err(EditorError::InvalidSetting {
            field: "trim",
            reason: format!("start {} is not before stop {}", start, stop),
        });
    }

    let loop_start = match settings.loop_start {
        Some(point) if settings.looping => {
            let at = resolve_point(point, labels, sample_rate, total)?;
            if at < start || at >= stop {
                return Err(EditorError::InvalidSetting {
                    field: "loop start",
                    reason: format!("{} is outside {}..{}", at, start, stop),
                });
            }
            (at - start) as usize
        }
        _ => 0,
    };

    let (start, stop) = (start as usize, stop as usize);
    Ok(Trimmed { channels: channels.iter().map(|ch| ch[start..stop].to_vec()).collect(), loop_start })
}

/// Low-pass, then the three high-pass stages.
pub fn filter(channels: &mut [Vec<f64>], settings: &PerFileOutputSettings, sample_rate: f64) {
    for ch in channels.iter_mut() {
        apply_stage(ch, &settings.lpf, Pass::LowPass, sample_rate);
        for stage in &settings.hpf {
            apply_stage(ch, stage, Pass::HighPass, sample_rate);
        }
    }
}

pub fn apply_volume(channels: &mut [Vec<f64>], volume: f64, invert: bool) {
    let gain = if invert { -volume } else { volume };
    for s in channels.iter_mut().flat_map(|ch| ch.iter_mut()) {
        *s *= gain;
    }
}

fn frames(secs: f64, sample_rate: f64) -> usize {
    (secs * sample_rate).round() as usize
}

/// Linear fade to zero over the last `len` samples.
fn fade_out(samples: &mut [f64], len: usize) {
    let len = len.min(samples.len());
    let from = samples.len() - len;
    for (k, s) in samples[from..].iter_mut().enumerate() {
        *s *= (len - 1 - k) as f64 / len as f64;
    }
}

/// Play the body, then repeat `[loop_start, end)` for `delay` seconds and fade
/// out over `fade` seconds.
fn render_loop(body: &[f64], loop_start: usize, delay: usize, fade: usize, seam: usize) -> Vec<f64> {
    let loop_len = body.len() - loop_start;
    let xfade = seam.min(loop_start).min(loop_len);
    let total = body.len() + delay + fade;

    let mut out = Vec::with_capacity(total + loop_len);
    out.extend_from_slice(body);
    while out.len() < total {
        // Blend the tail into the material leading up to the loop start.
        let n = out.len();
        for k in 0..xfade {
            let t = (k + 1) as f64 / (xfade + 1) as f64;
            let i = n - xfade + k;
            out[i] = out[i] * (1.0 - t) + body[loop_start - xfade + k] * t;
        }
        out.extend_from_slice(&body[loop_start..]);
    }
    out.truncate(total);
    fade_out(&mut out, fade);
    out
}

/// Loop or one-shot rendering, then the opening and trailing silences.
pub fn arrange(trimmed: Trimmed, settings: &PerFileOutputSettings, sample_rate: f64) -> Vec<Vec<f64>> {
    let opening = frames(settings.opening_silence_secs, sample_rate);
    let trailing = frames(settings.trailing_silence_secs, sample_rate);
    let fade = frames(settings.fade_secs, sample_rate);
    let seam = frames(SEAM_SECS, sample_rate);

    trimmed
        .channels
        .into_iter()
        .map(|body| {
            let mut played = if settings.looping {
                render_loop(&body, trimmed.loop_start, frames(settings.delay_secs, sample_rate), fade, seam)
            } else {
                let mut body = body;
                if settings.fade {
                    fade_out(&mut body, fade);
                }
                body
            };
            let mut out = vec![0.0; opening];
            out.append(&mut played);
            out.resize(out.len() + trailing, 0.0);
            out
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::settings::FilterStage;
    use approx::assert_relative_eq;

    fn plain() -> PerFileOutputSettings {
        PerFileOutputSettings {
            lpf: FilterStage::disabled(),
            hpf: [FilterStage::disabled(); 3],
            volume: 1.0,
            invert: false,
            opening_silence_secs: 0.0,
            trailing_silence_secs: 0.0,
            ..Default::default()
        }
    }

    fn label(index: u32, time: f64) -> Label {
        Label { time, time2: time, index, text: String::new() }
    }

    fn ramp(len: usize) -> Vec<Vec<f64>> {
        vec![(0..len).map(|i| i as f64).collect()]
    }

    #[test]
    fn resolves_every_kind_of_point() {
        let labels = [label(3, 0.5)];
        assert_eq!(resolve_point(TrimPoint::Sample(7), &labels, 100.0, 1000).unwrap(), 7);
        assert_eq!(resolve_point(TrimPoint::Seconds(0.25), &labels, 100.0, 1000).unwrap(), 25);
        assert_eq!(resolve_point(TrimPoint::Label { index: 3, offset: 0.1 }, &labels, 100.0, 1000).unwrap(), 60);
        assert_eq!(resolve_point(TrimPoint::Seconds(50.0), &labels, 100.0, 1000).unwrap(), 1000);
        assert!(resolve_point(TrimPoint::Label { index: 9, offset: 0.0 }, &labels, 100.0, 1000).is_err());
    }

    #[test]
    fn zero_crossing_snaps_to_closest() {
        let s = [0.5, 0.4, 0.3, -0.1, -0.2, -0.3, -0.4, 0.2];
        assert_eq!(nearest_zero_crossing(&s, 1), 3);
        assert_eq!(nearest_zero_crossing(&s, 6), 7);
        assert_eq!(nearest_zero_crossing(&[0.5, 0.5, 0.5], 1), 1);
    }

    #[test]
    fn trims_to_range() {
        let settings = PerFileOutputSettings {
            start: TrimPoint::Sample(10),
            stop: Some(TrimPoint::Sample(20)),
            ..plain()
        };
        let t = trim(&ramp(100), &[], &settings, 100.0).unwrap();
        assert_eq!(t.channels[0].len(), 10);
        assert_relative_eq!(t.channels[0][0], 10.0);
    }

    #[test]
    fn empty_range_is_rejected() {
        let settings = PerFileOutputSettings {
            start: TrimPoint::Sample(20),
            stop: Some(TrimPoint::Sample(20)),
            ..plain()
        };
        assert!(matches!(
            trim(&ramp(100), &[], &settings, 100.0),
            Err(EditorError::InvalidSetting { field: "trim", .. })
        ));
    }

    #[test]
    fn loop_start_outside_body_is_rejected() {
        let settings = PerFileOutputSettings {
            start: TrimPoint::Sample(20),
            looping: true,
            loop_start: Some(TrimPoint::Sample(5)),
            ..plain()
        };
        assert!(trim(&ramp(100), &[], &settings, 100.0).is_err());
    }

    #[test]
    fn volume_and_invert() {
        let mut ch = vec![vec![0.5, -0.25]];
        apply_volume(&mut ch, 0.5, true);
        assert_eq!(ch[0], vec![-0.25, 0.125]);
    }

    #[test]
    fn one_shot_with_silences_and_fade() {
        let settings = PerFileOutputSettings {
            opening_silence_secs: 0.02,
            trailing_silence_secs: 0.05,
            fade: true,
            fade_secs: 0.1,
            ..plain()
        };
        let trimmed = Trimmed { channels: vec![vec![1.0; 100]], loop_start: 0 };
        let out = arrange(trimmed, &settings, 100.0);
        assert_eq!(out[0].len(), 2 + 100 + 5);
        assert_eq!(out[0][..2], [0.0, 0.0]);
        assert_relative_eq!(out[0][2], 1.0);
        assert_relative_eq!(out[0][2 + 95], 0.4);
        assert_eq!(out[0][2 + 99], 0.0);
    }

    #[test]
    fn loop_runs_delay_then_fades() {
        let settings = PerFileOutputSettings { looping: true, delay_secs: 1.0, fade_secs: 0.5, ..plain() };
        let body: Vec<f64> = (0..100).map(|i| ((i % 20) as f64 / 20.0) - 0.5).collect();
        let out = arrange(Trimmed { channels: vec![body.clone()], loop_start: 40 }, &settings, 100.0);
        assert_eq!(out[0].len(), 100 + 100 + 50);
        // The body plays untouched up to the first seam.
        assert_eq!(out[0][..99], body[..99]);
        // Second pass resumes at the loop start.
        assert_relative_eq!(out[0][100], body[40]);
        assert_relative_eq!(out[0][100 + 60 + 5], body[45]);
        assert_eq!(*out[0].last().unwrap(), 0.0);
    }

    #[test]
    fn whole_body_loop_has_no_seam_fade() {
        let settings = PerFileOutputSettings { looping: true, delay_secs: 0.1, fade_secs: 0.0, ..plain() };
        let out = arrange(Trimmed { channels: vec![vec![0.25; 10]], loop_start: 0 }, &settings, 100.0);
        assert_eq!(out[0], vec![0.25; 20]);
    }
}
