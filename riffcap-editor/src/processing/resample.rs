use std::f64::consts::PI;

/// Kernel half-width, in output-rate samples, for band-limited downsampling.
const SINC_HALF_WIDTH: f64 = 16.0;

/// Resample one channel from `source_rate` to `target_rate`.
///
/// Upsampling interpolates linearly. Downsampling uses a windowed-sinc
/// kernel scaled to the target band so content above the new Nyquist
/// frequency is removed instead of folded back.
pub fn resample(samples: &[f64], source_rate: f64, target_rate: f64) -> Vec<f64> {
    if (source_rate - target_rate).abs() < 0.01 || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = target_rate / source_rate;
    let output_count = (samples.len() as f64 * ratio) as usize;
    if output_count == 0 {
        return Vec::new();
    }

    if ratio > 1.0 {
        linear(samples, ratio, output_count)
    } else {
        band_limited(samples, ratio, output_count)
    }
}

fn linear(samples: &[f64], ratio: f64, output_count: usize) -> Vec<f64> {
    let mut output = vec![0.0f64; output_count];
    for (i, sample) in output.iter_mut().enumerate() {
        let source_index = i as f64 / ratio;
        let index = source_index as usize;
        let fraction = source_index - index as f64;

        if index + 1 < samples.len() {
            *sample = samples[index] * (1.0 - fraction) + samples[index + 1] * fraction;
        } else if index < samples.len() {
            *sample = samples[index];
        }
    }
    output
}

fn band_limited(samples: &[f64], ratio: f64, output_count: usize) -> Vec<f64> {
    // Cut slightly below the target Nyquist frequency.
    let cutoff = 0.95 * ratio;
    let half_width = (SINC_HALF_WIDTH / ratio).ceil();
    let last = samples.len() as i64 - 1;

    (0..output_count)
        .map(|i| {
            let center = i as f64 / ratio;
            let lo = ((center - half_width).ceil() as i64).max(0);
            let hi = ((center + half_width).floor() as i64).min(last);
            let (mut acc, mut weight) = (0.0, 0.0);
            for k in lo..=hi {
                let d = k as f64 - center;
                let w = sinc(cutoff * d) * blackman(d / half_width);
                acc += samples[k as usize] * w;
                weight += w;
            }
            if weight.abs() > 1e-12 {
                acc / weight
            } else {
                0.0
            }
        })
        .collect()
}

fn sinc(x: f64) -> f64 {
    if x.abs() < 1e-12 {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}

/// Blackman window over `[-1, 1]`.
fn blackman(x: f64) -> f64 {
    if x.abs() >= 1.0 {
        return 0.0;
    }
    let t = PI * (x + 1.0);
    0.42 - 0.5 * t.cos() + 0.08 * (2.0 * t).cos()
}

/// Resample every channel.
pub fn resample_channels(channels: &[Vec<f64>], source_rate: f64, target_rate: f64) -> Vec<Vec<f64>> {
    channels.iter().map(|ch| resample(ch, source_rate, target_rate)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn peak(s: &[f64]) -> f64 {
        s.iter().fold(0.0f64, |m, x| m.max(x.abs()))
    }

    #[test]
    fn same_rate_is_passthrough() {
        let samples = vec![1.0, 2.0, 3.0];
        assert_eq!(resample(&samples, 48000.0, 48000.0), samples);
    }

    #[test]
    fn upsample_2x_interpolates() {
        let result = resample(&[0.0, 1.0], 24000.0, 48000.0);
        assert_eq!(result.len(), 4);
        assert_relative_eq!(result[0], 0.0);
        assert_relative_eq!(result[1], 0.5);
    }

    #[test]
    fn downsample_length() {
        let samples: Vec<f64> = (0..100).map(|i| i as f64 / 100.0).collect();
        assert_eq!(resample(&samples, 48000.0, 24000.0).len(), 50);
    }

    #[test]
    fn downsample_keeps_dc() {
        let result = resample(&vec![0.5; 4000], 96000.0, 48000.0);
        assert!(result.iter().all(|&s| (s - 0.5).abs() < 1e-9));
    }

    #[test]
    fn downsample_removes_content_above_nyquist() {
        // 30 kHz at 96 kHz would alias to 18 kHz at 48 kHz.
        let tone: Vec<f64> = (0..9600).map(|i| (2.0 * PI * 30000.0 * i as f64 / 96000.0).sin()).collect();
        let result = resample(&tone, 96000.0, 48000.0);
        assert!(peak(&result[100..4700]) < 0.01);
    }

    #[test]
    fn downsample_keeps_passband() {
        let tone: Vec<f64> = (0..9600).map(|i| (2.0 * PI * 1000.0 * i as f64 / 96000.0).sin()).collect();
        let result = resample(&tone, 96000.0, 48000.0);
        assert_relative_eq!(peak(&result[100..4700]), 1.0, epsilon = 0.01);
    }

    #[test]
    fn non_integer_source_rate() {
        let samples = vec![0.25; 1_789_773 / 100];
        let result = resample(&samples, 1_789_772.727, 48000.0);
        assert_eq!(result.len(), (samples.len() as f64 * 48000.0 / 1_789_772.727) as usize);
        assert!(result[10..result.len() - 10].iter().all(|&s| (s - 0.25).abs() < 1e-9));
    }
}
