//! Low-pass and high-pass stages.
//!
//! Each stage is either a one-pole IIR or a Blackman-windowed sinc FIR. The
//! falloff of a stage is the attenuation wanted at its nominal cutoff; for the
//! one-pole design the corner frequency is moved so the response at the
//! cutoff matches it.

use std::f64::consts::PI;

use crate::models::settings::{FilterKind, FilterStage};

/// Attenuation of a first-order filter at its corner.
const CORNER_DB: f64 = -3.010_299_956_639_812;

/// Shortest and longest sinc kernels, in taps.
const MIN_TAPS: usize = 31;
const MAX_TAPS: usize = 1023;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    LowPass,
    HighPass,
}

/// First-order IIR section.
#[derive(Debug, Clone)]
pub struct OnePole {
    pass: Pass,
    coeff: f64,
    // Last input and output.
    x1: f64,
    y1: f64,
}

impl OnePole {
    /// A filter whose −3 dB corner sits at `corner_hz`.
    pub fn new(pass: Pass, corner_hz: f64, sample_rate: f64) -> Self {
        let coeff = match pass {
            Pass::LowPass => 1.0 - (-2.0 * PI * corner_hz / sample_rate).exp(),
            Pass::HighPass => {
                let rc = 1.0 / (2.0 * PI * corner_hz);
                let dt = 1.0 / sample_rate;
                rc / (rc + dt)
            }
        };
        Self { pass, coeff, x1: 0.0, y1: 0.0 }
    }

    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.y1 = 0.0;
    }

    pub fn process(&mut self, x: f64) -> f64 {
        let y = match self.pass {
            Pass::LowPass => self.y1 + self.coeff * (x - self.y1),
            Pass::HighPass => self.coeff * (self.y1 + x - self.x1),
        };
        self.x1 = x;
        self.y1 = y;
        y
    }

    pub fn process_buffer(&mut self, buffer: &mut [f64]) {
        for sample in buffer.iter_mut() {
            *sample = self.process(*sample);
        }
    }
}

/// Corner frequency that gives `falloff_db` of attenuation at `cutoff_hz`.
pub fn pole_corner(pass: Pass, cutoff_hz: f64, falloff_db: f64) -> f64 {
    let db = if falloff_db >= 0.0 { CORNER_DB } else { falloff_db };
    let gain = 10f64.powf(db / 20.0);
    let k = (1.0 / (gain * gain) - 1.0).sqrt();
    match pass {
        Pass::LowPass => cutoff_hz / k,
        Pass::HighPass => cutoff_hz * k,
    }
}

/// Windowed-sinc kernel with unity gain in the pass band.
pub fn sinc_kernel(pass: Pass, cutoff_hz: f64, sample_rate: f64) -> Vec<f64> {
    let fc = (cutoff_hz / sample_rate).clamp(1e-9, 0.5);
    let mut taps = ((4.0 / fc).ceil() as usize).clamp(MIN_TAPS, MAX_TAPS);
    if taps % 2 == 0 {
        taps += 1;
    }
    let mid = (taps / 2) as f64;
    let last = (taps - 1) as f64;

    let mut kernel: Vec<f64> = (0..taps)
        .map(|i| {
            let n = i as f64 - mid;
            let sinc = if n == 0.0 { 2.0 * fc } else { (2.0 * PI * fc * n).sin() / (PI * n) };
            let w = 0.42 - 0.5 * (2.0 * PI * i as f64 / last).cos() + 0.08 * (4.0 * PI * i as f64 / last).cos();
            sinc * w
        })
        .collect();
    let sum: f64 = kernel.iter().sum();
    for k in kernel.iter_mut() {
        *k /= sum;
    }

    if pass == Pass::HighPass {
        // Spectral inversion.
        for k in kernel.iter_mut() {
            *k = -*k;
        }
        kernel[taps / 2] += 1.0;
    }
    kernel
}

/// Zero-phase convolution; the output has the input's length.
pub fn convolve(input: &[f64], kernel: &[f64]) -> Vec<f64> {
    let half = kernel.len() / 2;
    (0..input.len())
        .map(|i| {
            let lo = (i + half + 1).saturating_sub(kernel.len());
            let hi = (i + half).min(input.len().saturating_sub(1));
            (lo..=hi).map(|j| input[j] * kernel[i + half - j]).sum()
        })
        .collect()
}

/// Run one configured stage over a channel. Disabled stages do nothing.
pub fn apply_stage(samples: &mut Vec<f64>, stage: &FilterStage, pass: Pass, sample_rate: f64) {
    if !stage.enabled || samples.is_empty() {
        return;
    }
    match stage.kind {
        FilterKind::Pole => {
            let corner = pole_corner(pass, stage.cutoff_hz, stage.falloff_db);
            OnePole::new(pass, corner, sample_rate).process_buffer(samples);
        }
        FilterKind::Sinc => {
            if pass == Pass::LowPass && stage.cutoff_hz >= sample_rate / 2.0 {
                return;
            }
            let kernel = sinc_kernel(pass, stage.cutoff_hz, sample_rate);
            *samples = convolve(samples, &kernel);
        }
    }
}
