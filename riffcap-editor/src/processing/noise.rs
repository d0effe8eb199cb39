//! Synthetic background beds: thermal white noise and coloured mains hum.

use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::settings::{HumColor, NoiseKind};

/// Boltzmann constant, J/K.
pub const BOLTZMANN: f64 = 1.380_649e-23;

/// Hum level at volume 1.0 (−60 dBFS).
const HUM_LEVEL: f64 = 0.001;

/// RMS voltage of Johnson–Nyquist noise across a resistor.
pub fn thermal_sigma(temperature: f64, resistance: f64, bandwidth: f64) -> f64 {
    (4.0 * BOLTZMANN * temperature * resistance * bandwidth).sqrt()
}

/// White-noise RMS at volume 1.0 under reference conditions (−60 dBFS).
const NOISE_LEVEL: f64 = 0.001;

/// Reference conditions: 290 K across 50 Ω over 1 MHz.
const REFERENCE_SIGMA_ARGS: (f64, f64, f64) = (290.0, 50.0, 1e6);

/// Output RMS of the white-noise bed.
///
/// Reference conditions land at `NOISE_LEVEL × volume`; other conditions
/// scale that by the ratio of their thermal voltages.
pub fn white_noise_sigma(volume: f64, temperature: f64, resistance: f64, bandwidth: f64) -> f64 {
    let (t, r, b) = REFERENCE_SIGMA_ARGS;
    NOISE_LEVEL * volume * thermal_sigma(temperature, resistance, bandwidth) / thermal_sigma(t, r, b)
}

/// Spectral tint of the noise mixed into a hum bed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tint {
    None,
    White,
    Pink,
    Brown,
    Blue,
}

/// Harmonic roll-off and noise mix for one hum colour.
#[derive(Debug, Clone, Copy)]
struct HumShape {
    /// Harmonic `h` has amplitude `1 / h^decay`.
    decay: f64,
    harmonics: u32,
    tint: Tint,
    noise_gain: f64,
}

fn shape(color: HumColor) -> HumShape {
    let (decay, harmonics, tint, noise_gain) = match color {
        HumColor::XxBlack => (3.0, 4, Tint::None, 0.0),
        HumColor::XBlack => (2.5, 6, Tint::None, 0.0),
        HumColor::Black => (2.0, 8, Tint::Brown, 0.02),
        HumColor::Grey00 => (1.5, 12, Tint::Pink, 0.05),
        HumColor::Grey10 => (1.0, 16, Tint::Pink, 0.1),
        HumColor::Grey20Em => (1.0, 24, Tint::Pink, 0.2),
        HumColor::White => (1.0, 16, Tint::White, 0.2),
        HumColor::Red => (2.0, 8, Tint::Brown, 0.3),
        HumColor::Green => (0.5, 16, Tint::Pink, 0.2),
        HumColor::Blue => (0.5, 24, Tint::Blue, 0.2),
    };
    HumShape { decay, harmonics, tint, noise_gain }
}

/// Seeded source for every random bed in one render.
pub struct NoiseGenerator {
    rng: StdRng,
    /// Paul Kellet's economy pink filter.
    pink_state: [f64; 7],
    brown_state: f64,
    last_white: f64,
}

impl NoiseGenerator {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { rng, pink_state: [0.0; 7], brown_state: 0.0, last_white: 0.0 }
    }

    /// Standard normal deviate (Box–Muller).
    pub fn gaussian(&mut self) -> f64 {
        let u1 = 1.0 - self.rng.random::<f64>();
        let u2 = self.rng.random::<f64>();
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    /// Uniform in `[-1, 1)`.
    pub fn uniform(&mut self) -> f64 {
        self.rng.random::<f64>() * 2.0 - 1.0
    }

    fn pink(&mut self) -> f64 {
        let white = self.uniform();
        let p = &mut self.pink_state;
        p[0] = 0.99886 * p[0] + white * 0.0555179;
        p[1] = 0.99332 * p[1] + white * 0.0750759;
        p[2] = 0.96900 * p[2] + white * 0.1538520;
        p[3] = 0.86650 * p[3] + white * 0.3104856;
        p[4] = 0.55000 * p[4] + white * 0.5329522;
        p[5] = -0.7616 * p[5] - white * 0.0168980;
        let pink = p[0] + p[1] + p[2] + p[3] + p[4] + p[5] + p[6] + white * 0.5362;
        p[6] = white * 0.115926;
        (pink * 0.11).clamp(-1.0, 1.0)
    }

    fn brown(&mut self) -> f64 {
        let white = self.uniform();
        self.brown_state = ((self.brown_state + white * 0.02) * 0.999).clamp(-1.0, 1.0);
        self.brown_state
    }

    fn blue(&mut self) -> f64 {
        let white = self.uniform();
        let blue = (white - self.last_white) * 0.5;
        self.last_white = white;
        blue
    }

    fn tinted(&mut self, tint: Tint) -> f64 {
        match tint {
            Tint::None => 0.0,
            Tint::White => self.uniform(),
            Tint::Pink => self.pink(),
            Tint::Brown => self.brown(),
            Tint::Blue => self.blue(),
        }
    }

    /// White noise with RMS `sigma`.
    pub fn white_noise(&mut self, len: usize, kind: NoiseKind, sigma: f64) -> Vec<f64> {
        match kind {
            NoiseKind::Gaussian => (0..len).map(|_| self.gaussian() * sigma).collect(),
            // A uniform variable on [-a, a] has RMS a / √3.
            NoiseKind::Uniform => (0..len).map(|_| self.uniform() * sigma * 3f64.sqrt()).collect(),
        }
    }

    /// Mains harmonics plus the colour's noise, scaled by `volume`.
    pub fn mains_hum(&mut self, len: usize, sample_rate: f64, mains_hz: f64, color: HumColor, volume: f64) -> Vec<f64> {
        let shape = shape(color);
        let nyquist = sample_rate / 2.0;
        let partials: Vec<(f64, f64, f64)> = (1..=shape.harmonics)
            .map(|h| h as f64)
            .take_while(|h| h * mains_hz < nyquist)
            .map(|h| {
                let phase = self.rng.random::<f64>() * 2.0 * PI;
                (2.0 * PI * h * mains_hz / sample_rate, 1.0 / h.powf(shape.decay), phase)
            })
            .collect();
        let norm: f64 = partials.iter().map(|p| p.1).sum::<f64>() + shape.noise_gain;
        let scale = if norm > 0.0 { HUM_LEVEL * volume / norm } else { 0.0 };

        (0..len)
            .map(|i| {
                let t = i as f64;
                let tone: f64 = partials.iter().map(|&(w, a, phase)| a * (w * t + phase).sin()).sum();
                (tone + shape.noise_gain * self.tinted(shape.tint)) * scale
            })
            .collect()
    }
}

/// Add `bed` into every channel.
pub fn mix_into(channels: &mut [Vec<f64>], bed: &[f64]) {
    for ch in channels.iter_mut() {
        for (s, n) in ch.iter_mut().zip(bed) {
            *s += n;
        }
    }
}
