//! Conversion between stored sample bytes and the `f64` working format.
//!
//! Integer PCM maps linearly onto `[-1.0, 1.0)` with a divisor of
//! `2^(bits-1)`. 8-bit PCM is stored unsigned with a bias of 128.
//! IEEE float passes through unchanged.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::error::WavError;
use crate::models::format::{SampleFormat, WavSpec};

/// Triangular (TPDF) dither source for 16-bit quantization.
#[derive(Debug, Clone)]
pub struct Dither {
    rng: StdRng,
}

impl Dither {
    pub fn new() -> Self {
        Self { rng: StdRng::from_os_rng() }
    }

    /// Reproducible dither for tests and deterministic renders.
    pub fn seeded(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    /// One TPDF offset in LSB units, in `(-1.0, 1.0)`.
    fn next_offset(&mut self) -> f64 {
        self.rng.random::<f64>() - self.rng.random::<f64>()
    }
}

impl Default for Dither {
    fn default() -> Self {
        Self::new()
    }
}

fn full_scale(bits: u16) -> f64 {
    (1u64 << (bits - 1)) as f64
}

/// Decode one stored sample starting at `bytes[0]`.
///
/// `bytes` must hold at least `bits / 8` bytes.
pub fn decode_sample(bytes: &[u8], format: SampleFormat, bits: u16) -> f64 {
    match (format, bits) {
        (SampleFormat::IeeeFloat, _) => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
        (SampleFormat::Pcm, 8) => (bytes[0] as f64 - 128.0) / 128.0,
        (SampleFormat::Pcm, 16) => i16::from_le_bytes([bytes[0], bytes[1]]) as f64 / full_scale(16),
        (SampleFormat::Pcm, 24) => {
            // Sign-extend by placing the 3 bytes in the top of an i32.
            let raw = i32::from_le_bytes([0, bytes[0], bytes[1], bytes[2]]) >> 8;
            raw as f64 / full_scale(24)
        }
        (SampleFormat::Pcm, _) => {
            i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64 / full_scale(32)
        }
    }
}

/// Decode frames `from..to` of one channel from an interleaved byte buffer.
pub fn decode_channel(bytes: &[u8], spec: &WavSpec, channel: u16, from: u64, to: u64) -> Result<Vec<f64>, WavError> {
    if channel >= spec.channels {
        return Err(WavError::ChannelOutOfRange { channel, channels: spec.channels });
    }
    let block_align = spec.block_align();
    let available = if block_align == 0 { 0 } else { (bytes.len() / block_align) as u64 };
    if from > to || to > available {
        return Err(WavError::RangeOutOfBounds { from, to, available });
    }

    let width = spec.bytes_per_sample();
    let offset = channel as usize * width;
    let mut out = Vec::with_capacity((to - from) as usize);
    for frame in from..to {
        let start = frame as usize * block_align + offset;
        out.push(decode_sample(&bytes[start..start + width], spec.format, spec.bits_per_sample));
    }
    Ok(out)
}

/// Quantize one working sample and append its bytes to `out`.
pub fn encode_sample(value: f64, format: SampleFormat, bits: u16, dither: Option<&mut Dither>, out: &mut Vec<u8>) {
    if format == SampleFormat::IeeeFloat {
        out.extend_from_slice(&(value as f32).to_le_bytes());
        return;
    }

    let scale = full_scale(bits);
    let mut scaled = value * scale;
    if bits == 16 {
        if let Some(d) = dither {
            scaled += d.next_offset();
        }
    }
    let quantized = scaled.round().clamp(-scale, scale - 1.0);

    match bits {
        8 => out.push((quantized as i16 + 128) as u8),
        16 => out.extend_from_slice(&(quantized as i16).to_le_bytes()),
        24 => out.extend_from_slice(&(quantized as i32).to_le_bytes()[..3]),
        _ => out.extend_from_slice(&(quantized as i32).to_le_bytes()),
    }
}

/// Encode already-interleaved frames.
pub fn encode_interleaved(samples: &[f64], format: SampleFormat, bits: u16, mut dither: Option<&mut Dither>) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * bits as usize / 8);
    for &s in samples {
        encode_sample(s, format, bits, dither.as_deref_mut(), &mut out);
    }
    out
}

/// Interleave per-channel batches and encode them.
///
/// Every batch must have the same length.
pub fn encode(
    batches: &[Vec<f64>],
    format: SampleFormat,
    bits: u16,
    mut dither: Option<&mut Dither>,
) -> Result<Vec<u8>, WavError> {
    format.validate_bits(bits)?;
    let frames = batches.first().map_or(0, Vec::len);
    if batches.iter().any(|b| b.len() != frames) {
        return Err(WavError::UnevenBatches);
    }

    let mut out = Vec::with_capacity(frames * batches.len() * bits as usize / 8);
    for frame in 0..frames {
        for batch in batches {
            encode_sample(batch[frame], format, bits, dither.as_deref_mut(), &mut out);
        }
    }
    Ok(out)
}
