//! Streaming header helpers.
//!
//! The stream writer emits the RIFF header up front with zeroed sizes, then
//! patches the two size fields once the final length is known. The `fmt `
//! chunk is encoded by the container codec, so streamed and saved files share
//! one layout.

use crate::codec::chunk::{Chunk, FormatChunk};
use crate::models::format::WavSpec;

/// Offset of the RIFF chunk size field.
pub const RIFF_SIZE_OFFSET: u64 = 4;

/// Header bytes that precede streamed sample data.
///
/// Layout:
/// ```text
/// "RIFF" <riff size> "WAVE"
/// "fmt " <16, or 18 with cbSize for float> <format body>
/// "data" <data size>
/// ```
#[derive(Debug, Clone)]
pub struct StreamHeader {
    bytes: Vec<u8>,
    data_size_offset: u64,
}

impl StreamHeader {
    /// Header for `spec` with both size fields zeroed.
    pub fn new(spec: WavSpec) -> Self {
        let mut bytes = Vec::with_capacity(48);
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        Chunk::Format(FormatChunk::new(spec)).encode(&mut bytes);
        bytes.extend_from_slice(b"data");
        let data_size_offset = bytes.len() as u64;
        bytes.extend_from_slice(&0u32.to_le_bytes());
        Self { bytes, data_size_offset }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn header_len(&self) -> usize {
        self.bytes.len()
    }

    pub fn data_size_offset(&self) -> u64 {
        self.data_size_offset
    }

    /// Largest data chunk the RIFF size field can describe after this header.
    pub fn max_data_bytes(&self) -> u64 {
        u32::MAX as u64 - (self.bytes.len() as u64 - 8) - 1
    }

    /// RIFF and data size field values once `data_bytes` sample bytes, plus
    /// the pad byte for odd lengths, follow the header.
    pub fn size_fields(&self, data_bytes: u64) -> (u32, u32) {
        let pad = data_bytes % 2;
        let riff = self.bytes.len() as u64 - 8 + data_bytes + pad;
        (riff as u32, data_bytes as u32)
    }
}

/// Average interleaved frames down to one channel.
pub fn downmix_to_mono(samples: &[f64], channels: usize) -> Vec<f64> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let scale = 1.0 / channels as f64;
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f64>() * scale)
        .collect()
}
