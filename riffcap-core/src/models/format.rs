use serde::{Deserialize, Serialize};

use super::error::WavError;

pub const FORMAT_PCM: u16 = 0x0001;
pub const FORMAT_IEEE_FLOAT: u16 = 0x0003;
pub const FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// Sample payload encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleFormat {
    Pcm,
    IeeeFloat,
}

impl SampleFormat {
    pub fn from_code(code: u16) -> Result<Self, WavError> {
        match code {
            FORMAT_PCM => Ok(Self::Pcm),
            FORMAT_IEEE_FLOAT => Ok(Self::IeeeFloat),
            other => Err(WavError::UnsupportedFormat(other)),
        }
    }

    pub fn code(self) -> u16 {
        match self {
            Self::Pcm => FORMAT_PCM,
            Self::IeeeFloat => FORMAT_IEEE_FLOAT,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Pcm => "PCM",
            Self::IeeeFloat => "IEEE float",
        }
    }

    /// Checks that `bits` is a depth this format can carry.
    pub fn validate_bits(self, bits: u16) -> Result<(), WavError> {
        let ok = match self {
            Self::Pcm => matches!(bits, 8 | 16 | 24 | 32),
            Self::IeeeFloat => bits == 32,
        };
        if ok {
            Ok(())
        } else {
            Err(WavError::UnsupportedBitDepth { format: self.name(), bits })
        }
    }
}

/// The shape of a sample stream: everything needed to interpret raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WavSpec {
    pub format: SampleFormat,
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

impl WavSpec {
    pub fn bytes_per_sample(&self) -> usize {
        self.bits_per_sample as usize / 8
    }

    /// Bytes per frame (one sample for every channel).
    pub fn block_align(&self) -> usize {
        self.bytes_per_sample() * self.channels as usize
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.block_align() as u32
    }

    pub fn validate(&self) -> Result<(), WavError> {
        self.format.validate_bits(self.bits_per_sample)?;
        if self.channels == 0 {
            return Err(WavError::ConfigurationFailed("channel count must be non-zero".into()));
        }
        if self.sample_rate == 0 {
            return Err(WavError::ConfigurationFailed("sample rate must be non-zero".into()));
        }
        Ok(())
    }
}
