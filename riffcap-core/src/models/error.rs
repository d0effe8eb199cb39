use thiserror::Error;

/// Errors produced by the codec, the converter and the stream writer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WavError {
    #[error("not a RIFF/WAVE file")]
    NotRiffWave,

    #[error("missing {0} chunk")]
    MissingChunk(&'static str),

    #[error("chunk {tag:?} declares {declared} bytes but only {available} remain")]
    ChunkOverrun {
        tag: String,
        declared: u64,
        available: u64,
    },

    #[error("malformed {chunk} chunk: {reason}")]
    MalformedChunk { chunk: &'static str, reason: String },

    #[error("unsupported format code {0:#06x}")]
    UnsupportedFormat(u16),

    #[error("unsupported bit depth {bits} for {format}")]
    UnsupportedBitDepth { format: &'static str, bits: u16 },

    #[error("data length {len} is not a multiple of the {block_align}-byte frame")]
    MisalignedData { len: usize, block_align: usize },

    #[error("sample range {from}..{to} is outside 0..{available}")]
    RangeOutOfBounds { from: u64, to: u64, available: u64 },

    #[error("channel {channel} out of range for {channels}-channel audio")]
    ChannelOutOfRange { channel: u16, channels: u16 },

    #[error("channel batches differ in length")]
    UnevenBatches,

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("queue full: sample buffer rejected")]
    QueueFull,

    #[error("storage error: {0}")]
    StorageError(String),
}
