//! # riffcap-core
//!
//! WAV/RIFF codec and stream-to-disk capture.
//!
//! Reads and writes RIFF/WAVE files with their auxiliary chunks, converts
//! between stored sample encodings and the `f64` working format, and streams
//! pushed samples to disk on a background writer thread gated by start/end
//! triggers.
//!
//! ## Architecture
//!
//! ```text
//! riffcap-core (this crate)
//! ├── codec/        ← Chunk, WavContainer, SaveOptions
//! ├── models/       ← WavError, WavSpec, StreamConfiguration, StreamState, StreamResult
//! ├── processing/   ← sample conversion, start/end triggers, WAV header generation
//! ├── session/      ← StreamSession (producer → bounded queue → writer thread)
//! ├── storage/      ← StreamFileWriter (deferred size patch-up)
//! └── traits/       ← StreamDelegate
//! ```

pub mod codec;
pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use codec::chunk::{Chunk, DisplayImage, Instrument, LoopPoint, MetadataEntry, SamplerChunk, SamplerInfo};
pub use codec::container::{ChunkSpan, SaveOptions, WavContainer};
pub use models::config::{OverflowPolicy, StreamConfiguration};
pub use models::error::WavError;
pub use models::format::{SampleFormat, WavSpec};
pub use models::result::StreamResult;
pub use models::state::StreamState;
pub use processing::sample_convert::Dither;
pub use processing::triggers::{EndCondition, StartCondition, DEFAULT_SILENCE_EPSILON};
pub use session::stream_writer::StreamSession;
pub use storage::stream_file::StreamFileWriter;
pub use traits::stream_delegate::StreamDelegate;
