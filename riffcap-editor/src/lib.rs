//! # riffcap-editor
//!
//! Turns raw WAV captures into finished tracks.
//!
//! Groups a recording with its numbered continuation files and label file,
//! then renders every set through trim, filtering, looping, noise beds and a
//! batch-wide leveling pass before resampling and writing tagged WAV files.
//!
//! ## Architecture
//!
//! ```text
//! riffcap-editor (this crate)
//! ├── assembler/    ← WavEditor (file sets, ids, ordering), label parsing
//! ├── mastering/    ← MasteringPipeline
//! ├── models/       ← EditorError, FileSetId, WavFileSet, settings, profiles, reports
//! ├── processing/   ← filters, noise beds, leveling, resampling, per-file render stages
//! ├── storage/      ← binary settings stream, track list and JSON report
//! └── traits/       ← RenderObserver
//! ```

pub mod assembler;
pub mod mastering;
pub mod models;
pub mod processing;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use assembler::wav_editor::WavEditor;
pub use mastering::pipeline::MasteringPipeline;
pub use models::error::{EditorError, RenderStage};
pub use models::file_id::FileSetId;
pub use models::file_set::{Label, WavFileDescriptor, WavFileSet};
pub use models::profile::{AudioCharacteristicProfile, PROFILES};
pub use models::report::{RenderReport, TrackReport};
pub use models::settings::{
    ActualHz, ChannelLayout, EditorSettings, FilterKind, FilterStage, HumColor, Leveling, MasterOutputSettings,
    NoiseKind, PerFileOutputSettings, SnapMode, TrimPoint,
};
pub use storage::persistence::{load_settings, save_settings};
pub use traits::render_observer::RenderObserver;
