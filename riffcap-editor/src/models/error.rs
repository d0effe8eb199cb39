use std::path::PathBuf;

use riffcap_core::WavError;
use thiserror::Error;

/// Pipeline stage a render failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RenderStage {
    Decode,
    Trim,
    Filter,
    Loop,
    Noise,
    Leveling,
    Resample,
    Write,
}

impl std::fmt::Display for RenderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Decode => "decode",
            Self::Trim => "trim",
            Self::Filter => "filter",
            Self::Loop => "loop",
            Self::Noise => "noise",
            Self::Leveling => "leveling",
            Self::Resample => "resample",
            Self::Write => "write",
        };
        f.write_str(name)
    }
}

/// Errors produced by the file-set assembler and the mastering pipeline.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EditorError {
    #[error(transparent)]
    Codec(#[from] WavError),

    #[error("{file}: {stage} failed: {reason}")]
    RenderFailed {
        file: PathBuf,
        stage: RenderStage,
        reason: String,
    },

    #[error("invalid {field}: {reason}")]
    InvalidSetting { field: &'static str, reason: String },

    #[error("output path {0} is one of the inputs")]
    OutputMatchesInput(PathBuf),

    #[error("output path {0} was already written by an earlier track")]
    OutputCollision(PathBuf),

    #[error("unknown file-set id {0:#010x}")]
    UnknownId(u32),

    #[error("no free file-set ids")]
    IdsExhausted,

    #[error("label file line {line}: {reason}")]
    LabelParse { line: usize, reason: String },

    #[error("settings stream: {0}")]
    Persistence(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl EditorError {
    /// Tag a failure with the file and stage it belongs to.
    pub fn at(self, file: impl Into<PathBuf>, stage: RenderStage) -> Self {
        match self {
            e @ Self::RenderFailed { .. } => e,
            other => Self::RenderFailed { file: file.into(), stage, reason: other.to_string() },
        }
    }
}
