//! RIFF/WAVE chunk codec and the in-memory file model.

pub mod chunk;
pub mod container;
pub(crate) mod reader;
