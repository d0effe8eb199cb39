pub mod config;
pub mod error;
pub mod format;
pub mod result;
pub mod state;
