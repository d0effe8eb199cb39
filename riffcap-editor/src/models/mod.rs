pub mod error;
pub mod file_id;
pub mod file_set;
pub mod profile;
pub mod report;
pub mod settings;
