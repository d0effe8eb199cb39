pub mod persistence;
pub mod report;
