pub mod filters;
pub mod leveling;
pub mod noise;
pub mod render;
pub mod resample;
