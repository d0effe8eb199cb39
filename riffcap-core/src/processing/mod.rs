pub mod sample_convert;
pub mod triggers;
pub mod wav_format;
