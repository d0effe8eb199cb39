pub mod labels;
pub mod wav_editor;
