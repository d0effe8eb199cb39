use std::fs::{self, File};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::error::WavError;
use crate::models::format::WavSpec;
use crate::processing::wav_format::{StreamHeader, RIFF_SIZE_OFFSET};

/// Streaming WAV writer with deferred size patch-up.
///
/// ```text
/// [RIFF/fmt/data header, sizes zeroed]
/// [sample bytes...]
/// [pad byte if the data length is odd]
/// ```
///
/// The size fields are rewritten by [`close`](Self::close). A writer dropped
/// while open is closed on drop.
pub struct StreamFileWriter {
    file_path: PathBuf,
    header: StreamHeader,
    file: Option<BufWriter<File>>,
    data_bytes: u64,
}

impl StreamFileWriter {
    pub fn new(file_path: PathBuf, spec: WavSpec) -> Self {
        Self {
            file_path,
            header: StreamHeader::new(spec),
            file: None,
            data_bytes: 0,
        }
    }

    /// Create the file and write the placeholder header.
    pub fn open(&mut self) -> Result<(), WavError> {
        if self.file.is_some() {
            return Ok(());
        }

        if let Some(parent) = self.file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| WavError::StorageError(format!("failed to create directory: {}", e)))?;
        }

        let file = File::create(&self.file_path)
            .map_err(|e| WavError::StorageError(format!("failed to create file: {}", e)))?;
        let mut file = BufWriter::new(file);

        file.write_all(self.header.bytes())
            .map_err(|e| WavError::StorageError(format!("failed to write header: {}", e)))?;

        self.data_bytes = 0;
        self.file = Some(file);
        log::debug!("opened stream file {}", self.file_path.display());
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Append encoded sample bytes.
    pub fn write(&mut self, data: &[u8]) -> Result<(), WavError> {
        if data.len() as u64 > self.remaining_capacity() {
            return Err(WavError::StorageError("data chunk would exceed the 4 GiB RIFF limit".into()));
        }
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| WavError::StorageError("file is not open".into()))?;
        file.write_all(data)
            .map_err(|e| WavError::StorageError(format!("write failed: {}", e)))?;
        self.data_bytes += data.len() as u64;
        Ok(())
    }

    /// Bytes that can still be appended to the data chunk.
    pub fn remaining_capacity(&self) -> u64 {
        self.header.max_data_bytes() - self.data_bytes
    }

    pub fn data_bytes(&self) -> u64 {
        self.data_bytes
    }

    /// Pad, patch both size fields, flush and return the file's SHA-256.
    pub fn close(&mut self) -> Result<String, WavError> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| WavError::StorageError("file is not open".into()))?;

        let storage = |e: io::Error| WavError::StorageError(e.to_string());
        let pad = self.data_bytes % 2;
        if pad == 1 {
            file.write_all(&[0]).map_err(storage)?;
        }

        let (riff_size, data_size) = self.header.size_fields(self.data_bytes);
        file.seek(SeekFrom::Start(RIFF_SIZE_OFFSET)).map_err(storage)?;
        file.write_all(&riff_size.to_le_bytes()).map_err(storage)?;

        file.seek(SeekFrom::Start(self.header.data_size_offset())).map_err(storage)?;
        file.write_all(&data_size.to_le_bytes()).map_err(storage)?;

        file.flush().map_err(storage)?;
        drop(file);

        log::debug!("closed stream file {} ({} data bytes)", self.file_path.display(), self.data_bytes);
        sha256_file(&self.file_path)
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

impl Drop for StreamFileWriter {
    fn drop(&mut self) {
        if self.is_open() {
            if let Err(e) = self.close() {
                log::error!("failed to finalize {} on drop: {}", self.file_path.display(), e);
            }
        }
    }
}

/// Compute the SHA-256 hex digest of a file.
pub fn sha256_file(path: &Path) -> Result<String, WavError> {
    let mut file = File::open(path)
        .map_err(|e| WavError::StorageError(format!("failed to read file for checksum: {}", e)))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|e| WavError::StorageError(format!("checksum failed: {}", e)))?;
    Ok(hex_encode(&hasher.finalize()))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::container::WavContainer;
    use crate::models::format::SampleFormat;

    fn pcm16_stereo() -> WavSpec {
        WavSpec { format: SampleFormat::Pcm, channels: 2, sample_rate: 48000, bits_per_sample: 16 }
    }

    #[test]
    fn write_and_patch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.wav");

        let mut writer = StreamFileWriter::new(path.clone(), pcm16_stereo());
        writer.open().unwrap();
        writer.write(&[0u8; 16]).unwrap();
        let checksum = writer.close().unwrap();
        assert_eq!(checksum.len(), 64);

        let file_data = fs::read(&path).unwrap();
        assert_eq!(file_data.len(), 44 + 16);
        assert_eq!(&file_data[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes([file_data[4], file_data[5], file_data[6], file_data[7]]), 36 + 16);
        assert_eq!(u32::from_le_bytes([file_data[40], file_data[41], file_data[42], file_data[43]]), 16);

        let wav = WavContainer::open(&path).unwrap();
        assert_eq!(wav.total_samples(), 4);
    }

    #[test]
    fn odd_data_is_padded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("odd.wav");
        let spec = WavSpec { format: SampleFormat::Pcm, channels: 1, sample_rate: 8000, bits_per_sample: 8 };

        let mut writer = StreamFileWriter::new(path.clone(), spec);
        writer.open().unwrap();
        writer.write(&[128, 129, 130]).unwrap();
        writer.close().unwrap();

        let file_data = fs::read(&path).unwrap();
        assert_eq!(file_data.len(), 44 + 4);
        assert_eq!(u32::from_le_bytes([file_data[4], file_data[5], file_data[6], file_data[7]]) as usize, file_data.len() - 8);
        assert_eq!(u32::from_le_bytes([file_data[40], file_data[41], file_data[42], file_data[43]]), 3);
        assert_eq!(WavContainer::open(&path).unwrap().total_samples(), 3);
    }

    #[test]
    fn checksum_matches_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sum.wav");
        let mut writer = StreamFileWriter::new(path.clone(), pcm16_stereo());
        writer.open().unwrap();
        writer.write(&[1, 2, 3, 4]).unwrap();
        let checksum = writer.close().unwrap();

        let expected = hex_encode(&Sha256::digest(fs::read(&path).unwrap()));
        assert_eq!(checksum, expected);
    }

    #[test]
    fn float_stream_uses_extended_fmt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("float.wav");
        let spec = WavSpec { format: SampleFormat::IeeeFloat, channels: 1, sample_rate: 48000, bits_per_sample: 32 };
        let mut writer = StreamFileWriter::new(path.clone(), spec);
        writer.open().unwrap();
        writer.write(&0.25f32.to_le_bytes()).unwrap();
        writer.close().unwrap();

        let file_data = fs::read(&path).unwrap();
        assert_eq!(file_data.len(), 46 + 4);
        assert_eq!(u32::from_le_bytes([file_data[16], file_data[17], file_data[18], file_data[19]]), 18);
        assert_eq!(u32::from_le_bytes([file_data[4], file_data[5], file_data[6], file_data[7]]) as usize, file_data.len() - 8);
        assert_eq!(u32::from_le_bytes([file_data[42], file_data[43], file_data[44], file_data[45]]), 4);
        assert_eq!(WavContainer::open(&path).unwrap().all_samples().unwrap()[0], vec![0.25]);
    }

    #[test]
    fn drop_while_open_patches_sizes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abandoned.wav");
        {
            let mut writer = StreamFileWriter::new(path.clone(), pcm16_stereo());
            writer.open().unwrap();
            writer.write(&[0u8; 8]).unwrap();
        }
        let file_data = fs::read(&path).unwrap();
        assert_eq!(u32::from_le_bytes([file_data[40], file_data[41], file_data[42], file_data[43]]), 8);
        assert_eq!(WavContainer::open(&path).unwrap().total_samples(), 2);
    }

    #[test]
    fn write_before_open_fails() {
        let mut writer = StreamFileWriter::new(PathBuf::from("unused.wav"), pcm16_stereo());
        assert!(writer.write(&[0; 4]).is_err());
        assert!(writer.close().is_err());
    }

    #[test]
    fn open_fails_for_directory_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = StreamFileWriter::new(dir.path().to_path_buf(), pcm16_stereo());
        assert!(matches!(writer.open(), Err(WavError::StorageError(_))));
    }
}
