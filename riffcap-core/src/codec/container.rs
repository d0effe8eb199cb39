use std::fs;
use std::path::Path;

use super::chunk::{
    Chunk, DisplayImage, FormatChunk, Instrument, LoopPoint, MetadataEntry, SamplerChunk, SamplerInfo, TAG_RIFF,
    TAG_WAVE,
};
use super::reader::{tag_name, ByteReader};
use crate::models::error::WavError;
use crate::models::format::{SampleFormat, WavSpec};
use crate::processing::sample_convert::{self, Dither};

/// Where a chunk sat in the file it was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    pub tag: [u8; 4],
    /// Offset of the chunk header from the start of the file.
    pub offset: u64,
    /// Declared body size.
    pub size: u32,
}

/// Output encoding for [`WavContainer::save`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    pub format: SampleFormat,
    pub bits_per_sample: u16,
    /// Overrides the container's rate when set.
    pub sample_rate: Option<u32>,
    /// TPDF dither on 16-bit PCM output.
    pub dither: bool,
    /// Seed for reproducible dither.
    pub dither_seed: Option<u64>,
}

impl SaveOptions {
    pub fn pcm(bits_per_sample: u16) -> Self {
        Self { format: SampleFormat::Pcm, bits_per_sample, sample_rate: None, dither: false, dither_seed: None }
    }

    pub fn float() -> Self {
        Self { format: SampleFormat::IeeeFloat, bits_per_sample: 32, sample_rate: None, dither: false, dither_seed: None }
    }
}

/// A decoded WAV file: format, raw sample bytes and metadata chunks.
///
/// Sample bytes stay in their stored encoding until read through
/// [`samples`](Self::samples) or [`all_samples`](Self::all_samples).
#[derive(Debug, Clone, PartialEq)]
pub struct WavContainer {
    spec: WavSpec,
    data: Vec<u8>,
    sampler: SamplerInfo,
    loops: Vec<LoopPoint>,
    metadata: Vec<MetadataEntry>,
    display_images: Vec<DisplayImage>,
    instrument: Option<Instrument>,
    layout: Vec<ChunkSpan>,
}

impl WavContainer {
    /// An empty container used as a template for saving.
    pub fn new(spec: WavSpec) -> Self {
        Self {
            spec,
            data: Vec::new(),
            sampler: SamplerInfo::default(),
            loops: Vec::new(),
            metadata: Vec::new(),
            display_images: Vec::new(),
            instrument: None,
            layout: Vec::new(),
        }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, WavError> {
        let path = path.as_ref();
        let bytes = fs::read(path)
            .map_err(|e| WavError::StorageError(format!("failed to read {}: {}", path.display(), e)))?;
        Self::load_from_memory(&bytes)
    }

    /// Parse a complete RIFF/WAVE image.
    pub fn load_from_memory(bytes: &[u8]) -> Result<Self, WavError> {
        let mut header = ByteReader::new(bytes, "RIFF");
        let magic = header.tag().map_err(|_| WavError::NotRiffWave)?;
        let riff_size = header.u32_le().map_err(|_| WavError::NotRiffWave)? as u64;
        let form = header.tag().map_err(|_| WavError::NotRiffWave)?;
        if magic != TAG_RIFF || form != TAG_WAVE {
            return Err(WavError::NotRiffWave);
        }
        if riff_size + 8 > bytes.len() as u64 {
            return Err(WavError::ChunkOverrun {
                tag: "RIFF".into(),
                declared: riff_size,
                available: bytes.len() as u64 - 8,
            });
        }

        let end = (riff_size + 8) as usize;
        let mut pos = 12usize;
        let mut format: Option<FormatChunk> = None;
        let mut data: Option<Vec<u8>> = None;
        let mut container = Self::new(WavSpec { format: SampleFormat::Pcm, channels: 1, sample_rate: 0, bits_per_sample: 16 });

        while pos + 8 <= end {
            let mut r = ByteReader::new(&bytes[pos..end], "RIFF");
            let tag = r.tag()?;
            let size = r.u32_le()?;
            let available = (end - pos - 8) as u64;
            if size as u64 > available {
                return Err(WavError::ChunkOverrun { tag: tag_name(&tag), declared: size as u64, available });
            }
            container.layout.push(ChunkSpan { tag, offset: pos as u64, size });

            let body = r.bytes(size as usize)?;
            log::trace!("chunk {:?} at {} ({} bytes)", tag_name(&tag), pos, size);
            match Chunk::decode(tag, body)? {
                Chunk::Format(f) => format = Some(f),
                Chunk::Data(d) => data = Some(d),
                Chunk::Sampler(s) => {
                    container.sampler = s.info;
                    container.loops.extend(s.loops);
                }
                Chunk::Info(entries) => container.metadata.extend(entries),
                Chunk::Id3 { frames, .. } => container.metadata.extend(frames),
                Chunk::Display(d) => container.display_images.push(d),
                Chunk::Instrument(i) => container.instrument = Some(i),
                Chunk::Unknown { tag, .. } => log::debug!("skipping chunk {:?}", tag_name(&tag)),
            }

            pos += 8 + size as usize + (size as usize & 1);
            if pos > end {
                break;
            }
        }

        let format = format.ok_or(WavError::MissingChunk("fmt "))?;
        let data = data.ok_or(WavError::MissingChunk("data"))?;
        let block_align = format.spec.block_align();
        if data.len() % block_align != 0 {
            return Err(WavError::MisalignedData { len: data.len(), block_align });
        }

        container.spec = format.spec;
        container.data = data;
        Ok(container)
    }

    pub fn spec(&self) -> WavSpec {
        self.spec
    }

    pub fn format(&self) -> SampleFormat {
        self.spec.format
    }

    pub fn channels(&self) -> u16 {
        self.spec.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.spec.sample_rate
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.spec.bits_per_sample
    }

    /// Frames per channel.
    pub fn total_samples(&self) -> u64 {
        (self.data.len() / self.spec.block_align()) as u64
    }

    /// Raw interleaved sample bytes in their stored encoding.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn sampler_info(&self) -> &SamplerInfo {
        &self.sampler
    }

    pub fn loops(&self) -> &[LoopPoint] {
        &self.loops
    }

    pub fn set_loops(&mut self, loops: Vec<LoopPoint>) {
        self.loops = loops;
    }

    pub fn metadata(&self) -> &[MetadataEntry] {
        &self.metadata
    }

    /// Text of the first entry with `id`, from either LIST/INFO or id3.
    pub fn metadata_text(&self, id: &[u8; 4]) -> Option<&str> {
        self.metadata.iter().find(|e| &e.id == id).map(|e| e.text.as_str())
    }

    /// Set or replace a LIST/INFO entry. Empty text removes it.
    pub fn set_info_text(&mut self, id: [u8; 4], text: &str) {
        self.metadata.retain(|e| !(e.is_info() && e.id == id));
        if !text.is_empty() {
            self.metadata.push(MetadataEntry::info(id, text));
        }
    }

    pub fn display_images(&self) -> &[DisplayImage] {
        &self.display_images
    }

    pub fn add_display_image(&mut self, image: DisplayImage) {
        self.display_images.push(image);
    }

    pub fn instrument(&self) -> Option<&Instrument> {
        self.instrument.as_ref()
    }

    pub fn set_instrument(&mut self, instrument: Option<Instrument>) {
        self.instrument = instrument;
    }

    /// Chunks seen while loading, in file order.
    pub fn chunk_layout(&self) -> &[ChunkSpan] {
        &self.layout
    }

    /// Frames `from..to` of `channel` in the working format.
    pub fn samples(&self, channel: u16, from: u64, to: u64) -> Result<Vec<f64>, WavError> {
        sample_convert::decode_channel(&self.data, &self.spec, channel, from, to)
    }

    /// Every channel, fully decoded.
    pub fn all_samples(&self) -> Result<Vec<Vec<f64>>, WavError> {
        let total = self.total_samples();
        (0..self.spec.channels).map(|ch| self.samples(ch, 0, total)).collect()
    }

    /// Serialize `batches` with this container's loops and metadata.
    pub fn to_bytes(&self, batches: &[Vec<f64>], options: &SaveOptions) -> Result<Vec<u8>, WavError> {
        let channels = u16::try_from(batches.len())
            .map_err(|_| WavError::ConfigurationFailed(format!("{} channels exceeds the fmt channel field", batches.len())))?;
        let spec = WavSpec {
            format: options.format,
            channels,
            sample_rate: options.sample_rate.unwrap_or(self.spec.sample_rate),
            bits_per_sample: options.bits_per_sample,
        };
        spec.validate()?;

        let mut dither = match (options.dither, options.dither_seed) {
            (true, Some(seed)) => Some(Dither::seeded(seed)),
            (true, None) => Some(Dither::new()),
            (false, _) => None,
        };
        let payload = sample_convert::encode(batches, spec.format, spec.bits_per_sample, dither.as_mut())?;

        let mut chunks = vec![Chunk::Format(FormatChunk::new(spec)), Chunk::Data(payload)];
        if !self.loops.is_empty() {
            chunks.push(Chunk::Sampler(SamplerChunk {
                info: self.sampler,
                loops: self.loops.clone(),
                sampler_data: Vec::new(),
            }));
        }
        if self.metadata.iter().any(MetadataEntry::is_info) {
            chunks.push(Chunk::Info(self.metadata.clone()));
        }
        if let Some(instrument) = self.instrument {
            chunks.push(Chunk::Instrument(instrument));
        }
        chunks.extend(self.display_images.iter().cloned().map(Chunk::Display));

        let riff_size = 4 + chunks.iter().map(|c| c.encoded_len() as u64).sum::<u64>();
        if riff_size > u32::MAX as u64 {
            return Err(WavError::StorageError(format!("{} bytes exceeds the RIFF size limit", riff_size)));
        }

        let mut out = Vec::with_capacity(riff_size as usize + 8);
        out.extend_from_slice(&TAG_RIFF);
        out.extend_from_slice(&(riff_size as u32).to_le_bytes());
        out.extend_from_slice(&TAG_WAVE);
        for chunk in &chunks {
            chunk.encode(&mut out);
        }
        Ok(out)
    }

    pub fn save(&self, path: impl AsRef<Path>, batches: &[Vec<f64>], options: &SaveOptions) -> Result<(), WavError> {
        let path = path.as_ref();
        let bytes = self.to_bytes(batches, options)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| WavError::StorageError(format!("failed to create directory: {}", e)))?;
        }
        fs::write(path, bytes).map_err(|e| WavError::StorageError(format!("failed to write {}: {}", path.display(), e)))
    }

    /// Save as integer PCM, defaulting to this container's rate and depth.
    pub fn save_as_pcm(
        &self,
        path: impl AsRef<Path>,
        batches: &[Vec<f64>],
        override_rate: Option<u32>,
        override_bits: Option<u16>,
    ) -> Result<(), WavError> {
        let options = SaveOptions {
            sample_rate: override_rate,
            ..SaveOptions::pcm(override_bits.unwrap_or(self.spec.bits_per_sample))
        };
        self.save(path, batches, &options)
    }
}
