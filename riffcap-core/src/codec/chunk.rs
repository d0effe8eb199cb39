//! RIFF chunk variants with explicit little-endian decode/encode.

use serde::{Deserialize, Serialize};

use super::reader::{tag_name, ByteReader};
use crate::models::error::WavError;
use crate::models::format::{SampleFormat, WavSpec, FORMAT_EXTENSIBLE};

pub const TAG_RIFF: [u8; 4] = *b"RIFF";
pub const TAG_WAVE: [u8; 4] = *b"WAVE";
pub const TAG_FMT: [u8; 4] = *b"fmt ";
pub const TAG_DATA: [u8; 4] = *b"data";
pub const TAG_SMPL: [u8; 4] = *b"smpl";
pub const TAG_LIST: [u8; 4] = *b"LIST";
pub const TAG_INFO: [u8; 4] = *b"INFO";
pub const TAG_ID3: [u8; 4] = *b"id3 ";
pub const TAG_DISP: [u8; 4] = *b"DISP";
pub const TAG_INST: [u8; 4] = *b"inst";

/// LIST/INFO ids used for track metadata.
pub const INFO_TITLE: [u8; 4] = *b"INAM";
pub const INFO_PRODUCT: [u8; 4] = *b"IPRD";
pub const INFO_ARTIST: [u8; 4] = *b"IART";
pub const INFO_COMMENT: [u8; 4] = *b"ICMT";
pub const INFO_CREATION_DATE: [u8; 4] = *b"ICRD";
pub const INFO_GENRE: [u8; 4] = *b"IGNR";
pub const INFO_TRACK: [u8; 4] = *b"ITRK";
pub const INFO_ENGINEER: [u8; 4] = *b"IENG";

const SAMPLER_HEADER_SIZE: usize = 36;
const LOOP_RECORD_SIZE: usize = 24;
const INSTRUMENT_SIZE: usize = 7;

/// Contents of the `fmt ` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatChunk {
    pub spec: WavSpec,
    /// Byte rate as declared in the file.
    pub byte_rate: u32,
    /// Block alignment as declared in the file.
    pub block_align: u16,
}

impl FormatChunk {
    pub fn new(spec: WavSpec) -> Self {
        Self { spec, byte_rate: spec.byte_rate(), block_align: spec.block_align() as u16 }
    }

    fn decode(body: &[u8]) -> Result<Self, WavError> {
        let mut r = ByteReader::new(body, "fmt ");
        let mut code = r.u16_le()?;
        let channels = r.u16_le()?;
        let sample_rate = r.u32_le()?;
        let byte_rate = r.u32_le()?;
        let block_align = r.u16_le()?;
        let bits_per_sample = r.u16_le()?;

        if code == FORMAT_EXTENSIBLE {
            let extra = r.u16_le()? as usize;
            if extra < 22 {
                return Err(WavError::MalformedChunk {
                    chunk: "fmt ",
                    reason: format!("extensible format with {} extra bytes", extra),
                });
            }
            let _valid_bits = r.u16_le()?;
            let _channel_mask = r.u32_le()?;
            // First two bytes of the sub-format GUID carry the real code.
            code = r.u16_le()?;
        }

        let format = SampleFormat::from_code(code)?;
        format.validate_bits(bits_per_sample)?;
        if channels == 0 {
            return Err(WavError::MalformedChunk { chunk: "fmt ", reason: "zero channels".into() });
        }

        Ok(Self {
            spec: WavSpec { format, channels, sample_rate, bits_per_sample },
            byte_rate,
            block_align,
        })
    }

    fn encode_body(&self, out: &mut Vec<u8>) {
        let spec = &self.spec;
        out.extend_from_slice(&spec.format.code().to_le_bytes());
        out.extend_from_slice(&spec.channels.to_le_bytes());
        out.extend_from_slice(&spec.sample_rate.to_le_bytes());
        out.extend_from_slice(&spec.byte_rate().to_le_bytes());
        out.extend_from_slice(&(spec.block_align() as u16).to_le_bytes());
        out.extend_from_slice(&spec.bits_per_sample.to_le_bytes());
        if spec.format != SampleFormat::Pcm {
            out.extend_from_slice(&0u16.to_le_bytes());
        }
    }
}

/// One sustain loop from the `smpl` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LoopPoint {
    pub cue_id: u32,
    pub loop_type: u32,
    pub start: u32,
    pub end: u32,
    pub fraction: u32,
    pub play_count: u32,
}

impl LoopPoint {
    /// A forward loop over `start..=end` that repeats forever.
    pub fn forward(start: u32, end: u32) -> Self {
        Self { start, end, ..Default::default() }
    }
}

/// Fixed header fields of the `smpl` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplerInfo {
    pub manufacturer: u32,
    pub product: u32,
    /// Nanoseconds per sample.
    pub sample_period: u32,
    pub midi_unity_note: u32,
    pub midi_pitch_fraction: u32,
    pub smpte_format: u32,
    pub smpte_offset: u32,
}

impl Default for SamplerInfo {
    fn default() -> Self {
        Self {
            manufacturer: 0,
            product: 0,
            sample_period: 0,
            midi_unity_note: 64,
            midi_pitch_fraction: 0,
            smpte_format: 0,
            smpte_offset: 0,
        }
    }
}

/// `smpl` chunk: sampler header plus loop records.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SamplerChunk {
    pub info: SamplerInfo,
    pub loops: Vec<LoopPoint>,
    pub sampler_data: Vec<u8>,
}

impl SamplerChunk {
    fn decode(body: &[u8]) -> Result<Self, WavError> {
        let mut r = ByteReader::new(body, "smpl");
        let info = SamplerInfo {
            manufacturer: r.u32_le()?,
            product: r.u32_le()?,
            sample_period: r.u32_le()?,
            midi_unity_note: r.u32_le()?,
            midi_pitch_fraction: r.u32_le()?,
            smpte_format: r.u32_le()?,
            smpte_offset: r.u32_le()?,
        };
        let loop_count = r.u32_le()? as usize;
        let sampler_data_len = r.u32_le()? as usize;

        if loop_count > r.remaining() / LOOP_RECORD_SIZE {
            return Err(WavError::MalformedChunk {
                chunk: "smpl",
                reason: format!("{} loops declared, room for {}", loop_count, r.remaining() / LOOP_RECORD_SIZE),
            });
        }

        let mut loops = Vec::with_capacity(loop_count);
        for _ in 0..loop_count {
            let lp = LoopPoint {
                cue_id: r.u32_le()?,
                loop_type: r.u32_le()?,
                start: r.u32_le()?,
                end: r.u32_le()?,
                fraction: r.u32_le()?,
                play_count: r.u32_le()?,
            };
            if lp.start > lp.end {
                return Err(WavError::MalformedChunk {
                    chunk: "smpl",
                    reason: format!("loop {} starts at {} after its end {}", lp.cue_id, lp.start, lp.end),
                });
            }
            loops.push(lp);
        }

        let sampler_data = r.bytes(sampler_data_len.min(r.remaining()))?.to_vec();
        Ok(Self { info, loops, sampler_data })
    }

    fn encode_body(&self, out: &mut Vec<u8>) {
        let i = &self.info;
        for v in [
            i.manufacturer,
            i.product,
            i.sample_period,
            i.midi_unity_note,
            i.midi_pitch_fraction,
            i.smpte_format,
            i.smpte_offset,
            self.loops.len() as u32,
            self.sampler_data.len() as u32,
        ] {
            out.extend_from_slice(&v.to_le_bytes());
        }
        for lp in &self.loops {
            for v in [lp.cue_id, lp.loop_type, lp.start, lp.end, lp.fraction, lp.play_count] {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        out.extend_from_slice(&self.sampler_data);
    }

    fn body_len(&self) -> usize {
        SAMPLER_HEADER_SIZE + self.loops.len() * LOOP_RECORD_SIZE + self.sampler_data.len()
    }
}

/// A free-text metadata entry from LIST/INFO or an id3 text frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub id: [u8; 4],
    pub text: String,
    /// id3 frame flags; `None` for LIST/INFO entries.
    pub flags: Option<u16>,
}

impl MetadataEntry {
    pub fn info(id: [u8; 4], text: impl Into<String>) -> Self {
        Self { id, text: text.into(), flags: None }
    }

    pub fn is_info(&self) -> bool {
        self.flags.is_none()
    }
}

fn decode_info_list(body: &[u8]) -> Result<Vec<MetadataEntry>, WavError> {
    let mut r = ByteReader::new(body, "LIST");
    let _form = r.tag()?;
    let mut entries = Vec::new();
    while r.remaining() >= 8 {
        let id = r.tag()?;
        let size = r.u32_le()? as usize;
        if size > r.remaining() {
            return Err(WavError::ChunkOverrun {
                tag: tag_name(&id),
                declared: size as u64,
                available: r.remaining() as u64,
            });
        }
        let raw = r.bytes(size)?;
        if size % 2 == 1 && r.remaining() > 0 {
            r.skip(1)?;
        }
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        entries.push(MetadataEntry::info(id, String::from_utf8_lossy(&raw[..end]).into_owned()));
    }
    Ok(entries)
}

fn encode_info_list(entries: &[MetadataEntry], out: &mut Vec<u8>) {
    out.extend_from_slice(&TAG_INFO);
    for entry in entries.iter().filter(|e| e.is_info()) {
        let text = entry.text.as_bytes();
        let size = text.len() + 1;
        out.extend_from_slice(&entry.id);
        out.extend_from_slice(&(size as u32).to_le_bytes());
        out.extend_from_slice(text);
        out.push(0);
        if size % 2 == 1 {
            out.push(0);
        }
    }
}

/// Decode a 28-bit synchsafe integer stored big-endian in `raw`.
pub fn decode_synchsafe(raw: u32) -> Result<u32, WavError> {
    if raw & 0x8080_8080 != 0 {
        return Err(WavError::MalformedChunk {
            chunk: "id3 ",
            reason: format!("size {:#010x} is not synchsafe", raw),
        });
    }
    Ok(((raw >> 24) & 0x7F) << 21 | ((raw >> 16) & 0x7F) << 14 | ((raw >> 8) & 0x7F) << 7 | (raw & 0x7F))
}

fn decode_id3_text(data: &[u8]) -> String {
    let Some((&encoding, body)) = data.split_first() else {
        return String::new();
    };
    let text = match encoding {
        1 | 2 => {
            let (big_endian, body) = match body {
                [0xFE, 0xFF, rest @ ..] => (true, rest),
                [0xFF, 0xFE, rest @ ..] => (false, rest),
                _ => (encoding == 2, body),
            };
            let units: Vec<u16> = body
                .chunks_exact(2)
                .map(|c| if big_endian { u16::from_be_bytes([c[0], c[1]]) } else { u16::from_le_bytes([c[0], c[1]]) })
                .collect();
            String::from_utf16_lossy(&units)
        }
        3 => String::from_utf8_lossy(body).into_owned(),
        _ => body.iter().map(|&b| b as char).collect(),
    };
    text.trim_end_matches('\0').to_string()
}

fn decode_id3(body: &[u8]) -> Result<Vec<MetadataEntry>, WavError> {
    let mut r = ByteReader::new(body, "id3 ");
    if r.bytes(3)? != b"ID3" {
        return Err(WavError::MalformedChunk { chunk: "id3 ", reason: "missing ID3 magic".into() });
    }
    let major = r.u8()?;
    let _revision = r.u8()?;
    let flags = r.u8()?;
    let size = decode_synchsafe(r.u32_be()?)? as usize;
    if size > r.remaining() {
        return Err(WavError::ChunkOverrun { tag: "ID3".into(), declared: size as u64, available: r.remaining() as u64 });
    }
    let mut tag = ByteReader::new(r.bytes(size)?, "id3 ");

    if flags & 0x40 != 0 {
        let ext = tag.u32_be()?;
        let skip = if major >= 4 { (decode_synchsafe(ext)? as usize).saturating_sub(4) } else { ext as usize };
        tag.skip(skip)?;
    }

    let mut entries = Vec::new();
    while tag.remaining() >= 10 {
        let id = tag.tag()?;
        if id[0] == 0 {
            break;
        }
        let raw_size = tag.u32_be()?;
        let frame_size = if major >= 4 { decode_synchsafe(raw_size)? } else { raw_size } as usize;
        let frame_flags = tag.u16_be()?;
        if frame_size > tag.remaining() {
            return Err(WavError::ChunkOverrun {
                tag: tag_name(&id),
                declared: frame_size as u64,
                available: tag.remaining() as u64,
            });
        }
        let data = tag.bytes(frame_size)?;
        if id[0] == b'T' {
            entries.push(MetadataEntry { id, text: decode_id3_text(data), flags: Some(frame_flags) });
        }
    }
    Ok(entries)
}

/// Vendor display image: a type word and opaque bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayImage {
    pub kind: u32,
    pub data: Vec<u8>,
}

/// `inst` chunk fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Instrument {
    pub unshifted_note: u8,
    pub fine_tune: i8,
    pub gain: i8,
    pub low_note: u8,
    pub high_note: u8,
    pub low_velocity: u8,
    pub high_velocity: u8,
}

impl Instrument {
    fn decode(body: &[u8]) -> Result<Self, WavError> {
        let mut r = ByteReader::new(body, "inst");
        let b = r.bytes(INSTRUMENT_SIZE)?;
        Ok(Self {
            unshifted_note: b[0],
            fine_tune: b[1] as i8,
            gain: b[2] as i8,
            low_note: b[3],
            high_note: b[4],
            low_velocity: b[5],
            high_velocity: b[6],
        })
    }

    fn encode_body(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&[
            self.unshifted_note,
            self.fine_tune as u8,
            self.gain as u8,
            self.low_note,
            self.high_note,
            self.low_velocity,
            self.high_velocity,
        ]);
    }
}

/// One RIFF chunk inside a WAVE form.
#[derive(Debug, Clone, PartialEq)]
pub enum Chunk {
    Format(FormatChunk),
    Data(Vec<u8>),
    Sampler(SamplerChunk),
    Info(Vec<MetadataEntry>),
    /// id3 text frames plus the raw chunk body.
    Id3 { frames: Vec<MetadataEntry>, raw: Vec<u8> },
    Display(DisplayImage),
    Instrument(Instrument),
    Unknown { tag: [u8; 4], body: Vec<u8> },
}

impl Chunk {
    /// Decode one chunk body. Unrecognized tags and non-INFO lists are kept
    /// as `Unknown`.
    pub fn decode(tag: [u8; 4], body: &[u8]) -> Result<Self, WavError> {
        match &tag {
            b"fmt " => FormatChunk::decode(body).map(Chunk::Format),
            b"data" => Ok(Chunk::Data(body.to_vec())),
            b"smpl" => SamplerChunk::decode(body).map(Chunk::Sampler),
            b"LIST" if body.len() >= 4 && body[0..4] == TAG_INFO => decode_info_list(body).map(Chunk::Info),
            b"id3 " | b"ID3 " => Ok(Chunk::Id3 { frames: decode_id3(body)?, raw: body.to_vec() }),
            b"DISP" => {
                let mut r = ByteReader::new(body, "DISP");
                let kind = r.u32_le()?;
                Ok(Chunk::Display(DisplayImage { kind, data: r.rest().to_vec() }))
            }
            b"inst" => Instrument::decode(body).map(Chunk::Instrument),
            _ => Ok(Chunk::Unknown { tag, body: body.to_vec() }),
        }
    }

    pub fn tag(&self) -> [u8; 4] {
        match self {
            Chunk::Format(_) => TAG_FMT,
            Chunk::Data(_) => TAG_DATA,
            Chunk::Sampler(_) => TAG_SMPL,
            Chunk::Info(_) => TAG_LIST,
            Chunk::Id3 { .. } => TAG_ID3,
            Chunk::Display(_) => TAG_DISP,
            Chunk::Instrument(_) => TAG_INST,
            Chunk::Unknown { tag, .. } => *tag,
        }
    }

    /// Serialized size of the body, excluding the 8-byte header and pad.
    pub fn body_len(&self) -> usize {
        match self {
            Chunk::Format(f) => {
                if f.spec.format == SampleFormat::Pcm {
                    16
                } else {
                    18
                }
            }
            Chunk::Data(d) => d.len(),
            Chunk::Sampler(s) => s.body_len(),
            Chunk::Info(entries) => {
                4 + entries
                    .iter()
                    .filter(|e| e.is_info())
                    .map(|e| {
                        let size = e.text.len() + 1;
                        8 + size + size % 2
                    })
                    .sum::<usize>()
            }
            Chunk::Id3 { raw, .. } => raw.len(),
            Chunk::Display(d) => 4 + d.data.len(),
            Chunk::Instrument(_) => INSTRUMENT_SIZE,
            Chunk::Unknown { body, .. } => body.len(),
        }
    }

    /// Bytes this chunk occupies in a file: header, body and pad byte.
    pub fn encoded_len(&self) -> usize {
        let body = self.body_len();
        8 + body + body % 2
    }

    /// Append header, body and pad byte to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        let body_len = self.body_len();
        out.extend_from_slice(&self.tag());
        out.extend_from_slice(&(body_len as u32).to_le_bytes());
        match self {
            Chunk::Format(f) => f.encode_body(out),
            Chunk::Data(d) => out.extend_from_slice(d),
            Chunk::Sampler(s) => s.encode_body(out),
            Chunk::Info(entries) => encode_info_list(entries, out),
            Chunk::Id3 { raw, .. } => out.extend_from_slice(raw),
            Chunk::Display(d) => {
                out.extend_from_slice(&d.kind.to_le_bytes());
                out.extend_from_slice(&d.data);
            }
            Chunk::Instrument(i) => i.encode_body(out),
            Chunk::Unknown { body, .. } => out.extend_from_slice(body),
        }
        if body_len % 2 == 1 {
            out.push(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_of(chunk: &Chunk) -> Vec<u8> {
        let mut out = Vec::new();
        chunk.encode(&mut out);
        let size = u32::from_le_bytes([out[4], out[5], out[6], out[7]]) as usize;
        out[8..8 + size].to_vec()
    }

    #[test]
    fn format_chunk_layout() {
        let spec = WavSpec { format: SampleFormat::Pcm, channels: 2, sample_rate: 44100, bits_per_sample: 16 };
        let chunk = Chunk::Format(FormatChunk::new(spec));
        let mut out = Vec::new();
        chunk.encode(&mut out);
        assert_eq!(&out[0..4], b"fmt ");
        assert_eq!(u32::from_le_bytes([out[4], out[5], out[6], out[7]]), 16);
        assert_eq!(u32::from_le_bytes([out[16], out[17], out[18], out[19]]), 176400);
        assert_eq!(Chunk::decode(TAG_FMT, &out[8..]).unwrap(), chunk);
    }

    #[test]
    fn extensible_format_resolves_subformat() {
        let mut body = Vec::new();
        body.extend_from_slice(&FORMAT_EXTENSIBLE.to_le_bytes());
        body.extend_from_slice(&2u16.to_le_bytes());
        body.extend_from_slice(&48000u32.to_le_bytes());
        body.extend_from_slice(&384000u32.to_le_bytes());
        body.extend_from_slice(&8u16.to_le_bytes());
        body.extend_from_slice(&32u16.to_le_bytes());
        body.extend_from_slice(&22u16.to_le_bytes());
        body.extend_from_slice(&32u16.to_le_bytes());
        body.extend_from_slice(&3u32.to_le_bytes());
        body.extend_from_slice(&3u16.to_le_bytes());
        body.extend_from_slice(&[0u8; 14]);
        match Chunk::decode(TAG_FMT, &body).unwrap() {
            Chunk::Format(f) => assert_eq!(f.spec.format, SampleFormat::IeeeFloat),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn format_rejects_bad_depth() {
        let spec = WavSpec { format: SampleFormat::Pcm, channels: 1, sample_rate: 8000, bits_per_sample: 16 };
        let mut body = body_of(&Chunk::Format(FormatChunk::new(spec)));
        body[14] = 12;
        assert!(matches!(Chunk::decode(TAG_FMT, &body), Err(WavError::UnsupportedBitDepth { bits: 12, .. })));
        body[0] = 2;
        assert_eq!(Chunk::decode(TAG_FMT, &body), Err(WavError::UnsupportedFormat(2)));
    }

    #[test]
    fn sampler_chunk_round_trip() {
        let chunk = Chunk::Sampler(SamplerChunk {
            info: SamplerInfo::default(),
            loops: vec![LoopPoint::forward(10, 90), LoopPoint { cue_id: 1, start: 5, end: 5, ..Default::default() }],
            sampler_data: vec![],
        });
        let body = body_of(&chunk);
        assert_eq!(body.len(), 36 + 2 * 24);
        assert_eq!(Chunk::decode(TAG_SMPL, &body).unwrap(), chunk);
    }

    #[test]
    fn sampler_rejects_overlong_loop_count() {
        let chunk = Chunk::Sampler(SamplerChunk { loops: vec![LoopPoint::forward(0, 1)], ..Default::default() });
        let mut body = body_of(&chunk);
        body[28..32].copy_from_slice(&2u32.to_le_bytes());
        assert!(matches!(Chunk::decode(TAG_SMPL, &body), Err(WavError::MalformedChunk { chunk: "smpl", .. })));
    }

    #[test]
    fn sampler_rejects_inverted_loop() {
        let chunk = Chunk::Sampler(SamplerChunk { loops: vec![LoopPoint::forward(50, 10)], ..Default::default() });
        assert!(Chunk::decode(TAG_SMPL, &body_of(&chunk)).is_err());
    }

    #[test]
    fn info_list_pads_odd_entries() {
        let chunk = Chunk::Info(vec![MetadataEntry::info(INFO_TITLE, "Overworld"), MetadataEntry::info(INFO_ARTIST, "Ab")]);
        let body = body_of(&chunk);
        // "INFO" + (8 + 10) + (8 + 3 + 1 pad)
        assert_eq!(body.len(), 4 + 18 + 12);
        assert_eq!(&body[0..4], b"INFO");
        assert_eq!(Chunk::decode(TAG_LIST, &body).unwrap(), chunk);
    }

    #[test]
    fn non_info_list_is_kept_opaque() {
        let body = b"adtlxxxx".to_vec();
        assert!(matches!(Chunk::decode(TAG_LIST, &body).unwrap(), Chunk::Unknown { .. }));
    }

    #[test]
    fn synchsafe_decode() {
        assert_eq!(decode_synchsafe(0x0000_0201).unwrap(), 257);
        assert_eq!(decode_synchsafe(0x7F7F_7F7F).unwrap(), 0x0FFF_FFFF);
        assert!(decode_synchsafe(0x0000_0080).is_err());
    }

    fn id3_body(major: u8, frames: &[(&[u8; 4], &[u8])]) -> Vec<u8> {
        let mut tag = Vec::new();
        for (id, data) in frames {
            tag.extend_from_slice(*id);
            let len = data.len() as u32;
            let size = if major >= 4 {
                (len & 0x7F) | ((len >> 7) & 0x7F) << 8 | ((len >> 14) & 0x7F) << 16 | ((len >> 21) & 0x7F) << 24
            } else {
                len
            };
            tag.extend_from_slice(&size.to_be_bytes());
            tag.extend_from_slice(&0x0040u16.to_be_bytes());
            tag.extend_from_slice(data);
        }
        let mut body = b"ID3".to_vec();
        body.extend_from_slice(&[major, 0, 0]);
        let n = tag.len() as u32;
        body.extend_from_slice(&[(n >> 21) as u8 & 0x7F, (n >> 14) as u8 & 0x7F, (n >> 7) as u8 & 0x7F, n as u8 & 0x7F]);
        body.extend_from_slice(&tag);
        body
    }

    #[test]
    fn id3_text_frames_extracted() {
        let body = id3_body(3, &[(b"TIT2", b"\x00Title"), (b"APIC", b"\x00binary"), (b"TPE1", b"\x03Artist\x00")]);
        match Chunk::decode(TAG_ID3, &body).unwrap() {
            Chunk::Id3 { frames, raw } => {
                assert_eq!(raw, body);
                assert_eq!(frames.len(), 2);
                assert_eq!(frames[0].text, "Title");
                assert_eq!(frames[0].flags, Some(0x0040));
                assert_eq!(&frames[1].id, b"TPE1");
                assert_eq!(frames[1].text, "Artist");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn id3_v4_uses_synchsafe_frame_sizes() {
        let long = [b'x'; 200];
        let mut data = vec![0u8];
        data.extend_from_slice(&long);
        let body = id3_body(4, &[(b"TALB", &data)]);
        match Chunk::decode(TAG_ID3, &body).unwrap() {
            Chunk::Id3 { frames, .. } => assert_eq!(frames[0].text.len(), 200),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn id3_utf16_text() {
        let body = id3_body(3, &[(b"TIT2", &[1, 0xFF, 0xFE, b'H', 0, b'i', 0])]);
        match Chunk::decode(TAG_ID3, &body).unwrap() {
            Chunk::Id3 { frames, .. } => assert_eq!(frames[0].text, "Hi"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn id3_rejects_non_synchsafe_size() {
        let mut body = id3_body(3, &[(b"TIT2", b"\x00T")]);
        body[9] |= 0x80;
        assert!(Chunk::decode(TAG_ID3, &body).is_err());
    }

    #[test]
    fn display_and_instrument_round_trip() {
        let disp = Chunk::Display(DisplayImage { kind: 8, data: vec![1, 2, 3] });
        assert_eq!(Chunk::decode(TAG_DISP, &body_of(&disp)).unwrap(), disp);

        let inst = Chunk::Instrument(Instrument {
            unshifted_note: 60,
            fine_tune: -3,
            gain: -6,
            low_note: 0,
            high_note: 127,
            low_velocity: 1,
            high_velocity: 127,
        });
        let mut out = Vec::new();
        inst.encode(&mut out);
        // 7-byte body gets a pad byte.
        assert_eq!(out.len(), 16);
        assert_eq!(inst.encoded_len(), 16);
        assert_eq!(Chunk::decode(TAG_INST, &body_of(&inst)).unwrap(), inst);
    }

    #[test]
    fn unknown_chunks_preserved() {
        let chunk = Chunk::decode(*b"junk", &[9, 9, 9]).unwrap();
        assert_eq!(chunk.tag(), *b"junk");
        assert_eq!(body_of(&chunk), vec![9, 9, 9]);
    }
}
