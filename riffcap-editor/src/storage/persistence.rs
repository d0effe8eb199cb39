//! Versioned binary settings stream.
//!
//! Layout: the magic `BWAV`, a `u32` version, then every field in a fixed
//! order, little-endian. Fields introduced by a later version follow the
//! fields of the earlier one inside each record, so an older stream simply
//! stops short and the missing fields keep their defaults.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use riffcap_core::SampleFormat;

use crate::models::error::EditorError;
use crate::models::settings::{
    ActualHz, ChannelLayout, EditorSettings, FilterKind, FilterStage, HumColor, Leveling, MasterOutputSettings,
    NoiseKind, PerFileOutputSettings, SnapMode, TrimPoint,
};

pub const MAGIC: [u8; 4] = *b"BWAV";

/// Version 2 added filter kinds, falloffs, snap modes and the loop start.
/// Version 3 added dither, numbering, noise physics and loudness leveling.
pub const CURRENT_VERSION: u32 = 3;

#[derive(Default)]
struct Encoder {
    out: Vec<u8>,
}

impl Encoder {
    fn u8(&mut self, v: u8) {
        self.out.push(v);
    }

    fn bool(&mut self, v: bool) {
        self.u8(v as u8);
    }

    fn u16(&mut self, v: u16) {
        self.out.extend_from_slice(&v.to_le_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.out.extend_from_slice(&v.to_le_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.out.extend_from_slice(&v.to_le_bytes());
    }

    fn f64(&mut self, v: f64) {
        self.out.extend_from_slice(&v.to_le_bytes());
    }

    fn str(&mut self, v: &str) {
        self.u32(v.len() as u32);
        self.out.extend_from_slice(v.as_bytes());
    }

    fn trim_point(&mut self, p: TrimPoint) {
        match p {
            TrimPoint::Sample(n) => {
                self.u8(0);
                self.u64(n);
            }
            TrimPoint::Seconds(s) => {
                self.u8(1);
                self.f64(s);
            }
            TrimPoint::Label { index, offset } => {
                self.u8(2);
                self.u32(index);
                self.f64(offset);
            }
        }
    }

    fn opt_trim_point(&mut self, p: Option<TrimPoint>) {
        self.bool(p.is_some());
        if let Some(p) = p {
            self.trim_point(p);
        }
    }
}

struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn bytes(&mut self, n: usize, field: &str) -> Result<&'a [u8], EditorError> {
        if self.buf.len() - self.pos < n {
            return Err(EditorError::Persistence(format!("stream ends inside {} at offset {}", field, self.pos)));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u8(&mut self, field: &str) -> Result<u8, EditorError> {
        Ok(self.bytes(1, field)?[0])
    }

    fn bool(&mut self, field: &str) -> Result<bool, EditorError> {
        match self.u8(field)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(invalid(field, other)),
        }
    }

    fn u16(&mut self, field: &str) -> Result<u16, EditorError> {
        let b = self.bytes(2, field)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self, field: &str) -> Result<u32, EditorError> {
        let mut b = [0u8; 4];
        b.copy_from_slice(self.bytes(4, field)?);
        Ok(u32::from_le_bytes(b))
    }

    fn u64(&mut self, field: &str) -> Result<u64, EditorError> {
        let mut b = [0u8; 8];
        b.copy_from_slice(self.bytes(8, field)?);
        Ok(u64::from_le_bytes(b))
    }

    fn f64(&mut self, field: &str) -> Result<f64, EditorError> {
        let mut b = [0u8; 8];
        b.copy_from_slice(self.bytes(8, field)?);
        Ok(f64::from_le_bytes(b))
    }

    fn string(&mut self, field: &str) -> Result<String, EditorError> {
        let len = self.u32(field)? as usize;
        let bytes = self.bytes(len, field)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| EditorError::Persistence(format!("{} is not UTF-8", field)))
    }

    fn trim_point(&mut self, field: &str) -> Result<TrimPoint, EditorError> {
        match self.u8(field)? {
            0 => Ok(TrimPoint::Sample(self.u64(field)?)),
            1 => Ok(TrimPoint::Seconds(self.f64(field)?)),
            2 => Ok(TrimPoint::Label { index: self.u32(field)?, offset: self.f64(field)? }),
            other => Err(invalid(field, other)),
        }
    }

    fn opt_trim_point(&mut self, field: &str) -> Result<Option<TrimPoint>, EditorError> {
        if self.bool(field)? {
            Ok(Some(self.trim_point(field)?))
        } else {
            Ok(None)
        }
    }
}

fn invalid(field: &str, tag: u8) -> EditorError {
    EditorError::Persistence(format!("invalid {} value {}", field, tag))
}

fn snap_tag(mode: SnapMode) -> u8 {
    match mode {
        SnapMode::Exact => 0,
        SnapMode::NearestZeroCrossing => 1,
    }
}

fn snap_from(tag: u8) -> Result<SnapMode, EditorError> {
    match tag {
        0 => Ok(SnapMode::Exact),
        1 => Ok(SnapMode::NearestZeroCrossing),
        other => Err(invalid("snap mode", other)),
    }
}

fn filter_kind_from(tag: u8) -> Result<FilterKind, EditorError> {
    match tag {
        0 => Ok(FilterKind::Pole),
        1 => Ok(FilterKind::Sinc),
        other => Err(invalid("filter kind", other)),
    }
}

fn encode_actual_hz(e: &mut Encoder, hz: ActualHz) {
    let tag = match hz {
        ActualHz::ByFile => 0,
        ActualHz::Ntsc => 1,
        ActualHz::Pal => 2,
        ActualHz::Dendy => 3,
        ActualHz::PalM => 4,
        ActualHz::PalN => 5,
        ActualHz::Custom(_) => 6,
    };
    e.u8(tag);
    if let ActualHz::Custom(hz) = hz {
        e.f64(hz);
    }
}

fn decode_actual_hz(d: &mut Decoder<'_>) -> Result<ActualHz, EditorError> {
    Ok(match d.u8("actual rate")? {
        0 => ActualHz::ByFile,
        1 => ActualHz::Ntsc,
        2 => ActualHz::Pal,
        3 => ActualHz::Dendy,
        4 => ActualHz::PalM,
        5 => ActualHz::PalN,
        6 => ActualHz::Custom(d.f64("custom rate")?),
        other => return Err(invalid("actual rate", other)),
    })
}

fn encode_file(e: &mut Encoder, f: &PerFileOutputSettings) {
    // Version 1.
    e.trim_point(f.start);
    e.opt_trim_point(f.stop);
    e.bool(f.looping);
    e.f64(f.delay_secs);
    e.f64(f.fade_secs);
    e.bool(f.fade);
    e.f64(f.opening_silence_secs);
    e.f64(f.trailing_silence_secs);
    for stage in std::iter::once(&f.lpf).chain(f.hpf.iter()) {
        e.bool(stage.enabled);
        e.f64(stage.cutoff_hz);
    }
    e.f64(f.volume);
    e.bool(f.invert);
    for text in [&f.title, &f.artist, &f.album, &f.year, &f.comment, &f.prefix, &f.postfix] {
        e.str(text);
    }
    encode_actual_hz(e, f.actual_hz);

    // Version 2.
    e.u8(snap_tag(f.start_snap));
    e.u8(snap_tag(f.stop_snap));
    e.opt_trim_point(f.loop_start);
    for stage in std::iter::once(&f.lpf).chain(f.hpf.iter()) {
        e.u8(match stage.kind {
            FilterKind::Pole => 0,
            FilterKind::Sinc => 1,
        });
        e.f64(stage.falloff_db);
    }
}

fn decode_file(d: &mut Decoder<'_>, version: u32) -> Result<PerFileOutputSettings, EditorError> {
    let mut f = PerFileOutputSettings::default();
    f.start = d.trim_point("start")?;
    f.stop = d.opt_trim_point("stop")?;
    f.looping = d.bool("looping")?;
    f.delay_secs = d.f64("delay")?;
    f.fade_secs = d.f64("fade")?;
    f.fade = d.bool("fade flag")?;
    f.opening_silence_secs = d.f64("opening silence")?;
    f.trailing_silence_secs = d.f64("trailing silence")?;
    let mut stages = [FilterStage::disabled(); 4];
    for stage in stages.iter_mut() {
        stage.enabled = d.bool("filter enabled")?;
        stage.cutoff_hz = d.f64("filter cutoff")?;
        stage.kind = FilterKind::Pole;
        stage.falloff_db = crate::models::settings::DEFAULT_FALLOFF_DB;
    }
    f.volume = d.f64("volume")?;
    f.invert = d.bool("invert")?;
    for text in [&mut f.title, &mut f.artist, &mut f.album, &mut f.year, &mut f.comment, &mut f.prefix, &mut f.postfix] {
        *text = d.string("text field")?;
    }
    f.actual_hz = decode_actual_hz(d)?;

    if version >= 2 {
        f.start_snap = snap_from(d.u8("start snap")?)?;
        f.stop_snap = snap_from(d.u8("stop snap")?)?;
        f.loop_start = d.opt_trim_point("loop start")?;
        for stage in stages.iter_mut() {
            stage.kind = filter_kind_from(d.u8("filter kind")?)?;
            stage.falloff_db = d.f64("filter falloff")?;
        }
    }

    f.lpf = stages[0];
    f.hpf = [stages[1], stages[2], stages[3]];
    Ok(f)
}

fn encode_master(e: &mut Encoder, m: &MasterOutputSettings) {
    // Version 1.
    e.bool(m.mains_hum);
    e.u8(HumColor::ALL.iter().position(|c| *c == m.hum_color).unwrap_or_default() as u8);
    e.f64(m.hum_volume);
    e.bool(m.white_noise);
    e.u8(match m.noise_kind {
        NoiseKind::Gaussian => 0,
        NoiseKind::Uniform => 1,
    });
    e.f64(m.noise_volume);
    let (mode, value) = match m.leveling {
        Leveling::Absolute { peak } => (0, peak),
        Leveling::Normalize { dbfs } => (1, dbfs),
        Leveling::Loudness { dbfs } => (2, dbfs),
    };
    e.u8(mode);
    e.f64(value);
    e.u16(m.format.code());
    e.u16(m.bits_per_sample);
    e.u8(match m.layout {
        ChannelLayout::Mono => 0,
        ChannelLayout::Stereo => 1,
    });
    e.u32(m.sample_rate);
    e.str(&m.folder.to_string_lossy());

    // Version 3.
    e.bool(m.dither);
    e.bool(m.numbered);
    e.f64(m.noise_temperature);
    e.f64(m.noise_resistance);
    e.f64(m.noise_bandwidth);
    e.f64(m.mains_hz);
    e.bool(m.noise_seed.is_some());
    e.u64(m.noise_seed.unwrap_or_default());
    e.bool(m.write_track_list);
    e.bool(m.write_report);
}

fn decode_master(d: &mut Decoder<'_>, version: u32) -> Result<MasterOutputSettings, EditorError> {
    let mut m = MasterOutputSettings::default();
    m.mains_hum = d.bool("mains hum")?;
    let color = d.u8("hum color")?;
    m.hum_color = *HumColor::ALL.get(color as usize).ok_or_else(|| invalid("hum color", color))?;
    m.hum_volume = d.f64("hum volume")?;
    m.white_noise = d.bool("white noise")?;
    m.noise_kind = match d.u8("noise kind")? {
        0 => NoiseKind::Gaussian,
        1 => NoiseKind::Uniform,
        other => return Err(invalid("noise kind", other)),
    };
    m.noise_volume = d.f64("noise volume")?;
    let mode = d.u8("leveling mode")?;
    let value = d.f64("leveling target")?;
    m.leveling = match mode {
        0 => Leveling::Absolute { peak: value },
        1 => Leveling::Normalize { dbfs: value },
        2 if version >= 3 => Leveling::Loudness { dbfs: value },
        other => return Err(invalid("leveling mode", other)),
    };
    let code = d.u16("output format")?;
    m.format = SampleFormat::from_code(code)
        .map_err(|_| EditorError::Persistence(format!("invalid output format {:#06x}", code)))?;
    m.bits_per_sample = d.u16("output depth")?;
    m.layout = match d.u8("channel layout")? {
        0 => ChannelLayout::Mono,
        1 => ChannelLayout::Stereo,
        other => return Err(invalid("channel layout", other)),
    };
    m.sample_rate = d.u32("output rate")?;
    m.folder = PathBuf::from(d.string("output folder")?);

    if version >= 3 {
        m.dither = d.bool("dither")?;
        m.numbered = d.bool("numbered")?;
        m.noise_temperature = d.f64("noise temperature")?;
        m.noise_resistance = d.f64("noise resistance")?;
        m.noise_bandwidth = d.f64("noise bandwidth")?;
        m.mains_hz = d.f64("mains frequency")?;
        let has_seed = d.bool("noise seed flag")?;
        let seed = d.u64("noise seed")?;
        m.noise_seed = has_seed.then_some(seed);
        m.write_track_list = d.bool("track list flag")?;
        m.write_report = d.bool("report flag")?;
    }
    Ok(m)
}

/// Serialize at the current version.
pub fn encode_settings(settings: &EditorSettings) -> Vec<u8> {
    let mut e = Encoder::default();
    e.out.extend_from_slice(&MAGIC);
    e.u32(CURRENT_VERSION);
    e.u32(settings.files.len() as u32);
    for f in &settings.files {
        encode_file(&mut e, f);
    }
    encode_master(&mut e, &settings.master);
    e.out
}

/// Parse a stream of any supported version.
pub fn decode_settings(bytes: &[u8]) -> Result<EditorSettings, EditorError> {
    let mut d = Decoder { buf: bytes, pos: 0 };
    if d.bytes(4, "magic")? != MAGIC {
        return Err(EditorError::Persistence("not a settings stream".into()));
    }
    let version = d.u32("version")?;
    if version == 0 || version > CURRENT_VERSION {
        return Err(EditorError::Persistence(format!(
            "unsupported version {} (newest supported is {})",
            version, CURRENT_VERSION
        )));
    }

    let count = d.u32("file count")? as usize;
    let mut files = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        files.push(decode_file(&mut d, version)?);
    }
    let master = decode_master(&mut d, version)?;
    if !d.at_end() {
        log::warn!("settings stream has {} trailing bytes", bytes.len() - d.pos);
    }
    log::debug!("loaded settings v{} with {} files", version, files.len());
    Ok(EditorSettings { files, master })
}

pub fn write_to<W: Write>(settings: &EditorSettings, mut writer: W) -> Result<(), EditorError> {
    writer
        .write_all(&encode_settings(settings))
        .map_err(|e| EditorError::Storage(format!("failed to write settings: {}", e)))
}

pub fn read_from<R: Read>(mut reader: R) -> Result<EditorSettings, EditorError> {
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|e| EditorError::Storage(format!("failed to read settings: {}", e)))?;
    decode_settings(&bytes)
}

pub fn save_settings(settings: &EditorSettings, path: &Path) -> Result<(), EditorError> {
    fs::write(path, encode_settings(settings))
        .map_err(|e| EditorError::Storage(format!("failed to write {}: {}", path.display(), e)))
}

pub fn load_settings(path: &Path) -> Result<EditorSettings, EditorError> {
    let bytes =
        fs::read(path).map_err(|e| EditorError::Storage(format!("failed to read {}: {}", path.display(), e)))?;
    decode_settings(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::settings::DEFAULT_FALLOFF_DB;

    fn sample() -> EditorSettings {
        let mut file = PerFileOutputSettings {
            start: TrimPoint::Label { index: 2, offset: -0.25 },
            stop: Some(TrimPoint::Sample(480_000)),
            start_snap: SnapMode::NearestZeroCrossing,
            looping: true,
            loop_start: Some(TrimPoint::Seconds(3.5)),
            title: "Overworld".into(),
            artist: "Composer".into(),
            actual_hz: ActualHz::Custom(1_789_773.0),
            ..Default::default()
        };
        file.hpf[1].kind = FilterKind::Sinc;
        file.hpf[1].falloff_db = -12.0;
        EditorSettings {
            files: vec![file, PerFileOutputSettings::default()],
            master: MasterOutputSettings {
                mains_hum: true,
                hum_color: HumColor::Grey20Em,
                leveling: Leveling::Loudness { dbfs: -16.0 },
                layout: ChannelLayout::Stereo,
                format: SampleFormat::IeeeFloat,
                bits_per_sample: 32,
                noise_seed: Some(42),
                numbered: true,
                folder: PathBuf::from("out/dir"),
                ..Default::default()
            },
        }
    }

    /// A version-1 stream: every record stops after its version-1 fields.
    fn v1_stream(settings: &EditorSettings) -> Vec<u8> {
        let mut e = Encoder::default();
        e.out.extend_from_slice(&MAGIC);
        e.u32(1);
        e.u32(settings.files.len() as u32);
        for f in &settings.files {
            let mut full = Encoder::default();
            encode_file(&mut full, f);
            // Drop snaps, loop start and four (kind, falloff) pairs.
            let v2_len = 2 + loop_start_len(f.loop_start) + 4 * 9;
            e.out.extend_from_slice(&full.out[..full.out.len() - v2_len]);
        }
        let mut master = Encoder::default();
        encode_master(&mut master, &settings.master);
        let v3_len = 2 + 4 * 8 + 1 + 8 + 2;
        e.out.extend_from_slice(&master.out[..master.out.len() - v3_len]);
        e.out
    }

    /// Presence flag plus the encoded point.
    fn loop_start_len(p: Option<TrimPoint>) -> usize {
        1 + match p {
            None => 0,
            Some(TrimPoint::Label { .. }) => 1 + 12,
            Some(_) => 1 + 8,
        }
    }

    #[test]
    fn current_version_round_trip() {
        let settings = sample();
        assert_eq!(decode_settings(&encode_settings(&settings)).unwrap(), settings);
    }

    #[test]
    fn io_round_trip() {
        let settings = sample();
        let mut buf = Vec::new();
        write_to(&settings, &mut buf).unwrap();
        assert_eq!(read_from(buf.as_slice()).unwrap(), settings);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.bwav");
        save_settings(&settings, &path).unwrap();
        assert_eq!(load_settings(&path).unwrap(), settings);
    }

    #[test]
    fn version_one_defaults_later_fields() {
        let mut settings = sample();
        settings.master.leveling = Leveling::Normalize { dbfs: -1.0 };
        let loaded = decode_settings(&v1_stream(&settings)).unwrap();

        let file = &loaded.files[0];
        assert_eq!(file.title, "Overworld");
        assert_eq!(file.start_snap, SnapMode::Exact);
        assert_eq!(file.loop_start, None);
        assert_eq!(file.hpf[1].kind, FilterKind::Pole);
        assert_eq!(file.hpf[1].falloff_db, DEFAULT_FALLOFF_DB);

        let master = &loaded.master;
        assert_eq!(master.leveling, Leveling::Normalize { dbfs: -1.0 });
        assert_eq!(master.noise_seed, None);
        assert!(!master.numbered);
        assert_eq!(master.noise_temperature, 290.0);
        assert_eq!(master.layout, ChannelLayout::Stereo);
    }

    #[test]
    fn loudness_needs_version_three() {
        let settings = sample();
        assert!(matches!(decode_settings(&v1_stream(&settings)), Err(EditorError::Persistence(_))));
    }

    #[test]
    fn truncation_is_an_error() {
        let bytes = encode_settings(&sample());
        for cut in [3, 6, 20, bytes.len() - 1] {
            assert!(matches!(decode_settings(&bytes[..cut]), Err(EditorError::Persistence(_))), "cut at {}", cut);
        }
    }

    #[test]
    fn newer_version_is_rejected() {
        let mut bytes = encode_settings(&EditorSettings::default());
        bytes[4..8].copy_from_slice(&(CURRENT_VERSION + 1).to_le_bytes());
        let err = decode_settings(&bytes).unwrap_err();
        assert!(err.to_string().contains("unsupported version"));
    }

    #[test]
    fn bad_magic() {
        assert!(decode_settings(b"RIFF\x03\x00\x00\x00").is_err());
    }
}
