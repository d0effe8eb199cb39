use std::path::PathBuf;

use riffcap_core::SampleFormat;
use serde::{Deserialize, Serialize};

use super::profile::{default_profile, AudioCharacteristicProfile};

/// −6.02 dB, the falloff the hardware presets are measured at.
pub const DEFAULT_FALLOFF_DB: f64 = -6.020_599_913_279_624;

/// A trim or loop position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TrimPoint {
    /// Absolute frame index into the concatenated set.
    Sample(u64),
    Seconds(f64),
    /// Time of the label with `index`, shifted by `offset` seconds.
    Label { index: u32, offset: f64 },
}

impl Default for TrimPoint {
    fn default() -> Self {
        Self::Seconds(0.0)
    }
}

/// How a resolved trim point is adjusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SnapMode {
    #[default]
    Exact,
    /// Move to the closest sign change in the first channel.
    NearestZeroCrossing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FilterKind {
    /// First-order IIR.
    #[default]
    Pole,
    /// Blackman-windowed sinc FIR.
    Sinc,
}

/// One low-pass or high-pass stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterStage {
    pub enabled: bool,
    pub kind: FilterKind,
    pub cutoff_hz: f64,
    /// Attenuation at `cutoff_hz` in dB. Values ≥ 0 select the −3 dB corner.
    pub falloff_db: f64,
}

impl FilterStage {
    pub fn new(cutoff_hz: f64) -> Self {
        Self { enabled: true, kind: FilterKind::Pole, cutoff_hz, falloff_db: DEFAULT_FALLOFF_DB }
    }

    pub fn disabled() -> Self {
        Self { enabled: false, ..Self::new(0.0) }
    }
}

/// The rate a recording was really made at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum ActualHz {
    /// Trust the header.
    #[default]
    ByFile,
    Ntsc,
    Pal,
    Dendy,
    PalM,
    PalN,
    Custom(f64),
}

impl ActualHz {
    /// Effective input rate for a file whose header says `file_rate`.
    pub fn resolve(self, file_rate: u32) -> f64 {
        match self {
            Self::ByFile => file_rate as f64,
            Self::Ntsc => 236_250_000.0 / 11.0 / 12.0,
            Self::Pal => 26_601_712.5 / 16.0,
            Self::Dendy => 26_601_712.5 / 15.0,
            // Colour subcarrier × 6 gives the master clock.
            Self::PalM => 3_575_611.49 * 6.0 / 12.0,
            Self::PalN => 3_582_056.25 * 6.0 / 12.0,
            Self::Custom(hz) => hz,
        }
    }
}

/// Settings applied to one file set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerFileOutputSettings {
    pub start: TrimPoint,
    /// `None` keeps everything to the end of the set.
    pub stop: Option<TrimPoint>,
    pub start_snap: SnapMode,
    pub stop_snap: SnapMode,

    /// Loop the region `[loop_start, stop)` instead of playing once.
    pub looping: bool,
    /// Loop region start. `None` loops the whole trimmed body.
    pub loop_start: Option<TrimPoint>,
    /// Seconds of looped playback after the body before the fade begins.
    pub delay_secs: f64,
    pub fade_secs: f64,
    /// Fade one-shots over `fade_secs`.
    pub fade: bool,

    pub opening_silence_secs: f64,
    pub trailing_silence_secs: f64,

    pub lpf: FilterStage,
    pub hpf: [FilterStage; 3],
    pub volume: f64,
    pub invert: bool,

    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: String,
    pub comment: String,

    /// Prepended to the output file name.
    pub prefix: String,
    /// Appended to the output file stem.
    pub postfix: String,

    pub actual_hz: ActualHz,
}

impl PerFileOutputSettings {
    /// Defaults with the filter characteristics of `profile`.
    pub fn from_profile(profile: &AudioCharacteristicProfile) -> Self {
        let mut settings = Self {
            start: TrimPoint::default(),
            stop: None,
            start_snap: SnapMode::Exact,
            stop_snap: SnapMode::Exact,
            looping: false,
            loop_start: None,
            delay_secs: 4.0,
            fade_secs: 10.0,
            fade: false,
            opening_silence_secs: 0.2,
            trailing_silence_secs: 0.5,
            lpf: FilterStage::disabled(),
            hpf: [FilterStage::disabled(); 3],
            volume: 1.0,
            invert: false,
            title: String::new(),
            artist: String::new(),
            album: String::new(),
            year: String::new(),
            comment: String::new(),
            prefix: String::new(),
            postfix: String::new(),
            actual_hz: ActualHz::ByFile,
        };
        settings.apply_profile(profile);
        settings
    }

    /// Overwrite volume, invert and the filter stages.
    pub fn apply_profile(&mut self, profile: &AudioCharacteristicProfile) {
        self.volume = profile.volume;
        self.invert = profile.invert;
        self.lpf = stage(profile.lpf_hz);
        for (slot, hz) in self.hpf.iter_mut().zip(profile.hpf_hz) {
            *slot = stage(hz);
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        for (name, secs) in [
            ("delay", self.delay_secs),
            ("fade", self.fade_secs),
            ("opening silence", self.opening_silence_secs),
            ("trailing silence", self.trailing_silence_secs),
        ] {
            if !(secs.is_finite() && secs >= 0.0) {
                return Err(format!("{} must be a non-negative duration, got {}", name, secs));
            }
        }
        if !self.volume.is_finite() {
            return Err(format!("invalid volume: {}", self.volume));
        }
        for f in std::iter::once(&self.lpf).chain(self.hpf.iter()) {
            if f.enabled && !(f.cutoff_hz.is_finite() && f.cutoff_hz > 0.0) {
                return Err(format!("filter cutoff must be positive, got {}", f.cutoff_hz));
            }
        }
        if let ActualHz::Custom(hz) = self.actual_hz {
            if !(hz.is_finite() && hz > 0.0) {
                return Err(format!("invalid actual rate: {}", hz));
            }
        }
        for p in std::iter::once(&self.start).chain(self.stop.iter()).chain(self.loop_start.iter()) {
            if let TrimPoint::Seconds(s) = p {
                if !(s.is_finite() && *s >= 0.0) {
                    return Err(format!("invalid trim time: {}", s));
                }
            }
        }
        Ok(())
    }
}

fn stage(hz: Option<f64>) -> FilterStage {
    match hz {
        Some(hz) => FilterStage::new(hz),
        None => FilterStage::disabled(),
    }
}

impl Default for PerFileOutputSettings {
    fn default() -> Self {
        Self::from_profile(default_profile())
    }
}

/// Colour preset for the mains-hum bed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum HumColor {
    XxBlack,
    XBlack,
    #[default]
    Black,
    Grey00,
    Grey10,
    Grey20Em,
    White,
    Red,
    Green,
    Blue,
}

impl HumColor {
    pub const ALL: [HumColor; 10] = [
        Self::XxBlack,
        Self::XBlack,
        Self::Black,
        Self::Grey00,
        Self::Grey10,
        Self::Grey20Em,
        Self::White,
        Self::Red,
        Self::Green,
        Self::Blue,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum NoiseKind {
    /// Thermal (Johnson–Nyquist) noise.
    #[default]
    Gaussian,
    Uniform,
}

/// One gain applied to the whole batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Leveling {
    /// Scale so the batch peak equals this linear amplitude.
    Absolute { peak: f64 },
    /// Scale so the batch peak sits at this level in dBFS.
    Normalize { dbfs: f64 },
    /// Scale so the gated RMS sits at this level in dBFS, never pushing the peak past 0 dBFS.
    Loudness { dbfs: f64 },
}

impl Default for Leveling {
    fn default() -> Self {
        Self::Absolute { peak: 0.5 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ChannelLayout {
    #[default]
    Mono,
    Stereo,
}

impl ChannelLayout {
    pub fn channels(self) -> u16 {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
        }
    }
}

/// Settings shared by every file in a render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterOutputSettings {
    pub mains_hum: bool,
    pub hum_color: HumColor,
    pub hum_volume: f64,
    /// Mains frequency in Hz.
    pub mains_hz: f64,

    pub white_noise: bool,
    pub noise_kind: NoiseKind,
    pub noise_volume: f64,
    /// Kelvin.
    pub noise_temperature: f64,
    /// Ohms.
    pub noise_resistance: f64,
    /// Hz.
    pub noise_bandwidth: f64,
    /// Fixed seed for reproducible noise. `None` draws from the OS.
    pub noise_seed: Option<u64>,

    pub leveling: Leveling,

    pub format: SampleFormat,
    pub bits_per_sample: u16,
    pub layout: ChannelLayout,
    pub sample_rate: u32,
    /// TPDF dither on 16-bit PCM output.
    pub dither: bool,
    /// Append " (n)" instead of overwriting an existing output.
    pub numbered: bool,

    pub folder: PathBuf,
    pub write_track_list: bool,
    pub write_report: bool,
}

impl MasterOutputSettings {
    pub fn validate(&self) -> Result<(), String> {
        riffcap_core::WavSpec {
            format: self.format,
            channels: self.layout.channels(),
            sample_rate: self.sample_rate,
            bits_per_sample: self.bits_per_sample,
        }
        .validate()
        .map_err(|e| e.to_string())?;
        for (name, v) in [
            ("hum volume", self.hum_volume),
            ("noise volume", self.noise_volume),
            ("noise temperature", self.noise_temperature),
            ("noise resistance", self.noise_resistance),
            ("noise bandwidth", self.noise_bandwidth),
        ] {
            if !(v.is_finite() && v >= 0.0) {
                return Err(format!("{} must be non-negative, got {}", name, v));
            }
        }
        if !(self.mains_hz.is_finite() && self.mains_hz > 0.0) {
            return Err(format!("invalid mains frequency: {}", self.mains_hz));
        }
        match self.leveling {
            Leveling::Absolute { peak } if !(peak.is_finite() && peak > 0.0) => {
                Err(format!("absolute level must be positive, got {}", peak))
            }
            Leveling::Normalize { dbfs } | Leveling::Loudness { dbfs } if !dbfs.is_finite() => {
                Err(format!("invalid target level: {}", dbfs))
            }
            _ => Ok(()),
        }
    }
}

impl Default for MasterOutputSettings {
    fn default() -> Self {
        Self {
            mains_hum: false,
            hum_color: HumColor::Black,
            hum_volume: 1.0,
            mains_hz: 60.0,
            white_noise: false,
            noise_kind: NoiseKind::Gaussian,
            noise_volume: 0.1,
            noise_temperature: 290.0,
            noise_resistance: 50.0,
            noise_bandwidth: 1_000_000.0,
            noise_seed: None,
            leveling: Leveling::default(),
            format: SampleFormat::Pcm,
            bits_per_sample: 16,
            layout: ChannelLayout::Mono,
            sample_rate: 48000,
            dither: true,
            numbered: false,
            folder: PathBuf::new(),
            write_track_list: false,
            write_report: false,
        }
    }
}

/// Everything an editor session persists.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EditorSettings {
    /// One entry per file set, in display order.
    pub files: Vec<PerFileOutputSettings>,
    pub master: MasterOutputSettings,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn defaults_follow_front_loader() {
        let s = PerFileOutputSettings::default();
        assert_relative_eq!(s.volume, 0.402);
        assert!(s.invert);
        assert!(s.lpf.enabled);
        assert_relative_eq!(s.lpf.cutoff_hz, 7050.0);
        assert_relative_eq!(s.hpf[0].cutoff_hz, 200.0);
        assert_relative_eq!(s.hpf[2].cutoff_hz, 34.5);
        assert_relative_eq!(s.opening_silence_secs, 0.2);
        assert_relative_eq!(s.trailing_silence_secs, 0.5);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn master_defaults_are_valid() {
        let m = MasterOutputSettings::default();
        assert!(m.validate().is_ok());
        assert_relative_eq!(m.noise_temperature, 290.0);
        assert_eq!(m.sample_rate, 48000);
    }

    #[test]
    fn rejects_negative_fade() {
        let s = PerFileOutputSettings { fade_secs: -1.0, ..Default::default() };
        assert!(s.validate().unwrap_err().contains("fade"));
    }

    #[test]
    fn rejects_bad_output_depth() {
        let m = MasterOutputSettings { bits_per_sample: 20, ..Default::default() };
        assert!(m.validate().is_err());
        let m = MasterOutputSettings { leveling: Leveling::Absolute { peak: 0.0 }, ..Default::default() };
        assert!(m.validate().is_err());
    }

    #[test]
    fn actual_hz_presets() {
        assert_relative_eq!(ActualHz::ByFile.resolve(44100), 44100.0);
        assert_relative_eq!(ActualHz::Ntsc.resolve(44100), 1_789_772.727_272_727, epsilon = 1e-6);
        assert_relative_eq!(ActualHz::Pal.resolve(0), 1_662_607.031_25);
        assert_relative_eq!(ActualHz::Dendy.resolve(0), 1_773_447.5);
        assert_relative_eq!(ActualHz::Custom(12345.5).resolve(48000), 12345.5);
    }
}
