/// Measured output characteristics of one console model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioCharacteristicProfile {
    pub name: &'static str,
    pub volume: f64,
    pub lpf_hz: Option<f64>,
    pub hpf_hz: [Option<f64>; 3],
    pub invert: bool,
    /// Whether the unit adds audible background noise.
    pub noisy: bool,
}

/// Hardware presets, indexed by position.
pub static PROFILES: &[AudioCharacteristicProfile] = &[
    AudioCharacteristicProfile {
        name: "None",
        volume: 1.0,
        lpf_hz: None,
        hpf_hz: [None, None, None],
        invert: false,
        noisy: false,
    },
    AudioCharacteristicProfile {
        name: "NES-001 (Front Loader)",
        volume: 0.402,
        lpf_hz: Some(7050.0),
        hpf_hz: [Some(200.0), Some(34.5), Some(34.5)],
        invert: true,
        noisy: false,
    },
    AudioCharacteristicProfile {
        name: "NES-101 (Top Loader)",
        volume: 0.402,
        lpf_hz: Some(14000.0),
        hpf_hz: [Some(37.0), Some(37.0), None],
        invert: true,
        noisy: true,
    },
    AudioCharacteristicProfile {
        name: "HVC-001 (Famicom)",
        volume: 0.402,
        lpf_hz: Some(14000.0),
        hpf_hz: [Some(90.0), Some(440.0), None],
        invert: true,
        noisy: false,
    },
    AudioCharacteristicProfile {
        name: "HVC-101 (AV Famicom)",
        volume: 0.402,
        lpf_hz: Some(14000.0),
        hpf_hz: [Some(37.0), Some(37.0), None],
        invert: true,
        noisy: false,
    },
];

/// The preset new per-file settings start from.
pub fn default_profile() -> &'static AudioCharacteristicProfile {
    &PROFILES[1]
}

pub fn profile_by_name(name: &str) -> Option<&'static AudioCharacteristicProfile> {
    PROFILES.iter().find(|p| p.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique() {
        for (i, a) in PROFILES.iter().enumerate() {
            assert!(PROFILES[i + 1..].iter().all(|b| b.name != a.name));
        }
    }

    #[test]
    fn lookup() {
        assert_eq!(profile_by_name("NES-001 (Front Loader)"), Some(default_profile()));
        assert!(profile_by_name("SNES").is_none());
    }
}
