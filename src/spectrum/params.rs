use super::frame::{DisplayConfig, NoteSpelling};

pub type NoteNames = [&'static str; 12];

pub static NOTE_NAMES_SHARP: NoteNames = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

pub static NOTE_NAMES_FLAT: NoteNames = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

pub fn note_names(spelling: NoteSpelling) -> &'static NoteNames {
    match spelling {
        NoteSpelling::Sharp => &NOTE_NAMES_SHARP,
        NoteSpelling::Flat => &NOTE_NAMES_FLAT,
    }
}

/// Converts a dB-per-octave tilt into the exponent applied to `freq / 880`.
pub fn slope_exponent(slope_db_per_octave: f32) -> f32 {
    slope_db_per_octave / 20.0 / 2.0f32.log10()
}

/// Values derived from one configuration version.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DerivedParameters {
    pub min_freq: f32,
    pub max_freq: f32,
    pub log_min_freq: f32,
    pub log_max_freq: f32,
    /// Strictly positive for a valid configuration.
    pub log_freq_range: f32,
    pub min_db: f32,
    /// Strictly positive for a valid configuration.
    pub db_range: f32,
    pub slope_exponent: f32,
    pub note_names: &'static NoteNames,
}

impl DerivedParameters {
    pub fn from_config(config: &DisplayConfig) -> Self {
        let log_min_freq = config.min_freq.ln();
        let log_max_freq = config.max_freq.ln();
        Self {
            min_freq: config.min_freq,
            max_freq: config.max_freq,
            log_min_freq,
            log_max_freq,
            log_freq_range: log_max_freq - log_min_freq,
            min_db: config.min_db,
            db_range: config.max_db - config.min_db,
            slope_exponent: slope_exponent(config.slope_correction_db),
            note_names: note_names(config.note_spelling),
        }
    }
}

/// Recomputes [`DerivedParameters`] only when the configuration version moves.
///
/// Owned by a single visualizer instance; two visualizers never share one.
#[derive(Debug, Default)]
pub struct DerivedParameterCache {
    params: Option<DerivedParameters>,
    last_version: Option<u64>,
}

impl DerivedParameterCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the cached values were rebuilt.
    pub fn refresh(&mut self, config: &DisplayConfig) -> bool {
        if self.last_version == Some(config.version) {
            return false;
        }

        let params = DerivedParameters::from_config(config);
        log::debug!(
            "Derived parameters refreshed for config v{}: log range {:.4}, dB range {:.1}",
            config.version,
            params.log_freq_range,
            params.db_range
        );
        self.params = Some(params);
        self.last_version = Some(config.version);
        true
    }

    pub fn params(&self) -> Option<&DerivedParameters> {
        self.params.as_ref()
    }

    /// `None` until the first refresh.
    pub fn note_names(&self) -> Option<&'static NoteNames> {
        self.params.map(|p| p.note_names)
    }

    pub fn version(&self) -> Option<u64> {
        self.last_version
    }
}
