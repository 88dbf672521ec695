use serde::{Deserialize, Serialize};

/// How the two magnitude sequences are presented.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StereoMode {
    /// Main = mid, alternate = side.
    #[default]
    MidSide,
    /// Main = mid - side (left), alternate = mid + side (right).
    LeftRight,
}

/// Accidental spelling used for note names.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteSpelling {
    #[default]
    Sharp,
    Flat,
}

/// Which analysis pass produced the magnitudes being mapped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnalysisMethod {
    /// Evenly spaced FFT bins.
    Uniform,
    /// Log-spaced (constant-Q style) bins with an explicit frequency table.
    NonUniform,
}

/// A point in panel-local pixel coordinates, y pointing up.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SpectrumPoint {
    pub x: f32,
    pub y: f32,
}

impl SpectrumPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Pitch detector output for the current frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PeakReading {
    pub freq: f32,
    pub db: f32,
    pub note: &'static str,
    pub octave: i32,
    pub cents: i32,
    pub valid: bool,
}

/// Everything the host supplies for one rendered frame.
///
/// Slices are borrowed from the analysis stage; the visualizer never keeps
/// them past the call.
#[derive(Clone, Copy, Debug)]
pub struct FrameInput<'a> {
    pub sample_rate: f32,
    pub window_height: f32,
    /// Seconds since the previous rendered frame.
    pub delta_time: f32,
    pub fft_mid: &'a [f32],
    pub fft_side: &'a [f32],
    pub cqt_mid: &'a [f32],
    pub cqt_side: &'a [f32],
    /// Centre frequency of every non-uniform bin, parallel to `cqt_mid`.
    pub cqt_frequencies: &'a [f32],
    pub peak: &'a PeakReading,
}

/// Display configuration snapshot handed to the visualizer every frame.
///
/// `version` changes whenever any other field changes. Callers must ensure
/// `max_freq > min_freq > 0` and `max_db > min_db`; the visualizer does not
/// check.
#[derive(Clone, Debug, PartialEq)]
pub struct DisplayConfig {
    pub version: u64,
    pub min_freq: f32,
    pub max_freq: f32,
    pub min_db: f32,
    pub max_db: f32,
    pub slope_correction_db: f32,
    pub stereo_mode: StereoMode,
    pub enable_cqt: bool,
    pub enable_phosphor: bool,
    /// Baseline beam energy of the persistence renderer.
    pub beam_energy: f32,
    pub beam_multiplier: f32,
    pub note_spelling: NoteSpelling,
    pub silence_threshold: f32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            version: 0,
            min_freq: 20.0,
            max_freq: 20000.0,
            min_db: -100.0,
            max_db: 0.0,
            slope_correction_db: 4.5,
            stereo_mode: StereoMode::MidSide,
            enable_cqt: true,
            enable_phosphor: false,
            beam_energy: 120.0,
            beam_multiplier: 1.0,
            note_spelling: NoteSpelling::Sharp,
            silence_threshold: -80.0,
        }
    }
}
