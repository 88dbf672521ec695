use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::audio::analysis::AnalysisSettings;
use crate::render::phosphor::CpuPhosphor;
use crate::render::surface::{Palette, Rgba};
use crate::spectrum::frame::{DisplayConfig, NoteSpelling, StereoMode};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("frequency range must satisfy 0 < min_freq < max_freq (got {min} .. {max})")]
    InvalidFrequencyRange { min: f32, max: f32 },
    #[error("dB range must satisfy min_db < max_db (got {min} .. {max})")]
    InvalidDbRange { min: f32, max: f32 },
    #[error("fft_size must be a non-zero power of two (got {0})")]
    InvalidFftSize(usize),
    #[error("fps must be non-zero")]
    InvalidFps,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub spectrum: SpectrumConfig,
    #[serde(default)]
    pub phosphor: PhosphorConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub theme: ThemeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumConfig {
    #[serde(default = "default_min_freq")]
    pub min_freq: f32,
    #[serde(default = "default_max_freq")]
    pub max_freq: f32,
    #[serde(default = "default_min_db")]
    pub min_db: f32,
    #[serde(default = "default_max_db")]
    pub max_db: f32,
    /// Display tilt in dB per octave, pivoting at 880 Hz
    #[serde(default = "default_slope_correction_db")]
    pub slope_correction_db: f32,
    #[serde(default)]
    pub stereo_mode: StereoMode,
    #[serde(default = "default_true")]
    pub enable_cqt: bool,
    #[serde(default)]
    pub enable_phosphor: bool,
    #[serde(default = "default_beam_multiplier")]
    pub beam_multiplier: f32,
    #[serde(default)]
    pub note_key_mode: NoteSpelling,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhosphorConfig {
    #[serde(default = "default_beam_energy")]
    pub beam_energy: f32,
    /// Seconds for the afterglow to fall to 1/e
    #[serde(default = "default_decay_time")]
    pub decay_time: f32,
    #[serde(default = "default_exposure")]
    pub exposure: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    #[serde(default = "default_bands_per_octave")]
    pub bands_per_octave: u32,
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,
    /// Peaks quieter than this (dB) hide the readout
    #[serde(default = "default_silence_threshold")]
    pub silence_threshold: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_crf")]
    pub crf: u32,
    #[serde(default = "default_codec")]
    pub codec: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeConfig {
    #[serde(default = "default_background")]
    pub background: Rgba,
    #[serde(default = "default_spectrum")]
    pub spectrum: Rgba,
    #[serde(default = "default_grid")]
    pub grid: Rgba,
    #[serde(default = "default_text")]
    pub text: Rgba,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            min_freq: default_min_freq(),
            max_freq: default_max_freq(),
            min_db: default_min_db(),
            max_db: default_max_db(),
            slope_correction_db: default_slope_correction_db(),
            stereo_mode: StereoMode::default(),
            enable_cqt: default_true(),
            enable_phosphor: false,
            beam_multiplier: default_beam_multiplier(),
            note_key_mode: NoteSpelling::default(),
        }
    }
}

impl Default for PhosphorConfig {
    fn default() -> Self {
        Self {
            beam_energy: default_beam_energy(),
            decay_time: default_decay_time(),
            exposure: default_exposure(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            fft_size: default_fft_size(),
            bands_per_octave: default_bands_per_octave(),
            smoothing: default_smoothing(),
            silence_threshold: default_silence_threshold(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            crf: default_crf(),
            codec: default_codec(),
            font: None,
        }
    }
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            background: default_background(),
            spectrum: default_spectrum(),
            grid: default_grid(),
            text: default_text(),
        }
    }
}

fn default_min_freq() -> f32 { 20.0 }
fn default_max_freq() -> f32 { 20000.0 }
fn default_min_db() -> f32 { -100.0 }
fn default_max_db() -> f32 { 0.0 }
fn default_slope_correction_db() -> f32 { 4.5 }
fn default_true() -> bool { true }
fn default_beam_multiplier() -> f32 { 1.0 }
fn default_beam_energy() -> f32 { 120.0 }
fn default_decay_time() -> f32 { 0.15 }
fn default_exposure() -> f32 { 100.0 }
fn default_fft_size() -> usize { 4096 }
fn default_bands_per_octave() -> u32 { 24 }
fn default_smoothing() -> f32 { 0.6 }
fn default_silence_threshold() -> f32 { -80.0 }
pub fn default_width() -> u32 { 1280 }
pub fn default_height() -> u32 { 360 }
pub fn default_fps() -> u32 { 60 }
pub fn default_crf() -> u32 { 18 }
pub fn default_codec() -> String { "libx264".into() }
fn default_background() -> Rgba { Palette::default().background }
fn default_spectrum() -> Rgba { Palette::default().spectrum }
fn default_grid() -> Rgba { Palette::default().grid }
fn default_text() -> Rgba { Palette::default().text }

impl Settings {
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Bounds the visualizer relies on but never checks itself.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.spectrum;
        if !(s.min_freq > 0.0 && s.max_freq > s.min_freq) {
            return Err(ConfigError::InvalidFrequencyRange {
                min: s.min_freq,
                max: s.max_freq,
            });
        }
        if !(s.max_db > s.min_db) {
            return Err(ConfigError::InvalidDbRange {
                min: s.min_db,
                max: s.max_db,
            });
        }
        if !self.audio.fft_size.is_power_of_two() {
            return Err(ConfigError::InvalidFftSize(self.audio.fft_size));
        }
        if self.output.fps == 0 {
            return Err(ConfigError::InvalidFps);
        }
        Ok(())
    }

    pub fn palette(&self) -> Palette {
        Palette {
            background: self.theme.background,
            spectrum: self.theme.spectrum,
            grid: self.theme.grid,
            text: self.theme.text,
        }
    }

    pub fn analysis(&self) -> AnalysisSettings {
        AnalysisSettings {
            fft_size: self.audio.fft_size,
            bands_per_octave: self.audio.bands_per_octave,
            smoothing: self.audio.smoothing,
            min_freq: self.spectrum.min_freq,
            max_freq: self.spectrum.max_freq,
            note_spelling: self.spectrum.note_key_mode,
        }
    }

    pub fn phosphor_renderer(&self) -> CpuPhosphor {
        CpuPhosphor {
            decay_time: self.phosphor.decay_time,
            exposure: self.phosphor.exposure,
        }
    }
}

pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let settings = Settings::from_toml_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    settings.validate()?;
    Ok(settings)
}

/// Explicit path, then `./afterglow.toml`, then the user config directories.
pub fn discover(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("afterglow.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("afterglow").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("afterglow").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

/// Validated settings plus a version that moves whenever they change.
#[derive(Debug)]
pub struct ConfigStore {
    settings: Settings,
    version: u64,
    path: Option<PathBuf>,
    modified: Option<SystemTime>,
}

impl ConfigStore {
    pub fn new(settings: Settings) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self {
            settings,
            version: 0,
            path: None,
            modified: None,
        })
    }

    /// Loads `path` and remembers it for [`ConfigStore::reload_if_changed`].
    pub fn open(path: &Path, overrides: impl FnOnce(&mut Settings)) -> Result<Self, ConfigError> {
        let mut settings = load_settings(path)?;
        overrides(&mut settings);
        let mut store = Self::new(settings)?;
        store.path = Some(path.to_path_buf());
        store.modified = modified_time(path);
        Ok(store)
    }

    /// Starts from `settings` but watches `path`, for when the file could not
    /// be loaded yet. The next edit to it is picked up by
    /// [`ConfigStore::reload_if_changed`].
    pub fn with_path(settings: Settings, path: &Path) -> Result<Self, ConfigError> {
        let mut store = Self::new(settings)?;
        store.path = Some(path.to_path_buf());
        store.modified = modified_time(path);
        Ok(store)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns `Ok(true)` if the settings differed and the version moved.
    pub fn replace(&mut self, settings: Settings) -> Result<bool, ConfigError> {
        settings.validate()?;
        if settings == self.settings {
            return Ok(false);
        }
        self.settings = settings;
        self.version += 1;
        log::debug!("Config version {}", self.version);
        Ok(true)
    }

    /// Re-reads the backing file when its modification time changes.
    ///
    /// On failure the previous settings stay in effect.
    pub fn reload_if_changed(&mut self, overrides: impl FnOnce(&mut Settings)) -> bool {
        let Some(path) = self.path.clone() else {
            return false;
        };
        let modified = modified_time(&path);
        if modified.is_none() || modified == self.modified {
            return false;
        }
        self.modified = modified;

        let result = load_settings(&path).and_then(|mut settings| {
            overrides(&mut settings);
            self.replace(settings)
        });
        match result {
            Ok(changed) => {
                if changed {
                    log::info!("Reloaded config from {}", path.display());
                }
                changed
            }
            Err(err) => {
                log::warn!("Keeping previous config: {}", err);
                false
            }
        }
    }

    pub fn display_config(&self) -> DisplayConfig {
        let s = &self.settings;
        DisplayConfig {
            version: self.version,
            min_freq: s.spectrum.min_freq,
            max_freq: s.spectrum.max_freq,
            min_db: s.spectrum.min_db,
            max_db: s.spectrum.max_db,
            slope_correction_db: s.spectrum.slope_correction_db,
            stereo_mode: s.spectrum.stereo_mode,
            enable_cqt: s.spectrum.enable_cqt,
            enable_phosphor: s.spectrum.enable_phosphor,
            beam_energy: s.phosphor.beam_energy,
            beam_multiplier: s.spectrum.beam_multiplier,
            note_spelling: s.spectrum.note_key_mode,
            silence_threshold: s.audio.silence_threshold,
        }
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}
