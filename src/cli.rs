use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::config::{self, Settings};
use crate::spectrum::frame::{NoteSpelling, StereoMode};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StereoModeArg {
    Midside,
    Leftright,
}

impl From<StereoModeArg> for StereoMode {
    fn from(arg: StereoModeArg) -> Self {
        match arg {
            StereoModeArg::Midside => StereoMode::MidSide,
            StereoModeArg::Leftright => StereoMode::LeftRight,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "afterglow", about = "Log-frequency spectrum video renderer with phosphor persistence")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG)
    pub input: Option<PathBuf>,

    /// Output video file
    #[arg(short, long, default_value = "output.mp4")]
    pub output: PathBuf,

    /// Config file (defaults to ./afterglow.toml or the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Video width in pixels
    #[arg(long, default_value_t = config::default_width())]
    pub width: u32,

    /// Video height in pixels
    #[arg(long, default_value_t = config::default_height())]
    pub height: u32,

    /// Frames per second
    #[arg(long, default_value_t = config::default_fps())]
    pub fps: u32,

    /// Enable phosphor persistence rendering
    #[arg(long)]
    pub phosphor: bool,

    /// Stereo presentation
    #[arg(long, value_enum)]
    pub stereo_mode: Option<StereoModeArg>,

    /// Spell accidentals as flats
    #[arg(long)]
    pub flat: bool,

    /// Hold a pointer at panel position X,Y (pixels, y up) to show the inverse readout
    #[arg(long, value_parser = parse_point)]
    pub hover: Option<(f32, f32)>,

    /// Re-read the config file once per second of output while rendering
    #[arg(long)]
    pub watch_config: bool,

    /// H.264 CRF quality (0-51, lower = better)
    #[arg(long, default_value_t = config::default_crf())]
    pub crf: u32,

    /// FFmpeg video codec
    #[arg(long, default_value_t = config::default_codec())]
    pub codec: String,

    /// FFmpeg pixel format
    #[arg(long, default_value = "yuv420p")]
    pub pix_fmt: String,

    /// TTF/OTF font for the readout and grid labels
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    pub print_config: bool,
}

impl Cli {
    /// Apply flags on top of file settings. A flag wins only when it differs
    /// from its default.
    pub fn apply_overrides(&self, settings: &mut Settings) {
        if self.width != config::default_width() {
            settings.output.width = self.width;
        }
        if self.height != config::default_height() {
            settings.output.height = self.height;
        }
        if self.fps != config::default_fps() {
            settings.output.fps = self.fps;
        }
        if self.crf != config::default_crf() {
            settings.output.crf = self.crf;
        }
        if self.codec != config::default_codec() {
            settings.output.codec = self.codec.clone();
        }
        if self.font.is_some() {
            settings.output.font = self.font.clone();
        }
        if self.phosphor {
            settings.spectrum.enable_phosphor = true;
        }
        if let Some(mode) = self.stereo_mode {
            settings.spectrum.stereo_mode = mode.into();
        }
        if self.flat {
            settings.spectrum.note_key_mode = NoteSpelling::Flat;
        }
    }
}

fn parse_point(s: &str) -> Result<(f32, f32), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y but got '{}'", s))?;
    let x = x.trim().parse::<f32>().map_err(|e| format!("bad X: {}", e))?;
    let y = y.trim().parse::<f32>().map_err(|e| format!("bad Y: {}", e))?;
    Ok((x, y))
}
