use std::fmt::Write as _;

use crate::render::phosphor::{PhosphorRenderer, PhosphorSlot, SplineRequest};
use crate::render::surface::{mix, Palette, Surface};

use super::beam::{BeamEnergyModel, BeamSettings};
use super::frame::{DisplayConfig, FrameInput, SpectrumPoint};
use super::grid::{grid_frequencies, GRID_LABELS};
use super::mapper::{frequency_to_x, SpectrumMapper};
use super::params::{DerivedParameterCache, DerivedParameters};
use super::pitch::{frequency_to_note, NoteReading, PitchProbe, ProbeReading, Readout};
use super::source::select_source;

const ALTERNATE_ALPHA: f32 = 0.3;
const ALTERNATE_ALPHA_PHOSPHOR: f32 = 0.15;
const CURVE_THICKNESS: f32 = 2.0;
const BEAM_WIDTH: f32 = 1.0;

const LABEL_Y: f32 = 8.0;
const LABEL_WIDTH: f32 = 40.0;
const LABEL_HEIGHT: f32 = 12.0;
const LABEL_PADDING: f32 = 4.0;
const LABEL_SIZE: f32 = 10.0;

const OVERLAY_X: f32 = 10.0;
const OVERLAY_MARGIN: f32 = 20.0;
const OVERLAY_SIZE: f32 = 14.0;

/// One spectrum panel.
///
/// Owns every piece of per-frame state: the derived-parameter cache, reused
/// curve buffers and the persistence context. Drive it from the render thread
/// only.
pub struct SpectrumVisualizer<R: PhosphorRenderer> {
    position: i32,
    width: i32,
    mouse_x: f32,
    mouse_y: f32,
    hovering: bool,
    cache: DerivedParameterCache,
    mapper: SpectrumMapper,
    beam: BeamEnergyModel,
    phosphor: PhosphorSlot<R::Context>,
    overlay: String,
    readout: Option<Readout>,
}

impl<R: PhosphorRenderer> SpectrumVisualizer<R> {
    pub fn new(position: i32, width: i32) -> Self {
        Self {
            position,
            width,
            mouse_x: 0.0,
            mouse_y: 0.0,
            hovering: false,
            cache: DerivedParameterCache::new(),
            mapper: SpectrumMapper::new(),
            beam: BeamEnergyModel::new(),
            phosphor: PhosphorSlot::new("fft"),
            overlay: String::new(),
            readout: None,
        }
    }

    pub fn position(&self) -> i32 {
        self.position
    }

    pub fn set_position(&mut self, position: i32) {
        self.position = position;
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn set_width(&mut self, width: i32) {
        self.width = width;
    }

    pub fn right_edge(&self) -> i32 {
        self.position + self.width
    }

    /// Pointer position in window coordinates.
    pub fn update_mouse_position(&mut self, x: f32, y: f32) {
        self.mouse_x = x;
        self.mouse_y = y;
    }

    pub fn set_hovering(&mut self, hovering: bool) {
        self.hovering = hovering;
    }

    pub fn is_hovering(&self) -> bool {
        self.hovering
    }

    /// Tears down the persistence context; it is rebuilt on the next
    /// persistence frame. Call after geometry changes.
    pub fn invalidate_phosphor_context(&mut self) {
        self.phosphor.invalidate();
    }

    pub fn has_phosphor_context(&self) -> bool {
        self.phosphor.is_live()
    }

    pub fn main_points(&self) -> &[SpectrumPoint] {
        self.mapper.main()
    }

    pub fn alternate_points(&self) -> &[SpectrumPoint] {
        self.mapper.alternate()
    }

    pub fn beam(&self) -> &BeamEnergyModel {
        &self.beam
    }

    pub fn derived(&self) -> Option<&DerivedParameters> {
        self.cache.params()
    }

    /// Overlay line of the last frame, `None` while silent.
    pub fn readout(&self) -> Option<&Readout> {
        self.readout.as_ref()
    }

    /// Frequency and uncorrected level under a panel-local point.
    pub fn frequency_and_db(&self, x: f32, y: f32, window_height: f32) -> Option<ProbeReading> {
        let params = self.cache.params()?;
        Some(PitchProbe::new(params, self.width as f32, window_height).probe(x, y))
    }

    pub fn freq_to_note(&self, frequency: f32) -> NoteReading {
        frequency_to_note(frequency, self.cache.note_names())
    }

    pub fn draw(
        &mut self,
        frame: &FrameInput<'_>,
        config: &DisplayConfig,
        palette: &Palette,
        renderer: &mut R,
        surface: &mut dyn Surface,
    ) {
        let width = self.width as f32;
        let height = frame.window_height;
        surface.set_viewport(self.position, self.width.max(0) as u32, height.max(0.0) as u32);

        self.cache.refresh(config);
        let Some(params) = self.cache.params().copied() else {
            return;
        };

        let context = self.phosphor.sync(config.enable_phosphor, renderer);

        if !config.enable_phosphor {
            draw_grid(surface, &params, palette, width, height);
        }

        self.mapper.clear();
        self.beam.clear();

        if let Some(selection) = select_source(frame, config) {
            self.mapper.map(&selection, &params, width, height);

            let context = context.filter(|_| !self.mapper.main().is_empty());

            if let Some(context) = context {
                self.beam.compute(
                    self.mapper.main(),
                    &BeamSettings {
                        method: selection.method(),
                        beam_energy: config.beam_energy,
                        beam_multiplier: config.beam_multiplier,
                        panel_width: width,
                        window_height: height,
                        sample_rate: frame.sample_rate,
                        delta_time: frame.delta_time,
                    },
                );

                let request = SplineRequest {
                    points: self.mapper.main(),
                    intensities: self.beam.intensities(),
                    dwell_times: self.beam.dwell_times(),
                    width: self.width.max(0) as u32,
                    height: height.max(0.0) as u32,
                    delta_time: frame.delta_time,
                    beam_width: BEAM_WIDTH,
                    background: palette.background,
                    foreground: palette.spectrum,
                };
                if let Some(image) = renderer.render_splines(context, &request) {
                    surface.blit(&image);
                }

                if !self.mapper.alternate().is_empty() {
                    let color = mix(palette.spectrum, palette.background, ALTERNATE_ALPHA_PHOSPHOR);
                    surface.draw_polyline(self.mapper.alternate(), color, 1.0);
                }
            } else {
                let color = mix(palette.spectrum, palette.background, ALTERNATE_ALPHA);
                surface.draw_polyline(self.mapper.alternate(), color, CURVE_THICKNESS);
                surface.draw_polyline(self.mapper.main(), palette.spectrum, CURVE_THICKNESS);
            }
        }

        self.draw_overlay(frame, config, &params, palette, surface);
    }

    fn draw_overlay(
        &mut self,
        frame: &FrameInput<'_>,
        config: &DisplayConfig,
        params: &DerivedParameters,
        palette: &Palette,
        surface: &mut dyn Surface,
    ) {
        let peak = frame.peak;
        let height = frame.window_height;
        if !peak.valid || peak.db < config.silence_threshold {
            self.readout = None;
            return;
        }

        let readout = if self.hovering {
            let width = self.width as f32;
            let x = self.mouse_x - self.position as f32;
            let y = self.mouse_y;

            if (0.0..=width).contains(&x) && (0.0..=height).contains(&y) {
                surface.draw_line(
                    SpectrumPoint::new(x, 0.0),
                    SpectrumPoint::new(x, height),
                    palette.spectrum,
                    CURVE_THICKNESS,
                );
                surface.draw_line(
                    SpectrumPoint::new(0.0, y),
                    SpectrumPoint::new(width, y),
                    palette.spectrum,
                    CURVE_THICKNESS,
                );
            }

            let probe = PitchProbe::new(params, width, height);
            let reading = probe.probe(x, y);
            Readout {
                db: reading.db,
                frequency: reading.frequency,
                note: probe.note(reading.frequency),
            }
        } else {
            Readout {
                db: peak.db,
                frequency: peak.freq,
                note: NoteReading {
                    name: peak.note,
                    octave: peak.octave,
                    cents: peak.cents,
                },
            }
        };

        self.overlay.clear();
        let _ = write!(self.overlay, "{readout}");
        surface.draw_text(&self.overlay, OVERLAY_X, height - OVERLAY_MARGIN, OVERLAY_SIZE, palette.text);
        self.readout = Some(readout);
    }
}

fn draw_grid(surface: &mut dyn Surface, params: &DerivedParameters, palette: &Palette, width: f32, height: f32) {
    for freq in grid_frequencies(params.max_freq) {
        if freq < params.min_freq || freq > params.max_freq {
            continue;
        }
        let x = frequency_to_x(freq, params, width);
        surface.draw_line(
            SpectrumPoint::new(x, -height),
            SpectrumPoint::new(x, height * 2.0),
            palette.grid,
            1.0,
        );
    }

    for (freq, label) in GRID_LABELS {
        let x = frequency_to_x(freq, params, width);
        surface.fill_rect(
            x - LABEL_WIDTH / 2.0 - LABEL_PADDING,
            LABEL_Y - LABEL_HEIGHT / 2.0 - LABEL_PADDING,
            LABEL_WIDTH + LABEL_PADDING * 2.0,
            LABEL_HEIGHT + LABEL_PADDING * 2.0,
            palette.background,
        );
        surface.draw_text(label, x - LABEL_WIDTH / 2.0, LABEL_Y, LABEL_SIZE, palette.grid);
    }
}
