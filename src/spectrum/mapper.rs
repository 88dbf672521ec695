use super::frame::SpectrumPoint;
use super::params::DerivedParameters;
use super::source::{BinLayout, SourceSelection, SpectrumSource};

/// Slope correction pivots here: gain is 1 at this frequency for any tilt.
pub const SLOPE_PIVOT_HZ: f32 = 2.0 * 440.0;
/// Added to magnitudes before the log so silence stays finite.
pub const MAGNITUDE_FLOOR: f32 = 1e-9;

/// Log-frequency horizontal placement.
pub fn frequency_to_x(freq: f32, params: &DerivedParameters, panel_width: f32) -> f32 {
    (freq.ln() - params.log_min_freq) / params.log_freq_range * panel_width
}

pub fn slope_gain(freq: f32, slope_exponent: f32) -> f32 {
    (freq / SLOPE_PIVOT_HZ).powf(slope_exponent)
}

pub fn magnitude_to_db(magnitude: f32) -> f32 {
    20.0 * (magnitude + MAGNITUDE_FLOOR).log10()
}

/// Vertical placement; deliberately unclamped, the renderer clips.
pub fn db_to_y(db: f32, params: &DerivedParameters, window_height: f32) -> f32 {
    (db - params.min_db) / params.db_range * window_height
}

/// Writes `mid - side` into `left` and `mid + side` into `right`.
pub fn reconstruct_left_right(mid: &[f32], side: &[f32], left: &mut Vec<f32>, right: &mut Vec<f32>) {
    left.clear();
    right.clear();
    for (&m, &s) in mid.iter().zip(side) {
        left.push(m - s);
        right.push(m + s);
    }
}

/// Turns per-bin magnitudes into screen-space curves.
///
/// All buffers are kept between frames and only cleared, so steady-state
/// mapping does not allocate.
#[derive(Debug, Default)]
pub struct SpectrumMapper {
    main: Vec<SpectrumPoint>,
    alternate: Vec<SpectrumPoint>,
    left: Vec<f32>,
    right: Vec<f32>,
}

impl SpectrumMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn main(&self) -> &[SpectrumPoint] {
        &self.main
    }

    pub fn alternate(&self) -> &[SpectrumPoint] {
        &self.alternate
    }

    /// Drops the previous frame's curves.
    pub fn clear(&mut self) {
        self.main.clear();
        self.alternate.clear();
    }

    pub fn map(
        &mut self,
        selection: &SourceSelection<'_>,
        params: &DerivedParameters,
        panel_width: f32,
        window_height: f32,
    ) {
        match selection.layout {
            BinLayout::Uniform(bins) => {
                self.map_with(&bins, selection, params, panel_width, window_height)
            }
            BinLayout::NonUniform(bins) => {
                self.map_with(&bins, selection, params, panel_width, window_height)
            }
        }
    }

    fn map_with<S: SpectrumSource>(
        &mut self,
        source: &S,
        selection: &SourceSelection<'_>,
        params: &DerivedParameters,
        panel_width: f32,
        window_height: f32,
    ) {
        let (main, alternate) = if selection.reconstruct_left_right {
            reconstruct_left_right(selection.mid, selection.side, &mut self.left, &mut self.right);
            (self.left.as_slice(), self.right.as_slice())
        } else {
            (selection.mid, selection.side)
        };

        let geometry = Projection {
            params,
            panel_width,
            window_height,
        };

        if selection.show_alternate {
            geometry.project(source, alternate, &mut self.alternate);
        } else {
            self.alternate.clear();
        }
        geometry.project(source, main, &mut self.main);
    }
}

struct Projection<'p> {
    params: &'p DerivedParameters,
    panel_width: f32,
    window_height: f32,
}

impl Projection<'_> {
    fn project<S: SpectrumSource>(&self, source: &S, magnitudes: &[f32], out: &mut Vec<SpectrumPoint>) {
        out.clear();
        let params = self.params;
        let end = magnitudes.len().min(source.bin_count());

        for bin in source.start_bin()..end {
            let freq = source.frequency(bin);
            if !(freq >= params.min_freq && freq <= params.max_freq) {
                continue;
            }

            let x = frequency_to_x(freq, params, self.panel_width);
            let magnitude = magnitudes[bin] * slope_gain(freq, params.slope_exponent);
            let y = db_to_y(magnitude_to_db(magnitude), params, self.window_height);
            out.push(SpectrumPoint::new(x, y));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrum::frame::{AnalysisMethod, DisplayConfig, FrameInput, PeakReading, StereoMode};
    use crate::spectrum::source::select_source;

    fn params(slope: f32) -> DerivedParameters {
        DerivedParameters::from_config(&DisplayConfig {
            min_freq: 20.0,
            max_freq: 20000.0,
            min_db: -100.0,
            max_db: 0.0,
            slope_correction_db: slope,
            ..DisplayConfig::default()
        })
    }

    fn input<'a>(mid: &'a [f32], side: &'a [f32], peak: &'a PeakReading) -> FrameInput<'a> {
        FrameInput {
            sample_rate: 48000.0,
            window_height: 300.0,
            delta_time: 0.016,
            fft_mid: mid,
            fft_side: side,
            cqt_mid: &[],
            cqt_side: &[],
            cqt_frequencies: &[],
            peak,
        }
    }

    #[test]
    fn pivot_gain_is_unity() {
        for slope in [-6.0, 0.0, 3.0, 4.5, 12.0] {
            let exponent = params(slope).slope_exponent;
            assert!(
                (slope_gain(SLOPE_PIVOT_HZ, exponent) - 1.0).abs() < 1e-6,
                "gain at pivot for slope {slope}"
            );
        }
    }

    #[test]
    fn reference_scenario_positions() {
        let p = params(0.0);
        let x = frequency_to_x(2000.0, &p, 800.0);
        let expected = ((2000.0f32.ln() - 20.0f32.ln()) / (20000.0f32.ln() - 20.0f32.ln())) * 800.0;
        assert!((x - expected).abs() < 1e-3, "x={x}");
        assert!((x - 533.3).abs() < 1.0, "x={x}");

        let db = magnitude_to_db(1e-9);
        assert!((db - 20.0 * 2e-9f32.log10()).abs() < 1e-3);
        assert!((db + 174.0).abs() < 0.1, "db={db}");
        let y = db_to_y(db, &p, 300.0);
        assert!(y < 0.0, "off-panel y must stay unclamped, got {y}");
        assert!((y - (db + 100.0) / 100.0 * 300.0).abs() < 1e-3);
    }

    #[test]
    fn uniform_mapping_drops_out_of_range_bins() {
        // 49 bins at 48 kHz -> FFT size 96 -> 500 Hz per bin, bins 1..=48.
        let mid = vec![1e-9f32; 49];
        let side = vec![0.0f32; 49];
        let peak = PeakReading::default();
        let frame = input(&mid, &side, &peak);
        let config = DisplayConfig {
            enable_cqt: false,
            max_freq: 20000.0,
            slope_correction_db: 0.0,
            ..DisplayConfig::default()
        };
        let selection = select_source(&frame, &config).unwrap();
        assert_eq!(selection.method(), AnalysisMethod::Uniform);

        let mut mapper = SpectrumMapper::new();
        mapper.map(&selection, &params(0.0), 800.0, 300.0);

        // 500..=20000 Hz -> bins 1..=40.
        assert_eq!(mapper.main().len(), 40);
        assert_eq!(mapper.alternate().len(), 40);

        let at_2k = mapper.main()[3];
        assert!((at_2k.x - frequency_to_x(2000.0, &params(0.0), 800.0)).abs() < 1e-4);
        assert!(at_2k.y < 0.0);

        for pair in mapper.main().windows(2) {
            assert!(pair[1].x > pair[0].x);
        }
    }

    #[test]
    fn non_uniform_mapping_starts_at_bin_zero() {
        let freqs = [10.0, 20.0, 100.0, 1000.0, 25000.0];
        let mid = [0.5f32; 5];
        let side = [0.1f32; 5];
        let peak = PeakReading::default();
        let frame = FrameInput {
            cqt_mid: &mid,
            cqt_side: &side,
            cqt_frequencies: &freqs,
            ..input(&[], &[], &peak)
        };
        let selection = select_source(&frame, &DisplayConfig::default()).unwrap();
        let mut mapper = SpectrumMapper::new();
        mapper.map(&selection, &params(0.0), 800.0, 300.0);

        // 10 Hz and 25 kHz fall outside [20, 20000].
        assert_eq!(mapper.main().len(), 3);
        assert!(mapper.main()[0].x.abs() < 1e-3);
    }

    #[test]
    fn left_right_reconstruction_invariant() {
        let mid = [0.9f32, 0.5, 0.25, 0.125];
        let side = [0.1f32, 0.4, -0.05, 0.0];
        let mut left = Vec::new();
        let mut right = Vec::new();
        reconstruct_left_right(&mid, &side, &mut left, &mut right);

        for i in 0..mid.len() {
            assert!((left[i] + right[i] - 2.0 * mid[i]).abs() < 1e-6);
            assert!((right[i] - left[i] - 2.0 * side[i]).abs() < 1e-6);
        }
    }

    #[test]
    fn left_right_mode_maps_reconstructed_channels() {
        let mid = vec![0.5f32; 9];
        let side = vec![0.25f32; 9];
        let peak = PeakReading::default();
        let frame = input(&mid, &side, &peak);
        let config = DisplayConfig {
            enable_cqt: false,
            stereo_mode: StereoMode::LeftRight,
            slope_correction_db: 0.0,
            ..DisplayConfig::default()
        };
        let p = params(0.0);
        let selection = select_source(&frame, &config).unwrap();
        let mut mapper = SpectrumMapper::new();
        mapper.map(&selection, &p, 800.0, 300.0);

        let expected_main = db_to_y(magnitude_to_db(0.25), &p, 300.0);
        let expected_alt = db_to_y(magnitude_to_db(0.75), &p, 300.0);
        assert!((mapper.main()[0].y - expected_main).abs() < 1e-3);
        assert!((mapper.alternate()[0].y - expected_alt).abs() < 1e-3);
    }

    #[test]
    fn persistence_skips_alternate_channel() {
        let mid = vec![0.5f32; 9];
        let side = vec![0.25f32; 9];
        let peak = PeakReading::default();
        let frame = input(&mid, &side, &peak);
        let config = DisplayConfig {
            enable_cqt: false,
            enable_phosphor: true,
            ..DisplayConfig::default()
        };
        let selection = select_source(&frame, &config).unwrap();
        let mut mapper = SpectrumMapper::new();
        mapper.map(&selection, &params(4.5), 800.0, 300.0);
        assert!(!mapper.main().is_empty());
        assert!(mapper.alternate().is_empty());
    }

    #[test]
    fn buffers_are_reused_between_frames() {
        let mid = vec![0.5f32; 513];
        let side = vec![0.25f32; 513];
        let peak = PeakReading::default();
        let frame = input(&mid, &side, &peak);
        let config = DisplayConfig {
            enable_cqt: false,
            ..DisplayConfig::default()
        };
        let selection = select_source(&frame, &config).unwrap();
        let mut mapper = SpectrumMapper::new();
        mapper.map(&selection, &params(4.5), 800.0, 300.0);
        let capacity = mapper.main.capacity();
        let ptr = mapper.main.as_ptr();

        mapper.map(&selection, &params(4.5), 800.0, 300.0);
        assert_eq!(mapper.main.capacity(), capacity);
        assert_eq!(mapper.main.as_ptr(), ptr);
    }
}
