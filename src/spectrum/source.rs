use super::frame::{AnalysisMethod, DisplayConfig, FrameInput, StereoMode};

/// Bin layout of one analysis pass.
pub trait SpectrumSource {
    fn method(&self) -> AnalysisMethod;
    fn bin_count(&self) -> usize;
    /// First bin that carries frequency information.
    fn start_bin(&self) -> usize;
    fn frequency(&self, bin: usize) -> f32;
}

/// Evenly spaced FFT bins, `0..=N/2`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UniformBins {
    bin_count: usize,
    hz_per_bin: f32,
}

impl UniformBins {
    /// The FFT size is inferred as `(bin_count - 1) * 2`.
    pub fn new(bin_count: usize, sample_rate: f32) -> Self {
        let fft_size = bin_count.saturating_sub(1) * 2;
        let hz_per_bin = if fft_size == 0 {
            0.0
        } else {
            sample_rate / fft_size as f32
        };
        Self {
            bin_count,
            hz_per_bin,
        }
    }

    pub fn hz_per_bin(&self) -> f32 {
        self.hz_per_bin
    }
}

impl SpectrumSource for UniformBins {
    fn method(&self) -> AnalysisMethod {
        AnalysisMethod::Uniform
    }

    fn bin_count(&self) -> usize {
        self.bin_count
    }

    fn start_bin(&self) -> usize {
        1
    }

    fn frequency(&self, bin: usize) -> f32 {
        bin as f32 * self.hz_per_bin
    }
}

/// Bins with an explicit centre-frequency table.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NonUniformBins<'a> {
    frequencies: &'a [f32],
}

impl<'a> NonUniformBins<'a> {
    pub fn new(frequencies: &'a [f32]) -> Self {
        Self { frequencies }
    }
}

impl SpectrumSource for NonUniformBins<'_> {
    fn method(&self) -> AnalysisMethod {
        AnalysisMethod::NonUniform
    }

    fn bin_count(&self) -> usize {
        self.frequencies.len()
    }

    fn start_bin(&self) -> usize {
        0
    }

    fn frequency(&self, bin: usize) -> f32 {
        self.frequencies[bin]
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BinLayout<'a> {
    Uniform(UniformBins),
    NonUniform(NonUniformBins<'a>),
}

impl BinLayout<'_> {
    pub fn method(&self) -> AnalysisMethod {
        match self {
            BinLayout::Uniform(bins) => bins.method(),
            BinLayout::NonUniform(bins) => bins.method(),
        }
    }
}

/// Result of the per-frame source and channel decision.
#[derive(Clone, Copy, Debug)]
pub struct SourceSelection<'a> {
    pub layout: BinLayout<'a>,
    pub mid: &'a [f32],
    pub side: &'a [f32],
    /// Reconstruct left/right from mid/side before mapping.
    pub reconstruct_left_right: bool,
    /// Map the alternate channel at all.
    pub show_alternate: bool,
}

impl SourceSelection<'_> {
    pub fn method(&self) -> AnalysisMethod {
        self.layout.method()
    }
}

/// Picks the analysis pass and channel presentation for this frame.
///
/// Non-uniform data wins when enabled and both channels are present, then
/// uniform data; `None` means nothing is drawn. Persistence mode always
/// shows a single mid trace.
pub fn select_source<'a>(
    frame: &FrameInput<'a>,
    config: &DisplayConfig,
) -> Option<SourceSelection<'a>> {
    let use_cqt = config.enable_cqt && !frame.cqt_mid.is_empty() && !frame.cqt_side.is_empty();
    let use_fft = !frame.fft_mid.is_empty() && !frame.fft_side.is_empty();

    let (layout, mid, side) = if use_cqt {
        (
            BinLayout::NonUniform(NonUniformBins::new(frame.cqt_frequencies)),
            frame.cqt_mid,
            frame.cqt_side,
        )
    } else if use_fft {
        (
            BinLayout::Uniform(UniformBins::new(frame.fft_mid.len(), frame.sample_rate)),
            frame.fft_mid,
            frame.fft_side,
        )
    } else {
        return None;
    };

    Some(SourceSelection {
        layout,
        mid,
        side,
        reconstruct_left_right: config.stereo_mode == StereoMode::LeftRight
            && !config.enable_phosphor,
        show_alternate: !config.enable_phosphor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrum::frame::PeakReading;

    fn frame<'a>(
        fft: &'a [f32],
        cqt: &'a [f32],
        freqs: &'a [f32],
        peak: &'a PeakReading,
    ) -> FrameInput<'a> {
        FrameInput {
            sample_rate: 48000.0,
            window_height: 300.0,
            delta_time: 0.016,
            fft_mid: fft,
            fft_side: fft,
            cqt_mid: cqt,
            cqt_side: cqt,
            cqt_frequencies: freqs,
            peak,
        }
    }

    #[test]
    fn uniform_bins_infer_fft_size() {
        let bins = UniformBins::new(2049, 48000.0);
        assert_eq!(bins.start_bin(), 1);
        assert!((bins.hz_per_bin() - 48000.0 / 4096.0).abs() < 1e-6);
        assert!((bins.frequency(2048) - 24000.0).abs() < 1e-2);
    }

    #[test]
    fn single_bin_has_no_usable_frequency() {
        let bins = UniformBins::new(1, 48000.0);
        assert_eq!(bins.hz_per_bin(), 0.0);
        assert_eq!(bins.bin_count(), 1);
    }

    #[test]
    fn prefers_non_uniform_when_enabled() {
        let peak = PeakReading::default();
        let fft = [1.0; 9];
        let cqt = [1.0; 4];
        let freqs = [100.0, 200.0, 400.0, 800.0];
        let input = frame(&fft, &cqt, &freqs, &peak);

        let config = DisplayConfig::default();
        let sel = select_source(&input, &config).unwrap();
        assert_eq!(sel.method(), AnalysisMethod::NonUniform);
        assert_eq!(sel.mid.len(), 4);

        let config = DisplayConfig {
            enable_cqt: false,
            ..DisplayConfig::default()
        };
        let sel = select_source(&input, &config).unwrap();
        assert_eq!(sel.method(), AnalysisMethod::Uniform);
        assert_eq!(sel.mid.len(), 9);
    }

    #[test]
    fn falls_back_to_uniform_and_then_nothing() {
        let peak = PeakReading::default();
        let fft = [1.0; 9];
        let input = frame(&fft, &[], &[], &peak);
        let sel = select_source(&input, &DisplayConfig::default()).unwrap();
        assert_eq!(sel.method(), AnalysisMethod::Uniform);

        let input = frame(&[], &[], &[], &peak);
        assert!(select_source(&input, &DisplayConfig::default()).is_none());
    }

    #[test]
    fn persistence_forces_single_mid_trace() {
        let peak = PeakReading::default();
        let fft = [1.0; 9];
        let input = frame(&fft, &[], &[], &peak);

        let config = DisplayConfig {
            stereo_mode: StereoMode::LeftRight,
            ..DisplayConfig::default()
        };
        let sel = select_source(&input, &config).unwrap();
        assert!(sel.reconstruct_left_right);
        assert!(sel.show_alternate);

        let config = DisplayConfig {
            stereo_mode: StereoMode::LeftRight,
            enable_phosphor: true,
            ..DisplayConfig::default()
        };
        let sel = select_source(&input, &config).unwrap();
        assert!(!sel.reconstruct_left_right);
        assert!(!sel.show_alternate);
    }
}
