use crate::spectrum::frame::{FrameInput, PeakReading};

/// Smoothed per-frame spectra, rebuilt in place every frame.
#[derive(Clone, Debug, Default)]
pub struct AnalyzedFrame {
    /// FFT magnitude bins `0..=N/2`, linear, full-scale sine = 1.0
    pub fft_mid: Vec<f32>,
    pub fft_side: Vec<f32>,
    /// Log-spaced band magnitudes
    pub cqt_mid: Vec<f32>,
    pub cqt_side: Vec<f32>,
    /// Centre frequency of each log-spaced band (Hz)
    pub cqt_frequencies: Vec<f32>,
    pub peak: PeakReading,
    /// Time in seconds
    pub time: f32,
}

impl AnalyzedFrame {
    pub fn input(&self, sample_rate: f32, window_height: f32, delta_time: f32) -> FrameInput<'_> {
        FrameInput {
            sample_rate,
            window_height,
            delta_time,
            fft_mid: &self.fft_mid,
            fft_side: &self.fft_side,
            cqt_mid: &self.cqt_mid,
            cqt_side: &self.cqt_side,
            cqt_frequencies: &self.cqt_frequencies,
            peak: &self.peak,
        }
    }
}
