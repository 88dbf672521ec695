use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use super::decode::AudioData;
use super::features::AnalyzedFrame;
use crate::spectrum::frame::{NoteSpelling, PeakReading};
use crate::spectrum::mapper::magnitude_to_db;
use crate::spectrum::params::note_names;
use crate::spectrum::pitch::frequency_to_note;

#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisSettings {
    pub fft_size: usize,
    pub bands_per_octave: u32,
    /// Weight of the previous frame in the running average (0.0-1.0)
    pub smoothing: f32,
    pub min_freq: f32,
    pub max_freq: f32,
    pub note_spelling: NoteSpelling,
}

/// FFT bin range feeding one log-spaced band.
#[derive(Clone, Copy, Debug)]
struct BandSpan {
    first_bin: usize,
    last_bin: usize,
    /// Fractional bin of the band centre, used when the band is narrower than a bin.
    centre_bin: f32,
}

/// Streaming mid/side spectrum analyser.
///
/// Buffers are allocated once in [`Analyzer::new`] and reused for every frame.
pub struct Analyzer {
    settings: AnalysisSettings,
    sample_rate: f32,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    window_gain: f32,
    mid_buf: Vec<Complex<f32>>,
    side_buf: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    bands: Vec<BandSpan>,
    frame: AnalyzedFrame,
    primed: bool,
}

impl Analyzer {
    pub fn new(settings: AnalysisSettings, sample_rate: u32) -> Self {
        let n = settings.fft_size;
        let sample_rate = sample_rate as f32;

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        let window = hann_window(n);
        let window_sum: f32 = window.iter().sum();
        let window_gain = if window_sum > 0.0 { 2.0 / window_sum } else { 0.0 };

        let hz_per_bin = sample_rate / n as f32;
        let (frequencies, bands) = log_bands(
            settings.min_freq,
            sample_rate / 2.0,
            settings.bands_per_octave,
            hz_per_bin,
            n / 2,
        );

        let bins = n / 2 + 1;
        let frame = AnalyzedFrame {
            fft_mid: vec![0.0; bins],
            fft_side: vec![0.0; bins],
            cqt_mid: vec![0.0; bands.len()],
            cqt_side: vec![0.0; bands.len()],
            cqt_frequencies: frequencies,
            ..AnalyzedFrame::default()
        };

        log::info!(
            "Analyzer: FFT size {}, {:.2} Hz/bin, {} log bands ({} per octave)",
            n,
            hz_per_bin,
            bands.len(),
            settings.bands_per_octave
        );

        Self {
            settings,
            sample_rate,
            fft,
            window,
            window_gain,
            mid_buf: vec![Complex::new(0.0, 0.0); n],
            side_buf: vec![Complex::new(0.0, 0.0); n],
            scratch,
            bands,
            frame,
            primed: false,
        }
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    /// Analyse the window centred on `time` seconds.
    pub fn analyze(&mut self, audio: &AudioData, time: f32) -> &AnalyzedFrame {
        let n = self.settings.fft_size;
        let center = (time.max(0.0) * self.sample_rate) as usize;
        let start = center.saturating_sub(n / 2);

        for i in 0..n {
            let idx = start + i;
            let (l, r) = match (audio.left.get(idx), audio.right.get(idx)) {
                (Some(&l), Some(&r)) => (l, r),
                _ => (0.0, 0.0),
            };
            let w = self.window[i];
            self.mid_buf[i] = Complex::new((l + r) * 0.5 * w, 0.0);
            self.side_buf[i] = Complex::new((l - r) * 0.5 * w, 0.0);
        }

        self.fft.process_with_scratch(&mut self.mid_buf, &mut self.scratch);
        self.fft.process_with_scratch(&mut self.side_buf, &mut self.scratch);

        let keep = if self.primed {
            self.settings.smoothing.clamp(0.0, 0.999)
        } else {
            0.0
        };
        let fresh = 1.0 - keep;
        let gain = self.window_gain;

        let frame = &mut self.frame;
        for (k, smoothed) in frame.fft_mid.iter_mut().enumerate() {
            *smoothed = *smoothed * keep + self.mid_buf[k].norm() * gain * fresh;
        }
        for (k, smoothed) in frame.fft_side.iter_mut().enumerate() {
            *smoothed = *smoothed * keep + self.side_buf[k].norm() * gain * fresh;
        }
        self.primed = true;

        fill_bands(&self.bands, &frame.fft_mid, &mut frame.cqt_mid);
        fill_bands(&self.bands, &frame.fft_side, &mut frame.cqt_side);

        frame.peak = detect_peak(
            &frame.fft_mid,
            self.sample_rate / n as f32,
            &self.settings,
        );
        frame.time = time;

        &self.frame
    }
}

/// Log-spaced band centres from `min_freq` up to `nyquist`, and the FFT bins
/// each band covers.
fn log_bands(
    min_freq: f32,
    nyquist: f32,
    bands_per_octave: u32,
    hz_per_bin: f32,
    last_bin: usize,
) -> (Vec<f32>, Vec<BandSpan>) {
    let mut frequencies = Vec::new();
    let mut spans = Vec::new();
    if bands_per_octave == 0 || min_freq <= 0.0 || hz_per_bin <= 0.0 {
        return (frequencies, spans);
    }

    let half_band = 2.0f32.powf(0.5 / bands_per_octave as f32);
    let mut k = 0;
    loop {
        let centre = min_freq * 2.0f32.powf(k as f32 / bands_per_octave as f32);
        if centre > nyquist {
            break;
        }
        let first_bin = ((centre / half_band) / hz_per_bin).ceil() as usize;
        let last = ((centre * half_band) / hz_per_bin).floor() as usize;
        frequencies.push(centre);
        spans.push(BandSpan {
            first_bin,
            last_bin: last.min(last_bin),
            centre_bin: centre / hz_per_bin,
        });
        k += 1;
    }

    (frequencies, spans)
}

fn fill_bands(bands: &[BandSpan], bins: &[f32], out: &mut [f32]) {
    for (band, value) in bands.iter().zip(out.iter_mut()) {
        *value = if band.first_bin <= band.last_bin {
            bins[band.first_bin..=band.last_bin]
                .iter()
                .copied()
                .fold(0.0f32, f32::max)
        } else {
            interpolate(bins, band.centre_bin)
        };
    }
}

fn interpolate(bins: &[f32], position: f32) -> f32 {
    if bins.is_empty() {
        return 0.0;
    }
    let lower = (position.floor() as usize).min(bins.len() - 1);
    let upper = (lower + 1).min(bins.len() - 1);
    let t = position - lower as f32;
    bins[lower] + (bins[upper] - bins[lower]) * t.clamp(0.0, 1.0)
}

/// Strongest mid bin inside the display range, refined by parabolic
/// interpolation over neighbouring dB values.
fn detect_peak(bins: &[f32], hz_per_bin: f32, settings: &AnalysisSettings) -> PeakReading {
    let first = ((settings.min_freq / hz_per_bin).ceil() as usize).max(1);
    let last = ((settings.max_freq / hz_per_bin).floor() as usize).min(bins.len().saturating_sub(2));
    if first > last {
        return PeakReading::default();
    }

    let (index, &magnitude) = match bins[first..=last]
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
    {
        Some((offset, m)) => (first + offset, m),
        None => return PeakReading::default(),
    };
    if !(magnitude > 0.0) {
        return PeakReading::default();
    }

    let a = magnitude_to_db(bins[index - 1]);
    let b = magnitude_to_db(magnitude);
    let c = magnitude_to_db(bins[index + 1]);
    let denom = a - 2.0 * b + c;
    let offset = if denom.abs() > f32::EPSILON {
        (0.5 * (a - c) / denom).clamp(-0.5, 0.5)
    } else {
        0.0
    };

    let freq = (index as f32 + offset) * hz_per_bin;
    let db = b - 0.25 * (a - c) * offset;
    let note = frequency_to_note(freq, Some(note_names(settings.note_spelling)));

    PeakReading {
        freq,
        db,
        note: note.name,
        octave: note.octave,
        cents: note.cents,
        valid: true,
    }
}

fn hann_window(size: usize) -> Vec<f32> {
    if size < 2 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 48000;

    fn settings() -> AnalysisSettings {
        AnalysisSettings {
            fft_size: 4096,
            bands_per_octave: 24,
            smoothing: 0.5,
            min_freq: 20.0,
            max_freq: 20000.0,
            note_spelling: NoteSpelling::Sharp,
        }
    }

    fn tone(freq: f32, left_gain: f32, right_gain: f32, seconds: f32) -> AudioData {
        let len = (SAMPLE_RATE as f32 * seconds) as usize;
        let wave: Vec<f32> = (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / SAMPLE_RATE as f32).sin())
            .collect();
        AudioData {
            left: wave.iter().map(|s| s * left_gain).collect(),
            right: wave.iter().map(|s| s * right_gain).collect(),
            sample_rate: SAMPLE_RATE,
        }
    }

    #[test]
    fn bin_count_matches_inferred_fft_size() {
        let mut analyzer = Analyzer::new(settings(), SAMPLE_RATE);
        let frame = analyzer.analyze(&tone(750.0, 1.0, 1.0, 0.5), 0.25);
        assert_eq!((frame.fft_mid.len() - 1) * 2, 4096);
        assert_eq!(frame.fft_mid.len(), frame.fft_side.len());
        assert_eq!(frame.cqt_mid.len(), frame.cqt_frequencies.len());
        assert_eq!(frame.cqt_side.len(), frame.cqt_frequencies.len());
    }

    #[test]
    fn full_scale_centred_sine_reads_zero_db() {
        // 750 Hz sits exactly on bin 64 at 4096 / 48 kHz.
        let mut analyzer = Analyzer::new(settings(), SAMPLE_RATE);
        let frame = analyzer.analyze(&tone(750.0, 1.0, 1.0, 0.5), 0.25);

        assert!(frame.peak.valid);
        assert!((frame.peak.freq - 750.0).abs() < 1.0, "freq={}", frame.peak.freq);
        assert!(frame.peak.db.abs() < 0.2, "db={}", frame.peak.db);
        assert_eq!((frame.peak.note, frame.peak.octave), ("F#", 5));
        // Identical channels carry no side energy.
        assert!(frame.fft_side.iter().all(|&m| m < 1e-4));
    }

    #[test]
    fn out_of_phase_signal_lands_in_side() {
        let mut analyzer = Analyzer::new(settings(), SAMPLE_RATE);
        let frame = analyzer.analyze(&tone(750.0, 1.0, -1.0, 0.5), 0.25);
        assert!(frame.fft_mid.iter().all(|&m| m < 1e-4));
        assert!((frame.fft_side[64] - 1.0).abs() < 0.01);
    }

    #[test]
    fn silence_has_no_valid_peak() {
        let mut analyzer = Analyzer::new(settings(), SAMPLE_RATE);
        let frame = analyzer.analyze(&tone(750.0, 0.0, 0.0, 0.5), 0.25);
        assert!(!frame.peak.valid);
    }

    #[test]
    fn smoothing_blends_consecutive_frames() {
        let mut analyzer = Analyzer::new(settings(), SAMPLE_RATE);
        let loud = tone(750.0, 1.0, 1.0, 0.5);
        let quiet = tone(750.0, 0.0, 0.0, 0.5);
        let first = analyzer.analyze(&loud, 0.25).fft_mid[64];
        let second = analyzer.analyze(&quiet, 0.25).fft_mid[64];
        assert!((second - first * 0.5).abs() < 1e-3, "first={first} second={second}");
    }

    #[test]
    fn log_bands_are_monotonic_and_cover_nyquist() {
        let analyzer = Analyzer::new(settings(), SAMPLE_RATE);
        let freqs = &analyzer.frame.cqt_frequencies;
        assert!((freqs[0] - 20.0).abs() < 1e-4);
        assert!(freqs.windows(2).all(|w| w[1] > w[0]));
        assert!(*freqs.last().unwrap() <= 24000.0);
        // Ten octaves from 20 Hz is 20.48 kHz; 24 bands each.
        assert!(freqs.len() > 24 * 10);
    }

    #[test]
    fn narrow_bands_interpolate() {
        let bins = [0.0, 1.0, 3.0];
        assert!((interpolate(&bins, 1.5) - 2.0).abs() < 1e-6);
        assert_eq!(interpolate(&bins, 10.0), 3.0);
        assert_eq!(interpolate(&[], 1.0), 0.0);
    }
}
