use std::fmt;

use super::mapper::SLOPE_PIVOT_HZ;
use super::params::{DerivedParameters, NoteNames};

const A4_HZ: f32 = 440.0;
const A4_MIDI: f32 = 69.0;
const MIDI_MAX: f32 = 127.0;

/// A frequency expressed as an equal-tempered note.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NoteReading {
    /// Empty when there is no note.
    pub name: &'static str,
    pub octave: i32,
    /// Signed offset from the named note, -50..=50.
    pub cents: i32,
}

impl NoteReading {
    pub const NONE: NoteReading = NoteReading {
        name: "",
        octave: 0,
        cents: 0,
    };

    pub fn is_none(&self) -> bool {
        self.name.is_empty()
    }
}

/// Names `frequency` with the given table, or [`NoteReading::NONE`] when the
/// frequency is non-positive, the table is missing, or MIDI falls outside
/// `0..=127`.
pub fn frequency_to_note(frequency: f32, names: Option<&NoteNames>) -> NoteReading {
    let Some(names) = names else {
        return NoteReading::NONE;
    };
    if !(frequency > 0.0) {
        return NoteReading::NONE;
    }

    let midi = A4_MIDI + 12.0 * (frequency / A4_HZ).log2();
    if !(0.0..=MIDI_MAX).contains(&midi) {
        return NoteReading::NONE;
    }

    let rounded = midi.round() as i32;
    // The +1200 keeps the modulo positive.
    let index = ((rounded + 1200) % 12) as usize;
    NoteReading {
        name: names[index],
        octave: rounded.div_euclid(12) - 1,
        cents: ((midi - rounded as f32) * 100.0).round() as i32,
    }
}

/// dB offset that the forward slope correction added at `frequency`.
pub fn slope_correction_db(frequency: f32, slope_exponent: f32) -> f32 {
    20.0 * slope_exponent * (frequency / SLOPE_PIVOT_HZ).log10()
}

/// Frequency and uncorrected level under a panel coordinate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProbeReading {
    pub frequency: f32,
    /// Level with the slope correction removed.
    pub db: f32,
}

/// Inverse of the spectrum mapping for a given panel geometry.
#[derive(Clone, Copy, Debug)]
pub struct PitchProbe<'p> {
    params: &'p DerivedParameters,
    panel_width: f32,
    window_height: f32,
}

impl<'p> PitchProbe<'p> {
    pub fn new(params: &'p DerivedParameters, panel_width: f32, window_height: f32) -> Self {
        Self {
            params,
            panel_width,
            window_height,
        }
    }

    pub fn frequency_at(&self, x: f32) -> f32 {
        ((x / self.panel_width) * self.params.log_freq_range + self.params.log_min_freq).exp()
    }

    pub fn displayed_db_at(&self, y: f32) -> f32 {
        (y / self.window_height) * self.params.db_range + self.params.min_db
    }

    pub fn probe(&self, x: f32, y: f32) -> ProbeReading {
        let frequency = self.frequency_at(x);
        let displayed = self.displayed_db_at(y);
        ProbeReading {
            frequency,
            db: displayed - slope_correction_db(frequency, self.params.slope_exponent),
        }
    }

    pub fn note(&self, frequency: f32) -> NoteReading {
        frequency_to_note(frequency, Some(self.params.note_names))
    }
}

/// One line of the level / frequency / note overlay.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Readout {
    pub db: f32,
    pub frequency: f32,
    pub note: NoteReading,
}

impl fmt::Display for Readout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:6.2} dB  |  {:7.2} Hz  |  {}{} {:+} Cents",
            self.db, self.frequency, self.note.name, self.note.octave, self.note.cents
        )
    }
}
