//! Frequency to note-name mapping and run collapsing.
//!
//! Note names use sharps only and scientific octave numbering, so MIDI 60 is
//! `C4` and A440 (MIDI 69) is `A4`.

use std::fmt;

use serde::Serialize;

/// Frequencies below this are treated as estimator noise rather than notes.
pub const DEFAULT_MIN_HZ: f64 = 20.0;

const A4_HZ: f64 = 440.0;
const A4_MIDI: f64 = 69.0;

const PITCH_CLASSES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// A sharps-only note name such as `A4` or `C#2`.
///
/// Always derived from a MIDI number, so two names are equal exactly when
/// their MIDI numbers are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub struct NoteName {
    midi: i32,
}

impl NoteName {
    pub fn from_midi(midi: i32) -> Self {
        Self { midi }
    }

    pub fn midi(self) -> i32 {
        self.midi
    }

    pub fn pitch_class(self) -> &'static str {
        PITCH_CLASSES[self.midi.rem_euclid(12) as usize]
    }

    pub fn octave(self) -> i32 {
        self.midi.div_euclid(12) - 1
    }
}

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class(), self.octave())
    }
}

impl From<NoteName> for String {
    fn from(note: NoteName) -> Self {
        note.to_string()
    }
}

/// Maps frame frequencies to note names, rejecting anything under `min_hz`.
#[derive(Debug, Clone, Copy)]
pub struct NoteMapper {
    min_hz: f64,
}

impl Default for NoteMapper {
    fn default() -> Self {
        Self {
            min_hz: DEFAULT_MIN_HZ,
        }
    }
}

impl NoteMapper {
    /// Non-positive or non-finite floors fall back to [`DEFAULT_MIN_HZ`] so
    /// the logarithm never sees `hz <= 0`.
    pub fn with_min_hz(min_hz: f64) -> Self {
        if min_hz.is_finite() && min_hz > 0.0 {
            Self { min_hz }
        } else {
            Self::default()
        }
    }

    pub fn min_hz(&self) -> f64 {
        self.min_hz
    }

    pub fn map(&self, hz: Option<f64>) -> Option<NoteName> {
        let hz = hz?;
        if hz == 0.0 || !hz.is_finite() || hz < self.min_hz {
            return None;
        }
        Some(NoteName::from_midi(midi_from_hz(hz)))
    }
}

/// Nearest equal-tempered MIDI number, ties to even. Caller guarantees `hz > 0`.
pub fn midi_from_hz(freq_hz: f64) -> i32 {
    let midi = A4_MIDI + 12.0 * (freq_hz / A4_HZ).log2();
    midi.round_ties_even() as i32
}

/// [`NoteMapper::map`] with the default 20 Hz floor.
pub fn hz_to_note(hz: Option<f64>) -> Option<NoteName> {
    NoteMapper::default().map(hz)
}

/// Drops gaps and collapses adjacent repeats, keeping temporal order.
///
/// Gaps do not break a run: `[A4, None, A4]` yields `[A4]`.
pub fn collapse_repeats<I>(frames: I) -> Vec<NoteName>
where
    I: IntoIterator<Item = Option<NoteName>>,
{
    let mut notes: Vec<NoteName> = Vec::new();
    for note in frames.into_iter().flatten() {
        if notes.last() != Some(&note) {
            notes.push(note);
        }
    }
    notes
}

/// Map every frame frequency and collapse the result.
pub fn notes_from_frequencies<I>(mapper: &NoteMapper, frequencies: I) -> Vec<NoteName>
where
    I: IntoIterator<Item = Option<f64>>,
{
    collapse_repeats(frequencies.into_iter().map(|hz| mapper.map(hz)))
}
