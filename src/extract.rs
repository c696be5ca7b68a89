//! Decoded audio in, collapsed note names out.

use anyhow::{Context, Result};

use crate::decode::DecodedAudio;
use crate::notes::{notes_from_frequencies, NoteMapper, NoteName};
use crate::pyin::{estimate_f0, PyinConfig};

/// Estimator settings plus note mapping, shared by every request.
///
/// `pyin.sample_rate_hz` is a template value; each call uses the rate of the
/// audio it is given.
#[derive(Debug, Clone, Default)]
pub struct NoteExtractor {
    pub pyin: PyinConfig,
    pub mapper: NoteMapper,
}

impl NoteExtractor {
    pub fn new(pyin: PyinConfig, mapper: NoteMapper) -> Self {
        Self { pyin, mapper }
    }

    pub fn extract(&self, audio: &DecodedAudio) -> Result<Vec<NoteName>> {
        let cfg = PyinConfig {
            sample_rate_hz: audio.sample_rate_hz,
            ..self.pyin.clone()
        };
        let frames = estimate_f0(&audio.samples, &cfg)
            .with_context(|| format!("pitch estimation failed at {} Hz", audio.sample_rate_hz))?;
        let voiced = frames.iter().filter(|f| f.voiced).count();
        let notes = notes_from_frequencies(&self.mapper, frames.iter().map(|f| f.f0_hz));
        log::debug!(
            "{} frames ({} voiced) -> {} notes",
            frames.len(),
            voiced,
            notes.len()
        );
        Ok(notes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sine notes separated by 150 ms of silence.
    fn melody(freqs: &[f32], seconds_each: f32, sample_rate: u32) -> DecodedAudio {
        let per_note = (seconds_each * sample_rate as f32) as usize;
        let gap = (0.15 * sample_rate as f32) as usize;
        let mut samples = Vec::new();
        for &freq in freqs {
            let step = 2.0 * std::f32::consts::PI * freq / sample_rate as f32;
            samples.extend((0..per_note).map(|i| 0.6 * (step * i as f32).sin()));
            samples.extend(std::iter::repeat(0.0).take(gap));
        }
        DecodedAudio {
            samples,
            sample_rate_hz: sample_rate,
        }
    }

    #[test]
    fn melody_to_note_names() {
        let extractor = NoteExtractor::default();
        let audio = melody(&[261.63, 329.63, 392.0], 0.5, 16_000);
        let notes: Vec<String> = extractor
            .extract(&audio)
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(notes, ["C4", "E4", "G4"]);
    }

    #[test]
    fn silence_has_no_notes() {
        let audio = DecodedAudio {
            samples: vec![0.0; 16_000],
            sample_rate_hz: 16_000,
        };
        assert!(NoteExtractor::default().extract(&audio).unwrap().is_empty());
    }

    #[test]
    fn reports_unusable_sample_rates() {
        let audio = DecodedAudio {
            samples: vec![0.0; 1000],
            sample_rate_hz: 1000,
        };
        let err = NoteExtractor::default().extract(&audio).unwrap_err();
        assert!(format!("{:#}", err).contains("invalid pYIN configuration"));
    }
}
