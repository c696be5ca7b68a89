//! Pure-Rust pYIN fundamental frequency estimator.
//!
//! Implements the two-stage algorithm from "pYIN: A Fundamental Frequency
//! Estimator Using Probabilistic Threshold Distributions" (Mauch & Dixon):
//! YIN candidates under a Beta threshold prior, then Viterbi decoding over a
//! voiced/unvoiced pitch HMM. Frames whose best state is unvoiced report no
//! frequency.

mod hmm;
mod pyin_stage1;
mod viterbi;
mod yin;

use thiserror::Error;

use hmm::{HmmParams, BIN_CENTS};
use pyin_stage1::{Stage1Analyzer, Stage1CandidateFrame};
use viterbi::ViterbiTracker;

/// Scientific-pitch C2, the default lower search bound.
pub const C2_HZ: f32 = 65.406_39;
/// Scientific-pitch C7, the default upper search bound.
pub const C7_HZ: f32 = 2093.004_5;

#[derive(Debug, Clone, Error)]
pub enum PyinError {
    #[error("invalid pYIN configuration: {0}")]
    InvalidConfig(String),
}

/// Beta(alpha, beta) prior over the YIN thresholds. The default Beta(2, 18)
/// has mean 0.1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BetaPrior {
    pub alpha: f32,
    pub beta: f32,
}

impl Default for BetaPrior {
    fn default() -> Self {
        Self {
            alpha: 2.0,
            beta: 18.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PyinConfig {
    pub sample_rate_hz: u32,
    pub frame_size: usize,
    pub hop_size: usize,
    pub fmin_hz: f32,
    pub fmax_hz: f32,
    pub beta_prior: BetaPrior,
    pub pa_absolute_min: f32,
    /// Fastest pitch glide the HMM allows, in octaves per second.
    pub max_transition_rate: f32,
    /// Probability of flipping between voiced and unvoiced per frame.
    pub switch_prob: f32,
    /// Pad `frame_size / 2` zeros on both sides so frame `i` is centred at `i * hop`.
    pub center: bool,
    pub return_candidates: bool,
}

impl Default for PyinConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 44_100,
            frame_size: 2048,
            hop_size: 512,
            fmin_hz: C2_HZ,
            fmax_hz: C7_HZ,
            beta_prior: BetaPrior::default(),
            pa_absolute_min: 0.01,
            max_transition_rate: 35.92,
            switch_prob: 0.01,
            center: true,
            return_candidates: false,
        }
    }
}

impl PyinConfig {
    pub fn validate(&self) -> Result<(), PyinError> {
        if self.sample_rate_hz == 0 {
            return Err(PyinError::InvalidConfig("sample_rate_hz must be > 0".to_string()));
        }
        if self.frame_size == 0 || self.hop_size == 0 {
            return Err(PyinError::InvalidConfig(
                "frame_size and hop_size must be > 0".to_string(),
            ));
        }
        if self.hop_size > self.frame_size {
            return Err(PyinError::InvalidConfig(
                "hop_size must be <= frame_size".to_string(),
            ));
        }
        let nyquist = self.sample_rate_hz as f32 / 2.0;
        if !(self.fmin_hz > 0.0 && self.fmin_hz < self.fmax_hz && self.fmax_hz < nyquist) {
            return Err(PyinError::InvalidConfig(format!(
                "search range {}..{} Hz must satisfy 0 < fmin < fmax < {} Hz",
                self.fmin_hz, self.fmax_hz, nyquist
            )));
        }
        let BetaPrior { alpha, beta } = self.beta_prior;
        if !(alpha.is_finite() && beta.is_finite() && alpha > 0.0 && beta > 0.0) {
            return Err(PyinError::InvalidConfig(format!(
                "beta prior ({}, {}) must have positive parameters",
                alpha, beta
            )));
        }
        if !(0.0..1.0).contains(&self.switch_prob) || self.switch_prob == 0.0 {
            return Err(PyinError::InvalidConfig(
                "switch_prob must be in (0, 1)".to_string(),
            ));
        }
        Ok(())
    }

    /// Widest pitch move between consecutive frames, in HMM bins.
    fn max_jump_bins(&self) -> usize {
        let hop_sec = self.hop_size as f32 / self.sample_rate_hz as f32;
        let semitones = self.max_transition_rate * 12.0 * hop_sec;
        (semitones * 100.0 / BIN_CENTS).round().max(1.0) as usize
    }
}

#[derive(Debug, Clone)]
pub struct FrameEstimate {
    pub frame_index: u64,
    pub time_sec: f64,
    pub f0_hz: Option<f64>,
    pub voiced: bool,
    /// Observation probability of the winning HMM state (voiced bin or unvoiced).
    pub confidence: f32,
    pub candidates: Option<Vec<(f32, f32)>>,
}

/// Streaming tracker. Samples are framed as they arrive and the Viterbi path
/// is re-decoded over the full history on every push.
pub struct Pyin {
    cfg: PyinConfig,
    stage1: Stage1Analyzer,
    sample_buffer: Vec<f32>,
    /// Frames analysed but not yet returned.
    pending: Vec<PendingFrame>,
    viterbi: ViterbiTracker,
    last_emitted: usize,
}

struct PendingFrame {
    candidates: Stage1CandidateFrame,
    sum_p: f32,
}

impl Pyin {
    pub fn new(cfg: PyinConfig) -> Result<Self, PyinError> {
        cfg.validate()?;
        Ok(Self {
            stage1: Stage1Analyzer::new(&cfg),
            viterbi: ViterbiTracker::new(Self::hmm_params(&cfg)),
            cfg,
            sample_buffer: Vec::new(),
            pending: Vec::new(),
            last_emitted: 0,
        })
    }

    fn hmm_params(cfg: &PyinConfig) -> HmmParams {
        HmmParams::new(cfg.fmin_hz, cfg.fmax_hz, cfg.max_jump_bins(), cfg.switch_prob)
    }

    pub fn reset(&mut self) {
        self.sample_buffer.clear();
        self.pending.clear();
        self.viterbi = ViterbiTracker::new(Self::hmm_params(&self.cfg));
        self.last_emitted = 0;
    }

    /// Append samples and return estimates for every frame completed since the last call.
    pub fn push_samples(&mut self, samples: &[f32]) -> Vec<FrameEstimate> {
        self.sample_buffer.extend_from_slice(samples);

        let (frame_size, hop) = (self.cfg.frame_size, self.cfg.hop_size);
        let mut start = 0;
        while self.sample_buffer.len() - start >= frame_size {
            let frame = &self.sample_buffer[start..start + frame_size];
            let candidates = self.stage1.process_frame(frame);
            let obs = hmm::observation_from_candidates(self.viterbi.params(), &candidates);
            self.viterbi.push(&obs);
            self.pending.push(PendingFrame {
                candidates,
                sum_p: obs.sum_p,
            });
            start += hop;
        }
        // Consumed samples are dropped once per call, not once per frame.
        self.sample_buffer.drain(..start);

        if self.pending.is_empty() {
            return Vec::new();
        }

        let state_path = self.viterbi.best_path();
        let params = self.viterbi.params();
        let first = self.last_emitted;
        let mut output = Vec::with_capacity(self.pending.len());
        for (offset, frame) in self.pending.drain(..).enumerate() {
            let idx = first + offset;
            let state = state_path[idx];
            let time_sec = idx as f64 * hop as f64 / self.cfg.sample_rate_hz as f64;
            let (f0_hz, confidence) = if state.voiced {
                let f0 = params.bin_freqs[state.bin];
                (
                    Some(f64::from(f0)),
                    hmm::bin_probability(params, &frame.candidates, state.bin).min(1.0),
                )
            } else {
                (None, 1.0 - frame.sum_p)
            };
            let candidates = self.cfg.return_candidates.then(|| {
                frame
                    .candidates
                    .candidates
                    .iter()
                    .map(|c| (c.frequency_hz, c.probability))
                    .collect()
            });

            output.push(FrameEstimate {
                frame_index: idx as u64,
                time_sec,
                f0_hz,
                voiced: state.voiced,
                confidence,
                candidates,
            });
        }

        self.last_emitted = state_path.len();
        output
    }
}

/// Estimate f0 for a whole mono signal in one pass.
///
/// With `cfg.center` the signal is zero-padded by half a frame on each side,
/// giving `1 + samples.len() / hop_size` frames. Without it, a signal shorter
/// than one frame yields no frames.
pub fn estimate_f0(samples: &[f32], cfg: &PyinConfig) -> Result<Vec<FrameEstimate>, PyinError> {
    let mut pyin = Pyin::new(cfg.clone())?;
    if cfg.center {
        let pad = vec![0.0_f32; cfg.frame_size / 2];
        let mut padded = Vec::with_capacity(samples.len() + 2 * pad.len());
        padded.extend_from_slice(&pad);
        padded.extend_from_slice(samples);
        padded.extend_from_slice(&pad);
        // Odd frame sizes lose a sample to the halving; top up so the last frame fits.
        padded.resize(padded.len().max(cfg.frame_size) + cfg.frame_size % 2, 0.0);
        Ok(pyin.push_samples(&padded))
    } else {
        Ok(pyin.push_samples(samples))
    }
}
