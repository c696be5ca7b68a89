use super::pyin_stage1::Stage1CandidateFrame;

/// Pitch bin resolution of the HMM state space.
pub const BIN_CENTS: f32 = 10.0;

#[derive(Debug, Clone)]
pub struct HmmParams {
    pub bin_freqs: Vec<f32>,
    pub max_jump: usize,
    pub log_pitch_transition: Vec<f32>,
    pub log_voicing_stay: f32,
    pub log_voicing_switch: f32,
}

impl HmmParams {
    /// Bins every `BIN_CENTS` from `fmin_hz` up to and including `fmax_hz`.
    pub fn new(fmin_hz: f32, fmax_hz: f32, max_jump: usize, switch_prob: f32) -> Self {
        let span_cents = 1200.0 * (fmax_hz / fmin_hz).log2();
        let num_bins = (span_cents / BIN_CENTS).floor() as usize + 1;
        let bin_freqs = (0..num_bins)
            .map(|i| {
                let semitones = (i as f32 * BIN_CENTS) / 100.0;
                fmin_hz * 2.0_f32.powf(semitones / 12.0)
            })
            .collect();
        let max_jump = max_jump.max(1);
        Self {
            bin_freqs,
            max_jump,
            log_pitch_transition: pitch_transition_log_probs(max_jump),
            log_voicing_stay: (1.0 - switch_prob).ln(),
            log_voicing_switch: switch_prob.ln(),
        }
    }

    pub fn num_bins(&self) -> usize {
        self.bin_freqs.len()
    }

    pub fn freq_to_bin(&self, freq_hz: f32) -> Option<usize> {
        let fmin = *self.bin_freqs.first()?;
        if !freq_hz.is_finite() || freq_hz < fmin {
            return None;
        }
        let cents = 1200.0 * (freq_hz / fmin).log2();
        let bin = (cents / BIN_CENTS).round() as usize;
        (bin < self.num_bins()).then_some(bin)
    }

    pub fn delta_index(&self, delta: i32) -> Option<usize> {
        let max_delta = self.max_jump as i32;
        if delta < -max_delta || delta > max_delta {
            return None;
        }
        Some((delta + max_delta) as usize)
    }
}

#[derive(Debug, Clone)]
pub struct ObservationFrame {
    pub p_star: Vec<f32>,
    pub sum_p: f32,
}

pub fn observation_from_candidates(
    params: &HmmParams,
    frame: &Stage1CandidateFrame,
) -> ObservationFrame {
    let mut p_star = vec![0.0_f32; params.num_bins()];
    for candidate in frame.candidates.iter() {
        if let Some(bin) = params.freq_to_bin(candidate.frequency_hz) {
            p_star[bin] += candidate.probability;
        }
    }
    // Accumulated weights can drift past 1.0.
    let sum_p = p_star.iter().sum::<f32>().min(1.0);
    // Voiced mass goes to the pitch bins; the remainder is unvoiced (Eq. 6).
    ObservationFrame { p_star, sum_p }
}

/// The voiced probability `observation_from_candidates` assigns to `bin`.
pub fn bin_probability(params: &HmmParams, frame: &Stage1CandidateFrame, bin: usize) -> f32 {
    frame
        .candidates
        .iter()
        .filter(|c| params.freq_to_bin(c.frequency_hz) == Some(bin))
        .map(|c| c.probability)
        .sum()
}

fn pitch_transition_log_probs(max_delta: usize) -> Vec<f32> {
    let max_delta = max_delta as i32;
    let weights: Vec<f32> = (-max_delta..=max_delta)
        .map(|delta| (max_delta + 1 - delta.abs()) as f32)
        .collect();
    let sum: f32 = weights.iter().sum();
    weights.into_iter().map(|w| (w / sum).ln()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pyin::pyin_stage1::Candidate;

    #[test]
    fn bins_span_search_range() {
        let params = HmmParams::new(65.406, 2093.0, 25, 0.01);
        // Five octaves at 10 cents plus the endpoint.
        assert_eq!(params.num_bins(), 601);
        let top = *params.bin_freqs.last().unwrap();
        assert!((top - 2093.0).abs() < 1.0);
        assert_eq!(params.freq_to_bin(65.406), Some(0));
        assert_eq!(params.freq_to_bin(60.0), None);
        assert_eq!(params.freq_to_bin(4000.0), None);
    }

    #[test]
    fn transition_window_is_normalised() {
        let params = HmmParams::new(100.0, 800.0, 10, 0.01);
        assert_eq!(params.log_pitch_transition.len(), 21);
        let total: f32 = params.log_pitch_transition.iter().map(|l| l.exp()).sum();
        assert!((total - 1.0).abs() < 1e-4);
        assert_eq!(params.delta_index(-10), Some(0));
        assert_eq!(params.delta_index(11), None);
    }

    #[test]
    fn observation_sums_are_clamped() {
        let params = HmmParams::new(100.0, 800.0, 10, 0.01);
        let frame = Stage1CandidateFrame {
            candidates: vec![
                Candidate { frequency_hz: 220.0, probability: 0.7 },
                Candidate { frequency_hz: 440.0, probability: 0.6 },
            ],
        };
        let obs = observation_from_candidates(&params, &frame);
        assert_eq!(obs.sum_p, 1.0);
    }

    #[test]
    fn bin_probability_matches_dense_observation() {
        let params = HmmParams::new(100.0, 800.0, 10, 0.01);
        let frame = Stage1CandidateFrame {
            candidates: vec![
                Candidate { frequency_hz: 250.0, probability: 0.3 },
                Candidate { frequency_hz: 250.3, probability: 0.2 },
                Candidate { frequency_hz: 50.0, probability: 0.4 },
            ],
        };
        let obs = observation_from_candidates(&params, &frame);
        for bin in 0..params.num_bins() {
            assert!((bin_probability(&params, &frame, bin) - obs.p_star[bin]).abs() < 1e-6);
        }
        let bin = params.freq_to_bin(250.0).unwrap();
        assert!((bin_probability(&params, &frame, bin) - 0.5).abs() < 1e-6);
    }
}
