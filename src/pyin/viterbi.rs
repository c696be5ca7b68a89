use super::hmm::{HmmParams, ObservationFrame};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HmmState {
    pub bin: usize,
    pub voiced: bool,
}

/// Backpointer storage. `fmax` is below a `u32` Nyquist rate and `fmin` is a
/// positive f32, so a valid search range is under 181 octaves (about 21.7k
/// bins at 10 cents) and every state index fits.
type StateIndex = u16;

pub struct ViterbiTracker {
    params: HmmParams,
    backpointers: Vec<Vec<StateIndex>>,
    prev_scores: Vec<f32>,
    frames: usize,
}

impl ViterbiTracker {
    pub fn new(params: HmmParams) -> Self {
        let num_states = params.num_bins() * 2;
        Self {
            params,
            backpointers: Vec::new(),
            prev_scores: vec![f32::NEG_INFINITY; num_states],
            frames: 0,
        }
    }

    pub fn push(&mut self, obs: &ObservationFrame) {
        let num_bins = self.params.num_bins();
        let num_states = num_bins * 2;
        let unvoiced_log = safe_log(0.5 * (1.0 - obs.sum_p));
        let mut back: Vec<StateIndex> = vec![0; num_states];

        if self.frames == 0 {
            let log_init = (1.0 / num_states as f32).ln();
            for bin in 0..num_bins {
                let (unvoiced, voiced) = (self.state_index(bin, false), self.state_index(bin, true));
                self.prev_scores[unvoiced] = log_init + unvoiced_log;
                self.prev_scores[voiced] = log_init + safe_log(0.5 * obs.p_star[bin]);
            }
        } else {
            let max_jump = self.params.max_jump;
            let mut curr = vec![f32::NEG_INFINITY; num_states];
            for next_bin in 0..num_bins {
                let voiced_log = safe_log(0.5 * obs.p_star[next_bin]);

                for &next_voiced in &[false, true] {
                    let obs_log = if next_voiced { voiced_log } else { unvoiced_log };
                    let mut best_prev = f32::NEG_INFINITY;
                    let mut best_state = 0;
                    let min_prev = next_bin.saturating_sub(max_jump);
                    let max_prev = (next_bin + max_jump).min(num_bins - 1);
                    for prev_bin in min_prev..=max_prev {
                        let delta = next_bin as i32 - prev_bin as i32;
                        let Some(delta_idx) = self.params.delta_index(delta) else {
                            continue;
                        };
                        let pitch_log = self.params.log_pitch_transition[delta_idx];
                        for &prev_voiced in &[false, true] {
                            // Eq. (7): voicing transition. Eq. (8): triangular pitch transition.
                            let voicing_log = if prev_voiced == next_voiced {
                                self.params.log_voicing_stay
                            } else {
                                self.params.log_voicing_switch
                            };
                            let prev_idx = self.state_index(prev_bin, prev_voiced);
                            let score = self.prev_scores[prev_idx] + pitch_log + voicing_log;
                            if score > best_prev {
                                best_prev = score;
                                best_state = prev_idx;
                            }
                        }
                    }
                    let idx = self.state_index(next_bin, next_voiced);
                    curr[idx] = best_prev + obs_log;
                    back[idx] = best_state as StateIndex;
                }
            }
            self.prev_scores = curr;
        }

        self.backpointers.push(back);
        self.frames += 1;
    }

    pub fn best_path(&self) -> Vec<HmmState> {
        if self.frames == 0 {
            return Vec::new();
        }
        let best_final = self
            .prev_scores
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(idx, _)| idx)
            .unwrap_or(0);

        let mut path = vec![best_final; self.frames];
        for t in (1..self.frames).rev() {
            path[t - 1] = usize::from(self.backpointers[t][path[t]]);
        }

        path.into_iter().map(|idx| self.state_from_index(idx)).collect()
    }

    pub fn params(&self) -> &HmmParams {
        &self.params
    }

    fn state_index(&self, bin: usize, voiced: bool) -> usize {
        if voiced {
            self.params.num_bins() + bin
        } else {
            bin
        }
    }

    fn state_from_index(&self, idx: usize) -> HmmState {
        let num_bins = self.params.num_bins();
        if idx >= num_bins {
            HmmState {
                bin: idx - num_bins,
                voiced: true,
            }
        } else {
            HmmState { bin: idx, voiced: false }
        }
    }
}

fn safe_log(prob: f32) -> f32 {
    // Floor keeps log(0) finite while preserving relative scoring.
    const FLOOR: f32 = 1e-12;
    prob.max(FLOOR).ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> HmmParams {
        HmmParams::new(100.0, 400.0, 5, 0.01)
    }

    fn voiced_at(params: &HmmParams, bin: usize) -> ObservationFrame {
        let mut p_star = vec![0.0; params.num_bins()];
        p_star[bin] = 0.95;
        ObservationFrame { p_star, sum_p: 0.95 }
    }

    fn silent(params: &HmmParams) -> ObservationFrame {
        ObservationFrame {
            p_star: vec![0.0; params.num_bins()],
            sum_p: 0.0,
        }
    }

    #[test]
    fn empty_tracker_has_no_path() {
        assert!(ViterbiTracker::new(params()).best_path().is_empty());
    }

    #[test]
    fn follows_a_steady_voiced_bin() {
        let params = params();
        let mut tracker = ViterbiTracker::new(params.clone());
        for _ in 0..10 {
            tracker.push(&voiced_at(&params, 40));
        }
        let path = tracker.best_path();
        assert_eq!(path.len(), 10);
        assert!(path.iter().all(|s| *s == HmmState { bin: 40, voiced: true }));
    }

    #[test]
    fn silence_decodes_as_unvoiced() {
        let params = params();
        let mut tracker = ViterbiTracker::new(params.clone());
        for _ in 0..5 {
            tracker.push(&voiced_at(&params, 40));
        }
        for _ in 0..10 {
            tracker.push(&silent(&params));
        }
        let path = tracker.best_path();
        assert!(path[..5].iter().all(|s| s.voiced));
        assert!(path[5..].iter().all(|s| !s.voiced));
    }

    #[test]
    fn wide_search_range_fits_backpointers() {
        let params = HmmParams::new(1.0, 20_000.0, 50, 0.01);
        assert!(params.num_bins() * 2 <= usize::from(StateIndex::MAX) + 1);
        let mut tracker = ViterbiTracker::new(params.clone());
        let top = params.num_bins() - 1;
        for _ in 0..3 {
            tracker.push(&voiced_at(&params, top));
        }
        let path = tracker.best_path();
        assert!(path.iter().all(|s| *s == HmmState { bin: top, voiced: true }));
    }
}
