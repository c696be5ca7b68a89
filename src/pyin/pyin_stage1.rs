use super::yin::{
    cumulative_mean_normalized_difference, local_minima, parabolic_interpolation,
    DifferenceKernel,
};
use super::{BetaPrior, PyinConfig};

const NUM_THRESHOLDS: usize = 100;

#[derive(Debug, Clone)]
pub struct Stage1Config {
    pub sample_rate_hz: u32,
    pub min_tau: usize,
    pub max_tau: usize,
    pub thresholds: Vec<f32>,
    pub threshold_priors: Vec<f32>,
    pub pa_absolute_min: f32,
}

impl Stage1Config {
    pub fn from_config(cfg: &PyinConfig) -> Self {
        let thresholds: Vec<f32> = (1..=NUM_THRESHOLDS)
            .map(|i| i as f32 / NUM_THRESHOLDS as f32)
            .collect();
        let threshold_priors = beta_prior_distribution(&thresholds, cfg.beta_prior);

        let sr = cfg.sample_rate_hz as f32;
        let max_tau = ((sr / cfg.fmin_hz).floor() as usize).min(cfg.frame_size.saturating_sub(1));
        let min_tau = ((sr / cfg.fmax_hz).ceil() as usize).max(1).min(max_tau);
        Self {
            sample_rate_hz: cfg.sample_rate_hz,
            min_tau,
            max_tau,
            thresholds,
            threshold_priors,
            pa_absolute_min: cfg.pa_absolute_min,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Candidate {
    pub frequency_hz: f32,
    pub probability: f32,
}

#[derive(Debug, Clone, Default)]
pub struct Stage1CandidateFrame {
    pub candidates: Vec<Candidate>,
}

/// Stage 1 state for one frame length: the threshold prior plus FFT plans.
pub struct Stage1Analyzer {
    cfg: Stage1Config,
    kernel: DifferenceKernel,
}

impl Stage1Analyzer {
    pub fn new(cfg: &PyinConfig) -> Self {
        Self {
            cfg: Stage1Config::from_config(cfg),
            kernel: DifferenceKernel::new(cfg.frame_size),
        }
    }

    pub fn process_frame(&mut self, frame: &[f32]) -> Stage1CandidateFrame {
        let diff = self.kernel.compute(frame, self.cfg.max_tau);
        candidates_from_difference(&diff, &self.cfg)
    }
}

fn candidates_from_difference(diff: &[f32], cfg: &Stage1Config) -> Stage1CandidateFrame {
    let (min_tau, max_tau) = (cfg.min_tau, cfg.max_tau);
    if max_tau < 2 {
        return Stage1CandidateFrame::default();
    }

    let cmnd = cumulative_mean_normalized_difference(diff);

    let minima: Vec<usize> = local_minima(&cmnd)
        .into_iter()
        .filter(|tau| (min_tau..=max_tau).contains(tau))
        .collect();
    let global_min_tau = (min_tau..=max_tau)
        .min_by(|&a, &b| cmnd[a].total_cmp(&cmnd[b]))
        .unwrap_or(min_tau);

    let mut candidate_map: Vec<(usize, f32)> = Vec::new();

    for (threshold, prior) in cfg.thresholds.iter().zip(&cfg.threshold_priors) {
        // Eq. (4)/(5): the first trough under the threshold, otherwise the
        // global minimum weighted by pa.
        let (tau, a_weight) = match minima.iter().find(|&&tau| cmnd[tau] < *threshold) {
            Some(&tau) => (tau, 1.0),
            None => (global_min_tau, cfg.pa_absolute_min),
        };
        let weight = a_weight * prior;
        if let Some(entry) = candidate_map.iter_mut().find(|(t, _)| *t == tau) {
            entry.1 += weight;
        } else {
            candidate_map.push((tau, weight));
        }
    }

    let candidates = candidate_map
        .into_iter()
        .filter(|(_, prob)| *prob > 0.0)
        .map(|(tau, probability)| {
            let refined_tau = parabolic_interpolation(&cmnd, tau).max(1.0);
            Candidate {
                frequency_hz: cfg.sample_rate_hz as f32 / refined_tau,
                probability,
            }
        })
        .collect();

    Stage1CandidateFrame { candidates }
}

/// Discrete beta prior weights over thresholds, normalised to sum to one.
fn beta_prior_distribution(thresholds: &[f32], prior: BetaPrior) -> Vec<f32> {
    let BetaPrior { alpha, beta } = prior;
    let mut weights: Vec<f32> = thresholds
        .iter()
        .map(|&s| {
            if s <= 0.0 || s >= 1.0 {
                0.0
            } else {
                s.powf(alpha - 1.0) * (1.0 - s).powf(beta - 1.0)
            }
        })
        .collect();
    let sum: f32 = weights.iter().sum();
    if sum > 0.0 {
        for w in weights.iter_mut() {
            *w /= sum;
        }
    }
    weights
}
