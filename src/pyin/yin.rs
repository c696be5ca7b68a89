use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// YIN difference function d(τ) with the FFT plans for one frame length.
///
/// Uses FFT autocorrelation instead of the O(N·τ) nested loop:
/// d(τ) = Σ_{j=0..N-τ-1} x_j² + Σ_{j=0..N-τ-1} x_{j+τ}² - 2·r(τ).
pub struct DifferenceKernel {
    frame_len: usize,
    fft: Arc<dyn Fft<f32>>,
    ifft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex<f32>>,
    prefix_sq: Vec<f32>,
}

impl DifferenceKernel {
    pub fn new(frame_len: usize) -> Self {
        let fft_len = (frame_len.max(1) * 2).next_power_of_two();
        let mut planner = FftPlanner::new();
        Self {
            frame_len,
            fft: planner.plan_fft_forward(fft_len),
            ifft: planner.plan_fft_inverse(fft_len),
            buffer: vec![Complex { re: 0.0, im: 0.0 }; fft_len],
            prefix_sq: vec![0.0; frame_len + 1],
        }
    }

    /// d(τ) for τ in [0, max_tau]. Frames longer than the planned length are truncated.
    pub fn compute(&mut self, frame: &[f32], max_tau: usize) -> Vec<f32> {
        let frame = &frame[..frame.len().min(self.frame_len)];
        let n = frame.len();
        let mut diff = vec![0.0; max_tau + 1];
        if n == 0 || max_tau == 0 {
            return diff;
        }

        for value in self.buffer.iter_mut() {
            *value = Complex { re: 0.0, im: 0.0 };
        }
        for (slot, &sample) in self.buffer.iter_mut().zip(frame) {
            slot.re = sample;
        }

        self.fft.process(&mut self.buffer);
        for value in self.buffer.iter_mut() {
            *value = Complex { re: value.norm_sqr(), im: 0.0 };
        }
        self.ifft.process(&mut self.buffer);

        let scale = 1.0 / self.buffer.len() as f32;
        self.prefix_sq[0] = 0.0;
        for (idx, &sample) in frame.iter().enumerate() {
            self.prefix_sq[idx + 1] = self.prefix_sq[idx] + sample * sample;
        }

        for tau in 1..=max_tau.min(n - 1) {
            let sum_head = self.prefix_sq[n - tau];
            let sum_tail = self.prefix_sq[n] - self.prefix_sq[tau];
            let autocorr = self.buffer[tau].re * scale;
            // FFT round-off can push near-silent frames slightly negative.
            diff[tau] = (sum_head + sum_tail - 2.0 * autocorr).max(0.0);
        }

        diff
    }
}

/// Cumulative mean normalized difference d'(τ) = d(τ) / ((1/τ) Σ_{j=1..τ} d(j)).
pub fn cumulative_mean_normalized_difference(diff: &[f32]) -> Vec<f32> {
    let mut cmnd = vec![1.0; diff.len()];
    let mut running_sum = 0.0;
    for tau in 1..diff.len() {
        running_sum += diff[tau];
        if running_sum > 0.0 {
            cmnd[tau] = diff[tau] * tau as f32 / running_sum;
        }
    }
    cmnd
}

pub fn local_minima(cmnd: &[f32]) -> Vec<usize> {
    if cmnd.len() < 3 {
        return Vec::new();
    }
    (1..cmnd.len() - 1)
        .filter(|&tau| cmnd[tau] < cmnd[tau - 1] && cmnd[tau] <= cmnd[tau + 1])
        .collect()
}

/// Refined τ from a parabola through the minimum and its neighbours.
pub fn parabolic_interpolation(cmnd: &[f32], tau: usize) -> f32 {
    if tau == 0 || tau + 1 >= cmnd.len() {
        return tau as f32;
    }
    let (y1, y2, y3) = (cmnd[tau - 1], cmnd[tau], cmnd[tau + 1]);
    let denom = y1 - 2.0 * y2 + y3;
    if denom.abs() < 1e-12 {
        return tau as f32;
    }
    tau as f32 + 0.5 * (y1 - y3) / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cmnd_flat_difference_is_one() {
        let diff = [0.0, 2.0, 2.0, 2.0, 2.0];
        let cmnd = cumulative_mean_normalized_difference(&diff);
        assert!(cmnd.iter().all(|v| (*v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn cmnd_of_silence_is_one() {
        let cmnd = cumulative_mean_normalized_difference(&[0.0; 8]);
        assert_eq!(cmnd, vec![1.0; 8]);
    }

    #[test]
    fn fft_difference_matches_direct_sum() {
        let frame: Vec<f32> = (0..128).map(|i| ((i * 7 % 13) as f32 - 6.0) / 6.0).collect();
        let fast = DifferenceKernel::new(frame.len()).compute(&frame, 40);
        for tau in 1..=40 {
            let direct: f32 = (0..frame.len() - tau)
                .map(|j| (frame[j] - frame[j + tau]).powi(2))
                .sum();
            assert!((fast[tau] - direct).abs() < 1e-2, "tau {}", tau);
        }
    }

    #[test]
    fn kernel_is_reusable_across_frames() {
        let mut kernel = DifferenceKernel::new(64);
        let noisy: Vec<f32> = (0..64).map(|i| (i as f32 * 0.37).sin()).collect();
        let _ = kernel.compute(&noisy, 20);
        let constant = kernel.compute(&[0.5; 64], 20);
        assert!(constant.iter().all(|v| v.abs() < 1e-3));
    }

    #[test]
    fn parabolic_interpolation_minimum() {
        // Quadratic around tau=5 with minimum at 5.2
        let cmnd: Vec<f32> = (0..10).map(|i| (i as f32 - 5.2).powi(2)).collect();
        let refined = parabolic_interpolation(&cmnd, 5);
        assert!((refined - 5.2).abs() < 0.2);
    }

    #[test]
    fn minima_skip_plateaus() {
        let cmnd = [1.0, 0.5, 0.5, 0.8, 0.2, 0.9];
        assert_eq!(local_minima(&cmnd), vec![1, 4]);
    }
}
