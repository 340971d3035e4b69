//! Brownian-bridge reordering of Gaussian draws.
//!
//! The first draw fixes the terminal value of the Brownian motion, the
//! following ones fill the midpoints of the widest unfilled gaps.  The
//! output is again a vector of independent standard normal increments
//! (one per step), so path generators can use it in place of the raw
//! draws without changing the marginal law.

use ql_core::{ensure, Real, Result};

/// Bridge construction over a fixed time grid.
#[derive(Debug, Clone)]
pub struct BrownianBridge {
    size: usize,
    t: Vec<Real>,
    sqrt_dt: Vec<Real>,
    bridge_index: Vec<usize>,
    left_index: Vec<usize>,
    right_index: Vec<usize>,
    left_weight: Vec<Real>,
    right_weight: Vec<Real>,
    std_dev: Vec<Real>,
}

impl BrownianBridge {
    /// Bridge over `steps` unit-length steps.
    pub fn new(steps: usize) -> Result<Self> {
        let times: Vec<Real> = (1..=steps).map(|i| i as Real).collect();
        Self::with_times(&times)
    }

    /// Bridge over the strictly increasing positive `times` (the origin is
    /// implicit).
    pub fn with_times(times: &[Real]) -> Result<Self> {
        let size = times.len();
        ensure!(size > 0, "Brownian bridge needs at least one step");
        ensure!(times[0] > 0.0, "first bridge time must be positive");
        ensure!(
            times.windows(2).all(|w| w[1] > w[0]),
            "bridge times must be strictly increasing"
        );

        let t = times.to_vec();
        let mut sqrt_dt = Vec::with_capacity(size);
        sqrt_dt.push(t[0].sqrt());
        sqrt_dt.extend(t.windows(2).map(|w| (w[1] - w[0]).sqrt()));

        let mut map = vec![0usize; size];
        let mut bridge_index = vec![0; size];
        let mut left_index = vec![0; size];
        let mut right_index = vec![0; size];
        let mut left_weight = vec![0.0; size];
        let mut right_weight = vec![0.0; size];
        let mut std_dev = vec![0.0; size];

        map[size - 1] = 1;
        bridge_index[0] = size - 1;
        std_dev[0] = t[size - 1].sqrt();

        let mut j = 0;
        for i in 1..size {
            while map[j] != 0 {
                j += 1;
            }
            let mut k = j;
            while map[k] == 0 {
                k += 1;
            }
            // unfilled run is j..k-1, k is filled, j-1 is filled (or origin)
            let l = j + ((k - 1 - j) >> 1);
            map[l] = i;
            bridge_index[i] = l;
            left_index[i] = j;
            right_index[i] = k;
            let t_left = if j == 0 { 0.0 } else { t[j - 1] };
            let span = t[k] - t_left;
            left_weight[i] = (t[k] - t[l]) / span;
            right_weight[i] = (t[l] - t_left) / span;
            std_dev[i] = ((t[l] - t_left) * (t[k] - t[l]) / span).sqrt();
            j = k + 1;
            if j >= size {
                j = 0;
            }
        }

        Ok(Self {
            size,
            t,
            sqrt_dt,
            bridge_index,
            left_index,
            right_index,
            left_weight,
            right_weight,
            std_dev,
        })
    }

    /// Number of steps.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Step end times.
    pub fn times(&self) -> &[Real] {
        &self.t
    }

    /// Map `input` draws to standard normal increments in `output`.
    pub fn transform(&self, input: &[Real], output: &mut [Real]) -> Result<()> {
        ensure!(
            input.len() == self.size && output.len() == self.size,
            "bridge expects {} draws, got {} in / {} out",
            self.size,
            input.len(),
            output.len()
        );
        let n = self.size;
        output[n - 1] = self.std_dev[0] * input[0];
        for i in 1..n {
            let j = self.left_index[i];
            let k = self.right_index[i];
            let l = self.bridge_index[i];
            let left = if j == 0 { 0.0 } else { self.left_weight[i] * output[j - 1] };
            output[l] = left + self.right_weight[i] * output[k] + self.std_dev[i] * input[i];
        }
        for i in (1..n).rev() {
            output[i] = (output[i] - output[i - 1]) / self.sqrt_dt[i];
        }
        output[0] /= self.sqrt_dt[0];
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random_numbers::InverseCumulativeNormalRng;
    use approx::assert_abs_diff_eq;

    #[test]
    fn every_index_is_filled_once() {
        let bb = BrownianBridge::new(13).unwrap();
        let mut seen = bb.bridge_index.clone();
        seen.sort_unstable();
        assert_eq!(seen, (0..13).collect::<Vec<_>>());
    }

    #[test]
    fn single_step_is_identity() {
        let bb = BrownianBridge::with_times(&[0.25]).unwrap();
        let mut out = [0.0];
        bb.transform(&[1.3], &mut out).unwrap();
        assert_abs_diff_eq!(out[0], 1.3, epsilon = 1e-14);
    }

    #[test]
    fn increments_keep_unit_variance() {
        let times = [0.1, 0.3, 0.35, 0.8, 1.0];
        let bb = BrownianBridge::with_times(&times).unwrap();
        let mut rng = InverseCumulativeNormalRng::new(7);
        let n = 50_000;
        let mut sum_sq = [0.0; 5];
        let mut input = [0.0; 5];
        let mut out = [0.0; 5];
        for _ in 0..n {
            for x in input.iter_mut() {
                *x = rng.next_real();
            }
            bb.transform(&input, &mut out).unwrap();
            for (s, o) in sum_sq.iter_mut().zip(out.iter()) {
                *s += o * o;
            }
        }
        for s in sum_sq {
            assert_abs_diff_eq!(s / n as Real, 1.0, epsilon = 0.03);
        }
    }

    #[test]
    fn rejects_bad_grids() {
        assert!(BrownianBridge::with_times(&[]).is_err());
        assert!(BrownianBridge::with_times(&[0.0, 1.0]).is_err());
        assert!(BrownianBridge::with_times(&[0.5, 0.5]).is_err());
    }
}
