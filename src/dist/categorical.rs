//! Empirical categorical distribution with inverse-CDF sampling.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::Sampler;

/// Probability table over the unique observed values of a discrete variable.
///
/// Values are stored in ascending order. `cumulative` is the running sum of
/// `probabilities` with its last entry pinned to exactly 1.0, so every
/// uniform draw in `[0, 1)` maps to a bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalModel {
    values: Vec<f64>,
    probabilities: Vec<f64>,
    cumulative: Vec<f64>,
}

impl CategoricalModel {
    /// Builds the empirical PMF of `samples`.
    ///
    /// Non-finite samples are ignored. Returns `None` if no finite sample
    /// remains.
    pub fn fit(samples: &[f64]) -> Option<Self> {
        let mut sorted: Vec<f64> = samples.iter().copied().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);

        let mut values = Vec::new();
        let mut counts: Vec<usize> = Vec::new();
        for v in sorted.iter().copied() {
            if values.last() == Some(&v) {
                if let Some(c) = counts.last_mut() {
                    *c += 1;
                }
            } else {
                values.push(v);
                counts.push(1);
            }
        }

        let total = sorted.len() as f64;
        let probabilities: Vec<f64> = counts.iter().map(|&c| c as f64 / total).collect();
        Some(Self::from_table(values, probabilities))
    }

    /// Builds a model from an explicit value/probability table.
    ///
    /// Probabilities are renormalized to sum to one.
    pub fn from_table(values: Vec<f64>, probabilities: Vec<f64>) -> Self {
        let sum: f64 = probabilities.iter().sum();
        let probabilities: Vec<f64> = if sum > 0.0 {
            probabilities.iter().map(|p| p / sum).collect()
        } else {
            probabilities
        };

        let mut running = 0.0;
        let mut cumulative: Vec<f64> = probabilities
            .iter()
            .map(|p| {
                running += p;
                running
            })
            .collect();
        if let Some(last) = cumulative.last_mut() {
            *last = 1.0;
        }

        Self {
            values,
            probabilities,
            cumulative,
        }
    }

    /// A distribution that always yields `value`.
    pub fn point_mass(value: f64) -> Self {
        Self::from_table(vec![value], vec![1.0])
    }

    /// Unique observed values in ascending order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Empirical probability of each value in [`values`](Self::values).
    pub fn probabilities(&self) -> &[f64] {
        &self.probabilities
    }

    pub fn cumulative(&self) -> &[f64] {
        &self.cumulative
    }

    pub(crate) fn is_consistent(&self) -> bool {
        !self.values.is_empty()
            && self.values.len() == self.probabilities.len()
            && self.values.len() == self.cumulative.len()
            && self.probabilities.iter().all(|p| p.is_finite() && *p >= 0.0)
    }
}

impl Sampler for CategoricalModel {
    fn sample_one<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let u: f64 = rng.random();
        let idx = self
            .cumulative
            .partition_point(|&c| c <= u)
            .min(self.values.len().saturating_sub(1));
        self.values[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn probabilities_sum_to_one() {
        let model = CategoricalModel::fit(&[1.0, 2.0, 2.0, 3.0, 3.0, 3.0, 4.0]).expect("fit");
        let sum: f64 = model.probabilities().iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert_eq!(model.values(), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(model.cumulative().last().copied(), Some(1.0));
    }

    #[test]
    fn empty_sample_has_no_model() {
        assert!(CategoricalModel::fit(&[]).is_none());
        assert!(CategoricalModel::fit(&[f64::NAN]).is_none());
    }

    #[test]
    fn samples_only_observed_values() {
        let model = CategoricalModel::fit(&[2.0, 5.0, 5.0]).expect("fit");
        let mut rng = StdRng::seed_from_u64(3);
        for v in model.sample_n(&mut rng, 500) {
            assert!(v == 2.0 || v == 5.0, "unexpected value {v}");
        }
    }

    #[test]
    fn point_mass_is_constant() {
        let model = CategoricalModel::point_mass(2.0);
        let mut rng = StdRng::seed_from_u64(11);
        assert!(model.sample_n(&mut rng, 100).iter().all(|&v| v == 2.0));
    }

    #[test]
    fn sampling_matches_empirical_frequencies() {
        // chi-square goodness of fit, 3 degrees of freedom, alpha = 0.001
        let model = CategoricalModel::from_table(vec![1.0, 2.0, 3.0, 4.0], vec![0.1, 0.2, 0.3, 0.4]);
        let mut rng = StdRng::seed_from_u64(2024);
        let n = 20_000;
        let mut observed = [0usize; 4];
        for v in model.sample_n(&mut rng, n) {
            observed[v as usize - 1] += 1;
        }
        let chi2: f64 = observed
            .iter()
            .zip(model.probabilities())
            .map(|(&o, &p)| {
                let expected = p * n as f64;
                (o as f64 - expected).powi(2) / expected
            })
            .sum();
        assert!(chi2 < 16.27, "chi-square statistic too large: {chi2}");
    }
}
