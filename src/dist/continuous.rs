//! Parametric continuous families, best-fit search, and forward sampling.
//!
//! Each candidate family is fitted by maximum likelihood (closed form where
//! one exists, a one-dimensional root search otherwise) and scored by the
//! residual sum of squares between the normalized sample histogram and the
//! family density evaluated at bin centres. The lowest score wins.

use std::fmt;

use rand::Rng;
use rand_distr::Distribution as _;
use serde::{Deserialize, Serialize};
use statrs::distribution::Continuous;
use statrs::function::gamma::digamma;

use super::Sampler;
use crate::error::{Error, Result};

/// Parametric families available to the best-fit search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    Normal,
    LogNormal,
    Exponential,
    Gamma,
    Weibull,
    Uniform,
}

impl Family {
    pub const ALL: [Family; 6] = [
        Family::Normal,
        Family::LogNormal,
        Family::Exponential,
        Family::Gamma,
        Family::Weibull,
        Family::Uniform,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Family::Normal => "normal",
            Family::LogNormal => "lognormal",
            Family::Exponential => "exponential",
            Family::Gamma => "gamma",
            Family::Weibull => "weibull",
            Family::Uniform => "uniform",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Estimated parameters of one family.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "lowercase")]
pub enum FamilyParams {
    Normal { mean: f64, std_dev: f64 },
    LogNormal { mu: f64, sigma: f64 },
    Exponential { rate: f64 },
    Gamma { shape: f64, scale: f64 },
    Weibull { shape: f64, scale: f64 },
    Uniform { low: f64, high: f64 },
}

impl FamilyParams {
    pub fn family(&self) -> Family {
        match self {
            FamilyParams::Normal { .. } => Family::Normal,
            FamilyParams::LogNormal { .. } => Family::LogNormal,
            FamilyParams::Exponential { .. } => Family::Exponential,
            FamilyParams::Gamma { .. } => Family::Gamma,
            FamilyParams::Weibull { .. } => Family::Weibull,
            FamilyParams::Uniform { .. } => Family::Uniform,
        }
    }

    /// Density function of the family, or a description of why the
    /// parameters are invalid.
    fn density(&self) -> std::result::Result<Box<dyn Continuous<f64, f64>>, String> {
        use statrs::distribution as sd;

        let boxed: Box<dyn Continuous<f64, f64>> = match *self {
            FamilyParams::Normal { mean, std_dev } => {
                Box::new(sd::Normal::new(mean, std_dev).map_err(|e| e.to_string())?)
            }
            FamilyParams::LogNormal { mu, sigma } => {
                Box::new(sd::LogNormal::new(mu, sigma).map_err(|e| e.to_string())?)
            }
            FamilyParams::Exponential { rate } => {
                Box::new(sd::Exp::new(rate).map_err(|e| e.to_string())?)
            }
            FamilyParams::Gamma { shape, scale } => {
                Box::new(sd::Gamma::new(shape, 1.0 / scale).map_err(|e| e.to_string())?)
            }
            FamilyParams::Weibull { shape, scale } => {
                Box::new(sd::Weibull::new(shape, scale).map_err(|e| e.to_string())?)
            }
            FamilyParams::Uniform { low, high } => {
                Box::new(sd::Uniform::new(low, high).map_err(|e| e.to_string())?)
            }
        };
        Ok(boxed)
    }

    fn sampler(&self) -> std::result::Result<FamilySampler, String> {
        let sampler = match *self {
            FamilyParams::Normal { mean, std_dev } => FamilySampler::Normal(
                rand_distr::Normal::new(mean, std_dev).map_err(|e| e.to_string())?,
            ),
            FamilyParams::LogNormal { mu, sigma } => FamilySampler::LogNormal(
                rand_distr::LogNormal::new(mu, sigma).map_err(|e| e.to_string())?,
            ),
            FamilyParams::Exponential { rate } => {
                FamilySampler::Exponential(rand_distr::Exp::new(rate).map_err(|e| e.to_string())?)
            }
            FamilyParams::Gamma { shape, scale } => FamilySampler::Gamma(
                rand_distr::Gamma::new(shape, scale).map_err(|e| e.to_string())?,
            ),
            FamilyParams::Weibull { shape, scale } => FamilySampler::Weibull(
                rand_distr::Weibull::new(scale, shape).map_err(|e| e.to_string())?,
            ),
            FamilyParams::Uniform { low, high } => FamilySampler::Uniform(
                rand::distr::Uniform::new(low, high).map_err(|e| e.to_string())?,
            ),
        };
        Ok(sampler)
    }
}

#[derive(Debug, Clone)]
enum FamilySampler {
    Normal(rand_distr::Normal<f64>),
    LogNormal(rand_distr::LogNormal<f64>),
    Exponential(rand_distr::Exp<f64>),
    Gamma(rand_distr::Gamma<f64>),
    Weibull(rand_distr::Weibull<f64>),
    Uniform(rand::distr::Uniform<f64>),
}

/// Options controlling the continuous best-fit search.
#[derive(Debug, Clone)]
pub struct FitOptions {
    /// Families tried when no hint is given.
    pub candidates: Vec<Family>,
    /// Histogram bin count used for scoring; `None` picks `ceil(sqrt(n))`
    /// clamped to `[5, 100]`.
    pub histogram_bins: Option<usize>,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            candidates: Family::ALL.to_vec(),
            histogram_bins: None,
        }
    }
}

/// A fitted continuous family together with its goodness-of-fit score.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "ContinuousRecord", into = "ContinuousRecord")]
pub struct ContinuousModel {
    params: FamilyParams,
    score: f64,
    sampler: FamilySampler,
}

#[derive(Serialize, Deserialize)]
struct ContinuousRecord {
    params: FamilyParams,
    score: f64,
}

impl TryFrom<ContinuousRecord> for ContinuousModel {
    type Error = Error;

    fn try_from(record: ContinuousRecord) -> Result<Self> {
        ContinuousModel::new(record.params, record.score)
    }
}

impl From<ContinuousModel> for ContinuousRecord {
    fn from(model: ContinuousModel) -> Self {
        Self {
            params: model.params,
            score: model.score,
        }
    }
}

impl PartialEq for ContinuousModel {
    fn eq(&self, other: &Self) -> bool {
        self.params == other.params && self.score.to_bits() == other.score.to_bits()
    }
}

impl ContinuousModel {
    /// Wraps already-estimated parameters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidModel`] if the parameters are outside the
    /// family's domain.
    pub fn new(params: FamilyParams, score: f64) -> Result<Self> {
        let sampler = params
            .sampler()
            .map_err(|e| Error::InvalidModel(format!("{}: {e}", params.family())))?;
        Ok(Self {
            params,
            score,
            sampler,
        })
    }

    pub fn params(&self) -> &FamilyParams {
        &self.params
    }

    pub fn family(&self) -> Family {
        self.params.family()
    }

    /// Histogram residual sum of squares; lower is better.
    pub fn score(&self) -> f64 {
        self.score
    }

    /// Fits `samples` against `candidates` and returns the best-scoring
    /// family.
    ///
    /// # Errors
    ///
    /// [`Error::EmptySample`] for an empty input, [`Error::NoCandidateFit`]
    /// if every candidate family fails to fit.
    pub fn fit_best(
        name: &str,
        samples: &[f64],
        candidates: &[Family],
        histogram_bins: Option<usize>,
    ) -> Result<Self> {
        let data: Vec<f64> = samples.iter().copied().filter(|v| v.is_finite()).collect();
        if data.is_empty() {
            return Err(Error::EmptySample(name.to_string()));
        }
        let Some(histogram) = Histogram::new(&data, histogram_bins) else {
            tracing::warn!(distribution = name, "degenerate sample, all values equal");
            return Err(Error::NoCandidateFit(name.to_string()));
        };

        let mut best: Option<ContinuousModel> = None;
        for &family in candidates {
            let params = match estimate(family, &data) {
                Ok(p) => p,
                Err(reason) => {
                    tracing::debug!(distribution = name, %family, %reason, "family skipped");
                    continue;
                }
            };
            let score = match params.density() {
                Ok(pdf) => histogram.rss(pdf.as_ref()),
                Err(reason) => {
                    tracing::debug!(distribution = name, %family, %reason, "family skipped");
                    continue;
                }
            };
            if !score.is_finite() {
                continue;
            }
            let Ok(model) = ContinuousModel::new(params, score) else {
                continue;
            };
            tracing::trace!(distribution = name, %family, score, "candidate scored");
            if best.as_ref().is_none_or(|b| score < b.score) {
                best = Some(model);
            }
        }

        let best = best.ok_or_else(|| Error::NoCandidateFit(name.to_string()))?;
        tracing::info!(
            distribution = name,
            family = %best.family(),
            score = best.score,
            n = data.len(),
            "best fit selected"
        );
        Ok(best)
    }
}

impl Sampler for ContinuousModel {
    fn sample_one<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match &self.sampler {
            FamilySampler::Normal(d) => d.sample(rng),
            FamilySampler::LogNormal(d) => d.sample(rng),
            FamilySampler::Exponential(d) => d.sample(rng),
            FamilySampler::Gamma(d) => d.sample(rng),
            FamilySampler::Weibull(d) => d.sample(rng),
            FamilySampler::Uniform(d) => d.sample(rng),
        }
    }
}

/// Normalized histogram of a sample, used as the empirical density.
struct Histogram {
    min: f64,
    width: f64,
    density: Vec<f64>,
}

impl Histogram {
    fn new(data: &[f64], bins: Option<usize>) -> Option<Self> {
        let min = data.iter().copied().fold(f64::INFINITY, f64::min);
        let max = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if max <= min {
            return None;
        }
        let n = data.len();
        let bins = bins
            .unwrap_or_else(|| ((n as f64).sqrt().ceil() as usize).clamp(5, 100))
            .max(1);
        let width = (max - min) / bins as f64;

        let mut counts = vec![0usize; bins];
        for &x in data {
            let idx = (((x - min) / width) as usize).min(bins - 1);
            counts[idx] += 1;
        }
        let norm = n as f64 * width;
        let density = counts.iter().map(|&c| c as f64 / norm).collect();
        Some(Self {
            min,
            width,
            density,
        })
    }

    fn rss(&self, pdf: &dyn Continuous<f64, f64>) -> f64 {
        self.density
            .iter()
            .enumerate()
            .map(|(i, &h)| {
                let centre = self.min + (i as f64 + 0.5) * self.width;
                (h - pdf.pdf(centre)).powi(2)
            })
            .sum()
    }
}

fn estimate(family: Family, data: &[f64]) -> std::result::Result<FamilyParams, String> {
    let n = data.len() as f64;
    let mean = data.iter().sum::<f64>() / n;
    let all_positive = data.iter().all(|&x| x > 0.0);

    match family {
        Family::Normal => {
            let var = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
            let std_dev = var.sqrt();
            if std_dev <= 0.0 {
                return Err("zero variance".into());
            }
            Ok(FamilyParams::Normal { mean, std_dev })
        }
        Family::LogNormal => {
            if !all_positive {
                return Err("requires strictly positive samples".into());
            }
            let logs: Vec<f64> = data.iter().map(|x| x.ln()).collect();
            let mu = logs.iter().sum::<f64>() / n;
            let sigma = (logs.iter().map(|l| (l - mu).powi(2)).sum::<f64>() / n).sqrt();
            if sigma <= 0.0 {
                return Err("zero log-variance".into());
            }
            Ok(FamilyParams::LogNormal { mu, sigma })
        }
        Family::Exponential => {
            if data.iter().any(|&x| x < 0.0) || mean <= 0.0 {
                return Err("requires non-negative samples with positive mean".into());
            }
            Ok(FamilyParams::Exponential { rate: 1.0 / mean })
        }
        Family::Gamma => {
            if !all_positive {
                return Err("requires strictly positive samples".into());
            }
            let mean_log = data.iter().map(|x| x.ln()).sum::<f64>() / n;
            let shape = gamma_shape(mean.ln() - mean_log)?;
            Ok(FamilyParams::Gamma {
                shape,
                scale: mean / shape,
            })
        }
        Family::Weibull => {
            if !all_positive {
                return Err("requires strictly positive samples".into());
            }
            let (shape, scale) = weibull_mle(data)?;
            Ok(FamilyParams::Weibull { shape, scale })
        }
        Family::Uniform => {
            let low = data.iter().copied().fold(f64::INFINITY, f64::min);
            let high = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            if high <= low {
                return Err("zero range".into());
            }
            Ok(FamilyParams::Uniform { low, high })
        }
    }
}

const MAX_NEWTON_ITERS: usize = 100;
const MAX_BISECTION_ITERS: usize = 200;

/// Solves `ln k - digamma(k) = s` for the gamma shape `k`.
fn gamma_shape(s: f64) -> std::result::Result<f64, String> {
    if !(s.is_finite() && s > 0.0) {
        return Err("log-mean statistic must be positive".into());
    }
    let mut k = (3.0 - s + ((s - 3.0).powi(2) + 24.0 * s).sqrt()) / (12.0 * s);
    for _ in 0..MAX_NEWTON_ITERS {
        let f = k.ln() - digamma(k) - s;
        let h = 1e-5 * k;
        let trigamma = (digamma(k + h) - digamma(k - h)) / (2.0 * h);
        let slope = 1.0 / k - trigamma;
        if slope == 0.0 || !slope.is_finite() {
            break;
        }
        let mut next = k - f / slope;
        if next <= 0.0 {
            next = k / 2.0;
        }
        if (next - k).abs() <= 1e-10 * k {
            return Ok(next);
        }
        k = next;
    }
    Err("shape iteration did not converge".into())
}

/// Maximum-likelihood Weibull `(shape, scale)` by bisection on the shape
/// score equation. Samples are rescaled by their maximum to keep `x^k`
/// finite.
fn weibull_mle(data: &[f64]) -> std::result::Result<(f64, f64), String> {
    let n = data.len() as f64;
    let max = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let ys: Vec<f64> = data.iter().map(|x| x / max).collect();
    let mean_log = ys.iter().map(|y| y.ln()).sum::<f64>() / n;

    let score = |k: f64| {
        let mut sum_pow = 0.0;
        let mut sum_pow_log = 0.0;
        for &y in &ys {
            let p = y.powf(k);
            sum_pow += p;
            sum_pow_log += p * y.ln();
        }
        sum_pow_log / sum_pow - 1.0 / k - mean_log
    };

    let (mut lo, mut hi) = (1e-2, 200.0);
    if score(lo) > 0.0 || score(hi) < 0.0 {
        return Err("shape not bracketed".into());
    }
    for _ in 0..MAX_BISECTION_ITERS {
        let mid = 0.5 * (lo + hi);
        if score(mid) < 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo <= 1e-10 * mid {
            break;
        }
    }
    let shape = 0.5 * (lo + hi);
    let mean_pow = ys.iter().map(|y| y.powf(shape)).sum::<f64>() / n;
    let scale = max * mean_pow.powf(1.0 / shape);
    if !(shape.is_finite() && scale.is_finite() && scale > 0.0) {
        return Err("non-finite estimate".into());
    }
    Ok((shape, scale))
}
