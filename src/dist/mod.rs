//! Single-variable distributions: fitting, sampling, and persistence.

/// Empirical probability tables for discrete variables.
pub mod categorical;
/// Parametric continuous families and best-fit search.
pub mod continuous;

use std::fs;
use std::io::Write;
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use categorical::CategoricalModel;
pub use continuous::{ContinuousModel, Family, FamilyParams, FitOptions};

/// Anything that can draw values from a fitted model.
pub trait Sampler {
    /// Draws a single value.
    fn sample_one<R: Rng + ?Sized>(&self, rng: &mut R) -> f64;

    /// Draws `n` independent values.
    fn sample_n<R: Rng + ?Sized>(&self, rng: &mut R, n: usize) -> Vec<f64> {
        (0..n).map(|_| self.sample_one(rng)).collect()
    }
}

/// Whether a variable is modelled by a probability table or a parametric
/// family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Categorical,
    Continuous,
}

/// A fitted model of either kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FittedDistribution {
    Categorical(CategoricalModel),
    Continuous(ContinuousModel),
}

impl FittedDistribution {
    pub fn kind(&self) -> VariableKind {
        match self {
            FittedDistribution::Categorical(_) => VariableKind::Categorical,
            FittedDistribution::Continuous(_) => VariableKind::Continuous,
        }
    }
}

impl Sampler for FittedDistribution {
    fn sample_one<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            FittedDistribution::Categorical(m) => m.sample_one(rng),
            FittedDistribution::Continuous(m) => m.sample_one(rng),
        }
    }
}

/// Lifecycle of a [`Distribution`].
#[derive(Debug, Clone, PartialEq)]
pub enum DistributionState {
    Unfit,
    Fit(FittedDistribution),
    Loaded(FittedDistribution),
}

/// On-disk form of a distribution.
#[derive(Serialize, Deserialize)]
struct PersistedDistribution {
    name: String,
    model: FittedDistribution,
}

/// A named random variable that moves from unfit to fit (or loaded) and can
/// then be sampled.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    name: String,
    kind: VariableKind,
    state: DistributionState,
}

impl Distribution {
    pub fn new(name: impl Into<String>, kind: VariableKind) -> Self {
        Self {
            name: name.into(),
            kind,
            state: DistributionState::Unfit,
        }
    }

    pub fn categorical(name: impl Into<String>) -> Self {
        Self::new(name, VariableKind::Categorical)
    }

    pub fn continuous(name: impl Into<String>) -> Self {
        Self::new(name, VariableKind::Continuous)
    }

    /// Wraps an existing model, e.g. a hand-built table in tests.
    pub fn from_model(name: impl Into<String>, model: FittedDistribution) -> Self {
        Self {
            name: name.into(),
            kind: model.kind(),
            state: DistributionState::Fit(model),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> VariableKind {
        self.kind
    }

    pub fn state(&self) -> &DistributionState {
        &self.state
    }

    /// The fitted model, if the distribution has been fit or restored.
    pub fn model(&self) -> Option<&FittedDistribution> {
        match &self.state {
            DistributionState::Unfit => None,
            DistributionState::Fit(m) | DistributionState::Loaded(m) => Some(m),
        }
    }

    /// Fits the distribution to `samples`, replacing any previous model.
    ///
    /// For continuous variables `family_hint` restricts the search to one
    /// family; otherwise `options.candidates` are searched. Categorical
    /// variables ignore both.
    ///
    /// # Errors
    ///
    /// [`Error::EmptySample`] if there is nothing to fit,
    /// [`Error::NoCandidateFit`] if no continuous family converges.
    pub fn fit(
        &mut self,
        samples: &[f64],
        family_hint: Option<Family>,
        options: &FitOptions,
    ) -> Result<&FittedDistribution> {
        let model = match self.kind {
            VariableKind::Categorical => FittedDistribution::Categorical(
                CategoricalModel::fit(samples).ok_or_else(|| Error::EmptySample(self.name.clone()))?,
            ),
            VariableKind::Continuous => {
                let hinted;
                let candidates: &[Family] = match family_hint {
                    Some(family) => {
                        hinted = [family];
                        &hinted
                    }
                    None => &options.candidates,
                };
                FittedDistribution::Continuous(ContinuousModel::fit_best(
                    &self.name,
                    samples,
                    candidates,
                    options.histogram_bins,
                )?)
            }
        };
        self.state = DistributionState::Fit(model);
        self.model()
            .ok_or_else(|| Error::UnfittedDistribution(self.name.clone()))
    }

    /// Draws `n` values.
    ///
    /// # Errors
    ///
    /// [`Error::UnfittedDistribution`] if called before fit or restore.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, n: usize) -> Result<Vec<f64>> {
        let model = self
            .model()
            .ok_or_else(|| Error::UnfittedDistribution(self.name.clone()))?;
        Ok(model.sample_n(rng, n))
    }

    /// Draws a single value.
    ///
    /// # Errors
    ///
    /// [`Error::UnfittedDistribution`] if called before fit or restore.
    pub fn sample_one<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<f64> {
        let model = self
            .model()
            .ok_or_else(|| Error::UnfittedDistribution(self.name.clone()))?;
        Ok(model.sample_one(rng))
    }

    /// Writes the fitted model as JSON to `path`.
    ///
    /// The file is written next to its destination and renamed into place
    /// so readers never observe a partial model.
    ///
    /// # Errors
    ///
    /// [`Error::UnfittedDistribution`] if there is nothing to persist, or
    /// an I/O / serialization error.
    pub fn persist(&self, path: &Path) -> Result<()> {
        let model = self
            .model()
            .ok_or_else(|| Error::UnfittedDistribution(self.name.clone()))?;
        let record = PersistedDistribution {
            name: self.name.clone(),
            model: model.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&record)?;

        let tmp = path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp).map_err(|e| Error::io(&tmp, e))?;
        file.write_all(&bytes).map_err(|e| Error::io(&tmp, e))?;
        file.sync_all().map_err(|e| Error::io(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| Error::io(path, e))?;
        tracing::debug!(distribution = %self.name, path = %path.display(), "model persisted");
        Ok(())
    }

    /// Restores a distribution previously written by [`persist`](Self::persist).
    ///
    /// # Errors
    ///
    /// [`Error::MissingModelFile`] if `path` does not exist; there is no
    /// fallback to refitting.
    pub fn restore(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::MissingModelFile(path.to_path_buf()));
        }
        let raw = fs::read(path).map_err(|e| Error::io(path, e))?;
        let record: PersistedDistribution = serde_json::from_slice(&raw)?;
        if let FittedDistribution::Categorical(table) = &record.model {
            if !table.is_consistent() {
                return Err(Error::InvalidModel(format!(
                    "inconsistent probability table in {}",
                    path.display()
                )));
            }
        }
        Ok(Self {
            name: record.name,
            kind: record.model.kind(),
            state: DistributionState::Loaded(record.model),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};
    use std::path::PathBuf;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ev-demand-dist-{tag}-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("scratch dir");
        dir
    }

    #[test]
    fn sampling_unfit_distribution_fails() {
        let dist = Distribution::categorical("trip_count");
        let mut rng = StdRng::seed_from_u64(0);
        let err = dist.sample(&mut rng, 3).expect_err("unfit");
        assert!(matches!(err, Error::UnfittedDistribution(ref n) if n == "trip_count"));
        assert_eq!(dist.state(), &DistributionState::Unfit);
    }

    #[test]
    fn persisting_unfit_distribution_fails() {
        let dir = scratch_dir("unfit");
        let dist = Distribution::continuous("start_time");
        let err = dist.persist(&dir.join("start_time.json")).expect_err("unfit");
        assert!(matches!(err, Error::UnfittedDistribution(_)));
    }

    #[test]
    fn fit_moves_state_to_fit() {
        let mut dist = Distribution::categorical("car_type");
        dist.fit(&[1.0, 2.0, 2.0], None, &FitOptions::default())
            .expect("fit");
        assert!(matches!(dist.state(), DistributionState::Fit(_)));
    }

    #[test]
    fn restore_missing_file_is_an_error() {
        let dir = scratch_dir("missing");
        let err = Distribution::restore(&dir.join("nope.json")).expect_err("missing");
        assert!(matches!(err, Error::MissingModelFile(_)));
    }

    #[test]
    fn persist_restore_reproduces_samples() {
        let dir = scratch_dir("roundtrip");
        let mut rng = StdRng::seed_from_u64(5);
        let data: Vec<f64> = (0..400).map(|_| 1.0 + rng.random::<f64>() * 3.0).collect();

        let mut fitted = Distribution::continuous("duration");
        fitted
            .fit(&data, None, &FitOptions::default())
            .expect("fit");
        let path = dir.join("duration.json");
        fitted.persist(&path).expect("persist");

        let restored = Distribution::restore(&path).expect("restore");
        assert!(matches!(restored.state(), DistributionState::Loaded(_)));
        assert_eq!(restored.model(), fitted.model());

        let mut a = StdRng::seed_from_u64(9);
        let mut b = StdRng::seed_from_u64(9);
        assert_eq!(
            fitted.sample(&mut a, 50).expect("fit sample"),
            restored.sample(&mut b, 50).expect("restored sample")
        );
    }

    #[test]
    fn categorical_round_trip_keeps_table() {
        let dir = scratch_dir("categorical");
        let mut fitted = Distribution::categorical("household_cars");
        fitted
            .fit(&[1.0, 1.0, 2.0, 3.0], None, &FitOptions::default())
            .expect("fit");
        let path = dir.join("household_cars.json");
        fitted.persist(&path).expect("persist");
        let restored = Distribution::restore(&path).expect("restore");
        assert_eq!(restored.model(), fitted.model());
        assert_eq!(restored.kind(), VariableKind::Categorical);
    }
}
