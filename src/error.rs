//! Error taxonomy shared by fitting, synthesis, and scheduling.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Which sampled quantity ran out of rejection attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampledField {
    StartTimes,
    Duration,
    Mileage,
}

impl std::fmt::Display for SampledField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::StartTimes => "start times",
            Self::Duration => "duration",
            Self::Mileage => "mileage",
        };
        f.write_str(name)
    }
}

/// Errors returned by the library.
#[derive(Debug, Error)]
pub enum Error {
    #[error("distribution `{0}` sampled before fit or restore")]
    UnfittedDistribution(String),

    #[error("no candidate family converged for `{0}`")]
    NoCandidateFit(String),

    #[error("cannot fit `{0}` on an empty sample")]
    EmptySample(String),

    #[error("model file not found: {}", .0.display())]
    MissingModelFile(PathBuf),

    #[error("{field} for car {car_id} infeasible after {attempts} attempts")]
    RejectionSamplingExhausted {
        field: SampledField,
        car_id: u32,
        attempts: usize,
    },

    #[error("invalid model parameters: {0}")]
    InvalidModel(String),

    #[error("no model or parameters for car type {0}")]
    UnknownCarType(u32),

    #[error("invalid charging profile: {0}")]
    InvalidProfile(String),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("model serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
