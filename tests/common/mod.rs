//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use ev_demand_sim::bank::{BankFitOptions, DistributionBank};
use ev_demand_sim::charging::{ChargingParams, OccupancyProfiles};
use ev_demand_sim::dist::{
    CategoricalModel, ContinuousModel, Distribution, FamilyParams, FittedDistribution,
};
use ev_demand_sim::trips::TripDataset;

/// Path relative to the crate root.
pub fn crate_path(rel: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join(rel)
}

/// Fresh, empty directory under the system temp dir.
pub fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("ev-demand-it-{tag}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).expect("scratch dir");
    dir
}

/// The bundled sample of historical trips.
pub fn sample_dataset() -> TripDataset {
    TripDataset::from_csv_path(&crate_path("data/trips.csv")).expect("sample trips")
}

/// The bundled occupancy profiles.
pub fn sample_profiles() -> OccupancyProfiles {
    OccupancyProfiles::from_csv_path(&crate_path("data/ChargingProfiles.csv"))
        .expect("sample profiles")
}

/// Bank fitted on the bundled sample with default options.
pub fn fitted_bank() -> DistributionBank {
    DistributionBank::fit_all(&sample_dataset(), &BankFitOptions::default()).expect("fit")
}

pub fn table(name: &str, values: Vec<f64>, probs: Vec<f64>) -> Distribution {
    Distribution::from_model(
        name,
        FittedDistribution::Categorical(CategoricalModel::from_table(values, probs)),
    )
}

pub fn uniform(name: &str, low: f64, high: f64) -> Distribution {
    Distribution::from_model(
        name,
        FittedDistribution::Continuous(
            ContinuousModel::new(FamilyParams::Uniform { low, high }, 0.0).expect("params"),
        ),
    )
}

/// Hand-built bank: two cars per household, one to three trips, car types
/// 1 and 3.
pub fn fixed_bank() -> DistributionBank {
    DistributionBank::from_parts(
        table("trip_count", vec![1.0, 2.0, 3.0], vec![0.2, 0.5, 0.3]),
        table("household_cars", vec![2.0], vec![1.0]),
        uniform("start_time", 6.0, 21.0),
        table("car_type", vec![1.0, 3.0], vec![0.6, 0.4]),
        BTreeMap::from([
            (1, uniform("duration_ct_1", 0.1, 1.2)),
            (3, uniform("duration_ct_3", 0.1, 1.5)),
        ]),
        BTreeMap::from([
            (1, uniform("mileage_ct_1", 2.0, 40.0)),
            (3, uniform("mileage_ct_3", 2.0, 60.0)),
        ]),
    )
    .expect("fixed bank")
}

/// Initial SOC pinned at 0.5 and threshold pinned at 0.15.
pub fn fixed_soc_params() -> ChargingParams {
    ChargingParams {
        init_soc_min: 0.5,
        init_soc_max: 0.5,
        soc_threshold_min: 0.15,
        soc_threshold_max: 0.15,
        ..ChargingParams::default()
    }
}
