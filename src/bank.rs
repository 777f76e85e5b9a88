//! The full set of fitted distributions needed to synthesize trips.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::dist::{Distribution, Family, FitOptions, FittedDistribution};
use crate::error::{Error, Result};
use crate::trips::TripDataset;

const TRIP_COUNT_FILE: &str = "trip_count.json";
const HOUSEHOLD_CARS_FILE: &str = "household_cars.json";
const START_TIME_FILE: &str = "start_time.json";
const CAR_TYPE_FILE: &str = "car_type.json";

fn duration_file(car_type: u32) -> String {
    format!("duration_ct_{car_type}.json")
}

fn mileage_file(car_type: u32) -> String {
    format!("mileage_ct_{car_type}.json")
}

/// Options for [`DistributionBank::fit_all`].
#[derive(Debug, Clone)]
pub struct BankFitOptions {
    /// Family the start-time distribution is forced to.
    pub start_time_family: Family,
    /// Candidate search for duration and mileage.
    pub fit: FitOptions,
}

impl Default for BankFitOptions {
    fn default() -> Self {
        Self {
            start_time_family: Family::LogNormal,
            fit: FitOptions::default(),
        }
    }
}

/// Every distribution the synthesizer draws from.
///
/// Built once by [`fit_all`](Self::fit_all) or
/// [`restore_all`](Self::restore_all) and never mutated afterwards. Both
/// constructors yield the same sampling behaviour.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionBank {
    trip_count: Distribution,
    household_cars: Distribution,
    start_time: Distribution,
    car_type: Distribution,
    duration: BTreeMap<u32, Distribution>,
    mileage: BTreeMap<u32, Distribution>,
}

impl DistributionBank {
    /// Fits every distribution on `dataset`.
    ///
    /// Duration and mileage are fitted separately for each car type, using
    /// only that car type's trips.
    ///
    /// # Errors
    ///
    /// Propagates [`Error::EmptySample`] and [`Error::NoCandidateFit`] from
    /// the individual fits.
    pub fn fit_all(dataset: &TripDataset, options: &BankFitOptions) -> Result<Self> {
        let mut trip_count = Distribution::categorical("trip_count");
        trip_count.fit(&dataset.trips_per_car(), None, &options.fit)?;

        let mut household_cars = Distribution::categorical("household_cars");
        household_cars.fit(&dataset.cars_per_house(), None, &options.fit)?;

        let mut start_time = Distribution::continuous("start_time");
        start_time.fit(
            &dataset.start_times(),
            Some(options.start_time_family),
            &options.fit,
        )?;

        let mut car_type = Distribution::categorical("car_type");
        car_type.fit(&dataset.car_types_per_trip(), None, &options.fit)?;

        let mut duration = BTreeMap::new();
        let mut mileage = BTreeMap::new();
        for ct in dataset.car_types() {
            let mut d = Distribution::continuous(format!("duration_ct_{ct}"));
            d.fit(&dataset.durations_for(ct), None, &options.fit)?;
            duration.insert(ct, d);

            let mut m = Distribution::continuous(format!("mileage_ct_{ct}"));
            m.fit(&dataset.mileages_for(ct), None, &options.fit)?;
            mileage.insert(ct, m);
        }

        tracing::info!(car_types = duration.len(), "distribution bank fitted");
        Ok(Self {
            trip_count,
            household_cars,
            start_time,
            car_type,
            duration,
            mileage,
        })
    }

    /// Assembles a bank from already-fitted distributions.
    ///
    /// # Errors
    ///
    /// [`Error::UnfittedDistribution`] if any component has no model, and
    /// [`Error::UnknownCarType`] if a car type lacks either its duration or
    /// mileage distribution.
    pub fn from_parts(
        trip_count: Distribution,
        household_cars: Distribution,
        start_time: Distribution,
        car_type: Distribution,
        duration: BTreeMap<u32, Distribution>,
        mileage: BTreeMap<u32, Distribution>,
    ) -> Result<Self> {
        let bank = Self {
            trip_count,
            household_cars,
            start_time,
            car_type,
            duration,
            mileage,
        };
        for dist in bank.all() {
            if dist.model().is_none() {
                return Err(Error::UnfittedDistribution(dist.name().to_string()));
            }
        }
        for ct in bank.duration.keys().chain(bank.mileage.keys()) {
            if !bank.duration.contains_key(ct) || !bank.mileage.contains_key(ct) {
                return Err(Error::UnknownCarType(*ct));
            }
        }
        Ok(bank)
    }

    /// Writes one JSON file per distribution into `model_dir`, creating it
    /// if needed.
    ///
    /// Concurrent writers against the same directory must be serialized by
    /// the caller.
    ///
    /// # Errors
    ///
    /// Returns an I/O or serialization error.
    pub fn persist_all(&self, model_dir: &Path) -> Result<()> {
        fs::create_dir_all(model_dir).map_err(|e| Error::io(model_dir, e))?;
        self.trip_count.persist(&model_dir.join(TRIP_COUNT_FILE))?;
        self.household_cars
            .persist(&model_dir.join(HOUSEHOLD_CARS_FILE))?;
        self.start_time.persist(&model_dir.join(START_TIME_FILE))?;
        self.car_type.persist(&model_dir.join(CAR_TYPE_FILE))?;
        for (ct, d) in &self.duration {
            d.persist(&model_dir.join(duration_file(*ct)))?;
        }
        for (ct, m) in &self.mileage {
            m.persist(&model_dir.join(mileage_file(*ct)))?;
        }
        tracing::info!(dir = %model_dir.display(), "distribution bank persisted");
        Ok(())
    }

    /// Restores every distribution from `model_dir`.
    ///
    /// The set of car types is read from the persisted car-type table; each
    /// must have both a duration and a mileage file.
    ///
    /// # Errors
    ///
    /// [`Error::MissingModelFile`] for the first expected file that does not
    /// exist. Nothing is refitted.
    pub fn restore_all(model_dir: &Path) -> Result<Self> {
        let path = |name: &str| -> PathBuf { model_dir.join(name) };

        let trip_count = Distribution::restore(&path(TRIP_COUNT_FILE))?;
        let household_cars = Distribution::restore(&path(HOUSEHOLD_CARS_FILE))?;
        let start_time = Distribution::restore(&path(START_TIME_FILE))?;
        let car_type = Distribution::restore(&path(CAR_TYPE_FILE))?;

        let car_types: Vec<u32> = match car_type.model() {
            Some(FittedDistribution::Categorical(table)) => table
                .values()
                .iter()
                .map(|v| v.round() as u32)
                .collect(),
            _ => {
                return Err(Error::InvalidModel(format!(
                    "{} is not a categorical table",
                    path(CAR_TYPE_FILE).display()
                )));
            }
        };

        let mut duration = BTreeMap::new();
        let mut mileage = BTreeMap::new();
        for ct in car_types {
            duration.insert(ct, Distribution::restore(&path(&duration_file(ct)))?);
            mileage.insert(ct, Distribution::restore(&path(&mileage_file(ct)))?);
        }

        tracing::info!(dir = %model_dir.display(), car_types = duration.len(), "distribution bank restored");
        Ok(Self {
            trip_count,
            household_cars,
            start_time,
            car_type,
            duration,
            mileage,
        })
    }

    pub fn trip_count(&self) -> &Distribution {
        &self.trip_count
    }

    pub fn household_cars(&self) -> &Distribution {
        &self.household_cars
    }

    pub fn start_time(&self) -> &Distribution {
        &self.start_time
    }

    pub fn car_type(&self) -> &Distribution {
        &self.car_type
    }

    /// Duration distribution for `car_type`.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownCarType`] if no duration model exists for it.
    pub fn duration(&self, car_type: u32) -> Result<&Distribution> {
        self.duration
            .get(&car_type)
            .ok_or(Error::UnknownCarType(car_type))
    }

    /// Mileage distribution for `car_type`.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownCarType`] if no mileage model exists for it.
    pub fn mileage(&self, car_type: u32) -> Result<&Distribution> {
        self.mileage
            .get(&car_type)
            .ok_or(Error::UnknownCarType(car_type))
    }

    /// Car types with duration and mileage models.
    pub fn car_types(&self) -> impl Iterator<Item = u32> + '_ {
        self.duration.keys().copied()
    }

    fn all(&self) -> impl Iterator<Item = &Distribution> {
        [
            &self.trip_count,
            &self.household_cars,
            &self.start_time,
            &self.car_type,
        ]
        .into_iter()
        .chain(self.duration.values())
        .chain(self.mileage.values())
    }
}
