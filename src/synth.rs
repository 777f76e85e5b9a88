//! Stochastic synthesis of vehicles and their daily trip chains.

use rand::Rng;
use serde::Deserialize;

use crate::bank::DistributionBank;
use crate::dist::Distribution;
use crate::error::{Error, Result, SampledField};

/// Hours in the synthesized day.
pub const DAY_HOURS: f64 = 24.0;

/// One synthesized trip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticTrip {
    /// Start time in hours, in `[0, 24)`.
    pub start: f64,
    /// Duration in hours, `> 0`.
    pub duration: f64,
    /// Distance in miles, `> 0`.
    pub mileage: f64,
}

impl SyntheticTrip {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    /// Mean speed over the trip (miles per hour).
    pub fn average_speed(&self) -> f64 {
        self.mileage / self.duration
    }
}

/// A synthesized vehicle with its trips sorted by start time.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticVehicle {
    pub car_id: u32,
    pub car_type: u32,
    pub house_id: Option<u32>,
    pub trips: Vec<SyntheticTrip>,
}

/// Flat table row: one per (vehicle, trip).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TripRow {
    pub car_id: u32,
    pub car_type: u32,
    pub house_id: Option<u32>,
    pub start: f64,
    pub duration: f64,
    pub end: f64,
    pub mileage: f64,
}

impl SyntheticVehicle {
    pub fn rows(&self) -> impl Iterator<Item = TripRow> + '_ {
        self.trips.iter().map(|t| TripRow {
            car_id: self.car_id,
            car_type: self.car_type,
            house_id: self.house_id,
            start: t.start,
            duration: t.duration,
            end: t.end(),
            mileage: t.mileage,
        })
    }
}

/// Flattens vehicles into trip rows, preserving vehicle and trip order.
pub fn trip_table(vehicles: &[SyntheticVehicle]) -> Vec<TripRow> {
    vehicles.iter().flat_map(SyntheticVehicle::rows).collect()
}

/// What to synthesize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Population {
    /// A fixed number of independent vehicles.
    Vehicles(usize),
    /// A number of households, each with a sampled number of vehicles.
    Households(usize),
}

/// What to do when a draw exhausts its rejection attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExhaustionPolicy {
    /// Drop the infeasible trip (or the vehicle, for start times) and count it.
    #[default]
    Skip,
    /// Return [`Error::RejectionSamplingExhausted`].
    Abort,
}

/// Tuning for [`TripSynthesizer`].
#[derive(Debug, Clone)]
pub struct SynthesisOptions {
    /// Attempts per rejection-sampled quantity.
    pub max_rejection_iters: usize,
    /// Exclusive upper bound on trip mean speed (mph).
    pub upper_avg_speed: f64,
    pub on_exhausted: ExhaustionPolicy,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            max_rejection_iters: 50,
            upper_avg_speed: 60.0,
            on_exhausted: ExhaustionPolicy::Skip,
        }
    }
}

/// Counters describing one synthesis run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynthesisReport {
    pub requested_vehicles: usize,
    pub vehicles: usize,
    pub trips: usize,
    pub skipped_vehicles: usize,
    pub skipped_trips: usize,
}

#[derive(Debug, Clone)]
pub struct SynthesisOutput {
    pub vehicles: Vec<SyntheticVehicle>,
    pub report: SynthesisReport,
}

impl SynthesisOutput {
    pub fn rows(&self) -> Vec<TripRow> {
        trip_table(&self.vehicles)
    }
}

/// Draws synthetic vehicles from a [`DistributionBank`].
pub struct TripSynthesizer<'a> {
    bank: &'a DistributionBank,
    options: SynthesisOptions,
}

impl<'a> TripSynthesizer<'a> {
    pub fn new(bank: &'a DistributionBank, options: SynthesisOptions) -> Self {
        Self { bank, options }
    }

    /// Synthesizes a population.
    ///
    /// Sampling order is fixed for reproducibility: household sizes, then
    /// every vehicle's trip count, then every vehicle's car type, then each
    /// vehicle's start times, durations, and mileages in turn. Car ids are
    /// 1-based in creation order; a vehicle dropped under
    /// [`ExhaustionPolicy::Skip`] keeps its id, leaving a gap.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownCarType`] if a sampled car type has no duration or
    /// mileage model, and [`Error::RejectionSamplingExhausted`] under
    /// [`ExhaustionPolicy::Abort`].
    pub fn synthesize<R: Rng + ?Sized>(
        &self,
        population: Population,
        rng: &mut R,
    ) -> Result<SynthesisOutput> {
        let house_ids: Vec<Option<u32>> = match population {
            Population::Vehicles(n) => vec![None; n],
            Population::Households(n) => {
                let sizes = self.bank.household_cars().sample(rng, n)?;
                sizes
                    .iter()
                    .enumerate()
                    .flat_map(|(h, &size)| {
                        let cars = size.round().max(0.0) as usize;
                        std::iter::repeat_n(Some(h as u32 + 1), cars)
                    })
                    .collect()
            }
        };
        let n_vehicles = house_ids.len();

        let trip_counts = self.bank.trip_count().sample(rng, n_vehicles)?;
        let car_types = self.bank.car_type().sample(rng, n_vehicles)?;

        let mut report = SynthesisReport {
            requested_vehicles: n_vehicles,
            ..SynthesisReport::default()
        };
        let mut vehicles = Vec::with_capacity(n_vehicles);

        for (i, ((house_id, n_trips), car_type)) in house_ids
            .into_iter()
            .zip(trip_counts)
            .zip(car_types)
            .enumerate()
        {
            let car_id = i as u32 + 1;
            let car_type = car_type.round().max(0.0) as u32;
            let n_trips = n_trips.round().max(0.0) as usize;

            let Some(starts) = self.sample_start_times(n_trips, car_id, rng)? else {
                report.skipped_vehicles += 1;
                report.skipped_trips += n_trips;
                continue;
            };

            let trips = self.sample_trips(&starts, car_id, car_type, &mut report, rng)?;
            tracing::trace!(car_id, car_type, trips = trips.len(), "vehicle synthesized");
            report.trips += trips.len();
            vehicles.push(SyntheticVehicle {
                car_id,
                car_type,
                house_id,
                trips,
            });
        }

        report.vehicles = vehicles.len();
        tracing::info!(
            vehicles = report.vehicles,
            trips = report.trips,
            skipped_vehicles = report.skipped_vehicles,
            skipped_trips = report.skipped_trips,
            "synthesis complete"
        );
        Ok(SynthesisOutput { vehicles, report })
    }

    /// Draws `n` start times until all lie in `[0, 24)`, sorted ascending.
    fn sample_start_times<R: Rng + ?Sized>(
        &self,
        n: usize,
        car_id: u32,
        rng: &mut R,
    ) -> Result<Option<Vec<f64>>> {
        if n == 0 {
            return Ok(Some(Vec::new()));
        }
        for _ in 0..self.options.max_rejection_iters {
            let mut starts = self.bank.start_time().sample(rng, n)?;
            if starts.iter().all(|s| (0.0..DAY_HOURS).contains(s)) {
                starts.sort_by(f64::total_cmp);
                return Ok(Some(starts));
            }
        }
        self.exhausted(SampledField::StartTimes, car_id)
    }

    fn sample_trips<R: Rng + ?Sized>(
        &self,
        starts: &[f64],
        car_id: u32,
        car_type: u32,
        report: &mut SynthesisReport,
        rng: &mut R,
    ) -> Result<Vec<SyntheticTrip>> {
        let durations = self.bank.duration(car_type)?;
        let mileages = self.bank.mileage(car_type)?;
        let last = starts.len().saturating_sub(1);

        let mut trips = Vec::with_capacity(starts.len());
        for (n, &start) in starts.iter().enumerate() {
            let lower = if n == 0 { 0.0 } else { starts[n - 1] };
            let upper = if n == last { DAY_HOURS } else { starts[n + 1] };

            let duration = self.draw_until(durations, rng, |d| {
                d > 0.0 && start + d > lower && start + d < upper
            })?;
            let Some(duration) = duration.map_or_else(
                || self.exhausted(SampledField::Duration, car_id),
                |d| Ok(Some(d)),
            )?
            else {
                report.skipped_trips += 1;
                continue;
            };

            let speed_limit = self.options.upper_avg_speed;
            let mileage = self.draw_until(mileages, rng, |m| m > 0.0 && m / duration < speed_limit)?;
            let Some(mileage) = mileage.map_or_else(
                || self.exhausted(SampledField::Mileage, car_id),
                |m| Ok(Some(m)),
            )?
            else {
                report.skipped_trips += 1;
                continue;
            };

            trips.push(SyntheticTrip {
                start,
                duration,
                mileage,
            });
        }
        Ok(trips)
    }

    /// Draws single values until `accept` holds, up to the attempt cap.
    fn draw_until<R: Rng + ?Sized>(
        &self,
        dist: &Distribution,
        rng: &mut R,
        accept: impl Fn(f64) -> bool,
    ) -> Result<Option<f64>> {
        for _ in 0..self.options.max_rejection_iters {
            let value = dist.sample_one(rng)?;
            if accept(value) {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    fn exhausted<T>(&self, field: SampledField, car_id: u32) -> Result<Option<T>> {
        let attempts = self.options.max_rejection_iters;
        match self.options.on_exhausted {
            ExhaustionPolicy::Abort => Err(Error::RejectionSamplingExhausted {
                field,
                car_id,
                attempts,
            }),
            ExhaustionPolicy::Skip => {
                tracing::warn!(car_id, %field, attempts, "rejection sampling exhausted, skipping");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dist::{CategoricalModel, ContinuousModel, FamilyParams, FittedDistribution};
    use rand::{SeedableRng, rngs::StdRng};
    use std::collections::BTreeMap;

    fn table(name: &str, values: Vec<f64>, probs: Vec<f64>) -> Distribution {
        Distribution::from_model(
            name,
            FittedDistribution::Categorical(CategoricalModel::from_table(values, probs)),
        )
    }

    fn uniform(name: &str, low: f64, high: f64) -> Distribution {
        Distribution::from_model(
            name,
            FittedDistribution::Continuous(
                ContinuousModel::new(FamilyParams::Uniform { low, high }, 0.0).expect("params"),
            ),
        )
    }

    fn bank(start: (f64, f64), duration: (f64, f64), mileage: (f64, f64)) -> DistributionBank {
        DistributionBank::from_parts(
            table("trip_count", vec![1.0, 2.0, 3.0], vec![0.3, 0.4, 0.3]),
            table("household_cars", vec![2.0], vec![1.0]),
            uniform("start_time", start.0, start.1),
            table("car_type", vec![1.0, 2.0], vec![0.5, 0.5]),
            BTreeMap::from([
                (1, uniform("duration_ct_1", duration.0, duration.1)),
                (2, uniform("duration_ct_2", duration.0, duration.1)),
            ]),
            BTreeMap::from([
                (1, uniform("mileage_ct_1", mileage.0, mileage.1)),
                (2, uniform("mileage_ct_2", mileage.0, mileage.1)),
            ]),
        )
        .expect("bank")
    }

    #[test]
    fn trips_are_sorted_and_disjoint() {
        let bank = bank((5.0, 22.0), (0.05, 1.5), (1.0, 30.0));
        let synth = TripSynthesizer::new(&bank, SynthesisOptions::default());
        let mut rng = StdRng::seed_from_u64(17);
        let out = synth
            .synthesize(Population::Vehicles(200), &mut rng)
            .expect("synthesis");

        for v in &out.vehicles {
            for pair in v.trips.windows(2) {
                assert!(pair[0].start <= pair[1].start);
                assert!(pair[0].end() <= pair[1].start, "overlap in car {}", v.car_id);
            }
            for t in &v.trips {
                assert!((0.0..24.0).contains(&t.start));
                assert!(t.duration > 0.0);
                assert!(t.mileage > 0.0);
                assert!(t.average_speed() < 60.0);
                assert!(t.end() < 24.0);
            }
        }
    }

    #[test]
    fn households_tag_vehicles() {
        let bank = bank((5.0, 22.0), (0.05, 1.0), (1.0, 20.0));
        let synth = TripSynthesizer::new(&bank, SynthesisOptions::default());
        let mut rng = StdRng::seed_from_u64(1);
        let out = synth
            .synthesize(Population::Households(3), &mut rng)
            .expect("synthesis");

        assert_eq!(out.report.requested_vehicles, 6);
        let ids: Vec<u32> = (1..=6).collect();
        let got: Vec<u32> = out.vehicles.iter().map(|v| v.car_id).collect();
        assert_eq!(got, ids);
        let houses: Vec<Option<u32>> = out.vehicles.iter().map(|v| v.house_id).collect();
        assert_eq!(
            houses,
            vec![Some(1), Some(1), Some(2), Some(2), Some(3), Some(3)]
        );
    }

    #[test]
    fn same_seed_same_population() {
        let bank = bank((5.0, 22.0), (0.05, 1.5), (1.0, 30.0));
        let synth = TripSynthesizer::new(&bank, SynthesisOptions::default());
        let a = synth
            .synthesize(Population::Vehicles(25), &mut StdRng::seed_from_u64(8))
            .expect("a");
        let b = synth
            .synthesize(Population::Vehicles(25), &mut StdRng::seed_from_u64(8))
            .expect("b");
        assert_eq!(a.vehicles, b.vehicles);
    }

    #[test]
    fn infeasible_start_times_abort_when_requested() {
        let bank = bank((30.0, 40.0), (0.1, 1.0), (1.0, 10.0));
        let options = SynthesisOptions {
            max_rejection_iters: 5,
            on_exhausted: ExhaustionPolicy::Abort,
            ..SynthesisOptions::default()
        };
        let synth = TripSynthesizer::new(&bank, options);
        let err = synth
            .synthesize(Population::Vehicles(1), &mut StdRng::seed_from_u64(2))
            .expect_err("start times can never fit in the day");
        assert!(matches!(
            err,
            Error::RejectionSamplingExhausted {
                field: SampledField::StartTimes,
                car_id: 1,
                attempts: 5
            }
        ));
    }

    #[test]
    fn infeasible_mileage_is_skipped_not_kept() {
        // every mileage exceeds 60 mph over at most one hour
        let bank = bank((5.0, 20.0), (0.1, 1.0), (100.0, 200.0));
        let synth = TripSynthesizer::new(&bank, SynthesisOptions::default());
        let out = synth
            .synthesize(Population::Vehicles(10), &mut StdRng::seed_from_u64(4))
            .expect("skip policy never fails");
        assert_eq!(out.report.trips, 0);
        assert!(out.report.skipped_trips > 0);
        assert!(out.vehicles.iter().all(|v| v.trips.is_empty()));
    }

    #[test]
    fn rows_flatten_in_vehicle_order() {
        let vehicles = vec![
            SyntheticVehicle {
                car_id: 1,
                car_type: 2,
                house_id: None,
                trips: vec![
                    SyntheticTrip {
                        start: 7.0,
                        duration: 0.5,
                        mileage: 10.0,
                    },
                    SyntheticTrip {
                        start: 17.0,
                        duration: 0.5,
                        mileage: 10.0,
                    },
                ],
            },
            SyntheticVehicle {
                car_id: 2,
                car_type: 1,
                house_id: None,
                trips: vec![SyntheticTrip {
                    start: 9.0,
                    duration: 1.0,
                    mileage: 20.0,
                }],
            },
        ];
        let rows = trip_table(&vehicles);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].end, 17.5);
        assert_eq!(rows[2].car_id, 2);
    }
}
