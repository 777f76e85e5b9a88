//! Per-trip charging decisions and their 24-hour demand schedules.

use rand::Rng;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::synth::{SyntheticTrip, SyntheticVehicle};

use super::profile::{OccupancyProfiles, OccupancySite, home_start_hour};
use super::schedule::{DemandSchedule, HOURS};
use super::summary::DemandSummary;

/// How a charging run is written into a schedule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleMode {
    /// Each run hour carries the session's site power (kW).
    #[default]
    Power,
    /// Each hour a vehicle charges at home is flagged 1.0.
    Occupancy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargingSite {
    Home,
    Public,
}

/// Vehicle and charger parameters.
///
/// `range_miles` and `battery_kwh` are indexed by car type, starting at 1.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargingParams {
    pub init_soc_min: f64,
    pub init_soc_max: f64,
    pub soc_threshold_min: f64,
    pub soc_threshold_max: f64,
    pub soc_upper_min: f64,
    pub soc_upper_max: f64,
    /// Charger power (kW).
    pub charging_rate_kw: f64,
    pub charging_efficiency: f64,
    /// Trips at or above this mean speed (mph) never use public chargers.
    pub public_speed_limit: f64,
    /// Mean speed (mph) used to place the public charging hour.
    pub avg_round_trip_speed: f64,
    /// Trips at or below this duration (h) never use public chargers.
    pub duration_limit: f64,
    pub schedule_mode: ScheduleMode,
    pub occupancy_site: OccupancySite,
    pub range_miles: Vec<f64>,
    pub battery_kwh: Vec<f64>,
}

impl Default for ChargingParams {
    fn default() -> Self {
        Self {
            init_soc_min: 0.15,
            init_soc_max: 0.80,
            soc_threshold_min: 0.10,
            soc_threshold_max: 0.20,
            soc_upper_min: 0.85,
            soc_upper_max: 1.0,
            charging_rate_kw: 3.3,
            charging_efficiency: 0.90,
            public_speed_limit: 25.0,
            avg_round_trip_speed: 40.0,
            duration_limit: 0.5,
            schedule_mode: ScheduleMode::Power,
            occupancy_site: OccupancySite::Residence,
            range_miles: vec![107.0, 105.0, 289.0, 40.0],
            battery_kwh: vec![30.0, 24.0, 100.0, 23.0],
        }
    }
}

impl ChargingParams {
    fn lookup(table: &[f64], car_type: u32) -> Result<f64> {
        (car_type as usize)
            .checked_sub(1)
            .and_then(|i| table.get(i))
            .copied()
            .ok_or(Error::UnknownCarType(car_type))
    }

    /// Range in miles of `car_type`.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownCarType`] if the type has no entry.
    pub fn range_of(&self, car_type: u32) -> Result<f64> {
        Self::lookup(&self.range_miles, car_type)
    }

    /// Usable battery capacity in kWh of `car_type`.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownCarType`] if the type has no entry.
    pub fn battery_of(&self, car_type: u32) -> Result<f64> {
        Self::lookup(&self.battery_kwh, car_type)
    }
}

/// A charging session triggered by one trip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChargingEvent {
    pub car_id: u32,
    /// 1-based position of the trip within its vehicle.
    pub trip_index: usize,
    pub site: ChargingSite,
    pub start_hour: usize,
    /// Unrounded charging time (h).
    pub duration_h: f64,
    /// Whole hours written into the schedule.
    pub run_hours: usize,
    /// `battery × efficiency × (target − threshold)`, floored at 0.
    pub site_power_kw: f64,
    /// Value written into each run hour: the site power, or 1.0 in
    /// occupancy mode; 0 for an empty run.
    pub hourly_kw: f64,
}

/// Result of [`ChargingScheduler::compute_energy_consumption`].
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyConsumption {
    pub target_soc: f64,
    pub site_power_kw: f64,
    pub duration_h: f64,
    pub run_hours: usize,
    pub hourly_kw: f64,
    pub schedule: DemandSchedule,
}

/// Home demand of one vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleDemand {
    pub car_id: u32,
    pub car_type: u32,
    pub house_id: Option<u32>,
    pub schedule: DemandSchedule,
}

/// Output of [`ChargingScheduler::compute_aggregate_demand`].
#[derive(Debug, Clone)]
pub struct DemandResult {
    pub per_vehicle: Vec<VehicleDemand>,
    /// Public-site demand, not attributed to any vehicle.
    pub public: DemandSchedule,
    /// Sum of every vehicle's home schedule.
    pub home: DemandSchedule,
    /// `public + home`.
    pub aggregate: DemandSchedule,
    pub events: Vec<ChargingEvent>,
    pub summary: DemandSummary,
}

/// Uniform draw on `[lo, hi)`, or `lo` when the interval is empty.
fn uniform_between<R: Rng + ?Sized>(rng: &mut R, lo: f64, hi: f64) -> f64 {
    if hi > lo { rng.random_range(lo..hi) } else { lo }
}

/// Turns synthesized trips into hourly charging demand.
#[derive(Debug, Clone)]
pub struct ChargingScheduler {
    params: ChargingParams,
    profiles: OccupancyProfiles,
}

impl ChargingScheduler {
    pub fn new(params: ChargingParams, profiles: OccupancyProfiles) -> Self {
        Self { params, profiles }
    }

    pub fn params(&self) -> &ChargingParams {
        &self.params
    }

    /// Energy and schedule of one charging session.
    ///
    /// Draws a target SOC and derives the site power needed to lift the
    /// battery from `threshold` to it. The run lasts `round(power / rate)`
    /// hours (at most one day) from `start_hour`, wrapping past midnight,
    /// and each run hour holds the site power, or 1.0 in occupancy mode.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownCarType`] if `car_type` has no battery entry.
    pub fn compute_energy_consumption<R: Rng + ?Sized>(
        &self,
        car_type: u32,
        threshold: f64,
        start_hour: usize,
        rng: &mut R,
    ) -> Result<EnergyConsumption> {
        let p = &self.params;
        let battery = p.battery_of(car_type)?;
        let target_soc = uniform_between(rng, p.soc_upper_min, p.soc_upper_max);
        let site_power_kw =
            (battery * p.charging_efficiency * (target_soc - threshold)).max(0.0);
        let duration_h = site_power_kw / p.charging_rate_kw;
        let run_hours = (duration_h.round() as usize).min(HOURS);

        let hourly_kw = match (run_hours, p.schedule_mode) {
            (0, _) => 0.0,
            (_, ScheduleMode::Power) => site_power_kw,
            (_, ScheduleMode::Occupancy) => 1.0,
        };
        let mut schedule = DemandSchedule::new();
        schedule.set_run(start_hour, run_hours, hourly_kw);

        Ok(EnergyConsumption {
            target_soc,
            site_power_kw,
            duration_h,
            run_hours,
            hourly_kw,
            schedule,
        })
    }

    /// Schedules every vehicle's trips and sums the result.
    ///
    /// Each vehicle draws one initial SOC; every trip is then judged
    /// against that SOC on its own. Trips whose remaining range falls below
    /// half their mileage, that are slow and long enough, charge at a public
    /// site shortly after departure; otherwise trips that leave the SOC below
    /// a drawn threshold charge at home from the next occupancy rise.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownCarType`] if a vehicle's type has no range or battery
    /// entry.
    pub fn compute_aggregate_demand<R: Rng + ?Sized>(
        &self,
        vehicles: &[SyntheticVehicle],
        weekday: bool,
        rng: &mut R,
    ) -> Result<DemandResult> {
        let curve = self.profiles.curve(self.params.occupancy_site, weekday);
        let mut public = DemandSchedule::new();
        let mut home = DemandSchedule::new();
        let mut events = Vec::new();
        let mut per_vehicle = Vec::with_capacity(vehicles.len());
        let mut trips = 0;

        for vehicle in vehicles {
            let range = self.params.range_of(vehicle.car_type)?;
            let init_soc = uniform_between(rng, self.params.init_soc_min, self.params.init_soc_max);
            let mut schedule = DemandSchedule::new();

            for (i, trip) in vehicle.trips.iter().enumerate() {
                trips += 1;
                let Some((site, start_hour, threshold)) =
                    self.decide(trip, init_soc, range, curve, rng)
                else {
                    continue;
                };
                let energy =
                    self.compute_energy_consumption(vehicle.car_type, threshold, start_hour, rng)?;
                match (site, self.params.schedule_mode) {
                    (ChargingSite::Public, _) => public += &energy.schedule,
                    (ChargingSite::Home, ScheduleMode::Power) => schedule += &energy.schedule,
                    (ChargingSite::Home, ScheduleMode::Occupancy) => {
                        schedule.max_assign(&energy.schedule)
                    }
                }
                tracing::trace!(
                    car_id = vehicle.car_id,
                    trip = i + 1,
                    ?site,
                    start_hour,
                    power_kw = energy.site_power_kw,
                    "charging event"
                );
                events.push(ChargingEvent {
                    car_id: vehicle.car_id,
                    trip_index: i + 1,
                    site,
                    start_hour,
                    duration_h: energy.duration_h,
                    run_hours: energy.run_hours,
                    site_power_kw: energy.site_power_kw,
                    hourly_kw: energy.hourly_kw,
                });
            }

            home += &schedule;
            per_vehicle.push(VehicleDemand {
                car_id: vehicle.car_id,
                car_type: vehicle.car_type,
                house_id: vehicle.house_id,
                schedule,
            });
        }

        let mut aggregate = public;
        aggregate += &home;
        let charging_home = per_vehicle.iter().filter(|v| !v.schedule.is_zero()).count();
        let summary =
            DemandSummary::from_parts(&aggregate, &events, per_vehicle.len(), trips, charging_home);
        tracing::info!(
            vehicles = per_vehicle.len(),
            events = events.len(),
            peak_kw = summary.peak_kw,
            "charging demand computed"
        );

        Ok(DemandResult {
            per_vehicle,
            public,
            home,
            aggregate,
            events,
            summary,
        })
    }

    /// Charging site, start hour, and threshold for a trip, or `None` when
    /// the trip needs no charge.
    fn decide<R: Rng + ?Sized>(
        &self,
        trip: &SyntheticTrip,
        init_soc: f64,
        range: f64,
        curve: &[f64; HOURS],
        rng: &mut R,
    ) -> Option<(ChargingSite, usize, f64)> {
        let p = &self.params;
        let soc = (init_soc * range - trip.mileage) / range;
        let remaining = soc * range;
        let threshold = uniform_between(rng, p.soc_threshold_min, p.soc_threshold_max);

        let public = remaining < trip.mileage / 2.0
            && trip.average_speed() < p.public_speed_limit
            && trip.duration > p.duration_limit;
        if public {
            let hour = (trip.start + 0.5 * trip.mileage / p.avg_round_trip_speed).round() as i64;
            let start_hour = hour.rem_euclid(HOURS as i64) as usize;
            return Some((ChargingSite::Public, start_hour, threshold));
        }
        if soc < threshold {
            return Some((ChargingSite::Home, home_start_hour(curve, trip.end()), threshold));
        }
        None
    }
}
