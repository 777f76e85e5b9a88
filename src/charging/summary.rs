//! Post-hoc statistics for a charging-demand run.

use std::fmt;

use super::schedule::DemandSchedule;
use super::scheduler::{ChargingEvent, ChargingSite};

/// Headline figures derived from a complete [`DemandResult`](super::DemandResult).
#[derive(Debug, Clone, PartialEq)]
pub struct DemandSummary {
    /// Vehicles considered.
    pub vehicles: usize,
    /// Trips considered.
    pub trips: usize,
    /// Sum of the aggregate schedule (kWh in power mode).
    pub total_energy_kwh: f64,
    /// Site power times run length, summed over home events.
    pub home_energy_kwh: f64,
    /// Same for public events.
    pub public_energy_kwh: f64,
    pub peak_kw: f64,
    pub peak_hour: usize,
    pub home_events: usize,
    pub public_events: usize,
    /// Trips that triggered no charging.
    pub no_charge_trips: usize,
    /// Vehicles whose home schedule is not all zero.
    pub vehicles_with_home_demand: usize,
}

impl DemandSummary {
    pub fn from_parts(
        aggregate: &DemandSchedule,
        events: &[ChargingEvent],
        vehicles: usize,
        trips: usize,
        vehicles_with_home_demand: usize,
    ) -> Self {
        let (peak_hour, peak_kw) = aggregate.peak();
        let mut home_events = 0;
        let mut public_events = 0;
        let mut home_energy_kwh = 0.0;
        let mut public_energy_kwh = 0.0;
        for e in events {
            let kwh = e.site_power_kw * e.run_hours as f64;
            match e.site {
                ChargingSite::Home => {
                    home_events += 1;
                    home_energy_kwh += kwh;
                }
                ChargingSite::Public => {
                    public_events += 1;
                    public_energy_kwh += kwh;
                }
            }
        }

        Self {
            vehicles,
            trips,
            total_energy_kwh: aggregate.total(),
            home_energy_kwh,
            public_energy_kwh,
            peak_kw,
            peak_hour,
            home_events,
            public_events,
            no_charge_trips: trips.saturating_sub(events.len()),
            vehicles_with_home_demand,
        }
    }
}

impl fmt::Display for DemandSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Charging Demand ---")?;
        writeln!(f, "Vehicles / trips:      {} / {}", self.vehicles, self.trips)?;
        writeln!(f, "Aggregate demand:      {:.2} kWh", self.total_energy_kwh)?;
        writeln!(
            f,
            "Peak:                  {:.2} kW at {:02}:00",
            self.peak_kw, self.peak_hour
        )?;
        writeln!(
            f,
            "Home charging:         {} events, {:.2} kWh",
            self.home_events, self.home_energy_kwh
        )?;
        writeln!(
            f,
            "Public charging:       {} events, {:.2} kWh",
            self.public_events, self.public_energy_kwh
        )?;
        writeln!(f, "No charge needed:      {} trips", self.no_charge_trips)?;
        write!(
            f,
            "Vehicles charging home: {}",
            self.vehicles_with_home_demand
        )
    }
}
