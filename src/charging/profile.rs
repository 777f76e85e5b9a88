//! Hourly vehicle-occupancy curves used to place home charging.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

use super::schedule::HOURS;

/// Which occupancy curve family home charging follows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccupancySite {
    /// Vehicles that only charge at the residence.
    #[default]
    Residence,
    /// Vehicles with access to residence and workplace charging.
    ResidenceWork,
}

#[derive(Debug, Deserialize)]
struct ProfileRow {
    #[serde(rename = "Residence Only - Weekday")]
    residence_weekday: f64,
    #[serde(rename = "Residence Only - Weekend")]
    residence_weekend: f64,
    #[serde(rename = "Residence+Work Weekday")]
    residence_work_weekday: f64,
    #[serde(rename = "Residence+Work Weekend")]
    residence_work_weekend: f64,
}

/// The four 24-hour occupancy curves.
#[derive(Debug, Clone, PartialEq)]
pub struct OccupancyProfiles {
    residence_weekday: [f64; HOURS],
    residence_weekend: [f64; HOURS],
    residence_work_weekday: [f64; HOURS],
    residence_work_weekend: [f64; HOURS],
}

impl OccupancyProfiles {
    pub fn new(
        residence_weekday: [f64; HOURS],
        residence_weekend: [f64; HOURS],
        residence_work_weekday: [f64; HOURS],
        residence_work_weekend: [f64; HOURS],
    ) -> Self {
        Self {
            residence_weekday,
            residence_weekend,
            residence_work_weekday,
            residence_work_weekend,
        }
    }

    /// Loads the curves from a CSV file with one row per hour.
    ///
    /// # Errors
    ///
    /// Returns an I/O or CSV error, or [`Error::InvalidProfile`] if the
    /// file does not hold exactly 24 finite rows.
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let profiles = Self::from_reader(file)?;
        tracing::debug!(path = %path.display(), "occupancy profiles loaded");
        Ok(profiles)
    }

    /// Loads the curves from any CSV reader. Extra columns are ignored.
    ///
    /// # Errors
    ///
    /// See [`from_csv_path`](Self::from_csv_path).
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut rows = Vec::with_capacity(HOURS);
        for row in rdr.deserialize::<ProfileRow>() {
            rows.push(row?);
        }
        if rows.len() != HOURS {
            return Err(Error::InvalidProfile(format!(
                "expected {HOURS} hourly rows, found {}",
                rows.len()
            )));
        }

        let mut profiles = Self::new([0.0; HOURS], [0.0; HOURS], [0.0; HOURS], [0.0; HOURS]);
        for (h, row) in rows.iter().enumerate() {
            let values = [
                row.residence_weekday,
                row.residence_weekend,
                row.residence_work_weekday,
                row.residence_work_weekend,
            ];
            if values.iter().any(|v| !v.is_finite()) {
                return Err(Error::InvalidProfile(format!("non-finite value at hour {h}")));
            }
            profiles.residence_weekday[h] = row.residence_weekday;
            profiles.residence_weekend[h] = row.residence_weekend;
            profiles.residence_work_weekday[h] = row.residence_work_weekday;
            profiles.residence_work_weekend[h] = row.residence_work_weekend;
        }
        Ok(profiles)
    }

    /// The curve for `site` on a weekday or weekend.
    pub fn curve(&self, site: OccupancySite, weekday: bool) -> &[f64; HOURS] {
        match (site, weekday) {
            (OccupancySite::Residence, true) => &self.residence_weekday,
            (OccupancySite::Residence, false) => &self.residence_weekend,
            (OccupancySite::ResidenceWork, true) => &self.residence_work_weekday,
            (OccupancySite::ResidenceWork, false) => &self.residence_work_weekend,
        }
    }
}

/// Hours `h` at which occupancy rises into `h + 1`.
pub fn rising_edges(curve: &[f64; HOURS]) -> Vec<usize> {
    curve
        .windows(2)
        .enumerate()
        .filter(|(_, w)| w[1] - w[0] > 0.0)
        .map(|(h, _)| h)
        .collect()
}

/// Home charging start hour for a trip ending at `end` (hours).
///
/// The first rising edge at or after the arrival hour; if none remain that
/// day, the first rising edge overall; if the curve never rises, the
/// arrival hour itself.
pub fn home_start_hour(curve: &[f64; HOURS], end: f64) -> usize {
    let arrival = (end.floor() as i64).rem_euclid(HOURS as i64) as usize;
    let edges = rising_edges(curve);
    edges
        .iter()
        .copied()
        .find(|&h| h >= arrival)
        .or_else(|| edges.first().copied())
        .unwrap_or(arrival)
}
