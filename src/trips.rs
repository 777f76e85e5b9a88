//! Historical trip records and the per-vehicle annotations derived from them.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// One row of the historical trip CSV.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RawTrip {
    pub houseid: u64,
    pub carid: u64,
    pub cartype: u32,
    /// Start time in hours.
    pub start: f64,
    /// End time in hours.
    pub end: f64,
    /// Trip length in miles.
    pub mileage: f64,
}

/// A validated trip with derived duration and per-vehicle annotations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TripRecord {
    pub house_id: u64,
    pub car_id: u64,
    pub car_type: u32,
    pub start: f64,
    pub end: f64,
    /// `end - start`, never negative.
    pub duration: f64,
    pub mileage: f64,
    /// Number of rows recorded for this car.
    pub trip_count: usize,
    /// 1-based position of this row among its car's rows, in file order.
    pub trip_index: usize,
}

/// Immutable table of historical trips.
#[derive(Debug, Clone, Default)]
pub struct TripDataset {
    records: Vec<TripRecord>,
    rejected_rows: usize,
}

impl TripDataset {
    /// Loads trips from a CSV file with columns
    /// `houseid,carid,cartype,start,end,mileage`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or a row fails to parse.
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let dataset = Self::from_reader(file)?;
        tracing::info!(
            path = %path.display(),
            trips = dataset.len(),
            rejected = dataset.rejected_rows,
            "trip dataset loaded"
        );
        Ok(dataset)
    }

    /// Loads trips from any CSV reader.
    ///
    /// Rows whose end precedes their start, or with non-finite fields, are
    /// dropped and counted in [`rejected_rows`](Self::rejected_rows).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Csv`] if a row fails to parse.
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut raw = Vec::new();
        for row in rdr.deserialize::<RawTrip>() {
            raw.push(row?);
        }
        Ok(Self::from_raw(raw))
    }

    /// Builds the dataset from already-parsed rows.
    pub fn from_raw(rows: impl IntoIterator<Item = RawTrip>) -> Self {
        let mut kept = Vec::new();
        let mut rejected_rows = 0;
        for (line, row) in rows.into_iter().enumerate() {
            let duration = row.end - row.start;
            let finite = row.start.is_finite() && row.end.is_finite() && row.mileage.is_finite();
            if !finite || duration < 0.0 {
                tracing::warn!(
                    row = line + 1,
                    carid = row.carid,
                    start = row.start,
                    end = row.end,
                    "trip rejected: negative duration or non-finite field"
                );
                rejected_rows += 1;
                continue;
            }
            kept.push((row, duration));
        }

        let mut counts: HashMap<u64, usize> = HashMap::new();
        for (row, _) in &kept {
            *counts.entry(row.carid).or_default() += 1;
        }

        let mut seen: HashMap<u64, usize> = HashMap::new();
        let records = kept
            .into_iter()
            .map(|(row, duration)| {
                let index = seen.entry(row.carid).or_default();
                *index += 1;
                TripRecord {
                    house_id: row.houseid,
                    car_id: row.carid,
                    car_type: row.cartype,
                    start: row.start,
                    end: row.end,
                    duration,
                    mileage: row.mileage,
                    trip_count: counts.get(&row.carid).copied().unwrap_or_default(),
                    trip_index: *index,
                }
            })
            .collect();

        Self {
            records,
            rejected_rows,
        }
    }

    pub fn records(&self) -> &[TripRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rows dropped during loading.
    pub fn rejected_rows(&self) -> usize {
        self.rejected_rows
    }

    /// Start times of every trip.
    pub fn start_times(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.start).collect()
    }

    /// Number of distinct start times per car, in ascending car id order.
    pub fn trips_per_car(&self) -> Vec<f64> {
        let mut starts: BTreeMap<u64, Vec<f64>> = BTreeMap::new();
        for r in &self.records {
            starts.entry(r.car_id).or_default().push(r.start);
        }
        starts
            .into_values()
            .map(|mut s| {
                s.sort_by(f64::total_cmp);
                s.dedup();
                s.len() as f64
            })
            .collect()
    }

    /// Number of distinct cars per house, in ascending house id order.
    pub fn cars_per_house(&self) -> Vec<f64> {
        let mut cars: BTreeMap<u64, BTreeSet<u64>> = BTreeMap::new();
        for r in &self.records {
            cars.entry(r.house_id).or_default().insert(r.car_id);
        }
        cars.into_values().map(|c| c.len() as f64).collect()
    }

    /// Car type of every trip, in input order. Cars with more trips weigh
    /// more.
    pub fn car_types_per_trip(&self) -> Vec<f64> {
        self.records.iter().map(|r| f64::from(r.car_type)).collect()
    }

    /// Sorted set of car types present in the data.
    pub fn car_types(&self) -> BTreeSet<u32> {
        self.records.iter().map(|r| r.car_type).collect()
    }

    /// Durations of trips made by cars of `car_type`.
    pub fn durations_for(&self, car_type: u32) -> Vec<f64> {
        self.records
            .iter()
            .filter(|r| r.car_type == car_type)
            .map(|r| r.duration)
            .collect()
    }

    /// Mileages of trips made by cars of `car_type`.
    pub fn mileages_for(&self, car_type: u32) -> Vec<f64> {
        self.records
            .iter()
            .filter(|r| r.car_type == car_type)
            .map(|r| r.mileage)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
houseid,carid,cartype,start,end,mileage
1,10,1,7.5,8.0,12.0
1,10,1,17.0,17.75,12.5
1,11,2,9.0,9.5,4.0
2,20,3,8.0,7.0,30.0
2,21,1,12.0,13.0,25.0
";

    #[test]
    fn derives_duration_and_annotations() {
        let ds = TripDataset::from_reader(CSV.as_bytes()).expect("parse");
        assert_eq!(ds.len(), 4);
        assert_eq!(ds.rejected_rows(), 1);

        let first = ds.records()[0];
        assert_eq!(first.duration, 0.5);
        assert_eq!(first.trip_count, 2);
        assert_eq!(first.trip_index, 1);
        assert_eq!(ds.records()[1].trip_index, 2);
        assert_eq!(ds.records()[2].trip_count, 1);
    }

    #[test]
    fn per_vehicle_and_household_counts() {
        let ds = TripDataset::from_reader(CSV.as_bytes()).expect("parse");
        assert_eq!(ds.trips_per_car(), vec![2.0, 1.0, 1.0]);
        assert_eq!(ds.cars_per_house(), vec![2.0, 1.0]);
        assert_eq!(ds.car_types_per_trip(), vec![1.0, 1.0, 2.0, 1.0]);
        assert_eq!(ds.car_types().into_iter().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn car_type_subsets() {
        let ds = TripDataset::from_reader(CSV.as_bytes()).expect("parse");
        assert_eq!(ds.durations_for(1), vec![0.5, 0.75, 1.0]);
        assert_eq!(ds.mileages_for(2), vec![4.0]);
        assert!(ds.durations_for(4).is_empty());
    }

    #[test]
    fn malformed_row_is_an_error() {
        let bad = "houseid,carid,cartype,start,end,mileage\n1,1,x,1,2,3\n";
        assert!(matches!(
            TripDataset::from_reader(bad.as_bytes()),
            Err(Error::Csv(_))
        ));
    }
}
