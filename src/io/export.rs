//! CSV export for synthesized trips and charging demand.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::charging::{DemandResult, VehicleDemand};
use crate::synth::TripRow;

/// Column header for the trip table.
pub const TRIPS_HEADER: &str = "car_id,car_type,house_id,start,duration,end,mileage";

/// Column header for the aggregate demand table.
pub const DEMAND_HEADER: &str = "hour,public_kw,home_kw,aggregate_kw";

/// Column header for the per-vehicle demand table.
pub const VEHICLE_DEMAND_HEADER: &str = "car_id,hour,kw";

fn create(path: &Path) -> io::Result<io::BufWriter<File>> {
    Ok(io::BufWriter::new(File::create(path)?))
}

/// Exports trip rows to a CSV file at `path`.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_trips_csv(rows: &[TripRow], path: &Path) -> io::Result<()> {
    write_trips_csv(rows, create(path)?)
}

/// Writes trip rows as CSV to any writer.
///
/// `house_id` is left empty for vehicles synthesized without households.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_trips_csv(rows: &[TripRow], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(TRIPS_HEADER.split(','))?;
    for r in rows {
        wtr.write_record(&[
            r.car_id.to_string(),
            r.car_type.to_string(),
            r.house_id.map(|h| h.to_string()).unwrap_or_default(),
            format!("{:.4}", r.start),
            format!("{:.4}", r.duration),
            format!("{:.4}", r.end),
            format!("{:.4}", r.mileage),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Exports the 24-hour public, home, and aggregate demand to `path`.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_demand_csv(result: &DemandResult, path: &Path) -> io::Result<()> {
    write_demand_csv(result, create(path)?)
}

/// Writes one row per hour of public, home, and aggregate demand.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_demand_csv(result: &DemandResult, writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(DEMAND_HEADER.split(','))?;
    for (hour, aggregate) in result.aggregate.iter() {
        wtr.write_record(&[
            hour.to_string(),
            format!("{:.4}", result.public[hour]),
            format!("{:.4}", result.home[hour]),
            format!("{aggregate:.4}"),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Exports per-vehicle home demand to `path`.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_vehicle_demand_csv(demand: &[VehicleDemand], path: &Path) -> io::Result<()> {
    write_vehicle_demand_csv(demand, create(path)?)
}

/// Writes 24 rows per vehicle, in vehicle order.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_vehicle_demand_csv(demand: &[VehicleDemand], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(VEHICLE_DEMAND_HEADER.split(','))?;
    for v in demand {
        for (hour, kw) in v.schedule.iter() {
            wtr.write_record(&[v.car_id.to_string(), hour.to_string(), format!("{kw:.4}")])?;
        }
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charging::{DemandSchedule, DemandSummary};

    fn row(car_id: u32, house_id: Option<u32>) -> TripRow {
        TripRow {
            car_id,
            car_type: 1,
            house_id,
            start: 7.25,
            duration: 0.5,
            end: 7.75,
            mileage: 12.0,
        }
    }

    fn result() -> DemandResult {
        let mut public = DemandSchedule::new();
        public.set_run(10, 1, 2.0);
        let mut schedule = DemandSchedule::new();
        schedule.set_run(18, 3, 3.3);
        let home = schedule;
        let mut aggregate = public;
        aggregate += &home;
        DemandResult {
            per_vehicle: vec![VehicleDemand {
                car_id: 4,
                car_type: 1,
                house_id: None,
                schedule,
            }],
            public,
            home,
            aggregate,
            events: Vec::new(),
            summary: DemandSummary::from_parts(&aggregate, &[], 1, 1, 1),
        }
    }

    fn lines(buf: Vec<u8>) -> Vec<String> {
        String::from_utf8(buf)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn trip_table_has_header_and_blank_house() {
        let mut buf = Vec::new();
        write_trips_csv(&[row(1, None), row(2, Some(3))], &mut buf).expect("write");
        let lines = lines(buf);
        assert_eq!(lines[0], TRIPS_HEADER);
        assert_eq!(lines[1], "1,1,,7.2500,0.5000,7.7500,12.0000");
        assert_eq!(lines[2], "2,1,3,7.2500,0.5000,7.7500,12.0000");
    }

    #[test]
    fn demand_table_has_24_hours() {
        let mut buf = Vec::new();
        write_demand_csv(&result(), &mut buf).expect("write");
        let lines = lines(buf);
        assert_eq!(lines.len(), 25);
        assert_eq!(lines[0], DEMAND_HEADER);
        assert_eq!(lines[11], "10,2.0000,0.0000,2.0000");
        assert_eq!(lines[19], "18,0.0000,3.3000,3.3000");
    }

    #[test]
    fn vehicle_table_is_parseable() {
        let mut buf = Vec::new();
        write_vehicle_demand_csv(&result().per_vehicle, &mut buf).expect("write");

        let mut rdr = csv::ReaderBuilder::new().from_reader(buf.as_slice());
        let mut total = 0.0;
        let mut rows = 0;
        for record in rdr.records() {
            let rec = record.expect("row parses");
            assert_eq!(&rec[0], "4");
            total += rec[2].parse::<f64>().expect("kw parses");
            rows += 1;
        }
        assert_eq!(rows, 24);
        assert!((total - 9.9).abs() < 1e-9);
    }

    #[test]
    fn deterministic_output() {
        let mut a = Vec::new();
        let mut b = Vec::new();
        write_demand_csv(&result(), &mut a).expect("a");
        write_demand_csv(&result(), &mut b).expect("b");
        assert_eq!(a, b);
    }
}
