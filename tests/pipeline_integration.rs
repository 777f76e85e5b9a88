//! End-to-end tests: synthesis from a bank, then charging demand.

mod common;

use rand::{SeedableRng, rngs::StdRng};

use ev_demand_sim::charging::{ChargingScheduler, ChargingSite, ScheduleMode};
use ev_demand_sim::synth::{
    Population, SynthesisOptions, SyntheticTrip, SyntheticVehicle, TripSynthesizer,
};

fn vehicle(car_id: u32, trips: Vec<SyntheticTrip>) -> SyntheticVehicle {
    SyntheticVehicle {
        car_id,
        car_type: 1,
        house_id: None,
        trips,
    }
}

fn trip(start: f64, duration: f64, mileage: f64) -> SyntheticTrip {
    SyntheticTrip {
        start,
        duration,
        mileage,
    }
}

#[test]
fn fitted_bank_synthesizes_valid_trips() {
    let bank = common::fitted_bank();
    let options = SynthesisOptions::default();
    let out = TripSynthesizer::new(&bank, options.clone())
        .synthesize(Population::Vehicles(100), &mut StdRng::seed_from_u64(42))
        .expect("synthesis");

    assert_eq!(out.report.requested_vehicles, 100);
    assert_eq!(
        out.report.vehicles + out.report.skipped_vehicles,
        out.report.requested_vehicles
    );
    for v in &out.vehicles {
        assert!(bank.car_types().any(|ct| ct == v.car_type));
        for pair in v.trips.windows(2) {
            assert!(pair[0].start <= pair[1].start);
            assert!(pair[0].end() < pair[1].start + 1e-12);
        }
        for t in &v.trips {
            assert!((0.0..24.0).contains(&t.start));
            assert!(t.duration > 0.0 && t.mileage > 0.0);
            assert!(t.average_speed() < options.upper_avg_speed);
        }
    }
    assert_eq!(out.rows().len(), out.report.trips);
}

#[test]
fn point_mass_households_tag_every_vehicle() {
    let bank = common::fixed_bank();
    let out = TripSynthesizer::new(&bank, SynthesisOptions::default())
        .synthesize(Population::Households(5), &mut StdRng::seed_from_u64(3))
        .expect("synthesis");

    assert_eq!(out.report.requested_vehicles, 10);
    for v in &out.vehicles {
        let house = v.house_id.expect("household id");
        assert_eq!(house, (v.car_id + 1) / 2);
    }
}

#[test]
fn modest_trip_needs_no_charge() {
    let sched = ChargingScheduler::new(common::fixed_soc_params(), common::sample_profiles());
    let out = sched
        .compute_aggregate_demand(
            &[vehicle(1, vec![trip(8.0, 1.0, 20.0)])],
            true,
            &mut StdRng::seed_from_u64(1),
        )
        .expect("demand");
    assert!(out.events.is_empty());
    assert!(out.aggregate.is_zero());
}

#[test]
fn long_trip_yields_one_contiguous_home_run() {
    let sched = ChargingScheduler::new(common::fixed_soc_params(), common::sample_profiles());
    let out = sched
        .compute_aggregate_demand(
            &[vehicle(1, vec![trip(8.0, 1.0, 90.0)])],
            true,
            &mut StdRng::seed_from_u64(1),
        )
        .expect("demand");

    assert_eq!(out.events.len(), 1);
    let event = out.events[0];
    assert_eq!(event.site, ChargingSite::Home);

    let run = (event.site_power_kw / 3.3).round() as usize;
    let lit: Vec<usize> = (0..24)
        .map(|i| (event.start_hour + i) % 24)
        .take_while(|&h| out.per_vehicle[0].schedule[h] > 0.0)
        .collect();
    assert_eq!(lit.len(), run);
    let nonzero = out.per_vehicle[0]
        .schedule
        .iter()
        .filter(|(_, v)| *v > 0.0)
        .count();
    assert_eq!(nonzero, run, "run is the only demand");
}

#[test]
fn fleet_demand_is_non_negative_and_additive() {
    let bank = common::fixed_bank();
    let synth = TripSynthesizer::new(&bank, SynthesisOptions::default())
        .synthesize(Population::Households(30), &mut StdRng::seed_from_u64(8))
        .expect("synthesis");

    let sched = ChargingScheduler::new(
        ev_demand_sim::charging::ChargingParams::default(),
        common::sample_profiles(),
    );
    let out = sched
        .compute_aggregate_demand(&synth.vehicles, true, &mut StdRng::seed_from_u64(9))
        .expect("demand");

    let mut home_sum = [0.0; 24];
    for v in &out.per_vehicle {
        for (h, kw) in v.schedule.iter() {
            assert!(kw >= 0.0);
            home_sum[h] += kw;
        }
    }
    for (h, agg) in out.aggregate.iter() {
        assert!((out.home[h] - home_sum[h]).abs() < 1e-9);
        assert!((agg - out.public[h] - out.home[h]).abs() < 1e-9);
    }
    assert_eq!(
        out.summary.home_events + out.summary.public_events + out.summary.no_charge_trips,
        synth.report.trips
    );
}

#[test]
fn occupancy_mode_only_marks_hours() {
    let bank = common::fixed_bank();
    let synth = TripSynthesizer::new(&bank, SynthesisOptions::default())
        .synthesize(Population::Vehicles(40), &mut StdRng::seed_from_u64(12))
        .expect("synthesis");
    let params = ev_demand_sim::charging::ChargingParams {
        schedule_mode: ScheduleMode::Occupancy,
        ..ev_demand_sim::charging::ChargingParams::default()
    };
    let out = ChargingScheduler::new(params, common::sample_profiles())
        .compute_aggregate_demand(&synth.vehicles, false, &mut StdRng::seed_from_u64(12))
        .expect("demand");
    for v in &out.per_vehicle {
        assert!(v.schedule.iter().all(|(_, x)| x == 0.0 || x == 1.0));
    }
}

#[test]
fn same_seeds_reproduce_demand() {
    let bank = common::fixed_bank();
    let sched = ChargingScheduler::new(common::fixed_soc_params(), common::sample_profiles());
    let run = |seed: u64| {
        let synth = TripSynthesizer::new(&bank, SynthesisOptions::default())
            .synthesize(Population::Vehicles(20), &mut StdRng::seed_from_u64(seed))
            .expect("synthesis");
        sched
            .compute_aggregate_demand(&synth.vehicles, true, &mut StdRng::seed_from_u64(seed + 1))
            .expect("demand")
            .aggregate
    };
    assert_eq!(run(5), run(5));
}
