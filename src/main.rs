//! EV demand simulator entry point: CLI wiring and config-driven pipeline.

use std::process;

use rand::{SeedableRng, rngs::StdRng};

use ev_demand_sim::bank::DistributionBank;
use ev_demand_sim::charging::{ChargingScheduler, OccupancyProfiles};
use ev_demand_sim::cli::{self, CliOptions, Command};
use ev_demand_sim::config::ScenarioConfig;
use ev_demand_sim::error::{Error, Result};
use ev_demand_sim::io::export::{export_demand_csv, export_trips_csv, export_vehicle_demand_csv};
use ev_demand_sim::synth::TripSynthesizer;
use ev_demand_sim::telemetry::init_tracing;
use ev_demand_sim::trips::TripDataset;

/// Seed offset for the charging RNG so it does not replay the synthesis stream.
const CHARGING_SEED_OFFSET: u64 = 57;

/// Fits a fresh bank and persists it, or restores the persisted one.
fn load_bank(cfg: &ScenarioConfig, fit: bool) -> Result<DistributionBank> {
    let model_dir = &cfg.paths.model_dir;
    if fit {
        let dataset = TripDataset::from_csv_path(&cfg.paths.trips_csv)?;
        let bank = DistributionBank::fit_all(&dataset, &cfg.fit_options())?;
        bank.persist_all(model_dir)?;
        Ok(bank)
    } else {
        DistributionBank::restore_all(model_dir)
    }
}

fn run(cfg: &ScenarioConfig, opts: &CliOptions) -> Result<()> {
    let bank = load_bank(cfg, opts.fit)?;

    let seed = cfg.synthesis.seed;
    let mut synth_rng = StdRng::seed_from_u64(seed);
    let synthesizer = TripSynthesizer::new(&bank, cfg.synthesis_options());
    let output = synthesizer.synthesize(cfg.population(), &mut synth_rng)?;

    let profiles = OccupancyProfiles::from_csv_path(&cfg.paths.profiles_csv)?;
    let scheduler = ChargingScheduler::new(cfg.charging_params(), profiles);
    let mut charge_rng = StdRng::seed_from_u64(seed.wrapping_add(CHARGING_SEED_OFFSET));
    let demand =
        scheduler.compute_aggregate_demand(&output.vehicles, cfg.charging.weekday, &mut charge_rng)?;

    let r = &output.report;
    println!(
        "Synthesized {} of {} vehicles, {} trips ({} vehicles and {} trips skipped)",
        r.vehicles, r.requested_vehicles, r.trips, r.skipped_vehicles, r.skipped_trips
    );
    println!();
    println!("{}", demand.summary);

    if let Some(path) = &opts.trips_out {
        export_trips_csv(&output.rows(), path).map_err(|e| Error::io(path, e))?;
        eprintln!("Trips written to {}", path.display());
    }
    if let Some(path) = &opts.demand_out {
        export_demand_csv(&demand, path).map_err(|e| Error::io(path, e))?;
        eprintln!("Demand written to {}", path.display());
    }
    if let Some(path) = &opts.vehicle_demand_out {
        export_vehicle_demand_csv(&demand.per_vehicle, path).map_err(|e| Error::io(path, e))?;
        eprintln!("Per-vehicle demand written to {}", path.display());
    }
    Ok(())
}

fn main() {
    let opts = match cli::parse_args() {
        Ok(Command::Run(opts)) => opts,
        Ok(Command::Help) => {
            cli::print_usage();
            process::exit(0);
        }
        Err(e) => {
            eprintln!("error: {e}");
            cli::print_usage();
            process::exit(1);
        }
    };

    init_tracing();

    let scenario = match opts.load_scenario() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    let errors = scenario.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    if let Err(e) = run(&scenario, &opts) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
