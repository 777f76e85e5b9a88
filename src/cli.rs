//! Command-line parsing for the `ev-demand-sim` binary.

use std::env;
use std::path::PathBuf;

use crate::config::ScenarioConfig;

/// Parsed CLI arguments.
#[derive(Debug, Default, PartialEq)]
pub struct CliOptions {
    pub scenario: Option<PathBuf>,
    pub preset: Option<String>,
    pub seed: Option<u64>,
    /// Refit from the trip CSV and persist, instead of restoring.
    pub fit: bool,
    pub vehicles: Option<usize>,
    pub households: Option<usize>,
    pub weekend: bool,
    pub model_dir: Option<PathBuf>,
    pub trips_out: Option<PathBuf>,
    pub demand_out: Option<PathBuf>,
    pub vehicle_demand_out: Option<PathBuf>,
}

#[derive(Debug, PartialEq)]
pub enum Command {
    Run(CliOptions),
    Help,
}

impl CliOptions {
    /// Loads the selected scenario, defaulting to the baseline preset.
    ///
    /// # Errors
    ///
    /// Returns the config error message if the scenario cannot be loaded.
    pub fn load_scenario(&self) -> Result<ScenarioConfig, String> {
        let cfg = match (&self.scenario, &self.preset) {
            (Some(path), _) => ScenarioConfig::from_toml_file(path),
            (None, Some(name)) => ScenarioConfig::from_preset(name),
            (None, None) => Ok(ScenarioConfig::baseline()),
        };
        let mut cfg = cfg.map_err(|e| e.to_string())?;
        self.apply(&mut cfg);
        Ok(cfg)
    }

    /// Applies command-line overrides on top of a scenario.
    pub fn apply(&self, cfg: &mut ScenarioConfig) {
        if let Some(seed) = self.seed {
            cfg.synthesis.seed = seed;
        }
        if let Some(n) = self.vehicles {
            cfg.synthesis.vehicles = n;
            cfg.synthesis.households = None;
        }
        if let Some(n) = self.households {
            cfg.synthesis.households = Some(n);
        }
        if self.weekend {
            cfg.charging.weekday = false;
        }
        if let Some(dir) = &self.model_dir {
            cfg.paths.model_dir = dir.clone();
        }
    }
}

pub fn parse_args() -> Result<Command, String> {
    let args: Vec<String> = env::args().skip(1).collect();
    parse_args_from(args)
}

pub fn parse_args_from(args: Vec<String>) -> Result<Command, String> {
    if args.iter().any(|a| a == "--help" || a == "-h") {
        return Ok(Command::Help);
    }
    parse_options(&args).map(Command::Run)
}

fn set_once<T>(slot: &mut Option<T>, value: T, flag: &str) -> Result<(), String> {
    if slot.replace(value).is_some() {
        return Err(format!("{flag} provided more than once"));
    }
    Ok(())
}

fn parse_number<T: std::str::FromStr>(value: &str, flag: &str, kind: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("{flag} value \"{value}\" is not a valid {kind}"))
}

fn parse_options(args: &[String]) -> Result<CliOptions, String> {
    let mut i = 0usize;
    let mut opts = CliOptions::default();

    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--fit" => opts.fit = true,
            "--weekend" => opts.weekend = true,
            "--scenario" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --scenario (expected a TOML file path)")?;
                set_once(&mut opts.scenario, PathBuf::from(path), flag)?;
            }
            "--preset" => {
                i += 1;
                let name = args.next_or_err(i, "missing value for --preset (expected a preset name)")?;
                set_once(&mut opts.preset, name.to_string(), flag)?;
            }
            "--seed" => {
                i += 1;
                let v = args.next_or_err(i, "missing value for --seed (expected a u64)")?;
                set_once(&mut opts.seed, parse_number(v, flag, "u64")?, flag)?;
            }
            "--vehicles" => {
                i += 1;
                let v = args.next_or_err(i, "missing value for --vehicles (expected a count)")?;
                set_once(&mut opts.vehicles, parse_number(v, flag, "count")?, flag)?;
            }
            "--households" => {
                i += 1;
                let v = args.next_or_err(i, "missing value for --households (expected a count)")?;
                set_once(&mut opts.households, parse_number(v, flag, "count")?, flag)?;
            }
            "--model-dir" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --model-dir (expected a directory)")?;
                set_once(&mut opts.model_dir, PathBuf::from(path), flag)?;
            }
            "--trips-out" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --trips-out (expected a file path)")?;
                set_once(&mut opts.trips_out, PathBuf::from(path), flag)?;
            }
            "--demand-out" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --demand-out (expected a file path)")?;
                set_once(&mut opts.demand_out, PathBuf::from(path), flag)?;
            }
            "--vehicle-demand-out" => {
                i += 1;
                let path = args.next_or_err(
                    i,
                    "missing value for --vehicle-demand-out (expected a file path)",
                )?;
                set_once(&mut opts.vehicle_demand_out, PathBuf::from(path), flag)?;
            }
            other => return Err(format!("unknown argument: {other}")),
        }
        i += 1;
    }

    if opts.scenario.is_some() && opts.preset.is_some() {
        return Err(
            "arguments `--scenario` and `--preset` are mutually exclusive; choose one source"
                .to_string(),
        );
    }
    if opts.vehicles.is_some() && opts.households.is_some() {
        return Err("arguments `--vehicles` and `--households` are mutually exclusive".to_string());
    }

    Ok(opts)
}

trait SliceArgExt {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String>;
}

impl SliceArgExt for [String] {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String> {
        self.get(index)
            .map(String::as_str)
            .ok_or_else(|| err.to_string())
    }
}

pub fn print_usage() {
    eprintln!("ev-demand-sim: synthetic EV trips and 24-hour charging demand");
    eprintln!();
    eprintln!("Usage: ev-demand-sim [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --scenario <path>             Load scenario from TOML config file");
    eprintln!(
        "  --preset <name>               Use a built-in preset ({})",
        ScenarioConfig::PRESETS.join(", ")
    );
    eprintln!("  --seed <u64>                  Override random seed");
    eprintln!("  --fit                         Refit distributions from the trip CSV and persist them");
    eprintln!("  --vehicles <n>                Synthesize n vehicles");
    eprintln!("  --households <n>              Synthesize n households");
    eprintln!("  --weekend                     Use weekend occupancy curves");
    eprintln!("  --model-dir <path>            Directory of persisted distributions");
    eprintln!("  --trips-out <path>            Export synthesized trips to CSV");
    eprintln!("  --demand-out <path>           Export hourly demand to CSV");
    eprintln!("  --vehicle-demand-out <path>   Export per-vehicle demand to CSV");
    eprintln!("  --help                        Show this help message");
    eprintln!();
    eprintln!("If no --scenario or --preset is given, the baseline preset is used.");
}
