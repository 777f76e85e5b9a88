//! Synthetic EV trips and 24-hour charging demand.
//!
//! Fits distributions to historical trips ([`bank`]), samples synthetic
//! vehicles from them ([`synth`]), and turns their trips into hourly
//! charging schedules ([`charging`]).

pub mod bank;
pub mod charging;
pub mod cli;
pub mod config;
pub mod dist;
pub mod error;
pub mod io;
pub mod synth;
pub mod telemetry;
pub mod trips;

pub use error::{Error, Result};
