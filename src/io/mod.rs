//! Output writers.

pub mod export;
