//! Charging-demand scheduling for synthesized vehicles.

pub mod profile;
pub mod schedule;
pub mod scheduler;
pub mod summary;

pub use profile::{OccupancyProfiles, OccupancySite};
pub use schedule::{DemandSchedule, HOURS};
pub use scheduler::{
    ChargingEvent, ChargingParams, ChargingScheduler, ChargingSite, DemandResult,
    EnergyConsumption, ScheduleMode, VehicleDemand,
};
pub use summary::DemandSummary;
