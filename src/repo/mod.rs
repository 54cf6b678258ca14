//! Persistence seams of the controller.
//!
//! Each store is a trait so the controller can be run against any backend;
//! the in-memory implementations back the service and the tests.

pub mod alarms;
pub mod consumption;
pub mod programs;
pub mod schedules;

use std::sync::Arc;

pub use alarms::{AlarmAction, AlarmRepository, InMemoryAlarms, ProgramAlarm};
pub use consumption::{effective_load, ConsumptionRepository, InMemoryConsumption, LoadSource};
pub use programs::{InMemoryPrograms, ProgramRepository};
pub use schedules::{InMemorySchedules, ScheduleRepository};

#[derive(Clone)]
pub struct Repositories {
    pub consumption: Arc<dyn ConsumptionRepository>,
    pub programs: Arc<dyn ProgramRepository>,
    pub schedules: Arc<dyn ScheduleRepository>,
    pub alarms: Arc<dyn AlarmRepository>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        Self {
            consumption: Arc::new(InMemoryConsumption::default()),
            programs: Arc::new(InMemoryPrograms::default()),
            schedules: Arc::new(InMemorySchedules::default()),
            alarms: Arc::new(InMemoryAlarms::default()),
        }
    }
}
