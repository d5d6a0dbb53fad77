pub mod classify;
pub mod log;
pub mod sample;
pub mod store;

pub use classify::{BreathingBand, HrWindow, SleepState, TempComfort};
pub use log::{LiveFile, SessionLog};
pub use sample::VitalsSample;
pub use store::VitalsStore;
