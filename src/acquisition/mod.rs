pub mod controller;
mod loop_worker;
pub mod state;

pub use controller::AcquisitionController;
pub use state::{AcquisitionState, RunState};
