// src/lib.rs

pub mod backend;
pub mod config;
pub mod estimator;
pub mod id;
pub mod job;
pub mod logging;
pub mod models;
mod monitor;
pub mod process;
pub mod registry;
pub mod supervisor;

/// Convenient type alias exposing common structs.
pub mod prelude {
    pub use crate::backend::{BackendSelector, EnvironmentReport, Invocation, PathProbe, ToolKind, ToolProbe};
    pub use crate::config::SupervisorConfig;
    pub use crate::estimator::{ProgressEstimator, SimulatedEstimator};
    pub use crate::job::{ControlError, Job};
    pub use crate::models::{ControlAction, ControlOutcome, JobId, JobInfo, JobStatus, Source};
    pub use crate::registry::JobRegistry;
    pub use crate::supervisor::{SubmitError, Supervisor};
}
