//! Core domain types
//!
//! This module contains the structures shared by the client library and the
//! CLI. They describe runs as the remote service reports them; the service
//! owns every run and the client only ever reads them.

pub mod job;
pub mod parameters;
pub mod run;

pub use job::{JobId, JobStatus, ParseStatusError};
pub use parameters::{Parameters, ParametersError};
pub use run::{Compute, Run, RunOutput};
