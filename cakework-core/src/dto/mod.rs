//! Data Transfer Objects for the remote job service
//!
//! Request and response bodies exchanged with the service's HTTP API.
//! Field names follow the service's camelCase convention.

pub mod run;
