//! Cakework Core
//!
//! Core types for the Cakework job client.
//!
//! This crate contains:
//! - Domain types: jobs, their status state machine, runs and parameters
//! - DTOs: request/response bodies of the remote service API
//! - Tasks: strongly typed requests for tasks with a known parameter schema

pub mod domain;
pub mod dto;
pub mod task;
