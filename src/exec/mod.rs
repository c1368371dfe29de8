// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running job commands with
//! `tokio::process::Command` and feeding their output into the job system.
//!
//! - [`process`] spawns commands with a merged output stream and runs
//!   one-shot status queries.
//! - [`executor`] drives a job's process and detects hand-off to a detached
//!   service unit.
//! - [`monitor`] supervises a detached unit until it settles and decides the
//!   job's verdict.
//! - [`supervisor`] provides the `UnitSupervisor` trait and the systemd
//!   implementation; tests can replace it with a scripted fake.
//! - [`context`] bundles the supervisor with the monitor's timings.

pub mod context;
pub mod executor;
pub mod monitor;
pub mod process;
pub mod supervisor;

pub use context::{ExecutionContext, MonitorSettings};
pub use executor::run_job;
pub use supervisor::{OutcomeDescriptor, SystemdSupervisor, UnitOutcome, UnitState, UnitSupervisor};
