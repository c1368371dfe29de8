// src/jobs/mod.rs

//! Job system: records, status lifecycle, log fan-out and the registry.
//!
//! Provides:
//! - `JobRegistry`: creates jobs, starts their executors, answers lookups
//! - `JobRecord` / `JobWriter`: per-job state and its single writer
//! - `Subscription`: history snapshot plus live log stream
//! - `JobStatus`, `JobSnapshot`, `JobId`: shared types

pub mod broadcast;
pub mod record;
pub mod registry;
pub mod types;

pub use broadcast::{LogEvent, SubscriberId, Subscription};
pub use record::{JobRecord, JobWriter};
pub use registry::JobRegistry;
pub use types::{JobId, JobSnapshot, JobStatus};
