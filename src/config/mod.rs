// src/config/mod.rs

//! Configuration loading and validation for jobctl.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate and convert it into runtime settings (`validate.rs`).

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, resolve};
pub use model::{CommandsSection, ConfigFile, RawConfigFile, RawMonitorSection, SupervisorSection};
