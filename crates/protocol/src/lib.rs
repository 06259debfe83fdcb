//! # ab-protocol
//!
//! Core protocol definitions and data models for autobyte.
//!
//! This crate defines all shared data structures used for:
//! - Configuration file parsing (TOML harness settings, Markdown script catalog)
//! - Runtime job state and captured output
//! - Communication between a front end and the session controller
//!
//! ## Modules
//!
//! - [`catalog_models`]: Script catalog entries
//! - [`config_models`]: Harness settings from config.toml
//! - [`job_models`]: Script jobs, job states and log lines
//! - [`ipc`]: Operations and Events for front end/core communication
//!
//! ## Design Principles
//!
//! - Minimal dependencies: Only serde, ts-rs, chrono and uuid
//! - TypeScript generation: All types derive `TS` for client compatibility
//! - Independent compilation: No dependencies on other autobyte crates

pub mod catalog_models;
pub mod config_models;
pub mod ipc;
pub mod job_models;

// Re-export all public types for convenience
pub use catalog_models::*;
pub use config_models::*;
pub use ipc::*;
pub use job_models::*;
