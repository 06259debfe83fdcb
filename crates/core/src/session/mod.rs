//! Session control for remote script jobs.
//!
//! This module provides:
//! - The job state machine ([`job`])
//! - The single-flight [`SessionController`] that drives jobs end to end

pub mod controller;
pub mod job;

pub use controller::{SessionController, SessionError, SessionOptions};
