//! # ab-core
//!
//! Fetch, stage, run and relay remote scripts, one job at a time.
//!
//! A job moves through `Downloading → Staged → Running` and ends in
//! `Completed`, `Failed` or `Cancelled`. Every line the script prints, and
//! every status line the harness adds, is relayed to subscribers in order.
//!
//! ## Modules
//!
//! - [`fetch`]: Downloading script content over HTTPS
//! - [`staging`]: Writing scripts to uniquely named temp files and removing them
//! - [`runner`]: Launching the interpreter and streaming its output
//! - [`relay`]: Fan-out of job events to listeners
//! - [`session`]: The single-flight controller that ties the above together
//! - [`config`]: Loading `.autobyte/` configuration and the script catalog
//! - [`init`]: Generating a starter `.autobyte/` directory

pub mod config;
pub mod fetch;
pub mod init;
pub mod relay;
pub mod runner;
pub mod session;
pub mod staging;
