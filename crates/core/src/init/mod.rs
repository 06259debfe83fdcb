//! Initialization module for creating `.autobyte` directory structures.
//!
//! `autobyte init` writes a `.autobyte/` directory holding:
//! - Harness configuration (`config.toml`)
//! - The script catalog (`scripts/*.md`)
//!
//! # Example
//!
//! ```no_run
//! use ab_core::init::{InitOptions, generate_autobyte_structure};
//! use std::path::PathBuf;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = InitOptions {
//!     target_dir: PathBuf::from("."),
//!     force: false,
//!     minimal: false,
//! };
//!
//! generate_autobyte_structure(options).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod generator;
pub mod templates;

pub use error::{InitError, InitResult};
pub use generator::{generate_autobyte_structure, InitOptions};
pub use templates::{get_template, list_templates};
