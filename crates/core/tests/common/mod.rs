//! Common test utilities shared by the integration tests.
//!
//! - Test fixtures (controller harness, sample projects)
//! - Custom assertions over relayed events
//! - In-memory script sources

pub mod assertions;
pub mod fixtures;
pub mod mock_sources;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use mock_sources::*;
