//! Configuration models that aggregate all settings.
//!
//! This module provides the unified `AppConfig` structure that combines
//! harness settings and the script catalog into a single object.

use ab_protocol::catalog_models::ScriptEntry;
use ab_protocol::config_models::HarnessConfig;

/// Unified application configuration loaded from the `.autobyte/` directory.
///
/// This structure aggregates all configuration sources:
/// - `config.toml`: Harness settings
/// - `scripts/*.md`: Script catalog
///
/// # Example
///
/// ```rust,no_run
/// use ab_core::config::loader::load_config;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new(".")).await?;
/// println!("{} scripts, fetch timeout {}s",
///          config.scripts.len(),
///          config.harness.fetch.timeout_secs);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Settings from `config.toml`.
    pub harness: HarnessConfig,

    /// Catalog entries from `scripts/*.md`, sorted by name.
    pub scripts: Vec<ScriptEntry>,
}

impl AppConfig {
    /// Find a catalog entry by name, ignoring ASCII case.
    pub fn find_script(&self, name: &str) -> Option<&ScriptEntry> {
        self.scripts
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_script_ignores_case() {
        let config = AppConfig {
            harness: HarnessConfig::default(),
            scripts: vec![ScriptEntry {
                name: "disk-cleaner".to_string(),
                url: "https://example.com/DiskCleaner.ps1".to_string(),
                args: vec![],
                description: String::new(),
            }],
        };

        assert!(config.find_script("Disk-Cleaner").is_some());
        assert!(config.find_script("missing").is_none());
    }
}
