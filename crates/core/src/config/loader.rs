//! Configuration file loader for the `.autobyte/` directory structure.
//!
//! This module provides functionality to load and parse all configuration files
//! from the `.autobyte/` directory, including:
//! - `config.toml`: Harness settings
//! - `scripts/*.md`: Script catalog entries with YAML front matter

use crate::config::error::ConfigError;
use crate::config::error::ConfigResult;
use crate::config::models::AppConfig;
use ab_protocol::catalog_models::ScriptEntry;
use ab_protocol::config_models::HarnessConfig;
use gray_matter::engine::YAML;
use gray_matter::Matter;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Name of the project configuration directory.
pub const CONFIG_DIR: &str = ".autobyte";

/// Loads all configuration from the `.autobyte/` directory.
///
/// # Arguments
///
/// * `root` - Root directory containing the `.autobyte/` folder
///
/// # Returns
///
/// An `AppConfig` containing all loaded configuration. If the directory or
/// individual files are missing, the corresponding defaults are used.
///
/// # Errors
///
/// Returns `ConfigError` if:
/// - Files exist but cannot be read
/// - Files have invalid syntax (TOML or Markdown front matter)
/// - Two catalog entries share a name, or an entry has an empty URL
///
/// # Example
///
/// ```rust,no_run
/// use ab_core::config::loader::load_config;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new(".")).await?;
/// println!("Loaded {} scripts", config.scripts.len());
/// # Ok(())
/// # }
/// ```
pub async fn load_config(root: &Path) -> ConfigResult<AppConfig> {
    let ab_dir = root.join(CONFIG_DIR);

    if !ab_dir.exists() {
        tracing::debug!(dir = %ab_dir.display(), "no config directory, using defaults");
        return Ok(AppConfig::default());
    }

    let harness = load_harness_config(&ab_dir)?;
    let scripts = load_scripts(&ab_dir)?;
    tracing::debug!(scripts = scripts.len(), "configuration loaded");

    Ok(AppConfig { harness, scripts })
}

/// Walk up from `start` to the first directory containing `.autobyte/`.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(CONFIG_DIR).is_dir())
        .map(Path::to_path_buf)
}

/// Loads harness settings from `config.toml`.
fn load_harness_config(ab_dir: &Path) -> ConfigResult<HarnessConfig> {
    let config_path = ab_dir.join("config.toml");

    if !config_path.exists() {
        return Ok(HarnessConfig::default());
    }

    let content =
        std::fs::read_to_string(&config_path).map_err(|source| ConfigError::FileRead {
            path: config_path.clone(),
            source,
        })?;

    let config: HarnessConfig =
        toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
            path: config_path.clone(),
            source,
        })?;

    if config.fetch.timeout_secs == 0 {
        return Err(ConfigError::InvalidConfig {
            path: config_path,
            reason: "fetch.timeout_secs must be greater than zero".to_string(),
        });
    }

    Ok(config)
}

/// Loads all catalog entries from `scripts/*.md`.
fn load_scripts(ab_dir: &Path) -> ConfigResult<Vec<ScriptEntry>> {
    let scripts_dir = ab_dir.join("scripts");

    if !scripts_dir.exists() {
        return Ok(Vec::new());
    }

    let mut scripts = Vec::new();
    let mut seen = HashSet::new();

    for entry in WalkDir::new(&scripts_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
    {
        let entry = entry.map_err(|source| ConfigError::DirectoryWalk {
            path: scripts_dir.clone(),
            source,
        })?;

        let path = entry.path();

        if path.extension().and_then(|s| s.to_str()) != Some("md") {
            continue;
        }

        let script = parse_script_entry(path)?;

        if !seen.insert(script.name.to_ascii_lowercase()) {
            return Err(ConfigError::InvalidConfig {
                path: path.to_path_buf(),
                reason: format!("duplicate script name '{}'", script.name),
            });
        }

        scripts.push(script);
    }

    scripts.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(scripts)
}

fn parse_script_entry(path: &Path) -> ConfigResult<ScriptEntry> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    let matter = Matter::<YAML>::new();
    let result = matter.parse(&content);

    let mut script: ScriptEntry = result
        .data
        .ok_or_else(|| ConfigError::MarkdownParse {
            path: path.to_path_buf(),
            reason: "Missing YAML front matter".to_string(),
        })?
        .deserialize()
        .map_err(|e| ConfigError::MarkdownParse {
            path: path.to_path_buf(),
            reason: format!("Failed to deserialize front matter: {e}"),
        })?;

    if script.url.trim().is_empty() {
        return Err(ConfigError::InvalidConfig {
            path: path.to_path_buf(),
            reason: format!("script '{}' has an empty url", script.name),
        });
    }

    script.description = result.content.trim().to_string();
    Ok(script)
}
