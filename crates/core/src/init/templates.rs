//! Embedded template files for `.autobyte` initialization.
//!
//! The workspace `templates/` directory is compiled into the binary with
//! `rust-embed`, so `autobyte init` needs nothing on disk.

use rust_embed::RustEmbed;

/// Embedded template files from the workspace `templates/` directory.
///
/// With the `debug-embed` feature the files are still embedded in debug
/// builds, so tests see the same content as release binaries.
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/../../templates"]
pub struct TemplateAssets;

/// Get template file content by path.
///
/// # Arguments
/// * `path` - Relative path from templates root (e.g., "config.toml", "scripts/disk-cleaner.md")
///
/// # Example
/// ```
/// use ab_core::init::templates::get_template;
///
/// let config = get_template("config.toml").expect("config.toml should exist");
/// assert!(config.contains("[fetch]"));
/// ```
pub fn get_template(path: &str) -> Option<String> {
    TemplateAssets::get(path).map(|file| String::from_utf8_lossy(file.data.as_ref()).to_string())
}

/// List all template files under `prefix`, sorted.
pub fn list_templates(prefix: &str) -> Vec<String> {
    let mut paths: Vec<String> = TemplateAssets::iter()
        .filter(|path| path.starts_with(prefix))
        .map(|path| path.to_string())
        .collect();
    paths.sort();
    paths
}
