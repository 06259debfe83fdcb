//! Directory structure and file generation for `.autobyte` initialization.

use super::error::{InitError, InitResult};
use super::templates::{get_template, list_templates};
use crate::config::loader::{load_config, CONFIG_DIR};
use std::fs;
use std::path::{Path, PathBuf};

/// Script entry written when `minimal` is set.
const MINIMAL_SCRIPT: &str = "scripts/check-drive-space.md";

/// Options for initializing a `.autobyte` directory.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// Target directory where `.autobyte` will be created.
    pub target_dir: PathBuf,

    /// Overwrite existing `.autobyte` directory if it exists.
    pub force: bool,

    /// Write only the config and a single script entry.
    pub minimal: bool,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            target_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            force: false,
            minimal: false,
        }
    }
}

/// Generate a `.autobyte` directory with the default catalog.
///
/// This function creates the following structure:
/// ```text
/// .autobyte/
/// ├── config.toml
/// └── scripts/
///     ├── check-drive-space.md
///     └── ... (unless minimal)
/// ```
///
/// # Arguments
/// * `options` - Configuration for the initialization process
///
/// # Returns
/// The paths of every file written, or an `InitError` if:
/// - The `.autobyte` directory already exists (without force flag)
/// - `.autobyte` is a file
/// - A template file cannot be found
/// - File system operations fail
/// - The resulting catalog does not load, e.g. a kept entry clashes by name
pub async fn generate_autobyte_structure(options: InitOptions) -> InitResult<Vec<PathBuf>> {
    let ab_dir = options.target_dir.join(CONFIG_DIR);

    if ab_dir.exists() {
        if !ab_dir.is_dir() {
            return Err(InitError::NotADirectory(ab_dir));
        }
        if !options.force {
            return Err(InitError::DirectoryExists(ab_dir));
        }
    }

    let scripts_dir = ab_dir.join("scripts");
    fs::create_dir_all(&scripts_dir).map_err(|source| InitError::DirectoryCreate {
        path: scripts_dir.clone(),
        source,
    })?;

    let mut written = vec![write_template_file(&ab_dir, "config.toml")?];

    let scripts = if options.minimal {
        vec![MINIMAL_SCRIPT.to_string()]
    } else {
        list_templates("scripts/")
    };
    for script in scripts {
        written.push(write_template_file(&ab_dir, &script)?);
    }

    load_config(&options.target_dir)
        .await
        .map_err(|source| InitError::CatalogInvalid {
            dir: ab_dir.clone(),
            source,
        })?;

    tracing::info!(dir = %ab_dir.display(), files = written.len(), "initialized project");
    Ok(written)
}

/// Write one embedded template below `ab_dir`, returning the target path.
fn write_template_file(ab_dir: &Path, template_path: &str) -> InitResult<PathBuf> {
    let content = get_template(template_path)
        .ok_or_else(|| InitError::TemplateNotFound(template_path.to_string()))?;

    let target_path = ab_dir.join(template_path);

    if let Some(parent) = target_path.parent() {
        fs::create_dir_all(parent).map_err(|source| InitError::DirectoryCreate {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    fs::write(&target_path, content).map_err(|source| InitError::FileWrite {
        path: target_path.clone(),
        source,
    })?;

    Ok(target_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_generate_structure_success() {
        let dir = tempdir().unwrap();
        let options = InitOptions {
            target_dir: dir.path().to_path_buf(),
            force: false,
            minimal: false,
        };

        let written = generate_autobyte_structure(options).await;
        assert!(written.is_ok(), "Failed: {:?}", written.err());
        assert_eq!(written.unwrap().len(), 14);

        let ab_dir = dir.path().join(CONFIG_DIR);
        assert!(ab_dir.join("config.toml").exists());
        assert!(ab_dir.join("scripts/disk-cleaner.md").exists());
        assert!(ab_dir.join("scripts/monitor-troubleshooter.md").exists());
    }

    /// Whatever init writes must load back cleanly.
    #[tokio::test]
    async fn test_generated_structure_loads() {
        let dir = tempdir().unwrap();
        generate_autobyte_structure(InitOptions {
            target_dir: dir.path().to_path_buf(),
            force: false,
            minimal: false,
        })
        .await
        .unwrap();

        let config = load_config(dir.path()).await.expect("generated config should load");
        assert_eq!(config.scripts.len(), 13);
        assert!(config.find_script("Internet-Speed-Test").is_some());
        assert!(config
            .scripts
            .iter()
            .all(|s| s.url.starts_with("https://raw.githubusercontent.com/")));
    }

    #[tokio::test]
    async fn test_generate_structure_minimal() {
        let dir = tempdir().unwrap();
        let options = InitOptions {
            target_dir: dir.path().to_path_buf(),
            force: false,
            minimal: true,
        };

        generate_autobyte_structure(options).await.unwrap();

        let ab_dir = dir.path().join(CONFIG_DIR);
        assert!(ab_dir.join("config.toml").exists());
        assert!(ab_dir.join(MINIMAL_SCRIPT).exists());
        assert!(
            !ab_dir.join("scripts/disk-cleaner.md").exists(),
            "minimal mode should write a single script"
        );
    }

    #[tokio::test]
    async fn test_generate_structure_exists_without_force() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(CONFIG_DIR)).unwrap();

        let options = InitOptions {
            target_dir: dir.path().to_path_buf(),
            force: false,
            minimal: false,
        };

        let result = generate_autobyte_structure(options).await;
        assert!(matches!(result, Err(InitError::DirectoryExists(_))));
    }

    #[tokio::test]
    async fn test_generate_structure_exists_with_force() {
        let dir = tempdir().unwrap();
        let ab_dir = dir.path().join(CONFIG_DIR);
        fs::create_dir_all(&ab_dir).unwrap();
        fs::write(ab_dir.join("config.toml"), "broken = [").unwrap();

        let options = InitOptions {
            target_dir: dir.path().to_path_buf(),
            force: true,
            minimal: true,
        };

        generate_autobyte_structure(options)
            .await
            .expect("Should succeed with force flag");

        let config = fs::read_to_string(ab_dir.join("config.toml")).unwrap();
        assert!(config.contains("[fetch]"), "config.toml should be overwritten");
    }

    #[tokio::test]
    async fn test_force_reports_clashing_kept_entry() {
        let dir = tempdir().unwrap();
        let scripts = dir.path().join(CONFIG_DIR).join("scripts");
        fs::create_dir_all(&scripts).unwrap();
        fs::write(
            scripts.join("my-cleaner.md"),
            "---\nname: Disk-Cleaner\nurl: https://example.com/mine.ps1\n---\nMine.",
        )
        .unwrap();

        let result = generate_autobyte_structure(InitOptions {
            target_dir: dir.path().to_path_buf(),
            force: true,
            minimal: false,
        })
        .await;

        match result {
            Err(InitError::CatalogInvalid { source, .. }) => {
                assert!(source.to_string().contains("duplicate"), "{source}")
            }
            other => panic!("Expected CatalogInvalid, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_config_dir_that_is_a_file_is_rejected() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_DIR), "not a directory").unwrap();

        let result = generate_autobyte_structure(InitOptions {
            target_dir: dir.path().to_path_buf(),
            force: true,
            minimal: true,
        })
        .await;

        assert!(matches!(result, Err(InitError::NotADirectory(_))));
    }

    #[test]
    fn test_default_init_options() {
        let options = InitOptions::default();
        assert!(!options.force);
        assert!(!options.minimal);
    }
}
