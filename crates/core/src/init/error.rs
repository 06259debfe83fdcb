//! Errors raised while writing a starter `.autobyte/` directory.

use crate::config::error::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

pub type InitResult<T> = Result<T, InitError>;

#[derive(Debug, Error)]
pub enum InitError {
    #[error("{0:?} already exists. Run `autobyte init --force` to overwrite its config and catalog.")]
    DirectoryExists(PathBuf),

    /// Something other than a directory sits where `.autobyte` should go.
    #[error("{0:?} exists but is not a directory")]
    NotADirectory(PathBuf),

    /// An embedded template is missing from the binary.
    #[error("Embedded template missing: {0}")]
    TemplateNotFound(String),

    #[error("Failed to create directory {path:?}: {source}")]
    DirectoryCreate {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file {path:?}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The written files do not load, usually because `--force` kept a
    /// catalog entry that clashes with a default one.
    #[error("Catalog in {dir:?} does not load after init: {source}")]
    CatalogInvalid {
        dir: PathBuf,
        #[source]
        source: ConfigError,
    },
}
