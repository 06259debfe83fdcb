//! Script catalog models for `.autobyte/scripts/*.md`.
//!
//! Each catalog file describes one remote script a front end can offer
//! to the user. Entries are Markdown files with YAML front matter.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A remote script the user can launch by name.
///
/// # Example
///
/// ```markdown
/// ---
/// name: disk-cleaner
/// url: https://raw.githubusercontent.com/deep1ne8/misc/main/Scripts/DiskCleaner.ps1
/// args: ["-Quiet"]
/// ---
///
/// Clears temp folders, the recycle bin and Windows Update leftovers.
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
pub struct ScriptEntry {
    /// Unique name used to launch the script.
    pub name: String,

    /// Remote location of the script content.
    pub url: String,

    /// Parameters appended after the staged script path.
    #[serde(default)]
    pub args: Vec<String>,

    /// The Markdown body of the catalog file.
    #[serde(skip)]
    pub description: String,
}
