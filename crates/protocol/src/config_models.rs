//! Harness configuration models for `.autobyte/config.toml`.
//!
//! Every field has a default, so an empty or missing file yields a
//! working configuration for the current platform.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Represents all settings from `.autobyte/config.toml`.
///
/// # Example
///
/// ```toml
/// # .autobyte/config.toml
/// [fetch]
/// timeout_secs = 30
/// https_only = true
///
/// [runner]
/// program = "pwsh"
/// args = ["-NoProfile", "-File"]
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, TS)]
pub struct HarnessConfig {
    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub staging: StagingConfig,

    #[serde(default)]
    pub runner: RunnerConfig,

    #[serde(default)]
    pub session: SessionConfig,
}

/// Settings for downloading script content.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(default)]
pub struct FetchConfig {
    /// Hard limit for a single download, in seconds.
    pub timeout_secs: u64,

    /// Reject `http://` sources.
    pub https_only: bool,

    /// Value of the `User-Agent` header sent with every request.
    pub user_agent: String,

    /// Header carrying an API key, e.g. `X-Api-Key`.
    pub api_key_header: Option<String>,

    /// Environment variable the API key is read from.
    pub api_key_env: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            https_only: true,
            user_agent: default_user_agent(),
            api_key_header: None,
            api_key_env: None,
        }
    }
}

/// `autobyte/<version>`.
pub fn default_user_agent() -> String {
    format!("autobyte/{}", env!("CARGO_PKG_VERSION"))
}

/// Settings for writing fetched scripts to disk.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(default)]
pub struct StagingConfig {
    /// Name of the subdirectory created under the OS temp directory.
    pub dir_name: String,

    /// File extension given to staged scripts, without the dot.
    pub extension: String,

    /// Text written in front of every staged script. Defaults to
    /// [`READ_HOST_PRELUDE`] on Windows; an empty string disables it.
    pub prelude: Option<String>,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            dir_name: "autobyte".to_string(),
            extension: if cfg!(windows) { "ps1" } else { "sh" }.to_string(),
            prelude: cfg!(windows).then(|| READ_HOST_PRELUDE.to_string()),
        }
    }
}

/// PowerShell prelude that answers `Read-Host` from the redirected stdin.
///
/// Without it `Read-Host` reads the console, which a piped child does not
/// have, so input sent to the job never reaches the prompt.
pub const READ_HOST_PRELUDE: &str = r#"# Redirect Read-Host to stdin pipe
if (Get-Command Read-Host -ErrorAction SilentlyContinue) {
    Remove-Item Function:\Read-Host -ErrorAction SilentlyContinue
}
function Read-Host {
    param([string]$prompt="")
    Write-Host $prompt -NoNewline
    return [Console]::In.ReadLine()
}
"#;

/// Settings for the interpreter process.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(default)]
pub struct RunnerConfig {
    /// Interpreter executable.
    pub program: String,

    /// Arguments placed before the staged script path.
    pub args: Vec<String>,

    /// Kill the script after this many seconds. Unset means no limit.
    pub job_timeout_secs: Option<u64>,

    /// After a forced kill, how long to wait for the output pipes to close.
    pub drain_grace_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        let (program, args): (&str, &[&str]) = if cfg!(windows) {
            (
                "powershell.exe",
                &["-NoProfile", "-ExecutionPolicy", "Bypass", "-File"],
            )
        } else {
            ("sh", &[])
        };
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            job_timeout_secs: None,
            drain_grace_ms: 2000,
        }
    }
}

/// Settings for the session controller.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(default)]
pub struct SessionConfig {
    /// Number of finished jobs kept for later lookup.
    pub history_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { history_limit: 50 }
    }
}
