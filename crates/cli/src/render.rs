//! Console rendering of relayed job output.

use ab_protocol::job_models::{JobState, LogLine, LogSource};
use colored::Colorize;

/// Print one log line, colored by where it came from.
pub fn print_line(line: &LogLine) {
    println!("{}", styled(line));
}

fn styled(line: &LogLine) -> String {
    match line.source {
        LogSource::StdOut => line.text.clone(),
        LogSource::StdErr => line.text.red().to_string(),
        LogSource::System if line.is_error() => line.text.red().bold().to_string(),
        LogSource::System => line.text.cyan().to_string(),
    }
}

/// Process exit status for a finished job.
///
/// Mirrors the script's own exit code where there is one; a cancelled job
/// exits like an interrupted shell command.
pub fn exit_status(state: JobState, exit_code: Option<i32>) -> u8 {
    match (state, exit_code) {
        (JobState::Completed, _) => 0,
        (JobState::Cancelled, _) => 130,
        (_, Some(code)) => u8::try_from(code).ok().filter(|c| *c != 0).unwrap_or(1),
        (_, None) => 1,
    }
}

/// Derive a display name from the last path segment of a URL.
pub fn display_name_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file = path.trim_end_matches('/').rsplit('/').next().unwrap_or(path);
    let stem = file.rsplit_once('.').map_or(file, |(stem, _)| stem);
    if stem.is_empty() {
        url.to_string()
    } else {
        stem.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_status() {
        assert_eq!(exit_status(JobState::Completed, Some(0)), 0);
        assert_eq!(exit_status(JobState::Failed, Some(3)), 3);
        assert_eq!(exit_status(JobState::Failed, Some(-1)), 1);
        assert_eq!(exit_status(JobState::Failed, None), 1);
        assert_eq!(exit_status(JobState::Cancelled, None), 130);
    }

    #[test]
    fn test_display_name_from_url() {
        assert_eq!(
            display_name_from_url(
                "https://raw.githubusercontent.com/deep1ne8/misc/main/Scripts/DiskCleaner.ps1"
            ),
            "DiskCleaner"
        );
        assert_eq!(
            display_name_from_url("https://example.com/tools/check.sh?token=abc"),
            "check"
        );
        assert_eq!(display_name_from_url("https://example.com/"), "example");
    }

    #[test]
    fn test_stdout_is_unstyled() {
        colored::control::set_override(true);
        assert_eq!(styled(&LogLine::stdout("plain")), "plain");
        assert_ne!(styled(&LogLine::system("ERROR: boom")), "ERROR: boom");
    }
}
