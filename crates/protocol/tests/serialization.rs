use ab_protocol::*;
use uuid::Uuid;

#[test]
fn test_harness_config_from_toml() {
    let toml_str = r#"
[fetch]
timeout_secs = 10
https_only = false
api_key_header = "X-Api-Key"
api_key_env = "AUTOBYTE_KEY"

[staging]
extension = "ps1"
prelude = "Set-StrictMode -Version Latest"

[runner]
program = "pwsh"
args = ["-NoProfile", "-File"]
job_timeout_secs = 600
"#;

    let config: HarnessConfig = toml::from_str(toml_str).expect("Failed to parse HarnessConfig");

    assert_eq!(config.fetch.timeout_secs, 10);
    assert!(!config.fetch.https_only);
    assert_eq!(config.fetch.api_key_header.as_deref(), Some("X-Api-Key"));
    // Unset fields keep their defaults
    assert_eq!(config.fetch.user_agent, default_user_agent());
    assert_eq!(config.staging.dir_name, "autobyte");
    assert_eq!(config.staging.extension, "ps1");
    assert_eq!(config.runner.program, "pwsh");
    assert_eq!(config.runner.args, vec!["-NoProfile", "-File"]);
    assert_eq!(config.runner.job_timeout_secs, Some(600));
    assert_eq!(config.runner.drain_grace_ms, 2000);
    assert_eq!(config.session.history_limit, 50);
}

#[test]
fn test_empty_toml_yields_defaults() {
    let config: HarnessConfig = toml::from_str("").expect("Empty config should parse");
    assert_eq!(config, HarnessConfig::default());
    assert!(config.fetch.https_only, "HTTPS-only is the default");
    assert_eq!(config.fetch.timeout_secs, 30);
    assert!(config.runner.job_timeout_secs.is_none());
}

#[test]
fn test_default_prelude_reroutes_read_host_on_windows() {
    let staging = StagingConfig::default();
    if cfg!(windows) {
        assert_eq!(staging.prelude.as_deref(), Some(READ_HOST_PRELUDE));
    } else {
        assert!(staging.prelude.is_none());
    }
    assert!(READ_HOST_PRELUDE.contains("function Read-Host"));
    assert!(READ_HOST_PRELUDE.contains("[Console]::In.ReadLine()"));
}

#[test]
fn test_user_agent_names_tool_and_version() {
    let ua = default_user_agent();
    assert!(ua.starts_with("autobyte/"));
    assert!(ua.len() > "autobyte/".len());
}

#[test]
fn test_script_entry_from_yaml_front_matter() {
    let yaml_str = r#"
name: check-drive-space
url: https://example.com/CheckDriveSpace.ps1
args: ["-Drive", "C"]
"#;

    let entry: ScriptEntry = serde_yaml::from_str(yaml_str).expect("Failed to deserialize ScriptEntry");
    assert_eq!(entry.name, "check-drive-space");
    assert_eq!(entry.args, vec!["-Drive", "C"]);
    assert_eq!(entry.description, "");
}

#[test]
fn test_job_state_serialization() {
    let json = serde_json::to_value(JobState::Cancelled).expect("Failed to serialize JobState");
    assert_eq!(json, "CANCELLED");

    let state: SessionState = serde_json::from_value(serde_json::json!("IDLE")).unwrap();
    assert_eq!(state, SessionState::Idle);
}

#[test]
fn test_op_tagged_serialization() {
    let op = Op::RunScript {
        url: "https://example.com/ok.sh".to_string(),
        display_name: "OK".to_string(),
        args: vec![],
    };

    let json = serde_json::to_value(&op).expect("Failed to serialize Op");
    assert_eq!(json["type"], "runScript");
    assert_eq!(json["payload"]["display_name"], "OK");

    let stop: Op = serde_json::from_str(r#"{"type":"stopJob"}"#).expect("Failed to parse StopJob");
    assert_eq!(stop, Op::StopJob);
}

#[test]
fn test_event_log_line_serialization() {
    let job_id = Uuid::new_v4();
    let event = Event::JobLog {
        job_id,
        line: LogLine::stderr("warning: low disk"),
    };

    let json = serde_json::to_string(&event).expect("Failed to serialize Event");
    let back: Event = serde_json::from_str(&json).expect("Failed to deserialize Event");

    assert_eq!(back.job_id(), Some(job_id));
    match back {
        Event::JobLog { line, .. } => {
            assert_eq!(line.source, LogSource::StdErr);
            assert_eq!(line.text, "warning: low disk");
        }
        other => panic!("Expected JobLog, got {:?}", other),
    }
}

#[test]
fn test_session_state_from_job_state() {
    assert_eq!(SessionState::from(JobState::Pending), SessionState::Downloading);
    assert_eq!(SessionState::from(JobState::Running), SessionState::Running);
    assert_eq!(SessionState::from(JobState::Cancelled), SessionState::Cancelled);
    assert!(!SessionState::from(JobState::Completed).is_idle());
}
