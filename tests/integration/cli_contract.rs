//! Command-level contracts: outputs, exit codes and cross-invocation state.
//!
//! Every call builds a fresh `CliContext`, the way each hook invocation is a
//! separate process.

use super::support::{with_xdg_env, write_file, write_team};
use clap::Parser;
use std::path::Path;
use tempfile::TempDir;
use warden::tooling::{Cli, CliContext, CommandOutput};
use warden::GovernanceError;

fn warden(workspace: &Path, args: &[&str]) -> Result<CommandOutput, GovernanceError> {
    let mut argv = vec![
        "warden".to_string(),
        "--workspace".to_string(),
        workspace.display().to_string(),
    ];
    argv.extend(args.iter().map(|a| a.to_string()));
    let cli = Cli::try_parse_from(argv).unwrap();
    let config = CliContext::load_config(&cli.workspace, cli.config.as_deref())?;
    CliContext::with_config(cli.workspace.clone(), config)?.execute(&cli.command)
}

fn json(output: &CommandOutput) -> serde_json::Value {
    serde_json::from_str(&output.text).unwrap()
}

fn team_workspace(temp: &TempDir) -> std::path::PathBuf {
    let workspace = temp.path().join("workspace");
    write_team(&workspace.join("agents"));
    workspace
}

#[test]
fn test_state_lives_under_xdg_state_home() {
    let temp = TempDir::new().unwrap();
    let workspace = team_workspace(&temp);
    with_xdg_env(&temp, || {
        let context = CliContext::new(workspace.clone(), None).unwrap();
        assert!(context.paths().session_file.starts_with(temp.path().join("state").join("warden")));
        assert!(context.paths().session_file.ends_with("session-state.json"));
        assert_eq!(context.paths().descriptors, workspace.join("agents"));
    });
}

#[test]
fn test_activation_and_status_across_invocations() {
    let temp = TempDir::new().unwrap();
    let workspace = team_workspace(&temp);
    with_xdg_env(&temp, || {
        let out = warden(&workspace, &["activate", "dev"]).unwrap();
        assert_eq!(out.exit_code, 0);
        assert!(out.text.contains("dev"));

        let status = json(&warden(&workspace, &["status", "--format", "json"]).unwrap());
        assert_eq!(status["activeAgent"], "dev");

        let list = json(&warden(&workspace, &["agent", "list", "--format", "json"]).unwrap());
        assert_eq!(list["total"], 3);
        let active: Vec<&str> = list["agents"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|a| a["active"] == true)
            .map(|a| a["id"].as_str().unwrap())
            .collect();
        assert_eq!(active, vec!["dev"]);

        let err = warden(&workspace, &["activate", "qa"]).unwrap_err();
        assert!(matches!(err, GovernanceError::IdentityConflict { .. }));

        warden(&workspace, &["deactivate"]).unwrap();
        warden(&workspace, &["activate", "qa"]).unwrap();
        let status = json(&warden(&workspace, &["status", "--format", "json"]).unwrap());
        assert_eq!(status["activeAgent"], "qa");
        assert_eq!(status["agentHistory"].as_array().unwrap().len(), 2);
    });
}

#[test]
fn test_check_exit_codes() {
    let temp = TempDir::new().unwrap();
    let workspace = team_workspace(&temp);
    with_xdg_env(&temp, || {
        // No active agent: blocked
        let out = warden(&workspace, &["check", "write_code"]).unwrap();
        assert_eq!(out.exit_code, 2);

        warden(&workspace, &["activate", "dev"]).unwrap();

        let out = warden(&workspace, &["check", "publish_release", "--format", "json"]).unwrap();
        assert_eq!(out.exit_code, 2);
        let decision = json(&out);
        assert_eq!(decision["outcome"], "BLOCKED");
        assert_eq!(decision["rule"], "exclusivity");
        assert_eq!(decision["authorized"], "ops");

        let out = warden(&workspace, &["check", "write_code"]).unwrap();
        assert_eq!(out.exit_code, 0);
        assert!(out.notice.is_none());

        let out = warden(&workspace, &["check", "deploy"]).unwrap();
        assert_eq!(out.exit_code, 0);
        assert!(out.notice.unwrap().starts_with("warning:"));

        let out = warden(&workspace, &["check", "deploy", "--agent", "ops"]).unwrap();
        assert_eq!(out.exit_code, 0);
        assert!(out.notice.is_none());
    });
}

#[test]
fn test_blocked_listing_and_bleed_check() {
    let temp = TempDir::new().unwrap();
    let workspace = team_workspace(&temp);
    with_xdg_env(&temp, || {
        let err = warden(&workspace, &["blocked"]).unwrap_err();
        assert!(matches!(err, GovernanceError::ConfigError(_)));

        warden(&workspace, &["activate", "dev"]).unwrap();
        let blocked = json(&warden(&workspace, &["blocked", "--format", "json"]).unwrap());
        assert_eq!(blocked["agent_id"], "dev");
        let tags: Vec<&str> = blocked["blocked"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t.as_str().unwrap())
            .collect();
        assert!(tags.contains(&"publish_release"));
        assert!(tags.contains(&"force_push_main"));

        let out = warden(&workspace, &["bleed-check", "Acting as ops, shipping it", "--format", "json"]).unwrap();
        assert_eq!(out.exit_code, 2);
        let check = json(&out);
        assert_eq!(check["clean"], false);
        assert_eq!(check["impersonated"], "ops");

        let out = warden(&workspace, &["bleed-check", "Tests are green"]).unwrap();
        assert_eq!(out.exit_code, 0);
    });
}

#[test]
fn test_validate_flags_bad_descriptors() {
    let temp = TempDir::new().unwrap();
    let workspace = team_workspace(&temp);
    write_file(
        &workspace.join("agents"),
        "sm/agent.yaml",
        "agent:\n  id: sm\nscope:\n  can: [plan]\n  cannot: [plan]\n",
    );
    with_xdg_env(&temp, || {
        let out = warden(&workspace, &["agent", "validate", "--format", "json"]).unwrap();
        assert_eq!(out.exit_code, 1);
        let report = json(&out);
        assert_eq!(report["valid"], false);

        let out = warden(&workspace, &["agent", "validate", "dev"]).unwrap();
        assert_eq!(out.exit_code, 0);
    });
}

#[test]
fn test_skipped_descriptors_are_reported_on_every_command() {
    let temp = TempDir::new().unwrap();
    let workspace = team_workspace(&temp);
    write_file(&workspace.join("agents"), "broken/agent.yaml", "agent: [x\n");
    with_xdg_env(&temp, || {
        let out = warden(&workspace, &["status"]).unwrap();
        assert_eq!(out.exit_code, 0);
        let notice = out.notice.unwrap();
        assert!(notice.starts_with("warning: 1 agent descriptor(s) skipped"));
        assert!(notice.contains("broken"));

        // The skip notice comes first; a command's own warning follows it
        warden(&workspace, &["activate", "dev"]).unwrap();
        let out = warden(&workspace, &["check", "deploy"]).unwrap();
        let notice = out.notice.unwrap();
        let lines: Vec<&str> = notice.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("skipped"));
        assert!(lines[1].starts_with("warning:"));
    });
}

#[test]
fn test_missing_descriptor_directory_is_not_fatal() {
    let temp = TempDir::new().unwrap();
    let workspace = temp.path().join("empty");
    std::fs::create_dir_all(&workspace).unwrap();
    with_xdg_env(&temp, || {
        let list = json(&warden(&workspace, &["agent", "list", "--format", "json"]).unwrap());
        assert_eq!(list["total"], 0);
        assert!(matches!(
            warden(&workspace, &["activate", "dev"]),
            Err(GovernanceError::DescriptorNotFound(_))
        ));
    });
}

#[test]
fn test_audit_without_validators_is_blocked() {
    let temp = TempDir::new().unwrap();
    let workspace = team_workspace(&temp);
    with_xdg_env(&temp, || {
        warden(&workspace, &["activate", "qa"]).unwrap();
        let out = warden(&workspace, &["audit", "--format", "json"]).unwrap();
        assert_eq!(out.exit_code, 1);
        assert_eq!(json(&out)["report"]["verdict"], "BLOCKED");

        let stored = warden(&workspace, &["report"]).unwrap();
        assert_eq!(stored.exit_code, 1);

        let run_id = json(&warden(&workspace, &["report", "--format", "json"]).unwrap())["run_id"]
            .as_str()
            .unwrap()
            .to_string();
        assert_eq!(warden(&workspace, &["report", "--run", &run_id]).unwrap().exit_code, 1);

        // Run ids never resolve outside the audits directory
        write_file(temp.path(), "state/warden/stolen.json", "{}");
        assert!(matches!(
            warden(&workspace, &["report", "--run", "../stolen"]),
            Err(GovernanceError::ConfigError(_))
        ));
    });
}

#[cfg(unix)]
#[test]
fn test_audit_fix_and_escalation_flow() {
    let temp = TempDir::new().unwrap();
    let workspace = team_workspace(&temp);
    write_file(
        &workspace,
        "scan.sh",
        "if [ -f secret.env ]; then\n  printf '[{\"severity\":\"critical\",\"location\":{\"resource\":\"secret.env\"},\"description\":\"committed secret\"}]'\nfi\n",
    );
    write_file(
        &workspace,
        "warden.toml",
        r#"[session]
state_dir = ".warden"

[[audit.validators]]
id = "secrets"
command = "sh"
args = ["scan.sh"]

[[remediation.strategies]]
name = "remove-secret"
command = "rm"
args = ["-f", "secret.env"]
"#,
    );
    write_file(&workspace, "secret.env", "TOKEN=abc\n");

    with_xdg_env(&temp, || {
        // dev may not run audits
        warden(&workspace, &["activate", "dev"]).unwrap();
        let out = warden(&workspace, &["audit"]).unwrap();
        assert_eq!(out.exit_code, 1);
        assert!(workspace.join("secret.env").exists());

        let out = warden(&workspace, &["audit", "--agent", "qa", "--fix", "--format", "json"]).unwrap();
        assert_eq!(out.exit_code, 1);
        let body = json(&out);
        assert_eq!(body["report"]["verdict"], "FAIL");
        assert_eq!(body["remediation"][0]["result"]["state"], "FIXED");
        assert!(!workspace.join("secret.env").exists());
        assert!(workspace.join(".warden").join("session-state.json").exists());

        let out = warden(&workspace, &["audit", "--agent", "qa"]).unwrap();
        assert_eq!(out.exit_code, 0);
        let latest = json(&warden(&workspace, &["report", "--format", "json"]).unwrap());
        assert_eq!(latest["verdict"], "PASS");

        let escalations = json(&warden(&workspace, &["escalations", "--format", "json"]).unwrap());
        assert!(escalations.as_array().unwrap().is_empty());
    });
}

#[test]
fn test_effective_config_reflects_workspace_file() {
    let temp = TempDir::new().unwrap();
    let workspace = team_workspace(&temp);
    write_file(&workspace, "warden.toml", "[audit]\nhigh_threshold = 7\n");
    with_xdg_env(&temp, || {
        let out = warden(&workspace, &["config"]).unwrap();
        let config: warden::config::WardenConfig = toml::from_str(&out.text).unwrap();
        assert_eq!(config.audit.high_threshold, 7);
        assert_eq!(config.session.history_limit, 5);

        let out = warden(&workspace, &["config", "--format", "json"]).unwrap();
        assert_eq!(json(&out)["audit"]["required_action"], "run_audit");
    });
}

#[test]
fn test_argument_parsing() {
    let cli = Cli::try_parse_from(["warden", "check", "Deploy", "--agent", "ops", "--format", "json"]).unwrap();
    assert_eq!(cli.workspace, Path::new("."));
    assert!(cli.config.is_none());

    let cli = Cli::try_parse_from(["warden", "--workspace", "/srv/app", "--verbose", "audit", "--fix"]).unwrap();
    assert_eq!(cli.workspace, Path::new("/srv/app"));
    assert!(cli.verbose);

    assert!(Cli::try_parse_from(["warden", "touch", "--task", "story-12"]).is_ok());
    assert!(Cli::try_parse_from(["warden", "agent", "validate"]).is_ok());
    assert!(Cli::try_parse_from(["warden", "report", "--run", "20260101T000000.000Z"]).is_ok());

    for invalid in [
        vec!["warden"],
        vec!["warden", "check"],
        vec!["warden", "activate"],
        vec!["warden", "agent", "show"],
        vec!["warden", "launch"],
    ] {
        assert!(Cli::try_parse_from(&invalid).is_err(), "{:?} should not parse", invalid);
    }
}
