use super::support::write_team;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use warden::descriptor::DescriptorStore;
use warden::identity::IdentityGuard;
use warden::session::{FileSessionStore, SESSION_FILE_NAME};
use warden::GovernanceError;

/// A guard as a fresh process would build it
fn guard(agents: &Path, state_dir: &Path) -> IdentityGuard {
    let descriptors = Arc::new(DescriptorStore::new());
    descriptors.load(agents).unwrap();
    IdentityGuard::new(descriptors, Arc::new(FileSessionStore::in_dir(state_dir)))
}

fn workspace() -> (TempDir, std::path::PathBuf, std::path::PathBuf) {
    let temp = TempDir::new().unwrap();
    let agents = temp.path().join("agents");
    write_team(&agents);
    let state = temp.path().join("state");
    (temp, agents, state)
}

#[test]
fn test_activation_is_visible_to_the_next_process() {
    let (_temp, agents, state) = workspace();

    guard(&agents, &state).activate("dev").unwrap();

    let next = guard(&agents, &state);
    assert_eq!(next.current().unwrap().unwrap().id, "dev");
    match next.activate("qa") {
        Err(GovernanceError::IdentityConflict { active, requested }) => {
            assert_eq!(active, "dev");
            assert_eq!(requested, "qa");
        }
        other => panic!("expected identity conflict, got {:?}", other),
    }
    assert!(next.session().is_active_as("dev"));
}

#[test]
fn test_session_file_uses_stable_field_names() {
    let (_temp, agents, state) = workspace();
    let guard = guard(&agents, &state);
    guard.activate("dev").unwrap();
    guard.touch(Some("implement login")).unwrap();

    let raw = fs::read_to_string(state.join(SESSION_FILE_NAME)).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["activeAgent"], "dev");
    assert_eq!(json["currentTask"], "implement login");
    assert!(json["activatedAt"].is_string());
    assert!(json["lastActivity"].is_string());
    assert_eq!(json["agentHistory"][0]["agent"], "dev");
}

#[test]
fn test_handoff_requires_deactivation() {
    let (_temp, agents, state) = workspace();
    let guard = guard(&agents, &state);

    guard.activate("dev").unwrap();
    assert!(guard.activate("ops").is_err());
    guard.deactivate().unwrap();
    let session = guard.activate("ops").unwrap();

    assert!(session.is_active_as("ops"));
    let history: Vec<&str> = session.agent_history.iter().map(|h| h.agent.as_str()).collect();
    assert_eq!(history, vec!["dev", "ops"]);
}

#[test]
fn test_history_is_bounded() {
    let (_temp, agents, state) = workspace();
    let guard = guard(&agents, &state);

    for agent in ["dev", "qa", "ops", "dev", "qa", "ops", "dev"] {
        guard.activate(agent).unwrap();
        guard.deactivate().unwrap();
    }

    let history: Vec<String> = guard
        .session()
        .agent_history
        .iter()
        .map(|h| h.agent.clone())
        .collect();
    assert_eq!(history, vec!["ops", "dev", "qa", "ops", "dev"]);
}

#[test]
fn test_removed_descriptor_releases_the_session() {
    let (_temp, agents, state) = workspace();
    guard(&agents, &state).activate("qa").unwrap();

    fs::remove_dir_all(agents.join("qa")).unwrap();

    let next = guard(&agents, &state);
    assert!(next.current().unwrap().is_none());
    assert!(!next.session().is_active());
    next.activate("dev").unwrap();
    assert!(next.session().is_active_as("dev"));
}

#[test]
fn test_unknown_agent_cannot_activate() {
    let (_temp, agents, state) = workspace();
    let guard = guard(&agents, &state);
    assert!(matches!(
        guard.activate("intruder"),
        Err(GovernanceError::DescriptorNotFound(_))
    ));
    assert!(!guard.session().is_active());
}

#[test]
fn test_bleed_check_against_active_identity() {
    let (_temp, agents, state) = workspace();
    let guard = guard(&agents, &state);
    guard.activate("dev").unwrap();

    let check = guard
        .verify_no_identity_bleed("Acting as ops, I'll publish the release now.")
        .unwrap();
    assert!(!check.is_clean());
    assert_eq!(check.impersonated.as_deref(), Some("ops"));
    assert_eq!(check.active_agent.as_deref(), Some("dev"));

    assert!(guard
        .verify_no_identity_bleed("Acting as dev, I wrote the handler.")
        .unwrap()
        .is_clean());
    assert!(guard
        .verify_no_identity_bleed("The ops pipeline is green.")
        .unwrap()
        .is_clean());
}

#[test]
fn test_bleed_check_without_active_identity() {
    let (_temp, agents, state) = workspace();
    let guard = guard(&agents, &state);

    let check = guard.verify_no_identity_bleed("switching to qa").unwrap();
    assert_eq!(check.impersonated.as_deref(), Some("qa"));
    assert!(check.active_agent.is_none());
}
