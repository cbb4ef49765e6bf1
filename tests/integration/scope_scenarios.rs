use super::support::write_team;
use std::sync::Arc;
use tempfile::TempDir;
use warden::descriptor::DescriptorStore;
use warden::identity::IdentityGuard;
use warden::scope::{DecisionRule, Outcome, ScopeEnforcer, DEFAULT_GLOBALLY_BLOCKED};
use warden::session::{FileSessionStore, SESSION_FILE_NAME};

struct Team {
    _temp: TempDir,
    descriptors: Arc<DescriptorStore>,
    state: std::path::PathBuf,
}

impl Team {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let agents = temp.path().join("agents");
        write_team(&agents);
        let descriptors = Arc::new(DescriptorStore::new());
        descriptors.load(&agents).unwrap();
        let state = temp.path().join("state");
        Self {
            _temp: temp,
            descriptors,
            state,
        }
    }

    fn guard(&self) -> Arc<IdentityGuard> {
        Arc::new(IdentityGuard::new(
            self.descriptors.clone(),
            Arc::new(FileSessionStore::in_dir(&self.state)),
        ))
    }

    fn enforcer(&self) -> ScopeEnforcer {
        ScopeEnforcer::new(self.descriptors.clone()).with_identity(self.guard())
    }
}

#[test]
fn test_exclusive_action_names_its_owner() {
    let team = Team::new();
    let enforcer = team.enforcer();

    let decision = enforcer.check("dev", "publish_release");
    assert_eq!(decision.outcome, Outcome::Blocked);
    assert_eq!(decision.rule, DecisionRule::Exclusivity);
    assert_eq!(decision.authorized.as_deref(), Some("ops"));
    assert_eq!(decision.exit_code(), 2);

    let owner = enforcer.check("ops", "publish-release");
    assert_eq!(owner.outcome, Outcome::Allowed);
    assert_eq!(owner.action, "publish_release");
}

#[test]
fn test_rule_order_over_the_team() {
    let team = Team::new();
    let enforcer = team.enforcer();

    let cases = [
        ("dev", "force_push_main", Outcome::Blocked, DecisionRule::GlobalBlock),
        ("qa", "write_code", Outcome::Blocked, DecisionRule::DenyList),
        ("dev", "Run Tests", Outcome::Allowed, DecisionRule::AllowList),
        ("dev", "deploy", Outcome::Warned, DecisionRule::UndeclaredAction),
        ("ghost", "run_tests", Outcome::Blocked, DecisionRule::UnknownAgent),
    ];
    for (agent, action, outcome, rule) in cases {
        let decision = enforcer.check(agent, action);
        assert_eq!(decision.outcome, outcome, "{} / {}", agent, action);
        assert_eq!(decision.rule, rule, "{} / {}", agent, action);
    }

    let denied = enforcer.check("qa", "write_code");
    assert!(denied.reason.contains("deny-list"));
    assert_eq!(enforcer.check("dev", "deploy").exit_code(), 0);
}

#[test]
fn test_active_identity_is_reread_for_every_check() {
    let team = Team::new();
    let enforcer = team.enforcer();
    let other_process = team.guard();

    let decision = enforcer.check_active("run_tests").unwrap();
    assert_eq!(decision.rule, DecisionRule::NoActiveAgent);
    assert!(decision.is_blocked());

    other_process.activate("qa").unwrap();
    assert!(team.state.join(SESSION_FILE_NAME).exists());
    let decision = enforcer.check_active("run_tests").unwrap();
    assert_eq!(decision.agent_id, "qa");
    assert!(decision.is_allowed());

    other_process.deactivate().unwrap();
    other_process.activate("dev").unwrap();
    let decision = enforcer.check_active("write_code").unwrap();
    assert_eq!(decision.agent_id, "dev");
    assert!(decision.is_allowed());
}

#[test]
fn test_blocked_listing_per_agent() {
    let team = Team::new();
    let enforcer = team.enforcer();

    let dev = enforcer.list_blocked_actions("dev");
    assert!(dev.contains(&"publish_release".to_string()));
    for tag in DEFAULT_GLOBALLY_BLOCKED {
        assert!(dev.contains(&tag.to_string()));
    }
    let mut sorted = dev.clone();
    sorted.sort();
    assert_eq!(dev, sorted);

    let ops = enforcer.list_blocked_actions("ops");
    assert!(!ops.contains(&"publish_release".to_string()));

    let qa = enforcer.list_blocked_actions("qa");
    assert!(qa.contains(&"write_code".to_string()));
}

#[test]
fn test_configured_global_blocks_override_grants() {
    let team = Team::new();
    let enforcer = ScopeEnforcer::with_global_blocks(team.descriptors.clone(), ["Deploy"]);

    let decision = enforcer.check("ops", "deploy");
    assert_eq!(decision.rule, DecisionRule::GlobalBlock);
    // Replaces the built-in set
    assert!(!enforcer.is_blocked("dev", "force_push_main"));
}
