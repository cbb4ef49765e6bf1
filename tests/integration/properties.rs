use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use warden::audit::{CompoundRule, Finding, Location, Severity};
use warden::descriptor::{AgentDescriptor, DescriptorStore};
use warden::scope::{DecisionRule, ScopeEnforcer};
use warden::session::{
    FileSessionStore, HistoryEntry, SessionState, SessionStore, DEFAULT_HISTORY_LIMIT,
};
use warden::types::normalize_tag;
use warden::GovernanceError;

const AGENTS: &[&str] = &["dev", "ops", "qa", "pm"];
const TAGS: &[&str] = &["deploy", "publish_release", "write_code", "merge", "tag_release"];

fn severity() -> impl Strategy<Value = Severity> {
    prop::sample::select(Severity::ALL.to_vec())
}

fn finding() -> impl Strategy<Value = Finding> {
    (
        prop::sample::select(vec!["xss", "headers", "deps"]),
        severity(),
        prop::sample::select(vec!["a.html", "b.html"]),
    )
        .prop_map(|(validator, severity, resource)| {
            Finding::new(validator, severity, Location::new(resource), "issue")
        })
}

fn timestamp() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..4_102_444_800, 0u32..1_000_000_000)
        .prop_map(|(secs, nanos)| Utc.timestamp_opt(secs, nanos).unwrap())
}

fn session_state() -> impl Strategy<Value = SessionState> {
    (
        prop::option::of(prop::sample::select(AGENTS.to_vec())),
        prop::option::of("[a-z]{1,8}/[a-z]{1,8}\\.(yaml|md)"),
        prop::option::of(timestamp()),
        prop::option::of(timestamp()),
        prop::option::of("\\PC{0,24}"),
        prop::collection::vec(
            (prop::sample::select(AGENTS.to_vec()), timestamp()),
            0..=DEFAULT_HISTORY_LIMIT,
        ),
    )
        .prop_map(|(active, file, activated, last, task, history)| SessionState {
            active_agent: active.map(str::to_string),
            agent_file: file.map(|f| PathBuf::from("/agents").join(f)),
            activated_at: activated,
            last_activity: last,
            current_task: task,
            agent_history: history
                .into_iter()
                .map(|(agent, at)| HistoryEntry {
                    agent: agent.to_string(),
                    at,
                })
                .collect(),
        })
}

proptest! {
    #[test]
    fn prop_session_round_trips_through_file_store(state in session_state()) {
        let temp = TempDir::new().unwrap();
        let store = FileSessionStore::in_dir(temp.path());
        store.save(&state).unwrap();
        prop_assert_eq!(store.load(), state.clone());

        // A second process reading the same file sees the same state
        prop_assert_eq!(FileSessionStore::in_dir(temp.path()).load(), state);
    }

    #[test]
    fn prop_exclusive_claims_conflict_only_across_agents(
        claims in prop::collection::vec(
            (prop::sample::select(AGENTS.to_vec()), prop::sample::select(TAGS.to_vec())),
            0..8,
        )
    ) {
        let mut by_agent: HashMap<&str, Vec<&str>> = HashMap::new();
        for (agent, tag) in &claims {
            by_agent.entry(*agent).or_default().push(*tag);
        }
        let descriptors: Vec<AgentDescriptor> = by_agent
            .iter()
            .map(|(agent, tags)| AgentDescriptor::new(*agent).with_exclusive(tags))
            .collect();

        let mut owners: HashMap<&str, &str> = HashMap::new();
        let mut contested = false;
        for (agent, tag) in &claims {
            if let Some(owner) = owners.insert(*tag, *agent) {
                contested |= owner != *agent;
            }
        }

        match DescriptorStore::from_descriptors(descriptors) {
            Ok(store) => {
                prop_assert!(!contested);
                for (agent, tag) in &claims {
                    let owner = store.exclusive_owner(tag);
                    prop_assert_eq!(owner.as_deref(), Some(*agent));
                }
            }
            Err(GovernanceError::DescriptorConflict { first, second, .. }) => {
                prop_assert!(contested);
                prop_assert_ne!(first, second);
            }
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }

    #[test]
    fn prop_compound_severity_never_lowers(
        findings in prop::collection::vec(finding(), 0..12),
        target in severity(),
        extra in finding(),
    ) {
        let rule = CompoundRule::new("pair", &["xss", "headers"], target, "agreeing validators");

        if let Some((fired, synthetic)) = rule.evaluate(&findings) {
            prop_assert!(synthetic.severity >= target);
            let worst = findings
                .iter()
                .filter(|f| fired.contributing.contains(&f.fingerprint()))
                .map(|f| f.severity)
                .max();
            prop_assert!(worst.is_some());
            prop_assert!(synthetic.severity >= worst.unwrap_or(Severity::Info));

            // More evidence keeps the rule firing, at no lower severity
            let mut more = findings.clone();
            more.push(extra);
            let (_, again) = rule.evaluate(&more).unwrap();
            prop_assert!(again.severity >= synthetic.severity);
        }
    }

    #[test]
    fn prop_history_stays_bounded(
        sequence in prop::collection::vec(prop::sample::select(AGENTS.to_vec()), 1..20),
        limit in 1usize..6,
    ) {
        let mut state = SessionState::default();
        for (i, agent) in sequence.iter().enumerate() {
            let now = Utc.timestamp_opt(1_700_000_000 + i as i64, 0).unwrap();
            state.activate(agent, None, now, limit);
            state.deactivate();
        }
        prop_assert!(state.agent_history.len() <= limit);
        prop_assert_eq!(state.agent_history.len(), sequence.len().min(limit));
        let last = state.agent_history.last().map(|h| h.agent.as_str());
        prop_assert_eq!(last, sequence.last().copied());
        prop_assert!(!state.is_active());
    }

    #[test]
    fn prop_normalize_tag_is_idempotent(raw in "[ A-Za-z_-]{0,24}") {
        let once = normalize_tag(&raw);
        prop_assert_eq!(normalize_tag(&once), once.clone());
        prop_assert!(!once.starts_with('_') && !once.ends_with('_'));
    }

    #[test]
    fn prop_global_block_beats_every_grant(
        can in prop::collection::vec(prop::sample::select(TAGS.to_vec()), 0..5),
        exclusive in prop::sample::subsequence(TAGS.to_vec(), 0..3),
        blocked in prop::sample::select(TAGS.to_vec()),
    ) {
        let descriptor = AgentDescriptor::new("dev")
            .with_can(&can)
            .with_exclusive(&exclusive);
        let store = Arc::new(DescriptorStore::from_descriptors(vec![descriptor]).unwrap());
        let enforcer = ScopeEnforcer::with_global_blocks(store, [blocked]);

        let decision = enforcer.check("dev", blocked);
        prop_assert!(decision.is_blocked());
        prop_assert_eq!(decision.rule, DecisionRule::GlobalBlock);
        prop_assert!(enforcer.list_blocked_actions("dev").contains(&blocked.to_string()));
    }
}
