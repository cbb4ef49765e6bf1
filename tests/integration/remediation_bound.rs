use async_trait::async_trait;
use std::sync::Arc;
use tempfile::TempDir;
use warden::audit::{
    AuditScope, CompoundRule, Finding, FindingKind, Location, OrchestratorConfig, Severity,
    Validator, ValidatorOrchestrator,
};
use warden::remediation::{LogEscalationChannel, RemediationEngine, RemediationState};
use warden::GovernanceError;

struct Reporting {
    id: &'static str,
    findings: Vec<Finding>,
}

#[async_trait]
impl Validator for Reporting {
    fn id(&self) -> &str {
        self.id
    }

    async fn run(&self, _scope: &AuditScope) -> Result<Vec<Finding>, GovernanceError> {
        Ok(self.findings.clone())
    }
}

struct Unreachable;

#[async_trait]
impl Validator for Unreachable {
    fn id(&self) -> &str {
        "offline"
    }

    async fn run(&self, _scope: &AuditScope) -> Result<Vec<Finding>, GovernanceError> {
        Err(GovernanceError::ValidatorError("service unavailable".to_string()))
    }
}

fn single(id: &'static str, severity: Severity, resource: &str, description: &str) -> Arc<Reporting> {
    Arc::new(Reporting {
        id,
        findings: vec![Finding::new("", severity, Location::new(resource), description)],
    })
}

#[tokio::test]
async fn test_fix_all_skips_info_and_escalates_unfixable_findings() {
    let temp = TempDir::new().unwrap();
    let scope = AuditScope::new(temp.path());

    let mut audit = ValidatorOrchestrator::new(OrchestratorConfig::default());
    audit.register(single("xss", Severity::High, "src/login.html", "unescaped input")).unwrap();
    audit.register(single("headers", Severity::Medium, "src/login.html", "no CSP")).unwrap();
    audit.register(Arc::new(Unreachable)).unwrap();
    audit
        .add_rule(CompoundRule::new("xss-without-csp", &["xss", "headers"], Severity::Critical, "no CSP"))
        .unwrap();
    let report = audit.run(&scope).await;
    assert_eq!(report.counts.info, 1);

    let engine = RemediationEngine::new(scope)
        .with_validators_from(&audit)
        .with_escalation(Arc::new(LogEscalationChannel));
    let results = engine.fix_all(&report).await;

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|(f, _)| f.severity > Severity::Info));
    assert!(results.iter().all(|(_, r)| r.is_escalated() && r.attempts.is_empty()));

    let (compound, result) = &results[0];
    assert_eq!(compound.kind, FindingKind::Compound);
    assert!(result.reason.as_deref().unwrap_or_default().contains("synthetic"));
    for (finding, _) in &results {
        assert_eq!(engine.state_of(finding), RemediationState::Escalated);
    }
}

#[cfg(unix)]
mod commands {
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;
    use warden::audit::{
        AuditScope, CommandValidator, CommandValidatorConfig, OrchestratorConfig, Severity,
        ValidatorOrchestrator, Verdict,
    };
    use warden::remediation::{
        CommandStrategy, CommandStrategyConfig, FileEscalationChannel, FixOutcome,
        RemediationEngine, RemediationState, MAX_ATTEMPTS,
    };

    const SCANNER: &str = r#"if [ -f secret.env ]; then printf '[{"severity":"high","location":{"resource":"secret.env"},"description":"committed secret"}]'; fi"#;

    fn secret_scanner() -> CommandValidator {
        CommandValidator::new(CommandValidatorConfig {
            id: "secrets".to_string(),
            command: "sh".to_string(),
            args: vec!["-c".to_string(), SCANNER.to_string()],
        })
    }

    fn sh_strategy(name: &str, script: &str) -> CommandStrategy {
        CommandStrategy::new(CommandStrategyConfig {
            name: name.to_string(),
            command: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            validators: vec!["secrets".to_string()],
            min_severity: Severity::Low,
        })
    }

    /// Strategy that only records that it ran
    fn recording(name: &str, log: &Path) -> CommandStrategy {
        sh_strategy(name, &format!("echo {} >> '{}'", name, log.display()))
    }

    fn audit() -> ValidatorOrchestrator {
        let mut audit = ValidatorOrchestrator::new(OrchestratorConfig::default());
        audit.register(Arc::new(secret_scanner())).unwrap();
        audit
    }

    #[tokio::test]
    async fn test_second_strategy_fixes_and_stops_the_loop() {
        let workspace = TempDir::new().unwrap();
        let state = TempDir::new().unwrap();
        fs::write(workspace.path().join("secret.env"), "TOKEN=abc\n").unwrap();
        let scope = AuditScope::new(workspace.path());

        let audit = audit();
        let report = audit.run(&scope).await;
        assert_eq!(report.counts.high, 1);
        assert_eq!(report.verdict, Verdict::Concerns);

        let runs = state.path().join("runs.log");
        let engine = RemediationEngine::new(scope.clone())
            .with_validators_from(&audit)
            .with_escalation(Arc::new(FileEscalationChannel::new(state.path().join("escalations"))))
            .with_strategy(Arc::new(recording("reformat", &runs)))
            .with_strategy(Arc::new(sh_strategy("remove", "rm -f \"$WARDEN_FINDING_RESOURCE\"")))
            .with_strategy(Arc::new(recording("never", &runs)));

        let results = engine.fix_all(&report).await;
        assert_eq!(results.len(), 1);
        let (finding, result) = &results[0];
        assert!(result.is_fixed());
        let outcomes: Vec<FixOutcome> = result.attempts.iter().map(|a| a.outcome).collect();
        assert_eq!(outcomes, vec![FixOutcome::Partial, FixOutcome::Fixed]);
        assert_eq!(engine.state_of(finding), RemediationState::Fixed);

        assert!(!workspace.path().join("secret.env").exists());
        assert_eq!(fs::read_to_string(&runs).unwrap().trim(), "reformat");
        assert_eq!(audit.run(&scope).await.verdict, Verdict::Pass);
    }

    #[tokio::test]
    async fn test_stubborn_finding_escalates_once_and_for_good() {
        let workspace = TempDir::new().unwrap();
        let state = TempDir::new().unwrap();
        fs::write(workspace.path().join("secret.env"), "TOKEN=abc\n").unwrap();
        let scope = AuditScope::new(workspace.path());
        let escalations = state.path().join("escalations");
        let runs = state.path().join("runs.log");

        let audit = audit();
        let report = audit.run(&scope).await;
        let engine = |audit: &ValidatorOrchestrator| {
            RemediationEngine::new(scope.clone())
                .with_validators_from(audit)
                .with_escalation(Arc::new(FileEscalationChannel::new(&escalations)))
                .with_strategy(Arc::new(recording("a", &runs)))
                .with_strategy(Arc::new(recording("b", &runs)))
                .with_strategy(Arc::new(recording("c", &runs)))
                .with_strategy(Arc::new(recording("d", &runs)))
        };

        let first = engine(&audit).fix_all(&report).await;
        let (finding, result) = &first[0];
        assert!(result.is_escalated());
        assert_eq!(result.attempts.len(), MAX_ATTEMPTS);
        assert!(result.attempts.iter().all(|a| a.outcome == FixOutcome::Partial));
        assert_eq!(fs::read_to_string(&runs).unwrap(), "a\nb\nc\n");

        let records = FileEscalationChannel::new(&escalations).list().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].fingerprint, finding.fingerprint());
        assert_eq!(records[0].attempts.len(), MAX_ATTEMPTS);

        // A later run never retries an escalated finding
        let later = engine(&audit);
        let again = later.fix(finding).await;
        assert!(again.is_escalated());
        assert_eq!(again.attempts.len(), MAX_ATTEMPTS);
        assert_eq!(later.state_of(finding), RemediationState::Escalated);
        assert_eq!(fs::read_to_string(&runs).unwrap(), "a\nb\nc\n");
        assert!(workspace.path().join("secret.env").exists());
    }
}
