//! Audit: validator orchestration, cross-validation and verdicts.

pub mod compound;
pub mod finding;
pub mod orchestrator;
pub mod report;
pub mod validator;

pub use compound::{CompoundRule, FiredRule, TriggerCondition};
pub use finding::{Finding, FindingKind, Location, Severity};
pub use orchestrator::{prioritize, OrchestratorConfig, ValidatorOrchestrator, DEFAULT_AUDIT_ACTION};
pub use report::{
    derive_verdict, AuditPhase, AuditReport, AuditReportStore, SeverityCounts, ValidatorFailure,
    Verdict,
};
pub use validator::{AuditScope, CommandValidator, CommandValidatorConfig, Validator};
