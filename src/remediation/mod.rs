//! Bounded auto-remediation of audit findings.

pub mod attempt;
pub mod engine;
pub mod escalation;
pub mod strategy;

pub use attempt::{FixAttempt, FixOutcome, RemediationResult, RemediationState, MAX_ATTEMPTS};
pub use engine::{RemediationEngine, DEFAULT_ATTEMPT_TIMEOUT};
pub use escalation::{EscalationChannel, EscalationRecord, FileEscalationChannel, LogEscalationChannel};
pub use strategy::{CommandStrategy, CommandStrategyConfig, FirstUntriedSelector, FixStrategy, StrategySelector};
