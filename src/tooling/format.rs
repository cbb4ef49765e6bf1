//! Format descriptors, sessions, decisions and audit results as text.

use crate::audit::{AuditReport, Severity, Verdict};
use crate::descriptor::{AgentDescriptor, LoadReport, ValidationResult};
use crate::remediation::{EscalationRecord, RemediationResult, RemediationState};
use crate::scope::{Outcome, PermissionDecision};
use crate::session::SessionState;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use std::sync::Arc;

/// Format a section heading with bold/underline.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

fn join_or_dash(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}

pub fn format_agent_list(descriptors: &[Arc<AgentDescriptor>], active: Option<&str>) -> String {
    let mut out = format!("{}\n\n", format_section_heading("Agents"));
    if descriptors.is_empty() {
        out.push_str("No agent descriptors loaded.\n");
        return out;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["", "Agent", "Name", "Can", "Cannot", "Exclusive"]);
    for descriptor in descriptors {
        let marker = if active == Some(descriptor.id.as_str()) { "*" } else { "" };
        table.add_row(vec![
            marker.to_string(),
            descriptor.id.clone(),
            descriptor.name.clone(),
            descriptor.can.len().to_string(),
            descriptor.cannot.len().to_string(),
            join_or_dash(&descriptor.exclusive),
        ]);
    }
    out.push_str(&format!("{}\n", table));
    out
}

pub fn format_descriptor(descriptor: &AgentDescriptor) -> String {
    let mut out = format!(
        "{}\n\n",
        format_section_heading(&format!("Agent {}", descriptor.id))
    );
    out.push_str(&format!("  Name: {}\n", descriptor.name));
    if !descriptor.source.as_os_str().is_empty() {
        out.push_str(&format!("  Source: {}\n", descriptor.source.display()));
    }
    out.push_str(&format!("  Can: {}\n", join_or_dash(&descriptor.can)));
    out.push_str(&format!("  Cannot: {}\n", join_or_dash(&descriptor.cannot)));
    out.push_str(&format!("  Exclusive: {}\n", join_or_dash(&descriptor.exclusive)));
    out.push_str(&format!(
        "  Reports to: {}\n",
        descriptor.reports_to.as_deref().unwrap_or("-")
    ));
    out.push_str(&format!(
        "  Collaborates with: {}\n",
        join_or_dash(&descriptor.collaborates_with)
    ));
    out
}

pub fn format_validation(results: &[ValidationResult], load: Option<&LoadReport>) -> String {
    let mut out = format!("{}\n\n", format_section_heading("Descriptor validation"));
    for result in results {
        let status = if result.is_valid() {
            format!("{}", "valid".green())
        } else {
            format!("{}", "invalid".red())
        };
        out.push_str(&format!(
            "{} ({}/{} checks): {}\n",
            result.agent_id,
            result.passed_checks(),
            result.total_checks(),
            status
        ));
        for (check, passed) in &result.checks {
            let mark = if *passed { "ok" } else { "FAILED" };
            out.push_str(&format!("  [{}] {}\n", mark, check));
        }
        for error in &result.errors {
            out.push_str(&format!("  error: {}\n", error));
        }
    }
    if let Some(load) = load {
        for skipped in &load.skipped {
            out.push_str(&format!(
                "skipped {}: {}\n",
                skipped.path.display(),
                skipped.reason
            ));
        }
    }
    out
}

pub fn format_session(state: &SessionState) -> String {
    let mut out = format!("{}\n\n", format_section_heading("Session"));
    match &state.active_agent {
        Some(agent) => out.push_str(&format!("  Active agent: {}\n", agent.bold())),
        None => out.push_str("  Active agent: none\n"),
    }
    if let Some(file) = &state.agent_file {
        out.push_str(&format!("  Descriptor: {}\n", file.display()));
    }
    if let Some(at) = state.activated_at {
        out.push_str(&format!("  Activated: {}\n", at.to_rfc3339()));
    }
    if let Some(at) = state.last_activity {
        out.push_str(&format!("  Last activity: {}\n", at.to_rfc3339()));
    }
    if let Some(task) = &state.current_task {
        out.push_str(&format!("  Task: {}\n", task));
    }
    if !state.agent_history.is_empty() {
        out.push_str("\n  History\n\n");
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["Agent", "Activated"]);
        for entry in state.agent_history.iter().rev() {
            table.add_row(vec![entry.agent.clone(), entry.at.to_rfc3339()]);
        }
        out.push_str(&format!("{}\n", table));
    }
    out
}

fn colored_outcome(outcome: Outcome) -> String {
    match outcome {
        Outcome::Allowed => format!("{}", outcome.as_str().green()),
        Outcome::Warned => format!("{}", outcome.as_str().yellow()),
        Outcome::Blocked => format!("{}", outcome.as_str().red().bold()),
    }
}

pub fn format_decision(decision: &PermissionDecision) -> String {
    let agent = if decision.agent_id.is_empty() {
        "(none)"
    } else {
        decision.agent_id.as_str()
    };
    let mut out = format!(
        "{} {} for {}: {}\n",
        colored_outcome(decision.outcome),
        decision.action,
        agent,
        decision.reason
    );
    if let Some(owner) = &decision.authorized {
        out.push_str(&format!("  Authorized agent: {}\n", owner));
    }
    out
}

fn colored_verdict(verdict: Verdict) -> String {
    match verdict {
        Verdict::Pass => format!("{}", verdict.as_str().green().bold()),
        Verdict::Concerns => format!("{}", verdict.as_str().yellow().bold()),
        Verdict::Fail | Verdict::Blocked => format!("{}", verdict.as_str().red().bold()),
    }
}

fn colored_severity(severity: Severity) -> String {
    match severity {
        Severity::Critical => format!("{}", severity.as_str().red().bold()),
        Severity::High => format!("{}", severity.as_str().red()),
        Severity::Medium => format!("{}", severity.as_str().yellow()),
        Severity::Low | Severity::Info => severity.as_str().to_string(),
    }
}

pub fn format_audit_report(report: &AuditReport) -> String {
    let mut out = format!(
        "{}\n\n",
        format_section_heading(&format!("Audit {}", report.run_id))
    );
    out.push_str(&format!("  Scope: {}\n", report.scope.root.display()));
    if let Some(agent) = &report.requested_by {
        out.push_str(&format!("  Requested by: {}\n", agent));
    }
    out.push_str(&format!(
        "  Validators: {}\n",
        if report.validators.is_empty() {
            "-".to_string()
        } else {
            report.validators.join(", ")
        }
    ));
    for failure in &report.failed_validators {
        out.push_str(&format!(
            "  Validator {} failed: {}\n",
            failure.validator_id, failure.reason
        ));
    }
    for rule in &report.fired_rules {
        out.push_str(&format!(
            "  Compound rule {} fired ({}): {}\n",
            rule.rule_id, rule.severity, rule.rationale
        ));
    }
    out.push('\n');

    if !report.findings.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["Severity", "Validator", "Location", "Description"]);
        for finding in &report.findings {
            table.add_row(vec![
                colored_severity(finding.severity),
                finding.validator_id.clone(),
                finding.location.to_string(),
                finding.description.clone(),
            ]);
        }
        out.push_str(&format!("{}\n\n", table));
    }

    let c = &report.counts;
    out.push_str(&format!(
        "  Critical {} / High {} / Medium {} / Low {} / Info {}\n",
        c.critical, c.high, c.medium, c.low, c.info
    ));
    out.push_str(&format!(
        "  Verdict: {} ({})\n",
        colored_verdict(report.verdict),
        report.verdict_reason
    ));
    out
}

pub fn format_remediation(results: &[(crate::audit::Finding, RemediationResult)]) -> String {
    let mut out = format!("{}\n\n", format_section_heading("Remediation"));
    if results.is_empty() {
        out.push_str("Nothing to remediate.\n");
        return out;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["State", "Finding", "Attempts", "Reason"]);
    for (finding, result) in results {
        let state = match result.state {
            RemediationState::Fixed => format!("{}", result.state.as_str().green()),
            _ => format!("{}", result.state.as_str().red()),
        };
        let attempts = result
            .attempts
            .iter()
            .map(|a| format!("{}:{}", a.strategy, a.outcome))
            .collect::<Vec<_>>()
            .join(" ");
        table.add_row(vec![
            state,
            format!("[{}] {} @ {}", finding.validator_id, finding.description, finding.location),
            if attempts.is_empty() { "-".to_string() } else { attempts },
            result.reason.clone().unwrap_or_default(),
        ]);
    }
    out.push_str(&format!("{}\n", table));
    out
}

pub fn format_escalations(records: &[EscalationRecord]) -> String {
    let mut out = format!("{}\n\n", format_section_heading("Escalations"));
    if records.is_empty() {
        out.push_str("No escalated findings.\n");
        return out;
    }
    for record in records {
        out.push_str(&format!(
            "{} {} [{}] {} @ {}\n  {}\n",
            record.escalated_at.to_rfc3339(),
            colored_severity(record.finding.severity),
            record.finding.validator_id,
            record.finding.description,
            record.finding.location,
            record.reason
        ));
        for attempt in &record.attempts {
            out.push_str(&format!(
                "  #{} {} {}{}\n",
                attempt.iteration,
                attempt.strategy,
                attempt.outcome,
                attempt
                    .error
                    .as_deref()
                    .map(|e| format!(": {}", e))
                    .unwrap_or_default()
            ));
        }
    }
    out
}
