//! Integration tests for the Warden governance runtime

mod cli_contract;
mod identity_session;
mod properties;
mod remediation_bound;
mod scope_scenarios;
mod support;
