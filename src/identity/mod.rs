//! Identity Isolation
//!
//! At most one agent identity is active at any instant. Activation,
//! deactivation and reload all go through [`IdentityGuard`], which re-reads the
//! persisted session on every call.

pub mod bleed;
pub mod guard;

pub use bleed::{detect_impersonation, BleedCheck};
pub use guard::IdentityGuard;
