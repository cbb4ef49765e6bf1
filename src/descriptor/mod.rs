//! Agent Descriptors
//!
//! Loads and indexes the capability descriptors that declare what each agent
//! may do: an allow-list, a deny-list, exclusive actions, and its place in the
//! reporting hierarchy.

pub mod model;
pub mod parse;
pub mod store;
pub mod validation;

pub use model::AgentDescriptor;
pub use parse::{extract_structured_block, parse_descriptor_file, parse_descriptor_str};
pub use store::{DescriptorStore, LoadReport, SkippedDescriptor};
pub use validation::{validate_descriptor, ValidationResult};
