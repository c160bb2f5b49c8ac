//! CLI command implementations

pub mod count;
pub mod query;
pub mod spec;
