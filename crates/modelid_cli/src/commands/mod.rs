//! CLI command implementations.

pub mod inspect;
pub mod merge;
pub mod validate;
