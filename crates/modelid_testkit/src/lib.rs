//! # modelid Testkit
//!
//! Test utilities for modelid.
//!
//! This crate provides:
//! - Temporary model files and sample documents
//! - Binding builders and deterministic UID pools
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use modelid_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_model() {
//!     with_temp_model(|model| {
//!         let mut binding = task_binding();
//!         model.merge(&mut binding).unwrap();
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
