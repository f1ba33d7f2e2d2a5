//! # modelid Core
//!
//! Model reconciliation engine for code generators.
//!
//! This crate provides:
//! - Identity pairs (local ID plus global UID) for schema elements
//! - UID allocation that never reuses an active or retired UID
//! - The persisted model document with its counters and retired lists
//! - The reconciler that merges a parsed binding into the model
//! - Locked load/write/close of the model file

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod binding;
pub mod config;
pub mod error;
pub mod flags;
pub mod id;
pub mod model;
pub mod reconcile;
pub mod store;
pub mod uid;

pub use binding::{Binding, BindingEntity, BindingProperty, BindingRelation};
pub use config::Config;
pub use error::{ElementKind, ModelError, ModelResult, UidRequestOutcome};
pub use flags::PropertyFlags;
pub use id::IdUid;
pub use model::{
    Entity, ModelDocument, Property, StandaloneRelation, LEGACY_MODEL_VERSION, MODEL_VERSION,
};
pub use reconcile::{ReconcileReport, Reconciler};
pub use store::{reconcile_file, ModelFile};
pub use uid::UidPool;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
