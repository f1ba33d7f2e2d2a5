//! Error types for model reconciliation.

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// The kind of schema element an error refers to.
///
/// Entities, properties, indexes and relations share one UID namespace, so
/// errors about UIDs always say which kind of element they were looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// An entity (a stored type).
    Entity,
    /// A property of an entity.
    Property,
    /// The index of a property.
    Index,
    /// A standalone (many-to-many) relation owned by an entity.
    Relation,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Entity => "entity",
            Self::Property => "property",
            Self::Index => "index",
            Self::Relation => "relation",
        };
        f.write_str(name)
    }
}

/// Outcome of a UID request that could not be satisfied silently.
///
/// A binding element that asks for its UID to be reported never gets one
/// assigned implicitly. The operator decides between applying the current
/// UID (a rename) or a new one (a reset).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UidRequestOutcome {
    /// A same-named element exists in the model.
    Found {
        /// UID of the existing element; applying it keeps the data.
        current: u64,
        /// A fresh UID; applying it resets the element's data.
        suggested: Option<u64>,
    },
    /// No same-named element exists in the model.
    NotFound,
}

impl fmt::Display for UidRequestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found {
                current,
                suggested: Some(suggested),
            } => write!(
                f,
                "[rename] apply the current UID {current}; [change/reset] apply a new UID {suggested}"
            ),
            Self::Found {
                current,
                suggested: None,
            } => write!(f, "model UID = {current}"),
            Self::NotFound => f.write_str("not found in the model"),
        }
    }
}

/// Errors that can occur while loading, reconciling or writing a model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Another process holds the model file.
    #[error("model file locked: {path} is in use by another process")]
    ModelLocked {
        /// Path of the model file.
        path: String,
    },

    /// The model file exists but cannot be parsed.
    #[error("can't read model file {path}: {source}")]
    Unreadable {
        /// Path of the model file.
        path: String,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// An identity string is malformed or incomplete.
    #[error("invalid identity '{value}': {reason}")]
    InvalidIdUid {
        /// The offending value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// An explicit UID has no counterpart in the model.
    #[error("{kind} with UID {uid} not found in {scope}")]
    UnknownUid {
        /// Kind of element looked up.
        kind: ElementKind,
        /// The UID that was not found.
        uid: u64,
        /// Where it was looked up (an entity name or "the model").
        scope: String,
    },

    /// A named element has no counterpart in the model.
    #[error("{kind} '{name}' not found in {scope}")]
    NotFound {
        /// Kind of element looked up.
        kind: ElementKind,
        /// The name that was not found.
        name: String,
        /// Where it was looked up.
        scope: String,
    },

    /// A binding element asked for its UID to be reported.
    #[error("uid annotation value must not be empty on {kind} '{name}' in {scope}: {outcome}")]
    UidRequest {
        /// Kind of element.
        kind: ElementKind,
        /// Binding name of the element.
        name: String,
        /// Where it was resolved.
        scope: String,
        /// What the model knows about the element.
        outcome: UidRequestOutcome,
    },

    /// A relation names a target entity that does not exist.
    #[error("relation '{relation}' on entity '{entity}' targets unknown entity '{target}'")]
    RelationTargetMissing {
        /// Relation name.
        relation: String,
        /// Owning entity name.
        entity: String,
        /// Missing target entity name.
        target: String,
    },

    /// A UID is already used by another element or was retired.
    #[error("UID {uid} is already in use or retired")]
    UidInUse {
        /// The UID.
        uid: u64,
    },

    /// A local ID counter cannot be incremented any further.
    #[error("{kind} ID counter overflow")]
    CounterOverflow {
        /// Kind of element whose counter overflowed.
        kind: ElementKind,
    },

    /// No unused UID could be generated.
    #[error("could not generate a unique UID after {attempts} attempts")]
    UidPoolExhausted {
        /// Number of attempts made.
        attempts: u32,
    },

    /// The binding description is inconsistent.
    #[error("invalid binding: {message}")]
    InvalidBinding {
        /// Description of the problem.
        message: String,
    },

    /// The model document violates an invariant.
    #[error("invalid model: {message}")]
    InvalidModel {
        /// Description of the violated invariant.
        message: String,
    },

    /// The model file was written by a newer tool.
    #[error(
        "unsupported model version {found} (requires parser version {required}, supported {supported})"
    )]
    UnsupportedVersion {
        /// `modelVersion` found in the file.
        found: u32,
        /// `modelVersionParserMinimum` found in the file.
        required: u32,
        /// Highest model version this crate understands.
        supported: u32,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl ModelError {
    /// Creates an invalid identity error.
    pub fn invalid_id_uid(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidIdUid {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Creates an unknown UID error.
    pub fn unknown_uid(kind: ElementKind, uid: u64, scope: impl Into<String>) -> Self {
        Self::UnknownUid {
            kind,
            uid,
            scope: scope.into(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found(kind: ElementKind, name: impl Into<String>, scope: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
            scope: scope.into(),
        }
    }

    /// Creates an invalid binding error.
    pub fn invalid_binding(message: impl Into<String>) -> Self {
        Self::InvalidBinding {
            message: message.into(),
        }
    }

    /// Creates an invalid model error.
    pub fn invalid_model(message: impl Into<String>) -> Self {
        Self::InvalidModel {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns the UID request outcome if this error is a UID request.
    #[must_use]
    pub fn uid_request_outcome(&self) -> Option<UidRequestOutcome> {
        match self {
            Self::UidRequest { outcome, .. } => Some(*outcome),
            _ => None,
        }
    }
}
