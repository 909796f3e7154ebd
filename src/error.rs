//! Error taxonomy shared by generic nodes, typed nodes and builders.
use std::fmt;

use thiserror::Error;

use crate::datamodel::Kind;

/// Failure reported by a read operation on a node.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NodeError {
    /// The operation does not apply to a node of this kind
    /// (e.g. `lookup_index` on a map).
    #[error("`{method}` is not applicable to a {kind} node")]
    WrongKind { method: &'static str, kind: Kind },

    /// Plain map lookup of a key that is not present.
    #[error("key {key:?} not found")]
    NotFound { key: String },

    #[error("index {index} out of range for length {length}")]
    OutOfRange { index: usize, length: usize },

    /// Structure present but with a name or arity the type does not declare.
    #[error("type {type_name}: {reason} field {field:?}")]
    SchemaMismatch {
        type_name: String,
        field: String,
        reason: Mismatch,
    },

    /// Value of the wrong primitive kind for the requested accessor or the type.
    #[error("type {type_name}: expected {expected}, found {found}")]
    KindMismatch {
        type_name: String,
        expected: Kind,
        found: Kind,
    },

    /// Enum symbol or union discriminant outside the declared set.
    #[error("type {type_name} has no member {member:?}")]
    UnrecognizedMember { type_name: String, member: String },
}

/// Why a [`NodeError::SchemaMismatch`] was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mismatch {
    /// The name is not part of the declared field set.
    Undeclared,
    /// A required field has no value in the backing node.
    Missing,
    /// The backing node carries a key the type does not declare.
    Unexpected,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mismatch::Undeclared => "undeclared",
            Mismatch::Missing => "missing",
            Mismatch::Unexpected => "unexpected",
        })
    }
}

impl NodeError {
    pub fn is_schema_mismatch(&self) -> bool {
        matches!(self, NodeError::SchemaMismatch { .. })
    }

    pub fn is_kind_mismatch(&self) -> bool {
        matches!(self, NodeError::KindMismatch { .. })
    }

    pub fn is_unrecognized_member(&self) -> bool {
        matches!(self, NodeError::UnrecognizedMember { .. })
    }
}

/// Failure reported while constructing a node.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    /// The input violated the target type the same way a read would.
    #[error(transparent)]
    Node(#[from] NodeError),

    #[error("type {type_name}: missing required field {field:?}")]
    MissingField { type_name: String, field: String },

    #[error("duplicate key {key:?}")]
    DuplicateKey { key: String },
}

impl BuildError {
    /// The read error behind this build error, if any.
    pub fn node_error(&self) -> Option<&NodeError> {
        match self {
            BuildError::Node(err) => Some(err),
            _ => None,
        }
    }
}
