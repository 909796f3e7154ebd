//! Runtime surface for generated code.
//!
//! Generated modules import this as `rt` and reach nothing else in the
//! crate, so the generator itself is never a dependency of its output.
pub use std::sync::Arc;

pub use indexmap::IndexMap;
pub use once_cell::sync::OnceCell;

pub use crate::datamodel::{
    Kind, Link, ListAssembler, ListCollector, ListIter, MapAssembler, MapCollector, MapIter, Node,
    NodeBuilder, NodeRef, Value, absent, null,
};
pub use crate::error::{BuildError, Mismatch, NodeError};
pub use crate::schema::{Schema, TypeId, TypeRef};
pub use crate::typed::union::{discriminant, envelope_content, single_entry};
pub use crate::typed::{Maybe, TypedNode};

/// Resolve the schema embedded in generated code.
///
/// # Panics
/// If `json` does not describe a valid schema. The generator only embeds
/// schemas it has resolved itself.
pub fn load_schema(json: &str) -> Arc<Schema> {
    match Schema::from_json_str(json) {
        Ok(schema) => Arc::new(schema),
        Err(err) => panic!("embedded schema is invalid: {err}"),
    }
}

pub fn expect_kind(type_name: &str, node: &dyn Node, expected: Kind) -> Result<(), NodeError> {
    match node.kind() {
        found if found == expected => Ok(()),
        found => Err(kind_mismatch(type_name, expected, found)),
    }
}

pub fn wrong_kind(method: &'static str, kind: Kind) -> NodeError {
    NodeError::WrongKind { method, kind }
}

pub fn kind_mismatch(type_name: &str, expected: Kind, found: Kind) -> NodeError {
    NodeError::KindMismatch {
        type_name: type_name.to_owned(),
        expected,
        found,
    }
}

fn schema_mismatch(type_name: &str, field: &str, reason: Mismatch) -> NodeError {
    NodeError::SchemaMismatch {
        type_name: type_name.to_owned(),
        field: field.to_owned(),
        reason,
    }
}

pub fn undeclared_field(type_name: &str, field: &str) -> NodeError {
    schema_mismatch(type_name, field, Mismatch::Undeclared)
}

pub fn missing_field(type_name: &str, field: &str) -> NodeError {
    schema_mismatch(type_name, field, Mismatch::Missing)
}

pub fn unexpected_field(type_name: &str, field: &str) -> NodeError {
    schema_mismatch(type_name, field, Mismatch::Unexpected)
}

pub fn unrecognized_member(type_name: &str, member: &str) -> NodeError {
    NodeError::UnrecognizedMember {
        type_name: type_name.to_owned(),
        member: member.to_owned(),
    }
}

pub fn not_found(key: &str) -> NodeError {
    NodeError::NotFound {
        key: key.to_owned(),
    }
}

pub fn out_of_range(index: usize, length: usize) -> NodeError {
    NodeError::OutOfRange { index, length }
}

pub fn duplicate_key(key: &str) -> BuildError {
    BuildError::DuplicateKey {
        key: key.to_owned(),
    }
}

/// Build-time form of a read failure: a missing field becomes
/// [`BuildError::MissingField`], anything else is wrapped as is.
pub fn into_build_error(err: NodeError) -> BuildError {
    match err {
        NodeError::SchemaMismatch {
            type_name,
            field,
            reason: Mismatch::Missing,
        } => BuildError::MissingField { type_name, field },
        other => BuildError::Node(other),
    }
}
