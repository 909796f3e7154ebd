//! Typed nodes: generic nodes bound to a schema type.
//!
//! Three families implement [`TypedNode`]:
//!
//! - [`TrustedNode`] wraps a node the caller already knows conforms and
//!   checks nothing.
//! - [`LazyNode`] wraps any node and checks each fact the first time an
//!   access depends on it.
//! - Generated types (see [`crate::codegen`]) own their data in a layout
//!   fixed by the type, so there is nothing left to check after building.
//!
//! All three present the same type-level view: records iterate in declared
//! field order, optional fields with no value read as absent, and a union
//! value reads as its selected member.
pub mod lazy;
pub mod trusted;
pub mod union;
pub mod validate;

use std::ops::Deref;

use crate::datamodel::{Kind, Node};
use crate::schema::{Type, TypeKind, TypeRef};

pub use lazy::LazyNode;
pub use trusted::TrustedNode;
pub use validate::{ValidatingBuilder, validate};

/// A node that is bound to exactly one schema type for its whole lifetime.
pub trait TypedNode: Node {
    /// The bound type. Never computed from the data.
    fn schema_type(&self) -> TypeRef;

    /// Schema-level kind (`Record`, `Union`, ...), as opposed to the data
    /// model [`Node::kind`] generic readers see.
    fn type_kind(&self) -> TypeKind {
        self.schema_type().kind()
    }
}

/// What a wrapper does when the tree it wraps already contains typed nodes,
/// e.g. values produced against another version of a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NestingPolicy {
    /// Read the inner value's generic form through this schema's field type.
    #[default]
    Reinterpret,
    /// Hand the inner typed node out unchanged, exposing its own type.
    Project,
}

/// Value slot of a field that may be missing or null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Maybe<T> {
    Absent,
    Null,
    Value(T),
}

impl<T> Default for Maybe<T> {
    fn default() -> Self {
        Maybe::Absent
    }
}

impl<T> Maybe<T> {
    pub fn as_ref(&self) -> Maybe<&T> {
        match self {
            Maybe::Absent => Maybe::Absent,
            Maybe::Null => Maybe::Null,
            Maybe::Value(value) => Maybe::Value(value),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Maybe<U> {
        match self {
            Maybe::Absent => Maybe::Absent,
            Maybe::Null => Maybe::Null,
            Maybe::Value(value) => Maybe::Value(f(value)),
        }
    }

    pub fn value(self) -> Option<T> {
        match self {
            Maybe::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Maybe::Absent)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Maybe::Null)
    }
}

impl<T: Deref> Maybe<T> {
    pub fn as_deref(&self) -> Maybe<&T::Target> {
        self.as_ref().map(|value| &**value)
    }
}

/// Data model kind a conforming value of `ty` is expected to have; the
/// first admissible one for kinded unions.
pub(crate) fn expected_kind(ty: &Type) -> Kind {
    ty.repr_kinds().first().copied().unwrap_or(Kind::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn maybe_derefs_through_arc() {
        let slot: Maybe<Arc<String>> = Maybe::Value(Arc::new("x".to_owned()));
        assert_eq!(slot.as_deref().map(String::as_str), Maybe::Value("x"));
        assert!(Maybe::<Arc<String>>::Absent.as_deref().is_absent());
        assert_eq!(Maybe::<u8>::Null.value(), None);
    }
}
