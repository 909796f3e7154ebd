//! Generic, schema-agnostic data model.
//!
//! Every value in the system, typed or not, is readable through [`Node`].
//! Nodes are immutable; building goes through a [`NodeBuilder`] which
//! always yields a fresh node.
pub mod json;
pub mod value;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use once_cell::sync::Lazy;
use ordered_float::OrderedFloat;

use crate::error::{BuildError, NodeError};
use crate::typed::TypedNode;

pub use value::{BasicBuilder, ListCollector, MapCollector, Value};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Primitive shape tag of a generic node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    Null,
    Bool,
    Int,
    Float,
    String,
    Bytes,
    List,
    Map,
    Link,
}

/// Content address pointing at another node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Link(String);

pub type NodeRef = Arc<dyn Node>;

/// Lazy `(key, value)` sequence; ends after the first error.
pub type MapIter<'a> = Box<dyn Iterator<Item = Result<(String, NodeRef), NodeError>> + 'a>;

/// Lazy `(index, value)` sequence; ends after the first error.
pub type ListIter<'a> = Box<dyn Iterator<Item = Result<(usize, NodeRef), NodeError>> + 'a>;

/// Read contract every node satisfies.
///
/// Operations that do not apply to a node's kind fail with
/// [`NodeError::WrongKind`]. All operations are side-effect free.
pub trait Node: fmt::Debug + Send + Sync {
    fn kind(&self) -> Kind;

    fn lookup_field(&self, name: &str) -> Result<NodeRef, NodeError>;

    fn lookup_index(&self, index: usize) -> Result<NodeRef, NodeError>;

    /// Fresh iterator over the entries of a map-kinded node.
    fn map_iter(&self) -> Result<MapIter<'_>, NodeError>;

    /// Fresh iterator over the items of a list-kinded node.
    fn list_iter(&self) -> Result<ListIter<'_>, NodeError>;

    fn length(&self) -> Result<usize, NodeError>;

    fn is_null(&self) -> bool;

    /// True only for the placeholder standing in for a missing optional field.
    fn is_absent(&self) -> bool {
        false
    }

    fn as_bool(&self) -> Result<bool, NodeError>;
    fn as_int(&self) -> Result<i64, NodeError>;
    fn as_float(&self) -> Result<f64, NodeError>;
    fn as_string(&self) -> Result<&str, NodeError>;
    fn as_bytes(&self) -> Result<&[u8], NodeError>;
    fn as_link(&self) -> Result<&Link, NodeError>;

    /// Builder for new nodes of the same family as this one.
    fn node_builder(&self) -> Box<dyn NodeBuilder>;

    /// Typed view of this node, if it is bound to a schema type.
    fn typed(&self) -> Option<&dyn TypedNode> {
        None
    }
}

/// Produces new nodes. Scalars are finished immediately; lists and maps
/// go through an assembler owned by a single caller until `finish`.
pub trait NodeBuilder {
    fn create_null(&self) -> Result<NodeRef, BuildError>;
    fn create_bool(&self, value: bool) -> Result<NodeRef, BuildError>;
    fn create_int(&self, value: i64) -> Result<NodeRef, BuildError>;
    fn create_float(&self, value: f64) -> Result<NodeRef, BuildError>;
    fn create_string(&self, value: &str) -> Result<NodeRef, BuildError>;
    fn create_bytes(&self, value: &[u8]) -> Result<NodeRef, BuildError>;
    fn create_link(&self, value: &Link) -> Result<NodeRef, BuildError>;
    fn create_list(&self) -> Result<Box<dyn ListAssembler>, BuildError>;
    fn create_map(&self) -> Result<Box<dyn MapAssembler>, BuildError>;
}

pub trait MapAssembler {
    fn insert(&mut self, key: &str, value: NodeRef) -> Result<(), BuildError>;
    fn finish(self: Box<Self>) -> Result<NodeRef, BuildError>;
}

pub trait ListAssembler {
    fn append(&mut self, value: NodeRef) -> Result<(), BuildError>;
    fn finish(self: Box<Self>) -> Result<NodeRef, BuildError>;
}

/// Placeholder for an optional record field that has no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Absent;

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Kind {
    pub const ALL: [Kind; 9] = [
        Kind::Null,
        Kind::Bool,
        Kind::Int,
        Kind::Float,
        Kind::String,
        Kind::Bytes,
        Kind::List,
        Kind::Map,
        Kind::Link,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Kind::Null => "null",
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::Float => "float",
            Kind::String => "string",
            Kind::Bytes => "bytes",
            Kind::List => "list",
            Kind::Map => "map",
            Kind::Link => "link",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Kind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Kind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("unknown kind {s:?}"))
    }
}

impl Link {
    pub fn new(target: impl Into<String>) -> Self {
        Link(target.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

static NULL: Lazy<NodeRef> = Lazy::new(|| Arc::new(Value::Null));
static ABSENT: Lazy<NodeRef> = Lazy::new(|| Arc::new(Absent));

/// Shared null node.
pub fn null() -> NodeRef {
    NULL.clone()
}

/// Shared absent node.
pub fn absent() -> NodeRef {
    ABSENT.clone()
}

impl Node for Absent {
    fn kind(&self) -> Kind {
        Kind::Null
    }
    fn lookup_field(&self, _name: &str) -> Result<NodeRef, NodeError> {
        Err(wrong_kind("lookup_field", Kind::Null))
    }
    fn lookup_index(&self, _index: usize) -> Result<NodeRef, NodeError> {
        Err(wrong_kind("lookup_index", Kind::Null))
    }
    fn map_iter(&self) -> Result<MapIter<'_>, NodeError> {
        Err(wrong_kind("map_iter", Kind::Null))
    }
    fn list_iter(&self) -> Result<ListIter<'_>, NodeError> {
        Err(wrong_kind("list_iter", Kind::Null))
    }
    fn length(&self) -> Result<usize, NodeError> {
        Err(wrong_kind("length", Kind::Null))
    }
    fn is_null(&self) -> bool {
        true
    }
    fn is_absent(&self) -> bool {
        true
    }
    fn as_bool(&self) -> Result<bool, NodeError> {
        Err(wrong_kind("as_bool", Kind::Null))
    }
    fn as_int(&self) -> Result<i64, NodeError> {
        Err(wrong_kind("as_int", Kind::Null))
    }
    fn as_float(&self) -> Result<f64, NodeError> {
        Err(wrong_kind("as_float", Kind::Null))
    }
    fn as_string(&self) -> Result<&str, NodeError> {
        Err(wrong_kind("as_string", Kind::Null))
    }
    fn as_bytes(&self) -> Result<&[u8], NodeError> {
        Err(wrong_kind("as_bytes", Kind::Null))
    }
    fn as_link(&self) -> Result<&Link, NodeError> {
        Err(wrong_kind("as_link", Kind::Null))
    }
    fn node_builder(&self) -> Box<dyn NodeBuilder> {
        Box::new(BasicBuilder)
    }
}

pub(crate) fn wrong_kind(method: &'static str, kind: Kind) -> NodeError {
    NodeError::WrongKind { method, kind }
}

/// Iterator adapter that stops right after yielding the first error.
pub(crate) struct UntilError<I> {
    inner: I,
    failed: bool,
}

impl<I> UntilError<I> {
    pub(crate) fn new(inner: I) -> Self {
        UntilError { inner, failed: false }
    }
}

impl<I, T> Iterator for UntilError<I>
where
    I: Iterator<Item = Result<T, NodeError>>,
{
    type Item = Result<T, NodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.inner.next()?;
        self.failed = item.is_err();
        Some(item)
    }
}

/// Structural identity: same kinds, same scalars, same entries in the same
/// order. Absent compares equal only to absent.
pub fn structural_eq(a: &dyn Node, b: &dyn Node) -> Result<bool, NodeError> {
    if a.kind() != b.kind() || a.is_absent() != b.is_absent() {
        return Ok(false);
    }
    let same = match a.kind() {
        Kind::Null => true,
        Kind::Bool => a.as_bool()? == b.as_bool()?,
        Kind::Int => a.as_int()? == b.as_int()?,
        Kind::Float => OrderedFloat(a.as_float()?) == OrderedFloat(b.as_float()?),
        Kind::String => a.as_string()? == b.as_string()?,
        Kind::Bytes => a.as_bytes()? == b.as_bytes()?,
        Kind::Link => a.as_link()? == b.as_link()?,
        Kind::List => {
            if a.length()? != b.length()? {
                return Ok(false);
            }
            for (left, right) in a.list_iter()?.zip(b.list_iter()?) {
                let ((_, left), (_, right)) = (left?, right?);
                if !structural_eq(&*left, &*right)? {
                    return Ok(false);
                }
            }
            true
        }
        Kind::Map => {
            if a.length()? != b.length()? {
                return Ok(false);
            }
            for (left, right) in a.map_iter()?.zip(b.map_iter()?) {
                let ((left_key, left), (right_key, right)) = (left?, right?);
                if left_key != right_key || !structural_eq(&*left, &*right)? {
                    return Ok(false);
                }
            }
            true
        }
    };
    Ok(same)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_round_trip() {
        for kind in Kind::ALL {
            assert_eq!(kind.name().parse::<Kind>(), Ok(kind));
        }
        assert!("record".parse::<Kind>().is_err());
    }

    #[test]
    fn absent_passes_null_test() {
        let node = absent();
        assert!(node.is_null());
        assert!(node.is_absent());
        assert_eq!(node.kind(), Kind::Null);
        assert!(!null().is_absent());
    }

    #[test]
    fn structural_eq_compares_order_and_nan() {
        let a = Value::map([("x", Value::from(1)), ("y", Value::from(f64::NAN))]);
        let b = Value::map([("x", Value::from(1)), ("y", Value::from(f64::NAN))]);
        let c = Value::map([("y", Value::from(f64::NAN)), ("x", Value::from(1))]);
        assert!(structural_eq(&a, &b).unwrap());
        assert!(!structural_eq(&a, &c).unwrap());
        assert!(!structural_eq(&*null(), &*absent()).unwrap());
    }

    #[test]
    fn until_error_stops_after_first_failure() {
        let items = vec![
            Ok(1),
            Err(NodeError::NotFound { key: "a".into() }),
            Ok(2),
        ];
        let seen: Vec<_> = UntilError::new(items.into_iter()).collect();
        assert_eq!(seen.len(), 2);
        assert!(seen[1].is_err());
    }
}
