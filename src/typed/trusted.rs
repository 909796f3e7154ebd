//! Wrapper over nodes already known to conform.
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::union::select;
use super::{NestingPolicy, TypedNode, ValidatingBuilder, expected_kind, validate};
use crate::datamodel::{
    Kind, Link, ListIter, MapIter, Node, NodeBuilder, NodeRef, UntilError, absent, wrong_kind,
};
use crate::error::{BuildError, Mismatch, NodeError};
use crate::schema::{Presence, RecordType, TypeId, TypeRef, TypeShape, UnionType};
use crate::support::into_build_error;

/// Typed view that never inspects the data it wraps.
///
/// The bound type still decides the shape of every answer: declared field
/// order, absent optional fields, union member resolution, and which
/// coercions the type admits at all. Facts about the data are not checked.
/// If the caller's conformance promise is broken, the failure surfaces
/// later as whatever the generic layer reports at the point of use.
pub struct TrustedNode {
    node: NodeRef,
    ty: TypeRef,
    policy: NestingPolicy,
    member: OnceCell<Box<TrustedNode>>,
}

impl TrustedNode {
    /// Wrap without looking at `node`. The caller guarantees that `node`
    /// conforms to `ty`.
    pub fn new_unchecked(node: NodeRef, ty: TypeRef) -> Self {
        TrustedNode {
            node,
            ty,
            policy: NestingPolicy::default(),
            member: OnceCell::new(),
        }
    }

    /// Validate the whole tree once, then wrap.
    pub fn validated(node: NodeRef, ty: TypeRef) -> Result<Self, BuildError> {
        validate(&node, &ty).map_err(into_build_error)?;
        Ok(Self::new_unchecked(node, ty))
    }

    pub fn with_policy(mut self, policy: NestingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn backing(&self) -> &NodeRef {
        &self.node
    }

    fn wrap(&self, node: NodeRef, type_id: TypeId) -> NodeRef {
        if node.is_null() || (self.policy == NestingPolicy::Project && node.typed().is_some()) {
            return node;
        }
        Arc::new(self.nested(node, type_id))
    }

    fn nested(&self, node: NodeRef, type_id: TypeId) -> TrustedNode {
        TrustedNode::new_unchecked(node, self.ty.child(type_id)).with_policy(self.policy)
    }

    fn member(&self, union: &UnionType) -> Result<&TrustedNode, NodeError> {
        let member = self.member.get_or_try_init(|| {
            let selection = select(self.ty.name(), union, &self.node, false)?;
            Ok::<_, NodeError>(Box::new(self.nested(selection.content, selection.member)))
        })?;
        Ok(&**member)
    }

    fn record_field(&self, record: &RecordType, name: &str) -> Result<NodeRef, NodeError> {
        let Some(field) = record.field(name) else {
            return Err(NodeError::SchemaMismatch {
                type_name: self.ty.name().to_owned(),
                field: name.to_owned(),
                reason: Mismatch::Undeclared,
            });
        };
        match self.node.lookup_field(name) {
            Ok(value) => Ok(self.wrap(value, field.type_id)),
            Err(NodeError::NotFound { .. })
            | Err(NodeError::SchemaMismatch {
                reason: Mismatch::Undeclared,
                ..
            }) if field.optional => Ok(absent()),
            Err(err) => Err(err),
        }
    }

    fn kind_mismatch(&self, found: Kind) -> NodeError {
        NodeError::KindMismatch {
            type_name: self.ty.name().to_owned(),
            expected: expected_kind(self.ty.get()),
            found,
        }
    }
}

macro_rules! scalar_coercion {
    ($method:ident, $ret:ty, $shape:pat => $kind:ident) => {
        fn $method(&self) -> Result<$ret, NodeError> {
            match self.ty.shape() {
                $shape => self.node.$method(),
                TypeShape::Union(union) => self.member(union)?.$method(),
                _ => Err(self.kind_mismatch(Kind::$kind)),
            }
        }
    };
}

impl Node for TrustedNode {
    /// A union reports the kind of its selected member. `kind` cannot
    /// fail, so when no member can be selected it reports the backing
    /// node's kind; the selection error is returned by the first operation
    /// that reads through the member.
    fn kind(&self) -> Kind {
        match self.ty.shape() {
            TypeShape::Union(union) => self
                .member(union)
                .map(|member| member.kind())
                .unwrap_or_else(|_| self.node.kind()),
            _ => expected_kind(self.ty.get()),
        }
    }

    fn lookup_field(&self, name: &str) -> Result<NodeRef, NodeError> {
        match self.ty.shape() {
            TypeShape::Record(record) => self.record_field(record, name),
            TypeShape::Map(map) => Ok(self.wrap(self.node.lookup_field(name)?, map.value_type)),
            TypeShape::Union(union) => self.member(union)?.lookup_field(name),
            _ => Err(wrong_kind("lookup_field", self.kind())),
        }
    }

    fn lookup_index(&self, index: usize) -> Result<NodeRef, NodeError> {
        match self.ty.shape() {
            TypeShape::Record(record) => match record.field_at(index) {
                Some(field) => self.record_field(record, &field.name),
                None => Err(NodeError::OutOfRange {
                    index,
                    length: record.len(),
                }),
            },
            TypeShape::List(list) => Ok(self.wrap(self.node.lookup_index(index)?, list.value_type)),
            TypeShape::Union(union) => self.member(union)?.lookup_index(index),
            _ => Err(wrong_kind("lookup_index", self.kind())),
        }
    }

    fn map_iter(&self) -> Result<MapIter<'_>, NodeError> {
        match self.ty.shape() {
            TypeShape::Record(record) => Ok(Box::new(UntilError::new(record.fields().filter_map(
                move |field| match self.record_field(record, &field.name) {
                    Ok(value) if value.is_absent() && field.presence() == Presence::Omittable => None,
                    Ok(value) => Some(Ok((field.name.clone(), value))),
                    Err(err) => Some(Err(err)),
                },
            )))),
            TypeShape::Map(map) => {
                let entries = self.node.map_iter()?;
                Ok(Box::new(UntilError::new(entries.map(
                    move |entry| -> Result<(String, NodeRef), NodeError> {
                        let (key, value) = entry?;
                        Ok((key, self.wrap(value, map.value_type)))
                    },
                ))))
            }
            TypeShape::Union(union) => self.member(union)?.map_iter(),
            _ => Err(wrong_kind("map_iter", self.kind())),
        }
    }

    fn list_iter(&self) -> Result<ListIter<'_>, NodeError> {
        match self.ty.shape() {
            TypeShape::List(list) => {
                let items = self.node.list_iter()?;
                Ok(Box::new(UntilError::new(items.map(
                    move |entry| -> Result<(usize, NodeRef), NodeError> {
                        let (index, item) = entry?;
                        Ok((index, self.wrap(item, list.value_type)))
                    },
                ))))
            }
            TypeShape::Union(union) => self.member(union)?.list_iter(),
            _ => Err(wrong_kind("list_iter", self.kind())),
        }
    }

    fn length(&self) -> Result<usize, NodeError> {
        match self.ty.shape() {
            TypeShape::Record(record) => {
                let mut length = 0;
                for field in record.fields() {
                    if field.presence() == Presence::Omittable
                        && self.record_field(record, &field.name)?.is_absent()
                    {
                        continue;
                    }
                    length += 1;
                }
                Ok(length)
            }
            TypeShape::Map(_) | TypeShape::List(_) => self.node.length(),
            TypeShape::Union(union) => self.member(union)?.length(),
            _ => Err(wrong_kind("length", self.kind())),
        }
    }

    fn is_null(&self) -> bool {
        false
    }

    scalar_coercion!(as_bool, bool, TypeShape::Bool => Bool);
    scalar_coercion!(as_int, i64, TypeShape::Int => Int);
    scalar_coercion!(as_float, f64, TypeShape::Float => Float);
    scalar_coercion!(as_string, &str, TypeShape::String | TypeShape::Enum(_) => String);
    scalar_coercion!(as_bytes, &[u8], TypeShape::Bytes => Bytes);
    scalar_coercion!(as_link, &Link, TypeShape::Link => Link);

    fn node_builder(&self) -> Box<dyn NodeBuilder> {
        Box::new(ValidatingBuilder::new(self.ty.clone()))
    }

    fn typed(&self) -> Option<&dyn TypedNode> {
        Some(self)
    }
}

impl TypedNode for TrustedNode {
    fn schema_type(&self) -> TypeRef {
        self.ty.clone()
    }
}

impl fmt::Debug for TrustedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustedNode")
            .field("type", &self.ty.name())
            .field("node", &self.node)
            .finish()
    }
}
