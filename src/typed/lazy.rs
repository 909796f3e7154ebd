//! Wrapper that validates on access.
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::union::{self as select, Selection};
use super::{NestingPolicy, TypedNode, ValidatingBuilder, expected_kind};
use crate::datamodel::{
    Kind, Link, ListIter, MapIter, Node, NodeBuilder, NodeRef, UntilError, absent, wrong_kind,
};
use crate::error::{Mismatch, NodeError};
use crate::schema::{
    EnumType, Field, ListType, MapType, Presence, RecordType, TypeId, TypeRef, TypeShape,
    UnionType,
};

/// Typed view over an arbitrary generic node.
///
/// Construction checks nothing. Every operation checks the facts it
/// depends on before delegating, so a violation is reported by the first
/// access that needs it and unvisited subtrees are never looked at.
/// Resolved record fields and the selected union member are memoized for
/// the wrapper's lifetime; concurrent readers may race to fill a slot,
/// which only repeats the same check.
pub struct LazyNode {
    node: NodeRef,
    ty: TypeRef,
    policy: NestingPolicy,
    skip_key: Option<String>,
    fields: OnceCell<Box<[OnceCell<NodeRef>]>>,
    member: OnceCell<Box<LazyNode>>,
}

impl LazyNode {
    pub fn new(node: NodeRef, ty: TypeRef) -> Self {
        Self::with_policy(node, ty, NestingPolicy::default())
    }

    pub fn with_policy(node: NodeRef, ty: TypeRef, policy: NestingPolicy) -> Self {
        LazyNode {
            node,
            ty,
            policy,
            skip_key: None,
            fields: OnceCell::new(),
            member: OnceCell::new(),
        }
    }

    /// The wrapped node.
    pub fn backing(&self) -> &NodeRef {
        &self.node
    }

    pub fn policy(&self) -> NestingPolicy {
        self.policy
    }

    fn type_name(&self) -> String {
        self.ty.name().to_owned()
    }

    /// Requested coercion `found` does not fit the bound type.
    fn kind_mismatch(&self, found: Kind) -> NodeError {
        NodeError::KindMismatch {
            type_name: self.type_name(),
            expected: expected_kind(self.ty.get()),
            found,
        }
    }

    fn expect_backing(&self, expected: Kind) -> Result<(), NodeError> {
        let found = self.node.kind();
        if found == expected {
            Ok(())
        } else {
            Err(NodeError::KindMismatch {
                type_name: self.type_name(),
                expected,
                found,
            })
        }
    }

    fn member(&self, union: &UnionType) -> Result<&LazyNode, NodeError> {
        let member = self.member.get_or_try_init(|| {
            let Selection {
                member,
                content,
                skip_key,
            } = select::select(self.ty.name(), union, &self.node, true)?;
            Ok::<_, NodeError>(Box::new(LazyNode {
                skip_key,
                ..LazyNode::with_policy(content, self.ty.child(member), self.policy)
            }))
        })?;
        Ok(&**member)
    }

    /// Check `node` against the child type `type_id` and wrap it.
    fn child(&self, node: NodeRef, type_id: TypeId, nullable: bool) -> Result<NodeRef, NodeError> {
        let child_ty = self.ty.child(type_id);
        if node.is_null() {
            if nullable && !node.is_absent() {
                return Ok(node);
            }
            return Err(NodeError::KindMismatch {
                type_name: child_ty.name().to_owned(),
                expected: expected_kind(child_ty.get()),
                found: Kind::Null,
            });
        }
        if self.policy == NestingPolicy::Project && node.typed().is_some() {
            return Ok(node);
        }
        let found = node.kind();
        if !child_ty.get().accepts_kind(found) {
            tracing::trace!(type_name = child_ty.name(), %found, "child kind rejected");
            return Err(NodeError::KindMismatch {
                type_name: child_ty.name().to_owned(),
                expected: expected_kind(child_ty.get()),
                found,
            });
        }
        Ok(Arc::new(LazyNode::with_policy(node, child_ty, self.policy)))
    }

    fn record_field(&self, record: &RecordType, index: usize, field: &Field) -> Result<NodeRef, NodeError> {
        let slots = self
            .fields
            .get_or_init(|| (0..record.len()).map(|_| OnceCell::new()).collect());
        slots[index]
            .get_or_try_init(|| self.resolve_field(field))
            .cloned()
    }

    /// An inner typed node answers for its own schema version: a field it
    /// does not declare, or declares optional and lacks, reads as missing.
    fn resolve_field(&self, field: &Field) -> Result<NodeRef, NodeError> {
        self.expect_backing(Kind::Map)?;
        match self.node.lookup_field(&field.name) {
            Ok(value) if value.is_absent() => self.missing_field(field),
            Ok(value) => self.child(value, field.type_id, field.nullable),
            Err(NodeError::NotFound { .. })
            | Err(NodeError::SchemaMismatch {
                reason: Mismatch::Undeclared,
                ..
            }) => self.missing_field(field),
            Err(err) => Err(err),
        }
    }

    fn missing_field(&self, field: &Field) -> Result<NodeRef, NodeError> {
        if field.optional {
            return Ok(absent());
        }
        Err(NodeError::SchemaMismatch {
            type_name: self.type_name(),
            field: field.name.clone(),
            reason: Mismatch::Missing,
        })
    }

    /// First backing key the record does not declare. Absent placeholders
    /// yielded by an inner typed node are not keys of the data.
    fn unexpected_key(&self, record: &RecordType) -> Result<Option<String>, NodeError> {
        for entry in self.node.map_iter()? {
            let (key, value) = entry?;
            if value.is_absent() {
                continue;
            }
            if record.field(&key).is_none() && self.skip_key.as_deref() != Some(key.as_str()) {
                return Ok(Some(key));
            }
        }
        Ok(None)
    }

    fn record_length(&self, record: &RecordType) -> Result<usize, NodeError> {
        self.expect_backing(Kind::Map)?;
        let mut length = 0;
        for (index, field) in record.fields().enumerate() {
            if field.presence() == Presence::Omittable
                && self.record_field(record, index, field)?.is_absent()
            {
                continue;
            }
            length += 1;
        }
        Ok(length)
    }

    fn map_key(&self, map: &MapType, key: &str) -> Result<(), NodeError> {
        let key_ty = self.ty.child(map.key_type);
        match key_ty.shape() {
            TypeShape::Enum(members) if !members.contains(key) => Err(NodeError::UnrecognizedMember {
                type_name: key_ty.name().to_owned(),
                member: key.to_owned(),
            }),
            _ => Ok(()),
        }
    }

    fn map_entries<'a>(&'a self, map: &'a MapType) -> Result<MapIter<'a>, NodeError> {
        self.expect_backing(Kind::Map)?;
        let entries = self.node.map_iter()?;
        Ok(Box::new(UntilError::new(entries.map(
            move |entry| -> Result<(String, NodeRef), NodeError> {
                let (key, value) = entry?;
                self.map_key(map, &key)?;
                let value = self.child(value, map.value_type, map.value_nullable)?;
                Ok((key, value))
            },
        ))))
    }

    fn list_items<'a>(&'a self, list: &'a ListType) -> Result<ListIter<'a>, NodeError> {
        self.expect_backing(Kind::List)?;
        let items = self.node.list_iter()?;
        Ok(Box::new(UntilError::new(items.map(
            move |entry| -> Result<(usize, NodeRef), NodeError> {
                let (index, item) = entry?;
                Ok((index, self.child(item, list.value_type, list.value_nullable)?))
            },
        ))))
    }

    fn enum_symbol(&self, members: &EnumType) -> Result<&str, NodeError> {
        self.expect_backing(Kind::String)?;
        let symbol = self.node.as_string()?;
        if !members.contains(symbol) {
            return Err(NodeError::UnrecognizedMember {
                type_name: self.type_name(),
                member: symbol.to_owned(),
            });
        }
        Ok(symbol)
    }
}

/// Declared-order iteration over a lazily checked record. After the last
/// declared field the backing map is scanned once for undeclared keys.
struct RecordEntries<'a> {
    owner: &'a LazyNode,
    record: &'a RecordType,
    next: usize,
    done: bool,
}

impl Iterator for RecordEntries<'_> {
    type Item = Result<(String, NodeRef), NodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let record = self.record;
        while let Some(field) = record.field_at(self.next) {
            let index = self.next;
            self.next += 1;
            match self.owner.record_field(record, index, field) {
                Ok(value) if value.is_absent() && field.presence() == Presence::Omittable => continue,
                Ok(value) => return Some(Ok((field.name.clone(), value))),
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
        self.done = true;
        match self.owner.unexpected_key(record) {
            Ok(None) => None,
            Ok(Some(key)) => Some(Err(NodeError::SchemaMismatch {
                type_name: self.owner.type_name(),
                field: key,
                reason: Mismatch::Unexpected,
            })),
            Err(err) => Some(Err(err)),
        }
    }
}

macro_rules! scalar_coercion {
    ($method:ident, $ret:ty, $shape:ident, $kind:ident) => {
        fn $method(&self) -> Result<$ret, NodeError> {
            match self.ty.shape() {
                TypeShape::$shape => {
                    self.expect_backing(Kind::$kind)?;
                    self.node.$method()
                }
                TypeShape::Union(union) => self.member(union)?.$method(),
                _ => Err(self.kind_mismatch(Kind::$kind)),
            }
        }
    };
}

impl Node for LazyNode {
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
            TypeShape::Record(record) => match record.field_full(name) {
                Some((index, field)) => self.record_field(record, index, field),
                None => Err(NodeError::SchemaMismatch {
                    type_name: self.type_name(),
                    field: name.to_owned(),
                    reason: Mismatch::Undeclared,
                }),
            },
            TypeShape::Map(map) => {
                self.expect_backing(Kind::Map)?;
                self.map_key(map, name)?;
                let value = self.node.lookup_field(name)?;
                self.child(value, map.value_type, map.value_nullable)
            }
            TypeShape::Union(union) => self.member(union)?.lookup_field(name),
            _ => Err(wrong_kind("lookup_field", self.kind())),
        }
    }

    fn lookup_index(&self, index: usize) -> Result<NodeRef, NodeError> {
        match self.ty.shape() {
            TypeShape::Record(record) => match record.field_at(index) {
                Some(field) => self.record_field(record, index, field),
                None => Err(NodeError::OutOfRange {
                    index,
                    length: record.len(),
                }),
            },
            TypeShape::List(list) => {
                self.expect_backing(Kind::List)?;
                let item = self.node.lookup_index(index)?;
                self.child(item, list.value_type, list.value_nullable)
            }
            TypeShape::Union(union) => self.member(union)?.lookup_index(index),
            _ => Err(wrong_kind("lookup_index", self.kind())),
        }
    }

    fn map_iter(&self) -> Result<MapIter<'_>, NodeError> {
        match self.ty.shape() {
            TypeShape::Record(record) => {
                self.expect_backing(Kind::Map)?;
                Ok(Box::new(RecordEntries {
                    owner: self,
                    record,
                    next: 0,
                    done: false,
                }))
            }
            TypeShape::Map(map) => self.map_entries(map),
            TypeShape::Union(union) => self.member(union)?.map_iter(),
            _ => Err(wrong_kind("map_iter", self.kind())),
        }
    }

    fn list_iter(&self) -> Result<ListIter<'_>, NodeError> {
        match self.ty.shape() {
            TypeShape::List(list) => self.list_items(list),
            TypeShape::Union(union) => self.member(union)?.list_iter(),
            _ => Err(wrong_kind("list_iter", self.kind())),
        }
    }

    fn length(&self) -> Result<usize, NodeError> {
        match self.ty.shape() {
            TypeShape::Record(record) => self.record_length(record),
            TypeShape::Map(_) => {
                self.expect_backing(Kind::Map)?;
                self.node.length()
            }
            TypeShape::List(_) => {
                self.expect_backing(Kind::List)?;
                self.node.length()
            }
            TypeShape::Union(union) => self.member(union)?.length(),
            _ => Err(wrong_kind("length", self.kind())),
        }
    }

    fn is_null(&self) -> bool {
        false
    }

    scalar_coercion!(as_bool, bool, Bool, Bool);
    scalar_coercion!(as_int, i64, Int, Int);
    scalar_coercion!(as_float, f64, Float, Float);
    scalar_coercion!(as_bytes, &[u8], Bytes, Bytes);
    scalar_coercion!(as_link, &Link, Link, Link);

    fn as_string(&self) -> Result<&str, NodeError> {
        match self.ty.shape() {
            TypeShape::String => {
                self.expect_backing(Kind::String)?;
                self.node.as_string()
            }
            TypeShape::Enum(members) => self.enum_symbol(members),
            TypeShape::Union(union) => self.member(union)?.as_string(),
            _ => Err(self.kind_mismatch(Kind::String)),
        }
    }

    fn node_builder(&self) -> Box<dyn NodeBuilder> {
        Box::new(ValidatingBuilder::new(self.ty.clone()))
    }

    fn typed(&self) -> Option<&dyn TypedNode> {
        Some(self)
    }
}

impl TypedNode for LazyNode {
    fn schema_type(&self) -> TypeRef {
        self.ty.clone()
    }
}

impl fmt::Debug for LazyNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyNode")
            .field("type", &self.ty.name())
            .field("node", &self.node)
            .finish()
    }
}
