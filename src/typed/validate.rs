//! Eager validation and the builder handed out by the runtime wrappers.
use std::sync::Arc;

use super::TrustedNode;
use super::lazy::LazyNode;
use crate::datamodel::{
    Kind, Link, ListAssembler, ListCollector, MapAssembler, MapCollector, Node, NodeBuilder,
    NodeRef, Value,
};
use crate::error::{BuildError, Mismatch, NodeError};
use crate::schema::{TypeRef, TypeShape};

/// Check every path of `node` against `ty`.
///
/// Walks a [`LazyNode`] over the whole tree, so the first failure reported
/// is the one the lazy wrapper would report for the same read order.
pub fn validate(node: &NodeRef, ty: &TypeRef) -> Result<(), NodeError> {
    let view = LazyNode::new(node.clone(), ty.clone());
    visit(&view).inspect_err(|err| {
        tracing::debug!(type_name = ty.name(), error = %err, "validation failed");
    })
}

fn visit(node: &dyn Node) -> Result<(), NodeError> {
    // bare nulls and absent placeholders carry no type
    if node.typed().is_none() {
        return Ok(());
    }
    match node.kind() {
        Kind::Null => {}
        Kind::Bool => {
            node.as_bool()?;
        }
        Kind::Int => {
            node.as_int()?;
        }
        Kind::Float => {
            node.as_float()?;
        }
        Kind::String => {
            node.as_string()?;
        }
        Kind::Bytes => {
            node.as_bytes()?;
        }
        Kind::Link => {
            node.as_link()?;
        }
        Kind::List => {
            for entry in node.list_iter()? {
                let (_, item) = entry?;
                visit(&*item)?;
            }
        }
        Kind::Map => {
            for entry in node.map_iter()? {
                let (_, value) = entry?;
                visit(&*value)?;
            }
        }
    }
    Ok(())
}

/// Builds basic values for a schema type and checks each finished value
/// once, yielding [`TrustedNode`]s.
///
/// Map inserts are checked one at a time, the way generated assemblers
/// check them: a repeated key, a key the record does not declare, a record
/// field value that does not fit, and a key outside an enum key type all
/// fail at the insert. Missing required fields and the values of plain
/// maps and lists are reported when the value is finished.
#[derive(Debug, Clone)]
pub struct ValidatingBuilder {
    ty: TypeRef,
}

impl ValidatingBuilder {
    pub fn new(ty: TypeRef) -> Self {
        ValidatingBuilder { ty }
    }

    fn seal(ty: &TypeRef, value: Value) -> Result<NodeRef, BuildError> {
        let node = TrustedNode::validated(value.into_node(), ty.clone())?;
        Ok(Arc::new(node))
    }
}

impl NodeBuilder for ValidatingBuilder {
    fn create_null(&self) -> Result<NodeRef, BuildError> {
        Self::seal(&self.ty, Value::Null)
    }
    fn create_bool(&self, value: bool) -> Result<NodeRef, BuildError> {
        Self::seal(&self.ty, Value::Bool(value))
    }
    fn create_int(&self, value: i64) -> Result<NodeRef, BuildError> {
        Self::seal(&self.ty, Value::Int(value))
    }
    fn create_float(&self, value: f64) -> Result<NodeRef, BuildError> {
        Self::seal(&self.ty, Value::Float(value))
    }
    fn create_string(&self, value: &str) -> Result<NodeRef, BuildError> {
        Self::seal(&self.ty, Value::from(value))
    }
    fn create_bytes(&self, value: &[u8]) -> Result<NodeRef, BuildError> {
        Self::seal(&self.ty, Value::Bytes(value.to_vec()))
    }
    fn create_link(&self, value: &Link) -> Result<NodeRef, BuildError> {
        Self::seal(&self.ty, Value::Link(value.clone()))
    }
    fn create_list(&self) -> Result<Box<dyn ListAssembler>, BuildError> {
        let ty = self.ty.clone();
        Ok(Box::new(ListCollector::new(move |value| Self::seal(&ty, value))))
    }
    fn create_map(&self) -> Result<Box<dyn MapAssembler>, BuildError> {
        let ty = self.ty.clone();
        let checked = self.ty.clone();
        let collector = MapCollector::new(move |value| Self::seal(&ty, value))
            .with_entry_check(move |key, value| check_entry(&checked, key, value));
        Ok(Box::new(collector))
    }
}

fn check_entry(ty: &TypeRef, key: &str, value: &NodeRef) -> Result<(), NodeError> {
    match ty.shape() {
        TypeShape::Record(record) => {
            let Some(field) = record.field(key) else {
                return Err(NodeError::SchemaMismatch {
                    type_name: ty.name().to_owned(),
                    field: key.to_owned(),
                    reason: Mismatch::Unexpected,
                });
            };
            if value.is_absent() && field.optional {
                return Ok(());
            }
            if value.is_null() && !value.is_absent() && field.nullable {
                return Ok(());
            }
            validate(value, &ty.child(field.type_id))
        }
        TypeShape::Map(map) => {
            let key_ty = ty.schema().get(map.key_type);
            match key_ty.shape() {
                TypeShape::Enum(members) if !members.contains(key) => Err(NodeError::UnrecognizedMember {
                    type_name: key_ty.name().to_owned(),
                    member: key.to_owned(),
                }),
                _ => Ok(()),
            }
        }
        _ => Ok(()),
    }
}
