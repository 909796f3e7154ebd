//! Basic in-memory node and the builders that produce it.
use std::sync::Arc;

use indexmap::IndexMap;

use super::{
    Kind, Link, ListAssembler, ListIter, MapAssembler, MapIter, Node, NodeBuilder, NodeRef,
    wrong_kind,
};
use crate::error::{BuildError, NodeError};

/// Plain generic node. Map entries keep insertion order.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Link(Link),
    List(Vec<NodeRef>),
    Map(IndexMap<String, NodeRef>),
}

impl Value {
    /// Map node from `(key, value)` pairs; a repeated key keeps its first
    /// position and the last value.
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Node + 'static,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), Arc::new(value) as NodeRef))
                .collect(),
        )
    }

    pub fn list<V>(items: impl IntoIterator<Item = V>) -> Self
    where
        V: Node + 'static,
    {
        Value::List(
            items
                .into_iter()
                .map(|item| Arc::new(item) as NodeRef)
                .collect(),
        )
    }

    pub fn into_node(self) -> NodeRef {
        Arc::new(self)
    }

    fn method_err(&self, method: &'static str) -> NodeError {
        wrong_kind(method, self.kind())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

impl From<Link> for Value {
    fn from(value: Link) -> Self {
        Value::Link(value)
    }
}

impl Node for Value {
    fn kind(&self) -> Kind {
        match self {
            Value::Null => Kind::Null,
            Value::Bool(_) => Kind::Bool,
            Value::Int(_) => Kind::Int,
            Value::Float(_) => Kind::Float,
            Value::String(_) => Kind::String,
            Value::Bytes(_) => Kind::Bytes,
            Value::Link(_) => Kind::Link,
            Value::List(_) => Kind::List,
            Value::Map(_) => Kind::Map,
        }
    }

    fn lookup_field(&self, name: &str) -> Result<NodeRef, NodeError> {
        match self {
            Value::Map(entries) => entries
                .get(name)
                .cloned()
                .ok_or_else(|| NodeError::NotFound { key: name.to_owned() }),
            _ => Err(self.method_err("lookup_field")),
        }
    }

    fn lookup_index(&self, index: usize) -> Result<NodeRef, NodeError> {
        match self {
            Value::List(items) => items.get(index).cloned().ok_or(NodeError::OutOfRange {
                index,
                length: items.len(),
            }),
            _ => Err(self.method_err("lookup_index")),
        }
    }

    fn map_iter(&self) -> Result<MapIter<'_>, NodeError> {
        match self {
            Value::Map(entries) => Ok(Box::new(
                entries
                    .iter()
                    .map(|(key, value)| Ok::<_, NodeError>((key.clone(), value.clone()))),
            )),
            _ => Err(self.method_err("map_iter")),
        }
    }

    fn list_iter(&self) -> Result<ListIter<'_>, NodeError> {
        match self {
            Value::List(items) => Ok(Box::new(
                items.iter().cloned().enumerate().map(Ok::<_, NodeError>),
            )),
            _ => Err(self.method_err("list_iter")),
        }
    }

    fn length(&self) -> Result<usize, NodeError> {
        match self {
            Value::List(items) => Ok(items.len()),
            Value::Map(entries) => Ok(entries.len()),
            _ => Err(self.method_err("length")),
        }
    }

    fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    fn as_bool(&self) -> Result<bool, NodeError> {
        match self {
            Value::Bool(value) => Ok(*value),
            _ => Err(self.method_err("as_bool")),
        }
    }

    fn as_int(&self) -> Result<i64, NodeError> {
        match self {
            Value::Int(value) => Ok(*value),
            _ => Err(self.method_err("as_int")),
        }
    }

    fn as_float(&self) -> Result<f64, NodeError> {
        match self {
            Value::Float(value) => Ok(*value),
            _ => Err(self.method_err("as_float")),
        }
    }

    fn as_string(&self) -> Result<&str, NodeError> {
        match self {
            Value::String(value) => Ok(value),
            _ => Err(self.method_err("as_string")),
        }
    }

    fn as_bytes(&self) -> Result<&[u8], NodeError> {
        match self {
            Value::Bytes(value) => Ok(value),
            _ => Err(self.method_err("as_bytes")),
        }
    }

    fn as_link(&self) -> Result<&Link, NodeError> {
        match self {
            Value::Link(value) => Ok(value),
            _ => Err(self.method_err("as_link")),
        }
    }

    fn node_builder(&self) -> Box<dyn NodeBuilder> {
        Box::new(BasicBuilder)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// BUILDERS
// ————————————————————————————————————————————————————————————————————————————

type Finish = Box<dyn FnOnce(Value) -> Result<NodeRef, BuildError>>;

/// Builder for untyped [`Value`] nodes.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicBuilder;

impl NodeBuilder for BasicBuilder {
    fn create_null(&self) -> Result<NodeRef, BuildError> {
        Ok(Value::Null.into_node())
    }
    fn create_bool(&self, value: bool) -> Result<NodeRef, BuildError> {
        Ok(Value::Bool(value).into_node())
    }
    fn create_int(&self, value: i64) -> Result<NodeRef, BuildError> {
        Ok(Value::Int(value).into_node())
    }
    fn create_float(&self, value: f64) -> Result<NodeRef, BuildError> {
        Ok(Value::Float(value).into_node())
    }
    fn create_string(&self, value: &str) -> Result<NodeRef, BuildError> {
        Ok(Value::from(value).into_node())
    }
    fn create_bytes(&self, value: &[u8]) -> Result<NodeRef, BuildError> {
        Ok(Value::Bytes(value.to_vec()).into_node())
    }
    fn create_link(&self, value: &Link) -> Result<NodeRef, BuildError> {
        Ok(Value::Link(value.clone()).into_node())
    }
    fn create_list(&self) -> Result<Box<dyn ListAssembler>, BuildError> {
        Ok(Box::new(ListCollector::new(|value| Ok(value.into_node()))))
    }
    fn create_map(&self) -> Result<Box<dyn MapAssembler>, BuildError> {
        Ok(Box::new(MapCollector::new(|value| Ok(value.into_node()))))
    }
}

type EntryCheck = Box<dyn Fn(&str, &NodeRef) -> Result<(), NodeError>>;

/// Accumulates map entries, rejecting a repeated key at the insert that
/// repeats it, and hands the finished [`Value::Map`] to a hook.
///
/// An entry check, when set, runs on every new entry before it is stored,
/// so keys and values a type cannot hold fail at their own insert.
pub struct MapCollector {
    entries: IndexMap<String, NodeRef>,
    check: Option<EntryCheck>,
    finish: Finish,
}

impl MapCollector {
    pub fn new(finish: impl FnOnce(Value) -> Result<NodeRef, BuildError> + 'static) -> Self {
        MapCollector {
            entries: IndexMap::new(),
            check: None,
            finish: Box::new(finish),
        }
    }

    pub fn with_entry_check(
        mut self,
        check: impl Fn(&str, &NodeRef) -> Result<(), NodeError> + 'static,
    ) -> Self {
        self.check = Some(Box::new(check));
        self
    }
}

impl MapAssembler for MapCollector {
    fn insert(&mut self, key: &str, value: NodeRef) -> Result<(), BuildError> {
        if self.entries.contains_key(key) {
            return Err(BuildError::DuplicateKey { key: key.to_owned() });
        }
        if let Some(check) = &self.check {
            check(key, &value)?;
        }
        self.entries.insert(key.to_owned(), value);
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<NodeRef, BuildError> {
        let MapCollector { entries, finish, .. } = *self;
        finish(Value::Map(entries))
    }
}

/// List counterpart of [`MapCollector`].
pub struct ListCollector {
    items: Vec<NodeRef>,
    finish: Finish,
}

impl ListCollector {
    pub fn new(finish: impl FnOnce(Value) -> Result<NodeRef, BuildError> + 'static) -> Self {
        ListCollector {
            items: Vec::new(),
            finish: Box::new(finish),
        }
    }
}

impl ListAssembler for ListCollector {
    fn append(&mut self, value: NodeRef) -> Result<(), BuildError> {
        self.items.push(value);
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<NodeRef, BuildError> {
        let ListCollector { items, finish } = *self;
        finish(Value::List(items))
    }
}
