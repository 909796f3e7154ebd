//! Resolved schema: an arena of types addressed by [`TypeId`].
//!
//! Composite types hold handles to their component types, never the types
//! themselves, so recursive and mutually recursive schemas need no special
//! ownership treatment.
pub mod decl;

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use thiserror::Error;

use crate::datamodel::Kind;
use crate::path_de::{self, PathError};
pub use decl::{FieldDecl, SchemaDoc, TypeDecl, UnionReprDecl};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

/// Schema-level kind of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Bool,
    Int,
    Float,
    String,
    Bytes,
    Link,
    List,
    Map,
    Record,
    Enum,
    Union,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Type {
    name: String,
    shape: TypeShape,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeShape {
    Bool,
    Int,
    Float,
    String,
    Bytes,
    Link,
    List(ListType),
    Map(MapType),
    Record(RecordType),
    Enum(EnumType),
    Union(UnionType),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListType {
    pub value_type: TypeId,
    pub value_nullable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapType {
    pub key_type: TypeId,
    pub value_type: TypeId,
    pub value_nullable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordType {
    fields: IndexMap<String, Field>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub type_id: TypeId,
    pub optional: bool,
    pub nullable: bool,
}

/// How a record field may be missing, derived from its flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Always has a value.
    Required,
    /// Always present, may be null.
    Nullable,
    /// May be missing; a missing value is reported as absent (null test).
    Optional,
    /// May be missing or null; a missing value is skipped by iteration.
    Omittable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnionType {
    repr: UnionRepr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnionRepr {
    Keyed {
        discriminants: IndexMap<String, TypeId>,
    },
    Envelope {
        discriminant_key: String,
        content_key: String,
        discriminants: IndexMap<String, TypeId>,
    },
    Inline {
        discriminant_key: String,
        discriminants: IndexMap<String, TypeId>,
    },
    Kinded {
        members: IndexMap<Kind, TypeId>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    types: Vec<Type>,
    by_name: IndexMap<String, TypeId>,
}

/// A type together with the schema that owns it.
#[derive(Clone)]
pub struct TypeRef {
    schema: Arc<Schema>,
    id: TypeId,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("type {type_name} refers to unknown type {reference:?}")]
    UnresolvedType { type_name: String, reference: String },

    #[error("type {type_name} is invalid: {reason}")]
    InvalidType { type_name: String, reason: String },

    #[error("type {type_name} is declared more than once")]
    DuplicateType { type_name: String },

    #[error("failed to parse schema {0}")]
    Parse(#[from] PathError),
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl TypeId {
    pub const fn from_index(index: u32) -> Self {
        TypeId(index)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl TypeKind {
    /// Data model kind of a scalar type kind.
    pub fn scalar_kind(self) -> Option<Kind> {
        match self {
            TypeKind::Bool => Some(Kind::Bool),
            TypeKind::Int => Some(Kind::Int),
            TypeKind::Float => Some(Kind::Float),
            TypeKind::String => Some(Kind::String),
            TypeKind::Bytes => Some(Kind::Bytes),
            TypeKind::Link => Some(Kind::Link),
            _ => None,
        }
    }
}

impl Type {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &TypeShape {
        &self.shape
    }

    pub fn kind(&self) -> TypeKind {
        match self.shape {
            TypeShape::Bool => TypeKind::Bool,
            TypeShape::Int => TypeKind::Int,
            TypeShape::Float => TypeKind::Float,
            TypeShape::String => TypeKind::String,
            TypeShape::Bytes => TypeKind::Bytes,
            TypeShape::Link => TypeKind::Link,
            TypeShape::List(_) => TypeKind::List,
            TypeShape::Map(_) => TypeKind::Map,
            TypeShape::Record(_) => TypeKind::Record,
            TypeShape::Enum(_) => TypeKind::Enum,
            TypeShape::Union(_) => TypeKind::Union,
        }
    }

    /// Data model kinds a value of this type may be represented as.
    pub fn repr_kinds(&self) -> Vec<Kind> {
        match &self.shape {
            TypeShape::List(_) => vec![Kind::List],
            TypeShape::Map(_) | TypeShape::Record(_) => vec![Kind::Map],
            TypeShape::Enum(_) => vec![Kind::String],
            TypeShape::Union(union) => match union.repr() {
                UnionRepr::Kinded { members } => members.keys().copied().collect(),
                _ => vec![Kind::Map],
            },
            _ => self.kind().scalar_kind().into_iter().collect(),
        }
    }

    pub fn accepts_kind(&self, kind: Kind) -> bool {
        self.repr_kinds().contains(&kind)
    }

    /// Types this one refers to, in declaration order, repeats included.
    pub fn references(&self) -> Vec<TypeId> {
        match &self.shape {
            TypeShape::List(list) => vec![list.value_type],
            TypeShape::Map(map) => vec![map.key_type, map.value_type],
            TypeShape::Record(record) => record.fields().map(|f| f.type_id).collect(),
            TypeShape::Union(union) => union.members(),
            _ => Vec::new(),
        }
    }
}

impl RecordType {
    pub fn fields(&self) -> impl ExactSizeIterator<Item = &Field> + '_ {
        self.fields.values()
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Declared position and field for `name`.
    pub fn field_full(&self, name: &str) -> Option<(usize, &Field)> {
        self.fields.get_full(name).map(|(index, _, field)| (index, field))
    }

    pub fn field_at(&self, index: usize) -> Option<&Field> {
        self.fields.get_index(index).map(|(_, field)| field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Field {
    pub fn presence(&self) -> Presence {
        match (self.optional, self.nullable) {
            (false, false) => Presence::Required,
            (false, true) => Presence::Nullable,
            (true, false) => Presence::Optional,
            (true, true) => Presence::Omittable,
        }
    }
}

impl EnumType {
    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.members.iter().any(|member| member == symbol)
    }
}

impl UnionType {
    pub fn repr(&self) -> &UnionRepr {
        &self.repr
    }

    /// Distinct member types in first-declaration order.
    pub fn members(&self) -> Vec<TypeId> {
        let mut members = Vec::new();
        let ids: Vec<TypeId> = match &self.repr {
            UnionRepr::Keyed { discriminants }
            | UnionRepr::Envelope { discriminants, .. }
            | UnionRepr::Inline { discriminants, .. } => discriminants.values().copied().collect(),
            UnionRepr::Kinded { members } => members.values().copied().collect(),
        };
        for id in ids {
            if !members.contains(&id) {
                members.push(id);
            }
        }
        members
    }

    /// Discriminant string that selects `member`, the first one if several do.
    pub fn discriminant_of(&self, member: TypeId) -> Option<String> {
        match &self.repr {
            UnionRepr::Keyed { discriminants }
            | UnionRepr::Envelope { discriminants, .. }
            | UnionRepr::Inline { discriminants, .. } => discriminants
                .iter()
                .find(|(_, id)| **id == member)
                .map(|(discriminant, _)| discriminant.clone()),
            UnionRepr::Kinded { members } => members
                .iter()
                .find(|(_, id)| **id == member)
                .map(|(kind, _)| kind.name().to_owned()),
        }
    }
}

impl Schema {
    pub fn from_json_str(source: &str) -> Result<Self, SchemaError> {
        let doc = path_de::from_str_with_path::<SchemaDoc>(source)?;
        Self::from_doc(&doc)
    }

    /// Resolve a declaration into an arena. Declared types keep their
    /// declaration order; prelude scalars that are referenced but not
    /// declared follow in first-reference order.
    pub fn from_doc(doc: &SchemaDoc) -> Result<Self, SchemaError> {
        let mut decls: IndexMap<String, TypeDecl> = doc.types.clone();
        let mut cursor = 0;
        while let Some((type_name, decl)) = decls.get_index(cursor) {
            let type_name = type_name.clone();
            let references: Vec<String> =
                decl.references().into_iter().map(str::to_owned).collect();
            for reference in references {
                if decls.contains_key(&reference) {
                    continue;
                }
                match decl::PRELUDE.iter().find(|(name, _)| *name == reference) {
                    Some((name, prelude)) => {
                        decls.insert((*name).to_owned(), prelude.clone());
                    }
                    None => {
                        return Err(SchemaError::UnresolvedType {
                            type_name,
                            reference,
                        });
                    }
                }
            }
            cursor += 1;
        }

        let by_name: IndexMap<String, TypeId> = decls
            .keys()
            .enumerate()
            .map(|(index, name)| (name.clone(), TypeId(index as u32)))
            .collect();
        let resolver = Resolver { by_name: &by_name };
        let types = decls
            .iter()
            .map(|(name, decl)| resolver.resolve(name, decl))
            .collect::<Result<Vec<_>, _>>()?;
        let schema = Schema { types, by_name };
        schema.check()?;
        tracing::debug!(types = schema.len(), "resolved schema");
        Ok(schema)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// # Panics
    /// If `id` does not belong to this schema.
    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id.index()]
    }

    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &Type)> + '_ {
        self.types
            .iter()
            .enumerate()
            .map(|(index, ty)| (TypeId(index as u32), ty))
    }

    pub fn type_ref(self: &Arc<Self>, name: &str) -> Option<TypeRef> {
        self.lookup(name).map(|id| TypeRef::new(self.clone(), id))
    }

    /// Declaration equivalent to this schema, prelude types spelled out, in
    /// arena order. Resolving it again yields the same ids.
    pub fn to_doc(&self) -> SchemaDoc {
        let name = |id: TypeId| self.get(id).name().to_owned();
        let names = |table: &IndexMap<String, TypeId>| -> IndexMap<String, String> {
            table.iter().map(|(key, id)| (key.clone(), name(*id))).collect()
        };
        let types = self
            .types
            .iter()
            .map(|ty| {
                let decl = match &ty.shape {
                    TypeShape::Bool => TypeDecl::Bool,
                    TypeShape::Int => TypeDecl::Int,
                    TypeShape::Float => TypeDecl::Float,
                    TypeShape::String => TypeDecl::String,
                    TypeShape::Bytes => TypeDecl::Bytes,
                    TypeShape::Link => TypeDecl::Link,
                    TypeShape::List(list) => TypeDecl::List {
                        value_type: name(list.value_type),
                        value_nullable: list.value_nullable,
                    },
                    TypeShape::Map(map) => TypeDecl::Map {
                        key_type: name(map.key_type),
                        value_type: name(map.value_type),
                        value_nullable: map.value_nullable,
                    },
                    TypeShape::Record(record) => TypeDecl::Record {
                        fields: record
                            .fields()
                            .map(|field| {
                                (
                                    field.name.clone(),
                                    FieldDecl {
                                        type_name: name(field.type_id),
                                        optional: field.optional,
                                        nullable: field.nullable,
                                    },
                                )
                            })
                            .collect(),
                    },
                    TypeShape::Enum(members) => TypeDecl::Enum {
                        members: members.members.clone(),
                    },
                    TypeShape::Union(union) => TypeDecl::Union {
                        representation: match union.repr() {
                            UnionRepr::Keyed { discriminants } => {
                                UnionReprDecl::Keyed(names(discriminants))
                            }
                            UnionRepr::Envelope {
                                discriminant_key,
                                content_key,
                                discriminants,
                            } => UnionReprDecl::Envelope {
                                discriminant_key: discriminant_key.clone(),
                                content_key: content_key.clone(),
                                discriminants: names(discriminants),
                            },
                            UnionRepr::Inline {
                                discriminant_key,
                                discriminants,
                            } => UnionReprDecl::Inline {
                                discriminant_key: discriminant_key.clone(),
                                discriminants: names(discriminants),
                            },
                            UnionRepr::Kinded { members } => UnionReprDecl::Kinded(
                                members
                                    .iter()
                                    .map(|(kind, id)| (kind.name().to_owned(), name(*id)))
                                    .collect(),
                            ),
                        },
                    },
                };
                (ty.name.clone(), decl)
            })
            .collect();
        SchemaDoc { types }
    }

    /// Checks that need the whole arena.
    fn check(&self) -> Result<(), SchemaError> {
        for ty in &self.types {
            let invalid = |reason: String| SchemaError::InvalidType {
                type_name: ty.name.clone(),
                reason,
            };
            match &ty.shape {
                TypeShape::Map(map) => {
                    let key = self.get(map.key_type);
                    if !matches!(key.shape, TypeShape::String | TypeShape::Enum(_)) {
                        return Err(invalid(format!(
                            "map key type {} is not string-represented",
                            key.name
                        )));
                    }
                }
                TypeShape::Union(union) => match union.repr() {
                    UnionRepr::Inline {
                        discriminant_key,
                        discriminants,
                    } => {
                        for id in discriminants.values() {
                            let member = self.get(*id);
                            let TypeShape::Record(record) = &member.shape else {
                                return Err(invalid(format!(
                                    "inline member {} is not a record",
                                    member.name
                                )));
                            };
                            if record.field(discriminant_key).is_some() {
                                return Err(invalid(format!(
                                    "inline member {} declares the discriminant key {discriminant_key:?}",
                                    member.name
                                )));
                            }
                        }
                    }
                    UnionRepr::Kinded { members } => {
                        for (kind, id) in members {
                            let member = self.get(*id);
                            if !member.accepts_kind(*kind) {
                                return Err(invalid(format!(
                                    "kinded member {} is not represented as {kind}",
                                    member.name
                                )));
                            }
                        }
                    }
                    _ => {}
                },
                _ => {}
            }
        }
        Ok(())
    }
}

struct Resolver<'a> {
    by_name: &'a IndexMap<String, TypeId>,
}

impl Resolver<'_> {
    fn id(&self, type_name: &str, reference: &str) -> Result<TypeId, SchemaError> {
        self.by_name
            .get(reference)
            .copied()
            .ok_or_else(|| SchemaError::UnresolvedType {
                type_name: type_name.to_owned(),
                reference: reference.to_owned(),
            })
    }

    fn table(
        &self,
        type_name: &str,
        table: &IndexMap<String, String>,
    ) -> Result<IndexMap<String, TypeId>, SchemaError> {
        if table.is_empty() {
            return Err(SchemaError::InvalidType {
                type_name: type_name.to_owned(),
                reason: "union declares no members".into(),
            });
        }
        table
            .iter()
            .map(|(key, member)| Ok((key.clone(), self.id(type_name, member)?)))
            .collect()
    }

    fn resolve(&self, name: &str, decl: &TypeDecl) -> Result<Type, SchemaError> {
        let invalid = |reason: String| SchemaError::InvalidType {
            type_name: name.to_owned(),
            reason,
        };
        let shape = match decl {
            TypeDecl::Bool => TypeShape::Bool,
            TypeDecl::Int => TypeShape::Int,
            TypeDecl::Float => TypeShape::Float,
            TypeDecl::String => TypeShape::String,
            TypeDecl::Bytes => TypeShape::Bytes,
            TypeDecl::Link => TypeShape::Link,
            TypeDecl::List {
                value_type,
                value_nullable,
            } => TypeShape::List(ListType {
                value_type: self.id(name, value_type)?,
                value_nullable: *value_nullable,
            }),
            TypeDecl::Map {
                key_type,
                value_type,
                value_nullable,
            } => TypeShape::Map(MapType {
                key_type: self.id(name, key_type)?,
                value_type: self.id(name, value_type)?,
                value_nullable: *value_nullable,
            }),
            TypeDecl::Record { fields } => {
                let mut resolved = IndexMap::with_capacity(fields.len());
                for (field_name, field) in fields {
                    resolved.insert(
                        field_name.clone(),
                        Field {
                            name: field_name.clone(),
                            type_id: self.id(name, &field.type_name)?,
                            optional: field.optional,
                            nullable: field.nullable,
                        },
                    );
                }
                TypeShape::Record(RecordType { fields: resolved })
            }
            TypeDecl::Enum { members } => {
                if members.is_empty() {
                    return Err(invalid("enum declares no members".into()));
                }
                for (index, member) in members.iter().enumerate() {
                    if members[..index].contains(member) {
                        return Err(invalid(format!("enum member {member:?} repeats")));
                    }
                }
                TypeShape::Enum(EnumType {
                    members: members.clone(),
                })
            }
            TypeDecl::Union { representation } => {
                let repr = match representation {
                    UnionReprDecl::Keyed(table) => UnionRepr::Keyed {
                        discriminants: self.table(name, table)?,
                    },
                    UnionReprDecl::Envelope {
                        discriminant_key,
                        content_key,
                        discriminants,
                    } => {
                        if discriminant_key == content_key {
                            return Err(invalid("envelope keys coincide".into()));
                        }
                        UnionRepr::Envelope {
                            discriminant_key: discriminant_key.clone(),
                            content_key: content_key.clone(),
                            discriminants: self.table(name, discriminants)?,
                        }
                    }
                    UnionReprDecl::Inline {
                        discriminant_key,
                        discriminants,
                    } => UnionRepr::Inline {
                        discriminant_key: discriminant_key.clone(),
                        discriminants: self.table(name, discriminants)?,
                    },
                    UnionReprDecl::Kinded(table) => {
                        let mut members = IndexMap::new();
                        for (kind, id) in self.table(name, table)? {
                            let kind = kind.parse::<Kind>().map_err(&invalid)?;
                            members.insert(kind, id);
                        }
                        UnionRepr::Kinded { members }
                    }
                };
                TypeShape::Union(UnionType { repr })
            }
        };
        Ok(Type {
            name: name.to_owned(),
            shape,
        })
    }
}

impl TypeRef {
    /// # Panics
    /// If `id` does not belong to `schema`.
    pub fn new(schema: Arc<Schema>, id: TypeId) -> Self {
        assert!(id.index() < schema.len(), "type id outside schema");
        TypeRef { schema, id }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn get(&self) -> &Type {
        self.schema.get(self.id)
    }

    pub fn name(&self) -> &str {
        self.get().name()
    }

    pub fn kind(&self) -> TypeKind {
        self.get().kind()
    }

    pub fn shape(&self) -> &TypeShape {
        self.get().shape()
    }

    /// Another type of the same schema.
    pub fn child(&self, id: TypeId) -> TypeRef {
        TypeRef::new(self.schema.clone(), id)
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Arc::ptr_eq(&self.schema, &other.schema)
    }
}

impl Eq for TypeRef {}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeRef").field(&self.name()).finish()
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shapes() -> SchemaDoc {
        SchemaDoc::new()
            .with_type(
                "Point",
                TypeDecl::record([("x", FieldDecl::required("Int")), ("y", FieldDecl::required("Int"))]),
            )
            .with_type("Points", TypeDecl::list("Point"))
            .with_type("Labels", TypeDecl::map("String", "Points"))
    }

    #[test]
    fn prelude_types_follow_declared_types() {
        let schema = Schema::from_doc(&shapes()).unwrap();
        let names: Vec<&str> = schema.iter().map(|(_, ty)| ty.name()).collect();
        assert_eq!(names, ["Point", "Points", "Labels", "Int", "String"]);
    }

    #[test]
    fn to_doc_round_trips_ids() {
        let schema = Schema::from_doc(&shapes()).unwrap();
        let again = Schema::from_doc(&schema.to_doc()).unwrap();
        assert_eq!(schema, again);
    }

    #[test]
    fn unresolved_reference_names_the_type() {
        let doc = SchemaDoc::new().with_type("Bag", TypeDecl::list("Nope"));
        assert_eq!(
            Schema::from_doc(&doc).unwrap_err(),
            SchemaError::UnresolvedType {
                type_name: "Bag".into(),
                reference: "Nope".into()
            }
        );
    }

    #[test]
    fn rejects_non_string_map_keys_and_bad_enums() {
        let doc = SchemaDoc::new().with_type("ByInt", TypeDecl::map("Int", "Int"));
        assert!(matches!(
            Schema::from_doc(&doc),
            Err(SchemaError::InvalidType { type_name, .. }) if type_name == "ByInt"
        ));
        let doc = SchemaDoc::new().with_type("Empty", TypeDecl::Enum { members: Vec::new() });
        assert!(Schema::from_doc(&doc).is_err());
        let doc = SchemaDoc::new().with_type("Twice", TypeDecl::enumeration(["A", "A"]));
        assert!(Schema::from_doc(&doc).is_err());
    }

    #[test]
    fn kinded_members_must_match_their_kind() {
        let doc = SchemaDoc::new().with_type("Either", TypeDecl::kinded_union([("map", "Int")]));
        assert!(Schema::from_doc(&doc).is_err());
        let doc = SchemaDoc::new()
            .with_type("Either", TypeDecl::kinded_union([("int", "Int"), ("string", "String")]));
        let schema = Schema::from_doc(&doc).unwrap();
        let either = schema.get(schema.lookup("Either").unwrap());
        assert_eq!(either.repr_kinds(), [Kind::Int, Kind::String]);
    }

    #[test]
    fn presence_follows_flags() {
        let field = |optional, nullable| Field {
            name: "f".into(),
            type_id: TypeId(0),
            optional,
            nullable,
        };
        assert_eq!(field(false, false).presence(), Presence::Required);
        assert_eq!(field(false, true).presence(), Presence::Nullable);
        assert_eq!(field(true, false).presence(), Presence::Optional);
        assert_eq!(field(true, true).presence(), Presence::Omittable);
    }
}
