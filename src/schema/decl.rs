//! Declaration form of a schema: what a schema file deserializes into.
//!
//! Types refer to each other by name here; [`super::Schema::from_doc`]
//! resolves the names into handles.
use std::fmt;
use std::marker::PhantomData;

use indexmap::IndexMap;
use serde::de::{self, Deserializer, EnumAccess, IgnoredAny, MapAccess, VariantAccess, Visitor};
use serde::{Deserialize, Serialize};

use super::SchemaError;

/// Scalar types implicitly available to every schema.
pub const PRELUDE: [(&str, TypeDecl); 6] = [
    ("Bool", TypeDecl::Bool),
    ("Int", TypeDecl::Int),
    ("Float", TypeDecl::Float),
    ("String", TypeDecl::String),
    ("Bytes", TypeDecl::Bytes),
    ("Link", TypeDecl::Link),
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDoc {
    #[serde(deserialize_with = "unique_keys")]
    pub types: IndexMap<String, TypeDecl>,
}

/// One declared type. Written as a map whose `"kind"` entry names the
/// variant and whose other entries are the variant's fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeDecl {
    Bool,
    Int,
    Float,
    String,
    Bytes,
    Link,
    List {
        value_type: String,
        #[serde(skip_serializing_if = "is_false")]
        value_nullable: bool,
    },
    Map {
        key_type: String,
        value_type: String,
        #[serde(skip_serializing_if = "is_false")]
        value_nullable: bool,
    },
    Record { fields: IndexMap<String, FieldDecl> },
    Enum { members: Vec<String> },
    Union { representation: UnionReprDecl },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub nullable: bool,
}

/// How a union value is laid out in the data model, and therefore how its
/// member is discriminated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnionReprDecl {
    /// `{"<discriminant>": <member value>}`
    Keyed(IndexMap<String, String>),
    /// `{"<discriminant_key>": "<discriminant>", "<content_key>": <member value>}`
    Envelope {
        discriminant_key: String,
        content_key: String,
        discriminants: IndexMap<String, String>,
    },
    /// The member record's own map plus `"<discriminant_key>": "<discriminant>"`.
    Inline {
        discriminant_key: String,
        discriminants: IndexMap<String, String>,
    },
    /// Member chosen by the data model kind of the value.
    Kinded(IndexMap<String, String>),
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl SchemaDoc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, name: impl Into<String>, decl: TypeDecl) -> Self {
        self.types.insert(name.into(), decl);
        self
    }

    /// Add the types of `other` after this document's own.
    pub fn merge(&mut self, other: SchemaDoc) -> Result<(), SchemaError> {
        for (type_name, decl) in other.types {
            if self.types.contains_key(&type_name) {
                return Err(SchemaError::DuplicateType { type_name });
            }
            self.types.insert(type_name, decl);
        }
        Ok(())
    }
}

impl TypeDecl {
    pub fn record<'a>(fields: impl IntoIterator<Item = (&'a str, FieldDecl)>) -> Self {
        TypeDecl::Record {
            fields: fields
                .into_iter()
                .map(|(name, field)| (name.to_owned(), field))
                .collect(),
        }
    }

    pub fn list(value_type: impl Into<String>) -> Self {
        TypeDecl::List {
            value_type: value_type.into(),
            value_nullable: false,
        }
    }

    pub fn map(key_type: impl Into<String>, value_type: impl Into<String>) -> Self {
        TypeDecl::Map {
            key_type: key_type.into(),
            value_type: value_type.into(),
            value_nullable: false,
        }
    }

    pub fn enumeration<'a>(members: impl IntoIterator<Item = &'a str>) -> Self {
        TypeDecl::Enum {
            members: members.into_iter().map(str::to_owned).collect(),
        }
    }

    pub fn keyed_union<'a>(members: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        TypeDecl::Union {
            representation: UnionReprDecl::Keyed(owned_pairs(members)),
        }
    }

    pub fn kinded_union<'a>(members: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        TypeDecl::Union {
            representation: UnionReprDecl::Kinded(owned_pairs(members)),
        }
    }

    /// Type names this declaration refers to, in declaration order.
    pub fn references(&self) -> Vec<&str> {
        match self {
            TypeDecl::Bool
            | TypeDecl::Int
            | TypeDecl::Float
            | TypeDecl::String
            | TypeDecl::Bytes
            | TypeDecl::Link
            | TypeDecl::Enum { .. } => Vec::new(),
            TypeDecl::List { value_type, .. } => vec![value_type.as_str()],
            TypeDecl::Map {
                key_type,
                value_type,
                ..
            } => vec![key_type.as_str(), value_type.as_str()],
            TypeDecl::Record { fields } => fields.values().map(|f| f.type_name.as_str()).collect(),
            TypeDecl::Union { representation } => representation
                .discriminants()
                .values()
                .map(String::as_str)
                .collect(),
        }
    }
}

impl FieldDecl {
    pub fn required(type_name: impl Into<String>) -> Self {
        FieldDecl {
            type_name: type_name.into(),
            optional: false,
            nullable: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

impl UnionReprDecl {
    /// Discriminant to member type name table.
    pub fn discriminants(&self) -> &IndexMap<String, String> {
        match self {
            UnionReprDecl::Keyed(table) | UnionReprDecl::Kinded(table) => table,
            UnionReprDecl::Envelope { discriminants, .. }
            | UnionReprDecl::Inline { discriminants, .. } => discriminants,
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// DESERIALIZATION
// ————————————————————————————————————————————————————————————————————————————

/// Deserialized form of [`TypeDecl`], tagged by variant name.
#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum TaggedDecl {
    Bool,
    Int,
    Float,
    String,
    Bytes,
    Link,
    List {
        value_type: String,
        #[serde(default)]
        value_nullable: bool,
    },
    Map {
        key_type: String,
        value_type: String,
        #[serde(default)]
        value_nullable: bool,
    },
    #[serde(alias = "struct")]
    Record {
        #[serde(deserialize_with = "unique_keys")]
        fields: IndexMap<String, FieldDecl>,
    },
    Enum { members: Vec<String> },
    Union { representation: UnionReprDecl },
}

impl From<TaggedDecl> for TypeDecl {
    fn from(decl: TaggedDecl) -> Self {
        match decl {
            TaggedDecl::Bool => TypeDecl::Bool,
            TaggedDecl::Int => TypeDecl::Int,
            TaggedDecl::Float => TypeDecl::Float,
            TaggedDecl::String => TypeDecl::String,
            TaggedDecl::Bytes => TypeDecl::Bytes,
            TaggedDecl::Link => TypeDecl::Link,
            TaggedDecl::List { value_type, value_nullable } => TypeDecl::List { value_type, value_nullable },
            TaggedDecl::Map { key_type, value_type, value_nullable } => TypeDecl::Map {
                key_type,
                value_type,
                value_nullable,
            },
            TaggedDecl::Record { fields } => TypeDecl::Record { fields },
            TaggedDecl::Enum { members } => TypeDecl::Enum { members },
            TaggedDecl::Union { representation } => TypeDecl::Union { representation },
        }
    }
}

/// Reads `"kind"` first and streams the remaining entries into the
/// variant, so errors inside a declaration keep their JSON path. A map
/// whose `"kind"` comes later is buffered, reordered and read again.
impl<'de> Deserialize<'de> for TypeDecl {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(TypeDeclVisitor)
    }
}

struct TypeDeclVisitor;

impl<'de> Visitor<'de> for TypeDeclVisitor {
    type Value = TypeDecl;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a type declaration with a \"kind\" entry")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<TypeDecl, A::Error> {
        let Some(first) = map.next_key::<String>()? else {
            return Err(de::Error::missing_field("kind"));
        };
        if first == "kind" {
            return TaggedDecl::deserialize(KindFirst { map }).map(TypeDecl::from);
        }
        let mut rest = serde_json::Map::new();
        rest.insert(first, map.next_value()?);
        while let Some((key, value)) = map.next_entry::<String, serde_json::Value>()? {
            rest.insert(key, value);
        }
        let kind = rest.remove("kind").ok_or_else(|| de::Error::missing_field("kind"))?;
        let mut reordered = serde_json::Map::new();
        reordered.insert("kind".to_owned(), kind);
        reordered.extend(rest);
        TypeDecl::deserialize(serde_json::Value::Object(reordered)).map_err(de::Error::custom)
    }
}

/// Presents a map positioned after its `"kind"` key as an externally
/// tagged enum: the kind value is the variant, the other entries its body.
struct KindFirst<A> {
    map: A,
}

impl<'de, A: MapAccess<'de>> Deserializer<'de> for KindFirst<A> {
    type Error = A::Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, A::Error> {
        visitor.visit_enum(self)
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct newtype_struct seq tuple
        tuple_struct map struct enum identifier ignored_any
    }
}

impl<'de, A: MapAccess<'de>> EnumAccess<'de> for KindFirst<A> {
    type Error = A::Error;
    type Variant = Self;

    fn variant_seed<V: de::DeserializeSeed<'de>>(mut self, seed: V) -> Result<(V::Value, Self), A::Error> {
        let variant = self.map.next_value_seed(seed)?;
        Ok((variant, self))
    }
}

impl<'de, A: MapAccess<'de>> VariantAccess<'de> for KindFirst<A> {
    type Error = A::Error;

    fn unit_variant(mut self) -> Result<(), A::Error> {
        while self.map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
        Ok(())
    }

    fn newtype_variant_seed<T: de::DeserializeSeed<'de>>(self, _seed: T) -> Result<T::Value, A::Error> {
        Err(de::Error::invalid_type(de::Unexpected::NewtypeVariant, &"a declaration kind"))
    }

    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, _visitor: V) -> Result<V::Value, A::Error> {
        Err(de::Error::invalid_type(de::Unexpected::TupleVariant, &"a declaration kind"))
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, A::Error> {
        visitor.visit_map(self.map)
    }
}

/// Map with string keys where a repeated key is an error instead of the
/// last entry silently winning.
fn unique_keys<'de, D, T>(deserializer: D) -> Result<IndexMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    struct UniqueKeys<T>(PhantomData<T>);

    impl<'de, T: Deserialize<'de>> Visitor<'de> for UniqueKeys<T> {
        type Value = IndexMap<String, T>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map with unique keys")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut entries = IndexMap::new();
            while let Some(key) = map.next_key::<String>()? {
                if entries.contains_key(&key) {
                    return Err(de::Error::custom(format!("{key:?} is declared twice")));
                }
                let value = map.next_value()?;
                entries.insert(key, value);
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(UniqueKeys(PhantomData))
}

fn owned_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> IndexMap<String, String> {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_record_and_union_declarations() {
        let doc: SchemaDoc = serde_json::from_str(
            r#"{
                "types": {
                    "Point": {"kind": "struct", "fields": {
                        "x": {"type": "Int"},
                        "label": {"type": "String", "optional": true}
                    }},
                    "Shape": {"kind": "union", "representation": {
                        "envelope": {
                            "discriminant_key": "tag",
                            "content_key": "content",
                            "discriminants": {"point": "Point"}
                        }
                    }}
                }
            }"#,
        )
        .unwrap();
        let TypeDecl::Record { fields } = &doc.types["Point"] else {
            panic!("expected record");
        };
        assert!(fields["label"].optional);
        assert!(!fields["x"].nullable);
        assert_eq!(doc.types["Shape"].references(), ["Point"]);
    }

    #[test]
    fn merge_rejects_a_type_declared_twice() {
        let mut doc = SchemaDoc::new().with_type("Name", TypeDecl::String);
        doc.merge(SchemaDoc::new().with_type("Names", TypeDecl::list("Name")))
            .unwrap();
        assert_eq!(doc.types.len(), 2);
        assert_eq!(
            doc.merge(SchemaDoc::new().with_type("Name", TypeDecl::Int)),
            Err(SchemaError::DuplicateType {
                type_name: "Name".into()
            })
        );
    }

    #[test]
    fn type_declared_twice_in_one_document_is_rejected() {
        let err = serde_json::from_str::<SchemaDoc>(
            r#"{"types": {"Name": {"kind": "string"}, "Name": {"kind": "int"}}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("\"Name\" is declared twice"), "{err}");

        let err = serde_json::from_str::<SchemaDoc>(
            r#"{"types": {"Point": {"kind": "record", "fields": {
                "x": {"type": "Int"}, "x": {"type": "Float"}
            }}}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("\"x\" is declared twice"), "{err}");
    }

    #[test]
    fn kind_may_follow_the_body() {
        let doc: SchemaDoc = serde_json::from_str(
            r#"{"types": {
                "Names": {"value_type": "String", "kind": "list"},
                "Flag": {"kind": "bool"}
            }}"#,
        )
        .unwrap();
        assert_eq!(doc.types["Names"], TypeDecl::list("String"));
        assert_eq!(doc.types["Flag"], TypeDecl::Bool);
        assert!(serde_json::from_str::<SchemaDoc>(r#"{"types": {"X": {"value_type": "Int"}}}"#).is_err());
    }

    #[test]
    fn serializes_without_default_flags() {
        let decl = TypeDecl::record([("x", FieldDecl::required("Int"))]);
        let json = serde_json::to_value(&decl).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"kind": "record", "fields": {"x": {"type": "Int"}}})
        );
    }
}
