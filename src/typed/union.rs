//! Discrimination of union values.
//!
//! The public helpers check the representation strictly and are shared
//! with generated union code; [`select`] applies them per representation
//! strategy for the runtime wrappers.
use crate::datamodel::{Kind, Node, NodeRef};
use crate::error::{Mismatch, NodeError};
use crate::schema::{TypeId, UnionRepr, UnionType};

/// Member chosen for a union value.
pub(crate) struct Selection {
    pub member: TypeId,
    /// Node holding the member's value.
    pub content: NodeRef,
    /// Key of `content` that belongs to the union, not to the member.
    pub skip_key: Option<String>,
}

/// Select the member of `node`. With `strict` unset the representation is
/// taken on trust: no arity or extra-key checks, and generic failures are
/// passed through as they are.
pub(crate) fn select(
    type_name: &str,
    union: &UnionType,
    node: &NodeRef,
    strict: bool,
) -> Result<Selection, NodeError> {
    let selection = match union.repr() {
        UnionRepr::Keyed { discriminants } => {
            let (key, content) = if strict {
                single_entry(type_name, &**node)?
            } else {
                node.map_iter()?
                    .next()
                    .unwrap_or(Err(NodeError::OutOfRange { index: 0, length: 0 }))?
            };
            Selection {
                member: member_of(type_name, discriminants, &key)?,
                content,
                skip_key: None,
            }
        }
        UnionRepr::Envelope {
            discriminant_key,
            content_key,
            discriminants,
        } => {
            let content = if strict {
                envelope_content(type_name, &**node, discriminant_key, content_key)?
            } else {
                node.lookup_field(content_key)?
            };
            let key = if strict {
                discriminant(type_name, &**node, discriminant_key)?
            } else {
                node.lookup_field(discriminant_key)?.as_string()?.to_owned()
            };
            Selection {
                member: member_of(type_name, discriminants, &key)?,
                content,
                skip_key: None,
            }
        }
        UnionRepr::Inline {
            discriminant_key,
            discriminants,
        } => {
            let key = if strict {
                discriminant(type_name, &**node, discriminant_key)?
            } else {
                node.lookup_field(discriminant_key)?.as_string()?.to_owned()
            };
            Selection {
                member: member_of(type_name, discriminants, &key)?,
                content: node.clone(),
                skip_key: Some(discriminant_key.clone()),
            }
        }
        UnionRepr::Kinded { members } => {
            let found = node.kind();
            let member = members.get(&found).copied().ok_or_else(|| NodeError::KindMismatch {
                type_name: type_name.to_owned(),
                expected: members.keys().next().copied().unwrap_or(Kind::Map),
                found,
            })?;
            Selection {
                member,
                content: node.clone(),
                skip_key: None,
            }
        }
    };
    tracing::trace!(union = type_name, member = selection.member.index(), "selected union member");
    Ok(selection)
}

fn member_of(
    type_name: &str,
    discriminants: &indexmap::IndexMap<String, TypeId>,
    key: &str,
) -> Result<TypeId, NodeError> {
    discriminants
        .get(key)
        .copied()
        .ok_or_else(|| NodeError::UnrecognizedMember {
            type_name: type_name.to_owned(),
            member: key.to_owned(),
        })
}

fn expect_map(type_name: &str, node: &dyn Node) -> Result<(), NodeError> {
    match node.kind() {
        Kind::Map => Ok(()),
        found => Err(NodeError::KindMismatch {
            type_name: type_name.to_owned(),
            expected: Kind::Map,
            found,
        }),
    }
}

fn mismatch(type_name: &str, field: &str, reason: Mismatch) -> NodeError {
    NodeError::SchemaMismatch {
        type_name: type_name.to_owned(),
        field: field.to_owned(),
        reason,
    }
}

/// The only entry of a keyed union's map.
pub fn single_entry(type_name: &str, node: &dyn Node) -> Result<(String, NodeRef), NodeError> {
    expect_map(type_name, node)?;
    let mut entries = node.map_iter()?;
    let first = match entries.next() {
        Some(entry) => entry?,
        None => return Err(mismatch(type_name, "", Mismatch::Missing)),
    };
    if let Some(entry) = entries.next() {
        let (extra, _) = entry?;
        return Err(mismatch(type_name, &extra, Mismatch::Unexpected));
    }
    Ok(first)
}

/// String value of the discriminant entry `key`.
pub fn discriminant(type_name: &str, node: &dyn Node, key: &str) -> Result<String, NodeError> {
    expect_map(type_name, node)?;
    let value = match node.lookup_field(key) {
        Ok(value) => value,
        Err(NodeError::NotFound { .. }) => return Err(mismatch(type_name, key, Mismatch::Missing)),
        Err(err) => return Err(err),
    };
    match value.kind() {
        Kind::String => Ok(value.as_string()?.to_owned()),
        found => Err(NodeError::KindMismatch {
            type_name: type_name.to_owned(),
            expected: Kind::String,
            found,
        }),
    }
}

/// Content entry of an envelope, rejecting keys other than the two
/// envelope keys.
pub fn envelope_content(
    type_name: &str,
    node: &dyn Node,
    discriminant_key: &str,
    content_key: &str,
) -> Result<NodeRef, NodeError> {
    expect_map(type_name, node)?;
    for entry in node.map_iter()? {
        let (key, _) = entry?;
        if key != discriminant_key && key != content_key {
            return Err(mismatch(type_name, &key, Mismatch::Unexpected));
        }
    }
    match node.lookup_field(content_key) {
        Err(NodeError::NotFound { .. }) => Err(mismatch(type_name, content_key, Mismatch::Missing)),
        result => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datamodel::Value;

    #[test]
    fn single_entry_rejects_second_key() {
        let node = Value::map([("a", Value::from(1)), ("b", Value::from(2))]);
        assert_eq!(
            single_entry("U", &node).unwrap_err(),
            mismatch("U", "b", Mismatch::Unexpected)
        );
        let node = Value::map([("a", Value::from(1))]);
        assert_eq!(single_entry("U", &node).unwrap().0, "a");
    }

    #[test]
    fn discriminant_must_be_a_string() {
        let node = Value::map([("tag", Value::from(1))]);
        assert!(discriminant("U", &node, "tag").unwrap_err().is_kind_mismatch());
        assert_eq!(
            discriminant("U", &Value::map([("x", Value::Null)]), "tag").unwrap_err(),
            mismatch("U", "tag", Mismatch::Missing)
        );
    }

    #[test]
    fn envelope_rejects_foreign_keys() {
        let node = Value::map([
            ("tag", Value::from("a")),
            ("content", Value::from(1)),
            ("extra", Value::Null),
        ]);
        assert_eq!(
            envelope_content("U", &node, "tag", "content").unwrap_err(),
            mismatch("U", "extra", Mismatch::Unexpected)
        );
    }
}
