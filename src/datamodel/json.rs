//! Conversions between `serde_json::Value` and generic nodes.
//!
//! Links use the `{"/": "<target>"}` form. Bytes are written as an array of
//! integers and are never produced when reading.
use serde_json::{Map, Number};

use super::{Kind, Link, Node, Value};
use crate::error::NodeError;

impl Value {
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(value) => Value::Bool(*value),
            serde_json::Value::Number(number) => from_number(number),
            serde_json::Value::String(value) => Value::String(value.clone()),
            serde_json::Value::Array(items) => Value::list(items.iter().map(Value::from_json)),
            serde_json::Value::Object(entries) => {
                if let Some(target) = link_target(entries) {
                    return Value::Link(Link::new(target));
                }
                Value::map(
                    entries
                        .iter()
                        .map(|(key, value)| (key.as_str(), Value::from_json(value))),
                )
            }
        }
    }
}

fn from_number(number: &Number) -> Value {
    if let Some(int) = number.as_i64() {
        Value::Int(int)
    } else {
        // u64 beyond i64::MAX and real floats both land here
        Value::Float(number.as_f64().unwrap_or(f64::NAN))
    }
}

fn link_target(entries: &Map<String, serde_json::Value>) -> Option<&str> {
    if entries.len() != 1 {
        return None;
    }
    entries.get("/").and_then(serde_json::Value::as_str)
}

/// Render any node, typed or not, through its generic view.
pub fn to_json(node: &dyn Node) -> Result<serde_json::Value, NodeError> {
    let json = match node.kind() {
        Kind::Null => serde_json::Value::Null,
        Kind::Bool => serde_json::Value::Bool(node.as_bool()?),
        Kind::Int => serde_json::Value::from(node.as_int()?),
        Kind::Float => Number::from_f64(node.as_float()?)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Kind::String => serde_json::Value::String(node.as_string()?.to_owned()),
        Kind::Bytes => serde_json::Value::from(node.as_bytes()?.to_vec()),
        Kind::Link => {
            let mut entries = Map::new();
            entries.insert("/".into(), node.as_link()?.as_str().into());
            serde_json::Value::Object(entries)
        }
        Kind::List => {
            let mut items = Vec::new();
            for entry in node.list_iter()? {
                let (_, item) = entry?;
                items.push(to_json(&*item)?);
            }
            serde_json::Value::Array(items)
        }
        Kind::Map => {
            let mut entries = Map::new();
            for entry in node.map_iter()? {
                let (key, value) = entry?;
                if value.is_absent() {
                    continue;
                }
                entries.insert(key, to_json(&*value)?);
            }
            serde_json::Value::Object(entries)
        }
    };
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_keeps_key_order_and_reads_links() {
        let source = json!({"b": 1, "a": [true, null, 2.5], "c": {"/": "bafy"}});
        let node = Value::from_json(&source);
        let keys: Vec<String> = node.map_iter().unwrap().map(|e| e.unwrap().0).collect();
        assert_eq!(keys, ["b", "a", "c"]);
        assert_eq!(node.lookup_field("c").unwrap().as_link().unwrap().as_str(), "bafy");
        assert_eq!(to_json(&node).unwrap(), source);
    }
}
