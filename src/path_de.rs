//! JSON deserialization that reports where in the document it failed.
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("at JSON path {path} → {message}")]
pub struct PathError {
    pub path: String,
    pub message: String,
}

impl PathError {
    fn new(err: serde_path_to_error::Error<serde_json::Error>) -> Self {
        PathError {
            path: err.path().to_string(),
            message: err.into_inner().to_string(),
        }
    }
}

pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, PathError> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(PathError::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaDoc;

    #[test]
    fn error_names_the_failing_path() {
        let err = from_str_with_path::<SchemaDoc>(
            r#"{"types": {"Point": {"kind": "record", "fields": {"x": {"type": 1}}}}}"#,
        )
        .unwrap_err();
        assert_eq!(err.path, "types.Point.fields.x.type");
    }

    #[test]
    fn error_inside_a_union_names_the_failing_path() {
        let err = from_str_with_path::<SchemaDoc>(
            r#"{"types": {"Shape": {"kind": "union", "representation": {
                "envelope": {"discriminant_key": "tag", "content_key": 3, "discriminants": {}}
            }}}}"#,
        )
        .unwrap_err();
        assert_eq!(err.path, "types.Shape.representation.envelope.content_key");

        let err = from_str_with_path::<SchemaDoc>(r#"{"types": {"Point": {"kind": "tuple"}}}"#)
            .unwrap_err();
        assert_eq!(err.path, "types.Point.kind");
    }
}
