use typed_node::codegen::{Codegen, GenError, GenOptions, generate_file};
use typed_node::path_de;
use typed_node::schema::{Schema, SchemaDoc};

const SCHEMA: &str = r#"{
    "types": {
        "Shape": {"kind": "union", "representation": {"envelope": {
            "discriminant_key": "type",
            "content_key": "value",
            "discriminants": {"circle": "Circle", "square": "Square"}
        }}},
        "Circle": {"kind": "record", "fields": {"radius": {"type": "Float"}}},
        "Square": {"kind": "record", "fields": {"side": {"type": "Float"}}},
        "Node": {"kind": "record", "fields": {
            "value": {"type": "Int"},
            "next": {"type": "Node", "optional": true}
        }}
    }
}"#;

fn doc() -> SchemaDoc {
    path_de::from_str_with_path(SCHEMA).unwrap()
}

#[test]
fn generating_twice_is_byte_identical() {
    let first = generate_file(&doc(), &[] as &[&str], GenOptions::default()).unwrap();
    let second = generate_file(&doc(), &[] as &[&str], GenOptions::default()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn union_members_are_emitted_before_the_union() {
    let source = generate_file(&doc(), &["Shape"], GenOptions::default()).unwrap();
    let at = |needle: &str| source.find(needle).unwrap_or_else(|| panic!("missing {needle}"));
    assert!(at("pub struct Circle {") < at("pub enum Shape {"));
    assert!(at("pub struct Square {") < at("pub enum Shape {"));
    assert!(source.contains("rt::envelope_content(Self::TYPE_NAME, node, \"type\", \"value\")?"));
    assert!(source.contains("    Circle(rt::Arc<Circle>),"));
    assert!(!source.contains("pub struct Node {"));
}

#[test]
fn self_reference_through_an_optional_field_is_allowed() {
    let source = generate_file(&doc(), &["Node"], GenOptions::default()).unwrap();
    assert!(source.contains("// recursive: Node\n// Node\n"));
    assert!(source.contains("next: Option<rt::Arc<Node>>,"));
}

#[test]
fn required_self_reference_names_the_type() {
    let doc: SchemaDoc = path_de::from_str_with_path(
        r#"{"types": {"Node": {"kind": "record", "fields": {"next": {"type": "Node"}}}}}"#,
    )
    .unwrap();
    let err = generate_file(&doc, &[] as &[&str], GenOptions::default()).unwrap_err();
    assert_eq!(err, GenError::IllegalCycle { type_name: "Node".into() });
    assert!(err.to_string().contains("Node"));
}

#[test]
fn unknown_roots_and_references_are_fatal() {
    let schema = Schema::from_doc(&doc()).unwrap();
    assert_eq!(
        Codegen::new(&schema, GenOptions::default()).generate(&["Triangle"]).unwrap_err(),
        GenError::UnknownType { type_name: "Triangle".into() }
    );

    let dangling: SchemaDoc =
        path_de::from_str_with_path(r#"{"types": {"Ring": {"kind": "list", "value_type": "Link2"}}}"#).unwrap();
    let err = generate_file(&dangling, &[] as &[&str], GenOptions::default()).unwrap_err();
    assert!(matches!(err, GenError::Schema(_)));
    assert!(err.to_string().contains("Ring"));
}

#[test]
fn directory_output_splits_units_into_modules() {
    let schema = Schema::from_doc(&doc()).unwrap();
    let code = Codegen::new(&schema, GenOptions::default()).generate_all().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("generated");
    code.write_to_dir(&out).unwrap();

    let root = std::fs::read_to_string(out.join("mod.rs")).unwrap();
    for unit in &code.units {
        assert!(root.contains(&format!("mod {};\n", unit.module)));
        let file = std::fs::read_to_string(out.join(format!("{}.rs", unit.module))).unwrap();
        assert!(file.ends_with(&unit.source));
    }
    assert!(out.join("shape.rs").exists());
    assert!(out.join("node.rs").exists());
}
