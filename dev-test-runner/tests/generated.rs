use std::sync::Arc;

use dev_test_runner::fixture::*;
use serde_json::json;
use typed_node::datamodel::json::to_json;
use typed_node::datamodel::{Kind, Link, Node, NodeBuilder, NodeRef, Value, structural_eq};
use typed_node::schema::{Schema, TypeKind};
use typed_node::typed::{LazyNode, Maybe, TypedNode};
use typed_node::{BuildError, Mismatch, NodeError};

fn json_node(source: serde_json::Value) -> NodeRef {
    Value::from_json(&source).into_node()
}

fn build_map(builder: &dyn NodeBuilder, entries: &[(&str, NodeRef)]) -> Result<NodeRef, BuildError> {
    let mut map = builder.create_map()?;
    for (key, value) in entries {
        map.insert(key, value.clone())?;
    }
    map.finish()
}

fn int(value: i64) -> NodeRef {
    Value::from(value).into_node()
}

#[test]
fn point_is_built_and_read_through_its_type() {
    let point = build_map(&PointBuilder, &[("x", int(3)), ("y", int(4))]).unwrap();
    assert_eq!(point.lookup_field("x").unwrap().as_int(), Ok(3));
    assert_eq!(
        point.lookup_field("z").unwrap_err(),
        NodeError::SchemaMismatch {
            type_name: "Point".into(),
            field: "z".into(),
            reason: Mismatch::Undeclared,
        }
    );
    assert_eq!(point.kind(), Kind::Map);
    let typed = point.typed().unwrap();
    assert_eq!(typed.type_kind(), TypeKind::Record);
    assert_eq!(typed.schema_type().name(), "Point");
    assert!(point.as_int().unwrap_err().is_kind_mismatch());
}

#[test]
fn point_accessors_are_typed() {
    let point = Point::new(Arc::new(Int::new(3)), Arc::new(Int::new(4)));
    assert_eq!(point.x().value(), 3);
    assert_eq!(point.y().value(), 4);
    assert_eq!(Point::FIELDS, ["x", "y"]);
    assert_eq!(point.lookup_index(1).unwrap().as_int(), Ok(4));
    assert_eq!(
        point.lookup_index(2).unwrap_err(),
        NodeError::OutOfRange { index: 2, length: 2 }
    );
    assert_eq!(
        point.lookup_field("x").unwrap().typed().unwrap().schema_type().name(),
        "Int"
    );
}

#[test]
fn record_iterates_in_declared_order() {
    let node = json_node(json!({"y": 4, "x": 3}));
    let point = Point::from_node(&*node).unwrap();
    let keys: Vec<String> = point.map_iter().unwrap().map(|entry| entry.unwrap().0).collect();
    assert_eq!(keys, ["x", "y"]);
    assert_eq!(to_json(&point).unwrap(), json!({"x": 3, "y": 4}));
}

#[test]
fn record_builder_rejects_at_the_offending_insert() {
    let mut map = PointBuilder.create_map().unwrap();
    map.insert("x", int(1)).unwrap();
    assert_eq!(
        map.insert("x", int(2)).unwrap_err(),
        BuildError::DuplicateKey { key: "x".into() }
    );
    assert_eq!(
        map.insert("z", int(3)).unwrap_err(),
        BuildError::Node(NodeError::SchemaMismatch {
            type_name: "Point".into(),
            field: "z".into(),
            reason: Mismatch::Unexpected,
        })
    );
    assert_eq!(
        map.finish().unwrap_err(),
        BuildError::MissingField {
            type_name: "Point".into(),
            field: "y".into(),
        }
    );
}

/// The builder a schema-driven wrapper hands out for `name`.
fn wrapper_builder(name: &str) -> Box<dyn NodeBuilder> {
    let schema = Arc::new(Schema::from_json_str(include_str!("../schemas/fixture.json")).unwrap());
    LazyNode::new(json_node(json!({})), schema.type_ref(name).unwrap()).node_builder()
}

#[test]
fn generated_and_wrapper_builders_reject_at_the_same_insert() {
    let origin = json_node(json!({"x": 0, "y": 0}));
    let point = wrapper_builder("Point");
    let palette = wrapper_builder("Palette");

    for builder in [&PointBuilder as &dyn NodeBuilder, &*point] {
        let mut map = builder.create_map().unwrap();
        map.insert("x", int(1)).unwrap();
        assert_eq!(
            map.insert("z", int(3)).unwrap_err(),
            BuildError::Node(NodeError::SchemaMismatch {
                type_name: "Point".into(),
                field: "z".into(),
                reason: Mismatch::Unexpected,
            })
        );
    }

    for builder in [&PaletteBuilder as &dyn NodeBuilder, &*palette] {
        let mut map = builder.create_map().unwrap();
        map.insert("RED", origin.clone()).unwrap();
        assert_eq!(
            map.insert("PINK", origin.clone()).unwrap_err(),
            BuildError::Node(NodeError::UnrecognizedMember {
                type_name: "Color".into(),
                member: "PINK".into(),
            })
        );
    }
}

#[test]
fn record_builder_checks_field_kinds_and_its_own_kind() {
    let mut map = PointBuilder.create_map().unwrap();
    let err = map.insert("x", Value::from("three").into_node()).unwrap_err();
    assert!(err.node_error().is_some_and(NodeError::is_kind_mismatch));

    assert_eq!(
        PointBuilder.create_int(1).unwrap_err(),
        BuildError::Node(NodeError::KindMismatch {
            type_name: "Point".into(),
            expected: Kind::Map,
            found: Kind::Int,
        })
    );
    assert!(PointBuilder.create_list().is_err());
}

#[test]
fn list_round_trips_through_the_builder() {
    let items: Vec<NodeRef> = (0..3)
        .map(|n| json_node(json!({"x": n, "y": n * 10})))
        .collect();
    let mut list = PointsBuilder.create_list().unwrap();
    for item in &items {
        list.append(item.clone()).unwrap();
    }
    let points = list.finish().unwrap();
    assert_eq!(points.length(), Ok(3));
    for (index, item) in items.iter().enumerate() {
        assert!(structural_eq(&*points.lookup_index(index).unwrap(), &**item).unwrap());
    }
    assert_eq!(
        points.lookup_index(3).unwrap_err(),
        NodeError::OutOfRange { index: 3, length: 3 }
    );
    assert_eq!(
        points.lookup_field("x").unwrap_err(),
        NodeError::WrongKind {
            method: "lookup_field",
            kind: Kind::List,
        }
    );

    // restartable: a fresh iterator starts over
    let first: Vec<usize> = points.list_iter().unwrap().map(|entry| entry.unwrap().0).collect();
    let second: Vec<usize> = points.list_iter().unwrap().map(|entry| entry.unwrap().0).collect();
    assert_eq!(first, [0, 1, 2]);
    assert_eq!(first, second);
}

#[test]
fn list_items_are_checked_when_building() {
    let node = json_node(json!([{"x": 1, "y": 2}, {"x": 1}]));
    assert_eq!(
        Points::from_node(&*node).unwrap_err(),
        NodeError::SchemaMismatch {
            type_name: "Point".into(),
            field: "y".into(),
            reason: Mismatch::Missing,
        }
    );
}

#[test]
fn nullable_list_items_read_as_null() {
    let tags = Tags::from_node(&*json_node(json!(["a", null, "c"]))).unwrap();
    assert_eq!(tags.len(), 3);
    assert!(tags.items()[1].is_none());
    assert!(tags.lookup_index(1).unwrap().is_null());
    assert_eq!(tags.lookup_index(2).unwrap().as_string(), Ok("c"));
}

#[test]
fn enum_accepts_only_declared_members() {
    assert_eq!(
        ColorBuilder.create_string("YELLOW").unwrap_err(),
        BuildError::Node(NodeError::UnrecognizedMember {
            type_name: "Color".into(),
            member: "YELLOW".into(),
        })
    );
    let red = ColorBuilder.create_string("RED").unwrap();
    assert_eq!(red.as_string(), Ok("RED"));
    assert_eq!(red.kind(), Kind::String);
    assert_eq!(red.typed().unwrap().type_kind(), TypeKind::Enum);

    assert_eq!(Color::from_symbol("GREEN"), Ok(Color::Green));
    assert_eq!(Color::Blue.symbol(), "BLUE");
    assert_eq!(Color::MEMBERS, ["RED", "GREEN", "BLUE"]);
    assert!(Color::Red.as_int().unwrap_err().is_kind_mismatch());
}

#[test]
fn map_keeps_insertion_order_and_checks_enum_keys() {
    let origin = json_node(json!({"x": 0, "y": 0}));
    let unit = json_node(json!({"x": 1, "y": 1}));
    let palette = build_map(&PaletteBuilder, &[("GREEN", unit.clone()), ("RED", origin.clone())]).unwrap();
    let keys: Vec<String> = palette.map_iter().unwrap().map(|entry| entry.unwrap().0).collect();
    assert_eq!(keys, ["GREEN", "RED"]);
    assert_eq!(
        palette.lookup_field("RED").unwrap().lookup_field("x").unwrap().as_int(),
        Ok(0)
    );
    assert_eq!(
        palette.lookup_field("BLUE").unwrap_err(),
        NodeError::NotFound { key: "BLUE".into() }
    );
    assert!(palette.lookup_field("PINK").unwrap_err().is_unrecognized_member());

    let err = build_map(&PaletteBuilder, &[("PINK", origin.clone())]).unwrap_err();
    assert!(err.node_error().is_some_and(NodeError::is_unrecognized_member));

    let mut map = PaletteBuilder.create_map().unwrap();
    map.insert("RED", origin.clone()).unwrap();
    assert_eq!(
        map.insert("RED", unit).unwrap_err(),
        BuildError::DuplicateKey { key: "RED".into() }
    );
}

#[test]
fn map_from_entries_rejects_repeated_keys() {
    let point = Arc::new(Point::new(Arc::new(Int::new(1)), Arc::new(Int::new(2))));
    let palette = Palette::from_entries([("RED".to_owned(), point.clone())]).unwrap();
    assert_eq!(palette.len(), 1);
    assert!(palette.get("RED").is_some());
    assert_eq!(
        Palette::from_entries([("RED".to_owned(), point.clone()), ("RED".to_owned(), point)]).unwrap_err(),
        BuildError::DuplicateKey { key: "RED".into() }
    );
}

#[test]
fn nullable_map_values() {
    let scores = Scores::from_node(&*json_node(json!({"ada": 3, "bob": null}))).unwrap();
    assert_eq!(scores.get("ada").unwrap().as_deref().map(Int::value), Some(3));
    assert!(scores.get("bob").unwrap().is_none());
    assert!(scores.lookup_field("bob").unwrap().is_null());
}

#[test]
fn record_presence_rules() {
    let profile = Profile::from_node(&*json_node(json!({"name": "Ada", "nickname": null}))).unwrap();
    assert_eq!(profile.name().value(), "Ada");
    assert!(profile.nickname().is_none());
    assert!(profile.age().is_none());
    assert!(profile.email().is_absent());

    let nickname = profile.lookup_field("nickname").unwrap();
    assert!(nickname.is_null() && !nickname.is_absent());
    assert!(profile.lookup_field("age").unwrap().is_absent());
    assert!(profile.lookup_field("email").unwrap().is_absent());
    let keys: Vec<String> = profile.map_iter().unwrap().map(|entry| entry.unwrap().0).collect();
    assert_eq!(keys, ["name", "nickname", "age"]);
    assert_eq!(profile.length(), Ok(3));

    let profile = Profile::from_node(&*json_node(json!({
        "email": null,
        "age": 36,
        "nickname": "ada",
        "name": "Ada"
    })))
    .unwrap();
    assert_eq!(profile.nickname().map(StringType::value), Some("ada"));
    assert_eq!(profile.age().map(Int::value), Some(36));
    assert_eq!(profile.email(), Maybe::Null);
    assert_eq!(
        to_json(&profile).unwrap(),
        json!({"name": "Ada", "nickname": "ada", "age": 36, "email": null})
    );
}

#[test]
fn record_presence_violations() {
    // nullable means present
    assert_eq!(
        Profile::from_node(&*json_node(json!({"name": "Ada"}))).unwrap_err(),
        NodeError::SchemaMismatch {
            type_name: "Profile".into(),
            field: "nickname".into(),
            reason: Mismatch::Missing,
        }
    );
    // optional alone does not admit null
    let err = Profile::from_node(&*json_node(json!({"name": "Ada", "nickname": null, "age": null})))
        .unwrap_err();
    assert!(err.is_kind_mismatch());
}

#[test]
fn scalar_record_fields() {
    let value = Value::map([
        ("data", Value::Bytes(vec![1, 2, 3])),
        ("link", Value::Link(Link::new("bafy"))),
        ("flag", Value::from(true)),
    ]);
    let blob = Blob::from_node(&value).unwrap();
    assert_eq!(blob.data().value(), &[1u8, 2, 3][..]);
    assert_eq!(blob.link().value().as_str(), "bafy");
    assert!(blob.flag().value());
    assert_eq!(blob.lookup_field("flag").unwrap().as_bool(), Ok(true));
    assert!(blob.lookup_field("data").unwrap().as_string().unwrap_err().is_kind_mismatch());
    assert!(blob.lookup_field("link").unwrap().as_link().is_ok());
}

#[test]
fn keyed_union_selects_by_its_single_key() {
    let shape = Shape::from_node(&*json_node(json!({
        "circle": {"radius": 1.5, "center": {"x": 0, "y": 0}}
    })))
    .unwrap();
    assert_eq!(shape.discriminant(), "circle");
    assert_eq!(shape.member_name(), "Circle");
    assert_eq!(shape.circle().unwrap().radius().value(), 1.5);
    assert!(shape.square().is_none());
    assert_eq!(shape.lookup_field("radius").unwrap().as_float(), Ok(1.5));
    assert_eq!(shape.typed().unwrap().type_kind(), TypeKind::Union);

    let err = ShapeBuilder
        .create_map()
        .and_then(|mut map| {
            map.insert("triangle", json_node(json!({"side": 1.0})))?;
            map.finish()
        })
        .unwrap_err();
    assert_eq!(
        err,
        BuildError::Node(NodeError::UnrecognizedMember {
            type_name: "Shape".into(),
            member: "triangle".into(),
        })
    );
}

#[test]
fn envelope_union_reads_the_content_key() {
    let node = json_node(json!({
        "type": "square",
        "value": {"side": 2.0, "corner": {"x": 1, "y": 1}}
    }));
    let envelope = Envelope::from_node(&*node).unwrap();
    assert_eq!(envelope.discriminant(), "square");
    assert_eq!(envelope.square().unwrap().side().value(), 2.0);
    assert_eq!(envelope.member_node().kind(), Kind::Map);

    let stray = json_node(json!({"type": "square", "value": {}, "extra": 1}));
    assert!(Envelope::from_node(&*stray).unwrap_err().is_schema_mismatch());
}

#[test]
fn inline_union_skips_its_discriminant_key() {
    let node = json_node(json!({
        "shape": "circle",
        "radius": 3.0,
        "center": {"x": 1, "y": 2}
    }));
    let inline = Inline::from_node(&*node).unwrap();
    assert_eq!(inline.circle().unwrap().center().x().value(), 1);
    let keys: Vec<String> = inline.map_iter().unwrap().map(|entry| entry.unwrap().0).collect();
    assert_eq!(keys, ["radius", "center"]);

    let unknown = json_node(json!({"shape": "hexagon", "side": 1.0}));
    assert!(Inline::from_node(&*unknown).unwrap_err().is_unrecognized_member());
}

#[test]
fn kinded_union_selects_by_data_model_kind() {
    let number = Scalar::from_node(&*int(7)).unwrap();
    assert_eq!(number.discriminant(), "int");
    assert_eq!(number.int().map(Int::value), Some(7));
    assert_eq!(number.as_int(), Ok(7));
    assert_eq!(number.kind(), Kind::Int);

    let point = Scalar::from_node(&*json_node(json!({"x": 1, "y": 2}))).unwrap();
    assert_eq!(point.discriminant(), "map");
    assert!(point.map().is_some());
    assert_eq!(point.kind(), Kind::Map);

    assert!(Scalar::from_node(&Value::from(1.5)).unwrap_err().is_kind_mismatch());
    assert_eq!(ScalarBuilder.create_string("hi").unwrap().as_string(), Ok("hi"));
}

#[test]
fn recursive_types_build_and_read() {
    let tree = Tree::from_node(&*json_node(json!({
        "label": "root",
        "children": [
            {"label": "leaf"},
            {"label": "branch", "children": [{"label": "twig"}]}
        ]
    })))
    .unwrap();
    let children = tree.children().unwrap();
    assert_eq!(children.len(), 2);
    assert!(children.items()[0].children().is_none());
    let twig = tree
        .lookup_field("children")
        .and_then(|forest| forest.lookup_index(1))
        .and_then(|branch| branch.lookup_field("children"))
        .and_then(|forest| forest.lookup_index(0))
        .and_then(|twig| twig.lookup_field("label"))
        .unwrap();
    assert_eq!(twig.as_string(), Ok("twig"));
}

#[test]
fn generated_and_lazy_views_agree() {
    let source = json!({
        "name": "Ada",
        "nickname": null,
        "age": 36
    });
    let node = json_node(source.clone());
    let generated = Profile::from_node(&*node).unwrap();
    let lazy = LazyNode::new(node, generated.schema_type());
    assert!(structural_eq(&generated, &lazy).unwrap());
    assert_eq!(to_json(&generated).unwrap(), to_json(&lazy).unwrap());
    assert_eq!(to_json(&generated).unwrap(), source);
    for field in ["name", "nickname", "age", "email", "nope"] {
        match (generated.lookup_field(field), lazy.lookup_field(field)) {
            (Ok(left), Ok(right)) => {
                assert_eq!(left.is_absent(), right.is_absent(), "{field}");
                assert!(structural_eq(&*left, &*right).unwrap(), "{field}");
            }
            (Err(left), Err(right)) => assert_eq!(left, right, "{field}"),
            (left, right) => panic!("{field}: {left:?} vs {right:?}"),
        }
    }
}

#[test]
fn builders_from_generated_nodes_make_new_values() {
    let point = Point::new(Arc::new(Int::new(1)), Arc::new(Int::new(2)));
    let copy = build_map(&*point.node_builder(), &[("x", int(5)), ("y", int(6))]).unwrap();
    assert_eq!(copy.lookup_field("x").unwrap().as_int(), Ok(5));
    assert_eq!(point.x().value(), 1);
}
