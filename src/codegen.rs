//! Ahead-of-time generation of typed node implementations.
//!
//! For every selected schema type the driver picks the generator of the
//! type's kind and writes one self-contained unit: the Rust type, its
//! inherent API, the [`Node`](crate::datamodel::Node) and
//! [`TypedNode`](crate::typed::TypedNode) impls and a builder. Units
//! only reach the crate through [`crate::support`], so generated code
//! compiles against the runtime alone.
//!
//! Output is deterministic: the same schema and options produce
//! byte-identical code.
mod enums;
mod list;
mod map;
pub mod names;
pub mod order;
mod record;
mod scalar;
mod source;
mod strategy;
mod union;

use std::io;
use std::path::Path;

use rayon::prelude::*;
use thiserror::Error;

use crate::schema::{Schema, SchemaDoc, SchemaError, TypeId, TypeShape};
use names::Names;
use order::Group;
use source::Source;
use strategy::{Target, TypeGenerator, emit_unit};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenOptions {
    /// Path generated code reaches the runtime crate through.
    pub runtime_path: String,
    /// Comment lines written at the top of the output.
    pub header: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("no type named {type_name:?} in the schema")]
    UnknownType { type_name: String },

    #[error("type {type_name} is part of a cycle of required fields; no finite value can be built")]
    IllegalCycle { type_name: String },

    #[error("failed to embed the schema: {reason}")]
    Embed { reason: String },
}

pub struct Codegen<'a> {
    schema: &'a Schema,
    options: GenOptions,
    names: Names,
}

/// Generated source for one type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub type_name: String,
    pub module: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCode {
    /// Runtime import and embedded schema shared by every unit.
    pub prelude: String,
    /// Units in emission order.
    pub units: Vec<Unit>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Default for GenOptions {
    fn default() -> Self {
        GenOptions {
            runtime_path: "::typed_node".to_owned(),
            header: Some("Generated by typed-node. Do not edit.".to_owned()),
        }
    }
}

fn generator_for(shape: &TypeShape) -> &'static dyn TypeGenerator {
    match shape {
        TypeShape::Bool
        | TypeShape::Int
        | TypeShape::Float
        | TypeShape::String
        | TypeShape::Bytes
        | TypeShape::Link => &scalar::ScalarGenerator,
        TypeShape::List(_) => &list::ListGenerator,
        TypeShape::Map(_) => &map::MapGenerator,
        TypeShape::Record(_) => &record::RecordGenerator,
        TypeShape::Enum(_) => &enums::EnumGenerator,
        TypeShape::Union(_) => &union::UnionGenerator,
    }
}

impl<'a> Codegen<'a> {
    pub fn new(schema: &'a Schema, options: GenOptions) -> Self {
        Codegen {
            schema,
            options,
            names: Names::new(schema),
        }
    }

    /// Generate every type of the schema.
    pub fn generate_all(&self) -> Result<GeneratedCode, GenError> {
        self.generate(&[] as &[&str])
    }

    /// Generate the types reachable from `roots`, or every type when
    /// `roots` is empty.
    pub fn generate<S: AsRef<str>>(&self, roots: &[S]) -> Result<GeneratedCode, GenError> {
        let roots = roots
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.schema.lookup(name).ok_or_else(|| GenError::UnknownType {
                    type_name: name.to_owned(),
                })
            })
            .collect::<Result<Vec<TypeId>, _>>()?;
        let groups = order::emission_order(self.schema, &roots)?;
        tracing::debug!(
            groups = groups.len(),
            types = groups.iter().map(|g| g.members.len()).sum::<usize>(),
            "emission order resolved"
        );

        let jobs: Vec<(TypeId, Option<&Group>)> = groups
            .iter()
            .flat_map(|group| {
                group.members.iter().enumerate().map(move |(position, id)| {
                    let first = (position == 0 && group.recursive).then_some(group);
                    (*id, first)
                })
            })
            .collect();
        let units = jobs
            .par_iter()
            .map(|(id, group)| self.unit(*id, *group))
            .collect::<Vec<_>>();
        Ok(GeneratedCode {
            prelude: self.prelude()?,
            units,
        })
    }

    fn prelude(&self) -> Result<String, GenError> {
        let doc = self.schema.to_doc();
        let json = serde_json::to_string(&doc).map_err(|err| GenError::Embed {
            reason: err.to_string(),
        })?;
        let mut out = Source::new();
        if let Some(header) = &self.options.header {
            for line in header.lines() {
                out.line(format!("// {line}").trim_end());
            }
            out.blank();
        }
        out.line(format!("use {}::support as rt;", self.options.runtime_path));
        out.blank();
        out.line(format!("const SCHEMA_JSON: &str = {json:?};"));
        out.blank();
        out.line("static SCHEMA: rt::OnceCell<rt::Arc<rt::Schema>> = rt::OnceCell::new();");
        out.blank();
        out.function(
            "fn schema() -> &'static rt::Arc<rt::Schema>",
            "SCHEMA.get_or_init(|| rt::load_schema(SCHEMA_JSON))",
        );
        Ok(out.into_string())
    }

    fn unit(&self, id: TypeId, group: Option<&Group>) -> Unit {
        let ty = self.schema.get(id);
        let mut out = Source::new();
        if let Some(group) = group {
            let members: Vec<&str> = group
                .members
                .iter()
                .map(|member| self.schema.get(*member).name())
                .collect();
            out.line(format!("// recursive: {}", members.join(", ")));
        }
        out.line(format!("// {}", ty.name().replace('\n', " ")));
        let target = Target::new(self.schema, &self.names, id);
        emit_unit(generator_for(ty.shape()), &target, &mut out);
        tracing::debug!(type_name = ty.name(), "generated");
        Unit {
            type_name: ty.name().to_owned(),
            module: self.names.get(id).module.clone(),
            source: out.into_string(),
        }
    }
}

/// Resolve `doc` and generate the closure of `roots` as one file.
pub fn generate_file<S: AsRef<str>>(
    doc: &SchemaDoc,
    roots: &[S],
    options: GenOptions,
) -> Result<String, GenError> {
    let schema = Schema::from_doc(doc)?;
    let code = Codegen::new(&schema, options).generate(roots)?;
    Ok(code.to_single_file())
}

impl GeneratedCode {
    /// Everything in one file, suitable for `include!`.
    pub fn to_single_file(&self) -> String {
        let mut out = self.prelude.clone();
        for unit in &self.units {
            out.push('\n');
            out.push_str(&unit.source);
        }
        out
    }

    /// `mod.rs` holding the prelude plus one file per type.
    pub fn write_to_dir(&self, dir: &Path) -> io::Result<()> {
        std::fs::create_dir_all(dir)?;
        let mut module = Source::new();
        for unit in &self.units {
            module.line(format!("mod {};", unit.module));
        }
        module.blank();
        for unit in &self.units {
            module.line(format!("pub use {}::*;", unit.module));
        }
        let mut root = self.prelude.clone();
        root.push('\n');
        root.push_str(&module.into_string());
        std::fs::write(dir.join("mod.rs"), root)?;
        for unit in &self.units {
            let source = format!("use super::*;\n\n{}", unit.source);
            std::fs::write(dir.join(format!("{}.rs", unit.module)), source)?;
        }
        tracing::debug!(dir = %dir.display(), units = self.units.len(), "wrote generated modules");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDecl, TypeDecl};

    fn doc() -> SchemaDoc {
        SchemaDoc::new()
            .with_type(
                "Point",
                TypeDecl::record([("x", FieldDecl::required("Int")), ("y", FieldDecl::required("Int"))]),
            )
            .with_type("Points", TypeDecl::list("Point"))
            .with_type("Color", TypeDecl::enumeration(["RED", "GREEN", "BLUE"]))
            .with_type(
                "Tree",
                TypeDecl::record([
                    ("label", FieldDecl::required("String")),
                    ("children", FieldDecl::required("Forest").optional()),
                ]),
            )
            .with_type("Forest", TypeDecl::list("Tree"))
    }

    fn schema() -> Schema {
        Schema::from_doc(&doc()).unwrap()
    }

    #[test]
    fn output_is_deterministic() {
        let schema = schema();
        let first = Codegen::new(&schema, GenOptions::default()).generate_all().unwrap();
        let second = Codegen::new(&schema, GenOptions::default()).generate_all().unwrap();
        assert_eq!(first.to_single_file(), second.to_single_file());
    }

    #[test]
    fn units_follow_dependency_order() {
        let schema = schema();
        let code = Codegen::new(&schema, GenOptions::default()).generate_all().unwrap();
        let names: Vec<&str> = code.units.iter().map(|unit| unit.type_name.as_str()).collect();
        let position = |name: &str| names.iter().position(|n| *n == name).unwrap();
        assert!(position("Int") < position("Point"));
        assert!(position("Point") < position("Points"));
        assert_eq!(position("Tree") + 1, position("Forest"));
        let tree = &code.units[position("Tree")];
        assert!(tree.source.starts_with("// recursive: Tree, Forest\n// Tree\n"));
        assert_eq!(tree.module, "tree");
    }

    #[test]
    fn string_type_is_renamed_clear_of_the_prelude() {
        let schema = schema();
        let code = Codegen::new(&schema, GenOptions::default()).generate(&["Tree"]).unwrap();
        let source = code.to_single_file();
        assert!(source.contains("pub struct StringType(String);"));
        assert!(source.contains("label: rt::Arc<StringType>,"));
        assert!(source.contains("children: Option<rt::Arc<Forest>>,"));
        assert!(!source.contains("pub struct Point"));
    }

    #[test]
    fn every_unit_implements_the_typed_contract() {
        let schema = schema();
        let source = Codegen::new(&schema, GenOptions::default())
            .generate_all()
            .unwrap()
            .to_single_file();
        for ident in ["Point", "Points", "Color", "Tree", "Forest", "Int"] {
            assert!(source.contains(&format!("impl rt::Node for {ident} {{")), "{ident}");
            assert!(source.contains(&format!("impl rt::TypedNode for {ident} {{")), "{ident}");
            assert!(source.contains(&format!("impl rt::NodeBuilder for {ident}Builder {{")), "{ident}");
        }
        assert!(source.contains("pub struct PointAssembler {"));
        assert!(source.contains("impl rt::MapAssembler for PointAssembler {"));
        assert!(source.contains("pub enum Color {"));
    }

    #[test]
    fn prelude_embeds_the_schema_under_the_runtime_path() {
        let schema = schema();
        let options = GenOptions {
            runtime_path: "crate::runtime".to_owned(),
            header: Some("generated\nfrom tests".to_owned()),
        };
        let code = Codegen::new(&schema, options).generate(&["Color"]).unwrap();
        assert!(code.prelude.starts_with("// generated\n// from tests\n\nuse crate::runtime::support as rt;\n"));
        let line = code
            .prelude
            .lines()
            .find(|line| line.starts_with("const SCHEMA_JSON"))
            .unwrap();
        let embedded: String = serde_json::from_str(
            line.trim_start_matches("const SCHEMA_JSON: &str = ").trim_end_matches(';'),
        )
        .unwrap();
        assert_eq!(Schema::from_json_str(&embedded).unwrap(), schema);
    }

    /// Line of the first delimiter that does not close what is open, or of
    /// the first one left open. String literals and comments are skipped.
    fn unbalanced_delimiter(source: &str) -> Option<usize> {
        let mut open: Vec<(char, usize)> = Vec::new();
        for (number, line) in source.lines().enumerate() {
            let mut chars = line.chars();
            let mut in_string = false;
            while let Some(c) = chars.next() {
                match (in_string, c) {
                    (true, '\\') => {
                        chars.next();
                    }
                    (true, '"') | (false, '"') => in_string = !in_string,
                    (true, _) => {}
                    (false, '/') if chars.clone().next() == Some('/') => break,
                    (false, '(' | '[' | '{') => open.push((c, number + 1)),
                    (false, ')' | ']' | '}') => {
                        let expected = match c {
                            ')' => '(',
                            ']' => '[',
                            _ => '{',
                        };
                        match open.pop() {
                            Some((opened, _)) if opened == expected => {}
                            _ => return Some(number + 1),
                        }
                    }
                    (false, _) => {}
                }
            }
        }
        open.first().map(|(_, line)| *line)
    }

    #[test]
    fn generated_delimiters_balance_for_every_kind() {
        let doc: SchemaDoc =
            crate::path_de::from_str_with_path(include_str!("../dev-test-runner/schemas/fixture.json"))
                .unwrap();
        let schema = Schema::from_doc(&doc).unwrap();
        let code = Codegen::new(&schema, GenOptions::default()).generate_all().unwrap();
        assert_eq!(unbalanced_delimiter(&code.prelude), None);
        for unit in &code.units {
            if let Some(line) = unbalanced_delimiter(&unit.source) {
                panic!(
                    "{} is unbalanced at line {line}:\n{}",
                    unit.type_name,
                    unit.source.lines().nth(line - 1).unwrap_or_default()
                );
            }
        }
        assert_eq!(unbalanced_delimiter("fn f() {\n    g(\"}\") // )\n}\n"), None);
        assert_eq!(unbalanced_delimiter("fn f(&self) -> i64\n    1\n}\n"), Some(3));
    }

    #[test]
    fn enum_keyed_maps_check_keys_at_insert() {
        let doc = doc().with_type("Palette", TypeDecl::map("Color", "Point"));
        let source = generate_file(&doc, &["Palette"], GenOptions::default()).unwrap();
        assert!(source.contains(
            "Ok(Box::new(rt::MapCollector::new(Self::seal).with_entry_check(|key, _| Color::from_symbol(key).map(drop))))"
        ));
    }

    #[test]
    fn unknown_root_is_reported_by_name() {
        let schema = schema();
        let err = Codegen::new(&schema, GenOptions::default())
            .generate(&["Polygon"])
            .unwrap_err();
        assert_eq!(err, GenError::UnknownType { type_name: "Polygon".into() });
    }

    #[test]
    fn unbuildable_cycle_is_fatal() {
        let doc = SchemaDoc::new().with_type(
            "Chain",
            TypeDecl::record([("next", FieldDecl::required("Chain"))]),
        );
        assert_eq!(
            generate_file(&doc, &[] as &[&str], GenOptions::default()).unwrap_err(),
            GenError::IllegalCycle { type_name: "Chain".into() }
        );
    }

    #[test]
    fn unresolved_reference_is_a_schema_error() {
        let doc = SchemaDoc::new().with_type("Points", TypeDecl::list("Point"));
        let err = generate_file(&doc, &[] as &[&str], GenOptions::default()).unwrap_err();
        assert!(matches!(err, GenError::Schema(SchemaError::UnresolvedType { .. })));
    }

    #[test]
    fn directory_output_has_one_module_per_type() {
        let schema = schema();
        let code = Codegen::new(&schema, GenOptions::default()).generate(&["Points"]).unwrap();
        let dir = tempfile::tempdir().unwrap();
        code.write_to_dir(dir.path()).unwrap();

        let root = std::fs::read_to_string(dir.path().join("mod.rs")).unwrap();
        assert!(root.starts_with(&code.prelude));
        assert!(root.contains("mod int;\nmod point;\nmod points;\n"));
        assert!(root.contains("pub use point::*;"));
        let point = std::fs::read_to_string(dir.path().join("point.rs")).unwrap();
        assert!(point.starts_with("use super::*;\n\n// Point\n"));
    }
}
