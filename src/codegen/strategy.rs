//! The per-kind generator contract and the pieces every kind shares.
use super::names::{Names, TypeNames};
use super::source::Source;
use crate::schema::{Schema, Type, TypeId};

/// Everything a generator needs to know about the type it emits.
pub struct Target<'a> {
    pub schema: &'a Schema,
    pub names: &'a Names,
    pub id: TypeId,
    pub ty: &'a Type,
}

impl<'a> Target<'a> {
    pub fn new(schema: &'a Schema, names: &'a Names, id: TypeId) -> Self {
        Target {
            schema,
            names,
            id,
            ty: schema.get(id),
        }
    }

    pub fn type_names(&self) -> &'a TypeNames {
        self.names.get(self.id)
    }

    pub fn ident(&self) -> &'a str {
        &self.type_names().ident
    }

    /// Ident of another type of the same schema.
    pub fn ident_of(&self, id: TypeId) -> &'a str {
        self.names.ident(id)
    }
}

/// Scalar coercions of the node contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    Bool,
    Int,
    Float,
    String,
    Bytes,
    Link,
}

impl Coercion {
    pub const ALL: [Coercion; 6] = [
        Coercion::Bool,
        Coercion::Int,
        Coercion::Float,
        Coercion::String,
        Coercion::Bytes,
        Coercion::Link,
    ];

    pub fn method(self) -> &'static str {
        match self {
            Coercion::Bool => "as_bool",
            Coercion::Int => "as_int",
            Coercion::Float => "as_float",
            Coercion::String => "as_string",
            Coercion::Bytes => "as_bytes",
            Coercion::Link => "as_link",
        }
    }

    /// Return type of the coercion.
    pub fn returns(self) -> &'static str {
        match self {
            Coercion::Bool => "bool",
            Coercion::Int => "i64",
            Coercion::Float => "f64",
            Coercion::String => "&str",
            Coercion::Bytes => "&[u8]",
            Coercion::Link => "&rt::Link",
        }
    }

    /// Owned storage of a scalar of this kind.
    pub fn storage(self) -> &'static str {
        match self {
            Coercion::Bool => "bool",
            Coercion::Int => "i64",
            Coercion::Float => "f64",
            Coercion::String => "String",
            Coercion::Bytes => "Vec<u8>",
            Coercion::Link => "rt::Link",
        }
    }

    /// `rt::Kind` path of the kind this coercion reads.
    pub fn kind(self) -> &'static str {
        match self {
            Coercion::Bool => "rt::Kind::Bool",
            Coercion::Int => "rt::Kind::Int",
            Coercion::Float => "rt::Kind::Float",
            Coercion::String => "rt::Kind::String",
            Coercion::Bytes => "rt::Kind::Bytes",
            Coercion::Link => "rt::Kind::Link",
        }
    }

    pub fn signature(self) -> String {
        format!("fn {}(&self) -> Result<{}, rt::NodeError>", self.method(), self.returns())
    }
}

pub const LOOKUP_FIELD: &str = "fn lookup_field(&self, name: &str) -> Result<rt::NodeRef, rt::NodeError>";
pub const LOOKUP_INDEX: &str = "fn lookup_index(&self, index: usize) -> Result<rt::NodeRef, rt::NodeError>";
pub const MAP_ITER: &str = "fn map_iter(&self) -> Result<rt::MapIter<'_>, rt::NodeError>";
pub const LIST_ITER: &str = "fn list_iter(&self) -> Result<rt::ListIter<'_>, rt::NodeError>";
pub const LENGTH: &str = "fn length(&self) -> Result<usize, rt::NodeError>";
pub const FROM_NODE: &str = "pub fn from_node(node: &dyn rt::Node) -> Result<Self, rt::NodeError>";

/// One implementation per schema kind. Each method writes one item of the
/// generated unit; [`emit_unit`] calls them in a fixed order. The defaults
/// are the answers of a kind that does not support the operation.
pub trait TypeGenerator: Sync {
    fn declaration(&self, target: &Target<'_>, out: &mut Source);

    /// `impl T { .. }`: constants, constructors, accessors and `from_node`.
    fn inherent(&self, target: &Target<'_>, out: &mut Source);

    fn kind(&self, target: &Target<'_>, out: &mut Source);

    fn lookup_field(&self, _target: &Target<'_>, out: &mut Source) {
        out.function(
            LOOKUP_FIELD.replace("name:", "_name:"),
            r#"Err(rt::wrong_kind("lookup_field", rt::Node::kind(self)))"#,
        );
    }

    fn lookup_index(&self, _target: &Target<'_>, out: &mut Source) {
        out.function(
            LOOKUP_INDEX.replace("index:", "_index:"),
            r#"Err(rt::wrong_kind("lookup_index", rt::Node::kind(self)))"#,
        );
    }

    fn map_iter(&self, _target: &Target<'_>, out: &mut Source) {
        out.function(MAP_ITER, r#"Err(rt::wrong_kind("map_iter", rt::Node::kind(self)))"#);
    }

    fn list_iter(&self, _target: &Target<'_>, out: &mut Source) {
        out.function(LIST_ITER, r#"Err(rt::wrong_kind("list_iter", rt::Node::kind(self)))"#);
    }

    fn length(&self, _target: &Target<'_>, out: &mut Source) {
        out.function(LENGTH, r#"Err(rt::wrong_kind("length", rt::Node::kind(self)))"#);
    }

    fn is_null(&self, _target: &Target<'_>, out: &mut Source) {
        out.function("fn is_null(&self) -> bool", "false");
    }

    fn coercion(&self, _target: &Target<'_>, coercion: Coercion, out: &mut Source) {
        unsupported_coercion(coercion, out);
    }

    fn node_builder(&self, target: &Target<'_>, out: &mut Source) {
        out.function(
            "fn node_builder(&self) -> Box<dyn rt::NodeBuilder>",
            format!("Box::new({})", target.type_names().builder),
        );
    }

    /// The `NodeBuilder`. By default it collects a basic value and builds
    /// through `from_node` when the value is finished.
    fn builder(&self, target: &Target<'_>, out: &mut Source) {
        collecting_builder(target, None, out);
    }
}

/// `impl T {` with the constants every generated type carries. The caller
/// closes the block.
pub fn open_inherent(target: &Target<'_>, out: &mut Source) {
    out.open(format!("impl {} {{", target.ident()));
    out.line(format!(
        "pub const TYPE_NAME: &'static str = {:?};",
        target.ty.name()
    ));
    out.line(format!(
        "pub const TYPE_ID: rt::TypeId = rt::TypeId::from_index({});",
        target.id.index()
    ));
}

/// A coercion the type does not admit: a kind mismatch naming the kind the
/// caller asked for.
pub fn unsupported_coercion(coercion: Coercion, out: &mut Source) {
    out.function(
        coercion.signature(),
        format!(
            "Err(rt::kind_mismatch(Self::TYPE_NAME, rt::Node::kind(self), {}))",
            coercion.kind()
        ),
    );
}

/// `&["a", "b"]` for a `&'static [&'static str]` constant.
pub fn str_slice<'a>(items: impl IntoIterator<Item = &'a str>) -> String {
    let items: Vec<String> = items.into_iter().map(|item| format!("{item:?}")).collect();
    format!("&[{}]", items.join(", "))
}

/// Expression converting `node` (a `&dyn rt::Node`) into `Arc<type>`.
pub fn build_child(target: &Target<'_>, id: TypeId, node: &str) -> String {
    format!("rt::Arc::new({}::from_node({node})?)", target.ident_of(id))
}

/// Item of a list or value of a map.
pub struct Element<'a> {
    pub child: &'a str,
    pub nullable: bool,
}

impl Element<'_> {
    pub fn storage(&self) -> String {
        if self.nullable {
            format!("Option<rt::Arc<{}>>", self.child)
        } else {
            format!("rt::Arc<{}>", self.child)
        }
    }

    /// Expression building the stored element from `node`.
    pub fn build(&self, node: &str) -> String {
        let child = self.child;
        if self.nullable {
            format!(
                "if rt::Node::is_null({node}) {{ None }} else {{ Some(rt::Arc::new({child}::from_node({node})?)) }}"
            )
        } else {
            format!("rt::Arc::new({child}::from_node({node})?)")
        }
    }

    /// `fn element_node`, reading a stored element back as a node.
    pub fn node_fn(&self, out: &mut Source) {
        out.open(format!("fn element_node(element: &{}) -> rt::NodeRef {{", self.storage()));
        if self.nullable {
            out.open("match element {");
            out.line("Some(value) => rt::Arc::clone(value) as rt::NodeRef,");
            out.line("None => rt::null(),");
            out.close("}");
        } else {
            out.line("rt::Arc::clone(element) as rt::NodeRef");
        }
        out.close("}");
    }
}

/// Write the whole unit for `target` in contract order.
pub fn emit_unit(generator: &dyn TypeGenerator, target: &Target<'_>, out: &mut Source) {
    let ident = target.ident();
    generator.declaration(target, out);
    out.blank();
    generator.inherent(target, out);
    out.blank();

    out.open(format!("impl rt::Node for {ident} {{"));
    generator.kind(target, out);
    out.blank();
    generator.lookup_field(target, out);
    out.blank();
    generator.lookup_index(target, out);
    out.blank();
    generator.map_iter(target, out);
    out.blank();
    generator.list_iter(target, out);
    out.blank();
    generator.length(target, out);
    out.blank();
    generator.is_null(target, out);
    for coercion in Coercion::ALL {
        out.blank();
        generator.coercion(target, coercion, out);
    }
    out.blank();
    generator.node_builder(target, out);
    out.blank();
    out.function("fn typed(&self) -> Option<&dyn rt::TypedNode>", "Some(self)");
    out.close("}");
    out.blank();

    out.open(format!("impl rt::TypedNode for {ident} {{"));
    out.function(
        "fn schema_type(&self) -> rt::TypeRef",
        "rt::TypeRef::new(rt::Arc::clone(schema()), Self::TYPE_ID)",
    );
    out.close("}");
    out.blank();

    generator.builder(target, out);
}

const SCALAR_CREATES: [(&str, &str, &str); 7] = [
    ("create_null", "", "rt::Value::Null"),
    ("create_bool", "value: bool", "rt::Value::Bool(value)"),
    ("create_int", "value: i64", "rt::Value::Int(value)"),
    ("create_float", "value: f64", "rt::Value::Float(value)"),
    ("create_string", "value: &str", "rt::Value::String(value.to_owned())"),
    ("create_bytes", "value: &[u8]", "rt::Value::Bytes(value.to_vec())"),
    ("create_link", "value: &rt::Link", "rt::Value::Link(value.clone())"),
];

fn create_signature(method: &str, param: &str) -> String {
    if param.is_empty() {
        format!("fn {method}(&self) -> Result<rt::NodeRef, rt::BuildError>")
    } else {
        format!("fn {method}(&self, {param}) -> Result<rt::NodeRef, rt::BuildError>")
    }
}

pub const CREATE_LIST: &str = "fn create_list(&self) -> Result<Box<dyn rt::ListAssembler>, rt::BuildError>";
pub const CREATE_MAP: &str = "fn create_map(&self) -> Result<Box<dyn rt::MapAssembler>, rt::BuildError>";

pub fn builder_declaration(target: &Target<'_>, out: &mut Source) {
    out.line("#[derive(Debug, Clone, Copy, Default)]");
    out.line(format!("pub struct {};", target.type_names().builder));
}

/// `entry_check`, when given, is a closure run on every map insert.
pub fn collecting_builder(target: &Target<'_>, entry_check: Option<String>, out: &mut Source) {
    let builder = &target.type_names().builder;
    builder_declaration(target, out);
    out.blank();
    out.open(format!("impl {builder} {{"));
    out.open("fn seal(value: rt::Value) -> Result<rt::NodeRef, rt::BuildError> {");
    out.line(format!(
        "let node = {}::from_node(&value).map_err(rt::into_build_error)?;",
        target.ident()
    ));
    out.line("Ok(rt::Arc::new(node))");
    out.close("}");
    out.close("}");
    out.blank();
    out.open(format!("impl rt::NodeBuilder for {builder} {{"));
    for (method, param, value) in SCALAR_CREATES {
        out.function(create_signature(method, param), format!("Self::seal({value})"));
    }
    out.function(CREATE_LIST, "Ok(Box::new(rt::ListCollector::new(Self::seal)))");
    let collector = match entry_check {
        Some(check) => format!("rt::MapCollector::new(Self::seal).with_entry_check({check})"),
        None => "rt::MapCollector::new(Self::seal)".to_owned(),
    };
    out.function(CREATE_MAP, format!("Ok(Box::new({collector}))"));
    out.close("}");
}

/// Builder of a type only buildable through a map assembler; every other
/// creation fails without collecting anything.
pub fn assembling_builder(target: &Target<'_>, out: &mut Source) {
    let builder = &target.type_names().builder;
    builder_declaration(target, out);
    out.blank();
    out.open(format!("impl {builder} {{"));
    out.function(
        "fn reject(found: rt::Kind) -> Result<rt::NodeRef, rt::BuildError>",
        format!(
            "Err(rt::BuildError::from(rt::kind_mismatch({}::TYPE_NAME, rt::Kind::Map, found)))",
            target.ident()
        ),
    );
    out.close("}");
    out.blank();
    out.open(format!("impl rt::NodeBuilder for {builder} {{"));
    for (method, param, value) in SCALAR_CREATES {
        let kind = value
            .trim_start_matches("rt::Value::")
            .split('(')
            .next()
            .unwrap_or("Null");
        let param = param.replace("value:", "_value:");
        out.function(
            create_signature(method, &param),
            format!("Self::reject(rt::Kind::{kind})"),
        );
    }
    out.open(format!("{CREATE_LIST} {{"));
    out.line(format!(
        "Err(rt::BuildError::from(rt::kind_mismatch({}::TYPE_NAME, rt::Kind::Map, rt::Kind::List)))",
        target.ident()
    ));
    out.close("}");
    out.function(
        CREATE_MAP,
        format!("Ok(Box::new({}::default()))", target.type_names().assembler),
    );
    out.close("}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coercion_signatures() {
        assert_eq!(
            Coercion::String.signature(),
            "fn as_string(&self) -> Result<&str, rt::NodeError>"
        );
        assert_eq!(str_slice(["x", "y\""]), r#"&["x", "y\""]"#);
    }
}
