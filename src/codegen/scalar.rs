//! Bool, int, float, string, bytes and link types: a newtype over the
//! native value.
use super::source::Source;
use super::strategy::{
    Coercion, FROM_NODE, Target, TypeGenerator, open_inherent, unsupported_coercion,
};
use crate::schema::TypeShape;

pub struct ScalarGenerator;

fn coercion_of(target: &Target<'_>) -> Coercion {
    match target.ty.shape() {
        TypeShape::Bool => Coercion::Bool,
        TypeShape::Int => Coercion::Int,
        TypeShape::Float => Coercion::Float,
        TypeShape::Bytes => Coercion::Bytes,
        TypeShape::Link => Coercion::Link,
        _ => Coercion::String,
    }
}

/// Whether the value is handed out by copy rather than by reference.
fn is_copy(coercion: Coercion) -> bool {
    matches!(coercion, Coercion::Bool | Coercion::Int | Coercion::Float)
}

impl TypeGenerator for ScalarGenerator {
    fn declaration(&self, target: &Target<'_>, out: &mut Source) {
        out.line("#[derive(Debug, Clone, PartialEq)]");
        out.line(format!(
            "pub struct {}({});",
            target.ident(),
            coercion_of(target).storage()
        ));
    }

    fn inherent(&self, target: &Target<'_>, out: &mut Source) {
        let ident = target.ident();
        let coercion = coercion_of(target);
        open_inherent(target, out);
        out.blank();
        out.function(
            format!("pub fn new(value: {}) -> Self", coercion.storage()),
            format!("{ident}(value)"),
        );
        out.blank();
        let (returns, read) = match coercion {
            Coercion::String => ("&str", "&self.0"),
            Coercion::Bytes => ("&[u8]", "&self.0"),
            Coercion::Link => ("&rt::Link", "&self.0"),
            other => (other.returns(), "self.0"),
        };
        out.function(format!("pub fn value(&self) -> {returns}"), read);
        out.blank();
        let owned = match coercion {
            Coercion::String => ".to_owned()",
            Coercion::Bytes => ".to_vec()",
            Coercion::Link => ".clone()",
            _ => "",
        };
        out.open(format!("{FROM_NODE} {{"));
        out.line(format!(
            "rt::expect_kind(Self::TYPE_NAME, node, {})?;",
            coercion.kind()
        ));
        out.line(format!(
            "Ok({ident}(rt::Node::{}(node)?{owned}))",
            coercion.method()
        ));
        out.close("}");
        out.close("}");
    }

    fn kind(&self, target: &Target<'_>, out: &mut Source) {
        out.function("fn kind(&self) -> rt::Kind", coercion_of(target).kind());
    }

    fn coercion(&self, target: &Target<'_>, coercion: Coercion, out: &mut Source) {
        if coercion != coercion_of(target) {
            unsupported_coercion(coercion, out);
        } else if is_copy(coercion) {
            out.function(coercion.signature(), "Ok(self.0)");
        } else {
            out.function(coercion.signature(), "Ok(&self.0)");
        }
    }
}
