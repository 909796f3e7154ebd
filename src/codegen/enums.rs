//! Enums: a Rust enum with one unit variant per member symbol.
use super::names::variant_idents;
use super::source::Source;
use super::strategy::{
    Coercion, FROM_NODE, Target, TypeGenerator, open_inherent, str_slice, unsupported_coercion,
};
use crate::schema::TypeShape;

pub struct EnumGenerator;

fn members<'a>(target: &Target<'a>) -> &'a [String] {
    match target.ty.shape() {
        TypeShape::Enum(members) => members.members(),
        _ => unreachable!("enum generator selected for {}", target.ty.name()),
    }
}

impl TypeGenerator for EnumGenerator {
    fn declaration(&self, target: &Target<'_>, out: &mut Source) {
        out.line("#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]");
        out.open(format!("pub enum {} {{", target.ident()));
        for variant in variant_idents(members(target).iter().map(String::as_str)) {
            out.line(format!("{variant},"));
        }
        out.close("}");
    }

    fn inherent(&self, target: &Target<'_>, out: &mut Source) {
        let members = members(target);
        let variants = variant_idents(members.iter().map(String::as_str));
        open_inherent(target, out);
        out.line(format!(
            "pub const MEMBERS: &'static [&'static str] = {};",
            str_slice(members.iter().map(String::as_str))
        ));
        out.blank();

        out.open("pub fn symbol(&self) -> &'static str {");
        out.open("match self {");
        for (variant, member) in variants.iter().zip(members) {
            out.line(format!("Self::{variant} => {member:?},"));
        }
        out.close("}");
        out.close("}");
        out.blank();

        out.open("pub fn from_symbol(symbol: &str) -> Result<Self, rt::NodeError> {");
        out.open("match symbol {");
        for (variant, member) in variants.iter().zip(members) {
            out.line(format!("{member:?} => Ok(Self::{variant}),"));
        }
        out.line("_ => Err(rt::unrecognized_member(Self::TYPE_NAME, symbol)),");
        out.close("}");
        out.close("}");
        out.blank();

        out.open(format!("{FROM_NODE} {{"));
        out.line("rt::expect_kind(Self::TYPE_NAME, node, rt::Kind::String)?;");
        out.line("Self::from_symbol(rt::Node::as_string(node)?)");
        out.close("}");
        out.close("}");
    }

    fn kind(&self, _target: &Target<'_>, out: &mut Source) {
        out.function("fn kind(&self) -> rt::Kind", "rt::Kind::String");
    }

    fn coercion(&self, _target: &Target<'_>, coercion: Coercion, out: &mut Source) {
        match coercion {
            Coercion::String => out.function(coercion.signature(), "Ok(self.symbol())"),
            other => unsupported_coercion(other, out),
        }
    }
}
