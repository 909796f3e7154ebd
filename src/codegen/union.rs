//! Unions: a Rust enum with one variant per discriminant, each holding the
//! selected member. Every node operation reads through to the member.
use super::names::{accessor_idents, variant_idents};
use super::source::Source;
use super::strategy::{
    Coercion, FROM_NODE, LENGTH, LIST_ITER, LOOKUP_FIELD, LOOKUP_INDEX, MAP_ITER, Target,
    TypeGenerator, build_child, open_inherent, str_slice,
};
use crate::datamodel::Kind;
use crate::schema::{TypeId, TypeShape, UnionRepr};

/// Inherent methods of a union that member accessors must not shadow.
const RESERVED: &[&str] = &[
    "discriminant", "member_name", "member_node", "member", "from_node", "from_discriminant",
];

pub struct UnionGenerator;

struct Variant<'a> {
    discriminant: String,
    ident: String,
    accessor: String,
    member_id: TypeId,
    member: &'a str,
    /// Set for kinded unions.
    kind: Option<Kind>,
}

fn repr<'a>(target: &Target<'a>) -> &'a UnionRepr {
    match target.ty.shape() {
        TypeShape::Union(union) => union.repr(),
        _ => unreachable!("union generator selected for {}", target.ty.name()),
    }
}

fn variants<'a>(target: &Target<'a>) -> Vec<Variant<'a>> {
    let entries: Vec<(String, TypeId, Option<Kind>)> = match repr(target) {
        UnionRepr::Keyed { discriminants }
        | UnionRepr::Envelope { discriminants, .. }
        | UnionRepr::Inline { discriminants, .. } => discriminants
            .iter()
            .map(|(discriminant, id)| (discriminant.clone(), *id, None))
            .collect(),
        UnionRepr::Kinded { members } => members
            .iter()
            .map(|(kind, id)| (kind.name().to_owned(), *id, Some(*kind)))
            .collect(),
    };
    let idents = variant_idents(entries.iter().map(|(name, _, _)| name.as_str()));
    let accessors = accessor_idents(entries.iter().map(|(name, _, _)| name.as_str()), RESERVED);
    entries
        .into_iter()
        .zip(idents.into_iter().zip(accessors))
        .map(|((discriminant, member_id, kind), (ident, accessor))| Variant {
            discriminant,
            ident,
            accessor,
            member_id,
            member: target.ident_of(member_id),
            kind,
        })
        .collect()
}

/// `match self { .. }` with one arm per variant binding the member.
fn match_self(variants: &[Variant<'_>], out: &mut Source, arm: impl Fn(&Variant<'_>) -> String) {
    out.open("match self {");
    for variant in variants {
        out.line(format!("Self::{}(member) => {},", variant.ident, arm(variant)));
    }
    out.close("}");
}

impl TypeGenerator for UnionGenerator {
    fn declaration(&self, target: &Target<'_>, out: &mut Source) {
        out.line("#[derive(Debug, Clone, PartialEq)]");
        out.open(format!("pub enum {} {{", target.ident()));
        for variant in variants(target) {
            out.line(format!("{}(rt::Arc<{}>),", variant.ident, variant.member));
        }
        out.close("}");
    }

    fn inherent(&self, target: &Target<'_>, out: &mut Source) {
        let variants = variants(target);
        open_inherent(target, out);
        out.line(format!(
            "pub const DISCRIMINANTS: &'static [&'static str] = {};",
            str_slice(variants.iter().map(|variant| variant.discriminant.as_str()))
        ));
        out.blank();

        out.line("/// Discriminant of the selected member; the kind name for kinded unions.");
        out.open("pub fn discriminant(&self) -> &'static str {");
        out.open("match self {");
        for variant in &variants {
            out.line(format!("Self::{}(_) => {:?},", variant.ident, variant.discriminant));
        }
        out.close("}");
        out.close("}");
        out.blank();

        out.open("pub fn member_name(&self) -> &'static str {");
        out.open("match self {");
        for variant in &variants {
            out.line(format!("Self::{}(_) => {}::TYPE_NAME,", variant.ident, variant.member));
        }
        out.close("}");
        out.close("}");
        out.blank();

        out.open("pub fn member_node(&self) -> rt::NodeRef {");
        match_self(&variants, out, |_| "rt::Arc::clone(member) as rt::NodeRef".to_owned());
        out.close("}");

        for variant in &variants {
            out.blank();
            out.open(format!(
                "pub fn {}(&self) -> Option<&{}> {{",
                variant.accessor, variant.member
            ));
            out.open("match self {");
            out.line(format!("Self::{}(member) => Some(&**member),", variant.ident));
            if variants.len() > 1 {
                out.line("_ => None,");
            }
            out.close("}");
            out.close("}");
        }
        out.blank();

        out.open("fn member(&self) -> &dyn rt::Node {");
        match_self(&variants, out, |_| "&**member as &dyn rt::Node".to_owned());
        out.close("}");
        out.blank();

        match repr(target) {
            UnionRepr::Keyed { .. } => {
                from_discriminant(target, &variants, out);
                out.blank();
                out.open(format!("{FROM_NODE} {{"));
                out.line("let (discriminant, content) = rt::single_entry(Self::TYPE_NAME, node)?;");
                out.line("Self::from_discriminant(&discriminant, &*content)");
                out.close("}");
            }
            UnionRepr::Envelope {
                discriminant_key,
                content_key,
                ..
            } => {
                from_discriminant(target, &variants, out);
                out.blank();
                out.open(format!("{FROM_NODE} {{"));
                out.line(format!(
                    "let content = rt::envelope_content(Self::TYPE_NAME, node, {discriminant_key:?}, {content_key:?})?;"
                ));
                out.line(format!(
                    "let discriminant = rt::discriminant(Self::TYPE_NAME, node, {discriminant_key:?})?;"
                ));
                out.line("Self::from_discriminant(&discriminant, &*content)");
                out.close("}");
            }
            UnionRepr::Inline {
                discriminant_key, ..
            } => {
                out.open(format!("{FROM_NODE} {{"));
                out.line(format!(
                    "let discriminant = rt::discriminant(Self::TYPE_NAME, node, {discriminant_key:?})?;"
                ));
                out.open("match discriminant.as_str() {");
                for variant in &variants {
                    out.line(format!(
                        "{:?} => Ok(Self::{}(rt::Arc::new({}::from_node_skipping(node, Some({discriminant_key:?}))?))),",
                        variant.discriminant, variant.ident, variant.member
                    ));
                }
                out.line("_ => Err(rt::unrecognized_member(Self::TYPE_NAME, &discriminant)),");
                out.close("}");
                out.close("}");
            }
            UnionRepr::Kinded { .. } => {
                let first = variants
                    .iter()
                    .find_map(|variant| variant.kind)
                    .unwrap_or(Kind::Map);
                out.open(format!("{FROM_NODE} {{"));
                out.open("match rt::Node::kind(node) {");
                for variant in &variants {
                    if let Some(kind) = variant.kind {
                        out.line(format!(
                            "rt::Kind::{kind:?} => Ok(Self::{}({})),",
                            variant.ident,
                            build_child(target, variant.member_id, "node")
                        ));
                    }
                }
                out.line(format!(
                    "found => Err(rt::kind_mismatch(Self::TYPE_NAME, rt::Kind::{first:?}, found)),"
                ));
                out.close("}");
                out.close("}");
            }
        }
        out.close("}");
    }

    fn kind(&self, _target: &Target<'_>, out: &mut Source) {
        out.function("fn kind(&self) -> rt::Kind", "rt::Node::kind(self.member())");
    }

    fn lookup_field(&self, _target: &Target<'_>, out: &mut Source) {
        out.function(LOOKUP_FIELD, "rt::Node::lookup_field(self.member(), name)");
    }

    fn lookup_index(&self, _target: &Target<'_>, out: &mut Source) {
        out.function(LOOKUP_INDEX, "rt::Node::lookup_index(self.member(), index)");
    }

    fn map_iter(&self, _target: &Target<'_>, out: &mut Source) {
        out.function(MAP_ITER, "rt::Node::map_iter(self.member())");
    }

    fn list_iter(&self, _target: &Target<'_>, out: &mut Source) {
        out.function(LIST_ITER, "rt::Node::list_iter(self.member())");
    }

    fn length(&self, _target: &Target<'_>, out: &mut Source) {
        out.function(LENGTH, "rt::Node::length(self.member())");
    }

    fn is_null(&self, _target: &Target<'_>, out: &mut Source) {
        out.function("fn is_null(&self) -> bool", "rt::Node::is_null(self.member())");
    }

    fn coercion(&self, _target: &Target<'_>, coercion: Coercion, out: &mut Source) {
        out.function(
            coercion.signature(),
            format!("rt::Node::{}(self.member())", coercion.method()),
        );
    }
}

/// Member selection by discriminant for keyed and envelope unions.
fn from_discriminant(target: &Target<'_>, variants: &[Variant<'_>], out: &mut Source) {
    out.open("pub fn from_discriminant(discriminant: &str, content: &dyn rt::Node) -> Result<Self, rt::NodeError> {");
    out.open("match discriminant {");
    for variant in variants {
        out.line(format!(
            "{:?} => Ok(Self::{}({})),",
            variant.discriminant,
            variant.ident,
            build_child(target, variant.member_id, "content")
        ));
    }
    out.line("_ => Err(rt::unrecognized_member(Self::TYPE_NAME, discriminant)),");
    out.close("}");
    out.close("}");
}
