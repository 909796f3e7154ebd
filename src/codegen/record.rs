//! Records: one slot per declared field, in declared order, plus an
//! assembler that checks each assignment as it happens.
use super::names::accessor_idents;
use super::source::Source;
use super::strategy::{
    FROM_NODE, LENGTH, LOOKUP_FIELD, LOOKUP_INDEX, MAP_ITER, Target, TypeGenerator,
    assembling_builder, build_child, open_inherent, str_slice,
};
use crate::schema::{Field, Presence, RecordType, TypeShape};

/// Inherent methods of a record that field accessors must not shadow.
const RESERVED: &[&str] = &["new", "from_node", "from_node_skipping", "field_index", "field_node"];

pub struct RecordGenerator;

/// A declared field with the idents and Rust types generated for it.
struct Slot<'a> {
    field: &'a Field,
    ident: String,
    child: &'a str,
}

impl Slot<'_> {
    fn presence(&self) -> Presence {
        self.field.presence()
    }

    fn name(&self) -> String {
        format!("{:?}", self.field.name)
    }

    /// Storage type in the record.
    fn storage(&self) -> String {
        let child = self.child;
        match self.presence() {
            Presence::Required => format!("rt::Arc<{child}>"),
            Presence::Nullable | Presence::Optional => format!("Option<rt::Arc<{child}>>"),
            Presence::Omittable => format!("rt::Maybe<rt::Arc<{child}>>"),
        }
    }

    /// Storage type in the assembler, where every field may be unassigned.
    fn pending(&self) -> String {
        match self.presence() {
            Presence::Nullable => format!("Option<Option<rt::Arc<{}>>>", self.child),
            Presence::Required => format!("Option<rt::Arc<{}>>", self.child),
            _ => self.storage(),
        }
    }
}

fn record<'a>(target: &Target<'a>) -> &'a RecordType {
    match target.ty.shape() {
        TypeShape::Record(record) => record,
        _ => unreachable!("record generator selected for {}", target.ty.name()),
    }
}

fn slots<'a>(target: &Target<'a>) -> Vec<Slot<'a>> {
    let record = record(target);
    let idents = accessor_idents(record.fields().map(|f| f.name.as_str()), RESERVED);
    record
        .fields()
        .zip(idents)
        .map(|(field, ident)| Slot {
            field,
            ident,
            child: target.ident_of(field.type_id),
        })
        .collect()
}

impl TypeGenerator for RecordGenerator {
    fn declaration(&self, target: &Target<'_>, out: &mut Source) {
        out.line("#[derive(Debug, Clone, PartialEq)]");
        out.open(format!("pub struct {} {{", target.ident()));
        for slot in slots(target) {
            out.line(format!("{}: {},", slot.ident, slot.storage()));
        }
        out.close("}");
    }

    fn inherent(&self, target: &Target<'_>, out: &mut Source) {
        let ident = target.ident();
        let slots = slots(target);
        open_inherent(target, out);
        out.line(format!(
            "pub const FIELDS: &'static [&'static str] = {};",
            str_slice(slots.iter().map(|slot| slot.field.name.as_str()))
        ));
        let omittable: Vec<&str> = slots
            .iter()
            .map(|slot| if slot.presence() == Presence::Omittable { "true" } else { "false" })
            .collect();
        out.line(format!(
            "const OMITTABLE: [bool; {}] = [{}];",
            slots.len(),
            omittable.join(", ")
        ));
        out.blank();

        let params: Vec<String> = slots
            .iter()
            .map(|slot| format!("{}: {}", slot.ident, slot.storage()))
            .collect();
        let fields: Vec<&str> = slots.iter().map(|slot| slot.ident.as_str()).collect();
        out.function(
            format!("pub fn new({}) -> Self", params.join(", ")),
            format!("{ident} {{ {} }}", fields.join(", ")),
        );

        for slot in &slots {
            out.blank();
            let (ident, child) = (&slot.ident, slot.child);
            match slot.presence() {
                Presence::Required => {
                    out.function(format!("pub fn {ident}(&self) -> &{child}"), format!("&self.{ident}"));
                }
                Presence::Nullable | Presence::Optional => {
                    out.function(
                        format!("pub fn {ident}(&self) -> Option<&{child}>"),
                        format!("self.{ident}.as_deref()"),
                    );
                }
                Presence::Omittable => {
                    out.function(
                        format!("pub fn {ident}(&self) -> rt::Maybe<&{child}>"),
                        format!("self.{ident}.as_deref()"),
                    );
                }
            }
        }

        out.blank();
        out.function(FROM_NODE, "Self::from_node_skipping(node, None)");
        out.blank();
        out.line("/// Like `from_node`, ignoring the entry under `skip`.");
        out.open("pub fn from_node_skipping(node: &dyn rt::Node, skip: Option<&str>) -> Result<Self, rt::NodeError> {");
        out.line("rt::expect_kind(Self::TYPE_NAME, node, rt::Kind::Map)?;");
        out.line(format!(
            "let mut assembler = {}::default();",
            target.type_names().assembler
        ));
        out.open("for entry in rt::Node::map_iter(node)? {");
        out.line("let (key, value) = entry?;");
        out.open("if Some(key.as_str()) == skip {");
        out.line("continue;");
        out.close("}");
        out.line("assembler.assign(&key, &*value)?;");
        out.close("}");
        out.line("assembler.finish_record()");
        out.close("}");
        out.blank();

        out.function(
            "fn field_index(name: &str) -> Option<usize>",
            "Self::FIELDS.iter().position(|field| *field == name)",
        );
        out.blank();
        out.open("fn field_node(&self, index: usize) -> Option<rt::NodeRef> {");
        out.open("let node: rt::NodeRef = match index {");
        for (index, slot) in slots.iter().enumerate() {
            let ident = &slot.ident;
            match slot.presence() {
                Presence::Required => {
                    out.line(format!("{index} => rt::Arc::clone(&self.{ident}) as rt::NodeRef,"));
                }
                Presence::Nullable | Presence::Optional => {
                    let missing = if slot.presence() == Presence::Nullable { "rt::null()" } else { "rt::absent()" };
                    out.open(format!("{index} => match &self.{ident} {{"));
                    out.line("Some(value) => rt::Arc::clone(value) as rt::NodeRef,");
                    out.line(format!("None => {missing},"));
                    out.close("},");
                }
                Presence::Omittable => {
                    out.open(format!("{index} => match &self.{ident} {{"));
                    out.line("rt::Maybe::Value(value) => rt::Arc::clone(value) as rt::NodeRef,");
                    out.line("rt::Maybe::Null => rt::null(),");
                    out.line("rt::Maybe::Absent => rt::absent(),");
                    out.close("},");
                }
            }
        }
        out.line("_ => return None,");
        out.close("};");
        out.line("Some(node)");
        out.close("}");
        out.close("}");
    }

    fn kind(&self, _target: &Target<'_>, out: &mut Source) {
        out.function("fn kind(&self) -> rt::Kind", "rt::Kind::Map");
    }

    fn lookup_field(&self, _target: &Target<'_>, out: &mut Source) {
        out.open(format!("{LOOKUP_FIELD} {{"));
        out.line("Self::field_index(name)");
        out.line("    .and_then(|index| self.field_node(index))");
        out.line("    .ok_or_else(|| rt::undeclared_field(Self::TYPE_NAME, name))");
        out.close("}");
    }

    fn lookup_index(&self, _target: &Target<'_>, out: &mut Source) {
        out.function(
            LOOKUP_INDEX,
            "self.field_node(index).ok_or_else(|| rt::out_of_range(index, Self::FIELDS.len()))",
        );
    }

    fn map_iter(&self, _target: &Target<'_>, out: &mut Source) {
        out.open(format!("{MAP_ITER} {{"));
        out.open("Ok(Box::new((0..Self::FIELDS.len()).filter_map(move |index| {");
        out.line("let value = self.field_node(index)?;");
        out.open("if Self::OMITTABLE[index] && rt::Node::is_absent(&*value) {");
        out.line("return None;");
        out.close("}");
        out.line("Some(Ok::<_, rt::NodeError>((Self::FIELDS[index].to_owned(), value)))");
        out.close("})))");
        out.close("}");
    }

    fn length(&self, _target: &Target<'_>, out: &mut Source) {
        out.function(LENGTH, "Ok(rt::Node::map_iter(self)?.count())");
    }

    fn builder(&self, target: &Target<'_>, out: &mut Source) {
        assembler(target, &slots(target), out);
        out.blank();
        assembling_builder(target, out);
    }
}

/// `<Record>Assembler`: assignments are checked one at a time, repeats and
/// undeclared keys fail at the assignment, missing fields at the finish.
fn assembler(target: &Target<'_>, slots: &[Slot<'_>], out: &mut Source) {
    let ident = target.ident();
    let assembler = &target.type_names().assembler;
    out.line("#[derive(Debug, Default)]");
    out.open(format!("pub struct {assembler} {{"));
    for slot in slots {
        out.line(format!("{}: {},", slot.ident, slot.pending()));
    }
    out.close("}");
    out.blank();

    out.open(format!("impl {assembler} {{"));
    out.open("fn is_assigned(&self, key: &str) -> bool {");
    out.open("match key {");
    for slot in slots {
        let test = match slot.presence() {
            Presence::Omittable => format!("!self.{}.is_absent()", slot.ident),
            _ => format!("self.{}.is_some()", slot.ident),
        };
        out.line(format!("{} => {test},", slot.name()));
    }
    out.line("_ => false,");
    out.close("}");
    out.close("}");
    out.blank();

    out.open("fn assign(&mut self, key: &str, value: &dyn rt::Node) -> Result<(), rt::NodeError> {");
    out.open("match key {");
    for slot in slots {
        let (name, field) = (slot.name(), &slot.ident);
        let build = build_child(target, slot.field.type_id, "value");
        match slot.presence() {
            Presence::Required => {
                out.line(format!("{name} => self.{field} = Some({build}),"));
            }
            Presence::Nullable => {
                out.line(format!(
                    "{name} if rt::Node::is_null(value) && !rt::Node::is_absent(value) => self.{field} = Some(None),"
                ));
                out.line(format!("{name} => self.{field} = Some(Some({build})),"));
            }
            Presence::Optional => {
                out.line(format!("{name} if rt::Node::is_absent(value) => {{}}"));
                out.line(format!("{name} => self.{field} = Some({build}),"));
            }
            Presence::Omittable => {
                out.line(format!("{name} if rt::Node::is_absent(value) => {{}}"));
                out.line(format!(
                    "{name} if rt::Node::is_null(value) => self.{field} = rt::Maybe::Null,"
                ));
                out.line(format!("{name} => self.{field} = rt::Maybe::Value({build}),"));
            }
        }
    }
    out.line(format!(
        "_ => return Err(rt::unexpected_field({ident}::TYPE_NAME, key)),"
    ));
    out.close("}");
    out.line("Ok(())");
    out.close("}");
    out.blank();

    out.open(format!("fn finish_record(self) -> Result<{ident}, rt::NodeError> {{"));
    out.open(format!("Ok({ident} {{"));
    for slot in slots {
        let field = &slot.ident;
        match slot.presence() {
            Presence::Required | Presence::Nullable => out.line(format!(
                "{field}: self.{field}.ok_or_else(|| rt::missing_field({ident}::TYPE_NAME, {}))?,",
                slot.name()
            )),
            Presence::Optional | Presence::Omittable => out.line(format!("{field}: self.{field},")),
        }
    }
    out.close("})");
    out.close("}");
    out.close("}");
    out.blank();

    out.open(format!("impl rt::MapAssembler for {assembler} {{"));
    out.open("fn insert(&mut self, key: &str, value: rt::NodeRef) -> Result<(), rt::BuildError> {");
    out.open("if self.is_assigned(key) {");
    out.line("return Err(rt::duplicate_key(key));");
    out.close("}");
    out.line("self.assign(key, &*value).map_err(rt::into_build_error)");
    out.close("}");
    out.blank();
    out.open("fn finish(self: Box<Self>) -> Result<rt::NodeRef, rt::BuildError> {");
    out.line("let record = (*self).finish_record().map_err(rt::into_build_error)?;");
    out.line("Ok(rt::Arc::new(record))");
    out.close("}");
    out.close("}");
}
