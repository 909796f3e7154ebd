//! Maps: an insertion-ordered `IndexMap` from key strings to the value
//! type. Enum keys are checked against the enum's members.
use super::source::Source;
use super::strategy::{
    Element, FROM_NODE, LENGTH, LOOKUP_FIELD, MAP_ITER, Target, TypeGenerator, collecting_builder,
    open_inherent,
};
use crate::schema::{MapType, TypeShape};

pub struct MapGenerator;

fn map<'a>(target: &Target<'a>) -> &'a MapType {
    match target.ty.shape() {
        TypeShape::Map(map) => map,
        _ => unreachable!("map generator selected for {}", target.ty.name()),
    }
}

fn element<'a>(target: &Target<'a>) -> Element<'a> {
    let map = map(target);
    Element {
        child: target.ident_of(map.value_type),
        nullable: map.value_nullable,
    }
}

/// Statement checking `key` when keys are enum members.
fn key_check(target: &Target<'_>, key: &str) -> Option<String> {
    let key_type = map(target).key_type;
    match target.schema.get(key_type).shape() {
        TypeShape::Enum(_) => Some(format!("{}::from_symbol({key})?;", target.ident_of(key_type))),
        _ => None,
    }
}

impl TypeGenerator for MapGenerator {
    fn declaration(&self, target: &Target<'_>, out: &mut Source) {
        out.line("#[derive(Debug, Clone, PartialEq)]");
        out.line(format!(
            "pub struct {}(rt::IndexMap<String, {}>);",
            target.ident(),
            element(target).storage()
        ));
    }

    fn inherent(&self, target: &Target<'_>, out: &mut Source) {
        let ident = target.ident();
        let element = element(target);
        let storage = element.storage();
        open_inherent(target, out);
        out.blank();

        out.line("/// Fails on a repeated key.");
        out.open(format!(
            "pub fn from_entries(entries: impl IntoIterator<Item = (String, {storage})>) -> Result<Self, rt::BuildError> {{"
        ));
        out.line("let mut map = rt::IndexMap::new();");
        out.open("for (key, value) in entries {");
        if let Some(check) = key_check(target, "&key") {
            out.line(check);
        }
        out.open("if map.contains_key(&key) {");
        out.line("return Err(rt::duplicate_key(&key));");
        out.close("}");
        out.line("map.insert(key, value);");
        out.close("}");
        out.line(format!("Ok({ident}(map))"));
        out.close("}");
        out.blank();

        out.function(
            format!("pub fn entries(&self) -> &rt::IndexMap<String, {storage}>"),
            "&self.0",
        );
        out.blank();
        out.function(
            format!("pub fn get(&self, key: &str) -> Option<&{storage}>"),
            "self.0.get(key)",
        );
        out.blank();
        out.function("pub fn len(&self) -> usize", "self.0.len()");
        out.blank();
        out.function("pub fn is_empty(&self) -> bool", "self.0.is_empty()");
        out.blank();

        out.open(format!("{FROM_NODE} {{"));
        out.line("rt::expect_kind(Self::TYPE_NAME, node, rt::Kind::Map)?;");
        out.line("let mut entries = rt::IndexMap::new();");
        out.open("for entry in rt::Node::map_iter(node)? {");
        out.line("let (key, value) = entry?;");
        if let Some(check) = key_check(target, "&key") {
            out.line(check);
        }
        out.line(format!("let value = {};", element.build("&*value")));
        out.line("entries.insert(key, value);");
        out.close("}");
        out.line(format!("Ok({ident}(entries))"));
        out.close("}");
        out.blank();
        element.node_fn(out);
        out.close("}");
    }

    fn kind(&self, _target: &Target<'_>, out: &mut Source) {
        out.function("fn kind(&self) -> rt::Kind", "rt::Kind::Map");
    }

    fn lookup_field(&self, target: &Target<'_>, out: &mut Source) {
        out.open(format!("{LOOKUP_FIELD} {{"));
        if let Some(check) = key_check(target, "name") {
            out.line(check);
        }
        out.line("self.0");
        out.line("    .get(name)");
        out.line("    .map(Self::element_node)");
        out.line("    .ok_or_else(|| rt::not_found(name))");
        out.close("}");
    }

    fn map_iter(&self, _target: &Target<'_>, out: &mut Source) {
        out.open(format!("{MAP_ITER} {{"));
        out.line("Ok(Box::new(self.0.iter().map(|(key, element)| {");
        out.line("    Ok::<_, rt::NodeError>((key.clone(), Self::element_node(element)))");
        out.line("})))");
        out.close("}");
    }

    fn length(&self, _target: &Target<'_>, out: &mut Source) {
        out.function(LENGTH, "Ok(self.0.len())");
    }

    /// Enum keys fail at the insert that carries them.
    fn builder(&self, target: &Target<'_>, out: &mut Source) {
        let key_type = map(target).key_type;
        let check = match target.schema.get(key_type).shape() {
            TypeShape::Enum(_) => Some(format!(
                "|key, _| {}::from_symbol(key).map(drop)",
                target.ident_of(key_type)
            )),
            _ => None,
        };
        collecting_builder(target, check, out);
    }
}
