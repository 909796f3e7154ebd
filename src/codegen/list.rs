//! Lists: an owned `Vec` of the value type.
use super::source::Source;
use super::strategy::{
    Element, FROM_NODE, LENGTH, LIST_ITER, LOOKUP_INDEX, Target, TypeGenerator, open_inherent,
};
use crate::schema::TypeShape;

pub struct ListGenerator;

fn element<'a>(target: &Target<'a>) -> Element<'a> {
    match target.ty.shape() {
        TypeShape::List(list) => Element {
            child: target.ident_of(list.value_type),
            nullable: list.value_nullable,
        },
        _ => unreachable!("list generator selected for {}", target.ty.name()),
    }
}

impl TypeGenerator for ListGenerator {
    fn declaration(&self, target: &Target<'_>, out: &mut Source) {
        out.line("#[derive(Debug, Clone, PartialEq)]");
        out.line(format!(
            "pub struct {}(Vec<{}>);",
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
        out.function(format!("pub fn new(items: Vec<{storage}>) -> Self"), format!("{ident}(items)"));
        out.blank();
        out.function(format!("pub fn items(&self) -> &[{storage}]"), "&self.0");
        out.blank();
        out.function("pub fn len(&self) -> usize", "self.0.len()");
        out.blank();
        out.function("pub fn is_empty(&self) -> bool", "self.0.is_empty()");
        out.blank();
        out.open(format!("{FROM_NODE} {{"));
        out.line("rt::expect_kind(Self::TYPE_NAME, node, rt::Kind::List)?;");
        out.line("let mut items = Vec::new();");
        out.open("for entry in rt::Node::list_iter(node)? {");
        out.line("let (_, item) = entry?;");
        out.line(format!("items.push({});", element.build("&*item")));
        out.close("}");
        out.line(format!("Ok({ident}(items))"));
        out.close("}");
        out.blank();
        element.node_fn(out);
        out.close("}");
    }

    fn kind(&self, _target: &Target<'_>, out: &mut Source) {
        out.function("fn kind(&self) -> rt::Kind", "rt::Kind::List");
    }

    fn lookup_index(&self, _target: &Target<'_>, out: &mut Source) {
        out.open(format!("{LOOKUP_INDEX} {{"));
        out.line("self.0");
        out.line("    .get(index)");
        out.line("    .map(Self::element_node)");
        out.line("    .ok_or_else(|| rt::out_of_range(index, self.0.len()))");
        out.close("}");
    }

    fn list_iter(&self, _target: &Target<'_>, out: &mut Source) {
        out.open(format!("{LIST_ITER} {{"));
        out.line("Ok(Box::new(self.0.iter().enumerate().map(|(index, element)| {");
        out.line("    Ok::<_, rt::NodeError>((index, Self::element_node(element)))");
        out.line("})))");
        out.close("}");
    }

    fn length(&self, _target: &Target<'_>, out: &mut Source) {
        out.function(LENGTH, "Ok(self.0.len())");
    }
}
