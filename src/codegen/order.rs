//! Emission order: dependencies first, recursive groups kept together.
use std::collections::HashSet;

use super::GenError;
use crate::schema::{Presence, Schema, TypeId, TypeShape};

/// Types emitted together. A group has more than one member, or a member
/// that refers to itself, exactly when it is recursive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub members: Vec<TypeId>,
    pub recursive: bool,
}

/// Order the closure of `roots` (every type when `roots` is empty) so that
/// each group comes after every group it refers to.
pub fn emission_order(schema: &Schema, roots: &[TypeId]) -> Result<Vec<Group>, GenError> {
    let selected = closure(schema, roots);
    let groups = components(schema, &selected, |id| schema.get(id).references());
    for group in &groups {
        check_constructible(schema, group)?;
    }
    Ok(groups)
}

fn closure(schema: &Schema, roots: &[TypeId]) -> Vec<TypeId> {
    if roots.is_empty() {
        return schema.iter().map(|(id, _)| id).collect();
    }
    let mut seen = HashSet::new();
    let mut stack: Vec<TypeId> = roots.iter().rev().copied().collect();
    while let Some(id) = stack.pop() {
        if seen.insert(id) {
            stack.extend(schema.get(id).references().into_iter().rev());
        }
    }
    let mut selected: Vec<TypeId> = seen.into_iter().collect();
    selected.sort();
    selected
}

/// Tarjan's strongly connected components over `nodes`, visited in the
/// given order with neighbours in `edges` order. Components come out
/// dependencies first; members are sorted by id.
fn components(
    schema: &Schema,
    nodes: &[TypeId],
    edges: impl Fn(TypeId) -> Vec<TypeId>,
) -> Vec<Group> {
    struct State {
        index: Vec<Option<usize>>,
        low: Vec<usize>,
        on_stack: Vec<bool>,
        stack: Vec<TypeId>,
        next: usize,
        groups: Vec<Group>,
    }

    fn connect(
        state: &mut State,
        allowed: &HashSet<TypeId>,
        edges: &dyn Fn(TypeId) -> Vec<TypeId>,
        id: TypeId,
    ) {
        let v = id.index();
        state.index[v] = Some(state.next);
        state.low[v] = state.next;
        state.next += 1;
        state.stack.push(id);
        state.on_stack[v] = true;

        let neighbours = edges(id);
        for &next in &neighbours {
            if !allowed.contains(&next) {
                continue;
            }
            let w = next.index();
            match state.index[w] {
                None => {
                    connect(state, allowed, edges, next);
                    state.low[v] = state.low[v].min(state.low[w]);
                }
                Some(index) if state.on_stack[w] => {
                    state.low[v] = state.low[v].min(index);
                }
                Some(_) => {}
            }
        }

        if Some(state.low[v]) == state.index[v] {
            let mut members = Vec::new();
            while let Some(member) = state.stack.pop() {
                state.on_stack[member.index()] = false;
                members.push(member);
                if member == id {
                    break;
                }
            }
            members.sort();
            let recursive = members.len() > 1 || neighbours.contains(&id);
            state.groups.push(Group { members, recursive });
        }
    }

    let allowed: HashSet<TypeId> = nodes.iter().copied().collect();
    let mut state = State {
        index: vec![None; schema.len()],
        low: vec![0; schema.len()],
        on_stack: vec![false; schema.len()],
        stack: Vec::new(),
        next: 0,
        groups: Vec::new(),
    };
    for &id in nodes {
        if state.index[id.index()].is_none() {
            connect(&mut state, &allowed, &edges, id);
        }
    }
    state.groups
}

/// Reject a recursive group holding a type no finite value can inhabit.
///
/// Inhabited types are found by iterating to a fixpoint: scalars, enums,
/// lists and maps always are (an empty collection ends the recursion), a
/// record once every required field's type is, a union once any member
/// is. Types outside the group were checked with their own group.
fn check_constructible(schema: &Schema, group: &Group) -> Result<(), GenError> {
    if !group.recursive {
        return Ok(());
    }
    let members: HashSet<TypeId> = group.members.iter().copied().collect();
    let mut inhabited: HashSet<TypeId> = HashSet::new();
    loop {
        let mut changed = false;
        for &id in &group.members {
            if inhabited.contains(&id) {
                continue;
            }
            let known = |other: &TypeId| !members.contains(other) || inhabited.contains(other);
            let buildable = match schema.get(id).shape() {
                TypeShape::Record(record) => record
                    .fields()
                    .filter(|field| field.presence() == Presence::Required)
                    .all(|field| known(&field.type_id)),
                TypeShape::Union(union) => union.members().iter().any(known),
                _ => true,
            };
            if buildable {
                inhabited.insert(id);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    match group.members.iter().find(|id| !inhabited.contains(id)) {
        Some(id) => Err(GenError::IllegalCycle {
            type_name: schema.get(*id).name().to_owned(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDecl, SchemaDoc, TypeDecl};

    fn names(schema: &Schema, groups: &[Group]) -> Vec<Vec<String>> {
        groups
            .iter()
            .map(|group| {
                group
                    .members
                    .iter()
                    .map(|id| schema.get(*id).name().to_owned())
                    .collect()
            })
            .collect()
    }

    #[test]
    fn dependencies_come_first() {
        let doc = SchemaDoc::new()
            .with_type("Points", TypeDecl::list("Point"))
            .with_type(
                "Point",
                TypeDecl::record([("x", FieldDecl::required("Int")), ("y", FieldDecl::required("Int"))]),
            );
        let schema = Schema::from_doc(&doc).unwrap();
        let groups = emission_order(&schema, &[]).unwrap();
        assert_eq!(names(&schema, &groups), [["Int"], ["Point"], ["Points"]]);
        assert!(groups.iter().all(|group| !group.recursive));
    }

    #[test]
    fn recursion_through_a_list_is_one_group() {
        let doc = SchemaDoc::new()
            .with_type(
                "Tree",
                TypeDecl::record([
                    ("label", FieldDecl::required("String")),
                    ("children", FieldDecl::required("Forest")),
                ]),
            )
            .with_type("Forest", TypeDecl::list("Tree"));
        let schema = Schema::from_doc(&doc).unwrap();
        let groups = emission_order(&schema, &[]).unwrap();
        assert_eq!(names(&schema, &groups), [vec!["String"], vec!["Tree", "Forest"]]);
        assert!(groups[1].recursive);
    }

    #[test]
    fn required_self_reference_is_illegal() {
        let doc = SchemaDoc::new().with_type(
            "Chain",
            TypeDecl::record([("next", FieldDecl::required("Chain"))]),
        );
        let schema = Schema::from_doc(&doc).unwrap();
        assert_eq!(
            emission_order(&schema, &[]).unwrap_err(),
            GenError::IllegalCycle {
                type_name: "Chain".into()
            }
        );

        let doc = SchemaDoc::new().with_type(
            "Chain",
            TypeDecl::record([("next", FieldDecl::required("Chain").optional())]),
        );
        let schema = Schema::from_doc(&doc).unwrap();
        assert!(emission_order(&schema, &[]).unwrap()[0].recursive);
    }

    #[test]
    fn union_whose_every_member_is_in_the_cycle_is_illegal() {
        let doc = SchemaDoc::new()
            .with_type("Chain", TypeDecl::record([("next", FieldDecl::required("Step"))]))
            .with_type("Step", TypeDecl::keyed_union([("a", "Chain")]));
        let schema = Schema::from_doc(&doc).unwrap();
        assert_eq!(
            emission_order(&schema, &[]).unwrap_err(),
            GenError::IllegalCycle {
                type_name: "Chain".into()
            }
        );

        let doc = SchemaDoc::new()
            .with_type("Chain", TypeDecl::record([("next", FieldDecl::required("Step"))]))
            .with_type("Step", TypeDecl::keyed_union([("a", "Chain"), ("end", "Int")]));
        let schema = Schema::from_doc(&doc).unwrap();
        let groups = emission_order(&schema, &[]).unwrap();
        assert_eq!(names(&schema, &groups), [vec!["Int"], vec!["Chain", "Step"]]);
    }

    #[test]
    fn roots_restrict_to_their_closure() {
        let doc = SchemaDoc::new()
            .with_type("Name", TypeDecl::String)
            .with_type("Names", TypeDecl::list("Name"))
            .with_type("Unused", TypeDecl::Int);
        let schema = Schema::from_doc(&doc).unwrap();
        let root = schema.lookup("Names").unwrap();
        let groups = emission_order(&schema, &[root]).unwrap();
        assert_eq!(names(&schema, &groups), [["Name"], ["Names"]]);
    }
}
