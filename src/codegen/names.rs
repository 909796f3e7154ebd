//! Rust identifiers for schema names.
//!
//! Every schema type gets a unique set of idents up front so that units
//! generated in parallel agree on how to refer to each other.
use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::schema::{Schema, TypeId};

static WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Z]+[a-z0-9]*|[a-z0-9]+").expect("word pattern"));

const KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "crate",
    "do", "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl",
    "in", "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref",
    "return", "self", "Self", "static", "struct", "super", "trait", "true", "try", "type",
    "typeof", "unsafe", "unsized", "use", "virtual", "where", "while", "yield",
];

/// Keywords that cannot be written as raw identifiers.
const NOT_RAW: &[&str] = &["crate", "self", "Self", "super"];

/// Prelude names generated code uses unqualified; a type may not shadow them.
const PRELUDE: &[&str] = &[
    "AsMut", "AsRef", "Box", "Clone", "Copy", "Default", "DoubleEndedIterator", "Drop", "Eq",
    "Err", "ExactSizeIterator", "Extend", "Fn", "FnMut", "FnOnce", "From", "FromIterator", "Into",
    "IntoIterator", "Iterator", "None", "Ok", "Option", "Ord", "PartialEq", "PartialOrd",
    "Result", "Self", "Send", "Sized", "Some", "String", "Sync", "ToOwned", "ToString", "TryFrom",
    "TryInto", "Unpin", "Vec",
];

/// Items every generated output defines besides the types.
const MODULE_ITEMS: &[&str] = &["rt", "schema", "SCHEMA", "SCHEMA_JSON"];

fn words(name: &str) -> impl Iterator<Item = &str> {
    WORD.find_iter(name).map(|m| m.as_str())
}

pub fn upper_camel(name: &str) -> String {
    let mut out = String::new();
    for word in words(name) {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(&chars.as_str().to_lowercase());
        }
    }
    match out.chars().next() {
        None => "Unnamed".to_owned(),
        Some(first) if first.is_ascii_digit() => format!("T{out}"),
        Some(_) => out,
    }
}

pub fn snake(name: &str) -> String {
    let out = words(name)
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_");
    match out.chars().next() {
        None => "field".to_owned(),
        Some(first) if first.is_ascii_digit() => format!("_{out}"),
        Some(_) => out,
    }
}

/// snake_case value ident; keywords become raw where Rust allows it.
pub fn value_ident(name: &str) -> String {
    let ident = snake(name);
    if NOT_RAW.contains(&ident.as_str()) {
        format!("{ident}_")
    } else if KEYWORDS.contains(&ident.as_str()) {
        format!("r#{ident}")
    } else {
        ident
    }
}

/// Module ident, also used as the file stem in directory output.
pub fn module_ident(name: &str) -> String {
    let ident = snake(name);
    if KEYWORDS.contains(&ident.as_str()) {
        format!("{ident}_")
    } else {
        ident
    }
}

/// First of `candidate`, `candidate<sep>2`, `candidate<sep>3`, ... not in
/// `taken`; the result is added to `taken`.
pub fn unique(candidate: String, sep: &str, taken: &mut HashSet<String>) -> String {
    let bare = candidate.trim_start_matches("r#");
    if !taken.contains(bare) {
        taken.insert(bare.to_owned());
        return candidate;
    }
    let mut n = 2;
    loop {
        let next = format!("{bare}{sep}{n}");
        if !taken.contains(&next) {
            taken.insert(next.clone());
            return next;
        }
        n += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeNames {
    /// Ident of the generated type.
    pub ident: String,
    /// Ident of its `NodeBuilder`.
    pub builder: String,
    /// Ident of the record assembler; only emitted for records.
    pub assembler: String,
    /// Module name in directory output.
    pub module: String,
}

/// Idents for every type of a schema, indexed by [`TypeId`].
#[derive(Debug, Clone)]
pub struct Names {
    types: Vec<TypeNames>,
}

impl Names {
    pub fn new(schema: &Schema) -> Self {
        let mut taken: HashSet<String> = PRELUDE
            .iter()
            .chain(MODULE_ITEMS)
            .map(|name| (*name).to_owned())
            .collect();
        let mut modules: HashSet<String> = MODULE_ITEMS.iter().map(|name| (*name).to_owned()).collect();
        let mut types = Vec::with_capacity(schema.len());
        for (_, ty) in schema.iter() {
            let base = upper_camel(ty.name());
            // `String` reads better as `StringType` than as `String2`
            let base = if PRELUDE.contains(&base.as_str()) {
                format!("{base}Type")
            } else {
                base
            };
            let mut n = 1;
            let ident = loop {
                let ident = if n == 1 { base.clone() } else { format!("{base}{n}") };
                let derived = [
                    ident.clone(),
                    format!("{ident}Builder"),
                    format!("{ident}Assembler"),
                ];
                if derived.iter().all(|name| !taken.contains(name)) {
                    taken.extend(derived);
                    break ident;
                }
                n += 1;
            };
            let module = unique(module_ident(&ident), "_", &mut modules);
            types.push(TypeNames {
                builder: format!("{ident}Builder"),
                assembler: format!("{ident}Assembler"),
                ident,
                module,
            });
        }
        Names { types }
    }

    pub fn get(&self, id: TypeId) -> &TypeNames {
        &self.types[id.index()]
    }

    pub fn ident(&self, id: TypeId) -> &str {
        &self.get(id).ident
    }
}

/// Variant idents for the members of an enum or the discriminants of a
/// union, in declaration order.
pub fn variant_idents<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut taken = HashSet::new();
    taken.insert("Self".to_owned());
    names
        .into_iter()
        .map(|name| unique(upper_camel(name), "", &mut taken))
        .collect()
}

/// Methods of `Node` and `TypedNode`. Accessors named like these would
/// shadow the trait methods at call sites.
const NODE_METHODS: &[&str] = &[
    "kind", "lookup_field", "lookup_index", "map_iter", "list_iter", "length", "is_null",
    "is_absent", "as_bool", "as_int", "as_float", "as_string", "as_bytes", "as_link",
    "node_builder", "typed", "schema_type", "type_kind",
];

/// Accessor idents for declared names, avoiding `reserved` inherent method
/// names and the node trait methods.
pub fn accessor_idents<'a>(names: impl IntoIterator<Item = &'a str>, reserved: &[&str]) -> Vec<String> {
    let mut taken: HashSet<String> = reserved
        .iter()
        .chain(NODE_METHODS)
        .map(|name| (*name).to_owned())
        .collect();
    names
        .into_iter()
        .map(|name| unique(value_ident(name), "_", &mut taken))
        .collect()
}
