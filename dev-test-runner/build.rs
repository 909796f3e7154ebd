use std::path::PathBuf;

use typed_node::codegen::{GenOptions, generate_file};
use typed_node::path_de;
use typed_node::schema::SchemaDoc;

const FIXTURE: &str = "schemas/fixture.json";

fn main() {
    println!("cargo:rerun-if-changed={FIXTURE}");
    let source = std::fs::read_to_string(FIXTURE)
        .unwrap_or_else(|err| panic!("failed to read {FIXTURE}: {err}"));
    let doc = path_de::from_str_with_path::<SchemaDoc>(&source)
        .unwrap_or_else(|err| panic!("failed to parse {FIXTURE}: {err}"));
    let code = generate_file(&doc, &[] as &[&str], GenOptions::default())
        .unwrap_or_else(|err| panic!("failed to generate {FIXTURE}: {err}"));
    let out_dir = PathBuf::from(std::env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    std::fs::write(out_dir.join("fixture.rs"), code).expect("failed to write generated fixture");
}
