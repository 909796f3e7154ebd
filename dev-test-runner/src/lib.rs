//! Types generated from `schemas/fixture.json` at build time.

#[allow(dead_code, clippy::all)]
pub mod fixture {
    include!(concat!(env!("OUT_DIR"), "/fixture.rs"));
}
