//! Typed overlay over a generic tree data model.
//!
//! A [`schema::Schema`] declares shapes; a typed node is any value that is
//! readable as a generic [`datamodel::Node`] and is bound to one schema
//! type. Values become typed either by wrapping an existing node
//! ([`typed::TrustedNode`], [`typed::LazyNode`]) or through code produced
//! by [`codegen::Codegen`].
pub mod cli;
pub mod codegen;
pub mod datamodel;
pub mod error;
pub mod path_de;
pub mod schema;
pub mod support;
pub mod typed;

pub use error::{BuildError, Mismatch, NodeError};
