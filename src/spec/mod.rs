//! # Spec Module
//!
//! Swagger 2.0 style API descriptions: the typed model the route compiler
//! walks, and loaders for YAML/JSON documents.
//!
//! The model keeps declaration order everywhere it matters (`paths`,
//! `securityDefinitions`, requirement objects) so that compilation output is
//! deterministic and follows the document.

mod load;
mod types;

pub use load::*;
pub use types::*;
