//! XML document model, parser and serializer

pub mod escape;
pub mod model;
pub mod parser;
pub mod writer;

pub use model::{Attribute, Document, Element, NodeId, Text};
pub use parser::Parser;
pub use writer::Writer;
