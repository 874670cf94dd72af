//! zbind - Object/XML data binding
//!
//! # Quick Start
//!
//! ```
//! use zbind::bind::{Schema, XmlObject};
//! use zbind::{from_xml, to_xml, xml_enum, xml_object};
//!
//! #[derive(Debug, Default, PartialEq)]
//! enum Rating {
//!     #[default]
//!     First,
//!     Second,
//! }
//! xml_enum!(Rating { First => "FIRST", Second => "SECOND" });
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Review {
//!     id: i32,
//!     rating: Rating,
//! }
//!
//! impl XmlObject for Review {
//!     fn schema() -> Schema<Self> {
//!         Schema::<Self>::new()
//!             .field("id", |r| &r.id, |r| &mut r.id)
//!             .field("rating", |r| &r.rating, |r| &mut r.rating)
//!     }
//! }
//! xml_object!(Review);
//!
//! # fn main() -> Result<(), zbind::Error> {
//! let review = Review { id: 1, rating: Rating::First };
//! let xml = to_xml(&review)?;
//! assert_eq!(xml, "<root><id>1</id><rating>FIRST</rating></root>");
//! assert_eq!(from_xml::<Review>(&xml)?, review);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub use error::{Error, ErrorKind, Pos, Result, Span};

pub mod config;
pub use config::Config;

pub mod lexer;

pub mod xml;
pub use xml::{Attribute, Document, Element, NodeId, Parser, Writer};

pub mod bind;
pub use bind::{Adapter, Schema, XmlObject, XmlValue};

use std::io::{Read, Write};

use tracing::{debug, instrument, warn};

/// Serialize an object to compact XML
pub fn to_xml<T: XmlObject>(value: &T) -> Result<String> {
    to_xml_with_config(value, &Config::default())
}

/// Serialize an object with custom configuration
pub fn to_xml_with_config<T: XmlObject>(value: &T, config: &Config) -> Result<String> {
    let doc = to_document(value, config)?;
    Ok(xml::writer::to_string(&doc, config))
}

/// Serialize an object into a byte sink
pub fn to_writer<T: XmlObject, W: Write>(value: &T, config: &Config, sink: W) -> Result<()> {
    let doc = to_document(value, config)?;
    xml::writer::write_to(&doc, config, sink)
}

/// Map an object onto a new document without rendering it
pub fn to_document<T: XmlObject>(value: &T, config: &Config) -> Result<Document> {
    bind::serialize(value, config)
}

/// Parse XML text and map it onto a new object
pub fn from_xml<T: XmlObject>(text: &str) -> Result<T> {
    from_xml_with_config(text, &Config::default())
}

/// Parse and map with custom configuration
pub fn from_xml_with_config<T: XmlObject>(text: &str, config: &Config) -> Result<T> {
    let doc = Parser::with_config(text.as_bytes(), config).parse()?;
    from_document(&doc, config)
}

/// Read, parse and map a whole XML stream
pub fn from_reader<T: XmlObject, R: Read>(reader: R, config: &Config) -> Result<T> {
    let bytes = read_all(reader)?;
    let doc = Parser::with_config(&bytes, config).parse()?;
    from_document(&doc, config)
}

/// Map the root element of a parsed document onto a new object
pub fn from_document<T: XmlObject>(doc: &Document, config: &Config) -> Result<T> {
    let ctx = bind::Context::new(config)?;
    let value = bind::read_object(doc.root_element(), &ctx)?;
    debug!(ty = std::any::type_name::<T>(), "object deserialized");
    Ok(value)
}

/// Best-effort parse: any failure yields `None`
///
/// Use [`parse_str`] to find out what went wrong.
pub fn parse(text: &str) -> Option<Document> {
    match parse_str(text) {
        Ok(doc) => Some(doc),
        Err(err) => {
            warn!(error = %err, "discarding malformed xml");
            None
        }
    }
}

/// Parse XML text into a document
pub fn parse_str(text: &str) -> Result<Document> {
    Parser::new(text.as_bytes()).parse()
}

/// Parse a whole XML stream
///
/// Read failures surface as [`ErrorKind::Io`], content failures as
/// [`ErrorKind::MalformedDocument`].
#[instrument(skip(reader))]
pub fn parse_reader<R: Read>(reader: R) -> Result<Document> {
    let bytes = read_all(reader)?;
    Parser::new(&bytes).parse()
}

/// Start a hand-built document
pub fn create_root(name: impl Into<String>) -> Document {
    Document::new(name)
}

fn read_all<R: Read>(mut reader: R) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    debug!(bytes = bytes.len(), "xml input read");
    Ok(bytes)
}
