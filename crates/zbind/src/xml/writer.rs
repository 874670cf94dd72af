//! XML serializer

use std::io;

use tracing::debug;

use crate::config::Config;
use crate::error::Result;
use crate::xml::escape::escape_into;
use crate::xml::model::{Document, Element};

pub const DECLARATION: &str = r#"<?xml version="1.0" encoding="utf-8"?>"#;

/// Renders a [`Document`] as XML text
#[derive(Debug)]
pub struct Writer<'c> {
    config: &'c Config,
    out: String,
}

impl<'c> Writer<'c> {
    pub fn new(config: &'c Config) -> Self {
        Self {
            config,
            out: String::new(),
        }
    }

    pub fn write_document(&mut self, doc: &Document) {
        if doc.emits_declaration() {
            self.out.push_str(DECLARATION);
            if self.config.pretty_print() {
                self.out.push_str(self.config.line_symbol());
            }
        }
        self.write_element(doc.root_element(), 0);
    }

    pub fn finish(self) -> String {
        self.out
    }

    fn write_element(&mut self, element: Element<'_>, depth: usize) {
        if depth > 0 {
            self.newline(depth);
        }

        self.out.push('<');
        self.out.push_str(element.name());
        for attr in element.attributes() {
            self.out.push(' ');
            self.out.push_str(attr.name());
            if let Some(value) = attr.value() {
                self.out.push_str("=\"");
                escape_into(value, &mut self.out);
                self.out.push('"');
            }
        }

        let text = element.text().filter(|text| !text.trim().is_empty());
        if element.is_empty() {
            match text {
                None => self.out.push_str("/>"),
                Some(text) => {
                    self.out.push('>');
                    self.write_text(text, element.is_cdata());
                    self.write_close(element.name());
                }
            }
            return;
        }

        self.out.push('>');
        for child in element.children() {
            self.write_element(child, depth + 1);
        }
        if let Some(text) = text {
            self.newline(depth + 1);
            self.write_text(text, element.is_cdata());
        }
        self.newline(depth);
        self.write_close(element.name());
    }

    fn write_text(&mut self, text: &str, cdata: bool) {
        if cdata {
            // a terminator inside the value is split across two sections
            self.out.push_str("<![CDATA[");
            self.out.push_str(&text.replace("]]>", "]]]]><![CDATA[>"));
            self.out.push_str("]]>");
        } else {
            escape_into(text, &mut self.out);
        }
    }

    fn write_close(&mut self, name: &str) {
        self.out.push_str("</");
        self.out.push_str(name);
        self.out.push('>');
    }

    /// Line break plus `depth` indents; nothing in compact mode
    fn newline(&mut self, depth: usize) {
        if !self.config.pretty_print() {
            return;
        }
        self.out.push_str(self.config.line_symbol());
        for _ in 0..depth {
            self.out.push_str(self.config.indent_symbol());
        }
    }
}

/// Render a document to a string
pub fn to_string(doc: &Document, config: &Config) -> String {
    let mut writer = Writer::new(config);
    writer.write_document(doc);
    writer.finish()
}

/// Render a document into a byte sink
pub fn write_to<W: io::Write>(doc: &Document, config: &Config, mut sink: W) -> Result<()> {
    let text = to_string(doc, config);
    debug!(bytes = text.len(), "writing xml");
    sink.write_all(text.as_bytes())?;
    sink.flush()?;
    Ok(())
}
