//! XML parser implementation
//!
//! Single pass over the input bytes with small rewindable lookahead. Comments,
//! processing instructions and `<!...>` declarations are consumed and dropped;
//! CDATA sections become text.

use tracing::{debug, trace};

use crate::config::Config;
use crate::error::{Error, ErrorKind, Pos, Result, Span};
use crate::lexer::Cursor;
use crate::xml::escape::unescape;
use crate::xml::model::{Document, NodeId, Text};

const BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// XML parser
#[derive(Debug)]
pub struct Parser<'a> {
    cursor: Cursor<'a>,
    max_depth: u16,
    depth: u16,
}

/// Text collected between markup, flushed into the enclosing element
#[derive(Debug, Default)]
struct TextBuffer {
    value: String,
    plain: bool,
    cdata: bool,
}

impl TextBuffer {
    fn push_plain(&mut self, text: &str) {
        if !text.trim().is_empty() {
            self.plain = true;
        }
        self.value.push_str(text);
    }

    fn push_cdata(&mut self, text: &str) {
        self.cdata = true;
        self.value.push_str(text);
    }

    fn take(&mut self) -> Option<Text> {
        if self.value.is_empty() {
            return None;
        }
        let text = Text {
            value: std::mem::take(&mut self.value),
            cdata: self.cdata && !self.plain,
        };
        self.plain = false;
        self.cdata = false;
        Some(text)
    }
}

impl<'a> Parser<'a> {
    /// Create a new XML parser with the default nesting limit
    pub fn new(input: &'a [u8]) -> Self {
        Self::with_config(input, &Config::default())
    }

    pub fn with_config(input: &'a [u8], config: &Config) -> Self {
        Self {
            cursor: Cursor::new(input),
            max_depth: config.max_depth(),
            depth: 0,
        }
    }

    /// Parse an XML document
    pub fn parse(&mut self) -> Result<Document> {
        if self.cursor.starts_with(BOM) {
            self.cursor.advance_by(BOM.len());
        }

        let mut doc = Document::empty();
        if self.parse_prolog() {
            debug!("xml declaration found");
            doc.set_emit_declaration(true);
        }

        loop {
            self.skip_outer_text()?;
            if self.cursor.is_eof() {
                break;
            }
            if self.parse_comment()? {
                continue;
            }
            if self.cursor.starts_with(b"<![CDATA[") {
                return Err(self.error_here("character data outside root element"));
            }
            if self.cursor.starts_with(b"<?") {
                self.skip_processing_instruction()?;
                continue;
            }
            if self.cursor.starts_with(b"<!") {
                self.skip_declaration()?;
                continue;
            }
            if self.cursor.starts_with(b"</") {
                return Err(self.error_here("unexpected closing tag"));
            }
            if doc.has_root() {
                return Err(self.error_here("multiple root elements"));
            }
            self.parse_element(&mut doc, None)?;
        }

        if !doc.has_root() {
            return Err(self.error_here("missing root element"));
        }

        debug!(elements = doc.node_count(), "xml document parsed");
        Ok(doc)
    }

    /// Consume a leading `<?xml ...?>` declaration
    ///
    /// Without one the cursor is left where it started. A declaration missing
    /// its `?>` is dropped up to the first `>`.
    fn parse_prolog(&mut self) -> bool {
        let checkpoint = self.cursor.checkpoint();
        self.cursor.skip_whitespace();

        let is_declaration = self.cursor.consume_bytes(b"<?xml")
            && self
                .cursor
                .current()
                .is_some_and(|b| b.is_ascii_whitespace() || b == b'?');
        if !is_declaration {
            self.cursor.restore(checkpoint);
            return false;
        }

        while let Some(b) = self.cursor.current() {
            if self.cursor.consume_bytes(b"?>") {
                return true;
            }
            self.cursor.advance();
            if b == b'>' {
                trace!("partial xml declaration dropped");
                return false;
            }
        }

        self.cursor.restore(checkpoint);
        false
    }

    fn parse_element(&mut self, doc: &mut Document, parent: Option<NodeId>) -> Result<NodeId> {
        let start = self.cursor.position();
        self.cursor.advance();

        let name = self.parse_name()?;
        self.enter(start)?;
        trace!(name = %name, depth = self.depth, "element");

        let id = doc.push_element(parent, name);
        let self_closing = self.parse_attributes(doc, id)?;
        if !self_closing {
            self.parse_content(doc, id)?;
        }

        self.depth -= 1;
        Ok(id)
    }

    fn enter(&mut self, start: Pos) -> Result<()> {
        self.depth = self.depth.saturating_add(1);
        if self.max_depth != 0 && self.depth > self.max_depth {
            return Err(Error::new(
                ErrorKind::MaxDepthExceeded {
                    max: self.max_depth,
                },
                Span::at(start),
            ));
        }
        Ok(())
    }

    /// Parse attributes up to the end of the open tag
    ///
    /// Returns `true` when the tag was self-closing.
    fn parse_attributes(&mut self, doc: &mut Document, id: NodeId) -> Result<bool> {
        loop {
            self.cursor.skip_whitespace();
            match self.cursor.current() {
                None => {
                    let name = doc.element(id).name().to_string();
                    return Err(self.error_here(&format!("unterminated tag `{name}`")));
                }
                Some(b'>') => {
                    self.cursor.advance();
                    return Ok(false);
                }
                Some(b'/') => {
                    self.cursor.advance();
                    self.cursor.skip_whitespace();
                    if !self.cursor.consume(b'>') {
                        return Err(self.error_here("expected `>` after `/`"));
                    }
                    return Ok(true);
                }
                Some(_) => self.parse_attribute(doc, id)?,
            }
        }
    }

    fn parse_attribute(&mut self, doc: &mut Document, id: NodeId) -> Result<()> {
        let start = self.cursor.pos();
        while let Some(b) = self.cursor.current() {
            if b == b'=' || b == b'>' || b == b'/' || b.is_ascii_whitespace() {
                break;
            }
            self.cursor.advance();
        }
        if self.cursor.pos() == start {
            return Err(self.error_here("expected attribute name"));
        }
        let name = self.bytes_to_string(self.cursor.slice_from(start))?;

        let checkpoint = self.cursor.checkpoint();
        self.cursor.skip_whitespace();
        if !self.cursor.consume(b'=') {
            // value-less attribute
            self.cursor.restore(checkpoint);
            doc.add_attribute(id, name, None);
            return Ok(());
        }

        self.cursor.skip_whitespace();
        let value = self.parse_attribute_value()?;
        doc.add_attribute(id, name, Some(&value));
        Ok(())
    }

    fn parse_attribute_value(&mut self) -> Result<String> {
        let quote = match self.cursor.current() {
            Some(q @ (b'"' | b'\'')) => q,
            Some(_) => return Err(self.error_here("expected quoted attribute value")),
            None => return Err(self.error_here("unexpected end of input in tag")),
        };
        let open = self.cursor.position();
        self.cursor.advance();

        let start = self.cursor.pos();
        while let Some(b) = self.cursor.current() {
            if b == quote {
                let raw = self.bytes_to_string(self.cursor.slice_from(start))?;
                self.cursor.advance();
                return unescape(&raw).map_err(|err| Error::malformed(open, err.message()));
            }
            self.cursor.advance();
        }

        Err(Error::malformed(open, "unterminated attribute value"))
    }

    /// Parse content up to and including the close tag of `id`
    fn parse_content(&mut self, doc: &mut Document, id: NodeId) -> Result<()> {
        let mut text = TextBuffer::default();
        loop {
            match self.cursor.current() {
                None => {
                    let name = doc.element(id).name().to_string();
                    return Err(self.error_here(&format!("unclosed element `{name}`")));
                }
                Some(b'<') => {
                    if self.parse_comment()? {
                        continue;
                    }
                    if self.cursor.starts_with(b"<![CDATA[") {
                        let raw = self.parse_cdata()?;
                        text.push_cdata(raw);
                        continue;
                    }
                    if self.cursor.starts_with(b"<?") {
                        self.skip_processing_instruction()?;
                        continue;
                    }
                    if self.cursor.starts_with(b"<!") {
                        self.skip_declaration()?;
                        continue;
                    }

                    if let Some(segment) = text.take() {
                        doc.push_text(id, segment);
                    }
                    if self.cursor.starts_with(b"</") {
                        return self.parse_close_tag(doc, id);
                    }
                    self.parse_element(doc, Some(id))?;
                }
                Some(_) => {
                    let segment = self.parse_text()?;
                    text.push_plain(&segment);
                }
            }
        }
    }

    fn parse_close_tag(&mut self, doc: &Document, id: NodeId) -> Result<()> {
        let start = self.cursor.position();
        self.cursor.advance_by(2);
        let name = self.parse_name()?;
        self.cursor.skip_whitespace();
        if !self.cursor.consume(b'>') {
            return Err(self.error_here(&format!("unterminated closing tag `{name}`")));
        }

        let expected = doc.element(id).name();
        if name != expected {
            return Err(Error::malformed(
                start,
                format!("mismatched closing tag: expected `</{expected}>`, found `</{name}>`"),
            ));
        }
        Ok(())
    }

    fn parse_name(&mut self) -> Result<String> {
        let start = self.cursor.pos();
        while let Some(b) = self.cursor.current() {
            if b == b'>' || b == b'/' || b.is_ascii_whitespace() {
                break;
            }
            self.cursor.advance();
        }
        if self.cursor.is_eof() {
            return Err(self.error_here("unexpected end of input in tag"));
        }
        if self.cursor.pos() == start {
            return Err(self.error_here("expected element name"));
        }
        self.bytes_to_string(self.cursor.slice_from(start))
    }

    /// Read decoded character data up to the next `<`
    fn parse_text(&mut self) -> Result<String> {
        let open = self.cursor.position();
        let start = self.cursor.pos();
        while let Some(b) = self.cursor.current() {
            if b == b'<' {
                break;
            }
            self.cursor.advance();
        }
        let raw = self.bytes_to_string(self.cursor.slice_from(start))?;
        unescape(&raw).map_err(|err| Error::malformed(open, err.message()))
    }

    fn parse_cdata(&mut self) -> Result<&'a str> {
        let open = self.cursor.position();
        self.cursor.advance_by(b"<![CDATA[".len());
        let start = self.cursor.pos();
        while !self.cursor.is_eof() {
            if self.cursor.starts_with(b"]]>") {
                let raw = self.cursor.slice_from(start);
                self.cursor.advance_by(3);
                return std::str::from_utf8(raw)
                    .map_err(|_| Error::malformed(open, "invalid utf-8 in character data"));
            }
            self.cursor.advance();
        }
        Err(Error::malformed(open, "unterminated CDATA section"))
    }

    /// Consume a `<!-- ... -->` comment if one starts here
    fn parse_comment(&mut self) -> Result<bool> {
        let open = self.cursor.position();
        if !self.cursor.consume_bytes(b"<!--") {
            return Ok(false);
        }
        if self.skip_until(b"-->") {
            trace!(line = open.line, "comment skipped");
            return Ok(true);
        }
        Err(Error::malformed(open, "unterminated comment"))
    }

    fn skip_processing_instruction(&mut self) -> Result<()> {
        let open = self.cursor.position();
        if self.skip_until(b"?>") {
            return Ok(());
        }
        Err(Error::malformed(open, "unterminated processing instruction"))
    }

    /// Skip `<!DOCTYPE ...>` and similar, including a bracketed internal subset
    fn skip_declaration(&mut self) -> Result<()> {
        let open = self.cursor.position();
        self.cursor.advance_by(2);
        let mut brackets = 0usize;
        while let Some(b) = self.cursor.next_byte() {
            match b {
                b'[' => brackets += 1,
                b']' => brackets = brackets.saturating_sub(1),
                b'>' if brackets == 0 => {
                    trace!(line = open.line, "declaration skipped");
                    return Ok(());
                }
                _ => {}
            }
        }
        Err(Error::malformed(open, "unterminated declaration"))
    }

    /// Whitespace, and nothing else, may surround the root element
    fn skip_outer_text(&mut self) -> Result<()> {
        while let Some(b) = self.cursor.current() {
            if b == b'<' {
                break;
            }
            if !b.is_ascii_whitespace() {
                return Err(self.error_here("text outside root element"));
            }
            self.cursor.advance();
        }
        Ok(())
    }

    /// Advance past the next occurrence of `pattern`; `false` at end of input
    fn skip_until(&mut self, pattern: &[u8]) -> bool {
        while !self.cursor.is_eof() {
            if self.cursor.consume_bytes(pattern) {
                return true;
            }
            self.cursor.advance();
        }
        false
    }

    fn bytes_to_string(&self, bytes: &[u8]) -> Result<String> {
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|_| self.error_here("invalid utf-8"))
    }

    fn error_here(&self, message: &str) -> Error {
        Error::malformed(self.cursor.position(), message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<Document> {
        Parser::new(input.as_bytes()).parse()
    }

    fn ensure_eq<T: PartialEq + std::fmt::Debug>(left: T, right: T) -> Result<()> {
        if left == right {
            Ok(())
        } else {
            Err(Error::with_message(
                ErrorKind::MalformedDocument,
                Span::empty(),
                format!("assertion failed: {left:?} != {right:?}"),
            ))
        }
    }

    fn ensure_malformed(input: &str) -> Result<()> {
        match parse(input) {
            Err(err) if err.kind() == &ErrorKind::MalformedDocument => Ok(()),
            other => Err(Error::with_message(
                ErrorKind::MalformedDocument,
                Span::empty(),
                format!("expected malformed document for {input:?}, got {other:?}"),
            )),
        }
    }

    #[test]
    fn test_parse_simple_element() -> Result<()> {
        let doc = parse("<root>hello</root>")?;
        let root = doc.root_element();
        ensure_eq(root.name(), "root")?;
        ensure_eq(root.text(), Some("hello"))?;
        ensure_eq(doc.emits_declaration(), false)?;
        Ok(())
    }

    #[test]
    fn test_parse_with_attributes() -> Result<()> {
        let doc = parse(r#"<root a="1" b='two' flag c = "x &amp; y"/>"#)?;
        let root = doc.root_element();
        let attrs: Vec<_> = root
            .attributes()
            .iter()
            .map(|a| (a.name(), a.value()))
            .collect();
        ensure_eq(
            attrs,
            vec![
                ("a", Some("1")),
                ("b", Some("two")),
                ("flag", None),
                ("c", Some("x & y")),
            ],
        )?;
        ensure_eq(root.is_empty(), true)?;
        Ok(())
    }

    #[test]
    fn test_parse_nested() -> Result<()> {
        let doc = parse("<a><b><c>deep</c></b><d/></a>")?;
        let a = doc.root_element();
        let names: Vec<_> = a.children().map(|child| child.name()).collect();
        ensure_eq(names, vec!["b", "d"])?;

        let c = a
            .first_child_named("b")
            .and_then(|b| b.first_child_named("c"));
        ensure_eq(c.and_then(|c| c.text()), Some("deep"))?;
        ensure_eq(
            c.and_then(|c| c.parent()).map(|p| p.name()),
            Some("b"),
        )?;
        Ok(())
    }

    #[test]
    fn test_self_closing_keeps_siblings() -> Result<()> {
        let doc = parse("<root><a/><b>1</b><c /></root>")?;
        let names: Vec<_> = doc.root_element().children().map(|c| c.name()).collect();
        ensure_eq(names, vec!["a", "b", "c"])?;
        Ok(())
    }

    #[test]
    fn test_prolog_sets_declaration_flag() -> Result<()> {
        let doc = parse("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<root/>")?;
        ensure_eq(doc.emits_declaration(), true)?;
        ensure_eq(doc.root_element().name(), "root")?;

        let doc = parse("\u{feff}<?xml version=\"1.0\"?><root/>")?;
        ensure_eq(doc.emits_declaration(), true)?;
        Ok(())
    }

    #[test]
    fn test_processing_instruction_is_not_a_prolog() -> Result<()> {
        let doc = parse("<?xml-stylesheet href=\"a.xsl\"?><root/>")?;
        ensure_eq(doc.emits_declaration(), false)?;
        ensure_eq(doc.root_element().name(), "root")?;
        Ok(())
    }

    #[test]
    fn test_comments_are_dropped() -> Result<()> {
        let doc = parse("<!-- head --><root><!-- a -- b ---><x>1</x><!----></root><!-- tail -->")?;
        let root = doc.root_element();
        ensure_eq(root.len(), 1)?;
        ensure_eq(
            root.first_child_named("x").and_then(|x| x.text()),
            Some("1"),
        )?;
        Ok(())
    }

    #[test]
    fn test_cdata_is_raw_text() -> Result<()> {
        let doc = parse("<root><![CDATA[<b>&amp;</b>]]></root>")?;
        let root = doc.root_element();
        ensure_eq(root.text(), Some("<b>&amp;</b>"))?;
        ensure_eq(root.is_cdata(), true)?;

        let doc = parse("<root>x <![CDATA[<y>]]></root>")?;
        ensure_eq(doc.root_element().text(), Some("x <y>"))?;
        ensure_eq(doc.root_element().is_cdata(), false)?;
        Ok(())
    }

    #[test]
    fn test_doctype_is_skipped() -> Result<()> {
        let doc = parse("<!DOCTYPE root [<!ELEMENT root (#PCDATA)>]><root>t</root>")?;
        ensure_eq(doc.root_element().text(), Some("t"))?;
        Ok(())
    }

    #[test]
    fn test_whitespace_only_text() -> Result<()> {
        let doc = parse("<root>\n  <a>1</a>\n  <b>  </b>\n</root>")?;
        let root = doc.root_element();
        ensure_eq(root.text(), None)?;
        ensure_eq(
            root.first_child_named("b").and_then(|b| b.text()),
            Some("  "),
        )?;
        Ok(())
    }

    #[test]
    fn test_mixed_content_concatenates() -> Result<()> {
        let doc = parse("<p>one<b>two</b>three</p>")?;
        ensure_eq(doc.root_element().text(), Some("onethree"))?;
        Ok(())
    }

    #[test]
    fn test_entities_decoded() -> Result<()> {
        let doc = parse("<t>&lt;tag&gt; &amp; &#x41;&#66;</t>")?;
        ensure_eq(doc.root_element().text(), Some("<tag> & AB"))?;
        Ok(())
    }

    #[test]
    fn test_malformed_inputs() -> Result<()> {
        ensure_malformed("")?;
        ensure_malformed("   ")?;
        ensure_malformed("<root>")?;
        ensure_malformed("<root><a></root>")?;
        ensure_malformed("<root></other>")?;
        ensure_malformed("<root attr=\"open></root>")?;
        ensure_malformed("<root attr=unquoted></root>")?;
        ensure_malformed("<root/><second/>")?;
        ensure_malformed("text<root/>")?;
        ensure_malformed("<root/>tail")?;
        ensure_malformed("<root><!-- never closed</root>")?;
        ensure_malformed("<root><![CDATA[open</root>")?;
        ensure_malformed("<root>&bogus;</root>")?;
        ensure_malformed("</root>")?;
        ensure_malformed("<root")?;
        Ok(())
    }

    #[test]
    fn test_error_position() {
        let err = parse("<root>\n  <a></b>\n</root>").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::MalformedDocument);
        assert_eq!(err.span().start.line, 2);
        assert!(err.message().contains("mismatched closing tag"));
    }

    #[test]
    fn test_max_depth() {
        let config = Config::default().with_max_depth(3);
        let ok = Parser::with_config(b"<a><b><c/></b></a>", &config).parse();
        assert!(ok.is_ok());

        let err = Parser::with_config(b"<a><b><c><d/></c></b></a>", &config)
            .parse()
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::MaxDepthExceeded { max: 3 });
    }

    #[test]
    fn test_invalid_utf8() {
        let err = Parser::new(b"<root>\xff\xfe</root>").parse().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::MalformedDocument);
    }
}
