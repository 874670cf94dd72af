//! XML document model
//!
//! A [`Document`] owns every element in an arena. Elements are addressed by
//! [`NodeId`]; each element records the id of its parent, which is the only
//! place it may be attached to.

use std::fmt;

use crate::config::Config;

/// Index of an element inside its [`Document`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// XML attribute; a missing value renders as a bare name
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    name: String,
    value: Option<String>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: Option<&str>) -> Self {
        Self {
            name: name.into(),
            value: value.map(str::to_string),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

/// Text content, stored unescaped
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Text {
    pub value: String,
    /// Rendered inside `<![CDATA[...]]>` instead of being escaped
    pub cdata: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Node {
    name: String,
    parent: Option<NodeId>,
    attached: bool,
    children: Vec<NodeId>,
    attributes: Vec<Attribute>,
    text: Option<Text>,
}

impl Node {
    fn new(name: String, parent: Option<NodeId>) -> Self {
        Self {
            name,
            parent,
            attached: false,
            children: Vec::new(),
            attributes: Vec::new(),
            text: None,
        }
    }
}

/// XML document tree
///
/// The root element always exists. Ids are only meaningful for the document
/// that produced them; passing an id from another document panics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    nodes: Vec<Node>,
    emit_declaration: bool,
}

impl Document {
    /// Create a document with a root element named `root`
    pub fn new(root: impl Into<String>) -> Self {
        let mut node = Node::new(root.into(), None);
        node.attached = true;
        Self {
            nodes: vec![node],
            emit_declaration: false,
        }
    }

    /// Arena without a root; the parser fills it before handing it out
    pub(crate) fn empty() -> Self {
        Self {
            nodes: Vec::new(),
            emit_declaration: false,
        }
    }

    pub(crate) fn has_root(&self) -> bool {
        !self.nodes.is_empty()
    }

    pub const fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn root_element(&self) -> Element<'_> {
        self.element(self.root())
    }

    /// Read-only view of an element
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this document.
    pub fn element(&self, id: NodeId) -> Element<'_> {
        // validate eagerly so the view never holds a dangling id
        let _ = self.node(id);
        Element { doc: self, id }
    }

    /// Number of elements stored, including detached ones
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn emits_declaration(&self) -> bool {
        self.emit_declaration
    }

    /// Write `<?xml version="1.0" encoding="utf-8"?>` before the root
    pub fn set_emit_declaration(&mut self, emit: bool) -> &mut Self {
        self.emit_declaration = emit;
        self
    }

    /// Create an element that records `parent` but is not yet attached
    ///
    /// The element only becomes part of the tree after
    /// [`append_child`](Self::append_child) with the same parent.
    pub fn create_element(&mut self, parent: NodeId, name: impl Into<String>) -> NodeId {
        let _ = self.node(parent);
        self.push_node(Node::new(name.into(), Some(parent)))
    }

    /// Attach `child` to `parent`
    ///
    /// Returns `false` and leaves the tree untouched when the child records a
    /// different parent or is already attached.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        let node = self.node(child);
        if node.parent != Some(parent) || node.attached {
            return false;
        }
        self.node_mut(child).attached = true;
        self.node_mut(parent).children.push(child);
        true
    }

    /// Create and attach a new child element
    pub fn add_child(&mut self, parent: NodeId, name: impl Into<String>) -> NodeId {
        let child = self.create_element(parent, name);
        self.append_child(parent, child);
        child
    }

    /// Create and attach a new child element holding `text`
    pub fn add_text_child(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        text: impl Into<String>,
    ) -> NodeId {
        let child = self.add_child(parent, name);
        self.set_text(child, text);
        child
    }

    pub fn add_attribute(&mut self, id: NodeId, name: impl Into<String>, value: Option<&str>) {
        self.node_mut(id).attributes.push(Attribute::new(name, value));
    }

    pub fn set_text(&mut self, id: NodeId, value: impl Into<String>) {
        self.node_mut(id).text = Some(Text {
            value: value.into(),
            cdata: false,
        });
    }

    pub fn set_cdata_text(&mut self, id: NodeId, value: impl Into<String>) {
        self.node_mut(id).text = Some(Text {
            value: value.into(),
            cdata: true,
        });
    }

    pub fn clear_text(&mut self, id: NodeId) {
        self.node_mut(id).text = None;
    }

    /// Merge a parsed text segment into an element
    ///
    /// Blank segments only land on elements that have neither text nor
    /// children; other segments are appended after existing content.
    pub(crate) fn push_text(&mut self, id: NodeId, segment: Text) {
        let node = self.node_mut(id);
        if segment.value.trim().is_empty() {
            if node.text.is_none() && node.children.is_empty() {
                node.text = Some(segment);
            }
            return;
        }
        match node.text.as_mut() {
            Some(text) if !text.value.trim().is_empty() => {
                text.value.push_str(&segment.value);
                text.cdata = text.cdata && segment.cdata;
            }
            _ => node.text = Some(segment),
        }
    }

    /// Append a parsed element; the root when `parent` is `None`
    ///
    /// Blank text already collected on the parent was layout, not content.
    pub(crate) fn push_element(&mut self, parent: Option<NodeId>, name: String) -> NodeId {
        let mut node = Node::new(name, parent);
        node.attached = true;
        let id = self.push_node(node);
        if let Some(parent) = parent {
            let parent = self.node_mut(parent);
            if parent
                .text
                .as_ref()
                .is_some_and(|text| text.value.trim().is_empty())
            {
                parent.text = None;
            }
            parent.children.push(id);
        }
        id
    }

    fn push_node(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    #[allow(clippy::indexing_slicing)]
    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    #[allow(clippy::indexing_slicing)]
    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::xml::writer::to_string(self, &Config::default()))
    }
}

/// Borrowed view of one element
#[derive(Clone, Copy)]
pub struct Element<'a> {
    doc: &'a Document,
    id: NodeId,
}

impl<'a> Element<'a> {
    fn node(&self) -> &'a Node {
        self.doc.node(self.id)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn document(&self) -> &'a Document {
        self.doc
    }

    pub fn name(&self) -> &'a str {
        &self.node().name
    }

    pub fn parent(&self) -> Option<Element<'a>> {
        self.node().parent.map(|id| self.doc.element(id))
    }

    /// Child elements in document order
    pub fn children(&self) -> impl Iterator<Item = Element<'a>> + 'a {
        let doc = self.doc;
        self.node()
            .children
            .iter()
            .map(move |&id| Element { doc, id })
    }

    pub fn children_named(&self, name: &str) -> Vec<Element<'a>> {
        self.children().filter(|child| child.name() == name).collect()
    }

    pub fn first_child_named(&self, name: &str) -> Option<Element<'a>> {
        self.children().find(|child| child.name() == name)
    }

    pub fn last_child_named(&self, name: &str) -> Option<Element<'a>> {
        self.children().filter(|child| child.name() == name).last()
    }

    pub fn attributes(&self) -> &'a [Attribute] {
        &self.node().attributes
    }

    pub fn attributes_named(&self, name: &str) -> Vec<&'a Attribute> {
        self.attributes()
            .iter()
            .filter(|attr| attr.name() == name)
            .collect()
    }

    /// Last attribute with this name
    pub fn attribute(&self, name: &str) -> Option<&'a Attribute> {
        self.attributes().iter().rev().find(|attr| attr.name() == name)
    }

    /// Text content, without any CDATA wrapper
    pub fn text(&self) -> Option<&'a str> {
        self.node().text.as_ref().map(|text| text.value.as_str())
    }

    pub fn is_cdata(&self) -> bool {
        self.node().text.as_ref().is_some_and(|text| text.cdata)
    }

    /// Number of child elements
    pub fn len(&self) -> usize {
        self.node().children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node().children.is_empty()
    }
}

impl fmt::Debug for Element<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("attributes", &self.attributes())
            .field("text", &self.text())
            .field("children", &self.len())
            .finish()
    }
}

impl PartialEq for Element<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.doc, other.doc) && self.id == other.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_document_has_root() {
        let doc = Document::new("root");
        let root = doc.root_element();
        assert_eq!(root.name(), "root");
        assert!(root.parent().is_none());
        assert!(root.is_empty());
        assert!(!doc.emits_declaration());
    }

    #[test]
    fn test_children_keep_insertion_order() {
        let mut doc = Document::new("root");
        let root = doc.root();
        doc.add_text_child(root, "a", "1");
        doc.add_text_child(root, "b", "2");
        doc.add_text_child(root, "a", "3");

        let names: Vec<_> = doc.root_element().children().map(|e| e.name()).collect();
        assert_eq!(names, ["a", "b", "a"]);

        let texts: Vec<_> = doc
            .root_element()
            .children_named("a")
            .iter()
            .filter_map(|e| e.text())
            .collect();
        assert_eq!(texts, ["1", "3"]);
    }

    #[test]
    fn test_first_and_last_child_named() {
        let mut doc = Document::new("root");
        let root = doc.root();
        doc.add_text_child(root, "value", "first");
        doc.add_text_child(root, "value", "last");

        let el = doc.root_element();
        assert_eq!(el.first_child_named("value").and_then(|e| e.text()), Some("first"));
        assert_eq!(el.last_child_named("value").and_then(|e| e.text()), Some("last"));
        assert!(el.first_child_named("missing").is_none());
    }

    #[test]
    fn test_append_child_rejects_foreign_parent() {
        let mut doc = Document::new("root");
        let root = doc.root();
        let a = doc.add_child(root, "a");
        let b = doc.add_child(root, "b");

        let orphan = doc.create_element(a, "orphan");
        assert!(doc.root_element().children_named("orphan").is_empty());

        assert!(!doc.append_child(b, orphan));
        assert!(doc.element(b).is_empty());

        assert!(doc.append_child(a, orphan));
        assert!(!doc.append_child(a, orphan));
        assert_eq!(doc.element(a).len(), 1);
        assert_eq!(doc.element(orphan).parent().map(|p| p.name()), Some("a"));
    }

    #[test]
    fn test_duplicate_attributes_resolve_to_last() {
        let mut doc = Document::new("root");
        let root = doc.root();
        doc.add_attribute(root, "id", Some("1"));
        doc.add_attribute(root, "flag", None);
        doc.add_attribute(root, "id", Some("2"));

        let el = doc.root_element();
        assert_eq!(el.attributes().len(), 3);
        assert_eq!(el.attributes_named("id").len(), 2);
        assert_eq!(el.attribute("id").and_then(Attribute::value), Some("2"));
        assert_eq!(el.attribute("flag").map(Attribute::value), Some(None));
    }

    #[test]
    fn test_text_and_cdata() {
        let mut doc = Document::new("root");
        let root = doc.root();
        doc.set_cdata_text(root, "<b>bold</b>");
        assert_eq!(doc.root_element().text(), Some("<b>bold</b>"));
        assert!(doc.root_element().is_cdata());

        doc.set_text(root, "plain");
        assert!(!doc.root_element().is_cdata());

        doc.clear_text(root);
        assert_eq!(doc.root_element().text(), None);
    }

    #[test]
    fn test_push_text_merges_segments() {
        let mut doc = Document::new("root");
        let root = doc.root();
        doc.push_text(
            root,
            Text {
                value: "\n  ".to_string(),
                cdata: false,
            },
        );
        doc.add_child(root, "child");
        doc.push_text(
            root,
            Text {
                value: "tail".to_string(),
                cdata: false,
            },
        );
        doc.push_text(
            root,
            Text {
                value: "\n".to_string(),
                cdata: false,
            },
        );
        assert_eq!(doc.root_element().text(), Some("tail"));
    }
}
