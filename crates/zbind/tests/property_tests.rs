//! Property-based tests for escaping, the XML layer and object binding
//!
//! These tests use proptest to verify:
//! 1. Escaping is reversible for any text
//! 2. Element text survives write then parse
//! 3. Objects survive serialize then deserialize
//! 4. Arbitrary input never panics the parser

use std::collections::BTreeMap;

use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

use zbind::bind::{Schema, XmlObject};
use zbind::xml::escape::{escape, unescape};
use zbind::{create_root, from_xml, parse_str, to_xml, xml_object, Parser};

fn ensure_eq<T: PartialEq + std::fmt::Debug>(left: T, right: T) -> Result<(), TestCaseError> {
    if left == right {
        Ok(())
    } else {
        Err(TestCaseError::fail(format!(
            "assertion failed: left={left:?} right={right:?}"
        )))
    }
}

fn fail(context: &str) -> impl Fn(zbind::Error) -> TestCaseError + '_ {
    move |err| TestCaseError::fail(format!("{context}: {err}"))
}

/// Text mixing the five special characters with ordinary content
fn arb_text() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            Just("&".to_string()),
            Just("<".to_string()),
            Just(">".to_string()),
            Just("'".to_string()),
            Just("\"".to_string()),
            Just("&amp;".to_string()),
            "[a-zA-Z0-9 ]{1,8}",
            "\\PC{1,4}",
        ],
        1..12,
    )
    .prop_map(|parts| parts.concat())
}

fn arb_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,8}"
}

#[derive(Clone, Debug, Default, PartialEq)]
struct Item {
    name: String,
    count: u32,
    price: Option<f64>,
    tags: Vec<String>,
}

impl XmlObject for Item {
    fn schema() -> Schema<Self> {
        Schema::<Self>::new()
            .element_name("item")
            .attribute("name", |i| &i.name, |i| &mut i.name)
            .field("count", |i| &i.count, |i| &mut i.count)
            .field("price", |i| &i.price, |i| &mut i.price)
            .field("tags", |i| &i.tags, |i| &mut i.tags)
            .renamed("tag")
            .wrapped("tags")
    }
}

xml_object!(Item);

#[derive(Clone, Debug, Default, PartialEq)]
struct Inventory {
    items: Vec<Item>,
    index: BTreeMap<i64, String>,
}

impl XmlObject for Inventory {
    fn schema() -> Schema<Self> {
        Schema::<Self>::new()
            .element_name("inventory")
            .field("items", |i| &i.items, |i| &mut i.items)
            .renamed("item")
            .field("index", |i| &i.index, |i| &mut i.index)
    }
}

/// Non-blank strings without surrounding whitespace survive trimming rules
fn arb_value_text() -> impl Strategy<Value = String> {
    arb_text().prop_filter("trimmed and not the null literal", |s| {
        !s.trim().is_empty() && s.trim() == s && s != "null"
    })
}

fn arb_item() -> impl Strategy<Value = Item> {
    (
        arb_value_text(),
        any::<u32>(),
        prop::option::of(-1.0e9f64..1.0e9),
        prop::collection::vec(arb_value_text(), 0..4),
    )
        .prop_map(|(name, count, price, tags)| Item {
            name,
            count,
            price,
            tags,
        })
}

fn arb_inventory() -> impl Strategy<Value = Inventory> {
    (
        prop::collection::vec(arb_item(), 0..5),
        prop::collection::btree_map(any::<i64>(), arb_value_text(), 0..5),
    )
        .prop_map(|(items, index)| Inventory { items, index })
}

proptest! {
    /// unescape(escape(s)) == s for any text
    #[test]
    fn escape_roundtrip(text in arb_text()) {
        let escaped = escape(&text);
        prop_assert!(!escaped.contains('<'));
        prop_assert!(!escaped.contains('"'));
        let unescaped = unescape(&escaped).map_err(fail("unescape"))?;
        ensure_eq(unescaped, text)?;
    }

    /// Element text and attribute values survive write then parse
    #[test]
    fn text_roundtrip(name in arb_name(), text in arb_value_text(), attr in arb_text()) {
        let mut doc = create_root(name.clone());
        let root = doc.root();
        doc.add_attribute(root, "a", Some(&attr));
        doc.add_text_child(root, "t", text.clone());

        let parsed = parse_str(&doc.to_string()).map_err(fail("parse"))?;
        let element = parsed.root_element();
        ensure_eq(element.name(), name.as_str())?;
        ensure_eq(element.attribute("a").and_then(|a| a.value()), Some(attr.as_str()))?;
        ensure_eq(
            element.first_child_named("t").and_then(|t| t.text()),
            Some(text.as_str()),
        )?;
    }

    /// CDATA content survives unchanged unless it contains the terminator
    #[test]
    fn cdata_roundtrip(text in arb_value_text()) {
        prop_assume!(!text.contains("]]>"));
        let mut doc = create_root("root");
        let root = doc.root();
        doc.set_cdata_text(root, text.clone());

        let parsed = parse_str(&doc.to_string()).map_err(fail("parse"))?;
        ensure_eq(parsed.root_element().text(), Some(text.as_str()))?;
        ensure_eq(parsed.root_element().is_cdata(), true)?;
    }

    /// deserialize(serialize(v)) == v
    #[test]
    fn object_roundtrip(inventory in arb_inventory()) {
        let xml = to_xml(&inventory).map_err(fail("serialize"))?;
        let back: Inventory = from_xml(&xml).map_err(fail("deserialize"))?;
        ensure_eq(back, inventory)?;
    }

    /// Arbitrary input is either parsed or rejected, never a panic
    #[test]
    fn arbitrary_input_does_not_panic(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _result = Parser::new(&bytes).parse();
    }

    /// Markup-heavy input is either parsed or rejected, never a panic
    #[test]
    fn markup_soup_does_not_panic(s in "[<>/=\"'!?a-c \\-\\[\\]&;#x0-9]{0,64}") {
        let _result = parse_str(&s);
    }
}
