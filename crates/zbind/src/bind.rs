//! Mapping between typed values and XML documents
//!
//! Values describe their own shape through [`XmlValue`]. Scalars implement
//! [`Scalar`], enums use [`xml_enum!`](crate::xml_enum), and composite types
//! register their fields in a [`Schema`] through [`XmlObject`]. There is no
//! runtime reflection: a type is mappable exactly when it has these impls.

pub mod adapter;
pub mod context;
pub mod object;
pub mod value;

pub use adapter::{Adapter, AdapterResult, FnAdapter};
pub use context::{Context, DepthGuard};
pub use object::{
    read_object, resolve, write_fields, write_object, Binding, BindingKind, Field, Schema,
    XmlObject, DEFAULT_ROOT,
};
pub use value::{
    read_scalar, scalar_from_text, write_scalar, Scalar, TypeDesc, XmlEnum, XmlValue,
    NULL_LITERAL,
};

use tracing::debug;

use crate::config::Config;
use crate::error::{Error, ErrorKind, Result, Span};
use crate::xml::{Document, Element};

/// Build a document whose root element holds the fields of `value`
pub fn serialize<T: XmlObject>(value: &T, config: &Config) -> Result<Document> {
    let ctx = Context::new(config)?;
    let schema = T::schema();
    let mut doc = Document::new(schema.root_name());
    let root = doc.root();
    write_fields(value, &mut doc, root, &ctx)?;
    check_depth(&doc, &ctx)?;
    debug!(
        ty = std::any::type_name::<T>(),
        elements = doc.node_count(),
        "object serialized"
    );
    Ok(doc)
}

/// Reject documents nested deeper than the parser would accept
///
/// Object nesting is bounded while writing, but scalar leaves, wrappers and
/// map entries add element levels of their own. The limit counts the root
/// element as level one, the same way the parser does.
fn check_depth(doc: &Document, ctx: &Context<'_>) -> Result<()> {
    let max = ctx.config().max_depth();
    if max == 0 {
        return Ok(());
    }
    let mut stack = vec![(doc.root_element(), 1usize)];
    while let Some((element, depth)) = stack.pop() {
        if depth > usize::from(max) {
            let mut err = Error::new(ErrorKind::MaxDepthExceeded { max }, Span::empty());
            let ancestors = std::iter::successors(Some(element), Element::parent)
                .take_while(|ancestor| ancestor.parent().is_some());
            for ancestor in ancestors {
                err = err.in_element(ancestor.name());
            }
            return Err(err);
        }
        stack.extend(element.children().map(|child| (child, depth + 1)));
    }
    Ok(())
}

/// Read any mappable value from a single element
///
/// Scalars parse the element text; composites read their fields from the
/// element's attributes and children. `None` means the element held an
/// absent value such as the `null` literal.
pub fn deserialize<T: XmlValue>(element: Element<'_>, config: &Config) -> Result<Option<T>> {
    let ctx = Context::new(config)?;
    T::read_elements(std::slice::from_ref(&element), &ctx)
}
