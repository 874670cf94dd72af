//! Value shapes: scalars, sequences, arrays and maps

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::hash::{BuildHasher, Hash};

use indexmap::IndexMap;
use time::macros::format_description;
use time::{Date, PrimitiveDateTime};
use tracing::trace;

use crate::bind::context::Context;
use crate::error::{Error, Result};
use crate::xml::{Document, Element, NodeId};

/// Text that reads back as an absent value
pub const NULL_LITERAL: &str = "null";

/// Map entries are framed as `<entry><key>..</key><value>..</value></entry>`
pub const ENTRY: &str = "entry";
pub const KEY: &str = "key";
pub const VALUE: &str = "value";

/// Static description of a value shape, used by the schema resolver
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeDesc {
    Scalar(&'static str),
    Enum(&'static str),
    Optional(Box<TypeDesc>),
    Sequence(Box<TypeDesc>),
    Array(Box<TypeDesc>),
    Map(Box<TypeDesc>, Box<TypeDesc>),
    Composite(&'static str),
    /// Custom value without a description
    Opaque,
}

/// A type that can be mapped to and from XML elements
pub trait XmlValue: Sized {
    fn describe() -> TypeDesc {
        TypeDesc::Opaque
    }

    /// Absent values produce no element at all
    fn is_absent(&self) -> bool {
        false
    }

    /// Append this value under `parent` as one or more elements named `name`
    fn write_element(
        &self,
        doc: &mut Document,
        parent: NodeId,
        name: &str,
        ctx: &Context<'_>,
    ) -> Result<()>;

    /// Read a value from all same-named sibling elements
    ///
    /// Singular values use the last element. `None` leaves the target untouched.
    fn read_elements(elements: &[Element<'_>], ctx: &Context<'_>) -> Result<Option<Self>>;

    /// Attribute form of the value
    fn to_text(&self, _ctx: &Context<'_>) -> Result<Option<String>> {
        Err(Error::unsupported_type(
            std::any::type_name::<Self>(),
            format!(
                "{} cannot be represented as attribute text",
                std::any::type_name::<Self>()
            ),
        ))
    }

    fn from_text(_text: &str, _ctx: &Context<'_>) -> Result<Option<Self>> {
        Err(Error::unsupported_type(
            std::any::type_name::<Self>(),
            format!(
                "{} cannot be read from attribute text",
                std::any::type_name::<Self>()
            ),
        ))
    }
}

/// Single text value
///
/// Implement this and invoke [`xml_scalar!`](crate::xml_scalar) to make a
/// type usable as a field.
pub trait Scalar: Sized {
    const TYPE_NAME: &'static str;

    /// Whether empty text is a value rather than an absent one
    const ACCEPTS_EMPTY: bool = false;

    fn format(&self, ctx: &Context<'_>) -> Result<String>;

    fn parse(text: &str, ctx: &Context<'_>) -> Result<Self>;

    fn describe() -> TypeDesc {
        TypeDesc::Scalar(Self::TYPE_NAME)
    }
}

/// Enumeration mapped by variant name
pub trait XmlEnum: Sized + 'static {
    fn variant_name(&self) -> &'static str;

    fn from_variant_name(name: &str) -> Option<Self>;
}

pub fn write_scalar<S: Scalar>(
    value: &S,
    doc: &mut Document,
    parent: NodeId,
    name: &str,
    ctx: &Context<'_>,
) -> Result<()> {
    let text = value.format(ctx)?;
    doc.add_text_child(parent, name, text);
    Ok(())
}

pub fn read_scalar<S: Scalar>(elements: &[Element<'_>], ctx: &Context<'_>) -> Result<Option<S>> {
    match elements.last() {
        Some(element) => scalar_from_text(element.text().unwrap_or_default(), ctx),
        None => Ok(None),
    }
}

/// Parse scalar text; `null` and empty non-string text are absent
pub fn scalar_from_text<S: Scalar>(text: &str, ctx: &Context<'_>) -> Result<Option<S>> {
    if text.trim() == NULL_LITERAL {
        return Ok(None);
    }
    if S::ACCEPTS_EMPTY {
        return S::parse(text, ctx).map(Some);
    }
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    S::parse(trimmed, ctx).map(Some)
}

/// Implement [`XmlValue`] for types implementing [`Scalar`]
#[macro_export]
macro_rules! xml_scalar {
    ($($ty:ty),+ $(,)?) => {$(
        impl $crate::bind::XmlValue for $ty {
            fn describe() -> $crate::bind::TypeDesc {
                <$ty as $crate::bind::Scalar>::describe()
            }

            fn write_element(
                &self,
                doc: &mut $crate::xml::Document,
                parent: $crate::xml::NodeId,
                name: &str,
                ctx: &$crate::bind::Context<'_>,
            ) -> $crate::Result<()> {
                $crate::bind::write_scalar(self, doc, parent, name, ctx)
            }

            fn read_elements(
                elements: &[$crate::xml::Element<'_>],
                ctx: &$crate::bind::Context<'_>,
            ) -> $crate::Result<Option<Self>> {
                $crate::bind::read_scalar(elements, ctx)
            }

            fn to_text(&self, ctx: &$crate::bind::Context<'_>) -> $crate::Result<Option<String>> {
                $crate::bind::Scalar::format(self, ctx).map(Some)
            }

            fn from_text(
                text: &str,
                ctx: &$crate::bind::Context<'_>,
            ) -> $crate::Result<Option<Self>> {
                $crate::bind::scalar_from_text(text, ctx)
            }
        }
    )+};
}

/// Map a fieldless enum to its variant names
///
/// ```
/// zbind::xml_enum!(Rating { First => "FIRST", Second => "SECOND" });
///
/// #[derive(Debug, PartialEq)]
/// enum Rating {
///     First,
///     Second,
/// }
/// ```
#[macro_export]
macro_rules! xml_enum {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $crate::bind::XmlEnum for $ty {
            fn variant_name(&self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }

            fn from_variant_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl $crate::bind::Scalar for $ty {
            const TYPE_NAME: &'static str = stringify!($ty);

            fn format(&self, _ctx: &$crate::bind::Context<'_>) -> $crate::Result<String> {
                Ok($crate::bind::XmlEnum::variant_name(self).to_string())
            }

            fn parse(text: &str, _ctx: &$crate::bind::Context<'_>) -> $crate::Result<Self> {
                <Self as $crate::bind::XmlEnum>::from_variant_name(text)
                    .ok_or_else(|| $crate::Error::invalid_value(stringify!($ty), text))
            }

            fn describe() -> $crate::bind::TypeDesc {
                $crate::bind::TypeDesc::Enum(stringify!($ty))
            }
        }

        $crate::xml_scalar!($ty);
    };
}

impl Scalar for String {
    const TYPE_NAME: &'static str = "string";
    const ACCEPTS_EMPTY: bool = true;

    fn format(&self, _ctx: &Context<'_>) -> Result<String> {
        Ok(self.clone())
    }

    fn parse(text: &str, _ctx: &Context<'_>) -> Result<Self> {
        Ok(text.to_string())
    }
}

impl Scalar for bool {
    const TYPE_NAME: &'static str = "bool";

    fn format(&self, _ctx: &Context<'_>) -> Result<String> {
        Ok(self.to_string())
    }

    fn parse(text: &str, _ctx: &Context<'_>) -> Result<Self> {
        if text.eq_ignore_ascii_case("true") {
            Ok(true)
        } else if text.eq_ignore_ascii_case("false") {
            Ok(false)
        } else {
            Err(Error::invalid_value(Self::TYPE_NAME, text))
        }
    }
}

impl Scalar for char {
    const TYPE_NAME: &'static str = "char";

    fn format(&self, _ctx: &Context<'_>) -> Result<String> {
        Ok(self.to_string())
    }

    fn parse(text: &str, _ctx: &Context<'_>) -> Result<Self> {
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) => Ok(ch),
            _ => Err(Error::invalid_value(Self::TYPE_NAME, text)),
        }
    }
}

macro_rules! impl_number {
    ($($ty:ty),+ $(,)?) => {$(
        impl Scalar for $ty {
            const TYPE_NAME: &'static str = stringify!($ty);

            fn format(&self, _ctx: &Context<'_>) -> Result<String> {
                Ok(self.to_string())
            }

            fn parse(text: &str, _ctx: &Context<'_>) -> Result<Self> {
                text.parse::<$ty>()
                    .map_err(|_| Error::invalid_value(Self::TYPE_NAME, text))
            }
        }

        crate::xml_scalar!($ty);
    )+};
}

impl_number!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

crate::xml_scalar!(String, bool, char);

impl Scalar for PrimitiveDateTime {
    const TYPE_NAME: &'static str = "datetime";

    fn format(&self, ctx: &Context<'_>) -> Result<String> {
        ctx.format_date(self)
    }

    fn parse(text: &str, ctx: &Context<'_>) -> Result<Self> {
        ctx.parse_date(text)
    }
}

impl Scalar for Date {
    const TYPE_NAME: &'static str = "date";

    fn format(&self, _ctx: &Context<'_>) -> Result<String> {
        Date::format(*self, format_description!("[year]-[month]-[day]"))
            .map_err(|_| Error::invalid_value("[year]-[month]-[day]", self.to_string()))
    }

    fn parse(text: &str, _ctx: &Context<'_>) -> Result<Self> {
        Date::parse(text, format_description!("[year]-[month]-[day]"))
            .map_err(|_| Error::invalid_value(Self::TYPE_NAME, text))
    }
}

crate::xml_scalar!(PrimitiveDateTime, Date);

impl<T: XmlValue> XmlValue for Option<T> {
    fn describe() -> TypeDesc {
        TypeDesc::Optional(Box::new(T::describe()))
    }

    fn is_absent(&self) -> bool {
        self.as_ref().map_or(true, T::is_absent)
    }

    fn write_element(
        &self,
        doc: &mut Document,
        parent: NodeId,
        name: &str,
        ctx: &Context<'_>,
    ) -> Result<()> {
        match self {
            Some(value) => value.write_element(doc, parent, name, ctx),
            None => Ok(()),
        }
    }

    /// A bare `null` element reads as `Some(None)`, keeping its slot
    fn read_elements(elements: &[Element<'_>], ctx: &Context<'_>) -> Result<Option<Self>> {
        let Some(last) = elements.last() else {
            return Ok(None);
        };
        let singular = !matches!(T::describe(), TypeDesc::Sequence(_) | TypeDesc::Array(_));
        if singular && is_null_element(last) {
            return Ok(Some(None));
        }
        Ok(Some(T::read_elements(elements, ctx)?))
    }

    fn to_text(&self, ctx: &Context<'_>) -> Result<Option<String>> {
        match self {
            Some(value) => value.to_text(ctx),
            None => Ok(None),
        }
    }

    fn from_text(text: &str, ctx: &Context<'_>) -> Result<Option<Self>> {
        Ok(T::from_text(text, ctx)?.map(Some))
    }
}

impl<T: XmlValue> XmlValue for Box<T> {
    fn describe() -> TypeDesc {
        T::describe()
    }

    fn is_absent(&self) -> bool {
        T::is_absent(self)
    }

    fn write_element(
        &self,
        doc: &mut Document,
        parent: NodeId,
        name: &str,
        ctx: &Context<'_>,
    ) -> Result<()> {
        T::write_element(self, doc, parent, name, ctx)
    }

    fn read_elements(elements: &[Element<'_>], ctx: &Context<'_>) -> Result<Option<Self>> {
        Ok(T::read_elements(elements, ctx)?.map(Box::new))
    }

    fn to_text(&self, ctx: &Context<'_>) -> Result<Option<String>> {
        T::to_text(self, ctx)
    }

    fn from_text(text: &str, ctx: &Context<'_>) -> Result<Option<Self>> {
        Ok(T::from_text(text, ctx)?.map(Box::new))
    }
}

/// Element holding only the `null` literal
fn is_null_element(element: &Element<'_>) -> bool {
    element.is_empty()
        && element.attributes().is_empty()
        && element.text().is_some_and(|text| text.trim() == NULL_LITERAL)
}

/// Write `value` as `name`, or a `null` placeholder when it is absent
fn write_slot<T: XmlValue>(
    value: &T,
    doc: &mut Document,
    parent: NodeId,
    name: &str,
    ctx: &Context<'_>,
) -> Result<()> {
    if value.is_absent() {
        doc.add_text_child(parent, name, NULL_LITERAL);
        Ok(())
    } else {
        value.write_element(doc, parent, name, ctx)
    }
}

/// Write every item as a sibling element named `name`
fn write_each<'v, T: XmlValue + 'v>(
    items: impl IntoIterator<Item = &'v T>,
    doc: &mut Document,
    parent: NodeId,
    name: &str,
    ctx: &Context<'_>,
) -> Result<()> {
    for item in items {
        write_slot(item, doc, parent, name, ctx)?;
    }
    Ok(())
}

/// Read each element as one item, in document order
///
/// Items that read as absent are dropped unless `T` keeps them, as `Option` does.
fn read_each<T: XmlValue>(elements: &[Element<'_>], ctx: &Context<'_>) -> Result<Vec<T>> {
    let mut items = Vec::with_capacity(elements.len());
    for element in elements {
        if let Some(item) = T::read_elements(std::slice::from_ref(element), ctx)? {
            items.push(item);
        }
    }
    Ok(items)
}

macro_rules! impl_sequence {
    ($($seq:ident<T $(: $bound:path)?>),+ $(,)?) => {$(
        impl<T: XmlValue $(+ $bound)?> XmlValue for $seq<T> {
            fn describe() -> TypeDesc {
                TypeDesc::Sequence(Box::new(T::describe()))
            }

            fn write_element(
                &self,
                doc: &mut Document,
                parent: NodeId,
                name: &str,
                ctx: &Context<'_>,
            ) -> Result<()> {
                write_each(self, doc, parent, name, ctx)
            }

            fn read_elements(elements: &[Element<'_>], ctx: &Context<'_>) -> Result<Option<Self>> {
                if elements.is_empty() {
                    return Ok(None);
                }
                Ok(Some(read_each(elements, ctx)?.into_iter().collect()))
            }
        }
    )+};
}

impl_sequence!(Vec<T>, VecDeque<T>, BTreeSet<T: Ord>);

impl<T: XmlValue, const N: usize> XmlValue for [T; N] {
    fn describe() -> TypeDesc {
        TypeDesc::Array(Box::new(T::describe()))
    }

    fn write_element(
        &self,
        doc: &mut Document,
        parent: NodeId,
        name: &str,
        ctx: &Context<'_>,
    ) -> Result<()> {
        write_each(self, doc, parent, name, ctx)
    }

    fn read_elements(elements: &[Element<'_>], ctx: &Context<'_>) -> Result<Option<Self>> {
        if elements.is_empty() {
            return Ok(None);
        }
        let items = read_each::<T>(elements, ctx)?;
        Self::try_from(items)
            .map(Some)
            .map_err(|items| Error::invalid_value(format!("{N} elements"), items.len().to_string()))
    }
}

fn write_entries<'m, K, V>(
    entries: impl IntoIterator<Item = (&'m K, &'m V)>,
    doc: &mut Document,
    parent: NodeId,
    name: &str,
    ctx: &Context<'_>,
) -> Result<()>
where
    K: XmlValue + 'm,
    V: XmlValue + 'm,
{
    let map = doc.add_child(parent, name);
    for (key, value) in entries {
        if key.is_absent() {
            continue;
        }
        let entry = doc.add_child(map, ENTRY);
        key.write_element(doc, entry, KEY, ctx)
            .map_err(|err| err.in_element(KEY).in_element(ENTRY))?;
        write_slot(value, doc, entry, VALUE, ctx)
            .map_err(|err| err.in_element(VALUE).in_element(ENTRY))?;
    }
    Ok(())
}

/// Entries of the last map element; entries missing a key or value are skipped
fn read_entries<K: XmlValue, V: XmlValue>(
    elements: &[Element<'_>],
    ctx: &Context<'_>,
) -> Result<Option<Vec<(K, V)>>> {
    let Some(map) = elements.last() else {
        return Ok(None);
    };
    let mut entries = Vec::new();
    for entry in map.children_named(ENTRY) {
        let key = K::read_elements(&entry.children_named(KEY), ctx)
            .map_err(|err| err.in_element(KEY).in_element(ENTRY))?;
        let value = V::read_elements(&entry.children_named(VALUE), ctx)
            .map_err(|err| err.in_element(VALUE).in_element(ENTRY))?;
        match (key, value) {
            (Some(key), Some(value)) => entries.push((key, value)),
            _ => trace!(map = map.name(), "incomplete map entry skipped"),
        }
    }
    Ok(Some(entries))
}

impl<K, V, S> XmlValue for HashMap<K, V, S>
where
    K: XmlValue + Eq + Hash,
    V: XmlValue,
    S: BuildHasher + Default,
{
    fn describe() -> TypeDesc {
        TypeDesc::Map(Box::new(K::describe()), Box::new(V::describe()))
    }

    fn write_element(
        &self,
        doc: &mut Document,
        parent: NodeId,
        name: &str,
        ctx: &Context<'_>,
    ) -> Result<()> {
        write_entries(self, doc, parent, name, ctx)
    }

    fn read_elements(elements: &[Element<'_>], ctx: &Context<'_>) -> Result<Option<Self>> {
        Ok(read_entries(elements, ctx)?.map(|entries| entries.into_iter().collect()))
    }
}

impl<K, V> XmlValue for BTreeMap<K, V>
where
    K: XmlValue + Ord,
    V: XmlValue,
{
    fn describe() -> TypeDesc {
        TypeDesc::Map(Box::new(K::describe()), Box::new(V::describe()))
    }

    fn write_element(
        &self,
        doc: &mut Document,
        parent: NodeId,
        name: &str,
        ctx: &Context<'_>,
    ) -> Result<()> {
        write_entries(self, doc, parent, name, ctx)
    }

    fn read_elements(elements: &[Element<'_>], ctx: &Context<'_>) -> Result<Option<Self>> {
        Ok(read_entries(elements, ctx)?.map(|entries| entries.into_iter().collect()))
    }
}

impl<K, V, S> XmlValue for IndexMap<K, V, S>
where
    K: XmlValue + Eq + Hash,
    V: XmlValue,
    S: BuildHasher + Default,
{
    fn describe() -> TypeDesc {
        TypeDesc::Map(Box::new(K::describe()), Box::new(V::describe()))
    }

    fn write_element(
        &self,
        doc: &mut Document,
        parent: NodeId,
        name: &str,
        ctx: &Context<'_>,
    ) -> Result<()> {
        write_entries(self, doc, parent, name, ctx)
    }

    fn read_elements(elements: &[Element<'_>], ctx: &Context<'_>) -> Result<Option<Self>> {
        Ok(read_entries(elements, ctx)?.map(|entries| entries.into_iter().collect()))
    }
}
