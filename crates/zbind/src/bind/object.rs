//! Composite objects: field registration, schema resolution and mapping

use std::any::type_name;
use std::fmt;

use indexmap::IndexSet;
use tracing::trace;

use crate::bind::adapter::Adapter;
use crate::bind::context::Context;
use crate::bind::value::{TypeDesc, XmlValue};
use crate::error::{Error, Result};
use crate::xml::{Attribute, Document, Element, NodeId};

/// Element name used for a root object without an override
pub const DEFAULT_ROOT: &str = "root";

/// A composite type with registered fields
///
/// ```
/// use zbind::bind::{Schema, XmlObject};
///
/// #[derive(Default)]
/// struct Point {
///     x: i32,
///     y: i32,
///     label: String,
/// }
///
/// impl XmlObject for Point {
///     fn schema() -> Schema<Self> {
///         Schema::<Self>::new()
///             .element_name("point")
///             .attribute("label", |p| &p.label, |p| &mut p.label)
///             .field("x", |p| &p.x, |p| &mut p.x)
///             .field("y", |p| &p.y, |p| &mut p.y)
///     }
/// }
///
/// let point = Point { x: 1, y: 2, label: "a".into() };
/// assert_eq!(
///     zbind::to_xml(&point).unwrap(),
///     r#"<point label="a"><x>1</x><y>2</y></point>"#
/// );
/// ```
pub trait XmlObject: Sized + 'static {
    fn schema() -> Schema<Self>;
}

/// How a field is represented in the document
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BindingKind {
    Element,
    Attribute,
    /// Element nested inside an extra element with this name
    Wrapper(String),
    /// Element text produced by the named adapter
    Adapter(String),
}

/// Resolved mapping of one field
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Binding {
    field: &'static str,
    external_name: String,
    kind: BindingKind,
    wrapper: Option<String>,
    value_type: TypeDesc,
}

impl Binding {
    pub fn field(&self) -> &'static str {
        self.field
    }

    /// Element or attribute name used in the document
    pub fn external_name(&self) -> &str {
        &self.external_name
    }

    pub fn kind(&self) -> &BindingKind {
        &self.kind
    }

    pub fn wrapper(&self) -> Option<&str> {
        self.wrapper.as_deref()
    }

    pub fn value_type(&self) -> &TypeDesc {
        &self.value_type
    }

    /// Item type of a sequence or array field
    pub fn element_type(&self) -> Option<&TypeDesc> {
        match strip_optional(&self.value_type) {
            TypeDesc::Sequence(item) | TypeDesc::Array(item) => Some(item),
            _ => None,
        }
    }

    /// Key and value types of a map field
    pub fn key_value_types(&self) -> Option<(&TypeDesc, &TypeDesc)> {
        match strip_optional(&self.value_type) {
            TypeDesc::Map(key, value) => Some((key, value)),
            _ => None,
        }
    }
}

fn strip_optional(desc: &TypeDesc) -> &TypeDesc {
    match desc {
        TypeDesc::Optional(inner) => strip_optional(inner),
        other => other,
    }
}

/// Ordered bindings of `T`, own fields first, then inherited ones
pub fn resolve<T: XmlObject>() -> Vec<Binding> {
    T::schema().bindings()
}

trait FieldAccess<T> {
    fn is_absent(&self, owner: &T) -> bool;

    fn write_element(
        &self,
        owner: &T,
        doc: &mut Document,
        parent: NodeId,
        name: &str,
        ctx: &Context<'_>,
    ) -> Result<()>;

    fn to_text(&self, owner: &T, ctx: &Context<'_>) -> Result<Option<String>>;

    fn read_elements(&self, owner: &mut T, elements: &[Element<'_>], ctx: &Context<'_>)
        -> Result<()>;

    fn read_text(&self, owner: &mut T, text: &str, ctx: &Context<'_>) -> Result<()>;
}

struct Plain<T, F> {
    get: fn(&T) -> &F,
    get_mut: fn(&mut T) -> &mut F,
}

impl<T, F: XmlValue> FieldAccess<T> for Plain<T, F> {
    fn is_absent(&self, owner: &T) -> bool {
        (self.get)(owner).is_absent()
    }

    fn write_element(
        &self,
        owner: &T,
        doc: &mut Document,
        parent: NodeId,
        name: &str,
        ctx: &Context<'_>,
    ) -> Result<()> {
        (self.get)(owner).write_element(doc, parent, name, ctx)
    }

    fn to_text(&self, owner: &T, ctx: &Context<'_>) -> Result<Option<String>> {
        (self.get)(owner).to_text(ctx)
    }

    fn read_elements(
        &self,
        owner: &mut T,
        elements: &[Element<'_>],
        ctx: &Context<'_>,
    ) -> Result<()> {
        if let Some(value) = F::read_elements(elements, ctx)? {
            *(self.get_mut)(owner) = value;
        }
        Ok(())
    }

    fn read_text(&self, owner: &mut T, text: &str, ctx: &Context<'_>) -> Result<()> {
        if let Some(value) = F::from_text(text, ctx)? {
            *(self.get_mut)(owner) = value;
        }
        Ok(())
    }
}

struct Adapted<T, F, A> {
    adapter: A,
    get: fn(&T) -> &F,
    get_mut: fn(&mut T) -> &mut F,
}

impl<T, F, A: Adapter<F>> FieldAccess<T> for Adapted<T, F, A> {
    fn is_absent(&self, _owner: &T) -> bool {
        false
    }

    fn write_element(
        &self,
        owner: &T,
        doc: &mut Document,
        parent: NodeId,
        name: &str,
        ctx: &Context<'_>,
    ) -> Result<()> {
        if let Some(text) = self.to_text(owner, ctx)? {
            doc.add_text_child(parent, name, text);
        }
        Ok(())
    }

    fn to_text(&self, owner: &T, _ctx: &Context<'_>) -> Result<Option<String>> {
        self.adapter
            .serialize((self.get)(owner))
            .map(Some)
            .map_err(|err| Error::adapter(type_name::<A>(), err))
    }

    fn read_elements(
        &self,
        owner: &mut T,
        elements: &[Element<'_>],
        ctx: &Context<'_>,
    ) -> Result<()> {
        match elements.last() {
            Some(element) => self.read_text(owner, element.text().unwrap_or_default(), ctx),
            None => Ok(()),
        }
    }

    fn read_text(&self, owner: &mut T, text: &str, _ctx: &Context<'_>) -> Result<()> {
        let value = self
            .adapter
            .deserialize(text)
            .map_err(|err| Error::adapter(type_name::<A>(), err))?;
        *(self.get_mut)(owner) = value;
        Ok(())
    }
}

/// Field of an embedded base object, seen through the derived object
struct Projected<T, B> {
    inner: Box<dyn FieldAccess<B>>,
    get: fn(&T) -> &B,
    get_mut: fn(&mut T) -> &mut B,
}

impl<T, B> FieldAccess<T> for Projected<T, B> {
    fn is_absent(&self, owner: &T) -> bool {
        self.inner.is_absent((self.get)(owner))
    }

    fn write_element(
        &self,
        owner: &T,
        doc: &mut Document,
        parent: NodeId,
        name: &str,
        ctx: &Context<'_>,
    ) -> Result<()> {
        self.inner
            .write_element((self.get)(owner), doc, parent, name, ctx)
    }

    fn to_text(&self, owner: &T, ctx: &Context<'_>) -> Result<Option<String>> {
        self.inner.to_text((self.get)(owner), ctx)
    }

    fn read_elements(
        &self,
        owner: &mut T,
        elements: &[Element<'_>],
        ctx: &Context<'_>,
    ) -> Result<()> {
        self.inner
            .read_elements((self.get_mut)(owner), elements, ctx)
    }

    fn read_text(&self, owner: &mut T, text: &str, ctx: &Context<'_>) -> Result<()> {
        self.inner.read_text((self.get_mut)(owner), text, ctx)
    }
}

/// One registered field of `T`
pub struct Field<T> {
    name: &'static str,
    external: Option<String>,
    attribute: bool,
    wrapper: Option<String>,
    adapter: Option<&'static str>,
    inherited: bool,
    value_type: TypeDesc,
    access: Box<dyn FieldAccess<T>>,
}

impl<T> Field<T> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn external_name(&self) -> &str {
        self.external.as_deref().unwrap_or(self.name)
    }

    /// Attribute, then adapter, then wrapper; a plain element otherwise
    pub fn kind(&self) -> BindingKind {
        if self.attribute {
            BindingKind::Attribute
        } else if let Some(adapter) = self.adapter {
            BindingKind::Adapter(adapter.to_string())
        } else if let Some(wrapper) = &self.wrapper {
            BindingKind::Wrapper(wrapper.clone())
        } else {
            BindingKind::Element
        }
    }

    pub fn binding(&self) -> Binding {
        Binding {
            field: self.name,
            external_name: self.external_name().to_string(),
            kind: self.kind(),
            wrapper: self.wrapper.clone(),
            value_type: self.value_type.clone(),
        }
    }

    /// Wrapper element that takes effect for this field
    fn active_wrapper(&self) -> Option<&str> {
        if self.attribute || self.adapter.is_some() {
            None
        } else {
            self.wrapper.as_deref()
        }
    }

    fn write(&self, owner: &T, doc: &mut Document, element: NodeId, ctx: &Context<'_>) -> Result<()> {
        if self.access.is_absent(owner) {
            return Ok(());
        }
        let name = self.external_name();

        if self.attribute {
            if let Some(text) = self.access.to_text(owner, ctx)? {
                doc.add_attribute(element, name, Some(&text));
            }
            return Ok(());
        }

        let parent = match self.active_wrapper() {
            Some(wrapper) => doc.add_child(element, wrapper),
            None => element,
        };
        self.access.write_element(owner, doc, parent, name, ctx)
    }

    /// Missing content leaves the field at its current value
    fn read(&self, owner: &mut T, element: Element<'_>, ctx: &Context<'_>) -> Result<()> {
        let name = self.external_name();

        if self.attribute {
            return match element.attribute(name).and_then(Attribute::value) {
                Some(text) => self.access.read_text(owner, text, ctx),
                None => Ok(()),
            };
        }

        let scope = match self.active_wrapper() {
            Some(wrapper) => match element.last_child_named(wrapper) {
                Some(scope) => scope,
                None => return Ok(()),
            },
            None => element,
        };
        let matches = scope.children_named(name);
        if matches.is_empty() {
            trace!(field = self.name, element = name, "no content, field left unchanged");
            return Ok(());
        }
        self.access.read_elements(owner, &matches, ctx)
    }
}

impl<T> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("external_name", &self.external_name())
            .field("kind", &self.kind())
            .field("inherited", &self.inherited)
            .field("value_type", &self.value_type)
            .finish_non_exhaustive()
    }
}

enum Factory<T> {
    Infallible(fn() -> T),
    Fallible(fn() -> Result<T>),
    Missing,
}

/// Field table of a composite type
///
/// Built once per mapping call from [`XmlObject::schema`]. Modifiers such as
/// [`renamed`](Self::renamed) apply to the most recently added field.
///
/// Start the chain with the owner type spelled out, `Schema::<Self>::new()`,
/// so the accessor closures are checked against a known type.
pub struct Schema<T> {
    element_name: Option<String>,
    factory: Factory<T>,
    fields: Vec<Field<T>>,
}

impl<T: Default + 'static> Schema<T> {
    /// Schema instantiating `T` through `Default`
    pub fn new() -> Self {
        Self::from_factory(Factory::Infallible(T::default))
    }
}

impl<T: Default + 'static> Default for Schema<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Schema<T> {
    /// Schema instantiating `T` through a fallible constructor
    pub fn with_factory(factory: fn() -> Result<T>) -> Self {
        Self::from_factory(Factory::Fallible(factory))
    }

    /// Schema for a type that can be written but not read back
    pub fn without_factory() -> Self {
        Self::from_factory(Factory::Missing)
    }

    fn from_factory(factory: Factory<T>) -> Self {
        Self {
            element_name: None,
            factory,
            fields: Vec::new(),
        }
    }

    /// Element name used when the object is the document root
    pub fn element_name(mut self, name: impl Into<String>) -> Self {
        self.element_name = Some(name.into());
        self
    }

    pub fn field<F: XmlValue + 'static>(
        self,
        name: &'static str,
        get: fn(&T) -> &F,
        get_mut: fn(&mut T) -> &mut F,
    ) -> Self {
        self.push(name, F::describe(), None, Box::new(Plain { get, get_mut }))
    }

    pub fn attribute<F: XmlValue + 'static>(
        self,
        name: &'static str,
        get: fn(&T) -> &F,
        get_mut: fn(&mut T) -> &mut F,
    ) -> Self {
        self.field(name, get, get_mut).as_attribute()
    }

    /// Field converted through `adapter` in both directions
    pub fn adapted<F: 'static, A: Adapter<F> + 'static>(
        self,
        name: &'static str,
        adapter: A,
        get: fn(&T) -> &F,
        get_mut: fn(&mut T) -> &mut F,
    ) -> Self {
        self.push(
            name,
            TypeDesc::Scalar(type_name::<F>()),
            Some(type_name::<A>()),
            Box::new(Adapted {
                adapter,
                get,
                get_mut,
            }),
        )
    }

    /// Use `external` as the element or attribute name of the last field
    pub fn renamed(mut self, external: impl Into<String>) -> Self {
        if let Some(field) = self.fields.last_mut() {
            field.external = Some(external.into());
        }
        self
    }

    /// Nest the last field inside a `wrapper` element
    pub fn wrapped(mut self, wrapper: impl Into<String>) -> Self {
        if let Some(field) = self.fields.last_mut() {
            field.wrapper = Some(wrapper.into());
        }
        self
    }

    /// Map the last field to an attribute
    pub fn as_attribute(mut self) -> Self {
        if let Some(field) = self.fields.last_mut() {
            field.attribute = true;
        }
        self
    }

    /// Inherit the fields of an embedded base object
    ///
    /// Inherited fields follow the own fields; a name the derived type
    /// already registers is not taken from the base.
    pub fn extends<B: XmlObject>(mut self, get: fn(&T) -> &B, get_mut: fn(&mut T) -> &mut B) -> Self {
        for field in B::schema().into_fields() {
            self.fields.push(Field {
                name: field.name,
                external: field.external,
                attribute: field.attribute,
                wrapper: field.wrapper,
                adapter: field.adapter,
                inherited: true,
                value_type: field.value_type,
                access: Box::new(Projected {
                    inner: field.access,
                    get,
                    get_mut,
                }),
            });
        }
        self
    }

    fn push(
        mut self,
        name: &'static str,
        value_type: TypeDesc,
        adapter: Option<&'static str>,
        access: Box<dyn FieldAccess<T>>,
    ) -> Self {
        self.fields.push(Field {
            name,
            external: None,
            attribute: false,
            wrapper: None,
            adapter,
            inherited: false,
            value_type,
            access,
        });
        self
    }
}

impl<T> Schema<T> {
    pub fn root_name(&self) -> &str {
        self.element_name.as_deref().unwrap_or(DEFAULT_ROOT)
    }

    pub fn instantiate(&self) -> Result<T> {
        match &self.factory {
            Factory::Infallible(factory) => Ok(factory()),
            Factory::Fallible(factory) => factory()
                .map_err(|err| Error::instantiation(type_name::<T>(), err.message())),
            Factory::Missing => Err(Error::instantiation(
                type_name::<T>(),
                format!("{} has no registered constructor", type_name::<T>()),
            )),
        }
    }

    /// Fields in mapping order, each name once
    pub fn fields(&self) -> Vec<&Field<T>> {
        let mut seen = IndexSet::new();
        let own = self.fields.iter().filter(|field| !field.inherited);
        let inherited = self.fields.iter().filter(|field| field.inherited);
        own.chain(inherited)
            .filter(|field| seen.insert(field.name))
            .collect()
    }

    fn into_fields(self) -> Vec<Field<T>> {
        let (own, inherited): (Vec<_>, Vec<_>) =
            self.fields.into_iter().partition(|field| !field.inherited);
        let mut seen = IndexSet::new();
        own.into_iter()
            .chain(inherited)
            .filter(|field| seen.insert(field.name))
            .collect()
    }

    pub fn bindings(&self) -> Vec<Binding> {
        self.fields().into_iter().map(Field::binding).collect()
    }
}

impl<T> fmt::Debug for Schema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("root_name", &self.root_name())
            .field("fields", &self.fields())
            .finish_non_exhaustive()
    }
}

/// Append `value` as a child element of `parent`
pub fn write_object<T: XmlObject>(
    value: &T,
    doc: &mut Document,
    parent: NodeId,
    name: &str,
    ctx: &Context<'_>,
) -> Result<()> {
    let element = doc.add_child(parent, name);
    write_fields(value, doc, element, ctx)
}

/// Write the fields of `value` into an existing element
pub fn write_fields<T: XmlObject>(
    value: &T,
    doc: &mut Document,
    element: NodeId,
    ctx: &Context<'_>,
) -> Result<()> {
    let _guard = ctx.descend()?;
    let schema = T::schema();
    trace!(ty = type_name::<T>(), depth = ctx.depth(), "write object");
    for field in schema.fields() {
        field
            .write(value, doc, element, ctx)
            .map_err(|err| err.in_element(field.external_name()))?;
    }
    Ok(())
}

/// Build a `T` from the content of `element`
pub fn read_object<T: XmlObject>(element: Element<'_>, ctx: &Context<'_>) -> Result<T> {
    let _guard = ctx.descend()?;
    let schema = T::schema();
    trace!(ty = type_name::<T>(), element = element.name(), "read object");
    let mut value = schema.instantiate()?;
    for field in schema.fields() {
        field
            .read(&mut value, element, ctx)
            .map_err(|err| err.in_element(field.external_name()))?;
    }
    Ok(value)
}

/// Implement [`XmlValue`] for types implementing [`XmlObject`]
#[macro_export]
macro_rules! xml_object {
    ($($ty:ty),+ $(,)?) => {$(
        impl $crate::bind::XmlValue for $ty {
            fn describe() -> $crate::bind::TypeDesc {
                $crate::bind::TypeDesc::Composite(::std::any::type_name::<Self>())
            }

            fn write_element(
                &self,
                doc: &mut $crate::xml::Document,
                parent: $crate::xml::NodeId,
                name: &str,
                ctx: &$crate::bind::Context<'_>,
            ) -> $crate::Result<()> {
                $crate::bind::write_object(self, doc, parent, name, ctx)
            }

            fn read_elements(
                elements: &[$crate::xml::Element<'_>],
                ctx: &$crate::bind::Context<'_>,
            ) -> $crate::Result<Option<Self>> {
                match elements.last() {
                    Some(element) => $crate::bind::read_object(*element, ctx).map(Some),
                    None => Ok(None),
                }
            }
        }
    )+};
}
