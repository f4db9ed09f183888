//! Type-erased values and type descriptors.
//!
//! Endpoint descriptors are plain data, so parameter and return types are
//! identified by [`TypeDescriptor`] (a `TypeId` plus a readable name) and
//! call-site values travel as type-erased [`Argument`]s. Generic containers
//! that need to be peeled apart at resolution time (`Option<T>` bodies)
//! carry an inner descriptor and monomorphized wrap functions captured when
//! the descriptor is built.

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::sync::Arc;

/// The erased currency for decoded response bodies and adapted values.
pub type BoxedValue = Box<dyn Any + Send>;

/// Runtime identity of a Rust type, carried by descriptors instead of a
/// generic parameter.
#[derive(Clone)]
pub struct TypeDescriptor {
    id: TypeId,
    name: &'static str,
    inner: Option<Arc<TypeDescriptor>>,
    wrap_some: Option<fn(BoxedValue) -> BoxedValue>,
    wrap_none: Option<fn() -> BoxedValue>,
}

impl TypeDescriptor {
    /// Descriptor for a plain type.
    pub fn of<T: Any + Send>() -> Self {
        TypeDescriptor {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            inner: None,
            wrap_some: None,
            wrap_none: None,
        }
    }

    /// Descriptor for `Option<T>`, retaining the inner descriptor and the
    /// functions needed to re-wrap an erased `T` into an erased `Option<T>`.
    pub fn optional<T: Any + Send>() -> Self {
        fn some<T: Any + Send>(value: BoxedValue) -> BoxedValue {
            // The caller guarantees the value is a T; a mismatch is wrapped
            // as None rather than panicking and is caught by the downcast
            // at the typed surface.
            match value.downcast::<T>() {
                Ok(inner) => Box::new(Some(*inner)),
                Err(_) => Box::new(Option::<T>::None),
            }
        }
        fn none<T: Any + Send>() -> BoxedValue {
            Box::new(Option::<T>::None)
        }
        TypeDescriptor {
            id: TypeId::of::<Option<T>>(),
            name: type_name::<Option<T>>(),
            inner: Some(Arc::new(TypeDescriptor::of::<T>())),
            wrap_some: Some(some::<T>),
            wrap_none: Some(none::<T>),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Human-readable type name, used in resolution diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Inner descriptor for optional-style containers.
    pub fn inner(&self) -> Option<&TypeDescriptor> {
        self.inner.as_deref()
    }

    /// Re-wrap an erased inner value into the container, if this descriptor
    /// was built with [`TypeDescriptor::optional`].
    pub fn wrap_some(&self, value: BoxedValue) -> Option<BoxedValue> {
        self.wrap_some.map(|f| f(value))
    }

    /// Produce the container's empty value, if this descriptor was built
    /// with [`TypeDescriptor::optional`].
    pub fn wrap_none(&self) -> Option<BoxedValue> {
        self.wrap_none.map(|f| f())
    }

    pub fn is<T: Any>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeDescriptor {}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .finish()
    }
}

/// A type-erased call-site value for one declared parameter.
///
/// `Argument::scalar` additionally captures a render function so the
/// default to-string conversion works without any runtime reflection.
/// `Argument::absent` models an omitted optional parameter: absent query,
/// header, and form values are skipped during binding.
pub struct Argument {
    value: Option<Box<dyn Any + Send + Sync>>,
    ty: TypeDescriptor,
    render: Option<fn(&(dyn Any + Send + Sync)) -> String>,
}

impl Argument {
    /// An opaque value, convertible only by a factory that knows its type.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Argument {
            value: Some(Box::new(value)),
            ty: TypeDescriptor::of::<T>(),
            render: None,
        }
    }

    /// A displayable value; path, query, header, and field parameters built
    /// this way fall back to the value's `Display` rendering.
    pub fn scalar<T: Any + Send + Sync + ToString>(value: T) -> Self {
        fn render<T: Any + ToString>(value: &(dyn Any + Send + Sync)) -> String {
            match value.downcast_ref::<T>() {
                Some(v) => v.to_string(),
                None => String::new(),
            }
        }
        Argument {
            value: Some(Box::new(value)),
            ty: TypeDescriptor::of::<T>(),
            render: Some(render::<T>),
        }
    }

    /// An omitted optional parameter of type `T`.
    pub fn absent<T: Any + Send + Sync>() -> Self {
        Argument {
            value: None,
            ty: TypeDescriptor::of::<T>(),
            render: None,
        }
    }

    pub fn is_absent(&self) -> bool {
        self.value.is_none()
    }

    pub fn ty(&self) -> &TypeDescriptor {
        &self.ty
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.as_ref()?.downcast_ref::<T>()
    }

    /// Render through the captured display function, when present.
    pub fn render(&self) -> Option<String> {
        let value = self.value.as_ref()?;
        self.render.map(|f| f(value.as_ref()))
    }
}

impl fmt::Debug for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Argument")
            .field("ty", &self.ty.name)
            .field("absent", &self.value.is_none())
            .finish()
    }
}
