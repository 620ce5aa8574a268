use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::sync::Arc;

use crate::error::FieldError;

/// Structural introspection: how a value exposes its shape to the
/// [`Snapshotter`](crate::Snapshotter).
///
/// This trait is the reflection-free seam between arbitrary request-derived
/// data and the bounded snapshot conversion. Instead of walking objects via
/// runtime reflection, each inspectable type states explicitly whether it
/// is a text-like leaf, a sequence, a mapping, or a structure with named
/// fields. Implementations exist for the usual standard-library types;
/// application types implement it by listing their fields.
///
/// # Invariants
///
/// Implementations MUST:
/// - Borrow from `self` only; `shape()` must not allocate copies of large
///   payloads (the snapshotter decides what to copy, under its budget)
/// - Flatten inherited/base-struct fields into the same `Structure` list as
///   their own, so the snapshot shows one flat field mapping
/// - Report a field whose read can fail via [`Field::failed`] rather than
///   panicking; describe the failure, never echo the data that caused it
///
/// # Examples
///
/// ```
/// use appsec_gateway::{Field, Introspect, Shape};
///
/// struct LoginAttempt {
///     user: String,
///     attempts: u32,
/// }
///
/// impl Introspect for LoginAttempt {
///     fn shape(&self) -> Shape<'_> {
///         Shape::Structure(vec![
///             Field::new("user", &self.user),
///             Field::new("attempts", &self.attempts),
///         ])
///     }
/// }
/// ```
pub trait Introspect {
    /// Returns the structural shape of this value.
    fn shape(&self) -> Shape<'_>;
}

/// The shape of one inspectable value.
///
/// Sequences and mappings expose iterators, not collected vectors, so the
/// snapshotter can stop pulling the moment its element budget runs out —
/// an adversarially huge container costs only as much work as the budget
/// allows.
pub enum Shape<'a> {
    /// No value (e.g. `Option::None`). Converts to an absent node.
    Absent,
    /// A text-like or numeric leaf, in its textual form.
    Text(Cow<'a, str>),
    /// An ordered sequence of inspectable elements.
    Sequence(Box<dyn Iterator<Item = &'a dyn Introspect> + 'a>),
    /// Key/value entries of a map-like value.
    #[allow(clippy::type_complexity)]
    Mapping(Box<dyn Iterator<Item = (&'a dyn Introspect, &'a dyn Introspect)> + 'a>),
    /// Named fields of a plain object.
    Structure(Vec<Field<'a>>),
}

/// One named field of a [`Shape::Structure`].
///
/// The value is a `Result` because reading a field can fail (a poisoned
/// lock, a lazy accessor with an unavailable backing store). A failed field
/// collapses to a single error-marker leaf in the snapshot; it never aborts
/// the sibling fields.
pub struct Field<'a> {
    name: &'static str,
    value: Result<&'a dyn Introspect, FieldError>,
}

impl<'a> Field<'a> {
    /// A field whose value was read successfully.
    pub fn new(name: &'static str, value: &'a dyn Introspect) -> Self {
        Self {
            name,
            value: Ok(value),
        }
    }

    /// A field whose read failed.
    ///
    /// The error's message ends up inside the snapshot; it must describe
    /// the failure, not the request data involved.
    pub fn failed(name: &'static str, error: FieldError) -> Self {
        Self {
            name,
            value: Err(error),
        }
    }

    /// The field name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The field value, or the error its read produced.
    pub fn value(&self) -> Result<&'a dyn Introspect, &FieldError> {
        match &self.value {
            Ok(value) => Ok(*value),
            Err(error) => Err(error),
        }
    }
}

impl Introspect for str {
    fn shape(&self) -> Shape<'_> {
        Shape::Text(Cow::Borrowed(self))
    }
}

impl Introspect for String {
    fn shape(&self) -> Shape<'_> {
        Shape::Text(Cow::Borrowed(self.as_str()))
    }
}

impl Introspect for Cow<'_, str> {
    fn shape(&self) -> Shape<'_> {
        Shape::Text(Cow::Borrowed(self.as_ref()))
    }
}

impl Introspect for char {
    fn shape(&self) -> Shape<'_> {
        Shape::Text(Cow::Owned(self.to_string()))
    }
}

impl Introspect for bool {
    fn shape(&self) -> Shape<'_> {
        Shape::Text(Cow::Borrowed(if *self { "true" } else { "false" }))
    }
}

macro_rules! impl_introspect_numeric {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Introspect for $ty {
                fn shape(&self) -> Shape<'_> {
                    Shape::Text(Cow::Owned(self.to_string()))
                }
            }
        )*
    };
}

impl_introspect_numeric!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64
);

impl<T: Introspect> Introspect for Option<T> {
    fn shape(&self) -> Shape<'_> {
        match self {
            Some(value) => value.shape(),
            None => Shape::Absent,
        }
    }
}

impl<T: Introspect> Introspect for [T] {
    fn shape(&self) -> Shape<'_> {
        Shape::Sequence(Box::new(self.iter().map(|v| v as &dyn Introspect)))
    }
}

impl<T: Introspect> Introspect for Vec<T> {
    fn shape(&self) -> Shape<'_> {
        self.as_slice().shape()
    }
}

impl<T: Introspect, const N: usize> Introspect for [T; N] {
    fn shape(&self) -> Shape<'_> {
        self.as_slice().shape()
    }
}

impl<K: Introspect, V: Introspect, S> Introspect for HashMap<K, V, S> {
    fn shape(&self) -> Shape<'_> {
        Shape::Mapping(Box::new(
            self.iter()
                .map(|(k, v)| (k as &dyn Introspect, v as &dyn Introspect)),
        ))
    }
}

impl<K: Introspect, V: Introspect> Introspect for BTreeMap<K, V> {
    fn shape(&self) -> Shape<'_> {
        Shape::Mapping(Box::new(
            self.iter()
                .map(|(k, v)| (k as &dyn Introspect, v as &dyn Introspect)),
        ))
    }
}

impl<T: Introspect + ?Sized> Introspect for &T {
    fn shape(&self) -> Shape<'_> {
        (**self).shape()
    }
}

impl<T: Introspect + ?Sized> Introspect for Box<T> {
    fn shape(&self) -> Shape<'_> {
        (**self).shape()
    }
}

impl<T: Introspect + ?Sized> Introspect for Rc<T> {
    fn shape(&self) -> Shape<'_> {
        (**self).shape()
    }
}

impl<T: Introspect + ?Sized> Introspect for Arc<T> {
    fn shape(&self) -> Shape<'_> {
        (**self).shape()
    }
}
