//! Fixed-layout values that have no dedicated encoding.
//!
//! A [`Blittable`] type is written as its type name followed by its raw byte image. Decoding only
//! succeeds for type names that the host application registered in the [`TypeRegistry`] of the
//! [`Codec`](crate::Codec), so a stream never resolves types by guessing.

use crate::dictionary::Dictionary;
use std::sync::Arc;

/// A plain fixed-layout type that can be stored as raw bytes.
///
/// # Examples
///
/// ```
/// use stripekv::{Blittable, StructValue};
///
/// #[derive(Debug, PartialEq)]
/// struct Point {
///     x: i32,
///     y: i32,
/// }
///
/// impl Blittable for Point {
///     const TYPE_NAME: &'static str = "demo.Point";
///     const SIZE: usize = 8;
///
///     fn to_bytes(&self) -> Vec<u8> {
///         let mut bytes = self.x.to_le_bytes().to_vec();
///         bytes.extend_from_slice(&self.y.to_le_bytes());
///         bytes
///     }
///
///     fn from_bytes(bytes: &[u8]) -> Option<Self> {
///         Some(Point {
///             x: i32::from_le_bytes(bytes.get(0..4)?.try_into().ok()?),
///             y: i32::from_le_bytes(bytes.get(4..8)?.try_into().ok()?),
///         })
///     }
/// }
///
/// let value = StructValue::new(&Point { x: 1, y: -1 });
/// assert_eq!(value.type_name(), "demo.Point");
/// assert_eq!(value.get::<Point>(), Some(Point { x: 1, y: -1 }));
/// ```
pub trait Blittable: Sized {
    /// Stable identifier written in front of the byte image.
    const TYPE_NAME: &'static str;

    /// Exact size of the byte image.
    const SIZE: usize;

    /// Returns the byte image; its length must be [`Blittable::SIZE`].
    fn to_bytes(&self) -> Vec<u8>;

    /// Reconstructs the value from its byte image.
    fn from_bytes(bytes: &[u8]) -> Option<Self>;
}

/// The encoded form of a [`Blittable`] value.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct StructValue {
    type_name: String,
    bytes: Vec<u8>,
}

impl StructValue {
    /// Captures the byte image of `value`.
    #[must_use]
    pub fn new<T: Blittable>(value: &T) -> Self {
        Self {
            type_name: T::TYPE_NAME.to_owned(),
            bytes: value.to_bytes(),
        }
    }

    /// Creates a [`StructValue`] from a type name and a byte image.
    #[must_use]
    pub fn from_raw(type_name: String, bytes: Vec<u8>) -> Self {
        Self { type_name, bytes }
    }

    /// Returns the type name.
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns the byte image.
    #[inline]
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Reconstructs a `T` if the type names match.
    #[must_use]
    pub fn get<T: Blittable>(&self) -> Option<T> {
        if self.type_name != T::TYPE_NAME || self.bytes.len() != T::SIZE {
            return None;
        }
        T::from_bytes(&self.bytes)
    }
}

/// [`TypeRegistry`] maps type names to the size of their byte image.
///
/// Registration is thread-safe and cloning a [`TypeRegistry`] shares the registered types.
#[derive(Clone, Debug, Default)]
pub struct TypeRegistry {
    types: Arc<Dictionary<String, usize>>,
}

impl TypeRegistry {
    /// Creates an empty [`TypeRegistry`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T`.
    ///
    /// Returns `false` if a type with the same name was already registered.
    pub fn register<T: Blittable>(&self) -> bool {
        self.register_raw(T::TYPE_NAME, T::SIZE)
    }

    /// Registers a type by name and byte image size.
    ///
    /// Returns `false` if the name was already registered.
    pub fn register_raw(&self, type_name: &str, size: usize) -> bool {
        self.types.try_add(type_name.to_owned(), size)
    }

    /// Returns the registered size of the type.
    #[must_use]
    pub fn size_of(&self, type_name: &str) -> Option<usize> {
        self.types.get(type_name)
    }

    /// Returns `true` if `value` belongs to a registered type and has the registered size.
    #[must_use]
    pub fn accepts(&self, value: &StructValue) -> bool {
        self.size_of(value.type_name()) == Some(value.bytes().len())
    }
}
