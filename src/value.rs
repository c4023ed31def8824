//! [`Value`] is the dynamic value graph stored in dictionaries and written by the
//! [`Codec`](crate::Codec).

mod decimal;
mod temporal;

pub use decimal::{Decimal, MAX_SCALE};
pub use temporal::{
    OffsetTimestamp, TimeSpan, Timestamp, TimestampKind, TICKS_PER_SECOND, UNIX_EPOCH_TICKS,
};

use crate::error::Error;
use crate::registry::StructValue;
use uuid::Uuid;

/// A dynamically typed value.
///
/// Every variant corresponds to one encoded shape. Composite variants own their children; maps
/// keep their pairs in insertion order so that equality is structural.
///
/// Floating point variants compare by their bit patterns, so a value always equals its decoded
/// copy, `NaN` included, while `0.0` and `-0.0` differ.
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// No value.
    #[default]
    Null,

    /// An explicitly empty value, distinct from [`Value::Null`].
    Empty,

    /// A database null marker.
    DbNull,

    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Char(char),
    Decimal(Decimal),
    Timestamp(Timestamp),
    TimeSpan(TimeSpan),
    OffsetTimestamp(OffsetTimestamp),
    Guid(Uuid),

    /// A pointer-sized signed integer, always stored as 64 bits.
    NativeInt(i64),

    /// A pointer-sized unsigned integer, always stored as 64 bits.
    NativeUInt(u64),

    String(String),
    Bytes(Vec<u8>),

    /// A length-prefixed list.
    List(Vec<Value>),

    /// A length-prefixed one-dimensional array.
    Array(Vec<Value>),

    /// A sequence of unknown length, encoded with a terminator instead of a length prefix.
    Sequence(Vec<Value>),

    /// A map with string keys.
    StringMap(Vec<(String, Value)>),

    /// A map with arbitrary non-null keys.
    Map(Vec<(Value, Value)>),

    /// A fixed-layout value encoded as its byte image, see [`Blittable`](crate::Blittable).
    Struct(StructValue),
}

impl Value {
    /// Returns the name of the variant.
    ///
    /// # Examples
    ///
    /// ```
    /// use stripekv::Value;
    ///
    /// assert_eq!(Value::from("hi").type_name(), "String");
    /// assert_eq!(Value::Null.type_name(), "Null");
    /// ```
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Empty => "Empty",
            Value::DbNull => "DbNull",
            Value::Bool(_) => "Bool",
            Value::I8(_) => "I8",
            Value::U8(_) => "U8",
            Value::I16(_) => "I16",
            Value::U16(_) => "U16",
            Value::I32(_) => "I32",
            Value::U32(_) => "U32",
            Value::I64(_) => "I64",
            Value::U64(_) => "U64",
            Value::F32(_) => "F32",
            Value::F64(_) => "F64",
            Value::Char(_) => "Char",
            Value::Decimal(_) => "Decimal",
            Value::Timestamp(_) => "Timestamp",
            Value::TimeSpan(_) => "TimeSpan",
            Value::OffsetTimestamp(_) => "OffsetTimestamp",
            Value::Guid(_) => "Guid",
            Value::NativeInt(_) => "NativeInt",
            Value::NativeUInt(_) => "NativeUInt",
            Value::String(_) => "String",
            Value::Bytes(_) => "Bytes",
            Value::List(_) => "List",
            Value::Array(_) => "Array",
            Value::Sequence(_) => "Sequence",
            Value::StringMap(_) => "StringMap",
            Value::Map(_) => "Map",
            Value::Struct(_) => "Struct",
        }
    }

    /// Returns `true` for [`Value::Null`], [`Value::Empty`] and [`Value::DbNull`].
    #[inline]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null | Value::Empty | Value::DbNull)
    }

    /// Returns the string slice if the value is a [`Value::String`].
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as an `i64` if it is any integer that fits.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::I8(v) => Some(i64::from(v)),
            Value::U8(v) => Some(i64::from(v)),
            Value::I16(v) => Some(i64::from(v)),
            Value::U16(v) => Some(i64::from(v)),
            Value::I32(v) => Some(i64::from(v)),
            Value::U32(v) => Some(i64::from(v)),
            Value::I64(v) | Value::NativeInt(v) => Some(v),
            Value::U64(v) | Value::NativeUInt(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null)
            | (Value::Empty, Value::Empty)
            | (Value::DbNull, Value::DbNull) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::I8(a), Value::I8(b)) => a == b,
            (Value::U8(a), Value::U8(b)) => a == b,
            (Value::I16(a), Value::I16(b)) => a == b,
            (Value::U16(a), Value::U16(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::U32(a), Value::U32(b)) => a == b,
            (Value::I64(a), Value::I64(b))
            | (Value::NativeInt(a), Value::NativeInt(b)) => a == b,
            (Value::U64(a), Value::U64(b))
            | (Value::NativeUInt(a), Value::NativeUInt(b)) => a == b,
            (Value::F32(a), Value::F32(b)) => a.to_bits() == b.to_bits(),
            (Value::F64(a), Value::F64(b)) => a.to_bits() == b.to_bits(),
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::TimeSpan(a), Value::TimeSpan(b)) => a == b,
            (Value::OffsetTimestamp(a), Value::OffsetTimestamp(b)) => a == b,
            (Value::Guid(a), Value::Guid(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::List(a), Value::List(b))
            | (Value::Array(a), Value::Array(b))
            | (Value::Sequence(a), Value::Sequence(b)) => a == b,
            (Value::StringMap(a), Value::StringMap(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Struct(a), Value::Struct(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

macro_rules! value_conversions {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                #[inline]
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }

            impl TryFrom<Value> for $ty {
                type Error = Error;

                #[inline]
                fn try_from(value: Value) -> Result<Self, Self::Error> {
                    match value {
                        Value::$variant(v) => Ok(v),
                        other => Err(Error::Conversion {
                            expected: stringify!($variant),
                            found: other.type_name(),
                        }),
                    }
                }
            }
        )*
    };
}

value_conversions! {
    bool => Bool,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    char => Char,
    Decimal => Decimal,
    Timestamp => Timestamp,
    TimeSpan => TimeSpan,
    OffsetTimestamp => OffsetTimestamp,
    Uuid => Guid,
    String => String,
    Vec<u8> => Bytes,
    StructValue => Struct,
}

impl From<&str> for Value {
    #[inline]
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<isize> for Value {
    #[inline]
    fn from(value: isize) -> Self {
        Value::NativeInt(value as i64)
    }
}

impl From<usize> for Value {
    #[inline]
    fn from(value: usize) -> Self {
        Value::NativeUInt(value as u64)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    #[inline]
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl From<Vec<Value>> for Value {
    #[inline]
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<Vec<(String, Value)>> for Value {
    #[inline]
    fn from(value: Vec<(String, Value)>) -> Self {
        Value::StringMap(value)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn conversions() {
        assert_eq!(Value::from(7_i32), Value::I32(7));
        assert_eq!(i32::try_from(Value::I32(7)).ok(), Some(7));
        assert!(matches!(
            String::try_from(Value::I32(7)),
            Err(Error::Conversion {
                expected: "String",
                found: "I32"
            })
        ));
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::String("x".into()));
        assert_eq!(Value::U64(u64::MAX).as_i64(), None);
        assert_eq!(Value::U8(3).as_i64(), Some(3));
    }

    #[test]
    fn float_equality_is_bitwise() {
        assert_eq!(Value::F64(f64::NAN), Value::F64(f64::NAN));
        assert_eq!(Value::F32(f32::NAN), Value::F32(f32::NAN));
        assert_ne!(Value::F64(0.0), Value::F64(-0.0));
        assert_ne!(Value::F32(1.0), Value::F64(1.0));
        assert_ne!(Value::I64(1), Value::NativeInt(1));
        assert_eq!(
            Value::List(vec![Value::F64(f64::INFINITY)]),
            Value::List(vec![Value::F64(f64::INFINITY)])
        );
    }
}
