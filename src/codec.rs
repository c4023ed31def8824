//! [`Codec`] writes and reads [`Value`] graphs in a compact tagged binary format.
//!
//! Every value starts with a one-byte [`Tag`]. Frequent small values are encoded by the tag alone,
//! fixed-width values are followed by their little-endian image, and strings, byte arrays and
//! collections carry a length prefix. Sequences of unknown length are closed by
//! [`Tag::Terminator`].

use crate::error::{Error, Result};
use crate::registry::{StructValue, TypeRegistry};
use crate::value::{Decimal, OffsetTimestamp, TimeSpan, Timestamp, TimestampKind, Value};
use std::io::{self, Read, Write};
use tracing::trace;
use uuid::Uuid;

/// Deepest nesting level a value may occupy; the outermost value is at level 0.
///
/// Containers hold their length prefix and elements one level below themselves, so a container
/// itself must sit above this level. [`Codec::write`] refuses deeper values so that everything it
/// writes can be read back.
pub const MAX_DEPTH: usize = 128;

/// Upper bound of elements or bytes reserved in advance from an untrusted length prefix.
const PREALLOC_LIMIT: usize = 4096;

/// [`Tag`] is the leading byte of every encoded value.
///
/// The ordinals are part of the file format and must never change.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(u8)]
pub enum Tag {
    Null = 0,
    Empty = 1,
    DbNull = 2,
    False = 3,
    True = 4,
    I32Zero = 5,
    I32One = 6,
    I32MinusOne = 7,
    I32Bits8 = 8,
    I32Bits16 = 9,
    I32Bits32 = 10,
    StringNull = 11,
    StringEmpty = 12,
    StringLen8 = 13,
    StringLen16 = 14,
    StringLen32 = 15,
    TimestampUnspecified = 16,
    TimestampUtc = 17,
    TimestampLocal = 18,
    DecimalZero = 19,
    Decimal = 20,
    U8 = 21,
    I8 = 22,
    /// Followed by the Unicode scalar value as a little-endian `u32`, so characters outside the
    /// basic multilingual plane survive. Streams carrying a 16-bit UTF-16 code unit after this
    /// tag are not read.
    Char = 23,
    I16 = 24,
    U16 = 25,
    U32 = 26,
    I64 = 27,
    U64 = 28,
    F32 = 29,
    F64 = 30,
    GuidEmpty = 31,
    Guid = 32,
    TimeSpan = 33,
    OffsetTimestamp = 34,
    NativeInt = 35,
    NativeUInt = 36,
    Sequence = 37,
    Terminator = 38,
    List = 39,
    StringMap = 40,
    Map = 41,
    Array = 42,
    Bytes = 43,
    Struct = 44,
}

impl Tag {
    const ALL: [Tag; 45] = [
        Tag::Null,
        Tag::Empty,
        Tag::DbNull,
        Tag::False,
        Tag::True,
        Tag::I32Zero,
        Tag::I32One,
        Tag::I32MinusOne,
        Tag::I32Bits8,
        Tag::I32Bits16,
        Tag::I32Bits32,
        Tag::StringNull,
        Tag::StringEmpty,
        Tag::StringLen8,
        Tag::StringLen16,
        Tag::StringLen32,
        Tag::TimestampUnspecified,
        Tag::TimestampUtc,
        Tag::TimestampLocal,
        Tag::DecimalZero,
        Tag::Decimal,
        Tag::U8,
        Tag::I8,
        Tag::Char,
        Tag::I16,
        Tag::U16,
        Tag::U32,
        Tag::I64,
        Tag::U64,
        Tag::F32,
        Tag::F64,
        Tag::GuidEmpty,
        Tag::Guid,
        Tag::TimeSpan,
        Tag::OffsetTimestamp,
        Tag::NativeInt,
        Tag::NativeUInt,
        Tag::Sequence,
        Tag::Terminator,
        Tag::List,
        Tag::StringMap,
        Tag::Map,
        Tag::Array,
        Tag::Bytes,
        Tag::Struct,
    ];
}

impl TryFrom<u8> for Tag {
    type Error = u8;

    #[inline]
    fn try_from(byte: u8) -> std::result::Result<Self, Self::Error> {
        Tag::ALL.get(usize::from(byte)).copied().ok_or(byte)
    }
}

/// Reasons a read stops.
#[derive(Debug, thiserror::Error)]
enum DecodeError {
    #[error("stream ended early: {0}")]
    Io(#[from] io::Error),
    #[error("unknown tag {0}")]
    UnknownTag(u8),
    #[error("terminator outside of a sequence")]
    UnexpectedTerminator,
    #[error("malformed length prefix")]
    InvalidLength,
    #[error("string is not valid UTF-8")]
    InvalidUtf8,
    #[error("invalid {0} payload")]
    InvalidPayload(&'static str),
    #[error("map key is null or not a string")]
    InvalidKey,
    #[error("struct `{0}` is not registered with a matching size")]
    UnknownStruct(String),
    #[error("values are nested too deeply")]
    TooDeep,
}

/// An element read from the stream: a value or the end of a sequence.
enum Item {
    Value(Value),
    Terminator,
}

/// [`Codec`] encodes and decodes [`Value`] graphs.
///
/// # Examples
///
/// ```
/// use stripekv::{Codec, Value};
///
/// let codec = Codec::new();
/// let bytes = codec.encode_to_vec(&Value::from(vec![Value::from(1_i32), Value::from("a")])).unwrap();
/// assert_eq!(
///     codec.decode_slice(&bytes),
///     Some(Value::List(vec![Value::I32(1), Value::String("a".into())]))
/// );
/// ```
#[derive(Clone, Debug, Default)]
pub struct Codec {
    registry: TypeRegistry,
}

impl Codec {
    /// Creates a [`Codec`] with an empty [`TypeRegistry`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a [`Codec`] resolving struct values through `registry`.
    #[must_use]
    pub fn with_registry(registry: TypeRegistry) -> Self {
        Self { registry }
    }

    /// Returns the [`TypeRegistry`].
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Writes `value` to `writer`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value contains a struct of an unregistered type, a map with a null
    /// key, a length beyond the 32-bit prefix range, or nesting beyond [`MAX_DEPTH`], or if
    /// writing fails. Part of the value may already have been written when an error is returned.
    pub fn write<W: Write + ?Sized>(&self, writer: &mut W, value: &Value) -> Result<()> {
        self.write_value(writer, value, 0)
    }

    fn write_value<W: Write + ?Sized>(
        &self,
        writer: &mut W,
        value: &Value,
        depth: usize,
    ) -> Result<()> {
        let nested = matches!(
            value,
            Value::List(_)
                | Value::Array(_)
                | Value::Sequence(_)
                | Value::StringMap(_)
                | Value::Map(_)
                | Value::Struct(_)
        );
        if depth + usize::from(nested) > MAX_DEPTH {
            return Err(Error::TooDeep(MAX_DEPTH));
        }
        match value {
            Value::Null => write_tag(writer, Tag::Null),
            Value::Empty => write_tag(writer, Tag::Empty),
            Value::DbNull => write_tag(writer, Tag::DbNull),
            Value::Bool(v) => write_tag(writer, if *v { Tag::True } else { Tag::False }),
            Value::I32(v) => write_i32(writer, *v),
            Value::I8(v) => write_fixed(writer, Tag::I8, &v.to_le_bytes()),
            Value::U8(v) => write_fixed(writer, Tag::U8, &[*v]),
            Value::I16(v) => write_fixed(writer, Tag::I16, &v.to_le_bytes()),
            Value::U16(v) => write_fixed(writer, Tag::U16, &v.to_le_bytes()),
            Value::U32(v) => write_fixed(writer, Tag::U32, &v.to_le_bytes()),
            Value::I64(v) => write_fixed(writer, Tag::I64, &v.to_le_bytes()),
            Value::U64(v) => write_fixed(writer, Tag::U64, &v.to_le_bytes()),
            Value::F32(v) => write_fixed(writer, Tag::F32, &v.to_le_bytes()),
            Value::F64(v) => write_fixed(writer, Tag::F64, &v.to_le_bytes()),
            Value::Char(v) => write_fixed(writer, Tag::Char, &u32::from(*v).to_le_bytes()),
            Value::NativeInt(v) => write_fixed(writer, Tag::NativeInt, &v.to_le_bytes()),
            Value::NativeUInt(v) => write_fixed(writer, Tag::NativeUInt, &v.to_le_bytes()),
            Value::Decimal(v) => write_decimal(writer, v),
            Value::Timestamp(v) => {
                let tag = match v.kind {
                    TimestampKind::Unspecified => Tag::TimestampUnspecified,
                    TimestampKind::Utc => Tag::TimestampUtc,
                    TimestampKind::Local => Tag::TimestampLocal,
                };
                write_fixed(writer, tag, &v.ticks.to_le_bytes())
            }
            Value::TimeSpan(v) => write_fixed(writer, Tag::TimeSpan, &v.ticks().to_le_bytes()),
            Value::OffsetTimestamp(v) => {
                let mut payload = [0; 16];
                payload[..8].copy_from_slice(&v.ticks.to_le_bytes());
                payload[8..].copy_from_slice(&v.offset_ticks.to_le_bytes());
                write_fixed(writer, Tag::OffsetTimestamp, &payload)
            }
            Value::Guid(v) if v.is_nil() => write_tag(writer, Tag::GuidEmpty),
            Value::Guid(v) => write_fixed(writer, Tag::Guid, &v.to_bytes_le()),
            Value::String(v) => write_str(writer, v),
            Value::Bytes(v) => write_bytes(writer, v),
            Value::List(items) => self.write_items(writer, Tag::List, items, depth),
            Value::Array(items) => self.write_items(writer, Tag::Array, items, depth),
            Value::Sequence(items) => {
                write_tag(writer, Tag::Sequence)?;
                for item in items {
                    self.write_value(writer, item, depth + 1)?;
                }
                write_tag(writer, Tag::Terminator)
            }
            Value::StringMap(pairs) => {
                write_tag(writer, Tag::StringMap)?;
                write_len(writer, pairs.len())?;
                for (key, value) in pairs {
                    write_str(writer, key)?;
                    self.write_value(writer, value, depth + 1)?;
                }
                Ok(())
            }
            Value::Map(pairs) => {
                if let Some((key, _)) = pairs.iter().find(|(key, _)| key.is_null()) {
                    return Err(Error::Unsupported {
                        type_name: format!("{} map key", key.type_name()),
                    });
                }
                write_tag(writer, Tag::Map)?;
                write_len(writer, pairs.len())?;
                for (key, value) in pairs {
                    self.write_value(writer, key, depth + 1)?;
                    self.write_value(writer, value, depth + 1)?;
                }
                Ok(())
            }
            Value::Struct(v) => self.write_struct(writer, v),
        }
    }

    /// Reads one value from `reader`.
    ///
    /// Returns `None` if the stream ends early or holds malformed data. A decoded
    /// [`Value::Null`] is returned as `Some(Value::Null)`.
    pub fn try_read<R: Read + ?Sized>(&self, reader: &mut R) -> Option<Value> {
        match self.read_item(reader, 0) {
            Ok(Item::Value(value)) => Some(value),
            Ok(Item::Terminator) => {
                trace!(error = %DecodeError::UnexpectedTerminator, "value not read");
                None
            }
            Err(error) => {
                trace!(%error, "value not read");
                None
            }
        }
    }

    /// Encodes `value` into a new buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be encoded, see [`Codec::write`].
    pub fn encode_to_vec(&self, value: &Value) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.write(&mut buffer, value)?;
        Ok(buffer)
    }

    /// Decodes the first value in `bytes`; trailing bytes are ignored.
    #[must_use]
    pub fn decode_slice(&self, mut bytes: &[u8]) -> Option<Value> {
        self.try_read(&mut bytes)
    }

    fn write_items<W: Write + ?Sized>(
        &self,
        writer: &mut W,
        tag: Tag,
        items: &[Value],
        depth: usize,
    ) -> Result<()> {
        write_tag(writer, tag)?;
        write_len(writer, items.len())?;
        for item in items {
            self.write_value(writer, item, depth + 1)?;
        }
        Ok(())
    }

    fn write_struct<W: Write + ?Sized>(&self, writer: &mut W, value: &StructValue) -> Result<()> {
        if !self.registry.accepts(value) {
            return Err(Error::Unsupported {
                type_name: value.type_name().to_owned(),
            });
        }
        write_tag(writer, Tag::Struct)?;
        write_str(writer, value.type_name())?;
        write_bytes(writer, value.bytes())
    }

    fn read_value<R: Read + ?Sized>(
        &self,
        reader: &mut R,
        depth: usize,
    ) -> std::result::Result<Value, DecodeError> {
        match self.read_item(reader, depth)? {
            Item::Value(value) => Ok(value),
            Item::Terminator => Err(DecodeError::UnexpectedTerminator),
        }
    }

    fn read_item<R: Read + ?Sized>(
        &self,
        reader: &mut R,
        depth: usize,
    ) -> std::result::Result<Item, DecodeError> {
        if depth > MAX_DEPTH {
            return Err(DecodeError::TooDeep);
        }
        let [byte] = read_array(reader)?;
        let tag = Tag::try_from(byte).map_err(DecodeError::UnknownTag)?;
        let value = match tag {
            Tag::Null | Tag::StringNull => Value::Null,
            Tag::Empty => Value::Empty,
            Tag::DbNull => Value::DbNull,
            Tag::False => Value::Bool(false),
            Tag::True => Value::Bool(true),
            Tag::I32Zero => Value::I32(0),
            Tag::I32One => Value::I32(1),
            Tag::I32MinusOne => Value::I32(-1),
            Tag::I32Bits8 => Value::I32(i32::from(i8::from_le_bytes(read_array(reader)?))),
            Tag::I32Bits16 => Value::I32(i32::from(i16::from_le_bytes(read_array(reader)?))),
            Tag::I32Bits32 => Value::I32(i32::from_le_bytes(read_array(reader)?)),
            Tag::StringEmpty => Value::String(String::new()),
            Tag::StringLen8 => {
                let len = usize::from(u8::from_le_bytes(read_array(reader)?));
                Value::String(read_string(reader, len)?)
            }
            Tag::StringLen16 => {
                let len = usize::from(u16::from_le_bytes(read_array(reader)?));
                Value::String(read_string(reader, len)?)
            }
            Tag::StringLen32 => {
                let len = usize::try_from(i32::from_le_bytes(read_array(reader)?))
                    .map_err(|_| DecodeError::InvalidLength)?;
                Value::String(read_string(reader, len)?)
            }
            Tag::TimestampUnspecified => read_timestamp(reader, TimestampKind::Unspecified)?,
            Tag::TimestampUtc => read_timestamp(reader, TimestampKind::Utc)?,
            Tag::TimestampLocal => read_timestamp(reader, TimestampKind::Local)?,
            Tag::DecimalZero => Value::Decimal(Decimal::ZERO),
            Tag::Decimal => {
                let mut words = [0; 4];
                for word in &mut words {
                    *word = u32::from_le_bytes(read_array(reader)?);
                }
                Value::Decimal(
                    Decimal::from_words(words).ok_or(DecodeError::InvalidPayload("decimal"))?,
                )
            }
            Tag::U8 => Value::U8(u8::from_le_bytes(read_array(reader)?)),
            Tag::I8 => Value::I8(i8::from_le_bytes(read_array(reader)?)),
            Tag::Char => {
                let code = u32::from_le_bytes(read_array(reader)?);
                Value::Char(char::from_u32(code).ok_or(DecodeError::InvalidPayload("char"))?)
            }
            Tag::I16 => Value::I16(i16::from_le_bytes(read_array(reader)?)),
            Tag::U16 => Value::U16(u16::from_le_bytes(read_array(reader)?)),
            Tag::U32 => Value::U32(u32::from_le_bytes(read_array(reader)?)),
            Tag::I64 => Value::I64(i64::from_le_bytes(read_array(reader)?)),
            Tag::U64 => Value::U64(u64::from_le_bytes(read_array(reader)?)),
            Tag::F32 => Value::F32(f32::from_le_bytes(read_array(reader)?)),
            Tag::F64 => Value::F64(f64::from_le_bytes(read_array(reader)?)),
            Tag::GuidEmpty => Value::Guid(Uuid::nil()),
            Tag::Guid => Value::Guid(Uuid::from_bytes_le(read_array(reader)?)),
            Tag::TimeSpan => Value::TimeSpan(TimeSpan(i64::from_le_bytes(read_array(reader)?))),
            Tag::OffsetTimestamp => {
                let ticks = i64::from_le_bytes(read_array(reader)?);
                let offset = i64::from_le_bytes(read_array(reader)?);
                Value::OffsetTimestamp(OffsetTimestamp::new(ticks, TimeSpan(offset)))
            }
            Tag::NativeInt => Value::NativeInt(i64::from_le_bytes(read_array(reader)?)),
            Tag::NativeUInt => Value::NativeUInt(u64::from_le_bytes(read_array(reader)?)),
            Tag::Terminator => return Ok(Item::Terminator),
            Tag::Sequence => {
                let mut items = Vec::new();
                loop {
                    match self.read_item(reader, depth + 1)? {
                        Item::Value(item) => items.push(item),
                        Item::Terminator => break Value::Sequence(items),
                    }
                }
            }
            Tag::List => Value::List(self.read_items(reader, depth)?),
            Tag::Array => Value::Array(self.read_items(reader, depth)?),
            Tag::StringMap => {
                let len = self.read_len(reader, depth)?;
                let mut pairs = Vec::with_capacity(len.min(PREALLOC_LIMIT));
                for _ in 0..len {
                    let Value::String(key) = self.read_value(reader, depth + 1)? else {
                        return Err(DecodeError::InvalidKey);
                    };
                    pairs.push((key, self.read_value(reader, depth + 1)?));
                }
                Value::StringMap(pairs)
            }
            Tag::Map => {
                let len = self.read_len(reader, depth)?;
                let mut pairs = Vec::with_capacity(len.min(PREALLOC_LIMIT));
                for _ in 0..len {
                    let key = self.read_value(reader, depth + 1)?;
                    if key.is_null() {
                        return Err(DecodeError::InvalidKey);
                    }
                    pairs.push((key, self.read_value(reader, depth + 1)?));
                }
                Value::Map(pairs)
            }
            Tag::Bytes => {
                let len = self.read_len(reader, depth)?;
                Value::Bytes(read_bytes(reader, len)?)
            }
            Tag::Struct => {
                let Value::String(type_name) = self.read_value(reader, depth + 1)? else {
                    return Err(DecodeError::InvalidPayload("struct type name"));
                };
                let Value::Bytes(bytes) = self.read_value(reader, depth + 1)? else {
                    return Err(DecodeError::InvalidPayload("struct image"));
                };
                let value = StructValue::from_raw(type_name, bytes);
                if !self.registry.accepts(&value) {
                    return Err(DecodeError::UnknownStruct(value.type_name().to_owned()));
                }
                Value::Struct(value)
            }
        };
        Ok(Item::Value(value))
    }

    fn read_items<R: Read + ?Sized>(
        &self,
        reader: &mut R,
        depth: usize,
    ) -> std::result::Result<Vec<Value>, DecodeError> {
        let len = self.read_len(reader, depth)?;
        let mut items = Vec::with_capacity(len.min(PREALLOC_LIMIT));
        for _ in 0..len {
            items.push(self.read_value(reader, depth + 1)?);
        }
        Ok(items)
    }

    /// Reads a length prefix, which is an encoded non-negative 32-bit integer.
    fn read_len<R: Read + ?Sized>(
        &self,
        reader: &mut R,
        depth: usize,
    ) -> std::result::Result<usize, DecodeError> {
        match self.read_value(reader, depth + 1)? {
            Value::I32(len) => usize::try_from(len).map_err(|_| DecodeError::InvalidLength),
            _ => Err(DecodeError::InvalidLength),
        }
    }
}

#[inline]
fn write_tag<W: Write + ?Sized>(writer: &mut W, tag: Tag) -> Result<()> {
    writer.write_all(&[tag as u8])?;
    Ok(())
}

#[inline]
fn write_fixed<W: Write + ?Sized>(writer: &mut W, tag: Tag, payload: &[u8]) -> Result<()> {
    write_tag(writer, tag)?;
    writer.write_all(payload)?;
    Ok(())
}

/// Writes a 32-bit integer in the narrowest form that keeps its value.
fn write_i32<W: Write + ?Sized>(writer: &mut W, value: i32) -> Result<()> {
    match value {
        0 => write_tag(writer, Tag::I32Zero),
        1 => write_tag(writer, Tag::I32One),
        -1 => write_tag(writer, Tag::I32MinusOne),
        _ => {
            if let Ok(narrow) = i8::try_from(value) {
                write_fixed(writer, Tag::I32Bits8, &narrow.to_le_bytes())
            } else if let Ok(narrow) = i16::try_from(value) {
                write_fixed(writer, Tag::I32Bits16, &narrow.to_le_bytes())
            } else {
                write_fixed(writer, Tag::I32Bits32, &value.to_le_bytes())
            }
        }
    }
}

fn write_len<W: Write + ?Sized>(writer: &mut W, len: usize) -> Result<()> {
    let len = i32::try_from(len).map_err(|_| Error::LengthOverflow(len))?;
    write_i32(writer, len)
}

fn write_str<W: Write + ?Sized>(writer: &mut W, value: &str) -> Result<()> {
    let bytes = value.as_bytes();
    if bytes.is_empty() {
        return write_tag(writer, Tag::StringEmpty);
    }
    if let Ok(len) = u8::try_from(bytes.len()) {
        write_fixed(writer, Tag::StringLen8, &[len])?;
    } else if let Ok(len) = u16::try_from(bytes.len()) {
        write_fixed(writer, Tag::StringLen16, &len.to_le_bytes())?;
    } else {
        let len = i32::try_from(bytes.len()).map_err(|_| Error::LengthOverflow(bytes.len()))?;
        write_fixed(writer, Tag::StringLen32, &len.to_le_bytes())?;
    }
    writer.write_all(bytes)?;
    Ok(())
}

fn write_bytes<W: Write + ?Sized>(writer: &mut W, bytes: &[u8]) -> Result<()> {
    write_tag(writer, Tag::Bytes)?;
    write_len(writer, bytes.len())?;
    writer.write_all(bytes)?;
    Ok(())
}

fn write_decimal<W: Write + ?Sized>(writer: &mut W, value: &Decimal) -> Result<()> {
    let words = value.words();
    if words == [0; 4] {
        return write_tag(writer, Tag::DecimalZero);
    }
    let mut payload = [0; 16];
    for (chunk, word) in payload.chunks_exact_mut(4).zip(words) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }
    write_fixed(writer, Tag::Decimal, &payload)
}

#[inline]
fn read_array<const N: usize, R: Read + ?Sized>(
    reader: &mut R,
) -> std::result::Result<[u8; N], DecodeError> {
    let mut buffer = [0; N];
    reader.read_exact(&mut buffer)?;
    Ok(buffer)
}

fn read_bytes<R: Read + ?Sized>(
    reader: &mut R,
    len: usize,
) -> std::result::Result<Vec<u8>, DecodeError> {
    let mut bytes = Vec::with_capacity(len.min(PREALLOC_LIMIT));
    Read::take(&mut *reader, len as u64).read_to_end(&mut bytes)?;
    if bytes.len() != len {
        return Err(DecodeError::Io(io::ErrorKind::UnexpectedEof.into()));
    }
    Ok(bytes)
}

fn read_string<R: Read + ?Sized>(
    reader: &mut R,
    len: usize,
) -> std::result::Result<String, DecodeError> {
    String::from_utf8(read_bytes(reader, len)?).map_err(|_| DecodeError::InvalidUtf8)
}

fn read_timestamp<R: Read + ?Sized>(
    reader: &mut R,
    kind: TimestampKind,
) -> std::result::Result<Value, DecodeError> {
    let ticks = i64::from_le_bytes(read_array(reader)?);
    Ok(Value::Timestamp(Timestamp::new(ticks, kind)))
}
