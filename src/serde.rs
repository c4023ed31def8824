use crate::comparer::KeyComparer;
use crate::options::DictionaryOptions;
use crate::value::Value;
use crate::Dictionary;

use serde::de::{Deserialize, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, SerializeStruct, Serializer};
use serde::Deserializer;

use std::fmt;
use std::marker::PhantomData;

pub struct DictionaryVisitor<K: 'static, V: 'static, C> {
    #[allow(clippy::type_complexity)]
    marker: PhantomData<fn() -> Dictionary<K, V, C>>,
}

impl<K: 'static, V: 'static, C> DictionaryVisitor<K, V, C> {
    fn new() -> Self {
        DictionaryVisitor {
            marker: PhantomData,
        }
    }
}

impl<'de, K, V, C> Visitor<'de> for DictionaryVisitor<K, V, C>
where
    K: Deserialize<'de> + Clone + 'static,
    V: Deserialize<'de> + Clone + 'static,
    C: KeyComparer<K> + Default,
{
    type Value = Dictionary<K, V, C>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a Dictionary")
    }

    fn visit_map<M>(self, mut access: M) -> Result<Self::Value, M::Error>
    where
        M: MapAccess<'de>,
    {
        let mut options = DictionaryOptions::default();
        options.capacity = options.capacity.max(access.size_hint().unwrap_or(0));
        let dictionary = Dictionary::with_options(options, C::default());

        while let Some((key, value)) = access.next_entry()? {
            dictionary.set(key, value);
        }

        Ok(dictionary)
    }
}

impl<'de, K, V, C> Deserialize<'de> for Dictionary<K, V, C>
where
    K: Deserialize<'de> + Clone + 'static,
    V: Deserialize<'de> + Clone + 'static,
    C: KeyComparer<K> + Default,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(DictionaryVisitor::<K, V, C>::new())
    }
}

impl<K, V, C> Serialize for Dictionary<K, V, C>
where
    K: Serialize + Clone + 'static,
    V: Serialize + Clone + 'static,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let entries = self.to_vec();
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (k, v) in &entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Values map onto the closest serde shape; decimals become their decimal string.
impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null | Value::DbNull => serializer.serialize_none(),
            Value::Empty => serializer.serialize_unit(),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::I8(v) => serializer.serialize_i8(*v),
            Value::U8(v) => serializer.serialize_u8(*v),
            Value::I16(v) => serializer.serialize_i16(*v),
            Value::U16(v) => serializer.serialize_u16(*v),
            Value::I32(v) => serializer.serialize_i32(*v),
            Value::U32(v) => serializer.serialize_u32(*v),
            Value::I64(v) | Value::NativeInt(v) => serializer.serialize_i64(*v),
            Value::U64(v) | Value::NativeUInt(v) => serializer.serialize_u64(*v),
            Value::F32(v) => serializer.serialize_f32(*v),
            Value::F64(v) => serializer.serialize_f64(*v),
            Value::Char(v) => serializer.serialize_char(*v),
            Value::Decimal(v) => serializer.collect_str(v),
            Value::Timestamp(v) => v.serialize(serializer),
            Value::TimeSpan(v) => v.serialize(serializer),
            Value::OffsetTimestamp(v) => v.serialize(serializer),
            Value::Guid(v) => v.serialize(serializer),
            Value::String(v) => serializer.serialize_str(v),
            Value::Bytes(v) => serializer.serialize_bytes(v),
            Value::List(items) | Value::Array(items) | Value::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::StringMap(pairs) => {
                let mut map = serializer.serialize_map(Some(pairs.len()))?;
                for (k, v) in pairs {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Value::Map(pairs) => {
                let mut map = serializer.serialize_map(Some(pairs.len()))?;
                for (k, v) in pairs {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Value::Struct(v) => {
                let mut state = serializer.serialize_struct("StructValue", 2)?;
                state.serialize_field("type_name", v.type_name())?;
                state.serialize_field("bytes", v.bytes())?;
                state.end()
            }
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a self-describing value")
    }

    fn visit_bool<E>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i8<E>(self, v: i8) -> Result<Value, E> {
        Ok(Value::I8(v))
    }

    fn visit_i16<E>(self, v: i16) -> Result<Value, E> {
        Ok(Value::I16(v))
    }

    fn visit_i32<E>(self, v: i32) -> Result<Value, E> {
        Ok(Value::I32(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Value, E> {
        Ok(Value::I64(v))
    }

    fn visit_u8<E>(self, v: u8) -> Result<Value, E> {
        Ok(Value::U8(v))
    }

    fn visit_u16<E>(self, v: u16) -> Result<Value, E> {
        Ok(Value::U16(v))
    }

    fn visit_u32<E>(self, v: u32) -> Result<Value, E> {
        Ok(Value::U32(v))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Value, E> {
        Ok(Value::U64(v))
    }

    fn visit_f32<E>(self, v: f32) -> Result<Value, E> {
        Ok(Value::F32(v))
    }

    fn visit_f64<E>(self, v: f64) -> Result<Value, E> {
        Ok(Value::F64(v))
    }

    fn visit_char<E>(self, v: char) -> Result<Value, E> {
        Ok(Value::Char(v))
    }

    fn visit_str<E>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_owned()))
    }

    fn visit_string<E>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_bytes<E>(self, v: &[u8]) -> Result<Value, E> {
        Ok(Value::Bytes(v.to_vec()))
    }

    fn visit_byte_buf<E>(self, v: Vec<u8>) -> Result<Value, E> {
        Ok(Value::Bytes(v))
    }

    fn visit_none<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer)
    }

    fn visit_unit<E>(self) -> Result<Value, E> {
        Ok(Value::Empty)
    }

    fn visit_seq<A>(self, mut access: A) -> Result<Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::with_capacity(access.size_hint().unwrap_or(0).min(4096));
        while let Some(item) = access.next_element()? {
            items.push(item);
        }
        Ok(Value::List(items))
    }

    /// Maps whose keys are all strings become [`Value::StringMap`].
    fn visit_map<A>(self, mut access: A) -> Result<Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut pairs: Vec<(Value, Value)> = Vec::new();
        while let Some(pair) = access.next_entry()? {
            pairs.push(pair);
        }
        if pairs.iter().all(|(k, _)| matches!(k, Value::String(_))) {
            let pairs = pairs
                .into_iter()
                .filter_map(|(k, v)| match k {
                    Value::String(k) => Some((k, v)),
                    _ => None,
                })
                .collect();
            return Ok(Value::StringMap(pairs));
        }
        Ok(Value::Map(pairs))
    }
}

/// Deserialization sees only the serde data model, so temporal, decimal and struct values come
/// back as the plain shapes they were serialized to.
impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ValueVisitor)
    }
}

#[cfg(test)]
mod serde_test {
    use crate::options::DictionaryOptions;
    use crate::value::Value;
    use crate::Dictionary;

    use serde_test::{assert_de_tokens, assert_ser_tokens, assert_tokens, Token};

    #[test]
    fn serde_dictionary() {
        let dictionary: Dictionary<u64, i16> = Dictionary::new();
        assert!(dictionary.try_add(2, -6));
        assert_tokens(
            &dictionary,
            &[
                Token::Map { len: Some(1) },
                Token::U64(2),
                Token::I16(-6),
                Token::MapEnd,
            ],
        );
    }

    #[test]
    fn serde_value() {
        let value = Value::StringMap(vec![
            ("n".to_owned(), Value::I32(1)),
            ("l".to_owned(), Value::List(vec![Value::Null, Value::Bool(true)])),
        ]);
        assert_tokens(
            &value,
            &[
                Token::Map { len: Some(2) },
                Token::Str("n"),
                Token::I32(1),
                Token::Str("l"),
                Token::Seq { len: Some(2) },
                Token::None,
                Token::Bool(true),
                Token::SeqEnd,
                Token::MapEnd,
            ],
        );

        assert_ser_tokens(
            &Value::Decimal(crate::value::Decimal::from(-15_i64)),
            &[Token::Str("-15")],
        );
        assert_de_tokens(
            &Value::Map(vec![(Value::U8(1), Value::from("x"))]),
            &[
                Token::Map { len: Some(1) },
                Token::U8(1),
                Token::Str("x"),
                Token::MapEnd,
            ],
        );
    }

    #[test]
    fn serde_options() {
        let options = DictionaryOptions {
            concurrency_level: 2,
            capacity: 7,
        };
        assert_tokens(
            &options,
            &[
                Token::Struct {
                    name: "DictionaryOptions",
                    len: 2,
                },
                Token::Str("concurrency_level"),
                Token::U64(2),
                Token::Str("capacity"),
                Token::U64(7),
                Token::StructEnd,
            ],
        );
    }
}
