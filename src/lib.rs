//! Lock-striped concurrent key-value store with a compact binary codec.
//!
//! # [`Dictionary`]
//! A concurrent hash map whose buckets are partitioned among a fixed number of stripe locks.
//! Reads never lock, single-key writes lock one stripe, and growing the table, clearing it or
//! taking a consistent copy locks every stripe in ascending order.
//!
//! # [`Codec`]
//! A tagged binary format for the dynamic [`Value`] graph, used to save and load dictionaries.
//!
//! # [`Store`]
//! Named case-insensitive dictionaries with the operations a network front-end needs.

mod comparer;
pub use comparer::{CaseInsensitive, DefaultComparer, KeyComparer};

mod dictionary;
pub use dictionary::{Dictionary, Iter};

mod error;
pub use error::{Error, Result};

mod options;
pub use options::{DictionaryOptions, DEFAULT_CAPACITY};

mod value;
pub use value::{
    Decimal, OffsetTimestamp, TimeSpan, Timestamp, TimestampKind, Value, MAX_SCALE,
    TICKS_PER_SECOND, UNIX_EPOCH_TICKS,
};

mod registry;
pub use registry::{Blittable, StructValue, TypeRegistry};

mod codec;
pub use codec::{Codec, Tag, MAX_DEPTH};

mod persistence;
pub use persistence::SIGNATURE;

mod store;
pub use store::{
    NamedDictionary, NoConvergence, RemoteConvergence, RemoteServer, RemoteServerState, Store,
};

#[cfg(feature = "serde")]
mod serde;
