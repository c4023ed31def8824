//! Construction parameters of a [`Dictionary`](crate::Dictionary).

use std::thread;

/// Number of buckets of a dictionary created without an explicit capacity.
pub const DEFAULT_CAPACITY: usize = 31;

/// [`DictionaryOptions`] configures the stripe count and the initial bucket count.
///
/// # Examples
///
/// ```
/// use stripekv::{Dictionary, DictionaryOptions, DefaultComparer};
///
/// let options = DictionaryOptions {
///     concurrency_level: 4,
///     capacity: 64,
/// };
/// let dictionary: Dictionary<u64, u64> = Dictionary::with_options(options, DefaultComparer::new());
/// assert_eq!(dictionary.concurrency_level(), 4);
/// assert_eq!(dictionary.capacity(), 64);
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DictionaryOptions {
    /// Number of stripe locks; fixed for the lifetime of the dictionary. At least `1`.
    pub concurrency_level: usize,

    /// Initial number of buckets, also used after the dictionary is cleared. At least `1`.
    pub capacity: usize,
}

impl DictionaryOptions {
    /// Returns the default stripe count: the available parallelism of the machine.
    #[must_use]
    pub fn default_concurrency_level() -> usize {
        thread::available_parallelism().map_or(1, usize::from)
    }

    /// Returns a copy with both values raised to at least `1`.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            concurrency_level: self.concurrency_level.max(1),
            capacity: self.capacity.max(1),
        }
    }
}

impl Default for DictionaryOptions {
    fn default() -> Self {
        Self {
            concurrency_level: Self::default_concurrency_level(),
            capacity: DEFAULT_CAPACITY,
        }
    }
}
