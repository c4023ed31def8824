//! Key equality and hashing used by [`Dictionary`](crate::Dictionary).

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash, Hasher};

/// Key comparison trait.
///
/// A [`Dictionary`](crate::Dictionary) delegates every hash computation and key comparison to its
/// comparer. Lookups accept any `Q` that the key type borrows as, therefore an implementation for
/// `Q` must hash and compare consistently with the implementation for the owned key type.
pub trait KeyComparer<Q: ?Sized> {
    /// Returns the hash value of the key.
    fn hash(&self, key: &Q) -> u64;

    /// Returns `true` if both keys are equal.
    fn equals(&self, left: &Q, right: &Q) -> bool;
}

/// [`DefaultComparer`] compares keys by value using [`Eq`] and [`Hash`].
#[derive(Clone, Debug, Default)]
pub struct DefaultComparer<H = RandomState> {
    build_hasher: H,
}

impl DefaultComparer {
    /// Creates a [`DefaultComparer`] backed by [`RandomState`].
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }
}

impl<H: BuildHasher> DefaultComparer<H> {
    /// Creates a [`DefaultComparer`] with the given [`BuildHasher`].
    ///
    /// # Examples
    ///
    /// ```
    /// use stripekv::{DefaultComparer, KeyComparer};
    /// use std::collections::hash_map::RandomState;
    ///
    /// let comparer = DefaultComparer::with_hasher(RandomState::new());
    /// assert!(comparer.equals(&1, &1));
    /// ```
    #[inline]
    pub const fn with_hasher(build_hasher: H) -> Self {
        Self { build_hasher }
    }
}

impl<Q, H> KeyComparer<Q> for DefaultComparer<H>
where
    Q: Eq + Hash + ?Sized,
    H: BuildHasher,
{
    #[inline]
    fn hash(&self, key: &Q) -> u64 {
        let mut h = self.build_hasher.build_hasher();
        key.hash(&mut h);
        h.finish()
    }

    #[inline]
    fn equals(&self, left: &Q, right: &Q) -> bool {
        left == right
    }
}

/// [`CaseInsensitive`] compares string keys ignoring case.
///
/// Both sides are folded to their Unicode upper-case form, one character at a time, so `"straße"`
/// and `"STRASSE"` are equal.
///
/// # Examples
///
/// ```
/// use stripekv::{CaseInsensitive, KeyComparer};
///
/// let comparer = CaseInsensitive::new();
/// assert!(comparer.equals("Hello", "hELLO"));
/// assert_eq!(comparer.hash("Hello"), comparer.hash("HELLO"));
/// ```
#[derive(Clone, Debug, Default)]
pub struct CaseInsensitive<H = RandomState> {
    build_hasher: H,
}

impl CaseInsensitive {
    /// Creates a [`CaseInsensitive`] comparer backed by [`RandomState`].
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }
}

impl<H: BuildHasher> CaseInsensitive<H> {
    /// Creates a [`CaseInsensitive`] comparer with the given [`BuildHasher`].
    #[inline]
    pub const fn with_hasher(build_hasher: H) -> Self {
        Self { build_hasher }
    }
}

impl<H: BuildHasher> KeyComparer<str> for CaseInsensitive<H> {
    #[inline]
    fn hash(&self, key: &str) -> u64 {
        let mut h = self.build_hasher.build_hasher();
        for c in key.chars().flat_map(char::to_uppercase) {
            h.write_u32(u32::from(c));
        }
        h.finish()
    }

    #[inline]
    fn equals(&self, left: &str, right: &str) -> bool {
        left == right
            || left
                .chars()
                .flat_map(char::to_uppercase)
                .eq(right.chars().flat_map(char::to_uppercase))
    }
}

impl<H: BuildHasher> KeyComparer<String> for CaseInsensitive<H> {
    #[inline]
    fn hash(&self, key: &String) -> u64 {
        <Self as KeyComparer<str>>::hash(self, key.as_str())
    }

    #[inline]
    fn equals(&self, left: &String, right: &String) -> bool {
        <Self as KeyComparer<str>>::equals(self, left.as_str(), right.as_str())
    }
}
