//! [`Dictionary`] is a lock-striped concurrent hash map that grows by publishing new snapshots.

mod snapshot;

use crate::comparer::{DefaultComparer, KeyComparer};
use crate::options::{DictionaryOptions, DEFAULT_CAPACITY};
use parking_lot::{Mutex, MutexGuard};
use sdd::{AtomicShared, Guard, Shared, Tag};
use snapshot::{Locker, Node, Snapshot};
use std::borrow::Borrow;
use std::fmt::{self, Debug};
use std::iter::FusedIterator;
use std::ptr;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};
use tracing::debug;

/// Largest bucket array the table grows to.
const MAX_BUCKETS: usize = 0x7FEF_FFFF;

/// Scalable concurrent hash map.
///
/// [`Dictionary`] partitions its buckets among a fixed number of stripe locks chosen at
/// construction. Single-key writers lock only the stripe owning the key's bucket, readers never
/// lock, and whole-table operations acquire every stripe lock in ascending order.
///
/// ## Notes
///
/// * Buckets are linked lists of immutable nodes; replacing a value publishes a new node, so
///   readers observe either the old or the new pair, never a partially written one.
/// * The bucket array only grows. Growing, clearing and draining swap in a new snapshot while all
///   the stripe locks are held; retired snapshots and unlinked nodes are reclaimed by `sdd`.
/// * Keys and values are cloned when the table grows and when they are returned.
///
/// # Examples
///
/// ```
/// use stripekv::Dictionary;
///
/// let dictionary: Dictionary<String, u32> = Dictionary::new();
///
/// assert!(dictionary.try_add("a".to_owned(), 1));
/// assert!(!dictionary.try_add("a".to_owned(), 2));
/// dictionary.set("b".to_owned(), 2);
///
/// assert_eq!(dictionary.get("a"), Some(1));
/// assert_eq!(dictionary.len(), 2);
/// ```
pub struct Dictionary<K, V, C = DefaultComparer>
where
    K: 'static,
    V: 'static,
{
    snapshot: AtomicShared<Snapshot<K, V>>,
    locks: Box<[Mutex<()>]>,
    budget: AtomicUsize,
    initial_capacity: usize,
    comparer: C,
}

impl<K: 'static, V: 'static> Dictionary<K, V, DefaultComparer> {
    /// Creates an empty [`Dictionary`] with the default [`DictionaryOptions`].
    ///
    /// # Examples
    ///
    /// ```
    /// use stripekv::Dictionary;
    ///
    /// let dictionary: Dictionary<u64, u32> = Dictionary::new();
    /// assert_eq!(dictionary.capacity(), 31);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::with_comparer(DefaultComparer::new())
    }

    /// Creates an empty [`Dictionary`] with at least `capacity` buckets.
    ///
    /// # Examples
    ///
    /// ```
    /// use stripekv::Dictionary;
    ///
    /// let dictionary: Dictionary<u64, u32> = Dictionary::with_capacity(1000);
    /// assert_eq!(dictionary.capacity(), 1000);
    /// ```
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let options = DictionaryOptions {
            capacity,
            ..DictionaryOptions::default()
        };
        Self::with_options(options, DefaultComparer::new())
    }
}

impl<K: 'static, V: 'static, C> Dictionary<K, V, C> {
    /// Creates an empty [`Dictionary`] with the given [`KeyComparer`].
    ///
    /// # Examples
    ///
    /// ```
    /// use stripekv::{CaseInsensitive, Dictionary};
    ///
    /// let dictionary: Dictionary<String, u32, _> = Dictionary::with_comparer(CaseInsensitive::new());
    /// dictionary.set("Key".to_owned(), 1);
    /// assert_eq!(dictionary.get("KEY"), Some(1));
    /// ```
    #[must_use]
    pub fn with_comparer(comparer: C) -> Self {
        Self::with_options(DictionaryOptions::default(), comparer)
    }

    /// Creates an empty [`Dictionary`] with the given options and [`KeyComparer`].
    #[must_use]
    pub fn with_options(options: DictionaryOptions, comparer: C) -> Self {
        let options = options.normalized();
        let dictionary = Self {
            snapshot: AtomicShared::new(Snapshot::new(
                options.capacity,
                options.concurrency_level,
            )),
            locks: std::iter::repeat_with(|| Mutex::new(()))
                .take(options.concurrency_level)
                .collect(),
            budget: AtomicUsize::new(0),
            initial_capacity: options.capacity,
            comparer,
        };
        dictionary.reset_budget(options.capacity);
        dictionary
    }

    /// Returns the [`KeyComparer`].
    #[inline]
    pub fn comparer(&self) -> &C {
        &self.comparer
    }

    /// Returns the options the [`Dictionary`] was created with.
    #[inline]
    pub fn options(&self) -> DictionaryOptions {
        DictionaryOptions {
            concurrency_level: self.locks.len(),
            capacity: self.initial_capacity,
        }
    }

    /// Returns the number of stripe locks.
    #[inline]
    pub fn concurrency_level(&self) -> usize {
        self.locks.len()
    }

    /// Returns the current number of buckets.
    ///
    /// # Examples
    ///
    /// ```
    /// use stripekv::Dictionary;
    ///
    /// let dictionary: Dictionary<u64, u64> = Dictionary::with_capacity(4);
    /// for i in 0..64 {
    ///     dictionary.set(i, i);
    /// }
    /// assert!(dictionary.capacity() > 4);
    /// ```
    #[inline]
    pub fn capacity(&self) -> usize {
        let guard = Guard::new();
        self.current(&guard).num_buckets()
    }

    /// Returns the number of entries while every stripe lock is held.
    ///
    /// # Examples
    ///
    /// ```
    /// use stripekv::Dictionary;
    ///
    /// let dictionary: Dictionary<u64, u32> = Dictionary::new();
    /// dictionary.set(1, 0);
    /// assert_eq!(dictionary.len(), 1);
    /// ```
    pub fn len(&self) -> usize {
        let guard = Guard::new();
        let _locks = self.lock_all();
        self.current(&guard).total_len()
    }

    /// Returns `true` if the [`Dictionary`] is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sums the stripe counters without acquiring any lock.
    ///
    /// The counters are read one after another while writers may be running, so the result is
    /// not a point-in-time count. It is intended for cheap reporting, use [`Dictionary::len`] for
    /// an exact answer.
    pub fn approximate_len(&self) -> usize {
        let guard = Guard::new();
        self.current(&guard).total_len()
    }

    /// Returns `true` if any stripe counter is non-zero, without acquiring any lock.
    ///
    /// Like [`Dictionary::approximate_len`], the answer may already be stale when returned.
    pub fn has_entries(&self) -> bool {
        let guard = Guard::new();
        let snapshot = self.current(&guard);
        (0..snapshot.num_stripes()).any(|stripe| snapshot.stripe_len(stripe) != 0)
    }

    /// Reads the entry associated with the key without acquiring any lock.
    ///
    /// Returns `None` if the key does not exist.
    ///
    /// # Examples
    ///
    /// ```
    /// use stripekv::Dictionary;
    ///
    /// let dictionary: Dictionary<u64, String> = Dictionary::new();
    /// dictionary.set(1, "one".to_owned());
    /// assert_eq!(dictionary.read(&1, |_, v| v.len()), Some(3));
    /// assert!(dictionary.read(&2, |_, v| v.len()).is_none());
    /// ```
    pub fn read<Q, R, F>(&self, key: &Q, reader: F) -> Option<R>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: KeyComparer<Q>,
        F: FnOnce(&K, &V) -> R,
    {
        let hash = self.comparer.hash(key);
        let guard = Guard::new();
        let snapshot = self.current(&guard);
        let (_, node) = snapshot.find(
            snapshot.bucket_index(hash),
            hash,
            |k| self.comparer.equals(k.borrow(), key),
            &guard,
        )?;
        Some(reader(&node.key, &node.value))
    }

    /// Returns a clone of the value associated with the key.
    ///
    /// # Examples
    ///
    /// ```
    /// use stripekv::Dictionary;
    ///
    /// let dictionary: Dictionary<String, u32> = Dictionary::new();
    /// dictionary.set("a".to_owned(), 1);
    /// assert_eq!(dictionary.get("a"), Some(1));
    /// assert_eq!(dictionary.get("b"), None);
    /// ```
    #[inline]
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: KeyComparer<Q>,
        V: Clone,
    {
        self.read(key, |_, v| v.clone())
    }

    /// Returns `true` if the key exists.
    #[inline]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: KeyComparer<Q>,
    {
        self.read(key, |_, _| ()).is_some()
    }

    /// Removes the key and returns its value.
    ///
    /// # Examples
    ///
    /// ```
    /// use stripekv::Dictionary;
    ///
    /// let dictionary: Dictionary<u64, u32> = Dictionary::new();
    /// dictionary.set(1, 10);
    /// assert_eq!(dictionary.try_remove(&1), Some(10));
    /// assert_eq!(dictionary.try_remove(&1), None);
    /// ```
    pub fn try_remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: KeyComparer<Q>,
        V: Clone,
    {
        let hash = self.comparer.hash(key);
        let guard = Guard::new();
        let locker = self.lock_bucket(hash, &guard);
        let (link, node) = locker.find(hash, |k| self.comparer.equals(k.borrow(), key))?;
        locker.remove(link, node);
        Some(node.value.clone())
    }

    /// Invokes `scanner` on every entry without acquiring any lock.
    ///
    /// The scan is weakly consistent: entries inserted or removed while it runs may or may not be
    /// visited, and a key updated during the scan is visited at most once.
    ///
    /// # Examples
    ///
    /// ```
    /// use stripekv::Dictionary;
    ///
    /// let dictionary: Dictionary<u64, u64> = Dictionary::new();
    /// dictionary.set(1, 10);
    /// dictionary.set(2, 20);
    ///
    /// let mut sum = 0;
    /// dictionary.scan(|_, v| sum += *v);
    /// assert_eq!(sum, 30);
    /// ```
    pub fn scan<F: FnMut(&K, &V)>(&self, scanner: F) {
        let guard = Guard::new();
        self.current(&guard).for_each(&guard, scanner);
    }

    /// Returns a weakly consistent iterator over clones of the entries.
    ///
    /// The iterator keeps the snapshot it started on alive; entries written to a snapshot
    /// published later are not visited.
    ///
    /// # Examples
    ///
    /// ```
    /// use stripekv::Dictionary;
    ///
    /// let dictionary: Dictionary<u64, u64> = Dictionary::new();
    /// dictionary.set(1, 2);
    /// assert_eq!(dictionary.iter().collect::<Vec<_>>(), vec![(1, 2)]);
    /// ```
    pub fn iter(&self) -> Iter<K, V> {
        let guard = Guard::new();
        Iter {
            snapshot: self.snapshot.get_shared(Acquire, &guard),
            bucket_index: 0,
            next: None,
        }
    }

    /// Returns a weakly consistent iterator over clones of the keys.
    #[inline]
    pub fn keys(&self) -> impl Iterator<Item = K>
    where
        K: Clone,
        V: Clone,
    {
        self.iter().map(|(k, _)| k)
    }

    /// Returns a weakly consistent iterator over clones of the values.
    #[inline]
    pub fn values(&self) -> impl Iterator<Item = V>
    where
        K: Clone,
        V: Clone,
    {
        self.iter().map(|(_, v)| v)
    }

    /// Removes every entry.
    ///
    /// A new empty snapshot with the initial capacity is published while every stripe lock is
    /// held.
    ///
    /// # Examples
    ///
    /// ```
    /// use stripekv::Dictionary;
    ///
    /// let dictionary: Dictionary<u64, u32> = Dictionary::new();
    /// dictionary.set(1, 0);
    /// dictionary.clear();
    /// assert!(dictionary.is_empty());
    /// ```
    pub fn clear(&self) {
        let guard = Guard::new();
        let _locks = self.lock_all();
        let removed = self.current(&guard).total_len();
        self.reset();
        debug!(removed, "dictionary cleared");
    }

    /// Returns a point-in-time copy of every entry.
    ///
    /// # Examples
    ///
    /// ```
    /// use stripekv::Dictionary;
    ///
    /// let dictionary: Dictionary<u64, u32> = Dictionary::new();
    /// dictionary.set(1, 0);
    /// dictionary.set(2, 0);
    ///
    /// let mut entries = dictionary.to_vec();
    /// entries.sort_unstable();
    /// assert_eq!(entries, vec![(1, 0), (2, 0)]);
    /// ```
    pub fn to_vec(&self) -> Vec<(K, V)>
    where
        K: Clone,
        V: Clone,
    {
        let guard = Guard::new();
        let _locks = self.lock_all();
        Self::copy_entries(self.current(&guard), &guard)
    }

    /// Returns a point-in-time copy of every entry and empties the [`Dictionary`] in the same
    /// critical section.
    ///
    /// # Examples
    ///
    /// ```
    /// use stripekv::Dictionary;
    ///
    /// let dictionary: Dictionary<u64, u32> = Dictionary::new();
    /// dictionary.set(1, 0);
    /// assert_eq!(dictionary.drain_to_vec(), vec![(1, 0)]);
    /// assert!(dictionary.is_empty());
    /// ```
    pub fn drain_to_vec(&self) -> Vec<(K, V)>
    where
        K: Clone,
        V: Clone,
    {
        let guard = Guard::new();
        let _locks = self.lock_all();
        let entries = Self::copy_entries(self.current(&guard), &guard);
        self.reset();
        debug!(drained = entries.len(), "dictionary drained");
        entries
    }

    /// Returns the current snapshot.
    #[inline]
    fn current<'g>(&self, guard: &'g Guard) -> &'g Snapshot<K, V> {
        let snapshot = self.snapshot.load(Acquire, guard).as_ref();
        debug_assert!(snapshot.is_some());
        // SAFETY: the slot is populated on construction and is only ever swapped for another
        // snapshot.
        unsafe { snapshot.unwrap_unchecked() }
    }

    /// Locks the stripe owning the bucket of `hash` in the current snapshot.
    fn lock_bucket<'g>(&'g self, hash: u64, guard: &'g Guard) -> Locker<'g, K, V> {
        loop {
            let snapshot = self.current(guard);
            let bucket_index = snapshot.bucket_index(hash);
            let lock = self.locks[snapshot.stripe_index(bucket_index)].lock();
            if ptr::eq(snapshot, self.current(guard)) {
                return Locker::new(lock, snapshot, bucket_index, guard);
            }
        }
    }

    /// Acquires every stripe lock in ascending order.
    fn lock_all(&self) -> Vec<MutexGuard<'_, ()>> {
        self.locks.iter().map(Mutex::lock).collect()
    }

    fn copy_entries(snapshot: &Snapshot<K, V>, guard: &Guard) -> Vec<(K, V)>
    where
        K: Clone,
        V: Clone,
    {
        let mut entries = Vec::with_capacity(snapshot.total_len());
        snapshot.for_each(guard, |k, v| entries.push((k.clone(), v.clone())));
        entries
    }

    /// Publishes an empty snapshot with the initial capacity.
    ///
    /// Every stripe lock must be held.
    fn reset(&self) {
        let empty = Snapshot::new(self.initial_capacity, self.locks.len());
        self.snapshot.swap((Some(Shared::new(empty)), Tag::None), Release);
        self.reset_budget(self.initial_capacity);
    }

    fn reset_budget(&self, num_buckets: usize) {
        self.budget
            .store((num_buckets / self.locks.len()).max(1), Relaxed);
    }
}

impl<K, V, C> Dictionary<K, V, C>
where
    K: Clone + 'static,
    V: Clone + 'static,
    C: KeyComparer<K>,
{
    /// Inserts the key-value pair if the key does not exist.
    ///
    /// Returns `false` without modifying the [`Dictionary`] if the key exists.
    ///
    /// # Examples
    ///
    /// ```
    /// use stripekv::Dictionary;
    ///
    /// let dictionary: Dictionary<&str, u32> = Dictionary::new();
    /// assert!(dictionary.try_add("k", 1));
    /// assert!(!dictionary.try_add("k", 2));
    /// assert_eq!(dictionary.get("k"), Some(1));
    /// ```
    pub fn try_add(&self, key: K, value: V) -> bool {
        let hash = self.comparer.hash(&key);
        let guard = Guard::new();
        let locker = self.lock_bucket(hash, &guard);
        if locker
            .find(hash, |k| self.comparer.equals(k, &key))
            .is_some()
        {
            return false;
        }
        locker.insert(key, value, hash);
        self.release(locker, &guard);
        true
    }

    /// Inserts the key-value pair, replacing the value if the key exists.
    ///
    /// # Examples
    ///
    /// ```
    /// use stripekv::Dictionary;
    ///
    /// let dictionary: Dictionary<&str, u32> = Dictionary::new();
    /// dictionary.set("x", 10);
    /// dictionary.set("x", 20);
    /// assert_eq!(dictionary.get("x"), Some(20));
    /// assert_eq!(dictionary.len(), 1);
    /// ```
    pub fn set(&self, key: K, value: V) {
        let hash = self.comparer.hash(&key);
        let guard = Guard::new();
        let locker = self.lock_bucket(hash, &guard);
        if let Some((link, node)) = locker.find(hash, |k| self.comparer.equals(k, &key)) {
            locker.replace(link, node, value);
            return;
        }
        locker.insert(key, value, hash);
        self.release(locker, &guard);
    }

    /// Inserts `add_value` if the key does not exist, otherwise replaces the value with the
    /// result of `updater`.
    ///
    /// Returns the value now associated with the key.
    ///
    /// # Examples
    ///
    /// ```
    /// use stripekv::Dictionary;
    ///
    /// let dictionary: Dictionary<&str, u32> = Dictionary::new();
    /// assert_eq!(dictionary.add_or_update("hits", 1, |_, v| v + 1), 1);
    /// assert_eq!(dictionary.add_or_update("hits", 1, |_, v| v + 1), 2);
    /// ```
    #[inline]
    pub fn add_or_update<U: FnOnce(&K, &V) -> V>(&self, key: K, add_value: V, updater: U) -> V {
        self.add_or_update_with(key, |_| add_value, updater)
    }

    /// Inserts the result of `constructor` if the key does not exist, otherwise replaces the
    /// value with the result of `updater`.
    ///
    /// Exactly one of the two closures is invoked, once, while the stripe lock owning the key is
    /// held. Returns the value now associated with the key.
    pub fn add_or_update_with<A, U>(&self, key: K, constructor: A, updater: U) -> V
    where
        A: FnOnce(&K) -> V,
        U: FnOnce(&K, &V) -> V,
    {
        let hash = self.comparer.hash(&key);
        let guard = Guard::new();
        let locker = self.lock_bucket(hash, &guard);
        if let Some((link, node)) = locker.find(hash, |k| self.comparer.equals(k, &key)) {
            let value = updater(&node.key, &node.value);
            locker.replace(link, node, value.clone());
            return value;
        }
        let value = constructor(&key);
        locker.insert(key, value.clone(), hash);
        self.release(locker, &guard);
        value
    }

    /// Returns the value associated with the key, inserting the result of `constructor` first if
    /// the key does not exist.
    ///
    /// # Examples
    ///
    /// ```
    /// use stripekv::Dictionary;
    ///
    /// let dictionary: Dictionary<&str, Vec<u8>> = Dictionary::new();
    /// assert!(dictionary.get_or_add_with("k", |_| vec![1]) == vec![1]);
    /// assert!(dictionary.get_or_add_with("k", |_| vec![2]) == vec![1]);
    /// ```
    pub fn get_or_add_with<A: FnOnce(&K) -> V>(&self, key: K, constructor: A) -> V {
        if let Some(value) = self.read(&key, |_, v| v.clone()) {
            return value;
        }
        let hash = self.comparer.hash(&key);
        let guard = Guard::new();
        let locker = self.lock_bucket(hash, &guard);
        if let Some((_, node)) = locker.find(hash, |k| self.comparer.equals(k, &key)) {
            return node.value.clone();
        }
        let value = constructor(&key);
        locker.insert(key, value.clone(), hash);
        self.release(locker, &guard);
        value
    }

    /// Releases the stripe lock and grows the table if the stripe exceeds its budget.
    fn release(&self, locker: Locker<'_, K, V>, guard: &Guard) {
        let snapshot = locker.snapshot();
        let exceeded = locker.stripe_len() > self.budget.load(Relaxed);
        drop(locker);
        if exceeded {
            self.grow(snapshot, guard);
        }
    }

    /// Replaces `expected` with a snapshot of roughly twice as many buckets.
    ///
    /// Nothing happens if another thread already replaced `expected`.
    fn grow(&self, expected: &Snapshot<K, V>, guard: &Guard) {
        let _locks = self.lock_all();
        let current = self.current(guard);
        if !ptr::eq(current, expected) {
            return;
        }
        let budget = self.budget.load(Relaxed);
        if (0..current.num_stripes()).all(|stripe| current.stripe_len(stripe) <= budget) {
            return;
        }

        let old_capacity = current.num_buckets();
        let new_capacity = match next_capacity(old_capacity) {
            Some(new_capacity) => new_capacity,
            None if old_capacity < MAX_BUCKETS => MAX_BUCKETS,
            None => {
                self.budget.store(usize::MAX, Relaxed);
                return;
            }
        };

        let rehashed = current.rehash(new_capacity, guard);
        self.snapshot
            .swap((Some(Shared::new(rehashed)), Tag::None), Release);
        if new_capacity == MAX_BUCKETS {
            self.budget.store(usize::MAX, Relaxed);
        } else {
            self.reset_budget(new_capacity);
        }
        debug!(old_capacity, new_capacity, "dictionary resized");
    }
}

/// Returns the next bucket count: at least double, odd, and not divisible by 3, 5 or 7.
fn next_capacity(capacity: usize) -> Option<usize> {
    let mut next = capacity.checked_mul(2)?.checked_add(1)?;
    while next % 3 == 0 || next % 5 == 0 || next % 7 == 0 {
        next = next.checked_add(2)?;
    }
    (next <= MAX_BUCKETS).then_some(next)
}

impl<K, V, C> Clone for Dictionary<K, V, C>
where
    K: Clone + 'static,
    V: Clone + 'static,
    C: Clone + KeyComparer<K>,
{
    fn clone(&self) -> Self {
        let cloned = Self::with_options(self.options(), self.comparer.clone());
        for (key, value) in self.to_vec() {
            cloned.set(key, value);
        }
        cloned
    }
}

impl<K, V, C> Debug for Dictionary<K, V, C>
where
    K: Clone + Debug + 'static,
    V: Clone + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: 'static, V: 'static, C: Default> Default for Dictionary<K, V, C> {
    /// Creates an empty [`Dictionary`] with the default [`DictionaryOptions`].
    ///
    /// # Examples
    ///
    /// ```
    /// use stripekv::Dictionary;
    ///
    /// let dictionary: Dictionary<u64, u32> = Dictionary::default();
    /// assert_eq!(dictionary.capacity(), 31);
    /// ```
    #[inline]
    fn default() -> Self {
        Self::with_options(DictionaryOptions::default(), C::default())
    }
}

impl<K, V, C> FromIterator<(K, V)> for Dictionary<K, V, C>
where
    K: Clone + 'static,
    V: Clone + 'static,
    C: Default + KeyComparer<K>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let iter = iter.into_iter();
        let capacity = iter.size_hint().0.max(DEFAULT_CAPACITY);
        let options = DictionaryOptions {
            capacity,
            ..DictionaryOptions::default()
        };
        let dictionary = Self::with_options(options, C::default());
        for (key, value) in iter {
            dictionary.set(key, value);
        }
        dictionary
    }
}

impl<K, V, C> PartialEq for Dictionary<K, V, C>
where
    K: Clone + 'static,
    V: Clone + PartialEq + 'static,
    C: KeyComparer<K>,
{
    /// Compares two [`Dictionary`] instances entry by entry, each taken under its own locks.
    fn eq(&self, other: &Self) -> bool {
        let entries = self.to_vec();
        entries.len() == other.len()
            && entries
                .iter()
                .all(|(k, v)| other.read(k, |_, o| o == v).unwrap_or(false))
    }
}

/// Weakly consistent iterator over clones of the entries of a [`Dictionary`].
pub struct Iter<K: 'static, V: 'static> {
    snapshot: Option<Shared<Snapshot<K, V>>>,
    bucket_index: usize,
    next: Option<Shared<Node<K, V>>>,
}

impl<K: Clone + 'static, V: Clone + 'static> Iterator for Iter<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        let guard = Guard::new();
        loop {
            if let Some(node) = self.next.take() {
                self.next = node.next.get_shared(Acquire, &guard);
                return Some((node.key.clone(), node.value.clone()));
            }
            let snapshot = self.snapshot.as_ref()?;
            if self.bucket_index >= snapshot.num_buckets() {
                self.snapshot = None;
                return None;
            }
            self.next = snapshot
                .bucket(self.bucket_index)
                .get_shared(Acquire, &guard);
            self.bucket_index += 1;
        }
    }
}

impl<K: Clone + 'static, V: Clone + 'static> FusedIterator for Iter<K, V> {}

impl<K: 'static, V: 'static> Debug for Iter<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Iter")
            .field("bucket_index", &self.bucket_index)
            .field("finished", &self.snapshot.is_none())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::{next_capacity, MAX_BUCKETS};

    #[test]
    fn next_capacity_skips_small_factors() {
        assert_eq!(next_capacity(31), Some(67));
        assert_eq!(next_capacity(1), Some(11));
        assert_eq!(next_capacity(67), Some(137));
        assert_eq!(next_capacity(MAX_BUCKETS), None);
    }
}
