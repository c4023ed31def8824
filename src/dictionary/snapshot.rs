//! [`Snapshot`] is one generation of the bucket array together with its per-stripe counters.

use parking_lot::MutexGuard;
use sdd::{AtomicShared, Guard, Shared, Tag};
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};

/// [`Node`] is an immutable key-value pair linked into a bucket chain.
///
/// Only `next` changes after a node is published, and only under the stripe lock owning the
/// bucket.
pub(crate) struct Node<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) hash: u64,
    pub(crate) next: AtomicShared<Node<K, V>>,
}

/// [`Snapshot`] owns the buckets and the number of entries guarded by each stripe lock.
///
/// A [`Snapshot`] is never resized in place; growing or clearing the dictionary publishes a new
/// one while all the stripe locks are held.
pub(crate) struct Snapshot<K, V> {
    buckets: Box<[AtomicShared<Node<K, V>>]>,
    counts: Box<[AtomicUsize]>,
}

impl<K: 'static, V: 'static> Snapshot<K, V> {
    /// Creates an empty [`Snapshot`].
    pub(crate) fn new(num_buckets: usize, num_stripes: usize) -> Self {
        Self {
            buckets: std::iter::repeat_with(AtomicShared::null)
                .take(num_buckets.max(1))
                .collect(),
            counts: std::iter::repeat_with(|| AtomicUsize::new(0))
                .take(num_stripes.max(1))
                .collect(),
        }
    }

    /// Returns the number of buckets.
    #[inline]
    pub(crate) fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Returns the number of stripes.
    #[inline]
    pub(crate) fn num_stripes(&self) -> usize {
        self.counts.len()
    }

    /// Calculates the bucket index for the hash value.
    #[allow(clippy::cast_possible_truncation)] // The remainder is below `num_buckets`.
    #[inline]
    pub(crate) fn bucket_index(&self, hash: u64) -> usize {
        (hash % self.buckets.len() as u64) as usize
    }

    /// Returns the stripe owning the bucket.
    #[inline]
    pub(crate) fn stripe_index(&self, bucket_index: usize) -> usize {
        bucket_index % self.counts.len()
    }

    /// Returns a reference to the bucket head.
    #[inline]
    pub(crate) fn bucket(&self, index: usize) -> &AtomicShared<Node<K, V>> {
        &self.buckets[index]
    }

    /// Returns the number of entries recorded for the stripe.
    #[inline]
    pub(crate) fn stripe_len(&self, stripe: usize) -> usize {
        self.counts[stripe].load(Relaxed)
    }

    /// Sums the counters.
    ///
    /// The result is exact only while every stripe lock is held.
    pub(crate) fn total_len(&self) -> usize {
        self.counts.iter().map(|c| c.load(Relaxed)).sum()
    }

    /// Finds the node satisfying `matches` in the bucket chain along with the link pointing to it.
    ///
    /// It does not acquire any lock, therefore the result may be stale by the time it is used
    /// unless the stripe lock is held.
    pub(crate) fn find<'g, F: FnMut(&K) -> bool>(
        &'g self,
        bucket_index: usize,
        hash: u64,
        mut matches: F,
        guard: &'g Guard,
    ) -> Option<(&'g AtomicShared<Node<K, V>>, &'g Node<K, V>)> {
        let mut link = &self.buckets[bucket_index];
        loop {
            let node = link.load(Acquire, guard).as_ref()?;
            if node.hash == hash && matches(&node.key) {
                return Some((link, node));
            }
            link = &node.next;
        }
    }

    /// Invokes `f` for every entry without acquiring any lock.
    pub(crate) fn for_each<F: FnMut(&K, &V)>(&self, guard: &Guard, mut f: F) {
        self.for_each_node(guard, |node| f(&node.key, &node.value));
    }

    /// Builds a new [`Snapshot`] with `num_buckets` buckets containing copies of every node.
    ///
    /// The caller must hold every stripe lock.
    pub(crate) fn rehash(&self, num_buckets: usize, guard: &Guard) -> Self
    where
        K: Clone,
        V: Clone,
    {
        let rehashed = Self::new(num_buckets, self.num_stripes());
        self.for_each_node(guard, |node| {
            let index = rehashed.bucket_index(node.hash);
            rehashed.prepend(
                index,
                node.key.clone(),
                node.value.clone(),
                node.hash,
                guard,
            );
            rehashed.counts[rehashed.stripe_index(index)].fetch_add(1, Relaxed);
        });
        rehashed
    }

    fn for_each_node<F: FnMut(&Node<K, V>)>(&self, guard: &Guard, mut f: F) {
        for bucket in self.buckets.iter() {
            let mut node_ptr = bucket.load(Acquire, guard);
            while let Some(node) = node_ptr.as_ref() {
                f(node);
                node_ptr = node.next.load(Acquire, guard);
            }
        }
    }

    fn prepend(&self, bucket_index: usize, key: K, value: V, hash: u64, guard: &Guard) {
        let bucket = &self.buckets[bucket_index];
        let node = Shared::new(Node {
            key,
            value,
            hash,
            next: link_to(bucket.get_shared(Acquire, guard)),
        });
        bucket.swap((Some(node), Tag::None), Release);
    }
}

/// [`Locker`] holds the stripe lock owning a bucket of the current [`Snapshot`].
///
/// The [`Snapshot`] cannot be replaced while a [`Locker`] is alive, since replacing it requires
/// every stripe lock.
pub(crate) struct Locker<'g, K, V> {
    _lock: MutexGuard<'g, ()>,
    snapshot: &'g Snapshot<K, V>,
    bucket_index: usize,
    stripe: usize,
    guard: &'g Guard,
}

impl<'g, K: 'static, V: 'static> Locker<'g, K, V> {
    /// Creates a [`Locker`] from an acquired lock that is known to own the bucket.
    pub(crate) fn new(
        lock: MutexGuard<'g, ()>,
        snapshot: &'g Snapshot<K, V>,
        bucket_index: usize,
        guard: &'g Guard,
    ) -> Self {
        Self {
            _lock: lock,
            snapshot,
            bucket_index,
            stripe: snapshot.stripe_index(bucket_index),
            guard,
        }
    }

    /// Returns the locked [`Snapshot`].
    #[inline]
    pub(crate) fn snapshot(&self) -> &'g Snapshot<K, V> {
        self.snapshot
    }

    /// Returns the number of entries guarded by the lock.
    #[inline]
    pub(crate) fn stripe_len(&self) -> usize {
        self.snapshot.stripe_len(self.stripe)
    }

    /// Finds the node satisfying `matches` in the locked bucket.
    #[inline]
    pub(crate) fn find<F: FnMut(&K) -> bool>(
        &self,
        hash: u64,
        matches: F,
    ) -> Option<(&'g AtomicShared<Node<K, V>>, &'g Node<K, V>)> {
        self.snapshot
            .find(self.bucket_index, hash, matches, self.guard)
    }

    /// Links a new node at the head of the bucket.
    pub(crate) fn insert(&self, key: K, value: V, hash: u64) {
        self.snapshot
            .prepend(self.bucket_index, key, value, hash, self.guard);
        self.snapshot.counts[self.stripe].fetch_add(1, Relaxed);
    }

    /// Replaces `node`, reached through `link`, with a new node holding `value`.
    pub(crate) fn replace(&self, link: &AtomicShared<Node<K, V>>, node: &Node<K, V>, value: V)
    where
        K: Clone,
    {
        let replacement = Shared::new(Node {
            key: node.key.clone(),
            value,
            hash: node.hash,
            next: link_to(node.next.get_shared(Acquire, self.guard)),
        });
        link.swap((Some(replacement), Tag::None), Release);
    }

    /// Unlinks `node`, reached through `link`, from the bucket chain.
    pub(crate) fn remove(&self, link: &AtomicShared<Node<K, V>>, node: &Node<K, V>) {
        link.swap((node.next.get_shared(Acquire, self.guard), Tag::None), Release);
        self.snapshot.counts[self.stripe].fetch_sub(1, Relaxed);
    }
}

fn link_to<K, V>(node: Option<Shared<Node<K, V>>>) -> AtomicShared<Node<K, V>> {
    node.map_or_else(AtomicShared::null, AtomicShared::from)
}
