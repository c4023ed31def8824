mod dictionary {
    use std::collections::BTreeSet;
    use std::rc::Rc;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering::Relaxed;
    use std::sync::{Arc, Barrier};
    use std::thread;

    use proptest::prelude::*;
    use sdd::Guard;

    use crate::{CaseInsensitive, DefaultComparer, Dictionary, DictionaryOptions, Store};

    static_assertions::assert_impl_all!(Dictionary<String, String>: Send, Sync);
    static_assertions::assert_impl_all!(Dictionary<String, String, CaseInsensitive>: Send, Sync);
    static_assertions::assert_not_impl_any!(Dictionary<Rc<String>, Rc<String>>: Send, Sync);
    static_assertions::assert_not_impl_any!(Dictionary<String, *const String>: Send, Sync);
    static_assertions::assert_impl_all!(Store: Send, Sync);

    struct R(&'static AtomicUsize);
    impl R {
        fn new(cnt: &'static AtomicUsize) -> R {
            cnt.fetch_add(1, Relaxed);
            R(cnt)
        }
    }
    impl Clone for R {
        fn clone(&self) -> Self {
            self.0.fetch_add(1, Relaxed);
            R(self.0)
        }
    }
    impl Drop for R {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Relaxed);
        }
    }

    fn wait_for_reclamation(cnt: &AtomicUsize) {
        while cnt.load(Relaxed) != 0 {
            Guard::new().accelerate();
            thread::yield_now();
        }
    }

    fn striped(concurrency_level: usize, capacity: usize) -> Dictionary<u64, u64> {
        Dictionary::with_options(
            DictionaryOptions {
                concurrency_level,
                capacity,
            },
            DefaultComparer::new(),
        )
    }

    #[test]
    fn insert_and_get() {
        let dictionary: Dictionary<&str, i32> = Dictionary::new();
        assert!(dictionary.try_add("a", 1));
        assert!(dictionary.try_add("b", 2));
        assert_eq!(dictionary.len(), 2);
        assert_eq!(dictionary.get("a"), Some(1));
        assert!(dictionary.get("c").is_none());
    }

    #[test]
    fn set_replaces() {
        let dictionary: Dictionary<&str, i32> = Dictionary::new();
        dictionary.set("x", 10);
        dictionary.set("x", 20);
        assert_eq!(dictionary.get("x"), Some(20));
        assert_eq!(dictionary.len(), 1);
    }

    #[test]
    fn try_add_keeps_existing() {
        let dictionary: Dictionary<&str, i32> = Dictionary::new();
        assert!(dictionary.try_add("k", 1));
        assert!(!dictionary.try_add("k", 2));
        assert_eq!(dictionary.get("k"), Some(1));
    }

    #[test]
    fn remove_from_chain() {
        let dictionary = striped(1, 1);
        for k in 0..8 {
            dictionary.set(k, k * 10);
        }
        assert_eq!(dictionary.try_remove(&3), Some(30));
        assert_eq!(dictionary.try_remove(&3), None);
        assert_eq!(dictionary.len(), 7);
        for k in (0..8).filter(|k| *k != 3) {
            assert_eq!(dictionary.get(&k), Some(k * 10));
        }
    }

    #[test]
    fn add_or_update_with_invokes_once() {
        let dictionary: Dictionary<u64, u64> = Dictionary::new();
        let mut calls = 0;
        let value = dictionary.add_or_update_with(
            1,
            |_| {
                calls += 1;
                5
            },
            |_, _| unreachable!(),
        );
        assert_eq!((value, calls), (5, 1));

        let value = dictionary.add_or_update_with(
            1,
            |_| unreachable!(),
            |k, v| {
                calls += 1;
                k + v
            },
        );
        assert_eq!((value, calls), (6, 2));
        assert_eq!(dictionary.get(&1), Some(6));
    }

    #[test]
    fn get_or_add_with() {
        let dictionary: Dictionary<String, Vec<u8>> = Dictionary::new();
        assert_eq!(dictionary.get_or_add_with("a".into(), |k| k.as_bytes().to_vec()), b"a");
        assert_eq!(dictionary.get_or_add_with("a".into(), |_| unreachable!()), b"a");
        assert_eq!(dictionary.len(), 1);
    }

    #[test]
    fn case_insensitive_keys() {
        let dictionary: Dictionary<String, u32, CaseInsensitive> =
            Dictionary::with_comparer(CaseInsensitive::new());
        dictionary.set("Straße".to_owned(), 1);
        dictionary.set("STRASSE".to_owned(), 2);
        dictionary.set("hello".to_owned(), 3);
        assert_eq!(dictionary.get("HELLO"), Some(3));
        assert_eq!(dictionary.get("strasse"), Some(2));
        assert!(!dictionary.try_add("Hello".to_owned(), 4));
        assert_eq!(dictionary.try_remove("hElLo"), Some(3));
        assert_eq!(dictionary.len(), 1);
    }

    #[test]
    fn resize_keeps_entries() {
        let dictionary = striped(4, 3);
        let workload_size = 4096;
        for k in 0..workload_size {
            assert!(dictionary.try_add(k, k));
        }
        assert!(dictionary.capacity() > 3);
        assert_eq!(dictionary.len(), workload_size as usize);
        for k in 0..workload_size {
            assert_eq!(dictionary.get(&k), Some(k));
        }
        assert_eq!(dictionary.approximate_len(), workload_size as usize);
        assert_eq!(dictionary.concurrency_level(), 4);
    }

    #[test]
    fn clear_and_drain() {
        let dictionary = striped(2, 5);
        for k in 0..100 {
            dictionary.set(k, k);
        }
        let grown = dictionary.capacity();
        assert!(grown > 5);

        let mut drained = dictionary.drain_to_vec();
        drained.sort_unstable();
        assert_eq!(drained, (0..100).map(|k| (k, k)).collect::<Vec<_>>());
        assert!(dictionary.is_empty());
        assert!(!dictionary.has_entries());
        assert_eq!(dictionary.capacity(), 5);

        dictionary.set(1, 1);
        assert!(dictionary.has_entries());
        dictionary.clear();
        assert!(dictionary.is_empty());
        assert!(dictionary.drain_to_vec().is_empty());
    }

    #[test]
    fn iter_scan_keys_values() {
        let dictionary: Dictionary<u64, u64> = (0..64).map(|k| (k, k * 2)).collect();
        assert_eq!(dictionary.iter().count(), 64);
        assert_eq!(dictionary.keys().collect::<BTreeSet<_>>(), (0..64).collect());
        assert_eq!(dictionary.values().sum::<u64>(), (0..64).map(|k| k * 2).sum());

        let mut scanned = 0;
        dictionary.scan(|k, v| {
            assert_eq!(*v, k * 2);
            scanned += 1;
        });
        assert_eq!(scanned, 64);

        let mut iter = dictionary.iter();
        dictionary.clear();
        assert_eq!(iter.by_ref().count(), 64);
        assert!(iter.next().is_none());
    }

    #[test]
    fn clone_debug_eq() {
        let dictionary: Dictionary<u64, u64> = Dictionary::new();
        dictionary.set(7, 8);
        let cloned = dictionary.clone();
        assert_eq!(cloned, dictionary);
        assert_eq!(format!("{dictionary:?}"), "{7: 8}");

        cloned.set(7, 9);
        assert_ne!(cloned, dictionary);
        cloned.set(8, 8);
        dictionary.set(8, 8);
        assert_ne!(cloned, dictionary);
    }

    #[test]
    fn minimum_options() {
        let dictionary = striped(0, 0);
        assert_eq!(dictionary.concurrency_level(), 1);
        assert_eq!(dictionary.capacity(), 1);
        for k in 0..16 {
            dictionary.set(k, k);
        }
        assert_eq!(dictionary.len(), 16);
    }

    #[test]
    fn insert_drop() {
        static INST_CNT: AtomicUsize = AtomicUsize::new(0);

        let dictionary: Dictionary<usize, R> = Dictionary::with_capacity(4);
        let workload_size = 256;
        for k in 0..workload_size {
            assert!(dictionary.try_add(k, R::new(&INST_CNT)));
        }
        for k in 0..workload_size / 2 {
            dictionary.set(k, R::new(&INST_CNT));
        }
        assert_eq!(dictionary.len(), workload_size);
        drop(dictionary);
        wait_for_reclamation(&INST_CNT);
    }

    #[test]
    fn clear_drop() {
        static INST_CNT: AtomicUsize = AtomicUsize::new(0);

        let dictionary: Dictionary<usize, R> = Dictionary::new();
        for k in 0..64 {
            dictionary.set(k, R::new(&INST_CNT));
        }
        let drained = dictionary.drain_to_vec();
        assert_eq!(drained.len(), 64);
        drop(drained);
        assert!(dictionary.try_remove(&0).is_none());
        wait_for_reclamation(&INST_CNT);
        drop(dictionary);
    }

    #[test]
    fn add_or_update_no_lost_updates() {
        let num_threads = 8;
        let num_iters = 4096;
        let dictionary: Arc<Dictionary<u64, u64>> = Arc::new(striped(4, 3));
        let barrier = Arc::new(Barrier::new(num_threads));
        let mut thread_handles = Vec::with_capacity(num_threads);
        for thread_id in 0..num_threads {
            let dictionary = dictionary.clone();
            let barrier = barrier.clone();
            thread_handles.push(thread::spawn(move || {
                barrier.wait();
                for i in 0..num_iters {
                    dictionary.add_or_update(0, 1, |_, v| v + 1);
                    dictionary.set(thread_id as u64 * num_iters + i + 1, i);
                }
            }));
        }
        for handle in thread_handles {
            handle.join().unwrap();
        }
        assert_eq!(dictionary.get(&0), Some(num_threads as u64 * num_iters));
        assert_eq!(dictionary.len(), num_threads * num_iters as usize + 1);
    }

    #[test]
    fn to_vec_while_writing() {
        let num_threads = 4;
        let workload_size = 2048_u64;
        let dictionary: Arc<Dictionary<u64, u64>> = Arc::new(striped(8, 7));
        let barrier = Arc::new(Barrier::new(num_threads + 1));
        let mut thread_handles = Vec::with_capacity(num_threads);
        for thread_id in 0..num_threads as u64 {
            let dictionary = dictionary.clone();
            let barrier = barrier.clone();
            thread_handles.push(thread::spawn(move || {
                barrier.wait();
                let base = thread_id * workload_size;
                for k in base..base + workload_size {
                    dictionary.set(k, k);
                    if k % 3 == 0 {
                        assert_eq!(dictionary.try_remove(&k), Some(k));
                    }
                }
            }));
        }

        barrier.wait();
        for _ in 0..16 {
            let entries = dictionary.to_vec();
            let keys: BTreeSet<u64> = entries.iter().map(|(k, _)| *k).collect();
            assert_eq!(keys.len(), entries.len());
            assert!(entries.iter().all(|(k, v)| k == v));
        }
        for handle in thread_handles {
            handle.join().unwrap();
        }

        let expected = (0..num_threads as u64 * workload_size)
            .filter(|k| k % 3 != 0)
            .count();
        assert_eq!(dictionary.len(), expected);
        assert_eq!(dictionary.to_vec().len(), expected);
    }

    #[test]
    fn concurrent_readers_during_growth() {
        let dictionary: Arc<Dictionary<u64, u64>> = Arc::new(striped(2, 1));
        for k in 0..64 {
            dictionary.set(k, k);
        }
        let barrier = Arc::new(Barrier::new(2));
        let reader = {
            let dictionary = dictionary.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..64 {
                    for k in 0..64 {
                        assert_eq!(dictionary.get(&k), Some(k));
                    }
                }
            })
        };
        barrier.wait();
        for k in 64..16_384 {
            dictionary.set(k, k);
        }
        reader.join().unwrap();
        assert_eq!(dictionary.len(), 16_384);
    }

    #[test]
    fn drain_while_writing() {
        let num_threads = 4;
        let workload_size = 4096_u64;
        let dictionary: Arc<Dictionary<u64, u64>> = Arc::new(striped(3, 7));
        let barrier = Arc::new(Barrier::new(num_threads + 1));
        let mut handles = Vec::with_capacity(num_threads);
        for t in 0..num_threads as u64 {
            let dictionary = dictionary.clone();
            let barrier = barrier.clone();
            handles.push(thread::spawn(move || {
                barrier.wait();
                for k in t * workload_size..(t + 1) * workload_size {
                    assert!(dictionary.try_add(k, k));
                }
            }));
        }
        barrier.wait();
        let mut drained = Vec::new();
        while handles.iter().any(|h| !h.is_finished()) {
            drained.extend(dictionary.drain_to_vec());
        }
        for handle in handles {
            handle.join().unwrap();
        }
        drained.extend(dictionary.to_vec());

        let total = num_threads * workload_size as usize;
        assert_eq!(drained.len(), total);
        assert!(drained.iter().all(|(k, v)| k == v));
        let keys: BTreeSet<u64> = drained.into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys.len(), total);
        assert_eq!(keys, (0..num_threads as u64 * workload_size).collect());
    }

    #[test]
    fn random_ops_disjoint_ranges() {
        let num_threads = 4;
        let dictionary: Arc<Dictionary<u64, u64>> = Arc::new(striped(3, 7));
        let barrier = Arc::new(Barrier::new(num_threads));
        let mut handles = Vec::with_capacity(num_threads);
        for t in 0..num_threads as u64 {
            let dictionary = dictionary.clone();
            let barrier = barrier.clone();
            handles.push(thread::spawn(move || {
                let mut model = std::collections::HashMap::new();
                barrier.wait();
                for _ in 0..4096 {
                    let key = t * 1024 + u64::from(rand::random::<u16>() % 256);
                    let value = rand::random::<u64>();
                    match rand::random::<u8>() % 4 {
                        0 => {
                            assert_eq!(dictionary.try_add(key, value), !model.contains_key(&key));
                            model.entry(key).or_insert(value);
                        }
                        1 => {
                            dictionary.set(key, value);
                            model.insert(key, value);
                        }
                        2 => assert_eq!(dictionary.try_remove(&key), model.remove(&key)),
                        _ => assert_eq!(dictionary.get(&key), model.get(&key).copied()),
                    }
                }
                model
            }));
        }
        let mut expected = 0;
        for handle in handles {
            let model = handle.join().unwrap();
            expected += model.len();
            for (k, v) in model {
                assert_eq!(dictionary.get(&k), Some(v));
            }
        }
        assert_eq!(dictionary.len(), expected);
        assert_eq!(dictionary.approximate_len(), expected);
    }

    proptest! {
        #[test]
        fn unique_keys(ops in prop::collection::vec((0_u8..3, 0_u64..32, any::<u64>()), 0..256)) {
            let dictionary = striped(3, 2);
            let mut model = std::collections::HashMap::new();
            for (op, key, value) in ops {
                match op {
                    0 => {
                        dictionary.set(key, value);
                        model.insert(key, value);
                    }
                    1 => {
                        let added = dictionary.try_add(key, value);
                        prop_assert_eq!(added, !model.contains_key(&key));
                        model.entry(key).or_insert(value);
                    }
                    _ => {
                        prop_assert_eq!(dictionary.try_remove(&key), model.remove(&key));
                    }
                }
            }
            let mut entries = dictionary.to_vec();
            entries.sort_unstable();
            let mut expected: Vec<_> = model.into_iter().collect();
            expected.sort_unstable();
            prop_assert_eq!(entries, expected);
        }
    }
}

mod codec {
    use proptest::prelude::*;

    use crate::{
        Codec, Decimal, OffsetTimestamp, TimeSpan, Timestamp, TimestampKind, Value,
    };

    static_assertions::assert_impl_all!(Codec: Send, Sync);

    fn scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            Just(Value::Empty),
            Just(Value::DbNull),
            any::<bool>().prop_map(Value::Bool),
            any::<i8>().prop_map(Value::I8),
            any::<u8>().prop_map(Value::U8),
            any::<i16>().prop_map(Value::I16),
            any::<u16>().prop_map(Value::U16),
            any::<i32>().prop_map(Value::I32),
            any::<u32>().prop_map(Value::U32),
            any::<i64>().prop_map(Value::I64),
            any::<u64>().prop_map(Value::U64),
            any::<f32>().prop_map(Value::F32),
            any::<f64>().prop_map(Value::F64),
            any::<char>().prop_map(Value::Char),
            (any::<u32>(), any::<u32>(), any::<u32>(), any::<bool>(), 0_u32..=28).prop_map(
                |(lo, mid, hi, negative, scale)| {
                    Value::Decimal(Decimal::from_parts(lo, mid, hi, negative, scale).unwrap())
                }
            ),
            (any::<i64>(), 0_u8..3).prop_map(|(ticks, kind)| {
                let kind = match kind {
                    0 => TimestampKind::Unspecified,
                    1 => TimestampKind::Utc,
                    _ => TimestampKind::Local,
                };
                Value::Timestamp(Timestamp::new(ticks, kind))
            }),
            any::<i64>().prop_map(|t| Value::TimeSpan(TimeSpan(t))),
            (any::<i64>(), any::<i64>())
                .prop_map(|(t, o)| Value::OffsetTimestamp(OffsetTimestamp::new(t, TimeSpan(o)))),
            any::<u128>().prop_map(|g| Value::Guid(uuid::Uuid::from_u128(g))),
            any::<i64>().prop_map(Value::NativeInt),
            any::<u64>().prop_map(Value::NativeUInt),
            ".{0,300}".prop_map(Value::String),
            prop::collection::vec(any::<u8>(), 0..64).prop_map(Value::Bytes),
        ]
    }

    fn value() -> impl Strategy<Value = Value> {
        scalar().prop_recursive(3, 32, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::List),
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Sequence),
                prop::collection::vec(("[a-z]{0,8}", inner.clone()), 0..4)
                    .prop_map(Value::StringMap),
                prop::collection::vec((any::<i64>().prop_map(Value::I64), inner), 0..4)
                    .prop_map(Value::Map),
            ]
        })
    }

    proptest! {
        #[test]
        fn round_trip(value in value()) {
            let codec = Codec::new();
            let bytes = codec.encode_to_vec(&value).unwrap();
            prop_assert_eq!(codec.decode_slice(&bytes), Some(value));
        }

        #[test]
        fn truncation_is_not_read(value in value()) {
            let codec = Codec::new();
            let bytes = codec.encode_to_vec(&value).unwrap();
            for len in 0..bytes.len() {
                prop_assert_eq!(codec.decode_slice(&bytes[..len]), None);
            }
        }

        #[test]
        fn arbitrary_bytes_do_not_panic(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
            let _ = Codec::new().decode_slice(&bytes);
        }
    }

    #[test]
    fn consecutive_values() {
        let codec = Codec::new();
        let mut bytes = Vec::new();
        for i in [0, 1, -1, 127, -32_768, 1_000_000] {
            codec.write(&mut bytes, &Value::I32(i)).unwrap();
        }
        let mut reader = bytes.as_slice();
        let mut decoded = Vec::new();
        while let Some(value) = codec.try_read(&mut reader) {
            decoded.push(value);
        }
        assert_eq!(
            decoded,
            [0, 1, -1, 127, -32_768, 1_000_000].map(Value::I32).to_vec()
        );
    }
}
