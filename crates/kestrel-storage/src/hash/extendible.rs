//! Extendible hash table.
//!
//! A directory of bucket references indexed by the low `global_depth` bits
//! of a key's hash. When a bucket overflows it is split in two at
//! `local_depth + 1`, doubling the directory first if the bucket was already
//! at the directory's depth. The directory only ever grows; shrinking is not
//! needed for the page table workload.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use parking_lot::Mutex;

/// A dynamically growing hash table with bounded buckets.
///
/// Lookups cost one directory probe plus a scan of at most `bucket_size`
/// entries. Inserts always succeed, splitting buckets (possibly repeatedly)
/// until the target bucket has room.
///
/// All operations serialize on a single internal latch, including the depth
/// accessors, so every observation is a consistent snapshot.
///
/// # Example
///
/// ```rust
/// use kestrel_storage::hash::ExtendibleHashTable;
///
/// let table = ExtendibleHashTable::new(4);
/// table.insert(1, "one");
/// assert_eq!(table.find(&1), Some("one"));
/// assert!(table.remove(&1));
/// ```
pub struct ExtendibleHashTable<K, V> {
    bucket_size: usize,
    state: Mutex<TableState<K, V>>,
}

struct TableState<K, V> {
    global_depth: usize,
    /// Directory slot -> index into `buckets`. Multiple slots may reference
    /// the same bucket while its local depth is below the global depth.
    dir: Vec<usize>,
    buckets: Vec<Bucket<K, V>>,
}

struct Bucket<K, V> {
    local_depth: usize,
    /// Entries in insertion order, at most `bucket_size` of them.
    entries: Vec<(K, V)>,
}

impl<K, V> Bucket<K, V> {
    fn new(local_depth: usize) -> Self {
        Self {
            local_depth,
            entries: Vec::new(),
        }
    }
}

fn hash_key<K: Hash>(key: &K) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

impl<K: Hash + Eq, V: Clone> ExtendibleHashTable<K, V> {
    /// Creates a table whose buckets hold at most `bucket_size` entries.
    pub fn new(bucket_size: usize) -> Self {
        assert!(bucket_size > 0, "bucket_size must be > 0");
        Self {
            bucket_size,
            state: Mutex::new(TableState {
                global_depth: 0,
                dir: vec![0],
                buckets: vec![Bucket::new(0)],
            }),
        }
    }

    /// Returns the value stored under `key`, if any.
    pub fn find(&self, key: &K) -> Option<V> {
        let state = self.state.lock();
        let bucket = &state.buckets[state.dir[state.dir_index(key)]];
        bucket
            .entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    /// Removes the entry for `key`, returning whether it was present.
    pub fn remove(&self, key: &K) -> bool {
        let state = &mut *self.state.lock();
        let bucket_index = state.dir[state.dir_index(key)];
        let bucket = &mut state.buckets[bucket_index];
        match bucket.entries.iter().position(|(k, _)| k == key) {
            Some(pos) => {
                bucket.entries.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Inserts `key -> value`, overwriting any existing entry for the key.
    ///
    /// Never fails: a full target bucket is split (and the directory doubled
    /// when the bucket already sits at the global depth) until the insert
    /// fits. The loop tolerates the degenerate case where every entry of a
    /// split bucket lands on the same side.
    pub fn insert(&self, key: K, value: V) {
        let state = &mut *self.state.lock();

        // Overwrite in place if the key is already present.
        let bucket_index = state.dir[state.dir_index(&key)];
        if let Some(entry) = state.buckets[bucket_index]
            .entries
            .iter_mut()
            .find(|(k, _)| *k == key)
        {
            entry.1 = value;
            return;
        }

        while state.buckets[state.dir[state.dir_index(&key)]].entries.len() >= self.bucket_size {
            let bucket_index = state.dir[state.dir_index(&key)];

            if state.buckets[bucket_index].local_depth == state.global_depth {
                state.double_directory();
            }
            state.split_bucket(bucket_index);
        }

        let bucket_index = state.dir[state.dir_index(&key)];
        state.buckets[bucket_index].entries.push((key, value));
    }

    /// Current global depth of the directory.
    pub fn global_depth(&self) -> usize {
        self.state.lock().global_depth
    }

    /// Local depth of the bucket referenced by directory slot `dir_index`.
    pub fn local_depth(&self, dir_index: usize) -> usize {
        let state = self.state.lock();
        state.buckets[state.dir[dir_index]].local_depth
    }

    /// Number of distinct buckets.
    pub fn num_buckets(&self) -> usize {
        self.state.lock().buckets.len()
    }
}

impl<K: Hash + Eq, V> TableState<K, V> {
    fn dir_index(&self, key: &K) -> usize {
        let mask = (1u64 << self.global_depth) - 1;
        (hash_key(key) & mask) as usize
    }

    /// Doubles the directory by appending a copy of itself, so the new upper
    /// half aliases the same buckets as the lower half.
    fn double_directory(&mut self) {
        let old_size = self.dir.len();
        for i in 0..old_size {
            let target = self.dir[i];
            self.dir.push(target);
        }
        self.global_depth += 1;
    }

    /// Splits the bucket at `bucket_index` into two buckets at
    /// `local_depth + 1`, redistributing its entries by the hash bit at the
    /// old local depth and rewriting every directory slot that referenced it.
    fn split_bucket(&mut self, bucket_index: usize) {
        let local_depth = self.buckets[bucket_index].local_depth;
        let split_bit = 1u64 << local_depth;

        let entries = std::mem::take(&mut self.buckets[bucket_index].entries);
        self.buckets[bucket_index] = Bucket::new(local_depth + 1);
        self.buckets.push(Bucket::new(local_depth + 1));
        let zero_index = bucket_index;
        let one_index = self.buckets.len() - 1;

        for (key, value) in entries {
            let target = if hash_key(&key) & split_bit != 0 {
                one_index
            } else {
                zero_index
            };
            self.buckets[target].entries.push((key, value));
        }

        for (slot, target) in self.dir.iter_mut().enumerate() {
            if *target == zero_index {
                *target = if slot as u64 & split_bit != 0 {
                    one_index
                } else {
                    zero_index
                };
            }
        }
    }
}

impl<K, V> std::fmt::Debug for ExtendibleHashTable<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ExtendibleHashTable")
            .field("bucket_size", &self.bucket_size)
            .field("global_depth", &state.global_depth)
            .field("num_buckets", &state.buckets.len())
            .finish()
    }
}
