use indexmap::IndexMap;

pub const DEFAULT_CAPACITY: usize = 1000;

/// Least-recently-used map. Index 0 is the oldest entry.
#[derive(Debug, Clone)]
pub struct LruCache<V> {
    capacity: usize,
    entries: IndexMap<String, V>,
}

impl<V> Default for LruCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl<V> LruCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: IndexMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Looks up without touching recency.
    pub fn peek(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn get(&mut self, key: &str) -> Option<&V> {
        let (key, value) = self.entries.shift_remove_entry(key)?;
        self.entries.insert(key, value);
        self.entries.last().map(|(_, value)| value)
    }

    /// Returns the evicted entry, if any. With zero capacity the value itself
    /// comes straight back.
    pub fn put(&mut self, key: String, value: V) -> Option<(String, V)> {
        if self.capacity == 0 {
            return Some((key, value));
        }
        self.entries.shift_remove(&key);
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.shift_remove_index(0)
        } else {
            None
        };
        self.entries.insert(key, value);
        evicted
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.entries.shift_remove(key)
    }

    /// Keys from oldest to newest.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}
