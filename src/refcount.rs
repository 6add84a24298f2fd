use std::collections::HashMap;

use indexmap::IndexMap;

/// Outcome of a reference count change.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition<T> {
    /// Count went from zero to one.
    Added,
    /// Count dropped to zero; carries the payload if one was stored.
    Removed(Option<T>),
    Unchanged,
}

/// Counts references per name in first-insertion order. A payload can be
/// attached on the insertion that brings a name into existence.
#[derive(Debug, Clone)]
pub struct RefCounter<T = ()> {
    counts: IndexMap<String, usize>,
    payloads: HashMap<String, T>,
}

impl<T> Default for RefCounter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RefCounter<T> {
    pub fn new() -> Self {
        Self {
            counts: IndexMap::new(),
            payloads: HashMap::new(),
        }
    }

    pub fn insert(&mut self, name: &str, payload: Option<T>) -> Transition<T> {
        if let Some(count) = self.counts.get_mut(name) {
            *count += 1;
            return Transition::Unchanged;
        }
        self.counts.insert(name.to_string(), 1);
        if let Some(payload) = payload {
            self.payloads.insert(name.to_string(), payload);
        }
        Transition::Added
    }

    /// Panics if `name` has no references; that is a caller bookkeeping bug.
    pub fn delete(&mut self, name: &str) -> Transition<T> {
        let Some(count) = self.counts.get_mut(name) else {
            panic!("reference count of '{name}' would drop below zero");
        };
        *count -= 1;
        if *count > 0 {
            return Transition::Unchanged;
        }
        self.counts.shift_remove(name);
        Transition::Removed(self.payloads.remove(name))
    }

    pub fn count(&self, name: &str) -> usize {
        self.counts.get(name).copied().unwrap_or(0)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.counts.contains_key(name)
    }

    pub fn payload(&self, name: &str) -> Option<&T> {
        self.payloads.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.counts.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
