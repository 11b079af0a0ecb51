//! A bidirectional multi-map with a restricted key set.

use spnr_common::{internal_ensure, SpnrResult};
use std::collections::{BTreeMap, BTreeSet};

/// Maps each key to a set of values and each value back to its keys.
///
/// Only keys declared at construction may be used. The forward and inverse
/// maps are kept in lock step: `inverse[v]` contains `k` exactly when
/// `forward[k]` contains `v`. The invariant is re-checked after every
/// mutation in debug builds.
#[derive(Clone, Debug)]
pub struct BiMultiMap<K: Ord + Clone, V: Ord + Clone> {
    keys: BTreeSet<K>,
    forward: BTreeMap<K, BTreeSet<V>>,
    inverse: BTreeMap<V, BTreeSet<K>>,
}

impl<K: Ord + Clone, V: Ord + Clone> BiMultiMap<K, V> {
    /// Creates an empty map accepting only `keys`.
    pub fn new(keys: impl IntoIterator<Item = K>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
            forward: BTreeMap::new(),
            inverse: BTreeMap::new(),
        }
    }

    /// The declared key set.
    pub fn valid_keys(&self) -> &BTreeSet<K> {
        &self.keys
    }

    /// Returns `true` if `key` was declared.
    pub fn is_valid_key(&self, key: &K) -> bool {
        self.keys.contains(key)
    }

    /// Associates `value` with `key`. Fails if `key` was not declared.
    pub fn insert(&mut self, key: K, value: V) -> SpnrResult<()> {
        internal_ensure!(self.keys.contains(&key), "insert into undeclared port");
        self.forward
            .entry(key.clone())
            .or_default()
            .insert(value.clone());
        self.inverse.entry(value).or_default().insert(key);
        debug_assert!(self.is_consistent());
        Ok(())
    }

    /// Removes one `key -> value` association. Returns whether it existed.
    pub fn remove(&mut self, key: &K, value: &V) -> bool {
        let removed = match self.forward.get_mut(key) {
            Some(values) => values.remove(value),
            None => false,
        };
        if removed {
            if self.forward.get(key).is_some_and(BTreeSet::is_empty) {
                self.forward.remove(key);
            }
            if let Some(keys) = self.inverse.get_mut(value) {
                keys.remove(key);
                if keys.is_empty() {
                    self.inverse.remove(value);
                }
            }
        }
        debug_assert!(self.is_consistent());
        removed
    }

    /// Values associated with `key`.
    pub fn get(&self, key: &K) -> impl Iterator<Item = &V> {
        self.forward.get(key).into_iter().flatten()
    }

    /// Keys associated with `value`.
    pub fn keys_of(&self, value: &V) -> impl Iterator<Item = &K> {
        self.inverse.get(value).into_iter().flatten()
    }

    /// Returns `true` if `key` has at least one value.
    pub fn contains_key(&self, key: &K) -> bool {
        self.forward.contains_key(key)
    }

    /// All `(key, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.forward
            .iter()
            .flat_map(|(k, vs)| vs.iter().map(move |v| (k, v)))
    }

    /// Number of `(key, value)` pairs.
    pub fn len(&self) -> usize {
        self.forward.values().map(BTreeSet::len).sum()
    }

    /// Returns `true` if no pairs are stored.
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Rebuilds the map with every value transformed by `f`, stopping at the
    /// first failure.
    pub fn try_map_values<W: Ord + Clone>(
        &self,
        mut f: impl FnMut(&V) -> SpnrResult<W>,
    ) -> SpnrResult<BiMultiMap<K, W>> {
        let mut out = BiMultiMap::new(self.keys.iter().cloned());
        for (k, v) in self.iter() {
            out.insert(k.clone(), f(v)?)?;
        }
        Ok(out)
    }

    fn is_consistent(&self) -> bool {
        let forward_ok = self.forward.iter().all(|(k, vs)| {
            self.keys.contains(k)
                && !vs.is_empty()
                && vs
                    .iter()
                    .all(|v| self.inverse.get(v).is_some_and(|ks| ks.contains(k)))
        });
        let inverse_ok = self.inverse.iter().all(|(v, ks)| {
            !ks.is_empty()
                && ks
                    .iter()
                    .all(|k| self.forward.get(k).is_some_and(|vs| vs.contains(v)))
        });
        forward_ok && inverse_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map() -> BiMultiMap<&'static str, u32> {
        BiMultiMap::new(["a", "b"])
    }

    #[test]
    fn insert_and_lookup_both_ways() {
        let mut m = map();
        m.insert("a", 1).unwrap();
        m.insert("a", 2).unwrap();
        m.insert("b", 1).unwrap();
        assert_eq!(m.get(&"a").copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(m.keys_of(&1).copied().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(m.len(), 3);
        assert!(m.is_consistent());
    }

    #[test]
    fn undeclared_key_rejected() {
        let mut m = map();
        assert!(m.insert("z", 1).is_err());
        assert!(m.is_empty());
    }

    #[test]
    fn remove_cleans_both_sides() {
        let mut m = map();
        m.insert("a", 1).unwrap();
        assert!(m.remove(&"a", &1));
        assert!(!m.remove(&"a", &1));
        assert!(!m.contains_key(&"a"));
        assert_eq!(m.keys_of(&1).count(), 0);
        assert!(m.is_consistent());
    }

    #[test]
    fn try_map_values_keeps_declared_keys() {
        let mut m = map();
        m.insert("b", 3).unwrap();
        let doubled = m.try_map_values(|v| Ok(v * 2)).unwrap();
        assert_eq!(doubled.get(&"b").copied().collect::<Vec<_>>(), vec![6]);
        assert!(doubled.is_valid_key(&"a"));
    }
}
