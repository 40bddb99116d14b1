//! Fast hash map and hash set type aliases.
//!
//! Type aliases for [`FxHashMap`] and [`FxHashSet`] from the `rustc-hash`
//! crate. The Fx hash algorithm is roughly 2x faster than the standard
//! library's default hasher for the string and path keys this codebase
//! uses, at the cost of denial-of-service resistance (not needed here -
//! all keys are internal).
//!
//! # Examples
//!
//! ```
//! use cw_core::{FxHashMap, fx_hash_map};
//!
//! let mut map: FxHashMap<String, i32> = fx_hash_map();
//! map.insert("key".to_owned(), 42);
//! ```

/// A [`HashMap`](std::collections::HashMap) using the Fx hash algorithm.
pub type FxHashMap<K, V> = rustc_hash::FxHashMap<K, V>;

/// A [`HashSet`](std::collections::HashSet) using the Fx hash algorithm.
pub type FxHashSet<V> = rustc_hash::FxHashSet<V>;

/// The hasher used by [`FxHashMap`] and [`FxHashSet`].
pub type FxBuildHasher = rustc_hash::FxBuildHasher;

/// Creates a new empty [`FxHashMap`].
#[inline]
#[must_use]
pub fn fx_hash_map<K, V>() -> FxHashMap<K, V> {
    FxHashMap::default()
}

/// Creates a new empty [`FxHashSet`].
#[inline]
#[must_use]
pub fn fx_hash_set<V>() -> FxHashSet<V> {
    FxHashSet::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fx_hash_map_operations() {
        let mut map: FxHashMap<&str, i32> = fx_hash_map();
        map.insert("one", 1);
        map.insert("two", 2);
        assert_eq!(map.get("one"), Some(&1));
        assert_eq!(map.get("three"), None);
    }

    #[test]
    fn test_fx_hash_set_operations() {
        let mut set: FxHashSet<&str> = fx_hash_set();
        set.insert("one");
        assert!(set.contains("one"));
        assert!(!set.contains("two"));
    }
}
