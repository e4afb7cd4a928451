//! xxHash-based hashing for the primary-key map and group-by keys.
//!
//! All hashes are seeded xxh64, so they are deterministic across runs and
//! independent of the process' SipHash randomization: the same document id
//! or key tuple always lands on the same hash.

use std::collections::HashMap;
use std::hash::Hasher;

use xxhash_rust::xxh64::{Xxh64, Xxh64Builder};

use crate::types::Value;

/// Fixed seed for deterministic hashing.
const SEED: u64 = 0x517cc1b727220a95;

/// Hash map keyed through seeded xxh64. Backs the table's `_id → row_id`
/// primary-key map and its inverse.
pub type KeyHashMap<K, V> = HashMap<K, V, Xxh64Builder>;

/// An empty [`KeyHashMap`] with the seeded hasher.
pub fn key_hash_map<K, V>() -> KeyHashMap<K, V> {
    HashMap::with_hasher(Xxh64Builder::new(SEED))
}

/// Combined hash of a key tuple (group-by keys, DISTINCT sets).
///
/// Values hash through [`Value::hash_into`], so equal numerics of
/// different widths collide as they compare equal.
pub fn hash_key_values(values: &[Value]) -> u64 {
    let mut hasher = Xxh64::new(SEED);
    for value in values {
        value.hash_into(&mut hasher);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_determinism() {
        let key = vec![Value::String("nyc".into()), Value::BigInt(7)];
        assert_eq!(hash_key_values(&key), hash_key_values(&key));
    }

    #[test]
    fn test_hash_different_inputs() {
        let a = vec![Value::String("nyc".into())];
        let b = vec![Value::String("la".into())];
        assert_ne!(hash_key_values(&a), hash_key_values(&b));
    }

    #[test]
    fn test_equal_integers_collide_across_widths() {
        // Group keys compare equal across integer widths, so their hashes
        // must collide too.
        assert_eq!(
            hash_key_values(&[Value::TinyInt(7)]),
            hash_key_values(&[Value::BigInt(7)])
        );
        assert_ne!(
            hash_key_values(&[Value::BigInt(7)]),
            hash_key_values(&[Value::BigInt(8)])
        );
    }

    #[test]
    fn test_empty_tuple_is_stable() {
        assert_eq!(hash_key_values(&[]), hash_key_values(&[]));
    }

    #[test]
    fn test_key_hash_map_roundtrip() {
        let mut map: KeyHashMap<u64, &str> = key_hash_map();
        map.insert(1, "one");
        map.insert(2, "two");
        assert_eq!(map.get(&1), Some(&"one"));
        assert_eq!(map.remove(&2), Some("two"));
        assert!(map.get(&2).is_none());
    }
}
