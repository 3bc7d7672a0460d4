//! Small shared utilities used across the extension pipeline.

use std::collections::HashMap;

/// The hasher used for the hot, high-cardinality maps in the hit grouper and
/// output dictionary (subject id -> Target, dict id -> stable id). `foldhash`
/// is faster than SipHash for these internal, non-adversarial keys.
pub type FastMap<K, V> = HashMap<K, V, foldhash::fast::RandomState>;

/// Creates an empty [`FastMap`].
#[inline]
#[must_use]
pub fn fast_map<K, V>() -> FastMap<K, V> {
    HashMap::with_hasher(foldhash::fast::RandomState::default())
}
