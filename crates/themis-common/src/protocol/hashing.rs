//! Stable key hashing for shard selection.
//!
//! Routing must agree across process restarts and across SDKs written in other
//! languages, so the hash is a fixed-size BLAKE2b digest (4 bytes, read as a
//! big-endian `u32`) rather than `std`'s randomly seeded hasher. The digest is
//! byte-identical to `hashlib.blake2b(key, digest_size=4)`.

use blake2::digest::consts::U4;
use blake2::{Blake2b, Digest};

type Blake2b32 = Blake2b<U4>;

pub fn stable_hash(key: &str) -> u32 {
    let digest = Blake2b32::digest(key.as_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Picks a shard index in `0..shard_count` for `key`.
///
/// Returns `None` when there are no shards to pick from.
pub fn shard_index(key: &str, shard_count: usize) -> Option<usize> {
    if shard_count == 0 {
        return None;
    }
    Some(stable_hash(key) as usize % shard_count)
}
