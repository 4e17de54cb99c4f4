//! Keyed Hashing
//!
//! All integrity hashes in the container format are HighwayHash-64 with a
//! fixed 256-bit key baked into the format. Changing the key (or the hash
//! function) changes every file hash, so both are frozen.

use highway::{HighwayHash, HighwayHasher, Key};

use crate::chain::Chain;

const HASH_KEY: Key = Key([
    0x2f69_6c65_6765_6952,
    0x0a73_6472_6f63_6572,
    0x2f69_6c65_6765_6952,
    0x0a73_6472_6f63_6572,
]);

/// Hash a contiguous byte slice.
pub fn hash_bytes(data: &[u8]) -> u64 {
    let mut hasher = HighwayHasher::new(HASH_KEY);
    hasher.append(data);
    hasher.finalize64()
}

/// Hash a chain without flattening it, block by block.
///
/// Equals `hash_bytes` over the flattened contents.
pub fn hash_chain(chain: &Chain) -> u64 {
    let mut hasher = HighwayHasher::new(HASH_KEY);
    for block in chain.blocks() {
        hasher.append(block);
    }
    hasher.finalize64()
}
