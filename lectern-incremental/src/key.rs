//! Digests used as cache bucket names and cache keys.
//!
//! Both are blake3 hashes rendered as lowercase hex, so they are safe to use
//! as file names inside the cache directory.

use blake3::Hasher;
use std::fmt;

/// A blake3 digest over one or more byte components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest {
    /// Raw 32-byte hash
    pub bytes: [u8; 32],
}

impl Digest {
    /// Create a digest from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            bytes: *blake3::hash(bytes).as_bytes(),
        }
    }

    /// Create a digest from multiple components.
    ///
    /// Components are length-prefixed so `["ab", "c"]` and `["a", "bc"]`
    /// never collide.
    pub fn from_components(components: &[&[u8]]) -> Self {
        let mut hasher = Hasher::new();
        for component in components {
            hasher.update(&(component.len() as u64).to_le_bytes());
            hasher.update(component);
        }
        Self {
            bytes: *hasher.finalize().as_bytes(),
        }
    }

    /// Get the hash as a hex string
    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.bytes).to_hex().to_string()
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Running digest over every filter applied so far in a chain.
///
/// The key at a batch boundary covers the whole prefix, not only the
/// current batch, which is what lets two chains with a common prefix agree
/// on the key for that prefix.
#[derive(Debug, Clone)]
pub struct ChainKey {
    hasher: Hasher,
    len: usize,
}

impl ChainKey {
    /// Key for the empty chain
    pub fn new() -> Self {
        let mut hasher = Hasher::new();
        hasher.update(b"lectern-chain");
        Self { hasher, len: 0 }
    }

    /// Fold one filter identity into the key
    pub fn push(&mut self, identity: &str) {
        self.hasher.update(&(identity.len() as u64).to_le_bytes());
        self.hasher.update(identity.as_bytes());
        self.len += 1;
    }

    /// Number of filters folded in so far
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Hex digest of the prefix seen so far
    pub fn digest(&self) -> String {
        self.hasher.finalize().to_hex().to_string()
    }
}

impl Default for ChainKey {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_stable() {
        let a = Digest::from_components(&[b"post.md", b"Title"]);
        let b = Digest::from_components(&[b"post.md", b"Title"]);
        assert_eq!(a, b);
        assert_eq!(a.to_hex().len(), 64);
    }

    #[test]
    fn test_digest_components_are_delimited() {
        let a = Digest::from_components(&[b"ab", b"c"]);
        let b = Digest::from_components(&[b"a", b"bc"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_chain_key_is_cumulative() {
        let mut left = ChainKey::new();
        let mut right = ChainKey::new();
        left.push("markdown");
        right.push("markdown");
        assert_eq!(left.digest(), right.digest());

        left.push("h1");
        right.push("typography");
        assert_ne!(left.digest(), right.digest());
        assert_eq!(left.len(), 2);
    }

    #[test]
    fn test_chain_key_order_matters() {
        let mut a = ChainKey::new();
        a.push("markdown");
        a.push("h1");

        let mut b = ChainKey::new();
        b.push("h1");
        b.push("markdown");

        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn test_empty_chain_key() {
        let key = ChainKey::new();
        assert!(key.is_empty());
        assert_eq!(key.digest(), ChainKey::default().digest());
    }
}
