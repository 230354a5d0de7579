//! Cache key derivation for image locators.

use sha2::{Digest, Sha256};

/// Filesystem-safe identifier for a cached image.
///
/// Derived from the image locator by hashing it, so the same URL always maps
/// to the same key, across process restarts included. The key doubles as the
/// file name of the disk entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Length of a derived key in characters.
    pub const LEN: usize = 64;

    /// Derives the key for an image locator.
    #[must_use]
    pub fn from_locator(locator: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(locator.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Rebuilds a key from a disk entry file name.
    ///
    /// Returns `None` for names that could not have been produced by
    /// [`CacheKey::from_locator`], such as in-flight temp files.
    #[must_use]
    pub fn from_file_name(name: &str) -> Option<Self> {
        let valid = name.len() == Self::LEN
            && name
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(name.to_string()))
    }

    /// Returns the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
