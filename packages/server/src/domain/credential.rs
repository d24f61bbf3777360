//! Room password hashing.
//!
//! Rooms never store the plaintext password. The first joiner's password is
//! sealed as a SHA-256 digest and every later join is compared digest to digest.

use std::fmt;

use sha2::{Digest, Sha256};

/// Lower-case hex SHA-256 digest of a room password.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PasswordDigest(String);

impl PasswordDigest {
    /// Hash a plaintext password.
    pub fn from_password(password: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(password.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Digests stay out of logs even at debug level.
impl fmt::Debug for PasswordDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordDigest(..)")
    }
}

/// Hash a plaintext room password into its comparable digest.
pub fn digest(password: &str) -> PasswordDigest {
    PasswordDigest::from_password(password)
}
