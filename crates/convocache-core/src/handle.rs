//! Content-addressed session handle generation
//!
//! A handle is the SHA-256 digest of a per-process salt plus the canonical
//! (uncompressed) session serialization, truncated to 128 bits and
//! hex-encoded. Identical states therefore converge on the same handle,
//! while the salt keeps handles unguessable across deployments.

use sha2::{Digest, Sha256};
use std::fmt::Write;
use uuid::Uuid;

/// Number of digest bytes kept in a handle (128 bits)
pub const HANDLE_BYTES: usize = 16;

/// Generator for collision-resistant session handles
#[derive(Debug, Clone)]
pub struct HandleGenerator {
    salt: [u8; 16],
}

impl Default for HandleGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleGenerator {
    /// Create a generator with a fresh random salt
    pub fn new() -> Self {
        Self {
            salt: *Uuid::new_v4().as_bytes(),
        }
    }

    /// Create a generator with a fixed salt
    pub fn with_salt(salt: [u8; 16]) -> Self {
        Self { salt }
    }

    /// Generate the handle for a serialized session state
    ///
    /// Deterministic for identical inputs; never fails.
    pub fn generate(&self, serialized_state: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.salt);
        hasher.update(serialized_state);
        let digest = hasher.finalize();

        let mut handle = String::with_capacity(HANDLE_BYTES * 2);
        for byte in &digest[..HANDLE_BYTES] {
            write!(handle, "{byte:02x}").expect("writing to a String cannot fail");
        }
        handle
    }
}
