//! Hashing helpers for derived artifact ids.
//!
//! Definitions that do not name themselves get an id derived from the path of
//! their source file, so the id is stable across runs as long as the file does
//! not move.

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::consts::ID_HASH_PREFIX_LEN;

/// Hash arbitrary bytes, returning the full 64-character lowercase hex digest.
pub fn hash_bytes(data: &[u8]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(data);
  format!("{:x}", hasher.finalize())
}

/// Derive an artifact id from the path of its definition file.
///
/// The id is `id` followed by the first [`ID_HASH_PREFIX_LEN`] hex characters
/// of the SHA-256 of the path, which keeps it usable as an identifier.
pub fn derive_id(path: &Path) -> String {
  let full = hash_bytes(path.to_string_lossy().as_bytes());
  format!("id{}", &full[..ID_HASH_PREFIX_LEN])
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn hash_bytes_is_full_sha256() {
    assert_eq!(
      hash_bytes(b"abc"),
      "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
  }

  #[test]
  fn derived_id_is_prefixed_and_truncated() {
    let id = derive_id(Path::new("/srv/defs/api/users.lua"));
    assert!(id.starts_with("id"));
    assert_eq!(id.len(), 2 + ID_HASH_PREFIX_LEN);
    assert!(id[2..].chars().all(|c| c.is_ascii_hexdigit()));
  }

  #[test]
  fn derived_id_is_stable_per_path() {
    let a = derive_id(Path::new("/srv/defs/a.lua"));
    assert_eq!(a, derive_id(Path::new("/srv/defs/a.lua")));
    assert_ne!(a, derive_id(Path::new("/srv/defs/b.lua")));
  }
}
