//! MD5 digests over stored path strings.
//!
//! Thin wrapper around the `md-5` crate (RustCrypto). PSARC uses MD5 purely
//! as a deterministic, collision-resistant-enough key for the TOC lookup —
//! there is no cryptographic authentication requirement here.

use md5::{Digest, Md5};

/// A 128-bit MD5 digest, as stored verbatim in `TocEntry::name_digest`.
pub type DigestBytes = [u8; 16];

/// Computes the MD5 digest of a stored path's raw bytes.
///
/// Callers must pass the exact bytes that were written to the manifest
/// (`/`-separated, post-normalization) — the digest is part of the on-disk
/// format and is not recomputed at extract time from anything else.
pub fn digest_path(stored_path: &str) -> DigestBytes {
    let mut hasher = Md5::new();
    hasher.update(stored_path.as_bytes());
    let out = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&out);
    bytes
}

/// The manifest entry's digest: 16 zero bytes, always.
pub const MANIFEST_DIGEST: DigestBytes = [0u8; 16];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_digest_is_zero() {
        assert_eq!(MANIFEST_DIGEST, [0u8; 16]);
    }

    #[test]
    fn digest_is_deterministic() {
        let a = digest_path("a.txt");
        let b = digest_path("a.txt");
        assert_eq!(a, b);
    }

    #[test]
    fn digest_differs_by_path() {
        assert_ne!(digest_path("a.txt"), digest_path("b.txt"));
    }

    #[test]
    fn known_vector() {
        // MD5("") = d41d8cd98f00b204e9800998ecf8427e
        let empty = digest_path("");
        assert_eq!(
            empty,
            [
                0xd4, 0x1d, 0x8c, 0xd9, 0x8f, 0x00, 0xb2, 0x04, 0xe9, 0x80, 0x09, 0x98, 0xec, 0xf8,
                0x42, 0x7e
            ]
        );
    }
}
