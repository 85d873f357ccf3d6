//! Chunk codec: hash-then-compress on the way in, decompress on the
//! way out. The content hash is always taken over the uncompressed
//! bytes so a reader can verify integrity after decoding.

use crate::error::Result;
use bytes::Bytes;
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use sha2::{Digest, Sha256};
use std::io::{Read, Write};

/// Compute the SHA-256 hex digest of raw chunk bytes.
pub fn compute_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Encode a raw chunk into its persisted representation.
///
/// Returns the compressed bytes together with the content hash of the
/// uncompressed input.
pub fn encode(raw: &[u8]) -> Result<(Bytes, String)> {
    let hash = compute_hash(raw);
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(raw.len() / 2), Compression::default());
    encoder.write_all(raw)?;
    let compressed = encoder.finish()?;
    Ok((Bytes::from(compressed), hash))
}

/// Decode a persisted chunk back into its raw bytes.
///
/// A failure here means the persisted representation is unreadable;
/// callers report it as a corruption condition, not a fatal fault.
pub fn decode(persisted: &[u8]) -> Result<Bytes> {
    let mut decoder = ZlibDecoder::new(persisted);
    let mut raw = Vec::new();
    decoder.read_to_end(&mut raw)?;
    Ok(Bytes::from(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_round_trip() {
        let raw = b"the quick brown fox jumps over the lazy dog".repeat(100);
        let (persisted, hash) = encode(&raw).unwrap();
        assert!(persisted.len() < raw.len());

        let decoded = decode(&persisted).unwrap();
        assert_eq!(decoded, Bytes::from(raw.clone()));
        assert_eq!(compute_hash(&decoded), hash);
    }

    #[test]
    fn test_empty_chunk_round_trip() {
        let (persisted, hash) = encode(b"").unwrap();
        let decoded = decode(&persisted).unwrap();
        assert!(decoded.is_empty());
        assert_eq!(compute_hash(&decoded), hash);
    }

    #[test]
    fn test_compute_hash() {
        let hash = compute_hash(b"hello world");
        assert_eq!(hash.len(), 64);
        assert_ne!(hash, compute_hash(b"hello worle"));
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(decode(b"definitely not a zlib stream").is_err());
    }

    #[test]
    fn test_flipped_byte_detected() {
        let raw = b"some chunk payload".repeat(50);
        let (persisted, hash) = encode(&raw).unwrap();

        let mut corrupted = persisted.to_vec();
        let last = corrupted.len() - 1;
        corrupted[last] ^= 0xff;

        // Either the stream no longer decodes or the hash no longer matches.
        match decode(&corrupted) {
            Ok(decoded) => assert_ne!(compute_hash(&decoded), hash),
            Err(_) => {}
        }
    }
}
