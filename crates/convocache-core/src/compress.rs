//! Threshold-gated payload compression
//!
//! Session payloads at or above the threshold are gzip-compressed; smaller
//! payloads are stored as-is, since compressing them costs more CPU than it
//! saves and can even grow them.

use crate::error::{CacheError, CacheResult};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::io::{Read, Write};

/// Default byte size above which payloads are compressed
pub const DEFAULT_COMPRESSION_THRESHOLD: usize = 1024;

/// Compress a payload when it meets the threshold
///
/// Returns the bytes to store and whether they are compressed.
pub fn maybe_compress(bytes: &[u8], threshold: usize) -> CacheResult<(Vec<u8>, bool)> {
    if bytes.len() < threshold {
        return Ok((bytes.to_vec(), false));
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(bytes)
        .map_err(|e| CacheError::compression(format!("Failed to compress payload: {e}")))?;
    let compressed = encoder
        .finish()
        .map_err(|e| CacheError::compression(format!("Failed to finish compression: {e}")))?;

    tracing::debug!(
        raw_bytes = bytes.len(),
        stored_bytes = compressed.len(),
        "compressed session payload"
    );
    Ok((compressed, true))
}

/// Exact inverse of [`maybe_compress`]
///
/// Fails closed: a decode error means the payload is corrupt and the caller
/// must treat the session as missing.
pub fn decompress(bytes: &[u8], was_compressed: bool) -> CacheResult<Vec<u8>> {
    if !was_compressed {
        return Ok(bytes.to_vec());
    }

    let mut decoder = GzDecoder::new(bytes);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| CacheError::compression(format!("Failed to decompress payload: {e}")))?;
    Ok(decompressed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_payload_passes_through() {
        let payload = b"short payload";
        let (stored, compressed) = maybe_compress(payload, 1024).unwrap();
        assert!(!compressed);
        assert_eq!(stored, payload);
    }

    #[test]
    fn test_large_payload_compresses_and_shrinks() {
        let payload = "the same sentence again and again ".repeat(100);
        let (stored, compressed) = maybe_compress(payload.as_bytes(), 1024).unwrap();
        assert!(compressed);
        assert!(stored.len() < payload.len());
    }

    #[test]
    fn test_round_trip() {
        let payload = "conversation history with plenty of repetition ".repeat(64);
        let (stored, compressed) = maybe_compress(payload.as_bytes(), 1024).unwrap();
        let restored = decompress(&stored, compressed).unwrap();
        assert_eq!(restored, payload.as_bytes());
    }

    #[test]
    fn test_round_trip_below_threshold() {
        let payload = b"tiny";
        let (stored, compressed) = maybe_compress(payload, 1024).unwrap();
        let restored = decompress(&stored, compressed).unwrap();
        assert_eq!(restored, payload);
    }

    #[test]
    fn test_corrupt_payload_fails_closed() {
        let err = decompress(b"definitely not gzip", true);
        assert!(err.is_err());
    }

    #[test]
    fn test_threshold_boundary() {
        let payload = vec![b'x'; 1024];
        let (_, compressed) = maybe_compress(&payload, 1024).unwrap();
        assert!(compressed);

        let payload = vec![b'x'; 1023];
        let (_, compressed) = maybe_compress(&payload, 1024).unwrap();
        assert!(!compressed);
    }
}
