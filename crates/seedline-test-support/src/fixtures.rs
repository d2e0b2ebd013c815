//! Test fixtures and polling helpers.

use std::time::Duration;

use seedline_events::{INFO_HASH_LEN, InfoHash};
use sha2::{Digest, Sha256};
use tokio::time::{Instant, sleep};

/// Prefix of descriptors understood by [`crate::StubEngine`].
pub const DESCRIPTOR_PREFIX: &[u8] = b"SLD1:";

/// Deterministic identity filled with `byte`.
#[must_use]
pub const fn info_hash(byte: u8) -> InfoHash {
    InfoHash::new([byte; INFO_HASH_LEN])
}

/// Magnet URI naming `hash` with display name `name`.
#[must_use]
pub fn magnet_uri(hash: InfoHash, name: &str) -> String {
    format!("magnet:?xt=urn:btih:{hash}&dn={name}&tr=udp://tracker.example:1337")
}

/// Descriptor bytes for a transfer named `name`.
#[must_use]
pub fn descriptor(name: &str) -> Vec<u8> {
    let mut bytes = DESCRIPTOR_PREFIX.to_vec();
    bytes.extend_from_slice(name.as_bytes());
    bytes
}

/// Identity the stub engine derives from descriptor bytes.
#[must_use]
pub fn descriptor_info_hash(bytes: &[u8]) -> InfoHash {
    let digest = Sha256::digest(bytes);
    let mut truncated = [0_u8; INFO_HASH_LEN];
    truncated.copy_from_slice(&digest[..INFO_HASH_LEN]);
    InfoHash::new(truncated)
}

/// Poll `condition` every few milliseconds until it holds or `limit` elapses.
/// Returns whether the condition was observed.
pub async fn eventually<F>(limit: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + limit;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(Duration::from_millis(10)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magnet_embeds_hex_identity() {
        let hash = info_hash(0xab);
        let uri = magnet_uri(hash, "demo");
        assert!(uri.contains(&hash.to_hex()));
        assert!(uri.contains("dn=demo"));
    }

    #[test]
    fn descriptor_identity_is_stable() {
        let bytes = descriptor("ubuntu");
        assert_eq!(descriptor_info_hash(&bytes), descriptor_info_hash(&bytes));
        assert_ne!(
            descriptor_info_hash(&bytes),
            descriptor_info_hash(&descriptor("debian"))
        );
    }

    #[tokio::test]
    async fn eventually_times_out() {
        assert!(!eventually(Duration::from_millis(30), || false).await);
        assert!(eventually(Duration::from_millis(30), || true).await);
    }
}
