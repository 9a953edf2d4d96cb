// src/id.rs

use crate::models::{JobId, Source};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

const ID_LEN: usize = 8;

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Derive a job id from its source and a creation-time salt.
///
/// A process-wide sequence number is folded into the salt so two submissions
/// of the same source within one clock tick still get distinct ids.
pub fn derive_job_id(source: &Source) -> JobId {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    derive_with_salt(source, nanos, seq)
}

fn derive_with_salt(source: &Source, nanos: u128, seq: u64) -> JobId {
    let mut hasher = Sha256::new();
    match source {
        Source::Magnet(uri) => {
            hasher.update(b"magnet\0");
            hasher.update(uri.as_bytes());
        }
        Source::TorrentFile(path) => {
            hasher.update(b"file\0");
            hasher.update(path.to_string_lossy().as_bytes());
        }
    }
    hasher.update(nanos.to_le_bytes());
    hasher.update(seq.to_le_bytes());
    let digest = format!("{:x}", hasher.finalize());
    JobId::new(&digest[..ID_LEN])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn id_is_short_hex() {
        let id = derive_job_id(&Source::Magnet("magnet:?xt=urn:btih:abc".into()));
        assert_eq!(id.as_str().len(), ID_LEN);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn same_inputs_give_same_id() {
        let src = Source::TorrentFile(PathBuf::from("/tmp/a.torrent"));
        assert_eq!(derive_with_salt(&src, 42, 7), derive_with_salt(&src, 42, 7));
    }

    #[test]
    fn resubmitting_same_magnet_gives_new_id() {
        let src = Source::Magnet("magnet:?xt=urn:btih:AAA".into());
        let a = derive_job_id(&src);
        let b = derive_job_id(&src);
        assert_ne!(a, b);
    }

    #[test]
    fn source_kind_is_part_of_identity() {
        let magnet = Source::Magnet("x.torrent".into());
        let file = Source::TorrentFile(PathBuf::from("x.torrent"));
        assert_ne!(derive_with_salt(&magnet, 1, 1), derive_with_salt(&file, 1, 1));
    }
}
