//! Cache snapshots: persist namespaces across gateway restarts.
//!
//! One file per namespace, postcard-serialized and zstd-compressed. A
//! snapshot that fails to decode is skipped with a warning; persistence is
//! never allowed to stop the gateway from serving.

use std::path::Path;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

use crate::cache::entry::{CacheKey, CachedResponse};
use crate::cache::store::CacheStore;

/// Snapshot file suffix under the persistence directory.
pub const SNAPSHOT_SUFFIX: &str = ".cache.zst";

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encode/decode failed: {0}")]
    Codec(#[from] postcard::Error),
}

#[derive(Serialize, Deserialize)]
struct SnapshotEntry {
    method: String,
    url: String,
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    namespace: String,
    entries: Vec<SnapshotEntry>,
}

/// Write one snapshot file per namespace. Returns the number of files
/// written.
pub async fn save_store(
    store: &CacheStore,
    dir: &Path,
    zstd_level: i32,
) -> Result<usize, PersistError> {
    fs::create_dir_all(dir).await?;

    let mut written = 0;
    for name in store.names() {
        let entries = store
            .entries(&name)
            .into_iter()
            .map(|(key, response)| SnapshotEntry {
                method: key.method,
                url: key.url,
                status: response.status,
                headers: response.headers,
                body: response.body.to_vec(),
            })
            .collect();

        let snapshot = Snapshot {
            namespace: name.clone(),
            entries,
        };
        let encoded = postcard::to_stdvec(&snapshot)?;
        let compressed = zstd::encode_all(encoded.as_slice(), zstd_level)?;

        let path = dir.join(format!("{}{}", sanitize(&name), SNAPSHOT_SUFFIX));
        fs::write(&path, compressed).await?;
        debug!(namespace = %name, path = %path.display(), "snapshot written");
        written += 1;
    }

    Ok(written)
}

/// Restore a store from the snapshot directory. A missing directory yields an
/// empty store; unreadable snapshot files are skipped.
pub async fn load_store(dir: &Path) -> Result<CacheStore, PersistError> {
    let mut store = CacheStore::new();

    let mut read_dir = match fs::read_dir(dir).await {
        Ok(rd) => rd,
        Err(_) => return Ok(store),
    };

    while let Some(dir_entry) = read_dir.next_entry().await? {
        let path = dir_entry.path();
        let is_snapshot = path
            .file_name()
            .map(|n| n.to_string_lossy().ends_with(SNAPSHOT_SUFFIX))
            .unwrap_or(false);
        if !is_snapshot {
            continue;
        }

        match restore_snapshot(&path, &mut store).await {
            Ok((namespace, count)) => {
                debug!(namespace = %namespace, entries = count, "snapshot restored")
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unreadable snapshot")
            }
        }
    }

    Ok(store)
}

async fn restore_snapshot(
    path: &Path,
    store: &mut CacheStore,
) -> Result<(String, usize), PersistError> {
    let compressed = fs::read(path).await?;
    let encoded = zstd::decode_all(compressed.as_slice())?;
    let Snapshot { namespace, entries } = postcard::from_bytes(&encoded)?;

    // Preserve empty namespaces too; the name carries version information.
    store.open(&namespace);
    let count = entries.len();
    for entry in entries {
        store.insert(
            &namespace,
            CacheKey {
                method: entry.method,
                url: entry.url,
            },
            CachedResponse {
                status: entry.status,
                headers: entry.headers,
                body: Bytes::from(entry.body),
            },
        );
    }

    Ok((namespace, count))
}

/// Namespace names become file names; anything unexpected is flattened.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_store() -> CacheStore {
        let mut store = CacheStore::new();
        store.insert(
            "app-v1",
            CacheKey::get("http://app.local/index.html"),
            CachedResponse {
                status: 200,
                headers: vec![("content-type".to_string(), "text/html".to_string())],
                body: Bytes::from_static(b"<html>shell</html>"),
            },
        );
        store.insert(
            "app-runtime-v1",
            CacheKey::get("http://app.local/api/stores"),
            CachedResponse {
                status: 200,
                headers: vec![],
                body: Bytes::from_static(b"[]"),
            },
        );
        store
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = sample_store();

        let written = save_store(&store, dir.path(), 3).await.unwrap();
        assert_eq!(written, 2);

        let restored = load_store(dir.path()).await.unwrap();
        assert_eq!(restored.total_entries(), 2);

        let hit = restored
            .lookup("app-v1", &CacheKey::get("http://app.local/index.html"))
            .unwrap();
        assert_eq!(hit.status, 200);
        assert_eq!(hit.body, Bytes::from_static(b"<html>shell</html>"));
        assert_eq!(hit.header("content-type"), Some("text/html"));
    }

    #[tokio::test]
    async fn test_missing_directory_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("never-created");

        let restored = load_store(&missing).await.unwrap();
        assert_eq!(restored.total_entries(), 0);
        assert!(restored.names().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = sample_store();
        save_store(&store, dir.path(), 3).await.unwrap();

        // Clobber one snapshot with garbage.
        let bad = dir.path().join(format!("app-v1{SNAPSHOT_SUFFIX}"));
        fs::write(&bad, b"not a snapshot").await.unwrap();

        let restored = load_store(dir.path()).await.unwrap();
        assert_eq!(restored.total_entries(), 1);
        assert!(restored.has("app-runtime-v1"));
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("app-v1"), "app-v1");
        assert_eq!(sanitize("app/../v1"), "app_.._v1");
    }
}
