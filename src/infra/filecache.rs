//! File-backed cache for short-lived credentials.
//!
//! Each key is one file under `<root>/<namespace>/`. Writes go through a
//! temp file and a rename, so readers never see a torn entry, but there is
//! no cross-process lock: concurrent writers to the same key race and the
//! last rename wins. That is fine for a single developer machine and wrong
//! for a shared server, which must use the uncached federation path.

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

use crate::paths::validate_segment;

const PRIVATE_DIR_MODE: u32 = 0o700;
#[cfg(unix)]
const PRIVATE_FILE_MODE: u32 = 0o600;

#[derive(Serialize, Deserialize)]
struct StoredEntry {
    data: String,
    expiration: DateTime<Utc>,
}

/// A cached blob and the time after which it must not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub data: Vec<u8>,
    pub expiration: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration <= now
    }
}

pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    /// Creates a cache rooted at `root/namespace`. Nothing is touched on disk
    /// until the first [`FileCache::set`].
    pub fn new(root: impl AsRef<Path>, namespace: &str) -> Self {
        Self {
            dir: root.as_ref().join(namespace),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the entry stored under `key`, or `None` if there is none.
    ///
    /// Expiry is not checked; callers decide whether an entry is still usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or decoded.
    pub fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let path = self.path_for(key)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(key, "Cache miss");
                return Ok(None);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("reading cache entry {}", path.display()));
            }
        };

        let stored: StoredEntry = serde_json::from_slice(&bytes)
            .with_context(|| format!("decoding cache entry {}", path.display()))?;
        let data = STANDARD
            .decode(stored.data)
            .with_context(|| format!("decoding cache entry data {}", path.display()))?;

        Ok(Some(CacheEntry {
            data,
            expiration: stored.expiration,
        }))
    }

    /// Stores `data` under `key` until `expiration`, replacing any previous entry.
    pub fn set(&self, key: &str, data: &[u8], expiration: DateTime<Utc>) -> Result<()> {
        let path = self.path_for(key)?;
        let stored = StoredEntry {
            data: STANDARD.encode(data),
            expiration,
        };
        let bytes = serde_json::to_vec(&stored)?;

        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating cache directory {}", self.dir.display()))?;
        set_permissions(&self.dir, PRIVATE_DIR_MODE)?;
        write_private_file_atomic(&path, &bytes)
            .with_context(|| format!("writing cache entry {}", path.display()))?;

        debug!(key, %expiration, "Cache entry written");
        Ok(())
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_segment("cache key", key)?;
        Ok(self.dir.join(key))
    }
}

fn write_private_file_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("entry");
    let temp_path = path.with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4()));

    let result =
        write_new_private_file(&temp_path, bytes).and_then(|()| fs::rename(&temp_path, path));
    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }
    Ok(())
}

// The file is created owner-only; it is never readable by others, even briefly.
fn write_new_private_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(PRIVATE_FILE_MODE);
    }
    let mut file = options.open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn set_permissions(path: &Path, mode: u32) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    {
        let _ = (path, mode);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_get_missing_key_is_none() {
        let root = tempfile::tempdir().unwrap();
        let cache = FileCache::new(root.path(), "jetpack.io/envsec");
        assert_eq!(cache.get("awsfed-org_1").unwrap(), None);
    }

    #[test]
    fn test_set_then_get() {
        let root = tempfile::tempdir().unwrap();
        let cache = FileCache::new(root.path(), "jetpack.io/envsec");
        let expiration = Utc::now() + Duration::hours(1);

        cache.set("awsfed-org_1", b"blob", expiration).unwrap();

        let entry = cache.get("awsfed-org_1").unwrap().unwrap();
        assert_eq!(entry.data, b"blob");
        assert_eq!(entry.expiration, expiration);
        assert!(!entry.is_expired(Utc::now()));
    }

    #[test]
    fn test_get_returns_expired_entries() {
        let root = tempfile::tempdir().unwrap();
        let cache = FileCache::new(root.path(), "ns");
        let expiration = Utc::now() - Duration::minutes(5);

        cache.set("k", b"stale", expiration).unwrap();

        let entry = cache.get("k").unwrap().unwrap();
        assert_eq!(entry.data, b"stale");
        assert!(entry.is_expired(Utc::now()));
    }

    #[test]
    fn test_last_writer_wins() {
        let root = tempfile::tempdir().unwrap();
        let cache = FileCache::new(root.path(), "ns");
        let expiration = Utc::now() + Duration::hours(1);

        cache.set("k", b"first", expiration).unwrap();
        cache.set("k", b"second", expiration).unwrap();

        assert_eq!(cache.get("k").unwrap().unwrap().data, b"second");
        let leftovers = fs::read_dir(cache.dir()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_corrupt_entry_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let cache = FileCache::new(root.path(), "ns");
        fs::create_dir_all(cache.dir()).unwrap();
        fs::write(cache.dir().join("k"), b"{not json").unwrap();

        assert!(cache.get("k").is_err());
    }

    #[test]
    fn test_key_must_be_a_single_segment() {
        let root = tempfile::tempdir().unwrap();
        let cache = FileCache::new(root.path(), "ns");
        assert!(cache.get("../escape").is_err());
        assert!(cache.set("a/b", b"x", Utc::now()).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_entry_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let root = tempfile::tempdir().unwrap();
        let cache = FileCache::new(root.path(), "ns");
        cache.set("k", b"x", Utc::now()).unwrap();

        let mode = fs::metadata(cache.dir().join("k")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn test_new_file_is_created_private() {
        use std::os::unix::fs::PermissionsExt;

        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("entry");
        write_new_private_file(&path, b"secret").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0);
        assert!(write_new_private_file(&path, b"again").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_write_leaves_no_temp_file() {
        let root = tempfile::tempdir().unwrap();
        let cache = FileCache::new(root.path(), "ns");
        // A directory at the entry path makes the final rename fail.
        fs::create_dir_all(cache.dir().join("k").join("sub")).unwrap();

        assert!(cache.set("k", b"secret", Utc::now()).is_err());

        let names: Vec<String> = fs::read_dir(cache.dir())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["k".to_string()]);
    }
}
