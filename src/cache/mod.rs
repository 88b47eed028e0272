//! Binary cache (L11): content-addressed storage for compiled binaries,
//! keyed off the generated host source plus its module manifest so two
//! compiles that produce byte-identical output skip the host toolchain
//! entirely (spec.md §4.11).
//!
//! Grounded on `resolve::remote`'s rename-with-cross-device-fallback idiom
//! (here adapted from directory moves to single-file moves) and its own
//! `sha2` dependency for content hashing; gzip entry storage follows
//! `Brahmastra-Labs-logicaffeine`'s bundled-artifact path, which reaches for
//! `flate2` the same way. `tempfile` keeps both write paths crash-safe: a
//! partially written `.gz` or extracted binary never appears at its final
//! name.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};

/// Soft cap on total cache size (spec.md §6): eviction runs after every
/// `store` and deletes oldest-mtime entries until the directory is back
/// under this, rather than enforcing it as a hard limit mid-store.
const SOFT_CAP_BYTES: u64 = 10 * 1024 * 1024 * 1024;

pub struct BinCache {
    dir: PathBuf,
    cap_bytes: u64,
}

impl BinCache {
    /// Resolves the cache directory to `$HOME/.cache/rugo/bincache` (spec.md
    /// §6), creating it if absent.
    pub fn new() -> Result<Self> {
        let base = dirs::cache_dir().context("locating the platform cache directory")?;
        Ok(Self::with_dir(base.join("rugo").join("bincache")))
    }

    pub fn with_dir(dir: PathBuf) -> Self {
        BinCache { dir, cap_bytes: SOFT_CAP_BYTES }
    }

    #[cfg(test)]
    fn with_cap(dir: PathBuf, cap_bytes: u64) -> Self {
        BinCache { dir, cap_bytes }
    }

    /// `binCacheKey(s, m)` (invariant 15): depends only on the generated
    /// source and its module manifest, truncated to the first 8 bytes (16
    /// hex characters) of `SHA-256(goSource || 0x00 || goMod)`.
    pub fn key(go_source: &str, go_mod: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(go_source.as_bytes());
        hasher.update([0u8]);
        hasher.update(go_mod.as_bytes());
        let digest = hasher.finalize();
        digest[..8].iter().map(|b| format!("{b:02x}")).collect()
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.gz"))
    }

    /// Looks up `key`, decompressing the cached binary if present. Touches
    /// the entry's mtime on a hit so eviction's oldest-first ordering
    /// reflects last use, not last write.
    pub fn lookup(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.entry_path(key);
        let compressed = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("reading cache entry {path:?}")),
        };

        // Rewriting the unchanged bytes is the only mtime-touch available
        // within this crate's MSRV (`File::set_modified` needs Rust 1.75).
        fs::write(&path, &compressed).with_context(|| format!("touching cache entry {path:?}"))?;

        let mut binary = Vec::new();
        GzDecoder::new(compressed.as_slice())
            .read_to_end(&mut binary)
            .with_context(|| format!("decompressing cache entry {path:?}"))?;
        Ok(Some(binary))
    }

    /// Compresses and stores `binary` under `key`, then evicts down to the
    /// soft cap.
    pub fn store(&self, key: &str, binary: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.dir).with_context(|| format!("creating cache directory {:?}", self.dir))?;

        let tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .with_context(|| format!("creating a staging file in {:?}", self.dir))?;
        {
            let mut encoder = GzEncoder::new(tmp.as_file(), Compression::default());
            encoder.write_all(binary).context("compressing binary for cache storage")?;
            encoder.finish().context("finishing gzip stream for cache storage")?;
        }
        let tmp_path = tmp.into_temp_path();
        rename_file(&tmp_path, &self.entry_path(key))?;
        std::mem::forget(tmp_path);

        self.evict()
    }

    /// Decompresses `key`'s cached binary to `dest` with executable
    /// permissions, returning `false` if there is no entry for `key`.
    pub fn extract_to(&self, key: &str, dest: &Path) -> Result<bool> {
        let path = self.entry_path(key);
        let compressed = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e).with_context(|| format!("reading cache entry {path:?}")),
        };

        let parent = dest.parent().context("cache extraction destination has no parent directory")?;
        fs::create_dir_all(parent).with_context(|| format!("creating {parent:?}"))?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .with_context(|| format!("creating a staging file in {parent:?}"))?;
        let mut binary = Vec::new();
        GzDecoder::new(compressed.as_slice())
            .read_to_end(&mut binary)
            .with_context(|| format!("decompressing cache entry {path:?}"))?;
        tmp.write_all(&binary).context("writing extracted binary to staging file")?;
        tmp.flush().context("flushing extracted binary")?;
        set_executable(tmp.path())?;

        let tmp_path = tmp.into_temp_path();
        rename_file(&tmp_path, dest)?;
        std::mem::forget(tmp_path);
        Ok(true)
    }

    /// Deletes oldest-mtime entries until the directory's total size is
    /// back under [`SOFT_CAP_BYTES`] (spec.md §6).
    fn evict(&self) -> Result<()> {
        let mut entries = Vec::new();
        let mut total = 0u64;
        let dir_entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e).with_context(|| format!("listing cache directory {:?}", self.dir)),
        };
        for entry in dir_entries {
            let entry = entry?;
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            total += meta.len();
            entries.push((entry.path(), meta.len(), meta.modified().unwrap_or(SystemTime::UNIX_EPOCH)));
        }

        if total <= self.cap_bytes {
            return Ok(());
        }

        entries.sort_by_key(|(_, _, mtime)| *mtime);
        for (path, size, _) in entries {
            if total <= self.cap_bytes {
                break;
            }
            fs::remove_file(&path).with_context(|| format!("evicting cache entry {path:?}"))?;
            total = total.saturating_sub(size);
        }
        Ok(())
    }
}

/// Moves `from` to `to`, falling back to copy-then-remove across
/// filesystems — the single-file counterpart of
/// [`crate::resolve::remote::atomic_rename`]'s directory move.
fn rename_file(from: &Path, to: &Path) -> Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::CrossesDevices => {
            fs::copy(from, to).with_context(|| format!("copying {from:?} to {to:?}"))?;
            fs::remove_file(from).with_context(|| format!("removing staging file {from:?} after cross-device copy"))
        }
        Err(e) => Err(e).with_context(|| format!("renaming {from:?} to {to:?}")),
    }
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(perms.mode() | 0o755);
    fs::set_permissions(path, perms).with_context(|| format!("marking {path:?} executable"))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn key_depends_only_on_source_and_mod() {
        let a = BinCache::key("package main", "module foo\n");
        let b = BinCache::key("package main", "module foo\n");
        let c = BinCache::key("package main", "module bar\n");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn store_then_lookup_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BinCache::with_dir(dir.path().to_path_buf());
        let key = BinCache::key("package main", "module foo\n");
        cache.store(&key, b"fake binary bytes").unwrap();
        let found = cache.lookup(&key).unwrap();
        assert_eq!(found, Some(b"fake binary bytes".to_vec()));
    }

    #[test]
    fn lookup_of_missing_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BinCache::with_dir(dir.path().to_path_buf());
        assert!(cache.lookup("0000000000000000").unwrap().is_none());
    }

    #[test]
    fn extract_to_writes_an_executable_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BinCache::with_dir(dir.path().to_path_buf());
        let key = BinCache::key("package main", "module foo\n");
        cache.store(&key, b"fake binary bytes").unwrap();

        let dest = dir.path().join("out").join("program");
        let found = cache.extract_to(&key, &dest).unwrap();
        assert!(found);
        assert_eq!(fs::read(&dest).unwrap(), b"fake binary bytes");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&dest).unwrap().permissions().mode();
            assert_ne!(mode & 0o111, 0);
        }
    }

    #[test]
    fn eviction_deletes_oldest_entries_over_cap() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BinCache::with_cap(dir.path().to_path_buf(), 10);

        cache.store("aaaaaaaaaaaaaaaa", b"0123456789").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(1100));
        cache.store("bbbbbbbbbbbbbbbb", b"0123456789").unwrap();

        assert!(cache.lookup("aaaaaaaaaaaaaaaa").unwrap().is_none());
        assert!(cache.lookup("bbbbbbbbbbbbbbbb").unwrap().is_some());
    }
}
