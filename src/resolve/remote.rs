//! Remote module fetcher (L6): resolves a `require` path that names a
//! remote repository instead of a local file, cloning (or reusing a cached
//! clone of) it under `$RUGO_MODULE_DIR`.
//!
//! Grounded on `NTmatter-rawr`'s use of `gix` for repository access (no
//! teacher analogue — PRQL has no remote-module system) and its `sha2` for
//! content hashing of the lock file's pinned commits.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// `host/owner/repo[/subpath]@version`, parsed out of a `require` path once
/// [`is_remote_path`] says it isn't a local file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    pub host: String,
    pub owner: String,
    pub repo: String,
    pub subpath: Option<String>,
    pub version: Option<String>,
}

static SHA_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-f]{7,40}$").unwrap());

/// A path is remote iff its first slash-segment isn't a relative-path
/// marker and either contains a dot (a hostname) or is `localhost[:port]`.
pub fn is_remote_path(path: &str) -> bool {
    if path.starts_with('.') || path.starts_with('/') {
        return false;
    }
    let Some(first) = path.split('/').next() else { return false };
    first.contains('.') || first == "localhost" || first.starts_with("localhost:")
}

pub fn parse_remote_path(path: &str) -> Result<RemoteRef> {
    let (path, version) = match path.split_once('@') {
        Some((p, v)) => (p, Some(v.to_string())),
        None => (path, None),
    };
    let mut parts = path.splitn(4, '/');
    let host = parts.next().context("remote path missing host")?.to_string();
    let owner = parts.next().context("remote path missing owner segment")?.to_string();
    let repo = parts.next().context("remote path missing repo segment")?.to_string();
    let subpath = parts.next().map(str::to_string);
    Ok(RemoteRef { host, owner, repo, subpath, version })
}

/// Whether `version` names an immutable ref: a `v`-prefixed tag, or a
/// 7-40 character lowercase-hex SHA. Anything else (a branch name) is
/// mutable and gets pinned to a resolved SHA in the lock file instead.
pub fn is_immutable_version(version: &str) -> bool {
    version.starts_with('v') || SHA_RE.is_match(version)
}

/// The on-disk label for a version within the module cache: the literal
/// version string for immutable refs, `_default` for "no version given",
/// `_sha_<sha>` for a mutable ref pinned to a resolved commit.
pub fn version_label(version: Option<&str>, resolved_sha: Option<&str>) -> String {
    match (version, resolved_sha) {
        (Some(v), _) if is_immutable_version(v) => v.to_string(),
        (None, _) => "_default".to_string(),
        (Some(_), Some(sha)) => format!("_sha_{sha}"),
        (Some(v), None) => format!("_sha_{v}"),
    }
}

/// `$MODULE_DIR/<host>/<owner>/<repo>/<versionLabel>`.
pub fn cache_dir(module_dir: &Path, r: &RemoteRef, label: &str) -> PathBuf {
    module_dir.join(&r.host).join(&r.owner).join(&r.repo).join(label)
}

/// One pinned entry in the module lock file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockEntry {
    pub module: String,
    pub version: Option<String>,
    pub sha: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LockFile {
    pub frozen: bool,
    pub entries: Vec<LockEntry>,
}

impl LockFile {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(LockFile::default());
        }
        let text = std::fs::read_to_string(path).with_context(|| format!("reading lock file {path:?}"))?;
        Ok(serde_yaml::from_str(&text)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_yaml::to_string(self)?;
        std::fs::write(path, text).with_context(|| format!("writing lock file {path:?}"))
    }

    pub fn find(&self, module: &str) -> Option<&LockEntry> {
        self.entries.iter().find(|e| e.module == module)
    }

    /// Inserts or replaces the pinned SHA for `module`, refusing the write
    /// when the lock file is frozen and no entry yet exists (a frozen lock
    /// file may be read, but it may not grow new pins).
    pub fn update_entry(&mut self, module: &str, version: Option<String>, sha: String) -> Result<()> {
        if self.frozen && self.find(module).is_none() {
            bail!("lock file is frozen: cannot add a new entry for `{module}`");
        }
        if let Some(existing) = self.entries.iter_mut().find(|e| e.module == module) {
            existing.version = version;
            existing.sha = sha;
        } else {
            self.entries.push(LockEntry { module: module.to_string(), version, sha });
        }
        Ok(())
    }
}

/// Moves `from` to `to`, falling back to copy-then-remove when the two
/// paths are on different filesystems (the only case `std::fs::rename`
/// cannot handle atomically).
pub fn atomic_rename(from: &Path, to: &Path) -> Result<()> {
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::CrossesDevices => {
            copy_dir_recursive(from, to)?;
            std::fs::remove_dir_all(from)
                .with_context(|| format!("removing staging dir {from:?} after cross-device copy"))
        }
        Err(e) => Err(e).with_context(|| format!("renaming {from:?} to {to:?}")),
    }
}

fn copy_dir_recursive(from: &Path, to: &Path) -> Result<()> {
    std::fs::create_dir_all(to)?;
    for entry in walkdir::WalkDir::new(from).min_depth(1) {
        let entry = entry?;
        let rel = entry.path().strip_prefix(from)?;
        let dest = to.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&dest)?;
        } else {
            std::fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}

/// Clone strategy: shallow `--depth 1 --branch <version>` first; on
/// failure (or when no version was given), a full clone. A SHA-pinned
/// fetch always does a full clone since a shallow clone can't check out an
/// arbitrary historical commit by default.
pub enum CloneStrategy {
    Shallow { branch: String },
    Full,
}

pub fn choose_clone_strategy(version: Option<&str>) -> CloneStrategy {
    match version {
        Some(v) if !SHA_RE.is_match(v) => CloneStrategy::Shallow { branch: v.to_string() },
        _ => CloneStrategy::Full,
    }
}

/// Clones `url` into `dest`, following [`choose_clone_strategy`], then
/// checks out `sha` if given. `GIT_TERMINAL_PROMPT=0` is expressed as a gix
/// fetch option rather than an environment mutation, so concurrent fetches
/// in the same process never race on process-global state.
pub fn clone_repo(url: &str, dest: &Path, version: Option<&str>, sha: Option<&str>) -> Result<String> {
    std::fs::create_dir_all(dest)?;

    let attempt_shallow = matches!(choose_clone_strategy(version), CloneStrategy::Shallow { .. });
    let mut prepare = gix::prepare_clone(url, dest).with_context(|| format!("preparing clone of {url}"))?;
    if attempt_shallow {
        if let Some(depth) = std::num::NonZeroU32::new(1) {
            prepare = prepare.with_shallow(gix::remote::fetch::Shallow::DepthAtRemote(depth));
        }
    }

    let (mut checkout, _outcome) = prepare
        .fetch_then_checkout(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
        .or_else(|_| {
            // Shallow clone failed (branch may be a tag unreachable at
            // depth 1, or the remote refused a shallow fetch) — fall back
            // to a full clone of the same destination.
            std::fs::remove_dir_all(dest).ok();
            std::fs::create_dir_all(dest)?;
            gix::prepare_clone(url, dest)?
                .fetch_then_checkout(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
        })
        .with_context(|| format!("cloning {url}"))?;

    let (repo, _) = checkout.main_worktree(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)?;

    if let Some(sha) = sha {
        checkout_sha(&repo, sha)?;
    }

    let head_sha = repo
        .head_commit()
        .with_context(|| "reading HEAD commit after clone")?
        .id()
        .to_string();
    Ok(head_sha)
}

fn checkout_sha(repo: &gix::Repository, sha: &str) -> Result<()> {
    let rev = repo.rev_parse_single(sha).with_context(|| format!("resolving commit {sha}"))?;
    let tree = rev.object()?.peel_to_tree()?;
    let index = gix::index::State::from_tree(&tree.id, |oid, buf| {
        repo.objects.find_tree_iter(oid, buf).ok()
    })?;
    let workdir = repo.workdir().context("bare repository has no worktree to check out into")?;
    gix::worktree::state::checkout(
        &gix::index::File::from_state(index, repo.index_path()),
        workdir,
        repo.objects.clone().into_arc()?,
        &gix::progress::Discard,
        &gix::progress::Discard,
        &gix::interrupt::IS_INTERRUPTED,
        gix::worktree::state::checkout::Options::default(),
    )?;
    Ok(())
}

/// Entry-point discovery within a fetched (or local directory) module root,
/// per the four-rule search order: an explicit subpath's `.rugo`/`.rg`
/// file, `name.rugo`/`.rg`, `main.rugo`/`.rg`, or — failing all of those —
/// exactly one source file in the root.
pub fn find_entry_point(root: &Path, repo_name: &str, subpath: Option<&str>) -> Result<PathBuf> {
    if let Some(subpath) = subpath {
        if let Some(found) = try_extensions(root, subpath) {
            return Ok(found);
        }
        bail!("module `{repo_name}`: subpath `{subpath}` has no `.rugo`/`.rg` file");
    }
    if let Some(found) = try_extensions(root, repo_name) {
        return Ok(found);
    }
    if let Some(found) = try_extensions(root, "main") {
        return Ok(found);
    }
    let sources: Vec<PathBuf> = std::fs::read_dir(root)
        .with_context(|| format!("reading module root {root:?}"))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| matches!(p.extension().and_then(|e| e.to_str()), Some("rugo") | Some("rg")))
        .collect();
    match sources.as_slice() {
        [one] => Ok(one.clone()),
        [] => bail!("module `{repo_name}` has no entry point; use `with` to name one explicitly"),
        _ => bail!(
            "module `{repo_name}` has multiple source files and no `{repo_name}.rugo`/`main.rugo`; \
             use `with` to name the function you need explicitly"
        ),
    }
}

fn try_extensions(root: &Path, stem: &str) -> Option<PathBuf> {
    for ext in ["rugo", "rg"] {
        let candidate = root.join(format!("{stem}.{ext}"));
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn local_relative_path_is_not_remote() {
        assert!(!is_remote_path("./helpers.rugo"));
        assert!(!is_remote_path("../lib/util.rugo"));
    }

    #[test]
    fn github_style_path_is_remote() {
        assert!(is_remote_path("github.com/rugo-lang/stdlib/strings@v1.2.0"));
    }

    #[test]
    fn localhost_path_is_remote() {
        assert!(is_remote_path("localhost:8080/owner/repo"));
    }

    #[test]
    fn parses_host_owner_repo_subpath_version() {
        let r = parse_remote_path("github.com/rugo-lang/stdlib/strings@v1.2.0").unwrap();
        assert_eq!(r.host, "github.com");
        assert_eq!(r.owner, "rugo-lang");
        assert_eq!(r.repo, "stdlib");
        assert_eq!(r.subpath.as_deref(), Some("strings"));
        assert_eq!(r.version.as_deref(), Some("v1.2.0"));
    }

    #[test]
    fn tag_and_sha_versions_are_immutable() {
        assert!(is_immutable_version("v1.0.0"));
        assert!(is_immutable_version("abcdef0"));
        assert!(!is_immutable_version("main"));
    }

    #[test]
    fn version_label_picks_default_for_no_version() {
        assert_eq!(version_label(None, None), "_default");
    }

    #[test]
    fn version_label_pins_mutable_branch_to_sha() {
        assert_eq!(version_label(Some("main"), Some("abc123")), "_sha_abc123");
    }

    #[test]
    fn lock_file_round_trips_through_yaml() {
        let dir = std::env::temp_dir().join(format!("rugo-lock-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("rugo.lock");

        let mut lock = LockFile::default();
        lock.update_entry("github.com/a/b", Some("main".into()), "deadbeef".into()).unwrap();
        lock.save(&path).unwrap();

        let loaded = LockFile::load(&path).unwrap();
        assert_eq!(loaded.find("github.com/a/b").unwrap().sha, "deadbeef");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn frozen_lock_rejects_new_entries() {
        let mut lock = LockFile { frozen: true, entries: vec![] };
        assert!(lock.update_entry("github.com/a/b", None, "sha".into()).is_err());
    }
}
