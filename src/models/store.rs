//! On-disk artifact store.
//!
//! Layout: `<root>/<variant>/<file>` for every file the catalog lists, plus a
//! `.download_complete` marker once the whole set verified. Downloads in
//! progress live next to their target as `<file>.part` and are resumed.
//!
//! Status is always derived from what is on disk:
//!
//! | on disk                                         | status      |
//! |-------------------------------------------------|-------------|
//! | every required file present and intact          | `Verified`  |
//! | nothing at all                                  | `Missing`   |
//! | marker present, some required file broken       | `Corrupted` |
//! | anything else (e.g. a `.part` download)         | `Partial`   |
//! | directory could not be read                     | `Unreadable`|

use crate::defaults;
use crate::error::{Result, VoxgateError};
use crate::models::catalog::{ArtifactFile, ArtifactSpec, get_artifact, list_artifacts};
use crate::models::download::{ArtifactFetcher, sha256_bytes, sha256_file};
use crate::sync::KeyedLocks;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    Missing,
    Partial,
    Verified,
    Corrupted,
    Unreadable,
}

impl ArtifactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactStatus::Missing => "missing",
            ArtifactStatus::Partial => "partial",
            ArtifactStatus::Verified => "verified",
            ArtifactStatus::Corrupted => "corrupted",
            ArtifactStatus::Unreadable => "unreadable",
        }
    }
}

/// Snapshot of one variant's directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactState {
    pub variant: String,
    pub status: ArtifactStatus,
    pub bytes_present: u64,
    pub required_files: BTreeSet<String>,
    pub missing_files: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Limits applied while repairing and acquiring.
#[derive(Debug, Clone)]
pub struct StorePolicy {
    /// Directories holding at least this many bytes are never wiped.
    pub wipe_threshold_bytes: u64,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    /// Hex SHA-256 per `"<variant>/<file>"`; wins over the catalog's.
    pub checksums: BTreeMap<String, String>,
}

impl Default for StorePolicy {
    fn default() -> Self {
        Self {
            wipe_threshold_bytes: defaults::WIPE_THRESHOLD_BYTES,
            max_retries: defaults::MAX_RETRIES,
            retry_backoff: Duration::from_millis(defaults::RETRY_BACKOFF_MS),
            checksums: BTreeMap::new(),
        }
    }
}

impl From<&crate::config::ModelsConfig> for StorePolicy {
    fn from(config: &crate::config::ModelsConfig) -> Self {
        Self {
            wipe_threshold_bytes: config.wipe_threshold_bytes,
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            checksums: config.checksums.clone(),
        }
    }
}

/// Digest of a file as it was when hashed.
struct CachedDigest {
    len: u64,
    modified: Option<SystemTime>,
    sha256: String,
}

pub struct ArtifactStore {
    root: PathBuf,
    fetcher: Arc<dyn ArtifactFetcher>,
    policy: StorePolicy,
    locks: KeyedLocks<String>,
    digests: Mutex<HashMap<PathBuf, CachedDigest>>,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>, fetcher: Arc<dyn ArtifactFetcher>, policy: StorePolicy) -> Self {
        Self {
            root: root.into(),
            fetcher,
            policy,
            locks: KeyedLocks::new(),
            digests: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn variant_dir(&self, variant: &str) -> PathBuf {
        self.root.join(variant)
    }

    pub fn file_path(&self, variant: &str, file: &str) -> PathBuf {
        self.variant_dir(variant).join(file)
    }

    /// Path of the weights file engines load from.
    pub fn weights_path(&self, variant: &str) -> Result<PathBuf> {
        let spec = lookup(variant)?;
        let weights = spec.weights().ok_or_else(|| VoxgateError::UnknownArtifact {
            variant: variant.to_string(),
        })?;
        Ok(self.file_path(variant, weights.name))
    }

    /// Inspect a variant without deleting anything.
    ///
    /// Writes the completion marker when every file checks out.
    pub fn verify(&self, variant: &str) -> Result<ArtifactState> {
        self.derive_state(lookup(variant)?, true)
    }

    /// Like [`verify`](Self::verify) but never touches the disk.
    pub fn inspect(&self, variant: &str) -> Result<ArtifactState> {
        self.derive_state(lookup(variant)?, false)
    }

    /// Read-only states of every catalog variant.
    ///
    /// A variant whose directory cannot be read is reported as `Unreadable`
    /// with the error; the others are still listed.
    pub fn list_states(&self) -> Vec<ArtifactState> {
        list_artifacts()
            .iter()
            .map(|spec| {
                self.derive_state(spec, false).unwrap_or_else(|e| {
                    tracing::warn!(variant = spec.variant, error = %e, "could not inspect artifact");
                    ArtifactState {
                        variant: spec.variant.to_string(),
                        status: ArtifactStatus::Unreadable,
                        bytes_present: 0,
                        required_files: spec.required_files(),
                        missing_files: BTreeSet::new(),
                        error: Some(e.to_string()),
                    }
                })
            })
            .collect()
    }

    /// Restore what can be restored locally.
    ///
    /// Embedded metadata is rewritten and empty files are dropped. If the
    /// variant is still broken and holds less than the wipe threshold, its
    /// directory is removed so the next acquisition starts clean; larger
    /// directories are left untouched.
    pub async fn repair(&self, variant: &str) -> Result<ArtifactState> {
        let spec = lookup(variant)?;
        let _guard = self.locks.lock(&spec.variant.to_string()).await;
        self.repair_locked(spec)
    }

    /// Make a variant usable, acquiring missing files as needed.
    ///
    /// Concurrent calls for one variant are serialized. Acquisition is
    /// attempted up to `max_retries` times with exponential backoff.
    pub async fn ensure_ready(&self, variant: &str) -> Result<ArtifactState> {
        let spec = lookup(variant)?;
        let _guard = self.locks.lock(&spec.variant.to_string()).await;

        let attempts = self.policy.max_retries.max(1);
        let mut backoff = self.policy.retry_backoff;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let state = self.derive_state(spec, true)?;
            match state.status {
                ArtifactStatus::Verified => return Ok(state),
                ArtifactStatus::Corrupted => {
                    tracing::warn!(variant, missing = ?state.missing_files, "artifact corrupted, repairing");
                    self.repair_locked(spec)?;
                }
                ArtifactStatus::Partial | ArtifactStatus::Missing | ArtifactStatus::Unreadable => {}
            }

            match self.acquire(spec).await {
                Ok(()) => {
                    let state = self.derive_state(spec, true)?;
                    if state.status == ArtifactStatus::Verified {
                        tracing::info!(variant, bytes = state.bytes_present, "artifact ready");
                        return Ok(state);
                    }
                    last_error = format!("still {:?} after acquisition", state.status);
                }
                Err(e @ (VoxgateError::Download { .. } | VoxgateError::Io(_))) => {
                    tracing::warn!(variant, attempt, error = %e, "artifact acquisition failed");
                    last_error = e.to_string();
                }
                Err(e) => return Err(e),
            }

            if attempt < attempts {
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
        }

        Err(VoxgateError::ArtifactUnavailable {
            variant: variant.to_string(),
            message: format!("gave up after {attempts} attempts: {last_error}"),
        })
    }

    fn repair_locked(&self, spec: &ArtifactSpec) -> Result<ArtifactState> {
        let dir = self.variant_dir(spec.variant);
        if !dir.is_dir() {
            return self.derive_state(spec, true);
        }

        for file in spec.files {
            if let Some(contents) = file.contents
                && !self.file_intact(spec, file)
            {
                tracing::info!(variant = spec.variant, file = file.name, "regenerating metadata");
                write_atomic(&dir.join(file.name), contents.as_bytes())?;
            }
        }

        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            if meta.is_file() && meta.len() == 0 && entry.file_name() != defaults::COMPLETE_MARKER {
                tracing::debug!(path = %entry.path().display(), "removing empty file");
                fs::remove_file(entry.path())?;
            }
        }

        let state = self.derive_state(spec, true)?;
        if state.status == ArtifactStatus::Verified {
            return Ok(state);
        }

        if state.bytes_present < self.policy.wipe_threshold_bytes {
            tracing::warn!(
                variant = spec.variant,
                bytes = state.bytes_present,
                "artifact unrecoverable, wiping"
            );
            fs::remove_dir_all(&dir)?;
            return self.derive_state(spec, true);
        }

        // Keep large data; a stale marker would only hide it from resumption.
        let marker = dir.join(defaults::COMPLETE_MARKER);
        if marker.exists() {
            fs::remove_file(&marker)?;
        }
        tracing::info!(
            variant = spec.variant,
            bytes = state.bytes_present,
            "keeping partial artifact data"
        );
        self.derive_state(spec, true)
    }

    async fn acquire(&self, spec: &ArtifactSpec) -> Result<()> {
        let dir = self.variant_dir(spec.variant);
        fs::create_dir_all(&dir)?;

        // Local metadata first so an unfetchable weights file still leaves it in place.
        for file in spec.files.iter().filter(|f| f.is_embedded()) {
            if let Some(contents) = file.contents
                && !self.file_intact(spec, file)
            {
                write_atomic(&dir.join(file.name), contents.as_bytes())?;
            }
        }

        for file in spec.files.iter().filter(|f| !f.is_embedded()) {
            if self.file_intact(spec, file) {
                continue;
            }
            let path = dir.join(file.name);

            let Some(url) = file.url else {
                return Err(VoxgateError::ArtifactUnavailable {
                    variant: spec.variant.to_string(),
                    message: format!("{} must be placed in {}", file.name, dir.display()),
                });
            };

            let part = part_path(&path);
            tracing::info!(variant = spec.variant, file = file.name, "fetching");
            self.fetcher.fetch(url, &part).await?;

            if let Some(expected) = self.expected_sha256(spec, file) {
                let actual = sha256_file(&part)?;
                if !actual.eq_ignore_ascii_case(&expected) {
                    fs::remove_file(&part)?;
                    return Err(VoxgateError::Download {
                        message: format!(
                            "checksum mismatch for {}: expected {expected}, got {actual}",
                            file.name
                        ),
                    });
                }
            }
            fs::rename(&part, &path)?;
        }
        Ok(())
    }

    /// Checksum a file must match: pinned in the policy, published in the
    /// catalog, or derived from embedded contents.
    fn expected_sha256(&self, spec: &ArtifactSpec, file: &ArtifactFile) -> Option<String> {
        self.policy
            .checksums
            .get(&format!("{}/{}", spec.variant, file.name))
            .cloned()
            .or_else(|| file.sha256.map(str::to_string))
            .or_else(|| file.contents.map(|c| sha256_bytes(c.as_bytes())))
    }

    fn file_intact(&self, spec: &ArtifactSpec, file: &ArtifactFile) -> bool {
        let path = self.file_path(spec.variant, file.name);
        let Ok(meta) = fs::metadata(&path) else {
            return false;
        };
        if !meta.is_file() || meta.len() == 0 {
            return false;
        }
        match self.expected_sha256(spec, file) {
            Some(expected) => self
                .digest(&path, &meta)
                .is_some_and(|actual| actual.eq_ignore_ascii_case(&expected)),
            None => true,
        }
    }

    /// SHA-256 of `path`, reused while its size and mtime are unchanged.
    fn digest(&self, path: &Path, meta: &fs::Metadata) -> Option<String> {
        let modified = meta.modified().ok();
        let mut digests = match self.digests.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(cached) = digests.get(path)
            && cached.len == meta.len()
            && cached.modified.is_some()
            && cached.modified == modified
        {
            return Some(cached.sha256.clone());
        }

        let sha256 = match sha256_file(path) {
            Ok(sha256) => sha256,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not hash artifact file");
                return None;
            }
        };
        digests.insert(
            path.to_path_buf(),
            CachedDigest {
                len: meta.len(),
                modified,
                sha256: sha256.clone(),
            },
        );
        Some(sha256)
    }

    fn derive_state(&self, spec: &ArtifactSpec, record_marker: bool) -> Result<ArtifactState> {
        let dir = self.variant_dir(spec.variant);
        let bytes_present = dir_size(&dir)?;
        let required_files = spec.required_files();
        let missing_files: BTreeSet<String> = spec
            .files
            .iter()
            .filter(|f| !self.file_intact(spec, f))
            .map(|f| f.name.to_string())
            .collect();
        let marker = dir.join(defaults::COMPLETE_MARKER);

        let status = if missing_files.is_empty() {
            if record_marker && !marker.exists() {
                fs::write(&marker, format!("{}\n", spec.variant))?;
            }
            ArtifactStatus::Verified
        } else if bytes_present == 0 {
            ArtifactStatus::Missing
        } else if marker.exists() {
            ArtifactStatus::Corrupted
        } else {
            ArtifactStatus::Partial
        };

        Ok(ArtifactState {
            variant: spec.variant.to_string(),
            status,
            bytes_present,
            required_files,
            missing_files,
            error: None,
        })
    }
}

fn lookup(variant: &str) -> Result<&'static ArtifactSpec> {
    get_artifact(variant).ok_or_else(|| VoxgateError::UnknownArtifact {
        variant: variant.to_string(),
    })
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(defaults::PARTIAL_SUFFIX);
    PathBuf::from(name)
}

fn dir_size(dir: &Path) -> Result<u64> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };
    let mut total = 0;
    for entry in entries {
        let meta = entry?.metadata()?;
        if meta.is_file() {
            total += meta.len();
        }
    }
    Ok(total)
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp = part_path(path);
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Writes a fixed payload, failing the first `failures` calls.
    struct FakeFetcher {
        payload: Vec<u8>,
        failures: usize,
        calls: AtomicUsize,
    }

    impl FakeFetcher {
        fn new(payload: &[u8]) -> Self {
            Self {
                payload: payload.to_vec(),
                failures: 0,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(payload: &[u8], failures: usize) -> Self {
            Self {
                failures,
                ..Self::new(payload)
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ArtifactFetcher for FakeFetcher {
        async fn fetch(&self, _url: &str, dest: &Path) -> Result<u64> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(VoxgateError::Download {
                    message: "connection reset".to_string(),
                });
            }
            fs::write(dest, &self.payload)?;
            Ok(self.payload.len() as u64)
        }
    }

    fn fast_policy() -> StorePolicy {
        StorePolicy {
            retry_backoff: Duration::from_millis(1),
            ..StorePolicy::default()
        }
    }

    fn store_with(dir: &TempDir, fetcher: Arc<dyn ArtifactFetcher>) -> ArtifactStore {
        ArtifactStore::new(dir.path(), fetcher, fast_policy())
    }

    #[test]
    fn test_missing_when_nothing_on_disk() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, Arc::new(FakeFetcher::new(b"w")));
        let state = store.verify("tiny").unwrap();
        assert_eq!(state.status, ArtifactStatus::Missing);
        assert_eq!(state.bytes_present, 0);
        assert!(state.missing_files.contains("ggml-tiny.bin"));
    }

    #[test]
    fn test_verified_writes_marker() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, Arc::new(FakeFetcher::new(b"w")));
        fs::create_dir_all(store.variant_dir("tiny")).unwrap();
        fs::write(store.file_path("tiny", "ggml-tiny.bin"), b"weights").unwrap();

        let state = store.verify("tiny").unwrap();
        assert_eq!(state.status, ArtifactStatus::Verified);
        assert!(state.missing_files.is_empty());
        assert!(store.file_path("tiny", ".download_complete").exists());
    }

    #[test]
    fn test_part_file_is_partial() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, Arc::new(FakeFetcher::new(b"w")));
        fs::create_dir_all(store.variant_dir("base")).unwrap();
        fs::write(store.file_path("base", "ggml-base.bin.part"), b"half").unwrap();

        let state = store.verify("base").unwrap();
        assert_eq!(state.status, ArtifactStatus::Partial);
        assert_eq!(state.bytes_present, 4);
    }

    #[test]
    fn test_marker_with_broken_metadata_is_corrupted() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, Arc::new(FakeFetcher::new(b"w")));
        let variant = "fi-specialized";
        fs::create_dir_all(store.variant_dir(variant)).unwrap();
        fs::write(store.file_path(variant, "ggml-model.bin"), b"weights").unwrap();
        fs::write(store.file_path(variant, "config.json"), b"{\"hidden_size\": 1024}").unwrap();
        fs::write(store.file_path(variant, "vocab.json"), b"{}").unwrap();
        fs::write(store.file_path(variant, ".download_complete"), b"x").unwrap();

        let state = store.verify(variant).unwrap();
        assert_eq!(state.status, ArtifactStatus::Corrupted);
        assert!(state.missing_files.contains("config.json"));
        assert!(state.missing_files.contains("vocab.json"));
        assert!(!state.missing_files.contains("ggml-model.bin"));
    }

    #[tokio::test]
    async fn test_repair_regenerates_metadata() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, Arc::new(FakeFetcher::new(b"w")));
        let variant = "fi-specialized";
        fs::create_dir_all(store.variant_dir(variant)).unwrap();
        fs::write(store.file_path(variant, "ggml-model.bin"), b"weights").unwrap();
        fs::write(store.file_path(variant, "config.json"), b"garbage").unwrap();
        fs::write(store.file_path(variant, ".download_complete"), b"x").unwrap();

        let state = store.repair(variant).await.unwrap();
        assert_eq!(state.status, ArtifactStatus::Verified);
        let config = fs::read_to_string(store.file_path(variant, "config.json")).unwrap();
        assert!(config.contains("\"vocab_size\": 35"));
    }

    #[tokio::test]
    async fn test_repair_wipes_small_unrecoverable_directory() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, Arc::new(FakeFetcher::new(b"w")));
        fs::create_dir_all(store.variant_dir("tiny")).unwrap();
        fs::write(store.file_path("tiny", "ggml-tiny.bin.part"), vec![1u8; 1000]).unwrap();

        let state = store.repair("tiny").await.unwrap();
        assert_eq!(state.status, ArtifactStatus::Missing);
        assert!(!store.variant_dir("tiny").exists());
    }

    #[tokio::test]
    async fn test_large_partial_download_is_never_discarded() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, Arc::new(FakeFetcher::new(b"w")));
        fs::create_dir_all(store.variant_dir("small")).unwrap();
        let part = store.file_path("small", "ggml-small.bin.part");
        let file = fs::File::create(&part).unwrap();
        file.set_len(50 * 1024 * 1024).unwrap();
        drop(file);

        for _ in 0..3 {
            let state = store.verify("small").unwrap();
            assert_eq!(state.status, ArtifactStatus::Partial);
            let state = store.repair("small").await.unwrap();
            assert_eq!(state.status, ArtifactStatus::Partial);
            assert_eq!(state.bytes_present, 50 * 1024 * 1024);
        }
        assert_eq!(fs::metadata(&part).unwrap().len(), 50 * 1024 * 1024);
    }

    #[tokio::test]
    async fn test_repair_removes_empty_files() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, Arc::new(FakeFetcher::new(b"w")));
        fs::create_dir_all(store.variant_dir("small")).unwrap();
        fs::write(store.file_path("small", "ggml-small.bin"), b"").unwrap();
        let big = fs::File::create(store.file_path("small", "leftover.part")).unwrap();
        big.set_len(2 * 1024 * 1024).unwrap();
        drop(big);

        let state = store.repair("small").await.unwrap();
        assert_eq!(state.status, ArtifactStatus::Partial);
        assert!(!store.file_path("small", "ggml-small.bin").exists());
    }

    #[tokio::test]
    async fn test_ensure_ready_downloads_and_verifies() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(FakeFetcher::new(b"ggml weights"));
        let store = store_with(&dir, fetcher.clone());

        let state = store.ensure_ready("tiny").await.unwrap();
        assert_eq!(state.status, ArtifactStatus::Verified);
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(
            fs::read(store.file_path("tiny", "ggml-tiny.bin")).unwrap(),
            b"ggml weights"
        );
        assert!(!store.file_path("tiny", "ggml-tiny.bin.part").exists());

        // Second call is a cheap verify.
        store.ensure_ready("tiny").await.unwrap();
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_ensure_ready_retries_then_succeeds() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(FakeFetcher::failing(b"w", 2));
        let store = store_with(&dir, fetcher.clone());

        let state = store.ensure_ready("base").await.unwrap();
        assert_eq!(state.status, ArtifactStatus::Verified);
        assert_eq!(fetcher.calls(), 3);
    }

    #[tokio::test]
    async fn test_ensure_ready_gives_up_after_budget() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(FakeFetcher::failing(b"w", 100));
        let store = store_with(&dir, fetcher.clone());

        let err = store.ensure_ready("base").await.unwrap_err();
        assert!(matches!(err, VoxgateError::ArtifactUnavailable { .. }));
        assert_eq!(fetcher.calls(), 3);
    }

    #[tokio::test]
    async fn test_ensure_ready_without_url_fails_fast() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(FakeFetcher::new(b"w"));
        let store = store_with(&dir, fetcher.clone());

        let err = store.ensure_ready("fi-specialized").await.unwrap_err();
        assert!(matches!(err, VoxgateError::ArtifactUnavailable { .. }));
        assert_eq!(fetcher.calls(), 0);
        // Embedded metadata was still written.
        assert!(store.file_path("fi-specialized", "vocab.json").exists());
    }

    #[tokio::test]
    async fn test_ensure_ready_repairs_corrupted_metadata() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(FakeFetcher::new(b"w"));
        let store = store_with(&dir, fetcher.clone());
        let variant = "fi-specialized";
        fs::create_dir_all(store.variant_dir(variant)).unwrap();
        fs::write(store.file_path(variant, "ggml-model.bin"), b"weights").unwrap();
        fs::write(store.file_path(variant, "vocab.json"), b"{\"a\": 1}").unwrap();
        fs::write(store.file_path(variant, ".download_complete"), b"x").unwrap();

        let state = store.ensure_ready(variant).await.unwrap();
        assert_eq!(state.status, ArtifactStatus::Verified);
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_ensure_ready_fetches_once() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(FakeFetcher::new(b"w"));
        let store = Arc::new(store_with(&dir, fetcher.clone()));

        let mut tasks = Vec::new();
        for _ in 0..10 {
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move { store.ensure_ready("tiny").await }));
        }
        for task in tasks {
            assert_eq!(
                task.await.unwrap().unwrap().status,
                ArtifactStatus::Verified
            );
        }
        assert_eq!(fetcher.calls(), 1);
    }

    #[test]
    fn test_unknown_variant() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, Arc::new(FakeFetcher::new(b"w")));
        assert!(matches!(
            store.verify("nope"),
            Err(VoxgateError::UnknownArtifact { .. })
        ));
    }

    #[test]
    fn test_list_states_covers_catalog() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, Arc::new(FakeFetcher::new(b"w")));
        let states = store.list_states();
        assert_eq!(states.len(), list_artifacts().len());
        assert!(states.iter().all(|s| s.status == ArtifactStatus::Missing));
    }

    #[test]
    fn test_list_states_does_not_write_marker() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, Arc::new(FakeFetcher::new(b"w")));
        fs::create_dir_all(store.variant_dir("tiny")).unwrap();
        fs::write(store.file_path("tiny", "ggml-tiny.bin"), b"weights").unwrap();

        let states = store.list_states();
        let tiny = states.iter().find(|s| s.variant == "tiny").unwrap();
        assert_eq!(tiny.status, ArtifactStatus::Verified);
        assert_eq!(store.inspect("tiny").unwrap().status, ArtifactStatus::Verified);
        assert!(!store.file_path("tiny", ".download_complete").exists());
    }

    #[test]
    fn test_unreadable_variant_is_reported_alone() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, Arc::new(FakeFetcher::new(b"w")));
        // A plain file where the variant directory should be.
        fs::write(store.variant_dir("base"), b"not a directory").unwrap();

        let states = store.list_states();
        assert_eq!(states.len(), list_artifacts().len());
        let base = states.iter().find(|s| s.variant == "base").unwrap();
        assert_eq!(base.status, ArtifactStatus::Unreadable);
        assert!(base.error.is_some());
        assert!(
            states
                .iter()
                .filter(|s| s.variant != "base")
                .all(|s| s.status == ArtifactStatus::Missing && s.error.is_none())
        );
    }

    fn pinned(dir: &TempDir, fetcher: Arc<dyn ArtifactFetcher>, key: &str, payload: &[u8]) -> ArtifactStore {
        let mut policy = fast_policy();
        policy
            .checksums
            .insert(key.to_string(), sha256_bytes(payload).to_uppercase());
        ArtifactStore::new(dir.path(), fetcher, policy)
    }

    #[test]
    fn test_checksum_mismatch_after_verification_is_corrupted() {
        let dir = TempDir::new().unwrap();
        let store = pinned(&dir, Arc::new(FakeFetcher::new(b"w")), "tiny/ggml-tiny.bin", b"weights");
        fs::create_dir_all(store.variant_dir("tiny")).unwrap();
        let weights = store.file_path("tiny", "ggml-tiny.bin");
        fs::write(&weights, b"weights").unwrap();
        assert_eq!(store.verify("tiny").unwrap().status, ArtifactStatus::Verified);

        // Different length, so the cached digest cannot be reused.
        fs::write(&weights, b"damaged!!").unwrap();
        let state = store.verify("tiny").unwrap();
        assert_eq!(state.status, ArtifactStatus::Corrupted);
        assert!(state.missing_files.contains("ggml-tiny.bin"));
    }

    #[test]
    fn test_checksum_mismatch_without_marker_is_partial() {
        let dir = TempDir::new().unwrap();
        let store = pinned(&dir, Arc::new(FakeFetcher::new(b"w")), "tiny/ggml-tiny.bin", b"weights");
        fs::create_dir_all(store.variant_dir("tiny")).unwrap();
        fs::write(store.file_path("tiny", "ggml-tiny.bin"), b"other").unwrap();

        let state = store.verify("tiny").unwrap();
        assert_eq!(state.status, ArtifactStatus::Partial);
        assert!(!store.file_path("tiny", ".download_complete").exists());
    }

    #[tokio::test]
    async fn test_download_with_wrong_checksum_is_rejected() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(FakeFetcher::new(b"tampered"));
        let store = pinned(&dir, fetcher.clone(), "tiny/ggml-tiny.bin", b"weights");

        let err = store.ensure_ready("tiny").await.unwrap_err();
        match err {
            VoxgateError::ArtifactUnavailable { message, .. } => {
                assert!(message.contains("checksum mismatch"), "{message}")
            }
            other => panic!("expected ArtifactUnavailable, got {other:?}"),
        }
        assert_eq!(fetcher.calls(), 3);
        assert!(!store.file_path("tiny", "ggml-tiny.bin").exists());
        assert!(!part_path(&store.file_path("tiny", "ggml-tiny.bin")).exists());
    }

    #[tokio::test]
    async fn test_download_with_matching_checksum_is_verified() {
        let dir = TempDir::new().unwrap();
        let store = pinned(&dir, Arc::new(FakeFetcher::new(b"weights")), "tiny/ggml-tiny.bin", b"weights");
        let state = store.ensure_ready("tiny").await.unwrap();
        assert_eq!(state.status, ArtifactStatus::Verified);
    }
}
