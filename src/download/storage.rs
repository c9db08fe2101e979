//! Local storage for downloaded audio.
//!
//! Bytes go to a hidden `.{name}.part` file next to the target. The partial
//! file is removed when the writer is dropped without [`PartialWrite::commit`],
//! so a failed, timed-out or cancelled transfer never leaves debris behind.
//! Commit is an atomic rename onto the final name.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;

use crate::extraction::AudioFormat;
use crate::model::Track;

/// Longest file name we produce in bytes, extension included. The
/// `.{name}.part` form must stay within the common 255-byte limit.
const MAX_NAME_LEN: usize = 200;

/// Errors from local storage
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Failed to create {0}: {1}")]
    Create(PathBuf, std::io::Error),

    #[error("Failed to write {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to move {0} into place: {1}")]
    Commit(PathBuf, std::io::Error),
}

/// Creates scoped files for downloads.
#[async_trait]
pub trait LocalStorage: Send + Sync {
    /// Start writing the content of `track` in `format`.
    async fn create(&self, track: &Track, format: AudioFormat) -> Result<Box<dyn PartialWrite>, StorageError>;
}

/// An in-progress file. Dropping it without committing discards it.
#[async_trait]
pub trait PartialWrite: Send {
    async fn write(&mut self, chunk: &[u8]) -> Result<(), StorageError>;

    /// Flush and move into place, returning the final path.
    async fn commit(self: Box<Self>) -> Result<PathBuf, StorageError>;
}

/// Target file name: `"{artist} - {title} [{hash8}].{ext}"`.
pub fn file_name(track: &Track, format: AudioFormat) -> String {
    let suffix = format!(" [{}].{}", short_hash(track.id.as_str()), format.extension());
    let budget = MAX_NAME_LEN.saturating_sub(suffix.len());

    let stem = sanitize_filename(&track.display_name());
    let stem = truncate_bytes(&stem, budget).trim_end_matches([' ', '.']);
    let stem = if stem.is_empty() { "track" } else { stem };

    format!("{stem}{suffix}")
}

/// Longest prefix of `s` that fits in `max` bytes, cut on a char boundary.
fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// First 8 hex chars of the SHA-256 of `input`.
fn short_hash(input: &str) -> String {
    Sha256::digest(input.as_bytes())
        .iter()
        .take(4)
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Replace characters that are invalid in file names on common platforms.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            _ => c,
        })
        .collect::<String>()
        .trim_start_matches(['.', ' '])
        .to_string()
}

// ============================================================================
// Filesystem storage
// ============================================================================

/// Stores downloads in one directory.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl LocalStorage for FsStorage {
    async fn create(&self, track: &Track, format: AudioFormat) -> Result<Box<dyn PartialWrite>, StorageError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StorageError::Create(self.root.clone(), e))?;

        let name = file_name(track, format);
        let target = self.root.join(&name);
        let part = self.root.join(format!(".{name}.part"));

        let file = tokio::fs::File::create(&part)
            .await
            .map_err(|e| StorageError::Create(part.clone(), e))?;

        Ok(Box::new(FsPartial {
            file: Some(file),
            part,
            target,
            committed: false,
        }))
    }
}

struct FsPartial {
    file: Option<tokio::fs::File>,
    part: PathBuf,
    target: PathBuf,
    committed: bool,
}

#[async_trait]
impl PartialWrite for FsPartial {
    async fn write(&mut self, chunk: &[u8]) -> Result<(), StorageError> {
        let Some(file) = self.file.as_mut() else {
            return Err(StorageError::Write(
                self.part.clone(),
                std::io::Error::other("writer already closed"),
            ));
        };
        file.write_all(chunk)
            .await
            .map_err(|e| StorageError::Write(self.part.clone(), e))
    }

    async fn commit(mut self: Box<Self>) -> Result<PathBuf, StorageError> {
        if let Some(mut file) = self.file.take() {
            file.flush().await.map_err(|e| StorageError::Write(self.part.clone(), e))?;
            file.sync_all().await.map_err(|e| StorageError::Write(self.part.clone(), e))?;
        }
        tokio::fs::rename(&self.part, &self.target)
            .await
            .map_err(|e| StorageError::Commit(self.target.clone(), e))?;
        self.committed = true;
        Ok(self.target.clone())
    }
}

impl Drop for FsPartial {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        drop(self.file.take());
        if let Err(e) = std::fs::remove_file(&self.part)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(target: "download", "Failed to remove partial file {:?}: {}", self.part, e);
        }
    }
}

#[cfg(test)]
pub mod mocks {
    use std::collections::HashMap;
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    /// Shared state of a [`MemoryStorage`] and its writers.
    #[derive(Default)]
    pub struct MemoryFiles {
        pub committed: HashMap<PathBuf, Vec<u8>>,
        /// Writers created and not yet committed or dropped
        pub open: usize,
    }

    /// Storage that keeps files in memory.
    #[derive(Default, Clone)]
    pub struct MemoryStorage {
        pub files: Arc<Mutex<MemoryFiles>>,
        /// Fail this many `create` calls before succeeding
        pub failures: Arc<Mutex<u32>>,
    }

    impl MemoryStorage {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing(times: u32) -> Self {
            let storage = Self::default();
            *storage.failures.lock() = times;
            storage
        }

        pub fn committed(&self) -> HashMap<PathBuf, Vec<u8>> {
            self.files.lock().committed.clone()
        }

        pub fn open_writers(&self) -> usize {
            self.files.lock().open
        }
    }

    #[async_trait]
    impl LocalStorage for MemoryStorage {
        async fn create(&self, track: &Track, format: AudioFormat) -> Result<Box<dyn PartialWrite>, StorageError> {
            let path = PathBuf::from("/mem").join(file_name(track, format));
            {
                let mut failures = self.failures.lock();
                if *failures > 0 {
                    *failures -= 1;
                    return Err(StorageError::Create(path, std::io::Error::other("disk full")));
                }
            }
            self.files.lock().open += 1;
            Ok(Box::new(MemoryPartial {
                files: self.files.clone(),
                path,
                data: Vec::new(),
            }))
        }
    }

    struct MemoryPartial {
        files: Arc<Mutex<MemoryFiles>>,
        path: PathBuf,
        data: Vec<u8>,
    }

    #[async_trait]
    impl PartialWrite for MemoryPartial {
        async fn write(&mut self, chunk: &[u8]) -> Result<(), StorageError> {
            self.data.extend_from_slice(chunk);
            Ok(())
        }

        async fn commit(mut self: Box<Self>) -> Result<PathBuf, StorageError> {
            let data = std::mem::take(&mut self.data);
            self.files.lock().committed.insert(self.path.clone(), data);
            Ok(self.path.clone())
        }
    }

    impl Drop for MemoryPartial {
        fn drop(&mut self) {
            self.files.lock().open -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProviderKind;
    use crate::test_utils::mock_track;
    use proptest::prelude::*;

    fn track() -> Track {
        mock_track(ProviderKind::YouTube, "dQw4w9WgXcQ", "Never: Gonna?", "Rick/Astley", 213)
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_file_name_shape() {
        let track = track();
        let name = file_name(&track, AudioFormat::M4a);
        assert!(name.starts_with("Rick_Astley - Never_ Gonna_ ["));
        assert!(name.ends_with("].m4a"));
        assert_eq!(name, file_name(&track, AudioFormat::M4a));
    }

    #[test]
    fn test_file_name_differs_per_track() {
        let a = track();
        let b = track();
        assert_ne!(file_name(&a, AudioFormat::M4a), file_name(&b, AudioFormat::M4a));
    }

    #[test]
    fn test_long_names_are_truncated() {
        let mut track = track();
        track.title = "x".repeat(500);
        let name = file_name(&track, AudioFormat::Webm);
        assert!(name.len() <= MAX_NAME_LEN);
        assert!(name.ends_with(".webm"));
    }

    #[test]
    fn test_multibyte_names_fit_in_bytes() {
        let mut track = track();
        track.title = "愛".repeat(90);
        track.artist = "歌手".to_string();
        let name = file_name(&track, AudioFormat::M4a);
        assert!(name.len() <= MAX_NAME_LEN, "{} bytes", name.len());
        assert!(name.starts_with("歌手 - 愛"));
        assert!(name.ends_with(".m4a"));
        assert!(format!(".{name}.part").len() <= 255);
    }

    #[tokio::test]
    async fn test_create_accepts_long_multibyte_title() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsStorage::new(dir.path());
        let mut track = track();
        track.title = "Любовь".repeat(40);
        let mut partial = storage.create(&track, AudioFormat::Ogg).await.unwrap();
        partial.write(b"OggS").await.unwrap();
        let path = partial.commit().await.unwrap();
        assert!(path.file_name().unwrap().len() <= MAX_NAME_LEN);
    }

    #[tokio::test]
    async fn test_commit_moves_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsStorage::new(dir.path().join("music"));
        let mut partial = storage.create(&track(), AudioFormat::Mp3).await.unwrap();
        partial.write(b"ID3").await.unwrap();
        partial.write(b"data").await.unwrap();
        let path = partial.commit().await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"ID3data");
        assert_eq!(dir_entries(storage.root()).len(), 1);
    }

    #[tokio::test]
    async fn test_drop_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsStorage::new(dir.path());
        let mut partial = storage.create(&track(), AudioFormat::M4a).await.unwrap();
        partial.write(b"half").await.unwrap();
        assert_eq!(dir_entries(dir.path()).len(), 1);

        drop(partial);
        assert!(dir_entries(dir.path()).is_empty());
    }

    fn arbitrary_filename() -> impl Strategy<Value = String> {
        prop::string::string_regex("[a-zA-Z0-9 ./:*?\"<>|_\\\\-]{1,80}").unwrap()
    }

    proptest! {
        #[test]
        fn sanitize_removes_invalid_chars(input in arbitrary_filename()) {
            let sanitized = sanitize_filename(&input);
            for c in ['/', '\\', ':', '*', '?', '"', '<', '>', '|'] {
                prop_assert!(!sanitized.contains(c), "Found {} in: {}", c, sanitized);
            }
            prop_assert!(!sanitized.starts_with('.'));
        }

        #[test]
        fn file_names_fit_and_keep_extension(title in arbitrary_filename(), artist in arbitrary_filename()) {
            let mut track = track();
            track.title = title;
            track.artist = artist;
            let name = file_name(&track, AudioFormat::Ogg);
            prop_assert!(name.len() <= MAX_NAME_LEN);
            prop_assert!(name.ends_with(".ogg"));
            prop_assert!(!name.contains('/'));
        }
    }
}
