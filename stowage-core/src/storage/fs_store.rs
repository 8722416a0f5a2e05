//! Local filesystem content backend

use crate::error::{Result, StowageError};
use crate::storage::ContentStore;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, MAIN_SEPARATOR, Path, PathBuf};
use tokio::fs;

/// Stores each blob as a file under a sandboxed root.
///
/// Ids may look like relative paths (`a/b/c`); every segment becomes a
/// directory level. Parent-directory tokens are stripped from each segment and
/// the joined path must still lie strictly under the canonical root.
pub struct FsContentStore {
    root: PathBuf,
}

impl FsContentStore {
    /// Create the store, creating and canonicalizing `root`.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        std::fs::create_dir_all(root.as_ref())?;
        let root = std::fs::canonicalize(root.as_ref())?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lexically map an id onto a path under the root.
    ///
    /// Performs no I/O. Fails with `PathSafety` when the result is not
    /// strictly below the root.
    pub fn map_path(&self, id: &str) -> Result<PathBuf> {
        let mut joined = self.root.clone();
        for segment in id.replace('\\', "/").split('/') {
            let segment = segment.replace("..", "");
            if segment.is_empty() {
                continue;
            }
            joined.push(segment);
        }

        let resolved = normalize_lexically(&joined);

        let mut root_prefix = self.root.to_string_lossy().into_owned();
        if !root_prefix.ends_with(MAIN_SEPARATOR) {
            root_prefix.push(MAIN_SEPARATOR);
        }

        if !resolved.to_string_lossy().starts_with(&root_prefix) {
            return Err(StowageError::PathSafety(format!(
                "id {:?} resolves outside the storage root",
                id
            )));
        }

        Ok(resolved)
    }

    /// Map an id and verify that no symlink along the existing part of the
    /// path leads outside the root.
    async fn contained_path(&self, id: &str) -> Result<PathBuf> {
        let path = self.map_path(id)?;

        let mut existing = path.as_path();
        loop {
            match fs::symlink_metadata(existing).await {
                Ok(_) => break,
                Err(error) if is_absent(&error) => {
                    existing = match existing.parent() {
                        Some(parent) => parent,
                        None => break,
                    };
                }
                Err(error) => return Err(error.into()),
            }
        }

        let canonical = fs::canonicalize(existing).await?;
        if !canonical.starts_with(&self.root) {
            return Err(StowageError::PathSafety(format!(
                "id {:?} escapes the storage root through a link",
                id
            )));
        }

        Ok(path)
    }
}

/// A missing entry, or a path that runs through a regular file.
fn is_absent(error: &std::io::Error) -> bool {
    matches!(
        error.kind(),
        std::io::ErrorKind::NotFound | std::io::ErrorKind::NotADirectory
    )
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

#[async_trait]
impl ContentStore for FsContentStore {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    async fn save(&self, id: &str, data: Bytes) -> Result<()> {
        let path = self.contained_path(id).await?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Written in place: a get racing this save can observe a partial file.
        fs::write(&path, &data).await?;

        tracing::debug!("Stored {} bytes for blob {} at {:?}", data.len(), id, path);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Bytes> {
        let path = self.contained_path(id).await?;
        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(error) if is_absent(&error) => {
                Err(StowageError::NotFound(id.to_string()))
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        let path = self.contained_path(id).await?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(error) if is_absent(&error) => Ok(false),
            Err(error) => Err(error.into()),
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let path = self.contained_path(id).await?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(error) if is_absent(&error) => {
                tracing::debug!("Delete of missing blob {} ignored", id);
                Ok(())
            }
            Err(error) => Err(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, FsContentStore) {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::new(temp_dir.path().join("blobs")).unwrap();
        (temp_dir, store)
    }

    #[tokio::test]
    async fn test_roundtrip_and_overwrite() {
        let (_temp, store) = store();

        store.save("blob-1", Bytes::from("first")).await.unwrap();
        assert_eq!(store.get("blob-1").await.unwrap(), Bytes::from("first"));

        store.save("blob-1", Bytes::from("second!")).await.unwrap();
        assert_eq!(store.get("blob-1").await.unwrap(), Bytes::from("second!"));
        assert!(store.exists("blob-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_nested_id_creates_directories() {
        let (_temp, store) = store();

        store.save("a/b/c", Bytes::from("nested")).await.unwrap();
        assert!(store.root().join("a").join("b").join("c").is_file());
        assert_eq!(store.get("a/b/c").await.unwrap(), Bytes::from("nested"));
    }

    #[tokio::test]
    async fn test_missing_blob() {
        let (_temp, store) = store();

        assert!(matches!(
            store.get("missing").await,
            Err(StowageError::NotFound(_))
        ));
        assert!(!store.exists("missing").await.unwrap());
        store.delete("missing").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_removes_file() {
        let (_temp, store) = store();

        store.save("gone", Bytes::from("x")).await.unwrap();
        store.delete("gone").await.unwrap();
        assert!(!store.exists("gone").await.unwrap());
    }

    #[tokio::test]
    async fn test_traversal_segments_stay_under_root() {
        let (temp, store) = store();

        let mapped = store.map_path("../../etc/passwd").unwrap();
        assert!(mapped.starts_with(store.root()));

        store
            .save("../../outside.txt", Bytes::from("contained"))
            .await
            .unwrap();
        assert!(store.root().join("outside.txt").is_file());
        assert!(!temp.path().join("outside.txt").exists());

        let mapped = store.map_path("..\\..\\windows\\system32").unwrap();
        assert!(mapped.starts_with(store.root()));
    }

    #[tokio::test]
    async fn test_id_below_a_regular_file_is_absent() {
        let (_temp, store) = store();

        store.save("a", Bytes::from("file")).await.unwrap();

        assert!(!store.exists("a/b").await.unwrap());
        store.delete("a/b").await.unwrap();
        assert!(store.get("a/b").await.unwrap_err().is_not_found());
        assert_eq!(store.get("a").await.unwrap(), Bytes::from("file"));
    }

    #[test]
    fn test_ids_resolving_to_root_are_rejected() {
        let (_temp, store) = store();

        for id in ["", "..", "../..", ".", "/", "./.."] {
            assert!(
                matches!(store.map_path(id), Err(StowageError::PathSafety(_))),
                "id {:?} should be rejected",
                id
            );
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_escape_is_rejected() {
        let (temp, store) = store();
        let outside = temp.path().join("outside");
        std::fs::create_dir_all(&outside).unwrap();
        std::os::unix::fs::symlink(&outside, store.root().join("link")).unwrap();

        let result = store.save("link/secret", Bytes::from("leak")).await;
        assert!(matches!(result, Err(StowageError::PathSafety(_))));
        assert!(!outside.join("secret").exists());

        assert!(matches!(
            store.get("link/secret").await,
            Err(StowageError::PathSafety(_))
        ));
    }
}
