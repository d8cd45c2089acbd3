//! Output artifact store
//!
//! Generated videos land in a fixed directory under a fresh name. Serving them is
//! left to whatever static file server exposes that directory.

use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::logger;

/// A persisted output video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    /// Relative URL the file is served under
    pub url: String,
}

/// Directory of generated videos
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    public_path: String,
    prefix: String,
}

impl ArtifactStore {
    /// Open the output directory, creating it if absent
    pub async fn open(storage: &StorageConfig) -> io::Result<Self> {
        let dir = PathBuf::from(&storage.output_dir);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            public_path: storage.public_path.trim_end_matches('/').to_string(),
            prefix: storage.output_prefix.clone(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `data` in full under `<prefix><uuid>.mp4`
    ///
    /// A partially written file is removed before the error is returned.
    pub async fn persist(&self, data: &[u8]) -> io::Result<Artifact> {
        let name = format!("{}{}.mp4", self.prefix, Uuid::new_v4().simple());
        let path = self.dir.join(&name);

        if let Err(e) = tokio::fs::write(&path, data).await {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e);
        }

        logger::log_artifact_persisted(&path, data.len());
        Ok(Artifact {
            path,
            url: format!("{}/{name}", self.public_path),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(dir: &Path) -> StorageConfig {
        StorageConfig {
            output_dir: dir.join("videos").to_string_lossy().to_string(),
            staging_dir: dir.join("tmp").to_string_lossy().to_string(),
            public_path: "/uploads/videos/".to_string(),
            output_prefix: "dotted_".to_string(),
        }
    }

    #[tokio::test]
    async fn test_persist() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(&storage(tmp.path())).await.unwrap();
        assert!(store.dir().is_dir());

        let artifact = store.persist(b"dotted").await.unwrap();
        assert_eq!(std::fs::read(&artifact.path).unwrap(), b"dotted");

        let name = artifact.path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("dotted_"));
        assert!(name.ends_with(".mp4"));
        assert_eq!(artifact.url, format!("/uploads/videos/{name}"));
    }

    #[tokio::test]
    async fn test_names_are_unique() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(&storage(tmp.path())).await.unwrap();

        let a = store.persist(b"a").await.unwrap();
        let b = store.persist(b"b").await.unwrap();
        assert_ne!(a.url, b.url);
    }
}
