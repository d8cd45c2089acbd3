//! Staging area for uploads
//!
//! An upload is written to a uniquely named file before the model sees it. The
//! returned `StagedFile` owns that file: it is removed by `release`, or by `Drop` when
//! the request future goes away early.

use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::logger;

/// Directory holding staged uploads
#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
}

impl StagingArea {
    /// Open the staging directory, creating it if absent
    pub async fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `data` in full to `temp_<uuid>_<filename>`
    ///
    /// The guard exists before the first byte is written, so a failed write
    /// leaves nothing behind.
    pub async fn stage(&self, filename: &str, data: &[u8]) -> io::Result<StagedFile> {
        let name = format!("temp_{}_{}", Uuid::new_v4().simple(), base_name(filename));
        let staged = StagedFile {
            path: self.dir.join(name),
            released: false,
        };

        tokio::fs::write(&staged.path, data).await?;
        logger::log_upload_staged(&staged.path, data.len());
        Ok(staged)
    }
}

/// Strip any directory part the client put in the declared filename
fn base_name(filename: &str) -> String {
    let last = filename
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();
    match last {
        "" | "." | ".." => "upload".to_string(),
        name => name.to_string(),
    }
}

/// A staged upload on disk, removed when released or dropped
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    released: bool,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the staged file. Removing an already missing file is not an error.
    pub async fn release(mut self) {
        self.released = true;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => logger::log_staging_released(&self.path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => logger::log_warning(&format!(
                "Failed to remove staged upload {}: {e}",
                self.path.display()
            )),
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => logger::log_staging_released(&self.path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => logger::log_warning(&format!(
                "Failed to remove staged upload {}: {e}",
                self.path.display()
            )),
        }
    }
}
