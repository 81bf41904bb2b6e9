//! Content-addressable storage for rendered graph images.
//!
//! One flat directory of `<image_id>.png` files. Ids carry 96 bits of
//! CSPRNG entropy, so collisions are not checked for and writes need no
//! cross-request coordination.

use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use rand_core::{OsRng, RngCore};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::errors::{GraphError, Result};

/// Byte length of the random identifier (16 base64 chars, no padding).
const IMAGE_ID_BYTES: usize = 12;
const IMAGE_ID_CHARS: usize = 16;

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist PNG bytes under a fresh random identifier.
    pub async fn store(&self, bytes: &[u8]) -> Result<String> {
        let mut raw = [0u8; IMAGE_ID_BYTES];
        OsRng.fill_bytes(&mut raw);
        let image_id = URL_SAFE.encode(raw);

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| GraphError::Storage(format!("creating {:?}: {e}", self.dir)))?;

        let path = self.image_path(&image_id);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| GraphError::Storage(format!("writing {path:?}: {e}")))?;

        info!("stored graph image {image_id} ({} bytes)", bytes.len());
        Ok(image_id)
    }

    /// Read an image back by id.
    ///
    /// Ids that are not 16 URL-safe base64 characters are reported as not
    /// found without touching the filesystem, so an id can never escape the
    /// artifact directory.
    pub async fn load(&self, image_id: &str) -> Result<Vec<u8>> {
        if !Self::is_valid_id(image_id) {
            return Err(GraphError::ImageNotFound(image_id.to_string()));
        }

        let path = self.image_path(image_id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(GraphError::ImageNotFound(image_id.to_string()))
            }
            Err(e) => Err(GraphError::Storage(format!("reading {path:?}: {e}"))),
        }
    }

    fn image_path(&self, image_id: &str) -> PathBuf {
        self.dir.join(format!("{image_id}.png"))
    }

    fn is_valid_id(image_id: &str) -> bool {
        image_id.len() == IMAGE_ID_CHARS
            && image_id
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    }
}
