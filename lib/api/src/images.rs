// Uploaded label images on local disk
use base64::prelude::*;
use labelscan_core::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Extension used for images that arrive as base64 text
pub const BASE64_IMAGE_EXT: &str = ".jpg";

/// Drop a `data:image/...;base64,` prefix if present
pub fn strip_data_url(image: &str) -> &str {
    let trimmed = image.trim();
    match trimmed.strip_prefix("data:") {
        Some(rest) => match rest.find(";base64,") {
            Some(pos) => &rest[pos + ";base64,".len()..],
            None => trimmed,
        },
        None => trimmed,
    }
}

/// Extension of an uploaded file name including the dot, or empty
pub fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default()
}

pub struct ImageStore {
    dir: PathBuf,
    base_url: String,
}

impl ImageStore {
    pub fn new<P: AsRef<Path>>(dir: P, base_url: &str) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Decode base64 payloads, all of them before anything is written.
    ///
    /// The error names the index of the first payload that fails.
    pub fn decode_all(images: &[String]) -> Result<Vec<Vec<u8>>> {
        images
            .iter()
            .enumerate()
            .map(|(idx, image)| {
                BASE64_STANDARD.decode(strip_data_url(image)).map_err(|e| {
                    Error::InvalidInput(format!("invalid base64 image at index {}: {}", idx, e))
                })
            })
            .collect()
    }

    /// Write one image under a fresh `<uuid><ext>` name and return the name
    pub async fn save(&self, data: &[u8], ext: &str) -> Result<String> {
        let name = format!("{}{}", Uuid::new_v4(), ext);
        tokio::fs::write(self.dir.join(&name), data).await?;
        debug!("Stored image {} ({} bytes)", name, data.len());
        Ok(name)
    }

    /// Write a batch of `(bytes, extension)` images. If any write fails the
    /// ones already written are removed.
    pub async fn save_all(&self, images: &[(&[u8], &str)]) -> Result<Vec<String>> {
        let mut names = Vec::with_capacity(images.len());
        for (data, ext) in images {
            match self.save(data, ext).await {
                Ok(name) => names.push(name),
                Err(e) => {
                    self.remove_all(&names).await;
                    return Err(e);
                }
            }
        }
        Ok(names)
    }

    /// Delete stored images; failures are logged and skipped
    pub async fn remove_all(&self, names: &[String]) {
        for name in names {
            if let Err(e) = tokio::fs::remove_file(self.dir.join(name)).await {
                warn!("Failed to remove image {}: {}", name, e);
            }
        }
    }

    #[inline]
    pub fn url(&self, name: &str) -> String {
        format!("{}/image/{}", self.base_url, name)
    }

    pub fn urls(&self, names: &[String]) -> Vec<String> {
        names.iter().map(|n| self.url(n)).collect()
    }

    /// Path of a stored image; rejects anything that could escape the
    /// upload directory.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(Error::InvalidInput(format!("invalid image name {:?}", name)));
        }
        let path = self.dir.join(name);
        if !path.is_file() {
            return Err(Error::NotFound(format!("image {}", name)));
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_data_url() {
        assert_eq!(strip_data_url("data:image/jpeg;base64,aGVsbG8="), "aGVsbG8=");
        assert_eq!(strip_data_url("data:image/png;base64,aGk="), "aGk=");
        assert_eq!(strip_data_url("aGVsbG8="), "aGVsbG8=");
    }

    #[test]
    fn test_decode_reports_index() {
        let images = vec!["aGVsbG8=".to_string(), "not base64!".to_string()];
        match ImageStore::decode_all(&images) {
            Err(Error::InvalidInput(msg)) => assert!(msg.contains("index 1"), "{}", msg),
            other => panic!("unexpected {:?}", other.map(|v| v.len())),
        }
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("label.PNG"), ".PNG");
        assert_eq!(extension_of("noext"), "");
    }

    #[tokio::test]
    async fn test_save_and_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path(), "http://host/").unwrap();

        let decoded = ImageStore::decode_all(&["data:image/jpeg;base64,aGVsbG8=".to_string()]).unwrap();
        let names = store
            .save_all(&[(decoded[0].as_slice(), BASE64_IMAGE_EXT)])
            .await
            .unwrap();
        assert_eq!(names.len(), 1);
        assert!(names[0].ends_with(".jpg"));

        let path = store.resolve(&names[0]).unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"hello");
        assert_eq!(store.url(&names[0]), format!("http://host/image/{}", names[0]));

        store.remove_all(&names).await;
        assert!(matches!(store.resolve(&names[0]), Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_failed_batch_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path(), "http://host").unwrap();

        // an extension with a separator points the second write at a missing directory
        let result = store
            .save_all(&[(b"one".as_slice(), ".jpg"), (b"two".as_slice(), "/missing/x.jpg")])
            .await;
        assert!(result.is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path(), "http://host").unwrap();
        for name in ["../secret", "a/b.jpg", "a\\b.jpg", ""] {
            assert!(matches!(store.resolve(name), Err(Error::InvalidInput(_))));
        }
        assert!(matches!(store.resolve("missing.jpg"), Err(Error::NotFound(_))));
    }
}
