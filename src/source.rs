//! Source image handles.
//!
//! An [`ImageSource`] owns the encoded bytes of one loaded image. It is
//! immutable and cheap to clone: clones share the same buffer, so a resize
//! and a compress running at the same time read the same bytes without
//! copying them. Each transform decodes independently; nothing decoded is
//! cached on the handle.
//!
//! The buffer is released when the last clone is dropped.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone)]
pub struct ImageSource {
    id: u64,
    file_name: String,
    bytes: Arc<[u8]>,
}

impl ImageSource {
    /// Wrap bytes already in memory.
    pub fn from_bytes(file_name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file into a new source. The file name is the path's last component.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::from_bytes(file_name, bytes))
    }

    /// Reference identifying this handle, e.g. `source:cat.png#3`.
    pub fn uri(&self) -> String {
        format!("source:{}#{}", self.file_name, self.id)
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn byte_size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// MIME type implied by the file extension, passed through unverified.
    pub fn mime_type(&self) -> Option<&'static str> {
        let ext = Path::new(&self.file_name).extension()?.to_str()?;
        image::ImageFormat::from_extension(ext).map(|f| f.to_mime_type())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_buffer() {
        let source = ImageSource::from_bytes("a.png", vec![1u8, 2, 3]);
        let clone = source.clone();
        assert!(std::ptr::eq(source.bytes(), clone.bytes()));
        assert_eq!(source.uri(), clone.uri());
    }

    #[test]
    fn each_source_gets_a_distinct_uri() {
        let a = ImageSource::from_bytes("a.png", vec![0u8]);
        let b = ImageSource::from_bytes("a.png", vec![0u8]);
        assert_ne!(a.uri(), b.uri());
        assert!(a.uri().starts_with("source:a.png#"));
    }

    #[test]
    fn byte_size_counts_encoded_bytes() {
        let source = ImageSource::from_bytes("a.bin", vec![0u8; 1536]);
        assert_eq!(source.byte_size(), 1536);
    }

    #[test]
    fn mime_type_follows_extension() {
        assert_eq!(
            ImageSource::from_bytes("a.JPG", vec![0u8]).mime_type(),
            Some("image/jpeg")
        );
        assert_eq!(
            ImageSource::from_bytes("a.png", vec![0u8]).mime_type(),
            Some("image/png")
        );
        assert_eq!(ImageSource::from_bytes("notes", vec![0u8]).mime_type(), None);
    }

    #[test]
    fn open_reads_file_and_name() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("photo.webp");
        std::fs::write(&path, b"abcd").unwrap();

        let source = ImageSource::open(&path).unwrap();
        assert_eq!(source.file_name(), "photo.webp");
        assert_eq!(source.bytes(), b"abcd");
    }

    #[test]
    fn open_missing_file_errors() {
        assert!(ImageSource::open(Path::new("/nonexistent/photo.png")).is_err());
    }
}
