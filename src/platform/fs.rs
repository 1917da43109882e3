use super::{FilePicker, SelectedFile};
use crate::error::PlatformError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tracing::debug;

/// File picker that "chooses" a file already named on the command line
pub struct FsFilePicker {
    path: PathBuf,
    max_bytes: u64,
}

impl FsFilePicker {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            max_bytes: u64::MAX,
        }
    }

    /// Refuse files larger than `max_bytes` without loading them
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    fn not_readable(&self, error: std::io::Error) -> PlatformError {
        PlatformError::new(
            "NotReadableError",
            format!("Failed to read {}: {}", self.path.display(), error),
        )
    }

    fn too_large(&self, size: u64) -> PlatformError {
        PlatformError::invalid_file(format!(
            "{} is {} bytes, limit is {} bytes",
            self.path.display(),
            size,
            self.max_bytes
        ))
    }
}

#[async_trait]
impl FilePicker for FsFilePicker {
    async fn pick_file(&self, accept: &str) -> Result<Option<SelectedFile>, PlatformError> {
        debug!("Reading {} for upload (accept: {})", self.path.display(), accept);

        let metadata = tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| self.not_readable(e))?;
        if metadata.len() > self.max_bytes {
            return Err(self.too_large(metadata.len()));
        }

        // The file may grow between the stat and the read
        let file = tokio::fs::File::open(&self.path)
            .await
            .map_err(|e| self.not_readable(e))?;
        let mut contents = Vec::with_capacity(metadata.len() as usize);
        file.take(self.max_bytes.saturating_add(1))
            .read_to_end(&mut contents)
            .await
            .map_err(|e| self.not_readable(e))?;
        if contents.len() as u64 > self.max_bytes {
            return Err(self.too_large(contents.len() as u64));
        }

        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Some(SelectedFile {
            name,
            mime_type: mime_type_for(&self.path).to_string(),
            contents,
        }))
    }
}

/// Infer a MIME type from the file extension
pub fn mime_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "wsq" => "image/x-wsq",
        "json" => "application/json",
        "txt" => "text/plain",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_mime_type_for_extensions() {
        assert_eq!(mime_type_for(Path::new("print.JPG")), "image/jpeg");
        assert_eq!(mime_type_for(Path::new("palm.png")), "image/png");
        assert_eq!(mime_type_for(Path::new("notes.txt")), "text/plain");
        assert_eq!(mime_type_for(Path::new("noext")), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_pick_reads_file() {
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.write_all(&[0x89, b'P', b'N', b'G']).unwrap();

        let picker = FsFilePicker::new(file.path());
        let selected = picker.pick_file("image/*").await.unwrap().unwrap();

        assert_eq!(selected.mime_type, "image/png");
        assert_eq!(selected.size(), 4);
    }

    #[tokio::test]
    async fn test_oversized_file_is_rejected_before_reading() {
        let file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        // Sparse: nothing is written, only the length is set
        file.as_file().set_len(64 * 1024 * 1024).unwrap();

        let picker = FsFilePicker::new(file.path()).with_max_bytes(5 * 1024 * 1024);
        let error = picker.pick_file("image/*").await.unwrap_err();

        assert_eq!(error.name, "InvalidFileError");
        assert!(error.message.contains("67108864 bytes"));
    }

    #[tokio::test]
    async fn test_file_at_limit_is_read() {
        let mut file = tempfile::Builder::new().suffix(".jpg").tempfile().unwrap();
        file.write_all(&[0xFF; 16]).unwrap();

        let picker = FsFilePicker::new(file.path()).with_max_bytes(16);
        let selected = picker.pick_file("image/*").await.unwrap().unwrap();

        assert_eq!(selected.size(), 16);
        assert_eq!(selected.mime_type, "image/jpeg");
    }

    #[tokio::test]
    async fn test_missing_file_is_not_readable() {
        let picker = FsFilePicker::new("/nonexistent/print.png");
        let error = picker.pick_file("image/*").await.unwrap_err();

        assert_eq!(error.name, "NotReadableError");
    }
}
