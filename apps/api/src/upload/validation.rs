use bytes::Bytes;
use thiserror::Error;

use crate::language::extension_of;

/// A file as received from the client. An empty `filename` means the client
/// sent none.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Bytes,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadRejection {
    #[error("No file name provided.")]
    MissingFilename,

    #[error("File is empty.")]
    Empty,

    #[error("File type not supported. Allowed types: {}", .supported.join(", "))]
    UnsupportedExtension { supported: Vec<String> },

    #[error("File size too large. Maximum allowed size is {limit_kb}KB.")]
    TooLarge { limit_kb: usize },

    #[error("File contains invalid characters. Please ensure the file is UTF-8 encoded.")]
    NotUtf8,

    #[error("Maximum {max} files allowed per request.")]
    TooManyFiles { max: usize },
}

/// Limits applied to every upload.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    /// Lowercase, dot-prefixed (`.py`).
    pub supported_extensions: Vec<String>,
    pub max_file_size_kb: usize,
    pub max_files_per_request: usize,
}

impl UploadPolicy {
    pub fn max_file_size_bytes(&self) -> usize {
        self.max_file_size_kb.saturating_mul(1024)
    }

    pub fn accepts_extension(&self, filename: &str) -> bool {
        extension_of(filename).is_some_and(|ext| self.supported_extensions.contains(&ext))
    }

    /// Checks name, content, extension, size and encoding, in that order, and
    /// returns the decoded text.
    pub fn validate<'a>(&self, file: &'a UploadedFile) -> Result<&'a str, UploadRejection> {
        if file.filename.trim().is_empty() {
            return Err(UploadRejection::MissingFilename);
        }
        if file.bytes.is_empty() {
            return Err(UploadRejection::Empty);
        }
        if !self.accepts_extension(&file.filename) {
            return Err(UploadRejection::UnsupportedExtension {
                supported: self.supported_extensions.clone(),
            });
        }
        if file.size() > self.max_file_size_bytes() {
            return Err(UploadRejection::TooLarge {
                limit_kb: self.max_file_size_kb,
            });
        }
        std::str::from_utf8(&file.bytes).map_err(|_| UploadRejection::NotUtf8)
    }

    pub fn check_batch_size(&self, count: usize) -> Result<(), UploadRejection> {
        if count > self.max_files_per_request {
            return Err(UploadRejection::TooManyFiles {
                max: self.max_files_per_request,
            });
        }
        Ok(())
    }
}
