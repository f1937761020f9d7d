
use md5::{Digest, Md5};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Extensions accepted for upload, lower-case with the leading dot
pub const ALLOWED_EXTENSIONS: [&str; 2] = [".pdf", ".txt"];

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("No file uploaded")]
    NoFile,

    #[error("Unsupported file extension '{extension}'; allowed: {}", ALLOWED_EXTENSIONS.join(", "))]
    UnsupportedExtension { extension: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// An accepted upload with its content fingerprint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileIntake {
    pub file_path: PathBuf,
    pub file_name: String,
    /// Lower-case extension including the dot, e.g. `.pdf`
    pub extension: String,
    /// Lower-case hex MD5 of the file bytes
    pub fingerprint: String,
}

impl FileIntake {
    /// Validate and fingerprint the file at `path`
    #[inline]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, IntakeError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(IntakeError::NoFile);
        }

        let extension = extension_of(path);
        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(IntakeError::UnsupportedExtension { extension });
        }

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let fingerprint = fingerprint_file(path).map_err(|source| IntakeError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        debug!(
            "File intake: name={}, extension={}, fingerprint={}",
            file_name, extension, fingerprint
        );

        Ok(Self {
            file_path: path.to_path_buf(),
            file_name,
            extension,
            fingerprint,
        })
    }

    /// Vector-store collection holding this file's chunks
    #[inline]
    pub fn collection_name(&self) -> &str {
        &self.fingerprint
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

#[inline]
pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Stream the file through MD5 without loading it whole
#[inline]
pub fn fingerprint_file<P: AsRef<Path>>(path: P) -> std::io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Md5::new();
    let mut buffer = [0_u8; 8192];

    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
