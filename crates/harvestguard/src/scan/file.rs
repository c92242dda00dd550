//! Local image selection and validation. Nothing here touches the network.

use serde::Serialize;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No file selected.")]
    NoFile,
    #[error("Please select at least one image file.")]
    NoFiles,
    #[error("{name}: please select a valid image (JPG/PNG).")]
    UnsupportedType { name: String },
    #[error("{name}: file is empty.")]
    EmptyFile { name: String },
    #[error("{name}: cannot read file: {reason}")]
    Unreadable { name: String, reason: String },
}

/// Accepted image types, judged by file name the way a browser declares them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ImageKind {
    Jpeg,
    Png,
}

impl ImageKind {
    pub fn from_file_name(name: &str) -> Option<Self> {
        let (_, ext) = name.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageKind::Jpeg),
            "png" => Some(ImageKind::Png),
            _ => None,
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
        }
    }
}

/// An image picked for scanning: name, declared type and content.
#[derive(Clone, Debug)]
pub struct ImageFile {
    name: String,
    kind: ImageKind,
    bytes: Vec<u8>,
}

impl ImageFile {
    /// Content is not decoded here; a corrupt image is the backend's call.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, ValidationError> {
        let name = name.into();
        let kind = ImageKind::from_file_name(&name)
            .ok_or_else(|| ValidationError::UnsupportedType { name: name.clone() })?;
        if bytes.is_empty() {
            return Err(ValidationError::EmptyFile { name });
        }
        Ok(Self { name, kind, bytes })
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ValidationError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        if ImageKind::from_file_name(&name).is_none() {
            return Err(ValidationError::UnsupportedType { name });
        }
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ValidationError::Unreadable {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        Self::from_bytes(name, bytes)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ImageKind {
        self.kind
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Single-image selection must hold a file.
pub fn validate_single(file: Option<&ImageFile>) -> Result<&ImageFile, ValidationError> {
    file.ok_or(ValidationError::NoFile)
}

/// Batch selection must be non-empty.
pub fn validate_batch(files: &[ImageFile]) -> Result<(), ValidationError> {
    if files.is_empty() {
        return Err(ValidationError::NoFiles);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn kind_from_extension() {
        assert_eq!(ImageKind::from_file_name("a.JPG"), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::from_file_name("a.jpeg"), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::from_file_name("dir.v2/a.png"), Some(ImageKind::Png));
        assert_eq!(ImageKind::from_file_name("a.gif"), None);
        assert_eq!(ImageKind::from_file_name("noext"), None);
        assert_eq!(ImageKind::Png.mime(), "image/png");
    }

    #[test]
    fn rejects_wrong_type_and_empty() {
        assert_eq!(
            ImageFile::from_bytes("notes.txt", b"hi".to_vec()).unwrap_err(),
            ValidationError::UnsupportedType {
                name: "notes.txt".into()
            }
        );
        assert_eq!(
            ImageFile::from_bytes("empty.png", vec![]).unwrap_err(),
            ValidationError::EmptyFile {
                name: "empty.png".into()
            }
        );
    }

    #[test]
    fn corrupt_content_is_still_accepted() {
        let f = ImageFile::from_bytes("broken.jpg", b"definitely not a jpeg".to_vec()).unwrap();
        assert_eq!(f.kind(), ImageKind::Jpeg);
        assert_eq!(f.len(), 21);
    }

    #[test]
    fn selection_rules() {
        assert_eq!(validate_single(None).unwrap_err(), ValidationError::NoFile);
        assert_eq!(validate_batch(&[]).unwrap_err(), ValidationError::NoFiles);
        let f = ImageFile::from_bytes("a.png", vec![1]).unwrap();
        assert_eq!(validate_single(Some(&f)).unwrap().name(), "a.png");
        assert!(validate_batch(&[f]).is_ok());
        assert_eq!(ValidationError::NoFile.to_string(), "No file selected.");
    }

    #[tokio::test]
    async fn from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leaf.png");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(&[0x89, b'P', b'N', b'G'])
            .unwrap();
        let f = ImageFile::from_path(&path).await.unwrap();
        assert_eq!(f.name(), "leaf.png");
        assert_eq!(f.bytes(), &[0x89, b'P', b'N', b'G']);

        let missing = ImageFile::from_path(dir.path().join("gone.jpg")).await;
        assert!(matches!(missing, Err(ValidationError::Unreadable { .. })));
        let wrong = ImageFile::from_path(dir.path().join("list.csv")).await;
        assert!(matches!(wrong, Err(ValidationError::UnsupportedType { .. })));
    }
}
