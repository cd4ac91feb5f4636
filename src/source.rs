//! Receipt image discovery.
//!
//! `ImageSource` lists image files directly inside an input directory, sorted by
//! file name so that repeated runs over the same directory see the same order.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::debug;

use crate::error::ReceiptError;

/// Recognized image extensions and their media types.
const IMAGE_TYPES: [(&str, &str); 5] = [
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
];

/// Returns the media type for a path with a recognized image extension.
pub fn media_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    IMAGE_TYPES
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, media_type)| *media_type)
}

/// Returns the batch key for a directory entry name.
///
/// Names that are not valid UTF-8 are written with their invalid bytes escaped
/// (`\xFF`), so two such files never collapse onto the same key.
fn entry_key(name: &OsStr) -> String {
    if let Some(name) = name.to_str() {
        return name.to_string();
    }
    let quoted = format!("{name:?}");
    quoted
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(&quoted)
        .to_string()
}

/// A directory of receipt images.
#[derive(Debug, Clone)]
pub struct ImageSource {
    dir: PathBuf,
}

/// An image file discovered by an `ImageSource`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub file_name: String,
    pub path: PathBuf,
    pub media_type: &'static str,
}

impl ImageSource {
    /// Opens a directory of receipt images.
    ///
    /// # Errors
    ///
    /// Returns `ReceiptError::NotFound` if the path does not exist or is not a directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, ReceiptError> {
        let dir = dir.into();
        match fs::metadata(&dir) {
            Ok(meta) if meta.is_dir() => Ok(Self { dir }),
            Ok(_) => Err(ReceiptError::NotFound {
                path: dir,
                source: None,
            }),
            Err(e) => Err(ReceiptError::NotFound {
                path: dir,
                source: Some(e),
            }),
        }
    }

    /// Returns the directory being listed.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Lists image files sorted by file name.
    ///
    /// Each call re-reads the directory. Subdirectories and files without a
    /// recognized image extension are skipped.
    ///
    /// # Errors
    ///
    /// Returns `ReceiptError::NotFound` if the directory can no longer be read.
    pub fn images(&self) -> Result<Vec<ImageFile>, ReceiptError> {
        let not_found = |e| ReceiptError::NotFound {
            path: self.dir.clone(),
            source: Some(e),
        };

        let mut images = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(not_found)? {
            let entry = entry.map_err(not_found)?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(media_type) = media_type_for(&path) else {
                debug!("Skipping non-image file {}", path.display());
                continue;
            };
            let file_name = entry_key(&entry.file_name());
            images.push(ImageFile {
                file_name,
                path,
                media_type,
            });
        }

        images.sort_by(|a, b| (&a.file_name, &a.path).cmp(&(&b.file_name, &b.path)));
        debug!("Found {} images in {}", images.len(), self.dir.display());
        Ok(images)
    }
}

/// Image bytes loaded for a single extraction request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptImage {
    pub file_name: String,
    pub media_type: &'static str,
    pub bytes: Vec<u8>,
}

impl ReceiptImage {
    /// Creates an image from bytes already in memory.
    pub fn new(file_name: impl Into<String>, media_type: &'static str, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            media_type,
            bytes,
        }
    }

    /// Reads an image file from disk.
    ///
    /// # Errors
    ///
    /// Returns `ReceiptError::Image` if the file cannot be read.
    pub fn load(file: &ImageFile) -> Result<Self, ReceiptError> {
        let bytes = fs::read(&file.path).map_err(|source| ReceiptError::Image {
            path: file.path.clone(),
            source,
        })?;
        Ok(Self::new(file.file_name.clone(), file.media_type, bytes))
    }

    /// Encodes the image as a base64 `data:` URL.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, STANDARD.encode(&self.bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &TempDir, name: &str) {
        fs::write(dir.path().join(name), name.as_bytes()).unwrap();
    }

    #[test]
    fn open_fails_for_missing_directory() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");

        let err = ImageSource::open(&missing).unwrap_err();
        assert!(matches!(err, ReceiptError::NotFound { .. }));
    }

    #[test]
    fn open_fails_for_regular_file() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "receipt.jpg");

        let err = ImageSource::open(dir.path().join("receipt.jpg")).unwrap_err();
        assert!(matches!(err, ReceiptError::NotFound { source: None, .. }));
    }

    #[test]
    fn images_are_filtered_and_sorted() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "b.png");
        touch(&dir, "notes.txt");
        touch(&dir, "a.JPG");
        touch(&dir, "c.jpeg");
        fs::create_dir(dir.path().join("d.jpg")).unwrap();

        let source = ImageSource::open(dir.path()).unwrap();
        let names: Vec<String> = source
            .images()
            .unwrap()
            .into_iter()
            .map(|f| f.file_name)
            .collect();

        assert_eq!(names, vec!["a.JPG", "b.png", "c.jpeg"]);
    }

    #[test]
    fn images_can_be_listed_repeatedly() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "r1.jpg");
        touch(&dir, "r2.png");

        let source = ImageSource::open(dir.path()).unwrap();
        assert_eq!(source.images().unwrap(), source.images().unwrap());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn non_utf8_names_keep_distinct_keys() {
        use std::os::unix::ffi::OsStrExt;

        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(OsStr::from_bytes(b"\xff.jpg")), b"one").unwrap();
        fs::write(dir.path().join(OsStr::from_bytes(b"\xfe.jpg")), b"two").unwrap();

        let source = ImageSource::open(dir.path()).unwrap();
        let images = source.images().unwrap();

        assert_eq!(images.len(), 2);
        assert_ne!(images[0].file_name, images[1].file_name);
        for image in &images {
            assert!(image.file_name.ends_with(".jpg"));
            assert!(!image.file_name.contains('\u{FFFD}'));
        }
    }

    #[test]
    fn utf8_names_are_kept_verbatim() {
        assert_eq!(entry_key(OsStr::new("reçu \"1\".png")), "reçu \"1\".png");
    }

    #[test]
    fn media_types_follow_extension() {
        assert_eq!(media_type_for(Path::new("x.jpeg")), Some("image/jpeg"));
        assert_eq!(media_type_for(Path::new("x.PNG")), Some("image/png"));
        assert_eq!(media_type_for(Path::new("x.webp")), Some("image/webp"));
        assert_eq!(media_type_for(Path::new("x.pdf")), None);
        assert_eq!(media_type_for(Path::new("jpg")), None);
    }

    #[test]
    fn load_reads_bytes_and_builds_data_url() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("r1.png"), b"hi").unwrap();
        let source = ImageSource::open(dir.path()).unwrap();
        let file = source.images().unwrap().remove(0);

        let image = ReceiptImage::load(&file).unwrap();
        assert_eq!(image.bytes, b"hi");
        assert_eq!(image.to_data_url(), "data:image/png;base64,aGk=");
    }

    #[test]
    fn load_reports_missing_file_as_image_error() {
        let file = ImageFile {
            file_name: "gone.jpg".to_string(),
            path: PathBuf::from("/definitely/not/here/gone.jpg"),
            media_type: "image/jpeg",
        };
        let err = ReceiptImage::load(&file).unwrap_err();
        assert_eq!(err.kind(), "io_error");
    }
}
