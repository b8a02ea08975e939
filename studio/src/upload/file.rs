use image::ImageFormat;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImageError {
    #[error("The selected file is empty")]
    Empty,
    #[error("File too large: {size} bytes (maximum {max})")]
    FileTooLarge { size: usize, max: usize },
    #[error("Invalid file format: {0}")]
    InvalidFormat(String),
}

/// A user-selected room photo. Cloning shares the bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageFile {
    name: String,
    mime_type: String,
    bytes: Arc<[u8]>,
}

impl fmt::Debug for ImageFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl ImageFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
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

    /// Same file relabelled, typically with the type sniffed by `validate`.
    pub fn with_mime_type(self, mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            ..self
        }
    }

    /// File name without directory or extension, used as a default project name.
    pub fn stem(&self) -> Option<&str> {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Checks size and content and returns the MIME type sniffed from the
    /// bytes. Only JPG, PNG, WEBP and GIF are accepted.
    pub fn validate(&self, max_bytes: usize) -> Result<&'static str, ImageError> {
        if self.bytes.is_empty() {
            return Err(ImageError::Empty);
        }
        if self.bytes.len() > max_bytes {
            return Err(ImageError::FileTooLarge {
                size: self.bytes.len(),
                max: max_bytes,
            });
        }
        if !self.mime_type.starts_with("image/") {
            return Err(ImageError::InvalidFormat(format!(
                "{} is not an image ({})",
                self.name, self.mime_type
            )));
        }

        let format = image::guess_format(&self.bytes)
            .map_err(|_| ImageError::InvalidFormat(format!("{} is not a readable image", self.name)))?;
        let detected = match format {
            ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP | ImageFormat::Gif => {
                format.to_mime_type()
            }
            other => {
                return Err(ImageError::InvalidFormat(format!(
                    "{:?} images are not supported",
                    other
                )));
            }
        };

        if detected != self.mime_type {
            log::warn!(
                "Declared type {} for {} does not match content ({})",
                self.mime_type,
                self.name,
                detected
            );
        }
        Ok(detected)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn accepts_png_content() {
        assert_eq!(png("room.png").validate(1024), Ok("image/png"));
    }

    #[test]
    fn reports_sniffed_type_over_declared() {
        let jpeg = ImageFile::new("room.png", "image/png", vec![0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10]);
        assert_eq!(jpeg.validate(1024), Ok("image/jpeg"));
    }

    #[test]
    fn relabelling_keeps_name_and_bytes() {
        let file = png("room.png").with_mime_type("image/jpeg");
        assert_eq!(file.mime_type(), "image/jpeg");
        assert_eq!(file.name(), "room.png");
        assert_eq!(file.bytes(), PNG_BYTES);
    }

    #[test]
    fn rejects_oversized_files() {
        let err = png("room.png").validate(4).unwrap_err();
        assert_eq!(err, ImageError::FileTooLarge { size: PNG_BYTES.len(), max: 4 });
    }

    #[test]
    fn rejects_non_images() {
        let pdf = ImageFile::new("plan.pdf", "application/pdf", b"%PDF-1.7".to_vec());
        assert!(matches!(pdf.validate(1024), Err(ImageError::InvalidFormat(_))));

        let text = ImageFile::new("room.png", "image/png", b"hello world".to_vec());
        assert!(matches!(text.validate(1024), Err(ImageError::InvalidFormat(_))));

        let empty = ImageFile::new("room.png", "image/png", Vec::new());
        assert_eq!(empty.validate(1024), Err(ImageError::Empty));
    }

    #[test]
    fn stem_strips_extension() {
        assert_eq!(png("living-room.png").stem(), Some("living-room"));
        assert_eq!(png(".png").stem(), Some(".png"));
        assert_eq!(ImageFile::new("", "image/png", Vec::new()).stem(), None);
    }
}
