use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt;
use std::sync::Arc;

use super::ImageFile;

/// Allocates and revokes thumbnail handles (object URLs in a browser).
pub trait PreviewBackend: Send + Sync {
    fn create(&self, file: &ImageFile) -> String;
    fn revoke(&self, handle: &str);
}

/// A live preview handle. Released exactly once, either explicitly or on drop.
pub struct Preview {
    handle: String,
    backend: Arc<dyn PreviewBackend>,
    released: bool,
}

impl Preview {
    pub(crate) fn allocate(backend: &Arc<dyn PreviewBackend>, file: &ImageFile) -> Self {
        let handle = backend.create(file);
        log::debug!("Allocated preview for {}", file.name());
        Self {
            handle,
            backend: Arc::clone(backend),
            released: false,
        }
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.backend.revoke(&self.handle);
        self.released = true;
        log::debug!("Released preview handle");
    }
}

impl Drop for Preview {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Preview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Preview")
            .field("handle_len", &self.handle.len())
            .field("released", &self.released)
            .finish()
    }
}

/// Inline `data:` URLs. Nothing to revoke; the string is freed with the handle.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataUrlPreviews;

impl PreviewBackend for DataUrlPreviews {
    fn create(&self, file: &ImageFile) -> String {
        format!("data:{};base64,{}", file.mime_type(), STANDARD.encode(file.bytes()))
    }

    fn revoke(&self, _handle: &str) {}
}
