//! Scoped ownership of one backend buffer.

use super::backend::RasterBackend;
use std::fmt;

/// Owns a decoded pixel buffer and returns it to its backend on drop.
///
/// Every buffer the adapter receives from a backend is wrapped immediately,
/// so it is released on every path: replacement, error, or adapter drop.
pub struct ImageHandle<'b, B: RasterBackend> {
    backend: &'b B,
    // Only `None` inside `drop`.
    buffer: Option<B::Buffer>,
}

impl<'b, B: RasterBackend> ImageHandle<'b, B> {
    pub fn new(backend: &'b B, buffer: B::Buffer) -> Self {
        Self {
            backend,
            buffer: Some(buffer),
        }
    }

    pub fn buffer(&self) -> &B::Buffer {
        self.buffer
            .as_ref()
            .expect("image handle holds a buffer until dropped")
    }

    pub fn buffer_mut(&mut self) -> &mut B::Buffer {
        self.buffer
            .as_mut()
            .expect("image handle holds a buffer until dropped")
    }
}

impl<B: RasterBackend> Drop for ImageHandle<'_, B> {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.backend.release(buffer);
        }
    }
}

impl<B: RasterBackend> fmt::Debug for ImageHandle<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageHandle").finish_non_exhaustive()
    }
}
