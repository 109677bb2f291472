//! Raster backend trait and shared types.
//!
//! The [`RasterBackend`] trait is everything the adapter needs from a pixel
//! engine: decode, canvas allocation, resampling (with a lower-quality
//! fallback), quarter-turn rotation, horizontal flip, encode and release.
//! It knows nothing about geometry; the adapter decides every rectangle.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate. Tests use the recording `MockBackend` in this module.

use super::orientation::Rotation;
use super::params::{Format, Quality, Transparency};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Can not work with image format {0}")]
    UnsupportedFormat(String),
    #[error("Failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },
    #[error("Can not save image format {0}")]
    UnsupportedSaveFormat(Format),
    #[error("Encoding failed: {0}")]
    Encode(String),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Pixel size of an image or canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn swapped(self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    /// The whole area of an image with the given size.
    pub fn full(dimensions: Dimensions) -> Self {
        Self {
            x: 0,
            y: 0,
            width: dimensions.width,
            height: dimensions.height,
        }
    }
}

/// Which source rectangle is scaled into which destination rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResampleRegion {
    pub src: Rect,
    pub dest: Rect,
}

/// Result of decoding a file.
#[derive(Debug)]
pub struct Decoded<B> {
    pub buffer: B,
    pub dimensions: Dimensions,
    /// Format detected from the file content.
    pub format: Format,
    /// Transparent key color of indexed images, if the source has one.
    pub transparent_key: Option<[u8; 3]>,
}

/// Trait for raster backends.
///
/// Buffers are plain owned values; the adapter wraps every buffer it gets in
/// an [`ImageHandle`](super::handle::ImageHandle), which hands it back through
/// [`release`](RasterBackend::release) when dropped.
pub trait RasterBackend: Sync {
    /// Decoded pixel buffer.
    type Buffer;

    /// Decode a file, detecting its format from the content.
    fn decode(&self, path: &Path) -> Result<Decoded<Self::Buffer>, BackendError>;

    /// Create a blank canvas filled according to `transparency`.
    fn allocate_canvas(
        &self,
        dimensions: Dimensions,
        transparency: Transparency,
    ) -> Result<Self::Buffer, BackendError>;

    /// High-quality resample of `region.src` in `src` into `region.dest` in `dest`.
    fn resample(
        &self,
        dest: &mut Self::Buffer,
        src: &Self::Buffer,
        region: &ResampleRegion,
    ) -> Result<(), BackendError>;

    /// Lower-quality resize, used when [`resample`](RasterBackend::resample) fails.
    fn resize(
        &self,
        dest: &mut Self::Buffer,
        src: &Self::Buffer,
        region: &ResampleRegion,
    ) -> Result<(), BackendError>;

    /// Rotate counter-clockwise into a new buffer. `fill` colors uncovered areas.
    fn rotate(
        &self,
        src: &Self::Buffer,
        rotation: Rotation,
        fill: [u8; 4],
    ) -> Result<Self::Buffer, BackendError>;

    /// Mirror left to right, in place.
    fn flip_horizontal(&self, buffer: &mut Self::Buffer);

    /// Make a buffer follow a transparency convention (e.g. carry an alpha channel).
    fn apply_transparency(&self, buffer: &mut Self::Buffer, transparency: Transparency);

    /// Encode to a file.
    fn encode(
        &self,
        buffer: &Self::Buffer,
        path: &Path,
        format: Format,
        quality: Quality,
    ) -> Result<(), BackendError>;

    /// Free a buffer. Backends holding native memory override this.
    fn release(&self, buffer: Self::Buffer) {
        drop(buffer);
    }
}
