//! The image adapter: load once, transform in place, save once.
//!
//! [`ImageAdapter`] owns exactly one live [`ImageHandle`] and tracks its
//! width, height and format. Every operation validates its input and computes
//! its geometry before touching the handle, then installs the new buffer in
//! one assignment, which releases the old one. A failed operation leaves the
//! previous image and tracked state as they were.
//!
//! ```text
//! Unloaded ──load──▶ Loaded ──autorotate / rotate / resize / crop──▶ Loaded
//!                      │
//!                      └──save──▶ Saved (terminal)
//! ```
//!
//! Any operation other than `load` on `Unloaded`, and any operation on
//! `Saved`, fails with [`AdapterError::InvalidState`].
//!
//! ## Example
//!
//! ```no_run
//! use framefit::adapter::{AdapterOptions, ImageAdapter};
//! use framefit::imaging::{ExifReader, RustBackend};
//!
//! # fn main() -> Result<(), framefit::adapter::AdapterError> {
//! let backend = RustBackend::new();
//! let exif = ExifReader::new();
//! let mut adapter = ImageAdapter::new(&backend, &exif, AdapterOptions::default());
//! adapter
//!     .load("photo.jpg")?
//!     .autorotate()?
//!     .crop(400, 500)?
//!     .save("thumb.jpg", None)?;
//! # Ok(())
//! # }
//! ```

use crate::imaging::{
    BackendError, Dimensions, Format, GeometryError, ImageHandle, MetadataReader, Quality,
    ROTATE_FILL, RasterBackend, Rect, ResampleRegion, Rotation, TransformPlan, Transparency,
    UnsupportedOrientation, bounding_box_fit, crop_region, round_to_dimensions,
};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(#[from] GeometryError),
    #[error(transparent)]
    UnsupportedOrientation(#[from] UnsupportedOrientation),
    #[error("Can not work with image format {0}")]
    UnsupportedFormat(String),
    #[error("Can not save image format {0}")]
    UnsupportedSaveFormat(Format),
    #[error("Failed to read {path}: {source}")]
    UnreadableFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },
    #[error("Encoding failed: {0}")]
    Encode(String),
    #[error("Can not {operation} an image that is {state}")]
    InvalidState {
        operation: &'static str,
        state: AdapterState,
    },
    #[error("Raster backend error: {0}")]
    Backend(BackendError),
}

impl From<BackendError> for AdapterError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::UnsupportedFormat(format) => Self::UnsupportedFormat(format),
            BackendError::Decode { path, reason } => Self::Decode { path, reason },
            BackendError::UnsupportedSaveFormat(format) => Self::UnsupportedSaveFormat(format),
            BackendError::Encode(reason) => Self::Encode(reason),
            other => Self::Backend(other),
        }
    }
}

/// Lifecycle position of an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    Unloaded,
    Loaded,
    Saved,
}

impl fmt::Display for AdapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AdapterState::Unloaded => "unloaded",
            AdapterState::Loaded => "loaded",
            AdapterState::Saved => "saved",
        })
    }
}

/// Options fixed for the adapter's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AdapterOptions {
    /// Encoder quality for formats that take one.
    pub quality: Quality,
}

struct LoadedImage<'b, B: RasterBackend> {
    handle: ImageHandle<'b, B>,
    dimensions: Dimensions,
    format: Format,
    transparency: Transparency,
    source: PathBuf,
}

enum Slot<'b, B: RasterBackend> {
    Unloaded,
    Loaded(LoadedImage<'b, B>),
    Saved,
}

/// Resize/crop/rotate adapter over a raster backend.
///
/// Not meant to be shared between threads while in use: every method takes
/// `&mut self`. Independent adapters share nothing and can run in parallel.
pub struct ImageAdapter<'b, B: RasterBackend, M: MetadataReader> {
    backend: &'b B,
    metadata: &'b M,
    options: AdapterOptions,
    slot: Slot<'b, B>,
}

impl<'b, B: RasterBackend, M: MetadataReader> ImageAdapter<'b, B, M> {
    pub fn new(backend: &'b B, metadata: &'b M, options: AdapterOptions) -> Self {
        Self {
            backend,
            metadata,
            options,
            slot: Slot::Unloaded,
        }
    }

    /// Create an adapter and load `path` into it.
    pub fn open(
        backend: &'b B,
        metadata: &'b M,
        path: impl AsRef<Path>,
        options: AdapterOptions,
    ) -> Result<Self, AdapterError> {
        let mut adapter = Self::new(backend, metadata, options);
        adapter.load(path)?;
        Ok(adapter)
    }

    pub fn state(&self) -> AdapterState {
        match self.slot {
            Slot::Unloaded => AdapterState::Unloaded,
            Slot::Loaded(_) => AdapterState::Loaded,
            Slot::Saved => AdapterState::Saved,
        }
    }

    pub fn options(&self) -> &AdapterOptions {
        &self.options
    }

    /// Size of the live image. Always matches the buffer after an operation returns.
    pub fn dimensions(&self) -> Option<Dimensions> {
        self.current().map(|image| image.dimensions)
    }

    pub fn width(&self) -> Option<u32> {
        self.dimensions().map(|d| d.width)
    }

    pub fn height(&self) -> Option<u32> {
        self.dimensions().map(|d| d.height)
    }

    /// Format detected at load time.
    pub fn format(&self) -> Option<Format> {
        self.current().map(|image| image.format)
    }

    pub fn source(&self) -> Option<&Path> {
        self.current().map(|image| image.source.as_path())
    }

    /// The live pixel buffer.
    pub fn buffer(&self) -> Option<&B::Buffer> {
        self.current().map(|image| image.handle.buffer())
    }

    fn current(&self) -> Option<&LoadedImage<'b, B>> {
        match &self.slot {
            Slot::Loaded(image) => Some(image),
            _ => None,
        }
    }

    fn loaded(&self, operation: &'static str) -> Result<&LoadedImage<'b, B>, AdapterError> {
        match &self.slot {
            Slot::Loaded(image) => Ok(image),
            _ => Err(AdapterError::InvalidState {
                operation,
                state: self.state(),
            }),
        }
    }

    fn loaded_mut(
        &mut self,
        operation: &'static str,
    ) -> Result<&mut LoadedImage<'b, B>, AdapterError> {
        let state = self.state();
        match &mut self.slot {
            Slot::Loaded(image) => Ok(image),
            _ => Err(AdapterError::InvalidState { operation, state }),
        }
    }

    /// Decode `path` and make it the live image.
    ///
    /// Width, height and format come from the decoded content, not the file
    /// name. Loading while already loaded replaces the image.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<&mut Self, AdapterError> {
        let path = path.as_ref();
        if let Slot::Saved = self.slot {
            return Err(AdapterError::InvalidState {
                operation: "load",
                state: AdapterState::Saved,
            });
        }

        let decoded = self.backend.decode(path).map_err(|err| match err {
            BackendError::Io(source) => AdapterError::UnreadableFile {
                path: path.to_path_buf(),
                source,
            },
            other => other.into(),
        })?;
        let handle = ImageHandle::new(self.backend, decoded.buffer);

        let dimensions = decoded.dimensions;
        if dimensions.is_empty() {
            return Err(GeometryError::EmptySource {
                width: dimensions.width,
                height: dimensions.height,
            }
            .into());
        }

        log::debug!(
            "Loaded {} ({}, {})",
            path.display(),
            decoded.format,
            dimensions
        );
        self.slot = Slot::Loaded(LoadedImage {
            handle,
            dimensions,
            format: decoded.format,
            transparency: Transparency::for_format(decoded.format, decoded.transparent_key),
            source: path.to_path_buf(),
        });
        Ok(self)
    }

    /// Apply the EXIF orientation recorded in the source file.
    ///
    /// Does nothing for formats that cannot carry orientation, when no
    /// orientation is recorded, or when the metadata cannot be read.
    pub fn autorotate(&mut self) -> Result<&mut Self, AdapterError> {
        let (format, source) = {
            let image = self.loaded("autorotate")?;
            (image.format, image.source.clone())
        };
        if !format.carries_orientation() {
            return Ok(self);
        }

        let code = match self.metadata.read_orientation(&source, format) {
            Ok(Some(code)) => code,
            Ok(None) => return Ok(self),
            Err(err) => {
                log::warn!("Skipping autorotate for {}: {}", source.display(), err);
                return Ok(self);
            }
        };
        if let Err(err) = TransformPlan::for_orientation(code) {
            log::warn!("Skipping autorotate for {}: {}", source.display(), err);
            return Ok(self);
        }
        self.rotate(code)
    }

    /// Rotate and flip according to an EXIF orientation code (0-8).
    pub fn rotate(&mut self, orientation: u32) -> Result<&mut Self, AdapterError> {
        self.loaded("rotate")?;
        let plan = TransformPlan::for_orientation(orientation)?;
        if plan.is_identity() {
            return Ok(self);
        }

        let backend = self.backend;
        let image = self.loaded_mut("rotate")?;
        match plan.rotation {
            // Flip-only plans cannot fail, so they work on the live buffer
            Rotation::None => backend.flip_horizontal(image.handle.buffer_mut()),
            rotation => {
                let rotated = backend.rotate(image.handle.buffer(), rotation, ROTATE_FILL)?;
                let mut rotated = ImageHandle::new(backend, rotated);
                if plan.flip_horizontal {
                    backend.flip_horizontal(rotated.buffer_mut());
                }
                backend.apply_transparency(rotated.buffer_mut(), image.transparency);
                image.handle = rotated;
            }
        }
        if plan.swaps_dimensions {
            image.dimensions = image.dimensions.swapped();
        }

        log::debug!(
            "Applied orientation {} ({}° ccw, flip: {})",
            orientation,
            plan.rotation.degrees(),
            plan.flip_horizontal
        );
        Ok(self)
    }

    /// Scale to fit inside `width` x `height`, preserving aspect ratio.
    ///
    /// A zero side is derived from the other one.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<&mut Self, AdapterError> {
        let current = self.loaded("resize")?.dimensions;
        let fitted = round_to_dimensions(bounding_box_fit(current.as_tuple(), width, height)?)?;

        self.resample_into(fitted, Rect::full(current))?;
        log::debug!("Resized {current} to {fitted}");
        Ok(self)
    }

    /// Cut the largest centered area with the requested aspect ratio and
    /// scale it to exactly `width` x `height`.
    ///
    /// A zero side makes the target square.
    pub fn crop(&mut self, width: u32, height: u32) -> Result<&mut Self, AdapterError> {
        let current = self.loaded("crop")?.dimensions;
        let region = crop_region(current.as_tuple(), width, height)?;
        let src = Rect {
            x: region.offset_x,
            y: region.offset_y,
            width: region.width,
            height: region.height,
        };

        self.resample_into(region.target, src)?;
        log::debug!(
            "Cropped {}x{}+{}+{} of {current} to {}",
            region.width,
            region.height,
            region.offset_x,
            region.offset_y,
            region.target
        );
        Ok(self)
    }

    /// Resample `src` of the live image onto a fresh canvas of `target` and install it.
    fn resample_into(&mut self, target: Dimensions, src: Rect) -> Result<(), AdapterError> {
        let backend = self.backend;
        let image = self.loaded_mut("resample")?;

        let canvas = backend.allocate_canvas(target, image.transparency)?;
        let mut canvas = ImageHandle::new(backend, canvas);
        let region = ResampleRegion {
            src,
            dest: Rect::full(target),
        };
        if let Err(err) = backend.resample(canvas.buffer_mut(), image.handle.buffer(), &region) {
            log::warn!("Resampling failed ({err}), falling back to plain resize");
            backend.resize(canvas.buffer_mut(), image.handle.buffer(), &region)?;
        }

        image.handle = canvas;
        image.dimensions = target;
        Ok(())
    }

    /// Encode the live image to `path` and release it.
    ///
    /// Uses `format` when given, else the format detected at load time. On
    /// failure the image stays loaded so the caller can retry.
    pub fn save(
        &mut self,
        path: impl AsRef<Path>,
        format: Option<Format>,
    ) -> Result<(), AdapterError> {
        let path = path.as_ref();
        let image = self.loaded("save")?;
        let format = format.unwrap_or(image.format);

        self.backend
            .encode(image.handle.buffer(), path, format, self.options.quality)?;
        log::info!(
            "Saved {} ({}, {})",
            path.display(),
            format,
            image.dimensions
        );

        self.slot = Slot::Saved;
        Ok(())
    }
}
