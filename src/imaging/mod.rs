//! Image geometry and the raster backend seam.
//!
//! | Operation | Where |
//! |---|---|
//! | **Bounding-box fit** | [`calculations::bounding_box_fit`] |
//! | **Centered crop** | [`calculations::crop_region`] |
//! | **EXIF orientation → plan** | [`orientation::TransformPlan::for_orientation`] |
//! | **Pixel work** | [`RasterBackend`], implemented by [`RustBackend`] |
//! | **Orientation lookup** | [`MetadataReader`], implemented by [`ExifReader`] |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Orientation**: Pure mapping from EXIF codes to rotate/flip plans
//! - **Parameters**: Formats, quality and transparency conventions
//! - **Backend**: [`RasterBackend`] trait + [`RustBackend`]
//! - **Handle**: [`ImageHandle`], scoped ownership of one backend buffer
//! - **Metadata**: [`MetadataReader`] trait + [`ExifReader`]

pub mod backend;
pub mod calculations;
pub mod handle;
pub mod metadata;
pub mod orientation;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Decoded, Dimensions, RasterBackend, Rect, ResampleRegion};
pub use calculations::{
    CropRegion, GeometryError, bounding_box_fit, crop_region, round_to_dimensions,
};
pub use handle::ImageHandle;
pub use metadata::{ExifReader, MetadataError, MetadataReader};
pub use orientation::{Rotation, TransformPlan, UnsupportedOrientation};
pub use params::{Format, Quality, ROTATE_FILL, Transparency};
pub use rust_backend::{RustBackend, supported_input_extensions};
