//! # framefit
//!
//! Deterministic resize, crop and EXIF auto-rotation for raster images.
//!
//! The core is an [`adapter::ImageAdapter`]: load one image, apply any number
//! of transforms to it, save it once. Every transform computes its geometry
//! up front with pure functions, then asks a [`imaging::RasterBackend`] to do
//! the pixel work on a fresh buffer and swaps it in.
//!
//! ```text
//! load ──▶ autorotate ──▶ rotate ──▶ resize | crop ──▶ save
//!            │
//!            └── MetadataReader (EXIF orientation)
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Geometry math, orientation table, backend trait and the `image`-crate backend, EXIF reader |
//! | [`adapter`] | The load → transform → save state machine with tracked size and format |
//! | [`pipeline`] | Jobs and batches: fixed operation order, parallel directory conversion |
//! | [`config`] | `framefit.toml` loading, validation and merging over stock defaults |
//! | [`output`] | CLI output formatting for reports, batch progress and plans |
//!
//! # Design Decisions
//!
//! ## Geometry Before Pixels
//!
//! [`imaging::bounding_box_fit`] and [`imaging::crop_region`] are pure and
//! run before any buffer is allocated. A bad request fails without touching
//! the loaded image, and the `plan` command can show the exact numbers without
//! decoding anything.
//!
//! ## One Live Buffer
//!
//! The adapter holds exactly one [`imaging::ImageHandle`]. Replacing it
//! releases the old buffer through `Drop`, so errors, reloads and dropped
//! adapters all clean up the same way. The [`imaging::RasterBackend`] trait
//! exists so tests can count live buffers with a recording mock.
//!
//! ## Format From Content
//!
//! The format is detected from the decoded bytes, not the file extension, and
//! it picks both the output encoder and the transparency convention for new
//! canvases (alpha for PNG/WebP, a transparent key for GIF, opaque otherwise).

pub mod adapter;
pub mod config;
pub mod imaging;
pub mod output;
pub mod pipeline;
