//! EXIF orientation lookup.
//!
//! [`MetadataReader`] is the seam the adapter uses for `autorotate`;
//! [`ExifReader`] implements it with `kamadak-exif`.

use super::params::Format;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("EXIF read error: {0}")]
    Exif(String),
}

/// Source of orientation codes for loaded images.
pub trait MetadataReader: Sync {
    /// Return the EXIF orientation code, or `None` when the file has none.
    fn read_orientation(&self, path: &Path, format: Format)
    -> Result<Option<u32>, MetadataError>;
}

/// Reads the primary image's `Orientation` tag.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExifReader;

impl ExifReader {
    pub fn new() -> Self {
        Self
    }
}

impl MetadataReader for ExifReader {
    fn read_orientation(
        &self,
        path: &Path,
        format: Format,
    ) -> Result<Option<u32>, MetadataError> {
        if !format.carries_orientation() {
            return Ok(None);
        }

        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        match exif::Reader::new().read_from_container(&mut reader) {
            Ok(exif) => {
                let orientation = exif
                    .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
                    .and_then(|field| field.value.get_uint(0));
                log::debug!("EXIF orientation in {}: {:?}", path.display(), orientation);
                Ok(orientation)
            }
            Err(exif::Error::NotFound(_)) => {
                log::debug!("No EXIF data found in {}", path.display());
                Ok(None)
            }
            Err(e) => Err(MetadataError::Exif(e.to_string())),
        }
    }
}
