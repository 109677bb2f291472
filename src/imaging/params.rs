//! Parameter types shared by the adapter and the raster backend.
//!
//! These describe *what* the image is and how it should be written, never how
//! pixels are moved. The [`backend`](super::backend) interprets them.
//!
//! ## Types
//!
//! - [`Quality`]: lossy encoding quality (0-100, default 92), clamped on construction.
//! - [`Format`]: raster format detected from file content, with capability flags.
//! - [`Transparency`]: how new canvases treat transparency, resolved once per loaded image.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Quality setting for lossy image encoding (0-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.min(100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(92)
    }
}

/// Raster format of a decoded image.
///
/// Always derived from the file's content at load time, never from its
/// extension. Only an explicit save override changes the output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Jpeg,
    Png,
    Gif,
    WebP,
    Tiff,
    Bmp,
}

impl Format {
    /// Canonical file extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Format::Jpeg => "jpg",
            Format::Png => "png",
            Format::Gif => "gif",
            Format::WebP => "webp",
            Format::Tiff => "tiff",
            Format::Bmp => "bmp",
        }
    }

    /// Whether files of this format can embed an EXIF orientation tag.
    pub fn carries_orientation(self) -> bool {
        matches!(self, Format::Jpeg | Format::Tiff | Format::WebP)
    }

    /// Whether the encoder for this format takes a quality parameter.
    pub fn uses_quality(self) -> bool {
        matches!(self, Format::Jpeg)
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Format::Jpeg),
            "png" => Some(Format::Png),
            "gif" => Some(Format::Gif),
            "webp" => Some(Format::WebP),
            "tif" | "tiff" => Some(Format::Tiff),
            "bmp" => Some(Format::Bmp),
            _ => None,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Format::Jpeg => "jpeg",
            Format::Png => "png",
            Format::Gif => "gif",
            Format::WebP => "webp",
            Format::Tiff => "tiff",
            Format::Bmp => "bmp",
        };
        f.write_str(name)
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Format::from_extension(s).ok_or_else(|| format!("unknown image format '{s}'"))
    }
}

/// RGBA fill used for areas a rotation leaves uncovered: fully transparent black.
pub const ROTATE_FILL: [u8; 4] = [0, 0, 0, 0];

/// Transparency convention for new canvases of a loaded image.
///
/// - `AlphaChannel`: keep a real alpha channel, canvases start fully transparent.
/// - `TransparentIndex`: indexed-color formats. Canvases are filled with the
///   source's transparent key color, or white when the source has none.
/// - `Opaque`: no transparency, canvases start black.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transparency {
    AlphaChannel,
    TransparentIndex { key: Option<[u8; 3]> },
    Opaque,
}

impl Transparency {
    /// Resolve the convention for a format.
    ///
    /// `key` is the transparent color found in the decoded source; it is only
    /// meaningful for GIF and ignored for every other format.
    pub fn for_format(format: Format, key: Option<[u8; 3]>) -> Self {
        match format {
            Format::Png | Format::WebP => Transparency::AlphaChannel,
            Format::Gif => Transparency::TransparentIndex { key },
            Format::Jpeg | Format::Tiff | Format::Bmp => Transparency::Opaque,
        }
    }

    /// RGBA value a fresh canvas is filled with.
    pub fn background(self) -> [u8; 4] {
        match self {
            Transparency::AlphaChannel => [0, 0, 0, 0],
            Transparency::TransparentIndex { key: Some([r, g, b]) } => [r, g, b, 0],
            Transparency::TransparentIndex { key: None } => [255, 255, 255, 255],
            Transparency::Opaque => [0, 0, 0, 255],
        }
    }

    /// Whether canvases need an alpha channel at all.
    pub fn needs_alpha(self) -> bool {
        !matches!(
            self,
            Transparency::Opaque | Transparency::TransparentIndex { key: None }
        )
    }
}
