//! Pure Rust raster backend built on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, WebP, TIFF, BMP) | `ImageReader::with_guessed_format` + `decode` |
//! | Canvas | `ImageBuffer::from_raw` over a `try_reserve_exact` buffer |
//! | Resample | `crop_imm` + `resize_exact` with `Lanczos3`, then `imageops::replace` |
//! | Resize (fallback) | same with `Nearest` |
//! | Rotate | `rotate90` / `rotate180` / `rotate270` |
//! | Flip | `imageops::flip_horizontal_in_place` |
//! | Encode → JPEG | `JpegEncoder::new_with_quality` |
//! | Encode → others | `DynamicImage::write_to` |

use super::backend::{BackendError, Decoded, Dimensions, RasterBackend, Rect, ResampleRegion};
use super::orientation::Rotation;
use super::params::{Format, Quality, Transparency};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{
    DynamicImage, ImageBuffer, ImageError, ImageFormat, ImageReader, Pixel, Rgb, RgbImage, Rgba,
    RgbaImage,
};
use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{BufReader, Cursor};
use std::path::Path;
use std::sync::LazyLock;

/// Extensions mapped to the formats the adapter knows about.
const CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("gif", ImageFormat::Gif),
    ("webp", ImageFormat::WebP),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("bmp", ImageFormat::Bmp),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of image file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

fn from_image_format(format: ImageFormat) -> Option<Format> {
    match format {
        ImageFormat::Jpeg => Some(Format::Jpeg),
        ImageFormat::Png => Some(Format::Png),
        ImageFormat::Gif => Some(Format::Gif),
        ImageFormat::WebP => Some(Format::WebP),
        ImageFormat::Tiff => Some(Format::Tiff),
        ImageFormat::Bmp => Some(Format::Bmp),
        _ => None,
    }
}

fn to_image_format(format: Format) -> ImageFormat {
    match format {
        Format::Jpeg => ImageFormat::Jpeg,
        Format::Png => ImageFormat::Png,
        Format::Gif => ImageFormat::Gif,
        Format::WebP => ImageFormat::WebP,
        Format::Tiff => ImageFormat::Tiff,
        Format::Bmp => ImageFormat::Bmp,
    }
}

/// Pure Rust backend using the `image` crate.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// RGB of the first fully transparent pixel, which GIF decoding leaves as the key color.
fn transparent_key(img: &DynamicImage) -> Option<[u8; 3]> {
    img.as_rgba8()?
        .pixels()
        .find(|p| p[3] == 0)
        .map(|p| [p[0], p[1], p[2]])
}

fn fits(rect: Rect, width: u32, height: u32) -> bool {
    rect.width > 0
        && rect.height > 0
        && u64::from(rect.x) + u64::from(rect.width) <= u64::from(width)
        && u64::from(rect.y) + u64::from(rect.height) <= u64::from(height)
}

/// Scale `region.src` of `src` onto `region.dest` of `dest`, replacing pixels (no blending).
fn scale_into(
    dest: &mut DynamicImage,
    src: &DynamicImage,
    region: &ResampleRegion,
    filter: FilterType,
) -> Result<(), BackendError> {
    let ResampleRegion { src: s, dest: d } = *region;
    if !fits(s, src.width(), src.height()) {
        return Err(BackendError::ProcessingFailed(format!(
            "source rectangle {}x{}+{}+{} is outside the {}x{} image",
            s.width,
            s.height,
            s.x,
            s.y,
            src.width(),
            src.height()
        )));
    }
    if !fits(d, dest.width(), dest.height()) {
        return Err(BackendError::ProcessingFailed(format!(
            "destination rectangle {}x{}+{}+{} is outside the {}x{} canvas",
            d.width,
            d.height,
            d.x,
            d.y,
            dest.width(),
            dest.height()
        )));
    }

    let scaled = src
        .crop_imm(s.x, s.y, s.width, s.height)
        .resize_exact(d.width, d.height, filter);
    let (x, y) = (i64::from(d.x), i64::from(d.y));
    match dest {
        DynamicImage::ImageRgba8(canvas) => imageops::replace(canvas, &scaled.to_rgba8(), x, y),
        DynamicImage::ImageRgb8(canvas) => imageops::replace(canvas, &scaled.to_rgb8(), x, y),
        other => imageops::replace(other, &scaled, x, y),
    }
    Ok(())
}

/// Convert to a color type every non-JPEG encoder accepts.
fn encodable(buffer: &DynamicImage, format: Format) -> Cow<'_, DynamicImage> {
    let wants_alpha = format == Format::Gif || buffer.color().has_alpha();
    match buffer {
        DynamicImage::ImageRgba8(_) if wants_alpha => Cow::Borrowed(buffer),
        DynamicImage::ImageRgb8(_) if !wants_alpha => Cow::Borrowed(buffer),
        _ if wants_alpha => Cow::Owned(DynamicImage::ImageRgba8(buffer.to_rgba8())),
        _ => Cow::Owned(DynamicImage::ImageRgb8(buffer.to_rgb8())),
    }
}

fn encode_error(err: ImageError, format: Format) -> BackendError {
    match err {
        ImageError::Unsupported(_) => BackendError::UnsupportedSaveFormat(format),
        ImageError::IoError(io) => BackendError::Io(io),
        other => BackendError::Encode(other.to_string()),
    }
}

impl RasterBackend for RustBackend {
    type Buffer = DynamicImage;

    fn decode(&self, path: &Path) -> Result<Decoded<DynamicImage>, BackendError> {
        // Start without a format so the extension never decides it
        let reader = ImageReader::new(BufReader::new(File::open(path)?)).with_guessed_format()?;
        let image_format = reader.format().ok_or_else(|| {
            BackendError::UnsupportedFormat(format!("unrecognized content in {}", path.display()))
        })?;
        let format = from_image_format(image_format)
            .ok_or_else(|| BackendError::UnsupportedFormat(format!("{image_format:?}")))?;

        let img = reader.decode().map_err(|e| match e {
            ImageError::Unsupported(_) => BackendError::UnsupportedFormat(format.to_string()),
            ImageError::IoError(io) => BackendError::Io(io),
            other => BackendError::Decode {
                path: path.to_path_buf(),
                reason: other.to_string(),
            },
        })?;

        let transparent_key = if format == Format::Gif {
            transparent_key(&img)
        } else {
            None
        };
        Ok(Decoded {
            dimensions: Dimensions::new(img.width(), img.height()),
            buffer: img,
            format,
            transparent_key,
        })
    }

    fn allocate_canvas(
        &self,
        dimensions: Dimensions,
        transparency: Transparency,
    ) -> Result<DynamicImage, BackendError> {
        if dimensions.is_empty() {
            return Err(BackendError::ProcessingFailed(format!(
                "Failed to create {dimensions} canvas"
            )));
        }
        let [r, g, b, a] = transparency.background();
        Ok(if transparency.needs_alpha() {
            DynamicImage::ImageRgba8(filled_canvas(dimensions, Rgba([r, g, b, a]))?)
        } else {
            DynamicImage::ImageRgb8(filled_canvas(dimensions, Rgb([r, g, b]))?)
        })
    }

    fn resample(
        &self,
        dest: &mut DynamicImage,
        src: &DynamicImage,
        region: &ResampleRegion,
    ) -> Result<(), BackendError> {
        scale_into(dest, src, region, FilterType::Lanczos3)
    }

    fn resize(
        &self,
        dest: &mut DynamicImage,
        src: &DynamicImage,
        region: &ResampleRegion,
    ) -> Result<(), BackendError> {
        scale_into(dest, src, region, FilterType::Nearest)
    }

    /// Quarter turns cover the whole output, so `fill` is never visible.
    fn rotate(
        &self,
        src: &DynamicImage,
        rotation: Rotation,
        _fill: [u8; 4],
    ) -> Result<DynamicImage, BackendError> {
        // image's rotateN helpers turn clockwise
        Ok(match rotation {
            Rotation::None => src.clone(),
            Rotation::Ccw90 => src.rotate270(),
            Rotation::Ccw180 => src.rotate180(),
            Rotation::Ccw270 => src.rotate90(),
        })
    }

    fn flip_horizontal(&self, buffer: &mut DynamicImage) {
        imageops::flip_horizontal_in_place(buffer);
    }

    fn apply_transparency(&self, buffer: &mut DynamicImage, transparency: Transparency) {
        if transparency.needs_alpha() && !buffer.color().has_alpha() {
            *buffer = DynamicImage::ImageRgba8(buffer.to_rgba8());
        }
    }

    fn encode(
        &self,
        buffer: &DynamicImage,
        path: &Path,
        format: Format,
        quality: Quality,
    ) -> Result<(), BackendError> {
        let image_format = to_image_format(format);
        if !image_format.writing_enabled() {
            return Err(BackendError::UnsupportedSaveFormat(format));
        }

        // Encode fully in memory so a failure never touches `path`
        let mut bytes = Cursor::new(Vec::new());
        match format {
            Format::Jpeg => {
                // JPEG has no alpha, and the encoder wants 1-100
                let encoder =
                    JpegEncoder::new_with_quality(&mut bytes, quality.value().clamp(1, 100) as u8);
                DynamicImage::ImageRgb8(buffer.to_rgb8())
                    .write_with_encoder(encoder)
                    .map_err(|e| encode_error(e, format))?;
            }
            _ => encodable(buffer, format)
                .write_to(&mut bytes, image_format)
                .map_err(|e| encode_error(e, format))?,
        }
        fs::write(path, bytes.into_inner())?;
        Ok(())
    }
}

/// Byte length of a `width` x `height` buffer, if it is addressable.
fn canvas_len(dimensions: Dimensions, channels: u8) -> Option<usize> {
    u64::from(dimensions.width)
        .checked_mul(u64::from(dimensions.height))?
        .checked_mul(u64::from(channels))
        .and_then(|len| usize::try_from(len).ok())
}

/// Allocate a buffer filled with `pixel`, failing instead of panicking or
/// aborting when the size cannot be allocated.
fn filled_canvas<P>(
    dimensions: Dimensions,
    pixel: P,
) -> Result<ImageBuffer<P, Vec<u8>>, BackendError>
where
    P: Pixel<Subpixel = u8>,
{
    let failed = || {
        BackendError::ProcessingFailed(format!("Failed to create new {dimensions} canvas"))
    };
    let len = canvas_len(dimensions, P::CHANNEL_COUNT).ok_or_else(failed)?;
    let mut raw = Vec::new();
    raw.try_reserve_exact(len).map_err(|_| failed())?;
    let channels = pixel.channels();
    while raw.len() < len {
        raw.extend_from_slice(channels);
    }
    ImageBuffer::from_raw(dimensions.width, dimensions.height, raw).ok_or_else(failed)
}
