//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::backend::Dimensions;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryError {
    #[error("cannot {operation} to 0x0")]
    ZeroTarget { operation: &'static str },
    #[error("source dimensions must be non-zero, got {width}x{height}")]
    EmptySource { width: u32, height: u32 },
    #[error("computed size {width}x{height} has a zero side")]
    Degenerate { width: u32, height: u32 },
}

fn check_source(source: (u32, u32)) -> Result<(), GeometryError> {
    let (width, height) = source;
    if width == 0 || height == 0 {
        return Err(GeometryError::EmptySource { width, height });
    }
    Ok(())
}

/// Fit a source into a bounding box, preserving aspect ratio.
///
/// A zero box side means "derive it from the other side". When both sides are
/// given, the result fits entirely inside the box and at most one side touches
/// its edge.
///
/// The single-side branches round to the nearest pixel. The two-side branch
/// returns the raw scaled values, so callers must round before use (see
/// [`round_to_dimensions`]).
///
/// # Examples
/// ```
/// # use framefit::imaging::bounding_box_fit;
/// assert_eq!(bounding_box_fit((4000, 3000), 100, 0).unwrap(), (100.0, 75.0));
/// ```
pub fn bounding_box_fit(
    source: (u32, u32),
    box_width: u32,
    box_height: u32,
) -> Result<(f64, f64), GeometryError> {
    if box_width == 0 && box_height == 0 {
        return Err(GeometryError::ZeroTarget {
            operation: "resize",
        });
    }
    check_source(source)?;

    let (src_w, src_h) = (source.0 as f64, source.1 as f64);
    let (box_w, box_h) = (box_width as f64, box_height as f64);

    if box_height == 0 {
        // Derive height from width
        Ok((box_w, (box_w * src_h / src_w).round()))
    } else if box_width == 0 {
        // Derive width from height
        Ok(((box_h * src_w / src_h).round(), box_h))
    } else {
        let scale = (box_w / src_w).min(box_h / src_h);
        Ok((src_w * scale, src_h * scale))
    }
}

/// Round a fitted size to whole pixels, rejecting zero-sized results.
pub fn round_to_dimensions(fitted: (f64, f64)) -> Result<Dimensions, GeometryError> {
    let width = fitted.0.round() as u32;
    let height = fitted.1.round() as u32;
    if width == 0 || height == 0 {
        return Err(GeometryError::Degenerate { width, height });
    }
    Ok(Dimensions { width, height })
}

/// Source rectangle to extract for a centered crop, and the size to scale it to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CropRegion {
    /// Width of the source rectangle.
    pub width: u32,
    /// Height of the source rectangle.
    pub height: u32,
    pub offset_x: u32,
    pub offset_y: u32,
    /// Requested output size, with a zero side replaced by the other side.
    pub target: Dimensions,
}

/// Calculate the centered source rectangle matching a target aspect ratio.
///
/// The returned rectangle is the largest one with the requested ratio that
/// fits the source, centered on it. The caller resamples that rectangle to
/// `target`; crop and resize are one operation.
///
/// # Examples
/// ```
/// # use framefit::imaging::crop_region;
/// let region = crop_region((4000, 3000), 100, 100).unwrap();
/// assert_eq!((region.width, region.height), (3000, 3000));
/// assert_eq!((region.offset_x, region.offset_y), (500, 0));
/// ```
pub fn crop_region(
    source: (u32, u32),
    width: u32,
    height: u32,
) -> Result<CropRegion, GeometryError> {
    if width == 0 && height == 0 {
        return Err(GeometryError::ZeroTarget { operation: "crop" });
    }
    check_source(source)?;

    // A missing side means a square target
    let width = if width == 0 { height } else { width };
    let height = if height == 0 { width } else { height };

    let (src_w, src_h) = source;
    let old_ratio = src_w as f64 / src_h as f64;
    let new_ratio = width as f64 / height as f64;

    let full_width = || (src_w, (src_w as f64 / new_ratio) as u32);
    let full_height = || ((src_h as f64 * new_ratio) as u32, src_h);

    let (crop_w, crop_h) = if new_ratio >= 1.0 {
        if new_ratio > old_ratio {
            full_width()
        } else {
            full_height()
        }
    } else if new_ratio < old_ratio {
        full_height()
    } else {
        full_width()
    };
    let (crop_w, crop_h) = (crop_w.min(src_w), crop_h.min(src_h));

    if crop_w == 0 || crop_h == 0 {
        return Err(GeometryError::Degenerate {
            width: crop_w,
            height: crop_h,
        });
    }

    Ok(CropRegion {
        width: crop_w,
        height: crop_h,
        offset_x: (src_w - crop_w) / 2,
        offset_y: (src_h - crop_h) / 2,
        target: Dimensions { width, height },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // bounding_box_fit tests
    // =========================================================================

    #[test]
    fn fit_derives_height_from_width() {
        // 4000x3000 (4:3), width 100 → 100x75
        assert_eq!(bounding_box_fit((4000, 3000), 100, 0).unwrap(), (100.0, 75.0));
    }

    #[test]
    fn fit_derives_width_from_height() {
        // 4000x3000, height 150 → 200x150
        assert_eq!(bounding_box_fit((4000, 3000), 0, 150).unwrap(), (200.0, 150.0));
    }

    #[test]
    fn fit_single_side_rounds_to_nearest() {
        // 333 * 100 / 1000 = 33.3 → 33
        assert_eq!(bounding_box_fit((1000, 333), 100, 0).unwrap(), (100.0, 33.0));
        // 335 * 100 / 1000 = 33.5 → 34 (half away from zero)
        assert_eq!(bounding_box_fit((1000, 335), 100, 0).unwrap(), (100.0, 34.0));
    }

    #[test]
    fn fit_two_sides_is_not_rounded() {
        // 1000x333 into 100x100: scale 0.1 → 100 x 33.3
        let (w, h) = bounding_box_fit((1000, 333), 100, 100).unwrap();
        assert!((w - 100.0).abs() < 1e-9);
        assert!((h - 33.3).abs() < 1e-9);
    }

    #[test]
    fn fit_two_sides_portrait_source() {
        // 600x800 into 300x300: height limits
        let (w, h) = bounding_box_fit((600, 800), 300, 300).unwrap();
        assert!((w - 225.0).abs() < 1e-9);
        assert!((h - 300.0).abs() < 1e-9);
    }

    #[test]
    fn fit_stays_inside_box_for_many_inputs() {
        let sources = [(4000, 3000), (3000, 4000), (1, 1000), (1000, 1), (17, 23)];
        let boxes = [(100, 100), (1, 500), (640, 480), (7, 3)];
        for &src in &sources {
            for &(bw, bh) in &boxes {
                let (w, h) = bounding_box_fit(src, bw, bh).unwrap();
                assert!(w <= bw as f64 + 1e-9, "{src:?} in {bw}x{bh} gave width {w}");
                assert!(h <= bh as f64 + 1e-9, "{src:?} in {bw}x{bh} gave height {h}");
                let touches = (w - bw as f64).abs() < 1e-6 || (h - bh as f64).abs() < 1e-6;
                assert!(touches, "{src:?} in {bw}x{bh} touches no edge");
            }
        }
    }

    #[test]
    fn fit_rejects_zero_box() {
        assert_eq!(
            bounding_box_fit((100, 100), 0, 0),
            Err(GeometryError::ZeroTarget {
                operation: "resize"
            })
        );
    }

    #[test]
    fn fit_rejects_empty_source() {
        assert!(matches!(
            bounding_box_fit((0, 100), 10, 10),
            Err(GeometryError::EmptySource { .. })
        ));
    }

    // =========================================================================
    // round_to_dimensions tests
    // =========================================================================

    #[test]
    fn rounding_goes_to_nearest() {
        let dims = round_to_dimensions((99.99999999, 33.3)).unwrap();
        assert_eq!(dims, Dimensions::new(100, 33));
    }

    #[test]
    fn rounding_rejects_zero_side() {
        assert_eq!(
            round_to_dimensions((100.0, 0.4)),
            Err(GeometryError::Degenerate {
                width: 100,
                height: 0
            })
        );
    }

    // =========================================================================
    // crop_region tests
    // =========================================================================

    #[test]
    fn crop_square_from_landscape() {
        let region = crop_region((4000, 3000), 100, 100).unwrap();
        assert_eq!(
            region,
            CropRegion {
                width: 3000,
                height: 3000,
                offset_x: 500,
                offset_y: 0,
                target: Dimensions::new(100, 100),
            }
        );
    }

    #[test]
    fn crop_wide_target_from_landscape_is_width_limited() {
        // 16:9 from 4:3 → full width, height 4000 / (16/9) = 2250
        let region = crop_region((4000, 3000), 1600, 900).unwrap();
        assert_eq!((region.width, region.height), (4000, 2250));
        assert_eq!((region.offset_x, region.offset_y), (0, 375));
    }

    #[test]
    fn crop_portrait_target_from_landscape_is_height_limited() {
        // 4:5 from 4:3 → full height, width 3000 * 0.8 = 2400
        let region = crop_region((4000, 3000), 400, 500).unwrap();
        assert_eq!((region.width, region.height), (2400, 3000));
        assert_eq!((region.offset_x, region.offset_y), (800, 0));
    }

    #[test]
    fn crop_portrait_target_from_taller_portrait_is_width_limited() {
        // 4:5 from 1:2 → full width, height 1000 / 0.8 = 1250
        let region = crop_region((1000, 2000), 400, 500).unwrap();
        assert_eq!((region.width, region.height), (1000, 1250));
        assert_eq!((region.offset_x, region.offset_y), (0, 375));
    }

    #[test]
    fn crop_truncates_fractional_sizes() {
        // 3:1 from 1000x999: width-limited, 1000 / 3 = 333.33 → 333
        let region = crop_region((1000, 999), 300, 100).unwrap();
        assert_eq!((region.width, region.height), (1000, 333));
        // (999 - 333) / 2 = 333
        assert_eq!(region.offset_y, 333);
    }

    #[test]
    fn crop_odd_remainder_offsets_floor() {
        let region = crop_region((101, 100), 1, 1).unwrap();
        assert_eq!((region.width, region.height), (100, 100));
        assert_eq!((region.offset_x, region.offset_y), (0, 0));
    }

    #[test]
    fn crop_missing_side_means_square() {
        let region = crop_region((4000, 3000), 100, 0).unwrap();
        assert_eq!(region.target, Dimensions::new(100, 100));
        assert_eq!((region.width, region.height), (3000, 3000));

        let region = crop_region((4000, 3000), 0, 50).unwrap();
        assert_eq!(region.target, Dimensions::new(50, 50));
    }

    #[test]
    fn crop_rectangle_stays_inside_source() {
        let sources = [(4000, 3000), (3000, 4000), (7, 1000), (1000, 7), (333, 333)];
        let targets = [(100, 100), (16, 9), (9, 16), (1, 3), (5, 4)];
        for &(sw, sh) in &sources {
            for &(tw, th) in &targets {
                let r = crop_region((sw, sh), tw, th).unwrap();
                assert!(r.offset_x + r.width <= sw, "{sw}x{sh} → {tw}x{th}: {r:?}");
                assert!(r.offset_y + r.height <= sh, "{sw}x{sh} → {tw}x{th}: {r:?}");
                // Truncation moves at most one pixel on the derived side
                let wanted = tw as f64 / th as f64;
                let derived_w = r.height as f64 * wanted;
                let derived_h = r.width as f64 / wanted;
                assert!(
                    (derived_w - r.width as f64).abs() <= 1.0 + 1e-9
                        || (derived_h - r.height as f64).abs() <= 1.0 + 1e-9,
                    "{sw}x{sh} → {tw}x{th}: ratio off in {r:?}"
                );
            }
        }
    }

    #[test]
    fn crop_rejects_zero_target() {
        assert_eq!(
            crop_region((100, 100), 0, 0),
            Err(GeometryError::ZeroTarget { operation: "crop" })
        );
    }

    #[test]
    fn crop_rejects_degenerate_rectangle() {
        // 1:1000 from a 1000x1 strip leaves no pixel column
        assert!(matches!(
            crop_region((1000, 1), 1, 1000),
            Err(GeometryError::Degenerate { .. })
        ));
    }
}
