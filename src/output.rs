//! CLI output formatting.
//!
//! Each printable thing has a `format_*` function returning `Vec<String>` for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.
//!
//! # Output Format
//!
//! ## Convert / batch
//!
//! ```text
//! Converting 2 images
//! 001 dawn.jpg → out/dawn.jpg
//!     800x600 jpeg, quality 92
//! 002 broken.png failed
//!     Error: Failed to decode broken.png: ...
//!
//! Converted 1 image, 1 failed
//! ```
//!
//! ## Plan
//!
//! ```text
//! Crop 4000x3000 → 100x100
//!     Region: 3000x3000 at +500+0
//! ```

use crate::pipeline::{BatchSummary, JobReport, Plan, ProcessEvent};
use std::path::Path;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

/// Detail line for a written image: size, format and quality when used.
fn report_detail(report: &JobReport) -> String {
    match report.quality {
        Some(q) => format!("    {} {}, quality {}", report.dimensions, report.format, q),
        None => format!("    {} {}", report.dimensions, report.format),
    }
}

// ============================================================================
// Convert
// ============================================================================

pub fn format_report(report: &JobReport) -> Vec<String> {
    vec![
        format!(
            "{} → {}",
            report.source.display(),
            report.output.display()
        ),
        report_detail(report),
    ]
}

pub fn print_report(report: &JobReport) {
    for line in format_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Batch
// ============================================================================

/// Format a single batch progress event as display lines.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::BatchStarted { total } => {
            vec![format!("Converting {}", plural(*total, "image"))]
        }
        ProcessEvent::ImageProcessed { index, report } => vec![
            format!(
                "{} {} → {}",
                format_index(*index),
                file_name(&report.source),
                report.output.display()
            ),
            report_detail(report),
        ],
        ProcessEvent::ImageFailed {
            index,
            source,
            error,
        } => vec![
            format!("{} {} failed", format_index(*index), file_name(source)),
            format!("    Error: {}", error),
        ],
    }
}

pub fn format_batch_summary(summary: &BatchSummary) -> Vec<String> {
    let mut headline = format!("Converted {}", plural(summary.reports.len(), "image"));
    if !summary.failures.is_empty() {
        headline.push_str(&format!(", {} failed", summary.failures.len()));
    }
    vec![String::new(), headline]
}

pub fn print_batch_summary(summary: &BatchSummary) {
    for line in format_batch_summary(summary) {
        println!("{}", line);
    }
}

// ============================================================================
// Plan
// ============================================================================

pub fn format_plan(plan: &Plan) -> Vec<String> {
    match plan {
        Plan::Resize {
            source,
            fitted,
            output,
        } => vec![
            format!("Resize {} → {}", source, output),
            format!("    Fit: {:.2} x {:.2}", fitted.0, fitted.1),
        ],
        Plan::Crop {
            source,
            region,
            output,
        } => vec![
            format!("Crop {} → {}", source, output),
            format!(
                "    Region: {}x{} at +{}+{}",
                region.width, region.height, region.offset_x, region.offset_y
            ),
        ],
    }
}

pub fn print_plan(plan: &Plan) {
    for line in format_plan(plan) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{Dimensions, Format, crop_region};
    use crate::pipeline::BatchFailure;
    use std::path::PathBuf;

    fn report(quality: Option<u32>) -> JobReport {
        JobReport {
            source: PathBuf::from("photos/dawn.jpg"),
            output: PathBuf::from("out/dawn.jpg"),
            dimensions: Dimensions::new(800, 600),
            format: Format::Jpeg,
            quality,
        }
    }

    #[test]
    fn format_index_pads_to_three_digits() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(1000), "1000");
    }

    #[test]
    fn report_lines() {
        assert_eq!(
            format_report(&report(Some(92))),
            vec!["photos/dawn.jpg → out/dawn.jpg", "    800x600 jpeg, quality 92"]
        );
    }

    #[test]
    fn report_without_quality() {
        let mut r = report(None);
        r.format = Format::Png;
        assert_eq!(format_report(&r)[1], "    800x600 png");
    }

    #[test]
    fn batch_started_event() {
        let lines = format_process_event(&ProcessEvent::BatchStarted { total: 1 });
        assert_eq!(lines, vec!["Converting 1 image"]);
        let lines = format_process_event(&ProcessEvent::BatchStarted { total: 3 });
        assert_eq!(lines, vec!["Converting 3 images"]);
    }

    #[test]
    fn image_processed_event_leads_with_index() {
        let lines = format_process_event(&ProcessEvent::ImageProcessed {
            index: 7,
            report: report(Some(80)),
        });
        assert_eq!(lines[0], "007 dawn.jpg → out/dawn.jpg");
        assert_eq!(lines[1], "    800x600 jpeg, quality 80");
    }

    #[test]
    fn image_failed_event_shows_error() {
        let lines = format_process_event(&ProcessEvent::ImageFailed {
            index: 2,
            source: PathBuf::from("in/broken.png"),
            error: "Can not work with image format unknown".into(),
        });
        assert_eq!(
            lines,
            vec![
                "002 broken.png failed",
                "    Error: Can not work with image format unknown"
            ]
        );
    }

    #[test]
    fn summary_counts_failures() {
        let summary = BatchSummary {
            reports: vec![report(Some(92))],
            failures: vec![BatchFailure {
                source: PathBuf::from("bad.gif"),
                error: "boom".into(),
            }],
        };
        assert_eq!(
            format_batch_summary(&summary),
            vec!["", "Converted 1 image, 1 failed"]
        );
    }

    #[test]
    fn summary_without_failures() {
        let summary = BatchSummary {
            reports: vec![report(None), report(None)],
            failures: Vec::new(),
        };
        assert_eq!(format_batch_summary(&summary)[1], "Converted 2 images");
    }

    #[test]
    fn plan_lines() {
        let resize = Plan::Resize {
            source: Dimensions::new(1000, 333),
            fitted: (100.0, 33.3),
            output: Dimensions::new(100, 33),
        };
        assert_eq!(
            format_plan(&resize),
            vec!["Resize 1000x333 → 100x33", "    Fit: 100.00 x 33.30"]
        );

        let region = crop_region((4000, 3000), 100, 100).unwrap();
        let crop = Plan::Crop {
            source: Dimensions::new(4000, 3000),
            region,
            output: region.target,
        };
        assert_eq!(
            format_plan(&crop),
            vec!["Crop 4000x3000 → 100x100", "    Region: 3000x3000 at +500+0"]
        );
    }
}
