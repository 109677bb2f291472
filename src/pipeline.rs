//! Conversion jobs built on the image adapter.
//!
//! A [`Job`] describes what to do to one file. The operations always run in a
//! fixed order, whatever order the flags were given in:
//!
//! ```text
//! load → autorotate → rotate → resize | crop → save
//! ```
//!
//! [`run_job`] converts a single file. [`run_batch`] walks a directory and
//! runs one adapter per file in parallel using [rayon](https://docs.rs/rayon).
//! Adapters share nothing but the backend and metadata reader, which are
//! `Sync`. A file that fails is reported and skipped, never aborting the batch.
//!
//! ## Batch output layout
//!
//! ```text
//! input/                     output/
//! ├── a.jpg          →       ├── a.jpg
//! └── trip/                  └── trip/
//!     └── b.png      →           └── b.png   (b.jpg with --format jpeg)
//! ```
//!
//! With `--format`, `a.png` and `a.bmp` would both become `a.jpg`. The first
//! in sorted order wins and the rest are reported as failures.

use crate::adapter::{AdapterError, AdapterOptions, ImageAdapter};
use crate::imaging::{
    CropRegion, Dimensions, Format, GeometryError, MetadataReader, RasterBackend,
    bounding_box_fit, crop_region, round_to_dimensions, supported_input_extensions,
};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to walk input directory: {0}")]
    Walk(#[from] walkdir::Error),
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error("Invalid size '{0}', expected WxH, Wx or xH")]
    InvalidSize(String),
    #[error("Output {} is already written by {}", .output.display(), .first.display())]
    OutputCollision { output: PathBuf, first: PathBuf },
}

/// Parse a size string: `WxH`, `Wx` (height derived) or `xH` (width derived).
///
/// A missing side is returned as 0. At least one side must be non-zero.
pub fn parse_size(input: &str) -> Result<(u32, u32), PipelineError> {
    let invalid = || PipelineError::InvalidSize(input.to_string());
    let (width, height) = input.trim().split_once(['x', 'X']).ok_or_else(invalid)?;

    let side = |s: &str| -> Result<u32, PipelineError> {
        if s.is_empty() {
            Ok(0)
        } else {
            s.parse().map_err(|_| invalid())
        }
    };
    let size = (side(width)?, side(height)?);
    if size == (0, 0) {
        return Err(invalid());
    }
    Ok(size)
}

/// The geometry step of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Geometry {
    /// Fit inside the box, preserving aspect ratio.
    Resize { width: u32, height: u32 },
    /// Centered crop to the exact size.
    Crop { width: u32, height: u32 },
}

impl Geometry {
    fn apply<B: RasterBackend, M: MetadataReader>(
        self,
        adapter: &mut ImageAdapter<'_, B, M>,
    ) -> Result<(), AdapterError> {
        match self {
            Geometry::Resize { width, height } => adapter.resize(width, height)?,
            Geometry::Crop { width, height } => adapter.crop(width, height)?,
        };
        Ok(())
    }
}

/// Geometry computed for a source size without touching pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Plan {
    Resize {
        source: Dimensions,
        /// Unrounded box fit.
        fitted: (f64, f64),
        output: Dimensions,
    },
    Crop {
        source: Dimensions,
        region: CropRegion,
        output: Dimensions,
    },
}

/// Compute what `geometry` would do to an image of size `source`.
pub fn plan(source: Dimensions, geometry: Geometry) -> Result<Plan, GeometryError> {
    match geometry {
        Geometry::Resize { width, height } => {
            let fitted = bounding_box_fit(source.as_tuple(), width, height)?;
            Ok(Plan::Resize {
                source,
                fitted,
                output: round_to_dimensions(fitted)?,
            })
        }
        Geometry::Crop { width, height } => {
            let region = crop_region(source.as_tuple(), width, height)?;
            Ok(Plan::Crop {
                source,
                region,
                output: region.target,
            })
        }
    }
}

/// What to do to one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Job {
    pub autorotate: bool,
    /// Explicit EXIF orientation code, applied after autorotate.
    pub rotate: Option<u32>,
    pub geometry: Option<Geometry>,
    /// Output format override. `None` keeps the detected format.
    pub format: Option<Format>,
}

impl Default for Job {
    fn default() -> Self {
        Self {
            autorotate: true,
            rotate: None,
            geometry: None,
            format: None,
        }
    }
}

/// Result of one successful conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobReport {
    pub source: PathBuf,
    pub output: PathBuf,
    pub dimensions: Dimensions,
    pub format: Format,
    /// Encoder quality, for formats that use one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<u32>,
}

/// Convert `source` into `output` according to `job`.
pub fn run_job<B: RasterBackend, M: MetadataReader>(
    backend: &B,
    metadata: &M,
    options: AdapterOptions,
    source: &Path,
    output: &Path,
    job: &Job,
) -> Result<JobReport, AdapterError> {
    let mut adapter = ImageAdapter::open(backend, metadata, source, options)?;
    if job.autorotate {
        adapter.autorotate()?;
    }
    if let Some(code) = job.rotate {
        adapter.rotate(code)?;
    }
    if let Some(geometry) = job.geometry {
        geometry.apply(&mut adapter)?;
    }

    let (Some(dimensions), Some(detected)) = (adapter.dimensions(), adapter.format()) else {
        return Err(AdapterError::InvalidState {
            operation: "save",
            state: adapter.state(),
        });
    };
    let format = job.format.unwrap_or(detected);
    adapter.save(output, job.format)?;

    Ok(JobReport {
        source: source.to_path_buf(),
        output: output.to_path_buf(),
        dimensions,
        format,
        quality: format.uses_quality().then(|| options.quality.value()),
    })
}

/// Find every file under `dir` with an extension the backend can decode, sorted.
pub fn collect_inputs(dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let extensions = supported_input_extensions();
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let supported = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| extensions.contains(&ext.to_ascii_lowercase().as_str()));
        if supported {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Output path for `source` in a batch: same relative path under `output_dir`,
/// with the extension swapped when the format is overridden.
pub fn batch_output_path(
    input_dir: &Path,
    source: &Path,
    output_dir: &Path,
    format: Option<Format>,
) -> PathBuf {
    let relative = source
        .strip_prefix(input_dir)
        .ok()
        .filter(|rel| !rel.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .or_else(|| source.file_name().map(PathBuf::from))
        .unwrap_or_else(|| source.to_path_buf());
    let path = output_dir.join(relative);
    match format {
        Some(format) => path.with_extension(format.extension()),
        None => path,
    }
}

/// Pair each input with its output path. The first input in sorted order
/// keeps a contested path; later ones get an `OutputCollision` so two jobs
/// never write the same file.
fn claim_outputs<'a>(
    inputs: &'a [PathBuf],
    input_dir: &Path,
    output_dir: &Path,
    format: Option<Format>,
) -> Vec<(&'a PathBuf, Result<PathBuf, PipelineError>)> {
    let mut claimed: HashMap<PathBuf, &Path> = HashMap::new();
    inputs
        .iter()
        .map(|source| {
            let output = batch_output_path(input_dir, source, output_dir, format);
            let claim = match claimed.entry(output) {
                Entry::Occupied(taken) => Err(PipelineError::OutputCollision {
                    output: taken.key().clone(),
                    first: taken.get().to_path_buf(),
                }),
                Entry::Vacant(free) => {
                    let output = free.key().clone();
                    free.insert(source);
                    Ok(output)
                }
            };
            (source, claim)
        })
        .collect()
}

/// Progress reported while a batch runs.
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    BatchStarted {
        total: usize,
    },
    /// `index` is 1-based, in input order. Events arrive in completion order.
    ImageProcessed {
        index: usize,
        report: JobReport,
    },
    ImageFailed {
        index: usize,
        source: PathBuf,
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub source: PathBuf,
    pub error: String,
}

/// Outcome of a batch, in input order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub reports: Vec<JobReport>,
    pub failures: Vec<BatchFailure>,
}

/// Run `job` on every supported file under `input_dir`, writing into `output_dir`.
///
/// Work is spread over the global rayon pool. Per-file failures are collected
/// in the summary; only failing to list the input or create the output
/// directory aborts the batch.
pub fn run_batch<B: RasterBackend, M: MetadataReader>(
    backend: &B,
    metadata: &M,
    options: AdapterOptions,
    job: &Job,
    input_dir: &Path,
    output_dir: &Path,
    progress: Option<Sender<ProcessEvent>>,
) -> Result<BatchSummary, PipelineError> {
    let inputs = collect_inputs(input_dir)?;
    if inputs.is_empty() {
        log::warn!("No image files found in {}", input_dir.display());
    }
    fs::create_dir_all(output_dir)?;

    let emit = |event: ProcessEvent| {
        if let Some(tx) = &progress {
            // A closed receiver only means nobody is listening
            let _ = tx.send(event);
        }
    };
    emit(ProcessEvent::BatchStarted {
        total: inputs.len(),
    });
    log::info!(
        "Processing {} images from {}",
        inputs.len(),
        input_dir.display()
    );

    let planned = claim_outputs(&inputs, input_dir, output_dir, job.format);
    let results: Vec<Result<JobReport, BatchFailure>> = planned
        .into_par_iter()
        .enumerate()
        .map(|(i, (source, output))| {
            let result = output.and_then(|output| {
                if let Some(parent) = output.parent() {
                    fs::create_dir_all(parent)?;
                }
                Ok(run_job(backend, metadata, options, source, &output, job)?)
            });
            match result {
                Ok(report) => {
                    emit(ProcessEvent::ImageProcessed {
                        index: i + 1,
                        report: report.clone(),
                    });
                    Ok(report)
                }
                Err(err) => {
                    log::warn!("Failed to convert {}: {}", source.display(), err);
                    let failure = BatchFailure {
                        source: source.clone(),
                        error: err.to_string(),
                    };
                    emit(ProcessEvent::ImageFailed {
                        index: i + 1,
                        source: failure.source.clone(),
                        error: failure.error.clone(),
                    });
                    Err(failure)
                }
            }
        })
        .collect();

    let mut summary = BatchSummary::default();
    for result in results {
        match result {
            Ok(report) => summary.reports.push(report),
            Err(failure) => summary.failures.push(failure),
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::Quality;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::imaging::metadata::tests::FixedReader;
    use std::sync::mpsc;

    // =========================================================================
    // parse_size
    // =========================================================================

    #[test]
    fn parse_size_both_sides() {
        assert_eq!(parse_size("400x300").unwrap(), (400, 300));
        assert_eq!(parse_size(" 10X20 ").unwrap(), (10, 20));
    }

    #[test]
    fn parse_size_single_side() {
        assert_eq!(parse_size("100x").unwrap(), (100, 0));
        assert_eq!(parse_size("x50").unwrap(), (0, 50));
        assert_eq!(parse_size("100x0").unwrap(), (100, 0));
    }

    #[test]
    fn parse_size_rejects_garbage() {
        for input in ["", "x", "0x0", "100", "axb", "-1x5", "1x2x3", "1.5x2"] {
            assert!(
                matches!(parse_size(input), Err(PipelineError::InvalidSize(_))),
                "{input:?}"
            );
        }
    }

    // =========================================================================
    // plan
    // =========================================================================

    #[test]
    fn plan_resize_keeps_raw_fit() {
        let plan = plan(
            Dimensions::new(1000, 333),
            Geometry::Resize {
                width: 100,
                height: 100,
            },
        )
        .unwrap();
        let Plan::Resize { fitted, output, .. } = plan else {
            panic!("expected resize plan");
        };
        assert!((fitted.1 - 33.3).abs() < 1e-9);
        assert_eq!(output, Dimensions::new(100, 33));
    }

    #[test]
    fn plan_crop_reports_region() {
        let plan = plan(
            Dimensions::new(4000, 3000),
            Geometry::Crop {
                width: 100,
                height: 100,
            },
        )
        .unwrap();
        let Plan::Crop { region, output, .. } = plan else {
            panic!("expected crop plan");
        };
        assert_eq!((region.offset_x, region.offset_y), (500, 0));
        assert_eq!(output, Dimensions::new(100, 100));
    }

    #[test]
    fn plan_serializes_with_mode_tag() {
        let plan = plan(
            Dimensions::new(4000, 3000),
            Geometry::Resize {
                width: 100,
                height: 0,
            },
        )
        .unwrap();
        let json = serde_json::to_value(plan).unwrap();
        assert_eq!(json["mode"], "resize");
        assert_eq!(json["output"]["width"], 100);
        assert_eq!(json["output"]["height"], 75);
    }

    #[test]
    fn plan_rejects_zero_box() {
        assert!(plan(
            Dimensions::new(10, 10),
            Geometry::Crop {
                width: 0,
                height: 0
            }
        )
        .is_err());
    }

    // =========================================================================
    // run_job
    // =========================================================================

    #[test]
    fn run_job_applies_steps_in_order() {
        let backend = MockBackend::with_image(300, 400, Format::Jpeg);
        let reader = FixedReader::returning(Some(6));
        let job = Job {
            autorotate: true,
            rotate: Some(3),
            geometry: Some(Geometry::Crop {
                width: 40,
                height: 40,
            }),
            format: None,
        };

        let report = run_job(
            &backend,
            &reader,
            AdapterOptions::default(),
            Path::new("/in.jpg"),
            Path::new("/out.jpg"),
            &job,
        )
        .unwrap();

        let ops: Vec<_> = backend
            .get_operations()
            .into_iter()
            .filter(|op| {
                matches!(
                    op,
                    RecordedOp::Rotate(_) | RecordedOp::Resample(_) | RecordedOp::Encode { .. }
                )
            })
            .collect();
        assert!(matches!(ops[0], RecordedOp::Rotate(crate::imaging::Rotation::Ccw270)));
        assert!(matches!(ops[1], RecordedOp::Rotate(crate::imaging::Rotation::Ccw180)));
        assert!(matches!(ops[2], RecordedOp::Resample(_)));
        assert!(matches!(ops[3], RecordedOp::Encode { .. }));

        assert_eq!(report.dimensions, Dimensions::new(40, 40));
        assert_eq!(report.format, Format::Jpeg);
        assert_eq!(report.quality, Some(92));
        assert_eq!(backend.live_buffers(), 0);
    }

    #[test]
    fn run_job_without_autorotate_ignores_exif() {
        let backend = MockBackend::with_image(300, 400, Format::Jpeg);
        let reader = FixedReader::returning(Some(6));
        let job = Job {
            autorotate: false,
            ..Job::default()
        };

        let report = run_job(
            &backend,
            &reader,
            AdapterOptions::default(),
            Path::new("/in.jpg"),
            Path::new("/out.jpg"),
            &job,
        )
        .unwrap();
        assert_eq!(report.dimensions, Dimensions::new(300, 400));
        assert_eq!(reader.call_count(), 0);
    }

    #[test]
    fn run_job_format_override() {
        let backend = MockBackend::with_image(30, 40, Format::Jpeg);
        let reader = FixedReader::returning(None);
        let job = Job {
            format: Some(Format::Png),
            ..Job::default()
        };
        let options = AdapterOptions {
            quality: Quality::new(50),
        };

        let report = run_job(
            &backend,
            &reader,
            options,
            Path::new("/in.jpg"),
            Path::new("/out.png"),
            &job,
        )
        .unwrap();
        assert_eq!(report.format, Format::Png);
        assert_eq!(report.quality, None);
        assert!(backend.get_operations().contains(&RecordedOp::Encode {
            path: "/out.png".into(),
            format: Format::Png,
            quality: 50,
        }));
    }

    #[test]
    fn run_job_releases_buffer_on_failure() {
        let backend = MockBackend::with_image(30, 40, Format::Jpeg);
        let reader = FixedReader::returning(None);
        let job = Job {
            geometry: Some(Geometry::Resize {
                width: 0,
                height: 0,
            }),
            ..Job::default()
        };

        let result = run_job(
            &backend,
            &reader,
            AdapterOptions::default(),
            Path::new("/in.jpg"),
            Path::new("/out.jpg"),
            &job,
        );
        assert!(matches!(result, Err(AdapterError::InvalidDimensions(_))));
        assert_eq!(backend.live_buffers(), 0);
    }

    // =========================================================================
    // batch
    // =========================================================================

    #[test]
    fn batch_output_path_keeps_relative_path() {
        let out = batch_output_path(
            Path::new("/in"),
            Path::new("/in/trip/b.png"),
            Path::new("/out"),
            None,
        );
        assert_eq!(out, PathBuf::from("/out/trip/b.png"));
    }

    #[test]
    fn batch_output_path_swaps_extension_on_override() {
        let out = batch_output_path(
            Path::new("/in"),
            Path::new("/in/a.PNG"),
            Path::new("/out"),
            Some(Format::Jpeg),
        );
        assert_eq!(out, PathBuf::from("/out/a.jpg"));
    }

    #[test]
    fn batch_output_path_outside_input_uses_file_name() {
        let out = batch_output_path(
            Path::new("/in"),
            Path::new("/elsewhere/c.gif"),
            Path::new("/out"),
            None,
        );
        assert_eq!(out, PathBuf::from("/out/c.gif"));
    }

    #[test]
    fn collect_inputs_filters_and_sorts() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("sub")).unwrap();
        for name in ["b.jpg", "a.PNG", "sub/c.gif", "notes.txt", ".hidden.jpg"] {
            fs::write(root.join(name), b"x").unwrap();
        }

        let files = collect_inputs(root).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["a.PNG", "b.jpg", "sub/c.gif"]);
    }

    #[test]
    fn collect_inputs_missing_dir_fails() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert!(matches!(
            collect_inputs(&tmp.path().join("nope")),
            Err(PipelineError::Walk(_))
        ));
    }

    #[test]
    fn run_batch_processes_every_file_and_reports_progress() {
        let tmp = tempfile::TempDir::new().unwrap();
        let input = tmp.path().join("in");
        let output = tmp.path().join("out");
        fs::create_dir_all(input.join("nested")).unwrap();
        fs::write(input.join("one.jpg"), b"x").unwrap();
        fs::write(input.join("nested/two.jpg"), b"x").unwrap();

        let backend = MockBackend::with_image(200, 100, Format::Jpeg);
        let reader = FixedReader::returning(None);
        let job = Job {
            geometry: Some(Geometry::Resize {
                width: 50,
                height: 0,
            }),
            ..Job::default()
        };
        let (tx, rx) = mpsc::channel();

        let summary = run_batch(
            &backend,
            &reader,
            AdapterOptions::default(),
            &job,
            &input,
            &output,
            Some(tx),
        )
        .unwrap();

        assert_eq!(summary.reports.len(), 2);
        assert!(summary.failures.is_empty());
        assert_eq!(summary.reports[0].output, output.join("nested/two.jpg"));
        assert_eq!(summary.reports[1].output, output.join("one.jpg"));
        assert!(summary
            .reports
            .iter()
            .all(|r| r.dimensions == Dimensions::new(50, 25)));
        assert!(output.join("nested").is_dir());

        let events: Vec<ProcessEvent> = rx.iter().collect();
        assert!(matches!(events[0], ProcessEvent::BatchStarted { total: 2 }));
        assert_eq!(events.len(), 3);
        assert_eq!(backend.live_buffers(), 0);
    }

    #[test]
    fn run_batch_rejects_outputs_that_would_collide() {
        let tmp = tempfile::TempDir::new().unwrap();
        let input = tmp.path().join("in");
        let output = tmp.path().join("out");
        fs::create_dir_all(&input).unwrap();
        fs::write(input.join("a.png"), b"x").unwrap();
        fs::write(input.join("a.bmp"), b"x").unwrap();
        fs::write(input.join("b.png"), b"x").unwrap();

        let backend = MockBackend::with_image(20, 10, Format::Png);
        let reader = FixedReader::returning(None);
        let job = Job {
            format: Some(Format::Jpeg),
            ..Job::default()
        };

        let summary = run_batch(
            &backend,
            &reader,
            AdapterOptions::default(),
            &job,
            &input,
            &output,
            None,
        )
        .unwrap();

        let outputs: Vec<&PathBuf> = summary.reports.iter().map(|r| &r.output).collect();
        assert_eq!(outputs, vec![&output.join("a.jpg"), &output.join("b.jpg")]);
        assert_eq!(summary.reports[0].source, input.join("a.bmp"));
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].source, input.join("a.png"));
        assert!(summary.failures[0].error.contains("a.bmp"));
        assert_eq!(backend.live_buffers(), 0);
    }

    #[test]
    fn claim_outputs_without_override_keeps_distinct_paths() {
        let root = Path::new("in");
        let inputs = vec![root.join("a.bmp"), root.join("a.png")];
        let planned = claim_outputs(&inputs, root, Path::new("out"), None);
        assert!(planned.iter().all(|(_, output)| output.is_ok()));
    }

    #[test]
    fn run_batch_collects_failures() {
        let tmp = tempfile::TempDir::new().unwrap();
        let input = tmp.path().join("in");
        fs::create_dir_all(&input).unwrap();
        fs::write(input.join("bad.jpg"), b"x").unwrap();

        let backend = MockBackend::undecodable();
        let reader = FixedReader::returning(None);

        let summary = run_batch(
            &backend,
            &reader,
            AdapterOptions::default(),
            &Job::default(),
            &input,
            &tmp.path().join("out"),
            None,
        )
        .unwrap();

        assert!(summary.reports.is_empty());
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].source, input.join("bad.jpg"));
    }
}
