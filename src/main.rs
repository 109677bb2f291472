use clap::{Parser, Subcommand};
use framefit::adapter::AdapterOptions;
use framefit::config::{self, FramefitConfig};
use framefit::imaging::{Dimensions, ExifReader, Format, Quality, RustBackend};
use framefit::output;
use framefit::pipeline::{self, Geometry, Job, PipelineError, parse_size};
use log::LevelFilter;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "framefit")]
#[command(about = "Resize, crop and auto-rotate raster images")]
#[command(long_about = "\
Resize, crop and auto-rotate raster images

Every conversion runs the same fixed steps, skipping the ones not asked for:

  load → autorotate (EXIF) → rotate → resize | crop → save

Sizes are given as WxH. A missing side is derived from the other:

  --resize 800x600   fit inside 800x600, keeping the aspect ratio
  --resize 800x      800 wide, height follows
  --crop 400x500     centered crop, scaled to exactly 400x500
  --crop x300        300x300 square

The output format is detected from the input's content unless --format is
given. Supported: jpeg, png, gif, webp, tiff, bmp.

Run 'framefit gen-config' to generate a documented framefit.toml.")]
#[command(version)]
struct Cli {
    /// Config file layered over the stock defaults
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

/// Transform flags shared by `convert` and `batch`.
#[derive(clap::Args, Clone)]
struct TransformArgs {
    /// Fit inside WxH, preserving aspect ratio
    #[arg(long, value_name = "WxH", conflicts_with = "crop")]
    resize: Option<String>,

    /// Centered crop scaled to exactly WxH
    #[arg(long, value_name = "WxH")]
    crop: Option<String>,

    /// Apply an EXIF orientation code (0-8) after autorotate
    #[arg(long, value_name = "N")]
    rotate: Option<u32>,

    /// Ignore the EXIF orientation tag
    #[arg(long)]
    no_autorotate: bool,

    /// Output format; defaults to the input's format
    #[arg(long, value_name = "FORMAT")]
    format: Option<Format>,

    /// Encoder quality (0-100), overrides the config file
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=100))]
    quality: Option<u32>,
}

#[derive(Subcommand)]
enum Command {
    /// Convert a single image
    Convert {
        input: PathBuf,
        output: PathBuf,
        #[command(flatten)]
        transform: TransformArgs,
    },
    /// Convert every image under a directory, in parallel
    Batch {
        input_dir: PathBuf,
        output_dir: PathBuf,
        #[command(flatten)]
        transform: TransformArgs,
    },
    /// Show the geometry a resize or crop would produce for a source size
    Plan {
        /// Source size, WxH
        #[arg(value_name = "WxH")]
        source: String,
        #[arg(long, value_name = "WxH", conflicts_with = "crop", required_unless_present = "crop")]
        resize: Option<String>,
        #[arg(long, value_name = "WxH")]
        crop: Option<String>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Print a stock framefit.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Convert {
            input,
            output,
            transform,
        } => {
            let config = config::load_config(cli.config.as_deref())?;
            let (options, job) = build_job(&config, &transform)?;
            let backend = RustBackend::new();
            let exif = ExifReader::new();
            let report = pipeline::run_job(&backend, &exif, options, &input, &output, &job)?;
            output::print_report(&report);
        }
        Command::Batch {
            input_dir,
            output_dir,
            transform,
        } => {
            let config = config::load_config(cli.config.as_deref())?;
            let (options, job) = build_job(&config, &transform)?;
            init_thread_pool(&config.processing);

            let backend = RustBackend::new();
            let exif = ExifReader::new();
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_process_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let summary = pipeline::run_batch(
                &backend,
                &exif,
                options,
                &job,
                &input_dir,
                &output_dir,
                Some(tx),
            )?;
            printer
                .join()
                .map_err(|_| "progress printer thread panicked")?;
            output::print_batch_summary(&summary);

            if !summary.failures.is_empty() {
                let total = summary.failures.len() + summary.reports.len();
                return Err(format!("{} of {} images failed", summary.failures.len(), total).into());
            }
        }
        Command::Plan {
            source,
            resize,
            crop,
            json,
        } => {
            let (width, height) = parse_size(&source)?;
            let geometry = geometry_from(resize.as_deref(), crop.as_deref())?
                .ok_or("plan needs --resize or --crop")?;
            let plan = pipeline::plan(Dimensions::new(width, height), geometry)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else {
                output::print_plan(&plan);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Log level from `-v` count; `RUST_LOG` still wins when set.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores: users can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

fn geometry_from(
    resize: Option<&str>,
    crop: Option<&str>,
) -> Result<Option<Geometry>, PipelineError> {
    if let Some(size) = resize {
        let (width, height) = parse_size(size)?;
        return Ok(Some(Geometry::Resize { width, height }));
    }
    if let Some(size) = crop {
        let (width, height) = parse_size(size)?;
        return Ok(Some(Geometry::Crop { width, height }));
    }
    Ok(None)
}

/// Combine config values with command-line flags. Flags win.
fn build_job(
    config: &FramefitConfig,
    args: &TransformArgs,
) -> Result<(AdapterOptions, Job), PipelineError> {
    let options = AdapterOptions {
        quality: Quality::new(args.quality.unwrap_or(config.quality)),
    };
    let job = Job {
        autorotate: config.autorotate && !args.no_autorotate,
        rotate: args.rotate,
        geometry: geometry_from(args.resize.as_deref(), args.crop.as_deref())?,
        format: args.format,
    };
    Ok((options, job))
}
