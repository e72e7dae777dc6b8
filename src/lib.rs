//! Boardlabel: annotation pipeline for PCB control-frame datasets.
//!
//! Converts Pascal VOC annotations into a YOLO dataset, validates and
//! repairs bounding boxes on the way, assigns samples to splits, audits the
//! result, and applies the normal/abnormal board rule to detector output.
//!
//! # Modules
//!
//! - [`ir`]: box and record types, VOC XML and YOLO label IO
//! - [`validation`]: the box validator and audit issue reports
//! - [`normalize`]: pixel corners to normalized center form
//! - [`split`]: split assignment (lists or seeded ratios) and re-splitting
//! - [`convert`]: the VOC to YOLO pipeline and its run summary
//! - [`check`]: read-only audits of converted and source datasets
//! - [`repair`]: VOC bounding box repair
//! - [`board`]: normal/abnormal board status
//! - [`config`]: pipeline configuration and the class table
//! - [`error`]: error types

pub mod board;
pub mod check;
pub mod config;
pub mod convert;
pub mod error;
pub mod ir;
pub mod normalize;
pub mod repair;
pub mod split;
pub mod validation;

use std::fmt::Display;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

pub use error::BoardlabelError;

use config::PipelineConfig;
use split::{Split, SplitRatios};
use validation::{BoxRules, OutOfFramePolicy};

/// The boardlabel CLI application.
#[derive(Parser)]
#[command(name = "boardlabel")]
#[command(version, author, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Pipeline configuration file (YAML). Defaults are used when omitted.
    #[arg(long, global = true, env = "BOARDLABEL_CONFIG")]
    config: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Report format on stdout.
    #[arg(long, global = true, value_enum, default_value_t = ReportFormat::Text)]
    output: ReportFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl Cli {
    /// Log level selected by `-v`/`-q`. Warnings are shown by default.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            return tracing::Level::ERROR;
        }
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Convert a Pascal VOC dataset into YOLO splits.
    Convert(ConvertArgs),
    /// Re-split a flat YOLO dataset (images/ + labels/) by ratio.
    Split(SplitArgs),
    /// Audit a converted YOLO dataset; exits non-zero when it fails.
    Check(CheckArgs),
    /// Audit a Pascal VOC dataset; exits non-zero when it fails.
    CheckVoc(CheckVocArgs),
    /// Repair VOC bounding boxes (swap inverted corners, drop invalid boxes).
    FixBbox(FixBboxArgs),
    /// Mark boards normal or abnormal from detector output.
    Classify(ClassifyArgs),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SplitSource {
    /// ImageSets/Main/<split>.txt membership lists.
    Lists,
    /// Seeded random assignment by ratio.
    Ratio,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SplitName {
    Train,
    Val,
    Test,
}

impl From<SplitName> for Split {
    fn from(name: SplitName) -> Self {
        match name {
            SplitName::Train => Split::Train,
            SplitName::Val => Split::Val,
            SplitName::Test => Split::Test,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutOfFrame {
    /// Keep the box and log a warning; normalization clamps it.
    Warn,
    /// Drop the box.
    Drop,
}

impl From<OutOfFrame> for OutOfFramePolicy {
    fn from(value: OutOfFrame) -> Self {
        match value {
            OutOfFrame::Warn => OutOfFramePolicy::Warn,
            OutOfFrame::Drop => OutOfFramePolicy::Drop,
        }
    }
}

/// Ratio and seed flags shared by `convert` and `split`. Unset values come
/// from the config file.
#[derive(clap::Args)]
struct RatioArgs {
    /// Train share.
    #[arg(long)]
    train: Option<f64>,

    /// Validation share.
    #[arg(long)]
    val: Option<f64>,

    /// Test share; 0 leaves out the test split.
    #[arg(long)]
    test: Option<f64>,

    /// Random seed for the assignment.
    #[arg(long)]
    seed: Option<u64>,
}

impl RatioArgs {
    fn resolve(&self, config: &PipelineConfig) -> Result<(SplitRatios, u64), BoardlabelError> {
        let ratios = SplitRatios::new(
            self.train.unwrap_or(config.split.train),
            self.val.unwrap_or(config.split.val),
            self.test.unwrap_or(config.split.test),
        )?;
        Ok((ratios, self.seed.unwrap_or(config.split.seed)))
    }
}

#[derive(clap::Args)]
struct ConvertArgs {
    /// VOC root containing Annotations/, JPEGImages/ and ImageSets/Main/.
    source: PathBuf,

    /// Output root; receives <split>/images, <split>/labels and data.yaml.
    output_dir: PathBuf,

    /// How samples are assigned to splits.
    #[arg(long, value_enum, default_value_t = SplitSource::Lists)]
    split_source: SplitSource,

    /// Split lists to read with --split-source lists.
    #[arg(long, value_enum, value_delimiter = ',', default_values_t = [SplitName::Train, SplitName::Val])]
    splits: Vec<SplitName>,

    /// Directory holding the split lists (default: <source>/ImageSets/Main).
    #[arg(long)]
    image_sets: Option<PathBuf>,

    /// Image directory (default: <source>/JPEGImages).
    #[arg(long)]
    images: Option<PathBuf>,

    #[command(flatten)]
    ratios: RatioArgs,

    /// Policy for boxes that extend beyond the image.
    #[arg(long, value_enum, default_value_t = OutOfFrame::Warn)]
    out_of_frame: OutOfFrame,
}

#[derive(clap::Args)]
struct SplitArgs {
    /// Flat YOLO dataset with images/ and labels/.
    input: PathBuf,

    /// Output root; receives <split>/images and <split>/labels.
    output_dir: PathBuf,

    #[command(flatten)]
    ratios: RatioArgs,
}

#[derive(clap::Args)]
struct CheckArgs {
    /// Dataset root (images/ + labels/, or one such pair per split).
    dataset: PathBuf,
}

#[derive(clap::Args)]
struct CheckVocArgs {
    /// VOC root containing Annotations/ and JPEGImages/.
    source: PathBuf,

    /// Annotation directory (default: <source>/Annotations).
    #[arg(long)]
    annotations: Option<PathBuf>,

    /// Image directory (default: <source>/JPEGImages).
    #[arg(long)]
    images: Option<PathBuf>,
}

#[derive(clap::Args)]
struct FixBboxArgs {
    /// A VOC XML file or a directory of them.
    input: PathBuf,

    /// Write fixed files here instead of overwriting the originals.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Policy for boxes that extend beyond the image.
    #[arg(long, value_enum, default_value_t = OutOfFrame::Drop)]
    out_of_frame: OutOfFrame,
}

#[derive(clap::Args)]
struct ClassifyArgs {
    /// JSON array of {image, detections} records exported by the detector.
    detections: PathBuf,
}

/// Run the boardlabel CLI.
///
/// Called from `main.rs` after logging is set up.
pub fn run(cli: Cli) -> Result<(), BoardlabelError> {
    let config = PipelineConfig::load_or_default(cli.config.as_deref())?;
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Some(Commands::Convert(args)) => run_convert(args, &config, cli.output),
        Some(Commands::Split(args)) => run_split(args, &config, cli.output),
        Some(Commands::Check(args)) => run_check(args, &config, cli.output),
        Some(Commands::CheckVoc(args)) => run_check_voc(args, &config, cli.output),
        Some(Commands::FixBbox(args)) => run_fix_bbox(args, &config, cli.output),
        Some(Commands::Classify(args)) => run_classify(args, &config, cli.output),
        None => {
            println!("boardlabel {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Annotation pipeline for PCB control-frame datasets.");
            println!();
            println!("Run 'boardlabel --help' for usage information.");
            Ok(())
        }
    }
}

fn emit<T: Display + Serialize>(report: &T, format: ReportFormat) -> Result<(), BoardlabelError> {
    match format {
        ReportFormat::Text => print!("{report}"),
        ReportFormat::Json => {
            let json =
                serde_json::to_string_pretty(report).map_err(BoardlabelError::ReportSerialize)?;
            println!("{json}");
        }
    }
    Ok(())
}

fn run_convert(
    args: ConvertArgs,
    config: &PipelineConfig,
    format: ReportFormat,
) -> Result<(), BoardlabelError> {
    let classes = config.class_table()?;

    let mut layout = convert::VocLayout::discover(&args.source)?;
    if let Some(images) = args.images {
        layout.images = images;
    }
    if let Some(image_sets) = args.image_sets {
        layout.image_sets = image_sets;
    }

    let split_policy = match args.split_source {
        SplitSource::Lists => {
            let mut splits: Vec<Split> = args.splits.into_iter().map(Split::from).collect();
            splits.sort();
            splits.dedup();
            convert::SplitPolicy::Lists { splits }
        }
        SplitSource::Ratio => {
            let (ratios, seed) = args.ratios.resolve(config)?;
            convert::SplitPolicy::Ratio { ratios, seed }
        }
    };

    let options = convert::ConvertOptions {
        layout,
        output: args.output_dir,
        split_policy,
        rules: BoxRules {
            min_area: config.min_box_area,
            out_of_frame: args.out_of_frame.into(),
        },
        image_extensions: config.image_extensions.clone(),
    };

    let report = convert::convert_voc_to_yolo(&options, &classes)?;
    emit(&report, format)
}

fn run_split(
    args: SplitArgs,
    config: &PipelineConfig,
    format: ReportFormat,
) -> Result<(), BoardlabelError> {
    let (ratios, seed) = args.ratios.resolve(config)?;
    let options = split::ResplitOptions {
        ratios,
        seed,
        image_extensions: config.image_extensions.clone(),
    };

    let report = split::resplit_yolo_dir(&args.input, &args.output_dir, &options)?;
    emit(&report, format)
}

fn run_check(
    args: CheckArgs,
    config: &PipelineConfig,
    format: ReportFormat,
) -> Result<(), BoardlabelError> {
    let classes = config.class_table()?;
    let report = check::check_yolo_dataset(&args.dataset, &classes, &config.image_extensions)?;
    emit(&report, format)?;

    if report.passed {
        Ok(())
    } else {
        Err(BoardlabelError::CheckFailed {
            dangling: report.dangling_count(),
            error_files: report.error_file_count(),
            report: Box::new(report),
        })
    }
}

fn run_check_voc(
    args: CheckVocArgs,
    config: &PipelineConfig,
    format: ReportFormat,
) -> Result<(), BoardlabelError> {
    let classes = config.class_table()?;
    let options = check::voc::VocCheckOptions {
        annotations_dir: args
            .annotations
            .unwrap_or_else(|| args.source.join(convert::VOC_ANNOTATIONS_DIR)),
        images_dir: args
            .images
            .unwrap_or_else(|| args.source.join(convert::VOC_IMAGES_DIR)),
        image_extensions: config.image_extensions.clone(),
        min_box_area: config.min_box_area,
    };

    let report = check::voc::check_voc_dataset(&options, &classes)?;
    emit(&report, format)?;

    if report.passed {
        Ok(())
    } else {
        Err(BoardlabelError::VocCheckFailed {
            problems: report.problem_count(),
        })
    }
}

fn run_fix_bbox(
    args: FixBboxArgs,
    config: &PipelineConfig,
    format: ReportFormat,
) -> Result<(), BoardlabelError> {
    let options = repair::RepairOptions {
        input: args.input,
        output_dir: args.output_dir,
        rules: BoxRules {
            min_area: config.min_box_area,
            out_of_frame: args.out_of_frame.into(),
        },
    };

    let report = repair::repair_voc(&options)?;
    emit(&report, format)
}

fn run_classify(
    args: ClassifyArgs,
    config: &PipelineConfig,
    format: ReportFormat,
) -> Result<(), BoardlabelError> {
    let classes = config.class_table()?;
    let rule = board::BoardRule::from_config(&config.board_rule, &classes)?;
    let report = board::classify_file(&args.detections, &rule, &classes)?;
    emit(&report, format)
}
