//! InspektLine: annotation store and YOLO dataset pipeline for industrial
//! inspection.
//!
//! Captured part images are registered in a SQLite project store, annotated
//! with bounding boxes through a canvas gesture protocol, and exported as a
//! YOLO dataset for an external training loop.
//!
//! # Modules
//!
//! - [`geometry`]: pixel/normalized transforms and the label-line format
//! - [`store`]: the persistent project store
//! - [`canvas`]: gesture state machine for drawing and deleting boxes
//! - [`sync`]: registers new image files from the dataset folder
//! - [`export`]: YOLO export with class remapping and `data.yaml`
//! - [`import`]: loads existing YOLO label files
//! - [`error`]: error types

pub mod canvas;
pub mod config;
pub mod error;
pub mod export;
pub mod geometry;
pub mod import;
pub mod store;
pub mod sync;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

pub use error::InspektError;

use config::{StoreConfig, SyncOptions};
use error::EntityKind;
use export::{ExportOptions, SplitOptions};
use import::ImportOptions;
use store::{LabelId, ModelType, NewModel, ProjectId, Store};
use sync::DatasetSynchronizer;

/// The inspektline CLI application.
#[derive(Parser)]
#[command(name = "inspektline")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    /// SQLite database file.
    #[arg(long, global = true, env = "INSPEKTLINE_DB", default_value = config::DEFAULT_DB_PATH)]
    db: PathBuf,

    /// Seconds to wait on a locked database before giving up.
    #[arg(long, global = true, env = "INSPEKTLINE_BUSY_TIMEOUT", default_value_t = 30)]
    busy_timeout: u64,

    /// Project id; defaults to the store's default project.
    #[arg(long, global = true, env = "INSPEKTLINE_PROJECT")]
    project: Option<i64>,

    /// More log output (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Create the database with its default project and labels.
    Init,
    /// Register new images found in the dataset folder.
    Sync(SyncArgs),
    /// Show project statistics.
    Stats(StatsArgs),
    /// Export the project as a YOLO dataset.
    Export(ExportArgs),
    /// Load YOLO label files for registered images.
    Import(ImportArgs),
    /// Manage class labels.
    Labels {
        #[command(subcommand)]
        command: LabelsCommand,
    },
    /// Manage trained-model records.
    Models {
        #[command(subcommand)]
        command: ModelsCommand,
    },
    /// List registered images whose file no longer exists.
    Missing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(clap::Args)]
struct SyncArgs {
    /// Folder to scan.
    #[arg(default_value = config::DEFAULT_DATASET_DIR)]
    folder: PathBuf,

    /// Image extensions to pick up (comma-separated).
    #[arg(long, value_delimiter = ',')]
    ext: Vec<String>,

    /// Only scan the top level of the folder.
    #[arg(long)]
    no_recursive: bool,
}

#[derive(clap::Args)]
struct StatsArgs {
    #[arg(long, value_enum, default_value = "text")]
    output: OutputFormat,
}

#[derive(clap::Args)]
struct ExportArgs {
    /// Output directory.
    dir: PathBuf,

    /// Also write data.yaml (needs --split and --copy-images).
    #[arg(long)]
    manifest: bool,

    /// Use the train/val/test layout.
    #[arg(long)]
    split: bool,

    /// Fraction of annotated images for training (with --split).
    #[arg(long, default_value_t = 0.8)]
    train: f64,

    /// Fraction of annotated images for validation (with --split).
    #[arg(long, default_value_t = 0.1)]
    val: f64,

    /// Seed for a reproducible split.
    #[arg(long)]
    seed: Option<u64>,

    /// Copy images into images/{split}/ (with --split).
    #[arg(long)]
    copy_images: bool,

    #[arg(long, value_enum, default_value = "text")]
    output: OutputFormat,
}

#[derive(clap::Args)]
struct ImportArgs {
    /// Directory with {stem}.txt label files; defaults to next to each image.
    #[arg(long)]
    labels_dir: Option<PathBuf>,

    /// Replace existing annotations of images that have a label file.
    #[arg(long)]
    replace: bool,

    #[arg(long, value_enum, default_value = "text")]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum LabelsCommand {
    /// List labels in class-index order.
    List,
    /// Add a label.
    Add {
        name: String,
        #[arg(long, default_value = "#ffaa00")]
        color: String,
    },
    /// Delete a label and every annotation using it.
    Delete { id: i64 },
}

#[derive(Subcommand)]
enum ModelsCommand {
    /// List models, newest first.
    List,
    /// Record a trained model.
    Add {
        name: String,
        path: PathBuf,
        /// detection, classification or segmentation.
        #[arg(long = "type", default_value = "detection")]
        model_type: ModelType,
        /// Metrics as a JSON object.
        #[arg(long, default_value = "{}")]
        metrics: String,
    },
}

/// Run the inspektline CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), InspektError> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let Some(command) = cli.command else {
        println!("inspektline {}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Annotation store and YOLO dataset pipeline for industrial inspection.");
        println!();
        println!("Run 'inspektline --help' for usage information.");
        return Ok(());
    };

    let config = StoreConfig::new(&cli.db).with_busy_timeout(Duration::from_secs(cli.busy_timeout));
    let store = Store::open(&config)?;
    let project = resolve_project(&store, cli.project)?;

    match command {
        Commands::Init => run_init(&store, project),
        Commands::Sync(args) => run_sync(&store, project, args),
        Commands::Stats(args) => {
            let stats = store.get_project_stats(project)?;
            emit(&stats, args.output)
        }
        Commands::Export(args) => run_export(&store, project, args),
        Commands::Import(args) => {
            let opts = ImportOptions {
                labels_dir: args.labels_dir,
                replace: args.replace,
            };
            let report = import::import_yolo_labels(&store, project, &opts)?;
            emit(&report, args.output)
        }
        Commands::Labels { command } => run_labels(&store, project, command),
        Commands::Models { command } => run_models(&store, project, command),
        Commands::Missing => run_missing(&store, project),
    }
}

fn init_tracing(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    // A subscriber may already be installed when run() is called twice in-process.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn resolve_project(store: &Store, requested: Option<i64>) -> Result<ProjectId, InspektError> {
    match requested {
        Some(raw) => {
            let id = ProjectId::new(raw);
            match store.get_project(id)? {
                Some(_) => Ok(id),
                None => Err(InspektError::unknown(EntityKind::Project, id)),
            }
        }
        None => store.default_project_id(),
    }
}

fn emit<T: Serialize + std::fmt::Display>(
    report: &T,
    format: OutputFormat,
) -> Result<(), InspektError> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Text => print!("{report}"),
    }
    Ok(())
}

fn run_init(store: &Store, project: ProjectId) -> Result<(), InspektError> {
    let record = store
        .get_project(project)?
        .ok_or_else(|| InspektError::unknown(EntityKind::Project, project))?;
    if let Some(path) = store.path() {
        println!("Database: {}", path.display());
    }
    println!("Project {}: {}", record.id, record.name);
    for label in store.get_labels(project)? {
        println!("  {} {}", label.name, label.color);
    }
    Ok(())
}

fn run_sync(store: &Store, project: ProjectId, args: SyncArgs) -> Result<(), InspektError> {
    let mut options = SyncOptions::default();
    if !args.ext.is_empty() {
        options.extensions = args.ext;
    }
    options.recursive = !args.no_recursive;

    let inserted = DatasetSynchronizer::new(store, options).scan(&args.folder, project)?;
    for path in &inserted {
        println!("{}", path.display());
    }
    println!("{} new image(s) registered", inserted.len());
    Ok(())
}

fn run_export(store: &Store, project: ProjectId, args: ExportArgs) -> Result<(), InspektError> {
    let opts = ExportOptions {
        manifest: args.manifest,
        split: args.split.then(|| SplitOptions {
            train: args.train,
            val: args.val,
            seed: args.seed,
            copy_images: args.copy_images,
        }),
    };
    let report = export::export_yolo(store, &args.dir, project, &opts)?;
    emit(&report, args.output)
}

fn run_labels(
    store: &Store,
    project: ProjectId,
    command: LabelsCommand,
) -> Result<(), InspektError> {
    match command {
        LabelsCommand::List => {
            for (index, label) in store.get_labels(project)?.iter().enumerate() {
                println!("{index}\t{}\t{}\t(id {})", label.name, label.color, label.id);
            }
        }
        LabelsCommand::Add { name, color } => {
            let id = store.add_label(project, &name, &color)?;
            println!("Added label '{name}' (id {id})");
        }
        LabelsCommand::Delete { id } => {
            let removed = store.delete_label(LabelId::new(id))?;
            println!("Deleted label {id} and {removed} annotation(s)");
        }
    }
    Ok(())
}

fn run_models(
    store: &Store,
    project: ProjectId,
    command: ModelsCommand,
) -> Result<(), InspektError> {
    match command {
        ModelsCommand::List => {
            for model in store.get_models(project)? {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    model.id,
                    model.name,
                    model.model_type,
                    model.path.display(),
                    model.metrics
                );
            }
        }
        ModelsCommand::Add {
            name,
            path,
            model_type,
            metrics,
        } => {
            let model = NewModel {
                name,
                path,
                model_type,
                metrics: serde_json::from_str(&metrics)?,
            };
            let id = store.add_model(project, &model)?;
            println!("Recorded model '{}' (id {id})", model.name);
        }
    }
    Ok(())
}

fn run_missing(store: &Store, project: ProjectId) -> Result<(), InspektError> {
    let missing = DatasetSynchronizer::new(store, SyncOptions::default()).missing_files(project)?;
    for image in &missing {
        println!("{}\t{}", image.id, image.path.display());
    }
    println!("{} missing file(s)", missing.len());
    Ok(())
}
