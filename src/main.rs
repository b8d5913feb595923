use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mt_detect_lib::api::{load_config, recall_file, segment_book, Detector};
use mt_detect_lib::models::{Label, Method};
use mt_detect_lib::services::config_store::AppConfig;
use mt_detect_lib::services::detection::{CancelToken, EvaluationLevel};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "mtdetect", version, about = "Detect machine-translated book chapters")]
struct Cli {
    /// Directory holding config.json (defaults to the user config dir)
    #[arg(long, global = true, env = "MTDETECT_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Split a book into chapter files
    Segment {
        book: PathBuf,
        /// Output root; chapters land in <out>/<book stem>-chapters/
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Classify one document and print `label,confidence`
    Classify {
        file: PathBuf,
        #[arg(long, value_enum)]
        method: Method,
        /// Classifier file overriding the configured one
        #[arg(long)]
        model: Option<PathBuf>,
        /// Print the full verdict as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export labelled feature rows for every chapter under <root>/<book>/
    Features {
        root: PathBuf,
        #[arg(long, value_enum)]
        method: Method,
        #[arg(long)]
        label: Label,
        #[arg(long)]
        out: PathBuf,
    },
    /// Append predicted labels for every chapter under <root>/<book>/
    Evaluate {
        root: PathBuf,
        #[arg(long, value_enum)]
        method: Method,
        #[arg(long, value_enum, default_value = "chapter")]
        level: EvaluationLevel,
        #[arg(long)]
        model: Option<PathBuf>,
        #[arg(long)]
        out: PathBuf,
    },
    /// Share of machine-translated labels in a results file
    Recall { file: PathBuf },
    /// Print the effective configuration
    Config {
        /// Write the default configuration to disk
        #[arg(long)]
        init: bool,
    },
}

fn main() -> Result<()> {
    mt_detect_lib::init_logging();
    let cli = Cli::parse();
    let (store, config) = load_config(cli.config_dir.as_deref()).context("loading configuration")?;
    let cancel = CancelToken::new();

    match cli.command {
        Command::Segment { book, out } => {
            let (dir, count) = segment_book(&book, &out)
                .with_context(|| format!("segmenting {}", book.display()))?;
            println!("{} chapters written to {}", count, dir.display());
        }
        Command::Classify {
            file,
            method,
            model,
            json,
        } => {
            let detector = Detector::new(config);
            let verdict = detector
                .classify_file(
                    &file,
                    method,
                    model.as_deref(),
                    &mut |_, pct| println!("data: {}", pct),
                    &cancel,
                )
                .with_context(|| format!("classifying {}", file.display()))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&verdict)?);
            } else {
                println!("{}", verdict.report_line());
            }
        }
        Command::Features {
            root,
            method,
            label,
            out,
        } => {
            let summary = Detector::new(config)
                .export_dataset(&root, method, label, &out, &cancel)
                .with_context(|| format!("exporting {} features", method))?;
            println!(
                "{} chapters, {} rows written, {} dropped",
                summary.chapters, summary.rows, summary.dropped
            );
        }
        Command::Evaluate {
            root,
            method,
            level,
            model,
            out,
        } => {
            let summary = Detector::new(config)
                .evaluate_dataset(&root, method, model.as_deref(), level, &out, &cancel)
                .with_context(|| format!("evaluating {}", root.display()))?;
            println!(
                "{} chapters, {} labels written, {} undetermined",
                summary.chapters, summary.lines, summary.undetermined
            );
        }
        Command::Recall { file } => {
            let summary = recall_file(&file)?;
            match summary.ratio() {
                Some(ratio) => println!(
                    "{} / {} machine-translated ({:.4})",
                    summary.machine_translated, summary.total, ratio
                ),
                None => println!("insufficient data"),
            }
        }
        Command::Config { init } => {
            if init {
                store.save(&AppConfig::default()).context("writing default config")?;
                info!("Default config written to {}", store.config_file().display());
                println!("{}", serde_json::to_string_pretty(&AppConfig::default())?);
            } else {
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}
