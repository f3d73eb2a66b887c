use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use layir::Library;
use shuttle::aggregate::Aggregator;
use shuttle::config::ShuttleConfig;
use shuttle::export::{Exporter, JsonExporter};
use shuttle::extract::{Extraction, Extractor};
use shuttle::labels::{find_measurement_labels, match_files};
use shuttle::layer::LayerSpec;
use shuttle::pdk::{CellRegistry, ReferencePdk};
use shuttle::placement::place;
use shuttle::source::{DirectorySource, LayoutReader};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Aggregate photonic designs onto a shared canvas and pull measured circuits back out.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// A TOML run configuration. Defaults are used if omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Also write the log to this file.
    #[arg(long, global = true)]
    log: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Merge every design in the input directories into one layout.
    Aggregate {
        /// Directories holding design files, in placement order.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Where the merged layout is written.
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
    /// Show where `count` full-size designs would be placed.
    Place {
        #[arg(short = 'n', long)]
        count: usize,
    },
    /// Extract the circuits behind measurement labels into separate layouts.
    Extract {
        /// The merged layout.
        layout: PathBuf,
        /// Labels to extract. Every measurement label is extracted if none are given.
        labels: Vec<String>,
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
    /// List the measurement labels in a layout.
    Labels {
        layout: PathBuf,
    },
    /// Match the measurement labels in a layout to measurement data files.
    Match {
        layout: PathBuf,
        /// The measurement data directory.
        data: PathBuf,
    },
}

fn init_logging(log: Option<&Path>) -> anyhow::Result<()> {
    let file = match log {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {path:?}."))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file)
        .init();
    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ShuttleConfig> {
    let cfg = match path {
        Some(path) => {
            let cfg = ShuttleConfig::from_file(path)
                .with_context(|| format!("Failed to load configuration from {path:?}."))?;
            tracing::info!(?path, "loaded configuration");
            cfg
        }
        None => ShuttleConfig::default(),
    };
    cfg.validate().with_context(|| "Invalid configuration.")?;
    Ok(cfg)
}

fn read_layout(path: &Path) -> anyhow::Result<Library<LayerSpec>> {
    let doc = LayoutReader
        .read(path)
        .with_context(|| format!("Failed to read layout {path:?}."))?;
    Ok(doc.library)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log.as_deref())?;
    let cfg = load_config(args.config.as_deref())?;

    match args.command {
        Command::Aggregate { inputs, out } => {
            let source = DirectorySource::with_dirs(inputs);
            let merged = Aggregator::new(cfg, CellRegistry::bound(ReferencePdk))
                .run(&source)
                .with_context(|| "Aggregation failed.")?;
            for issue in merged.issues.iter() {
                eprintln!("{issue}");
            }
            let path = JsonExporter::new(&out)
                .export(&merged.library, merged.top)
                .with_context(|| format!("Failed to export merged layout to {out:?}."))?;
            println!(
                "{} designs merged into {:?} ({} warnings)",
                merged.designs.len(),
                path,
                merged.issues.num_warnings()
            );
        }
        Command::Place { count } => {
            let sizes = vec![Some(cfg.canvas.slot); count];
            let slots = place(&sizes, &cfg.canvas).with_context(|| "Placement failed.")?;
            for slot in slots {
                println!(
                    "{}\tcolumn {}\t{}",
                    slot.ordinal,
                    slot.column,
                    slot.origin()
                );
            }
        }
        Command::Extract {
            layout,
            labels,
            out,
        } => {
            let lib = read_layout(&layout)?;
            let labels: Vec<String> = if labels.is_empty() {
                find_measurement_labels(&lib, &cfg.layers.text)
                    .with_context(|| "Failed to locate measurement labels.")?
                    .into_iter()
                    .map(|label| label.text.to_string())
                    .collect()
            } else {
                labels
            };
            let exporter = JsonExporter::new(&out);
            let mut failed = 0;
            let results = Extractor::new(&lib, cfg.layers.text).extract_all(&labels);
            for (label, result) in labels.iter().zip(results) {
                match result {
                    Ok(standalone) => match standalone.extraction {
                        Extraction::NotFound => println!("{label}: not found"),
                        Extraction::NoNetlist { top, reason } => {
                            println!("{label}: no netlist ({reason})");
                            exporter.export(&standalone.library, top)?;
                        }
                        Extraction::Circuit(circuit) => {
                            let path = exporter.export(&standalone.library, circuit.top)?;
                            println!(
                                "{label}: {} components -> {:?}",
                                circuit.components.len(),
                                path
                            );
                        }
                    },
                    Err(e) => {
                        failed += 1;
                        eprintln!("{label}: {e}");
                    }
                }
            }
            if failed > 0 {
                bail!("{failed} of {} extractions failed", labels.len());
            }
        }
        Command::Labels { layout } => {
            let lib = read_layout(&layout)?;
            for label in find_measurement_labels(&lib, &cfg.layers.text)? {
                match label.position {
                    Some(p) => println!("{}\t{}", label.text, p),
                    None => println!("{}", label.text),
                }
            }
        }
        Command::Match { layout, data } => {
            let lib = read_layout(&layout)?;
            let labels = find_measurement_labels(&lib, &cfg.layers.text)?;
            let matches = match_files(&data, &labels)
                .with_context(|| format!("Failed to search {data:?} for measurement data."))?;
            for (key, found) in &matches {
                println!("{key} ({}):", found.label.text);
                for file in &found.files {
                    println!("\t{}", file.display());
                }
            }
            println!("{} of {} labels have data", matches.len(), labels.len());
        }
    }

    Ok(())
}
