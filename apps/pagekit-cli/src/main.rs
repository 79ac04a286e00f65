//! pagekit command-line tool
//!
//! Merge, split, extract, remove and reorder PDF pages, and compress
//! images or PDFs down to a target size.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use pagekit_core::TransformSpec;
use tracing::{debug, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;

use commands::{load_source, CompressKind};
use config::Config;

/// Command-line arguments for pagekit
#[derive(Parser, Debug)]
#[command(name = "pagekit")]
#[command(version, about = "PDF page transformations and size-targeted compression")]
struct Cli {
    /// Configuration file (defaults to ./pagekit.toml when present)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show page count and version of a PDF
    Info {
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Concatenate PDFs in the given order
    Merge {
        #[arg(value_name = "FILE", num_args = 2.., required = true)]
        inputs: Vec<PathBuf>,

        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Write one PDF per page range
    Split {
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Page range for one output (e.g., "1-3", "4,6"); repeat for more outputs
        #[arg(short, long = "range", value_name = "RANGE", required = true)]
        ranges: Vec<String>,

        /// Output directory
        #[arg(short, long, value_name = "DIR")]
        output: PathBuf,

        /// File name stem for the parts
        #[arg(long)]
        stem: Option<String>,
    },

    /// Keep only the listed pages
    Extract {
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Pages to keep (e.g., "1,3-5,8")
        #[arg(short, long, value_name = "RANGE")]
        pages: String,

        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Delete the listed pages
    Remove {
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Pages to delete (e.g., "2,7-9")
        #[arg(short, long, value_name = "RANGE")]
        pages: String,

        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Rearrange pages; every page must appear exactly once
    Reorder {
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// New page order (e.g., "3,1,2")
        #[arg(long, value_name = "RANGE")]
        order: String,

        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Re-encode an image as JPEG within a byte budget
    CompressImage(CompressArgs),

    /// Re-encode the JPEG images inside a PDF within a byte budget
    CompressPdf(CompressArgs),
}

#[derive(Args, Debug)]
struct CompressArgs {
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Maximum output size in bytes
    #[arg(short, long)]
    target_bytes: usize,

    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// Write the floor-quality result even when it exceeds the target
    #[arg(long)]
    accept_larger: bool,

    /// First quality tried (overrides config)
    #[arg(long)]
    quality_start: Option<u8>,

    /// Lowest quality tried (overrides config)
    #[arg(long)]
    quality_floor: Option<u8>,

    /// Quality decrement per attempt (overrides config)
    #[arg(long)]
    quality_step: Option<u8>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for command output
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load(cli.config.as_deref())?;
    debug!("configuration: {:?}", config);

    let message = run(cli.command, &config)?;
    println!("{}", message);
    Ok(())
}

fn run(command: Command, config: &Config) -> anyhow::Result<String> {
    match command {
        Command::Info { input, json } => commands::info(&input, json),
        Command::Merge { inputs, output } => {
            let documents = inputs
                .iter()
                .map(|path| load_source(path))
                .collect::<anyhow::Result<Vec<_>>>()?;
            commands::transform_to_file(TransformSpec::Merge { documents }, &output)
        }
        Command::Split {
            input,
            ranges,
            output,
            stem,
        } => {
            let stem = stem.or_else(|| config.split.stem.clone());
            let written = commands::split_to_dir(&input, ranges, &output, stem)?;
            Ok(format!(
                "Wrote {} files to {}",
                written.len(),
                output.display()
            ))
        }
        Command::Extract {
            input,
            pages,
            output,
        } => commands::transform_to_file(
            TransformSpec::Extract {
                document: load_source(&input)?,
                keep: pages,
            },
            &output,
        ),
        Command::Remove {
            input,
            pages,
            output,
        } => commands::transform_to_file(
            TransformSpec::Remove {
                document: load_source(&input)?,
                drop: pages,
            },
            &output,
        ),
        Command::Reorder {
            input,
            order,
            output,
        } => commands::transform_to_file(
            TransformSpec::Reorder {
                document: load_source(&input)?,
                order,
            },
            &output,
        ),
        Command::CompressImage(args) => compress(CompressKind::Image, args, config),
        Command::CompressPdf(args) => compress(CompressKind::Pdf, args, config),
    }
}

fn compress(kind: CompressKind, args: CompressArgs, config: &Config) -> anyhow::Result<String> {
    let search = config
        .quality_with(args.quality_start, args.quality_floor, args.quality_step)
        .context("Invalid quality settings")?;
    commands::compress_to_file(
        kind,
        &args.input,
        &args.output,
        args.target_bytes,
        &search,
        args.accept_larger,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_split_with_repeated_ranges() {
        let cli = Cli::try_parse_from([
            "pagekit", "split", "in.pdf", "-r", "1-2", "-r", "3-4", "-o", "parts",
        ])
        .unwrap();
        match cli.command {
            Command::Split { ranges, .. } => assert_eq!(ranges, vec!["1-2", "3-4"]),
            other => panic!("expected split, got {:?}", other),
        }
    }

    #[test]
    fn test_merge_requires_two_inputs() {
        assert!(Cli::try_parse_from(["pagekit", "merge", "a.pdf", "-o", "out.pdf"]).is_err());
        assert!(
            Cli::try_parse_from(["pagekit", "merge", "a.pdf", "b.pdf", "-o", "out.pdf"]).is_ok()
        );
    }

    #[test]
    fn test_parses_compress_overrides() {
        let cli = Cli::try_parse_from([
            "pagekit",
            "compress-image",
            "photo.png",
            "-t",
            "50000",
            "-o",
            "photo.jpg",
            "--quality-floor",
            "30",
        ])
        .unwrap();
        match cli.command {
            Command::CompressImage(args) => {
                assert_eq!(args.target_bytes, 50_000);
                assert_eq!(args.quality_floor, Some(30));
                assert!(!args.accept_larger);
            }
            other => panic!("expected compress-image, got {:?}", other),
        }
    }
}
