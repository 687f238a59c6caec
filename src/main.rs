use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use coswara_merge::config::AppConfig;

#[derive(Parser)]
#[command(
    name = "coswara-merge",
    version,
    about = "Merge Coswara clinical metadata with a scanned per-patient audio inventory"
)]
struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: load metadata, scan audio, merge, write the dataset
    Merge {
        /// Clinical metadata CSV (defaults to config / combined_data.csv)
        #[arg(long)]
        metadata: Option<PathBuf>,

        /// Root of the extracted audio tree (defaults to config / Extracted_data)
        #[arg(long)]
        audio_dir: Option<PathBuf>,

        /// Output CSV path (defaults to config / merged_coswara_dataset.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Build the merged table without writing the output file
        #[arg(long)]
        dry_run: bool,
    },

    /// Load the metadata CSV and print its summary
    Inspect {
        /// Clinical metadata CSV (defaults to config / combined_data.csv)
        #[arg(long)]
        metadata: Option<PathBuf>,
    },

    /// Scan the audio tree and print the inventory summary
    Scan {
        /// Root of the extracted audio tree (defaults to config / Extracted_data)
        #[arg(long)]
        audio_dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = AppConfig::load();

    match cli.command {
        Commands::Merge {
            metadata,
            audio_dir,
            output,
            dry_run,
        } => {
            let metadata_csv = metadata.unwrap_or_else(|| config.metadata_csv.clone());
            let audio_dir = audio_dir.unwrap_or_else(|| config.audio_dir.clone());
            let output = output.unwrap_or_else(|| config.output.clone());

            println!("=== Coswara Data Merger ===");
            println!("Metadata CSV: {}", metadata_csv.display());
            println!("Audio path: {}", audio_dir.display());
            if dry_run {
                println!("Output: (dry run, nothing written)");
            } else {
                println!("Output: {}", output.display());
            }
            println!();

            check_inputs(&metadata_csv, &audio_dir)?;

            let metadata = coswara_merge::metadata::load(&metadata_csv)
                .context("Failed to load metadata")?;
            let inventory =
                coswara_merge::inventory::scan(&audio_dir).context("Audio scan failed")?;

            let out = if dry_run { None } else { Some(output.as_path()) };
            let merged = coswara_merge::merge::create_dataset(&metadata, &inventory, out)
                .context("Merge failed")?;

            let positives = merged.positives();
            println!();
            println!("=== Process Complete ===");
            println!("Final dataset created with {} patients", merged.len());
            println!("COVID positive: {positives}");
            println!("COVID negative: {}", merged.len() - positives);
        }

        Commands::Inspect { metadata } => {
            let metadata_csv = metadata.unwrap_or_else(|| config.metadata_csv.clone());
            if !metadata_csv.exists() {
                bail!("Error: {} not found", metadata_csv.display());
            }
            coswara_merge::metadata::load(&metadata_csv).context("Failed to load metadata")?;
        }

        Commands::Scan { audio_dir } => {
            let audio_dir = audio_dir.unwrap_or_else(|| config.audio_dir.clone());
            if !audio_dir.is_dir() {
                bail!("Error: {} not found", audio_dir.display());
            }
            let inventory =
                coswara_merge::inventory::scan(&audio_dir).context("Audio scan failed")?;
            let complete = inventory.iter().filter(|r| r.has_all_audio()).count();
            println!(
                "Scan complete: {} records, {} with all {} recordings",
                inventory.len(),
                complete,
                coswara_merge::NUM_RECORDINGS
            );
        }
    }

    Ok(())
}

/// Both inputs must exist before any stage runs; no partial output is written.
fn check_inputs(metadata_csv: &Path, audio_dir: &Path) -> Result<()> {
    if !metadata_csv.exists() {
        bail!("Error: {} not found", metadata_csv.display());
    }
    if !audio_dir.is_dir() {
        bail!("Error: {} not found", audio_dir.display());
    }
    Ok(())
}
