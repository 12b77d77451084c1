// notice-release CLI - Convert eForms notices to release JSON
//
// notice-release [OPTIONS] <INPUT>...
//   INPUT may be a file or a directory (its *.xml files, sorted by name)

use anyhow::{Context, Result};
use clap::Parser;
use notice_release::{convert_with_config, ConverterConfig};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "notice-release",
    about = "Convert eForms procurement notices into release JSON",
    version
)]
struct Cli {
    /// Notice files or directories of notices
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Write one <stem>.json per input here instead of stdout
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, env = "NOTICE_RELEASE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing (stderr, so stdout stays pure JSON)
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => ConverterConfig::load(path)?,
        None => ConverterConfig::from_env()?,
    };
    let inputs = expand_inputs(&cli.inputs)?;

    let mut converted = 0usize;
    let mut failed = 0usize;
    for input in &inputs {
        match convert_file(input, &config, cli.output_dir.as_deref()) {
            Ok(Some(written)) => {
                converted += 1;
                eprintln!("✓ {} → {}", input.display(), written.display());
            }
            Ok(None) => converted += 1,
            Err(e) => {
                failed += 1;
                eprintln!("❌ {:#}", e);
            }
        }
    }

    eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    eprintln!("📊 Converted: {}  Failed: {}", converted, failed);

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Files as given; directories replaced by their `*.xml` files, sorted
fn expand_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = fs::read_dir(input)
                .with_context(|| format!("Failed to read directory: {}", input.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| {
                    path.is_file()
                        && path
                            .extension()
                            .and_then(|ext| ext.to_str())
                            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
                })
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}

/// Convert one file. Nothing is written unless the conversion succeeds.
fn convert_file(input: &Path, config: &ConverterConfig, output_dir: Option<&Path>) -> Result<Option<PathBuf>> {
    let bytes = fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let release = convert_with_config(&bytes, config)
        .with_context(|| format!("Failed to convert {}", input.display()))?;

    let json = if config.pretty {
        serde_json::to_string_pretty(&release)?
    } else {
        serde_json::to_string(&release)?
    };

    let Some(dir) = output_dir else {
        println!("{}", json);
        return Ok(None);
    };

    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let stem = input
        .file_stem()
        .with_context(|| format!("Input has no file name: {}", input.display()))?;
    let output = dir.join(format!("{}.json", stem.to_string_lossy()));
    fs::write(&output, json).with_context(|| format!("Failed to write {}", output.display()))?;
    Ok(Some(output))
}
