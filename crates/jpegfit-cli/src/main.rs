//! jpegfit - convert images to JPEG, optionally under a byte budget.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use jpegfit_core::config::BudgetSetting;
use jpegfit_core::{
    convert_batch, parse_byte_size, BatchReport, ConverterConfig, DirectorySink, FooterAsset,
    InputItem, ItemOutcome, OverBudget,
};

#[derive(Debug, Parser)]
#[command(name = "jpegfit", version, about = "Convert images to JPEG, optionally under a size budget")]
struct Cli {
    /// Images to convert (png, bmp, tif/tiff, jpg/jpeg, webp)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory
    #[arg(short, long, default_value = "converted")]
    output: PathBuf,

    /// Keep every image under 2 MiB
    #[arg(long)]
    limit: bool,

    /// Byte budget such as 1500000, 500K or 1.5M (implies --limit)
    #[arg(long, value_parser = parse_budget)]
    budget: Option<u64>,

    /// Footer image appended beneath every output
    #[arg(long)]
    footer: Option<PathBuf>,

    /// TOML config file; command-line flags take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Keep the smallest encoding when the budget cannot be met
    #[arg(long)]
    best_effort: bool,

    /// Smallest scale factor tried before giving up
    #[arg(long)]
    scale_floor: Option<f64>,

    /// Convert one image at a time
    #[arg(long)]
    sequential: bool,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn parse_budget(text: &str) -> Result<u64, String> {
    parse_byte_size(text).map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let report = run(&cli)?;
    print_report(&report, &cli.output);
    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Flags layered over the config file (or defaults).
fn build_config(cli: &Cli) -> Result<ConverterConfig> {
    let mut config = match &cli.config {
        Some(path) => ConverterConfig::load(path)?,
        None => ConverterConfig::default(),
    };

    if cli.limit {
        config.limit_size = true;
    }
    if let Some(bytes) = cli.budget {
        config.limit_size = true;
        config.budget = Some(BudgetSetting::Bytes(bytes));
    }
    if let Some(footer) = &cli.footer {
        config.footer = Some(footer.clone());
        config.footer_enabled = true;
    }
    if cli.best_effort {
        config.policy.over_budget = OverBudget::BestEffort;
    }
    if let Some(floor) = cli.scale_floor {
        config.policy.scale_floor = floor;
    }
    if cli.sequential {
        config.parallel = false;
    }
    Ok(config)
}

/// Load the footer once. A footer that cannot be read leaves the batch to run
/// without it; the batch report carries the user-facing notice.
fn load_footer(config: &ConverterConfig) -> Option<FooterAsset> {
    if !config.footer_enabled {
        return None;
    }
    let path = config.footer.as_ref()?;
    let loaded = fs::read(path)
        .with_context(|| format!("Failed to read footer {}", path.display()))
        .and_then(|bytes| FooterAsset::from_bytes(&bytes).map_err(anyhow::Error::from));
    match loaded {
        Ok(asset) => {
            debug!(path = %path.display(), "footer loaded");
            Some(asset)
        }
        Err(err) => {
            debug!(error = %err, "footer unavailable");
            None
        }
    }
}

/// Read every input. Unreadable paths stay in the batch and are reported as
/// failed items alongside the ones that fail to decode.
fn read_inputs(paths: &[PathBuf]) -> Vec<InputItem> {
    paths
        .iter()
        .map(|path| {
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            match fs::read(path) {
                Ok(bytes) => InputItem::new(name, bytes),
                Err(err) => {
                    debug!(path = %path.display(), error = %err, "input unreadable");
                    InputItem::unreadable(name, &err)
                }
            }
        })
        .collect()
}

fn run(cli: &Cli) -> Result<BatchReport> {
    let config = build_config(cli)?;
    let options = config.to_options()?;
    let footer = load_footer(&config);
    let items = read_inputs(&cli.inputs);

    let report = convert_batch(&items, footer.as_ref(), &options);

    let mut sink = DirectorySink::create(&cli.output)
        .with_context(|| format!("Failed to create output directory {}", cli.output.display()))?;
    report
        .write_to(&mut sink)
        .with_context(|| format!("Failed to write into {}", cli.output.display()))?;
    Ok(report)
}

fn megabytes(bytes: usize) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

fn print_report(report: &BatchReport, output: &Path) {
    for item in &report.items {
        match &item.outcome {
            ItemOutcome::Fitted(encoded) => println!(
                "{} -> {} (quality {}, scale {:.1}, {:.2}MB)",
                item.input_name,
                item.output_name,
                encoded.attempt.quality,
                encoded.attempt.scale,
                megabytes(encoded.attempt.byte_len)
            ),
            ItemOutcome::BestEffort(encoded) => println!(
                "{} -> {} (over budget, kept {:.2}MB)",
                item.input_name,
                item.output_name,
                megabytes(encoded.attempt.byte_len)
            ),
            ItemOutcome::Failed(err) => println!("{}: skipped ({err})", item.input_name),
        }
    }
    println!(
        "{} converted, {} skipped, output in {}",
        report.fitted_count() + report.best_effort_count(),
        report.failed_count(),
        output.display()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use jpegfit_core::decode::encode_container;
    use jpegfit_core::{DecodedImage, FailureKind, ImageFormat, DEFAULT_BUDGET_BYTES};

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("jpegfit").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_parse_budget() {
        assert_eq!(parse_budget("2M"), Ok(DEFAULT_BUDGET_BYTES));
        assert_eq!(parse_budget("500K"), Ok(512_000));
        assert!(parse_budget("lots").is_err());
    }

    #[test]
    fn test_requires_inputs() {
        assert!(Cli::try_parse_from(["jpegfit"]).is_err());
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = parse(&[
            "a.png",
            "--budget",
            "1M",
            "--best-effort",
            "--scale-floor",
            "0.4",
            "--sequential",
            "--footer",
            "notice.png",
        ]);

        let options = build_config(&cli).unwrap().to_options().unwrap();

        assert_eq!(options.budget_bytes, Some(1024 * 1024));
        assert_eq!(options.policy.over_budget, OverBudget::BestEffort);
        assert_eq!(options.policy.scale_floor, 0.4);
        assert!(!options.parallel);
        assert!(options.footer_enabled);
    }

    #[test]
    fn test_limit_uses_default_budget() {
        let cli = parse(&["a.png", "--limit"]);
        let options = build_config(&cli).unwrap().to_options().unwrap();
        assert_eq!(options.budget_bytes, Some(DEFAULT_BUDGET_BYTES));
    }

    #[test]
    fn test_flags_layer_over_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jpegfit.toml");
        fs::write(&path, "budget = \"300K\"\nparallel = false\n").unwrap();
        let cli = parse(&["a.png", "-c", path.to_str().unwrap(), "--best-effort"]);

        let options = build_config(&cli).unwrap().to_options().unwrap();

        assert_eq!(options.budget_bytes, Some(307_200));
        assert!(!options.parallel);
        assert_eq!(options.policy.over_budget, OverBudget::BestEffort);
    }

    #[test]
    fn test_run_writes_outputs_and_skips_bad_footer() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("photo.png");
        let png = encode_container(&DecodedImage::filled(24, 16, [10, 20, 30]), ImageFormat::Png)
            .unwrap();
        fs::write(&input, png).unwrap();
        let out = dir.path().join("out");
        let cli = parse(&[
            input.to_str().unwrap(),
            dir.path().join("missing.png").to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
            "--footer",
            dir.path().join("no-footer.png").to_str().unwrap(),
        ]);

        let report = run(&cli).unwrap();

        assert_eq!(report.items.len(), 2);
        assert_eq!(report.fitted_count(), 1);
        assert_eq!(report.notices.len(), 1);
        assert!(out.join("photo.jpg").exists());
    }

    #[test]
    fn test_unreadable_inputs_are_reported_as_failures() {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![
            dir.path().join("missing.png"),
            dir.path().to_path_buf(),
            PathBuf::from("/"),
        ];

        let items = read_inputs(&paths);

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].name, "missing.png");
        assert_eq!(items[2].name, "/");
        assert!(items.iter().all(|item| item.read_error.is_some()));

        let out = dir.path().join("out");
        let cli = parse(&[
            paths[0].to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
        ]);
        let report = run(&cli).unwrap();

        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.items[0].input_name, "missing.png");
        assert_eq!(
            report.items[0].outcome.error().map(|e| e.kind()),
            Some(FailureKind::DecodeFailure)
        );
    }
}
