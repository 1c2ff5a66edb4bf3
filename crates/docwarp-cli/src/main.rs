// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docwarp — straighten and crop photographed documents.
//
// Entry point. Initialises logging, loads the configuration, and processes a
// single image or every image in a directory.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use docwarp_core::config::ProcessorConfig;
use docwarp_core::error::{DocError, Result};
use docwarp_core::types::ProcessingSummary;
use docwarp_document::{BatchItem, BatchReport, DocumentProcessor, ItemOutcome, process_batch};
use serde::Serialize;
use tracing::{debug, info, warn};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tif", "tiff"];

#[derive(Parser, Debug)]
#[command(name = "docwarp")]
#[command(version, about = "Detect, rectify, and de-skew photographed documents")]
struct Cli {
    /// Input image file or directory of images
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output file or directory
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log pipeline stages at debug level
    #[arg(short, long)]
    verbose: bool,

    /// Print machine-readable results instead of the human summary
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::from(2)
        }
    }
}

/// Returns whether every input was processed.
fn run(cli: &Cli) -> Result<bool> {
    let config = match &cli.config {
        Some(path) => ProcessorConfig::from_json_file(path)?,
        None => ProcessorConfig::default(),
    };
    let processor = DocumentProcessor::new(config)?;

    if cli.input.is_file() {
        run_file(&processor, cli)
    } else if cli.input.is_dir() {
        run_directory(&processor, cli)
    } else {
        Err(DocError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} does not exist", cli.input.display()),
        )))
    }
}

// -- Single file ----------------------------------------------------------------

fn run_file(processor: &DocumentProcessor, cli: &Cli) -> Result<bool> {
    let name = file_name(&cli.input);
    let bytes = std::fs::read(&cli.input)?;
    let output = file_output_path(&cli.input, cli.output.as_deref());

    let result = match processor.process(&bytes) {
        Ok(result) => result,
        Err(err) => {
            if cli.json {
                print_json(&[ItemReport::failure(&name, &err)])?;
            } else {
                println!("x Error processing {name}: {err}");
            }
            return Ok(false);
        }
    };
    result.image.save(&output)?;
    info!(output = %output.display(), "Result saved");

    if cli.json {
        print_json(&[ItemReport::success(&name, result.summary())])?;
    } else {
        println!("ok Successfully processed: {name}");
        println!("  Rotation corrected: {:.2}°", result.angle);
        println!("  Saved to: {}", output.display());
    }
    Ok(true)
}

/// `fixed_<name>` beside the input, inside an existing output directory, or
/// exactly the given output path.
fn file_output_path(input: &Path, output: Option<&Path>) -> PathBuf {
    let fixed_name = format!("fixed_{}", file_name(input));
    match output {
        Some(dir) if dir.is_dir() => dir.join(fixed_name),
        Some(path) => path.to_path_buf(),
        None => input
            .parent()
            .map(|parent| parent.join(&fixed_name))
            .unwrap_or_else(|| PathBuf::from(&fixed_name)),
    }
}

// -- Directory ------------------------------------------------------------------

fn run_directory(processor: &DocumentProcessor, cli: &Cli) -> Result<bool> {
    let images = collect_images(&cli.input)?;
    if images.is_empty() {
        println!("No images found in {}", cli.input.display());
        return Ok(true);
    }

    let output_dir = cli
        .output
        .clone()
        .unwrap_or_else(|| cli.input.join("processed"));
    std::fs::create_dir_all(&output_dir)?;

    let (items, unreadable) = load_items(&images);
    if !cli.json {
        println!("Processing {} images...", images.len());
        println!("Output directory: {}", output_dir.display());
    }

    let mut report = process_batch(processor, items)?.merge_failures(unreadable);
    save_results(&mut report, &output_dir);

    if cli.json {
        let reports: Vec<ItemReport> = report
            .outcomes
            .iter()
            .map(|o| match &o.result {
                Ok(result) => ItemReport::success(&o.name, result.summary()),
                Err(err) => ItemReport::failure(&o.name, err),
            })
            .collect();
        print_json(&reports)?;
    } else {
        let total = report.outcomes.len();
        for (i, outcome) in report.outcomes.iter().enumerate() {
            println!("{}", item_line(i + 1, total, outcome));
        }
        for line in summary_lines(&report) {
            println!("{line}");
        }
        println!("Output directory: {}", output_dir.display());
    }
    Ok(report.failed_count() == 0)
}

/// Read every input. Unreadable files become failed outcomes at their
/// position in `paths` instead of aborting the run.
fn load_items(paths: &[PathBuf]) -> (Vec<BatchItem>, Vec<ItemOutcome>) {
    let mut items = Vec::with_capacity(paths.len());
    let mut unreadable = Vec::new();
    for (index, path) in paths.iter().enumerate() {
        let name = file_name(path);
        match std::fs::read(path) {
            Ok(bytes) => items.push(BatchItem::new(name, bytes)),
            Err(err) => {
                warn!(name = %name, error = %err, "Input could not be read");
                unreadable.push(ItemOutcome::failed(index, name, DocError::Io(err)));
            }
        }
    }
    (items, unreadable)
}

/// Write each successful result as `processed_<name>`. A failed write turns
/// that item into a failure and the remaining results are still written.
fn save_results(report: &mut BatchReport, output_dir: &Path) {
    for outcome in &mut report.outcomes {
        let path = output_dir.join(format!("processed_{}", outcome.name));
        let saved = match &outcome.result {
            Ok(result) => result.image.save(&path),
            Err(_) => continue,
        };
        match saved {
            Ok(()) => debug!(path = %path.display(), "Result saved"),
            Err(err) => {
                warn!(name = %outcome.name, error = %err, "Result could not be saved");
                outcome.result = Err(err);
            }
        }
    }
}

/// Supported images directly inside `dir`, sorted by file name.
fn collect_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_supported_image(&path) {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// -- Reporting ------------------------------------------------------------------

#[derive(Serialize)]
struct ItemReport<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<ProcessingSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
}

impl<'a> ItemReport<'a> {
    fn success(name: &'a str, summary: ProcessingSummary) -> Self {
        Self {
            name,
            result: Some(summary),
            error: None,
            kind: None,
        }
    }

    fn failure(name: &'a str, err: &DocError) -> Self {
        Self {
            name,
            result: None,
            error: Some(err.to_string()),
            kind: Some(err.kind()),
        }
    }
}

fn print_json(reports: &[ItemReport<'_>]) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(reports)?);
    Ok(())
}

fn item_line(position: usize, total: usize, outcome: &ItemOutcome) -> String {
    match &outcome.result {
        Ok(result) => format!(
            "[{position:2}/{total}] {:30} {:+6.2}° {:5.0}ms ok",
            outcome.name,
            result.angle,
            result.elapsed.as_secs_f64() * 1000.0
        ),
        Err(err) => {
            let message: String = err.to_string().chars().take(50).collect();
            format!("[{position:2}/{total}] {:30} ERROR: {message}", outcome.name)
        }
    }
}

fn summary_lines(report: &BatchReport) -> Vec<String> {
    let total = report.outcomes.len();
    let times: Vec<f64> = report
        .successes()
        .map(|(_, r)| r.elapsed.as_secs_f64() * 1000.0)
        .collect();

    let mut lines = vec![
        "=".repeat(70),
        "BATCH PROCESSING COMPLETE".to_string(),
        format!("Successful: {}/{total}", report.processed_count()),
        format!("Failed: {}/{total}", report.failed_count()),
    ];
    if !times.is_empty() {
        let average = times.iter().sum::<f64>() / times.len() as f64;
        let max = times.iter().copied().fold(f64::MIN, f64::max);
        lines.push(format!("Average time: {average:.0}ms"));
        lines.push(format!("Max time: {max:.0}ms"));
    }
    for description in report.failure_descriptions() {
        lines.push(format!("  {description}"));
    }
    lines.push("=".repeat(70));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use docwarp_core::types::RasterImage;
    use image::{GrayImage, Luma};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_all_flags() {
        let cli = Cli::try_parse_from([
            "docwarp", "scans", "-o", "out", "-c", "cfg.json", "-v", "--json",
        ])
        .unwrap();
        assert_eq!(cli.input, PathBuf::from("scans"));
        assert_eq!(cli.output, Some(PathBuf::from("out")));
        assert_eq!(cli.config, Some(PathBuf::from("cfg.json")));
        assert!(cli.verbose && cli.json);
    }

    #[test]
    fn recognises_image_extensions() {
        assert!(is_supported_image(Path::new("a/scan.JPG")));
        assert!(is_supported_image(Path::new("card.tiff")));
        assert!(!is_supported_image(Path::new("notes.txt")));
        assert!(!is_supported_image(Path::new("no_extension")));
    }

    #[test]
    fn default_file_output_sits_beside_input() {
        let out = file_output_path(Path::new("/tmp/in/card.png"), None);
        assert_eq!(out, PathBuf::from("/tmp/in/fixed_card.png"));
    }

    #[test]
    fn output_directory_receives_fixed_name() {
        let dir = tempfile::tempdir().unwrap();
        let out = file_output_path(Path::new("card.jpg"), Some(dir.path()));
        assert_eq!(out, dir.path().join("fixed_card.jpg"));
    }

    #[test]
    fn directory_run_writes_processed_files() {
        let dir = tempfile::tempdir().unwrap();
        let gray = GrayImage::from_fn(120, 90, |x, y| {
            if (y / 10) % 2 == 0 && x > 10 && x < 110 { Luma([30u8]) } else { Luma([240u8]) }
        });
        let png = RasterImage::from_gray(gray).unwrap().to_png_bytes().unwrap();
        std::fs::write(dir.path().join("one.png"), &png).unwrap();
        std::fs::write(dir.path().join("two.png"), b"broken").unwrap();
        std::fs::write(dir.path().join("readme.txt"), b"skip me").unwrap();

        let cli = Cli {
            input: dir.path().to_path_buf(),
            output: None,
            config: None,
            verbose: false,
            json: true,
        };
        let processor = DocumentProcessor::default();
        let all_ok = run_directory(&processor, &cli).unwrap();

        assert!(!all_ok);
        assert!(dir.path().join("processed/processed_one.png").is_file());
        assert!(!dir.path().join("processed/processed_two.png").exists());
    }

    #[test]
    fn unreadable_input_is_a_failed_item() {
        let dir = tempfile::tempdir().unwrap();
        let readable = dir.path().join("a.png");
        std::fs::write(&readable, b"bytes").unwrap();
        let missing = dir.path().join("b.png");

        let (items, unreadable) = load_items(&[missing, readable]);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "a.png");
        assert_eq!(unreadable.len(), 1);
        assert_eq!(unreadable[0].index, 0);
        assert_eq!(unreadable[0].name, "b.png");
        assert!(matches!(unreadable[0].result, Err(DocError::Io(_))));
    }

    #[test]
    fn failed_write_does_not_stop_later_writes() {
        let dir = tempfile::tempdir().unwrap();
        let page = GrayImage::from_fn(60, 40, |x, _| Luma([if x % 7 == 0 { 20u8 } else { 230u8 }]));
        let png = RasterImage::from_gray(page).unwrap().to_png_bytes().unwrap();
        let items = vec![
            BatchItem::new("one.png", png.clone()),
            // No encoder for this extension, so only this write fails.
            BatchItem::new("two.unknownext", png.clone()),
            BatchItem::new("three.png", png),
        ];
        let mut report = process_batch(&DocumentProcessor::default(), items).unwrap();
        assert_eq!(report.processed_count(), 3);

        save_results(&mut report, dir.path());
        assert!(dir.path().join("processed_one.png").is_file());
        assert!(dir.path().join("processed_three.png").is_file());
        assert_eq!(report.failed_count(), 1);
        assert!(matches!(report.outcomes[1].result, Err(DocError::Encode(_))));
    }

    #[test]
    fn json_failure_carries_error_kind() {
        let err = DocError::Decode("truncated".into());
        let json = serde_json::to_value(ItemReport::failure("x.png", &err)).unwrap();
        assert_eq!(json["kind"], "decode");
        assert_eq!(json["name"], "x.png");
        assert!(json.get("result").is_none());
    }

    #[test]
    fn missing_input_is_an_error() {
        let cli = Cli::try_parse_from(["docwarp", "/definitely/not/here.png"]).unwrap();
        assert!(matches!(run(&cli), Err(DocError::Io(_))));
    }
}
