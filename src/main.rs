mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};

use cli::Cli;
use respiview::config::{self, Config};
use respiview::imaging::{self, TensorStats};
use respiview::pipeline::{error_chain, StageLogObserver};
use respiview::{Preprocessor, TargetSize};

#[derive(Serialize)]
struct Report<'a> {
    input: &'a Path,
    #[serde(flatten)]
    stats: &'a TensorStats,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    let cfg = resolve_config(&cli)?;

    let mut dsp = cfg.dsp;
    if let Some(sample_rate) = cli.sample_rate { dsp.sample_rate = sample_rate; }
    if let Some(n_mels) = cli.n_mels { dsp.n_mels = n_mels; }
    if let Some(fmin) = cli.fmin { dsp.fmin = fmin; }
    if let Some(fmax) = cli.fmax { dsp.fmax = fmax; }
    dsp.target_size = TargetSize::new(
        cli.height.unwrap_or(dsp.target_size.height),
        cli.width.unwrap_or(dsp.target_size.width),
    );

    log::info!(
        "Pipeline: {}Hz, {} mels, band {}-{}Hz, output {}x{}",
        dsp.sample_rate,
        dsp.n_mels,
        dsp.fmin,
        dsp.fmax,
        dsp.target_size.height,
        dsp.target_size.width
    );

    if cli.jobs > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.jobs)
            .build_global()
            .context("Failed to configure worker threads")?;
    }

    let upload = cfg.upload;
    // Failures are printed once below, after the progress bar is cleared.
    let preprocessor = Preprocessor::new(dsp).with_observer(StageLogObserver);

    let pb = if cli.inputs.len() > 1 && !cli.json {
        let pb = ProgressBar::new(cli.inputs.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} files ({eta} remaining)",
                )
                .context("Invalid progress template")?
                .progress_chars("=>-"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let results: Vec<(&PathBuf, Result<TensorStats>)> = cli
        .inputs
        .par_iter()
        .map(|input| {
            let result = process_one(&preprocessor, &upload, input);
            pb.inc(1);
            (input, result)
        })
        .collect();

    pb.finish_and_clear();

    let mut failed = 0;
    for (input, result) in &results {
        match result {
            Ok(stats) if cli.json => {
                let report = Report { input: input.as_path(), stats };
                println!("{}", serde_json::to_string(&report)?);
            }
            Ok(stats) => print_summary(input, stats),
            Err(err) => {
                failed += 1;
                log::error!("Error processing audio file {}: {:#}", input.display(), err);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} inputs failed", failed, results.len());
    }
    Ok(())
}

fn process_one(
    preprocessor: &Preprocessor,
    upload: &respiview::UploadConfig,
    input: &Path,
) -> Result<TensorStats> {
    let size = std::fs::metadata(input)
        .with_context(|| format!("Input file not found: {}", input.display()))?
        .len();
    upload.check(input, size).context("Upload rejected")?;

    let tensor = preprocessor
        .preprocess_file(input)
        .map_err(|e| anyhow::anyhow!(error_chain(&e)))?;
    Ok(imaging::stats(&tensor))
}

fn print_summary(input: &Path, stats: &TensorStats) {
    let [n, h, w, c] = stats.shape;
    println!("{}", input.display());
    println!("  shape:         ({}, {}, {}, {})", n, h, w, c);
    println!("  range:         {:.4} .. {:.4}", stats.min, stats.max);
    println!("  mean:          {:.4}", stats.mean);
    match stats.brightest_row {
        Some(row) => println!("  brightest row: {}", row),
        None => println!("  brightest row: -"),
    }
}

/// Explicit --config must load; discovered files only warn on failure.
fn resolve_config(cli: &Cli) -> Result<Config> {
    if let Some(ref path) = cli.config {
        let cfg = config::load_config(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?;
        log::info!("Loaded config from {}", path.display());
        return Ok(cfg);
    }

    let discovered = {
        let local = PathBuf::from("respiview.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs::config_dir()
                .map(|dir| dir.join("respiview").join("config.toml"))
                .filter(|p| p.exists())
        }
    };

    match discovered {
        Some(path) => match config::load_config(&path) {
            Ok(cfg) => {
                log::info!("Loaded config from {}", path.display());
                Ok(cfg)
            }
            Err(err) => {
                log::warn!("Failed to load config from {}: {}", path.display(), error_chain(&err));
                Ok(Config::default())
            }
        },
        None => Ok(Config::default()),
    }
}
