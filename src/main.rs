use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use grouprs::pipeline::{CancelToken, Pipeline, RunOutcome};
use grouprs::progress::ProgressReporter;
use grouprs::status::StatusBoard;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Serialize, Deserialize, Debug)]
struct RunRecord {
    timestamp: String,
    input: String,
    output: String,
    outcome: String,
    groups: usize,
    files: usize,
}

#[derive(Parser, Debug)]
#[command(name = "grouprs", version, about = "Group near-duplicate photos out of case archives")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract, hash and cluster, listing groups without writing output
    Scan {
        /// Directory containing the archives
        #[arg(short, long, value_name = "DIR")]
        input: PathBuf,
        /// Hamming distance threshold
        #[arg(short, long)]
        threshold: Option<u32>,
    },

    /// Run the full pipeline and materialize grouped copies
    Process {
        /// Directory containing the archives
        #[arg(short, long, value_name = "DIR")]
        input: PathBuf,
        /// Directory to write groups and the audit table into
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
        /// Hamming distance threshold
        #[arg(short, long)]
        threshold: Option<u32>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = grouprs::config::load_configuration().context("Failed to load configuration")?;

    match cli.command {
        Commands::Scan { input, threshold } => {
            config.input_dir = input.to_string_lossy().into_owned();
            if let Some(threshold) = threshold {
                config.hash_threshold = threshold;
            }

            println!("▶ Scanning archives in: {}", input.display());
            let pipeline = Pipeline::new(config);
            let status = StatusBoard::new();
            let analysis =
                pipeline.analyze(None, &CliReporter::new(), &status, &CancelToken::new())?;

            if analysis.groups.is_empty() {
                println!("No similar photo groups found.");
            } else {
                println!("Found {} group(s):", analysis.groups.len());
                for group in &analysis.groups {
                    println!(" Group {}:", group.id);
                    for &member in &group.members {
                        let item = &analysis.items[member];
                        println!("   ▶ {} ({})", item.relative_path, item.source_archive);
                    }
                }
            }
        }

        Commands::Process {
            input,
            output,
            threshold,
        } => {
            config.input_dir = input.to_string_lossy().into_owned();
            if let Some(output) = output {
                config.output_dir = output.to_string_lossy().into_owned();
            }
            if let Some(threshold) = threshold {
                config.hash_threshold = threshold;
            }
            let output_dir = PathBuf::from(&config.output_dir);

            println!("▶ Grouping photos from archives in: {}", input.display());
            let pipeline = Pipeline::new(config);
            let status = StatusBoard::new();
            let summary =
                pipeline.run(None, &CliReporter::new(), &status, &CancelToken::new())?;

            match summary.outcome {
                RunOutcome::NothingToDo => {
                    println!(
                        "Nothing to do: {} archive(s), {} image(s) extracted, 0 groups.",
                        summary.archives_found, summary.images_extracted
                    );
                }
                RunOutcome::Completed => {
                    println!(
                        "✅ {} group(s), {} file(s) written in {:.2?}",
                        summary.groups_written, summary.files_written, summary.duration
                    );
                    if let Some(audit) = &summary.audit_path {
                        println!("   Audit table: {}", audit.display());
                    }

                    let record = RunRecord {
                        timestamp: Utc::now().to_rfc3339(),
                        input: input.to_string_lossy().into_owned(),
                        output: output_dir.to_string_lossy().into_owned(),
                        outcome: "completed".to_string(),
                        groups: summary.groups_written,
                        files: summary.files_written,
                    };
                    append_run_record(&output_dir, &record)?;
                    info!("Recorded run in {}", output_dir.join("runs.jsonl").display());
                }
            }
        }
    }

    Ok(())
}

fn append_run_record(output_dir: &std::path::Path, record: &RunRecord) -> Result<()> {
    let path = output_dir.join("runs.jsonl");
    let mut out = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open run history {:?}", path))?;
    writeln!(out, "{}", serde_json::to_string(record)?)?;
    Ok(())
}

/// Progress output for the terminal: a spinner while extracting and
/// hashing, plain lines for the rest.
struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn start_spinner(&self, message: String) {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(message);
        spinner.enable_steady_tick(Duration::from_millis(100));
        *self.bar.lock().expect("progress lock poisoned") = Some(spinner);
    }

    fn finish(&self, message: String) {
        if let Some(spinner) = self.bar.lock().expect("progress lock poisoned").take() {
            spinner.finish_with_message(message);
        }
    }
}

impl ProgressReporter for CliReporter {
    fn on_extract_start(&self, archives: usize) {
        self.start_spinner(format!("Extracting {archives} archive(s)…"));
    }

    fn on_archive_done(&self, archive: &str, images_so_far: usize) {
        if let Some(spinner) = self.bar.lock().expect("progress lock poisoned").as_ref() {
            spinner.set_message(format!("{archive} done, {images_so_far} image(s) so far"));
        }
    }

    fn on_extract_complete(&self, images: usize) {
        self.finish(format!("Extracted {images} image(s)"));
    }

    fn on_hash_start(&self, total: usize) {
        self.start_spinner(format!("Hashing {total} image(s) in parallel…"));
    }

    fn on_hash_complete(&self, hashed: usize, failed: usize) {
        self.finish(format!("Hashed {hashed} image(s), {failed} failed"));
    }

    fn on_cluster_complete(&self, groups: usize) {
        println!("▶ {groups} multi-member group(s)");
    }

    fn on_group_written(&self, group_id: u32, files: usize) {
        println!("   📦 group_{group_id}: {files} file(s)");
    }
}
