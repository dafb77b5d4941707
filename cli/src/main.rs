//! Mover - Command-line controller for the bulk copy engine.
//!
//! Builds a job from arguments (or a JSON job file), runs it on the engine's
//! background worker and renders the event stream to stderr, or to stdout as
//! JSON lines.

use clap::Parser;
use mover_engine::{
    plan_job, preview_destinations, CompletionEvent, CopyEngine, EngineConfig, InsufficientSpaceEvent,
    JobEvent, JobSpec, OverwritePolicy,
};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Mover - copy many files and folders into one place
#[derive(Parser, Debug)]
#[command(name = "mover")]
#[command(version = "0.1.0")]
#[command(about = "Copy files and directories with flattening, overwrite rules and progress")]
struct Args {
    /// Files and directories to copy
    #[arg(value_name = "SOURCE", required_unless_present = "job")]
    sources: Vec<PathBuf>,

    /// Destination directory (created if missing)
    #[arg(long, value_name = "PATH", required_unless_present = "job")]
    dst: Option<PathBuf>,

    /// Number of leading path segments to drop at the destination
    #[arg(long, value_name = "COUNT", default_value_t = 0)]
    flatten: usize,

    /// Overwrite policy: none, larger, newer, or either
    #[arg(long, value_name = "POLICY", default_value = "none")]
    overwrite: String,

    /// Bytes that must stay free at the destination after the copy
    #[arg(long, value_name = "BYTES", default_value_t = 0)]
    headroom: u64,

    /// Read the job from a JSON file instead of the arguments above
    #[arg(long, value_name = "FILE", conflicts_with_all = ["sources", "dst"])]
    job: Option<PathBuf>,

    /// Print events as JSON lines on stdout
    #[arg(long)]
    json: bool,

    /// Show where files would go without copying anything
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose output
    #[arg(long)]
    verbose: bool,
}

/// How a run ended, for the exit code.
#[derive(Debug, PartialEq, Eq)]
enum RunStatus {
    Completed,
    Incomplete,
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_idx])
}

fn format_duration(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, mins, secs)
    } else if mins > 0 {
        format!("{}m {}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}

fn progress_bar(percent: u8) -> String {
    let filled = usize::from(percent.min(100) / 5);
    format!("[{}{}] {}%", "=".repeat(filled), " ".repeat(20 - filled), percent)
}

/// Parse and validate command-line arguments, then run the job
fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    pretty_env_logger::formatted_builder()
        .parse_filters(&std::env::var("RUST_LOG").unwrap_or_else(|_| default_level.to_string()))
        .init();

    let engine = Arc::new(engine_for(&args));
    let interrupted = Arc::clone(&engine);
    if let Err(e) = ctrlc::set_handler(move || {
        if !interrupted.is_busy() {
            std::process::exit(130);
        }
        eprintln!();
        eprintln!("Cancelling after the current file...");
        interrupted.cancel();
    }) {
        log::warn!("Cannot install Ctrl-C handler: {}", e);
    }

    let exit_code = match run_cli(&args, &engine) {
        Ok(RunStatus::Completed) => 0,
        Ok(RunStatus::Incomplete) => 1,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            2
        }
    };

    std::process::exit(exit_code);
}

fn engine_for(args: &Args) -> CopyEngine {
    CopyEngine::new(EngineConfig::default().with_capacity_headroom(args.headroom))
}

/// Turn the arguments into a job spec with absolute paths.
fn build_spec(args: &Args) -> Result<JobSpec, String> {
    let spec = match &args.job {
        Some(job_file) => {
            let text = fs::read_to_string(job_file)
                .map_err(|e| format!("Cannot read job file {}: {}", job_file.display(), e))?;
            serde_json::from_str::<JobSpec>(&text)
                .map_err(|e| format!("Invalid job file {}: {}", job_file.display(), e))?
        }
        None => {
            let policy: OverwritePolicy = args.overwrite.parse().map_err(|e| format!("{}", e))?;
            let dst = args
                .dst
                .clone()
                .ok_or_else(|| "A destination (--dst) is required".to_string())?;
            JobSpec::new(args.sources.iter(), dst)
                .with_flatten_count(args.flatten)
                .with_overwrite_policy(policy)
        }
    };

    let absolute = |path: &Path| {
        std::path::absolute(path).map_err(|e| format!("Invalid path {}: {}", path.display(), e))
    };
    Ok(JobSpec {
        sources: spec
            .sources
            .iter()
            .map(|s| absolute(s.as_path()))
            .collect::<Result<_, _>>()?,
        destination_root: absolute(spec.destination_root.as_path())?,
        ..spec
    })
}

/// Main CLI logic - separated for testability
///
/// A cancelled job, like one refused for space, ends as `Incomplete`.
fn run_cli(args: &Args, engine: &CopyEngine) -> Result<RunStatus, String> {
    let spec = build_spec(args)?;

    for source in &spec.sources {
        if !source.exists() {
            log::warn!("Source does not exist and will be skipped: {}", source.display());
        }
    }

    if args.dry_run {
        return dry_run(&spec, args.json);
    }

    if !spec.destination_root.exists() {
        fs::create_dir_all(&spec.destination_root).map_err(|e| {
            format!(
                "Cannot create destination {}: {}",
                spec.destination_root.display(),
                e
            )
        })?;
    }

    let handle = engine
        .start_job(spec)
        .map_err(|e| format!("Job creation failed: {}", e))?;
    announce(handle.id(), args.json);

    let mut status = RunStatus::Incomplete;
    for event in handle.events() {
        if args.json {
            print_json(&event)?;
        } else {
            render(&event, args.verbose);
        }
        if matches!(event, JobEvent::Completed(_)) {
            status = RunStatus::Completed;
        }
    }

    let failures: Vec<_> = handle.diagnostics().try_iter().collect();
    if !failures.is_empty() && !args.json {
        eprintln!();
        eprintln!("Failed files:");
        for failure in &failures {
            eprintln!("  {}: {}", failure.source_path.display(), failure.message);
        }
    }

    match handle.wait() {
        Ok(_) if failures.is_empty() => Ok(status),
        Ok(_) => Ok(RunStatus::Incomplete),
        Err(e) => Err(format!("Job execution failed: {}", e)),
    }
}

fn announce(id: Uuid, json: bool) {
    if !json {
        eprintln!("Starting job {}", id);
    }
    log::debug!("Job {} submitted", id);
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), String> {
    let line = serde_json::to_string(value).map_err(|e| format!("Cannot encode event: {}", e))?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", line).map_err(|e| format!("Cannot write output: {}", e))
}

fn dry_run(spec: &JobSpec, json: bool) -> Result<RunStatus, String> {
    if !spec.destination_root.is_dir() {
        // Nothing is created in a dry run; show the per-entry mapping instead
        for (source, destination) in preview_destinations(spec) {
            println!("{} -> {}", source.display(), destination.display());
        }
        return Ok(RunStatus::Completed);
    }

    let plan = plan_job(spec).map_err(|e| format!("Job planning failed: {}", e))?;
    let total: u64 = plan.iter().map(|(record, _)| record.size_bytes).sum();
    for (record, destination) in &plan {
        if json {
            print_json(&serde_json::json!({
                "source": record.absolute_path,
                "destination": destination,
                "size_bytes": record.size_bytes,
            }))?;
        } else {
            println!("{} -> {}", record.absolute_path.display(), destination.display());
        }
    }
    if !json {
        eprintln!("{} files, {}", plan.len(), format_bytes(total));
    }
    Ok(RunStatus::Completed)
}

fn render(event: &JobEvent, verbose: bool) {
    match event {
        JobEvent::Progress(p) => {
            eprint!(
                "\rProgress: {} | {}/{} files | {}/{}",
                progress_bar(p.percent_complete),
                p.files_completed,
                p.files_total,
                format_bytes(p.bytes_copied),
                format_bytes(p.total_bytes)
            );
            if verbose && p.files_skipped > 0 {
                eprint!(" ({} skipped)", p.files_skipped);
            }
            let _ = std::io::stderr().flush();
        }
        JobEvent::Completed(done) => render_completion(done),
        JobEvent::InsufficientSpace(space) => render_space_problem(space),
        JobEvent::Cancelled {
            files_completed,
            files_copied,
            bytes_copied,
        } => {
            eprintln!();
            eprintln!(
                "Copy cancelled after {} files ({} copied, {})",
                files_completed,
                files_copied,
                format_bytes(*bytes_copied)
            );
        }
        JobEvent::FailedFatal { message } => {
            eprintln!();
            eprintln!("Job failed: {}", message);
        }
    }
}

fn render_completion(done: &CompletionEvent) {
    eprintln!();
    eprintln!("Copy complete!");
    eprintln!(
        "Summary: {} copied, {} skipped, {} failed",
        done.files_copied, done.files_skipped, done.files_failed
    );
    eprintln!("Data copied: {}", format_bytes(done.total_bytes_copied));
    eprintln!("Elapsed: {}", format_duration(done.elapsed));
    eprintln!("Transfer rate: {}/s", format_bytes(done.transfer_rate() as u64));
    eprintln!(
        "Finished at: {}",
        done.finished_at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S")
    );
}

fn render_space_problem(space: &InsufficientSpaceEvent) {
    eprintln!("Not enough space in the destination to complete this copy.");
    eprintln!(
        "  Required: {}, available: {} ({} more needed)",
        format_bytes(space.required_bytes),
        format_bytes(space.available_bytes),
        format_bytes(space.shortfall())
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{bounded, Receiver, Sender};
    use mover_engine::{EngineError, SpaceProbe};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Holds the worker in its capacity check until released.
    struct GatedProbe {
        entered: Sender<()>,
        release: Mutex<Receiver<()>>,
    }

    impl SpaceProbe for GatedProbe {
        fn free_space(&self, _path: &Path) -> Result<u64, EngineError> {
            let _ = self.entered.send(());
            if let Ok(release) = self.release.lock() {
                let _ = release.recv();
            }
            Ok(u64::MAX)
        }
    }

    fn args(sources: Vec<PathBuf>, dst: Option<PathBuf>) -> Args {
        Args {
            sources,
            dst,
            flatten: 0,
            overwrite: "none".to_string(),
            headroom: 0,
            job: None,
            json: true,
            dry_run: false,
            verbose: false,
        }
    }

    #[test]
    fn test_cli_with_valid_directories() {
        let src_dir = TempDir::new().expect("Failed to create temp dir");
        let dst_dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(src_dir.path().join("test.txt"), "hello").expect("Failed to write file");

        let mut args = args(
            vec![src_dir.path().to_path_buf()],
            Some(dst_dir.path().to_path_buf()),
        );
        args.flatten = mover_engine::split_segments(src_dir.path()).len();

        let result = run_cli(&args, &engine_for(&args));
        assert_eq!(result, Ok(RunStatus::Completed));
        assert!(dst_dir.path().join("test.txt").exists());
    }

    #[test]
    fn test_cli_creates_missing_destination() {
        let src_dir = TempDir::new().expect("Failed to create temp dir");
        let dst_dir = TempDir::new().expect("Failed to create temp dir");
        let file = src_dir.path().join("test.txt");
        std::fs::write(&file, "hello").expect("Failed to write file");
        let dst = dst_dir.path().join("new/dir");

        let mut args = args(vec![file], Some(dst.clone()));
        args.flatten = 1000;

        assert_eq!(run_cli(&args, &engine_for(&args)), Ok(RunStatus::Completed));
        assert!(dst.join("test.txt").exists());
    }

    #[test]
    fn test_cli_dry_run_copies_nothing() {
        let src_dir = TempDir::new().expect("Failed to create temp dir");
        let dst_dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(src_dir.path().join("test.txt"), "hello").expect("Failed to write file");

        let mut args = args(
            vec![src_dir.path().to_path_buf()],
            Some(dst_dir.path().to_path_buf()),
        );
        args.dry_run = true;

        assert_eq!(run_cli(&args, &engine_for(&args)), Ok(RunStatus::Completed));
        assert!(std::fs::read_dir(dst_dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn test_cli_reads_job_file() {
        let src_dir = TempDir::new().expect("Failed to create temp dir");
        let dst_dir = TempDir::new().expect("Failed to create temp dir");
        let file = src_dir.path().join("test.txt");
        std::fs::write(&file, "hello").expect("Failed to write file");

        let spec = JobSpec::new([&file], dst_dir.path())
            .with_flatten_count(1000)
            .with_overwrite_policy(OverwritePolicy::Either);
        let job_file = src_dir.path().join("job.json");
        std::fs::write(&job_file, serde_json::to_string(&spec).unwrap()).expect("Failed to write job");

        let mut args = args(Vec::new(), None);
        args.job = Some(job_file);

        assert_eq!(run_cli(&args, &engine_for(&args)), Ok(RunStatus::Completed));
        assert!(dst_dir.path().join("test.txt").exists());
    }

    #[test]
    fn test_cli_rejects_invalid_policy() {
        let src_dir = TempDir::new().expect("Failed to create temp dir");
        let dst_dir = TempDir::new().expect("Failed to create temp dir");

        let mut args = args(
            vec![src_dir.path().to_path_buf()],
            Some(dst_dir.path().to_path_buf()),
        );
        args.overwrite = "invalid".to_string();

        assert!(run_cli(&args, &engine_for(&args)).is_err(), "CLI should reject invalid policy");
    }

    #[test]
    fn test_cli_rejects_unreadable_job_file() {
        let mut args = args(Vec::new(), None);
        args.job = Some(PathBuf::from("/nonexistent/job.json"));

        assert!(run_cli(&args, &engine_for(&args)).is_err());
    }

    #[test]
    fn test_cli_insufficient_space_is_incomplete() {
        let src_dir = TempDir::new().expect("Failed to create temp dir");
        let dst_dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(src_dir.path().join("test.txt"), "hello").expect("Failed to write file");

        let mut args = args(
            vec![src_dir.path().to_path_buf()],
            Some(dst_dir.path().to_path_buf()),
        );
        args.headroom = u64::MAX;

        assert_eq!(run_cli(&args, &engine_for(&args)), Ok(RunStatus::Incomplete));
    }

    #[test]
    fn test_cli_cancelled_job_is_incomplete() {
        let src_dir = TempDir::new().expect("Failed to create temp dir");
        let dst_dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(src_dir.path().join("a.txt"), "hello").expect("Failed to write file");
        std::fs::write(src_dir.path().join("b.txt"), "world").expect("Failed to write file");

        let (entered_tx, entered_rx) = bounded(1);
        let (release_tx, release_rx) = bounded(1);
        let probe = GatedProbe {
            entered: entered_tx,
            release: Mutex::new(release_rx),
        };
        let engine = CopyEngine::with_probe(EngineConfig::default(), Arc::new(probe));
        let mut args = args(
            vec![src_dir.path().to_path_buf()],
            Some(dst_dir.path().to_path_buf()),
        );
        args.flatten = mover_engine::split_segments(src_dir.path()).len();

        // Same path as the Ctrl-C handler
        let status = std::thread::scope(|s| {
            let run = s.spawn(|| run_cli(&args, &engine));
            entered_rx.recv().expect("Worker never reached the capacity check");
            engine.cancel();
            release_tx.send(()).expect("Failed to release worker");
            run.join().expect("CLI thread panicked")
        });

        assert_eq!(status, Ok(RunStatus::Incomplete));
        assert!(std::fs::read_dir(dst_dir.path()).unwrap().next().is_none());
        assert!(!engine.is_busy());
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_bytes(512), "512.00 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
        assert_eq!(format_duration(Duration::from_secs(42)), "42s");
        assert_eq!(progress_bar(50), "[==========          ] 50%");
    }
}
