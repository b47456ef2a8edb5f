use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tokio::sync::mpsc;

use rangedl_core::config::{self, EngineConfig};
use rangedl_core::{state, Event, JobController, JobDescriptor};

/// Segmented, resumable HTTP downloader.
#[derive(Parser, Debug)]
#[command(name = "rangedl", version, about)]
pub struct Cli {
    /// URL to download.
    pub url: String,

    /// Directory to save the file into.
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Number of concurrent ranged connections.
    #[arg(short, long)]
    pub connections: Option<u32>,

    /// Resume a previous job by id. If a resume record exists for this id
    /// under `state-dir`, the job picks up where it left off.
    #[arg(long)]
    pub job_id: Option<String>,

    /// Directory holding the resume state file. Defaults to output-dir.
    #[arg(long)]
    pub state_dir: Option<PathBuf>,
}

pub async fn run(args: Cli) -> Result<()> {
    let engine_config = config::load_or_init().unwrap_or_else(|e| {
        tracing::warn!("falling back to default engine config: {e}");
        EngineConfig::default()
    });

    let job = build_job(&args, &engine_config)?;

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let controller = JobController::new(engine_config);
    let (handle, job_future) = controller.start(job, events_tx);

    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\nreceived interrupt, pausing...");
            handle.pause();
        }
    });

    let printer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            print_event(&event);
        }
    });

    let result = job_future.await;
    ctrl_c.abort();
    let _ = printer.await;

    result.map_err(|e| anyhow::anyhow!(e))
}

fn build_job(args: &Cli, engine_config: &EngineConfig) -> Result<JobDescriptor> {
    let connections = args.connections.unwrap_or(engine_config.default_connections);
    let mut job = JobDescriptor::new(args.url.clone(), args.output_dir.clone()).with_connections(connections);

    if let Some(job_id) = &args.job_id {
        job = job.with_job_id(job_id.clone());
    }
    if let Some(state_dir) = &args.state_dir {
        job = job.with_state_dir(state_dir.clone());
    }

    if args.job_id.is_some() {
        let paths = job.derived_paths();
        if let Some(record) = state::load(&paths.state_path)? {
            job.total_bytes = record.total_bytes;
            job.downloaded_bytes_per_chunk = record.downloaded_bytes_per_chunk;
            job.connections = record.num_connections;
            job.file_name = record.file_name;
        }
    }

    Ok(job)
}

fn print_event(event: &Event) {
    match event {
        Event::Start {
            job_id,
            total_bytes,
            file_name,
        } => {
            println!("[{job_id}] starting {file_name} ({total_bytes} bytes)");
        }
        Event::Progress {
            downloaded, total, ..
        } => {
            let pct = if *total > 0 {
                (*downloaded as f64 / *total as f64) * 100.0
            } else {
                0.0
            };
            println!("{downloaded}/{total} bytes ({pct:.1}%)");
        }
        Event::Paused { job_id } => {
            println!("[{job_id}] paused, resume with --job-id {job_id}");
        }
        Event::Complete { job_id, final_path } => {
            println!("[{job_id}] complete: {}", final_path.display());
        }
        Event::Error { job_id, message } => {
            eprintln!("[{job_id}] error: {message}");
        }
    }
}
