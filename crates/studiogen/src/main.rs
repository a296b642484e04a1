use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde_json::json;

use studiogen::{
    load_config, telemetry, Config, CreateJobRequest, Job, JobFilter, JobId, JobKind, JobService,
    JobStatus,
};

#[derive(Parser, Debug)]
#[command(name = "studiogen")]
#[command(about = "Generate multi-part study artifacts from source documents")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, global = true, default_value = "studiogen.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a job from a request file and wait for it to finish
    Generate {
        /// JSON file with `kind`, `settings` and `sources`
        #[arg(short, long)]
        request: PathBuf,

        /// Give up waiting after this many seconds
        #[arg(long)]
        wait_secs: Option<u64>,
    },
    /// Print one job
    Show { job_id: String },
    /// List jobs, newest first
    List {
        #[arg(long)]
        status: Option<String>,

        #[arg(long)]
        kind: Option<String>,

        #[arg(long, default_value_t = 20)]
        limit: u64,

        #[arg(long, default_value_t = 0)]
        offset: u64,
    },
    /// Start a fresh job with the inputs of a finished one and wait for it
    Regenerate {
        job_id: String,

        #[arg(long)]
        wait_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = load_config(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    telemetry::init(config.log_format);

    let service = JobService::from_config(&config)?;

    match args.command {
        Command::Generate { request, wait_secs } => {
            let request = read_request(&request)?;
            let created = service.create_job(request).await?;
            tracing::info!(job_id = %created.job_id, "Waiting for job");
            let job = wait(&service, &config, &created.job_id, wait_secs).await?;
            print_job(&service, &job)?;
        }
        Command::Show { job_id } => {
            let job = service.get_job(&JobId::from(job_id)).await?;
            print_job(&service, &job)?;
        }
        Command::List {
            status,
            kind,
            limit,
            offset,
        } => {
            let filter = JobFilter {
                status: status.as_deref().map(parse_status).transpose()?,
                kind: kind.as_deref().map(parse_kind).transpose()?,
                limit: Some(limit),
                offset: Some(offset),
            };
            let page = service.list_jobs(&filter).await?;
            let now = Utc::now();
            let jobs: Vec<_> = page
                .jobs
                .iter()
                .map(|job| {
                    json!({
                        "id": job.id,
                        "kind": job.kind,
                        "status": job.status,
                        "progress": job.progress,
                        "stale": service.is_stale(job, now),
                        "createdAt": job.created_at,
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({ "total": page.total, "jobs": jobs }))?
            );
        }
        Command::Regenerate { job_id, wait_secs } => {
            let created = service.regenerate(&JobId::from(job_id)).await?;
            let job = wait(&service, &config, &created.job_id, wait_secs).await?;
            print_job(&service, &job)?;
        }
    }

    Ok(())
}

fn read_request(path: &Path) -> anyhow::Result<CreateJobRequest> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

async fn wait(
    service: &JobService,
    config: &Config,
    job_id: &JobId,
    wait_secs: Option<u64>,
) -> anyhow::Result<Job> {
    let job = service
        .wait_for_terminal(
            job_id,
            Duration::from_millis(config.poll_interval_ms),
            wait_secs.map(Duration::from_secs),
        )
        .await?;
    Ok(job)
}

fn print_job(service: &JobService, job: &Job) -> anyhow::Result<()> {
    let mut value = serde_json::to_value(job)?;
    if let Some(object) = value.as_object_mut() {
        object.insert("stale".to_string(), json!(service.is_stale(job, Utc::now())));
    }
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn parse_status(s: &str) -> anyhow::Result<JobStatus> {
    match JobStatus::parse(s) {
        Some(status) => Ok(status),
        None => bail!("unknown status '{}'", s),
    }
}

fn parse_kind(s: &str) -> anyhow::Result<JobKind> {
    match JobKind::parse(s) {
        Some(kind) => Ok(kind),
        None => bail!("unknown kind '{}'", s),
    }
}
