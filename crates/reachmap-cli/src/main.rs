//! Reachmap runner: per-area travel-time analysis over a worker pool.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use reachmap_core::{
    spatial, AnalysisTask, OperationEvent, OperationId, OperationLog, RoutingLimits,
};
use reachmap_pool::{PoolError, WorkerCommand, WorkerPool};
use reachmap_results::{aggregate, to_csv, to_geojson, to_json};

mod inputs;
mod oplog;
mod storage;

use oplog::FileOperationLog;
use storage::{artifact_name, ArtifactStore, LocalStore};

/// Compute per-origin travel times to points of interest for every
/// administrative area, one isolated worker process per area.
#[derive(Parser)]
#[command(name = "reachmap")]
#[command(about = "Travel-time analysis orchestrator", long_about = None)]
struct Cli {
    /// Administrative areas GeoJSON file (Polygon/MultiPolygon features).
    #[arg(long, env = "REACHMAP_AREAS")]
    areas: PathBuf,

    /// Origins GeoJSON file (Point features with indicator properties).
    #[arg(long, env = "REACHMAP_ORIGINS")]
    origins: PathBuf,

    /// POI inputs as `category=path.geojson`; repeatable.
    #[arg(long = "poi", value_parser = parse_poi_arg)]
    pois: Vec<(String, PathBuf)>,

    /// Worker executable implementing the routing protocol.
    #[arg(long, env = "REACHMAP_WORKER")]
    worker: String,

    /// Extra arguments passed to every worker; repeatable.
    #[arg(long = "worker-arg")]
    worker_args: Vec<String>,

    /// Maximum travel time in seconds.
    #[arg(long, default_value_t = 1800)]
    max_time: u32,

    /// Maximum travel speed in km/h.
    #[arg(long, default_value_t = 120.0)]
    max_speed: f64,

    /// Routing grid resolution.
    #[arg(long, default_value_t = 30)]
    grid_size: u32,

    /// Maximum concurrently running workers; defaults to the CPU count.
    #[arg(long, env = "REACHMAP_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Optional per-worker timeout in seconds; a worker exceeding it is
    /// killed and fails the batch.
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Directory for result artifacts.
    #[arg(long, default_value = "results")]
    out_dir: PathBuf,

    /// Operation log file (append-only JSONL).
    #[arg(long, default_value = "operation.log")]
    op_log: PathBuf,
}

fn parse_poi_arg(raw: &str) -> Result<(String, PathBuf), String> {
    match raw.split_once('=') {
        Some((category, path)) if !category.is_empty() && !path.is_empty() => {
            Ok((category.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected `category=path.geojson`, got `{raw}`")),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let operation = OperationId::generate();
    let log: Arc<FileOperationLog> =
        match FileOperationLog::open(&cli.op_log, operation.clone()).await {
            Ok(log) => Arc::new(log),
            Err(e) => {
                error!(error = %e, path = %cli.op_log.display(), "Cannot open operation log");
                std::process::exit(1);
            }
        };

    if let Err(err) = run(&cli, log.clone()).await {
        error!(error = %err, "Analysis failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "Caused by");
        }
        // The failure must be recorded against the run, and a secondary
        // failure while doing so must not crash us a second time.
        record_failure(log.as_ref(), &err).await;
        std::process::exit(1);
    }
}

async fn record_failure(log: &dyn OperationLog, err: &anyhow::Error) {
    let mut details = serde_json::json!({
        "chain": err.chain().map(|c| c.to_string()).collect::<Vec<_>>(),
    });
    // Batch failures keep the failing worker's full diagnostic in the
    // audit trail, not just the flattened message.
    if let Some(fatal) = err.downcast_ref::<PoolError>() {
        details["area"] = serde_json::Value::from(fatal.area().as_str());
        details["exitCode"] = serde_json::Value::from(fatal.exit_code());
        if let Some(diagnostic) = fatal.diagnostic() {
            details["stack"] = serde_json::Value::from(diagnostic.stack.clone());
            details["details"] = diagnostic
                .details
                .clone()
                .unwrap_or(serde_json::Value::Null);
        }
    }
    if log
        .append(OperationEvent::failure(&err.to_string(), details))
        .await
        .is_err()
    {
        error!("Error saving error");
    }
}

async fn run(cli: &Cli, log: Arc<FileOperationLog>) -> Result<()> {
    let limits = RoutingLimits {
        max_time_secs: cli.max_time,
        max_speed_kmh: cli.max_speed,
        grid_size: cli.grid_size,
    };

    let origins = Arc::new(inputs::load_origins(&cli.origins)?);
    let pois = Arc::new(inputs::load_pois(&cli.pois)?);
    let areas = inputs::load_areas(&cli.areas)?;
    info!(
        areas = areas.len(),
        origins = origins.len(),
        categories = pois.len(),
        "Inputs loaded"
    );

    // Validate each area's search buffer before dispatch; a degenerate
    // buffer fails that area alone, not the batch.
    let mut tasks = Vec::with_capacity(areas.len());
    for area in areas {
        match spatial::search_buffer(&area, &limits) {
            Ok(_) => {
                let inside = spatial::origins_within(&origins, &area);
                info!(area = %area.name, origins = inside.len(), "Area queued");
                tasks.push(AnalysisTask::new(
                    area,
                    origins.clone(),
                    pois.clone(),
                    limits,
                ));
            }
            Err(e) => {
                warn!(area = %area.name, error = %e, "Skipping area with degenerate search buffer");
                let _ = log
                    .append(OperationEvent::failure(
                        &e.to_string(),
                        serde_json::json!({ "adminArea": area.name }),
                    ))
                    .await;
            }
        }
    }

    let mut command = WorkerCommand::new(&cli.worker);
    for arg in &cli.worker_args {
        command = command.arg(arg);
    }
    let mut pool = WorkerPool::new(command).with_log(log.clone());
    if let Some(limit) = cli.concurrency {
        pool = pool.with_limit(limit);
    }
    if let Some(secs) = cli.timeout_secs {
        pool = pool.with_timeout(Duration::from_secs(secs));
    }

    let results = pool.run(tasks).await?;
    let unified = aggregate(results);

    log.append(OperationEvent::storing_results()).await?;

    let store = LocalStore::new(&cli.out_dir);
    let stamp = chrono::Utc::now().timestamp_millis();

    let csv = to_csv(&unified)?;
    store
        .put(&artifact_name("csv", stamp), csv.as_bytes())
        .await
        .context("storing CSV artifact")?;

    let json = serde_json::to_string(&to_json(&unified)?)?;
    store
        .put(&artifact_name("json", stamp), json.as_bytes())
        .await
        .context("storing JSON artifact")?;

    let geojson = serde_json::to_string(&to_geojson(&unified))?;
    store
        .put(&artifact_name("geojson", stamp), geojson.as_bytes())
        .await
        .context("storing GeoJSON artifact")?;

    log.append(OperationEvent::results_stored()).await?;
    log.append(OperationEvent::files_written()).await?;
    log.append(OperationEvent::success()).await?;

    info!(
        rows = unified.row_count(),
        areas = unified.areas.len(),
        "Analysis complete"
    );
    Ok(())
}
