use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::time::Instant;

use consync_core::config::{self, consync_root};
use consync_core::{Config, OrderNo};
use consync_sync::{pipeline, SyncOrchestrator};

use crate::error::{io_err, DaemonError};
use crate::paths::socket_path;
use crate::protocol::{DaemonRequest, DaemonResponse};

/// Timer period and the batch size used for timer-triggered runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaemonSettings {
    pub interval: Duration,
    pub batch_size: i64,
}

impl DaemonSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.sync.interval(),
            batch_size: i64::from(config.sync.batch_size),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SyncTarget {
    Batch(i64),
    Contract(OrderNo),
}

impl SyncTarget {
    fn label(&self) -> String {
        match self {
            SyncTarget::Batch(size) => format!("batch:{size}"),
            SyncTarget::Contract(order_no) => format!("contract:{order_no}"),
        }
    }
}

struct SyncJob {
    target: SyncTarget,
    source: &'static str,
    respond_to: oneshot::Sender<Result<SyncReport, String>>,
}

/// What a socket `sync` returns and what the timer logs.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub target: String,
    pub source: String,
    /// Human-readable result line.
    pub summary: String,
    pub succeeded: usize,
    pub failed: usize,
    pub duration_ms: u128,
    /// The typed batch summary or contract outcome, serialized.
    pub detail: Value,
}

struct SyncRun {
    summary: String,
    succeeded: usize,
    failed: usize,
    detail: Value,
}

#[derive(Debug, Default)]
struct DaemonStats {
    runs: u64,
    last_sync_at_unix: u64,
    last_summary: Option<String>,
}

/// State shared by socket clients.
#[derive(Clone)]
struct Shared {
    home: PathBuf,
    orchestrator: Arc<SyncOrchestrator>,
    settings: DaemonSettings,
    stats: Arc<RwLock<DaemonStats>>,
    sync_tx: mpsc::Sender<SyncJob>,
    shutdown_tx: broadcast::Sender<()>,
    started_at_unix: u64,
}

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(home: &Path) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf()))
}

/// Load `config.yaml` under `home`, wire the pipeline, and serve.
pub async fn run(home: PathBuf) -> Result<(), DaemonError> {
    let config = config::load_at(&home)?;
    let settings = DaemonSettings::from_config(&config);
    let orchestrator = pipeline::orchestrator_at(&home, &config)?;
    tracing::info!(
        interval_secs = settings.interval.as_secs(),
        batch_size = settings.batch_size,
        "daemon starting",
    );
    serve(home, Arc::new(orchestrator), settings).await
}

/// Run the timer, the sync processor and the socket server until `stop` or
/// ctrl-c.
///
/// Timer and socket syncs go through one queue drained by a single
/// processor, so runs inside this daemon never overlap.
pub async fn serve(
    home: PathBuf,
    orchestrator: Arc<SyncOrchestrator>,
    settings: DaemonSettings,
) -> Result<(), DaemonError> {
    ensure_runtime_dirs(&home)?;

    let stats = Arc::new(RwLock::new(DaemonStats::default()));
    let (sync_tx, sync_rx) = mpsc::channel::<SyncJob>(64);
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let timer_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown.subscribe();
        let sync_tx = sync_tx.clone();
        tokio::spawn(async move {
            let result = timer_task(settings, sync_tx, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let processor_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown.subscribe();
        let orchestrator = Arc::clone(&orchestrator);
        let stats = Arc::clone(&stats);
        tokio::spawn(async move {
            let result = sync_processor_task(orchestrator, stats, sync_rx, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown.subscribe();
        let shared = Shared {
            home: home.clone(),
            orchestrator,
            settings,
            stats,
            sync_tx,
            shutdown_tx: shutdown.clone(),
            started_at_unix: unix_seconds_now(),
        };
        tokio::spawn(async move {
            let result = socket_server_task(shared, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        let mut shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (timer_result, processor_result, socket_result, signal_result) =
        tokio::join!(timer_handle, processor_handle, socket_handle, signal_handle);

    handle_join("timer", timer_result)?;
    handle_join("sync_processor", processor_result)?;
    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    tracing::info!("daemon stopped");
    Ok(())
}

async fn timer_task(
    settings: DaemonSettings,
    sync_tx: mpsc::Sender<SyncJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut interval = tokio::time::interval(settings.interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick fires immediately; skip it so startup does not sync.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = interval.tick() => {
                match enqueue_sync(&sync_tx, SyncTarget::Batch(settings.batch_size), "timer").await {
                    Ok(report) => {
                        tracing::info!(
                            summary = %report.summary,
                            duration_ms = report.duration_ms,
                            "timer-triggered sync completed",
                        );
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "timer-triggered sync failed");
                    }
                }
            }
        }
    }

    Ok(())
}

async fn sync_processor_task(
    orchestrator: Arc<SyncOrchestrator>,
    stats: Arc<RwLock<DaemonStats>>,
    mut sync_rx: mpsc::Receiver<SyncJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_job = sync_rx.recv() => {
                let Some(job) = maybe_job else { break };
                let started = Instant::now();

                let target = job.target.clone();
                let orchestrator = Arc::clone(&orchestrator);
                let joined = tokio::task::spawn_blocking(move || run_target(&orchestrator, &target)).await;

                let outcome = match joined {
                    Ok(run) => {
                        let mut guard = stats.write().await;
                        guard.runs += 1;
                        guard.last_sync_at_unix = unix_seconds_now();
                        guard.last_summary = Some(run.summary.clone());
                        drop(guard);
                        Ok(build_report(&job.target, job.source, run, started.elapsed()))
                    }
                    Err(err) => Err(format!("sync task join error: {err}")),
                };

                let _ = job.respond_to.send(outcome);
            }
        }
    }

    Ok(())
}

async fn socket_server_task(
    shared: Shared,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let socket = socket_path(&shared.home);
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;
    tracing::info!(socket = %socket.display(), "listening");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let shared = shared.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_socket_client(stream, shared).await {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client(stream: UnixStream, shared: Shared) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request: DaemonRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                write_response(
                    &mut writer,
                    &DaemonResponse::error(format!("invalid request JSON: {err}")),
                )
                .await?;
                continue;
            }
        };

        let stop = request.cmd == "stop";
        let response = handle_request(&shared, request).await;
        write_response(&mut writer, &response).await?;
        if stop {
            break;
        }
    }
    Ok(())
}

async fn handle_request(shared: &Shared, request: DaemonRequest) -> DaemonResponse {
    match request.cmd.as_str() {
        "status" => DaemonResponse::ok(build_status_payload(shared).await),
        "sync" => {
            let target = match request.contract.filter(|c| !c.is_empty()) {
                Some(contract) => SyncTarget::Contract(OrderNo::from(contract)),
                None => SyncTarget::Batch(request.batch_size.unwrap_or(shared.settings.batch_size)),
            };
            match enqueue_sync(&shared.sync_tx, target, "socket").await {
                Ok(report) => DaemonResponse::ok(json!(report)),
                Err(err) => DaemonResponse::error(err.to_string()),
            }
        }
        "map_town" => {
            let from = request.from.unwrap_or_default();
            let to = request.to.unwrap_or_default();
            if from.is_empty() || to.is_empty() {
                return DaemonResponse::error("map_town requires non-empty 'from' and 'to'");
            }
            shared.orchestrator.converter().add_override(from.clone(), to.clone());
            tracing::info!(from = %from, to = %to, "town override registered");
            DaemonResponse::ok(json!({
                "from": from,
                "to": to,
                "overrides": shared.orchestrator.converter().overrides().len(),
            }))
        }
        "stop" => {
            let _ = shared.shutdown_tx.send(());
            DaemonResponse::ok(json!({ "stopping": true }))
        }
        other => DaemonResponse::error(format!("unknown command '{other}'")),
    }
}

async fn build_status_payload(shared: &Shared) -> Value {
    let (runs, last_sync_at_unix, last_summary) = {
        let stats = shared.stats.read().await;
        (stats.runs, stats.last_sync_at_unix, stats.last_summary.clone())
    };

    json!({
        "running": true,
        "started_at_unix": shared.started_at_unix,
        "last_sync_at_unix": last_sync_at_unix,
        "last_summary": last_summary,
        "runs": runs,
        "interval_secs": shared.settings.interval.as_secs(),
        "batch_size": shared.settings.batch_size,
        "town_overrides": shared.orchestrator.converter().overrides().len(),
        "socket": socket_path(&shared.home).display().to_string(),
    })
}

async fn enqueue_sync(
    sync_tx: &mpsc::Sender<SyncJob>,
    target: SyncTarget,
    source: &'static str,
) -> Result<SyncReport, DaemonError> {
    let (tx, rx) = oneshot::channel();
    sync_tx
        .send(SyncJob {
            target,
            source,
            respond_to: tx,
        })
        .await
        .map_err(|_| DaemonError::ChannelClosed("sync queue"))?;
    let outcome = rx
        .await
        .map_err(|_| DaemonError::ChannelClosed("sync response"))?;
    outcome.map_err(DaemonError::Protocol)
}

fn run_target(orchestrator: &SyncOrchestrator, target: &SyncTarget) -> SyncRun {
    match target {
        SyncTarget::Batch(size) => {
            let summary = orchestrator.sync(*size);
            SyncRun {
                summary: summary.to_string(),
                succeeded: summary.succeeded(),
                failed: summary.failed(),
                detail: serde_json::to_value(&summary).unwrap_or(Value::Null),
            }
        }
        SyncTarget::Contract(order_no) => {
            let outcome = orchestrator.sync_contract(order_no);
            let ok = outcome.is_success();
            SyncRun {
                summary: outcome.to_string(),
                succeeded: usize::from(ok),
                failed: usize::from(!ok),
                detail: serde_json::to_value(&outcome).unwrap_or(Value::Null),
            }
        }
    }
}

fn build_report(
    target: &SyncTarget,
    source: &'static str,
    run: SyncRun,
    duration: Duration,
) -> SyncReport {
    SyncReport {
        target: target.label(),
        source: source.to_string(),
        summary: run.summary,
        succeeded: run.succeeded,
        failed: run.failed,
        duration_ms: duration.as_millis(),
        detail: run.detail,
    }
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "daemon socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

fn ensure_runtime_dirs(home: &Path) -> Result<(), DaemonError> {
    let root = consync_root(home);
    if !root.exists() {
        fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;
    }
    Ok(())
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &DaemonResponse,
) -> Result<(), DaemonError> {
    let payload = serde_json::to_string(response)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Install the global `tracing` subscriber on stderr (`RUST_LOG`, default `info`).
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}
