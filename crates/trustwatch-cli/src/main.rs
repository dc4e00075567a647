// crates/trustwatch-cli/src/main.rs
// ============================================================================
// Module: Trust Claim Monitoring CLI Entry Point
// Description: Process entry point wiring the store, queue, adapters, and
//              one of the engine's roles (API, scheduler, or a worker pool).
// Dependencies: clap, tokio, trustwatch-adapters, trustwatch-api,
//               trustwatch-config, trustwatch-core, trustwatch-queue,
//               trustwatch-store-sqlite
// ============================================================================

//! ## Overview
//! The engine has four roles that can run as separate processes or, for a
//! local demo, together in one (`trustwatch all`): the API server, the
//! scheduler, the crawl worker pool, and the evidence worker pool. Every
//! role reads [`trustwatch_config::EngineConfig`] from the environment and
//! is wired against the same [`trustwatch_store_sqlite::SqliteStore`], so a
//! demo run and a production deployment differ only in how many processes
//! split the roles and whether `DEMO_MODE` routes the fetch/mail/PDF
//! adapters to their canned, network-free implementations.

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use clap::Parser;
use clap::Subcommand;
use trustwatch_adapters::DemoFetchAdapter;
use trustwatch_adapters::DemoMailAdapter;
use trustwatch_adapters::DemoPdfParseAdapter;
use trustwatch_adapters::HttpFetchAdapter;
use trustwatch_adapters::HttpPdfParseAdapter;
use trustwatch_adapters::WebhookMailAdapter;
use trustwatch_api::ApiState;
use trustwatch_config::EngineConfig;
use trustwatch_core::Clock;
use trustwatch_core::EvidenceId;
use trustwatch_core::SystemClock;
use trustwatch_core::error::WorkerError;
use trustwatch_core::interfaces::FetchAdapter;
use trustwatch_core::interfaces::JobPayload;
use trustwatch_core::interfaces::JobQueue;
use trustwatch_core::interfaces::MailAdapter;
use trustwatch_core::interfaces::PdfParseAdapter;
use trustwatch_core::interfaces::QueueName;
use trustwatch_core::interfaces::Store;
use trustwatch_queue::CrawlTargetJob;
use trustwatch_queue::CrawlWorker;
use trustwatch_queue::EvidenceWorker;
use trustwatch_queue::ProcessEvidenceJob;
use trustwatch_queue::Scheduler;
use trustwatch_queue::ShutdownSignal;
use trustwatch_queue::spawn_ctrl_c_listener;
use trustwatch_store_sqlite::SqliteStore;
use trustwatch_store_sqlite::SqliteStoreConfig;

/// Trust claim monitoring engine: run one role of the system per invocation.
#[derive(Debug, Parser)]
#[command(name = "trustwatch", about = "Trust claim monitoring engine")]
struct Cli {
    /// Role to run.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serves the control HTTP surface (§4.7, §6).
    Serve {
        /// Address to bind, e.g. `0.0.0.0:8080`.
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: SocketAddr,
    },
    /// Runs the single-leader crawl scheduler loop (§4.2).
    Scheduler,
    /// Runs the crawl worker pool, claiming `crawl_target` jobs (§4.5).
    CrawlWorker,
    /// Runs the evidence worker pool, claiming `process_evidence` jobs (§4.6).
    EvidenceWorker,
    /// Runs every role in one process, for local demos.
    All {
        /// Address to bind the API server on.
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: SocketAddr,
    },
}

/// Process entry point: parses arguments, starts a runtime, and dispatches
/// to the requested role.
fn main() -> ExitCode {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::error!(error = %err, "failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };
    runtime.block_on(run())
}

/// Loads configuration, opens the store, and runs the requested role until
/// it exits or is interrupted.
async fn run() -> ExitCode {
    let cli = Cli::parse();
    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let store = match SqliteStore::open(SqliteStoreConfig::new(config.database_path.clone())) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            tracing::error!(error = %err, "failed to open store");
            return ExitCode::FAILURE;
        }
    };
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let shutdown = ShutdownSignal::new();
    spawn_ctrl_c_listener(shutdown.clone());

    match cli.command {
        Command::Serve { bind } => serve(store, clock, bind).await,
        Command::Scheduler => run_scheduler(store, clock, &config, &shutdown).await,
        Command::CrawlWorker => run_crawl_worker(store, &config, &clock, &shutdown).await,
        Command::EvidenceWorker => run_evidence_worker(store, &config, &clock, &shutdown).await,
        Command::All { bind } => run_all(store, clock, config, bind, shutdown).await,
    }
}

/// Builds the fetch adapter for the configured mode.
fn build_fetch(demo_mode: bool, timeout: StdDuration) -> Result<Arc<dyn FetchAdapter>, String> {
    if demo_mode {
        return Ok(Arc::new(DemoFetchAdapter::new()));
    }
    let config = trustwatch_adapters::fetch::FetchClientConfig { timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX), ..Default::default() };
    let adapter = HttpFetchAdapter::new(config).map_err(|err| err.to_string())?;
    Ok(Arc::new(adapter))
}

/// Builds the PDF parse adapter for the configured mode.
fn build_pdf(demo_mode: bool, timeout: StdDuration) -> Result<Arc<dyn PdfParseAdapter>, String> {
    if demo_mode {
        return Ok(Arc::new(DemoPdfParseAdapter::new()));
    }
    let config = trustwatch_adapters::fetch::FetchClientConfig { timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX), ..Default::default() };
    let adapter = HttpPdfParseAdapter::new(config).map_err(|err| err.to_string())?;
    Ok(Arc::new(adapter))
}

/// Builds the mail adapter for the configured mode.
fn build_mail(demo_mode: bool) -> Result<Arc<dyn MailAdapter>, String> {
    if demo_mode {
        return Ok(Arc::new(DemoMailAdapter::new()));
    }
    let webhook_url = std::env::var("MAIL_WEBHOOK_URL").map_err(|_err| "MAIL_WEBHOOK_URL must be set outside demo mode".to_string())?;
    let auth_token = std::env::var("MAIL_WEBHOOK_TOKEN").ok();
    let adapter = WebhookMailAdapter::new(webhook_url, auth_token).map_err(|err| err.to_string())?;
    Ok(Arc::new(adapter))
}

/// Serves the control HTTP surface until interrupted.
async fn serve(store: Arc<SqliteStore>, clock: Arc<dyn Clock>, bind: SocketAddr) -> ExitCode {
    let queue: Arc<dyn JobQueue> = store.clone();
    let store: Arc<dyn Store> = store;
    let router = trustwatch_api::router(ApiState::new(store, queue, clock));
    let listener = match tokio::net::TcpListener::bind(bind).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, %bind, "failed to bind API listener");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(%bind, "serving control HTTP surface");
    if let Err(err) = axum::serve(listener, router).await {
        tracing::error!(error = %err, "API server exited with an error");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

/// Runs the scheduler tick loop until interrupted.
async fn run_scheduler(store: Arc<SqliteStore>, clock: Arc<dyn Clock>, config: &EngineConfig, shutdown: &ShutdownSignal) -> ExitCode {
    let queue: Arc<dyn JobQueue> = store.clone();
    let store: Arc<dyn Store> = store;
    let scheduler = Scheduler::new(store, queue, clock, config.crawl_schedule, config.scheduler_lock_ttl);
    scheduler.run(shutdown).await;
    ExitCode::SUCCESS
}

/// Runs the crawl worker pool, claiming and processing `crawl_target` jobs
/// until interrupted.
async fn run_crawl_worker(store: Arc<SqliteStore>, config: &EngineConfig, clock: &Arc<dyn Clock>, shutdown: &ShutdownSignal) -> ExitCode {
    let fetch = match build_fetch(config.demo_mode, config.fetch_timeout) {
        Ok(fetch) => fetch,
        Err(err) => {
            tracing::error!(error = %err, "failed to build fetch adapter");
            return ExitCode::FAILURE;
        }
    };
    let mail = match build_mail(config.demo_mode) {
        Ok(mail) => mail,
        Err(err) => {
            tracing::error!(error = %err, "failed to build mail adapter");
            return ExitCode::FAILURE;
        }
    };
    let queue: Arc<dyn JobQueue> = store.clone();
    let worker = CrawlWorker::new(store, queue.clone(), fetch, mail, clock.clone());
    run_claim_loop(queue.as_ref(), QueueName::CrawlTarget, config.crawl_worker_concurrency, clock.as_ref(), shutdown, |payload| {
        let worker = &worker;
        async move {
            let job = CrawlTargetJob::try_from(payload)?;
            worker.process_target(&job).await
        }
    })
    .await;
    ExitCode::SUCCESS
}

/// Runs the evidence worker pool, claiming and processing `process_evidence`
/// jobs until interrupted.
async fn run_evidence_worker(store: Arc<SqliteStore>, config: &EngineConfig, clock: &Arc<dyn Clock>, shutdown: &ShutdownSignal) -> ExitCode {
    let parser = match build_pdf(config.demo_mode, config.pdf_parse_timeout) {
        Ok(parser) => parser,
        Err(err) => {
            tracing::error!(error = %err, "failed to build PDF parse adapter");
            return ExitCode::FAILURE;
        }
    };
    let queue: Arc<dyn JobQueue> = store.clone();
    let worker = EvidenceWorker::new(store, parser, clock.clone());
    run_claim_loop(queue.as_ref(), QueueName::ProcessEvidence, config.evidence_worker_concurrency, clock.as_ref(), shutdown, |payload| {
        let worker = &worker;
        async move {
            let (evidence_id, pdf_url) = match payload {
                JobPayload::ProcessEvidence { evidence_id, pdf_url, .. } => (evidence_id, pdf_url),
                other => return Err(WorkerError::Structural(format!("expected process_evidence payload, got {other:?}"))),
            };
            let job = ProcessEvidenceJob { evidence_id: EvidenceId::new(evidence_id), pdf_url };
            worker.process_evidence(&job).await
        }
    })
    .await;
    ExitCode::SUCCESS
}

/// Runs every role concurrently in one process, for local demos. `DEMO_MODE`
/// should be left at its default (`true`) so no outbound network calls are
/// attempted.
async fn run_all(store: Arc<SqliteStore>, clock: Arc<dyn Clock>, config: EngineConfig, bind: SocketAddr, shutdown: ShutdownSignal) -> ExitCode {
    let api_store = store.clone();
    let api_clock = clock.clone();
    let scheduler_store = store.clone();
    let scheduler_clock = clock.clone();
    let scheduler_shutdown = shutdown.clone();
    let crawl_store = store.clone();
    let crawl_clock = clock.clone();
    let crawl_config = config.clone();
    let crawl_shutdown = shutdown.clone();
    let evidence_store = store.clone();
    let evidence_clock = clock.clone();
    let evidence_config = config.clone();
    let evidence_shutdown = shutdown.clone();

    let (api_result, (), (), ()) = tokio::join!(
        serve(api_store, api_clock, bind),
        async {
            run_scheduler(scheduler_store, scheduler_clock, &config, &scheduler_shutdown).await;
        },
        async {
            run_crawl_worker(crawl_store, &crawl_config, &crawl_clock, &crawl_shutdown).await;
        },
        async {
            run_evidence_worker(evidence_store, &evidence_config, &evidence_clock, &evidence_shutdown).await;
        },
    );
    api_result
}

/// Claims batches of jobs from `queue_name` and runs `process` against each,
/// sleeping briefly between empty batches, until `shutdown` is requested.
async fn run_claim_loop<F, Fut>(queue: &dyn JobQueue, queue_name: QueueName, batch_size: u32, clock: &dyn Clock, shutdown: &ShutdownSignal, process: F)
where
    F: Fn(JobPayload) -> Fut,
    Fut: std::future::Future<Output = Result<(), WorkerError>>,
{
    /// Poll interval when the queue has no eligible jobs.
    const IDLE_POLL_INTERVAL: StdDuration = StdDuration::from_secs(2);

    while !shutdown.is_requested() {
        let now = clock.now();
        let jobs = match queue.claim(queue_name, batch_size, now).await {
            Ok(jobs) => jobs,
            Err(err) => {
                tracing::warn!(error = %err, "failed to claim jobs, retrying after backoff");
                tokio::time::sleep(IDLE_POLL_INTERVAL).await;
                continue;
            }
        };
        if jobs.is_empty() {
            tokio::time::sleep(IDLE_POLL_INTERVAL).await;
            continue;
        }
        for job in jobs {
            let now = clock.now();
            let outcome = process(job.payload.clone()).await;
            let treat_as_success = matches!(&outcome, Ok(()) | Err(WorkerError::RateLimited(_) | WorkerError::Duplicate(_)));
            if treat_as_success {
                if let Err(err) = outcome {
                    tracing::debug!(error = %err, job_id = %job.id, "job dropped without retry");
                }
                if let Err(err) = queue.mark_succeeded(&job.id, now).await {
                    tracing::warn!(error = %err, job_id = %job.id, "failed to mark job succeeded");
                }
            } else if let Err(err) = outcome {
                tracing::warn!(error = %err, job_id = %job.id, "job failed");
                if let Err(mark_err) = queue.mark_failed(&job.id, &err.to_string(), now).await {
                    tracing::warn!(error = %mark_err, job_id = %job.id, "failed to mark job failed");
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, reason = "Test-only assertions are permitted.")]
mod tests {
    use std::time::Duration;

    use clap::Parser;

    use super::Cli;
    use super::Command;
    use super::build_fetch;
    use super::build_mail;
    use super::build_pdf;

    #[test]
    fn parses_every_subcommand() {
        assert!(matches!(Cli::parse_from(["trustwatch", "scheduler"]).command, Command::Scheduler));
        assert!(matches!(Cli::parse_from(["trustwatch", "crawl-worker"]).command, Command::CrawlWorker));
        assert!(matches!(Cli::parse_from(["trustwatch", "evidence-worker"]).command, Command::EvidenceWorker));
        let serve = Cli::parse_from(["trustwatch", "serve", "--bind", "0.0.0.0:9090"]);
        assert!(matches!(serve.command, Command::Serve { bind } if bind.port() == 9090));
    }

    #[test]
    fn demo_mode_adapters_build_without_network_access() {
        assert!(build_fetch(true, Duration::from_secs(1)).is_ok());
        assert!(build_pdf(true, Duration::from_secs(1)).is_ok());
        assert!(build_mail(true).is_ok());
    }

    #[test]
    fn real_mode_mail_adapter_requires_webhook_url() {
        std::env::remove_var("MAIL_WEBHOOK_URL");
        assert!(build_mail(false).is_err());
    }
}
