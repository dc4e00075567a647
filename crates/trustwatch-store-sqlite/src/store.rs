// crates/trustwatch-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Store
// Description: Durable Store + JobQueue backed by SQLite WAL, writes routed
//              through a single dedicated writer thread.
// Purpose: Persist the seven entities and the job log without contending on
//          SQLite's single-writer lock from multiple async tasks.
// Dependencies: trustwatch-core, rusqlite, serde_json, thiserror, time, tokio
// ============================================================================

//! ## Overview
//! Every mutation is a boxed closure sent over a bounded channel to one
//! writer thread holding the sole read-write connection; reads use a
//! separate connection guarded by a mutex. Timestamps are stored as RFC 3339
//! text; enum and struct columns are stored as their `serde_json`
//! representation so the column format tracks the domain model without a
//! hand-maintained string mapping per variant.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::sync::mpsc::SyncSender;
use std::thread;
use std::time::Instant;

use async_trait::async_trait;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use trustwatch_core::identifiers::ClaimId;
use trustwatch_core::identifiers::ClaimVersionId;
use trustwatch_core::identifiers::CompanyId;
use trustwatch_core::identifiers::CrawlRunId;
use trustwatch_core::identifiers::EventId;
use trustwatch_core::identifiers::EvidenceId;
use trustwatch_core::identifiers::TargetId;
use trustwatch_core::identifiers::UserId;
use trustwatch_core::interfaces::EnqueueOutcome;
use trustwatch_core::interfaces::Job;
use trustwatch_core::interfaces::JobPayload;
use trustwatch_core::interfaces::JobQueue;
use trustwatch_core::interfaces::JobStatus;
use trustwatch_core::interfaces::QueueError;
use trustwatch_core::interfaces::QueueName;
use trustwatch_core::interfaces::Store;
use trustwatch_core::interfaces::StoreError;
use trustwatch_core::interfaces::StoreStats;
use trustwatch_core::model::Category;
use trustwatch_core::model::ChangeEvent;
use trustwatch_core::model::Claim;
use trustwatch_core::model::ClaimType;
use trustwatch_core::model::ClaimVersion;
use trustwatch_core::model::Company;
use trustwatch_core::model::CrawlRun;
use trustwatch_core::model::CrawlRunDelta;
use trustwatch_core::model::CrawlTarget;
use trustwatch_core::model::Evidence;
use trustwatch_core::model::EvidenceFields;
use trustwatch_core::model::EvidenceStatus;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Default writer channel capacity.
const DEFAULT_WRITER_QUEUE_CAPACITY: usize = 256;
/// Retained terminal job rows kept beyond the pruning cutoff.
const COMPLETED_JOB_RETENTION: usize = 1_000;
/// Retained failed job rows kept beyond the pruning cutoff.
const FAILED_JOB_RETENTION: usize = 500;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy, useful for in-memory tests).
    Delete,
}

impl SqliteStoreMode {
    const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// Configuration for [`SqliteStore::open`].
#[derive(Debug, Clone)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    pub journal_mode: SqliteStoreMode,
    /// Writer channel capacity; `enqueue`/mutation calls block when full.
    pub writer_queue_capacity: usize,
}

impl SqliteStoreConfig {
    /// Builds a config pointing at `path` with every other field defaulted.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::Wal,
            writer_queue_capacity: DEFAULT_WRITER_QUEUE_CAPACITY,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors internal to the `SQLite` store, converted to [`StoreError`] /
/// [`QueueError`] at the trait boundary.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// The underlying `SQLite` driver returned an error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A column's `serde_json` payload failed to (de)serialize.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// A column's RFC 3339 timestamp failed to parse or format.
    #[error("timestamp error: {0}")]
    Timestamp(String),
    /// The requested row does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The writer thread's channel is closed (the thread panicked or the
    /// store was dropped mid-flight).
    #[error("writer channel closed")]
    WriterClosed,
    /// The configured path has no usable parent directory.
    #[error("invalid store path: {0}")]
    InvalidPath(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::NotFound(what) => Self::NotFound(what),
            other => Self::Backend(other.to_string()),
        }
    }
}

impl From<SqliteStoreError> for QueueError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::NotFound(what) => Self::NotFound(what),
            other => Self::Backend(other.to_string()),
        }
    }
}

fn join_error_to_store(error: tokio::task::JoinError) -> StoreError {
    StoreError::Backend(format!("writer task panicked: {error}"))
}

fn join_error_to_queue(error: tokio::task::JoinError) -> QueueError {
    QueueError::Backend(format!("writer task panicked: {error}"))
}

// ============================================================================
// SECTION: Serialization helpers
// ============================================================================

fn to_json<T: Serialize>(value: &T) -> Result<String, SqliteStoreError> {
    serde_json::to_string(value).map_err(SqliteStoreError::Serialization)
}

fn from_json<T: DeserializeOwned>(raw: &str) -> Result<T, SqliteStoreError> {
    serde_json::from_str(raw).map_err(SqliteStoreError::Serialization)
}

fn to_rfc3339(at: OffsetDateTime) -> Result<String, SqliteStoreError> {
    at.format(&Rfc3339).map_err(|err| SqliteStoreError::Timestamp(err.to_string()))
}

fn parse_rfc3339(raw: &str) -> Result<OffsetDateTime, SqliteStoreError> {
    OffsetDateTime::parse(raw, &Rfc3339).map_err(|err| SqliteStoreError::Timestamp(err.to_string()))
}

fn opt_rfc3339(at: Option<OffsetDateTime>) -> Result<Option<String>, SqliteStoreError> {
    at.map(to_rfc3339).transpose()
}

fn parse_opt_rfc3339(raw: Option<String>) -> Result<Option<OffsetDateTime>, SqliteStoreError> {
    raw.map(|value| parse_rfc3339(&value)).transpose()
}

// ============================================================================
// SECTION: Writer gateway
// ============================================================================

type BoxedWriteJob = Box<dyn FnOnce(&Connection) + Send>;

/// Write-path perf counters exposed via [`Store::stats`].
#[derive(Default)]
struct WriterStats {
    ops_submitted: AtomicU64,
    total_latency_us: AtomicU64,
}

struct SqliteWriteGateway {
    sender: SyncSender<BoxedWriteJob>,
    stats: Arc<WriterStats>,
}

impl SqliteWriteGateway {
    /// Runs `op` on the writer thread's sole connection and returns its
    /// result. `op` may return any `T`; the result travels back over a
    /// call-specific reply channel captured by the boxed closure.
    fn submit<T: Send + 'static>(
        &self,
        op: impl FnOnce(&Connection) -> Result<T, SqliteStoreError> + Send + 'static,
    ) -> Result<T, SqliteStoreError> {
        let started = Instant::now();
        let (reply_tx, reply_rx) = mpsc::channel::<Result<T, SqliteStoreError>>();
        let job: BoxedWriteJob = Box::new(move |conn| {
            let _ignored_disconnect = reply_tx.send(op(conn));
        });
        self.sender.send(job).map_err(|_err| SqliteStoreError::WriterClosed)?;
        let result = reply_rx.recv().map_err(|_err| SqliteStoreError::WriterClosed)?;
        self.stats.ops_submitted.fetch_add(1, Ordering::Relaxed);
        self.stats
            .total_latency_us
            .fetch_add(u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX), Ordering::Relaxed);
        result
    }
}

fn spawn_writer(connection: Connection, queue_capacity: usize) -> (SyncSender<BoxedWriteJob>, Arc<WriterStats>) {
    let (sender, receiver) = mpsc::sync_channel::<BoxedWriteJob>(queue_capacity);
    thread::spawn(move || {
        while let Ok(job) = receiver.recv() {
            job(&connection);
        }
    });
    (sender, Arc::new(WriterStats::default()))
}

// ============================================================================
// SECTION: Schema
// ============================================================================

fn apply_pragmas(connection: &Connection, config: &SqliteStoreConfig) -> Result<(), SqliteStoreError> {
    connection.busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))?;
    connection.pragma_update(None, "journal_mode", config.journal_mode.pragma_value())?;
    connection.pragma_update(None, "foreign_keys", "ON")?;
    Ok(())
}

fn initialize_schema(connection: &Connection) -> Result<(), SqliteStoreError> {
    connection.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_meta (version INTEGER NOT NULL);

        CREATE TABLE IF NOT EXISTS companies (
            id TEXT PRIMARY KEY,
            owner_user_id TEXT NOT NULL,
            display_name TEXT NOT NULL,
            domain TEXT NOT NULL,
            categories_json TEXT NOT NULL,
            risk_score INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            last_crawled_at TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_companies_owner ON companies(owner_user_id);

        CREATE TABLE IF NOT EXISTS crawl_targets (
            id TEXT PRIMARY KEY,
            company_id TEXT NOT NULL,
            url TEXT NOT NULL,
            kind TEXT NOT NULL,
            last_observed_digest TEXT,
            last_crawled_at TEXT,
            UNIQUE(company_id, url)
        );
        CREATE INDEX IF NOT EXISTS idx_targets_company ON crawl_targets(company_id);

        CREATE TABLE IF NOT EXISTS claims (
            id TEXT PRIMARY KEY,
            company_id TEXT NOT NULL,
            claim_type TEXT NOT NULL,
            normalized_key TEXT NOT NULL,
            status TEXT NOT NULL,
            first_seen_at TEXT NOT NULL,
            last_seen_at TEXT NOT NULL,
            current_snippet TEXT NOT NULL,
            current_source_url TEXT NOT NULL,
            confidence REAL NOT NULL,
            UNIQUE(company_id, claim_type, normalized_key)
        );
        CREATE INDEX IF NOT EXISTS idx_claims_company_source ON claims(company_id, current_source_url);

        CREATE TABLE IF NOT EXISTS claim_versions (
            id TEXT PRIMARY KEY,
            claim_id TEXT NOT NULL,
            company_id TEXT NOT NULL,
            text_snippet TEXT NOT NULL,
            source_url TEXT NOT NULL,
            content_digest TEXT NOT NULL,
            seen_at TEXT NOT NULL,
            polarity TEXT NOT NULL,
            metadata_json TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_claim_versions_claim ON claim_versions(claim_id, seen_at DESC);

        CREATE TABLE IF NOT EXISTS change_events (
            id TEXT PRIMARY KEY,
            company_id TEXT NOT NULL,
            claim_type TEXT NOT NULL,
            normalized_key TEXT NOT NULL,
            event_type TEXT NOT NULL,
            severity TEXT NOT NULL,
            old_snippet TEXT,
            new_snippet TEXT,
            source_url TEXT NOT NULL,
            detected_at TEXT NOT NULL,
            acknowledged INTEGER NOT NULL,
            emailed_at TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_events_company_emailed ON change_events(company_id, severity, emailed_at);

        CREATE TABLE IF NOT EXISTS crawl_runs (
            id TEXT PRIMARY KEY,
            company_id TEXT,
            started_at TEXT NOT NULL,
            finished_at TEXT,
            pages_crawled INTEGER NOT NULL,
            claims_touched INTEGER NOT NULL,
            events_emitted INTEGER NOT NULL,
            errors_json TEXT NOT NULL,
            status TEXT NOT NULL,
            pending_targets INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS evidence (
            id TEXT PRIMARY KEY,
            company_id TEXT NOT NULL,
            presumed_claim_type TEXT NOT NULL,
            pdf_url TEXT NOT NULL,
            source_page_url TEXT,
            context_snippet TEXT,
            status TEXT NOT NULL,
            error TEXT,
            fields_json TEXT,
            discovered_at TEXT NOT NULL,
            processed_at TEXT,
            UNIQUE(company_id, pdf_url)
        );

        CREATE TABLE IF NOT EXISTS jobs (
            id TEXT PRIMARY KEY,
            idempotency_key TEXT NOT NULL,
            queue TEXT NOT NULL,
            payload_json TEXT NOT NULL,
            status TEXT NOT NULL,
            attempts INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            run_at TEXT NOT NULL,
            last_error TEXT
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_jobs_idem_active
            ON jobs(idempotency_key)
            WHERE status IN ('pending', 'active', 'delayed');
        CREATE INDEX IF NOT EXISTS idx_jobs_queue_status_run_at ON jobs(queue, status, run_at);

        CREATE TABLE IF NOT EXISTS scheduler_locks (
            name TEXT PRIMARY KEY,
            holder TEXT NOT NULL,
            expires_at TEXT NOT NULL
        );
        ",
    )?;
    let version: Option<i64> = connection
        .query_row("SELECT version FROM schema_meta LIMIT 1", [], |row| row.get(0))
        .optional()?;
    if version.is_none() {
        connection.execute("INSERT INTO schema_meta (version) VALUES (?1)", params![SCHEMA_VERSION])?;
    }
    Ok(())
}

fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    if let Some(parent) = config.path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .map_err(|err| SqliteStoreError::InvalidPath(format!("{}: {err}", parent.display())))?;
        }
    }
    let connection = Connection::open(&config.path)?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

fn open_read_connection(path: &Path, config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let connection = Connection::open(path)?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed implementation of [`Store`] and [`JobQueue`].
pub struct SqliteStore {
    read: Arc<Mutex<Connection>>,
    write: Arc<SqliteWriteGateway>,
}

impl SqliteStore {
    /// Opens (creating if necessary) the database at `config.path` and
    /// starts the writer thread.
    ///
    /// # Errors
    /// Returns [`SqliteStoreError`] if the file cannot be opened or the
    /// schema cannot be initialized.
    pub fn open(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        let write_connection = open_connection(&config)?;
        initialize_schema(&write_connection)?;
        let read_connection = open_read_connection(&config.path, &config)?;
        let (sender, stats) = spawn_writer(write_connection, config.writer_queue_capacity);
        Ok(Self {
            read: Arc::new(Mutex::new(read_connection)),
            write: Arc::new(SqliteWriteGateway { sender, stats }),
        })
    }

    fn with_read<T: Send + 'static>(
        &self,
        op: impl FnOnce(&Connection) -> Result<T, SqliteStoreError> + Send + 'static,
    ) -> impl std::future::Future<Output = Result<T, SqliteStoreError>> + Send + 'static {
        let read = Arc::clone(&self.read);
        async move {
            tokio::task::spawn_blocking(move || {
                let guard = read.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                op(&guard)
            })
            .await
            .map_err(|err| SqliteStoreError::Timestamp(format!("read task panicked: {err}")))?
        }
    }

    fn with_write<T: Send + 'static>(
        &self,
        op: impl FnOnce(&Connection) -> Result<T, SqliteStoreError> + Send + 'static,
    ) -> impl std::future::Future<Output = Result<T, SqliteStoreError>> + Send + 'static {
        let write = Arc::clone(&self.write);
        async move {
            tokio::task::spawn_blocking(move || write.submit(op))
                .await
                .unwrap_or(Err(SqliteStoreError::WriterClosed))
        }
    }
}

// ---------------------------------------------------------------------------
// Row <-> domain mapping
// ---------------------------------------------------------------------------

fn row_to_company(row: &rusqlite::Row<'_>) -> Result<Company, SqliteStoreError> {
    let categories: BTreeSet<Category> = from_json(&row.get::<_, String>(4)?)?;
    Ok(Company {
        id: CompanyId::from(row.get::<_, String>(0)?),
        owner_user_id: UserId::from(row.get::<_, String>(1)?),
        display_name: row.get(2)?,
        domain: row.get(3)?,
        categories,
        risk_score: u8::try_from(row.get::<_, i64>(5)?).unwrap_or(100),
        created_at: parse_rfc3339(&row.get::<_, String>(6)?)?,
        last_crawled_at: parse_opt_rfc3339(row.get(7)?)?,
    })
}

const COMPANY_COLUMNS: &str =
    "id, owner_user_id, display_name, domain, categories_json, risk_score, created_at, last_crawled_at";

fn row_to_target(row: &rusqlite::Row<'_>) -> Result<CrawlTarget, SqliteStoreError> {
    Ok(CrawlTarget {
        id: TargetId::from(row.get::<_, String>(0)?),
        company_id: CompanyId::from(row.get::<_, String>(1)?),
        url: row.get(2)?,
        kind: from_json(&row.get::<_, String>(3)?)?,
        last_observed_digest: row.get(4)?,
        last_crawled_at: parse_opt_rfc3339(row.get(5)?)?,
    })
}

const TARGET_COLUMNS: &str = "id, company_id, url, kind, last_observed_digest, last_crawled_at";

fn row_to_claim(row: &rusqlite::Row<'_>) -> Result<Claim, SqliteStoreError> {
    Ok(Claim {
        id: ClaimId::from(row.get::<_, String>(0)?),
        company_id: CompanyId::from(row.get::<_, String>(1)?),
        claim_type: from_json(&row.get::<_, String>(2)?)?,
        normalized_key: row.get(3)?,
        status: from_json(&row.get::<_, String>(4)?)?,
        first_seen_at: parse_rfc3339(&row.get::<_, String>(5)?)?,
        last_seen_at: parse_rfc3339(&row.get::<_, String>(6)?)?,
        current_snippet: row.get(7)?,
        current_source_url: row.get(8)?,
        confidence: row.get(9)?,
    })
}

const CLAIM_COLUMNS: &str = "id, company_id, claim_type, normalized_key, status, first_seen_at, last_seen_at, \
     current_snippet, current_source_url, confidence";

fn row_to_claim_version(row: &rusqlite::Row<'_>) -> Result<ClaimVersion, SqliteStoreError> {
    Ok(ClaimVersion {
        id: ClaimVersionId::from(row.get::<_, String>(0)?),
        claim_id: ClaimId::from(row.get::<_, String>(1)?),
        company_id: CompanyId::from(row.get::<_, String>(2)?),
        text_snippet: row.get(3)?,
        source_url: row.get(4)?,
        content_digest: row.get(5)?,
        seen_at: parse_rfc3339(&row.get::<_, String>(6)?)?,
        polarity: from_json(&row.get::<_, String>(7)?)?,
        metadata: from_json(&row.get::<_, String>(8)?)?,
    })
}

const CLAIM_VERSION_COLUMNS: &str =
    "id, claim_id, company_id, text_snippet, source_url, content_digest, seen_at, polarity, metadata_json";

fn row_to_event(row: &rusqlite::Row<'_>) -> Result<ChangeEvent, SqliteStoreError> {
    Ok(ChangeEvent {
        id: EventId::from(row.get::<_, String>(0)?),
        company_id: CompanyId::from(row.get::<_, String>(1)?),
        claim_type: from_json(&row.get::<_, String>(2)?)?,
        normalized_key: row.get(3)?,
        event_type: from_json(&row.get::<_, String>(4)?)?,
        severity: from_json(&row.get::<_, String>(5)?)?,
        old_snippet: row.get(6)?,
        new_snippet: row.get(7)?,
        source_url: row.get(8)?,
        detected_at: parse_rfc3339(&row.get::<_, String>(9)?)?,
        acknowledged: row.get::<_, i64>(10)? != 0,
        emailed_at: parse_opt_rfc3339(row.get(11)?)?,
    })
}

const EVENT_COLUMNS: &str = "id, company_id, claim_type, normalized_key, event_type, severity, old_snippet, \
     new_snippet, source_url, detected_at, acknowledged, emailed_at";

fn row_to_crawl_run(row: &rusqlite::Row<'_>) -> Result<CrawlRun, SqliteStoreError> {
    Ok(CrawlRun {
        id: CrawlRunId::from(row.get::<_, String>(0)?),
        company_id: row.get::<_, Option<String>>(1)?.map(CompanyId::from),
        started_at: parse_rfc3339(&row.get::<_, String>(2)?)?,
        finished_at: parse_opt_rfc3339(row.get(3)?)?,
        pages_crawled: u32::try_from(row.get::<_, i64>(4)?).unwrap_or(u32::MAX),
        claims_touched: u32::try_from(row.get::<_, i64>(5)?).unwrap_or(u32::MAX),
        events_emitted: u32::try_from(row.get::<_, i64>(6)?).unwrap_or(u32::MAX),
        errors: from_json(&row.get::<_, String>(7)?)?,
        status: from_json(&row.get::<_, String>(8)?)?,
        pending_targets: u32::try_from(row.get::<_, i64>(9)?).unwrap_or(u32::MAX),
    })
}

const CRAWL_RUN_COLUMNS: &str = "id, company_id, started_at, finished_at, pages_crawled, claims_touched, \
     events_emitted, errors_json, status, pending_targets";

fn row_to_evidence(row: &rusqlite::Row<'_>) -> Result<Evidence, SqliteStoreError> {
    let fields_raw: Option<String> = row.get(8)?;
    let fields: Option<EvidenceFields> = fields_raw.map(|raw| from_json(&raw)).transpose()?;
    Ok(Evidence {
        id: EvidenceId::from(row.get::<_, String>(0)?),
        company_id: CompanyId::from(row.get::<_, String>(1)?),
        presumed_claim_type: from_json(&row.get::<_, String>(2)?)?,
        pdf_url: row.get(3)?,
        source_page_url: row.get(4)?,
        context_snippet: row.get(5)?,
        status: from_json(&row.get::<_, String>(6)?)?,
        error: row.get(7)?,
        fields,
        discovered_at: parse_rfc3339(&row.get::<_, String>(9)?)?,
        processed_at: parse_opt_rfc3339(row.get(10)?)?,
    })
}

const EVIDENCE_COLUMNS: &str = "id, company_id, presumed_claim_type, pdf_url, source_page_url, context_snippet, \
     status, error, fields_json, discovered_at, processed_at";

fn row_to_job(row: &rusqlite::Row<'_>) -> Result<Job, SqliteStoreError> {
    let queue: QueueName = from_json(&row.get::<_, String>(2)?)?;
    let payload_raw: String = row.get(3)?;
    let payload: JobPayload = from_json(&payload_raw)?;
    debug_assert_eq!(queue, payload.queue());
    Ok(Job {
        id: row.get(0)?,
        idempotency_key: row.get(1)?,
        payload,
        status: from_json(&row.get::<_, String>(4)?)?,
        attempts: u32::try_from(row.get::<_, i64>(5)?).unwrap_or(u32::MAX),
        created_at: parse_rfc3339(&row.get::<_, String>(6)?)?,
        run_at: parse_rfc3339(&row.get::<_, String>(7)?)?,
        last_error: row.get(8)?,
    })
}

const JOB_COLUMNS: &str = "id, idempotency_key, queue, payload_json, status, attempts, created_at, run_at, last_error";

#[async_trait]
impl Store for SqliteStore {
    async fn create_company(&self, company: Company) -> Result<(), StoreError> {
        self.with_write(move |conn| {
            conn.execute(
                &format!("INSERT INTO companies ({COMPANY_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
                params![
                    company.id.as_str(),
                    company.owner_user_id.as_str(),
                    company.display_name,
                    company.domain,
                    to_json(&company.categories)?,
                    i64::from(company.risk_score),
                    to_rfc3339(company.created_at)?,
                    opt_rfc3339(company.last_crawled_at)?,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(StoreError::from)
    }

    async fn get_company(&self, id: &CompanyId) -> Result<Company, StoreError> {
        let id = id.clone();
        self.with_read(move |conn| {
            conn.query_row_and_then(
                &format!("SELECT {COMPANY_COLUMNS} FROM companies WHERE id = ?1"),
                params![id.as_str()],
                row_to_company,
            )
            .optional()?
            .ok_or_else(|| SqliteStoreError::NotFound(format!("company {id}")))
        })
        .await
        .map_err(StoreError::from)
    }

    async fn list_companies_by_user(&self, owner: &UserId) -> Result<Vec<Company>, StoreError> {
        let owner = owner.clone();
        self.with_read(move |conn| {
            let mut statement = conn.prepare(&format!(
                "SELECT {COMPANY_COLUMNS} FROM companies WHERE owner_user_id = ?1 ORDER BY created_at"
            ))?;
            let rows = statement.query_and_then(params![owner.as_str()], row_to_company)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(SqliteStoreError::from)?.into_iter().map(Ok).collect()
        })
        .await
        .map_err(StoreError::from)
    }

    async fn list_all_companies(&self) -> Result<Vec<Company>, StoreError> {
        self.with_read(move |conn| {
            let mut statement = conn.prepare(&format!("SELECT {COMPANY_COLUMNS} FROM companies ORDER BY created_at"))?;
            let rows = statement.query_and_then([], row_to_company)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(StoreError::from)
    }

    async fn delete_company(&self, id: &CompanyId) -> Result<(), StoreError> {
        let id = id.clone();
        self.with_write(move |conn| {
            conn.execute("DELETE FROM crawl_targets WHERE company_id = ?1", params![id.as_str()])?;
            conn.execute("DELETE FROM companies WHERE id = ?1", params![id.as_str()])?;
            Ok(())
        })
        .await
        .map_err(StoreError::from)
    }

    async fn apply_risk_delta(&self, id: &CompanyId, delta: u8) -> Result<(), StoreError> {
        let id = id.clone();
        self.with_write(move |conn| {
            conn.execute(
                "UPDATE companies SET risk_score = MIN(100, risk_score + ?2) WHERE id = ?1",
                params![id.as_str(), i64::from(delta)],
            )?;
            Ok(())
        })
        .await
        .map_err(StoreError::from)
    }

    async fn touch_company_crawled(&self, id: &CompanyId, at: OffsetDateTime) -> Result<(), StoreError> {
        let id = id.clone();
        self.with_write(move |conn| {
            conn.execute(
                "UPDATE companies SET last_crawled_at = ?2 WHERE id = ?1",
                params![id.as_str(), to_rfc3339(at)?],
            )?;
            Ok(())
        })
        .await
        .map_err(StoreError::from)
    }

    async fn create_target(&self, target: CrawlTarget) -> Result<(), StoreError> {
        self.with_write(move |conn| {
            conn.execute(
                &format!("INSERT INTO crawl_targets ({TARGET_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
                params![
                    target.id.as_str(),
                    target.company_id.as_str(),
                    target.url,
                    to_json(&target.kind)?,
                    target.last_observed_digest,
                    opt_rfc3339(target.last_crawled_at)?,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(StoreError::from)
    }

    async fn list_targets_by_company(&self, company_id: &CompanyId) -> Result<Vec<CrawlTarget>, StoreError> {
        let company_id = company_id.clone();
        self.with_read(move |conn| {
            let mut statement =
                conn.prepare(&format!("SELECT {TARGET_COLUMNS} FROM crawl_targets WHERE company_id = ?1"))?;
            let rows = statement.query_and_then(params![company_id.as_str()], row_to_target)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(StoreError::from)
    }

    async fn get_target(&self, id: &TargetId) -> Result<CrawlTarget, StoreError> {
        let id = id.clone();
        self.with_read(move |conn| {
            conn.query_row_and_then(
                &format!("SELECT {TARGET_COLUMNS} FROM crawl_targets WHERE id = ?1"),
                params![id.as_str()],
                row_to_target,
            )
            .optional()?
            .ok_or_else(|| SqliteStoreError::NotFound(format!("target {id}")))
        })
        .await
        .map_err(StoreError::from)
    }

    async fn update_target_digest(&self, id: &TargetId, digest: &str, at: OffsetDateTime) -> Result<(), StoreError> {
        let id = id.clone();
        let digest = digest.to_string();
        self.with_write(move |conn| {
            conn.execute(
                "UPDATE crawl_targets SET last_observed_digest = ?2, last_crawled_at = ?3 WHERE id = ?1",
                params![id.as_str(), digest, to_rfc3339(at)?],
            )?;
            Ok(())
        })
        .await
        .map_err(StoreError::from)
    }

    async fn find_claim(
        &self,
        company_id: &CompanyId,
        claim_type: ClaimType,
        normalized_key: &str,
    ) -> Result<Option<Claim>, StoreError> {
        let company_id = company_id.clone();
        let normalized_key = normalized_key.to_string();
        self.with_read(move |conn| {
            conn.query_row_and_then(
                &format!(
                    "SELECT {CLAIM_COLUMNS} FROM claims WHERE company_id = ?1 AND claim_type = ?2 AND normalized_key = ?3"
                ),
                params![company_id.as_str(), to_json(&claim_type)?, normalized_key],
                row_to_claim,
            )
            .optional()
            .map_err(SqliteStoreError::from)
        })
        .await
        .map_err(StoreError::from)
    }

    async fn insert_claim(&self, claim: Claim) -> Result<(), StoreError> {
        self.with_write(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO claims ({CLAIM_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
                ),
                params![
                    claim.id.as_str(),
                    claim.company_id.as_str(),
                    to_json(&claim.claim_type)?,
                    claim.normalized_key,
                    to_json(&claim.status)?,
                    to_rfc3339(claim.first_seen_at)?,
                    to_rfc3339(claim.last_seen_at)?,
                    claim.current_snippet,
                    claim.current_source_url,
                    claim.confidence,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(StoreError::from)
    }

    async fn update_claim(&self, claim: Claim) -> Result<(), StoreError> {
        self.with_write(move |conn| {
            conn.execute(
                "UPDATE claims SET status = ?2, last_seen_at = ?3, current_snippet = ?4, \
                 current_source_url = ?5, confidence = ?6 WHERE id = ?1",
                params![
                    claim.id.as_str(),
                    to_json(&claim.status)?,
                    to_rfc3339(claim.last_seen_at)?,
                    claim.current_snippet,
                    claim.current_source_url,
                    claim.confidence,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(StoreError::from)
    }

    async fn list_active_claims_by_source(
        &self,
        company_id: &CompanyId,
        source_url: &str,
    ) -> Result<Vec<Claim>, StoreError> {
        let company_id = company_id.clone();
        let source_url = source_url.to_string();
        self.with_read(move |conn| {
            let mut statement = conn.prepare(&format!(
                "SELECT {CLAIM_COLUMNS} FROM claims WHERE company_id = ?1 AND current_source_url = ?2 \
                 AND status = ?3"
            ))?;
            let rows = statement.query_and_then(
                params![company_id.as_str(), source_url, to_json(&trustwatch_core::model::ClaimStatus::Active)?],
                row_to_claim,
            )?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(StoreError::from)
    }

    async fn insert_claim_version(&self, version: ClaimVersion) -> Result<(), StoreError> {
        self.with_write(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO claim_versions ({CLAIM_VERSION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
                ),
                params![
                    version.id.as_str(),
                    version.claim_id.as_str(),
                    version.company_id.as_str(),
                    version.text_snippet,
                    version.source_url,
                    version.content_digest,
                    to_rfc3339(version.seen_at)?,
                    to_json(&version.polarity)?,
                    to_json(&version.metadata)?,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(StoreError::from)
    }

    async fn latest_claim_version(&self, claim_id: &ClaimId) -> Result<Option<ClaimVersion>, StoreError> {
        let claim_id = claim_id.clone();
        self.with_read(move |conn| {
            conn.query_row_and_then(
                &format!(
                    "SELECT {CLAIM_VERSION_COLUMNS} FROM claim_versions WHERE claim_id = ?1 \
                     ORDER BY seen_at DESC LIMIT 1"
                ),
                params![claim_id.as_str()],
                row_to_claim_version,
            )
            .optional()
            .map_err(SqliteStoreError::from)
        })
        .await
        .map_err(StoreError::from)
    }

    async fn insert_event(&self, event: ChangeEvent) -> Result<(), StoreError> {
        self.with_write(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO change_events ({EVENT_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
                ),
                params![
                    event.id.as_str(),
                    event.company_id.as_str(),
                    to_json(&event.claim_type)?,
                    event.normalized_key,
                    to_json(&event.event_type)?,
                    to_json(&event.severity)?,
                    event.old_snippet,
                    event.new_snippet,
                    event.source_url,
                    to_rfc3339(event.detected_at)?,
                    i64::from(event.acknowledged),
                    opt_rfc3339(event.emailed_at)?,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(StoreError::from)
    }

    async fn count_critical_emailed_since(
        &self,
        company_id: &CompanyId,
        since: OffsetDateTime,
    ) -> Result<u64, StoreError> {
        let company_id = company_id.clone();
        self.with_read(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM change_events WHERE company_id = ?1 AND severity = ?2 \
                 AND emailed_at IS NOT NULL AND emailed_at >= ?3",
                params![
                    company_id.as_str(),
                    to_json(&trustwatch_core::model::Severity::Critical)?,
                    to_rfc3339(since)?,
                ],
                |row| row.get(0),
            )?;
            Ok(u64::try_from(count).unwrap_or(0))
        })
        .await
        .map_err(StoreError::from)
    }

    async fn mark_event_emailed(&self, id: &EventId, at: OffsetDateTime) -> Result<(), StoreError> {
        let id = id.clone();
        self.with_write(move |conn| {
            conn.execute(
                "UPDATE change_events SET emailed_at = ?2 WHERE id = ?1",
                params![id.as_str(), to_rfc3339(at)?],
            )?;
            Ok(())
        })
        .await
        .map_err(StoreError::from)
    }

    async fn acknowledge_event(&self, id: &EventId, owner: &UserId) -> Result<(), StoreError> {
        let id = id.clone();
        let owner = owner.clone();
        self.with_write(move |conn| {
            let updated = conn.execute(
                "UPDATE change_events SET acknowledged = 1 \
                 WHERE id = ?1 AND company_id IN (SELECT id FROM companies WHERE owner_user_id = ?2)",
                params![id.as_str(), owner.as_str()],
            )?;
            if updated == 0 {
                return Err(SqliteStoreError::NotFound(format!("event not owned by caller: {id}")));
            }
            Ok(())
        })
        .await
        .map_err(StoreError::from)
    }

    async fn start_crawl_run(&self, run: CrawlRun) -> Result<(), StoreError> {
        self.with_write(move |conn| {
            conn.execute(
                "INSERT INTO crawl_runs (id, company_id, started_at, finished_at, pages_crawled, \
                 claims_touched, events_emitted, errors_json, status, pending_targets) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    run.id.as_str(),
                    run.company_id.as_ref().map(trustwatch_core::CompanyId::as_str),
                    to_rfc3339(run.started_at)?,
                    opt_rfc3339(run.finished_at)?,
                    i64::from(run.pages_crawled),
                    i64::from(run.claims_touched),
                    i64::from(run.events_emitted),
                    to_json(&run.errors)?,
                    to_json(&run.status)?,
                    i64::from(run.pending_targets),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(StoreError::from)
    }

    async fn update_crawl_run(&self, run: CrawlRun) -> Result<(), StoreError> {
        self.with_write(move |conn| {
            conn.execute(
                "UPDATE crawl_runs SET finished_at = ?2, pages_crawled = ?3, claims_touched = ?4, \
                 events_emitted = ?5, errors_json = ?6, status = ?7, pending_targets = ?8 WHERE id = ?1",
                params![
                    run.id.as_str(),
                    opt_rfc3339(run.finished_at)?,
                    i64::from(run.pages_crawled),
                    i64::from(run.claims_touched),
                    i64::from(run.events_emitted),
                    to_json(&run.errors)?,
                    to_json(&run.status)?,
                    i64::from(run.pending_targets),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(StoreError::from)
    }

    async fn settle_crawl_run_target(&self, run_id: &CrawlRunId, delta: CrawlRunDelta, now: OffsetDateTime) -> Result<(), StoreError> {
        let run_id = run_id.clone();
        self.with_write(move |conn| {
            let Some(mut run) = conn
                .query_row_and_then(&format!("SELECT {CRAWL_RUN_COLUMNS} FROM crawl_runs WHERE id = ?1"), params![run_id.as_str()], row_to_crawl_run)
                .optional()?
            else {
                return Ok(());
            };
            run.settle_target(delta, now);
            conn.execute(
                "UPDATE crawl_runs SET finished_at = ?2, pages_crawled = ?3, claims_touched = ?4, \
                 events_emitted = ?5, errors_json = ?6, status = ?7, pending_targets = ?8 WHERE id = ?1",
                params![
                    run.id.as_str(),
                    opt_rfc3339(run.finished_at)?,
                    i64::from(run.pages_crawled),
                    i64::from(run.claims_touched),
                    i64::from(run.events_emitted),
                    to_json(&run.errors)?,
                    to_json(&run.status)?,
                    i64::from(run.pending_targets),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(StoreError::from)
    }

    async fn find_evidence_by_url(
        &self,
        company_id: &CompanyId,
        pdf_url: &str,
    ) -> Result<Option<Evidence>, StoreError> {
        let company_id = company_id.clone();
        let pdf_url = pdf_url.to_string();
        self.with_read(move |conn| {
            conn.query_row_and_then(
                &format!("SELECT {EVIDENCE_COLUMNS} FROM evidence WHERE company_id = ?1 AND pdf_url = ?2"),
                params![company_id.as_str(), pdf_url],
                row_to_evidence,
            )
            .optional()
            .map_err(SqliteStoreError::from)
        })
        .await
        .map_err(StoreError::from)
    }

    async fn insert_evidence(&self, evidence: Evidence) -> Result<(), StoreError> {
        self.with_write(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO evidence ({EVIDENCE_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
                ),
                params![
                    evidence.id.as_str(),
                    evidence.company_id.as_str(),
                    to_json(&evidence.presumed_claim_type)?,
                    evidence.pdf_url,
                    evidence.source_page_url,
                    evidence.context_snippet,
                    to_json(&evidence.status)?,
                    evidence.error,
                    evidence.fields.as_ref().map(to_json).transpose()?,
                    to_rfc3339(evidence.discovered_at)?,
                    opt_rfc3339(evidence.processed_at)?,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(StoreError::from)
    }

    async fn get_evidence(&self, id: &EvidenceId) -> Result<Evidence, StoreError> {
        let id = id.clone();
        self.with_read(move |conn| {
            conn.query_row_and_then(
                &format!("SELECT {EVIDENCE_COLUMNS} FROM evidence WHERE id = ?1"),
                params![id.as_str()],
                row_to_evidence,
            )
            .optional()?
            .ok_or_else(|| SqliteStoreError::NotFound(format!("evidence {id}")))
        })
        .await
        .map_err(StoreError::from)
    }

    async fn mark_evidence_ready(
        &self,
        id: &EvidenceId,
        fields: EvidenceFields,
        at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        let id = id.clone();
        self.with_write(move |conn| {
            conn.execute(
                "UPDATE evidence SET status = ?2, fields_json = ?3, processed_at = ?4, error = NULL WHERE id = ?1",
                params![
                    id.as_str(),
                    to_json(&EvidenceStatus::Ready)?,
                    to_json(&fields)?,
                    to_rfc3339(at)?,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(StoreError::from)
    }

    async fn mark_evidence_failed(&self, id: &EvidenceId, error: &str, at: OffsetDateTime) -> Result<(), StoreError> {
        let id = id.clone();
        let error = error.to_string();
        self.with_write(move |conn| {
            conn.execute(
                "UPDATE evidence SET status = ?2, error = ?3, processed_at = ?4 WHERE id = ?1",
                params![id.as_str(), to_json(&EvidenceStatus::Failed)?, error, to_rfc3339(at)?],
            )?;
            Ok(())
        })
        .await
        .map_err(StoreError::from)
    }

    async fn acquire_scheduler_lock(&self, holder: &str, ttl_seconds: i64, now: OffsetDateTime) -> Result<bool, StoreError> {
        let holder = holder.to_string();
        let now_str = to_rfc3339(now).map_err(StoreError::from)?;
        let expires_at = to_rfc3339(now + time::Duration::seconds(ttl_seconds)).map_err(StoreError::from)?;
        self.with_write(move |conn| {
            conn.execute(
                "INSERT INTO scheduler_locks (name, holder, expires_at) VALUES ('scheduler:crawl:lock', ?1, ?2) \
                 ON CONFLICT(name) DO UPDATE SET holder = excluded.holder, expires_at = excluded.expires_at \
                 WHERE scheduler_locks.expires_at < ?3",
                params![holder, expires_at, now_str],
            )?;
            let acquired_holder: String = conn.query_row(
                "SELECT holder FROM scheduler_locks WHERE name = 'scheduler:crawl:lock'",
                [],
                |row| row.get(0),
            )?;
            Ok(acquired_holder == holder)
        })
        .await
        .map_err(StoreError::from)
    }

    async fn readiness(&self) -> Result<(), StoreError> {
        self.with_read(|conn| {
            conn.query_row("SELECT 1", [], |_row| Ok(()))?;
            Ok(())
        })
        .await
        .map_err(StoreError::from)
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let ops = self.write.stats.ops_submitted.load(Ordering::Relaxed);
        let total_us = self.write.stats.total_latency_us.load(Ordering::Relaxed);
        let depth = self
            .with_read(|conn| {
                let depth: i64 =
                    conn.query_row("SELECT COUNT(*) FROM jobs WHERE status IN ('pending','active','delayed')", [], |row| {
                        row.get(0)
                    })?;
                Ok(u64::try_from(depth).unwrap_or(0))
            })
            .await
            .map_err(StoreError::from)?;
        Ok(StoreStats {
            queue_depth: depth,
            write_latency_us_p50: (ops > 0).then_some(total_us / ops.max(1)),
        })
    }
}

// ============================================================================
// SECTION: JobQueue
// ============================================================================

#[async_trait]
impl JobQueue for SqliteStore {
    async fn enqueue(&self, payload: JobPayload, now: OffsetDateTime) -> Result<EnqueueOutcome, QueueError> {
        let idempotency_key = payload.idempotency_key();
        let queue = payload.queue();
        let job_id = uuid_like(&idempotency_key, now);
        self.with_write(move |conn| {
            if let Some(existing) = conn
                .query_row(
                    "SELECT id FROM jobs WHERE idempotency_key = ?1 AND status IN ('pending','active','delayed')",
                    params![idempotency_key],
                    |row| row.get::<_, String>(0),
                )
                .optional()?
            {
                return Ok(EnqueueOutcome::Deduplicated(existing));
            }
            conn.execute(
                &format!("INSERT INTO jobs ({JOB_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL)"),
                params![
                    job_id,
                    idempotency_key,
                    to_json(&queue)?,
                    to_json(&payload)?,
                    to_json(&JobStatus::Pending)?,
                    0_i64,
                    to_rfc3339(now)?,
                    to_rfc3339(now)?,
                ],
            )?;
            Ok(EnqueueOutcome::Created(job_id))
        })
        .await
        .map_err(QueueError::from)
    }

    async fn claim(&self, queue: QueueName, limit: u32, now: OffsetDateTime) -> Result<Vec<Job>, QueueError> {
        let now_str = to_rfc3339(now).map_err(QueueError::from)?;
        self.with_write(move |conn| {
            let mut statement = conn.prepare(&format!(
                "SELECT {JOB_COLUMNS} FROM jobs WHERE queue = ?1 AND \
                 ((status = 'pending') OR (status = 'delayed' AND run_at <= ?2)) \
                 ORDER BY run_at ASC LIMIT ?3"
            ))?;
            let jobs: Vec<Job> = statement
                .query_and_then(params![to_json(&queue)?, now_str, i64::from(limit)], row_to_job)?
                .collect::<Result<Vec<_>, _>>()?;
            for job in &jobs {
                conn.execute(
                    "UPDATE jobs SET status = ?2 WHERE id = ?1",
                    params![job.id, to_json(&JobStatus::Active)?],
                )?;
            }
            Ok(jobs)
        })
        .await
        .map_err(QueueError::from)
    }

    async fn mark_succeeded(&self, job_id: &str, _now: OffsetDateTime) -> Result<(), QueueError> {
        let job_id = job_id.to_string();
        self.with_write(move |conn| {
            let changed = conn.execute(
                "UPDATE jobs SET status = ?2 WHERE id = ?1",
                params![job_id, to_json(&JobStatus::Completed)?],
            )?;
            if changed == 0 {
                return Err(SqliteStoreError::NotFound(job_id));
            }
            Ok(())
        })
        .await
        .map_err(QueueError::from)
    }

    async fn mark_failed(&self, job_id: &str, error: &str, now: OffsetDateTime) -> Result<(), QueueError> {
        let job_id = job_id.to_string();
        let error = error.to_string();
        self.with_write(move |conn| {
            let attempts: i64 = conn
                .query_row("SELECT attempts FROM jobs WHERE id = ?1", params![job_id], |row| row.get(0))
                .optional()?
                .ok_or_else(|| SqliteStoreError::NotFound(job_id.clone()))?;
            let next_attempts = attempts + 1;
            const MAX_ATTEMPTS: i64 = 3;
            const BACKOFF_SECS: [i64; 3] = [5, 10, 20];
            if next_attempts >= MAX_ATTEMPTS {
                conn.execute(
                    "UPDATE jobs SET status = ?2, attempts = ?3, last_error = ?4 WHERE id = ?1",
                    params![job_id, to_json(&JobStatus::Failed)?, next_attempts, error],
                )?;
            } else {
                let backoff = BACKOFF_SECS[usize::try_from(attempts).unwrap_or(0).min(2)];
                let run_at = to_rfc3339(now + time::Duration::seconds(backoff))?;
                conn.execute(
                    "UPDATE jobs SET status = ?2, attempts = ?3, last_error = ?4, run_at = ?5 WHERE id = ?1",
                    params![job_id, to_json(&JobStatus::Delayed)?, next_attempts, error, run_at],
                )?;
            }
            Ok(())
        })
        .await
        .map_err(QueueError::from)
    }

    async fn prune(&self, _now: OffsetDateTime) -> Result<u64, QueueError> {
        self.with_write(move |conn| {
            let completed = conn.execute(
                "DELETE FROM jobs WHERE status = 'completed' AND id NOT IN \
                 (SELECT id FROM jobs WHERE status = 'completed' ORDER BY run_at DESC LIMIT ?1)",
                params![i64::try_from(COMPLETED_JOB_RETENTION).unwrap_or(i64::MAX)],
            )?;
            let failed = conn.execute(
                "DELETE FROM jobs WHERE status = 'failed' AND id NOT IN \
                 (SELECT id FROM jobs WHERE status = 'failed' ORDER BY run_at DESC LIMIT ?1)",
                params![i64::try_from(FAILED_JOB_RETENTION).unwrap_or(i64::MAX)],
            )?;
            Ok(u64::try_from(completed + failed).unwrap_or(0))
        })
        .await
        .map_err(QueueError::from)
    }
}

/// Builds a stable-looking job id from an idempotency key and timestamp.
/// Job ids need not be globally unguessable; only unique per row.
fn uuid_like(idempotency_key: &str, now: OffsetDateTime) -> String {
    format!(
        "job-{}-{}",
        trustwatch_core::hashing::sha256_hex(idempotency_key).get(..16).unwrap_or_default(),
        now.unix_timestamp()
    )
}
