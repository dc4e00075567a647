// crates/trustwatch-api/src/crawl.rs
// ============================================================================
// Module: Manual Crawl Trigger
// Description: POST /api/crawl/run (§4.7, §6).
// Dependencies: axum, trustwatch-core
// ============================================================================

//! ## Overview
//! Enqueues a `crawl_target` job for every target of either one named,
//! caller-owned company, or every company the caller owns. The API never
//! calls the fetch adapter itself; it only enqueues.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use serde::Deserialize;
use serde::Serialize;
use trustwatch_core::CompanyId;
use trustwatch_core::CrawlRunId;
use trustwatch_core::interfaces::JobPayload;
use trustwatch_core::model::Company;
use trustwatch_core::model::CrawlRun;
use trustwatch_queue::new_id;

use crate::error::ApiError;
use crate::state::ApiState;
use crate::user::caller_user_id;

/// Body for `POST /api/crawl/run`.
#[derive(Debug, Deserialize, Default)]
pub struct RunCrawlRequest {
    /// Company to crawl; when omitted, every company the caller owns.
    #[serde(rename = "companyId")]
    pub company_id: Option<String>,
}

/// Response for `POST /api/crawl/run`.
#[derive(Debug, Serialize)]
pub struct RunCrawlResponse {
    /// Number of `crawl_target` jobs enqueued.
    #[serde(rename = "enqueuedTargets")]
    pub enqueued_targets: usize,
}

/// Enqueues crawl jobs for the requested scope.
///
/// # Errors
/// Returns [`ApiError::NotFound`] when `companyId` is given but not owned by
/// the caller.
pub async fn run_crawl(State(state): State<Arc<ApiState>>, headers: HeaderMap, Json(body): Json<RunCrawlRequest>) -> Result<Json<RunCrawlResponse>, ApiError> {
    let owner = caller_user_id(&headers)?;
    let companies = match body.company_id {
        Some(id) => {
            let company = state.store.get_company(&CompanyId::new(id)).await.map_err(ApiError::from)?;
            if company.owner_user_id != owner {
                return Err(ApiError::NotFound("company not owned by caller".to_string()));
            }
            vec![company]
        }
        None => state.store.list_companies_by_user(&owner).await.map_err(ApiError::from)?,
    };

    let now = state.clock.now();
    let mut enqueued = 0_usize;
    for company in &companies {
        enqueued += enqueue_company_targets(&state, company, now).await?;
    }
    Ok(Json(RunCrawlResponse { enqueued_targets: enqueued }))
}

/// Enqueues a `crawl_target` job for every target belonging to `company`,
/// opening one CrawlRun to cover the whole batch (§3).
async fn enqueue_company_targets(state: &ApiState, company: &Company, now: time::OffsetDateTime) -> Result<usize, ApiError> {
    let targets = state.store.list_targets_by_company(&company.id).await.map_err(ApiError::from)?;
    if targets.is_empty() {
        return Ok(0);
    }

    let run_id = CrawlRunId::new(new_id());
    let target_count = u32::try_from(targets.len()).unwrap_or(u32::MAX);
    let run = CrawlRun::start(run_id.clone(), Some(company.id.clone()), now, target_count);
    state.store.start_crawl_run(run).await.map_err(ApiError::from)?;

    for target in &targets {
        state
            .queue
            .enqueue(
                JobPayload::CrawlTarget {
                    company_id: company.id.as_str().to_string(),
                    target_id: target.id.as_str().to_string(),
                    url: target.url.clone(),
                    run_id: run_id.as_str().to_string(),
                },
                now,
            )
            .await
            .map_err(ApiError::from)?;
    }
    Ok(targets.len())
}
