// crates/trustwatch-api/src/companies.rs
// ============================================================================
// Module: Companies Handlers
// Description: POST /api/companies and DELETE /api/companies/:id (§4.7, §6).
// Dependencies: axum, trustwatch-core, trustwatch-queue
// ============================================================================

//! ## Overview
//! Creating a company derives its seed [`trustwatch_core::model::CrawlTarget`]s
//! from its enabled categories (§6's seed-URL derivation table) and batch
//! enqueues a `crawl_target` job for each, so the first crawl cycle runs
//! without waiting for the scheduler's next tick.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::Json;
use axum::extract::Path;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use serde::Deserialize;
use serde::Serialize;
use trustwatch_core::CompanyId;
use trustwatch_core::CrawlRunId;
use trustwatch_core::TargetId;
use trustwatch_core::interfaces::JobPayload;
use trustwatch_core::model::Category;
use trustwatch_core::model::Company;
use trustwatch_core::model::CrawlRun;
use trustwatch_core::model::CrawlTarget;
use trustwatch_core::seed::derive_seed_urls;
use trustwatch_queue::new_id;

use crate::error::ApiError;
use crate::state::ApiState;
use crate::user::caller_user_id;

/// Body for `POST /api/companies`.
#[derive(Debug, Deserialize)]
pub struct CreateCompanyRequest {
    /// Canonical domain, e.g. `"acme.example"`.
    pub domain: String,
    /// Human-facing label.
    #[serde(rename = "displayName")]
    pub display_name: String,
    /// Categories of trust claim to monitor.
    pub categories: BTreeSet<Category>,
}

/// Response for `POST /api/companies`.
#[derive(Debug, Serialize)]
pub struct CreateCompanyResponse {
    /// Newly created company id.
    pub id: String,
    /// Number of seed targets enqueued for crawling.
    #[serde(rename = "seededTargets")]
    pub seeded_targets: usize,
}

/// Creates a company, its seed targets, and enqueues their first crawl.
///
/// # Errors
/// Returns [`ApiError::Validation`] when no category is given.
pub async fn create_company(State(state): State<Arc<ApiState>>, headers: HeaderMap, Json(body): Json<CreateCompanyRequest>) -> Result<(StatusCode, Json<CreateCompanyResponse>), ApiError> {
    if body.categories.is_empty() {
        return Err(ApiError::Validation("at least one category is required".to_string()));
    }
    if body.domain.trim().is_empty() {
        return Err(ApiError::Validation("domain must not be empty".to_string()));
    }
    let owner = caller_user_id(&headers)?;
    let now = state.clock.now();
    let company_id = CompanyId::new(new_id());
    let company = Company::new(company_id.clone(), owner, body.display_name, body.domain.clone(), body.categories.clone(), now);
    state.store.create_company(company).await.map_err(ApiError::from)?;

    let seed_urls = derive_seed_urls(&body.domain, &body.categories);
    if !seed_urls.is_empty() {
        let run_id = CrawlRunId::new(new_id());
        let target_count = u32::try_from(seed_urls.len()).unwrap_or(u32::MAX);
        let run = CrawlRun::start(run_id.clone(), Some(company_id.clone()), now, target_count);
        state.store.start_crawl_run(run).await.map_err(ApiError::from)?;

        for url in &seed_urls {
            let target_id = TargetId::new(new_id());
            let target = CrawlTarget::seed(target_id.clone(), company_id.clone(), url.clone());
            state.store.create_target(target).await.map_err(ApiError::from)?;
            state
                .queue
                .enqueue(
                    JobPayload::CrawlTarget { company_id: company_id.as_str().to_string(), target_id: target_id.into_string(), url: url.clone(), run_id: run_id.as_str().to_string() },
                    now,
                )
                .await
                .map_err(ApiError::from)?;
        }
    }

    Ok((StatusCode::CREATED, Json(CreateCompanyResponse { id: company_id.into_string(), seeded_targets: seed_urls.len() })))
}

/// Deletes a company, cascading its targets (§3).
///
/// # Errors
/// Returns [`ApiError::NotFound`] if the company does not exist or is not
/// owned by the caller.
pub async fn delete_company(State(state): State<Arc<ApiState>>, headers: HeaderMap, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    let owner = caller_user_id(&headers)?;
    let company_id = CompanyId::new(id);
    let company = state.store.get_company(&company_id).await.map_err(ApiError::from)?;
    if company.owner_user_id != owner {
        return Err(ApiError::NotFound(format!("company not owned by caller: {company_id}")));
    }
    state.store.delete_company(&company_id).await.map_err(ApiError::from)?;
    Ok(StatusCode::NO_CONTENT)
}
