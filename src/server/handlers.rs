//! API endpoint handlers.
//!
//! Errors come back as JSON envelopes with matching status codes; an
//! empty result set is an empty list, never an error.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use super::AppState;
use crate::models::OfferStatus;
use crate::repository::{OfferFilter, RepoError};
use crate::services::ScrapeError;

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({ "error": message.into() })),
    )
        .into_response()
}

fn repo_error_response(error: RepoError) -> Response {
    match error {
        RepoError::NotFound(what) => error_response(StatusCode::NOT_FOUND, what),
        RepoError::InvalidArgument(what) => error_response(StatusCode::BAD_REQUEST, what),
        RepoError::Storage(e) => {
            tracing::error!("storage error: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "storage unavailable")
        }
    }
}

/// Health check endpoint for container orchestration.
pub async fn health() -> impl IntoResponse {
    StatusCode::OK
}

#[derive(Debug, Deserialize)]
pub struct UserParams {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateSearchRequest {
    pub user_id: String,
    pub keywords: String,
}

/// Create a saved search.
pub async fn create_search(
    State(state): State<AppState>,
    Json(request): Json<CreateSearchRequest>,
) -> Response {
    match state.searches.create(&request.user_id, &request.keywords) {
        Ok(search) => (StatusCode::CREATED, Json(search)).into_response(),
        Err(e) => repo_error_response(e),
    }
}

/// List a user's searches.
pub async fn list_searches(
    State(state): State<AppState>,
    Query(params): Query<UserParams>,
) -> Response {
    match state.searches.get_for_user(&params.user_id) {
        Ok(searches) => Json(searches).into_response(),
        Err(e) => repo_error_response(e),
    }
}

/// Flip a search's activity flag. Does not trigger a scrape.
pub async fn toggle_search(
    State(state): State<AppState>,
    Path(search_id): Path<String>,
) -> Response {
    match state.searches.toggle_active(&search_id) {
        Ok(search) => Json(search).into_response(),
        Err(e) => repo_error_response(e),
    }
}

/// Delete a search and all offers under it.
pub async fn delete_search(
    State(state): State<AppState>,
    Path(search_id): Path<String>,
) -> Response {
    match state.searches.delete(&search_id) {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => error_response(StatusCode::NOT_FOUND, format!("search {}", search_id)),
        Err(e) => repo_error_response(e),
    }
}

/// Trigger a scrape run for a search and wait for its report.
pub async fn trigger_scrape(
    State(state): State<AppState>,
    Path(search_id): Path<String>,
) -> Response {
    match state.scraper.run_search(&search_id).await {
        Ok(report) => Json(report).into_response(),
        Err(ScrapeError::SearchNotFound(id)) => {
            error_response(StatusCode::NOT_FOUND, format!("search {}", id))
        }
        Err(e @ ScrapeError::AlreadyRunning(_)) => {
            error_response(StatusCode::CONFLICT, e.to_string())
        }
        Err(ScrapeError::Storage(e)) => repo_error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct OfferListParams {
    pub user_id: String,
    pub status: Option<String>,
    pub search_id: Option<String>,
    /// Free-text match against title/company/location.
    pub q: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// List offers for a user, filtered and paginated.
pub async fn list_offers(
    State(state): State<AppState>,
    Query(params): Query<OfferListParams>,
) -> Response {
    let status = match &params.status {
        Some(raw) => match OfferStatus::from_str(raw) {
            Some(status) => Some(status),
            None => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("unknown status: {}", raw),
                )
            }
        },
        None => None,
    };

    let filter = OfferFilter {
        user_id: params.user_id,
        status,
        job_search_id: params.search_id,
        text: params.q,
    };
    match state.offers.list(
        &filter,
        params.page.unwrap_or(1),
        params.per_page.unwrap_or(20),
    ) {
        Ok(page) => Json(page).into_response(),
        Err(e) => repo_error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: String,
}

/// Triage an offer: the sole path that changes `status` after creation.
pub async fn set_offer_status(
    State(state): State<AppState>,
    Path(offer_id): Path<String>,
    Json(request): Json<SetStatusRequest>,
) -> Response {
    let Some(status) = OfferStatus::from_str(&request.status) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("unknown status: {}", request.status),
        );
    };
    match state.offers.set_status(&offer_id, status) {
        Ok(offer) => Json(offer).into_response(),
        Err(e) => repo_error_response(e),
    }
}

/// Delete a single offer.
pub async fn delete_offer(
    State(state): State<AppState>,
    Path(offer_id): Path<String>,
) -> Response {
    match state.offers.delete(&offer_id) {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => error_response(StatusCode::NOT_FOUND, format!("offer {}", offer_id)),
        Err(e) => repo_error_response(e),
    }
}

/// Aggregate stats for a user's searches and offers.
pub async fn get_stats(
    State(state): State<AppState>,
    Query(params): Query<UserParams>,
) -> Response {
    match state.offers.stats(&params.user_id) {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => repo_error_response(e),
    }
}
