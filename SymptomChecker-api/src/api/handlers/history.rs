use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{error, info, instrument};

use symptom_checker_domain::entities::symptom::Engine;

use crate::api::handlers::symptom_check::SymptomCheckerService;
use crate::entities::common::{ErrorResponse, HistoryPage, PaginatedResponse};
use crate::entities::history::{HistoryQueryParams, HistoryRecord, HistoryStatsResponse};

const DEFAULT_LIMIT: usize = 10;
const MAX_LIMIT: usize = 100;

/// Build the query string for one page, keeping the engine filter
fn page_url(base_url: &str, limit: usize, offset: usize, engine: Option<&str>) -> String {
    let mut query_parts = vec![format!("limit={}", limit), format!("offset={}", offset)];
    if let Some(engine) = engine {
        query_parts.push(format!("engine={}", engine));
    }
    format!("{}?{}", base_url, query_parts.join("&"))
}

/// Generate pagination links from the current request
fn generate_pagination_links(
    total_count: usize,
    limit: usize,
    offset: usize,
    base_url: &str,
    query_params: &HistoryQueryParams,
) -> (Option<String>, Option<String>) {
    let engine = query_params.engine.as_deref();

    let next = offset
        .checked_add(limit)
        .filter(|next_offset| *next_offset < total_count)
        .map(|next_offset| page_url(base_url, limit, next_offset, engine));

    let previous = (offset > 0)
        .then(|| page_url(base_url, limit, offset.saturating_sub(limit), engine));

    (next, previous)
}

/// Get paginated query history, newest first
#[utoipa::path(
    get,
    path = "/api/v1/history",
    params(
        HistoryQueryParams
    ),
    responses(
        (status = 200, description = "Query history retrieved", body = HistoryPage),
        (status = 400, description = "Unknown engine filter", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "history"
)]
#[instrument(skip(service))]
pub async fn get_history(
    State(service): State<SymptomCheckerService>,
    Query(params): Query<HistoryQueryParams>,
) -> Result<impl IntoResponse, Response> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0);

    let engine = match params.engine.as_deref() {
        None => None,
        Some(name) => match Engine::parse(name) {
            Some(engine) => Some(engine),
            None => {
                let message = format!("Unknown engine '{}'", name);
                return Err(ErrorResponse::bad_request(&message).into_response());
            }
        },
    };

    info!("Fetching history (limit={}, offset={}, engine={:?})", limit, offset, engine);

    match service.get_history(engine, limit, offset).await {
        Ok((records, total_count)) => {
            let (next, previous) = generate_pagination_links(
                total_count,
                limit,
                offset,
                "/api/v1/history",
                &params,
            );

            let response = PaginatedResponse {
                total_count,
                offset,
                limit,
                next,
                previous,
                data: records.into_iter().map(HistoryRecord::from).collect::<Vec<_>>(),
            };

            Ok((StatusCode::OK, Json(response)))
        },
        Err(e) => {
            error!("Failed to get query history: {}", e);
            Err(ErrorResponse::internal_error().into_response())
        }
    }
}

/// Get a single history record by id
#[utoipa::path(
    get,
    path = "/api/v1/history/{id}",
    params(
        ("id" = i64, Path, description = "History record id")
    ),
    responses(
        (status = 200, description = "History record found", body = HistoryRecord),
        (status = 404, description = "History record not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "history"
)]
#[instrument(skip(service))]
pub async fn get_history_record(
    State(service): State<SymptomCheckerService>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, Response> {
    info!("Fetching history record {}", id);

    match service.get_history_record(id).await {
        Ok(Some(record)) => Ok((StatusCode::OK, Json(HistoryRecord::from(record)))),
        Ok(None) => {
            info!("History record not found: {}", id);
            Err(ErrorResponse::not_found("history record").into_response())
        },
        Err(e) => {
            error!("Failed to get history record {}: {}", id, e);
            Err(ErrorResponse::internal_error().into_response())
        }
    }
}

/// Get per-engine totals of the query history
#[utoipa::path(
    get,
    path = "/api/v1/history/stats",
    responses(
        (status = 200, description = "History statistics", body = HistoryStatsResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "history"
)]
#[instrument(skip(service))]
pub async fn get_history_stats(
    State(service): State<SymptomCheckerService>,
) -> Result<impl IntoResponse, Response> {
    match service.get_history_stats().await {
        Ok(stats) => Ok((StatusCode::OK, Json(HistoryStatsResponse::from(stats)))),
        Err(e) => {
            error!("Failed to get history statistics: {}", e);
            Err(ErrorResponse::internal_error().into_response())
        }
    }
}
