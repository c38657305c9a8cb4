use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::AppError;
use crate::models::review_record::{ReviewRecord, ReviewSummary};
use crate::store::{PageRequest, ReviewStats, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<u32>,
    #[serde(alias = "per_page")]
    pub page_size: Option<u32>,
}

impl HistoryQuery {
    fn page_request(&self) -> Result<PageRequest, AppError> {
        let page = self.page.unwrap_or(1);
        let page_size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        PageRequest::new(page, page_size).ok_or_else(|| {
            AppError::Validation(format!(
                "page must be at least 1 and page_size between 1 and {MAX_PAGE_SIZE}"
            ))
        })
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub reviews: Vec<ReviewSummary>,
    pub total_count: i64,
    pub page: u32,
    pub page_size: u32,
}

/// GET /api/history
pub async fn handle_list_history(
    State(state): State<AppState>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<HistoryResponse>, AppError> {
    let Query(query) = query?;
    let request = query.page_request()?;
    let page = state.store.list(request).await?;
    Ok(Json(HistoryResponse {
        reviews: page.reviews,
        total_count: page.total_count,
        page: request.page(),
        page_size: request.page_size(),
    }))
}

/// GET /api/history/:id
pub async fn handle_get_review(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<ReviewRecord>, AppError> {
    let Path(id) = id?;
    Ok(Json(state.store.get(id).await?))
}

/// DELETE /api/history/:id
pub async fn handle_delete_review(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(id) = id?;
    state.store.delete(id).await?;
    info!("Review {id} deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/history/stats/summary
pub async fn handle_review_stats(
    State(state): State<AppState>,
) -> Result<Json<ReviewStats>, AppError> {
    let stats = state
        .store
        .summary(ReviewStats::recent_since(Utc::now()))
        .await?;
    Ok(Json(stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_query_defaults() {
        let request = HistoryQuery::default().page_request().unwrap();
        assert_eq!(request.page(), 1);
        assert_eq!(request.page_size(), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_history_query_rejects_out_of_range() {
        let query = HistoryQuery {
            page: Some(0),
            page_size: None,
        };
        assert!(matches!(query.page_request(), Err(AppError::Validation(_))));

        let query = HistoryQuery {
            page: Some(1),
            page_size: Some(MAX_PAGE_SIZE + 1),
        };
        assert!(query.page_request().is_err());
    }
}
