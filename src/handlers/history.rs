use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::CurrentUser,
    error::ApiError,
    models::{HistoryFilter, HistoryStats, PurchaseHistoryResponse},
    response::{ok, ApiResponse},
    AppState,
};

use super::orders::Pagination;

#[derive(Serialize)]
pub struct HistoryListResponse {
    pub purchases: Vec<PurchaseHistoryResponse>,
    pub pagination: Pagination,
}

#[derive(Deserialize)]
pub struct RecentQuery {
    pub limit: Option<i64>,
}

pub async fn get_purchase_history(
    user: CurrentUser,
    State(state): State<AppState>,
    Query(filter): Query<HistoryFilter>,
) -> Result<Json<ApiResponse<HistoryListResponse>>, ApiError> {
    let (records, total) = state.store.list_purchase_history(user.id, &filter).await?;

    Ok(ok(
        HistoryListResponse {
            purchases: records
                .into_iter()
                .map(PurchaseHistoryResponse::from)
                .collect(),
            pagination: Pagination {
                total,
                limit: filter.limit(),
                offset: filter.offset(),
            },
        },
        "Purchase history retrieved successfully",
    ))
}

pub async fn get_purchase_history_by_id(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<PurchaseHistoryResponse>>, ApiError> {
    let record = state.store.get_purchase_history(user.id, id).await?;
    Ok(ok(record.into(), "Purchase history retrieved successfully"))
}

pub async fn get_purchase_stats(
    user: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<HistoryStats>>, ApiError> {
    let stats = state.store.purchase_stats(user.id).await?;
    Ok(ok(stats, "Purchase statistics retrieved successfully"))
}

pub async fn get_recent_purchases(
    user: CurrentUser,
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<ApiResponse<Vec<PurchaseHistoryResponse>>>, ApiError> {
    let limit = query.limit.filter(|l| *l > 0).unwrap_or(5);
    let records = state.store.recent_purchases(user.id, limit).await?;
    Ok(ok(
        records
            .into_iter()
            .map(PurchaseHistoryResponse::from)
            .collect(),
        "Recent purchases retrieved successfully",
    ))
}
