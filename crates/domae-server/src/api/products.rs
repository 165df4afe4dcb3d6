use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct ProductsQuery {
    pub source: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct ProductItem {
    id: i64,
    source: String,
    supplier_id: String,
    name: String,
    category: Option<String>,
    price: Decimal,
    wholesale_price: Option<Decimal>,
    stock_status: String,
    stock_quantity: Option<i32>,
    status: String,
    quality_score: f64,
    main_image_url: Option<String>,
    collected_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

pub(super) async fn list_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ProductsQuery>,
) -> Result<Json<ApiResponse<Vec<ProductItem>>>, ApiError> {
    let rows = domae_db::list_products(
        &state.pool,
        query.source.as_deref(),
        query.status.as_deref(),
        normalize_limit(query.limit),
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| ProductItem {
            id: row.id,
            source: row.source,
            supplier_id: row.supplier_id,
            name: row.name,
            category: row.category,
            price: row.price,
            wholesale_price: row.wholesale_price,
            stock_status: row.stock_status,
            stock_quantity: row.stock_quantity,
            status: row.status,
            quality_score: row.quality_score,
            main_image_url: row.main_image_url,
            collected_at: row.collected_at,
            updated_at: row.updated_at,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}
