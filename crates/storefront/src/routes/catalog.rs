//! Catalog route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use shopfront_core::{Product, ProductId};

use crate::catalog::{self as catalog_api, ProductQuery};
use crate::error::Result;
use crate::state::AppState;

/// Number of featured products on the home page.
const DEFAULT_FEATURED: usize = 3;

/// Query parameters for the featured listing.
#[derive(Debug, Deserialize)]
pub struct FeaturedQuery {
    pub limit: Option<usize>,
}

/// Product listing with search, category filter and sort.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<Product>>> {
    let products = state.catalog().list_products().await?;
    Ok(Json(query.apply(&products)))
}

/// Product detail.
#[instrument(skip(state))]
pub async fn show(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Product>> {
    let product = state.catalog().get_product(ProductId::new(id)).await?;
    Ok(Json(product))
}

/// Distinct product categories in catalog order.
#[instrument(skip(state))]
pub async fn categories(State(state): State<AppState>) -> Result<Json<Vec<String>>> {
    let products = state.catalog().list_products().await?;
    Ok(Json(catalog_api::categories(&products)))
}

/// The first products of the catalog.
#[instrument(skip(state))]
pub async fn featured(
    State(state): State<AppState>,
    Query(query): Query<FeaturedQuery>,
) -> Result<Json<Vec<Product>>> {
    let products = state.catalog().list_products().await?;
    let limit = query.limit.unwrap_or(DEFAULT_FEATURED);
    Ok(Json(catalog_api::featured(&products, limit)))
}
