/// Data models for catalog-service
///
/// This module defines structures for:
/// - Product: catalog entry with original and compressed image lists
/// - WorkItem: one unit of enqueued image-compression work
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ========================================
// Product Models
// ========================================

/// Product database entity
///
/// `compressed_product_images` is append-only and grown out-of-band by the
/// image worker; it has no positional correspondence to `product_images`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub product_id: i32,
    pub user_id: i32,
    pub product_name: String,
    pub product_description: String,
    #[serde(default)]
    pub product_images: Vec<String>,
    #[serde(default)]
    pub compressed_product_images: Vec<String>,
    pub product_price: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating a product
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProductRequest {
    pub user_id: i32,
    pub product_name: String,
    #[serde(default)]
    pub product_description: String,
    #[serde(default)]
    pub product_images: Vec<String>,
    pub product_price: f64,
}

/// Response for a successful create
#[derive(Debug, Serialize)]
pub struct CreateProductResponse {
    pub product_id: i32,
}

/// Optional, independently composable list filters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilters {
    pub user_id: Option<i32>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    /// Case-insensitive substring match on the product name
    pub product_name: Option<String>,
}

// ========================================
// Work Item
// ========================================

/// One unit of enqueued image-compression work.
///
/// Wire format: `{"product_id": <integer>, "image_url": <string>}`.
/// Unknown fields are ignored on decode; items are independent and may
/// complete out of order or not at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub product_id: i32,
    pub image_url: String,
}
