/// Product handlers - HTTP endpoints for product operations
use actix_web::{web, HttpResponse};

use crate::error::{AppError, Result};
use crate::models::{CreateProductRequest, CreateProductResponse, ProductFilters};
use crate::services::ProductCatalog;

/// List products with optional composable filters
/// (`user_id`, `min_price`, `max_price`, `product_name`)
pub async fn list_products(
    catalog: web::Data<ProductCatalog>,
    filters: web::Query<ProductFilters>,
) -> Result<HttpResponse> {
    let products = catalog.list_products(&filters).await?;
    Ok(HttpResponse::Ok().json(products))
}

/// Get a product by id, served cache-aside
pub async fn get_product(
    catalog: web::Data<ProductCatalog>,
    product_id: web::Path<String>,
) -> Result<HttpResponse> {
    let product_id: i32 = product_id
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid product ID".to_string()))?;

    let product = catalog.get_product(product_id).await?;
    Ok(HttpResponse::Ok().json(product))
}

/// Create a product and enqueue its images for compression
pub async fn create_product(
    catalog: web::Data<ProductCatalog>,
    req: web::Json<CreateProductRequest>,
) -> Result<HttpResponse> {
    let product = catalog.create_product(req.into_inner()).await?;

    Ok(HttpResponse::Created().json(CreateProductResponse {
        product_id: product.product_id,
    }))
}
