/// Database access layer
///
/// `ProductStore` is the seam between HTTP/worker logic and Postgres; the
/// production implementation is `PgProductStore` over a shared `PgPool`.
use async_trait::async_trait;
use sqlx::{PgPool, QueryBuilder, Row};

use crate::error::{AppError, Result};
use crate::models::{CreateProductRequest, Product, ProductFilters};

const PRODUCT_COLUMNS: &str = "product_id, user_id, product_name, product_description, \
     product_images, compressed_product_images, product_price, created_at, updated_at";

/// Outcome of the compressed-image append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// URL appended to the product's compressed list
    Appended,
    /// URL was already present; nothing changed (redelivered work item)
    Duplicate,
    /// No product row with that id
    MissingProduct,
}

/// Store operations the catalog and the image worker depend on
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn create_product(&self, req: &CreateProductRequest) -> Result<Product>;

    async fn get_product(&self, product_id: i32) -> Result<Option<Product>>;

    async fn list_products(&self, filters: &ProductFilters) -> Result<Vec<Product>>;

    /// Atomically append a compressed-image URL to the product row.
    ///
    /// The append is guarded against duplicates so queue redelivery never
    /// double-appends.
    async fn append_compressed_image(&self, product_id: i32, url: &str)
        -> Result<AppendOutcome>;
}

/// Compose the list query from whichever filters are present. Absent
/// filters impose no constraint; the order is explicit and stable.
fn build_list_query(filters: &ProductFilters) -> QueryBuilder<'_, sqlx::Postgres> {
    let mut query = QueryBuilder::new(format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE 1=1"
    ));

    if let Some(user_id) = filters.user_id {
        query.push(" AND user_id = ").push_bind(user_id);
    }
    if let Some(min_price) = filters.min_price {
        query.push(" AND product_price >= ").push_bind(min_price);
    }
    if let Some(max_price) = filters.max_price {
        query.push(" AND product_price <= ").push_bind(max_price);
    }
    if let Some(ref name) = filters.product_name {
        query
            .push(" AND product_name ILIKE ")
            .push_bind(format!("%{name}%"));
    }

    query.push(" ORDER BY product_id ASC");
    query
}

/// Postgres-backed product store
#[derive(Clone)]
pub struct PgProductStore {
    pool: PgPool,
}

impl PgProductStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductStore for PgProductStore {
    async fn create_product(&self, req: &CreateProductRequest) -> Result<Product> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "INSERT INTO products (user_id, product_name, product_description, \
             product_images, compressed_product_images, product_price, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, '{{}}', $5, NOW(), NOW()) \
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(req.user_id)
        .bind(&req.product_name)
        .bind(&req.product_description)
        .bind(&req.product_images)
        .bind(req.product_price)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(product)
    }

    async fn get_product(&self, product_id: i32) -> Result<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE product_id = $1"
        ))
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(product)
    }

    async fn list_products(&self, filters: &ProductFilters) -> Result<Vec<Product>> {
        let mut query = build_list_query(filters);

        let products = query
            .build_query_as::<Product>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(products)
    }

    async fn append_compressed_image(
        &self,
        product_id: i32,
        url: &str,
    ) -> Result<AppendOutcome> {
        let result = sqlx::query(
            "UPDATE products \
             SET compressed_product_images = array_append(compressed_product_images, $1), \
                 updated_at = NOW() \
             WHERE product_id = $2 \
               AND NOT ($1 = ANY(compressed_product_images))",
        )
        .bind(url)
        .bind(product_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 1 {
            return Ok(AppendOutcome::Appended);
        }

        let exists = sqlx::query("SELECT EXISTS(SELECT 1 FROM products WHERE product_id = $1)")
            .bind(product_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?
            .get::<bool, _>(0);

        if exists {
            Ok(AppendOutcome::Duplicate)
        } else {
            Ok(AppendOutcome::MissingProduct)
        }
    }
}
