//! Catalog Service
//!
//! Microservice for managing products and their images. Product creation
//! fans out image-compression work to a durable queue; a separate worker
//! binary consumes it and appends compressed-image URLs to the product row.

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod kafka;
pub mod models;
pub mod services;

// Public re-exports
pub use config::Config;
pub use error::{AppError, Result};
