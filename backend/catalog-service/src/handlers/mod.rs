/// HTTP handlers for catalog endpoints
pub mod products;

pub use products::{create_product, get_product, list_products};
