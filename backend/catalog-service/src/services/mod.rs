/// Service layer
///
/// - `catalog`: product write path, cache-aside read path, filtered listing
/// - `pipeline`: asynchronous image-compression pipeline consumed by the
///   `image-worker` binary
pub mod catalog;
pub mod pipeline;

pub use catalog::ProductCatalog;
