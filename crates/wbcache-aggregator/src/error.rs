use thiserror::Error;
use wbcache_core::StoreError;
use wbcache_wb::WbError;

#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("marketplace request failed: {0}")]
    Wb(#[from] WbError),

    #[error("store operation failed: {0}")]
    Store(#[from] StoreError),
}
