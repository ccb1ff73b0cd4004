pub mod error;
pub mod http;
pub mod probe;
pub mod rate_limit;
pub mod retry;
pub mod seller;
pub mod site;
pub mod token;
pub mod trace;
pub mod types;

pub use error::WbError;
pub use http::{WbEndpoints, WbHttp, WbSettings};
pub use probe::ImageProber;
pub use rate_limit::{RateCategory, RateLimiter, RateLimits};
pub use retry::RetryPolicy;
pub use seller::{
    card_patch, CardListOutcome, KeyValidation, LegacySupplierInfo, PriceListOutcome,
    ProductsQuery, SellerClient,
};
pub use site::{chunk_ids, SiteClient, SiteProduct};
pub use token::{decode_token, TokenInfo};
pub use trace::{RequestRecord, RequestTrace};
pub use types::{GoodsPrice, WbCard};
