//! `validate-key`: operator check of a seller API key.

use sqlx::PgPool;
use wbcache_core::AppConfig;
use wbcache_wb::{SellerClient, WbHttp, WbSettings};

pub async fn run(
    pool: &PgPool,
    config: &AppConfig,
    supplier_id: Option<i64>,
    api_key: Option<String>,
    record: bool,
) -> anyhow::Result<()> {
    let api_key = match (supplier_id, api_key) {
        (Some(id), _) => wbcache_db::get_supplier(pool, id).await?.api_key,
        (None, Some(key)) => key,
        (None, None) => anyhow::bail!("pass --supplier-id or --api-key"),
    };

    let http = WbHttp::new(&WbSettings::from_app_config(config))?;
    let validation = SellerClient::new(http, &api_key).validate_api_key().await;

    tracing::info!(
        valid = validation.valid,
        requests = validation.trace.len(),
        "api key checked"
    );
    println!("{}", serde_json::to_string_pretty(&validation)?);

    if record {
        if let Some(id) = supplier_id {
            wbcache_db::set_supplier_validity(pool, id, validation.valid).await?;
            tracing::info!(supplier_id = id, valid = validation.valid, "supplier validity recorded");
        }
    }

    if !validation.valid {
        anyhow::bail!("api key is not usable: {}", validation.reasons.join("; "));
    }
    Ok(())
}
