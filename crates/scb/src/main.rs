use std::sync::Arc;

use tracing::info;

use scb_core::{aggregator::Aggregator, config::Config, suffix::PslLookup};

#[tokio::main]
async fn main() -> Result<(), scb_core::Error> {
    scb_core::logging::init("scb")?;

    let cfg = Arc::new(Config::load()?);
    info!(
        url_output = ?cfg.url_output,
        audit = cfg.audit_log_path.is_some(),
        "configuration loaded"
    );

    let aggregator = Arc::new(Aggregator::new(&cfg, Arc::new(PslLookup)));

    scb_telegram::router::run_polling(cfg, aggregator)
        .await
        .map_err(|e| scb_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
