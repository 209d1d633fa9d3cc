//! Process setup shared by the binaries

use crate::config::{AppConfig, StoreBackend};
use crate::sheets::{GoogleSheetsClient, InMemorySheet, StoreError, TabularStore, ThrottledStore};
use crate::throttle::Throttle;
use std::sync::Arc;

/// Dependency modules that stay at `warn` unless `RUST_LOG` names them
const QUIET_MODULES: [&str; 5] = ["serenity", "tracing", "h2", "hyper", "rustls"];

/// Log filter: `RUST_LOG` as given, with noisy dependencies capped at warn.
pub fn log_filter(rust_log: &str) -> String {
    let mut filter = rust_log.to_string();
    for module in QUIET_MODULES {
        if !rust_log.contains(module) {
            filter.push_str(&format!(",{}=warn", module));
        }
    }
    filter
}

pub fn init_logging(rust_log: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_filter(rust_log)))
        .target(env_logger::Target::Stderr)
        .try_init()
        .ok();
}

/// Select the process-wide rustls crypto provider before any TLS client is built.
pub fn install_crypto_provider() {
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        log::debug!("rustls crypto provider already installed");
    }
}

/// Store backend from the configuration, wrapped in the write throttle.
pub fn build_store(config: &AppConfig) -> Result<Arc<dyn TabularStore>, StoreError> {
    let inner: Arc<dyn TabularStore> = match config.runtime.store_backend {
        StoreBackend::Sheets => Arc::new(GoogleSheetsClient::from_service_account(
            &config.runtime.credentials_path,
            &config.runtime.spreadsheet_id,
        )?),
        StoreBackend::Memory => {
            log::warn!("🧪 Memory store backend: counts are not persisted");
            Arc::new(InMemorySheet::new(&config.tally.sheet_name))
        }
    };
    log::info!("📊 Store backend: {}", inner.backend_type());

    Ok(Arc::new(ThrottledStore::new(inner, Throttle::new(config.tally.update_delay))))
}
