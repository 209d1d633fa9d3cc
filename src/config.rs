//! Configuration from environment variables (and `.env`)
//!
//! Read once at startup into [`AppConfig`]. The pipeline only ever sees
//! [`TallyConfig`]; tokens, ports and backend choices stay in
//! [`RuntimeConfig`] for the binaries.

use crate::pipeline::types::ChannelColumnMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// Google Sheets REST API
    Sheets,
    /// In-process table, writes only logged
    Memory,
}

/// Settings injected into every pipeline component. Fixed for the process lifetime.
#[derive(Debug, Clone)]
pub struct TallyConfig {
    pub sheet_name: String,
    /// Monitored channels; position is the count column
    pub channels: ChannelColumnMap,
    pub excluded_user_id: Option<u64>,
    pub page_size: u8,
    pub batch_delay: Duration,
    pub update_delay: Duration,
    pub member_cache_ttl: Duration,
    pub serialize_reconciliation: bool,
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub discord_token: String,
    pub spreadsheet_id: String,
    pub command_channel_id: Option<u64>,
    pub credentials_path: PathBuf,
    pub store_backend: StoreBackend,
    /// 0 disables the keep-alive listener
    pub keepalive_port: u16,
    pub rust_log: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub tally: TallyConfig,
    pub runtime: RuntimeConfig,
}

#[derive(Debug)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => write!(f, "Missing environment variable: {}", var),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key → value source (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &str| var(key).ok_or_else(|| ConfigError::MissingVariable(key.to_string()));

        let discord_token = var("DISCORD_TOKEN")
            .or_else(|| var("TOKEN"))
            .ok_or_else(|| ConfigError::MissingVariable("DISCORD_TOKEN".to_string()))?;
        let spreadsheet_id = required("SPREADSHEET_ID")?;

        let channels = parse_channel_ids(&required("CHANNEL_IDS")?)?;
        let command_channel_id = var("COMMAND_CHANNEL_ID")
            .map(|v| parse_id("COMMAND_CHANNEL_ID", &v))
            .transpose()?;
        let excluded_user_id = var("EXCLUDED_USER_ID")
            .map(|v| parse_id("EXCLUDED_USER_ID", &v))
            .transpose()?;

        let page_size = parse_or("PAGE_SIZE", var("PAGE_SIZE"), 50u8)?;
        if !(1..=100).contains(&page_size) {
            return Err(ConfigError::InvalidValue(format!(
                "PAGE_SIZE must be between 1 and 100, got {}",
                page_size
            )));
        }

        let store_backend = match var("STORE_BACKEND").as_deref().map(str::to_lowercase).as_deref() {
            None | Some("sheets") => StoreBackend::Sheets,
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(ConfigError::InvalidValue(format!(
                    "STORE_BACKEND must be 'sheets' or 'memory', got '{}'",
                    other
                )))
            }
        };

        let serialize_reconciliation = match var("SERIALIZE_RECONCILIATION") {
            Some(value) => parse_flag(&value).ok_or_else(|| {
                ConfigError::InvalidValue(format!("SERIALIZE_RECONCILIATION must be true or false, got '{}'", value))
            })?,
            None => false,
        };

        let tally = TallyConfig {
            sheet_name: var("SHEET_NAME").unwrap_or_else(|| "Sheet1".to_string()),
            channels,
            excluded_user_id,
            page_size,
            batch_delay: Duration::from_millis(parse_or("BATCH_DELAY_MS", var("BATCH_DELAY_MS"), 150)?),
            update_delay: Duration::from_millis(parse_or("UPDATE_DELAY_MS", var("UPDATE_DELAY_MS"), 50)?),
            member_cache_ttl: Duration::from_secs(parse_or(
                "MEMBER_CACHE_TTL_SECS",
                var("MEMBER_CACHE_TTL_SECS"),
                300,
            )?),
            serialize_reconciliation,
        };

        let runtime = RuntimeConfig {
            discord_token,
            spreadsheet_id,
            command_channel_id,
            credentials_path: PathBuf::from(
                var("GOOGLE_CREDENTIALS_PATH").unwrap_or_else(|| "credentials.json".to_string()),
            ),
            store_backend,
            keepalive_port: parse_or("KEEPALIVE_PORT", var("KEEPALIVE_PORT"), 3000)?,
            rust_log: var("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        };

        Ok(Self { tally, runtime })
    }

    /// Startup banner, secrets left out
    pub fn log_summary(&self) {
        log::info!("⚙️  Configuration");
        log::info!("   ├─ Spreadsheet: {} / {}", self.runtime.spreadsheet_id, self.tally.sheet_name);
        log::info!("   ├─ Store backend: {:?}", self.runtime.store_backend);
        log::info!(
            "   ├─ Channels: {}",
            self.tally
                .channels
                .iter()
                .map(|(column, id)| format!("{}→col{}", id, column))
                .collect::<Vec<_>>()
                .join(", ")
        );
        match self.runtime.command_channel_id {
            Some(id) => log::info!("   ├─ Command channel: {}", id),
            None => log::info!("   ├─ Command channel: none (no start button)"),
        }
        if let Some(id) = self.tally.excluded_user_id {
            log::info!("   ├─ Excluded user: {}", id);
        }
        log::info!("   ├─ Page size: {}", self.tally.page_size);
        log::info!(
            "   ├─ Delays: {}ms between pages, {}ms between writes",
            self.tally.batch_delay.as_millis(),
            self.tally.update_delay.as_millis()
        );
        log::info!("   ├─ Member cache TTL: {}s", self.tally.member_cache_ttl.as_secs());
        log::info!("   ├─ Serialized reconciliation: {}", self.tally.serialize_reconciliation);
        log::info!("   └─ Keep-alive port: {}", self.runtime.keepalive_port);
    }
}

fn parse_id(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidValue(format!("{} must be a numeric id, got '{}'", key, value)))
}

fn parse_channel_ids(raw: &str) -> Result<ChannelColumnMap, ConfigError> {
    let ids = raw
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| parse_id("CHANNEL_IDS", id))
        .collect::<Result<Vec<_>, _>>()?;

    if ids.is_empty() {
        return Err(ConfigError::InvalidValue("CHANNEL_IDS lists no channels".to_string()));
    }
    for (i, id) in ids.iter().enumerate() {
        if ids[..i].contains(id) {
            return Err(ConfigError::InvalidValue(format!("CHANNEL_IDS lists {} twice", id)));
        }
    }
    Ok(ChannelColumnMap::new(ids))
}

fn parse_or<T: std::str::FromStr>(key: &str, value: Option<String>, default: T) -> Result<T, ConfigError> {
    match value {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(format!("{} is not a valid number: '{}'", key, raw))),
        None => Ok(default),
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    const MINIMAL: [(&str, &str); 3] = [
        ("DISCORD_TOKEN", "token"),
        ("SPREADSHEET_ID", "sheet-id"),
        ("CHANNEL_IDS", "111, 222,333"),
    ];

    #[test]
    fn test_defaults() {
        let config = load(&MINIMAL).unwrap();

        assert_eq!(config.tally.sheet_name, "Sheet1");
        assert_eq!(config.tally.channels, ChannelColumnMap::new(vec![111, 222, 333]));
        assert_eq!(config.tally.page_size, 50);
        assert_eq!(config.tally.batch_delay, Duration::from_millis(150));
        assert_eq!(config.tally.update_delay, Duration::from_millis(50));
        assert_eq!(config.tally.member_cache_ttl, Duration::from_secs(300));
        assert!(!config.tally.serialize_reconciliation);
        assert_eq!(config.tally.excluded_user_id, None);
        assert_eq!(config.runtime.store_backend, StoreBackend::Sheets);
        assert_eq!(config.runtime.keepalive_port, 3000);
        assert_eq!(config.runtime.credentials_path, PathBuf::from("credentials.json"));
        assert_eq!(config.runtime.command_channel_id, None);
    }

    #[test]
    fn test_token_fallback() {
        let config = load(&[
            ("TOKEN", "legacy"),
            ("SPREADSHEET_ID", "sheet-id"),
            ("CHANNEL_IDS", "1"),
        ])
        .unwrap();
        assert_eq!(config.runtime.discord_token, "legacy");
    }

    #[test]
    fn test_missing_required() {
        let result = load(&[("DISCORD_TOKEN", "t"), ("CHANNEL_IDS", "1")]);
        assert!(matches!(result, Err(ConfigError::MissingVariable(var)) if var == "SPREADSHEET_ID"));

        let result = load(&[("SPREADSHEET_ID", "s"), ("CHANNEL_IDS", "1")]);
        assert!(matches!(result, Err(ConfigError::MissingVariable(var)) if var == "DISCORD_TOKEN"));
    }

    #[test]
    fn test_invalid_values() {
        let mut pairs = MINIMAL.to_vec();
        pairs.push(("PAGE_SIZE", "101"));
        assert!(matches!(load(&pairs), Err(ConfigError::InvalidValue(_))));

        let mut pairs = MINIMAL.to_vec();
        pairs[2] = ("CHANNEL_IDS", "111,abc");
        assert!(matches!(load(&pairs), Err(ConfigError::InvalidValue(_))));

        let mut pairs = MINIMAL.to_vec();
        pairs[2] = ("CHANNEL_IDS", "111,111");
        assert!(matches!(load(&pairs), Err(ConfigError::InvalidValue(_))));

        let mut pairs = MINIMAL.to_vec();
        pairs.push(("STORE_BACKEND", "postgres"));
        assert!(matches!(load(&pairs), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_optional_values() {
        let mut pairs = MINIMAL.to_vec();
        pairs.extend([
            ("SHEET_NAME", "bot3"),
            ("COMMAND_CHANNEL_ID", "999"),
            ("EXCLUDED_USER_ID", "42"),
            ("STORE_BACKEND", "Memory"),
            ("SERIALIZE_RECONCILIATION", "yes"),
            ("KEEPALIVE_PORT", "0"),
        ]);
        let config = load(&pairs).unwrap();

        assert_eq!(config.tally.sheet_name, "bot3");
        assert_eq!(config.runtime.command_channel_id, Some(999));
        assert_eq!(config.tally.excluded_user_id, Some(42));
        assert_eq!(config.runtime.store_backend, StoreBackend::Memory);
        assert!(config.tally.serialize_reconciliation);
        assert_eq!(config.runtime.keepalive_port, 0);
    }

    #[test]
    fn test_from_env_reads_process_environment() {
        let _env_lock = ENV_MUTEX.lock().expect("env mutex should not be poisoned");
        env::set_var("DISCORD_TOKEN", "env-token");
        env::set_var("SPREADSHEET_ID", "env-sheet");
        env::set_var("CHANNEL_IDS", "5,6");

        let config = AppConfig::from_env();

        env::remove_var("DISCORD_TOKEN");
        env::remove_var("SPREADSHEET_ID");
        env::remove_var("CHANNEL_IDS");

        let config = config.unwrap();
        assert_eq!(config.runtime.discord_token, "env-token");
        assert_eq!(config.tally.channels.len(), 2);
    }
}
