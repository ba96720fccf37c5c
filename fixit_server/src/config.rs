use std::env;

use chrono::Duration;
use fixit_common::{helpers::parse_boolean_flag, Secret};
use fixit_engine::market_api::{GatewayConfig, DEFAULT_MERCHANT_ACCOUNT, DEFAULT_MERCHANT_BANK, DEFAULT_QR_BASE_URL};
use log::*;

const DEFAULT_FIXIT_HOST: &str = "127.0.0.1";
const DEFAULT_FIXIT_PORT: u16 = 8460;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/fixit.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 25;
const DEFAULT_EVENT_BUFFER_SIZE: usize = 64;
const DEFAULT_PENDING_TX_MAX_AGE: Duration = Duration::hours(24);
const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::minutes(60);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub max_connections: u32,
    /// If true, the embedded migrations are run against the database at start-up.
    pub run_migrations: bool,
    /// Where payers are sent to make bank transfers.
    pub gateway: GatewayConfig,
    /// When set, the payment gateway must send `Authorization: Apikey <key>` with every webhook call.
    pub webhook_api_key: Option<Secret<String>>,
    /// Pending top-ups and job payments older than this are deleted by the cleanup worker.
    pub pending_tx_max_age: Duration,
    /// How often the cleanup worker runs.
    pub cleanup_interval: Duration,
    /// The real-time relay. Events are only logged when this is not set.
    pub realtime_url: Option<String>,
    /// The push relay. Push messages are only logged when this is not set.
    pub push_url: Option<String>,
    /// The capacity of the notification channel.
    pub event_buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_FIXIT_HOST.to_string(),
            port: DEFAULT_FIXIT_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            run_migrations: true,
            gateway: GatewayConfig::default(),
            webhook_api_key: None,
            pending_tx_max_age: DEFAULT_PENDING_TX_MAX_AGE,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            realtime_url: None,
            push_url: None,
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("FIXIT_HOST").ok().unwrap_or_else(|| DEFAULT_FIXIT_HOST.into());
        let port = env::var("FIXIT_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for FIXIT_PORT. {e} Using the default, {DEFAULT_FIXIT_PORT}, \
                         instead."
                    );
                    DEFAULT_FIXIT_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_FIXIT_PORT);
        let database_url = env::var("FIXIT_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ FIXIT_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let max_connections = env::var("FIXIT_DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| {
                s.parse::<u32>()
                    .map_err(|e| warn!("🪛️ Invalid configuration value for FIXIT_DB_MAX_CONNECTIONS. {e}"))
                    .ok()
            })
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);
        let run_migrations = parse_boolean_flag(env::var("FIXIT_RUN_MIGRATIONS").ok(), true);
        let gateway = gateway_from_env();
        let webhook_api_key = env::var("FIXIT_WEBHOOK_API_KEY").ok().filter(|s| !s.trim().is_empty()).map(Secret::new);
        if webhook_api_key.is_none() {
            warn!(
                "🪛️ FIXIT_WEBHOOK_API_KEY is not set. Payment webhooks will be accepted from anyone who can reach the \
                 server."
            );
        }
        let pending_tx_max_age = duration_from_env("FIXIT_PENDING_TX_MAX_AGE", Duration::hours, DEFAULT_PENDING_TX_MAX_AGE);
        let cleanup_interval = duration_from_env("FIXIT_CLEANUP_INTERVAL", Duration::minutes, DEFAULT_CLEANUP_INTERVAL);
        let realtime_url = relay_url_from_env("FIXIT_REALTIME_URL");
        let push_url = relay_url_from_env("FIXIT_PUSH_URL");
        let event_buffer_size = env::var("FIXIT_EVENT_BUFFER_SIZE")
            .ok()
            .and_then(|s| {
                s.parse::<usize>()
                    .map_err(|e| warn!("🪛️ Invalid configuration value for FIXIT_EVENT_BUFFER_SIZE. {e}"))
                    .ok()
            })
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_EVENT_BUFFER_SIZE);
        Self {
            host,
            port,
            database_url,
            max_connections,
            run_migrations,
            gateway,
            webhook_api_key,
            pending_tx_max_age,
            cleanup_interval,
            realtime_url,
            push_url,
            event_buffer_size,
        }
    }
}

fn gateway_from_env() -> GatewayConfig {
    let qr_base_url = env::var("FIXIT_QR_BASE_URL").ok().unwrap_or_else(|| DEFAULT_QR_BASE_URL.to_string());
    if url::Url::parse(&qr_base_url).is_err() {
        error!("🪛️ FIXIT_QR_BASE_URL ({qr_base_url}) is not a valid URL. Payment intents will not carry a deep link.");
    }
    let merchant_account = env::var("FIXIT_MERCHANT_ACCOUNT").ok().unwrap_or_else(|| {
        warn!("🪛️ FIXIT_MERCHANT_ACCOUNT is not set. Using the placeholder account {DEFAULT_MERCHANT_ACCOUNT}.");
        DEFAULT_MERCHANT_ACCOUNT.to_string()
    });
    let bank_code = env::var("FIXIT_MERCHANT_BANK").ok().unwrap_or_else(|| DEFAULT_MERCHANT_BANK.to_string());
    GatewayConfig { qr_base_url, merchant_account, bank_code }
}

fn duration_from_env(var: &str, unit: fn(i64) -> Duration, default: Duration) -> Duration {
    env::var(var)
        .map_err(|_| info!("🪛️ {var} is not set. Using the default value of {} minutes.", default.num_minutes()))
        .and_then(|s| s.parse::<i64>().map(unit).map_err(|e| warn!("🪛️ Invalid configuration value for {var}. {e}")))
        .ok()
        .filter(|d| *d > Duration::zero())
        .unwrap_or(default)
}

fn relay_url_from_env(var: &str) -> Option<String> {
    let value = env::var(var).ok().filter(|s| !s.trim().is_empty())?;
    match url::Url::parse(&value) {
        Ok(_) => Some(value),
        Err(e) => {
            warn!("🪛️ Ignoring {var}. {value} is not a valid URL. {e}");
            None
        },
    }
}
