use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    /// Collector and office surfaces refresh on this interval; it is also
    /// the staleness window for their lists.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// Whether a cancel decision automatically refunds the paid total.
    #[serde(default)]
    pub refund_on_cancel: bool,
    /// Unconfirmed withdrawals older than this are reported as stale.
    #[serde(default = "default_confirm_deadline")]
    pub settlement_confirm_deadline_seconds: u64,
}

fn default_poll_interval() -> u64 {
    15
}

fn default_confirm_deadline() -> u64 {
    900
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Environment override file is optional.
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local file, not checked in.
            .add_source(config::File::with_name("config/local").required(false))
            // E.g. FULCRUM__SERVER__PORT=9090
            .add_source(config::Environment::with_prefix("FULCRUM").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
