use serde::Deserialize;
use std::time::Duration;

pub use common::Environment;

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub http_addr: String,
    pub max_upload_bytes: usize,
    pub request_timeout_ms: u64,
}

impl GatewayConfig {
    /// Read `GATEWAY_*` variables on top of the built-in defaults.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .set_default("http_addr", "127.0.0.1:5000")?
            .set_default("max_upload_bytes", 16 * 1024 * 1024)?
            .set_default("request_timeout_ms", 30_000)?
            .add_source(
                config::Environment::with_prefix("GATEWAY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize::<GatewayConfig>()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Everything the gateway binary needs, assembled once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub environment: Environment,
    pub otel_endpoint: Option<String>,
    pub gateway: GatewayConfig,
    pub inference: inference::InferenceConfig,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            environment: Environment::from_env(),
            otel_endpoint: common::env_opt("OTEL_ENDPOINT"),
            gateway: GatewayConfig::from_env()?,
            inference: inference::InferenceConfig::from_env()?,
        })
    }
}
