use common::env_or;

pub use common::Environment;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub environment: Environment,
    pub otel_endpoint: Option<String>,
    pub ws_addr: String,
}

impl RelayConfig {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> Self {
        Self {
            environment: Environment::from_env(),
            otel_endpoint: common::env_opt("OTEL_ENDPOINT"),
            ws_addr: env_or("RELAY_WS_ADDR", "127.0.0.1:5001"),
        }
    }
}
