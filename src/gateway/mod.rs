mod http;

pub use self::http::HttpGateway;

use async_trait::async_trait;
use std::time::Duration;
use crate::cli::Args;
use crate::error::GatewayError;
use crate::models::status::{ StatusReport, Telemetry };

/// Assistant turn persisted when the chat endpoint cannot be reached or answers badly.
pub const CONNECTION_FAILURE_TEXT: &str = "Sorry, I am unable to connect to the server.";

#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn chat(&self, query: &str) -> Result<String, GatewayError>;
}

#[async_trait]
pub trait PredictionGateway: Send + Sync {
    async fn predict(&self, telemetry: &Telemetry) -> Result<StatusReport, GatewayError>;
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl GatewayConfig {
    pub fn from_args(args: &Args) -> Self {
        Self {
            base_url: args.gateway_url.clone(),
            timeout: Duration::from_secs(args.gateway_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn config_follows_command_line() {
        let args = Args::try_parse_from([
            "mechamind",
            "--gateway-url",
            "http://backend:9000",
            "--gateway-timeout-secs",
            "5",
        ]).unwrap();
        let config = GatewayConfig::from_args(&args);
        assert_eq!(config.base_url, "http://backend:9000");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }
}
