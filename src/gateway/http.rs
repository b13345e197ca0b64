use async_trait::async_trait;
use log::debug;
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use super::{ ChatGateway, GatewayConfig, PredictionGateway };
use crate::error::GatewayError;
use crate::models::gateway::{ ChatQuery, ChatReply, PredictReply };
use crate::models::status::{ StatusReport, Telemetry };

#[derive(Debug, Clone)]
pub struct HttpGateway {
    http: HttpClient,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let http = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        Self::new(config.base_url.clone(), config.timeout)
    }

    fn endpoint(&self, route: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), route)
    }

    async fn post<B, R>(&self, route: &str, body: &B) -> Result<R, GatewayError>
        where B: Serialize + Sync, R: DeserializeOwned
    {
        let url = self.endpoint(route);
        debug!("POST {}", url);
        let resp = self.http.post(&url).json(body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(GatewayError::Status(status));
        }
        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| GatewayError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl ChatGateway for HttpGateway {
    async fn chat(&self, query: &str) -> Result<String, GatewayError> {
        let req = ChatQuery { query: query.to_string() };
        let reply: ChatReply = self.post("/chat", &req).await?;
        reply.into_text()
    }
}

#[async_trait]
impl PredictionGateway for HttpGateway {
    async fn predict(&self, telemetry: &Telemetry) -> Result<StatusReport, GatewayError> {
        let reply: PredictReply = self.post("/predict", telemetry).await?;
        reply.into_report()
    }
}
