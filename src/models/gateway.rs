use serde::{ Serialize, Deserialize };

use crate::error::GatewayError;
use crate::models::status::StatusReport;

#[derive(Serialize, Deserialize, Debug)]
pub struct ChatQuery {
    pub query: String,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct ChatReply {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ChatReply {
    /// An `error` body is shown to the user like any other reply; an empty
    /// `response` falls through to it.
    pub fn into_text(self) -> Result<String, GatewayError> {
        match (self.response, self.error) {
            (Some(response), _) if !response.is_empty() => Ok(response),
            (_, Some(error)) => Ok(error),
            (Some(response), None) => Ok(response),
            (None, None) => Err(GatewayError::Malformed("reply has neither response nor error".into())),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct PredictReply {
    #[serde(default)]
    pub prediction: Option<String>,
    #[serde(default)]
    pub confidence: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl PredictReply {
    pub fn into_report(self) -> Result<StatusReport, GatewayError> {
        if let Some(error) = self.error {
            return Ok(StatusReport::new(error, "0"));
        }
        match (self.prediction, self.confidence) {
            (Some(prediction), Some(confidence)) => Ok(StatusReport::new(prediction, confidence)),
            _ => Err(GatewayError::Malformed("prediction reply is missing fields".into())),
        }
    }
}
