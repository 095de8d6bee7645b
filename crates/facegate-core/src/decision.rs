use std::fmt;

use async_trait::async_trait;
use facegate_config::ClientConfig;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::credentials::SharedCredentials;
use crate::errors::{AppError, AppResult};
use crate::http::{endpoint, error_body};
use crate::object::ObjectKey;

pub const ENROLL_PATH: &str = "/enroll";
pub const VERIFY_PATH: &str = "/verify";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointKind {
    Enroll,
    Verify,
}

impl EndpointKind {
    pub fn path(self) -> &'static str {
        match self {
            EndpointKind::Enroll => ENROLL_PATH,
            EndpointKind::Verify => VERIFY_PATH,
        }
    }

    /// Only enrollment is authenticated; the gate is an open kiosk.
    pub fn requires_token(self) -> bool {
        matches!(self, EndpointKind::Enroll)
    }
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointKind::Enroll => f.write_str("enroll"),
            EndpointKind::Verify => f.write_str("verify"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionRequest {
    Enroll {
        employee_id: String,
        object_key: ObjectKey,
    },
    Verify {
        object_key: ObjectKey,
    },
}

impl DecisionRequest {
    pub fn kind(&self) -> EndpointKind {
        match self {
            DecisionRequest::Enroll { .. } => EndpointKind::Enroll,
            DecisionRequest::Verify { .. } => EndpointKind::Verify,
        }
    }

    pub fn object_key(&self) -> &ObjectKey {
        match self {
            DecisionRequest::Enroll { object_key, .. } | DecisionRequest::Verify { object_key } => {
                object_key
            }
        }
    }

    fn payload(&self) -> Value {
        match self {
            DecisionRequest::Enroll {
                employee_id,
                object_key,
            } => serde_json::json!({
                "employeeId": employee_id,
                "objectKey": object_key.as_str(),
            }),
            DecisionRequest::Verify { object_key } => serde_json::json!({
                "objectKey": object_key.as_str(),
            }),
        }
    }
}

/// Body of a successful `/verify` call.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub is_match: bool,
    #[serde(default)]
    pub employee_id: Option<String>,
    #[serde(default)]
    pub similarity: Option<f64>,
    #[serde(default)]
    pub threshold: Option<f64>,
}

/// Backend decision, tagged with the object it was made on.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Enrolled { object_key: ObjectKey, body: Value },
    Verified { object_key: ObjectKey, result: MatchResult },
}

impl Verdict {
    pub fn object_key(&self) -> &ObjectKey {
        match self {
            Verdict::Enrolled { object_key, .. } | Verdict::Verified { object_key, .. } => {
                object_key
            }
        }
    }

    pub fn is_match(&self) -> Option<bool> {
        match self {
            Verdict::Verified { result, .. } => Some(result.is_match),
            Verdict::Enrolled { .. } => None,
        }
    }
}

#[async_trait]
pub trait DecisionService: Send + Sync {
    async fn invoke(&self, request: DecisionRequest) -> AppResult<Verdict>;
}

pub struct HttpDecisionClient {
    http: Client,
    enroll_base: String,
    verify_base: String,
    credentials: Option<SharedCredentials>,
}

impl HttpDecisionClient {
    pub fn new(http: Client, config: &ClientConfig, credentials: Option<SharedCredentials>) -> Self {
        Self {
            http,
            enroll_base: config.api_base.clone(),
            verify_base: config.gate_api_base.clone(),
            credentials,
        }
    }

    fn base_for(&self, kind: EndpointKind) -> &str {
        match kind {
            EndpointKind::Enroll => &self.enroll_base,
            EndpointKind::Verify => &self.verify_base,
        }
    }
}

#[async_trait]
impl DecisionService for HttpDecisionClient {
    async fn invoke(&self, request: DecisionRequest) -> AppResult<Verdict> {
        let kind = request.kind();
        let token = if kind.requires_token() {
            let store = self.credentials.as_ref().ok_or(AppError::Unauthenticated)?;
            Some(store.require_token()?)
        } else {
            None
        };

        let failed = |status: Option<u16>, body: String| AppError::DecisionFailed {
            endpoint: kind,
            status,
            body,
        };

        let url = endpoint(self.base_for(kind), kind.path());
        let mut builder = self.http.post(&url).json(&request.payload());
        if let Some(token) = &token {
            builder = builder.header(AUTHORIZATION, token.bearer());
        }

        debug!(target: "decision", endpoint = %kind, object_key = %request.object_key(), "invoking decision endpoint");
        let response = builder
            .send()
            .await
            .map_err(|err| failed(None, err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(Some(status.as_u16()), error_body(response).await));
        }

        let body = response
            .text()
            .await
            .map_err(|err| failed(Some(status.as_u16()), err.to_string()))?;
        let object_key = request.object_key().clone();
        let verdict = match kind {
            EndpointKind::Enroll => {
                let parsed: Value = serde_json::from_str(&body)
                    .map_err(|_| failed(Some(status.as_u16()), body.clone()))?;
                Verdict::Enrolled {
                    object_key,
                    body: parsed,
                }
            }
            EndpointKind::Verify => {
                let result: MatchResult = serde_json::from_str(&body)
                    .map_err(|_| failed(Some(status.as_u16()), body.clone()))?;
                Verdict::Verified { object_key, result }
            }
        };

        info!(target: "decision", endpoint = %kind, is_match = ?verdict.is_match(), "verdict received");
        Ok(verdict)
    }
}
