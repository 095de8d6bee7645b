use std::time::{Duration, Instant};

use async_trait::async_trait;
use facegate_config::ClientConfig;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::credentials::SharedCredentials;
use crate::errors::{AppError, AppResult};
use crate::http::{endpoint, error_body, snippet};
use crate::object::{ContentType, ImageBlob, ObjectKey};

pub const PRESIGN_PATH: &str = "/presign-upload";

/// Single-use write credential for one object key. Consumed by
/// [`ObjectTransfer::transfer`]; an expired grant must be replaced by a
/// fresh one, never retried.
#[derive(Debug)]
pub struct TransferGrant {
    pub upload_url: String,
    pub object_key: ObjectKey,
    pub content_type: ContentType,
    pub bucket: Option<String>,
    pub expires_in: Option<Duration>,
    pub issued_at: Instant,
}

impl TransferGrant {
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        match self.expires_in {
            Some(ttl) => now.saturating_duration_since(self.issued_at) >= ttl,
            None => false,
        }
    }
}

#[async_trait]
pub trait ObjectTransfer: Send + Sync {
    /// Ask the backend for a presigned write URL. The content type is
    /// signed into the grant and must match the later transfer.
    async fn request_grant(
        &self,
        object_key: &ObjectKey,
        content_type: &ContentType,
    ) -> AppResult<TransferGrant>;

    /// Write the blob to storage through the grant. No retries.
    async fn transfer(&self, grant: TransferGrant, blob: &ImageBlob) -> AppResult<()>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PresignRequest<'a> {
    object_key: &'a str,
    content_type: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PresignResponse {
    upload_url: Option<String>,
    bucket: Option<String>,
    expires_in_seconds: Option<u64>,
}

/// Presign-then-PUT client. With credentials attached every presign call
/// carries the bearer token and fails fast when it is absent.
pub struct HttpObjectTransfer {
    http: Client,
    api_base: String,
    credentials: Option<SharedCredentials>,
}

impl HttpObjectTransfer {
    pub fn enrollment(http: Client, config: &ClientConfig, credentials: SharedCredentials) -> Self {
        Self {
            http,
            api_base: config.api_base.clone(),
            credentials: Some(credentials),
        }
    }

    pub fn gate(http: Client, config: &ClientConfig) -> Self {
        Self {
            http,
            api_base: config.gate_api_base.clone(),
            credentials: None,
        }
    }

    fn grant_error(object_key: &ObjectKey, status: Option<u16>, message: String) -> AppError {
        AppError::GrantRequestFailed {
            object_key: object_key.to_string(),
            status,
            message,
        }
    }
}

#[async_trait]
impl ObjectTransfer for HttpObjectTransfer {
    async fn request_grant(
        &self,
        object_key: &ObjectKey,
        content_type: &ContentType,
    ) -> AppResult<TransferGrant> {
        let token = match &self.credentials {
            Some(store) => Some(store.require_token()?),
            None => None,
        };

        let url = endpoint(&self.api_base, PRESIGN_PATH);
        let mut request = self.http.post(&url).json(&PresignRequest {
            object_key: object_key.as_str(),
            content_type: content_type.as_str(),
        });
        if let Some(token) = &token {
            request = request.header(AUTHORIZATION, token.bearer());
        }

        debug!(target: "transfer", object_key = %object_key, %content_type, "requesting upload grant");
        let response = request
            .send()
            .await
            .map_err(|err| Self::grant_error(object_key, None, err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(response).await;
            return Err(Self::grant_error(
                object_key,
                Some(status.as_u16()),
                snippet(&body),
            ));
        }

        let issued_at = Instant::now();
        let parsed: PresignResponse = response.json().await.map_err(|err| {
            Self::grant_error(
                object_key,
                Some(status.as_u16()),
                format!("unreadable presign response: {err}"),
            )
        })?;
        let upload_url = parsed
            .upload_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                Self::grant_error(
                    object_key,
                    Some(status.as_u16()),
                    "presign response did not include uploadUrl".into(),
                )
            })?;

        Ok(TransferGrant {
            upload_url,
            object_key: object_key.clone(),
            content_type: content_type.clone(),
            bucket: parsed.bucket,
            expires_in: parsed.expires_in_seconds.map(Duration::from_secs),
            issued_at,
        })
    }

    async fn transfer(&self, grant: TransferGrant, blob: &ImageBlob) -> AppResult<()> {
        let transfer_error = |status: Option<u16>, message: String| AppError::TransferFailed {
            object_key: grant.object_key.to_string(),
            status,
            message,
        };

        if blob.content_type != grant.content_type {
            return Err(transfer_error(
                None,
                format!(
                    "blob content type {} does not match granted {}",
                    blob.content_type, grant.content_type
                ),
            ));
        }
        if grant.is_expired() {
            return Err(transfer_error(
                None,
                "upload grant expired; request a new one".into(),
            ));
        }

        debug!(target: "transfer", object_key = %grant.object_key, bytes = blob.len(), "uploading to storage");
        let response = self
            .http
            .put(&grant.upload_url)
            .header(CONTENT_TYPE, grant.content_type.as_str())
            .body(blob.bytes.clone())
            .send()
            .await
            .map_err(|err| transfer_error(None, err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(response).await;
            return Err(transfer_error(Some(status.as_u16()), snippet(&body)));
        }

        info!(target: "transfer", object_key = %grant.object_key, "upload complete");
        Ok(())
    }
}
