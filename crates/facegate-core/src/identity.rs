use facegate_config::ClientConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use crate::credentials::{CredentialStore, SessionToken};
use crate::errors::{AppError, AppResult};
use crate::http::{endpoint, error_body, snippet};

const LOGIN_SCOPE: &str = "openid email profile";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    SignedIn,
    NotSignedIn,
    LoginFailed,
}

impl SessionStatus {
    pub fn describe(self) -> &'static str {
        match self {
            SessionStatus::SignedIn => "Signed in",
            SessionStatus::NotSignedIn => "Not signed in",
            SessionStatus::LoginFailed => "Login failed",
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    id_token: Option<String>,
}

/// Authorization-code client for the hosted login pages.
#[derive(Debug, Clone)]
pub struct IdentityProvider {
    http: Client,
    idp_domain: String,
    client_id: String,
    redirect_uri: String,
}

impl IdentityProvider {
    pub fn new(http: Client, config: &ClientConfig) -> Self {
        Self {
            http,
            idp_domain: config.idp_domain.clone(),
            client_id: config.client_id.clone(),
            redirect_uri: config.redirect_uri.clone(),
        }
    }

    pub fn authorize_url(&self) -> AppResult<Url> {
        self.page_url(
            "login",
            &[
                ("client_id", self.client_id.as_str()),
                ("response_type", "code"),
                ("scope", LOGIN_SCOPE),
                ("redirect_uri", self.redirect_uri.as_str()),
            ],
        )
    }

    pub fn logout_url(&self) -> AppResult<Url> {
        self.page_url(
            "logout",
            &[
                ("client_id", self.client_id.as_str()),
                ("logout_uri", self.redirect_uri.as_str()),
            ],
        )
    }

    fn page_url(&self, page: &str, params: &[(&str, &str)]) -> AppResult<Url> {
        Url::parse_with_params(&endpoint(&self.idp_domain, page), params)
            .map_err(|err| AppError::ConfigInvalid(format!("invalid identity provider URL: {err}")))
    }

    /// Trade an authorization code for the ID token.
    pub async fn exchange_code(&self, code: &str) -> AppResult<SessionToken> {
        let code = code.trim();
        if code.is_empty() {
            return Err(AppError::InputMissing("authorization code".into()));
        }

        let url = endpoint(&self.idp_domain, "oauth2/token");
        let response = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("client_id", self.client_id.as_str()),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|err| AppError::TokenExchangeFailed {
                status: None,
                body: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(response).await;
            return Err(AppError::TokenExchangeFailed {
                status: Some(status.as_u16()),
                body: snippet(&body),
            });
        }

        let parsed: TokenResponse =
            response
                .json()
                .await
                .map_err(|err| AppError::TokenExchangeFailed {
                    status: Some(status.as_u16()),
                    body: format!("unreadable token response: {err}"),
                })?;
        parsed
            .id_token
            .filter(|token| !token.is_empty())
            .map(SessionToken::new)
            .ok_or_else(|| AppError::TokenExchangeFailed {
                status: Some(status.as_u16()),
                body: "token response did not include id_token".into(),
            })
    }

    /// Exchange the code and store the token. The store is untouched on
    /// failure.
    pub async fn sign_in_with_code(
        &self,
        code: &str,
        store: &CredentialStore,
    ) -> AppResult<SessionStatus> {
        match self.exchange_code(code).await {
            Ok(token) => {
                store.set_token(token)?;
                info!(target: "identity", "signed in");
                Ok(SessionStatus::SignedIn)
            }
            Err(err) => {
                warn!(target: "identity", error = %err, "authorization code exchange failed");
                Err(err)
            }
        }
    }

    /// Clear the local session and return the hosted logout page.
    pub fn sign_out(&self, store: &CredentialStore) -> AppResult<Url> {
        store.clear()?;
        info!(target: "identity", "signed out");
        self.logout_url()
    }
}

pub fn session_status(store: &CredentialStore) -> SessionStatus {
    if store.get_token().is_some() {
        SessionStatus::SignedIn
    } else {
        SessionStatus::NotSignedIn
    }
}
