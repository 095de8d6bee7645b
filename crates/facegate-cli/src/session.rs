use std::path::{Path, PathBuf};
use std::process::ExitCode;

use facegate_core::errors::{AppError, AppResult};
use facegate_core::identity::{session_status, SessionStatus};
use tracing::info;

use crate::cli::ExchangeArgs;
use crate::context::{block_on, AppContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    Login,
    Exchange,
    Logout,
    Status,
}

impl SessionAction {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionAction::Login => "login",
            SessionAction::Exchange => "exchange",
            SessionAction::Logout => "logout",
            SessionAction::Status => "status",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub action: SessionAction,
    pub status: SessionStatus,
    /// Hosted page the user should open next, if any.
    pub url: Option<String>,
    /// Why a code exchange was refused.
    pub detail: Option<String>,
    pub config_source: PathBuf,
}

impl SessionOutcome {
    /// A refused login exits like any other authentication error.
    pub fn exit_code(&self) -> ExitCode {
        match self.status {
            SessionStatus::LoginFailed => ExitCode::from(3),
            SessionStatus::SignedIn | SessionStatus::NotSignedIn => ExitCode::SUCCESS,
        }
    }
}

pub fn run_login(config_path: Option<&Path>) -> AppResult<SessionOutcome> {
    let context = AppContext::load(config_path)?;
    let url = context.identity().authorize_url()?;
    info!(target: "identity", "authorization URL prepared");
    Ok(SessionOutcome {
        action: SessionAction::Login,
        status: session_status(&context.credentials),
        url: Some(url.to_string()),
        detail: None,
        config_source: context.source,
    })
}

pub fn run_exchange(config_path: Option<&Path>, args: &ExchangeArgs) -> AppResult<SessionOutcome> {
    let context = AppContext::load(config_path)?;
    let identity = context.identity();
    let (status, detail) = login_result(block_on(
        identity.sign_in_with_code(&args.code, &context.credentials),
    )?)?;
    Ok(SessionOutcome {
        action: SessionAction::Exchange,
        status,
        url: None,
        detail,
        config_source: context.source,
    })
}

/// A refused code becomes `LoginFailed`; anything else is still an error.
fn login_result(result: AppResult<SessionStatus>) -> AppResult<(SessionStatus, Option<String>)> {
    match result {
        Ok(status) => Ok((status, None)),
        Err(err @ AppError::TokenExchangeFailed { .. }) => {
            Ok((SessionStatus::LoginFailed, Some(err.human_message())))
        }
        Err(err) => Err(err),
    }
}

pub fn run_logout(config_path: Option<&Path>) -> AppResult<SessionOutcome> {
    let context = AppContext::load(config_path)?;
    let url = context.identity().sign_out(&context.credentials)?;
    Ok(SessionOutcome {
        action: SessionAction::Logout,
        status: session_status(&context.credentials),
        url: Some(url.to_string()),
        detail: None,
        config_source: context.source,
    })
}

pub fn run_status(config_path: Option<&Path>) -> AppResult<SessionOutcome> {
    let context = AppContext::load(config_path)?;
    Ok(SessionOutcome {
        action: SessionAction::Status,
        status: session_status(&context.credentials),
        url: None,
        detail: None,
        config_source: context.source,
    })
}
