use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use facegate_config::ConfigError;
use image::ImageError;
use thiserror::Error;

use crate::credentials::SecretServiceError;
use crate::decision::EndpointKind;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not authenticated; sign in before calling the enrollment API")]
    Unauthenticated,

    #[error("upload grant request for {object_key} failed{}: {message}", status_suffix(.status))]
    GrantRequestFailed {
        object_key: String,
        status: Option<u16>,
        message: String,
    },

    #[error("transfer of {object_key} to storage failed{}: {message}", status_suffix(.status))]
    TransferFailed {
        object_key: String,
        status: Option<u16>,
        message: String,
    },

    #[error("{endpoint} request failed{}: {body}", status_suffix(.status))]
    DecisionFailed {
        endpoint: EndpointKind,
        status: Option<u16>,
        body: String,
    },

    #[error("missing input: {0}")]
    InputMissing(String),

    #[error("invalid employee id '{employee_id}': {message}")]
    InvalidEmployeeId {
        employee_id: String,
        message: String,
    },

    #[error("unsupported content type '{0}'; an image/* type is required")]
    UnsupportedContentType(String),

    #[error("a run is already in flight; wait for it to finish")]
    RunInFlight,

    #[error("verdict for {received} does not belong to in-flight object {expected}")]
    VerdictMismatch { expected: String, received: String },

    #[error("authorization code exchange failed{}: {body}", status_suffix(.status))]
    TokenExchangeFailed { status: Option<u16>, body: String },

    #[error("Secret Service unavailable for account {account} (service {service}): {message}")]
    SecretServiceUnavailable {
        account: String,
        service: String,
        message: String,
    },

    #[error("failed to read configuration file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration file {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("failed to open video device {device}: {source}")]
    DeviceOpen {
        device: String,
        #[source]
        source: io::Error,
    },

    #[error("device capability error: {0}")]
    Capability(String),

    #[error("unsupported pixel format '{0}' for selected device")]
    UnsupportedFormat(String),

    #[error("failed processing frame data: {0}")]
    FrameProcessing(String),

    #[error("failed to encode image: {0}")]
    ImageEncode(#[from] ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            AppError::InputMissing(_) => ExitCode::from(2),
            AppError::InvalidEmployeeId { .. } => ExitCode::from(2),
            AppError::UnsupportedContentType(_) => ExitCode::from(2),
            AppError::ConfigRead { .. } => ExitCode::from(2),
            AppError::ConfigParse { .. } => ExitCode::from(2),
            AppError::ConfigInvalid(_) => ExitCode::from(2),
            AppError::Unauthenticated => ExitCode::from(3),
            AppError::TokenExchangeFailed { .. } => ExitCode::from(3),
            AppError::SecretServiceUnavailable { .. } => ExitCode::from(3),
            AppError::GrantRequestFailed { .. } => ExitCode::from(4),
            AppError::TransferFailed { .. } => ExitCode::from(4),
            AppError::DecisionFailed { .. } => ExitCode::from(4),
            AppError::VerdictMismatch { .. } => ExitCode::from(4),
            AppError::RunInFlight => ExitCode::from(4),
            AppError::DeviceOpen { .. } => ExitCode::from(5),
            AppError::Capability(_) => ExitCode::from(5),
            AppError::UnsupportedFormat(_) => ExitCode::from(5),
            _ => ExitCode::from(1),
        }
    }

    pub fn human_message(&self) -> String {
        self.to_string()
    }
}

pub type AppResult<T> = Result<T, AppError>;

fn status_suffix(status: &Option<u16>) -> String {
    status
        .map(|code| format!(" with status {code}"))
        .unwrap_or_default()
}

impl From<SecretServiceError> for AppError {
    fn from(err: SecretServiceError) -> Self {
        AppError::SecretServiceUnavailable {
            account: err.account().to_string(),
            service: err.service().to_string(),
            message: err.message().to_string(),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Read { path, source } => AppError::ConfigRead { path, source },
            ConfigError::Parse { path, message } => AppError::ConfigParse { path, message },
            other => AppError::ConfigInvalid(other.to_string()),
        }
    }
}
