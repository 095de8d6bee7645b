use facegate_config::ClientConfig;
use reqwest::{Client, Response};

use crate::errors::{AppError, AppResult};

const ERROR_SNIPPET_CHARS: usize = 200;

/// Build the shared HTTP client. Without a configured timeout the client's
/// own defaults apply.
pub fn build_client(config: &ClientConfig) -> AppResult<Client> {
    let mut builder = Client::builder();
    if let Some(timeout) = config.request_timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|err| AppError::ConfigInvalid(format!("failed to create HTTP client: {err}")))
}

pub(crate) fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Read the body of a failed response for diagnostics.
pub(crate) async fn error_body(response: Response) -> String {
    response.text().await.unwrap_or_default()
}

pub(crate) fn snippet(text: &str) -> String {
    text.chars().take(ERROR_SNIPPET_CHARS).collect()
}
