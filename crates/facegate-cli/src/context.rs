use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use facegate_config::{load_resolved_config, ResolvedConfig};
use facegate_core::build_client;
use facegate_core::credentials::{CredentialStore, KeyringTokenBackend, SharedCredentials};
use facegate_core::decision::HttpDecisionClient;
use facegate_core::errors::AppResult;
use facegate_core::identity::IdentityProvider;
use facegate_core::transfer::HttpObjectTransfer;
use facegate_core::workflow::{Surface, WorkflowOrchestrator};
use reqwest::Client;
use tracing::debug;

/// Everything a command needs once configuration has been resolved.
pub struct AppContext {
    pub config: ResolvedConfig,
    pub source: PathBuf,
    pub http: Client,
    pub credentials: SharedCredentials,
}

impl AppContext {
    pub fn load(config_path: Option<&Path>) -> AppResult<Self> {
        let loaded = load_resolved_config(config_path)?;
        debug!(
            target: "config",
            source = %loaded.source.display(),
            api_base = %loaded.resolved.client.api_base,
            "configuration loaded"
        );
        let client = &loaded.resolved.client;
        let http = build_client(client)?;
        let backend = KeyringTokenBackend::new(&client.keyring_service, &client.client_id);
        let credentials = Arc::new(CredentialStore::load(backend)?);
        Ok(Self {
            config: loaded.resolved,
            source: loaded.source,
            http,
            credentials,
        })
    }

    pub fn identity(&self) -> IdentityProvider {
        IdentityProvider::new(self.http.clone(), &self.config.client)
    }

    pub fn orchestrator(&self, surface: Surface) -> WorkflowOrchestrator {
        let client = &self.config.client;
        match surface {
            Surface::Enrollment => WorkflowOrchestrator::new(
                surface,
                Arc::new(HttpObjectTransfer::enrollment(
                    self.http.clone(),
                    client,
                    Arc::clone(&self.credentials),
                )),
                Arc::new(HttpDecisionClient::new(
                    self.http.clone(),
                    client,
                    Some(Arc::clone(&self.credentials)),
                )),
            ),
            Surface::Gate => WorkflowOrchestrator::new(
                surface,
                Arc::new(HttpObjectTransfer::gate(self.http.clone(), client)),
                Arc::new(HttpDecisionClient::new(self.http.clone(), client, None)),
            ),
        }
    }
}

/// Drive async work on a single-threaded runtime.
pub fn block_on<F: Future>(future: F) -> AppResult<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}
