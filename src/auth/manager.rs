use super::{LifecycleState, Resolution};
use crate::config::{AuthConfig, ConfigSource, Settings};
use crate::credentials::{CredentialStore, Encryptor, StalenessSupervisor};
use crate::error::{Error, Result};
use crate::oauth::{OAuthFlow, RequestExecutor};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Resolves a usable access token once per run.
///
/// # Responsibilities
/// - Load or generate the secret key before anything is encrypted
/// - Reuse the latest credential while it is fresh
/// - Refresh a stale credential with its stored refresh token
/// - Run the authorization-code exchange when nothing is stored
/// - Persist every newly issued credential encrypted, as a new row
///
/// Failures are never retried and never leave a row behind.
pub struct CredentialLifecycleManager {
    encryptor: Encryptor,
    supervisor: StalenessSupervisor,
    store: Arc<dyn CredentialStore>,
    executor: Arc<dyn RequestExecutor>,
    auth: AuthConfig,
    token_url: String,
}

impl CredentialLifecycleManager {
    pub fn new(
        encryptor: Encryptor,
        supervisor: StalenessSupervisor,
        store: Arc<dyn CredentialStore>,
        executor: Arc<dyn RequestExecutor>,
        auth: AuthConfig,
        token_url: String,
    ) -> Self {
        Self {
            encryptor,
            supervisor,
            store,
            executor,
            auth,
            token_url,
        }
    }

    /// Wires a manager from a configuration source and deployment settings.
    ///
    /// Fails with `Error::Config` if a required OAuth variable is missing.
    pub fn from_config(
        config: Arc<dyn ConfigSource>,
        settings: &Settings,
        store: Arc<dyn CredentialStore>,
        executor: Arc<dyn RequestExecutor>,
    ) -> Result<Self> {
        let auth = AuthConfig::from_source(config.as_ref())?;
        Ok(Self::new(
            Encryptor::new(config),
            StalenessSupervisor::new(settings.threshold_hours)?,
            store,
            executor,
            auth,
            settings.token_url.clone(),
        ))
    }

    /// Returns a plaintext bearer token, creating or refreshing the stored
    /// credential as needed.
    pub async fn resolve_access_token(&self) -> Result<String> {
        self.resolve().await.map(|resolution| resolution.access_token)
    }

    /// Like [`resolve_access_token`](Self::resolve_access_token), also
    /// reporting which credential row was used and how it was obtained.
    pub async fn resolve(&self) -> Result<Resolution> {
        let mut trail = Vec::new();
        match self.drive(&mut trail).await {
            Ok((access_token, credential_id)) => Ok(Resolution {
                access_token,
                credential_id,
                trail,
            }),
            Err(e) => {
                enter(&mut trail, LifecycleState::Failed);
                error!(stage = e.stage(), error = %e, "Credential resolution failed");
                Err(e)
            }
        }
    }

    async fn drive(&self, trail: &mut Vec<LifecycleState>) -> Result<(String, i64)> {
        self.encryptor.ready()?;

        debug!("Searching credentials");
        let now = Utc::now();

        let flow = match self.store.latest()? {
            None => {
                enter(trail, LifecycleState::NoCredential);
                warn!("No credential found");
                enter(trail, LifecycleState::Authorizing);
                OAuthFlow::initial(&self.auth)
            }
            Some(credential) if self.supervisor.is_fresh(credential.created_at, now) => {
                enter(trail, LifecycleState::FreshCredential);
                let access_token = self.encryptor.decrypt(&credential.access_token)?;
                enter(trail, LifecycleState::Ready);
                info!(
                    credential_id = credential.id,
                    created_at = %credential.created_at,
                    "Valid credential found"
                );
                return Ok((access_token, credential.id));
            }
            Some(credential) => {
                enter(trail, LifecycleState::StaleCredential);
                warn!(
                    credential_id = credential.id,
                    created_at = %credential.created_at,
                    threshold_hours = self.supervisor.threshold().num_hours(),
                    "Stored credential expired"
                );
                let refresh_token = self.encryptor.decrypt(&credential.refresh_token)?;
                enter(trail, LifecycleState::Refreshing);
                OAuthFlow::refresh(&self.auth, refresh_token)
            }
        };

        let tokens = flow
            .execute(&self.token_url, self.executor.as_ref())
            .await?
            .ok_or_else(|| {
                Error::Authentication(format!(
                    "Token endpoint did not issue a credential ({} grant)",
                    flow.grant_type()
                ))
            })?;

        let sealed = self.encryptor.seal(&tokens)?;
        let credential = self.store.append(&sealed)?;
        enter(trail, LifecycleState::Ready);
        info!(
            credential_id = credential.id,
            grant_type = flow.grant_type(),
            created_at = %credential.created_at,
            "New credential stored"
        );

        Ok((tokens.access_token, credential.id))
    }
}

fn enter(trail: &mut Vec<LifecycleState>, state: LifecycleState) {
    debug!(
        state = ?state,
        terminal = state.is_terminal(),
        "Credential lifecycle transition"
    );
    trail.push(state);
}
