//! Service wiring: identity store, token service, hasher and seed data.

use std::sync::Arc;

use anyhow::Context;

use usergate_auth::{Argon2Hasher, CredentialHasher, Hs256TokenService, TokenService};
use usergate_infra::{Fixture, InMemoryIdentityStore, bootstrap_admin};

use crate::config::ApiConfig;
use crate::gateway::{Gateway, GatewayError, GatewayResult};

pub type AppGateway = Gateway<InMemoryIdentityStore>;

pub struct AppServices {
    pub gateway: AppGateway,
}

/// Run a gateway call off the async runtime. Used for operations that hash
/// or verify passwords.
pub async fn blocking<T, F>(services: &Arc<AppServices>, f: F) -> GatewayResult<T>
where
    T: Send + 'static,
    F: FnOnce(&AppGateway) -> GatewayResult<T> + Send + 'static,
{
    let services = Arc::clone(services);
    tokio::task::spawn_blocking(move || f(&services.gateway))
        .await
        .map_err(|e| GatewayError::Internal(e.to_string()))?
}

pub fn build_services(config: &ApiConfig) -> anyhow::Result<AppServices> {
    let store = Arc::new(InMemoryIdentityStore::new());
    let hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2Hasher::new(config.password_policy));
    let tokens: Arc<dyn TokenService> = Arc::new(Hs256TokenService::new(
        config.jwt_secret.as_bytes(),
        config.access_token_duration(),
        config.refresh_token_duration(),
    ));

    if let Some(path) = &config.fixtures {
        Fixture::from_path(path)
            .and_then(|fixture| fixture.load_into(&*store, &*hasher))
            .with_context(|| format!("loading fixtures from {}", path.display()))?;
    }

    if let Some((username, password)) = &config.bootstrap_admin {
        bootstrap_admin(&*store, &*hasher, username, password)
            .context("creating bootstrap administrator")?;
    }

    Ok(AppServices {
        gateway: Gateway::new(store, tokens, hasher),
    })
}
