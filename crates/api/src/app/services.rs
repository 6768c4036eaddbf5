//! Shared request-time dependencies, built once from configuration.

use std::sync::Arc;

use gatehouse_auth::{Clock, Hs256JwtIssuer, Hs256JwtValidator, PermissionCatalog, SystemClock};
use gatehouse_infra::{DirectoryService, IdentityStore, LoginService};

use crate::config::{AppConfig, ConfigurationError, ENV_TIMEZONE};
use crate::middleware::AuthState;

pub type SharedStore = Arc<dyn IdentityStore>;

pub struct AppServices {
    pub catalog: Arc<PermissionCatalog>,
    pub store: SharedStore,
    pub login: LoginService<SharedStore>,
    pub directory: DirectoryService<SharedStore>,
    pub auth: AuthState,
}

impl AppServices {
    pub fn new(
        config: &AppConfig,
        catalog: Arc<PermissionCatalog>,
        store: SharedStore,
    ) -> Result<Self, ConfigurationError> {
        Self::with_clock(config, catalog, store, Arc::new(SystemClock))
    }

    /// Same as [`AppServices::new`] with an explicit clock for token
    /// issuance and validation.
    pub fn with_clock(
        config: &AppConfig,
        catalog: Arc<PermissionCatalog>,
        store: SharedStore,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;

        let secret = config.jwt_secret.as_bytes();
        let issuer = Hs256JwtIssuer::new(secret, config.app_name.clone(), &config.timezone).map_err(
            |e| ConfigurationError::Invalid {
                var: ENV_TIMEZONE,
                reason: e.to_string(),
            },
        )?;
        let login = LoginService::new(store.clone(), issuer, config.access_ttl, config.refresh_ttl)
            .with_clock(clock.clone());
        let directory = DirectoryService::new(store.clone(), catalog.clone());
        let auth = AuthState {
            jwt: Arc::new(Hs256JwtValidator::new(secret)),
            clock,
        };

        Ok(Self {
            catalog,
            store,
            login,
            directory,
            auth,
        })
    }
}
