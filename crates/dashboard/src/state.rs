//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::celcoin::{CelcoinClient, TokenError, TokenProvider};
use crate::cep::CepClient;
use crate::config::DashboardConfig;
use crate::customers::{CustomerService, LocalStore};
use crate::middleware::SESSION_EXPIRY_SECONDS;
use crate::services::DemoAuthenticator;
use crate::view::SessionTables;

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: DashboardConfig,
    http: reqwest::Client,
    tokens: TokenProvider,
    customers: CustomerService,
    cep: CepClient,
    auth: DemoAuthenticator,
    tables: SessionTables,
}

impl AppState {
    /// Create the state with the two demo customers in the fallback store.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: DashboardConfig) -> Result<Self, StateError> {
        Self::with_store(config, Arc::new(LocalStore::seeded()))
    }

    /// Create the state over an explicit fallback store.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_store(config: DashboardConfig, store: Arc<LocalStore>) -> Result<Self, StateError> {
        let http = reqwest::Client::builder()
            .timeout(config.celcoin.timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let tokens = TokenProvider::new(http.clone(), &config.celcoin);
        let customers = CustomerService::new(store, config.listing_cache_ttl);
        let cep = CepClient::new(http.clone(), config.viacep_base_url.clone());
        let auth = DemoAuthenticator::new(config.demo_user.clone());
        let tables = SessionTables::new(Duration::from_secs(SESSION_EXPIRY_SECONDS.unsigned_abs()));

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                http,
                tokens,
                customers,
                cep,
                auth,
                tables,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &DashboardConfig {
        &self.inner.config
    }

    /// Celcoin access token provider.
    #[must_use]
    pub fn tokens(&self) -> &TokenProvider {
        &self.inner.tokens
    }

    /// Customer data access layer.
    #[must_use]
    pub fn customers(&self) -> &CustomerService {
        &self.inner.customers
    }

    #[must_use]
    pub fn cep(&self) -> &CepClient {
        &self.inner.cep
    }

    #[must_use]
    pub fn auth(&self) -> &DemoAuthenticator {
        &self.inner.auth
    }

    /// Dashboard table state per session.
    #[must_use]
    pub fn tables(&self) -> &SessionTables {
        &self.inner.tables
    }

    /// A Celcoin client authenticated with a current access token.
    ///
    /// # Errors
    ///
    /// Returns `TokenError` if no token can be obtained.
    pub async fn celcoin(&self) -> Result<CelcoinClient, TokenError> {
        let token = self.inner.tokens.access_token().await?;
        Ok(CelcoinClient::new(
            self.inner.http.clone(),
            self.inner.config.celcoin.base_url.clone(),
            token,
        ))
    }
}
