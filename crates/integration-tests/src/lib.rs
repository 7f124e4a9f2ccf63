//! End-to-end harness for the Cadastro dashboard.
//!
//! [`TestContext`] serves the real router on an ephemeral port, with Celcoin
//! and ViaCEP both pointed at an in-process [`httpmock::MockServer`], and
//! hands back a cookie-keeping client already signed in as the demo
//! operator.
//!
//! ```rust,ignore
//! let ctx = TestContext::start().await?;
//! ctx.mock_token().await;
//! let resp = ctx.client.get(ctx.url("/api/customers")).send().await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use cadastro_dashboard::app;
use cadastro_dashboard::config::{
    CelcoinConfig, CelcoinCredentials, DashboardConfig, DemoUserConfig,
};
use cadastro_dashboard::customers::LocalStore;
use cadastro_dashboard::state::AppState;
use httpmock::Method::POST;
use httpmock::{Mock, MockServer};
use reqwest::Client;
use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;

/// Demo operator login used by every context.
pub const DEMO_EMAIL: &str = "asoec";
pub const DEMO_PASSWORD: &str = "Kq8-teste-Wm3";

/// Access token the mocked provider issues.
pub const ACCESS_TOKEN: &str = "tok-integration";

/// Error starting the harness.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A running dashboard plus the mock standing in for its providers.
pub struct TestContext {
    /// Signed-in client with a cookie store.
    pub client: Client,
    /// Celcoin (under `/v2`) and ViaCEP (under `/ws`).
    pub provider: MockServer,
    /// Fallback store backing the running dashboard.
    pub store: Arc<LocalStore>,
    addr: SocketAddr,
}

impl TestContext {
    /// Start a dashboard over the two demo customers and sign in.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot bind or sign-in fails.
    pub async fn start() -> Result<Self, BoxError> {
        Self::start_with_store(Arc::new(LocalStore::seeded())).await
    }

    /// Start a dashboard over `store` and sign in.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot bind or sign-in fails.
    pub async fn start_with_store(store: Arc<LocalStore>) -> Result<Self, BoxError> {
        let provider = MockServer::start_async().await;
        let state = AppState::with_store(config(&provider)?, Arc::clone(&store))?;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let service = app(state).into_make_service_with_connect_info::<SocketAddr>();
            // Runs until the test's runtime shuts down.
            let _ = axum::serve(listener, service).await;
        });

        let client = Client::builder().cookie_store(true).build()?;
        let ctx = Self {
            client,
            provider,
            store,
            addr,
        };
        ctx.sign_in().await?;
        Ok(ctx)
    }

    /// Absolute URL of a dashboard path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    async fn sign_in(&self) -> Result<(), BoxError> {
        self.client
            .post(self.url("/auth/sign-in"))
            .json(&json!({ "email": DEMO_EMAIL, "password": DEMO_PASSWORD }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Mock a successful token exchange.
    pub async fn mock_token(&self) -> Mock<'_> {
        self.provider
            .mock_async(|when, then| {
                when.method(POST).path("/v2/token");
                then.status(200)
                    .json_body(json!({ "access_token": ACCESS_TOKEN, "expires_in": 3600 }));
            })
            .await
    }
}

fn config(provider: &MockServer) -> Result<DashboardConfig, BoxError> {
    Ok(DashboardConfig {
        host: "127.0.0.1".parse()?,
        port: 0,
        base_url: "http://localhost".to_string(),
        listing_cache_ttl: Duration::from_secs(300),
        celcoin: CelcoinConfig {
            base_url: Url::parse(&provider.url("/v2"))?,
            credentials: Some(CelcoinCredentials {
                client_id: "integration-client".to_string(),
                client_secret: SecretString::from("integration-client-secret"),
            }),
            timeout: Duration::from_secs(5),
        },
        viacep_base_url: Url::parse(&provider.url("/ws"))?,
        demo_user: DemoUserConfig {
            email: DEMO_EMAIL.to_string(),
            password: SecretString::from(DEMO_PASSWORD),
        },
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 1.0,
    })
}

/// A customer as Celcoin returns it.
#[must_use]
pub fn customer_json(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "document": "12345678901",
        "email": format!("cliente{id}@exemplo.com"),
        "phone": "(11) 90000-0000",
        "status": "active",
        "addresses": [],
        "createdAt": "2024-02-01T12:00:00Z",
        "updatedAt": "2024-02-01T12:00:00Z"
    })
}

/// A valid registration form.
#[must_use]
pub fn registration_json(name: &str) -> Value {
    json!({
        "name": name,
        "document": "111.444.777-35",
        "email": "ana.lima@exemplo.com",
        "phone": "(11) 98888-7777",
        "addresses": [{
            "street": "Rua Augusta",
            "number": "500",
            "neighborhood": "Consolação",
            "city": "São Paulo",
            "state": "SP",
            "zipcode": "01305-000"
        }]
    })
}
