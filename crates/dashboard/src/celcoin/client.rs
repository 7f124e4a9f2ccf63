//! Celcoin customer endpoints over HTTP.

use async_trait::async_trait;
use cadastro_core::{
    AddressId, AddressPatch, Customer, CustomerId, CustomerPatch, NewAddress, NewCustomer,
};
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::instrument;
use url::Url;

use super::{CelcoinError, CustomerApi, UpdateMethod};

/// Longest response body kept on an error.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Authenticated client for the Celcoin customer endpoints.
///
/// Every request carries `Authorization: Bearer <token>` and
/// `Content-Type: application/json`. The timeout is whatever the shared
/// `reqwest::Client` was built with.
#[derive(Clone)]
pub struct CelcoinClient {
    http: reqwest::Client,
    base_url: Url,
    token: SecretString,
}

impl std::fmt::Debug for CelcoinClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CelcoinClient")
            .field("base_url", &self.base_url.as_str())
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// `GET /customers` answers either `{ "items": [...] }` or a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListBody {
    Items { items: Vec<Customer> },
    Bare(Vec<Customer>),
}

/// Write endpoints answer either `{ "customer": {...} }` or the bare record.
#[derive(Deserialize)]
#[serde(untagged)]
enum CustomerBody {
    Wrapped { customer: Customer },
    Bare(Customer),
}

impl CelcoinClient {
    /// Create a client that authenticates with `token`.
    #[must_use]
    pub const fn new(http: reqwest::Client, base_url: Url, token: SecretString) -> Self {
        Self {
            http,
            base_url,
            token,
        }
    }

    /// Build `{base}/{segments...}`, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, CelcoinError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                CelcoinError::Unreachable(format!("invalid base URL: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(self.token.expose_secret())
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
    }

    /// Send a request and return the body of a success response.
    async fn send(&self, request: RequestBuilder) -> Result<String, CelcoinError> {
        let response = request
            .send()
            .await
            .map_err(|e| CelcoinError::Unreachable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CelcoinError::Unreachable(e.to_string()))?;

        if !status.is_success() {
            tracing::debug!(
                status = %status,
                body = %body.chars().take(MAX_ERROR_BODY_CHARS).collect::<String>(),
                "Celcoin returned non-success status"
            );
            return Err(CelcoinError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        Ok(body)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, CelcoinError> {
        let body = self.send(request).await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(MAX_ERROR_BODY_CHARS).collect::<String>(),
                "Failed to parse Celcoin response"
            );
            CelcoinError::Decode(e.to_string())
        })
    }

    async fn send_customer(&self, request: RequestBuilder) -> Result<Customer, CelcoinError> {
        match self.send_json::<CustomerBody>(request).await? {
            CustomerBody::Wrapped { customer } | CustomerBody::Bare(customer) => Ok(customer),
        }
    }
}

#[async_trait]
impl CustomerApi for CelcoinClient {
    #[instrument(skip(self))]
    async fn list_customers(&self) -> Result<Vec<Customer>, CelcoinError> {
        let url = self.endpoint(&["customers"])?;
        match self.send_json::<ListBody>(self.request(Method::GET, url)).await? {
            ListBody::Items { items } => Ok(items),
            ListBody::Bare(items) => Ok(items),
        }
    }

    #[instrument(skip(self, input))]
    async fn create_customer(&self, input: &NewCustomer) -> Result<Customer, CelcoinError> {
        let url = self.endpoint(&["customers"])?;
        self.send_customer(self.request(Method::POST, url).json(input))
            .await
    }

    #[instrument(skip(self, patch), fields(customer_id = %id, http_method = method.as_str()))]
    async fn update_customer(
        &self,
        id: &CustomerId,
        patch: &CustomerPatch,
        method: UpdateMethod,
    ) -> Result<Customer, CelcoinError> {
        let url = self.endpoint(&["customers", id.as_str()])?;
        self.send_customer(self.request(verb(method), url).json(patch))
            .await
    }

    #[instrument(skip(self), fields(customer_id = %id))]
    async fn delete_customer(&self, id: &CustomerId) -> Result<(), CelcoinError> {
        let url = self.endpoint(&["customers", id.as_str()])?;
        self.send(self.request(Method::DELETE, url)).await?;
        Ok(())
    }

    #[instrument(skip(self, input), fields(customer_id = %customer_id))]
    async fn add_address(
        &self,
        customer_id: &CustomerId,
        input: &NewAddress,
    ) -> Result<Customer, CelcoinError> {
        let url = self.endpoint(&["customers", customer_id.as_str(), "addresses"])?;
        self.send_customer(self.request(Method::POST, url).json(input))
            .await
    }

    #[instrument(
        skip(self, patch),
        fields(customer_id = %customer_id, address_id = %address_id, http_method = method.as_str())
    )]
    async fn update_address(
        &self,
        customer_id: &CustomerId,
        address_id: &AddressId,
        patch: &AddressPatch,
        method: UpdateMethod,
    ) -> Result<Customer, CelcoinError> {
        let url = self.endpoint(&[
            "customers",
            customer_id.as_str(),
            "addresses",
            address_id.as_str(),
        ])?;
        self.send_customer(self.request(verb(method), url).json(patch))
            .await
    }

    #[instrument(skip(self), fields(customer_id = %customer_id, address_id = %address_id))]
    async fn delete_address(
        &self,
        customer_id: &CustomerId,
        address_id: &AddressId,
    ) -> Result<(), CelcoinError> {
        let url = self.endpoint(&[
            "customers",
            customer_id.as_str(),
            "addresses",
            address_id.as_str(),
        ])?;
        self.send(self.request(Method::DELETE, url)).await?;
        Ok(())
    }
}

const fn verb(method: UpdateMethod) -> Method {
    match method {
        UpdateMethod::Put => Method::PUT,
        UpdateMethod::Patch => Method::PATCH,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    fn customer_json(id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "name": "João Silva",
            "document": "12345678901",
            "email": "joao@exemplo.com",
            "status": "active",
            "createdAt": "2024-01-15T10:30:00Z",
            "updatedAt": "2024-01-15T10:30:00Z"
        })
    }

    fn client(server: &MockServer) -> CelcoinClient {
        CelcoinClient::new(
            reqwest::Client::new(),
            Url::parse(&server.base_url()).unwrap(),
            SecretString::from("tok-123"),
        )
    }

    #[tokio::test]
    async fn test_list_accepts_items_envelope() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/customers")
                .header("authorization", "Bearer tok-123")
                .header("content-type", "application/json");
            then.status(200)
                .json_body(json!({ "items": [customer_json("1"), customer_json("2")] }));
        });

        let customers = client(&server).list_customers().await.unwrap();

        mock.assert();
        assert_eq!(customers.len(), 2);
        assert_eq!(customers[1].id.as_str(), "2");
    }

    #[tokio::test]
    async fn test_list_accepts_bare_array() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/customers");
            then.status(200).json_body(json!([customer_json("7")]));
        });

        let customers = client(&server).list_customers().await.unwrap();
        assert_eq!(customers[0].id.as_str(), "7");
    }

    #[tokio::test]
    async fn test_base_path_is_preserved() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(DELETE).path("/v2/customers/42");
            then.status(204);
        });

        let client = CelcoinClient::new(
            reqwest::Client::new(),
            Url::parse(&server.url("/v2")).unwrap(),
            SecretString::from("tok-123"),
        );
        client.delete_customer(&CustomerId::new("42")).await.unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn test_write_accepts_wrapped_customer() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(PATCH)
                .path("/customers/1")
                .json_body(json!({ "email": "novo@exemplo.com" }));
            then.status(200)
                .json_body(json!({ "customer": customer_json("1") }));
        });

        let patch = CustomerPatch {
            email: Some("novo@exemplo.com".to_string()),
            ..CustomerPatch::default()
        };
        let customer = client(&server)
            .update_customer(&CustomerId::new("1"), &patch, UpdateMethod::Patch)
            .await
            .unwrap();

        mock.assert();
        assert_eq!(customer.id.as_str(), "1");
    }

    #[tokio::test]
    async fn test_error_status_keeps_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/customers");
            then.status(422).body("document already registered");
        });

        let err = client(&server)
            .create_customer(&NewCustomer::default())
            .await
            .unwrap_err();

        match err {
            CelcoinError::Status { status, body } => {
                assert_eq!(status, 422);
                assert_eq!(body, "document already registered");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unexpected_shape_is_decode_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/customers/1/addresses");
            then.status(201).json_body(json!({ "ok": true }));
        });

        let err = client(&server)
            .add_address(&CustomerId::new("1"), &NewAddress::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CelcoinError::Decode(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_unreachable() {
        // Port 9 (discard) is not listening on test hosts.
        let client = CelcoinClient::new(
            reqwest::Client::new(),
            Url::parse("http://127.0.0.1:9").unwrap(),
            SecretString::from("tok-123"),
        );
        let err = client.list_customers().await.unwrap_err();
        assert!(err.is_unreachable());
    }

    #[test]
    fn test_debug_redacts_token() {
        let client = CelcoinClient::new(
            reqwest::Client::new(),
            Url::parse("https://api.sandbox.cel.cash/v2").unwrap(),
            SecretString::from("tok-very-secret"),
        );
        let output = format!("{client:?}");
        assert!(output.contains("api.sandbox.cel.cash"));
        assert!(!output.contains("tok-very-secret"));
    }
}
