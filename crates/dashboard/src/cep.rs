//! Postal code (CEP) autofill via ViaCEP.
//!
//! `GET {base}/{cep}/json/`. Lookups never fail the caller once the CEP is
//! well formed: an unknown CEP, a provider error or no response all come
//! back as "no suggestion".

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;
use url::Url;

use cadastro_core::{AddressPatch, ValidationError, digits_only};

const CEP_DIGITS: usize = 8;

/// Address fields ViaCEP knows for a CEP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressSuggestion {
    pub street: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub zipcode: String,
}

impl From<AddressSuggestion> for AddressPatch {
    fn from(s: AddressSuggestion) -> Self {
        Self {
            street: Some(s.street),
            number: None,
            neighborhood: Some(s.neighborhood),
            city: Some(s.city),
            state: Some(s.state),
            zipcode: Some(s.zipcode),
        }
    }
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct ViaCepResponse {
    cep: String,
    logradouro: String,
    bairro: String,
    localidade: String,
    uf: String,
    /// `true`, or `"true"` on newer deployments, when the CEP is unknown.
    erro: Option<Value>,
}

impl ViaCepResponse {
    fn is_error(&self) -> bool {
        match &self.erro {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(flag)) => flag.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }
}

/// ViaCEP lookup client.
#[derive(Debug, Clone)]
pub struct CepClient {
    http: reqwest::Client,
    base_url: Url,
}

impl CepClient {
    #[must_use]
    pub const fn new(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// Look up `cep`, which may carry a mask (`01001-000`).
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` when the CEP does not have 8 digits. No
    /// request is made in that case.
    #[instrument(skip(self))]
    pub async fn lookup(&self, cep: &str) -> Result<Option<AddressSuggestion>, ValidationError> {
        let digits = digits_only(cep);
        if digits.len() != CEP_DIGITS {
            return Err(ValidationError::new("zipcode", "must have 8 digits"));
        }

        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend([digits.as_str(), "json", ""]);
        }

        let response = match self.http.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "ViaCEP unreachable");
                return Ok(None);
            }
        };

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "ViaCEP lookup failed");
            return Ok(None);
        }

        let body: ViaCepResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, "ViaCEP returned an unreadable body");
                return Ok(None);
            }
        };

        if body.is_error() {
            tracing::debug!("CEP not found");
            return Ok(None);
        }

        Ok(Some(AddressSuggestion {
            street: body.logradouro,
            neighborhood: body.bairro,
            city: body.localidade,
            state: body.uf,
            zipcode: if body.cep.is_empty() { digits } else { body.cep },
        }))
    }
}
