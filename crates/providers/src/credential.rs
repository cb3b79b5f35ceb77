//! Managed identity access tokens for Azure OpenAI.
//!
//! Tokens come from the App Service identity endpoint when the host
//! advertises one (`IDENTITY_ENDPOINT` + `IDENTITY_HEADER`), otherwise from
//! the instance metadata service. A token is reused until five minutes
//! before it expires.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;
use workshop_core::error::ProviderError;

/// Scope for Azure OpenAI data-plane tokens.
pub const COGNITIVE_SERVICES_SCOPE: &str = "https://cognitiveservices.azure.com/.default";

/// Instance metadata service token endpoint.
pub const IMDS_TOKEN_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

const TOKEN_TIMEOUT: Duration = Duration::from_secs(8);
const REFRESH_MARGIN_SECS: i64 = 300;

/// Something that can hand out bearer tokens for a scope.
#[async_trait]
pub trait TokenCredential: Send + Sync {
    async fn get_token(&self, scope: &str) -> Result<String, ProviderError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum IdentityEndpoint {
    AppService { url: String, secret: String },
    Imds { url: String },
}

struct CachedToken {
    scope: String,
    token: String,
    expires_at: DateTime<Utc>,
}

pub struct ManagedIdentityCredential {
    client: reqwest::Client,
    endpoint: IdentityEndpoint,
    client_id: Option<String>,
    cached: Mutex<Option<CachedToken>>,
}

impl ManagedIdentityCredential {
    fn with_endpoint(client: reqwest::Client, endpoint: IdentityEndpoint) -> Self {
        Self {
            client,
            endpoint,
            client_id: None,
            cached: Mutex::new(None),
        }
    }

    /// Pick the identity endpoint from environment-style settings.
    ///
    /// `AZURE_CLIENT_ID` selects a user-assigned identity.
    pub fn from_lookup(client: reqwest::Client, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let endpoint = match (get("IDENTITY_ENDPOINT"), get("IDENTITY_HEADER")) {
            (Some(url), Some(secret)) => IdentityEndpoint::AppService { url, secret },
            _ => IdentityEndpoint::Imds {
                url: IMDS_TOKEN_ENDPOINT.to_string(),
            },
        };
        let mut credential = Self::with_endpoint(client, endpoint);
        credential.client_id = get("AZURE_CLIENT_ID");
        credential
    }

    pub fn imds(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self::with_endpoint(client, IdentityEndpoint::Imds { url: url.into() })
    }

    pub fn app_service(
        client: reqwest::Client,
        url: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self::with_endpoint(
            client,
            IdentityEndpoint::AppService {
                url: url.into(),
                secret: secret.into(),
            },
        )
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    async fn fetch(&self, scope: &str) -> Result<CachedToken, ProviderError> {
        let resource = scope.trim_end_matches("/.default");
        let mut request = match &self.endpoint {
            IdentityEndpoint::AppService { url, secret } => self
                .client
                .get(url)
                .query(&[("api-version", "2019-08-01"), ("resource", resource)])
                .header("X-IDENTITY-HEADER", secret),
            IdentityEndpoint::Imds { url } => self
                .client
                .get(url)
                .query(&[("api-version", "2018-02-01"), ("resource", resource)])
                .header("Metadata", "true"),
        };
        if let Some(client_id) = &self.client_id {
            request = request.query(&[("client_id", client_id)]);
        }

        let response = request
            .timeout(TOKEN_TIMEOUT)
            .send()
            .await
            .map_err(request_failed)?;

        let status = response.status();
        let text = response.text().await.map_err(request_failed)?;

        if !status.is_success() {
            return Err(ProviderError::Authentication(format!(
                "Managed identity endpoint returned {}: {text}",
                status.as_u16()
            )));
        }

        let body: TokenResponse = serde_json::from_str(&text).map_err(|e| {
            ProviderError::Authentication(format!(
                "Managed identity response could not be decoded: {e}"
            ))
        })?;
        if body.access_token.is_empty() {
            return Err(ProviderError::Authentication(
                "Managed identity did not return an access token.".into(),
            ));
        }

        let expires_at = body.expires_at().unwrap_or_else(Utc::now);
        debug!(%expires_at, "Managed identity token acquired");

        Ok(CachedToken {
            scope: scope.to_string(),
            token: body.access_token,
            expires_at,
        })
    }
}

fn request_failed(e: reqwest::Error) -> ProviderError {
    ProviderError::Authentication(format!("Managed identity request failed: {e}"))
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    async fn get_token(&self, scope: &str) -> Result<String, ProviderError> {
        let mut cached = self.cached.lock().await;
        let refresh_after = Utc::now() + TimeDelta::seconds(REFRESH_MARGIN_SECS);
        if let Some(token) = cached.as_ref() {
            if token.scope == scope && token.expires_at > refresh_after {
                return Ok(token.token.clone());
            }
        }

        let fresh = self.fetch(scope).await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
    /// Unix seconds, sent as a string or a number depending on the endpoint
    #[serde(default)]
    expires_on: Option<serde_json::Value>,
    #[serde(default)]
    expires_in: Option<serde_json::Value>,
}

fn as_seconds(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl TokenResponse {
    fn expires_at(&self) -> Option<DateTime<Utc>> {
        if let Some(at) = self.expires_on.as_ref().and_then(as_seconds) {
            return DateTime::from_timestamp(at, 0);
        }
        let seconds = self.expires_in.as_ref().and_then(as_seconds)?;
        Some(Utc::now() + TimeDelta::seconds(seconds))
    }
}
