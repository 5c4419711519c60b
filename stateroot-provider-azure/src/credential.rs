//! Credentials for the management API
//!
//! Supports a pre-acquired bearer token and the OAuth2 client credentials
//! flow of a service principal.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::api::{ApiError, ApiResult};

/// Default authority host for the public cloud
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Tokens are refreshed this many seconds before they expire
const EXPIRY_MARGIN_SECS: i64 = 300;

/// Environment variable holding a pre-acquired management token
pub const ACCESS_TOKEN_VAR: &str = "AZURE_ACCESS_TOKEN";
pub const TENANT_ID_VAR: &str = "AZURE_TENANT_ID";
pub const CLIENT_ID_VAR: &str = "AZURE_CLIENT_ID";
pub const CLIENT_SECRET_VAR: &str = "AZURE_CLIENT_SECRET";
pub const AUTHORITY_HOST_VAR: &str = "AZURE_AUTHORITY_HOST";

/// A bearer token and its expiry
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_on: DateTime<Utc>,
}

impl AccessToken {
    /// Whether the token should be refreshed before use
    pub fn is_stale(&self) -> bool {
        Utc::now() + Duration::seconds(EXPIRY_MARGIN_SECS) >= self.expires_on
    }
}

/// Source of bearer tokens for a scope
#[async_trait]
pub trait TokenCredential: Send + Sync {
    async fn get_token(&self, scope: &str) -> ApiResult<AccessToken>;
}

/// A token acquired outside this process
pub struct StaticTokenCredential {
    token: String,
}

impl StaticTokenCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    async fn get_token(&self, _scope: &str) -> ApiResult<AccessToken> {
        // Expiry is unknown; the service rejects the token once it lapses
        Ok(AccessToken {
            token: self.token.clone(),
            expires_on: DateTime::<Utc>::MAX_UTC,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Service principal authenticating with a client secret
pub struct ClientSecretCredential {
    http: reqwest::Client,
    authority: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
    cached: Mutex<Option<AccessToken>>,
}

impl ClientSecretCredential {
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            authority: DEFAULT_AUTHORITY.to_string(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            cached: Mutex::new(None),
        }
    }

    /// Use a different authority host (sovereign clouds, tests)
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into().trim_end_matches('/').to_string();
        self
    }

    fn token_url(&self) -> String {
        format!("{}/{}/oauth2/v2.0/token", self.authority, self.tenant_id)
    }

    async fn request_token(&self, scope: &str) -> ApiResult<AccessToken> {
        let response = self
            .http
            .post(self.token_url())
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", scope),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(parsed) => ApiError::new(
                    parsed
                        .error_description
                        .unwrap_or_else(|| "token request rejected".to_string()),
                )
                .with_code(parsed.error),
                Err(_) => ApiError::new(format!("token request failed: {}", body)),
            };
            return Err(error.with_status(status.as_u16()));
        }

        let token: TokenResponse = response.json().await?;
        Ok(AccessToken {
            token: token.access_token,
            expires_on: Utc::now() + Duration::seconds(token.expires_in),
        })
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    async fn get_token(&self, scope: &str) -> ApiResult<AccessToken> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref()
            && !token.is_stale()
        {
            return Ok(token.clone());
        }

        log::debug!(
            "Requesting management token for client {} in tenant {}",
            self.client_id,
            self.tenant_id
        );
        let token = self.request_token(scope).await?;
        *cached = Some(token.clone());
        Ok(token)
    }
}

/// Pick a credential from environment variables
///
/// A static token wins; otherwise a client secret is used, authenticating
/// against `tenant_id` or, when empty, the tenant from the environment.
pub fn credential_from_env(tenant_id: &str) -> ApiResult<Arc<dyn TokenCredential>> {
    credential_from_lookup(tenant_id, |name| std::env::var(name).ok())
}

/// Same as [`credential_from_env`] with an explicit variable lookup
pub fn credential_from_lookup(
    tenant_id: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> ApiResult<Arc<dyn TokenCredential>> {
    let var = |name: &str| lookup(name).filter(|value| !value.is_empty());

    if let Some(token) = var(ACCESS_TOKEN_VAR) {
        return Ok(Arc::new(StaticTokenCredential::new(token)));
    }

    let tenant_id = if tenant_id.is_empty() {
        var(TENANT_ID_VAR)
    } else {
        Some(tenant_id.to_string())
    };

    match (tenant_id, var(CLIENT_ID_VAR), var(CLIENT_SECRET_VAR)) {
        (Some(tenant_id), Some(client_id), Some(client_secret)) => {
            let mut credential = ClientSecretCredential::new(tenant_id, client_id, client_secret);
            if let Some(authority) = var(AUTHORITY_HOST_VAR) {
                credential = credential.with_authority(authority);
            }
            Ok(Arc::new(credential))
        }
        _ => Err(ApiError::new(format!(
            "No credentials available: set {} or {}, {} and {}",
            ACCESS_TOKEN_VAR, TENANT_ID_VAR, CLIENT_ID_VAR, CLIENT_SECRET_VAR
        ))
        .with_code("CredentialUnavailable")),
    }
}
