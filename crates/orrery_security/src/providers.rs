//! # OAuth Providers
//!
//! Authorize-URL building and the code -> identity exchange.
//!
//! ```text
//! code ──POST token_url──► access_token ──GET userinfo_url──► identity
//!                                              │
//!                                   no e-mail? └─GET emails_url─► primary e-mail
//!                                                 (failure = e-mail missing)
//! ```
//!
//! The whole exchange, every round-trip included, runs under one 30 second
//! deadline (`exchange_within`).

use std::time::Duration;

use async_trait::async_trait;
use orrery_shared::{Error, ProviderIdentity, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Budget for the whole code exchange.
pub const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(30);

/// One provider's endpoints and credentials.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Browser-facing authorize endpoint.
    pub authorize_url: String,
    /// Code -> token endpoint.
    pub token_url: String,
    /// Token -> profile endpoint.
    pub userinfo_url: String,
    /// Secondary e-mail endpoint, for providers that hide the address.
    pub emails_url: Option<String>,
    /// Our callback URL, registered with the provider.
    pub redirect_url: String,
    /// Requested scopes.
    pub scopes: Vec<String>,
}

impl ProviderConfig {
    /// Authorize URL carrying `state`.
    pub fn authorize_redirect(&self, state: &str) -> Result<String> {
        let scope = self.scopes.join(" ");
        let url = reqwest::Url::parse_with_params(
            &self.authorize_url,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_url.as_str()),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("state", state),
            ],
        )
        .map_err(|e| Error::internal("invalid provider authorize_url").with_cause(e))?;
        Ok(url.into())
    }
}

/// Turns an authorization code into a provider identity.
#[async_trait]
pub trait IdentityExchange: Send + Sync {
    /// Exchanges `code` at `provider`.
    async fn exchange(
        &self,
        provider: &str,
        config: &ProviderConfig,
        code: &str,
    ) -> Result<ProviderIdentity>;
}

/// Runs `exchange` under one deadline covering every round-trip it makes.
pub async fn exchange_within(
    exchange: &dyn IdentityExchange,
    deadline: Duration,
    provider: &str,
    config: &ProviderConfig,
    code: &str,
) -> Result<ProviderIdentity> {
    tokio::time::timeout(deadline, exchange.exchange(provider, config, code))
        .await
        .map_err(|_| {
            Error::external(format!(
                "{provider} code exchange timed out after {deadline:?}"
            ))
        })?
}

// =============================================================================
// RESPONSE PARSING
// =============================================================================

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// One entry of a secondary e-mail listing.
#[derive(Clone, Debug, Deserialize)]
pub struct EmailEntry {
    /// Address.
    pub email: String,
    /// Marked primary by the provider.
    #[serde(default)]
    pub primary: bool,
    /// Verified by the provider.
    #[serde(default)]
    pub verified: bool,
}

/// Primary verified address, else the first verified one.
#[must_use]
pub fn pick_primary_email(entries: &[EmailEntry]) -> Option<String> {
    entries
        .iter()
        .find(|e| e.primary && e.verified)
        .or_else(|| entries.iter().find(|e| e.verified))
        .map(|e| e.email.clone())
}

fn non_empty_str<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Reads an identity from a profile body (`id` or `sub`, `name` or `login`).
pub fn identity_from_userinfo(provider: &str, body: &Value) -> Result<ProviderIdentity> {
    let provider_user_id = match body.get("id").or_else(|| body.get("sub")) {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => {
            return Err(Error::external(format!(
                "{provider} profile carries no user id"
            )))
        }
    };

    let email = non_empty_str(body, "email").map(str::to_string);
    let display_name = non_empty_str(body, "name")
        .or_else(|| non_empty_str(body, "login"))
        .or(email.as_deref())
        .unwrap_or(&provider_user_id)
        .to_string();

    Ok(ProviderIdentity {
        provider: provider.to_string(),
        provider_user_id,
        display_name,
        email,
    })
}

// =============================================================================
// HTTP EXCHANGE
// =============================================================================

fn upstream(context: &'static str) -> impl FnOnce(reqwest::Error) -> Error {
    move |err| {
        let message = if err.is_timeout() {
            format!("{context}: timed out")
        } else {
            context.to_string()
        };
        Error::external(message).with_cause(err)
    }
}

/// `reqwest`-backed exchange.
#[derive(Clone, Debug)]
pub struct HttpExchange {
    client: reqwest::Client,
}

impl HttpExchange {
    /// Client with the exchange timeout applied.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(EXCHANGE_TIMEOUT)
            .user_agent(concat!("orrery/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::internal("failed to build HTTP client").with_cause(e))?;
        Ok(Self { client })
    }

    async fn access_token(&self, config: &ProviderConfig, code: &str) -> Result<String> {
        let response: TokenResponse = self
            .client
            .post(&config.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("client_id", config.client_id.as_str()),
                ("client_secret", config.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", config.redirect_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(upstream("token request failed"))?
            .error_for_status()
            .map_err(upstream("token endpoint rejected the code"))?
            .json()
            .await
            .map_err(upstream("token response unreadable"))?;

        match (response.access_token, response.error) {
            (Some(token), None) => Ok(token),
            (_, Some(error)) => Err(Error::external(format!(
                "token endpoint error '{error}': {}",
                response.error_description.unwrap_or_default()
            ))),
            (None, None) => Err(Error::external("token endpoint returned no access token")),
        }
    }

    async fn get_json(&self, url: &str, token: &str, context: &'static str) -> Result<Value> {
        self.client
            .get(url)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(upstream(context))?
            .error_for_status()
            .map_err(upstream(context))?
            .json()
            .await
            .map_err(upstream(context))
    }

    /// Secondary e-mail lookup. Any failure means "no e-mail".
    async fn secondary_email(&self, url: &str, token: &str) -> Option<String> {
        let body = match self.get_json(url, token, "e-mail request failed").await {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!(error = %err, "secondary e-mail lookup failed");
                return None;
            }
        };
        match serde_json::from_value::<Vec<EmailEntry>>(body) {
            Ok(entries) => pick_primary_email(&entries),
            Err(err) => {
                tracing::warn!(error = %err, "secondary e-mail listing unreadable");
                None
            }
        }
    }
}

#[async_trait]
impl IdentityExchange for HttpExchange {
    async fn exchange(
        &self,
        provider: &str,
        config: &ProviderConfig,
        code: &str,
    ) -> Result<ProviderIdentity> {
        let token = self.access_token(config, code).await?;
        let profile = self
            .get_json(&config.userinfo_url, &token, "profile request failed")
            .await?;
        let mut identity = identity_from_userinfo(provider, &profile)?;

        if identity.email.is_none() {
            if let Some(url) = &config.emails_url {
                identity.email = self.secondary_email(url, &token).await;
            }
        }
        Ok(identity)
    }
}
