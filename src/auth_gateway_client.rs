use crate::{config::GatewayConfig, error::ProvisioningError};
use anyhow::{Context, Result};
use log::{debug, info, warn};
#[cfg(any(test, feature = "mock"))]
use mockall::automock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use trait_variant::make;

const USER_AGENT: &str = concat!("Homebase/", env!("CARGO_PKG_VERSION"));
const INVALID_CREDENTIALS: &str = "Invalid credentials.";

/// Identity returned by the account service after a successful login
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GatewayUser {
    pub id: Value,
    pub email: String,
    pub account_type: String,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[make(Send)]
#[cfg_attr(any(test, feature = "mock"), automock)]
pub trait AuthGateway {
    async fn login(&self, email: &str, password: &str) -> Result<GatewayUser, ProvisioningError>;
}

#[derive(Clone)]
pub struct AuthGatewayClient {
    client: Client,
    login_url: String,
}

impl AuthGatewayClient {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("failed to create auth gateway HTTP client")?;

        Ok(Self {
            client,
            login_url: config.login_url.clone(),
        })
    }

    /// POST the credentials and return the raw response body
    async fn post_login(&self, email: &str, password: &str) -> Result<String> {
        info!("POST {}", self.login_url);

        let res = self
            .client
            .post(&self.login_url)
            .json(&LoginRequest { email, password })
            .send()
            .await
            .context(format!("failed to send POST request to {}", self.login_url))?;

        let status = res.status();
        let body = res.text().await.context("failed to read response body")?;
        debug!("login response status {status}");

        Ok(body)
    }
}

impl AuthGateway for AuthGatewayClient {
    async fn login(&self, email: &str, password: &str) -> Result<GatewayUser, ProvisioningError> {
        let body = self
            .post_login(email, password)
            .await
            .map_err(ProvisioningError::GatewayUnreachable)?;

        interpret_login_response(&body)
    }
}

/// Map a gateway response body onto the local success/error semantics
///
/// The success flag alone is not trusted: email and account type must be present.
pub fn interpret_login_response(body: &str) -> Result<GatewayUser, ProvisioningError> {
    let response: Value = serde_json::from_str(body)
        .context("failed to parse login response")
        .map_err(ProvisioningError::GatewayUnreachable)?;

    if response.get("success") != Some(&Value::Bool(true)) {
        let message = non_empty(response.get("error"))
            .unwrap_or_else(|| INVALID_CREDENTIALS.to_string());
        return Err(ProvisioningError::InvalidCredentials(message));
    }

    let Some(user) = response.get("user").filter(|u| u.is_object()) else {
        warn!("login succeeded without user");
        return Err(ProvisioningError::MalformedGatewayResponse);
    };

    match (
        non_empty(user.get("email")),
        non_empty(user.get("account_type")),
    ) {
        (Some(email), Some(account_type)) => Ok(GatewayUser {
            id: user.get("id").cloned().unwrap_or(Value::Null),
            email,
            account_type,
        }),
        _ => {
            warn!("login succeeded without email or account type");
            Err(ProvisioningError::MalformedGatewayResponse)
        }
    }
}

/// Non-empty string value; anything else counts as absent
fn non_empty(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
}
