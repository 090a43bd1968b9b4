//! Error taxonomy of the provisioning operations
//!
//! Collaborators report failures as `anyhow::Error`; the controller classifies them into
//! [`ProvisioningError`] so the HTTP layer can pick a status code.

use actix_web::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisioningError {
    /// Client supplied data failed validation
    #[error("{0}")]
    InvalidInput(String),

    #[error("No Wi-Fi saved")]
    NoCredentials,

    /// No routable address observed after the settle interval; the call may be retried
    #[error("Wi-Fi not connected yet")]
    NotConnected,

    #[error("Login service unreachable: {0:#}")]
    GatewayUnreachable(#[source] anyhow::Error),

    #[error("{0}")]
    InvalidCredentials(String),

    /// Gateway reported success but omitted required user fields
    #[error("Malformed login response")]
    MalformedGatewayResponse,

    #[error("failed to apply network configuration: {0:#}")]
    NetworkApply(#[source] anyhow::Error),

    #[error("failed to persist device state: {0:#}")]
    Storage(#[source] anyhow::Error),
}

impl ProvisioningError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) | Self::NoCredentials => StatusCode::BAD_REQUEST,
            Self::NotConnected => StatusCode::CONFLICT,
            Self::InvalidCredentials(_) => StatusCode::UNAUTHORIZED,
            Self::GatewayUnreachable(_) | Self::MalformedGatewayResponse => {
                StatusCode::BAD_GATEWAY
            }
            Self::NetworkApply(_) | Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
