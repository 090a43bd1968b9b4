use crate::{
    error::ProvisioningError,
    services::provisioning::{AuthenticatedUser, Status},
};
use actix_web::HttpResponse;
use log::error;
use serde::Serialize;
use std::net::IpAddr;

#[derive(Serialize)]
struct Success<T: Serialize> {
    success: bool,
    #[serde(flatten)]
    data: T,
}

#[derive(Serialize)]
pub struct Failure {
    pub success: bool,
    pub error: String,
}

impl Failure {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

#[derive(Serialize)]
struct Empty {}

#[derive(Serialize)]
struct Connected {
    ip: IpAddr,
}

#[derive(Serialize)]
struct LoggedIn {
    user: AuthenticatedUser,
}

/// Trait for converting service results into HTTP responses
pub trait ServiceResultResponse {
    fn into_response(self) -> HttpResponse;
}

impl ServiceResultResponse for () {
    fn into_response(self) -> HttpResponse {
        success(Empty {})
    }
}

impl ServiceResultResponse for IpAddr {
    fn into_response(self) -> HttpResponse {
        success(Connected { ip: self })
    }
}

impl ServiceResultResponse for AuthenticatedUser {
    fn into_response(self) -> HttpResponse {
        success(LoggedIn { user: self })
    }
}

/// Status is reported as-is, without the success envelope
impl ServiceResultResponse for Status {
    fn into_response(self) -> HttpResponse {
        HttpResponse::Ok().json(self)
    }
}

fn success<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(Success {
        success: true,
        data,
    })
}

/// Handle Result and convert data or error to a Response
///
/// Errors are logged with the operation name and answered with the status code of their
/// class and a `{success:false, error}` body.
///
/// # Arguments
/// * `result` - The Result to handle
/// * `operation` - Name of the operation, used for logging
pub fn handle_service_result<T>(result: Result<T, ProvisioningError>, operation: &str) -> HttpResponse
where
    T: ServiceResultResponse,
{
    match result {
        Ok(data) => data.into_response(),
        Err(e) => {
            error!("{operation} failed: {e}");
            HttpResponse::build(e.status_code()).json(Failure::new(e.to_string()))
        }
    }
}
