//! Caller identity extraction.
//!
//! State-changing routes act on behalf of the identity named in the
//! `x-caller-identity` header. The gateway trusts the header as given;
//! authentication happens in front of it.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::domain::Identity;
use crate::error::GatewayError;

/// Header carrying the caller identity.
pub const CALLER_HEADER: &str = "x-caller-identity";

/// Identity of the caller of a state-changing request.
#[derive(Debug, Clone)]
pub struct Caller(pub Identity);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(CALLER_HEADER)
            .ok_or(GatewayError::MissingCallerIdentity)?
            .to_str()
            .map_err(|_| GatewayError::InvalidIdentity("header is not visible ASCII".to_string()))?;
        Identity::parse(raw).map(Self)
    }
}
