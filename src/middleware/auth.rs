//! Identity extraction middleware
//!
//! The platform's identity provider issues bearer tokens elsewhere; this
//! module only verifies them and hands the core an opaque party ID plus a
//! role. No credential management lives here.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Verification secret shared with the identity provider
#[derive(Clone)]
pub struct JwtSecret(pub String);

/// Party role carried in the token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartyRole {
    Rider,
    Captain,
}

/// Token claims issued by the identity provider
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Opaque party ID
    pub sub: String,
    /// "rider" or "captain"
    pub role: String,
    pub exp: i64,
}

/// Authenticated rider identity
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedRider {
    pub rider_id: Uuid,
}

/// Authenticated captain identity
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedCaptain {
    pub captain_id: Uuid,
}

/// Error response for authentication failures
#[derive(Debug, Serialize)]
struct AuthError {
    error: AuthErrorDetails,
}

#[derive(Debug, Serialize)]
struct AuthErrorDetails {
    code: String,
    message: String,
}

impl AuthError {
    fn new(code: &str, message: &str) -> Self {
        Self {
            error: AuthErrorDetails {
                code: code.to_string(),
                message: message.to_string(),
            },
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, Json(self)).into_response()
    }
}

async fn verify_bearer<S>(parts: &mut Parts, state: &S) -> Result<(Uuid, PartyRole), Response>
where
    JwtSecret: FromRef<S>,
    S: Send + Sync,
{
    let TypedHeader(Authorization(bearer)) =
        TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
            .await
            .map_err(|_| {
                AuthError::new(
                    "MISSING_TOKEN",
                    "Authorization header with Bearer token required",
                )
                .into_response()
            })?;

    let secret = JwtSecret::from_ref(state);

    let token_data = decode::<Claims>(
        bearer.token(),
        &DecodingKey::from_secret(secret.0.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        let (code, message) = match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                ("TOKEN_EXPIRED", "Token has expired")
            }
            _ => ("INVALID_TOKEN", "Invalid token"),
        };
        AuthError::new(code, message).into_response()
    })?;

    let party_id = Uuid::parse_str(&token_data.claims.sub).map_err(|_| {
        AuthError::new("INVALID_TOKEN", "Invalid party ID in token").into_response()
    })?;

    let role = match token_data.claims.role.as_str() {
        "rider" => PartyRole::Rider,
        "captain" => PartyRole::Captain,
        _ => {
            return Err(AuthError::new("INVALID_TOKEN", "Invalid role in token").into_response());
        }
    };

    Ok((party_id, role))
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedRider
where
    JwtSecret: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let (party_id, role) = verify_bearer(parts, state).await?;

        if role != PartyRole::Rider {
            return Err(AuthError::new("WRONG_ROLE", "Rider token required").into_response());
        }

        Ok(AuthenticatedRider { rider_id: party_id })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedCaptain
where
    JwtSecret: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let (party_id, role) = verify_bearer(parts, state).await?;

        if role != PartyRole::Captain {
            return Err(AuthError::new("WRONG_ROLE", "Captain token required").into_response());
        }

        Ok(AuthenticatedCaptain {
            captain_id: party_id,
        })
    }
}
