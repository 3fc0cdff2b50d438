//! Bearer token verification and request identity extractors

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use ballotbox_core::{
    AuthConfig, BallotError, BallotResult, Identity, IdentityProvider, Role, Voter, VoterId,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};

use crate::api::{ApiError, ApiState};

/// Token claims issued by the identity provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Voter id
    pub sub: String,
    #[serde(default)]
    pub role: Role,
    pub exp: usize,
}

/// HS256 verifier for identity provider tokens
pub struct JwtIdentityProvider {
    key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityProvider {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway_secs;

        Self {
            key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        }
    }
}

impl IdentityProvider for JwtIdentityProvider {
    fn identify(&self, bearer: &str) -> BallotResult<Identity> {
        let claims = decode::<Claims>(bearer, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => BallotError::Unauthorized("token expired".into()),
                _ => BallotError::Unauthorized("invalid token".into()),
            })?;

        let subject = claims.sub.trim();
        if subject.is_empty() {
            return Err(BallotError::Unauthorized("token has no subject".into()));
        }

        Ok(Identity::new(VoterId::new(subject), claims.role))
    }
}

/// Sign a token the way the identity provider does. Used by the `token`
/// command for local setups and by tests.
pub fn issue_token(secret: &str, voter: &str, role: Role, ttl: Duration) -> BallotResult<String> {
    let exp = Utc::now()
        .checked_add_signed(ttl)
        .ok_or_else(|| BallotError::InvalidInput("token lifetime out of range".into()))?
        .timestamp();

    let claims = Claims {
        sub: voter.to_string(),
        role,
        exp: exp as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| BallotError::Internal(format!("token signing failed: {}", e)))
}

fn bearer_token(headers: &HeaderMap) -> BallotResult<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| BallotError::Unauthorized("token missing".into()))
}

/// A verified caller together with their voter record
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub identity: Identity,
    pub voter: Voter,
}

#[async_trait]
impl FromRequestParts<ApiState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, runtime: &ApiState) -> Result<Self, ApiError> {
        let identity = runtime.identify(bearer_token(&parts.headers)?)?;
        let voter = runtime.resolve_voter(&identity).await?;
        Ok(Self { identity, voter })
    }
}

/// A verified caller holding the admin role
#[derive(Debug, Clone)]
pub struct AdminOnly(pub Identity);

#[async_trait]
impl FromRequestParts<ApiState> for AdminOnly {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, runtime: &ApiState) -> Result<Self, ApiError> {
        let identity = runtime.identify(bearer_token(&parts.headers)?)?;
        if !identity.role.is_admin() {
            return Err(BallotError::Forbidden("admin role required".into()).into());
        }
        runtime.resolve_voter(&identity).await?;
        Ok(Self(identity))
    }
}
