use actix_web::http::header::{HeaderMap, AUTHORIZATION};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use uuid::Uuid;

use crate::{config, error_code::ErrorCode};

#[derive(Debug, thiserror::Error)]
pub(crate) enum AuthError {
    #[error("No authorization header present")]
    MissingHeader,

    #[error("Authorization header is not a bearer token")]
    MalformedHeader,

    #[error("Bearer token is invalid")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),

    #[error("Token subject is not a user id")]
    InvalidSubject(#[source] uuid::Error),
}

impl AuthError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::MissingHeader => ErrorCode::MISSING_TOKEN,
            Self::MalformedHeader | Self::InvalidToken(_) | Self::InvalidSubject(_) => {
                ErrorCode::INVALID_TOKEN
            }
        }
    }
}

#[derive(Debug, serde::Deserialize, serde::Serialize)]
struct Claims {
    sub: String,
    iss: String,
    exp: i64,
    iat: i64,
}

/// Pull the token out of an `Authorization: Bearer <token>` header
pub(crate) fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingHeader)?
        .to_str()
        .map_err(|_| AuthError::MalformedHeader)?;

    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or(AuthError::MalformedHeader)?;

    let token = token.trim();

    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::MalformedHeader);
    }

    Ok(token)
}

/// Verifies HS256 access tokens and extracts the user they were issued to
#[derive(Clone)]
pub(crate) struct Authenticator {
    key: DecodingKey,
    validation: Validation,
}

impl Authenticator {
    pub(crate) fn new(config: &config::Auth) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        Authenticator {
            key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        }
    }

    pub(crate) fn validate(&self, token: &str) -> Result<Uuid, AuthError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation)
            .map_err(AuthError::InvalidToken)?;

        data.claims.sub.parse().map_err(AuthError::InvalidSubject)
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("issuer", &self.validation.iss)
            .finish()
    }
}

#[cfg(test)]
pub(crate) fn issue_token(config: &config::Auth, user_id: Uuid, expires_in: i64) -> String {
    let now = time::OffsetDateTime::now_utc().unix_timestamp();

    let claims = Claims {
        sub: user_id.to_string(),
        iss: config.issuer.clone(),
        exp: now + expires_in,
        iat: now,
    };

    jsonwebtoken::encode(
        &jsonwebtoken::Header::new(Algorithm::HS256),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .expect("Encoded token")
}
