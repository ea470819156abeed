//! Bearer token handling.
//!
//! Access tokens are issued by the marketplace's session system and signed with a shared HS256 secret. This server
//! only ever validates them. The claims carry the user id, email and roles, which are turned into a [`Requester`]
//! for the engine's access rules.
use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use log::*;
use order_engine::order_objects::Requester;
use serde::{Deserialize, Serialize};

use crate::{config::AuthConfig, errors::AuthError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// The session system's user id
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub roles: Vec<Role>,
    pub exp: usize,
}

impl JwtClaims {
    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::Admin)
    }

    pub fn requester(&self) -> Requester {
        let user_id = self.sub.clone();
        let email = self.email.clone();
        if self.is_admin() {
            Requester::Admin { user_id, email }
        } else {
            Requester::Account { user_id, email }
        }
    }
}

#[derive(Clone)]
pub struct TokenValidator {
    key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    pub fn new(config: &AuthConfig) -> Self {
        let key = DecodingKey::from_secret(config.jwt_secret.reveal().as_bytes());
        let validation = Validation::new(Algorithm::HS256);
        Self { key, validation }
    }

    pub fn validate(&self, token: &str) -> Result<JwtClaims, AuthError> {
        use jsonwebtoken::errors::ErrorKind;
        let data = decode::<JwtClaims>(token, &self.key, &self.validation).map_err(|e| match e.kind() {
            ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                AuthError::PoorlyFormattedToken(e.to_string())
            },
            _ => AuthError::ValidationError(e.to_string()),
        })?;
        trace!("🔐️ Access token for {} validated", data.claims.sub);
        Ok(data.claims)
    }

    /// Extracts and validates the token in an `Authorization: Bearer` header value.
    pub fn validate_header(&self, header: &str) -> Result<JwtClaims, AuthError> {
        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::PoorlyFormattedToken("Expected a Bearer token".to_string()))?;
        self.validate(token)
    }
}

/// The requester behind an HTTP request. Requests without a validated token are anonymous.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity(pub Requester);

impl Identity {
    pub fn requester(&self) -> &Requester {
        &self.0
    }
}

impl FromRequest for Identity {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let requester = req.extensions().get::<JwtClaims>().map(JwtClaims::requester).unwrap_or(Requester::Anonymous);
        ready(Ok(Identity(requester)))
    }
}
