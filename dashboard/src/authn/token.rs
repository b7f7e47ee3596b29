//! Session tokens

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::authn::users::{Principal, Role};
use crate::errors::DashboardError;

/// Claims carried by a session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: String,
    pub username: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Signs and verifies HS256 session tokens
pub struct TokenService {
    secret: Option<SecretString>,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: Option<String>, ttl_hours: i64) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()).map(SecretString::from),
            ttl: Duration::hours(ttl_hours),
        }
    }

    fn secret(&self) -> Result<&[u8], DashboardError> {
        self.secret
            .as_ref()
            .map(|s| s.expose_secret().as_bytes())
            .ok_or_else(|| DashboardError::ConfigError("JWT secret not configured".to_string()))
    }

    pub fn issue(&self, principal: &Principal) -> Result<String, DashboardError> {
        let now = Utc::now();
        let claims = Claims {
            id: principal.id.clone(),
            username: principal.username.clone(),
            role: principal.role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret()?),
        )?;
        Ok(token)
    }

    /// Verify signature and expiry
    pub fn verify(&self, token: &str) -> Result<Principal, DashboardError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret()?),
            &Validation::new(Algorithm::HS256),
        )?;
        Ok(Principal {
            id: data.claims.id,
            username: data.claims.username,
            role: data.claims.role,
        })
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("configured", &self.secret.is_some())
            .field("ttl", &self.ttl)
            .finish()
    }
}
