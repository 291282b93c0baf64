use actix_web::HttpMessage;
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::str::FromStr;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::models::Token;

const ISSUER: &str = "flights-posting-api";

/// Which half of a token pair a JWT is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // User email
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
    pub jti: String,
    pub kind: TokenKind,
}

/// Problems turning the auth settings into signing keys
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("unsupported JWT algorithm {0:?}")]
    UnsupportedAlgorithm(String),

    #[error("{setting} must be set when ALGORITHM is {algorithm:?}")]
    MissingSetting { setting: &'static str, algorithm: Algorithm },

    #[error("cannot read key file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid key in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: jsonwebtoken::errors::Error,
    },
}

/// Authentication service
pub struct AuthService {
    config: AuthConfig,
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl AuthService {
    /// Build the service, loading PEM key files for asymmetric algorithms
    /// or the shared secret for HMAC ones.
    pub fn new(config: AuthConfig) -> Result<Self, KeyError> {
        let algorithm = Algorithm::from_str(config.algorithm.trim())
            .map_err(|_| KeyError::UnsupportedAlgorithm(config.algorithm.clone()))?;

        let (encoding_key, decoding_key) = match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                let secret = config
                    .jwt_secret
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .ok_or(KeyError::MissingSetting { setting: "JWT_SECRET", algorithm })?;
                (
                    EncodingKey::from_secret(secret.as_bytes()),
                    DecodingKey::from_secret(secret.as_bytes()),
                )
            }
            _ => {
                let private_path = config
                    .private_key_path
                    .as_deref()
                    .ok_or(KeyError::MissingSetting { setting: "PRIVATE_KEY_PATH", algorithm })?;
                let public_path = config
                    .public_key_path
                    .as_deref()
                    .ok_or(KeyError::MissingSetting { setting: "PUBLIC_KEY_PATH", algorithm })?;
                let private_pem = read_key(private_path)?;
                let public_pem = read_key(public_path)?;
                pem_keys(algorithm, &private_pem, private_path, &public_pem, public_path)?
            }
        };

        Ok(Self {
            config,
            algorithm,
            encoding_key,
            decoding_key,
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Hash a password using bcrypt
    pub fn hash_password(&self, password: &str) -> Result<String, bcrypt::BcryptError> {
        bcrypt::hash(password, self.config.bcrypt_cost)
    }

    /// Verify a password against its hash
    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
        bcrypt::verify(password, hash)
    }

    /// Issue a fresh access/refresh pair for the given account email
    pub fn issue_tokens(&self, email: &str) -> Result<Token, jsonwebtoken::errors::Error> {
        let access_token = self.sign(email, TokenKind::Access, self.config.access_token_expire_minutes)?;
        let refresh_token = self.sign(email, TokenKind::Refresh, self.config.refresh_token_expire_minutes)?;

        Ok(Token {
            access_token,
            refresh_token: Some(refresh_token),
            token_type: "bearer".to_string(),
        })
    }

    fn sign(&self, email: &str, kind: TokenKind, minutes: i64) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = Claims {
            sub: email.to_string(),
            exp: (now + Duration::minutes(minutes)).timestamp(),
            iat: now.timestamp(),
            iss: ISSUER.to_string(),
            jti: Uuid::new_v4().to_string(),
            kind,
        };
        encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
    }

    fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(self.algorithm);
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "sub", "iat"]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)?;
        if token_data.claims.kind != expected {
            return Err(ErrorKind::InvalidToken.into());
        }
        Ok(token_data.claims)
    }

    /// Validate and decode an access token
    pub fn verify_access(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        self.verify(token, TokenKind::Access)
    }

    /// Validate and decode a refresh token
    pub fn verify_refresh(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        self.verify(token, TokenKind::Refresh)
    }
}

fn read_key(path: &str) -> Result<Vec<u8>, KeyError> {
    fs::read(path).map_err(|source| KeyError::Read {
        path: path.to_string(),
        source,
    })
}

fn pem_keys(
    algorithm: Algorithm,
    private_pem: &[u8],
    private_path: &str,
    public_pem: &[u8],
    public_path: &str,
) -> Result<(EncodingKey, DecodingKey), KeyError> {
    let parse_err = |path: &str| {
        let path = path.to_string();
        move |source: jsonwebtoken::errors::Error| KeyError::Parse { path, source }
    };

    let keys = match algorithm {
        Algorithm::ES256 | Algorithm::ES384 => (
            EncodingKey::from_ec_pem(private_pem).map_err(parse_err(private_path))?,
            DecodingKey::from_ec_pem(public_pem).map_err(parse_err(public_path))?,
        ),
        Algorithm::EdDSA => (
            EncodingKey::from_ed_pem(private_pem).map_err(parse_err(private_path))?,
            DecodingKey::from_ed_pem(public_pem).map_err(parse_err(public_path))?,
        ),
        // RS* and PS*
        _ => (
            EncodingKey::from_rsa_pem(private_pem).map_err(parse_err(private_path))?,
            DecodingKey::from_rsa_pem(public_pem).map_err(parse_err(public_path))?,
        ),
    };
    Ok(keys)
}

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    let (scheme, token) = auth_header.trim().split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() {
        Some(token.trim())
    } else {
        None
    }
}

/// Extract token from request headers
pub fn extract_token_from_request(req: &impl HttpMessage) -> Option<String> {
    // Try Authorization header first
    if let Some(auth_header) = req.headers().get("authorization") {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = extract_bearer_token(auth_str) {
                return Some(token.to_string());
            }
        }
    }

    // Try cookie as fallback
    if let Some(cookie_header) = req.headers().get("cookie") {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                if let Some(token) = cookie.trim().strip_prefix("access_token=") {
                    return Some(token.to_string());
                }
            }
        }
    }

    None
}

/// Sliding-window request counter keyed by client address
pub struct RateLimitStore {
    requests: HashMap<String, Vec<i64>>,
}

impl Default for RateLimitStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitStore {
    pub fn new() -> Self {
        Self {
            requests: HashMap::new(),
        }
    }

    pub fn is_allowed(&mut self, key: &str, max_requests: u32, window_seconds: u64) -> bool {
        self.is_allowed_at(key, max_requests, window_seconds, Utc::now().timestamp())
    }

    fn is_allowed_at(&mut self, key: &str, max_requests: u32, window_seconds: u64, now: i64) -> bool {
        let window_start = now - window_seconds as i64;

        let client_requests = self.requests.entry(key.to_string()).or_default();

        // Remove old requests outside the window
        client_requests.retain(|&timestamp| timestamp > window_start);

        if client_requests.len() >= max_requests as usize {
            return false;
        }

        client_requests.push(now);
        true
    }

    /// Drop clients with no requests inside the window
    pub fn cleanup(&mut self, window_seconds: u64) {
        let window_start = Utc::now().timestamp() - window_seconds as i64;

        self.requests.retain(|_, timestamps| {
            timestamps.retain(|&timestamp| timestamp > window_start);
            !timestamps.is_empty()
        });
    }

    pub fn tracked_clients(&self) -> usize {
        self.requests.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hs_config() -> AuthConfig {
        AuthConfig {
            algorithm: "HS256".to_string(),
            private_key_path: None,
            public_key_path: None,
            jwt_secret: Some("unit-test-secret".to_string()),
            access_token_expire_minutes: 30,
            refresh_token_expire_minutes: 60,
            bcrypt_cost: 4,
        }
    }

    #[test]
    fn access_token_round_trip() {
        let auth = AuthService::new(hs_config()).unwrap();
        let token = auth.issue_tokens("pilot@example.com").unwrap();
        assert_eq!(token.token_type, "bearer");

        let claims = auth.verify_access(&token.access_token).unwrap();
        assert_eq!(claims.sub, "pilot@example.com");
        assert_eq!(claims.kind, TokenKind::Access);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn token_kinds_are_not_interchangeable() {
        let auth = AuthService::new(hs_config()).unwrap();
        let token = auth.issue_tokens("pilot@example.com").unwrap();
        let refresh = token.refresh_token.unwrap();

        assert!(auth.verify_access(&refresh).is_err());
        assert!(auth.verify_refresh(&token.access_token).is_err());
        assert_eq!(auth.verify_refresh(&refresh).unwrap().kind, TokenKind::Refresh);
    }

    #[test]
    fn expired_token_is_rejected() {
        let mut config = hs_config();
        config.access_token_expire_minutes = -10;
        let auth = AuthService::new(config).unwrap();
        let token = auth.issue_tokens("pilot@example.com").unwrap();
        assert!(auth.verify_access(&token.access_token).is_err());
    }

    #[test]
    fn token_from_another_secret_is_rejected() {
        let auth = AuthService::new(hs_config()).unwrap();
        let mut other = hs_config();
        other.jwt_secret = Some("someone-else".to_string());
        let forged = AuthService::new(other).unwrap().issue_tokens("pilot@example.com").unwrap();
        assert!(auth.verify_access(&forged.access_token).is_err());
    }

    #[test]
    fn key_setup_errors() {
        let mut config = hs_config();
        config.jwt_secret = None;
        assert!(matches!(AuthService::new(config), Err(KeyError::MissingSetting { setting: "JWT_SECRET", .. })));

        let mut config = hs_config();
        config.algorithm = "HS999".to_string();
        assert!(matches!(AuthService::new(config), Err(KeyError::UnsupportedAlgorithm(_))));

        let mut config = hs_config();
        config.algorithm = "RS256".to_string();
        assert!(matches!(AuthService::new(config), Err(KeyError::MissingSetting { setting: "PRIVATE_KEY_PATH", .. })));

        let mut config = hs_config();
        config.algorithm = "RS256".to_string();
        config.private_key_path = Some("/nonexistent/private.pem".to_string());
        config.public_key_path = Some("/nonexistent/public.pem".to_string());
        match AuthService::new(config) {
            Err(err @ KeyError::Read { .. }) => assert!(err.to_string().contains("/nonexistent/private.pem")),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("missing key file accepted"),
        }
    }

    #[test]
    fn password_hash_and_verify() {
        let auth = AuthService::new(hs_config()).unwrap();
        let hash = auth.hash_password("runway-27L").unwrap();
        assert!(auth.verify_password("runway-27L", &hash).unwrap());
        assert!(!auth.verify_password("runway-09R", &hash).unwrap());
    }

    #[test]
    fn bearer_extraction() {
        assert_eq!(extract_bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer_token("bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer_token("Basic dXNlcg=="), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
    }

    #[test]
    fn rate_limit_window_slides() {
        let mut store = RateLimitStore::new();
        assert!(store.is_allowed_at("10.0.0.1", 2, 60, 1_000));
        assert!(store.is_allowed_at("10.0.0.1", 2, 60, 1_010));
        assert!(!store.is_allowed_at("10.0.0.1", 2, 60, 1_020));
        assert!(store.is_allowed_at("10.0.0.2", 2, 60, 1_020));
        // first request has left the window
        assert!(store.is_allowed_at("10.0.0.1", 2, 60, 1_061));
        assert_eq!(store.tracked_clients(), 2);
    }
}
