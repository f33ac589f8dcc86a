//! Signed bearer tokens
//!
//! Session and step-up tokens are stateless JWTs: validity is purely a
//! function of the signature and the embedded claims, so verification never
//! touches the store. Step-up tokens carry `purpose = "mfa"` and the source
//! IP they were issued to; the purpose claim is what prevents a step-up
//! token from ever being accepted as a session token.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::ErrorKind,
};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    account::{Account, UserId},
    error::{TokenError, ValidationError},
};

/// What a token is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenPurpose {
    /// Full session token, accepted by the request-authentication layer.
    #[serde(rename = "session")]
    Session,
    /// Step-up token issued after password success; only completes MFA.
    #[serde(rename = "mfa")]
    StepUp,
}

/// Claims embedded in every vigil token.
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject - user ID
    pub sub: String,
    /// What this token may be used for
    pub purpose: TokenPurpose,
    /// Issued at in seconds (as UTC timestamp)
    pub iat: i64,
    /// Expiration time in seconds (as UTC timestamp)
    pub exp: i64,
    /// Account email, present on session tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Issuer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Source IP the token is bound to (step-up tokens only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

impl JwtClaims {
    /// Claims for a full session token.
    pub fn session(account: &Account, issuer: Option<String>, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: account.id.to_string(),
            purpose: TokenPurpose::Session,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            email: Some(account.email.clone()),
            iss: issuer,
            ip: None,
        }
    }

    /// Claims for an IP-bound step-up token.
    pub fn step_up(user_id: &UserId, ip: &str, issuer: Option<String>, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id.to_string(),
            purpose: TokenPurpose::StepUp,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            email: None,
            iss: issuer,
            ip: Some(ip.to_string()),
        }
    }

    pub fn user_id(&self) -> UserId {
        UserId::from(self.sub.as_str())
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_else(Utc::now)
    }
}

/// A signed bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthToken(String);

impl AuthToken {
    /// Sign `claims` into a token with the configured algorithm.
    pub fn sign(claims: &JwtClaims, config: &JwtConfig) -> Result<Self, Error> {
        let header = Header::new(config.jwt_algorithm());
        let encoding_key = config.get_encoding_key()?;

        let token = encode(&header, claims, &encoding_key)
            .map_err(|e| TokenError::Invalid(format!("Failed to encode JWT: {e}")))?;

        Ok(AuthToken(token))
    }

    /// Verify the signature and expiry, returning the claims.
    ///
    /// Expired tokens map to [`TokenError::Expired`]; any other tampering or
    /// malformation maps to [`TokenError::Invalid`].
    pub fn verify(&self, config: &JwtConfig) -> Result<JwtClaims, Error> {
        let decoding_key = config.get_decoding_key()?;
        let validation = config.get_validation();

        let token_data =
            decode::<JwtClaims>(&self.0, &decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    ErrorKind::ExpiredSignature => TokenError::Expired,
                    _ => TokenError::Invalid(format!("JWT validation failed: {e}")),
                }
            })?;

        Ok(token_data.claims)
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for AuthToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AuthToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// JWT algorithm type
#[derive(Debug, Clone)]
pub enum JwtAlgorithm {
    /// RS256 - RSA with SHA-256
    RS256 {
        /// Private key for signing JWTs (PEM format)
        private_key: Vec<u8>,
        /// Public key for verifying JWTs (PEM format)
        public_key: Vec<u8>,
    },
    /// HS256 - HMAC with SHA-256
    HS256 {
        /// Secret key for both signing and verifying
        secret_key: Vec<u8>,
    },
}

/// Configuration for signing and verifying tokens.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Algorithm and keys for JWT
    pub algorithm: JwtAlgorithm,
    /// Issuer claim
    pub issuer: Option<String>,
}

impl JwtConfig {
    /// Create a new JWT configuration with RS256 algorithm
    pub fn new_rs256(private_key: Vec<u8>, public_key: Vec<u8>) -> Self {
        Self {
            algorithm: JwtAlgorithm::RS256 {
                private_key,
                public_key,
            },
            issuer: None,
        }
    }

    /// Create a new JWT configuration with HS256 algorithm
    pub fn new_hs256(secret_key: Vec<u8>) -> Self {
        Self {
            algorithm: JwtAlgorithm::HS256 { secret_key },
            issuer: None,
        }
    }

    /// Create a new JWT configuration from RSA key files (PEM format)
    pub fn from_rs256_pem_files(
        private_key_path: impl AsRef<Path>,
        public_key_path: impl AsRef<Path>,
    ) -> Result<Self, Error> {
        use std::fs::read;

        let private_key = read(private_key_path).map_err(|e| {
            ValidationError::InvalidField(format!("Failed to read private key file: {e}"))
        })?;

        let public_key = read(public_key_path).map_err(|e| {
            ValidationError::InvalidField(format!("Failed to read public key file: {e}"))
        })?;

        Ok(Self::new_rs256(private_key, public_key))
    }

    /// Set the issuer claim
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Get the algorithm to use with jsonwebtoken
    pub fn jwt_algorithm(&self) -> Algorithm {
        match &self.algorithm {
            JwtAlgorithm::RS256 { .. } => Algorithm::RS256,
            JwtAlgorithm::HS256 { .. } => Algorithm::HS256,
        }
    }

    /// Get the encoding key for signing
    pub fn get_encoding_key(&self) -> Result<EncodingKey, Error> {
        match &self.algorithm {
            JwtAlgorithm::RS256 { private_key, .. } => EncodingKey::from_rsa_pem(private_key)
                .map_err(|e| {
                    ValidationError::InvalidField(format!("Invalid RSA private key: {e}")).into()
                }),
            JwtAlgorithm::HS256 { secret_key } => Ok(EncodingKey::from_secret(secret_key)),
        }
    }

    /// Get the decoding key for verification
    pub fn get_decoding_key(&self) -> Result<DecodingKey, Error> {
        match &self.algorithm {
            JwtAlgorithm::RS256 { public_key, .. } => DecodingKey::from_rsa_pem(public_key)
                .map_err(|e| {
                    ValidationError::InvalidField(format!("Invalid RSA public key: {e}")).into()
                }),
            JwtAlgorithm::HS256 { secret_key } => Ok(DecodingKey::from_secret(secret_key)),
        }
    }

    /// Validation settings: no expiry leeway, so an expired token is
    /// rejected at the boundary.
    pub fn get_validation(&self) -> Validation {
        let mut validation = Validation::new(self.jwt_algorithm());
        validation.leeway = 0;
        validation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::UserId;

    const TEST_HS256_SECRET: &[u8] = b"test_secret_key_for_hs256_jwt_tokens_not_for_production_use";

    fn test_account() -> Account {
        Account {
            id: UserId::new_random(),
            email: "user@example.com".to_string(),
            mfa_secret: None,
            failed_attempts: 0,
            locked_until: None,
            last_login_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_session_token_round_trip() {
        let config = JwtConfig::new_hs256(TEST_HS256_SECRET.to_vec()).with_issuer("vigil-test");
        let account = test_account();

        let claims = JwtClaims::session(&account, config.issuer.clone(), Duration::hours(24));
        let token = AuthToken::sign(&claims, &config).unwrap();

        let verified = token.verify(&config).unwrap();
        assert_eq!(verified.sub, account.id.to_string());
        assert_eq!(verified.purpose, TokenPurpose::Session);
        assert_eq!(verified.email.as_deref(), Some("user@example.com"));
        assert_eq!(verified.iss.as_deref(), Some("vigil-test"));
        assert_eq!(verified.ip, None);
    }

    #[test]
    fn test_step_up_token_binds_ip() {
        let config = JwtConfig::new_hs256(TEST_HS256_SECRET.to_vec());
        let user_id = UserId::new_random();

        let claims = JwtClaims::step_up(&user_id, "203.0.113.7", None, Duration::minutes(5));
        let token = AuthToken::sign(&claims, &config).unwrap();

        let verified = token.verify(&config).unwrap();
        assert_eq!(verified.purpose, TokenPurpose::StepUp);
        assert_eq!(verified.ip.as_deref(), Some("203.0.113.7"));
        assert_eq!(verified.user_id(), user_id);
    }

    #[test]
    fn test_expired_token_rejected() {
        let config = JwtConfig::new_hs256(TEST_HS256_SECRET.to_vec());
        let user_id = UserId::new_random();

        // issued already expired
        let claims = JwtClaims::step_up(&user_id, "203.0.113.7", None, Duration::seconds(-5));
        let token = AuthToken::sign(&claims, &config).unwrap();

        let result = token.verify(&config);
        assert!(matches!(result, Err(Error::Token(TokenError::Expired))));
    }

    #[test]
    fn test_tampered_token_rejected() {
        let config = JwtConfig::new_hs256(TEST_HS256_SECRET.to_vec());
        let account = test_account();

        let claims = JwtClaims::session(&account, None, Duration::hours(1));
        let token = AuthToken::sign(&claims, &config).unwrap();

        let mut raw = token.into_inner();
        raw.pop();
        raw.push('A');
        let tampered = AuthToken::from(raw);

        assert!(matches!(
            tampered.verify(&config),
            Err(Error::Token(TokenError::Invalid(_)))
        ));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let config = JwtConfig::new_hs256(TEST_HS256_SECRET.to_vec());
        let other = JwtConfig::new_hs256(b"a_completely_different_secret_key_material".to_vec());
        let account = test_account();

        let claims = JwtClaims::session(&account, None, Duration::hours(1));
        let token = AuthToken::sign(&claims, &config).unwrap();

        assert!(matches!(
            token.verify(&other),
            Err(Error::Token(TokenError::Invalid(_)))
        ));
    }

    #[test]
    fn test_purpose_claim_serialization() {
        let config = JwtConfig::new_hs256(TEST_HS256_SECRET.to_vec());
        let user_id = UserId::new_random();

        let claims = JwtClaims::step_up(&user_id, "10.1.2.3", None, Duration::minutes(5));
        let token = AuthToken::sign(&claims, &config).unwrap();

        // the middle JWT segment carries `"purpose":"mfa"`
        use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
        let payload = token.as_str().split('.').nth(1).unwrap();
        let decoded = String::from_utf8(BASE64_URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap();
        assert!(decoded.contains(r#""purpose":"mfa""#));
    }
}
