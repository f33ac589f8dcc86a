use chrono::Duration;

use crate::{
    Error,
    account::{Account, UserId},
    error::TokenError,
    token::{AuthToken, JwtClaims, JwtConfig, TokenPurpose},
};

/// Service issuing and verifying session and step-up tokens.
pub struct TokenService {
    config: JwtConfig,
    session_ttl: Duration,
    step_up_ttl: Duration,
}

impl TokenService {
    pub fn new(config: JwtConfig) -> Self {
        Self {
            config,
            session_ttl: Duration::hours(24),
            step_up_ttl: Duration::minutes(5),
        }
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn with_step_up_ttl(mut self, ttl: Duration) -> Self {
        self.step_up_ttl = ttl;
        self
    }

    /// Issue a full session token for an authenticated account.
    pub fn issue_session(&self, account: &Account) -> Result<AuthToken, Error> {
        let claims = JwtClaims::session(account, self.config.issuer.clone(), self.session_ttl);
        AuthToken::sign(&claims, &self.config)
    }

    /// Issue a short-lived step-up token bound to the requesting IP.
    pub fn issue_step_up(&self, user_id: &UserId, ip: &str) -> Result<AuthToken, Error> {
        let claims = JwtClaims::step_up(user_id, ip, self.config.issuer.clone(), self.step_up_ttl);
        AuthToken::sign(&claims, &self.config)
    }

    /// Verify a token and require it to carry `expected_purpose`.
    pub fn verify(
        &self,
        token: &AuthToken,
        expected_purpose: TokenPurpose,
    ) -> Result<JwtClaims, Error> {
        let claims = token.verify(&self.config)?;

        if claims.purpose != expected_purpose {
            return Err(TokenError::WrongPurpose.into());
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn service() -> TokenService {
        TokenService::new(
            JwtConfig::new_hs256(b"token_service_test_secret_material".to_vec())
                .with_issuer("vigil-test"),
        )
    }

    fn account() -> Account {
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
    fn test_session_token_verifies_as_session() {
        let service = service();
        let account = account();

        let token = service.issue_session(&account).unwrap();
        let claims = service.verify(&token, TokenPurpose::Session).unwrap();

        assert_eq!(claims.user_id(), account.id);
        assert_eq!(claims.email.as_deref(), Some("user@example.com"));
    }

    #[test]
    fn test_step_up_token_rejected_as_session() {
        let service = service();
        let user_id = UserId::new_random();

        let token = service.issue_step_up(&user_id, "203.0.113.5").unwrap();

        assert!(matches!(
            service.verify(&token, TokenPurpose::Session),
            Err(Error::Token(TokenError::WrongPurpose))
        ));
        // but it passes when asked for its own purpose
        let claims = service.verify(&token, TokenPurpose::StepUp).unwrap();
        assert_eq!(claims.ip.as_deref(), Some("203.0.113.5"));
    }

    #[test]
    fn test_session_token_rejected_as_step_up() {
        let service = service();
        let account = account();

        let token = service.issue_session(&account).unwrap();

        assert!(matches!(
            service.verify(&token, TokenPurpose::StepUp),
            Err(Error::Token(TokenError::WrongPurpose))
        ));
    }

    #[test]
    fn test_expired_step_up_token() {
        let service = service().with_step_up_ttl(Duration::seconds(-1));
        let user_id = UserId::new_random();

        let token = service.issue_step_up(&user_id, "203.0.113.5").unwrap();

        assert!(matches!(
            service.verify(&token, TokenPurpose::StepUp),
            Err(Error::Token(TokenError::Expired))
        ));
    }
}
