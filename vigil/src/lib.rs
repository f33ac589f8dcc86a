//! # Vigil
//!
//! Vigil is an embeddable account security layer for Rust applications: a
//! login state machine with failed-attempt lockout, step-up TOTP
//! multi-factor authentication, stateless JWT sessions, and a best-effort
//! fraud risk engine that scores every login against the account's history
//! and location profile.
//!
//! The authentication path is strict and synchronous; the fraud path runs
//! after the outcome is decided and can never change it.
//!
//! ## Storage Support
//!
//! Vigil ships with a SQLite backend. Any storage can be plugged in by
//! implementing [`vigil_core::repositories::RepositoryProvider`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use vigil::{JwtConfig, VigilBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let vigil = VigilBuilder::new()
//!         .with_sqlite("sqlite::memory:")
//!         .await?
//!         .with_jwt(JwtConfig::new_hs256(b"change-me".to_vec()))
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     let registration = vigil
//!         .register("user@example.com", "correct horse battery", &vigil::ClientInfo::new("203.0.113.1"))
//!         .await?;
//!     println!("registered {}", registration.account.id);
//!     println!("scan to finish MFA setup: {}", registration.mfa.otpauth_url);
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use vigil_core::{
    error::{AuthError, SecurityError},
    repositories::{
        AccountRepository, AccountRepositoryAdapter, AuditLogRepositoryAdapter,
        PasswordRepositoryAdapter, RepositoryProvider,
    },
    services::{
        AuditService, FraudConfig, FraudEngine, LockoutService, MfaEnrollment, MfaService,
        PasswordService, TokenService,
    },
    storage::{AuditLogEntry, FraudFlag, LoginAttempt, NewAuditLogEntry},
};

mod builder;

pub use builder::{NoStorage, VigilBuilder, VigilBuilderError, WithStorage};

/// Re-export core types from vigil_core
///
/// These types are commonly used when working with the Vigil API.
pub use vigil_core::{
    Account, AuthToken, Error, GeolocationResolver, JwtAlgorithm, JwtClaims, JwtConfig,
    LockoutConfig, TokenPurpose, UserId,
};

/// Re-export the SQLite storage backend
pub use vigil_storage_sqlite::SqliteRepositoryProvider;

/// Caller context for a request: source address and user agent.
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub ip: String,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            user_agent: None,
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

/// A freshly created account together with its TOTP provisioning material.
///
/// Every account is enrolled in MFA at registration; the caller relays the
/// provisioning URI or QR code to the user for authenticator setup.
#[derive(Debug, Clone)]
pub struct Registration {
    pub account: Account,
    pub mfa: MfaEnrollment,
}

/// Outcome of a successful password verification.
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    /// Account has no MFA enrolled: a full session token
    Session(AuthToken),
    /// Account has MFA enrolled: a short-lived step-up token bound to the
    /// caller's IP, to be exchanged via [`Vigil::verify_mfa`]
    MfaRequired(AuthToken),
}

/// The main coordinator for the account security state machine.
///
/// `Vigil` wires the services together over a repository provider and owns
/// the sequencing rules: lockout is checked before the password, the
/// password before MFA state, and the fraud engine observes every attempt
/// without being able to fail one.
pub struct Vigil<R: RepositoryProvider> {
    repositories: Arc<R>,
    lockout_service: LockoutService<AccountRepositoryAdapter<R>>,
    password_service: PasswordService<AccountRepositoryAdapter<R>, PasswordRepositoryAdapter<R>>,
    mfa_service: MfaService<AccountRepositoryAdapter<R>>,
    token_service: TokenService,
    audit_service: AuditService<AuditLogRepositoryAdapter<R>>,
    fraud_engine: Arc<FraudEngine<R>>,
    account_repository: Arc<AccountRepositoryAdapter<R>>,
    /// Evaluate fraud on the request task instead of a spawned one.
    /// Spawning is the production behavior; inline evaluation makes the
    /// engine's effects visible as soon as the call returns.
    inline_fraud: bool,
}

impl<R: RepositoryProvider> Vigil<R> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        repositories: Arc<R>,
        token_service: TokenService,
        lockout_config: LockoutConfig,
        fraud_config: FraudConfig,
        resolver: Arc<dyn GeolocationResolver>,
        issuer: String,
        inline_fraud: bool,
    ) -> Self {
        let account_repo = Arc::new(AccountRepositoryAdapter::new(repositories.clone()));
        let password_repo = Arc::new(PasswordRepositoryAdapter::new(repositories.clone()));
        let audit_repo = Arc::new(AuditLogRepositoryAdapter::new(repositories.clone()));

        let lockout_service = LockoutService::new(account_repo.clone(), lockout_config);
        let password_service = PasswordService::new(account_repo.clone(), password_repo);
        let mfa_service = MfaService::new(account_repo.clone(), issuer);
        let audit_service = AuditService::new(audit_repo);
        let fraud_engine =
            Arc::new(FraudEngine::new(repositories.clone(), resolver).with_config(fraud_config));

        Self {
            repositories,
            lockout_service,
            password_service,
            mfa_service,
            token_service,
            audit_service,
            fraud_engine,
            account_repository: account_repo,
            inline_fraud,
        }
    }

    /// Run migrations for all repositories
    pub async fn migrate(&self) -> Result<(), Error> {
        self.repositories.migrate().await
    }

    /// Health check for all repositories
    pub async fn health_check(&self) -> Result<(), Error> {
        self.repositories.health_check().await
    }

    /// Register a new account with an email and password.
    ///
    /// Registration also enrolls the account in TOTP MFA, so the returned
    /// [`Registration`] carries the provisioning material alongside the
    /// account. Every subsequent login requires the step-up exchange.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        client: &ClientInfo,
    ) -> Result<Registration, Error> {
        let result: Result<Registration, Error> = async {
            let mut account = self
                .password_service
                .register_account(email, password)
                .await?;
            let mfa = self.mfa_service.enroll(&account).await?;
            account.mfa_secret = Some(mfa.secret.clone());
            Ok(Registration { account, mfa })
        }
        .await;

        match result {
            Ok(registration) => {
                self.audit(
                    Some(registration.account.id.clone()),
                    "REGISTER",
                    "account",
                    Some(registration.account.id.to_string()),
                    client,
                    json!({ "email": email }),
                    201,
                )
                .await;
                Ok(registration)
            }
            Err(e) => {
                self.audit(
                    None,
                    "REGISTER_FAILED",
                    "account",
                    None,
                    client,
                    json!({ "email": email, "error": e.to_string() }),
                    400,
                )
                .await;
                Err(e)
            }
        }
    }

    /// Attempt a password login.
    ///
    /// The checks run in a fixed order: account lookup, lockout, password.
    /// An unknown email and a wrong password are indistinguishable to the
    /// caller; a locked account answers [`AuthError::AccountLocked`] before
    /// the password is ever inspected.
    ///
    /// On success the outcome depends on enrollment: accounts without MFA
    /// get a session token directly, enrolled accounts get a step-up token
    /// that must be exchanged through [`Vigil::verify_mfa`].
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        client: &ClientInfo,
    ) -> Result<LoginOutcome, Error> {
        let now = Utc::now();

        let Some(account) = self.account_repository.find_by_email(email).await? else {
            self.audit(
                None,
                "LOGIN_FAILED",
                "auth",
                None,
                client,
                json!({ "email": email }),
                401,
            )
            .await;
            self.dispatch_fraud(None, client, false).await;
            return Err(AuthError::InvalidCredentials.into());
        };

        if let Err(e) = self.lockout_service.check(&account, now) {
            self.audit(
                Some(account.id.clone()),
                "LOGIN_FAILED",
                "auth",
                None,
                client,
                json!({ "email": email, "locked": true }),
                423,
            )
            .await;
            self.dispatch_fraud(Some(account.id.clone()), client, false).await;
            return Err(e);
        }

        if let Err(e) = self.password_service.verify(&account, password).await {
            self.lockout_service.record_failure(&account.id, now).await?;
            self.audit(
                Some(account.id.clone()),
                "LOGIN_FAILED",
                "auth",
                None,
                client,
                json!({ "email": email }),
                401,
            )
            .await;
            self.dispatch_fraud(Some(account.id.clone()), client, false).await;
            return Err(e);
        }

        if account.mfa_enabled() {
            // The password verified, the lockout counter resets now, not
            // after the MFA exchange. The attempt is recorded the same way.
            self.lockout_service.record_success(&account.id, now).await?;
            let token = self.token_service.issue_step_up(&account.id, &client.ip)?;
            self.audit(
                Some(account.id.clone()),
                "LOGIN_MFA_REQUIRED",
                "auth",
                None,
                client,
                json!({ "email": email }),
                200,
            )
            .await;
            self.dispatch_fraud(Some(account.id.clone()), client, true).await;
            return Ok(LoginOutcome::MfaRequired(token));
        }

        self.lockout_service.record_success(&account.id, now).await?;
        let token = self.token_service.issue_session(&account)?;
        self.audit(
            Some(account.id.clone()),
            "LOGIN_SUCCESS",
            "auth",
            None,
            client,
            json!({ "email": email }),
            200,
        )
        .await;
        self.dispatch_fraud(Some(account.id.clone()), client, true).await;

        Ok(LoginOutcome::Session(token))
    }

    /// Exchange a step-up token plus a TOTP code for a session token.
    ///
    /// The step-up token must be presented from the IP it was issued to;
    /// a mismatch is treated as possible token theft, audited at elevated
    /// severity and rejected before the code is checked.
    pub async fn verify_mfa(
        &self,
        step_up_token: &AuthToken,
        code: &str,
        client: &ClientInfo,
    ) -> Result<AuthToken, Error> {
        let now = Utc::now();

        let claims = match self.token_service.verify(step_up_token, TokenPurpose::StepUp) {
            Ok(claims) => claims,
            Err(e) => {
                self.audit(
                    None,
                    "MFA_FAILED",
                    "auth",
                    None,
                    client,
                    json!({ "error": e.to_string() }),
                    401,
                )
                .await;
                return Err(e);
            }
        };
        let user_id = claims.user_id();

        if claims.ip.as_deref() != Some(client.ip.as_str()) {
            self.audit(
                Some(user_id.clone()),
                "MFA_SECURITY_MISMATCH",
                "auth",
                None,
                client,
                json!({ "token_ip": claims.ip, "request_ip": client.ip }),
                403,
            )
            .await;
            return Err(SecurityError::StepUpIpMismatch.into());
        }

        let account = self
            .account_repository
            .find_by_id(&user_id)
            .await?
            .ok_or(Error::Auth(AuthError::InvalidCredentials))?;

        self.lockout_service.check(&account, now)?;

        if let Err(e) = self.mfa_service.verify_code(&account, code).await {
            self.lockout_service.record_failure(&account.id, now).await?;
            self.audit(
                Some(account.id.clone()),
                "MFA_FAILED",
                "auth",
                None,
                client,
                json!({}),
                401,
            )
            .await;
            self.dispatch_fraud(Some(account.id.clone()), client, false).await;
            return Err(e);
        }

        self.lockout_service.record_success(&account.id, now).await?;
        let token = self.token_service.issue_session(&account)?;
        self.audit(
            Some(account.id.clone()),
            "MFA_SUCCESS",
            "auth",
            None,
            client,
            json!({}),
            200,
        )
        .await;
        self.dispatch_fraud(Some(account.id.clone()), client, true).await;

        Ok(token)
    }

    /// Verify a session token, returning its claims.
    pub fn verify_session(&self, token: &AuthToken) -> Result<JwtClaims, Error> {
        self.token_service.verify(token, TokenPurpose::Session)
    }

    /// Enroll an account in TOTP MFA, returning the provisioning material.
    pub async fn enroll_mfa(
        &self,
        user_id: &UserId,
        client: &ClientInfo,
    ) -> Result<MfaEnrollment, Error> {
        let account = self
            .account_repository
            .find_by_id(user_id)
            .await?
            .ok_or(Error::Auth(AuthError::InvalidCredentials))?;

        let enrollment = self.mfa_service.enroll(&account).await?;
        self.audit(
            Some(account.id.clone()),
            "MFA_ENROLLED",
            "account",
            Some(account.id.to_string()),
            client,
            json!({}),
            200,
        )
        .await;

        Ok(enrollment)
    }

    /// Get an account by its ID
    pub async fn profile(&self, user_id: &UserId) -> Result<Option<Account>, Error> {
        self.account_repository.find_by_id(user_id).await
    }

    /// Most recent fraud flags for an account, newest first.
    pub async fn fraud_alerts(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<FraudFlag>, Error> {
        self.fraud_engine.alerts(user_id, limit).await
    }

    /// Most recent login attempts for an account, newest first.
    pub async fn login_history(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<LoginAttempt>, Error> {
        self.fraud_engine.login_history(user_id, limit).await
    }

    /// Most recent audit trail entries for an account, newest first.
    pub async fn audit_trail(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<AuditLogEntry>, Error> {
        self.audit_service.trail(user_id, limit).await
    }

    #[allow(clippy::too_many_arguments)]
    async fn audit(
        &self,
        user_id: Option<UserId>,
        action: &str,
        resource_type: &str,
        resource_id: Option<String>,
        client: &ClientInfo,
        request_data: serde_json::Value,
        response_status: u16,
    ) {
        self.audit_service
            .record(NewAuditLogEntry::new(
                user_id,
                action,
                resource_type,
                resource_id,
                client.ip.clone(),
                client.user_agent.clone(),
                request_data,
                response_status,
            ))
            .await;
    }

    /// Hand the attempt to the fraud engine. In production this is a
    /// fire-and-forget spawn; the login result never waits on it.
    async fn dispatch_fraud(&self, user_id: Option<UserId>, client: &ClientInfo, success: bool) {
        if self.inline_fraud {
            self.fraud_engine
                .evaluate(user_id.as_ref(), &client.ip, client.user_agent.as_deref(), success)
                .await;
            return;
        }

        let engine = self.fraud_engine.clone();
        let ip = client.ip.clone();
        let user_agent = client.user_agent.clone();
        tokio::spawn(async move {
            engine
                .evaluate(user_id.as_ref(), &ip, user_agent.as_deref(), success)
                .await;
        });
    }
}
