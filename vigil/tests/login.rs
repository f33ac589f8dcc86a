use std::sync::Arc;

use chrono::Duration;
use password_auth::generate_hash;
use sqlx::sqlite::SqlitePoolOptions;
use totp_rs::{Algorithm, Secret, TOTP};
use vigil::{
    AuthToken, ClientInfo, JwtConfig, LockoutConfig, LoginOutcome, SqliteRepositoryProvider,
    Vigil, VigilBuilder,
};
use vigil_core::account::NewAccount;
use vigil_core::error::{AuthError, Error};
use vigil_core::repositories::{
    AccountRepository, AccountRepositoryAdapter, PasswordRepository, PasswordRepositoryAdapter,
    RepositoryProvider,
};
use vigil_core::storage::AuditSeverity;

const TEST_HS256_SECRET: &[u8] = b"this_is_a_test_secret_key_for_hs256_jwt_tokens_not_for_prod";

async fn setup() -> Vigil<SqliteRepositoryProvider> {
    setup_with_lockout(LockoutConfig::default()).await
}

async fn setup_with_lockout(lockout: LockoutConfig) -> Vigil<SqliteRepositoryProvider> {
    // A single connection so every query sees the same in-memory database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    VigilBuilder::new()
        .with_sqlite_pool(pool)
        .with_jwt(JwtConfig::new_hs256(TEST_HS256_SECRET.to_vec()))
        .with_lockout(lockout)
        .with_inline_fraud(true)
        .apply_migrations(true)
        .build()
        .await
        .unwrap()
}

fn client() -> ClientInfo {
    ClientInfo::new("127.0.0.1").with_user_agent("Test User Agent")
}

/// An authenticator for an enrolled secret, mirroring what a TOTP app
/// would compute.
fn authenticator(secret: &str) -> TOTP {
    TOTP::new(
        Algorithm::SHA1,
        6,
        1,
        30,
        Secret::Encoded(secret.to_string()).to_bytes().unwrap(),
        Some("vigil".to_string()),
        "test@example.com".to_string(),
    )
    .unwrap()
}

/// Full login for an enrolled account: password, then the TOTP exchange.
async fn complete_login(
    vigil: &Vigil<SqliteRepositoryProvider>,
    email: &str,
    password: &str,
    secret: &str,
    client: &ClientInfo,
) -> AuthToken {
    let LoginOutcome::MfaRequired(step_up) = vigil.login(email, password, client).await.unwrap()
    else {
        panic!("Expected a step-up token");
    };
    let code = authenticator(secret).generate_current().unwrap();
    vigil.verify_mfa(&step_up, &code, client).await.unwrap()
}

#[tokio::test]
async fn test_register_and_login() {
    let vigil = setup().await;
    let client = client();

    let email = "test@example.com";
    let password = "password123";
    let registration = vigil.register(email, password, &client).await.unwrap();
    assert_eq!(registration.account.email, email);
    // Registration enrolls TOTP and hands back the provisioning material.
    assert!(registration.account.mfa_enabled());
    assert!(registration.mfa.otpauth_url.starts_with("otpauth://totp/"));

    let token = complete_login(&vigil, email, password, &registration.mfa.secret, &client).await;

    let claims = vigil.verify_session(&token).unwrap();
    assert_eq!(claims.user_id(), registration.account.id);
    assert_eq!(claims.email.as_deref(), Some(email));

    // last_login_at is stamped on success
    let profile = vigil.profile(&registration.account.id).await.unwrap().unwrap();
    assert!(profile.last_login_at.is_some());
    assert_eq!(profile.failed_attempts, 0);
}

#[tokio::test]
async fn test_duplicate_registration_rejected() {
    let vigil = setup().await;
    let client = client();

    vigil
        .register("test@example.com", "password123", &client)
        .await
        .unwrap();

    let result = vigil
        .register("test@example.com", "other-password", &client)
        .await;
    assert!(matches!(result, Err(Error::Auth(AuthError::AccountExists))));
}

#[tokio::test]
async fn test_unknown_email_and_wrong_password_are_indistinguishable() {
    let vigil = setup().await;
    let client = client();

    vigil
        .register("test@example.com", "password123", &client)
        .await
        .unwrap();

    let unknown = vigil
        .login("nobody@example.com", "password123", &client)
        .await
        .unwrap_err();
    let wrong = vigil
        .login("test@example.com", "wrong-password", &client)
        .await
        .unwrap_err();

    assert!(matches!(unknown, Error::Auth(AuthError::InvalidCredentials)));
    assert!(matches!(wrong, Error::Auth(AuthError::InvalidCredentials)));
    assert_eq!(unknown.to_string(), wrong.to_string());
}

#[tokio::test]
async fn test_account_locks_after_failed_attempts() {
    let vigil = setup().await;
    let client = client();

    let email = "test@example.com";
    let password = "password123";
    let account = vigil
        .register(email, password, &client)
        .await
        .unwrap()
        .account;

    // The first five wrong passwords fail as bad credentials.
    for _ in 0..5 {
        let error = vigil
            .login(email, "wrong-password", &client)
            .await
            .unwrap_err();
        assert!(matches!(error, Error::Auth(AuthError::InvalidCredentials)));
    }

    let profile = vigil.profile(&account.id).await.unwrap().unwrap();
    assert_eq!(profile.failed_attempts, 5);
    assert!(profile.locked_until.is_some());

    // Once locked, even the correct password is refused.
    let error = vigil.login(email, password, &client).await.unwrap_err();
    assert!(matches!(error, Error::Auth(AuthError::AccountLocked)));

    // The refused attempt did not advance the counter.
    let profile = vigil.profile(&account.id).await.unwrap().unwrap();
    assert_eq!(profile.failed_attempts, 5);
}

#[tokio::test]
async fn test_lockout_expires() {
    // A lock that expires immediately, so the window is already over.
    let vigil = setup_with_lockout(LockoutConfig {
        max_failed_attempts: 2,
        lockout_duration: Duration::seconds(-1),
    })
    .await;
    let client = client();

    let email = "test@example.com";
    let password = "password123";
    vigil.register(email, password, &client).await.unwrap();

    for _ in 0..2 {
        let _ = vigil.login(email, "wrong-password", &client).await;
    }

    // The lock was set but its window has elapsed.
    let outcome = vigil.login(email, password, &client).await.unwrap();
    assert!(matches!(outcome, LoginOutcome::MfaRequired(_)));
}

#[tokio::test]
async fn test_password_success_resets_counter_before_mfa_completion() {
    let vigil = setup().await;
    let client = client();

    let email = "test@example.com";
    let password = "password123";
    let registration = vigil.register(email, password, &client).await.unwrap();

    for _ in 0..4 {
        let _ = vigil.login(email, "wrong-password", &client).await;
    }
    let profile = vigil.profile(&registration.account.id).await.unwrap().unwrap();
    assert_eq!(profile.failed_attempts, 4);

    // The correct password alone clears the counter; the pending TOTP
    // exchange does not hold it hostage.
    let outcome = vigil.login(email, password, &client).await.unwrap();
    assert!(matches!(outcome, LoginOutcome::MfaRequired(_)));

    let profile = vigil.profile(&registration.account.id).await.unwrap().unwrap();
    assert_eq!(profile.failed_attempts, 0);
    assert!(profile.locked_until.is_none());

    // The count starts over, one more failure does not lock.
    let _ = vigil.login(email, "wrong-password", &client).await;
    let error = vigil.login(email, "wrong-password", &client).await;
    assert!(matches!(
        error,
        Err(Error::Auth(AuthError::InvalidCredentials))
    ));
}

#[tokio::test]
async fn test_session_token_rejected_after_tampering() {
    let vigil = setup().await;
    let client = client();

    let registration = vigil
        .register("test@example.com", "password123", &client)
        .await
        .unwrap();
    let token = complete_login(
        &vigil,
        "test@example.com",
        "password123",
        &registration.mfa.secret,
        &client,
    )
    .await;

    let mut tampered = token.as_str().to_string();
    tampered.pop();
    tampered.push('x');
    let result = vigil.verify_session(&tampered.into());
    assert!(result.is_err());
}

#[tokio::test]
async fn test_audit_trail_records_login_outcomes() {
    let vigil = setup().await;
    let client = client();

    let email = "test@example.com";
    let password = "password123";
    let registration = vigil.register(email, password, &client).await.unwrap();

    let _ = vigil.login(email, "wrong-password", &client).await;
    complete_login(&vigil, email, password, &registration.mfa.secret, &client).await;

    let trail = vigil.audit_trail(&registration.account.id, 10).await.unwrap();
    let actions: Vec<&str> = trail.iter().map(|e| e.action.as_str()).collect();
    assert!(actions.contains(&"REGISTER"));
    assert!(actions.contains(&"LOGIN_FAILED"));
    assert!(actions.contains(&"LOGIN_MFA_REQUIRED"));
    assert!(actions.contains(&"MFA_SUCCESS"));

    let failed = trail.iter().find(|e| e.action == "LOGIN_FAILED").unwrap();
    assert_eq!(failed.severity, AuditSeverity::Warn);
    assert_eq!(failed.response_status, 401);
    assert_eq!(failed.ip, "127.0.0.1");
    assert_eq!(failed.user_agent.as_deref(), Some("Test User Agent"));

    let step_up = trail
        .iter()
        .find(|e| e.action == "LOGIN_MFA_REQUIRED")
        .unwrap();
    assert_eq!(step_up.severity, AuditSeverity::Info);
    assert_eq!(step_up.response_status, 200);
}

#[tokio::test]
async fn test_locked_attempt_audited_as_locked() {
    let vigil = setup_with_lockout(LockoutConfig {
        max_failed_attempts: 1,
        lockout_duration: Duration::minutes(30),
    })
    .await;
    let client = client();

    let email = "test@example.com";
    let account = vigil
        .register(email, "password123", &client)
        .await
        .unwrap()
        .account;

    let _ = vigil.login(email, "wrong-password", &client).await;
    let error = vigil.login(email, "password123", &client).await.unwrap_err();
    assert!(matches!(error, Error::Auth(AuthError::AccountLocked)));

    let trail = vigil.audit_trail(&account.id, 10).await.unwrap();
    let locked = trail
        .iter()
        .find(|e| e.action == "LOGIN_FAILED" && e.response_status == 423)
        .unwrap();
    assert_eq!(locked.request_data["locked"], serde_json::json!(true));
}

#[tokio::test]
async fn test_registration_validates_input() {
    let vigil = setup().await;
    let client = client();

    let result = vigil.register("not-an-email", "password123", &client).await;
    assert!(matches!(result, Err(Error::Validation(_))));

    let result = vigil.register("test@example.com", "short", &client).await;
    assert!(matches!(result, Err(Error::Validation(_))));
}

#[tokio::test]
async fn test_account_without_mfa_gets_session_directly() {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let provider = Arc::new(SqliteRepositoryProvider::new(pool));
    provider.migrate().await.unwrap();

    // An account provisioned outside registration, with no TOTP secret.
    let accounts = AccountRepositoryAdapter::new(provider.clone());
    let account = accounts
        .create(NewAccount::new("legacy@example.com"))
        .await
        .unwrap();
    let passwords = PasswordRepositoryAdapter::new(provider.clone());
    passwords
        .set_password_hash(&account.id, &generate_hash("password123"))
        .await
        .unwrap();

    let vigil = VigilBuilder::new()
        .with_repositories(provider)
        .with_jwt(JwtConfig::new_hs256(TEST_HS256_SECRET.to_vec()))
        .with_inline_fraud(true)
        .build()
        .await
        .unwrap();

    let outcome = vigil
        .login("legacy@example.com", "password123", &client())
        .await
        .unwrap();
    let LoginOutcome::Session(token) = outcome else {
        panic!("Expected a session token for an account without MFA");
    };
    vigil.verify_session(&token).unwrap();

    let trail = vigil.audit_trail(&account.id, 10).await.unwrap();
    assert!(trail.iter().any(|e| e.action == "LOGIN_SUCCESS"));
}
