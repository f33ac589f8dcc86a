use thiserror::Error;

/// Top-level error type for the vigil core.
///
/// The primary authentication path surfaces these errors to the caller; the
/// fraud and audit side channels absorb them (logged, never propagated).
#[derive(Debug, Error)]
pub enum Error {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Security error: {0}")]
    Security(#[from] SecurityError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Geolocation error: {0}")]
    Geo(#[from] GeoError),
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// Covers both unknown account and wrong password so callers cannot
    /// enumerate registered emails.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Surfaced without disclosing the remaining lockout time.
    #[error("Account is temporarily locked due to multiple failed attempts")]
    AccountLocked,

    #[error("Account already exists")]
    AccountExists,

    #[error("Invalid MFA code")]
    InvalidMfaCode,

    #[error("MFA is not enrolled for this account")]
    MfaNotEnrolled,

    #[error("MFA setup failed: {0}")]
    MfaSetup(String),

    #[error("Password hash error: {0}")]
    PasswordHash(String),
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,

    #[error("Invalid token: {0}")]
    Invalid(String),

    /// A step-up token presented where a session token is required, or the
    /// reverse. The purpose claim is what makes step-up tokens single-use.
    #[error("Token purpose mismatch")]
    WrongPurpose,
}

#[derive(Debug, Error)]
pub enum SecurityError {
    /// An IP-bound step-up token was replayed from a different address.
    /// Treated as possible token theft and audited at elevated severity.
    #[error("Step-up token presented from a different address")]
    StepUpIpMismatch,
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid email format: {0}")]
    InvalidEmail(String),

    #[error("Invalid password: {0}")]
    InvalidPassword(String),

    #[error("Invalid field: {0}")]
    InvalidField(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Record not found")]
    NotFound,

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("Geolocation lookup failed: {0}")]
    Lookup(String),

    #[error("Geolocation lookup timed out")]
    Timeout,
}

impl Error {
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::Auth(_))
    }

    pub fn is_validation_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    pub fn is_token_error(&self) -> bool {
        matches!(self, Error::Token(_))
    }

    pub fn is_security_error(&self) -> bool {
        matches!(self, Error::Security(_))
    }

    /// Storage and geolocation failures: surfaced generically on the primary
    /// auth path, absorbed entirely on the fraud/audit path.
    pub fn is_infrastructure_error(&self) -> bool {
        matches!(self, Error::Storage(_) | Error::Geo(_))
    }
}
