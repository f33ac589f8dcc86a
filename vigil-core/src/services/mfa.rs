use std::sync::Arc;

use base64::{Engine, prelude::BASE64_STANDARD};
use qrcode::{QrCode, render::svg};
use rand::TryRngCore;
use totp_rs::{Algorithm, Secret, TOTP};

use crate::{
    Error,
    account::Account,
    error::AuthError,
    repositories::AccountRepository,
};

const TOTP_DIGITS: usize = 6;
const TOTP_STEP_SECONDS: u64 = 30;
/// One step of clock skew tolerated in either direction.
const TOTP_SKEW_STEPS: u8 = 1;
const SECRET_BYTES: usize = 20;

/// Everything the caller needs to finish enrolling an authenticator app.
#[derive(Debug, Clone)]
pub struct MfaEnrollment {
    /// Base32-encoded shared secret, for manual entry
    pub secret: String,
    /// otpauth:// provisioning URI
    pub otpauth_url: String,
    /// Base64-encoded SVG of the provisioning QR code
    pub qr_code_svg: String,
}

/// Service for TOTP enrollment and code verification.
pub struct MfaService<A: AccountRepository> {
    account_repository: Arc<A>,
    issuer: String,
}

impl<A: AccountRepository> MfaService<A> {
    pub fn new(account_repository: Arc<A>, issuer: impl Into<String>) -> Self {
        Self {
            account_repository,
            issuer: issuer.into(),
        }
    }

    /// Generate a fresh TOTP secret for `account`, persist it and return the
    /// provisioning material. Re-enrolling replaces the previous secret.
    pub async fn enroll(&self, account: &Account) -> Result<MfaEnrollment, Error> {
        let mut raw = [0u8; SECRET_BYTES];
        rand::rngs::OsRng
            .try_fill_bytes(&mut raw)
            .expect("OS RNG unavailable");

        let secret = Secret::Raw(raw.to_vec()).to_encoded().to_string();
        let totp = self.build_totp(&secret, &account.email)?;

        let otpauth_url = totp.get_url();
        let qr_code_svg = Self::render_qr(&otpauth_url)?;

        self.account_repository
            .set_mfa_secret(&account.id, &secret)
            .await?;

        Ok(MfaEnrollment {
            secret,
            otpauth_url,
            qr_code_svg,
        })
    }

    /// Check `code` against the account's enrolled secret, tolerating one
    /// time step of clock skew.
    pub async fn verify_code(&self, account: &Account, code: &str) -> Result<(), Error> {
        let secret = account
            .mfa_secret
            .as_deref()
            .ok_or(Error::Auth(AuthError::MfaNotEnrolled))?;

        let totp = self.build_totp(secret, &account.email)?;

        let valid = totp
            .check_current(code)
            .map_err(|e| AuthError::MfaSetup(format!("System clock error: {e}")))?;

        if !valid {
            return Err(AuthError::InvalidMfaCode.into());
        }

        Ok(())
    }

    fn build_totp(&self, secret_base32: &str, account_name: &str) -> Result<TOTP, Error> {
        let secret_bytes = Secret::Encoded(secret_base32.to_string())
            .to_bytes()
            .map_err(|e| AuthError::MfaSetup(format!("Invalid TOTP secret: {e:?}")))?;

        TOTP::new(
            Algorithm::SHA1,
            TOTP_DIGITS,
            TOTP_SKEW_STEPS,
            TOTP_STEP_SECONDS,
            secret_bytes,
            Some(self.issuer.clone()),
            account_name.to_string(),
        )
        .map_err(|e| AuthError::MfaSetup(format!("Failed to build TOTP: {e}")).into())
    }

    fn render_qr(otpauth_url: &str) -> Result<String, Error> {
        let code = QrCode::new(otpauth_url)
            .map_err(|e| AuthError::MfaSetup(format!("Failed to build QR code: {e}")))?;

        let svg = code
            .render::<svg::Color>()
            .min_dimensions(200, 200)
            .build();

        Ok(BASE64_STANDARD.encode(svg))
    }
}
