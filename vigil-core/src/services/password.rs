use std::sync::Arc;

use crate::{
    Error,
    account::{Account, NewAccount},
    error::AuthError,
    repositories::{AccountRepository, PasswordRepository},
    validation::{validate_email, validate_password},
};

/// Service for password registration and verification.
pub struct PasswordService<A: AccountRepository, P: PasswordRepository> {
    account_repository: Arc<A>,
    password_repository: Arc<P>,
}

impl<A: AccountRepository, P: PasswordRepository> PasswordService<A, P> {
    pub fn new(account_repository: Arc<A>, password_repository: Arc<P>) -> Self {
        Self {
            account_repository,
            password_repository,
        }
    }

    /// Register a new account with a password.
    ///
    /// Input is validated and the password hashed before any row is written,
    /// so a failed registration leaves nothing behind.
    pub async fn register_account(&self, email: &str, password: &str) -> Result<Account, Error> {
        validate_email(email)?;
        validate_password(password)?;

        if self
            .account_repository
            .find_by_email(email)
            .await?
            .is_some()
        {
            return Err(AuthError::AccountExists.into());
        }

        let password_hash = Self::hash_password(password)?;

        let account = self
            .account_repository
            .create(NewAccount::new(email))
            .await?;

        self.password_repository
            .set_password_hash(&account.id, &password_hash)
            .await?;

        Ok(account)
    }

    /// Verify a password against the stored hash for `account`.
    ///
    /// A missing credential row and a wrong password both answer with
    /// [`AuthError::InvalidCredentials`].
    pub async fn verify(&self, account: &Account, password: &str) -> Result<(), Error> {
        let password_hash = self
            .password_repository
            .get_password_hash(&account.id)
            .await?
            .ok_or(Error::Auth(AuthError::InvalidCredentials))?;

        if !Self::verify_password(password, &password_hash) {
            return Err(AuthError::InvalidCredentials.into());
        }

        Ok(())
    }

    /// Hash a password using argon2
    fn hash_password(password: &str) -> Result<String, Error> {
        use password_auth::generate_hash;
        Ok(generate_hash(password))
    }

    /// Verify a password against a hash
    fn verify_password(password: &str, hash: &str) -> bool {
        use password_auth::verify_password;
        verify_password(password, hash).is_ok()
    }
}
