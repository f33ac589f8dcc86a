use async_trait::async_trait;

use crate::{Error, account::UserId};

/// Repository for password credentials.
#[async_trait]
pub trait PasswordRepository: Send + Sync + 'static {
    /// Set the password hash for a user
    async fn set_password_hash(&self, user_id: &UserId, hash: &str) -> Result<(), Error>;

    /// Get the password hash for a user
    async fn get_password_hash(&self, user_id: &UserId) -> Result<Option<String>, Error>;
}
