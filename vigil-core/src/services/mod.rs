//! Service layer
//!
//! Services hold the business rules and are generic over the repository
//! traits, so they can be exercised against mocks in tests and any storage
//! backend in production. The login state machine that sequences them lives
//! in the facade crate.

pub mod audit;
pub mod fraud;
pub mod lockout;
pub mod mfa;
pub mod password;
pub mod token;

pub use audit::AuditService;
pub use fraud::{FraudConfig, FraudEngine};
pub use lockout::LockoutService;
pub use mfa::{MfaEnrollment, MfaService};
pub use password::PasswordService;
pub use token::TokenService;
