//! Core functionality for the vigil account security ecosystem
//!
//! This crate contains the account security state machine and fraud risk
//! engine shared by all vigil storage backends: password verification with
//! account lockout, step-up TOTP multi-factor authentication, signed token
//! issuance, and the best-effort heuristic fraud scorer that consults login
//! history and geolocation trust profiles.
//!
//! Storage is abstracted behind the repository traits in [`repositories`];
//! see [`repositories::RepositoryProvider`] for the contract a backend must
//! satisfy. The services in [`services`] contain the behavior and are wired
//! together by the top-level `vigil` crate.

pub mod account;
pub mod error;
pub mod geo;
pub mod id;
pub mod repositories;
pub mod services;
pub mod storage;
pub mod token;
pub mod validation;

pub use account::{Account, NewAccount, UserId};
pub use error::Error;
pub use geo::{GeoLocation, GeolocationResolver, IpApiResolver, haversine_km};
pub use storage::{AuditSeverity, LockoutConfig};
pub use token::{AuthToken, JwtAlgorithm, JwtClaims, JwtConfig, TokenPurpose};
