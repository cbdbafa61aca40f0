//! # astra-auth
//!
//! Credential validation for Astra's real-time endpoints.
//!
//! The WebSocket handshake cannot carry custom headers, so the client passes
//! its JWT as a `token` query parameter. This crate owns the validation side
//! of that protocol:
//!
//! - [`token::TokenVerifier`]: HS256 signature + expiry checks, claim extraction
//! - [`store::UserStore`]: subject → identity resolution boundary (the
//!   persistent account store lives in the platform's CRUD backend)
//! - [`Authenticator`]: verify-then-resolve; any failure refuses the handshake
//!   before the connection is accepted

#![deny(unsafe_code)]

pub mod authenticator;
pub mod error;
pub mod store;
pub mod token;

pub use authenticator::Authenticator;
pub use error::AuthError;
pub use store::{Identity, InMemoryUserStore, UserStore};
pub use token::{Claims, TokenVerifier, sign_token};
