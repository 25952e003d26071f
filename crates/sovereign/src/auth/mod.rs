//! Authentication against the assistant backend.

pub mod credentials;

pub use credentials::{CredentialError, CredentialStore};
