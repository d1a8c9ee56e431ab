//! Session credential management
//!
//! Data model and persistence for bearer-session credentials: the token
//! pair issued by the backend, the wire types for the refresh endpoint,
//! and the credential store the client facade reads from and writes to.
//! This crate has no dependency on the HTTP client - it can be tested and
//! used independently.
//!
//! Credential flow:
//! 1. Sign-in persists the token pair via `CredentialStore::write`
//! 2. The client facade reads the pair at construction via `read`
//! 3. On expiry the facade posts a `RefreshRequest` to the refresh endpoint
//! 4. The issued `RefreshResponse` pair is written back with a 30-day max age

pub mod constants;
pub mod credentials;
pub mod error;
pub mod file;
pub mod memory;
pub mod refresh;
pub mod store;
pub mod token;

pub use constants::*;
pub use credentials::Credentials;
pub use error::{Error, Result};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use refresh::{RefreshRequest, RefreshResponse};
pub use store::{CredentialStore, StoredCredentials, StoredValue, WriteOptions};
pub use token::Token;
