//! Credential snapshot held by the client facade

use serde::{Deserialize, Serialize};

use crate::token::Token;

/// An access/refresh token pair.
///
/// Immutable snapshot, replaced wholesale when a refresh succeeds. The
/// store is the source of truth; the facade holds only the access half to
/// stamp outgoing headers, and re-reads the refresh half from the store at
/// refresh time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub access: Token,
    pub refresh: Token,
}

impl Credentials {
    pub fn new(access: impl Into<Token>, refresh: impl Into<Token>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }
}
