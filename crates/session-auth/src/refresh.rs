//! Wire types for the token refresh endpoint
//!
//! The refresh endpoint takes the long-lived refresh token and issues a
//! fresh token pair. Any non-success response is a refresh failure; what
//! that means for the session is the caller's decision.

use serde::{Deserialize, Serialize};

use crate::credentials::Credentials;
use crate::token::Token;

/// Body of `POST /refresh`.
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshRequest {
    #[serde(rename = "refreshToken")]
    pub refresh_token: Token,
}

/// Success body from the refresh endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub token: Token,
    #[serde(rename = "refreshToken")]
    pub refresh_token: Token,
}

impl RefreshResponse {
    /// The issued pair as a credential snapshot.
    pub fn into_credentials(self) -> Credentials {
        Credentials {
            access: self.token,
            refresh: self.refresh_token,
        }
    }
}
