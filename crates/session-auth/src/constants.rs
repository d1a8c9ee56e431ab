//! Protocol constants shared by the store and the client facade

use std::time::Duration;

/// Store name under which the access token is persisted.
pub const ACCESS_TOKEN_NAME: &str = "session.token";

/// Store name under which the refresh token is persisted.
pub const REFRESH_TOKEN_NAME: &str = "session.refresh_token";

/// Retention applied when persisting a credential (30 days).
pub const TOKEN_MAX_AGE: Duration = Duration::from_secs(60 * 60 * 24 * 30);

/// Path scope under which credentials are stored and read.
pub const DEFAULT_SCOPE: &str = "/";

/// Relative path of the token refresh endpoint.
pub const REFRESH_PATH: &str = "/refresh";
