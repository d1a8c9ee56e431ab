//! Session context capability
//!
//! Whether the client runs inside an interactive session (where ending the
//! session on an unrecoverable failure is appropriate) or a server-rendering
//! context (where the caller must receive a typed error instead) is an
//! explicit capability supplied at construction, never queried from ambient
//! process state.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Action that terminates the interactive session: assumed to clear local
/// credentials and redirect. Invoked at most once per unrecoverable failure.
///
/// Uses a `Pin<Box<dyn Future>>` return type for dyn-compatibility
/// (`Arc<dyn SignOut>`).
pub trait SignOut: Send + Sync {
    fn sign_out(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Execution environment the client was constructed for.
#[derive(Clone)]
pub enum SessionContext {
    /// Browser-like session: unrecoverable failures trigger sign-out and the
    /// caller receives nothing beyond the original rejection.
    Interactive(Arc<dyn SignOut>),
    /// Server-rendering: unrecoverable failures surface `Error::Credential`
    /// and no global side effect is performed.
    Server,
}

impl SessionContext {
    pub fn is_interactive(&self) -> bool {
        matches!(self, Self::Interactive(_))
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interactive(_) => write!(f, "Interactive"),
            Self::Server => write!(f, "Server"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    impl SignOut for Noop {
        fn sign_out(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
            Box::pin(async {})
        }
    }

    #[test]
    fn debug_names_the_variant() {
        let interactive = SessionContext::Interactive(Arc::new(Noop));
        assert_eq!(format!("{:?}", interactive), "Interactive");
        assert_eq!(format!("{:?}", SessionContext::Server), "Server");
    }

    #[test]
    fn is_interactive_matches_variant() {
        assert!(SessionContext::Interactive(Arc::new(Noop)).is_interactive());
        assert!(!SessionContext::Server.is_interactive());
    }
}
