//! Credential lifecycle: decides on every run whether the stored credential
//! can be reused, must be refreshed, or has to be created from scratch.
//!
//! ```text
//!                    latest() = None
//!   ┌────────────┐ ─────────────────▶ NoCredential ──▶ Authorizing ─┐
//!   │   start    │   fresh row                                      │ tokens
//!   │  ready()   │ ─────────────────▶ FreshCredential ──────────────┼──▶ Ready
//!   │  latest()  │   stale row                                      │
//!   └────────────┘ ─────────────────▶ StaleCredential ─▶ Refreshing ┘
//!                                                        │ rejected / error
//!                                                        ▼
//!                                                      Failed
//! ```
//!
//! Nothing about the machine is persisted. Each run re-derives its starting
//! state from the most recent credential row.

mod manager;


pub use manager::CredentialLifecycleManager;

/// States of one credential resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    NoCredential,
    FreshCredential,
    StaleCredential,
    Refreshing,
    Authorizing,
    Ready,
    Failed,
}

impl LifecycleState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Ready | LifecycleState::Failed)
    }
}

/// Outcome of a successful resolution.
#[derive(Clone)]
pub struct Resolution {
    /// Plaintext bearer token; keep it in memory only
    pub access_token: String,
    /// Row the token came from (existing or newly appended)
    pub credential_id: i64,
    /// States visited, in order, ending in `Ready`
    pub trail: Vec<LifecycleState>,
}

impl Resolution {
    /// True if this run went to the token endpoint.
    pub fn issued_new_credential(&self) -> bool {
        self.trail
            .iter()
            .any(|s| matches!(s, LifecycleState::Refreshing | LifecycleState::Authorizing))
    }
}

impl std::fmt::Debug for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolution")
            .field("credential_id", &self.credential_id)
            .field("trail", &self.trail)
            .finish_non_exhaustive()
    }
}
