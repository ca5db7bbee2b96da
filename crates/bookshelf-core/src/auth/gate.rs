//! Decides which surface the application shell may show.
//!
//! The gate is the only place that looks at authentication state on behalf
//! of views. Protected views take `Authenticated` as a given.

use super::claims::UserClaims;
use super::session::{Session, SessionStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Surface {
    /// Neutral loading indicator, no navigation
    Loading,
    /// Landing page with login and register triggers.
    /// `init_failed` is kept for diagnostics only; rendering is identical.
    Public { init_failed: bool },
    /// Navigable views with a logout trigger
    Protected { claims: UserClaims },
}

/// User-triggered session transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateAction {
    Login,
    Register,
    Logout,
}

pub struct AccessGate;

impl AccessGate {
    pub fn surface(session: &Session) -> Surface {
        match (session.status(), session.claims()) {
            (SessionStatus::Uninitialized | SessionStatus::Initializing, _) => Surface::Loading,
            (SessionStatus::Unauthenticated, _) => Surface::Public { init_failed: false },
            (SessionStatus::InitFailed, _) => Surface::Public { init_failed: true },
            (SessionStatus::Authenticated, Some(claims)) => Surface::Protected {
                claims: claims.clone(),
            },
            // Unreachable: an authenticated session always carries claims
            (SessionStatus::Authenticated, None) => Surface::Public { init_failed: false },
        }
    }

    /// Whether `action` is offered on `surface`
    pub fn allows(surface: &Surface, action: GateAction) -> bool {
        match surface {
            Surface::Loading => false,
            Surface::Public { .. } => matches!(action, GateAction::Login | GateAction::Register),
            Surface::Protected { .. } => action == GateAction::Logout,
        }
    }
}

impl Surface {
    pub fn is_loading(&self) -> bool {
        matches!(self, Surface::Loading)
    }

    pub fn is_public(&self) -> bool {
        matches!(self, Surface::Public { .. })
    }

    pub fn is_protected(&self) -> bool {
        matches!(self, Surface::Protected { .. })
    }
}
