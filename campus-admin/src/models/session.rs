use serde::Serialize;

use super::{RoleName, UserIdentity};

/// Read-only view of the session at one instant.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user: Option<UserIdentity>,
    pub token: Option<String>,
    pub role: Option<RoleName>,
    pub is_authenticated: bool,
}

impl Session {
    /// Either fully authenticated (user and token present) or fully logged out.
    pub fn is_consistent(&self) -> bool {
        match (&self.user, &self.token) {
            (Some(_), Some(_)) => self.is_authenticated,
            (None, None) => !self.is_authenticated,
            _ => false,
        }
    }

    pub fn organization_id(&self) -> Option<&str> {
        self.user.as_ref().and_then(|u| u.organization_id.as_deref())
    }
}

/// Where the session is in its hydrate/validate lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    /// No identity; nothing in flight.
    #[default]
    LoggedOut,
    /// Optimistic identity restored from storage, awaiting the backend.
    Hydrating,
    /// Backend confirmed the restored identity.
    Validated,
    /// Backend rejected the restored identity; session was cleared.
    Invalidated,
    /// Identity installed by an explicit login or registration.
    Active,
}
