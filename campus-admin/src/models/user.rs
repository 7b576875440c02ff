//! User model - the authenticated identity held by the session.

use serde::{Deserialize, Serialize};

use super::RoleName;

/// Identity returned by the backend on login, registration and `/auth/me`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub role: RoleName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub onboarding_completed: bool,
}

impl UserIdentity {
    /// Shallow-merge a profile patch. Role and id are never touched.
    pub fn apply(&mut self, patch: UserPatch) {
        if let Some(email) = patch.email {
            self.email = email;
        }
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(phone) = patch.phone {
            self.phone = phone;
        }
        if let Some(avatar) = patch.avatar {
            self.avatar = avatar;
        }
        if let Some(organization_id) = patch.organization_id {
            self.organization_id = organization_id;
        }
        if let Some(done) = patch.onboarding_completed {
            self.onboarding_completed = done;
        }
    }
}

/// Partial profile update. `None` leaves a field as is; for optional
/// fields `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPatch {
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<Option<String>>,
    pub avatar: Option<Option<String>>,
    pub organization_id: Option<Option<String>>,
    pub onboarding_completed: Option<bool>,
}

impl UserPatch {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn organization(organization_id: Option<String>) -> Self {
        Self {
            organization_id: Some(organization_id),
            ..Self::default()
        }
    }

    pub fn onboarding_completed() -> Self {
        Self {
            onboarding_completed: Some(true),
            ..Self::default()
        }
    }
}
