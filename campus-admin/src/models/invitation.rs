//! Invitation model - tenant invitations with a pre-assigned role.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RoleName;

/// Invitation status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Expired,
    Revoked,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Expired => "expired",
            InvitationStatus::Revoked => "revoked",
        }
    }

    /// Accepted, expired and revoked invitations never change again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, InvitationStatus::Pending)
    }
}

/// Invitation entity as reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    pub id: String,
    pub organization_id: String,
    pub email: String,
    pub role_to_assign: RoleName,
    pub invited_by: String,
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Invitation {
    /// Status for display at `now`.
    ///
    /// A pending invitation past its expiry reads as expired, but the
    /// stored status stays pending until the backend says otherwise.
    pub fn effective_status(&self, now: DateTime<Utc>) -> InvitationStatus {
        if self.status == InvitationStatus::Pending && now > self.expires_at {
            InvitationStatus::Expired
        } else {
            self.status
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == InvitationStatus::Pending
    }
}

/// Invitation plus its display status.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationView {
    #[serde(flatten)]
    pub invitation: Invitation,
    pub effective_status: InvitationStatus,
}

impl InvitationView {
    pub fn at(invitation: Invitation, now: DateTime<Utc>) -> Self {
        let effective_status = invitation.effective_status(now);
        Self {
            invitation,
            effective_status,
        }
    }
}

/// Optional narrowing of an invitation listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvitationFilter {
    pub status: Option<InvitationStatus>,
    pub role_to_assign: Option<RoleName>,
}

impl InvitationFilter {
    pub fn matches(&self, invitation: &Invitation) -> bool {
        self.status.map_or(true, |s| invitation.status == s)
            && self
                .role_to_assign
                .map_or(true, |r| invitation.role_to_assign == r)
    }
}

/// Request to create an invitation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvitationRequest {
    pub email: String,
    pub role_to_assign: RoleName,
    pub organization_id: String,
    pub invited_by: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn invitation(status: InvitationStatus) -> Invitation {
        let created_at = Utc::now();
        Invitation {
            id: "inv-1".to_string(),
            organization_id: "org-a".to_string(),
            email: "new@example.com".to_string(),
            role_to_assign: RoleName::Instructor,
            invited_by: "u1".to_string(),
            status,
            created_at,
            expires_at: created_at + Duration::days(7),
        }
    }

    #[test]
    fn test_pending_past_expiry_displays_as_expired() {
        let inv = invitation(InvitationStatus::Pending);
        let later = inv.expires_at + Duration::seconds(1);
        assert_eq!(inv.effective_status(later), InvitationStatus::Expired);
        assert_eq!(inv.status, InvitationStatus::Pending);
        assert_eq!(inv.effective_status(inv.expires_at), InvitationStatus::Pending);
    }

    #[test]
    fn test_terminal_statuses_are_not_reinterpreted() {
        let inv = invitation(InvitationStatus::Revoked);
        let later = inv.expires_at + Duration::days(1);
        assert_eq!(inv.effective_status(later), InvitationStatus::Revoked);
        assert!(InvitationStatus::Accepted.is_terminal());
        assert!(!InvitationStatus::Pending.is_terminal());
    }

    #[test]
    fn test_filter_matches_status_and_role() {
        let inv = invitation(InvitationStatus::Pending);
        assert!(InvitationFilter::default().matches(&inv));
        assert!(InvitationFilter {
            status: Some(InvitationStatus::Pending),
            role_to_assign: Some(RoleName::Instructor),
        }
        .matches(&inv));
        assert!(!InvitationFilter {
            status: None,
            role_to_assign: Some(RoleName::Student),
        }
        .matches(&inv));
    }
}
