//! Invitation lifecycle - create, revoke, resend and list tenant invitations.
//!
//! Permission checks run before anything reaches the backend, and every
//! operation is scoped to the active organization. Terminal invitations are
//! rejected locally from the registry of invitations this manager has seen.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use validator::Validate;

use crate::dtos::EmailRequest;
use crate::models::{
    CreateInvitationRequest, Invitation, InvitationFilter, InvitationStatus, InvitationView,
    RoleName, UserIdentity,
};
use crate::services::api_client::BackendClient;
use crate::services::error::{ActionResult, ClientError};
use crate::services::organization::OrganizationContext;
use crate::services::permissions::can_invite;
use crate::services::session::SessionStore;

#[derive(Debug, Error)]
pub enum InvitationError {
    #[error("{actor} may not invite {target}")]
    PermissionDenied { actor: RoleName, target: RoleName },

    #[error("No organization is active")]
    NoOrganization,

    #[error("Inviter {0} is not the signed-in user")]
    InviterMismatch(String),

    #[error("Invitation {0} not found")]
    NotFound(String),

    #[error("Invitation is {0:?}")]
    NotPending(InvitationStatus),

    #[error("Invitation belongs to another organization")]
    CrossTenant,

    #[error("Organization changed while the request was in flight")]
    Superseded,

    #[error("Backend returned an invitation in an unexpected state")]
    Unexpected,

    #[error(transparent)]
    Client(#[from] ClientError),
}

impl InvitationError {
    pub fn user_message(&self) -> String {
        match self {
            InvitationError::PermissionDenied { target, .. } => format!(
                "You do not have permission to invite a {}",
                target.display_name()
            ),
            InvitationError::NoOrganization => "Select an organization first.".to_string(),
            InvitationError::InviterMismatch(_) => {
                "Invitations can only be sent as the signed-in user.".to_string()
            }
            InvitationError::NotFound(_) => "Invitation not found.".to_string(),
            InvitationError::NotPending(status) => format!(
                "Only pending invitations can be changed; this one is {}.",
                status.as_str()
            ),
            InvitationError::CrossTenant => "Invitation not found.".to_string(),
            InvitationError::Superseded => {
                "The active organization changed. Please try again.".to_string()
            }
            InvitationError::Unexpected => crate::services::error::GENERIC_FAILURE.to_string(),
            InvitationError::Client(e) => e.user_message(),
        }
    }
}

impl<T> From<InvitationError> for ActionResult<T> {
    fn from(error: InvitationError) -> Self {
        ActionResult::failed(error.user_message())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InvitationBody {
    Wrapped { invitation: Invitation },
    Bare(Invitation),
}

impl InvitationBody {
    fn into_invitation(self) -> Invitation {
        match self {
            InvitationBody::Wrapped { invitation } | InvitationBody::Bare(invitation) => invitation,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InvitationList {
    Bare(Vec<Invitation>),
    Wrapped { invitations: Vec<Invitation> },
    Data { data: Vec<Invitation> },
}

impl InvitationList {
    fn into_vec(self) -> Vec<Invitation> {
        match self {
            InvitationList::Bare(list)
            | InvitationList::Wrapped { invitations: list }
            | InvitationList::Data { data: list } => list,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Revoke,
    Resend,
}

impl Transition {
    fn as_str(&self) -> &'static str {
        match self {
            Transition::Revoke => "revoke",
            Transition::Resend => "resend",
        }
    }
}

pub type Clock = fn() -> DateTime<Utc>;

pub struct InvitationManager {
    client: Arc<BackendClient>,
    session: Arc<SessionStore>,
    organizations: Arc<OrganizationContext>,
    registry: RwLock<HashMap<String, Invitation>>,
    clock: Clock,
}

impl InvitationManager {
    pub fn new(
        client: Arc<BackendClient>,
        session: Arc<SessionStore>,
        organizations: Arc<OrganizationContext>,
    ) -> Self {
        Self {
            client,
            session,
            organizations,
            registry: RwLock::new(HashMap::new()),
            clock: Utc::now,
        }
    }

    /// Evaluate lazy expiry against `clock` instead of the wall clock.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Last known copy of an invitation of the active organization, if this
    /// manager has seen it.
    pub fn cached(&self, invitation_id: &str) -> Option<Invitation> {
        let organization_id = self.organizations.current_id()?;
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(invitation_id)
            .filter(|invitation| invitation.organization_id == organization_id)
            .cloned()
    }

    /// Forget every invitation seen so far.
    pub fn reset(&self) {
        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn remember(&self, invitation: &Invitation) {
        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(invitation.id.clone(), invitation.clone());
    }

    #[tracing::instrument(skip(self, invited_by), fields(invited_by = %invited_by.id))]
    pub async fn create(
        &self,
        email: &str,
        role_to_assign: RoleName,
        invited_by: &UserIdentity,
    ) -> ActionResult<Invitation> {
        let email = EmailRequest {
            email: email.trim().to_string(),
        };
        if let Err(errors) = email.validate() {
            return ActionResult::invalid(&errors);
        }

        match self.try_create(email.email, role_to_assign, invited_by).await {
            Ok(invitation) => {
                tracing::info!(invitation_id = %invitation.id, role = %role_to_assign, "Invitation created");
                ActionResult::ok(invitation)
            }
            Err(e) => {
                tracing::warn!("Invitation not created: {}", e);
                e.into()
            }
        }
    }

    async fn try_create(
        &self,
        email: String,
        role_to_assign: RoleName,
        invited_by: &UserIdentity,
    ) -> Result<Invitation, InvitationError> {
        let inviter = self.session.user().ok_or(ClientError::NotAuthenticated)?;
        if inviter.id != invited_by.id {
            return Err(InvitationError::InviterMismatch(invited_by.id.clone()));
        }
        let actor = self.session.role().unwrap_or(inviter.role);
        if !can_invite(actor, role_to_assign) {
            return Err(InvitationError::PermissionDenied {
                actor,
                target: role_to_assign,
            });
        }
        let organization_id = self
            .organizations
            .current_id()
            .ok_or(InvitationError::NoOrganization)?;
        let epoch = self.organizations.epoch();

        let request = CreateInvitationRequest {
            email,
            role_to_assign,
            organization_id: organization_id.clone(),
            invited_by: invited_by.id.clone(),
        };
        let invitation = self
            .client
            .post::<InvitationBody, _>("/invitations", &request)
            .await?
            .into_invitation();

        if invitation.organization_id != organization_id {
            tracing::warn!(invitation_id = %invitation.id, "Created invitation reported for another organization");
            return Err(InvitationError::CrossTenant);
        }
        if !invitation.is_pending() {
            tracing::warn!(status = invitation.status.as_str(), "New invitation is not pending");
            return Err(InvitationError::Unexpected);
        }
        self.remember(&invitation);
        if self.organizations.epoch() != epoch {
            return Err(InvitationError::Superseded);
        }
        Ok(invitation)
    }

    #[tracing::instrument(skip(self))]
    pub async fn revoke(&self, invitation_id: &str) -> ActionResult<Invitation> {
        match self.transition(invitation_id, Transition::Revoke).await {
            Ok(invitation) => {
                tracing::info!("Invitation revoked");
                ActionResult::ok(invitation)
            }
            Err(e) => {
                tracing::warn!("Revoke rejected: {}", e);
                e.into()
            }
        }
    }

    /// Re-deliver the invitation. Status and expiry only change if the
    /// backend says so.
    #[tracing::instrument(skip(self))]
    pub async fn resend(&self, invitation_id: &str) -> ActionResult<Invitation> {
        match self.transition(invitation_id, Transition::Resend).await {
            Ok(invitation) => {
                tracing::info!("Invitation resent");
                ActionResult::ok(invitation)
            }
            Err(e) => {
                tracing::warn!("Resend rejected: {}", e);
                e.into()
            }
        }
    }

    async fn transition(
        &self,
        invitation_id: &str,
        action: Transition,
    ) -> Result<Invitation, InvitationError> {
        let known = self
            .cached(invitation_id)
            .ok_or_else(|| InvitationError::NotFound(invitation_id.to_string()))?;
        if !known.is_pending() {
            return Err(InvitationError::NotPending(known.status));
        }

        let actor = self.session.role().ok_or(ClientError::NotAuthenticated)?;
        if !can_invite(actor, known.role_to_assign) {
            return Err(InvitationError::PermissionDenied {
                actor,
                target: known.role_to_assign,
            });
        }
        match self.organizations.current_id() {
            Some(active) if active == known.organization_id => {}
            Some(_) => return Err(InvitationError::CrossTenant),
            None => return Err(InvitationError::NoOrganization),
        }

        // Some deployments answer with the updated invitation, others with a
        // bare acknowledgement.
        let body: serde_json::Value = self
            .client
            .post(
                &format!(
                    "/invitations/{}/{}",
                    urlencoding::encode(invitation_id),
                    action.as_str()
                ),
                &serde_json::json!({}),
            )
            .await?;

        let organization_id = known.organization_id.clone();
        let reported = serde_json::from_value::<InvitationBody>(body)
            .ok()
            .map(InvitationBody::into_invitation);
        let updated = match reported {
            Some(invitation) => invitation,
            None if action == Transition::Revoke => Invitation {
                status: InvitationStatus::Revoked,
                ..known
            },
            None => known,
        };
        if updated.id != invitation_id || updated.organization_id != organization_id {
            return Err(InvitationError::Unexpected);
        }
        self.remember(&updated);
        Ok(updated)
    }

    /// Invitations of the active organization, with expiry evaluated now.
    #[tracing::instrument(skip(self))]
    pub async fn list(&self, filter: InvitationFilter) -> ActionResult<Vec<InvitationView>> {
        match self.try_list(&filter).await {
            Ok(views) => ActionResult::ok(views),
            Err(e) => {
                tracing::warn!("Listing invitations failed: {}", e);
                e.into()
            }
        }
    }

    async fn try_list(
        &self,
        filter: &InvitationFilter,
    ) -> Result<Vec<InvitationView>, InvitationError> {
        let organization_id = self
            .organizations
            .current_id()
            .ok_or(InvitationError::NoOrganization)?;
        let epoch = self.organizations.epoch();

        let mut query = vec![("organizationId", organization_id.clone())];
        if let Some(status) = filter.status {
            query.push(("status", status.as_str().to_string()));
        }
        if let Some(role) = filter.role_to_assign {
            query.push(("role", role.as_str().to_string()));
        }

        let rows = self
            .client
            .get_with_query::<InvitationList, _>("/invitations", &query)
            .await?
            .into_vec();

        if self.organizations.epoch() != epoch
            || self.organizations.current_id().as_deref() != Some(organization_id.as_str())
        {
            return Err(InvitationError::Superseded);
        }

        let now = (self.clock)();
        let mut views = Vec::with_capacity(rows.len());
        for invitation in rows {
            if invitation.organization_id != organization_id {
                tracing::warn!(
                    invitation_id = %invitation.id,
                    organization_id = %invitation.organization_id,
                    "Dropping invitation from another organization"
                );
                continue;
            }
            self.remember(&invitation);
            if filter.matches(&invitation) {
                views.push(InvitationView::at(invitation, now));
            }
        }
        Ok(views)
    }
}
