//! Organization context - the single active tenant of a session.
//!
//! The active organization is always derived from the session's
//! `organizationId`. Switching or leaving replaces the whole context under
//! one lock, and an epoch counter lets in-flight fetches detect that the
//! context they were started for is gone.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

use crate::models::{
    Branding, ContactSettings, CreateOrganizationRequest, Organization, OrganizationSettings,
    SeoSettings, UpdateOrganizationRequest, UserPatch,
};
use crate::services::api_client::BackendClient;
use crate::services::error::ClientError;
use crate::services::permissions::{can_access_feature, Feature};
use crate::services::session::{SessionError, SessionStore};

#[derive(Debug, Error)]
pub enum OrganizationError {
    #[error("No organization is active for this session")]
    NoOrganization,

    #[error("Organization {requested} is outside the active tenant")]
    CrossTenant { requested: String },

    #[error("Not permitted to manage organization settings")]
    Forbidden,

    #[error("Organization context changed while the request was in flight")]
    Superseded,

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

struct CachedOrganization {
    organization: Arc<Organization>,
    fetched_at: DateTime<Utc>,
}

#[derive(Default)]
struct ContextState {
    active: Option<Arc<Organization>>,
    cache: HashMap<String, CachedOrganization>,
    epoch: u64,
}

impl ContextState {
    fn cache(&mut self, organization: Arc<Organization>) {
        self.cache.insert(
            organization.id.clone(),
            CachedOrganization {
                organization,
                fetched_at: Utc::now(),
            },
        );
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OrganizationList {
    Bare(Vec<Organization>),
    Wrapped { organizations: Vec<Organization> },
    Data { data: Vec<Organization> },
}

impl OrganizationList {
    fn into_vec(self) -> Vec<Organization> {
        match self {
            OrganizationList::Bare(list)
            | OrganizationList::Wrapped {
                organizations: list,
            }
            | OrganizationList::Data { data: list } => list,
        }
    }
}

pub struct OrganizationContext {
    client: Arc<BackendClient>,
    session: Arc<SessionStore>,
    state: RwLock<ContextState>,
    ttl: Duration,
}

impl OrganizationContext {
    pub fn new(client: Arc<BackendClient>, session: Arc<SessionStore>, ttl_secs: i64) -> Self {
        Self {
            client,
            session,
            state: RwLock::new(ContextState::default()),
            ttl: Duration::seconds(ttl_secs.max(0)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, ContextState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ContextState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// The active organization, provided it is the one the session names.
    pub fn current(&self) -> Option<Arc<Organization>> {
        let state = self.read();
        let session_org = self.session.organization_id()?;
        state
            .active
            .as_ref()
            .filter(|org| org.id == session_org)
            .cloned()
    }

    pub fn current_id(&self) -> Option<String> {
        self.current().map(|org| org.id.clone())
    }

    /// Feature flag of the active organization. Off when absent or when
    /// no organization is active.
    pub fn has_feature(&self, flag: &str) -> bool {
        self.current()
            .map(|org| org.has_feature(flag))
            .unwrap_or(false)
    }

    /// Bumped on every switch, leave and reset.
    pub fn epoch(&self) -> u64 {
        self.read().epoch
    }

    /// Fetch the session's organization, serving a fresh cached copy when
    /// one exists and `refresh` is not requested.
    #[tracing::instrument(skip(self))]
    pub async fn resolve(
        &self,
        organization_id: &str,
        refresh: bool,
    ) -> Result<Arc<Organization>, OrganizationError> {
        self.ensure_session_tenant(organization_id)?;

        let epoch = {
            let state = self.read();
            if !refresh {
                if let Some(cached) = state.cache.get(organization_id) {
                    if Utc::now() - cached.fetched_at < self.ttl {
                        return Ok(cached.organization.clone());
                    }
                }
            }
            state.epoch
        };

        let fetched: Organization = self
            .client
            .get(&format!(
                "/organizations/{}",
                urlencoding::encode(organization_id)
            ))
            .await?;
        if fetched.id != organization_id {
            tracing::warn!(
                requested = %organization_id,
                received = %fetched.id,
                "Backend answered with a different organization"
            );
            return Err(OrganizationError::CrossTenant {
                requested: fetched.id,
            });
        }

        let mut state = self.write();
        if state.epoch != epoch || self.session.organization_id().as_deref() != Some(organization_id)
        {
            tracing::warn!(organization_id = %organization_id, "Discarding stale organization fetch");
            return Err(OrganizationError::Superseded);
        }

        let organization = Arc::new(fetched);
        state.cache(organization.clone());
        if state
            .active
            .as_ref()
            .is_some_and(|active| active.id == organization.id)
        {
            state.active = Some(organization.clone());
        }
        Ok(organization)
    }

    /// Derive the active context from the session's organization id.
    #[tracing::instrument(skip(self))]
    pub async fn load_active(&self) -> Result<Option<Arc<Organization>>, OrganizationError> {
        let Some(organization_id) = self.session.organization_id() else {
            self.write().active = None;
            return Ok(None);
        };

        let epoch = self.epoch();
        let organization = self.resolve(&organization_id, false).await?;

        let mut state = self.write();
        if state.epoch != epoch
            || self.session.organization_id().as_deref() != Some(organization.id.as_str())
        {
            return Err(OrganizationError::Superseded);
        }
        state.active = Some(organization.clone());
        tracing::info!(organization_id = %organization.id, "Organization context loaded");
        Ok(Some(organization))
    }

    /// Make `organization` the active tenant: id, branding, settings and
    /// flags all change in one step together with the session's id.
    #[tracing::instrument(skip(self, organization), fields(organization_id = %organization.id))]
    pub fn switch_organization(
        &self,
        organization: Organization,
    ) -> Result<Arc<Organization>, OrganizationError> {
        if !self.session.is_authenticated() {
            return Err(ClientError::NotAuthenticated.into());
        }

        let organization = Arc::new(organization);
        let mut state = self.write();
        // Session first: if it fails the old context stays fully intact.
        self.session
            .update_user(UserPatch::organization(Some(organization.id.clone())))?;
        state.epoch += 1;
        state.cache(organization.clone());
        state.active = Some(organization.clone());
        tracing::info!(epoch = state.epoch, "Switched organization");
        Ok(organization)
    }

    /// Drop the active tenant. Afterwards the context behaves as if the
    /// session never had one; nothing stale is served from cache.
    #[tracing::instrument(skip(self))]
    pub fn leave_organization(&self) -> Result<(), OrganizationError> {
        let mut state = self.write();
        self.session.update_user(UserPatch::organization(None))?;
        state.epoch += 1;
        state.active = None;
        state.cache.clear();
        tracing::info!(epoch = state.epoch, "Left organization");
        Ok(())
    }

    /// Forget everything, e.g. on logout. The session is not touched.
    pub fn reset(&self) {
        let mut state = self.write();
        state.epoch += 1;
        state.active = None;
        state.cache.clear();
    }

    #[tracing::instrument(skip(self, request), fields(slug = %request.slug))]
    pub async fn create_organization(
        &self,
        request: CreateOrganizationRequest,
    ) -> Result<Organization, OrganizationError> {
        let organization: Organization = self.client.post("/organizations", &request).await?;
        tracing::info!(organization_id = %organization.id, "Organization created");
        Ok(organization)
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_user_organizations(
        &self,
        user_id: &str,
    ) -> Result<Vec<Organization>, OrganizationError> {
        let list: OrganizationList = self
            .client
            .get(&format!(
                "/users/{}/organizations",
                urlencoding::encode(user_id)
            ))
            .await?;
        Ok(list.into_vec())
    }

    pub async fn update_organization(
        &self,
        organization_id: &str,
        request: &UpdateOrganizationRequest,
    ) -> Result<Arc<Organization>, OrganizationError> {
        self.patch_active(organization_id, "", request).await
    }

    pub async fn update_branding(
        &self,
        organization_id: &str,
        branding: &Branding,
    ) -> Result<Arc<Organization>, OrganizationError> {
        self.patch_active(organization_id, "/branding", branding)
            .await
    }

    pub async fn update_settings(
        &self,
        organization_id: &str,
        settings: &OrganizationSettings,
    ) -> Result<Arc<Organization>, OrganizationError> {
        self.patch_active(organization_id, "/settings", settings)
            .await
    }

    pub async fn update_seo(
        &self,
        organization_id: &str,
        seo: &SeoSettings,
    ) -> Result<Arc<Organization>, OrganizationError> {
        self.patch_active(organization_id, "/seo", seo).await
    }

    pub async fn update_contact(
        &self,
        organization_id: &str,
        contact: &ContactSettings,
    ) -> Result<Arc<Organization>, OrganizationError> {
        self.patch_active(organization_id, "/contact", contact)
            .await
    }

    /// PATCH a section of the active organization and install the server's
    /// copy as the new context.
    #[tracing::instrument(skip(self, body))]
    async fn patch_active<B: serde::Serialize + ?Sized>(
        &self,
        organization_id: &str,
        section: &str,
        body: &B,
    ) -> Result<Arc<Organization>, OrganizationError> {
        let role = self.session.role().ok_or(ClientError::NotAuthenticated)?;
        if !can_access_feature(role, Feature::OrganizationSettings) {
            return Err(OrganizationError::Forbidden);
        }
        let epoch = self.epoch();
        match self.current_id() {
            Some(active) if active == organization_id => {}
            Some(_) => {
                return Err(OrganizationError::CrossTenant {
                    requested: organization_id.to_string(),
                })
            }
            None => return Err(OrganizationError::NoOrganization),
        }

        let updated: Organization = self
            .client
            .patch(
                &format!(
                    "/organizations/{}{}",
                    urlencoding::encode(organization_id),
                    section
                ),
                body,
            )
            .await?;

        let mut state = self.write();
        if state.epoch != epoch || updated.id != organization_id {
            return Err(OrganizationError::Superseded);
        }
        let updated = Arc::new(updated);
        state.cache(updated.clone());
        state.active = Some(updated.clone());
        tracing::info!(organization_id = %organization_id, section = %section, "Organization updated");
        Ok(updated)
    }

    fn ensure_session_tenant(&self, organization_id: &str) -> Result<(), OrganizationError> {
        match self.session.organization_id() {
            None => Err(OrganizationError::NoOrganization),
            Some(active) if active == organization_id => Ok(()),
            Some(_) => {
                tracing::warn!(requested = %organization_id, "Blocked cross-tenant organization lookup");
                Err(OrganizationError::CrossTenant {
                    requested: organization_id.to_string(),
                })
            }
        }
    }
}
