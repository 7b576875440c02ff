use std::sync::Arc;

use crate::config::Settings;
use crate::models::UserIdentity;
use crate::services::{
    ActionResult, AuthGateway, BackendClient, ClientError, DeviceEnvironment,
    DeviceFingerprintProvider, InvitationManager, OrganizationContext, SessionStore,
    SystemEnvironment,
};
use crate::storage::{FileStore, KeyValueStore, MemoryStore};

/// The console's service graph. Constructed once per process; every
/// component receives its collaborators as handles.
pub struct Console {
    pub storage: Arc<dyn KeyValueStore>,
    pub session: Arc<SessionStore>,
    pub device: Arc<DeviceFingerprintProvider>,
    pub client: Arc<BackendClient>,
    pub auth: Arc<AuthGateway>,
    pub organizations: Arc<OrganizationContext>,
    pub invitations: Arc<InvitationManager>,
}

impl Console {
    /// Wire the services from configuration: file-backed storage when a
    /// path is configured, in-memory otherwise.
    pub fn build(settings: &Settings) -> Result<Self, ClientError> {
        let storage: Arc<dyn KeyValueStore> = match &settings.storage.path {
            Some(path) => Arc::new(FileStore::new(path.clone())),
            None => Arc::new(MemoryStore::new()),
        };
        let environment = Arc::new(SystemEnvironment::new(settings.device.user_agent.clone()));
        Self::with_storage(settings, storage, environment)
    }

    pub fn with_storage(
        settings: &Settings,
        storage: Arc<dyn KeyValueStore>,
        environment: Arc<dyn DeviceEnvironment>,
    ) -> Result<Self, ClientError> {
        let session = Arc::new(SessionStore::new(storage.clone()));
        let device = Arc::new(DeviceFingerprintProvider::new(storage.clone(), environment));
        let client = Arc::new(BackendClient::new(&settings.backend, session.clone())?);
        let auth = Arc::new(AuthGateway::new(
            client.clone(),
            session.clone(),
            device.clone(),
        ));
        let organizations = Arc::new(OrganizationContext::new(
            client.clone(),
            session.clone(),
            settings.organization.cache_ttl_secs,
        ));
        let invitations = Arc::new(InvitationManager::new(
            client.clone(),
            session.clone(),
            organizations.clone(),
        ));

        Ok(Self {
            storage,
            session,
            device,
            client,
            auth,
            organizations,
            invitations,
        })
    }

    /// Hydrate the stored session, validate it against the backend and load
    /// its organization. Returns the validated identity, if any.
    #[tracing::instrument(skip(self))]
    pub async fn start(&self) -> Option<UserIdentity> {
        let ticket = self.session.hydrate()?;
        let validated = self.auth.revalidate(ticket).await;
        if !validated.success {
            tracing::info!("No usable stored session");
            return None;
        }
        self.load_organization().await;
        validated.into_data()
    }

    /// Log in and bring up the user's organization context.
    pub async fn login(&self, email: &str, password: &str) -> ActionResult<UserIdentity> {
        let result = self.auth.login(email, password).await;
        if result.success {
            self.organizations.reset();
            self.invitations.reset();
            self.load_organization().await;
        }
        result
    }

    /// Log out and drop every tenant-scoped cache.
    pub async fn logout(&self) -> ActionResult {
        let result = self.auth.logout().await;
        self.organizations.reset();
        self.invitations.reset();
        result
    }

    async fn load_organization(&self) {
        match self.organizations.load_active().await {
            Ok(Some(org)) => tracing::info!(organization_id = %org.id, "Active organization ready"),
            Ok(None) => tracing::debug!("Session has no organization"),
            Err(e) => tracing::warn!("Failed to load active organization: {}", e),
        }
    }
}
