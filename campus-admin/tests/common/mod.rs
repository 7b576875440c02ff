#![allow(dead_code)]

use campus_admin::config::{BackendSettings, Settings};
use campus_admin::models::{Organization, RoleName, UserIdentity};
use campus_admin::services::StaticEnvironment;
use campus_admin::storage::{KeyValueStore, MemoryStore};
use campus_admin::Console;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::MockServer;

pub const TEST_ORG_ID: &str = "org-a";
pub const OTHER_ORG_ID: &str = "org-b";
pub const TEST_USER_ID: &str = "u1";
pub const TEST_TOKEN: &str = "tok123";

pub struct TestConsole {
    pub console: Console,
    pub server: MockServer,
    pub storage: Arc<MemoryStore>,
}

impl TestConsole {
    pub async fn spawn() -> Self {
        let server = MockServer::start().await;
        let storage = Arc::new(MemoryStore::new());
        let console = build_console(&server.uri(), storage.clone());
        Self {
            console,
            server,
            storage,
        }
    }

    /// Install a session directly, as a completed login would.
    pub fn sign_in(&self, role: RoleName, organization_id: Option<&str>) -> UserIdentity {
        let user = user(role, organization_id);
        self.console
            .session
            .set_user(user.clone(), TEST_TOKEN, role)
            .expect("Failed to install session");
        user
    }

    /// Sign in and make `organization_id` the active tenant without a fetch.
    pub fn sign_in_to(&self, role: RoleName, organization_id: &str) -> UserIdentity {
        let user = self.sign_in(role, None);
        self.console
            .organizations
            .switch_organization(organization(organization_id, false))
            .expect("Failed to switch organization");
        user
    }

    pub fn stored(&self, key: &str) -> Option<String> {
        self.storage.get(key).expect("Failed to read storage")
    }
}

pub fn build_console(backend_url: &str, storage: Arc<MemoryStore>) -> Console {
    let settings = Settings {
        backend: BackendSettings {
            url: backend_url.to_string(),
            timeout_secs: 5,
        },
        ..Settings::default()
    };
    let environment = Arc::new(StaticEnvironment {
        user_agent: Some(
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_0) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36"
                .to_string(),
        ),
        timezone: Some("Europe/Paris".to_string()),
    });
    Console::with_storage(&settings, storage, environment).expect("Failed to build console")
}

pub fn user(role: RoleName, organization_id: Option<&str>) -> UserIdentity {
    UserIdentity {
        id: TEST_USER_ID.to_string(),
        email: "a@x.com".to_string(),
        name: "Ada Lovelace".to_string(),
        phone: None,
        avatar: None,
        role,
        organization_id: organization_id.map(str::to_string),
        onboarding_completed: true,
    }
}

pub fn organization_json(id: &str, live_classes: bool) -> Value {
    json!({
        "id": id,
        "name": format!("Academy {}", id),
        "slug": id,
        "ownerId": TEST_USER_ID,
        "branding": {"primaryColor": "#112233"},
        "settings": {"features": {"liveClasses": live_classes}, "timezone": "Europe/Paris"},
        "status": "active",
        "plan": "pro"
    })
}

pub fn organization(id: &str, live_classes: bool) -> Organization {
    serde_json::from_value(organization_json(id, live_classes)).expect("Invalid organization")
}

pub fn invitation_json(
    id: &str,
    organization_id: &str,
    status: &str,
    role: &str,
    expires_at: DateTime<Utc>,
) -> Value {
    json!({
        "id": id,
        "organizationId": organization_id,
        "email": format!("{}@example.com", id),
        "roleToAssign": role,
        "invitedBy": TEST_USER_ID,
        "status": status,
        "createdAt": (expires_at - chrono::Duration::days(7)).to_rfc3339(),
        "expiresAt": expires_at.to_rfc3339()
    })
}
