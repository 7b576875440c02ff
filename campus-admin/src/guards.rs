//! Route guards - allow, redirect or deny a navigation from session state.
//!
//! Evaluation is pure: it reads the session and organization context and
//! returns a [`GuardDecision`]; it never mutates either.

use std::sync::Arc;

use crate::models::{Organization, RoleName};
use crate::services::permissions::{can_access_feature, has_min_role, Feature};
use crate::services::{OrganizationContext, SessionStore};

pub const DEFAULT_LOGIN_ROUTE: &str = "/login";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session is still being validated; show a neutral loading state.
    Pending,
    Allow,
    RedirectToLogin { return_to: String },
    Redirect(String),
    /// Render the named fallback content in place of the route.
    Fallback(String),
    AccessDenied,
}

/// What a route needs before it may render.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteRequirement {
    authenticated: bool,
    min_role: Option<RoleName>,
    allowed_roles: Vec<RoleName>,
    feature: Option<Feature>,
    organization_feature: Option<String>,
    onboarding_route: Option<String>,
    redirect_to: Option<String>,
    fallback: Option<String>,
}

impl RouteRequirement {
    /// No requirements; always allowed.
    pub fn public() -> Self {
        Self::default()
    }

    pub fn authenticated() -> Self {
        Self {
            authenticated: true,
            ..Self::default()
        }
    }

    pub fn min_role(mut self, role: RoleName) -> Self {
        self.authenticated = true;
        self.min_role = Some(role);
        self
    }

    pub fn allowed_roles(mut self, roles: impl IntoIterator<Item = RoleName>) -> Self {
        self.authenticated = true;
        self.allowed_roles = roles.into_iter().collect();
        self
    }

    pub fn feature(mut self, feature: Feature) -> Self {
        self.authenticated = true;
        self.feature = Some(feature);
        self
    }

    /// Require a feature flag of the active organization.
    pub fn organization_feature(mut self, flag: impl Into<String>) -> Self {
        self.authenticated = true;
        self.organization_feature = Some(flag.into());
        self
    }

    /// Send users who have not finished onboarding to `route`.
    pub fn require_onboarding(mut self, route: impl Into<String>) -> Self {
        self.authenticated = true;
        self.onboarding_route = Some(route.into());
        self
    }

    pub fn redirect_to(mut self, route: impl Into<String>) -> Self {
        self.redirect_to = Some(route.into());
        self
    }

    pub fn fallback(mut self, content: impl Into<String>) -> Self {
        self.fallback = Some(content.into());
        self
    }

    pub fn is_protected(&self) -> bool {
        self.authenticated
    }

    fn denied(&self) -> GuardDecision {
        if let Some(route) = &self.redirect_to {
            GuardDecision::Redirect(route.clone())
        } else if let Some(content) = &self.fallback {
            GuardDecision::Fallback(content.clone())
        } else {
            GuardDecision::AccessDenied
        }
    }
}

/// Everything a guard looks at, captured at one instant.
#[derive(Debug, Clone, Default)]
pub struct AccessState {
    pub loading: bool,
    pub role: Option<RoleName>,
    pub onboarding_completed: bool,
    pub organization: Option<Arc<Organization>>,
}

impl AccessState {
    pub fn capture(session: &SessionStore, organizations: Option<&OrganizationContext>) -> Self {
        let snapshot = session.snapshot();
        let role = snapshot.is_authenticated.then_some(snapshot.role).flatten();
        Self {
            loading: session.is_loading(),
            role,
            onboarding_completed: snapshot
                .user
                .as_ref()
                .is_some_and(|u| u.onboarding_completed),
            organization: organizations.and_then(|o| o.current()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouteGuard {
    requirement: RouteRequirement,
}

impl RouteGuard {
    pub fn new(requirement: RouteRequirement) -> Self {
        Self { requirement }
    }

    pub fn requirement(&self) -> &RouteRequirement {
        &self.requirement
    }

    /// Decide for the live session and organization context.
    pub fn evaluate(
        &self,
        session: &SessionStore,
        organizations: Option<&OrganizationContext>,
        location: &str,
    ) -> GuardDecision {
        self.decide(&AccessState::capture(session, organizations), location)
    }

    pub fn decide(&self, state: &AccessState, location: &str) -> GuardDecision {
        let req = &self.requirement;
        if !req.is_protected() {
            return GuardDecision::Allow;
        }
        if state.loading {
            return GuardDecision::Pending;
        }
        let Some(role) = state.role else {
            return GuardDecision::RedirectToLogin {
                return_to: location.to_string(),
            };
        };

        if let Some(route) = &req.onboarding_route {
            if !state.onboarding_completed && route != location {
                return GuardDecision::Redirect(route.clone());
            }
        }

        if req.min_role.is_some_and(|min| !has_min_role(role, min)) {
            tracing::debug!(role = %role, location = %location, "Route denied: role below minimum");
            return req.denied();
        }
        if !req.allowed_roles.is_empty() && !req.allowed_roles.contains(&role) {
            tracing::debug!(role = %role, location = %location, "Route denied: role not allowed");
            return req.denied();
        }
        if req.feature.is_some_and(|f| !can_access_feature(role, f)) {
            tracing::debug!(role = %role, location = %location, "Route denied: feature not permitted");
            return req.denied();
        }
        if let Some(flag) = &req.organization_feature {
            let enabled = state
                .organization
                .as_ref()
                .is_some_and(|org| org.has_feature(flag));
            if !enabled {
                tracing::debug!(flag = %flag, location = %location, "Route denied: organization feature off");
                return req.denied();
            }
        }
        GuardDecision::Allow
    }
}

/// Login location carrying the originally requested route.
pub fn login_location(login_route: &str, return_to: &str) -> String {
    format!("{}?returnTo={}", login_route, urlencoding::encode(return_to))
}
