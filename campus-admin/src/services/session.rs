//! Session store - who is logged in, with what token and role.
//!
//! The only place session fields are mutated. Every mutation writes the
//! durable keys while holding the state lock, so storage and memory agree
//! once a call returns.

use secrecy::{ExposeSecret, Secret};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

use crate::models::{RoleName, Session, SessionPhase, UserIdentity, UserPatch};
use crate::storage::{KeyValueStore, StorageError, ROLE_KEY, TOKEN_KEY, USER_KEY};

const SESSION_KEYS: [&str; 3] = [USER_KEY, TOKEN_KEY, ROLE_KEY];

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to persist session: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to encode session: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Proof that an optimistic identity was installed by [`SessionStore::hydrate`].
///
/// Only the validation result carrying the current ticket may settle the
/// session; anything that bumped the generation in between wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HydrationTicket {
    generation: u64,
}

/// What the backend said about a restored identity.
#[derive(Debug, Clone)]
pub enum ValidationOutcome {
    Confirmed(UserIdentity),
    Rejected,
}

#[derive(Default)]
struct SessionState {
    user: Option<UserIdentity>,
    token: Option<Secret<String>>,
    role: Option<RoleName>,
    phase: SessionPhase,
    generation: u64,
}

impl SessionState {
    fn clear(&mut self, phase: SessionPhase) {
        self.user = None;
        self.token = None;
        self.role = None;
        self.phase = phase;
        self.generation += 1;
    }

    fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.token.is_some()
    }
}

pub struct SessionStore {
    storage: Arc<dyn KeyValueStore>,
    state: RwLock<SessionState>,
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read();
        f.debug_struct("SessionStore")
            .field("user", &state.user.as_ref().map(|u| &u.id))
            .field("role", &state.role)
            .field("phase", &state.phase)
            .field("generation", &state.generation)
            .finish()
    }
}

impl SessionStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            storage,
            state: RwLock::new(SessionState::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Restore the persisted session synchronously.
    ///
    /// Returns a ticket when an optimistic identity was installed; the
    /// caller is expected to revalidate it and hand the result to
    /// [`SessionStore::complete_hydration`]. Anything unreadable resolves to
    /// the fully logged-out state and wipes the stored keys.
    pub fn hydrate(&self) -> Option<HydrationTicket> {
        let mut state = self.write();

        match self.read_persisted() {
            Ok(Some((user, token, role))) => {
                state.generation += 1;
                state.user = Some(user);
                state.token = Some(Secret::new(token));
                state.role = Some(role);
                state.phase = SessionPhase::Hydrating;
                tracing::info!(
                    generation = state.generation,
                    role = %role,
                    "Restored session from storage, awaiting validation"
                );
                Some(HydrationTicket {
                    generation: state.generation,
                })
            }
            Ok(None) => {
                state.clear(SessionPhase::LoggedOut);
                None
            }
            Err(reason) => {
                tracing::warn!(%reason, "Discarding unreadable stored session");
                if let Err(e) = self.storage.remove_many(&SESSION_KEYS) {
                    tracing::error!("Failed to clear stored session: {}", e);
                }
                state.clear(SessionPhase::LoggedOut);
                None
            }
        }
    }

    fn read_persisted(&self) -> Result<Option<(UserIdentity, String, RoleName)>, String> {
        let user = self.storage.get(USER_KEY).map_err(|e| e.to_string())?;
        let token = self.storage.get(TOKEN_KEY).map_err(|e| e.to_string())?;
        let role = self.storage.get(ROLE_KEY).map_err(|e| e.to_string())?;

        match (user, token) {
            (None, None) => Ok(None),
            (Some(user), Some(token)) if !token.is_empty() => {
                let mut user: UserIdentity =
                    serde_json::from_str(&user).map_err(|e| format!("user: {}", e))?;
                let role = match role {
                    Some(raw) => RoleName::parse(&raw).map_err(|e| e.to_string())?,
                    None => user.role,
                };
                user.role = role;
                Ok(Some((user, token, role)))
            }
            _ => Err("partial session in storage".to_string()),
        }
    }

    /// Settle a hydration with the backend's verdict.
    ///
    /// Returns `Ok(false)` when the ticket is stale (a login or logout
    /// happened since) and the verdict was discarded.
    pub fn complete_hydration(
        &self,
        ticket: HydrationTicket,
        outcome: ValidationOutcome,
    ) -> Result<bool, SessionError> {
        let mut state = self.write();

        if state.generation != ticket.generation || state.phase != SessionPhase::Hydrating {
            tracing::warn!(
                ticket = ticket.generation,
                current = state.generation,
                "Discarding stale session validation"
            );
            return Ok(false);
        }

        match outcome {
            ValidationOutcome::Confirmed(user) => {
                let role = user.role;
                self.storage.set_many(&[
                    (USER_KEY, serde_json::to_string(&user)?),
                    (ROLE_KEY, role.as_str().to_string()),
                ])?;
                state.user = Some(user);
                state.role = Some(role);
                state.phase = SessionPhase::Validated;
                tracing::info!(role = %role, "Session validated");
            }
            ValidationOutcome::Rejected => {
                if let Err(e) = self.storage.remove_many(&SESSION_KEYS) {
                    tracing::error!("Failed to clear stored session: {}", e);
                }
                state.clear(SessionPhase::Invalidated);
                tracing::info!("Restored session rejected, logged out");
            }
        }
        Ok(true)
    }

    /// Replace the session wholesale and persist all three keys.
    pub fn set_user(
        &self,
        mut user: UserIdentity,
        token: impl Into<String>,
        role: RoleName,
    ) -> Result<(), SessionError> {
        let token = token.into();
        user.role = role;

        let mut state = self.write();
        self.storage.set_many(&[
            (USER_KEY, serde_json::to_string(&user)?),
            (TOKEN_KEY, token.clone()),
            (ROLE_KEY, role.as_str().to_string()),
        ])?;

        state.generation += 1;
        tracing::info!(user_id = %user.id, role = %role, generation = state.generation, "Session established");
        state.user = Some(user);
        state.token = Some(Secret::new(token));
        state.role = Some(role);
        state.phase = SessionPhase::Active;
        Ok(())
    }

    /// Overwrite the identity with a fresh copy from the backend, keeping
    /// the token. Ignored unless the session is still the one at `generation`.
    pub fn refresh_identity(
        &self,
        generation: u64,
        user: UserIdentity,
    ) -> Result<bool, SessionError> {
        let mut state = self.write();
        if state.generation != generation || !state.is_authenticated() {
            tracing::debug!(
                requested = generation,
                current = state.generation,
                "Discarding identity refresh for a superseded session"
            );
            return Ok(false);
        }

        let role = user.role;
        self.storage.set_many(&[
            (USER_KEY, serde_json::to_string(&user)?),
            (ROLE_KEY, role.as_str().to_string()),
        ])?;
        state.user = Some(user);
        state.role = Some(role);
        Ok(true)
    }

    /// Merge a profile patch into the current user.
    ///
    /// Returns `Ok(false)` without touching anything when nobody is logged in.
    pub fn update_user(&self, patch: UserPatch) -> Result<bool, SessionError> {
        let mut state = self.write();
        let Some(current) = state.user.as_ref() else {
            return Ok(false);
        };

        let mut updated = current.clone();
        updated.apply(patch);
        self.storage
            .set(USER_KEY, serde_json::to_string(&updated)?)?;
        state.user = Some(updated);
        Ok(true)
    }

    /// Clear the session. Safe to call with nobody logged in.
    pub fn logout(&self) {
        let mut state = self.write();
        let was_authenticated = state.is_authenticated();
        if let Err(e) = self.storage.remove_many(&SESSION_KEYS) {
            tracing::error!("Failed to clear stored session: {}", e);
        }
        state.clear(SessionPhase::LoggedOut);
        if was_authenticated {
            tracing::info!(generation = state.generation, "Session cleared");
        }
    }

    /// Log out because the backend rejected the credentials in use at
    /// `generation`. A rejection aimed at a session that has since been
    /// replaced is ignored.
    pub fn expire(&self, generation: u64) -> bool {
        let mut state = self.write();
        if state.generation != generation {
            tracing::debug!(
                rejected = generation,
                current = state.generation,
                "Ignoring rejection of a superseded session"
            );
            return false;
        }
        tracing::warn!("Backend rejected session credentials, logging out");
        if let Err(e) = self.storage.remove_many(&SESSION_KEYS) {
            tracing::error!("Failed to clear stored session: {}", e);
        }
        let phase = if state.phase == SessionPhase::Hydrating {
            SessionPhase::Invalidated
        } else {
            SessionPhase::LoggedOut
        };
        state.clear(phase);
        true
    }

    pub fn snapshot(&self) -> Session {
        let state = self.read();
        Session {
            user: state.user.clone(),
            token: state.token.as_ref().map(|t| t.expose_secret().clone()),
            role: state.role,
            is_authenticated: state.is_authenticated(),
        }
    }

    pub fn user(&self) -> Option<UserIdentity> {
        self.read().user.clone()
    }

    pub fn token(&self) -> Option<String> {
        self.read()
            .token
            .as_ref()
            .map(|t| t.expose_secret().clone())
    }

    pub fn role(&self) -> Option<RoleName> {
        self.read().role
    }

    pub fn organization_id(&self) -> Option<String> {
        self.read()
            .user
            .as_ref()
            .and_then(|u| u.organization_id.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().is_authenticated()
    }

    pub fn phase(&self) -> SessionPhase {
        self.read().phase
    }

    /// True while a restored identity awaits backend validation.
    pub fn is_loading(&self) -> bool {
        self.read().phase == SessionPhase::Hydrating
    }

    pub fn generation(&self) -> u64 {
        self.read().generation
    }
}
