//! Auth gateway - the backend's authentication endpoints behind one
//! result contract.
//!
//! Every operation returns an [`ActionResult`]; transport failures, backend
//! rejections and validation problems are all normalized into it. Success
//! paths that yield an identity install it in the [`SessionStore`].

use std::sync::Arc;
use validator::Validate;

use crate::dtos::{
    AuthPayload, EmailRequest, LoginPayload, LoginRequest, MeResponse, MessageResponse,
    RegisterRequest, ResetPasswordRequest, UpdatePasswordRequest, VerifyOtpRequest,
};
use crate::models::UserIdentity;
use crate::services::api_client::BackendClient;
use crate::services::device::DeviceFingerprintProvider;
use crate::services::error::{ActionResult, ClientError, GENERIC_FAILURE};
use crate::services::session::{HydrationTicket, SessionStore, ValidationOutcome};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

pub struct AuthGateway {
    client: Arc<BackendClient>,
    session: Arc<SessionStore>,
    device: Arc<DeviceFingerprintProvider>,
}

impl AuthGateway {
    pub fn new(
        client: Arc<BackendClient>,
        session: Arc<SessionStore>,
        device: Arc<DeviceFingerprintProvider>,
    ) -> Self {
        Self {
            client,
            session,
            device,
        }
    }

    #[tracing::instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> ActionResult<UserIdentity> {
        let credentials = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        if let Err(errors) = credentials.validate() {
            return ActionResult::invalid(&errors);
        }

        let payload = LoginPayload {
            credentials: &credentials,
            device: self.device.fingerprint(),
        };

        match self
            .client
            .post_public::<AuthPayload, _>("/auth/login", &payload)
            .await
        {
            Ok(body) => match self.open_session(body) {
                Some(user) => {
                    tracing::info!(user_id = %user.id, role = %user.role, "User logged in");
                    ActionResult::ok(user)
                }
                None => ActionResult::failed(GENERIC_FAILURE),
            },
            Err(ClientError::Rejected {
                status: 400 | 401 | 403,
                message,
            }) => {
                tracing::info!("Login rejected");
                ActionResult::failed(message.unwrap_or_else(|| INVALID_CREDENTIALS.to_string()))
            }
            Err(e) => {
                tracing::error!("Login failed: {}", e);
                ActionResult::from_error(&e)
            }
        }
    }

    #[tracing::instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(&self, request: RegisterRequest) -> ActionResult<Option<UserIdentity>> {
        if let Err(errors) = request.validate() {
            return ActionResult::invalid(&errors);
        }

        match self
            .client
            .post_public::<AuthPayload, _>("/auth/register", &request)
            .await
        {
            Ok(body) => {
                let message = body.message.clone();
                let user = self.open_session(body);
                let result = ActionResult::ok(user);
                match message {
                    Some(message) => result.with_message(message),
                    None => result,
                }
            }
            Err(e) => {
                tracing::warn!("Registration failed: {}", e);
                ActionResult::from_error(&e)
            }
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn send_otp(&self, email: &str) -> ActionResult {
        let request = EmailRequest {
            email: email.trim().to_string(),
        };
        if let Err(errors) = request.validate() {
            return ActionResult::invalid(&errors);
        }
        self.acknowledge(self.client.post_public("/auth/otp/send", &request).await)
    }

    #[tracing::instrument(skip(self, otp))]
    pub async fn verify_otp(&self, email: &str, otp: &str) -> ActionResult<Option<UserIdentity>> {
        let request = VerifyOtpRequest {
            email: email.trim().to_string(),
            otp: otp.trim().to_string(),
        };
        if let Err(errors) = request.validate() {
            return ActionResult::invalid(&errors);
        }

        match self
            .client
            .post_public::<AuthPayload, _>("/auth/otp/verify", &request)
            .await
        {
            Ok(body) => ActionResult::ok(self.open_session(body)),
            Err(e) => {
                tracing::warn!("OTP verification failed: {}", e);
                ActionResult::from_error(&e)
            }
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn forgot_password(&self, email: &str) -> ActionResult {
        let request = EmailRequest {
            email: email.trim().to_string(),
        };
        if let Err(errors) = request.validate() {
            return ActionResult::invalid(&errors);
        }
        self.acknowledge(
            self.client
                .post_public("/auth/password/forget", &request)
                .await,
        )
    }

    #[tracing::instrument(skip_all)]
    pub async fn reset_password(&self, request: ResetPasswordRequest) -> ActionResult {
        if let Err(errors) = request.validate() {
            return ActionResult::invalid(&errors);
        }
        self.acknowledge(
            self.client
                .post_public("/auth/password/reset", &request)
                .await,
        )
    }

    #[tracing::instrument(skip_all)]
    pub async fn update_password(&self, request: UpdatePasswordRequest) -> ActionResult {
        if let Err(errors) = request.validate() {
            return ActionResult::invalid(&errors);
        }
        self.acknowledge(self.client.post("/auth/password/update", &request).await)
    }

    /// Revoke the token server-side if there is one, then always clear the
    /// local session.
    #[tracing::instrument(skip(self))]
    pub async fn logout(&self) -> ActionResult {
        if self.session.token().is_some() {
            if let Err(e) = self
                .client
                .post::<Option<MessageResponse>, _>("/auth/logout", &serde_json::json!({}))
                .await
            {
                tracing::warn!("Failed to revoke token during logout: {}", e);
            }
        }
        self.session.logout();
        ActionResult::done()
    }

    /// Fetch the identity behind the current token and refresh the session.
    #[tracing::instrument(skip(self))]
    pub async fn current_user(&self) -> ActionResult<UserIdentity> {
        let generation = self.session.generation();
        match self.client.get::<MeResponse>("/auth/me").await {
            Ok(me) => {
                let user = me.into_user();
                if let Err(e) = self.session.refresh_identity(generation, user.clone()) {
                    tracing::error!("Failed to store refreshed identity: {}", e);
                }
                ActionResult::ok(user)
            }
            Err(e) => ActionResult::from_error(&e),
        }
    }

    /// Second phase of hydration: ask the backend whether the restored
    /// identity is still good and settle the session with its answer.
    #[tracing::instrument(skip(self))]
    pub async fn revalidate(&self, ticket: HydrationTicket) -> ActionResult<UserIdentity> {
        let response = self.client.get::<MeResponse>("/auth/me").await;

        let (outcome, result) = match response {
            Ok(me) => {
                let user = me.into_user();
                (
                    ValidationOutcome::Confirmed(user.clone()),
                    ActionResult::ok(user),
                )
            }
            Err(e) => {
                tracing::info!("Restored session failed validation: {}", e);
                (ValidationOutcome::Rejected, ActionResult::from_error(&e))
            }
        };

        match self.session.complete_hydration(ticket, outcome) {
            Ok(true) => result,
            // A 401 already logged the session out; otherwise a login or
            // logout overtook this validation.
            Ok(false) if !result.success => result,
            Ok(false) => ActionResult::failed("Session changed while it was being validated"),
            Err(e) => {
                tracing::error!("Failed to store validated identity: {}", e);
                ActionResult::failed(GENERIC_FAILURE)
            }
        }
    }

    /// Install the session carried by an auth response, if it carries one.
    fn open_session(&self, body: AuthPayload) -> Option<UserIdentity> {
        let (Some(user), Some(token)) = (body.user, body.access_token) else {
            return None;
        };
        if token.is_empty() {
            return None;
        }
        if body.refresh_token.is_some() {
            tracing::debug!("Refresh token issued; not persisted");
        }

        let role = user.role;
        match self.session.set_user(user.clone(), token, role) {
            Ok(()) => Some(user),
            Err(e) => {
                tracing::error!("Failed to persist session: {}", e);
                None
            }
        }
    }

    /// An empty body (204 or blank 200) is a plain acknowledgement.
    fn acknowledge(&self, response: Result<Option<MessageResponse>, ClientError>) -> ActionResult {
        match response {
            Ok(body) => {
                let result = ActionResult::done();
                match body.and_then(|b| b.message) {
                    Some(message) => result.with_message(message),
                    None => result,
                }
            }
            Err(e) => {
                tracing::warn!("Auth request failed: {}", e);
                ActionResult::from_error(&e)
            }
        }
    }
}
