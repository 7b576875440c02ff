//! Services layer for the campus admin console.
//!
//! Session, authentication, tenant and invitation logic over the REST
//! backend, plus the role/permission tables they share.

pub mod api_client;
mod auth;
pub mod device;
pub mod error;
mod invitation;
mod organization;
pub mod permissions;
mod session;

pub use api_client::BackendClient;
pub use auth::AuthGateway;
pub use device::{DeviceEnvironment, DeviceFingerprintProvider, StaticEnvironment, SystemEnvironment};
pub use error::{ActionResult, ClientError, FieldError};
pub use invitation::{Clock, InvitationError, InvitationManager};
pub use organization::{OrganizationContext, OrganizationError};
pub use session::{HydrationTicket, SessionError, SessionStore, ValidationOutcome};
