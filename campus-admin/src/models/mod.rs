pub mod device;
pub mod invitation;
pub mod organization;
pub mod role;
pub mod session;
pub mod user;

pub use device::DeviceFingerprint;
pub use invitation::{
    CreateInvitationRequest, Invitation, InvitationFilter, InvitationStatus, InvitationView,
};
pub use organization::{
    Branding, ContactSettings, CreateOrganizationRequest, Organization, OrganizationSettings,
    OrganizationStatus, Plan, SeoSettings, UpdateOrganizationRequest,
};
pub use role::{RoleName, UnknownRole};
pub use session::{Session, SessionPhase};
pub use user::{UserIdentity, UserPatch};
