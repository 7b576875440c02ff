pub mod auth;

pub use auth::{
    AuthPayload, EmailRequest, LoginPayload, LoginRequest, MeResponse, MessageResponse,
    RegisterRequest, ResetPasswordRequest, UpdatePasswordRequest, VerifyOtpRequest,
};
