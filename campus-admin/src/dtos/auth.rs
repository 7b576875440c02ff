use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{DeviceFingerprint, UserIdentity};

#[derive(Debug, Clone, Serialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Login body as sent: credentials plus the device fingerprint.
#[derive(Debug, Serialize)]
pub struct LoginPayload<'a> {
    #[serde(flatten)]
    pub credentials: &'a LoginRequest,
    #[serde(flatten)]
    pub device: DeviceFingerprint,
}

#[derive(Debug, Clone, Default, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    #[serde(skip_serializing)]
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub confirm_password: String,
}

#[derive(Debug, Clone, Serialize, Validate)]
pub struct EmailRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Validate)]
pub struct VerifyOtpRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 4, max = 8, message = "Enter the code from your email"))]
    pub otp: String,
}

#[derive(Debug, Clone, Default, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "Reset token is required"))]
    pub token: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    #[serde(skip_serializing)]
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub confirm_password: String,
}

#[derive(Debug, Clone, Default, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,

    #[serde(skip_serializing)]
    #[validate(must_match(other = "new_password", message = "Passwords do not match"))]
    pub confirm_password: String,
}

/// Body returned by login, registration and OTP verification. Registration
/// and OTP flows may omit the identity when no session is opened.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    #[serde(default)]
    pub user: Option<UserIdentity>,
    #[serde(default, alias = "token", alias = "access_token")]
    pub access_token: Option<String>,
    #[serde(default, alias = "refresh_token")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// `/auth/me` answers either `{ "user": {...} }` or the bare identity.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MeResponse {
    Wrapped { user: UserIdentity },
    Bare(UserIdentity),
}

impl MeResponse {
    pub fn into_user(self) -> UserIdentity {
        match self {
            MeResponse::Wrapped { user } | MeResponse::Bare(user) => user,
        }
    }
}

/// Acknowledgement body of fire-and-forget endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_confirmation_must_match() {
        let req = RegisterRequest {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            phone: None,
            password: "longenough".to_string(),
            confirm_password: "different1".to_string(),
        };
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("confirm_password"));
    }

    #[test]
    fn test_confirmation_is_not_sent() {
        let req = UpdatePasswordRequest {
            current_password: "old".to_string(),
            new_password: "newpassword".to_string(),
            confirm_password: "newpassword".to_string(),
        };
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"currentPassword": "old", "newPassword": "newpassword"})
        );
    }

    #[test]
    fn test_me_response_accepts_both_shapes() {
        let wrapped: MeResponse =
            serde_json::from_str(r#"{"user":{"id":"1","role":"student"}}"#).unwrap();
        let bare: MeResponse = serde_json::from_str(r#"{"id":"1","role":"student"}"#).unwrap();
        assert_eq!(wrapped.into_user(), bare.into_user());
    }

    #[test]
    fn test_login_payload_flattens_device() {
        let credentials = LoginRequest {
            email: "a@x.com".to_string(),
            password: "secret1".to_string(),
        };
        let payload = LoginPayload {
            credentials: &credentials,
            device: DeviceFingerprint {
                device_unique_id: "dev-1".to_string(),
                device_name: "Chrome on macOS".to_string(),
                device_location: "Europe/Paris".to_string(),
            },
        };
        let body = serde_json::to_value(&payload).unwrap();
        assert_eq!(body["device_unique_id"], "dev-1");
        assert_eq!(body["email"], "a@x.com");
    }
}
