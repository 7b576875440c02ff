use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

pub const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";
pub const SESSION_EXPIRED: &str = "Your session has expired. Please log in again.";
pub const NOT_AUTHENTICATED: &str = "You need to log in first.";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Session expired")]
    SessionExpired,

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Request rejected with status {status}")]
    Rejected { status: u16, message: Option<String> },
}

impl ClientError {
    /// Text suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::SessionExpired => SESSION_EXPIRED.to_string(),
            ClientError::NotAuthenticated => NOT_AUTHENTICATED.to_string(),
            ClientError::Rejected {
                message: Some(message),
                ..
            } => message.clone(),
            ClientError::Transport(_)
            | ClientError::Decode(_)
            | ClientError::Rejected { message: None, .. } => GENERIC_FAILURE.to_string(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Rejected { status, .. } => Some(*status),
            ClientError::SessionExpired => Some(401),
            _ => None,
        }
    }
}

/// One field-level validation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Uniform outcome of every gateway and invitation operation.
///
/// Operations never return errors to their callers; they return this.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionResult<T = ()> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub field_errors: Vec<FieldError>,
}

impl<T> ActionResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            field_errors: Vec::new(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
            field_errors: Vec::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Field-level validation failure; nothing was sent to the backend.
    pub fn invalid(errors: &ValidationErrors) -> Self {
        let mut field_errors: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                let field = field.to_string();
                errs.iter().map(move |e| FieldError {
                    field: field.clone(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{} is invalid", field)),
                })
            })
            .collect();
        field_errors.sort_by(|a, b| a.field.cmp(&b.field));

        let message = field_errors
            .first()
            .map(|e| e.message.clone())
            .unwrap_or_else(|| "Please correct the highlighted fields.".to_string());

        Self {
            success: false,
            data: None,
            message: Some(message),
            field_errors,
        }
    }

    pub fn from_error(error: &ClientError) -> Self {
        Self::failed(error.user_message())
    }

    pub fn into_data(self) -> Option<T> {
        self.data
    }
}

impl ActionResult<()> {
    pub fn done() -> Self {
        Self::ok(())
    }
}

impl<T> From<Result<T, ClientError>> for ActionResult<T> {
    fn from(result: Result<T, ClientError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::from_error(&e),
        }
    }
}
