//! Error taxonomy shared by the gateway and the dispatchers.

use reqwest::StatusCode;

pub type Result<T> = std::result::Result<T, ClaimError>;

#[derive(Debug, thiserror::Error)]
pub enum ClaimError {
    /// Missing or malformed input, caught before any request is sent
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The claim is not in a stage that allows the requested action
    #[error("Action not allowed: {0}")]
    InvalidState(String),

    /// Business-rule rejection reported by the backend
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Request failed with status {status}: {body}")]
    Http { status: StatusCode, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid document: {0}")]
    Document(String),

    #[error("A {0} request for this record is already in flight")]
    InFlight(String),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),
}

impl ClaimError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ClaimError::Validation(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        ClaimError::InvalidState(msg.into())
    }

    /// Message suitable for an inline alert next to the control that failed.
    pub fn user_message(&self) -> String {
        match self {
            ClaimError::Validation(msg) | ClaimError::InvalidState(msg) | ClaimError::Conflict(msg) => {
                msg.clone()
            }
            ClaimError::NotFound(what) => format!("{} not found.", what),
            ClaimError::InFlight(_) => "Request already submitted, please wait.".to_string(),
            ClaimError::Http { body, .. } if !body.trim().is_empty() => format!("Request failed: {}", body.trim()),
            _ => "Request failed. Please try again.".to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for ClaimError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let reason = errs
                    .iter()
                    .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| "invalid value".to_string());
                format!("{}: {}", field, reason)
            })
            .collect();
        fields.sort();
        ClaimError::Validation(fields.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_message_is_shown_verbatim() {
        let err = ClaimError::Conflict("Patient already has a booking on this date.".into());
        assert_eq!(err.user_message(), "Patient already has a booking on this date.");
    }

    #[test]
    fn http_error_falls_back_to_generic_message() {
        let err = ClaimError::Http { status: StatusCode::INTERNAL_SERVER_ERROR, body: "  ".into() };
        assert_eq!(err.user_message(), "Request failed. Please try again.");
    }
}
