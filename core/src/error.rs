use thiserror::Error;

/// Failures that callers branch on. Everything else travels as `anyhow::Error`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KobiriError {
    /// A feature needs configuration that is missing (API key, OAuth client).
    #[error("{0} is not configured")]
    NotConfigured(String),

    #[error("you must be signed in to {0}")]
    NotSignedIn(String),

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("an account already exists for {0}")]
    EmailTaken(String),

    #[error("session expired or unknown")]
    InvalidSession,

    #[error("{0}")]
    Validation(String),

    /// An external service answered with something we could not use.
    #[error("malformed response from {service}: {reason}")]
    MalformedResponse { service: String, reason: String },
}

impl KobiriError {
    pub fn malformed(service: &str, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            service: service.to_string(),
            reason: reason.into(),
        }
    }
}
