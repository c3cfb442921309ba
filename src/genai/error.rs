use thiserror::Error;

/// Failures talking to the generative-AI service.
#[derive(Error, Debug)]
pub enum GenAiError {
    #[error("The AI service quota is exhausted, try again later: {0}")]
    Quota(String),
    #[error("Billing is not enabled for the AI service key: {0}")]
    Billing(String),
    #[error("The request was blocked by the AI service: {0}")]
    Blocked(String),
    #[error("AI service returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Unexpected response from the AI service: {0}")]
    InvalidResponse(String),
    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),
}

impl From<tokio_tungstenite::tungstenite::Error> for GenAiError {
    fn from(value: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(value))
    }
}

impl From<serde_json::Error> for GenAiError {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidResponse(value.to_string())
    }
}

impl GenAiError {
    /// Maps an HTTP error status and the service's error body to a variant.
    #[must_use]
    pub fn from_status(status: u16, api_status: Option<&str>, message: String) -> Self {
        let lowered = message.to_ascii_lowercase();
        if status == 429 || api_status == Some("RESOURCE_EXHAUSTED") {
            Self::Quota(message)
        } else if lowered.contains("billing") {
            Self::Billing(message)
        } else {
            Self::Api { status, message }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_classifies_quota() {
        let err = GenAiError::from_status(429, None, "slow down".to_string());
        assert!(matches!(err, GenAiError::Quota(_)));

        let err = GenAiError::from_status(400, Some("RESOURCE_EXHAUSTED"), "x".to_string());
        assert!(matches!(err, GenAiError::Quota(_)));
    }

    #[test]
    fn test_from_status_classifies_billing() {
        let err = GenAiError::from_status(
            403,
            Some("PERMISSION_DENIED"),
            "Billing account not configured".to_string(),
        );
        assert!(matches!(err, GenAiError::Billing(_)));
    }

    #[test]
    fn test_from_status_generic() {
        let err = GenAiError::from_status(500, Some("INTERNAL"), "boom".to_string());
        assert!(matches!(err, GenAiError::Api { status: 500, .. }));
    }
}
