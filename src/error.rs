/// Fallback shown when the backend rejects an action without saying why.
pub const GENERIC_FAILURE: &str = "Unknown error";

/// Failures surfaced by user-triggered actions.
///
/// Every variant is rendered inline next to the control that triggered it;
/// none of them is retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    /// Rejected locally, before any request was sent.
    #[error("{0}")]
    Validation(String),
    /// The request could not be sent or no response arrived.
    #[error("network error: {0}")]
    Network(String),
    /// The response body was not the JSON we expected.
    #[error("invalid response: {0}")]
    Decode(String),
    /// The backend answered `success: false`.
    #[error("{}", .0.as_deref().unwrap_or(GENERIC_FAILURE))]
    Domain(Option<String>),
    /// The system clipboard refused the write or is unavailable.
    #[error("clipboard unavailable: {0}")]
    Clipboard(String),
}

impl ActionError {
    pub fn network(err: impl std::fmt::Display) -> Self {
        ActionError::Network(err.to_string())
    }

    pub fn decode(err: impl std::fmt::Display) -> Self {
        ActionError::Decode(err.to_string())
    }

    /// Domain rejection; blank backend messages fall back to the generic text.
    pub fn domain(message: Option<String>) -> Self {
        ActionError::Domain(message.filter(|msg| !msg.trim().is_empty()))
    }

    /// Text for the inline message next to the failing control.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_message_is_verbatim() {
        let err = ActionError::domain(Some("bad host".into()));
        assert_eq!(err.user_message(), "bad host");
        assert!(matches!(err, ActionError::Domain(Some(_))));
    }

    #[test]
    fn domain_without_message_uses_fallback() {
        assert_eq!(ActionError::domain(None).user_message(), GENERIC_FAILURE);
        assert_eq!(
            ActionError::domain(Some("  ".into())).user_message(),
            GENERIC_FAILURE
        );
    }

    #[test]
    fn transport_errors_are_prefixed() {
        let err = ActionError::network("connection refused");
        assert_eq!(err.user_message(), "network error: connection refused");
        let err = ActionError::decode("expected value at line 1 column 1");
        assert!(err.user_message().starts_with("invalid response: "));
    }
}
