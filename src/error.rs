use crate::types::{FieldId, RecordId};

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Required credential input is absent. Reported before any external
    /// call is attempted; the flow state is unchanged.
    #[error("missing credential input: {0}")]
    MissingCredential(&'static str),

    /// Certificate artifact is not one of the accepted container formats.
    #[error("unsupported certificate container: {0}")]
    UnsupportedCertificate(String),

    /// A selection toggle referenced a field id outside the catalog.
    #[error("unknown data field: {0}")]
    UnknownField(FieldId),

    /// The external authentication capability rejected the credential (or
    /// was unreachable). The session is back at `Idle`; retryable.
    #[error("authentication rejected")]
    AuthenticationRejected,

    /// A consent decision was requested twice for the same session.
    /// Contract violation: indicates an orchestrator bug, never expected
    /// in correct operation.
    #[error("consent decision already made")]
    DecisionAlreadyMade,

    /// Operation not permitted in the session's current state. The state
    /// is unchanged.
    #[error("operation {operation} not permitted in state {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    /// No consent record with this id belongs to the given user.
    #[error("consent record not found: {0}")]
    RecordNotFound(RecordId),

    /// Consent store operation failed.
    #[error("consent store error: {0}")]
    Store(String),

    /// Missing or invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A relying-party return payload could not be parsed.
    #[error("malformed return payload: {0}")]
    Payload(String),
}

impl Error {
    pub(crate) fn invalid_state(operation: &'static str, state: &'static str) -> Self {
        Self::InvalidState { operation, state }
    }
}
