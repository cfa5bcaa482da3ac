use std::collections::BTreeSet;
use std::sync::Arc;

use crate::audit::{AuditEvent, AuditLogger, AuditSink};
use crate::auth::{AuthVerdict, Authenticator, Credential};
use crate::catalog::FieldCatalog;
use crate::error::Error;
use crate::negotiator::{ConsentDecision, ConsentIntent, ConsentNegotiator, ConsentOutcome};
use crate::payload::ReturnPayload;
use crate::reasons::ReasonResolver;
use crate::types::{FieldId, ServiceId};

/// Node of the authorization state machine.
///
/// `Idle` is initial; `Delivered` is terminal. Authentication failure
/// returns the session to `Idle` with no partial state retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    Authenticating,
    Authenticated,
    ConsentPending,
    Decided(ConsentOutcome),
    Delivered,
}

impl FlowState {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Authenticating => "authenticating",
            Self::Authenticated => "authenticated",
            Self::ConsentPending => "consent_pending",
            Self::Decided(_) => "decided",
            Self::Delivered => "delivered",
        }
    }
}

impl std::fmt::Display for FlowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One authorization attempt by one user for one relying party.
///
/// Owns its consent selection; exclusive access (`&mut`) serializes all
/// mutation, so no cross-session locking exists or is needed. A session
/// may be abandoned at any point before delivery by dropping it — the
/// core holds no external resources on its behalf.
#[derive(Debug)]
pub struct Session {
    service_id: ServiceId,
    service_name: String,
    state: FlowState,
    negotiator: ConsentNegotiator,
}

impl Session {
    #[must_use]
    pub fn service_id(&self) -> &ServiceId {
        &self.service_id
    }

    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    #[must_use]
    pub fn state(&self) -> FlowState {
        self.state
    }

    /// Read-only snapshot of the current consent selection.
    #[must_use]
    pub fn selection(&self) -> &BTreeSet<FieldId> {
        self.negotiator.selection()
    }

    /// True iff every required field is currently selected.
    #[must_use]
    pub fn is_satisfied(&self) -> bool {
        self.negotiator.is_satisfied()
    }

    /// The consent decision, once made.
    #[must_use]
    pub fn decision(&self) -> Option<&ConsentDecision> {
        self.negotiator.decision()
    }
}

/// The orchestrating state machine: authentication → consent
/// solicitation → decision → result delivery.
///
/// Generic over the external authentication capability `A` and the
/// audit sink `S`; both are suspension points — authentication is
/// awaited before the flow advances, audit delivery is fire-and-forget.
pub struct AuthorizationFlow<A, S> {
    catalog: Arc<FieldCatalog>,
    reasons: ReasonResolver,
    authenticator: Arc<A>,
    audit: AuditLogger<S>,
}

impl<A: Authenticator, S: AuditSink> AuthorizationFlow<A, S> {
    #[must_use]
    pub fn new(
        catalog: FieldCatalog,
        reasons: ReasonResolver,
        authenticator: A,
        sink: S,
    ) -> Self {
        Self {
            catalog: Arc::new(catalog),
            reasons,
            authenticator: Arc::new(authenticator),
            audit: AuditLogger::new(sink),
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &FieldCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn reasons(&self) -> &ReasonResolver {
        &self.reasons
    }

    /// The audit emitter (e.g. to `drain()` on shutdown).
    #[must_use]
    pub fn audit(&self) -> &AuditLogger<S> {
        &self.audit
    }

    /// Create a session for the selected service and request credential
    /// input: the `Idle → Authenticating` transition.
    #[must_use]
    pub fn begin(&self, service_id: ServiceId, service_name: impl Into<String>) -> Session {
        Session {
            service_id,
            service_name: service_name.into(),
            state: FlowState::Authenticating,
            negotiator: ConsentNegotiator::new(Arc::clone(&self.catalog)),
        }
    }

    /// Re-request credential input after a failed authentication:
    /// `Idle → Authenticating` for the same service.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless the session is at `Idle`.
    pub fn retry(&self, session: &mut Session) -> Result<(), Error> {
        if session.state != FlowState::Idle {
            return Err(Error::invalid_state("retry", session.state.name()));
        }
        session.state = FlowState::Authenticating;
        Ok(())
    }

    /// Validate the credential and await the external authentication
    /// capability.
    ///
    /// The credential payload is dropped when this call returns; it is
    /// never stored on the session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCredential`] or
    /// [`Error::UnsupportedCertificate`] before any external call (state
    /// unchanged, no audit event); [`Error::AuthenticationRejected`]
    /// when the capability rejects the credential or is unreachable (the
    /// session is back at `Idle`, retryable);
    /// [`Error::InvalidState`] outside `Authenticating`.
    pub async fn authenticate(
        &self,
        session: &mut Session,
        credential: Credential,
    ) -> Result<(), Error> {
        if session.state != FlowState::Authenticating {
            return Err(Error::invalid_state("authenticate", session.state.name()));
        }

        credential.validate()?;
        let method = credential.method();

        let verdict = match self.authenticator.authenticate(&credential).await {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::warn!(error = %e, "authentication capability unreachable");
                AuthVerdict::Rejected
            }
        };

        match verdict {
            AuthVerdict::Accepted => {
                session.state = FlowState::Authenticated;
                self.audit.record(AuditEvent::authentication_success(
                    session.service_name.as_str(),
                    method,
                ));
                tracing::info!(service = %session.service_id, "authentication accepted");
                Ok(())
            }
            AuthVerdict::Rejected => {
                session.state = FlowState::Idle;
                self.audit.record(AuditEvent::authentication_failure(
                    session.service_name.as_str(),
                    method,
                ));
                Err(Error::AuthenticationRejected)
            }
        }
    }

    /// Enter the consent step: `Authenticated → ConsentPending`.
    ///
    /// Emits one `data_request` audit event carrying the full
    /// requestable field-id list and the resolved request reason, which
    /// is also returned for display.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless the session is at
    /// `Authenticated`.
    pub fn request_consent(&self, session: &mut Session) -> Result<String, Error> {
        if session.state != FlowState::Authenticated {
            return Err(Error::invalid_state("request_consent", session.state.name()));
        }

        let reason = self
            .reasons
            .request_reason(&session.service_id, &session.service_name);
        session.state = FlowState::ConsentPending;

        self.audit.record(AuditEvent::data_request(
            session.service_name.as_str(),
            self.catalog.field_ids(),
            reason.as_str(),
        ));

        Ok(reason)
    }

    /// Add or remove one field from the session's selection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownField`] for ids outside the catalog and
    /// [`Error::InvalidState`] outside `ConsentPending`; the selection
    /// is unchanged either way.
    pub fn toggle_field(
        &self,
        session: &mut Session,
        field: &FieldId,
        included: bool,
    ) -> Result<(), Error> {
        if session.state != FlowState::ConsentPending {
            return Err(Error::invalid_state("toggle_field", session.state.name()));
        }
        session.negotiator.toggle_field(field, included)
    }

    /// Submit the consent decision: `ConsentPending → Decided`.
    ///
    /// Emits exactly one audit event matching the outcome
    /// (`consent_provided` for granted/insufficient, `consent_declined`
    /// for declined).
    ///
    /// # Errors
    ///
    /// Returns [`Error::DecisionAlreadyMade`] if a decision exists
    /// (caller-contract violation) and [`Error::InvalidState`] outside
    /// the consent step.
    pub fn decide(
        &self,
        session: &mut Session,
        intent: ConsentIntent,
    ) -> Result<ConsentOutcome, Error> {
        match session.state {
            FlowState::ConsentPending => {}
            FlowState::Decided(_) => return Err(Error::DecisionAlreadyMade),
            _ => return Err(Error::invalid_state("decide", session.state.name())),
        }

        let reason = self.reasons.grant_reason(&session.service_name);
        let has_required = session.negotiator.is_satisfied();
        let outcome = session
            .negotiator
            .decide(intent, reason.as_str())?
            .outcome();

        match outcome {
            ConsentOutcome::Declined => {
                self.audit
                    .record(AuditEvent::consent_declined(session.service_name.as_str()));
            }
            ConsentOutcome::Granted | ConsentOutcome::Insufficient => {
                let shared: Vec<FieldId> =
                    session.negotiator.selection().iter().cloned().collect();
                self.audit.record(AuditEvent::consent_provided(
                    session.service_name.as_str(),
                    shared,
                    has_required,
                    reason,
                ));
            }
        }

        session.state = FlowState::Decided(outcome);
        tracing::info!(service = %session.service_id, outcome = %outcome, "consent decided");
        Ok(outcome)
    }

    /// Hand the result back to the relying party:
    /// `Decided → Delivered` (terminal).
    ///
    /// The returned payload fully encodes the outcome; the session is
    /// done and should be discarded by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless a decision has been made.
    pub fn deliver(&self, session: &mut Session) -> Result<ReturnPayload, Error> {
        if !matches!(session.state, FlowState::Decided(_)) {
            return Err(Error::invalid_state("deliver", session.state.name()));
        }

        let decision = session
            .negotiator
            .decision()
            .ok_or_else(|| Error::invalid_state("deliver", session.state.name()))?;

        let payload = ReturnPayload::from_decision(session.service_name.clone(), decision);
        session.state = FlowState::Delivered;
        Ok(payload)
    }
}
