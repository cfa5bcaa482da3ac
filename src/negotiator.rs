use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::FieldCatalog;
use crate::error::Error;
use crate::types::FieldId;

/// What the user asked the vault to do with the current selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentIntent {
    Grant,
    Decline,
}

/// Outcome of a consent step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentOutcome {
    Granted,
    Declined,
    /// The user tried to proceed without every required field selected.
    /// A normal, non-exceptional outcome — not an error.
    Insufficient,
}

impl ConsentOutcome {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Granted => "granted",
            Self::Declined => "declined",
            Self::Insufficient => "insufficient",
        }
    }
}

impl std::fmt::Display for ConsentOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The immutable record of what the user chose to share, and why.
///
/// Created exactly once per session; supersedes the working selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentDecision {
    outcome: ConsentOutcome,
    granted_fields: BTreeSet<FieldId>,
    reason: String,
}

impl ConsentDecision {
    #[must_use]
    pub fn outcome(&self) -> ConsentOutcome {
        self.outcome
    }

    /// Field ids the user agreed to share. Empty unless the outcome is
    /// [`ConsentOutcome::Granted`].
    #[must_use]
    pub fn granted_fields(&self) -> &BTreeSet<FieldId> {
        &self.granted_fields
    }

    /// Legal-basis wording recorded with the decision.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Holds the in-progress consent selection and computes the final
/// decision.
///
/// The required-field gate lives here: whatever a UI disables or allows,
/// `decide(Grant)` yields [`ConsentOutcome::Insufficient`] unless every
/// required field is selected.
#[derive(Debug, Clone)]
pub struct ConsentNegotiator {
    catalog: Arc<FieldCatalog>,
    selection: BTreeSet<FieldId>,
    decision: Option<ConsentDecision>,
}

impl ConsentNegotiator {
    #[must_use]
    pub fn new(catalog: Arc<FieldCatalog>) -> Self {
        Self {
            catalog,
            selection: BTreeSet::new(),
            decision: None,
        }
    }

    /// Add or remove one field from the selection. Idempotent: toggling
    /// to the current inclusion state is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownField`] if the id is not in the catalog
    /// (selection unchanged), or [`Error::InvalidState`] once a decision
    /// has been made (the selection is frozen).
    pub fn toggle_field(&mut self, field: &FieldId, included: bool) -> Result<(), Error> {
        if self.decision.is_some() {
            return Err(Error::invalid_state("toggle_field", "decided"));
        }
        if !self.catalog.contains(field) {
            return Err(Error::UnknownField(field.clone()));
        }

        if included {
            self.selection.insert(field.clone());
        } else {
            self.selection.remove(field);
        }
        Ok(())
    }

    /// Read-only snapshot of the current selection.
    #[must_use]
    pub fn selection(&self) -> &BTreeSet<FieldId> {
        &self.selection
    }

    /// True iff every required field id is currently selected. The single
    /// admission gate for a `granted` outcome.
    #[must_use]
    pub fn is_satisfied(&self) -> bool {
        self.catalog
            .required_fields()
            .all(|f| self.selection.contains(&f.id))
    }

    /// The decision, once made.
    #[must_use]
    pub fn decision(&self) -> Option<&ConsentDecision> {
        self.decision.as_ref()
    }

    /// Compute the decision from the current selection and freeze it.
    ///
    /// `reason` is the resolved legal-basis wording recorded alongside
    /// the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DecisionAlreadyMade`] on a second call — a
    /// caller-contract violation, never expected in correct operation.
    pub fn decide(
        &mut self,
        intent: ConsentIntent,
        reason: impl Into<String>,
    ) -> Result<&ConsentDecision, Error> {
        if self.decision.is_some() {
            return Err(Error::DecisionAlreadyMade);
        }

        let decision = match intent {
            ConsentIntent::Decline => ConsentDecision {
                outcome: ConsentOutcome::Declined,
                granted_fields: BTreeSet::new(),
                reason: reason.into(),
            },
            ConsentIntent::Grant if self.is_satisfied() => ConsentDecision {
                outcome: ConsentOutcome::Granted,
                granted_fields: self.selection.clone(),
                reason: reason.into(),
            },
            ConsentIntent::Grant => ConsentDecision {
                outcome: ConsentOutcome::Insufficient,
                granted_fields: BTreeSet::new(),
                reason: reason.into(),
            },
        };

        Ok(self.decision.insert(decision))
    }
}
