use std::collections::HashMap;

use crate::types::ServiceId;

/// Resolves the legal-basis wording attached to consent requests and
/// decisions.
///
/// Both lookups are pure functions of their inputs: deterministic, no
/// hidden state, no failure modes.
#[derive(Debug, Clone, Default)]
pub struct ReasonResolver {
    /// Per-service purpose fragments, keyed by service id.
    templates: HashMap<String, String>,
}

impl ReasonResolver {
    /// Resolver with no per-service templates; every request reason uses
    /// the generic fallback.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Resolver preloaded with the standard relying-party templates.
    #[must_use]
    pub fn standard() -> Self {
        Self::empty()
            .with_service_template(
                "personal-banking",
                "to provide Personal Banking services, including online account \
                 management and mobile payments",
            )
            .with_service_template(
                "investment",
                "to provide Investment Services, including portfolio management \
                 and financial planning",
            )
            .with_service_template(
                "credit-solutions",
                "to provide Credit Solutions, including personal loans and \
                 credit card services",
            )
    }

    /// Add or replace the purpose fragment for one service id.
    #[must_use]
    pub fn with_service_template(
        mut self,
        service_id: impl Into<String>,
        purpose: impl Into<String>,
    ) -> Self {
        self.templates.insert(service_id.into(), purpose.into());
        self
    }

    /// Legal basis for a data request from the given service.
    ///
    /// Falls back to the generic `to provide {service_name}` fragment when
    /// the service id is unrecognized. Never fails.
    #[must_use]
    pub fn request_reason(&self, service_id: &ServiceId, service_name: &str) -> String {
        let purpose = self
            .templates
            .get(service_id.as_str())
            .cloned()
            .unwrap_or_else(|| format!("to provide {service_name}"));

        format!(
            "Consent obtained under GDPR Article 6(1)(a) for processing personal data {purpose}."
        )
    }

    /// Wording recorded when the user submits a consent decision.
    #[must_use]
    pub fn grant_reason(&self, service_name: &str) -> String {
        format!("User provided consent to access personal data for {service_name}.")
    }
}
