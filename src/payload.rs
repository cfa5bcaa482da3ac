use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;
use crate::negotiator::{ConsentDecision, ConsentOutcome};
use crate::types::FieldId;

/// The `consent` value delivered back to the relying party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentVerdict {
    Success,
    Insufficient,
    Declined,
}

impl ConsentVerdict {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Insufficient => "insufficient",
            Self::Declined => "declined",
        }
    }
}

impl std::fmt::Display for ConsentVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConsentVerdict {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "insufficient" => Ok(Self::Insufficient),
            "declined" => Ok(Self::Declined),
            other => Err(Error::Payload(format!("unknown consent value: {other}"))),
        }
    }
}

impl From<ConsentOutcome> for ConsentVerdict {
    fn from(outcome: ConsentOutcome) -> Self {
        match outcome {
            ConsentOutcome::Granted => Self::Success,
            ConsentOutcome::Insufficient => Self::Insufficient,
            ConsentOutcome::Declined => Self::Declined,
        }
    }
}

/// Redirect-style result payload handed back to the relying party.
///
/// Fully encodes the outcome: no shared mutable session is required
/// between vault and relying party beyond this payload. `data` is
/// present only when `consent=success`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnPayload {
    consent: ConsentVerdict,
    service: String,
    data: Option<Vec<FieldId>>,
}

impl ReturnPayload {
    /// Build the payload for a finished decision.
    #[must_use]
    pub fn from_decision(service_name: impl Into<String>, decision: &ConsentDecision) -> Self {
        let consent = ConsentVerdict::from(decision.outcome());
        let data = match consent {
            ConsentVerdict::Success => {
                Some(decision.granted_fields().iter().cloned().collect())
            }
            ConsentVerdict::Insufficient | ConsentVerdict::Declined => None,
        };
        Self {
            consent,
            service: service_name.into(),
            data,
        }
    }

    #[must_use]
    pub fn consent(&self) -> ConsentVerdict {
        self.consent
    }

    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Granted field ids; `None` unless `consent=success`.
    #[must_use]
    pub fn data(&self) -> Option<&[FieldId]> {
        self.data.as_deref()
    }

    /// Append the payload as query parameters to a redirect URL.
    pub fn append_to(&self, url: &mut Url) {
        let mut pairs = url.query_pairs_mut();
        pairs
            .append_pair("consent", self.consent.as_str())
            .append_pair("service", &self.service);
        if let Some(fields) = &self.data {
            pairs.append_pair("data", &join_fields(fields));
        }
    }

    /// Render the payload as a percent-encoded query string
    /// (no leading `?`).
    #[must_use]
    pub fn to_query_string(&self) -> String {
        let mut query = format!(
            "consent={}&service={}",
            self.consent,
            urlencoding::encode(&self.service)
        );
        if let Some(fields) = &self.data {
            let joined = join_fields(fields);
            query.push_str("&data=");
            query.push_str(&urlencoding::encode(&joined));
        }
        query
    }

    /// Parse the payload back out of a redirect URL (relying-party side).
    ///
    /// Unknown query keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Payload`] if `consent` or `service` is missing,
    /// or `consent` carries an unknown value.
    pub fn from_url(url: &Url) -> Result<Self, Error> {
        let mut consent = None;
        let mut service = None;
        let mut data = None;

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "consent" => consent = Some(value.parse::<ConsentVerdict>()?),
                "service" => service = Some(value.into_owned()),
                "data" => data = Some(split_fields(&value)),
                _ => {}
            }
        }

        Ok(Self {
            consent: consent
                .ok_or_else(|| Error::Payload("missing consent parameter".into()))?,
            service: service
                .ok_or_else(|| Error::Payload("missing service parameter".into()))?,
            data,
        })
    }
}

fn join_fields(fields: &[FieldId]) -> String {
    fields
        .iter()
        .map(FieldId::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

fn split_fields(joined: &str) -> Vec<FieldId> {
    joined
        .split(',')
        .filter(|s| !s.is_empty())
        .map(FieldId::new)
        .collect()
}
