use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::task::JoinHandle;

use crate::auth::CredentialMethod;
use crate::types::FieldId;

/// An immutable record of something that happened during an
/// authorization flow.
///
/// The `event` tag and field names are the audit-sink wire shape; the
/// timestamp is stamped in UTC when the event is constructed, i.e. at
/// emission time. The core never reads its own audit trail back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    DataRequest {
        service: String,
        #[serde(rename = "requestedFields")]
        requested_fields: Vec<FieldId>,
        reason: String,
        #[serde(with = "time::serde::rfc3339")]
        timestamp: OffsetDateTime,
    },
    ConsentProvided {
        service: String,
        #[serde(rename = "sharedData")]
        shared_data: Vec<FieldId>,
        #[serde(rename = "hasRequired")]
        has_required: bool,
        reason: String,
        #[serde(with = "time::serde::rfc3339")]
        timestamp: OffsetDateTime,
    },
    ConsentDeclined {
        service: String,
        #[serde(with = "time::serde::rfc3339")]
        timestamp: OffsetDateTime,
    },
    AuthenticationSuccess {
        service: String,
        method: CredentialMethod,
        #[serde(with = "time::serde::rfc3339")]
        timestamp: OffsetDateTime,
    },
    AuthenticationFailure {
        service: String,
        method: CredentialMethod,
        #[serde(with = "time::serde::rfc3339")]
        timestamp: OffsetDateTime,
    },
}

impl AuditEvent {
    #[must_use]
    pub fn data_request(
        service: impl Into<String>,
        requested_fields: Vec<FieldId>,
        reason: impl Into<String>,
    ) -> Self {
        Self::DataRequest {
            service: service.into(),
            requested_fields,
            reason: reason.into(),
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    #[must_use]
    pub fn consent_provided(
        service: impl Into<String>,
        shared_data: Vec<FieldId>,
        has_required: bool,
        reason: impl Into<String>,
    ) -> Self {
        Self::ConsentProvided {
            service: service.into(),
            shared_data,
            has_required,
            reason: reason.into(),
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    #[must_use]
    pub fn consent_declined(service: impl Into<String>) -> Self {
        Self::ConsentDeclined {
            service: service.into(),
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    #[must_use]
    pub fn authentication_success(service: impl Into<String>, method: CredentialMethod) -> Self {
        Self::AuthenticationSuccess {
            service: service.into(),
            method,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    #[must_use]
    pub fn authentication_failure(service: impl Into<String>, method: CredentialMethod) -> Self {
        Self::AuthenticationFailure {
            service: service.into(),
            method,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    /// The wire value of the `event` tag.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::DataRequest { .. } => "data_request",
            Self::ConsentProvided { .. } => "consent_provided",
            Self::ConsentDeclined { .. } => "consent_declined",
            Self::AuthenticationSuccess { .. } => "authentication_success",
            Self::AuthenticationFailure { .. } => "authentication_failure",
        }
    }

    /// The service name the event concerns.
    #[must_use]
    pub fn service(&self) -> &str {
        match self {
            Self::DataRequest { service, .. }
            | Self::ConsentProvided { service, .. }
            | Self::ConsentDeclined { service, .. }
            | Self::AuthenticationSuccess { service, .. }
            | Self::AuthenticationFailure { service, .. } => service,
        }
    }
}

/// Consumer-provided audit sink.
///
/// The core's contract: at least attempt one delivery per event, do not
/// block on the result, do not retry internally.
pub trait AuditSink: Send + Sync + 'static {
    /// Deliver one structured event.
    fn emit(
        &self,
        event: AuditEvent,
    ) -> impl Future<Output = Result<(), Box<dyn std::error::Error + Send + Sync>>> + Send;
}

/// Best-effort, non-blocking audit emitter.
///
/// Each [`record`](AuditLogger::record) spawns one delivery attempt;
/// delivery failure is logged locally and never blocks or fails the
/// authorization flow. Call [`drain`](AuditLogger::drain) on shutdown
/// (or in tests) to await outstanding deliveries.
///
/// Requires a running Tokio runtime.
pub struct AuditLogger<S> {
    sink: Arc<S>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl<S: AuditSink> AuditLogger<S> {
    #[must_use]
    pub fn new(sink: S) -> Self {
        Self {
            sink: Arc::new(sink),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// The wrapped sink.
    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Attempt one delivery of `event` without blocking the caller.
    pub fn record(&self, event: AuditEvent) {
        let sink = Arc::clone(&self.sink);
        let event_type = event.event_type();
        let handle = tokio::spawn(async move {
            if let Err(e) = sink.emit(event).await {
                tracing::warn!(error = %e, event = event_type, "audit event delivery failed");
            }
        });

        let mut pending = self.lock_pending();
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    /// Await completion of all outstanding delivery attempts.
    pub async fn drain(&self) {
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.lock_pending());
        for handle in handles {
            let _ = handle.await;
        }
    }

    fn lock_pending(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl AuditSink for NullSink {
    async fn emit(
        &self,
        _event: AuditEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }
}

/// Sink that keeps every event in memory, for tests and local runs.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything delivered so far, in delivery order.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AuditSink for MemorySink {
    async fn emit(
        &self,
        event: AuditEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        match self.events.lock() {
            Ok(mut guard) => guard.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
        Ok(())
    }
}

/// Sink that POSTs each event as JSON to an external log endpoint.
#[cfg(feature = "http")]
pub struct HttpAuditSink {
    endpoint: url::Url,
    http: reqwest::Client,
}

#[cfg(feature = "http")]
impl HttpAuditSink {
    #[must_use]
    pub fn new(endpoint: url::Url) -> Self {
        Self {
            endpoint,
            http: reqwest::Client::new(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }
}

#[cfg(feature = "http")]
impl AuditSink for HttpAuditSink {
    async fn emit(
        &self,
        event: AuditEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.http
            .post(self.endpoint.clone())
            .json(&event)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_json_shape() {
        let event = AuditEvent::data_request(
            "Personal Banking",
            vec![FieldId::new("name"), FieldId::new("email")],
            "some reason",
        );
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["event"], "data_request");
        assert_eq!(json["service"], "Personal Banking");
        assert_eq!(json["requestedFields"][0], "name");
        assert_eq!(json["reason"], "some reason");
        // RFC 3339 UTC, e.g. "2026-08-07T12:00:00Z"
        let ts = json["timestamp"].as_str().unwrap();
        assert!(ts.contains('T'));
        assert!(ts.ends_with('Z') || ts.contains('+'));
    }

    #[test]
    fn consent_event_field_names() {
        let event = AuditEvent::consent_provided(
            "Personal Banking",
            vec![FieldId::new("email")],
            false,
            "reason",
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "consent_provided");
        assert_eq!(json["sharedData"][0], "email");
        assert_eq!(json["hasRequired"], false);

        let event = AuditEvent::authentication_failure("Svc", CredentialMethod::Certificate);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "authentication_failure");
        assert_eq!(json["method"], "certificate");
    }

    #[tokio::test]
    async fn logger_delivers_to_sink() {
        let logger = AuditLogger::new(MemorySink::new());
        logger.record(AuditEvent::consent_declined("Svc"));
        logger.record(AuditEvent::authentication_success(
            "Svc",
            CredentialMethod::Password,
        ));
        logger.drain().await;

        let events = logger.sink().events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type(), "consent_declined");
        assert_eq!(events[1].event_type(), "authentication_success");
    }

    struct FailingSink;

    impl AuditSink for FailingSink {
        async fn emit(
            &self,
            _event: AuditEvent,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            Err("sink unreachable".into())
        }
    }

    #[tokio::test]
    async fn delivery_failure_is_swallowed() {
        let logger = AuditLogger::new(FailingSink);
        logger.record(AuditEvent::consent_declined("Svc"));
        // Must not panic or surface the sink error.
        logger.drain().await;
    }
}
