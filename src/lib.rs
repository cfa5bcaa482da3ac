#![doc = include_str!("../README.md")]

pub mod audit;
pub mod auth;
pub mod catalog;
pub mod error;
pub mod flow;
pub mod ledger;
pub mod negotiator;
pub mod payload;
pub mod reasons;
#[cfg(feature = "routes")]
pub mod routes;
pub mod types;

// Re-exports for convenient access
#[cfg(feature = "http")]
pub use audit::HttpAuditSink;
pub use audit::{AuditEvent, AuditLogger, AuditSink, MemorySink, NullSink};
pub use auth::{
    AuthVerdict, Authenticator, CertificateArtifact, Credential, CredentialMethod,
};
pub use catalog::{DataField, FieldCatalog, FieldCategory};
pub use error::Error;
pub use flow::{AuthorizationFlow, FlowState, Session};
pub use ledger::{ConsentLedger, ConsentRecord, ConsentStore, MemoryStore, RecordStatus};
pub use negotiator::{ConsentDecision, ConsentIntent, ConsentNegotiator, ConsentOutcome};
pub use payload::{ConsentVerdict, ReturnPayload};
pub use reasons::ReasonResolver;
pub use types::{FieldId, RecordId, ServiceId, UserId};
