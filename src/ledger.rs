use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::Error;
use crate::negotiator::{ConsentDecision, ConsentOutcome};
use crate::types::{FieldId, RecordId, ServiceId, UserId};

/// Lifecycle state of a durable consent record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Active,
    Revoked,
}

/// Durable record of a granted consent, kept beyond the interactive
/// flow so the user can review and revoke it later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsentRecord {
    pub id: RecordId,
    pub user_id: UserId,
    pub service_id: ServiceId,
    /// Field ids the grant covers.
    pub fields: BTreeSet<FieldId>,
    /// Legal-basis wording the consent was given under.
    pub purpose: String,
    #[serde(with = "time::serde::rfc3339")]
    pub granted_at: OffsetDateTime,
    pub status: RecordStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub revoked_at: Option<OffsetDateTime>,
}

impl ConsentRecord {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == RecordStatus::Active
    }

    /// True iff this record is active and covers `field`.
    #[must_use]
    pub fn covers(&self, field: &FieldId) -> bool {
        self.is_active() && self.fields.contains(field)
    }
}

/// Consumer-provided persistence for consent records.
///
/// The consumer chooses the backend (database, vault storage, etc.);
/// [`MemoryStore`] is provided for tests and local runs.
pub trait ConsentStore: Send + Sync + 'static {
    /// Persist a new record.
    fn insert(
        &self,
        record: ConsentRecord,
    ) -> impl Future<Output = Result<(), Box<dyn std::error::Error + Send + Sync>>> + Send;

    /// Look up a record by id.
    fn find(
        &self,
        id: RecordId,
    ) -> impl Future<Output = Result<Option<ConsentRecord>, Box<dyn std::error::Error + Send + Sync>>>
           + Send;

    /// Replace a stored record (same id).
    fn update(
        &self,
        record: ConsentRecord,
    ) -> impl Future<Output = Result<(), Box<dyn std::error::Error + Send + Sync>>> + Send;

    /// All records belonging to one user.
    fn for_user(
        &self,
        user_id: &UserId,
    ) -> impl Future<Output = Result<Vec<ConsentRecord>, Box<dyn std::error::Error + Send + Sync>>>
           + Send;
}

/// Grant/revoke/verify service over a [`ConsentStore`].
pub struct ConsentLedger<S> {
    store: Arc<S>,
}

impl<S: ConsentStore> ConsentLedger<S> {
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Record a granted decision as a durable consent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] for non-granted decisions (there
    /// is nothing to record) and [`Error::Store`] on persistence
    /// failure.
    pub async fn grant(
        &self,
        user_id: UserId,
        service_id: ServiceId,
        decision: &ConsentDecision,
    ) -> Result<ConsentRecord, Error> {
        if decision.outcome() != ConsentOutcome::Granted {
            return Err(Error::invalid_state("grant", decision.outcome().as_str()));
        }

        let record = ConsentRecord {
            id: RecordId::generate(),
            user_id,
            service_id,
            fields: decision.granted_fields().clone(),
            purpose: decision.reason().to_string(),
            granted_at: OffsetDateTime::now_utc(),
            status: RecordStatus::Active,
            revoked_at: None,
        };

        self.store
            .insert(record.clone())
            .await
            .map_err(|e| Error::Store(e.to_string()))?;

        tracing::info!(record = %record.id, service = %record.service_id, "consent recorded");
        Ok(record)
    }

    /// Revoke a previously granted consent. Idempotent: revoking a
    /// record that is already revoked returns it unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecordNotFound`] when no record with this id
    /// belongs to `user_id`, and [`Error::Store`] on persistence
    /// failure.
    pub async fn revoke(&self, user_id: &UserId, id: RecordId) -> Result<ConsentRecord, Error> {
        let record = self
            .store
            .find(id)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;

        let mut record = match record {
            Some(r) if &r.user_id == user_id => r,
            _ => return Err(Error::RecordNotFound(id)),
        };

        if record.status == RecordStatus::Revoked {
            return Ok(record);
        }

        record.status = RecordStatus::Revoked;
        record.revoked_at = Some(OffsetDateTime::now_utc());

        self.store
            .update(record.clone())
            .await
            .map_err(|e| Error::Store(e.to_string()))?;

        tracing::info!(record = %record.id, "consent revoked");
        Ok(record)
    }

    /// All consent records for a user, active and revoked.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] on persistence failure.
    pub async fn history(&self, user_id: &UserId) -> Result<Vec<ConsentRecord>, Error> {
        self.store
            .for_user(user_id)
            .await
            .map_err(|e| Error::Store(e.to_string()))
    }

    /// Active consent records the user holds for one service.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] on persistence failure.
    pub async fn status(
        &self,
        user_id: &UserId,
        service_id: &ServiceId,
    ) -> Result<Vec<ConsentRecord>, Error> {
        let records = self.history(user_id).await?;
        Ok(records
            .into_iter()
            .filter(|r| r.is_active() && &r.service_id == service_id)
            .collect())
    }

    /// True iff an active consent for `service_id` covers `field`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] on persistence failure.
    pub async fn verify(
        &self,
        user_id: &UserId,
        service_id: &ServiceId,
        field: &FieldId,
    ) -> Result<bool, Error> {
        let records = self.status(user_id, service_id).await?;
        Ok(records.iter().any(|r| r.covers(field)))
    }
}

/// In-memory [`ConsentStore`] for tests and local runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<RecordId, ConsentRecord>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_records<T>(&self, f: impl FnOnce(&mut HashMap<RecordId, ConsentRecord>) -> T) -> T {
        match self.records.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

impl ConsentStore for MemoryStore {
    async fn insert(
        &self,
        record: ConsentRecord,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.with_records(|records| records.insert(record.id, record));
        Ok(())
    }

    async fn find(
        &self,
        id: RecordId,
    ) -> Result<Option<ConsentRecord>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.with_records(|records| records.get(&id).cloned()))
    }

    async fn update(
        &self,
        record: ConsentRecord,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.with_records(|records| records.insert(record.id, record));
        Ok(())
    }

    async fn for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<ConsentRecord>, Box<dyn std::error::Error + Send + Sync>> {
        let mut records: Vec<ConsentRecord> = self.with_records(|records| {
            records
                .values()
                .filter(|r| &r.user_id == user_id)
                .cloned()
                .collect()
        });
        records.sort_by_key(|r| r.id);
        Ok(records)
    }
}
