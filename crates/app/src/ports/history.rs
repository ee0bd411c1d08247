//! History ports: audit trail of channel values.

use std::future::Future;

use minido_domain::error::MinidoError;
use minido_domain::history::HistoryEntry;
use minido_domain::time::Timestamp;

/// Fire-and-forget sink for history entries, called on the bus path.
pub trait HistoryStore {
    /// Record one entry. Must not block and must not fail the caller.
    fn record(&self, entry: HistoryEntry);
}

impl<T: HistoryStore + Send + Sync> HistoryStore for std::sync::Arc<T> {
    fn record(&self, entry: HistoryEntry) {
        (**self).record(entry);
    }
}

/// Durable storage for history entries.
pub trait HistoryRepository {
    /// Persist a batch of entries in one transaction.
    fn append_batch(
        &self,
        entries: Vec<HistoryEntry>,
    ) -> impl Future<Output = Result<(), MinidoError>> + Send;

    /// Load every stored entry, oldest first.
    fn load_all(&self) -> impl Future<Output = Result<Vec<HistoryEntry>, MinidoError>> + Send;

    /// Delete entries recorded strictly before `cutoff`. Returns how many were removed.
    fn purge_before(
        &self,
        cutoff: Timestamp,
    ) -> impl Future<Output = Result<u64, MinidoError>> + Send;
}

impl<T: HistoryRepository + Send + Sync> HistoryRepository for std::sync::Arc<T> {
    fn append_batch(
        &self,
        entries: Vec<HistoryEntry>,
    ) -> impl Future<Output = Result<(), MinidoError>> + Send {
        (**self).append_batch(entries)
    }

    fn load_all(&self) -> impl Future<Output = Result<Vec<HistoryEntry>, MinidoError>> + Send {
        (**self).load_all()
    }

    fn purge_before(
        &self,
        cutoff: Timestamp,
    ) -> impl Future<Output = Result<u64, MinidoError>> + Send {
        (**self).purge_before(cutoff)
    }
}
