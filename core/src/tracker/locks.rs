use std::sync::Arc;

use dashmap::DashMap;
use pdugraph_proto::ContextId;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// One async lock per context, held across the storage round trips of a single operation.
///
/// Registrations and confirmations take it exclusively, so a frontier read and the writes derived from
/// it never interleave with another writer. Frontier snapshots take it shared and therefore never observe
/// a registration half applied, whatever the backend's read isolation. Distinct contexts never contend.
///
/// Only writers create entries, so the map is bounded by the contexts that have been written to.
#[derive(Default)]
pub(crate) struct ContextLocks(DashMap<ContextId, Arc<RwLock<()>>>);

impl ContextLocks {
    pub(crate) async fn write(&self, context: &ContextId) -> OwnedRwLockWriteGuard<()> {
        // clone the Arc out so the map shard is not held while waiting
        let lock = self.0.entry(context.clone()).or_default().clone();
        lock.write_owned().await
    }

    /// None if the context has never been written through this tracker. Registrations are atomic in every
    /// engine, so a writer that starts after this lookup is observed either entirely or not at all.
    pub(crate) async fn read(&self, context: &ContextId) -> Option<OwnedRwLockReadGuard<()>> {
        let lock = self.0.get(context).map(|entry| entry.value().clone())?;
        Some(lock.read_owned().await)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize { self.0.len() }
}
