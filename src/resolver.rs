//! Maps pool identifiers to the protocol that owns them.
//!
//! Shared across consumer threads together with the per-snapshot engine;
//! lookups memoize into a concurrent map so repeated resolution of hot pools
//! stays contention-free.

use std::sync::Arc;

use dashmap::DashMap;

use crate::indexers::PoolRegistryIndex;
use crate::types::{PoolId, ProtocolId};

/// Resolves [`PoolId`]s to their owning [`ProtocolId`] through the pool
/// registry's protocol table.
#[derive(Debug)]
pub struct ProtocolResolver {
    registry: Arc<PoolRegistryIndex>,
    memo: DashMap<PoolId, ProtocolId>,
}

impl ProtocolResolver {
    pub fn new(registry: Arc<PoolRegistryIndex>) -> Self {
        Self {
            registry,
            memo: DashMap::new(),
        }
    }

    /// The protocol owning `pool`, or `None` for pools the registry does not
    /// know about.
    pub fn resolve(&self, pool: PoolId) -> Option<ProtocolId> {
        if let Some(hit) = self.memo.get(&pool) {
            return Some(hit.value().clone());
        }
        let protocol = self.registry.protocol_of(pool)?.clone();
        self.memo.insert(pool, protocol.clone());
        Some(protocol)
    }
}
