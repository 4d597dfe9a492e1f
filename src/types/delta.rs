//! Per-protocol deltas between two consecutive snapshots.
//!
//! Collection deltas follow add/update/delete semantics keyed by the entry's
//! stream identifier. The token-pool graph is the exception: its delta carries
//! the complete new view (minimal graph diffing is a known deferred
//! optimisation).

use chrono::{DateTime, Utc};
use ethers::types::U256;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::token_graph::TokenGraphView;
use crate::types::snapshot::BlockSummary;
use crate::types::{PoolId, PoolRegistryEntry, ProtocolId, SchemaId, Token, TokenId, V2Pool, V3Pool};

/// Add/update/delete delta over a keyed collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionDelta<T, K> {
    pub additions: Vec<T>,
    pub updates: Vec<T>,
    pub deletions: Vec<K>,
}

impl<T, K> CollectionDelta<T, K> {
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.updates.is_empty() && self.deletions.is_empty()
    }
}

impl<T, K> Default for CollectionDelta<T, K> {
    fn default() -> Self {
        Self {
            additions: Vec::new(),
            updates: Vec::new(),
            deletions: Vec::new(),
        }
    }
}

pub type TokenListDelta = CollectionDelta<Token, TokenId>;
pub type V2PoolListDelta = CollectionDelta<V2Pool, PoolId>;
pub type V3PoolListDelta = CollectionDelta<V3Pool, PoolId>;

/// Delta of the pool registry: entry changes plus the (small) protocol table,
/// which is always shipped in full.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PoolRegistryDelta {
    pub protocols: Vec<ProtocolId>,
    pub entries: CollectionDelta<PoolRegistryEntry, PoolId>,
}

/// Schema-dispatched delta payload, mirroring [`StateData`].
///
/// [`StateData`]: crate::types::snapshot::StateData
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeltaData {
    Tokens(TokenListDelta),
    PoolRegistry(PoolRegistryDelta),
    V2Pools(V2PoolListDelta),
    V3Pools(V3PoolListDelta),
    /// The complete new view; the patcher deep-copies it.
    TokenGraph(TokenGraphView),
    Opaque(serde_json::Value),
}

impl DeltaData {
    /// Whether applying this delta would leave the payload unchanged.
    ///
    /// A graph delta always counts as a change: it replaces the view
    /// wholesale. Opaque deltas are schema-defined and likewise always count.
    pub fn is_empty(&self) -> bool {
        match self {
            DeltaData::Tokens(d) => d.is_empty(),
            DeltaData::PoolRegistry(d) => d.entries.is_empty(),
            DeltaData::V2Pools(d) => d.is_empty(),
            DeltaData::V3Pools(d) => d.is_empty(),
            DeltaData::TokenGraph(_) | DeltaData::Opaque(_) => false,
        }
    }
}

/// Delta of one protocol's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolDelta {
    pub schema: SchemaId,
    pub data: DeltaData,
}

/// The full inter-block delta: which block range it covers and one entry per
/// protocol whose state changed. Protocols absent from `protocols` were
/// untouched and survive patching by reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDelta {
    pub timestamp: DateTime<Utc>,
    pub from_block: U256,
    pub to_block: BlockSummary,
    pub protocols: IndexMap<ProtocolId, ProtocolDelta>,
}
