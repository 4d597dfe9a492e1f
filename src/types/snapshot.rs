//! Per-block snapshot aggregate.
//!
//! A snapshot is immutable once produced by the patcher. Protocol payloads sit
//! behind `Arc` so that patching one protocol shares every untouched payload
//! with the previous snapshot by reference.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use ethers::types::U256;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::token_graph::TokenGraphView;
use crate::types::{PoolRegistryEntry, ProtocolId, SchemaId, Token, V2Pool, V3Pool};

/// Summary of the block a snapshot was taken at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSummary {
    pub number: U256,
    pub hash: [u8; 32],
    pub timestamp: DateTime<Utc>,
    pub gas_limit: U256,
    pub gas_used: U256,
    /// When the upstream indexer ingested the block.
    pub ingested_at: DateTime<Utc>,
}

/// Schema-dispatched protocol payload.
///
/// The five well-known variants cover the normative schemas; `Opaque` carries
/// the payload of any additional schema a caller registers a handler for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StateData {
    Tokens(Vec<Token>),
    PoolRegistry(PoolRegistryData),
    V2Pools(Vec<V2Pool>),
    V3Pools(Vec<V3Pool>),
    TokenGraph(TokenGraphView),
    Opaque(serde_json::Value),
}

/// The pool registry payload: a protocol table plus entries whose 16-bit
/// protocol index points into that table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PoolRegistryData {
    pub protocols: Vec<ProtocolId>,
    pub entries: Vec<PoolRegistryEntry>,
}

/// State of one protocol inside a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolState {
    /// Upstream metadata, opaque to the core.
    pub meta: serde_json::Value,
    /// Last block the upstream indexer synced this protocol to.
    pub synced_block: Option<U256>,
    pub schema: SchemaId,
    pub data: Arc<StateData>,
    /// Non-empty when the upstream failed to produce this protocol's state.
    pub error: Option<String>,
}

impl ProtocolState {
    /// Returns the upstream error, treating an empty string as no error.
    pub fn upstream_error(&self) -> Option<&str> {
        self.error.as_deref().filter(|e| !e.is_empty())
    }
}

/// The per-block immutable aggregate of all protocol states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSnapshot {
    pub chain_id: u64,
    pub timestamp: DateTime<Utc>,
    pub block: BlockSummary,
    pub protocols: IndexMap<ProtocolId, ProtocolState>,
}

impl BlockSnapshot {
    /// A snapshot is valid iff no protocol entry carries an upstream error.
    pub fn is_valid(&self) -> bool {
        self.protocols.values().all(|p| p.upstream_error().is_none())
    }

    pub fn protocol(&self, id: &ProtocolId) -> Option<&ProtocolState> {
        self.protocols.get(id)
    }

    /// Returns the first upstream error found, if any.
    pub fn first_error(&self) -> Option<(&ProtocolId, &str)> {
        self.protocols
            .iter()
            .find_map(|(id, p)| p.upstream_error().map(|e| (id, e)))
    }
}
