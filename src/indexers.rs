//! Read-only indexed views over a snapshot's protocol payloads.
//!
//! Built once per block after patching, these give the engine O(1) lookups by
//! stream identifier. V2 and V3 stores aggregate every protocol carrying the
//! matching payload shape, so multiple deployments of the same AMM family
//! land in one index.

use std::collections::HashMap;

use crate::errors::StateError;
use crate::state_sync::{PROTOCOL_POOL_SYSTEM, PROTOCOL_TOKEN_POOL_GRAPH_SYSTEM, PROTOCOL_TOKEN_SYSTEM};
use crate::token_graph::TokenGraphView;
use crate::types::snapshot::{BlockSnapshot, StateData};
use crate::types::{PoolId, PoolRegistryEntry, ProtocolId, Token, TokenId, V2Pool, V3Pool};

/// Tokens keyed by id.
#[derive(Debug, Clone, Default)]
pub struct TokenIndex {
    tokens: HashMap<TokenId, Token>,
}

impl TokenIndex {
    pub fn from_tokens(tokens: impl IntoIterator<Item = Token>) -> Self {
        Self {
            tokens: tokens.into_iter().map(|t| (t.id, t)).collect(),
        }
    }

    pub fn from_snapshot(snapshot: &BlockSnapshot) -> Result<Self, StateError> {
        let protocol = ProtocolId::from(PROTOCOL_TOKEN_SYSTEM);
        let state = snapshot
            .protocol(&protocol)
            .ok_or_else(|| StateError::IncompleteSnapshot(protocol))?;
        let StateData::Tokens(tokens) = &*state.data else {
            return Err(StateError::PayloadShape(state.schema.clone()));
        };
        Ok(Self::from_tokens(tokens.iter().cloned()))
    }

    pub fn get(&self, id: TokenId) -> Option<&Token> {
        self.tokens.get(&id)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Pool-registry entries keyed by id, plus the protocol table the 16-bit
/// protocol index points into.
#[derive(Debug, Clone, Default)]
pub struct PoolRegistryIndex {
    protocols: Vec<ProtocolId>,
    entries: HashMap<PoolId, PoolRegistryEntry>,
}

impl PoolRegistryIndex {
    pub fn from_snapshot(snapshot: &BlockSnapshot) -> Result<Self, StateError> {
        let protocol = ProtocolId::from(PROTOCOL_POOL_SYSTEM);
        let state = snapshot
            .protocol(&protocol)
            .ok_or_else(|| StateError::IncompleteSnapshot(protocol))?;
        let StateData::PoolRegistry(registry) = &*state.data else {
            return Err(StateError::PayloadShape(state.schema.clone()));
        };
        Ok(Self {
            protocols: registry.protocols.clone(),
            entries: registry.entries.iter().map(|e| (e.id, *e)).collect(),
        })
    }

    pub fn get(&self, id: PoolId) -> Option<&PoolRegistryEntry> {
        self.entries.get(&id)
    }

    /// Resolves the owning protocol of a pool through the protocol table.
    pub fn protocol_of(&self, id: PoolId) -> Option<&ProtocolId> {
        let entry = self.entries.get(&id)?;
        self.protocols.get(usize::from(entry.protocol))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Constant-product pools keyed by id, aggregated across protocols.
#[derive(Debug, Clone, Default)]
pub struct V2PoolIndex {
    pools: HashMap<PoolId, V2Pool>,
}

impl V2PoolIndex {
    pub fn from_pools(pools: impl IntoIterator<Item = V2Pool>) -> Self {
        Self {
            pools: pools.into_iter().map(|p| (p.id, p)).collect(),
        }
    }

    pub fn from_snapshot(snapshot: &BlockSnapshot) -> Self {
        Self::from_pools(snapshot.protocols.values().flat_map(|state| {
            match &*state.data {
                StateData::V2Pools(pools) => pools.clone(),
                _ => Vec::new(),
            }
        }))
    }

    pub fn get(&self, id: PoolId) -> Option<&V2Pool> {
        self.pools.get(&id)
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}

/// Concentrated-liquidity pools keyed by id, aggregated across protocols.
#[derive(Debug, Clone, Default)]
pub struct V3PoolIndex {
    pools: HashMap<PoolId, V3Pool>,
}

impl V3PoolIndex {
    pub fn from_pools(pools: impl IntoIterator<Item = V3Pool>) -> Self {
        Self {
            pools: pools.into_iter().map(|p| (p.id, p)).collect(),
        }
    }

    pub fn from_snapshot(snapshot: &BlockSnapshot) -> Self {
        Self::from_pools(snapshot.protocols.values().flat_map(|state| {
            match &*state.data {
                StateData::V3Pools(pools) => pools.clone(),
                _ => Vec::new(),
            }
        }))
    }

    pub fn get(&self, id: PoolId) -> Option<&V3Pool> {
        self.pools.get(&id)
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}

/// The authoritative graph view shipped inside the snapshot.
pub fn graph_view(snapshot: &BlockSnapshot) -> Result<&TokenGraphView, StateError> {
    let protocol = ProtocolId::from(PROTOCOL_TOKEN_POOL_GRAPH_SYSTEM);
    let state = snapshot
        .protocol(&protocol)
        .ok_or_else(|| StateError::IncompleteSnapshot(protocol))?;
    match &*state.data {
        StateData::TokenGraph(view) => Ok(view),
        _ => Err(StateError::PayloadShape(state.schema.clone())),
    }
}
