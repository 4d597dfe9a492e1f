//! # State-reconstruction pipeline
//!
//! Two pure operations over whole snapshots, both dispatched per protocol
//! through the [`SchemaRegistry`]:
//!
//! - [`diff_snapshots`] computes the per-protocol deltas between two coherent
//!   snapshots sharing the same protocol schemas.
//! - [`patch_snapshot`] applies a delta to a snapshot, rebuilding only the
//!   touched protocols. Untouched entries survive by reference (`Arc` clone),
//!   so holding an old snapshot never forces a full copy per block.

/// Built-in schema handlers.
pub mod handlers;
/// Schema identifiers and the handler registry.
pub mod registry;

pub use registry::{
    SchemaHandler, SchemaRegistry, SCHEMA_POOL_REGISTRY, SCHEMA_TOKEN_GRAPH, SCHEMA_TOKEN_LIST,
    SCHEMA_V2_POOLS, SCHEMA_V3_POOLS,
};

use std::sync::Arc;

use indexmap::IndexMap;

use crate::errors::StateError;
use crate::types::delta::{ProtocolDelta, StateDelta};
use crate::types::snapshot::BlockSnapshot;
use crate::types::ProtocolId;

/// Protocol every chain snapshot must carry for the token list.
pub const PROTOCOL_TOKEN_SYSTEM: &str = "token-system";
/// Protocol every chain snapshot must carry for the pool registry.
pub const PROTOCOL_POOL_SYSTEM: &str = "pool-system";
/// Protocol every chain snapshot must carry for the graph view.
pub const PROTOCOL_TOKEN_POOL_GRAPH_SYSTEM: &str = "token-pool-graph-system";
/// Prefix of constant-product AMM protocols.
pub const PROTOCOL_V2_PREFIX: &str = "uniswap-v2-";
/// Prefix of concentrated-liquidity AMM protocols.
pub const PROTOCOL_V3_PREFIX: &str = "uniswap-v3-";

/// Checks that the snapshot carries the three system protocols plus at least
/// one AMM protocol. Incomplete snapshots are skipped by the client.
pub fn validate_completeness(snapshot: &BlockSnapshot) -> Result<(), StateError> {
    for required in [
        PROTOCOL_TOKEN_SYSTEM,
        PROTOCOL_POOL_SYSTEM,
        PROTOCOL_TOKEN_POOL_GRAPH_SYSTEM,
    ] {
        let id = ProtocolId::from(required);
        if snapshot.protocol(&id).is_none() {
            return Err(StateError::IncompleteSnapshot(id));
        }
    }
    let has_amm = snapshot.protocols.keys().any(|id| {
        id.as_str().starts_with(PROTOCOL_V2_PREFIX) || id.as_str().starts_with(PROTOCOL_V3_PREFIX)
    });
    if !has_amm {
        return Err(StateError::IncompleteSnapshot(ProtocolId::from(
            "uniswap-v2-*|uniswap-v3-*",
        )));
    }
    Ok(())
}

fn check_valid(snapshot: &BlockSnapshot) -> Result<(), StateError> {
    if let Some((protocol, message)) = snapshot.first_error() {
        return Err(StateError::UpstreamError {
            protocol: protocol.clone(),
            message: message.to_owned(),
        });
    }
    Ok(())
}

/// Computes the delta turning `old` into `new`.
///
/// Both snapshots must be valid (no protocol errors) and every protocol of
/// `new` must exist in `old` under the same schema. Protocols whose payload
/// did not change are left out of the delta entirely; the token-pool graph is
/// the exception and always ships its complete new view.
pub fn diff_snapshots(
    registry: &SchemaRegistry,
    old: &BlockSnapshot,
    new: &BlockSnapshot,
) -> Result<StateDelta, StateError> {
    check_valid(old)?;
    check_valid(new)?;

    let mut protocols = IndexMap::new();
    for (protocol_id, new_state) in &new.protocols {
        let old_state = old
            .protocols
            .get(protocol_id)
            .ok_or_else(|| StateError::UnknownProtocol(protocol_id.clone()))?;
        if old_state.schema != new_state.schema {
            return Err(StateError::SchemaMismatch {
                protocol: protocol_id.clone(),
                expected: old_state.schema.clone(),
                got: new_state.schema.clone(),
            });
        }
        let handler = registry
            .handler(&new_state.schema)
            .ok_or_else(|| StateError::MissingHandler(new_state.schema.clone()))?;
        let data = handler.diff(&old_state.data, &new_state.data)?;
        if !data.is_empty() {
            protocols.insert(
                protocol_id.clone(),
                ProtocolDelta {
                    schema: new_state.schema.clone(),
                    data,
                },
            );
        }
    }

    Ok(StateDelta {
        timestamp: new.timestamp,
        from_block: old.block.number,
        to_block: new.block.clone(),
        protocols,
    })
}

/// Applies `delta` to `old`, producing the next snapshot.
///
/// Fails with a block mismatch when the delta was computed from a different
/// block, and with a schema mismatch when a delta entry disagrees with the
/// snapshot (schema migration is unsupported). On success only the protocols
/// named by the delta are rebuilt; every other entry shares its payload with
/// `old` by reference.
pub fn patch_snapshot(
    registry: &SchemaRegistry,
    old: &BlockSnapshot,
    delta: &StateDelta,
) -> Result<BlockSnapshot, StateError> {
    if old.block.number != delta.from_block {
        return Err(StateError::BlockMismatch {
            snapshot: old.block.number,
            delta: delta.from_block,
        });
    }

    let mut protocols = old.protocols.clone();
    for (protocol_id, protocol_delta) in &delta.protocols {
        let old_state = protocols
            .get(protocol_id)
            .ok_or_else(|| StateError::UnknownProtocol(protocol_id.clone()))?;
        if old_state.schema != protocol_delta.schema {
            return Err(StateError::SchemaMismatch {
                protocol: protocol_id.clone(),
                expected: old_state.schema.clone(),
                got: protocol_delta.schema.clone(),
            });
        }
        let handler = registry
            .handler(&protocol_delta.schema)
            .ok_or_else(|| StateError::MissingHandler(protocol_delta.schema.clone()))?;
        let data = handler.patch(&old_state.data, &protocol_delta.data)?;
        let mut next_state = old_state.clone();
        next_state.synced_block = Some(delta.to_block.number);
        next_state.data = Arc::new(data);
        next_state.error = None;
        protocols.insert(protocol_id.clone(), next_state);
    }

    Ok(BlockSnapshot {
        chain_id: old.chain_id,
        timestamp: delta.timestamp,
        block: delta.to_block.clone(),
        protocols,
    })
}
