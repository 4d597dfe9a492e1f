//! Built-in schema handlers.
//!
//! Collection payloads (tokens, registry entries, V2/V3 pool lists) diff and
//! patch by stream identifier. Entry equality only considers the fields a
//! block can legally evolve: reserves for V2 pools; current tick, sqrt price,
//! liquidity, and the order-insensitive `(index, liquidity_net)` tick set for
//! V3 pools. Patched collections come back canonically sorted by id.
//!
//! The token-pool graph is special-cased: its delta carries the complete new
//! view and patching deep-copies it.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::Hash;

use crate::errors::StateError;
use crate::types::delta::{CollectionDelta, DeltaData, PoolRegistryDelta};
use crate::types::snapshot::{PoolRegistryData, StateData};
use crate::types::{SchemaId, TickInfo, V2Pool, V3Pool};

use super::registry::{
    SchemaHandler, SCHEMA_POOL_REGISTRY, SCHEMA_TOKEN_GRAPH, SCHEMA_TOKEN_LIST, SCHEMA_V2_POOLS,
    SCHEMA_V3_POOLS,
};

fn shape_error(schema: &str) -> StateError {
    StateError::PayloadShape(SchemaId::from(schema))
}

/// Generic keyed diff: additions and updates in the order `new` lists them,
/// deletions sorted by key.
fn diff_keyed<T: Clone, K: Copy + Ord + Eq + Hash>(
    old: &[T],
    new: &[T],
    key: impl Fn(&T) -> K,
    changed: impl Fn(&T, &T) -> bool,
) -> CollectionDelta<T, K> {
    let old_by_key: HashMap<K, &T> = old.iter().map(|entry| (key(entry), entry)).collect();
    let mut delta = CollectionDelta::default();
    let mut kept: HashSet<K> = HashSet::with_capacity(new.len());
    for entry in new {
        let k = key(entry);
        kept.insert(k);
        match old_by_key.get(&k) {
            None => delta.additions.push(entry.clone()),
            Some(prev) if changed(prev, entry) => delta.updates.push(entry.clone()),
            Some(_) => {}
        }
    }
    delta.deletions = old
        .iter()
        .map(&key)
        .filter(|k| !kept.contains(k))
        .collect();
    delta.deletions.sort_unstable();
    delta.deletions.dedup();
    delta
}

/// Generic keyed patch: delete, update, then insert, returning the collection
/// sorted by key. Idempotent, and every entry in the output is a fresh clone.
fn patch_keyed<T: Clone, K: Copy + Ord + Eq + Hash>(
    old: &[T],
    delta: &CollectionDelta<T, K>,
    key: impl Fn(&T) -> K,
) -> Vec<T> {
    let mut by_key: BTreeMap<K, T> = old
        .iter()
        .map(|entry| (key(entry), entry.clone()))
        .collect();
    for k in &delta.deletions {
        by_key.remove(k);
    }
    for entry in &delta.updates {
        by_key.insert(key(entry), entry.clone());
    }
    for entry in &delta.additions {
        by_key.insert(key(entry), entry.clone());
    }
    by_key.into_values().collect()
}

fn v2_pool_changed(old: &V2Pool, new: &V2Pool) -> bool {
    old.reserve0 != new.reserve0 || old.reserve1 != new.reserve1
}

fn tick_set(ticks: &[TickInfo]) -> Vec<(i32, i128)> {
    let mut set: Vec<(i32, i128)> = ticks.iter().map(|t| (t.index, t.liquidity_net)).collect();
    set.sort_unstable();
    set
}

fn v3_pool_changed(old: &V3Pool, new: &V3Pool) -> bool {
    old.tick != new.tick
        || old.sqrt_price_x96 != new.sqrt_price_x96
        || old.liquidity != new.liquidity
        || tick_set(&old.ticks) != tick_set(&new.ticks)
}

/// Handler for [`SCHEMA_TOKEN_LIST`].
pub struct TokenListHandler;

impl SchemaHandler for TokenListHandler {
    fn diff(&self, old: &StateData, new: &StateData) -> Result<DeltaData, StateError> {
        let (StateData::Tokens(old), StateData::Tokens(new)) = (old, new) else {
            return Err(shape_error(SCHEMA_TOKEN_LIST));
        };
        Ok(DeltaData::Tokens(diff_keyed(
            old,
            new,
            |t| t.id,
            |a, b| a != b,
        )))
    }

    fn patch(&self, old: &StateData, delta: &DeltaData) -> Result<StateData, StateError> {
        let (StateData::Tokens(old), DeltaData::Tokens(delta)) = (old, delta) else {
            return Err(shape_error(SCHEMA_TOKEN_LIST));
        };
        Ok(StateData::Tokens(patch_keyed(old, delta, |t| t.id)))
    }
}

/// Handler for [`SCHEMA_POOL_REGISTRY`]. The protocol table is small and is
/// always shipped in full next to the entry delta.
pub struct PoolRegistryHandler;

impl SchemaHandler for PoolRegistryHandler {
    fn diff(&self, old: &StateData, new: &StateData) -> Result<DeltaData, StateError> {
        let (StateData::PoolRegistry(old), StateData::PoolRegistry(new)) = (old, new) else {
            return Err(shape_error(SCHEMA_POOL_REGISTRY));
        };
        Ok(DeltaData::PoolRegistry(PoolRegistryDelta {
            protocols: new.protocols.clone(),
            entries: diff_keyed(&old.entries, &new.entries, |e| e.id, |a, b| a != b),
        }))
    }

    fn patch(&self, old: &StateData, delta: &DeltaData) -> Result<StateData, StateError> {
        let (StateData::PoolRegistry(old), DeltaData::PoolRegistry(delta)) = (old, delta) else {
            return Err(shape_error(SCHEMA_POOL_REGISTRY));
        };
        Ok(StateData::PoolRegistry(PoolRegistryData {
            protocols: delta.protocols.clone(),
            entries: patch_keyed(&old.entries, &delta.entries, |e| e.id),
        }))
    }
}

/// Handler for [`SCHEMA_V2_POOLS`].
pub struct V2PoolListHandler;

impl SchemaHandler for V2PoolListHandler {
    fn diff(&self, old: &StateData, new: &StateData) -> Result<DeltaData, StateError> {
        let (StateData::V2Pools(old), StateData::V2Pools(new)) = (old, new) else {
            return Err(shape_error(SCHEMA_V2_POOLS));
        };
        Ok(DeltaData::V2Pools(diff_keyed(
            old,
            new,
            |p| p.id,
            v2_pool_changed,
        )))
    }

    fn patch(&self, old: &StateData, delta: &DeltaData) -> Result<StateData, StateError> {
        let (StateData::V2Pools(old), DeltaData::V2Pools(delta)) = (old, delta) else {
            return Err(shape_error(SCHEMA_V2_POOLS));
        };
        Ok(StateData::V2Pools(patch_keyed(old, delta, |p| p.id)))
    }
}

/// Handler for [`SCHEMA_V3_POOLS`].
pub struct V3PoolListHandler;

impl SchemaHandler for V3PoolListHandler {
    fn diff(&self, old: &StateData, new: &StateData) -> Result<DeltaData, StateError> {
        let (StateData::V3Pools(old), StateData::V3Pools(new)) = (old, new) else {
            return Err(shape_error(SCHEMA_V3_POOLS));
        };
        Ok(DeltaData::V3Pools(diff_keyed(
            old,
            new,
            |p| p.id,
            v3_pool_changed,
        )))
    }

    fn patch(&self, old: &StateData, delta: &DeltaData) -> Result<StateData, StateError> {
        let (StateData::V3Pools(old), DeltaData::V3Pools(delta)) = (old, delta) else {
            return Err(shape_error(SCHEMA_V3_POOLS));
        };
        Ok(StateData::V3Pools(patch_keyed(old, delta, |p| p.id)))
    }
}

/// Handler for [`SCHEMA_TOKEN_GRAPH`]: the delta is the complete new view.
pub struct TokenGraphHandler;

impl SchemaHandler for TokenGraphHandler {
    fn diff(&self, _old: &StateData, new: &StateData) -> Result<DeltaData, StateError> {
        let StateData::TokenGraph(view) = new else {
            return Err(shape_error(SCHEMA_TOKEN_GRAPH));
        };
        Ok(DeltaData::TokenGraph(view.clone()))
    }

    fn patch(&self, old: &StateData, delta: &DeltaData) -> Result<StateData, StateError> {
        let StateData::TokenGraph(_) = old else {
            return Err(shape_error(SCHEMA_TOKEN_GRAPH));
        };
        let DeltaData::TokenGraph(view) = delta else {
            return Err(shape_error(SCHEMA_TOKEN_GRAPH));
        };
        Ok(StateData::TokenGraph(view.clone()))
    }
}
