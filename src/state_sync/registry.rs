//! Schema handler registry.
//!
//! Schemas are opaque strings of the form `"<namespace>/<name>@v<version>"`.
//! The registry maps each one to the handler implementing its diff/patch
//! contract; callers may register handlers for additional schemas next to the
//! built-in ones.

use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::StateError;
use crate::types::delta::DeltaData;
use crate::types::snapshot::StateData;
use crate::types::SchemaId;

/// Schema of the token list carried by the `token-system` protocol.
pub const SCHEMA_TOKEN_LIST: &str = "defistate/token-system/TokenList@v1";
/// Schema of the pool registry carried by the `pool-system` protocol.
pub const SCHEMA_POOL_REGISTRY: &str = "defistate/pool-system/PoolRegistry@v1";
/// Schema of the graph view carried by the `token-pool-graph-system` protocol.
pub const SCHEMA_TOKEN_GRAPH: &str = "defistate/token-pool-graph-system/View@v1";
/// Schema of constant-product pool lists.
pub const SCHEMA_V2_POOLS: &str = "defistate/uniswap-v2-system/PoolView@v1";
/// Schema of concentrated-liquidity pool lists.
pub const SCHEMA_V3_POOLS: &str = "defistate/uniswap-v3-system/PoolView@v1";

/// Diff/patch contract of one schema.
///
/// Both operations are pure: inputs are never mutated, and any mutable storage
/// in the returned payload is freshly allocated rather than shared with an
/// input.
pub trait SchemaHandler: Send + Sync {
    /// Computes the delta turning `old` into `new`.
    fn diff(&self, old: &StateData, new: &StateData) -> Result<DeltaData, StateError>;

    /// Applies `delta` to `old`, producing the new payload.
    fn patch(&self, old: &StateData, delta: &DeltaData) -> Result<StateData, StateError>;
}

/// Registry of schema handlers keyed by schema string.
pub struct SchemaRegistry {
    handlers: HashMap<SchemaId, Arc<dyn SchemaHandler>>,
}

impl SchemaRegistry {
    /// An empty registry with no handlers at all.
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// A registry carrying the five built-in schema handlers.
    pub fn with_defaults() -> Self {
        use super::handlers::{
            PoolRegistryHandler, TokenGraphHandler, TokenListHandler, V2PoolListHandler,
            V3PoolListHandler,
        };
        let mut registry = Self::empty();
        registry.register(SCHEMA_TOKEN_LIST, Arc::new(TokenListHandler));
        registry.register(SCHEMA_POOL_REGISTRY, Arc::new(PoolRegistryHandler));
        registry.register(SCHEMA_TOKEN_GRAPH, Arc::new(TokenGraphHandler));
        registry.register(SCHEMA_V2_POOLS, Arc::new(V2PoolListHandler));
        registry.register(SCHEMA_V3_POOLS, Arc::new(V3PoolListHandler));
        registry
    }

    /// Registers (or replaces) the handler for `schema`.
    pub fn register(&mut self, schema: impl Into<SchemaId>, handler: Arc<dyn SchemaHandler>) {
        self.handlers.insert(schema.into(), handler);
    }

    pub fn handler(&self, schema: &SchemaId) -> Option<&Arc<dyn SchemaHandler>> {
        self.handlers.get(schema)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("schemas", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
