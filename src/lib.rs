//! # Defistate Client
//!
//! A client-side engine for algorithmic traders that consumes a
//! block-synchronized stream of decentralized-exchange state, reconstructs the
//! full world-state incrementally from compact deltas, and answers algorithmic
//! queries over the token-pool liquidity graph: best swap paths, arbitrage
//! cycles, and propagated exchange rates.
//!
//! ## Architecture
//!
//! The crate is organized in four layers:
//!
//! ### State reconstruction
//! Schema-dispatched diff/patch over per-block snapshots. Only touched
//! protocols are rebuilt; everything else is shared with the previous snapshot
//! by reference.
//!
//! ### Graph registry
//! A mutable bipartite token-pool graph with batched mutation, dangling-edge
//! accounting, threshold-triggered compaction, and lock-free deep-copied
//! snapshots for concurrent readers.
//!
//! ### Pool calculators
//! Exact constant-product and concentrated-liquidity swap math over 256-bit
//! integers, usable standalone or through the engine's per-pool quote
//! closures.
//!
//! ### Pathfinding engine
//! A read-only per-snapshot query object running Bellman-Ford-style relaxation
//! with copy-on-write pool overrides.
//!
//! The transport that yields raw frames, configuration sources, UIs, and
//! metric backends are collaborators behind small interfaces; the crate keeps
//! no persistent state.

// Core types
/// Per-vertex visited sets for graph traversal.
pub mod bitset;
/// Error taxonomy across all layers.
pub mod errors;
/// Identifiers, pool records, snapshots, and deltas.
pub mod types;

// State reconstruction
/// Indexed read-only views over snapshot payloads.
pub mod indexers;
/// Schema-dispatched diff/patch pipeline.
pub mod state_sync;

// Graph & routing
/// Pool-to-protocol resolution.
pub mod resolver;
/// Per-snapshot pathfinding engine.
pub mod route_engine;
/// Mutable token-pool graph registry with cached snapshots.
pub mod token_graph;

// Calculators
/// Constant-product AMM math.
pub mod v2_math;
/// Concentrated-liquidity AMM math.
pub mod v3_math;

// Infrastructure
/// Streaming client loop.
pub mod client;
/// Metrics and observability.
pub mod metrics;
/// Configuration management.
pub mod settings;

// Re-exports for convenience
pub use client::{ChannelFrameSource, ClientChannels, FrameSource, ProcessedSnapshot, StreamClient, StreamFrame, TransportEvent};
pub use errors::{CalcError, ClientError, EngineError, StateError};
pub use resolver::ProtocolResolver;
pub use route_engine::{ActivePoolPolicy, CycleQuote, PoolOverride, RouteEngine, SwapHop, SwapQuote};
pub use settings::Settings;
pub use state_sync::{diff_snapshots, patch_snapshot, SchemaHandler, SchemaRegistry};
pub use token_graph::{GraphRegistry, TokenGraphView};
pub use types::{PoolId, ProtocolId, SchemaId, TokenId};
