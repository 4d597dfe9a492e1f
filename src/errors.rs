//! Error types for the calculator, state-reconstruction, engine, and client layers.
//!
//! Calculator errors are routine during routing (a pool that fails to quote simply
//! does not improve the relaxation) and are only surfaced by the standalone
//! calculator APIs. State errors abort the current diff/patch and are returned to
//! the caller. Transport-fatal errors terminate the streaming client.

use ethers::types::U256;
use thiserror::Error;

use crate::types::{PoolId, ProtocolId, SchemaId, TokenId};

/// Errors produced by the pool calculators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalcError {
    /// The amount is zero, negative where a positive value is required, or too
    /// large to represent in the signed accumulator.
    #[error("invalid swap amount")]
    InvalidAmount,
    /// The given token is not one of the pool's two sides.
    #[error("token {token} is not a side of pool {pool}")]
    TokenMismatch { token: TokenId, pool: PoolId },
    /// The requested output exceeds what the pool can provide.
    #[error("insufficient liquidity for requested output")]
    InsufficientLiquidity,
    /// The pool carries a state no valid sequence of swaps can produce.
    #[error("invalid pool state: {0}")]
    InvalidState(&'static str),
    /// Applying a positive liquidity delta exceeded 2^128 - 1.
    #[error("liquidity overflow")]
    LiquidityOverflow,
    /// Applying a negative liquidity delta went below zero.
    #[error("liquidity underflow")]
    LiquidityUnderflow,
    /// A square-root price fell outside `[MIN_SQRT_RATIO, MAX_SQRT_RATIO)`.
    #[error("sqrt price out of bounds")]
    SqrtPriceOutOfBounds,
    /// A tick fell outside `[MIN_TICK, MAX_TICK]`.
    #[error("tick {0} out of bounds")]
    TickOutOfBounds(i32),
}

/// Errors produced by the state-reconstruction pipeline (diff/patch).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// A protocol's schema disagrees between the two inputs. Schema migration
    /// is unsupported by design.
    #[error("schema mismatch for protocol {protocol}: expected {expected}, got {got}")]
    SchemaMismatch {
        protocol: ProtocolId,
        expected: SchemaId,
        got: SchemaId,
    },
    /// No handler is registered for the schema.
    #[error("no handler registered for schema {0}")]
    MissingHandler(SchemaId),
    /// A protocol present in one input is absent from the other.
    #[error("protocol {0} is missing from the previous snapshot")]
    UnknownProtocol(ProtocolId),
    /// The delta's `from_block` disagrees with the snapshot it is applied to.
    #[error("block mismatch: snapshot at {snapshot}, delta from {delta}")]
    BlockMismatch { snapshot: U256, delta: U256 },
    /// A protocol entry carries a non-empty upstream error string.
    #[error("protocol {protocol} carries an upstream error: {message}")]
    UpstreamError {
        protocol: ProtocolId,
        message: String,
    },
    /// A handler received a payload whose shape does not belong to its schema.
    #[error("handler for schema {0} received an unexpected payload shape")]
    PayloadShape(SchemaId),
    /// A snapshot is missing one of the protocols every chain must carry.
    #[error("snapshot is missing required protocol {0}")]
    IncompleteSnapshot(ProtocolId),
}

/// Errors produced by the pathfinding engine. Calculator failures are swallowed
/// during relaxation; only invariant breaches surface here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// `runs` must be greater than zero.
    #[error("relaxation run count must be nonzero")]
    ZeroRuns,
    /// A vertex appeared in its own path set, which the relaxation can never
    /// legally produce.
    #[error("relaxation invariant violated: vertex {0} is in its own path set")]
    CyclicPathState(usize),
}

/// Errors published on the streaming client's error channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The transport disconnected; the pipeline has stopped.
    #[error("transport fatal: {0}")]
    TransportFatal(String),
}
