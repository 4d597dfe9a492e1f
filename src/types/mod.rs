//! Core identifiers and protocol data records shared across the crate.
//!
//! Every token and pool carries a stream-assigned 64-bit identifier that is
//! stable for the life of the stream; pools additionally carry an opaque
//! 32-byte key (an address left-padded, or a synthetic hash). Protocols are
//! named by string identifiers and declare their data contract through a
//! schema string of the form `"<namespace>/<name>@v<version>"`.

/// Per-block snapshot aggregate and the schema-dispatched state payloads.
pub mod snapshot;
/// Per-protocol deltas between two consecutive snapshots.
pub mod delta;

use std::fmt;
use std::sync::Arc;

use ethers::types::U256;
use serde::{Deserialize, Serialize};

/// Stream-assigned identifier of a token.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TokenId(pub u64);

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "token#{}", self.0)
    }
}

/// Stream-assigned identifier of a pool.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PoolId(pub u64);

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pool#{}", self.0)
    }
}

/// Name of a protocol within a chain snapshot, e.g. `"uniswap-v3-ethereum"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtocolId(pub String);

impl ProtocolId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProtocolId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Schema string declaring a protocol's data contract. Opaque to the core;
/// only the handler registry interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaId(pub String);

impl SchemaId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SchemaId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque 32-byte pool key (address or synthetic hash).
pub type PoolKey = [u8; 32];

/// A token known to the stream.
///
/// Tokens with a nonzero `fee_on_transfer_percent` are excluded from routing:
/// the engine builder omits calculators for their pools under the routable
/// policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub id: TokenId,
    pub address: [u8; 20],
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    pub fee_on_transfer_percent: f64,
}

impl Token {
    /// Whether the token charges a transfer fee and is therefore unroutable.
    pub fn is_fee_on_transfer(&self) -> bool {
        self.fee_on_transfer_percent != 0.0
    }
}

/// One entry of the pool registry. The 16-bit protocol index resolves through
/// the protocol table carried next to the entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolRegistryEntry {
    pub id: PoolId,
    pub key: PoolKey,
    pub protocol: u16,
}

/// A two-reserve constant-product pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct V2Pool {
    pub id: PoolId,
    pub token0: TokenId,
    pub token1: TokenId,
    pub reserve0: U256,
    pub reserve1: U256,
    pub pool_type: u8,
    pub fee_bps: u16,
}

impl V2Pool {
    /// Returns the token paired with `token`, if `token` is one of the sides.
    pub fn other_side(&self, token: TokenId) -> Option<TokenId> {
        if token == self.token0 {
            Some(self.token1)
        } else if token == self.token1 {
            Some(self.token0)
        } else {
            None
        }
    }
}

/// One initialized tick of a concentrated-liquidity pool.
///
/// `liquidity_net` is signed: crossing the tick upward adds it to the active
/// liquidity, crossing downward subtracts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickInfo {
    pub index: i32,
    pub liquidity_gross: u128,
    pub liquidity_net: i128,
}

/// A concentrated-liquidity pool.
///
/// `ticks` is sorted strictly ascending by `index` and is shared by reference
/// between a pool and the pools produced by simulating swaps on it: the tick
/// list itself never changes inside a simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct V3Pool {
    pub id: PoolId,
    pub token0: TokenId,
    pub token1: TokenId,
    pub fee_ppm: u32,
    pub tick_spacing: i32,
    pub tick: i32,
    pub liquidity: u128,
    pub sqrt_price_x96: U256,
    pub ticks: Arc<Vec<TickInfo>>,
}

impl V3Pool {
    /// Returns the token paired with `token`, if `token` is one of the sides.
    pub fn other_side(&self, token: TokenId) -> Option<TokenId> {
        if token == self.token0 {
            Some(self.token1)
        } else if token == self.token1 {
            Some(self.token0)
        } else {
            None
        }
    }
}
