//! Shared fixtures: a small USDC/WETH/DAI world with one V2 protocol, one V3
//! protocol, a pool registry, and the graph view the upstream would ship.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Utc};
use ethers::types::U256;
use indexmap::IndexMap;

use defistate_client::state_sync::{
    PROTOCOL_POOL_SYSTEM, PROTOCOL_TOKEN_POOL_GRAPH_SYSTEM, PROTOCOL_TOKEN_SYSTEM,
    SCHEMA_POOL_REGISTRY, SCHEMA_TOKEN_GRAPH, SCHEMA_TOKEN_LIST, SCHEMA_V2_POOLS, SCHEMA_V3_POOLS,
};
use defistate_client::token_graph::GraphRegistry;
use defistate_client::types::snapshot::{
    BlockSnapshot, BlockSummary, PoolRegistryData, ProtocolState, StateData,
};
use defistate_client::types::{
    PoolId, PoolRegistryEntry, ProtocolId, SchemaId, TickInfo, Token, TokenId, V2Pool, V3Pool,
};

pub const USDC: TokenId = TokenId(1);
pub const WETH: TokenId = TokenId(2);
pub const DAI: TokenId = TokenId(3);

pub const V2_PROTOCOL: &str = "uniswap-v2-testnet";
pub const V3_PROTOCOL: &str = "uniswap-v3-testnet";

pub fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).expect("fixture timestamp")
}

pub fn block(number: u64) -> BlockSummary {
    let mut hash = [0u8; 32];
    hash[24..].copy_from_slice(&number.to_be_bytes());
    BlockSummary {
        number: U256::from(number),
        hash,
        timestamp: ts(1_700_000_000 + number as i64 * 12),
        gas_limit: U256::from(30_000_000u64),
        gas_used: U256::from(12_000_000u64),
        ingested_at: ts(1_700_000_001 + number as i64 * 12),
    }
}

pub fn token(id: TokenId, symbol: &str, decimals: u8) -> Token {
    let mut address = [0u8; 20];
    address[12..].copy_from_slice(&id.0.to_be_bytes());
    Token {
        id,
        address,
        symbol: symbol.to_owned(),
        name: symbol.to_owned(),
        decimals,
        fee_on_transfer_percent: 0.0,
    }
}

pub fn v2_pool(id: u64, token0: TokenId, token1: TokenId, r0: U256, r1: U256) -> V2Pool {
    V2Pool {
        id: PoolId(id),
        token0,
        token1,
        reserve0: r0,
        reserve1: r1,
        pool_type: 0,
        fee_bps: 30,
    }
}

pub fn v3_pool(id: u64) -> V3Pool {
    V3Pool {
        id: PoolId(id),
        token0: USDC,
        token1: WETH,
        fee_ppm: 3000,
        tick_spacing: 10,
        tick: 193540,
        liquidity: 4_411_461_329_627_947_710,
        sqrt_price_x96: U256::from_dec_str("1262831046415630070062062910819682").unwrap(),
        ticks: Arc::new(vec![
            TickInfo {
                index: 191540,
                liquidity_gross: 10u128.pow(18),
                liquidity_net: 10i128.pow(17),
            },
            TickInfo {
                index: 195540,
                liquidity_gross: 10u128.pow(18),
                liquidity_net: -(10i128.pow(17)),
            },
        ]),
    }
}

pub fn registry_key(id: u64) -> [u8; 32] {
    let mut key = [0u8; 32];
    key[24..].copy_from_slice(&id.to_be_bytes());
    key
}

fn protocol_state(schema: &str, data: StateData) -> ProtocolState {
    ProtocolState {
        meta: serde_json::json!({ "source": "fixture" }),
        synced_block: None,
        schema: SchemaId::from(schema),
        data: Arc::new(data),
        error: None,
    }
}

/// A complete, valid snapshot around the given pool lists. The graph view is
/// built the same way the upstream grapher would build it.
pub fn snapshot(number: u64, v2_pools: Vec<V2Pool>, v3_pools: Vec<V3Pool>) -> BlockSnapshot {
    let tokens = vec![token(USDC, "USDC", 6), token(WETH, "WETH", 18), token(DAI, "DAI", 18)];

    let graph = GraphRegistry::new(64);
    for pool in &v2_pools {
        graph.add_pool(&[pool.token0, pool.token1], pool.id);
    }
    for pool in &v3_pools {
        graph.add_pool(&[pool.token0, pool.token1], pool.id);
    }

    let mut entries: Vec<PoolRegistryEntry> = v2_pools
        .iter()
        .map(|p| PoolRegistryEntry {
            id: p.id,
            key: registry_key(p.id.0),
            protocol: 0,
        })
        .chain(v3_pools.iter().map(|p| PoolRegistryEntry {
            id: p.id,
            key: registry_key(p.id.0),
            protocol: 1,
        }))
        .collect();
    entries.sort_by_key(|e| e.id);

    let registry = PoolRegistryData {
        protocols: vec![ProtocolId::from(V2_PROTOCOL), ProtocolId::from(V3_PROTOCOL)],
        entries,
    };

    let mut protocols = IndexMap::new();
    protocols.insert(
        ProtocolId::from(PROTOCOL_TOKEN_SYSTEM),
        protocol_state(SCHEMA_TOKEN_LIST, StateData::Tokens(tokens)),
    );
    protocols.insert(
        ProtocolId::from(PROTOCOL_POOL_SYSTEM),
        protocol_state(SCHEMA_POOL_REGISTRY, StateData::PoolRegistry(registry)),
    );
    protocols.insert(
        ProtocolId::from(PROTOCOL_TOKEN_POOL_GRAPH_SYSTEM),
        protocol_state(SCHEMA_TOKEN_GRAPH, StateData::TokenGraph(graph.view())),
    );
    protocols.insert(
        ProtocolId::from(V2_PROTOCOL),
        protocol_state(SCHEMA_V2_POOLS, StateData::V2Pools(v2_pools)),
    );
    protocols.insert(
        ProtocolId::from(V3_PROTOCOL),
        protocol_state(SCHEMA_V3_POOLS, StateData::V3Pools(v3_pools)),
    );

    let summary = block(number);
    BlockSnapshot {
        chain_id: 31337,
        timestamp: summary.timestamp,
        block: summary,
        protocols,
    }
}

/// The default three-pool world: USDC/WETH (V2 and V3) plus WETH/DAI.
pub fn default_snapshot(number: u64) -> BlockSnapshot {
    snapshot(
        number,
        vec![
            v2_pool(
                100,
                USDC,
                WETH,
                U256::from(100_000_000u64),
                U256::from(50u64) * U256::exp10(18),
            ),
            v2_pool(
                101,
                WETH,
                DAI,
                U256::from(1_000u64) * U256::exp10(18),
                U256::from(4_000_000u64) * U256::exp10(18),
            ),
        ],
        vec![v3_pool(200)],
    )
}
