//! # Pathfinding engine
//!
//! A per-snapshot, read-only query object. Construction pre-indexes the
//! snapshot's tokens and pools into dense vertex/slot arrays and binds one
//! small quote closure per pool slot; queries relax amounts over the graph
//! Bellman-Ford style, so the result is the best among paths of bounded
//! length, approaching the optimum as `runs` grows.
//!
//! Per-pool overrides never mutate the engine: the active closure vector is
//! copied and the overridden slots are re-bound to the supplied pool state,
//! which keeps concurrent queries isolated from each other.
//!
//! Calculator failures on a pool are swallowed during relaxation (that pool
//! simply does not improve the edge this step); only invariant violations
//! surface as errors.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use ethers::types::{I256, U256};
use rayon::prelude::*;
use serde::Deserialize;
use tracing::debug;

use crate::bitset::BitSet;
use crate::errors::{CalcError, EngineError, StateError};
use crate::indexers::{self, TokenIndex, V2PoolIndex, V3PoolIndex};
use crate::token_graph::TokenGraphView;
use crate::types::snapshot::BlockSnapshot;
use crate::types::{PoolId, TokenId, V2Pool, V3Pool};
use crate::{v2_math, v3_math};

/// Quote function bound to one pool slot: `(token_in, amount_in) -> amount_out`.
pub type QuoteFn = Arc<dyn Fn(TokenId, U256) -> Result<U256, CalcError> + Send + Sync>;

/// Reserve lookup bound to one pool slot:
/// `token_in -> (reserve_in, reserve_out)`.
pub type ReserveFn = Arc<dyn Fn(TokenId) -> Result<(U256, U256), CalcError> + Send + Sync>;

/// Which pools participate in routing. Selected per chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivePoolPolicy {
    /// Every pool in the graph.
    All,
    /// Only pools whose tokens carry no transfer fee.
    #[default]
    Routable,
}

/// Replacement pool state for one pool during a single query.
#[derive(Debug, Clone)]
pub enum PoolOverride {
    V2(V2Pool),
    V3(V3Pool),
}

/// One hop of a discovered path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapHop {
    pub token_in: TokenId,
    pub token_out: TokenId,
    pub pool: PoolId,
}

/// Result of [`RouteEngine::find_best_swap_path`]. An empty path with a zero
/// amount means the target was unreachable.
#[derive(Debug, Clone, Default)]
pub struct SwapQuote {
    pub path: Vec<SwapHop>,
    pub amount_out: U256,
}

/// Result of [`RouteEngine::find_arbitrage_cycles`]: the single best cycle
/// found, profitable or not. Downstream filters decide profitability.
#[derive(Debug, Clone, Default)]
pub struct CycleQuote {
    pub cycle: Vec<SwapHop>,
    pub amount_out: U256,
}

#[derive(Clone, Copy)]
enum EdgeSelection {
    MaxAmountOut,
    MaxReserve,
}

enum PoolState {
    V2(V2Pool),
    V3(V3Pool),
}

/// The per-snapshot engine. Read-only once constructed; share it freely.
pub struct RouteEngine {
    view: TokenGraphView,
    vertex_of: HashMap<TokenId, usize>,
    slot_of: HashMap<PoolId, usize>,
    all_quotes: Vec<Option<QuoteFn>>,
    active_quotes: Vec<Option<QuoteFn>>,
    reserves: Vec<Option<ReserveFn>>,
}

fn quote_fn_for(state: &PoolState) -> QuoteFn {
    match state {
        PoolState::V2(pool) => {
            let pool = pool.clone();
            Arc::new(move |token_in, amount_in| {
                let token_out = pool.other_side(token_in).ok_or(CalcError::TokenMismatch {
                    token: token_in,
                    pool: pool.id,
                })?;
                v2_math::get_amount_out(amount_in, token_in, token_out, &pool)
            })
        }
        PoolState::V3(pool) => {
            let pool = pool.clone();
            Arc::new(move |token_in, amount_in| {
                let specified =
                    I256::try_from(amount_in).map_err(|_| CalcError::InvalidAmount)?;
                v3_math::simulate_swap(&pool, token_in, specified, None).map(|sim| sim.amount)
            })
        }
    }
}

fn reserve_fn_for(state: &PoolState) -> ReserveFn {
    match state {
        PoolState::V2(pool) => {
            let pool = pool.clone();
            Arc::new(move |token_in| {
                let token_out = pool.other_side(token_in).ok_or(CalcError::TokenMismatch {
                    token: token_in,
                    pool: pool.id,
                })?;
                v2_math::get_reserves(token_in, token_out, &pool)
            })
        }
        PoolState::V3(pool) => {
            // derived: full-range amount-out with a maximal input on each side
            let pool = pool.clone();
            Arc::new(move |token_in| {
                let token_out = pool.other_side(token_in).ok_or(CalcError::TokenMismatch {
                    token: token_in,
                    pool: pool.id,
                })?;
                let reserve_out =
                    v3_math::simulate_swap(&pool, token_in, I256::MAX, None)?.amount;
                let reserve_in =
                    v3_math::simulate_swap(&pool, token_out, I256::MAX, None)?.amount;
                Ok((reserve_in, reserve_out))
            })
        }
    }
}

impl RouteEngine {
    /// Builds the engine from the snapshot's shipped graph view and indexed
    /// pool stores.
    pub fn from_snapshot(
        snapshot: &BlockSnapshot,
        policy: ActivePoolPolicy,
    ) -> Result<Self, StateError> {
        let tokens = TokenIndex::from_snapshot(snapshot)?;
        let v2 = V2PoolIndex::from_snapshot(snapshot);
        let v3 = V3PoolIndex::from_snapshot(snapshot);
        let view = indexers::graph_view(snapshot)?.clone();
        Ok(Self::new(view, &tokens, &v2, &v3, policy))
    }

    /// Builds the engine from an explicit view and stores.
    pub fn new(
        view: TokenGraphView,
        tokens: &TokenIndex,
        v2: &V2PoolIndex,
        v3: &V3PoolIndex,
        policy: ActivePoolPolicy,
    ) -> Self {
        let routable = |pool_token0: TokenId, pool_token1: TokenId| -> bool {
            match policy {
                ActivePoolPolicy::All => true,
                ActivePoolPolicy::Routable => [pool_token0, pool_token1].iter().all(|id| {
                    tokens
                        .get(*id)
                        .map(|t| !t.is_fee_on_transfer())
                        .unwrap_or(false)
                }),
            }
        };

        let slots: Vec<(Option<QuoteFn>, Option<QuoteFn>, Option<ReserveFn>)> = view
            .pools
            .par_iter()
            .map(|&pool_id| {
                let state = if let Some(pool) = v2.get(pool_id) {
                    PoolState::V2(pool.clone())
                } else if let Some(pool) = v3.get(pool_id) {
                    PoolState::V3(pool.clone())
                } else {
                    debug!(%pool_id, "pool referenced by graph but absent from stores");
                    return (None, None, None);
                };
                let (token0, token1) = match &state {
                    PoolState::V2(p) => (p.token0, p.token1),
                    PoolState::V3(p) => (p.token0, p.token1),
                };
                let quote = quote_fn_for(&state);
                let active = routable(token0, token1).then(|| quote.clone());
                (Some(quote), active, Some(reserve_fn_for(&state)))
            })
            .collect();

        let mut all_quotes = Vec::with_capacity(slots.len());
        let mut active_quotes = Vec::with_capacity(slots.len());
        let mut reserves = Vec::with_capacity(slots.len());
        for (all, active, reserve) in slots {
            all_quotes.push(all);
            active_quotes.push(active);
            reserves.push(reserve);
        }

        let vertex_of = view
            .tokens
            .iter()
            .enumerate()
            .map(|(i, &t)| (t, i))
            .collect();
        let slot_of = view
            .pools
            .iter()
            .enumerate()
            .map(|(i, &p)| (p, i))
            .collect();

        Self {
            view,
            vertex_of,
            slot_of,
            all_quotes,
            active_quotes,
            reserves,
        }
    }

    /// The graph view this engine was built over.
    pub fn view(&self) -> &TokenGraphView {
        &self.view
    }

    /// Quote one pool directly through its bound closure, bypassing routing.
    pub fn quote_pool(
        &self,
        pool: PoolId,
        token_in: TokenId,
        amount_in: U256,
    ) -> Option<Result<U256, CalcError>> {
        let slot = *self.slot_of.get(&pool)?;
        let quote = self.all_quotes.get(slot)?.as_ref()?;
        Some(quote(token_in, amount_in))
    }

    /// Copy-on-write of the active closure vector with `overrides` patched in.
    fn quotes_with_overrides(
        &self,
        overrides: Option<&HashMap<PoolId, PoolOverride>>,
    ) -> Vec<Option<QuoteFn>> {
        let mut quotes = self.active_quotes.clone();
        if let Some(overrides) = overrides {
            for (pool_id, replacement) in overrides {
                if let Some(&slot) = self.slot_of.get(pool_id) {
                    let state = match replacement {
                        PoolOverride::V2(pool) => PoolState::V2(pool.clone()),
                        PoolOverride::V3(pool) => PoolState::V3(pool.clone()),
                    };
                    quotes[slot] = Some(quote_fn_for(&state));
                }
            }
        }
        quotes
    }

    /// Best quote among the pools on `edge` for the given input. Ties keep the
    /// first pool encountered in the slot list.
    fn best_pool_on_edge(
        &self,
        quotes: &[Option<QuoteFn>],
        edge: usize,
        token_in: TokenId,
        amount_in: U256,
    ) -> Option<(U256, PoolId)> {
        let mut best: Option<(U256, PoolId)> = None;
        for &slot in &self.view.edge_pools[edge] {
            let Some(quote) = quotes.get(slot).and_then(|q| q.as_ref()) else {
                continue;
            };
            let Ok(amount_out) = quote(token_in, amount_in) else {
                continue; // a pool that cannot quote does not improve the edge
            };
            if amount_out.is_zero() {
                continue;
            }
            if best.map(|(current, _)| amount_out > current).unwrap_or(true) {
                best = Some((amount_out, self.view.pools[slot]));
            }
        }
        best
    }

    /// Pool on `edge` with the deepest output-side reserve, quoted alone.
    fn deepest_pool_on_edge(
        &self,
        quotes: &[Option<QuoteFn>],
        edge: usize,
        token_in: TokenId,
        amount_in: U256,
    ) -> Option<(U256, PoolId)> {
        let mut deepest: Option<(U256, usize)> = None;
        for &slot in &self.view.edge_pools[edge] {
            if quotes.get(slot).and_then(|q| q.as_ref()).is_none() {
                continue;
            }
            let Some(reserve) = self.reserves.get(slot).and_then(|r| r.as_ref()) else {
                continue;
            };
            let Ok((_, reserve_out)) = reserve(token_in) else {
                continue;
            };
            if deepest
                .map(|(current, _)| reserve_out > current)
                .unwrap_or(true)
            {
                deepest = Some((reserve_out, slot));
            }
        }
        let (_, slot) = deepest?;
        let quote = quotes.get(slot).and_then(|q| q.as_ref())?;
        let amount_out = quote(token_in, amount_in).ok()?;
        if amount_out.is_zero() {
            return None;
        }
        Some((amount_out, self.view.pools[slot]))
    }

    /// Best path from `token_in` to `token_out` among paths of length at most
    /// `runs`, and the amount it yields. Returns an empty quote when the
    /// target is unreachable.
    pub fn find_best_swap_path(
        &self,
        token_in: TokenId,
        token_out: TokenId,
        amount_in: U256,
        runs: usize,
        overrides: Option<&HashMap<PoolId, PoolOverride>>,
    ) -> Result<SwapQuote, EngineError> {
        if runs == 0 {
            return Err(EngineError::ZeroRuns);
        }
        let (Some(&start), Some(&end)) = (
            self.vertex_of.get(&token_in),
            self.vertex_of.get(&token_out),
        ) else {
            return Ok(SwapQuote::default());
        };
        if start == end {
            return Ok(SwapQuote {
                path: Vec::new(),
                amount_out: amount_in,
            });
        }

        let quotes = self.quotes_with_overrides(overrides);
        let n = self.view.tokens.len();
        let mut costs = vec![U256::zero(); n];
        let mut paths: Vec<Vec<SwapHop>> = vec![Vec::new(); n];
        let mut visited = vec![BitSet::with_capacity(n); n];
        costs[start] = amount_in;

        for _ in 0..runs {
            for v in 0..n {
                if costs[v].is_zero() {
                    continue;
                }
                if visited[v].contains(v) {
                    return Err(EngineError::CyclicPathState(v));
                }
                for &e in &self.view.adjacency[v] {
                    let target = self.view.edge_targets[e];
                    if target == v || visited[v].contains(target) {
                        continue;
                    }
                    let Some((amount_out, pool)) =
                        self.best_pool_on_edge(&quotes, e, self.view.tokens[v], costs[v])
                    else {
                        continue;
                    };
                    if amount_out > costs[target] {
                        costs[target] = amount_out;
                        let mut path = paths[v].clone();
                        path.push(SwapHop {
                            token_in: self.view.tokens[v],
                            token_out: self.view.tokens[target],
                            pool,
                        });
                        paths[target] = path;
                        let mut seen = visited[v].clone();
                        seen.insert(v);
                        visited[target] = seen;
                    }
                }
            }
        }

        if costs[end].is_zero() {
            return Ok(SwapQuote::default());
        }
        Ok(SwapQuote {
            path: std::mem::take(&mut paths[end]),
            amount_out: costs[end],
        })
    }

    /// King-of-the-hill cycle search from and back to `token`. At most one
    /// cycle per call; callers enumerate further cycles by re-invoking with
    /// overrides that neutralise the previous winner.
    pub fn find_arbitrage_cycles(
        &self,
        token: TokenId,
        amount_in: U256,
        runs: usize,
        overrides: Option<&HashMap<PoolId, PoolOverride>>,
    ) -> Result<CycleQuote, EngineError> {
        if runs == 0 {
            return Err(EngineError::ZeroRuns);
        }
        let Some(&start) = self.vertex_of.get(&token) else {
            return Ok(CycleQuote::default());
        };

        let quotes = self.quotes_with_overrides(overrides);
        let n = self.view.tokens.len();
        let mut costs = vec![U256::zero(); n];
        let mut paths: Vec<Vec<SwapHop>> = vec![Vec::new(); n];
        let mut visited = vec![BitSet::with_capacity(n); n];
        costs[start] = amount_in;
        let mut best = CycleQuote::default();

        for _ in 0..runs {
            for v in 0..n {
                if costs[v].is_zero() {
                    continue;
                }
                if visited[v].contains(v) {
                    return Err(EngineError::CyclicPathState(v));
                }
                for &e in &self.view.adjacency[v] {
                    let target = self.view.edge_targets[e];
                    if target == start {
                        if v == start {
                            continue;
                        }
                        // closing transition: race against the best cycle, not
                        // the start vertex's running cost
                        let Some((amount_out, pool)) =
                            self.best_pool_on_edge(&quotes, e, self.view.tokens[v], costs[v])
                        else {
                            continue;
                        };
                        if amount_out > best.amount_out {
                            let mut cycle = paths[v].clone();
                            cycle.push(SwapHop {
                                token_in: self.view.tokens[v],
                                token_out: self.view.tokens[target],
                                pool,
                            });
                            best = CycleQuote {
                                cycle,
                                amount_out,
                            };
                        }
                        continue;
                    }
                    if target == v || visited[v].contains(target) {
                        continue;
                    }
                    let Some((amount_out, pool)) =
                        self.best_pool_on_edge(&quotes, e, self.view.tokens[v], costs[v])
                    else {
                        continue;
                    };
                    if amount_out > costs[target] {
                        costs[target] = amount_out;
                        let mut path = paths[v].clone();
                        path.push(SwapHop {
                            token_in: self.view.tokens[v],
                            token_out: self.view.tokens[target],
                            pool,
                        });
                        paths[target] = path;
                        let mut seen = visited[v].clone();
                        seen.insert(v);
                        visited[target] = seen;
                    }
                }
            }
        }

        Ok(best)
    }

    /// Propagates `amount_in` of `base` outward and reports the best known
    /// amount per reachable token, selecting the best-quoting pool on each
    /// edge. The result always maps `base` to exactly `amount_in`.
    ///
    /// When `allowed_sources` is given, only those tokens (and the base) may
    /// propagate their amount onward.
    pub fn get_exchange_rates(
        &self,
        base: TokenId,
        amount_in: U256,
        runs: usize,
        allowed_sources: Option<&HashSet<TokenId>>,
    ) -> Result<HashMap<TokenId, U256>, EngineError> {
        self.exchange_rates_core(
            base,
            amount_in,
            runs,
            allowed_sources,
            EdgeSelection::MaxAmountOut,
        )
    }

    /// Like [`get_exchange_rates`](Self::get_exchange_rates) but selects the
    /// pool with the deepest output-side reserve on each edge instead of the
    /// best quote.
    pub fn get_exchange_rates_by_reserve(
        &self,
        base: TokenId,
        amount_in: U256,
        runs: usize,
        allowed_sources: Option<&HashSet<TokenId>>,
    ) -> Result<HashMap<TokenId, U256>, EngineError> {
        self.exchange_rates_core(
            base,
            amount_in,
            runs,
            allowed_sources,
            EdgeSelection::MaxReserve,
        )
    }

    fn exchange_rates_core(
        &self,
        base: TokenId,
        amount_in: U256,
        runs: usize,
        allowed_sources: Option<&HashSet<TokenId>>,
        selection: EdgeSelection,
    ) -> Result<HashMap<TokenId, U256>, EngineError> {
        if runs == 0 {
            return Err(EngineError::ZeroRuns);
        }
        let mut rates = HashMap::new();
        let Some(&start) = self.vertex_of.get(&base) else {
            rates.insert(base, amount_in);
            return Ok(rates);
        };

        let n = self.view.tokens.len();
        let mut costs = vec![U256::zero(); n];
        let mut visited = vec![BitSet::with_capacity(n); n];
        costs[start] = amount_in;

        for _ in 0..runs {
            for v in 0..n {
                if costs[v].is_zero() {
                    continue;
                }
                if let Some(allowed) = allowed_sources {
                    if v != start && !allowed.contains(&self.view.tokens[v]) {
                        continue;
                    }
                }
                if visited[v].contains(v) {
                    return Err(EngineError::CyclicPathState(v));
                }
                for &e in &self.view.adjacency[v] {
                    let target = self.view.edge_targets[e];
                    if target == v || visited[v].contains(target) || target == start {
                        continue;
                    }
                    let picked = match selection {
                        EdgeSelection::MaxAmountOut => self.best_pool_on_edge(
                            &self.active_quotes,
                            e,
                            self.view.tokens[v],
                            costs[v],
                        ),
                        EdgeSelection::MaxReserve => self.deepest_pool_on_edge(
                            &self.active_quotes,
                            e,
                            self.view.tokens[v],
                            costs[v],
                        ),
                    };
                    let Some((amount_out, _)) = picked else {
                        continue;
                    };
                    if amount_out > costs[target] {
                        costs[target] = amount_out;
                        let mut seen = visited[v].clone();
                        seen.insert(v);
                        visited[target] = seen;
                    }
                }
            }
        }

        for (v, cost) in costs.iter().enumerate() {
            if !cost.is_zero() {
                rates.insert(self.view.tokens[v], *cost);
            }
        }
        rates.insert(base, amount_in);
        Ok(rates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token_graph::GraphRegistry;
    use crate::types::Token;

    const A: TokenId = TokenId(1);
    const B: TokenId = TokenId(2);
    const C: TokenId = TokenId(3);

    fn token(id: TokenId, fee_on_transfer: f64) -> Token {
        Token {
            id,
            address: [0u8; 20],
            symbol: format!("T{}", id.0),
            name: format!("Token {}", id.0),
            decimals: 18,
            fee_on_transfer_percent: fee_on_transfer,
        }
    }

    fn v2(id: u64, token0: TokenId, token1: TokenId, r0: u64, r1: u64) -> V2Pool {
        V2Pool {
            id: PoolId(id),
            token0,
            token1,
            reserve0: U256::from(r0) * U256::exp10(18),
            reserve1: U256::from(r1) * U256::exp10(18),
            pool_type: 0,
            fee_bps: 30,
        }
    }

    fn engine_for(
        pools: Vec<V2Pool>,
        tokens: Vec<Token>,
        policy: ActivePoolPolicy,
    ) -> RouteEngine {
        let graph = GraphRegistry::new(64);
        for pool in &pools {
            graph.add_pool(&[pool.token0, pool.token1], pool.id);
        }
        RouteEngine::new(
            graph.view(),
            &TokenIndex::from_tokens(tokens),
            &V2PoolIndex::from_pools(pools),
            &V3PoolIndex::from_pools(Vec::new()),
            policy,
        )
    }

    fn plain_tokens() -> Vec<Token> {
        vec![token(A, 0.0), token(B, 0.0), token(C, 0.0)]
    }

    #[test]
    fn direct_hop_beats_nothing() {
        let pool = v2(100, A, B, 1_000, 1_000);
        let engine = engine_for(vec![pool.clone()], plain_tokens(), ActivePoolPolicy::All);
        let amount_in = U256::exp10(18);
        let quote = engine
            .find_best_swap_path(A, B, amount_in, 3, None)
            .unwrap();
        let expected = v2_math::get_amount_out(amount_in, A, B, &pool).unwrap();
        assert_eq!(quote.amount_out, expected);
        assert_eq!(
            quote.path,
            vec![SwapHop {
                token_in: A,
                token_out: B,
                pool: PoolId(100)
            }]
        );
    }

    #[test]
    fn picks_the_better_pool_on_a_shared_edge() {
        let thin = v2(100, A, B, 1_000, 1_000);
        let deep = v2(101, A, B, 1_000, 2_000);
        let engine = engine_for(
            vec![thin.clone(), deep.clone()],
            plain_tokens(),
            ActivePoolPolicy::All,
        );
        let amount_in = U256::exp10(18);
        let quote = engine
            .find_best_swap_path(A, B, amount_in, 2, None)
            .unwrap();
        assert_eq!(quote.path[0].pool, PoolId(101));
        assert_eq!(
            quote.amount_out,
            v2_math::get_amount_out(amount_in, A, B, &deep).unwrap()
        );
    }

    #[test]
    fn routes_through_an_intermediate_token() {
        // A->B->C is the only route from A to C
        let ab = v2(100, A, B, 1_000, 1_000);
        let bc = v2(101, B, C, 1_000, 1_000);
        let engine = engine_for(
            vec![ab.clone(), bc.clone()],
            plain_tokens(),
            ActivePoolPolicy::All,
        );
        let amount_in = U256::exp10(18);
        let quote = engine
            .find_best_swap_path(A, C, amount_in, 3, None)
            .unwrap();
        let mid = v2_math::get_amount_out(amount_in, A, B, &ab).unwrap();
        let expected = v2_math::get_amount_out(mid, B, C, &bc).unwrap();
        assert_eq!(quote.amount_out, expected);
        assert_eq!(quote.path.len(), 2);
    }

    #[test]
    fn unreachable_target_yields_empty_quote() {
        let engine = engine_for(
            vec![v2(100, A, B, 1_000, 1_000)],
            plain_tokens(),
            ActivePoolPolicy::All,
        );
        let quote = engine
            .find_best_swap_path(A, C, U256::exp10(18), 4, None)
            .unwrap();
        assert!(quote.path.is_empty());
        assert!(quote.amount_out.is_zero());
    }

    #[test]
    fn zero_runs_is_an_error() {
        let engine = engine_for(
            vec![v2(100, A, B, 1_000, 1_000)],
            plain_tokens(),
            ActivePoolPolicy::All,
        );
        assert_eq!(
            engine
                .find_best_swap_path(A, B, U256::one(), 0, None)
                .unwrap_err(),
            EngineError::ZeroRuns
        );
    }

    #[test]
    fn overrides_do_not_leak_between_queries() {
        let pool = v2(100, A, B, 1_000, 1_000);
        let engine = engine_for(vec![pool.clone()], plain_tokens(), ActivePoolPolicy::All);
        let amount_in = U256::exp10(18);
        let baseline = engine
            .find_best_swap_path(A, B, amount_in, 2, None)
            .unwrap();

        // drain the pool in the override
        let mut drained = pool.clone();
        drained.reserve1 = U256::from(1u8);
        let overrides = HashMap::from([(PoolId(100), PoolOverride::V2(drained))]);
        let overridden = engine
            .find_best_swap_path(A, B, amount_in, 2, Some(&overrides))
            .unwrap();
        assert!(overridden.amount_out < baseline.amount_out);

        // the engine itself is untouched
        let again = engine
            .find_best_swap_path(A, B, amount_in, 2, None)
            .unwrap();
        assert_eq!(again.amount_out, baseline.amount_out);
    }

    #[test]
    fn arbitrage_cycle_is_found_and_neutralizable() {
        // B/C pool is skewed, so A->B->C->A turns a profit
        let ab = v2(100, A, B, 1_000, 1_000);
        let bc = v2(101, B, C, 1_000, 2_000);
        let ca = v2(102, C, A, 1_000, 1_000);
        let engine = engine_for(
            vec![ab, bc.clone(), ca],
            plain_tokens(),
            ActivePoolPolicy::All,
        );
        let amount_in = U256::exp10(18);
        let found = engine
            .find_arbitrage_cycles(A, amount_in, 4, None)
            .unwrap();
        assert_eq!(found.cycle.len(), 3);
        assert!(found.amount_out > amount_in, "cycle is profitable");
        assert_eq!(found.cycle.first().unwrap().token_in, A);
        assert_eq!(found.cycle.last().unwrap().token_out, A);

        // neutralise the skewed pool and the edge stops paying
        let mut level = bc.clone();
        level.reserve1 = level.reserve0;
        let overrides = HashMap::from([(PoolId(101), PoolOverride::V2(level))]);
        let second = engine
            .find_arbitrage_cycles(A, amount_in, 4, Some(&overrides))
            .unwrap();
        assert!(second.amount_out < found.amount_out);
    }

    #[test]
    fn exchange_rates_always_contain_the_base() {
        let engine = engine_for(
            vec![v2(100, A, B, 1_000, 1_000), v2(101, B, C, 1_000, 1_000)],
            plain_tokens(),
            ActivePoolPolicy::All,
        );
        let amount_in = U256::exp10(18);
        let rates = engine.get_exchange_rates(A, amount_in, 3, None).unwrap();
        assert_eq!(rates[&A], amount_in);
        assert!(rates[&B] > U256::zero());
        assert!(rates[&C] > U256::zero());

        let by_reserve = engine
            .get_exchange_rates_by_reserve(A, amount_in, 3, None)
            .unwrap();
        assert_eq!(by_reserve[&A], amount_in);
        assert_eq!(by_reserve[&B], rates[&B], "single pool per edge here");
    }

    #[test]
    fn allowed_sources_limit_propagation() {
        let engine = engine_for(
            vec![v2(100, A, B, 1_000, 1_000), v2(101, B, C, 1_000, 1_000)],
            plain_tokens(),
            ActivePoolPolicy::All,
        );
        // B may not propagate, so C never receives a rate
        let allowed = HashSet::from([A]);
        let rates = engine
            .get_exchange_rates(A, U256::exp10(18), 3, Some(&allowed))
            .unwrap();
        assert!(rates.contains_key(&B));
        assert!(!rates.contains_key(&C));
    }

    #[test]
    fn fee_on_transfer_pools_are_inactive_under_routable_policy() {
        let tokens = vec![token(A, 0.0), token(B, 1.5), token(C, 0.0)];
        let pools = vec![v2(100, A, B, 1_000, 1_000)];
        let strict = engine_for(pools.clone(), tokens.clone(), ActivePoolPolicy::Routable);
        let quote = strict
            .find_best_swap_path(A, B, U256::exp10(18), 2, None)
            .unwrap();
        assert!(quote.amount_out.is_zero(), "calculator omitted");

        let permissive = engine_for(pools, tokens, ActivePoolPolicy::All);
        let quote = permissive
            .find_best_swap_path(A, B, U256::exp10(18), 2, None)
            .unwrap();
        assert!(quote.amount_out > U256::zero());
    }
}
