//! # Token-pool graph registry
//!
//! Maintains the bipartite liquidity topology: token vertices connected by
//! directed edge pairs, each edge carrying the pool slots that provide
//! liquidity between its endpoints. The registry is mutated under an exclusive
//! guard; readers take lock-free deep-copied snapshots through an atomically
//! swapped view pointer.
//!
//! ## Index graphs, not pointer graphs
//!
//! All adjacency uses dense integer indices. Removals leave dangling edges
//! (empty pool lists) behind; once their count exceeds the compaction
//! threshold the whole structure is rebuilt in place and the index space is
//! rewritten. Indices obtained from a view are only valid for that view.

use std::collections::HashMap;
use std::sync::Mutex;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::metrics;
use crate::types::{PoolId, TokenId};

/// Immutable projection of the graph.
///
/// `tokens[i]` is the token at vertex `i`, `pools[j]` the pool at slot `j`.
/// `adjacency[v]` lists edge indices outgoing from `v`; for each edge `e`,
/// `edge_targets[e]` is the target vertex and `edge_pools[e]` the pool slots
/// providing liquidity on it. The graph is logically undirected and stored as
/// two directed edges per connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGraphView {
    pub tokens: Vec<TokenId>,
    pub pools: Vec<PoolId>,
    pub adjacency: Vec<Vec<usize>>,
    pub edge_targets: Vec<usize>,
    pub edge_pools: Vec<Vec<usize>>,
}

impl TokenGraphView {
    /// Vertex index of `token`, if present.
    pub fn vertex_of(&self, token: TokenId) -> Option<usize> {
        self.tokens.iter().position(|t| *t == token)
    }

    /// Slot index of `pool`, if present.
    pub fn slot_of(&self, pool: PoolId) -> Option<usize> {
        self.pools.iter().position(|p| *p == pool)
    }

    /// All pools reachable from `token` over its outgoing edges, sorted and
    /// deduplicated.
    pub fn pools_for_token(&self, token: TokenId) -> Vec<PoolId> {
        let Some(v) = self.vertex_of(token) else {
            return Vec::new();
        };
        let mut out: Vec<PoolId> = self.adjacency[v]
            .iter()
            .flat_map(|&e| self.edge_pools[e].iter().map(|&slot| self.pools[slot]))
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Structural sanity check: every stored index is in range and the edge
    /// arrays agree in length.
    pub fn is_well_formed(&self) -> bool {
        if self.edge_targets.len() != self.edge_pools.len()
            || self.tokens.len() != self.adjacency.len()
        {
            return false;
        }
        let (nv, ne, np) = (self.tokens.len(), self.edge_targets.len(), self.pools.len());
        self.adjacency.iter().flatten().all(|&e| e < ne)
            && self.edge_targets.iter().all(|&t| t < nv)
            && self.edge_pools.iter().flatten().all(|&p| p < np)
    }
}

/// The mutable graph core. Single-threaded; [`GraphRegistry`] provides the
/// concurrency discipline.
#[derive(Debug)]
struct TokenPoolGraph {
    tokens: Vec<TokenId>,
    token_slots: HashMap<TokenId, usize>,
    pools: Vec<PoolId>,
    pool_slots: HashMap<PoolId, usize>,
    adjacency: Vec<Vec<usize>>,
    edge_targets: Vec<usize>,
    edge_pools: Vec<Vec<usize>>,
    dangling_edges: usize,
    compaction_threshold: usize,
}

impl TokenPoolGraph {
    fn new(compaction_threshold: usize) -> Self {
        Self {
            tokens: Vec::new(),
            token_slots: HashMap::new(),
            pools: Vec::new(),
            pool_slots: HashMap::new(),
            adjacency: Vec::new(),
            edge_targets: Vec::new(),
            edge_pools: Vec::new(),
            dangling_edges: 0,
            compaction_threshold,
        }
    }

    fn ensure_vertex(&mut self, token: TokenId) -> usize {
        if let Some(&v) = self.token_slots.get(&token) {
            return v;
        }
        let v = self.tokens.len();
        self.tokens.push(token);
        self.adjacency.push(Vec::new());
        self.token_slots.insert(token, v);
        v
    }

    fn ensure_pool_slot(&mut self, pool: PoolId) -> usize {
        if let Some(&slot) = self.pool_slots.get(&pool) {
            return slot;
        }
        let slot = self.pools.len();
        self.pools.push(pool);
        self.pool_slots.insert(pool, slot);
        slot
    }

    /// Finds or creates the directed edge `from -> to`. Returns the edge index
    /// and whether it was just created.
    fn ensure_edge(&mut self, from: usize, to: usize) -> (usize, bool) {
        if let Some(&e) = self.adjacency[from]
            .iter()
            .find(|&&e| self.edge_targets[e] == to)
        {
            return (e, false);
        }
        let e = self.edge_targets.len();
        self.edge_targets.push(to);
        self.edge_pools.push(Vec::new());
        self.adjacency[from].push(e);
        (e, true)
    }

    fn attach_pool(&mut self, from: usize, to: usize, slot: usize) {
        let (e, created) = self.ensure_edge(from, to);
        let list = &mut self.edge_pools[e];
        if !list.contains(&slot) {
            if !created && list.is_empty() {
                // the edge was dangling and is live again
                self.dangling_edges = self.dangling_edges.saturating_sub(1);
            }
            list.push(slot);
        }
    }

    /// Connects every unordered pair of `token_ids` (a clique for pools with
    /// more than two tokens) and records `pool` on each resulting edge pair.
    /// Idempotent.
    fn add_pool(&mut self, token_ids: &[TokenId], pool: PoolId) {
        if token_ids.len() < 2 {
            return;
        }
        let slot = self.ensure_pool_slot(pool);
        for i in 0..token_ids.len() {
            for j in (i + 1)..token_ids.len() {
                if token_ids[i] == token_ids[j] {
                    continue;
                }
                let a = self.ensure_vertex(token_ids[i]);
                let b = self.ensure_vertex(token_ids[j]);
                self.attach_pool(a, b, slot);
                self.attach_pool(b, a, slot);
            }
        }
    }

    fn remove_pool(&mut self, pool: PoolId) {
        let Some(&slot) = self.pool_slots.get(&pool) else {
            return;
        };
        for list in self.edge_pools.iter_mut() {
            if let Some(pos) = list.iter().position(|&p| p == slot) {
                list.swap_remove(pos);
                if list.is_empty() {
                    self.dangling_edges += 1;
                }
            }
        }
        self.maybe_compact();
    }

    fn remove_token(&mut self, token: TokenId) {
        let Some(&v) = self.token_slots.get(&token) else {
            return;
        };
        // outgoing edges: detach from the vertex and mark dangling
        let outgoing = std::mem::take(&mut self.adjacency[v]);
        for e in outgoing {
            if !self.edge_pools[e].is_empty() {
                self.edge_pools[e].clear();
                self.dangling_edges += 1;
            }
        }
        // incoming edges: clear their pool lists in place
        for edges in self.adjacency.iter() {
            for &e in edges {
                if self.edge_targets[e] == v && !self.edge_pools[e].is_empty() {
                    self.edge_pools[e].clear();
                    self.dangling_edges += 1;
                }
            }
        }
        self.maybe_compact();
    }

    fn maybe_compact(&mut self) {
        if self.dangling_edges > self.compaction_threshold {
            self.compact();
        }
    }

    /// Rebuilds the structure in place, dropping dangling edges and any
    /// vertices or pool slots no live edge references.
    fn compact(&mut self) {
        // 1. live edges, old -> new
        let mut edge_map: Vec<Option<usize>> = vec![None; self.edge_targets.len()];
        let mut live_edges = Vec::new();
        for (e, list) in self.edge_pools.iter().enumerate() {
            if !list.is_empty() {
                edge_map[e] = Some(live_edges.len());
                live_edges.push(e);
            }
        }
        // 2. tokens and pools still referenced by live edges
        let mut token_live = vec![false; self.tokens.len()];
        let mut pool_live = vec![false; self.pools.len()];
        for (v, edges) in self.adjacency.iter().enumerate() {
            for &e in edges {
                if edge_map[e].is_some() {
                    token_live[v] = true;
                    token_live[self.edge_targets[e]] = true;
                    for &slot in &self.edge_pools[e] {
                        pool_live[slot] = true;
                    }
                }
            }
        }
        // 3. new token/pool vectors with old -> new index maps
        let mut token_map = vec![usize::MAX; self.tokens.len()];
        let mut new_tokens = Vec::new();
        for (v, live) in token_live.iter().enumerate() {
            if *live {
                token_map[v] = new_tokens.len();
                new_tokens.push(self.tokens[v]);
            }
        }
        let mut pool_map = vec![usize::MAX; self.pools.len()];
        let mut new_pools = Vec::new();
        for (slot, live) in pool_live.iter().enumerate() {
            if *live {
                pool_map[slot] = new_pools.len();
                new_pools.push(self.pools[slot]);
            }
        }
        // 4. remap the live-edge arrays
        let mut new_targets = Vec::with_capacity(live_edges.len());
        let mut new_edge_pools = Vec::with_capacity(live_edges.len());
        for &e in &live_edges {
            new_targets.push(token_map[self.edge_targets[e]]);
            new_edge_pools.push(
                self.edge_pools[e]
                    .iter()
                    .map(|&slot| pool_map[slot])
                    .collect::<Vec<_>>(),
            );
        }
        // 5. rebuild adjacency over the new vertex space
        let mut new_adjacency = vec![Vec::new(); new_tokens.len()];
        for (v, edges) in self.adjacency.iter().enumerate() {
            if token_map[v] == usize::MAX {
                continue;
            }
            for &e in edges {
                if let Some(ne) = edge_map[e] {
                    new_adjacency[token_map[v]].push(ne);
                }
            }
        }

        debug!(
            dropped_edges = self.edge_targets.len() - live_edges.len(),
            dropped_tokens = self.tokens.len() - new_tokens.len(),
            dropped_pools = self.pools.len() - new_pools.len(),
            "compacted token-pool graph"
        );
        metrics::inc_graph_compactions();

        self.token_slots = new_tokens
            .iter()
            .enumerate()
            .map(|(i, &t)| (t, i))
            .collect();
        self.pool_slots = new_pools
            .iter()
            .enumerate()
            .map(|(i, &p)| (p, i))
            .collect();
        self.tokens = new_tokens;
        self.pools = new_pools;
        self.adjacency = new_adjacency;
        self.edge_targets = new_targets;
        self.edge_pools = new_edge_pools;
        self.dangling_edges = 0;
    }

    fn to_view(&self) -> TokenGraphView {
        TokenGraphView {
            tokens: self.tokens.clone(),
            pools: self.pools.clone(),
            adjacency: self.adjacency.clone(),
            edge_targets: self.edge_targets.clone(),
            edge_pools: self.edge_pools.clone(),
        }
    }
}

/// Concurrency wrapper around the graph core.
///
/// Mutations serialize on an exclusive guard and refresh the cached view once
/// per call (or once per batch for the batch variants). [`view`] is lock-free:
/// it loads the cached pointer atomically and hands the caller a deep copy it
/// may hold and traverse while further mutations proceed.
///
/// [`view`]: GraphRegistry::view
#[derive(Debug)]
pub struct GraphRegistry {
    inner: Mutex<TokenPoolGraph>,
    cached: ArcSwap<TokenGraphView>,
}

impl GraphRegistry {
    pub fn new(compaction_threshold: usize) -> Self {
        Self {
            inner: Mutex::new(TokenPoolGraph::new(compaction_threshold)),
            cached: ArcSwap::from_pointee(TokenGraphView::default()),
        }
    }

    fn with_graph<R>(&self, f: impl FnOnce(&mut TokenPoolGraph) -> R) -> R {
        let mut graph = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let out = f(&mut graph);
        self.cached.store(Arc::new(graph.to_view()));
        out
    }

    /// Registers `pool` as liquidity between every pair of `token_ids`.
    pub fn add_pool(&self, token_ids: &[TokenId], pool: PoolId) {
        self.with_graph(|g| g.add_pool(token_ids, pool));
    }

    /// Batch insert; the cached view is refreshed once at the end.
    pub fn add_pools(&self, batch: &[(PoolId, Vec<TokenId>)]) {
        self.with_graph(|g| {
            for (pool, tokens) in batch {
                g.add_pool(tokens, *pool);
            }
        });
    }

    pub fn remove_pool(&self, pool: PoolId) {
        self.with_graph(|g| g.remove_pool(pool));
    }

    /// Batch removal; the cached view is refreshed once at the end.
    pub fn remove_pools(&self, pools: &[PoolId]) {
        self.with_graph(|g| {
            for pool in pools {
                g.remove_pool(*pool);
            }
        });
    }

    pub fn remove_token(&self, token: TokenId) {
        self.with_graph(|g| g.remove_token(token));
    }

    pub fn remove_tokens(&self, tokens: &[TokenId]) {
        self.with_graph(|g| {
            for token in tokens {
                g.remove_token(*token);
            }
        });
    }

    /// Forces an immediate compaction regardless of the dangling-edge count.
    pub fn compact(&self) {
        self.with_graph(|g| g.compact());
    }

    /// Deep copy of the cached view. Lock-free.
    pub fn view(&self) -> TokenGraphView {
        (**self.cached.load()).clone()
    }

    /// Current dangling-edge count (edges whose pool list is empty).
    pub fn dangling_edges(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .dangling_edges
    }
}
