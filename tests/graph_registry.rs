//! Integration tests for the token-pool graph registry: batched mutation,
//! dangling-edge compaction, and snapshot isolation, including a randomized
//! equivalence check between compacted and uncompacted registries.

use defistate_client::token_graph::GraphRegistry;
use defistate_client::types::{PoolId, TokenId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn t(id: u64) -> TokenId {
    TokenId(id)
}
fn p(id: u64) -> PoolId {
    PoolId(id)
}

#[test]
fn batched_adds_and_removes() {
    let graph = GraphRegistry::new(1024);
    graph.add_pools(&[
        (p(101), vec![t(10), t(20)]),
        (p(102), vec![t(10), t(30)]),
        (p(103), vec![t(10), t(20)]),
    ]);

    let view = graph.view();
    assert_eq!(view.pools_for_token(t(10)), vec![p(101), p(102), p(103)]);
    assert_eq!(view.pools_for_token(t(20)), vec![p(101), p(103)]);
    assert_eq!(view.pools_for_token(t(30)), vec![p(102)]);

    graph.remove_pools(&[p(101), p(102)]);
    let view = graph.view();
    assert_eq!(view.pools_for_token(t(10)), vec![p(103)]);
    assert_eq!(view.pools_for_token(t(20)), vec![p(103)]);
    assert!(view.pools_for_token(t(30)).is_empty());
}

#[test]
fn views_survive_later_mutations() {
    let graph = GraphRegistry::new(1024);
    graph.add_pools(&[(p(101), vec![t(10), t(20)]), (p(102), vec![t(20), t(30)])]);
    let before = graph.view();

    graph.remove_pool(p(101));
    graph.compact();

    // the old view still answers with the old world
    assert_eq!(before.pools_for_token(t(10)), vec![p(101)]);
    assert!(before.is_well_formed());
    // and the fresh one reflects the removal plus the compaction rewrite
    let after = graph.view();
    assert!(after.pools_for_token(t(10)).is_empty());
    assert!(after.is_well_formed());
}

/// Drives two registries through the same random operation sequence, one with
/// compaction effectively disabled and one compacting aggressively, and checks
/// they always answer queries identically.
#[test]
fn aggressive_compaction_never_changes_answers() {
    let mut rng = StdRng::seed_from_u64(0xD1F7);
    let lazy = GraphRegistry::new(usize::MAX);
    let eager = GraphRegistry::new(0);

    let tokens: Vec<TokenId> = (1..=12).map(t).collect();
    let mut live_pools: Vec<PoolId> = Vec::new();
    let mut next_pool = 1_000u64;

    for _ in 0..400 {
        if live_pools.is_empty() || rng.gen_bool(0.6) {
            let a = tokens[rng.gen_range(0..tokens.len())];
            let mut b = tokens[rng.gen_range(0..tokens.len())];
            while b == a {
                b = tokens[rng.gen_range(0..tokens.len())];
            }
            let pool = p(next_pool);
            next_pool += 1;
            lazy.add_pool(&[a, b], pool);
            eager.add_pool(&[a, b], pool);
            live_pools.push(pool);
        } else {
            let pool = live_pools.swap_remove(rng.gen_range(0..live_pools.len()));
            lazy.remove_pool(pool);
            eager.remove_pool(pool);
        }

        for token in &tokens {
            assert_eq!(
                lazy.view().pools_for_token(*token),
                eager.view().pools_for_token(*token),
                "divergence at token {token}"
            );
        }
        assert!(eager.view().is_well_formed());
        assert_eq!(eager.dangling_edges(), 0, "eager registry always compacts");
    }
    assert!(lazy.view().is_well_formed());
}

#[test]
fn concurrent_readers_see_consistent_views() {
    use std::sync::Arc;
    use std::thread;

    let graph = Arc::new(GraphRegistry::new(4));
    let writer = {
        let graph = Arc::clone(&graph);
        thread::spawn(move || {
            for i in 0..200u64 {
                graph.add_pool(&[t(i % 7), t((i + 1) % 7)], p(i));
                if i % 3 == 0 {
                    graph.remove_pool(p(i / 2));
                }
            }
        })
    };
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let graph = Arc::clone(&graph);
            thread::spawn(move || {
                for _ in 0..500 {
                    let view = graph.view();
                    assert!(view.is_well_formed());
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
}
