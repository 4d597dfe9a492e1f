//! # Concentrated-liquidity AMM math
//!
//! Swap simulation over tick-range liquidity. The pool's sorted tick list
//! stands in for the on-chain tick bitmap: the next initialized tick in the
//! travel direction is found by binary search, and each step runs the
//! constant-liquidity swap math of [`swap_step`] until the requested amount is
//! exhausted or the price limit is reached.
//!
//! The sign of the specified amount selects the mode: positive swaps an exact
//! input, negative requests an exact output.

/// Word-level bit search helpers.
pub mod bit_math;
/// Checked signed liquidity application.
pub mod liquidity_math;
/// Amount deltas and next-price derivations.
pub mod sqrt_price_math;
/// Single-tick-region swap math.
pub mod swap_step;
/// Tick <-> sqrt-price conversions.
pub mod tick_math;

use ethers::types::{I256, U256};

use crate::errors::CalcError;
use crate::types::{TickInfo, TokenId, V3Pool};

use swap_step::compute_swap_step;
use tick_math::{
    get_sqrt_ratio_at_tick, get_tick_at_sqrt_ratio, MAX_SQRT_RATIO, MAX_TICK, MIN_SQRT_RATIO,
    MIN_TICK,
};

/// Outcome of a simulated swap: the counter-amount (output for exact-in, input
/// for exact-out) and the pool as it would look afterwards. The returned pool
/// shares the read-only tick list with the input by reference.
#[derive(Debug, Clone)]
pub struct SwapSimulation {
    pub amount: U256,
    pub pool: V3Pool,
}

fn i256_from_u256(value: U256) -> Result<I256, CalcError> {
    I256::try_from(value).map_err(|_| CalcError::InvalidAmount)
}

/// Next initialized tick strictly in the travel direction, or the range bound
/// when none remains. `lte` (price moving down) searches at-or-below `tick`,
/// otherwise strictly above.
fn next_initialized_tick(ticks: &[TickInfo], tick: i32, lte: bool) -> (i32, bool) {
    let partition = ticks.partition_point(|t| t.index <= tick);
    if lte {
        if partition == 0 {
            (MIN_TICK, false)
        } else {
            (ticks[partition - 1].index, true)
        }
    } else if partition == ticks.len() {
        (MAX_TICK, false)
    } else {
        (ticks[partition].index, true)
    }
}

fn liquidity_net_at(ticks: &[TickInfo], tick: i32) -> i128 {
    ticks
        .binary_search_by_key(&tick, |t| t.index)
        .map(|i| ticks[i].liquidity_net)
        .unwrap_or(0)
}

/// Simulates a swap of `token_in` against the pool.
///
/// `amount_specified` is exact-in when positive, exact-out when negative.
/// `sqrt_price_limit_x96` defaults to the minimum (price falling) or maximum
/// (price rising) allowable square-root price.
///
/// The input pool is never mutated. Liquidity underflow while crossing a tick
/// ends the walk cleanly with the best-effort state; liquidity overflow is an
/// error.
pub fn simulate_swap(
    pool: &V3Pool,
    token_in: TokenId,
    amount_specified: I256,
    sqrt_price_limit_x96: Option<U256>,
) -> Result<SwapSimulation, CalcError> {
    let zero_for_one = if token_in == pool.token0 {
        true
    } else if token_in == pool.token1 {
        false
    } else {
        return Err(CalcError::TokenMismatch {
            token: token_in,
            pool: pool.id,
        });
    };
    if amount_specified.is_zero() {
        return Err(CalcError::InvalidAmount);
    }
    let limit = sqrt_price_limit_x96.unwrap_or(if zero_for_one {
        MIN_SQRT_RATIO + U256::one()
    } else {
        MAX_SQRT_RATIO - U256::one()
    });
    if zero_for_one {
        if limit >= pool.sqrt_price_x96 || limit <= MIN_SQRT_RATIO {
            return Err(CalcError::SqrtPriceOutOfBounds);
        }
    } else if limit <= pool.sqrt_price_x96 || limit >= MAX_SQRT_RATIO {
        return Err(CalcError::SqrtPriceOutOfBounds);
    }

    let exact_in = !amount_specified.is_negative();
    let mut remaining = amount_specified;
    let mut calculated = I256::zero();
    let mut sqrt_price = pool.sqrt_price_x96;
    let mut tick = pool.tick;
    let mut liquidity = pool.liquidity;

    while !remaining.is_zero() && sqrt_price != limit {
        let sqrt_price_start = sqrt_price;
        let (tick_next, initialized) = next_initialized_tick(&pool.ticks, tick, zero_for_one);
        let tick_next = tick_next.clamp(MIN_TICK, MAX_TICK);
        let sqrt_price_next = get_sqrt_ratio_at_tick(tick_next)?;
        let target = if zero_for_one {
            sqrt_price_next.max(limit)
        } else {
            sqrt_price_next.min(limit)
        };

        let step = compute_swap_step(sqrt_price, target, liquidity, remaining, pool.fee_ppm)?;
        sqrt_price = step.sqrt_price_next_x96;

        if exact_in {
            remaining = remaining
                .checked_sub(i256_from_u256(step.amount_in + step.fee_amount)?)
                .ok_or(CalcError::InvalidAmount)?;
            calculated = calculated
                .checked_sub(i256_from_u256(step.amount_out)?)
                .ok_or(CalcError::InvalidAmount)?;
        } else {
            remaining = remaining
                .checked_add(i256_from_u256(step.amount_out)?)
                .ok_or(CalcError::InvalidAmount)?;
            calculated = calculated
                .checked_add(i256_from_u256(step.amount_in + step.fee_amount)?)
                .ok_or(CalcError::InvalidAmount)?;
        }

        if sqrt_price == sqrt_price_next {
            if initialized {
                let net = liquidity_net_at(&pool.ticks, tick_next);
                let net = if zero_for_one {
                    net.checked_neg().ok_or(CalcError::LiquidityOverflow)?
                } else {
                    net
                };
                match liquidity_math::add_delta(liquidity, net) {
                    Ok(next_liquidity) => liquidity = next_liquidity,
                    // crossing below the last provider: stop with what we have
                    Err(CalcError::LiquidityUnderflow) => break,
                    Err(other) => return Err(other),
                }
            }
            tick = if zero_for_one { tick_next - 1 } else { tick_next };
        } else if sqrt_price != sqrt_price_start {
            tick = get_tick_at_sqrt_ratio(sqrt_price)?;
        }
    }

    let mut next_pool = pool.clone();
    next_pool.sqrt_price_x96 = sqrt_price;
    next_pool.tick = tick;
    next_pool.liquidity = liquidity;
    Ok(SwapSimulation {
        amount: calculated.unsigned_abs(),
        pool: next_pool,
    })
}

/// Exact-in convenience wrapper: swap `amount_in` of `token_in`, returning the
/// output amount.
pub fn simulate_exact_in(
    pool: &V3Pool,
    token_in: TokenId,
    amount_in: U256,
) -> Result<SwapSimulation, CalcError> {
    simulate_swap(pool, token_in, i256_from_u256(amount_in)?, None)
}

/// Exact-out convenience wrapper: request `amount_out` of the other side,
/// returning the input amount required.
pub fn simulate_exact_out(
    pool: &V3Pool,
    token_in: TokenId,
    amount_out: U256,
) -> Result<SwapSimulation, CalcError> {
    simulate_swap(pool, token_in, -i256_from_u256(amount_out)?, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PoolId;
    use std::sync::Arc;

    const USDC: TokenId = TokenId(1);
    const WETH: TokenId = TokenId(2);

    fn tick(index: i32, gross: u128, net: i128) -> TickInfo {
        TickInfo {
            index,
            liquidity_gross: gross,
            liquidity_net: net,
        }
    }

    /// USDC/WETH 0.3% pool around tick 193540 with the active range far from
    /// the initialized ticks.
    fn wide_pool() -> V3Pool {
        V3Pool {
            id: PoolId(7),
            token0: USDC,
            token1: WETH,
            fee_ppm: 3000,
            tick_spacing: 10,
            tick: 193540,
            liquidity: 4_411_461_329_627_947_710,
            sqrt_price_x96: U256::from_dec_str("1262831046415630070062062910819682").unwrap(),
            ticks: Arc::new(vec![
                tick(191540, 10u128.pow(18), 10i128.pow(17)),
                tick(195540, 10u128.pow(18), -(10i128.pow(17))),
            ]),
        }
    }

    /// Same pool with initialized ticks close enough to be crossed.
    fn ladder_pool() -> V3Pool {
        let mut pool = wide_pool();
        pool.ticks = Arc::new(vec![
            tick(193450, 2 * 10u128.pow(18), 1_500_000_000_000_000_000),
            tick(193500, 10u128.pow(18), 1_000_000_000_000_000_000),
            tick(193530, 5 * 10u128.pow(17), 500_000_000_000_000_000),
            tick(193560, 10u128.pow(18), -1_000_000_000_000_000_000),
            tick(193600, 2 * 10u128.pow(18), -2_000_000_000_000_000_000),
        ]);
        pool
    }

    #[test]
    fn exact_in_small_swap() {
        let pool = wide_pool();
        let sim = simulate_exact_in(&pool, USDC, U256::from(1_000_000_000u64)).unwrap();
        assert_eq!(
            sim.amount,
            U256::from_dec_str("253294014434655388").unwrap()
        );
        assert_eq!(sim.pool.tick, 193540, "stayed inside the tick region");
        assert!(sim.pool.sqrt_price_x96 < pool.sqrt_price_x96);
        assert_eq!(sim.pool.liquidity, pool.liquidity);
    }

    #[test]
    fn exact_out_mirrors_exact_in() {
        let pool = wide_pool();
        let out = U256::from_dec_str("253294014434655388").unwrap();
        let sim = simulate_exact_out(&pool, USDC, out).unwrap();
        assert_eq!(sim.amount, U256::from(1_000_000_000u64));
    }

    #[test]
    fn simulation_never_mutates_the_input_pool() {
        let pool = wide_pool();
        let before = pool.clone();
        let first = simulate_exact_in(&pool, USDC, U256::from(1_000_000_000u64)).unwrap();
        let second = simulate_exact_in(&pool, USDC, U256::from(1_000_000_000u64)).unwrap();
        assert_eq!(pool, before);
        assert_eq!(first.amount, second.amount);
        assert_eq!(first.pool, second.pool);
        assert!(Arc::ptr_eq(&pool.ticks, &first.pool.ticks), "ticks shared");
    }

    #[test]
    fn exact_in_crossing_one_tick_down() {
        let pool = ladder_pool();
        let sim = simulate_exact_in(&pool, USDC, U256::from(500_000_000_000u64)).unwrap();
        assert_eq!(
            sim.amount,
            U256::from_dec_str("126405044244427683134").unwrap()
        );
        assert_eq!(sim.pool.tick, 193501);
        assert_eq!(sim.pool.liquidity, 3_911_461_329_627_947_710);
        assert_eq!(
            sim.pool.sqrt_price_x96,
            U256::from_dec_str("1260354356165195580213329938234456").unwrap()
        );
    }

    #[test]
    fn exact_in_crossing_ticks_up() {
        let pool = ladder_pool();
        let sim =
            simulate_exact_in(&pool, WETH, U256::from(200u64) * U256::exp10(18)).unwrap();
        assert_eq!(sim.amount, U256::from(782_320_141_546u64));
        assert_eq!(sim.pool.tick, 193618);
        assert_eq!(sim.pool.liquidity, 1_411_461_329_627_947_710);
        assert_eq!(
            sim.pool.sqrt_price_x96,
            U256::from_dec_str("1267802774581063477395707352991581").unwrap()
        );
    }

    #[test]
    fn exact_out_within_tick_region() {
        let pool = ladder_pool();
        let sim =
            simulate_exact_out(&pool, WETH, U256::from(120_000_000_000u64)).unwrap();
        assert_eq!(
            sim.amount,
            U256::from_dec_str("30591851410849509915").unwrap()
        );
        assert_eq!(sim.pool.tick, 193549);
        assert_eq!(sim.pool.liquidity, pool.liquidity);
    }

    #[test]
    fn liquidity_underflow_breaks_the_walk_cleanly() {
        let mut pool = wide_pool();
        pool.liquidity = 10;
        // crossing this tick downward would subtract more than the running
        // liquidity
        pool.ticks = Arc::new(vec![tick(193500, 100, 100)]);
        let sim = simulate_exact_in(&pool, USDC, U256::exp10(12)).unwrap();
        // the walk stopped at the tick boundary with its pre-cross state
        assert_eq!(
            sim.pool.sqrt_price_x96,
            get_sqrt_ratio_at_tick(193500).unwrap()
        );
        assert_eq!(sim.pool.liquidity, 10);
    }

    #[test]
    fn stranger_token_is_rejected() {
        let pool = wide_pool();
        let err = simulate_exact_in(&pool, TokenId(99), U256::one()).unwrap_err();
        assert!(matches!(err, CalcError::TokenMismatch { .. }));
    }

    #[test]
    fn zero_amount_is_rejected() {
        let pool = wide_pool();
        let err = simulate_swap(&pool, USDC, I256::zero(), None).unwrap_err();
        assert_eq!(err, CalcError::InvalidAmount);
    }

    #[test]
    fn price_limit_must_sit_in_the_travel_direction() {
        let pool = wide_pool();
        let err = simulate_swap(
            &pool,
            USDC,
            I256::from(1_000_000),
            Some(pool.sqrt_price_x96 + U256::one()),
        )
        .unwrap_err();
        assert_eq!(err, CalcError::SqrtPriceOutOfBounds);
    }
}
