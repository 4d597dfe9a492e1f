//! Constant-product AMM math for two-reserve pools with basis-point fees.
//!
//! All functions take the pool by reference, never mutate it, and widen to
//! 512-bit intermediates so the quotes stay exact for any representable
//! reserves.

use ethers::types::{U256, U512};

use crate::errors::CalcError;
use crate::types::{TokenId, V2Pool};

/// Fee denominator for basis-point fees.
pub const FEE_DENOMINATOR_BPS: u32 = 10_000;

fn u512_to_u256(v: U512) -> Result<U256, CalcError> {
    v.try_into()
        .map_err(|_| CalcError::InvalidState("512-bit intermediate exceeds 256 bits"))
}

/// Picks `(reserve_in, reserve_out)` by token identity.
pub fn get_reserves(
    token_in: TokenId,
    token_out: TokenId,
    pool: &V2Pool,
) -> Result<(U256, U256), CalcError> {
    if token_in == pool.token0 && token_out == pool.token1 {
        Ok((pool.reserve0, pool.reserve1))
    } else if token_in == pool.token1 && token_out == pool.token0 {
        Ok((pool.reserve1, pool.reserve0))
    } else {
        let stranger = if token_in == pool.token0 || token_in == pool.token1 {
            token_out
        } else {
            token_in
        };
        Err(CalcError::TokenMismatch {
            token: stranger,
            pool: pool.id,
        })
    }
}

fn fee_multiplier(pool: &V2Pool) -> Result<U256, CalcError> {
    if u32::from(pool.fee_bps) >= FEE_DENOMINATOR_BPS {
        return Err(CalcError::InvalidState("fee at or above 100%"));
    }
    Ok(U256::from(FEE_DENOMINATOR_BPS - u32::from(pool.fee_bps)))
}

/// Output amount for swapping `amount_in` of `token_in` into `token_out`:
///
/// `out = (r_out * in * (10000 - fee)) / (r_in * 10000 + in * (10000 - fee))`
///
/// Empty reserves quote zero without error.
pub fn get_amount_out(
    amount_in: U256,
    token_in: TokenId,
    token_out: TokenId,
    pool: &V2Pool,
) -> Result<U256, CalcError> {
    let (r_in, r_out) = get_reserves(token_in, token_out, pool)?;
    if r_in.is_zero() || r_out.is_zero() {
        return Ok(U256::zero());
    }
    let keep = fee_multiplier(pool)?;
    let in_with_fee = amount_in.full_mul(keep);
    let numerator = in_with_fee
        .checked_mul(U512::from(r_out))
        .ok_or(CalcError::InvalidAmount)?;
    let denominator = U512::from(r_in) * U512::from(FEE_DENOMINATOR_BPS) + in_with_fee;
    if denominator.is_zero() {
        return Err(CalcError::InvalidState("zero denominator"));
    }
    u512_to_u256(numerator / denominator)
}

/// Input amount required to receive exactly `amount_out` of `token_out`:
///
/// `in = floor(r_in * out * 10000 / ((r_out - out) * (10000 - fee))) + 1`
pub fn get_amount_in(
    amount_out: U256,
    token_in: TokenId,
    token_out: TokenId,
    pool: &V2Pool,
) -> Result<U256, CalcError> {
    let (r_in, r_out) = get_reserves(token_in, token_out, pool)?;
    if amount_out >= r_out {
        return Err(CalcError::InsufficientLiquidity);
    }
    let keep = fee_multiplier(pool)?;
    let numerator = r_in
        .full_mul(amount_out)
        .checked_mul(U512::from(FEE_DENOMINATOR_BPS))
        .ok_or(CalcError::InvalidAmount)?;
    let denominator = (r_out - amount_out).full_mul(keep);
    if denominator.is_zero() {
        return Err(CalcError::InvalidState("zero denominator"));
    }
    let quotient = u512_to_u256(numerator / denominator)?;
    quotient
        .checked_add(U256::one())
        .ok_or(CalcError::InvalidAmount)
}

/// Quotes the swap and returns the pool as it would look afterwards. The input
/// pool is untouched; the returned pool carries freshly computed reserves.
pub fn simulate_swap(
    amount_in: U256,
    token_in: TokenId,
    token_out: TokenId,
    pool: &V2Pool,
) -> Result<(U256, V2Pool), CalcError> {
    let amount_out = get_amount_out(amount_in, token_in, token_out, pool)?;
    let mut next = pool.clone();
    if token_in == pool.token0 {
        next.reserve0 = pool
            .reserve0
            .checked_add(amount_in)
            .ok_or(CalcError::InvalidAmount)?;
        next.reserve1 = pool.reserve1 - amount_out;
    } else {
        next.reserve1 = pool
            .reserve1
            .checked_add(amount_in)
            .ok_or(CalcError::InvalidAmount)?;
        next.reserve0 = pool.reserve0 - amount_out;
    }
    Ok((amount_out, next))
}

/// Approximates the spot price of `token_in` in `token_out`, scaled by
/// `10^decimals_in`, by quoting a canonical input of one-hundredth of the
/// input-side reserve.
pub fn get_exchange_rate(
    token_in: TokenId,
    token_out: TokenId,
    decimals_in: u8,
    _decimals_out: u8,
    pool: &V2Pool,
) -> Result<U256, CalcError> {
    let (r_in, _) = get_reserves(token_in, token_out, pool)?;
    let canonical_in = r_in / U256::from(100);
    if canonical_in.is_zero() {
        return Ok(U256::zero());
    }
    let amount_out = get_amount_out(canonical_in, token_in, token_out, pool)?;
    let scaled = amount_out
        .full_mul(U256::exp10(usize::from(decimals_in)))
        .checked_div(U512::from(canonical_in))
        .ok_or(CalcError::InvalidState("zero denominator"))?;
    u512_to_u256(scaled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PoolId;

    // 100 USDC / 50 WETH pool with a 30 bps fee
    fn usdc_weth_pool() -> V2Pool {
        V2Pool {
            id: PoolId(1),
            token0: TokenId(10),
            token1: TokenId(20),
            reserve0: U256::from(100_000_000u64),
            reserve1: U256::from(50u64) * U256::exp10(18),
            pool_type: 0,
            fee_bps: 30,
        }
    }

    #[test]
    fn quotes_one_usdc_for_weth() {
        let pool = usdc_weth_pool();
        let out = get_amount_out(U256::from(1_000_000u64), TokenId(10), TokenId(20), &pool)
            .expect("quote");
        assert_eq!(out, U256::from_dec_str("493579017198530649").unwrap());
    }

    #[test]
    fn quotes_one_weth_for_usdc() {
        let pool = usdc_weth_pool();
        let out =
            get_amount_out(U256::exp10(18), TokenId(20), TokenId(10), &pool).expect("quote");
        assert_eq!(out, U256::from(1_955_016u64));
    }

    #[test]
    fn round_trip_is_exact_for_this_pool() {
        let pool = usdc_weth_pool();
        let out = get_amount_out(U256::from(1_000_000u64), TokenId(10), TokenId(20), &pool)
            .expect("quote");
        let back = get_amount_in(out, TokenId(10), TokenId(20), &pool).expect("quote");
        assert_eq!(back, U256::from(1_000_000u64));
    }

    #[test]
    fn amount_in_never_undershoots() {
        let pool = usdc_weth_pool();
        for raw in [1u64, 37, 1_000, 123_456, 5_000_000] {
            let amount = U256::from(raw);
            let out =
                get_amount_out(amount, TokenId(10), TokenId(20), &pool).expect("quote");
            if out.is_zero() {
                continue;
            }
            let back = get_amount_in(out, TokenId(10), TokenId(20), &pool).expect("quote");
            assert!(back + U256::one() >= amount, "in={raw} back={back}");
        }
    }

    #[test]
    fn empty_reserves_quote_zero() {
        let mut pool = usdc_weth_pool();
        pool.reserve1 = U256::zero();
        let out = get_amount_out(U256::from(1_000_000u64), TokenId(10), TokenId(20), &pool)
            .expect("quote");
        assert!(out.is_zero());
    }

    #[test]
    fn rejects_stranger_token() {
        let pool = usdc_weth_pool();
        let err = get_amount_out(U256::one(), TokenId(10), TokenId(99), &pool).unwrap_err();
        assert_eq!(
            err,
            CalcError::TokenMismatch {
                token: TokenId(99),
                pool: PoolId(1)
            }
        );
    }

    #[test]
    fn exact_out_beyond_reserve_is_insufficient_liquidity() {
        let pool = usdc_weth_pool();
        let err = get_amount_in(pool.reserve1, TokenId(10), TokenId(20), &pool).unwrap_err();
        assert_eq!(err, CalcError::InsufficientLiquidity);
    }

    #[test]
    fn simulate_swap_leaves_input_untouched() {
        let pool = usdc_weth_pool();
        let before = pool.clone();
        let (out, next) =
            simulate_swap(U256::from(1_000_000u64), TokenId(10), TokenId(20), &pool)
                .expect("simulate");
        assert_eq!(pool, before);
        assert_eq!(next.reserve0, pool.reserve0 + U256::from(1_000_000u64));
        assert_eq!(next.reserve1, pool.reserve1 - out);
        // identical inputs, identical outputs
        let (out2, next2) =
            simulate_swap(U256::from(1_000_000u64), TokenId(10), TokenId(20), &pool)
                .expect("simulate");
        assert_eq!(out, out2);
        assert_eq!(next, next2);
    }

    #[test]
    fn exchange_rate_tracks_spot_price() {
        let pool = usdc_weth_pool();
        // ~0.5 WETH per USDC at these reserves, scaled by 10^6
        let rate = get_exchange_rate(TokenId(10), TokenId(20), 6, 18, &pool).expect("rate");
        let spot = U256::from_dec_str("500000000000000000").unwrap();
        assert!(rate < spot, "quote includes fee and impact");
        let tolerance = spot / U256::from(50); // within 2%
        assert!(spot - rate < tolerance, "rate={rate} spot={spot}");
    }
}
