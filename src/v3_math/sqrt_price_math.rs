//! Amount deltas and next-price derivations over Q64.96 square-root prices.
//!
//! Everything widens to 512 bits internally; `mul_div` and
//! `mul_div_rounding_up` keep integer remainders exact so the two rounding
//! modes differ by at most one.

use ethers::types::{U256, U512};

use crate::errors::CalcError;

/// 2^96, the Q64.96 scale factor.
pub const Q96: U256 = U256([0, 4294967296, 0, 0]);

const RESOLUTION: usize = 96;

pub(crate) fn u512_to_u256(v: U512) -> Result<U256, CalcError> {
    v.try_into().map_err(|_| CalcError::SqrtPriceOutOfBounds)
}

/// `floor(a * b / denominator)` without intermediate overflow.
pub fn mul_div(a: U256, b: U256, denominator: U256) -> Result<U256, CalcError> {
    if denominator.is_zero() {
        return Err(CalcError::InvalidState("mul_div by zero"));
    }
    u512_to_u256(a.full_mul(b) / U512::from(denominator))
}

/// `ceil(a * b / denominator)` without intermediate overflow.
pub fn mul_div_rounding_up(a: U256, b: U256, denominator: U256) -> Result<U256, CalcError> {
    if denominator.is_zero() {
        return Err(CalcError::InvalidState("mul_div by zero"));
    }
    let numerator = a.full_mul(b);
    let denominator = U512::from(denominator);
    let mut quotient = numerator / denominator;
    if !(numerator % denominator).is_zero() {
        quotient = quotient + U512::one();
    }
    u512_to_u256(quotient)
}

fn div_rounding_up_512(numerator: U512, denominator: U512) -> U512 {
    let quotient = numerator / denominator;
    if (numerator % denominator).is_zero() {
        quotient
    } else {
        quotient + U512::one()
    }
}

fn sorted(a: U256, b: U256) -> (U256, U256) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Amount of token0 between two sqrt prices at constant `liquidity`:
/// `liquidity * 2^96 * (upper - lower) / (upper * lower)`.
pub fn get_amount0_delta(
    sqrt_ratio_a_x96: U256,
    sqrt_ratio_b_x96: U256,
    liquidity: u128,
    round_up: bool,
) -> Result<U256, CalcError> {
    let (lower, upper) = sorted(sqrt_ratio_a_x96, sqrt_ratio_b_x96);
    if lower.is_zero() {
        return Err(CalcError::InvalidState("zero sqrt price"));
    }
    let numerator1 = U512::from(liquidity) << RESOLUTION;
    let numerator2 = U512::from(upper - lower);
    let product = numerator1
        .checked_mul(numerator2)
        .ok_or(CalcError::SqrtPriceOutOfBounds)?;
    let amount = if round_up {
        div_rounding_up_512(
            div_rounding_up_512(product, U512::from(upper)),
            U512::from(lower),
        )
    } else {
        (product / U512::from(upper)) / U512::from(lower)
    };
    u512_to_u256(amount)
}

/// Amount of token1 between two sqrt prices at constant `liquidity`:
/// `liquidity * (upper - lower) / 2^96`.
pub fn get_amount1_delta(
    sqrt_ratio_a_x96: U256,
    sqrt_ratio_b_x96: U256,
    liquidity: u128,
    round_up: bool,
) -> Result<U256, CalcError> {
    let (lower, upper) = sorted(sqrt_ratio_a_x96, sqrt_ratio_b_x96);
    if round_up {
        mul_div_rounding_up(U256::from(liquidity), upper - lower, Q96)
    } else {
        mul_div(U256::from(liquidity), upper - lower, Q96)
    }
}

/// Price after adding (`add`) or removing token0. Rounds up so the pool never
/// gives out more than it received.
fn next_sqrt_price_from_amount0_rounding_up(
    sqrt_price_x96: U256,
    liquidity: u128,
    amount: U256,
    add: bool,
) -> Result<U256, CalcError> {
    if amount.is_zero() {
        return Ok(sqrt_price_x96);
    }
    let numerator1 = U512::from(liquidity) << RESOLUTION;
    let product = U512::from(amount)
        .checked_mul(U512::from(sqrt_price_x96))
        .ok_or(CalcError::SqrtPriceOutOfBounds)?;
    let denominator = if add {
        numerator1 + product
    } else {
        if product >= numerator1 {
            return Err(CalcError::SqrtPriceOutOfBounds);
        }
        numerator1 - product
    };
    let next = div_rounding_up_512(
        numerator1
            .checked_mul(U512::from(sqrt_price_x96))
            .ok_or(CalcError::SqrtPriceOutOfBounds)?,
        denominator,
    );
    u512_to_u256(next)
}

/// Price after adding (`add`) or removing token1. Rounds down, same direction
/// of conservatism as above.
fn next_sqrt_price_from_amount1_rounding_down(
    sqrt_price_x96: U256,
    liquidity: u128,
    amount: U256,
    add: bool,
) -> Result<U256, CalcError> {
    let liquidity_512 = U512::from(liquidity);
    if add {
        let quotient = (U512::from(amount) << RESOLUTION) / liquidity_512;
        let shift = u512_to_u256(quotient)?;
        sqrt_price_x96
            .checked_add(shift)
            .ok_or(CalcError::SqrtPriceOutOfBounds)
    } else {
        let quotient =
            div_rounding_up_512(U512::from(amount) << RESOLUTION, liquidity_512);
        let shift = u512_to_u256(quotient)?;
        if sqrt_price_x96 <= shift {
            return Err(CalcError::SqrtPriceOutOfBounds);
        }
        Ok(sqrt_price_x96 - shift)
    }
}

/// Price after swapping `amount_in` into the pool.
pub fn get_next_sqrt_price_from_input(
    sqrt_price_x96: U256,
    liquidity: u128,
    amount_in: U256,
    zero_for_one: bool,
) -> Result<U256, CalcError> {
    if sqrt_price_x96.is_zero() || liquidity == 0 {
        return Err(CalcError::InvalidState("empty price or liquidity"));
    }
    if zero_for_one {
        next_sqrt_price_from_amount0_rounding_up(sqrt_price_x96, liquidity, amount_in, true)
    } else {
        next_sqrt_price_from_amount1_rounding_down(sqrt_price_x96, liquidity, amount_in, true)
    }
}

/// Price after taking `amount_out` out of the pool.
pub fn get_next_sqrt_price_from_output(
    sqrt_price_x96: U256,
    liquidity: u128,
    amount_out: U256,
    zero_for_one: bool,
) -> Result<U256, CalcError> {
    if sqrt_price_x96.is_zero() || liquidity == 0 {
        return Err(CalcError::InvalidState("empty price or liquidity"));
    }
    if zero_for_one {
        next_sqrt_price_from_amount1_rounding_down(sqrt_price_x96, liquidity, amount_out, false)
    } else {
        next_sqrt_price_from_amount0_rounding_up(sqrt_price_x96, liquidity, amount_out, false)
    }
}
