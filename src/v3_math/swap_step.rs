//! Single-step swap math inside one constant-liquidity region.
//!
//! Fees are parts-per-million. On exact-in the fee is taken off the input
//! before the price moves; when the step stops short of its target price, the
//! whole unconsumed remainder becomes the fee.

use ethers::types::{I256, U256};

use crate::errors::CalcError;
use crate::v3_math::sqrt_price_math::{
    get_amount0_delta, get_amount1_delta, get_next_sqrt_price_from_input,
    get_next_sqrt_price_from_output, mul_div, mul_div_rounding_up,
};

/// Fee denominator for parts-per-million fees.
pub const FEE_DENOMINATOR_PPM: u32 = 1_000_000;

/// Outcome of one swap step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapStep {
    pub sqrt_price_next_x96: U256,
    pub amount_in: U256,
    pub amount_out: U256,
    pub fee_amount: U256,
}

/// Computes how far one step moves the price towards `sqrt_price_target_x96`
/// and the amounts exchanged, given `amount_remaining` (positive = exact-in,
/// negative = exact-out).
pub fn compute_swap_step(
    sqrt_price_current_x96: U256,
    sqrt_price_target_x96: U256,
    liquidity: u128,
    amount_remaining: I256,
    fee_ppm: u32,
) -> Result<SwapStep, CalcError> {
    if fee_ppm >= FEE_DENOMINATOR_PPM {
        return Err(CalcError::InvalidState("fee at or above 100%"));
    }
    let zero_for_one = sqrt_price_current_x96 >= sqrt_price_target_x96;
    let exact_in = !amount_remaining.is_negative();
    let remaining_abs = amount_remaining.unsigned_abs();
    let fee_keep = U256::from(FEE_DENOMINATOR_PPM - fee_ppm);

    let mut amount_in = U256::zero();
    let mut amount_out = U256::zero();

    let sqrt_price_next_x96 = if exact_in {
        let remaining_less_fee =
            mul_div(remaining_abs, fee_keep, U256::from(FEE_DENOMINATOR_PPM))?;
        amount_in = if zero_for_one {
            get_amount0_delta(
                sqrt_price_target_x96,
                sqrt_price_current_x96,
                liquidity,
                true,
            )?
        } else {
            get_amount1_delta(
                sqrt_price_current_x96,
                sqrt_price_target_x96,
                liquidity,
                true,
            )?
        };
        if remaining_less_fee >= amount_in {
            sqrt_price_target_x96
        } else {
            get_next_sqrt_price_from_input(
                sqrt_price_current_x96,
                liquidity,
                remaining_less_fee,
                zero_for_one,
            )?
        }
    } else {
        amount_out = if zero_for_one {
            get_amount1_delta(
                sqrt_price_target_x96,
                sqrt_price_current_x96,
                liquidity,
                false,
            )?
        } else {
            get_amount0_delta(
                sqrt_price_current_x96,
                sqrt_price_target_x96,
                liquidity,
                false,
            )?
        };
        if remaining_abs >= amount_out {
            sqrt_price_target_x96
        } else {
            get_next_sqrt_price_from_output(
                sqrt_price_current_x96,
                liquidity,
                remaining_abs,
                zero_for_one,
            )?
        }
    };

    let reached_target = sqrt_price_target_x96 == sqrt_price_next_x96;

    if zero_for_one {
        if !(reached_target && exact_in) {
            amount_in = get_amount0_delta(
                sqrt_price_next_x96,
                sqrt_price_current_x96,
                liquidity,
                true,
            )?;
        }
        if !(reached_target && !exact_in) {
            amount_out = get_amount1_delta(
                sqrt_price_next_x96,
                sqrt_price_current_x96,
                liquidity,
                false,
            )?;
        }
    } else {
        if !(reached_target && exact_in) {
            amount_in = get_amount1_delta(
                sqrt_price_current_x96,
                sqrt_price_next_x96,
                liquidity,
                true,
            )?;
        }
        if !(reached_target && !exact_in) {
            amount_out = get_amount0_delta(
                sqrt_price_current_x96,
                sqrt_price_next_x96,
                liquidity,
                false,
            )?;
        }
    }

    // exact-out never hands back more than was asked for
    if !exact_in && amount_out > remaining_abs {
        amount_out = remaining_abs;
    }

    let fee_amount = if exact_in && !reached_target {
        // the step exhausted the input: everything left over is fee
        remaining_abs - amount_in
    } else {
        mul_div_rounding_up(amount_in, U256::from(fee_ppm), fee_keep)?
    };

    Ok(SwapStep {
        sqrt_price_next_x96,
        amount_in,
        amount_out,
        fee_amount,
    })
}
