//! Tick <-> sqrt-price conversions.
//!
//! Prices are Q64.96 square roots. `get_sqrt_ratio_at_tick` evaluates
//! `sqrt(1.0001^tick) * 2^96` exactly over the 20 pre-computed Q128.128 magic
//! multipliers; `get_tick_at_sqrt_ratio` inverts it by binary search, using the
//! forward conversion as the monotone oracle.

use ethers::types::U256;
use once_cell::sync::Lazy;

use crate::errors::CalcError;

/// Lowest tick the price range can reach.
pub const MIN_TICK: i32 = -887272;
/// Highest tick the price range can reach.
pub const MAX_TICK: i32 = 887272;

/// `get_sqrt_ratio_at_tick(MIN_TICK)`.
pub const MIN_SQRT_RATIO: U256 = U256([4295128739, 0, 0, 0]);
/// `get_sqrt_ratio_at_tick(MAX_TICK)`, exclusive upper bound for valid prices.
pub const MAX_SQRT_RATIO: U256 = U256([
    6743328256752651558,
    17280870778742802505,
    4294805859,
    0,
]);

/// 1 in Q128.128.
const ONE_Q128: U256 = U256([0, 0, 1, 0]);

/// `sqrt(1.0001)^(-2^i) * 2^128` for bit `i` of `|tick|`.
static MAGIC: Lazy<[U256; 20]> = Lazy::new(|| {
    [
        "fffcb933bd6fad37aa2d162d1a594001",
        "fff97272373d413259a46990580e213a",
        "fff2e50f5f656932ef12357cf3c7fdcc",
        "ffe5caca7e10e4e61c3624eaa0941cd0",
        "ffcb9843d60f6159c9db58835c926644",
        "ff973b41fa98c081472e6896dfb254c0",
        "ff2ea16466c96a3843ec78b326b52861",
        "fe5dee046a99a2a811c461f1969c3053",
        "fcbe86c7900a88aedcffc83b479aa3a4",
        "f987a7253ac413176f2b074cf7815e54",
        "f3392b0822b70005940c7a398e4b70f3",
        "e7159475a2c29b7443b29c7fa6e889d9",
        "d097f3bdfd2022b8845ad8f792aa5825",
        "a9f746462d870fdf8a65dc1f90e061e5",
        "70d869a156d2a1b890bb3df62baf32f7",
        "31be135f97d08fd981231505542fcfa6",
        "9aa508b5b7a84e1c677de54f3e99bc9",
        "5d6af8dedb81196699c329225ee604",
        "2216e584f5fa1ea926041bedfe98",
        "48a170391f7dc42444e8fa2",
    ]
    .map(|hexval| U256::from_str_radix(hexval, 16).expect("static tick multiplier"))
});

/// Multiplies two Q128.128 values. The product always fits 256 bits after the
/// shift because both operands stay at or below one in Q128.128.
fn mul_shift_128(a: U256, b: U256) -> U256 {
    (a.full_mul(b) >> 128)
        .try_into()
        .expect("Q128 product fits after shift")
}

/// `sqrt(1.0001^tick) * 2^96`, rounded up into Q64.96.
pub fn get_sqrt_ratio_at_tick(tick: i32) -> Result<U256, CalcError> {
    if !(MIN_TICK..=MAX_TICK).contains(&tick) {
        return Err(CalcError::TickOutOfBounds(tick));
    }
    let abs_tick = tick.unsigned_abs();
    let mut ratio = if abs_tick & 1 != 0 {
        MAGIC[0]
    } else {
        ONE_Q128
    };
    for (i, multiplier) in MAGIC.iter().enumerate().skip(1) {
        if abs_tick & (1 << i) != 0 {
            ratio = mul_shift_128(ratio, *multiplier);
        }
    }
    if tick > 0 {
        ratio = U256::MAX / ratio;
    }
    // Q128.128 -> Q64.96, rounding up so the inverse search stays consistent
    let truncated = ratio >> 32;
    Ok(if (ratio & U256::from(u32::MAX)).is_zero() {
        truncated
    } else {
        truncated + U256::one()
    })
}

/// Greatest tick whose sqrt ratio is at or below `sqrt_price_x96`.
pub fn get_tick_at_sqrt_ratio(sqrt_price_x96: U256) -> Result<i32, CalcError> {
    if sqrt_price_x96 < MIN_SQRT_RATIO || sqrt_price_x96 >= MAX_SQRT_RATIO {
        return Err(CalcError::SqrtPriceOutOfBounds);
    }
    let (mut lo, mut hi) = (MIN_TICK, MAX_TICK);
    while lo < hi {
        let mid = lo + (hi - lo + 1) / 2;
        if get_sqrt_ratio_at_tick(mid)? <= sqrt_price_x96 {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    Ok(lo)
}
