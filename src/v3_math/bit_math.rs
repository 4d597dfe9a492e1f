//! Word-level bit search over 256-bit words.

use ethers::types::U256;

use crate::errors::CalcError;

/// Index of the highest set bit of `word`.
pub fn most_significant_bit(word: U256) -> Result<u8, CalcError> {
    if word.is_zero() {
        return Err(CalcError::InvalidState("bit search over zero word"));
    }
    Ok((word.bits() - 1) as u8)
}

/// Index of the lowest set bit of `word`.
pub fn least_significant_bit(word: U256) -> Result<u8, CalcError> {
    if word.is_zero() {
        return Err(CalcError::InvalidState("bit search over zero word"));
    }
    Ok(word.trailing_zeros() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_both_ends() {
        let word = (U256::one() << 200) | (U256::one() << 3);
        assert_eq!(most_significant_bit(word).unwrap(), 200);
        assert_eq!(least_significant_bit(word).unwrap(), 3);
        assert_eq!(most_significant_bit(U256::one()).unwrap(), 0);
        assert_eq!(least_significant_bit(U256::MAX).unwrap(), 0);
        assert_eq!(most_significant_bit(U256::MAX).unwrap(), 255);
    }

    #[test]
    fn zero_word_is_rejected() {
        assert!(most_significant_bit(U256::zero()).is_err());
        assert!(least_significant_bit(U256::zero()).is_err());
    }
}
