//! Pure EIP-1559 fee-cap arithmetic shared by the transaction builder and the fee
//! estimator, so the two can never disagree about what a given `(baseFee, priorityFee,
//! speed)` triple means.

use alloy_primitives::U256;

use crate::types::FeeSpeed;

pub const GWEI: u64 = 1_000_000_000;

/// Fallback rates used when the network reads that feed fee estimation are unavailable.
pub const FALLBACK_BASE_FEE_GWEI: u64 = 30;
pub const FALLBACK_PRIORITY_FEE_GWEI: u64 = 2;

/// `(base_fee_multiplier, priority_fee_multiplier)` for a given speed, per the fee-cap
/// table: Slow 1x/1x, Normal 2x/1x, Fast 3x/2x.
pub fn fee_multipliers(speed: FeeSpeed) -> (u64, u64) {
    match speed {
        FeeSpeed::Slow => (1, 1),
        FeeSpeed::Normal => (2, 1),
        FeeSpeed::Fast => (3, 2),
    }
}

/// Expected blocks-to-inclusion for a given speed on a ~12s-block chain.
pub fn estimated_blocks(speed: FeeSpeed) -> u64 {
    match speed {
        FeeSpeed::Slow => 6,
        FeeSpeed::Normal => 3,
        FeeSpeed::Fast => 1,
    }
}

/// `maxFeePerGas = baseFee * baseMult + priorityFee * priorityMult` and
/// `maxPriorityFeePerGas = priorityFee * priorityMult`.
pub fn fee_caps(base_fee: U256, priority_fee: U256, speed: FeeSpeed) -> (U256, U256) {
    let (base_mult, priority_mult) = fee_multipliers(speed);
    let max_priority_fee_per_gas = priority_fee * U256::from(priority_mult);
    let max_fee_per_gas = base_fee * U256::from(base_mult) + max_priority_fee_per_gas;
    (max_fee_per_gas, max_priority_fee_per_gas)
}

/// `recommended = maxFeePerGas * gasLimit` (the total fee a caller should expect to pay,
/// not a per-gas rate).
pub fn total_fee(max_fee_per_gas: U256, gas_limit: u64) -> U256 {
    max_fee_per_gas * U256::from(gas_limit)
}

/// `minFee = 0.80 * recommended`, `maxFee = 1.50 * recommended`.
pub fn fee_bounds(recommended: U256) -> (U256, U256) {
    let min_fee = recommended * U256::from(80) / U256::from(100);
    let max_fee = recommended * U256::from(150) / U256::from(100);
    (min_fee, max_fee)
}

/// Confidence score per spec.md §4.4: starts at 80, takes the larger applicable penalty
/// from each of the base-fee and priority-fee ladders, clamped to `[50, 100]`.
pub fn confidence(base_fee_gwei: f64, priority_fee_gwei: f64) -> u8 {
    let mut score: i32 = 80;

    let base_penalty = if base_fee_gwei > 100.0 {
        15
    } else if base_fee_gwei > 50.0 {
        10
    } else {
        0
    };
    let priority_penalty = if priority_fee_gwei > 10.0 {
        10
    } else if priority_fee_gwei > 5.0 {
        5
    } else {
        0
    };

    score -= base_penalty;
    score -= priority_penalty;
    score.clamp(50, 100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fee_caps_match_worked_example() {
        let base_fee = U256::from(30u64 * GWEI);
        let priority_fee = U256::from(2u64 * GWEI);
        let (max_fee, max_priority) = fee_caps(base_fee, priority_fee, FeeSpeed::Normal);
        assert_eq!(max_fee, U256::from(62u64 * GWEI));
        assert_eq!(max_priority, U256::from(2u64 * GWEI));
    }

    #[test]
    fn fast_doubles_priority_component() {
        let base_fee = U256::from(30u64 * GWEI);
        let priority_fee = U256::from(2u64 * GWEI);
        let (max_fee, max_priority) = fee_caps(base_fee, priority_fee, FeeSpeed::Fast);
        assert_eq!(max_priority, U256::from(4u64 * GWEI));
        assert_eq!(max_fee, U256::from(94u64 * GWEI)); // 30*3 + 2*2 = 94
    }

    #[test]
    fn speed_ordering_is_monotonic_for_fixed_network_state() {
        let base_fee = U256::from(30u64 * GWEI);
        let priority_fee = U256::from(2u64 * GWEI);
        let (slow, _) = fee_caps(base_fee, priority_fee, FeeSpeed::Slow);
        let (normal, _) = fee_caps(base_fee, priority_fee, FeeSpeed::Normal);
        let (fast, _) = fee_caps(base_fee, priority_fee, FeeSpeed::Fast);
        assert!(slow <= normal);
        assert!(normal <= fast);
    }

    #[test]
    fn bounds_respect_p2_invariant() {
        let recommended = U256::from(1000u64);
        let (min_fee, max_fee) = fee_bounds(recommended);
        assert!(min_fee <= recommended);
        assert!(recommended <= max_fee);
    }

    #[test]
    fn confidence_takes_larger_penalty_not_sum() {
        assert_eq!(confidence(10.0, 1.0), 80);
        assert_eq!(confidence(60.0, 1.0), 70);
        assert_eq!(confidence(120.0, 1.0), 65);
        assert_eq!(confidence(10.0, 6.0), 75);
        assert_eq!(confidence(10.0, 11.0), 70);
        assert_eq!(confidence(200.0, 200.0), 50); // clamped floor
    }
}
