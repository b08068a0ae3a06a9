/// Ledger monetary rules
///
/// Amounts are fixed-point integers: one coin is 100,000,000 units, so every
/// representable amount is exact and arithmetic never touches floats.
///
/// ## Rules
/// - **Fee**: a flat 2% of each transfer goes to the miner that seals it
/// - **Recipient share**: the transfer amount minus its fee (98%)
/// - **Block reward**: starts at 2005 coins and is divided by 11 whenever the
///   block being sealed has an even, non-zero index
///
/// Number of units in one coin
pub const UNITS_PER_COIN: u64 = 100_000_000;

/// Reward paid for the genesis block, in units
pub const INITIAL_BLOCK_REWARD: u64 = 2005 * UNITS_PER_COIN;

/// Percentage of every transfer credited to the miner
pub const FEE_PERCENT: u64 = 2;

/// Divisor applied to the reward on even block indices
pub const REWARD_DIVISOR: u64 = 11;

/// Fee collected on a single transfer
pub fn transfer_fee(amount: u64) -> u64 {
    // u128 keeps amount * percent from overflowing near u64::MAX
    ((amount as u128 * FEE_PERCENT as u128) / 100) as u64
}

/// What the recipient of a transfer is credited with
pub fn recipient_share(amount: u64) -> u64 {
    amount - transfer_fee(amount)
}

/// Base reward for the block at `index`, given the base reward of the block
/// before it.
pub fn next_reward(previous_reward: u64, index: u64) -> u64 {
    if index > 0 && index % 2 == 0 {
        previous_reward / REWARD_DIVISOR
    } else {
        previous_reward
    }
}

/// Utility functions for monetary conversions
pub mod conversions {
    use super::*;

    /// Format units as a human-readable string
    ///
    /// # Examples
    /// ```
    /// use ledger_chain::core::monetary::conversions::format_units;
    /// assert_eq!(format_units(100_000_000), "1.00000000 coins");
    /// assert_eq!(format_units(1_000), "0.00001000 coins");
    /// ```
    pub fn format_units(units: u64) -> String {
        format!(
            "{}.{:08} coins",
            units / UNITS_PER_COIN,
            units % UNITS_PER_COIN
        )
    }
}

#[cfg(test)]
mod tests {
    use super::conversions::*;
    use super::*;

    #[test]
    fn test_fee_split_on_100() {
        let amount = 100 * UNITS_PER_COIN;
        assert_eq!(transfer_fee(amount), 2 * UNITS_PER_COIN);
        assert_eq!(recipient_share(amount), 98 * UNITS_PER_COIN);
    }

    #[test]
    fn test_fee_never_exceeds_amount() {
        for amount in [0, 1, 49, 50, 51, u64::MAX] {
            assert_eq!(transfer_fee(amount) + recipient_share(amount), amount);
        }
    }

    #[test]
    fn test_reward_schedule() {
        let r = INITIAL_BLOCK_REWARD;
        let r1 = next_reward(r, 1);
        let r2 = next_reward(r1, 2);
        let r3 = next_reward(r2, 3);
        let r4 = next_reward(r3, 4);
        assert_eq!(next_reward(r, 0), r);
        assert_eq!(r1, r);
        assert_eq!(r2, r / 11);
        assert_eq!(r3, r / 11);
        assert_eq!(r4, r / 11 / 11);
    }

    #[test]
    fn test_conversions() {
        assert_eq!(format_units(INITIAL_BLOCK_REWARD), "2005.00000000 coins");
    }
}
