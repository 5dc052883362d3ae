//! Reward tiers: APR reductions earned by repayment behaviour
//!
//! A tier is derived from the full repayment history of an account every time
//! it is needed. The stored APR on the account is only a cache of
//! [`RewardTier::apr`], so it can always be recomputed and checked for drift.

use rust_decimal::Decimal;
use serde::Serialize;

use super::EngineError;
use crate::config::RewardPolicy;

/// What the reward rules need to know about one repayment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepaymentOutcome {
    pub on_time: bool,
    /// Share of the balance the repayment covered, `100` meaning all of it
    pub percentage_of_balance: Decimal,
}

impl RepaymentOutcome {
    pub fn qualifies(&self, policy: &RewardPolicy) -> bool {
        self.on_time && self.percentage_of_balance >= policy.min_repayment_percent
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RewardTier {
    /// Tier levels earned so far
    pub level: u32,
    /// Qualifying repayments counted towards the next level
    pub streak: u32,
    pub base_apr: Decimal,
    /// Effective APR after the reward reduction
    pub apr: Decimal,
}

impl RewardTier {
    /// Replay a repayment history, oldest first
    pub fn from_history<I>(
        base_apr: Decimal,
        history: I,
        policy: &RewardPolicy,
    ) -> Result<Self, EngineError>
    where
        I: IntoIterator<Item = RepaymentOutcome>,
    {
        if base_apr <= Decimal::ZERO {
            return Err(EngineError::NonPositiveApr(base_apr));
        }

        let streak_length = policy.streak_length.max(1);
        let mut level = 0u32;
        let mut streak = 0u32;

        for outcome in history {
            if outcome.qualifies(policy) {
                streak += 1;
                if streak == streak_length {
                    level += 1;
                    streak = 0;
                }
            } else {
                streak = 0;
            }
        }

        Ok(Self {
            level,
            streak,
            base_apr,
            apr: Self::effective_apr(base_apr, level, policy),
        })
    }

    fn effective_apr(base_apr: Decimal, level: u32, policy: &RewardPolicy) -> Decimal {
        // an APR already under the floor is never raised to it
        if base_apr <= policy.min_apr {
            return base_apr;
        }
        let reduced = base_apr - policy.apr_step * Decimal::from(level);
        reduced.max(policy.min_apr)
    }

    pub fn is_at_floor(&self, policy: &RewardPolicy) -> bool {
        self.apr <= policy.min_apr
    }

    /// Qualifying repayments still needed for the next level
    pub fn repayments_to_next_level(&self, policy: &RewardPolicy) -> u32 {
        policy.streak_length.max(1) - self.streak
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn good() -> RepaymentOutcome {
        RepaymentOutcome { on_time: true, percentage_of_balance: dec!(100) }
    }

    fn late() -> RepaymentOutcome {
        RepaymentOutcome { on_time: false, percentage_of_balance: dec!(100) }
    }

    fn small() -> RepaymentOutcome {
        RepaymentOutcome { on_time: true, percentage_of_balance: dec!(5) }
    }

    #[test]
    fn test_empty_history_keeps_base_apr() {
        let tier = RewardTier::from_history(dec!(25), [], &RewardPolicy::default()).unwrap();
        assert_eq!(tier.level, 0);
        assert_eq!(tier.apr, dec!(25));
        assert_eq!(tier.repayments_to_next_level(&RewardPolicy::default()), 3);
    }

    #[test]
    fn test_streak_earns_level() {
        let tier = RewardTier::from_history(dec!(25), [good(), good(), good()], &RewardPolicy::default()).unwrap();
        assert_eq!(tier.level, 1);
        assert_eq!(tier.streak, 0);
        assert_eq!(tier.apr, dec!(23));
    }

    #[test]
    fn test_bad_repayment_resets_streak_but_keeps_levels() {
        let history = [good(), good(), good(), good(), late(), good()];
        let tier = RewardTier::from_history(dec!(25), history, &RewardPolicy::default()).unwrap();
        assert_eq!(tier.level, 1);
        assert_eq!(tier.streak, 1);
    }

    #[test]
    fn test_small_repayment_does_not_qualify() {
        let tier = RewardTier::from_history(dec!(25), [good(), small(), good()], &RewardPolicy::default()).unwrap();
        assert_eq!(tier.level, 0);
        assert_eq!(tier.streak, 1);
    }

    #[test]
    fn test_floor() {
        let history = std::iter::repeat(good()).take(30);
        let policy = RewardPolicy::default();
        let tier = RewardTier::from_history(dec!(25), history, &policy).unwrap();
        assert_eq!(tier.level, 10);
        assert_eq!(tier.apr, dec!(10));
        assert!(tier.is_at_floor(&policy));
    }

    #[test]
    fn test_base_below_floor_is_not_raised() {
        let tier = RewardTier::from_history(dec!(8), [good(), good(), good()], &RewardPolicy::default()).unwrap();
        assert_eq!(tier.apr, dec!(8));
    }

    #[test]
    fn test_rejects_non_positive_base() {
        assert!(RewardTier::from_history(dec!(0), [], &RewardPolicy::default()).is_err());
    }
}
