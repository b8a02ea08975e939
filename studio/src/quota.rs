//! Subscription gating. Every check is a plain comparison against limits
//! supplied by the caller; nothing here is cached or fetched.

use serde::{Deserialize, Serialize};
use shared::{Marketplace, MarketplaceSet, Tier, TierLimits, UsageCounters};
use strum::IntoEnumIterator;

use crate::config::TierTable;

/// Tier, limits and usage as last fetched by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionSnapshot {
    pub tier: Tier,
    pub limits: TierLimits,
    #[serde(default)]
    pub usage: UsageCounters,
}

impl SubscriptionSnapshot {
    pub fn new(tier: Tier, limits: TierLimits, usage: UsageCounters) -> Self {
        Self { tier, limits, usage }
    }

    pub fn from_table(table: &TierTable, tier: Tier, usage: UsageCounters) -> Self {
        Self::new(tier, table.limits_for(tier), usage)
    }

    pub fn available_marketplaces(&self) -> MarketplaceSet {
        available_marketplaces(&self.usage, &self.limits)
    }
}

pub fn can_create_project(current_count: usize, limits: &TierLimits) -> bool {
    limits.projects.allows(current_count as u64)
}

pub fn can_create_vision_board(current_count: usize, limits: &TierLimits) -> bool {
    limits.vision_boards.allows(current_count as u64)
}

pub fn has_api_credit(marketplace: Marketplace, usage: &UsageCounters, limits: &TierLimits) -> bool {
    let limit = match marketplace {
        Marketplace::Amazon => limits.api_calls,
        Marketplace::Etsy => limits.etsy_calls,
    };
    limit.allows(usage.count_for(marketplace))
}

/// `None` means unlimited.
pub fn remaining_credit(
    marketplace: Marketplace,
    usage: &UsageCounters,
    limits: &TierLimits,
) -> Option<u32> {
    let limit = match marketplace {
        Marketplace::Amazon => limits.api_calls,
        Marketplace::Etsy => limits.etsy_calls,
    };
    limit.remaining(usage.count_for(marketplace))
}

pub fn available_marketplaces(usage: &UsageCounters, limits: &TierLimits) -> MarketplaceSet {
    let mut set = MarketplaceSet::none();
    for marketplace in Marketplace::iter() {
        if has_api_credit(marketplace, usage, limits) {
            set.insert(marketplace);
        } else {
            log::debug!("No {} credit left, marketplace unavailable", marketplace);
        }
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Limit;

    fn limits(projects: Limit) -> TierLimits {
        TierLimits {
            projects,
            api_calls: Limit::Finite(10),
            vision_boards: Limit::Finite(2),
            etsy_calls: Limit::Finite(5),
        }
    }

    #[test]
    fn project_gate_is_strict_less_than() {
        for limit in 0..6u32 {
            for current in 0..8usize {
                assert_eq!(
                    can_create_project(current, &limits(Limit::Finite(limit))),
                    (current as u64) < u64::from(limit),
                    "current={} limit={}",
                    current,
                    limit
                );
            }
        }
    }

    #[test]
    fn unlimited_projects_always_pass() {
        for current in [0usize, 1, 4, 10_000, usize::MAX] {
            assert!(can_create_project(current, &limits(Limit::Unlimited)));
        }
    }

    #[test]
    fn free_tier_with_four_projects_is_blocked() {
        let free = TierLimits::defaults_for(Tier::Free);
        assert!(can_create_project(3, &free));
        assert!(!can_create_project(4, &free));
    }

    #[test]
    fn credit_is_tracked_per_marketplace() {
        let l = limits(Limit::Finite(1));
        let usage = UsageCounters {
            amazon_total_count: 10,
            etsy_total_count: 4,
        };
        assert!(!has_api_credit(Marketplace::Amazon, &usage, &l));
        assert!(has_api_credit(Marketplace::Etsy, &usage, &l));
        assert_eq!(remaining_credit(Marketplace::Etsy, &usage, &l), Some(1));

        let available = available_marketplaces(&usage, &l);
        assert!(!available.contains(Marketplace::Amazon));
        assert!(available.contains(Marketplace::Etsy));
    }

    #[test]
    fn vision_boards_follow_their_own_limit() {
        let l = limits(Limit::Finite(0));
        assert!(can_create_vision_board(1, &l));
        assert!(!can_create_vision_board(2, &l));
    }

    #[test]
    fn snapshot_reads_limits_from_table() {
        let snapshot =
            SubscriptionSnapshot::from_table(&TierTable::default(), Tier::Studio, UsageCounters::default());
        assert_eq!(snapshot.limits.projects, Limit::Unlimited);
        assert_eq!(snapshot.available_marketplaces(), MarketplaceSet::all());
    }
}
