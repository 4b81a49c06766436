//! Subscription limit evaluation.
//!
//! ## Key Responsibilities
//! - Map a plan (or the absence of one) to its capability row
//! - Answer "can this family add another child?" for the client-side check
//! - Shipping-cycle date arithmetic anchored at the signup instant
//!
//! Everything here is a pure function over the subscription value; the store
//! calls these, and the remote gateway re-checks the child count
//! authoritatively on its side.

use chrono::{DateTime, Duration, Utc};

use crate::domain::models::{SignupType, Subscription, SubscriptionPlan};

/// Days between physical mail shipments, anchored at signup.
pub const SHIPPING_CYCLE_DAYS: i64 = 21;

/// What a plan allows. `max_children: None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanLimits {
    pub max_children: Option<u32>,
    pub has_mail_rewards: bool,
    pub has_custom_tasks: bool,
    pub has_ai_verification: bool,
    pub has_gift_card_rewards: bool,
}

impl PlanLimits {
    pub const fn for_plan(plan: SubscriptionPlan) -> PlanLimits {
        match plan {
            SubscriptionPlan::Free => PlanLimits {
                max_children: Some(1),
                has_mail_rewards: true,
                has_custom_tasks: false,
                has_ai_verification: false,
                has_gift_card_rewards: false,
            },
            SubscriptionPlan::Basic => PlanLimits {
                max_children: Some(1),
                has_mail_rewards: true,
                has_custom_tasks: true,
                has_ai_verification: false,
                has_gift_card_rewards: false,
            },
            SubscriptionPlan::Standard => PlanLimits {
                max_children: Some(3),
                has_mail_rewards: true,
                has_custom_tasks: true,
                has_ai_verification: true,
                has_gift_card_rewards: false,
            },
            SubscriptionPlan::Premium => PlanLimits {
                max_children: None,
                has_mail_rewards: true,
                has_custom_tasks: true,
                has_ai_verification: true,
                has_gift_card_rewards: true,
            },
        }
    }
}

/// Capability row for the family's subscription. No subscription behaves
/// as the `Free` row.
pub fn plan_limits(subscription: Option<&Subscription>) -> PlanLimits {
    let plan = subscription.map(|s| s.plan).unwrap_or(SubscriptionPlan::Free);
    PlanLimits::for_plan(plan)
}

/// Client-side child-count check: strictly fewer than the cap, always true
/// on an unbounded plan.
pub fn can_add_child(subscription: Option<&Subscription>, current_count: u32) -> bool {
    match plan_limits(subscription).max_children {
        Some(max) => current_count < max,
        None => true,
    }
}

pub fn is_free_plan(subscription: Option<&Subscription>) -> bool {
    match subscription {
        Some(s) => s.plan == SubscriptionPlan::Free || s.price == 0.0,
        None => true,
    }
}

pub fn has_selected_plan(subscription: Option<&Subscription>) -> bool {
    subscription.is_some()
}

/// Free-plan eligibility. A family whose subscription records a
/// `Returning` signup is never eligible again, whatever their plan.
pub fn is_eligible_for_free_plan(subscription: Option<&Subscription>) -> bool {
    match subscription {
        Some(s) => s.signup_type == SignupType::First,
        None => true,
    }
}

/// Next shipment instant: signup plus whole 21-day cycles. A `now` that
/// lands exactly on a cycle boundary rolls to the next cycle, so the
/// result is always strictly in the future.
pub fn next_shipping_date(signup: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let elapsed_days = (now - signup).num_days().max(0);
    let completed_cycles = elapsed_days / SHIPPING_CYCLE_DAYS;
    signup + Duration::days(SHIPPING_CYCLE_DAYS * (completed_cycles + 1))
}

/// Whole days until the next shipment, rounded up. Never negative.
pub fn days_until_next_shipping(signup: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let next = next_shipping_date(signup, now);
    let seconds = (next - now).num_seconds().max(0);
    (seconds + 86_399) / 86_400
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn subscription(plan: SubscriptionPlan, signup_type: SignupType) -> Subscription {
        Subscription::new(plan, signup_type, Utc::now())
    }

    #[test]
    fn test_no_subscription_behaves_as_free() {
        let limits = plan_limits(None);
        assert_eq!(limits.max_children, Some(1));
        assert!(limits.has_mail_rewards);
        assert!(!limits.has_custom_tasks);
        assert!(!limits.has_ai_verification);
        assert!(!limits.has_gift_card_rewards);
    }

    #[test]
    fn test_plan_capability_rows() {
        let basic = PlanLimits::for_plan(SubscriptionPlan::Basic);
        assert_eq!(basic.max_children, Some(1));
        assert!(basic.has_custom_tasks);
        assert!(!basic.has_ai_verification);

        let standard = PlanLimits::for_plan(SubscriptionPlan::Standard);
        assert_eq!(standard.max_children, Some(3));
        assert!(standard.has_ai_verification);
        assert!(!standard.has_gift_card_rewards);

        let premium = PlanLimits::for_plan(SubscriptionPlan::Premium);
        assert_eq!(premium.max_children, None);
        assert!(premium.has_gift_card_rewards);
    }

    #[test]
    fn test_can_add_child_boundaries() {
        let free = subscription(SubscriptionPlan::Free, SignupType::First);
        assert!(can_add_child(Some(&free), 0));
        assert!(!can_add_child(Some(&free), 1));

        let standard = subscription(SubscriptionPlan::Standard, SignupType::First);
        assert!(can_add_child(Some(&standard), 2));
        assert!(!can_add_child(Some(&standard), 3));

        let premium = subscription(SubscriptionPlan::Premium, SignupType::First);
        assert!(can_add_child(Some(&premium), 250));
    }

    #[test]
    fn test_no_subscription_allows_one_child() {
        assert!(can_add_child(None, 0));
        assert!(!can_add_child(None, 1));
    }

    #[test]
    fn test_free_plan_eligibility_blocks_returning_families() {
        assert!(is_eligible_for_free_plan(None));

        let first = subscription(SubscriptionPlan::Free, SignupType::First);
        assert!(is_eligible_for_free_plan(Some(&first)));

        let returning = subscription(SubscriptionPlan::Premium, SignupType::Returning);
        assert!(!is_eligible_for_free_plan(Some(&returning)));
    }

    #[test]
    fn test_free_plan_predicate() {
        assert!(is_free_plan(None));
        let free = subscription(SubscriptionPlan::Free, SignupType::First);
        assert!(is_free_plan(Some(&free)));
        let paid = subscription(SubscriptionPlan::Basic, SignupType::First);
        assert!(!is_free_plan(Some(&paid)));
    }

    #[test]
    fn test_next_shipping_date_first_cycle() {
        let signup = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap();

        let next = next_shipping_date(signup, now);
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 1, 22, 12, 0, 0).unwrap());
        assert_eq!(days_until_next_shipping(signup, now), 12);
    }

    #[test]
    fn test_shipping_boundary_rolls_to_next_cycle() {
        let signup = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let boundary = Utc.with_ymd_and_hms(2025, 1, 22, 12, 0, 0).unwrap();

        let next = next_shipping_date(signup, boundary);
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 2, 12, 12, 0, 0).unwrap());
        assert_eq!(days_until_next_shipping(signup, boundary), 21);
    }

    #[test]
    fn test_days_until_shipping_rounds_up() {
        let signup = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        // One minute before the boundary still reads as one day out.
        let now = Utc.with_ymd_and_hms(2025, 1, 22, 11, 59, 0).unwrap();

        assert_eq!(days_until_next_shipping(signup, now), 1);
    }

    #[test]
    fn test_shipping_with_clock_before_signup() {
        let signup = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 1, 5, 0, 0, 0).unwrap();

        let next = next_shipping_date(signup, now);
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 1, 31, 0, 0, 0).unwrap());
    }
}
