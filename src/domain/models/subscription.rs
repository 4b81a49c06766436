//! Domain model for the family's Posty subscription.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The four Posty plans, ordered from most limited to most generous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionPlan {
    Free,
    Basic,
    Standard,
    Premium,
}

impl SubscriptionPlan {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SubscriptionPlan::Free => "free",
            SubscriptionPlan::Basic => "basic",
            SubscriptionPlan::Standard => "standard",
            SubscriptionPlan::Premium => "premium",
        }
    }

    /// Monthly price in USD.
    pub const fn monthly_price(&self) -> f64 {
        match self {
            SubscriptionPlan::Free => 0.0,
            SubscriptionPlan::Basic => 7.99,
            SubscriptionPlan::Standard => 12.99,
            SubscriptionPlan::Premium => 19.99,
        }
    }

    /// Physical mail pieces shipped per month.
    pub const fn mails_per_month(&self) -> u32 {
        match self {
            SubscriptionPlan::Free => 1,
            SubscriptionPlan::Basic => 1,
            SubscriptionPlan::Standard => 2,
            SubscriptionPlan::Premium => 4,
        }
    }

    /// Map a billing-provider product identifier onto a plan. Provider
    /// identifiers embed the plan tag (e.g. `posty_standard_monthly`), so
    /// exact tags parse and longer identifiers match on the embedded tag.
    pub fn from_product_identifier(identifier: &str) -> Option<SubscriptionPlan> {
        let id = identifier.to_ascii_lowercase();
        if let Ok(plan) = id.parse() {
            return Some(plan);
        }
        // Order matters only for sanity; tags do not overlap.
        for plan in [
            SubscriptionPlan::Premium,
            SubscriptionPlan::Standard,
            SubscriptionPlan::Basic,
            SubscriptionPlan::Free,
        ] {
            if id.contains(plan.as_str()) {
                return Some(plan);
            }
        }
        None
    }
}

impl std::fmt::Display for SubscriptionPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("Unknown subscription plan: {0}")]
pub struct ParsePlanError(String);

impl std::str::FromStr for SubscriptionPlan {
    type Err = ParsePlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(SubscriptionPlan::Free),
            "basic" => Ok(SubscriptionPlan::Basic),
            "standard" => Ok(SubscriptionPlan::Standard),
            "premium" => Ok(SubscriptionPlan::Premium),
            other => Err(ParsePlanError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Paused,
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Paused => "paused",
            SubscriptionStatus::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SubscriptionStatus::Active),
            "paused" => Ok(SubscriptionStatus::Paused),
            "cancelled" => Ok(SubscriptionStatus::Cancelled),
            other => Err(format!("Unknown subscription status: {}", other)),
        }
    }
}

/// Whether this subscription is the family's first one. `First` is
/// assigned exactly once; a `Returning` family is never eligible for the
/// free plan again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignupType {
    First,
    Returning,
}

impl SignupType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignupType::First => "first",
            SignupType::Returning => "returning",
        }
    }
}

impl std::str::FromStr for SignupType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first" => Ok(SignupType::First),
            "returning" => Ok(SignupType::Returning),
            other => Err(format!("Unknown signup type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub plan: SubscriptionPlan,
    pub status: SubscriptionStatus,
    /// Monthly price actually charged, in USD.
    pub price: f64,
    pub mails_per_month: u32,
    pub free_trial_expires_at: Option<DateTime<Utc>>,
    pub first_mail_shipped: bool,
    pub signup_type: SignupType,
    pub started_at: DateTime<Utc>,
}

impl Subscription {
    /// Generate a subscription ID from a timestamp
    pub fn generate_id(timestamp_millis: u64) -> String {
        format!("sub::{}", timestamp_millis)
    }

    pub fn new(plan: SubscriptionPlan, signup_type: SignupType, now: DateTime<Utc>) -> Self {
        Subscription {
            id: Self::generate_id(now.timestamp_millis() as u64),
            plan,
            status: SubscriptionStatus::Active,
            price: plan.monthly_price(),
            mails_per_month: plan.mails_per_month(),
            free_trial_expires_at: None,
            first_mail_shipped: false,
            signup_type,
            started_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_plan_round_trip() {
        for plan in [
            SubscriptionPlan::Free,
            SubscriptionPlan::Basic,
            SubscriptionPlan::Standard,
            SubscriptionPlan::Premium,
        ] {
            assert_eq!(SubscriptionPlan::from_str(plan.as_str()).unwrap(), plan);
        }
        assert!(SubscriptionPlan::from_str("deluxe").is_err());
    }

    #[test]
    fn test_plan_from_product_identifier() {
        assert_eq!(
            SubscriptionPlan::from_product_identifier("standard"),
            Some(SubscriptionPlan::Standard)
        );
        assert_eq!(
            SubscriptionPlan::from_product_identifier("posty_premium_monthly"),
            Some(SubscriptionPlan::Premium)
        );
        assert_eq!(
            SubscriptionPlan::from_product_identifier("POSTY_BASIC_ANNUAL"),
            Some(SubscriptionPlan::Basic)
        );
        assert_eq!(SubscriptionPlan::from_product_identifier("mystery_box"), None);
    }

    #[test]
    fn test_new_subscription_copies_plan_pricing() {
        let sub = Subscription::new(SubscriptionPlan::Standard, SignupType::First, Utc::now());
        assert_eq!(sub.price, 12.99);
        assert_eq!(sub.mails_per_month, 2);
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert!(!sub.first_mail_shipped);
        assert!(sub.free_trial_expires_at.is_none());
    }
}
