//! Domain model for a child profile and its derived progression values.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::badge::Badge;

/// Points needed to advance one level. Level is always derived from
/// lifetime points, never stored independently of them.
pub const POINTS_PER_LEVEL: u32 = 500;

/// Lifetime-point thresholds for the 2x and 3x award multipliers.
pub const DOUBLE_MULTIPLIER_THRESHOLD: u32 = 2_500;
pub const TRIPLE_MULTIPLIER_THRESHOLD: u32 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Boy,
    Girl,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Boy => "boy",
            Gender::Girl => "girl",
            Gender::Other => "other",
        }
    }
}

impl std::str::FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "boy" => Ok(Gender::Boy),
            "girl" => Ok(Gender::Girl),
            "other" => Ok(Gender::Other),
            other => Err(format!("Unknown gender: {}", other)),
        }
    }
}

/// Age bracket used to pick age-appropriate task templates.
///
/// Ages outside the supported 5-17 range clamp to the nearest bracket
/// rather than failing, so an out-of-range profile still gets tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgeGroup {
    #[serde(rename = "5-7")]
    FiveToSeven,
    #[serde(rename = "8-11")]
    EightToEleven,
    #[serde(rename = "12-14")]
    TwelveToFourteen,
    #[serde(rename = "15-17")]
    FifteenToSeventeen,
}

impl AgeGroup {
    pub fn from_age(age: u8) -> Self {
        match age {
            0..=7 => AgeGroup::FiveToSeven,
            8..=11 => AgeGroup::EightToEleven,
            12..=14 => AgeGroup::TwelveToFourteen,
            _ => AgeGroup::FifteenToSeventeen,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgeGroup::FiveToSeven => "5-7",
            AgeGroup::EightToEleven => "8-11",
            AgeGroup::TwelveToFourteen => "12-14",
            AgeGroup::FifteenToSeventeen => "15-17",
        }
    }
}

impl std::fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AgeGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "5-7" => Ok(AgeGroup::FiveToSeven),
            "8-11" => Ok(AgeGroup::EightToEleven),
            "12-14" => Ok(AgeGroup::TwelveToFourteen),
            "15-17" => Ok(AgeGroup::FifteenToSeventeen),
            other => Err(format!("Unknown age group: {}", other)),
        }
    }
}

/// A child profile with its point economy state.
///
/// `points` is the spendable balance, `total_points` the lifetime total
/// that drives level and multipliers. Spending never touches
/// `total_points`, so redemptions cannot demote a child.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Child {
    pub id: String,
    pub name: String,
    pub age: u8,
    pub gender: Gender,
    pub age_group: AgeGroup,
    pub avatar_url: Option<String>,
    /// Spendable point balance.
    pub points: u32,
    /// Lifetime points earned, monotonically non-decreasing.
    pub total_points: u32,
    pub level: u32,
    pub streak_days: u32,
    /// Local calendar day of the last counted login, used for streak math.
    pub last_completed_date: Option<NaiveDate>,
    pub badges: Vec<Badge>,
    /// Progress toward the next physical mail piece, 0-100.
    pub mail_meter_progress: u8,
    pub mail_code: Option<String>,
    pub mail_code_expires_at: Option<DateTime<Utc>>,
    pub mail_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl Child {
    /// Generate a child ID from a timestamp
    pub fn generate_id(timestamp_millis: u64) -> String {
        format!("child::{}", timestamp_millis)
    }

    pub fn new(name: String, age: u8, gender: Gender, now: DateTime<Utc>) -> Self {
        Child {
            id: Self::generate_id(now.timestamp_millis() as u64),
            name,
            age,
            gender,
            age_group: AgeGroup::from_age(age),
            avatar_url: None,
            points: 0,
            total_points: 0,
            level: 1,
            streak_days: 0,
            last_completed_date: None,
            badges: Vec::new(),
            mail_meter_progress: 0,
            mail_code: None,
            mail_code_expires_at: None,
            mail_verified: false,
            created_at: now,
        }
    }

    /// Level for a lifetime point total. Level 1 starts at zero points.
    pub fn level_for(total_points: u32) -> u32 {
        total_points / POINTS_PER_LEVEL + 1
    }

    /// Award multiplier for a lifetime point total.
    pub fn multiplier_for(total_points: u32) -> u32 {
        if total_points >= TRIPLE_MULTIPLIER_THRESHOLD {
            3
        } else if total_points >= DOUBLE_MULTIPLIER_THRESHOLD {
            2
        } else {
            1
        }
    }

    pub fn multiplier(&self) -> u32 {
        Self::multiplier_for(self.total_points)
    }

    pub fn has_badge(&self, badge_id: &str) -> bool {
        self.badges.iter().any(|b| b.id == badge_id)
    }

    pub fn has_badge_named(&self, name: &str) -> bool {
        self.badges.iter().any(|b| b.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_child_id() {
        let id = Child::generate_id(1703123456789);
        assert_eq!(id, "child::1703123456789");
    }

    #[test]
    fn test_age_group_brackets() {
        assert_eq!(AgeGroup::from_age(5), AgeGroup::FiveToSeven);
        assert_eq!(AgeGroup::from_age(7), AgeGroup::FiveToSeven);
        assert_eq!(AgeGroup::from_age(8), AgeGroup::EightToEleven);
        assert_eq!(AgeGroup::from_age(11), AgeGroup::EightToEleven);
        assert_eq!(AgeGroup::from_age(12), AgeGroup::TwelveToFourteen);
        assert_eq!(AgeGroup::from_age(14), AgeGroup::TwelveToFourteen);
        assert_eq!(AgeGroup::from_age(15), AgeGroup::FifteenToSeventeen);
        assert_eq!(AgeGroup::from_age(17), AgeGroup::FifteenToSeventeen);
    }

    #[test]
    fn test_age_group_clamps_out_of_range_ages() {
        assert_eq!(AgeGroup::from_age(3), AgeGroup::FiveToSeven);
        assert_eq!(AgeGroup::from_age(19), AgeGroup::FifteenToSeventeen);
    }

    #[test]
    fn test_level_derivation() {
        assert_eq!(Child::level_for(0), 1);
        assert_eq!(Child::level_for(499), 1);
        assert_eq!(Child::level_for(500), 2);
        assert_eq!(Child::level_for(1250), 3);
        assert_eq!(Child::level_for(5000), 11);
    }

    #[test]
    fn test_multiplier_tiers() {
        assert_eq!(Child::multiplier_for(0), 1);
        assert_eq!(Child::multiplier_for(2_499), 1);
        assert_eq!(Child::multiplier_for(2_500), 2);
        assert_eq!(Child::multiplier_for(4_999), 2);
        assert_eq!(Child::multiplier_for(5_000), 3);
    }

    #[test]
    fn test_new_child_starts_at_level_one() {
        let child = Child::new("Sam".to_string(), 9, Gender::Boy, Utc::now());
        assert_eq!(child.level, 1);
        assert_eq!(child.points, 0);
        assert_eq!(child.total_points, 0);
        assert_eq!(child.age_group, AgeGroup::EightToEleven);
        assert!(!child.mail_verified);
    }
}
