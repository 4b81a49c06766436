//! Domain model for earned badges and mascot stickers.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A badge a child has earned. Achievement badges reuse the achievement's
/// stable id; mascot stickers get generated ids and are deduplicated by
/// name instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Badge {
    pub id: String,
    pub child_id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub earned_at: DateTime<Utc>,
    pub redeemed: bool,
}

impl Badge {
    /// Generate a badge ID for badges that have no stable achievement id.
    pub fn generate_id(timestamp_millis: u64) -> String {
        let suffix: u32 = rand::rng().random_range(0..0x10000);
        format!("badge-{}-{:04x}", timestamp_millis, suffix)
    }

    pub fn new(
        id: String,
        child_id: String,
        name: String,
        description: String,
        icon: String,
        earned_at: DateTime<Utc>,
    ) -> Self {
        Badge { id, child_id, name, description, icon, earned_at, redeemed: false }
    }
}
