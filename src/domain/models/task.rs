//! Domain model for tasks (chores) assigned to a child.
//!
//! A task moves through a three-state lifecycle: the child marks it
//! `Completed`, then a parent either approves it (terminal, awards points)
//! or rejects it back to `Pending`. Completion proof is a closed set of
//! shapes rather than loose optional fields, so a task can never carry a
//! half-filled proof.

use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskCategory {
    Chores,
    Learning,
    Kindness,
    Health,
    Creativity,
}

impl TaskCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskCategory::Chores => "chores",
            TaskCategory::Learning => "learning",
            TaskCategory::Kindness => "kindness",
            TaskCategory::Health => "health",
            TaskCategory::Creativity => "creativity",
        }
    }
}

impl std::str::FromStr for TaskCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chores" => Ok(TaskCategory::Chores),
            "learning" => Ok(TaskCategory::Learning),
            "kindness" => Ok(TaskCategory::Kindness),
            "health" => Ok(TaskCategory::Health),
            "creativity" => Ok(TaskCategory::Creativity),
            other => Err(format!("Unknown task category: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
    Approved,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
            TaskStatus::Approved => "approved",
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "completed" => Ok(TaskStatus::Completed),
            "approved" => Ok(TaskStatus::Approved),
            other => Err(format!("Unknown task status: {}", other)),
        }
    }
}

/// Evidence attached when a child marks a task complete.
///
/// Photo references start as local (device) refs and are swapped for
/// durable URLs once the background upload lands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskProof {
    None,
    Photo { photo_ref: String },
    Timer { seconds: u32 },
    Both { photo_ref: String, seconds: u32 },
}

impl TaskProof {
    pub fn from_parts(photo_ref: Option<String>, seconds: Option<u32>) -> Self {
        match (photo_ref, seconds) {
            (Some(photo_ref), Some(seconds)) => TaskProof::Both { photo_ref, seconds },
            (Some(photo_ref), None) => TaskProof::Photo { photo_ref },
            (None, Some(seconds)) => TaskProof::Timer { seconds },
            (None, None) => TaskProof::None,
        }
    }

    pub fn photo_ref(&self) -> Option<&str> {
        match self {
            TaskProof::Photo { photo_ref } | TaskProof::Both { photo_ref, .. } => Some(photo_ref),
            _ => None,
        }
    }

    pub fn seconds(&self) -> Option<u32> {
        match self {
            TaskProof::Timer { seconds } | TaskProof::Both { seconds, .. } => Some(*seconds),
            _ => None,
        }
    }

    pub fn has_photo(&self) -> bool {
        self.photo_ref().is_some()
    }

    /// Replace the photo reference, preserving any timer component.
    /// A proof without a photo is returned unchanged.
    pub fn with_photo_ref(self, new_ref: String) -> Self {
        match self {
            TaskProof::Photo { .. } => TaskProof::Photo { photo_ref: new_ref },
            TaskProof::Both { seconds, .. } => TaskProof::Both { photo_ref: new_ref, seconds },
            other => other,
        }
    }
}

/// Why a task carries zero points even though it normally would not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoPointsReason {
    /// Generated by a refresh past the free daily regeneration quota.
    RegenerationLimit,
    /// Created past the daily cap on point-earning custom tasks.
    CustomTaskLimit,
}

impl NoPointsReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoPointsReason::RegenerationLimit => "regeneration_limit",
            NoPointsReason::CustomTaskLimit => "custom_task_limit",
        }
    }
}

impl std::str::FromStr for NoPointsReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "regeneration_limit" => Ok(NoPointsReason::RegenerationLimit),
            "custom_task_limit" => Ok(NoPointsReason::CustomTaskLimit),
            other => Err(format!("Unknown no-points reason: {}", other)),
        }
    }
}

impl std::fmt::Display for NoPointsReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoPointsReason::RegenerationLimit => {
                write!(f, "Daily task refresh limit reached, so this set earns no points")
            }
            NoPointsReason::CustomTaskLimit => {
                write!(f, "Daily limit of point-earning custom tasks reached")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub child_id: String,
    pub title: String,
    pub description: String,
    pub category: TaskCategory,
    /// Points this task pays on approval, before any multiplier.
    pub points: u32,
    pub status: TaskStatus,
    pub due_date: NaiveDate,
    pub is_custom: bool,
    pub proof: TaskProof,
    pub no_points_reason: Option<NoPointsReason>,
    pub completed_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    /// Set when completion evidence was checked (parent approval counts).
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Generate a task ID from a timestamp plus a short random suffix,
    /// so tasks created in the same millisecond still get distinct IDs.
    pub fn generate_id(timestamp_millis: u64) -> String {
        let suffix: u32 = rand::rng().random_range(0..0x10000);
        format!("task-{}-{:04x}", timestamp_millis, suffix)
    }

    pub fn is_approved(&self) -> bool {
        self.status == TaskStatus::Approved
    }

    pub fn earns_points(&self) -> bool {
        self.points > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_generate_task_id_format() {
        let id = Task::generate_id(1703123456789);
        assert!(id.starts_with("task-1703123456789-"));
        let suffix = id.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 4);
    }

    #[test]
    fn test_generate_task_ids_are_unique_within_a_millisecond() {
        let a = Task::generate_id(1703123456789);
        let b = Task::generate_id(1703123456789);
        // Collisions are possible in principle but vanishingly unlikely.
        assert_ne!(a, b);
    }

    #[test]
    fn test_category_round_trip() {
        for category in [
            TaskCategory::Chores,
            TaskCategory::Learning,
            TaskCategory::Kindness,
            TaskCategory::Health,
            TaskCategory::Creativity,
        ] {
            assert_eq!(TaskCategory::from_str(category.as_str()).unwrap(), category);
        }
        assert!(TaskCategory::from_str("mischief").is_err());
    }

    #[test]
    fn test_proof_from_parts() {
        assert_eq!(TaskProof::from_parts(None, None), TaskProof::None);
        assert_eq!(
            TaskProof::from_parts(Some("local://p1".to_string()), None),
            TaskProof::Photo { photo_ref: "local://p1".to_string() }
        );
        assert_eq!(
            TaskProof::from_parts(None, Some(300)),
            TaskProof::Timer { seconds: 300 }
        );
        assert_eq!(
            TaskProof::from_parts(Some("local://p1".to_string()), Some(300)),
            TaskProof::Both { photo_ref: "local://p1".to_string(), seconds: 300 }
        );
    }

    #[test]
    fn test_with_photo_ref_preserves_timer() {
        let proof = TaskProof::Both { photo_ref: "local://p1".to_string(), seconds: 120 };
        let swapped = proof.with_photo_ref("https://cdn/p1.jpg".to_string());
        assert_eq!(swapped.photo_ref(), Some("https://cdn/p1.jpg"));
        assert_eq!(swapped.seconds(), Some(120));

        let timer_only = TaskProof::Timer { seconds: 60 };
        assert_eq!(timer_only.clone().with_photo_ref("x".to_string()), timer_only);
    }
}
