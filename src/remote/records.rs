//! Wire records for the remote sync gateway.
//!
//! Intermediate structs with string date/enum fields, mirroring what the
//! backing service actually stores. Domain types convert to and from these
//! explicitly; a record that fails to parse is a contract violation, not a
//! silent default.

use std::str::FromStr;

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::models::{
    Badge, Child, Gender, NoPointsReason, ShippingAddress, Subscription, Task, TaskProof, User,
};

fn parse_instant(field: &str, value: &str) -> Result<DateTime<Utc>> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map_err(|e| anyhow!("Failed to parse {}: {}", field, e))
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_instant_opt(field: &str, value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    value.map(|v| parse_instant(field, v)).transpose()
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| anyhow!("Failed to parse {}: {}", field, e))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteUserRecord {
    pub id: String,
    pub email: String,
    pub name: String,
    pub passcode: Option<String>,
    pub created_at: String,
}

impl RemoteUserRecord {
    pub fn from_domain(user: &User) -> Self {
        RemoteUserRecord {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            passcode: user.passcode.clone(),
            created_at: user.created_at.to_rfc3339(),
        }
    }

    /// Build a domain user shell. Children, subscription and address are
    /// fetched separately and attached by the caller.
    pub fn into_domain(self) -> Result<User> {
        Ok(User {
            id: self.id,
            email: self.email,
            name: self.name,
            passcode: self.passcode,
            shipping_address: None,
            subscription: None,
            children: Vec::new(),
            created_at: parse_instant("created_at", &self.created_at)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteChildRecord {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub age: u8,
    pub gender: String,
    pub age_group: String,
    pub avatar_url: Option<String>,
    pub points: u32,
    pub total_points: u32,
    pub level: u32,
    pub streak_days: u32,
    pub last_completed_date: Option<String>,
    pub mail_meter_progress: u8,
    pub mail_code: Option<String>,
    pub mail_code_expires_at: Option<String>,
    pub mail_verified: bool,
    pub created_at: String,
}

impl RemoteChildRecord {
    pub fn from_domain(user_id: &str, child: &Child) -> Self {
        RemoteChildRecord {
            id: child.id.clone(),
            user_id: user_id.to_string(),
            name: child.name.clone(),
            age: child.age,
            gender: child.gender.as_str().to_string(),
            age_group: child.age_group.as_str().to_string(),
            avatar_url: child.avatar_url.clone(),
            points: child.points,
            total_points: child.total_points,
            level: child.level,
            streak_days: child.streak_days,
            last_completed_date: child.last_completed_date.map(|d| d.format("%Y-%m-%d").to_string()),
            mail_meter_progress: child.mail_meter_progress,
            mail_code: child.mail_code.clone(),
            mail_code_expires_at: child.mail_code_expires_at.map(|t| t.to_rfc3339()),
            mail_verified: child.mail_verified,
            created_at: child.created_at.to_rfc3339(),
        }
    }

    /// Build a domain child. Badges travel on their own records and are
    /// attached by the caller.
    pub fn into_domain(self) -> Result<Child> {
        Ok(Child {
            id: self.id,
            name: self.name,
            age: self.age,
            gender: self.gender.parse().map_err(|e| anyhow!("{}", e))?,
            age_group: self.age_group.parse().map_err(|e| anyhow!("{}", e))?,
            avatar_url: self.avatar_url,
            points: self.points,
            total_points: self.total_points,
            level: self.level,
            streak_days: self.streak_days,
            last_completed_date: self
                .last_completed_date
                .as_deref()
                .map(|d| parse_date("last_completed_date", d))
                .transpose()?,
            badges: Vec::new(),
            mail_meter_progress: self.mail_meter_progress,
            mail_code: self.mail_code,
            mail_code_expires_at: parse_instant_opt(
                "mail_code_expires_at",
                self.mail_code_expires_at.as_deref(),
            )?,
            mail_verified: self.mail_verified,
            created_at: parse_instant("created_at", &self.created_at)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteTaskRecord {
    pub id: String,
    pub child_id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub points: u32,
    pub status: String,
    pub due_date: String,
    pub is_custom: bool,
    /// Proof travels as independent optional fields on the wire.
    pub photo_url: Option<String>,
    pub timer_seconds: Option<u32>,
    pub no_points_reason: Option<String>,
    pub completed_at: Option<String>,
    pub approved_at: Option<String>,
    pub verified_at: Option<String>,
    pub created_at: String,
}

impl RemoteTaskRecord {
    pub fn from_domain(task: &Task) -> Self {
        RemoteTaskRecord {
            id: task.id.clone(),
            child_id: task.child_id.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
            category: task.category.as_str().to_string(),
            points: task.points,
            status: task.status.as_str().to_string(),
            due_date: task.due_date.format("%Y-%m-%d").to_string(),
            is_custom: task.is_custom,
            photo_url: task.proof.photo_ref().map(|s| s.to_string()),
            timer_seconds: task.proof.seconds(),
            no_points_reason: task.no_points_reason.map(|r| r.as_str().to_string()),
            completed_at: task.completed_at.map(|t| t.to_rfc3339()),
            approved_at: task.approved_at.map(|t| t.to_rfc3339()),
            verified_at: task.verified_at.map(|t| t.to_rfc3339()),
            created_at: task.created_at.to_rfc3339(),
        }
    }

    pub fn into_domain(self) -> Result<Task> {
        Ok(Task {
            id: self.id,
            child_id: self.child_id,
            title: self.title,
            description: self.description,
            category: self.category.parse().map_err(|e| anyhow!("{}", e))?,
            points: self.points,
            status: self.status.parse().map_err(|e| anyhow!("{}", e))?,
            due_date: parse_date("due_date", &self.due_date)?,
            is_custom: self.is_custom,
            proof: TaskProof::from_parts(self.photo_url, self.timer_seconds),
            no_points_reason: self
                .no_points_reason
                .as_deref()
                .map(NoPointsReason::from_str)
                .transpose()
                .map_err(|e| anyhow!("{}", e))?,
            completed_at: parse_instant_opt("completed_at", self.completed_at.as_deref())?,
            approved_at: parse_instant_opt("approved_at", self.approved_at.as_deref())?,
            verified_at: parse_instant_opt("verified_at", self.verified_at.as_deref())?,
            created_at: parse_instant("created_at", &self.created_at)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSubscriptionRecord {
    pub id: String,
    pub user_id: String,
    pub plan: String,
    pub status: String,
    pub price: f64,
    pub mails_per_month: u32,
    pub free_trial_expires_at: Option<String>,
    pub first_mail_shipped: bool,
    pub signup_type: String,
    pub started_at: String,
}

impl RemoteSubscriptionRecord {
    pub fn from_domain(user_id: &str, subscription: &Subscription) -> Self {
        RemoteSubscriptionRecord {
            id: subscription.id.clone(),
            user_id: user_id.to_string(),
            plan: subscription.plan.as_str().to_string(),
            status: subscription.status.as_str().to_string(),
            price: subscription.price,
            mails_per_month: subscription.mails_per_month,
            free_trial_expires_at: subscription.free_trial_expires_at.map(|t| t.to_rfc3339()),
            first_mail_shipped: subscription.first_mail_shipped,
            signup_type: subscription.signup_type.as_str().to_string(),
            started_at: subscription.started_at.to_rfc3339(),
        }
    }

    pub fn into_domain(self) -> Result<Subscription> {
        Ok(Subscription {
            id: self.id,
            plan: self.plan.parse().map_err(|e| anyhow!("{}", e))?,
            status: self.status.parse().map_err(|e| anyhow!("{}", e))?,
            price: self.price,
            mails_per_month: self.mails_per_month,
            free_trial_expires_at: parse_instant_opt(
                "free_trial_expires_at",
                self.free_trial_expires_at.as_deref(),
            )?,
            first_mail_shipped: self.first_mail_shipped,
            signup_type: self.signup_type.parse().map_err(|e| anyhow!("{}", e))?,
            started_at: parse_instant("started_at", &self.started_at)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteBadgeRecord {
    pub id: String,
    pub child_id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub earned_at: String,
    pub redeemed: bool,
}

impl RemoteBadgeRecord {
    pub fn from_domain(badge: &Badge) -> Self {
        RemoteBadgeRecord {
            id: badge.id.clone(),
            child_id: badge.child_id.clone(),
            name: badge.name.clone(),
            description: badge.description.clone(),
            icon: badge.icon.clone(),
            earned_at: badge.earned_at.to_rfc3339(),
            redeemed: badge.redeemed,
        }
    }

    pub fn into_domain(self) -> Result<Badge> {
        Ok(Badge {
            id: self.id,
            child_id: self.child_id,
            name: self.name,
            description: self.description,
            icon: self.icon,
            earned_at: parse_instant("earned_at", &self.earned_at)?,
            redeemed: self.redeemed,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteShippingRecord {
    pub user_id: String,
    pub recipient_name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

impl RemoteShippingRecord {
    pub fn from_domain(user_id: &str, address: &ShippingAddress) -> Self {
        RemoteShippingRecord {
            user_id: user_id.to_string(),
            recipient_name: address.recipient_name.clone(),
            line1: address.line1.clone(),
            line2: address.line2.clone(),
            city: address.city.clone(),
            state: address.state.clone(),
            postal_code: address.postal_code.clone(),
            country: address.country.clone(),
        }
    }

    pub fn into_domain(self) -> ShippingAddress {
        ShippingAddress {
            recipient_name: self.recipient_name,
            line1: self.line1,
            line2: self.line2,
            city: self.city,
            state: self.state,
            postal_code: self.postal_code,
            country: self.country,
        }
    }
}
