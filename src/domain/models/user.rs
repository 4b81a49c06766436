//! Domain model for the signed-in parent account.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::child::Child;
use super::subscription::Subscription;

/// The parent account that owns children, the subscription and the
/// shipping address. Exactly one user is signed in at a time; children
/// are nested so a snapshot of the user is a snapshot of the family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    /// Parental control passcode (4 digits). `None` until the parent sets one.
    pub passcode: Option<String>,
    pub shipping_address: Option<ShippingAddress>,
    pub subscription: Option<Subscription>,
    pub children: Vec<Child>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Generate a user ID from a timestamp
    pub fn generate_id(timestamp_millis: u64) -> String {
        format!("user::{}", timestamp_millis)
    }

    pub fn new(name: String, email: String, now: DateTime<Utc>) -> Self {
        User {
            id: Self::generate_id(now.timestamp_millis() as u64),
            email,
            name,
            passcode: None,
            shipping_address: None,
            subscription: None,
            children: Vec::new(),
            created_at: now,
        }
    }

    pub fn child(&self, child_id: &str) -> Option<&Child> {
        self.children.iter().find(|c| c.id == child_id)
    }

    pub fn child_mut(&mut self, child_id: &str) -> Option<&mut Child> {
        self.children.iter_mut().find(|c| c.id == child_id)
    }
}

/// Where Posty sends physical mail for this family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub recipient_name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}
