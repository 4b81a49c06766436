//! In-memory reference gateway.
//!
//! Backs the full `RemoteGateway` surface with `HashMap` tables behind a
//! mutex. This is what tests run against: it enforces the same
//! authoritative child-limit check a production backend would, and exposes
//! failure-injection knobs for upload and refresh paths.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::{debug, info};

use crate::domain::models::SubscriptionPlan;
use crate::domain::subscription_limits::PlanLimits;

use super::records::{
    RemoteBadgeRecord, RemoteChildRecord, RemoteShippingRecord, RemoteSubscriptionRecord,
    RemoteTaskRecord, RemoteUserRecord,
};
use super::traits::{
    AssetKind, AssetSync, BadgeSync, ChildSync, ShippingSync, SubscriptionSync, TaskSync, UserSync,
};

#[derive(Default)]
struct GatewayState {
    users: HashMap<String, RemoteUserRecord>,
    children: HashMap<String, RemoteChildRecord>,
    tasks: HashMap<String, RemoteTaskRecord>,
    /// Keyed by user id; one subscription per family.
    subscriptions: HashMap<String, RemoteSubscriptionRecord>,
    /// Keyed by (child id, badge id).
    badges: HashMap<(String, String), RemoteBadgeRecord>,
    /// Keyed by user id; one active address per family.
    shipping: HashMap<String, RemoteShippingRecord>,
    child_limit_overrides: HashMap<String, u32>,
    uploads_to_fail: u32,
    fetches_to_fail: u32,
    upload_counter: u64,
}

#[derive(Default)]
pub struct InMemoryGateway {
    state: Mutex<GatewayState>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, GatewayState> {
        // A poisoned lock still holds usable table data.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Override the authoritative child limit for one user, instead of
    /// deriving it from the stored subscription.
    pub fn set_child_limit(&self, user_id: &str, limit: u32) {
        self.state().child_limit_overrides.insert(user_id.to_string(), limit);
    }

    /// Make the next `n` asset uploads fail.
    pub fn fail_next_uploads(&self, n: u32) {
        self.state().uploads_to_fail = n;
    }

    /// Make the next `n` `fetch_user` calls fail, for retry/backoff tests.
    pub fn fail_fetches(&self, n: u32) {
        self.state().fetches_to_fail = n;
    }

    pub fn child_count(&self, user_id: &str) -> usize {
        self.state().children.values().filter(|c| c.user_id == user_id).count()
    }

    pub fn stored_task(&self, task_id: &str) -> Option<RemoteTaskRecord> {
        self.state().tasks.get(task_id).cloned()
    }

    pub fn stored_child(&self, child_id: &str) -> Option<RemoteChildRecord> {
        self.state().children.get(child_id).cloned()
    }

    fn child_limit_locked(state: &GatewayState, user_id: &str) -> Option<u32> {
        if let Some(limit) = state.child_limit_overrides.get(user_id) {
            return Some(*limit);
        }
        let plan = state
            .subscriptions
            .get(user_id)
            .and_then(|s| SubscriptionPlan::from_str(&s.plan).ok())
            .unwrap_or(SubscriptionPlan::Free);
        PlanLimits::for_plan(plan).max_children
    }

    fn user_child_ids_locked(state: &GatewayState, user_id: &str) -> Vec<String> {
        state
            .children
            .values()
            .filter(|c| c.user_id == user_id)
            .map(|c| c.id.clone())
            .collect()
    }
}

#[async_trait]
impl UserSync for InMemoryGateway {
    async fn create_user(&self, record: &RemoteUserRecord) -> Result<RemoteUserRecord> {
        let mut state = self.state();
        if state.users.values().any(|u| u.email == record.email && u.id != record.id) {
            return Err(anyhow!("Email already registered: {}", record.email));
        }
        state.users.insert(record.id.clone(), record.clone());
        debug!("Gateway stored user {}", record.id);
        Ok(record.clone())
    }

    async fn fetch_user(&self, user_id: &str) -> Result<Option<RemoteUserRecord>> {
        let mut state = self.state();
        if state.fetches_to_fail > 0 {
            state.fetches_to_fail -= 1;
            return Err(anyhow!("Injected fetch failure"));
        }
        Ok(state.users.get(user_id).cloned())
    }

    async fn fetch_user_by_email(&self, email: &str) -> Result<Option<RemoteUserRecord>> {
        Ok(self.state().users.values().find(|u| u.email == email).cloned())
    }

    async fn update_user(&self, record: &RemoteUserRecord) -> Result<()> {
        self.state().users.insert(record.id.clone(), record.clone());
        Ok(())
    }
}

#[async_trait]
impl ChildSync for InMemoryGateway {
    async fn create_child(&self, record: &RemoteChildRecord) -> Result<Option<RemoteChildRecord>> {
        let mut state = self.state();

        let limit = Self::child_limit_locked(&state, &record.user_id);
        let current = state
            .children
            .values()
            .filter(|c| c.user_id == record.user_id && c.id != record.id)
            .count() as u32;
        if let Some(max) = limit {
            if current >= max {
                info!(
                    "Gateway rejected child {} for {}: limit {} reached",
                    record.id, record.user_id, max
                );
                return Ok(None);
            }
        }

        state.children.insert(record.id.clone(), record.clone());
        Ok(Some(record.clone()))
    }

    async fn update_child(&self, record: &RemoteChildRecord) -> Result<()> {
        self.state().children.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn delete_child(&self, child_id: &str) -> Result<()> {
        let mut state = self.state();
        state.children.remove(child_id);
        state.badges.retain(|(owner, _), _| owner != child_id);
        Ok(())
    }

    async fn list_children(&self, user_id: &str) -> Result<Vec<RemoteChildRecord>> {
        let mut children: Vec<RemoteChildRecord> = self
            .state()
            .children
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        children.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(children)
    }
}

#[async_trait]
impl TaskSync for InMemoryGateway {
    async fn upsert_task(&self, record: &RemoteTaskRecord) -> Result<()> {
        self.state().tasks.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn upsert_tasks(&self, records: &[RemoteTaskRecord]) -> Result<()> {
        let mut state = self.state();
        for record in records {
            state.tasks.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    async fn delete_tasks(&self, task_ids: &[String]) -> Result<()> {
        let mut state = self.state();
        for id in task_ids {
            state.tasks.remove(id);
        }
        Ok(())
    }

    async fn list_tasks(&self, user_id: &str) -> Result<Vec<RemoteTaskRecord>> {
        let state = self.state();
        let child_ids = Self::user_child_ids_locked(&state, user_id);
        let mut tasks: Vec<RemoteTaskRecord> = state
            .tasks
            .values()
            .filter(|t| child_ids.iter().any(|id| *id == t.child_id))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(tasks)
    }
}

#[async_trait]
impl SubscriptionSync for InMemoryGateway {
    async fn fetch_subscription(
        &self,
        user_id: &str,
    ) -> Result<Option<RemoteSubscriptionRecord>> {
        Ok(self.state().subscriptions.get(user_id).cloned())
    }

    async fn save_subscription(&self, record: &RemoteSubscriptionRecord) -> Result<()> {
        self.state().subscriptions.insert(record.user_id.clone(), record.clone());
        Ok(())
    }

    async fn fetch_plan_tag(&self, user_id: &str) -> Result<Option<String>> {
        Ok(self.state().subscriptions.get(user_id).map(|s| s.plan.clone()))
    }

    async fn save_plan_tag(&self, user_id: &str, plan: &str) -> Result<()> {
        let mut state = self.state();
        match state.subscriptions.get_mut(user_id) {
            Some(record) => {
                record.plan = plan.to_string();
                Ok(())
            }
            None => Err(anyhow!("No subscription on record for {}", user_id)),
        }
    }
}

#[async_trait]
impl BadgeSync for InMemoryGateway {
    async fn upsert_badge(&self, record: &RemoteBadgeRecord) -> Result<()> {
        self.state()
            .badges
            .insert((record.child_id.clone(), record.id.clone()), record.clone());
        Ok(())
    }

    async fn list_badges(&self, user_id: &str) -> Result<Vec<RemoteBadgeRecord>> {
        let state = self.state();
        let child_ids = Self::user_child_ids_locked(&state, user_id);
        let mut badges: Vec<RemoteBadgeRecord> = state
            .badges
            .values()
            .filter(|b| child_ids.iter().any(|id| *id == b.child_id))
            .cloned()
            .collect();
        badges.sort_by(|a, b| a.earned_at.cmp(&b.earned_at).then(a.id.cmp(&b.id)));
        Ok(badges)
    }
}

#[async_trait]
impl ShippingSync for InMemoryGateway {
    async fn save_shipping_address(&self, record: &RemoteShippingRecord) -> Result<()> {
        self.state().shipping.insert(record.user_id.clone(), record.clone());
        Ok(())
    }

    async fn fetch_shipping_address(
        &self,
        user_id: &str,
    ) -> Result<Option<RemoteShippingRecord>> {
        Ok(self.state().shipping.get(user_id).cloned())
    }
}

#[async_trait]
impl AssetSync for InMemoryGateway {
    async fn upload_asset(&self, kind: AssetKind, local_ref: &str) -> Result<String> {
        let mut state = self.state();
        if state.uploads_to_fail > 0 {
            state.uploads_to_fail -= 1;
            return Err(anyhow!("Injected upload failure for {}", local_ref));
        }
        state.upload_counter += 1;
        Ok(format!(
            "https://cdn.posty.club/{}/asset-{}.jpg",
            kind.as_str(),
            state.upload_counter
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Child, Gender, SignupType, Subscription, User};
    use crate::remote::records::{RemoteChildRecord, RemoteSubscriptionRecord, RemoteUserRecord};
    use chrono::Utc;

    fn child_record(user_id: &str, n: u32) -> RemoteChildRecord {
        let mut child = Child::new(format!("Kid {}", n), 8, Gender::Other, Utc::now());
        child.id = format!("child::{}", n);
        RemoteChildRecord::from_domain(user_id, &child)
    }

    #[tokio::test]
    async fn test_default_child_limit_is_the_free_row() {
        let gateway = InMemoryGateway::new();

        let first = gateway.create_child(&child_record("user::1", 1)).await.unwrap();
        assert!(first.is_some());

        let second = gateway.create_child(&child_record("user::1", 2)).await.unwrap();
        assert!(second.is_none());
        assert_eq!(gateway.child_count("user::1"), 1);
    }

    #[tokio::test]
    async fn test_limit_follows_the_stored_subscription() {
        let gateway = InMemoryGateway::new();
        let sub = Subscription::new(SubscriptionPlan::Premium, SignupType::First, Utc::now());
        gateway
            .save_subscription(&RemoteSubscriptionRecord::from_domain("user::1", &sub))
            .await
            .unwrap();

        for n in 0..10 {
            let accepted = gateway.create_child(&child_record("user::1", n)).await.unwrap();
            assert!(accepted.is_some());
        }
    }

    #[tokio::test]
    async fn test_child_limit_override() {
        let gateway = InMemoryGateway::new();
        gateway.set_child_limit("user::1", 0);

        let rejected = gateway.create_child(&child_record("user::1", 1)).await.unwrap();
        assert!(rejected.is_none());
    }

    #[tokio::test]
    async fn test_recreating_the_same_child_is_not_a_second_slot() {
        let gateway = InMemoryGateway::new();
        let record = child_record("user::1", 1);

        assert!(gateway.create_child(&record).await.unwrap().is_some());
        assert!(gateway.create_child(&record).await.unwrap().is_some());
        assert_eq!(gateway.child_count("user::1"), 1);
    }

    #[tokio::test]
    async fn test_upload_failure_injection_is_consumed() {
        let gateway = InMemoryGateway::new();
        gateway.fail_next_uploads(1);

        assert!(gateway.upload_asset(AssetKind::TaskProof, "local://a.jpg").await.is_err());
        let url = gateway.upload_asset(AssetKind::TaskProof, "local://a.jpg").await.unwrap();
        assert!(url.starts_with("https://"));
        assert!(url.contains("proofs"));
    }

    #[tokio::test]
    async fn test_duplicate_email_is_rejected() {
        let gateway = InMemoryGateway::new();
        let a = RemoteUserRecord::from_domain(&User::new(
            "A".to_string(),
            "family@example.com".to_string(),
            Utc::now(),
        ));
        let mut b = a.clone();
        b.id = "user::other".to_string();

        gateway.create_user(&a).await.unwrap();
        assert!(gateway.create_user(&b).await.is_err());
    }

    #[tokio::test]
    async fn test_tasks_are_scoped_to_the_users_children() {
        let gateway = InMemoryGateway::new();
        gateway.set_child_limit("user::1", 5);
        gateway.set_child_limit("user::2", 5);

        gateway.create_child(&child_record("user::1", 1)).await.unwrap();
        gateway.create_child(&child_record("user::2", 2)).await.unwrap();

        let task_for = |child: &str, id: &str| RemoteTaskRecord {
            id: id.to_string(),
            child_id: child.to_string(),
            title: "t".to_string(),
            description: String::new(),
            category: "chores".to_string(),
            points: 5,
            status: "pending".to_string(),
            due_date: "2025-06-01".to_string(),
            is_custom: false,
            photo_url: None,
            timer_seconds: None,
            no_points_reason: None,
            completed_at: None,
            approved_at: None,
            verified_at: None,
            created_at: Utc::now().to_rfc3339(),
        };

        gateway.upsert_task(&task_for("child::1", "task-a")).await.unwrap();
        gateway.upsert_task(&task_for("child::2", "task-b")).await.unwrap();

        let visible = gateway.list_tasks("user::1").await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, "task-a");
    }
}
