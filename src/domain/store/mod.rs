//! Application state store.
//!
//! ## Key Responsibilities
//! - Own the single in-memory `AppState` behind a mutex
//! - Apply every business mutation synchronously under the lock
//! - Hand back `SyncTicket`s describing the remote work each optimistic
//!   mutation still owes
//! - Expose the confirm/compensate hooks the sync worker applies
//!   (child-add rollback, durable asset reference swaps)
//!
//! ## Business Rules
//! - One signed-in user at a time; children are nested under the user
//! - Business-rule rejections (limits, insufficient points) are structured
//!   return values; unknown ids and wrong-status transitions are errors
//! - The lock is never held across an `await`; all remote work happens in
//!   the worker against snapshots
//!
//! This file carries the container plus session, parental-control and
//! account-level operations. Child, task, point and mail operations live in
//! the sibling files as further `impl` blocks on [`FamilyStore`].

mod children;
mod mail;
mod points;
mod tasks;

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use chrono::{Duration, NaiveDate, Utc};
use log::{debug, info, warn};
use rand::Rng;

use crate::config::EngineConfig;
use crate::domain::commands::subscription::SubscriptionUpdateResult;
use crate::domain::models::{
    Child, ShippingAddress, Subscription, SubscriptionPlan, SignupType, Task, User,
};
use crate::domain::subscription_limits;
use crate::sync::{SyncTask, SyncTicket};

pub use mail::{MAIL_CODE_TTL_MINUTES, MAIL_METER_CYCLE_LEN, MAIL_METER_WINDOW_DAYS};
pub use points::STREAK_BONUS_POINTS;
pub use tasks::{CUSTOM_TASK_DAILY_POINT_CAP, FREE_REGENERATIONS_PER_DAY};

/// Days a fresh free trial runs before `free_trial_expires_at`.
pub const FREE_TRIAL_DAYS: i64 = 14;

/// Everything the engine knows locally. Private to the store tree; all
/// access goes through [`FamilyStore`] methods.
#[derive(Debug, Default)]
struct AppState {
    is_authenticated: bool,
    current_user: Option<User>,
    active_child_id: Option<String>,
    child_mode: bool,
    tasks: Vec<Task>,
    /// Regenerations used per (child, local date). A new date key is an
    /// implicitly reset counter.
    regen_counts: HashMap<(String, NaiveDate), u32>,
    is_loading_user_data: bool,
    has_completed_onboarding: bool,
}

/// The dependency-injected state container. Construct one per application
/// (or per test) and share it via `Arc`; there is no global instance.
pub struct FamilyStore {
    state: Mutex<AppState>,
    config: EngineConfig,
}

fn require_user(state: &AppState) -> Result<&User> {
    state.current_user.as_ref().ok_or_else(|| anyhow!("No user is signed in"))
}

fn require_user_mut(state: &mut AppState) -> Result<&mut User> {
    state.current_user.as_mut().ok_or_else(|| anyhow!("No user is signed in"))
}

fn require_child_mut<'a>(user: &'a mut User, child_id: &str) -> Result<&'a mut Child> {
    user.child_mut(child_id).ok_or_else(|| anyhow!("Child not found: {}", child_id))
}

/// The meter derives from the approved-task window; loads recompute it
/// from the incoming task list instead of trusting the stored percentage.
fn recompute_meters(user: &mut User, tasks: &[Task]) {
    let now = Utc::now();
    for child in user.children.iter_mut() {
        child.mail_meter_progress = mail::compute_mail_meter(tasks, &child.id, now);
    }
}

impl FamilyStore {
    pub fn new(config: EngineConfig) -> Self {
        FamilyStore { state: Mutex::new(AppState::default()), config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn state(&self) -> MutexGuard<'_, AppState> {
        // A poisoned lock still holds consistent data.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ---- session -----------------------------------------------------

    /// Hydrate the store for a signed-in user. Replaces whatever was
    /// there before; derived meters come from the task list, not the
    /// loaded records.
    pub fn sign_in(&self, mut user: User, tasks: Vec<Task>) {
        recompute_meters(&mut user, &tasks);
        let mut state = self.state();
        info!("Signed in as {} ({} children)", user.email, user.children.len());
        state.current_user = Some(user);
        state.tasks = tasks;
        state.is_authenticated = true;
        state.active_child_id = None;
        state.child_mode = false;
        state.regen_counts.clear();
    }

    pub fn sign_out(&self) {
        let mut state = self.state();
        if let Some(user) = &state.current_user {
            info!("Signing out {}", user.email);
        }
        let onboarded = state.has_completed_onboarding;
        *state = AppState::default();
        // Onboarding is a device preference, not account state.
        state.has_completed_onboarding = onboarded;
    }

    pub fn is_authenticated(&self) -> bool {
        self.state().is_authenticated
    }

    pub fn has_completed_onboarding(&self) -> bool {
        self.state().has_completed_onboarding
    }

    pub fn set_onboarding_complete(&self) {
        self.state().has_completed_onboarding = true;
    }

    pub fn is_loading_user_data(&self) -> bool {
        self.state().is_loading_user_data
    }

    pub(crate) fn set_loading(&self, loading: bool) {
        self.state().is_loading_user_data = loading;
    }

    /// Authoritative snapshot replacement from a background refresh.
    /// Last write wins; a selection pointing at a child that no longer
    /// exists is cleared, and meters are recomputed from the task list.
    pub fn replace_snapshot(&self, mut user: User, tasks: Vec<Task>) {
        recompute_meters(&mut user, &tasks);
        let mut state = self.state();
        debug!(
            "Replacing local snapshot: {} children, {} tasks",
            user.children.len(),
            tasks.len()
        );
        if let Some(active) = &state.active_child_id {
            if user.child(active).is_none() {
                state.active_child_id = None;
                state.child_mode = false;
            }
        }
        state.current_user = Some(user);
        state.tasks = tasks;
        state.is_authenticated = true;
    }

    // ---- snapshots ---------------------------------------------------

    pub fn current_user(&self) -> Option<User> {
        self.state().current_user.clone()
    }

    pub fn current_user_id(&self) -> Option<String> {
        self.state().current_user.as_ref().map(|u| u.id.clone())
    }

    pub fn child_snapshot(&self, child_id: &str) -> Option<Child> {
        self.state().current_user.as_ref().and_then(|u| u.child(child_id)).cloned()
    }

    pub fn task_snapshot(&self, task_id: &str) -> Option<Task> {
        self.state().tasks.iter().find(|t| t.id == task_id).cloned()
    }

    pub fn tasks_snapshot(&self, task_ids: &[String]) -> Vec<Task> {
        let state = self.state();
        task_ids
            .iter()
            .filter_map(|id| state.tasks.iter().find(|t| t.id == *id))
            .cloned()
            .collect()
    }

    pub fn tasks_for_child_snapshot(&self, child_id: &str) -> Vec<Task> {
        self.state().tasks.iter().filter(|t| t.child_id == child_id).cloned().collect()
    }

    pub fn subscription_snapshot(&self) -> Option<Subscription> {
        self.state().current_user.as_ref().and_then(|u| u.subscription.clone())
    }

    pub fn shipping_address_snapshot(&self) -> Option<ShippingAddress> {
        self.state().current_user.as_ref().and_then(|u| u.shipping_address.clone())
    }

    // ---- parental control --------------------------------------------

    /// Set the parental passcode. Exactly four ASCII digits.
    pub fn set_passcode(&self, passcode: &str) -> Result<Vec<SyncTicket>> {
        if passcode.len() != 4 || !passcode.chars().all(|c| c.is_ascii_digit()) {
            return Err(anyhow!("Passcode must be exactly 4 digits"));
        }
        let mut state = self.state();
        let user = require_user_mut(&mut state)?;
        user.passcode = Some(passcode.to_string());
        info!("Parental passcode updated");
        Ok(vec![SyncTicket::new(SyncTask::PushUser)])
    }

    /// Exact match against the stored passcode. No passcode set means
    /// nothing verifies.
    pub fn verify_passcode(&self, passcode: &str) -> Result<bool> {
        let state = self.state();
        let user = require_user(&state)?;
        Ok(user.passcode.as_deref() == Some(passcode))
    }

    /// Replace the passcode with a fresh random one and hand it back for
    /// the parent to see once.
    pub fn reset_passcode(&self) -> Result<crate::domain::commands::session::PasscodeResetResult> {
        let fresh = format!("{:04}", rand::rng().random_range(0..10_000u32));
        let mut state = self.state();
        let user = require_user_mut(&mut state)?;
        user.passcode = Some(fresh.clone());
        info!("Parental passcode reset");
        Ok(crate::domain::commands::session::PasscodeResetResult {
            passcode: fresh,
            tickets: vec![SyncTicket::new(SyncTask::PushUser)],
        })
    }

    pub fn child_mode(&self) -> bool {
        self.state().child_mode
    }

    /// Hand the device to a child: selects them and raises the child-mode
    /// flag that hides parent surfaces.
    pub fn enter_child_mode(&self, child_id: &str) -> Result<()> {
        let mut state = self.state();
        let user = require_user(&state)?;
        if user.child(child_id).is_none() {
            return Err(anyhow!("Child not found: {}", child_id));
        }
        state.active_child_id = Some(child_id.to_string());
        state.child_mode = true;
        debug!("Entered child mode for {}", child_id);
        Ok(())
    }

    /// Leave child mode, gated by the parental passcode. A wrong passcode
    /// leaves child mode on and returns `false`.
    pub fn exit_child_mode(&self, passcode: &str) -> Result<bool> {
        let mut state = self.state();
        let user = require_user(&state)?;
        if user.passcode.as_deref() != Some(passcode) {
            warn!("Child mode exit refused: wrong passcode");
            return Ok(false);
        }
        state.child_mode = false;
        Ok(true)
    }

    // ---- subscription and shipping -----------------------------------

    /// Record a billing-provider purchase. The provider already charged
    /// the family; this maps the product identifier onto a plan and
    /// replaces the stored subscription.
    pub fn apply_purchase(&self, product_identifier: &str) -> Result<SubscriptionUpdateResult> {
        let plan = SubscriptionPlan::from_product_identifier(product_identifier)
            .ok_or_else(|| anyhow!("Unknown plan identifier: {}", product_identifier))?;

        let mut state = self.state();
        let user = require_user_mut(&mut state)?;

        let signup_type = match &user.subscription {
            None => SignupType::First,
            // A repeat purchase is a returning signup, and returning
            // families never qualify for the free plan.
            Some(_) => {
                if plan == SubscriptionPlan::Free {
                    return Err(anyhow!("Returning families are not eligible for the free plan"));
                }
                SignupType::Returning
            }
        };

        let mut subscription = Subscription::new(plan, signup_type, Utc::now());
        // A family that already received mail keeps that fact across plan
        // changes.
        subscription.first_mail_shipped =
            user.subscription.as_ref().map(|s| s.first_mail_shipped).unwrap_or(false);

        info!("💳 Subscription is now {} ({:?})", subscription.plan, signup_type);
        user.subscription = Some(subscription.clone());

        Ok(SubscriptionUpdateResult {
            subscription,
            tickets: vec![SyncTicket::new(SyncTask::PushSubscription)],
        })
    }

    /// Start the free plan with a trial window. Only for families that
    /// have never subscribed before.
    pub fn start_free_trial(&self) -> Result<SubscriptionUpdateResult> {
        let mut state = self.state();
        let user = require_user_mut(&mut state)?;

        if !subscription_limits::is_eligible_for_free_plan(user.subscription.as_ref()) {
            return Err(anyhow!("This family is not eligible for the free plan"));
        }

        let now = Utc::now();
        let mut subscription = Subscription::new(SubscriptionPlan::Free, SignupType::First, now);
        subscription.free_trial_expires_at = Some(now + Duration::days(FREE_TRIAL_DAYS));

        info!("🎈 Free trial started, expires in {} days", FREE_TRIAL_DAYS);
        user.subscription = Some(subscription.clone());

        Ok(SubscriptionUpdateResult {
            subscription,
            tickets: vec![SyncTicket::new(SyncTask::PushSubscription)],
        })
    }

    pub fn update_shipping_address(&self, address: ShippingAddress) -> Result<Vec<SyncTicket>> {
        let mut state = self.state();
        let user = require_user_mut(&mut state)?;
        user.shipping_address = Some(address);
        info!("Shipping address updated");
        Ok(vec![SyncTicket::new(SyncTask::PushShippingAddress)])
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use crate::domain::commands::children::{AddChildCommand, AddChildOutcome};
    use crate::domain::models::Gender;

    pub(crate) fn signed_in_store() -> FamilyStore {
        let store = FamilyStore::new(EngineConfig::default());
        let user = User::new("Jordan".to_string(), "jordan@example.com".to_string(), Utc::now());
        store.sign_in(user, Vec::new());
        store
    }

    /// Store with a premium subscription (no child limit in the way) and
    /// one child already added. Returns the child's id.
    pub(crate) fn store_with_child() -> (FamilyStore, String) {
        let store = signed_in_store();
        store.apply_purchase("posty_premium_monthly").expect("purchase");
        let outcome = store
            .add_child(AddChildCommand {
                name: "Robin".to_string(),
                age: 9,
                gender: Gender::Girl,
            })
            .expect("add child");
        match outcome {
            AddChildOutcome::Added(result) => (store, result.child.id),
            AddChildOutcome::LimitReached { .. } => panic!("unexpected limit"),
        }
    }

    impl FamilyStore {
        /// Test hook: mutate a stored child in place (e.g. to backdate
        /// streak fields).
        pub(crate) fn with_child_mut<F: FnOnce(&mut Child)>(&self, child_id: &str, f: F) {
            let mut state = self.state();
            if let Some(child) =
                state.current_user.as_mut().and_then(|u| u.child_mut(child_id))
            {
                f(child);
            }
        }

        /// Test hook: mutate a stored task in place.
        pub(crate) fn with_task_mut<F: FnOnce(&mut Task)>(&self, task_id: &str, f: F) {
            let mut state = self.state();
            if let Some(task) = state.tasks.iter_mut().find(|t| t.id == task_id) {
                f(task);
            }
        }

        pub(crate) fn all_tasks(&self) -> Vec<Task> {
            self.state().tasks.clone()
        }
    }
}
