//! Child profile operations.
//!
//! ## Business Rules
//! - Adding a child is optimistic: the plan's limit is checked locally,
//!   the child and their first daily tasks land immediately, and a
//!   verification ticket asks the remote side to re-check the limit
//! - A remote rejection rolls the whole add back, tasks included
//! - Removing a child cascades to their tasks and clears a dangling
//!   active selection

use anyhow::{anyhow, Result};
use chrono::Utc;
use log::{debug, info, warn};

use crate::domain::commands::children::{
    AddChildCommand, AddChildOutcome, AddChildResult, RemoveChildResult,
};
use crate::domain::models::{Child, Task};
use crate::domain::subscription_limits;
use crate::domain::task_generator;
use crate::sync::{SyncTask, SyncTicket};

use super::{require_child_mut, require_user, require_user_mut, FamilyStore};

impl FamilyStore {
    /// Add a child profile, generate their first daily tasks and queue the
    /// remote verification. The plan's child limit answers with
    /// `LimitReached` rather than an error.
    pub fn add_child(&self, cmd: AddChildCommand) -> Result<AddChildOutcome> {
        let name = cmd.name.trim();
        if name.is_empty() {
            return Err(anyhow!("Child name cannot be empty"));
        }

        let mut guard = self.state();
        let state = &mut *guard;
        let user = require_user_mut(state)?;

        let limits = subscription_limits::plan_limits(user.subscription.as_ref());
        if let Some(max) = limits.max_children {
            if user.children.len() as u32 >= max {
                info!("Child limit {} reached; add refused locally", max);
                return Ok(AddChildOutcome::LimitReached {
                    max_children: max,
                    message: format!(
                        "Your plan includes up to {} child profile{}. Upgrade to add more.",
                        max,
                        if max == 1 { "" } else { "s" }
                    ),
                });
            }
        }

        let now = Utc::now();
        let mut child = Child::new(name.to_string(), cmd.age, cmd.gender, now);
        // Adds inside the same millisecond must still get distinct ids.
        let mut millis = now.timestamp_millis() as u64;
        while user.child(&child.id).is_some() {
            millis += 1;
            child.id = Child::generate_id(millis);
        }

        let tasks: Vec<Task> =
            task_generator::generate(&child.id, child.age_group, self.config.daily_task_count);

        info!(
            "👧 Added {} (ages {}) with {} starter tasks",
            child.name,
            child.age_group,
            tasks.len()
        );

        let result = AddChildResult {
            child: child.clone(),
            tasks: tasks.clone(),
            tickets: vec![SyncTicket::new(SyncTask::VerifyChildAdd { child_id: child.id.clone() })],
            success_message: format!("{} joined the club!", child.name),
        };

        user.children.push(child);
        state.tasks.extend(tasks);

        Ok(AddChildOutcome::Added(result))
    }

    /// Remove a child profile and everything hanging off it.
    pub fn remove_child(&self, child_id: &str) -> Result<RemoveChildResult> {
        let mut guard = self.state();
        let state = &mut *guard;
        let user = require_user_mut(state)?;

        let pos = user
            .children
            .iter()
            .position(|c| c.id == child_id)
            .ok_or_else(|| anyhow!("Child not found: {}", child_id))?;
        let removed = user.children.remove(pos);

        let task_ids: Vec<String> = state
            .tasks
            .iter()
            .filter(|t| t.child_id == child_id)
            .map(|t| t.id.clone())
            .collect();
        state.tasks.retain(|t| t.child_id != child_id);

        if state.active_child_id.as_deref() == Some(child_id) {
            state.active_child_id = None;
            state.child_mode = false;
        }
        state.regen_counts.retain(|(cid, _), _| cid != child_id);

        info!("Removed {} and {} of their tasks", removed.name, task_ids.len());

        Ok(RemoveChildResult {
            removed_task_count: task_ids.len(),
            tickets: vec![SyncTicket::new(SyncTask::DeleteChild {
                child_id: child_id.to_string(),
                task_ids,
            })],
            success_message: format!("Removed {} from your family", removed.name),
        })
    }

    pub fn set_active_child(&self, child_id: &str) -> Result<()> {
        let mut state = self.state();
        let user = require_user(&state)?;
        if user.child(child_id).is_none() {
            return Err(anyhow!("Child not found: {}", child_id));
        }
        state.active_child_id = Some(child_id.to_string());
        debug!("Active child is now {}", child_id);
        Ok(())
    }

    pub fn active_child_id(&self) -> Option<String> {
        self.state().active_child_id.clone()
    }

    pub fn active_child(&self) -> Option<Child> {
        let state = self.state();
        let active = state.active_child_id.as_deref()?;
        state.current_user.as_ref()?.child(active).cloned()
    }

    pub fn children_snapshot(&self) -> Vec<Child> {
        self.state()
            .current_user
            .as_ref()
            .map(|u| u.children.clone())
            .unwrap_or_default()
    }

    /// Point the child's avatar at a local (device) reference; the upload
    /// ticket swaps in the durable URL later.
    pub fn update_child_avatar(&self, child_id: &str, local_ref: &str) -> Result<Vec<SyncTicket>> {
        let mut state = self.state();
        let user = require_user_mut(&mut state)?;
        let child = require_child_mut(user, child_id)?;
        child.avatar_url = Some(local_ref.to_string());
        debug!("Avatar for {} set to a local reference", child_id);
        Ok(vec![SyncTicket::new(SyncTask::UploadAvatar { child_id: child_id.to_string() })])
    }

    /// Compensation for a remotely-rejected add: the child and their tasks
    /// disappear as if the add never happened.
    pub(crate) fn rollback_child_add(&self, child_id: &str) {
        let mut guard = self.state();
        let state = &mut *guard;

        let user = match state.current_user.as_mut() {
            Some(user) => user,
            None => {
                warn!("Rollback of {} requested with no user signed in", child_id);
                return;
            }
        };

        let before = user.children.len();
        user.children.retain(|c| c.id != child_id);
        if user.children.len() == before {
            warn!("Rollback of {} requested but the child is already gone", child_id);
            return;
        }

        state.tasks.retain(|t| t.child_id != child_id);
        if state.active_child_id.as_deref() == Some(child_id) {
            state.active_child_id = None;
            state.child_mode = false;
        }
        state.regen_counts.retain(|(cid, _), _| cid != child_id);

        warn!("⏪ Rolled back child {}: the remote side refused the add", child_id);
    }

    /// Swap the avatar's local reference for the uploaded durable URL.
    pub(crate) fn apply_avatar_upload(&self, child_id: &str, durable_url: &str) -> Result<()> {
        let mut state = self.state();
        let user = require_user_mut(&mut state)?;
        let child = require_child_mut(user, child_id)?;
        child.avatar_url = Some(durable_url.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{signed_in_store, store_with_child};
    use super::*;
    use crate::domain::models::{Gender, TaskStatus};
    use chrono::Local;

    fn add(store: &FamilyStore, name: &str) -> AddChildOutcome {
        store
            .add_child(AddChildCommand { name: name.to_string(), age: 8, gender: Gender::Boy })
            .unwrap()
    }

    #[test]
    fn test_add_child_generates_daily_tasks() {
        let store = signed_in_store();
        let outcome = add(&store, "Sam");

        let result = match outcome {
            AddChildOutcome::Added(result) => result,
            AddChildOutcome::LimitReached { .. } => panic!("unexpected limit"),
        };

        assert_eq!(result.tasks.len(), store.config().daily_task_count);
        let today = Local::now().date_naive();
        for task in &result.tasks {
            assert_eq!(task.child_id, result.child.id);
            assert_eq!(task.status, TaskStatus::Pending);
            assert_eq!(task.due_date, today);
        }
        assert!(matches!(
            result.tickets[0].task,
            SyncTask::VerifyChildAdd { ref child_id } if *child_id == result.child.id
        ));
    }

    #[test]
    fn test_add_child_respects_the_plan_limit() {
        let store = signed_in_store();
        assert!(matches!(add(&store, "Sam"), AddChildOutcome::Added(_)));

        match add(&store, "Riley") {
            AddChildOutcome::LimitReached { max_children, message } => {
                assert_eq!(max_children, 1);
                assert!(message.contains("1 child profile"));
            }
            AddChildOutcome::Added(_) => panic!("limit should have applied"),
        }
    }

    #[test]
    fn test_premium_allows_many_children_with_distinct_ids() {
        let store = signed_in_store();
        store.apply_purchase("premium").unwrap();

        let mut ids = Vec::new();
        for name in ["Ada", "Ben", "Cleo", "Dana"] {
            match add(&store, name) {
                AddChildOutcome::Added(result) => ids.push(result.child.id),
                AddChildOutcome::LimitReached { .. } => panic!("premium has no cap"),
            }
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn test_add_child_rejects_blank_names() {
        let store = signed_in_store();
        let result = store.add_child(AddChildCommand {
            name: "   ".to_string(),
            age: 8,
            gender: Gender::Other,
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_remove_child_cascades() {
        let (store, child_id) = store_with_child();
        store.enter_child_mode(&child_id).unwrap();

        let result = store.remove_child(&child_id).unwrap();
        assert_eq!(result.removed_task_count, store.config().daily_task_count);

        assert!(store.child_snapshot(&child_id).is_none());
        assert!(store.tasks_for_child_snapshot(&child_id).is_empty());
        assert!(store.active_child_id().is_none());
        assert!(!store.child_mode());

        match &result.tickets[0].task {
            SyncTask::DeleteChild { child_id: id, task_ids } => {
                assert_eq!(*id, child_id);
                assert_eq!(task_ids.len(), result.removed_task_count);
            }
            other => panic!("unexpected ticket {:?}", other),
        }
    }

    #[test]
    fn test_remove_unknown_child_is_an_error() {
        let store = signed_in_store();
        assert!(store.remove_child("child::nope").is_err());
    }

    #[test]
    fn test_rollback_undoes_the_whole_add() {
        let (store, child_id) = store_with_child();
        store.enter_child_mode(&child_id).unwrap();

        store.rollback_child_add(&child_id);

        assert!(store.child_snapshot(&child_id).is_none());
        assert!(store.tasks_for_child_snapshot(&child_id).is_empty());
        assert!(store.active_child_id().is_none());
        assert!(!store.child_mode());
    }

    #[test]
    fn test_rollback_of_an_unknown_child_is_harmless() {
        let (store, child_id) = store_with_child();
        store.rollback_child_add("child::nope");
        assert!(store.child_snapshot(&child_id).is_some());
    }

    #[test]
    fn test_active_child_selection() {
        let (store, child_id) = store_with_child();

        assert!(store.set_active_child("child::nope").is_err());
        store.set_active_child(&child_id).unwrap();
        assert_eq!(store.active_child().unwrap().id, child_id);
    }

    #[test]
    fn test_avatar_local_ref_then_durable_swap() {
        let (store, child_id) = store_with_child();

        let tickets = store.update_child_avatar(&child_id, "file:///tmp/pic.jpg").unwrap();
        assert!(matches!(tickets[0].task, SyncTask::UploadAvatar { .. }));
        assert_eq!(
            store.child_snapshot(&child_id).unwrap().avatar_url.as_deref(),
            Some("file:///tmp/pic.jpg")
        );

        store.apply_avatar_upload(&child_id, "https://cdn.posty.club/avatars/1.jpg").unwrap();
        assert_eq!(
            store.child_snapshot(&child_id).unwrap().avatar_url.as_deref(),
            Some("https://cdn.posty.club/avatars/1.jpg")
        );
    }
}
