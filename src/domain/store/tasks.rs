//! Task lifecycle operations.
//!
//! ## Business Rules
//! - `Pending → Completed → Approved`, with `Completed → Pending` on
//!   rejection; `Approved` is terminal, which is what prevents double
//!   awards
//! - Approval pays `task.points × multiplier(pre-award lifetime points)`
//!   and fans out into the mail meter and the achievement evaluator
//! - Three free regenerations per child per day; later ones still refresh
//!   the list but carry zero points
//! - At most five point-earning custom tasks per child per day

use anyhow::{anyhow, Result};
use chrono::{Local, Utc};
use log::{debug, info};

use crate::domain::achievements;
use crate::domain::commands::tasks::{
    AddCustomTaskCommand, AddCustomTaskResult, ApproveTaskResult, CompleteTaskCommand,
    CompleteTaskResult, RegenerateTasksResult, RejectTaskResult,
};
use crate::domain::models::{
    Child, NoPointsReason, Task, TaskCategory, TaskProof, TaskStatus,
};
use crate::domain::task_generator;
use crate::sync::{SyncTask, SyncTicket};

use super::{mail, require_user, FamilyStore};

/// Free task regenerations per child per local day.
pub const FREE_REGENERATIONS_PER_DAY: u32 = 3;

/// Point-earning custom tasks allowed per child per local day.
pub const CUSTOM_TASK_DAILY_POINT_CAP: usize = 5;

/// Most points a single custom task may carry.
pub const MAX_CUSTOM_TASK_POINTS: u32 = 1_000;

impl FamilyStore {
    /// Child marks a task done and attaches proof. No points move here;
    /// that waits for parental approval.
    pub fn complete_task(&self, cmd: CompleteTaskCommand) -> Result<CompleteTaskResult> {
        let mut state = self.state();
        let now = Utc::now();

        let task = state
            .tasks
            .iter_mut()
            .find(|t| t.id == cmd.task_id)
            .ok_or_else(|| anyhow!("Task not found: {}", cmd.task_id))?;
        if task.status != TaskStatus::Pending {
            return Err(anyhow!(
                "Only pending tasks can be completed (task {} is {})",
                cmd.task_id,
                task.status.as_str()
            ));
        }

        task.status = TaskStatus::Completed;
        task.completed_at = Some(now);
        task.proof = cmd.proof;
        let snapshot = task.clone();
        debug!("Task '{}' marked complete", snapshot.title);

        let mut tickets =
            vec![SyncTicket::new(SyncTask::PushTask { task_id: snapshot.id.clone() })];
        if snapshot.proof.has_photo() {
            tickets.push(SyncTicket::new(SyncTask::UploadTaskProof {
                task_id: snapshot.id.clone(),
            }));
        }

        Ok(CompleteTaskResult { task: snapshot, tickets })
    }

    /// Parent approves a completed task: the one-way transition that pays
    /// points, refreshes the mail meter and runs the achievement check.
    pub fn approve_task(&self, task_id: &str) -> Result<ApproveTaskResult> {
        let mut guard = self.state();
        let state = &mut *guard;
        let now = Utc::now();

        let idx = state
            .tasks
            .iter()
            .position(|t| t.id == task_id)
            .ok_or_else(|| anyhow!("Task not found: {}", task_id))?;
        if state.tasks[idx].status != TaskStatus::Completed {
            return Err(anyhow!(
                "Only completed tasks can be approved (task {} is {})",
                task_id,
                state.tasks[idx].status.as_str()
            ));
        }
        let child_id = state.tasks[idx].child_id.clone();

        // Nothing may mutate until the owning child is known to exist.
        let child_known = state
            .current_user
            .as_ref()
            .map(|u| u.child(&child_id).is_some())
            .unwrap_or(false);
        if !child_known {
            return Err(anyhow!("Child not found: {}", child_id));
        }

        {
            let task = &mut state.tasks[idx];
            task.status = TaskStatus::Approved;
            task.approved_at = Some(now);
            task.verified_at = Some(now);
        }
        let task = state.tasks[idx].clone();

        let meter = mail::compute_mail_meter(&state.tasks, &child_id, now);

        let tasks_ref = &state.tasks;
        let user = state
            .current_user
            .as_mut()
            .ok_or_else(|| anyhow!("No user is signed in"))?;
        let child = user
            .child_mut(&child_id)
            .ok_or_else(|| anyhow!("Child not found: {}", child_id))?;

        let multiplier = Child::multiplier_for(child.total_points);
        // Saturate rather than wrap; a corrupt point value must not panic
        // the store or shrink a balance.
        let points_awarded = task.points.saturating_mul(multiplier);
        child.points = child.points.saturating_add(points_awarded);
        child.total_points = child.total_points.saturating_add(points_awarded);
        let level_before = child.level;
        child.level = Child::level_for(child.total_points);
        child.mail_meter_progress = meter;

        let unlocked = achievements::check_achievements(child, tasks_ref, now);
        child.badges.extend(unlocked.iter().cloned());

        if child.level > level_before {
            info!("🎉 {} leveled up to {}", child.name, child.level);
        }
        info!(
            "✅ Approved '{}': +{} points (x{}) for {}",
            task.title, points_awarded, multiplier, child.name
        );

        let tickets = vec![
            SyncTicket::new(SyncTask::PushTask { task_id: task.id.clone() }),
            SyncTicket::new(SyncTask::PushChild { child_id: child_id.clone() }),
        ];

        Ok(ApproveTaskResult {
            task,
            points_awarded,
            multiplier,
            unlocked_badges: unlocked,
            mail_meter_progress: meter,
            tickets,
        })
    }

    /// Parent sends a completed task back. The proof stays attached so the
    /// child can adjust and resubmit.
    pub fn reject_task(&self, task_id: &str) -> Result<RejectTaskResult> {
        let mut state = self.state();

        let task = state
            .tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| anyhow!("Task not found: {}", task_id))?;
        if task.status != TaskStatus::Completed {
            return Err(anyhow!(
                "Only completed tasks can be rejected (task {} is {})",
                task_id,
                task.status.as_str()
            ));
        }

        task.status = TaskStatus::Pending;
        task.completed_at = None;
        let snapshot = task.clone();
        info!("Task '{}' sent back for another try", snapshot.title);

        Ok(RejectTaskResult {
            task: snapshot,
            tickets: vec![SyncTicket::new(SyncTask::PushTask { task_id: task_id.to_string() })],
        })
    }

    /// Replace today's still-pending tasks with a fresh batch. The first
    /// three refreshes per day earn points; later ones are for fun only.
    pub fn regenerate_tasks(&self, child_id: &str) -> Result<RegenerateTasksResult> {
        let mut guard = self.state();
        let state = &mut *guard;

        let user = require_user(state)?;
        let child = user
            .child(child_id)
            .ok_or_else(|| anyhow!("Child not found: {}", child_id))?;
        let age_group = child.age_group;

        let today = Local::now().date_naive();
        let key = (child_id.to_string(), today);
        let used_before = *state.regen_counts.get(&key).unwrap_or(&0);
        let earns_points = used_before < FREE_REGENERATIONS_PER_DAY;
        state.regen_counts.insert(key, used_before + 1);

        let removed_ids: Vec<String> = state
            .tasks
            .iter()
            .filter(|t| {
                t.child_id == child_id && t.due_date == today && t.status == TaskStatus::Pending
            })
            .map(|t| t.id.clone())
            .collect();
        state.tasks.retain(|t| {
            !(t.child_id == child_id && t.due_date == today && t.status == TaskStatus::Pending)
        });

        let mut fresh = task_generator::generate_for_date(
            child_id,
            age_group,
            self.config.daily_task_count,
            today,
        );
        if earns_points {
            info!(
                "🔄 Regenerated tasks for {} ({} of {} free refreshes used)",
                child_id,
                used_before + 1,
                FREE_REGENERATIONS_PER_DAY
            );
        } else {
            for task in &mut fresh {
                task.points = 0;
                task.no_points_reason = Some(NoPointsReason::RegenerationLimit);
            }
            info!("🔄 Regenerated tasks for {} past the daily limit: no points", child_id);
        }
        state.tasks.extend(fresh.iter().cloned());

        let mut tickets = Vec::new();
        if !removed_ids.is_empty() {
            tickets.push(SyncTicket::new(SyncTask::DeleteTasks { task_ids: removed_ids }));
        }
        tickets.push(SyncTicket::new(SyncTask::PushTasks {
            task_ids: fresh.iter().map(|t| t.id.clone()).collect(),
        }));

        Ok(RegenerateTasksResult {
            tasks: fresh,
            earns_points,
            regens_used_today: used_before + 1,
            tickets,
        })
    }

    /// UI predicate: would a regeneration right now still earn points?
    /// Reads the counter without touching it.
    pub fn next_regeneration_earns_points(&self, child_id: &str) -> bool {
        self.regens_used_today(child_id) < FREE_REGENERATIONS_PER_DAY
    }

    pub fn regens_used_today(&self, child_id: &str) -> u32 {
        let today = Local::now().date_naive();
        let key = (child_id.to_string(), today);
        *self.state().regen_counts.get(&key).unwrap_or(&0)
    }

    /// Parent-authored task for today. Past the daily point-earning cap
    /// the task is still created, just worth nothing.
    pub fn add_custom_task(&self, cmd: AddCustomTaskCommand) -> Result<AddCustomTaskResult> {
        let title = cmd.title.trim();
        if title.is_empty() {
            return Err(anyhow!("Task title cannot be empty"));
        }
        if cmd.points > MAX_CUSTOM_TASK_POINTS {
            return Err(anyhow!("Task points cannot exceed {}", MAX_CUSTOM_TASK_POINTS));
        }

        let mut guard = self.state();
        let state = &mut *guard;
        let user = require_user(state)?;
        if user.child(&cmd.child_id).is_none() {
            return Err(anyhow!("Child not found: {}", cmd.child_id));
        }

        let today = Local::now().date_naive();
        let earning_today = state
            .tasks
            .iter()
            .filter(|t| {
                t.child_id == cmd.child_id && t.is_custom && t.due_date == today && t.points > 0
            })
            .count();
        let points_capped = cmd.points > 0 && earning_today >= CUSTOM_TASK_DAILY_POINT_CAP;

        let now = Utc::now();
        let mut task = Task {
            id: Task::generate_id(now.timestamp_millis() as u64),
            child_id: cmd.child_id.clone(),
            title: title.to_string(),
            description: cmd.description.clone(),
            category: TaskCategory::Chores,
            points: cmd.points,
            status: TaskStatus::Pending,
            due_date: today,
            is_custom: true,
            proof: TaskProof::None,
            no_points_reason: None,
            completed_at: None,
            approved_at: None,
            verified_at: None,
            created_at: now,
        };
        if points_capped {
            task.points = 0;
            task.no_points_reason = Some(NoPointsReason::CustomTaskLimit);
            info!(
                "Custom task '{}' created without points ({} earning tasks today)",
                title, earning_today
            );
        }

        let ticket = SyncTicket::new(SyncTask::PushTask { task_id: task.id.clone() });
        state.tasks.push(task.clone());

        Ok(AddCustomTaskResult { task, points_capped, tickets: vec![ticket] })
    }

    pub fn todays_tasks(&self, child_id: &str) -> Vec<Task> {
        let today = Local::now().date_naive();
        self.state()
            .tasks
            .iter()
            .filter(|t| t.child_id == child_id && t.due_date == today)
            .cloned()
            .collect()
    }

    /// Swap the proof's local photo reference for the uploaded durable
    /// URL; a timer component is untouched.
    pub(crate) fn apply_proof_upload(&self, task_id: &str, durable_url: &str) -> Result<()> {
        let mut state = self.state();
        let task = state
            .tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| anyhow!("Task not found: {}", task_id))?;
        if !task.proof.has_photo() {
            return Err(anyhow!("Task {} has no photo proof to update", task_id));
        }
        task.proof = task.proof.clone().with_photo_ref(durable_url.to_string());
        Ok(())
    }
}
