//! Mail meter and mailbox verification.
//!
//! ## Business Rules
//! - The meter is always recomputed by a full scan of approved tasks in
//!   the trailing window, never patched incrementally; a full cycle of
//!   five shows 100 until the next approval rolls it over
//! - Verification codes are six digits, valid for one hour; a successful
//!   check is terminal and clears the code

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use rand::Rng;

use crate::domain::commands::mail::{MailMeterResult, SendMailCodeResult, VerifyMailCodeResult};
use crate::domain::models::{Task, TaskStatus};
use crate::sync::{SyncTask, SyncTicket};

use super::{require_child_mut, require_user_mut, FamilyStore};

/// Approvals per mail meter cycle.
pub const MAIL_METER_CYCLE_LEN: u32 = 5;

/// Trailing window the meter counts approvals over.
pub const MAIL_METER_WINDOW_DAYS: i64 = 7;

/// How long a mailbox verification code stays valid.
pub const MAIL_CODE_TTL_MINUTES: i64 = 60;

/// Meter percentage for one child: approvals in the trailing window,
/// folded onto a five-step cycle. A freshly finished cycle reads 100, not
/// 0, so the full envelope stays on screen until the next approval.
pub(crate) fn compute_mail_meter(tasks: &[Task], child_id: &str, now: DateTime<Utc>) -> u8 {
    let window_start = now - Duration::days(MAIL_METER_WINDOW_DAYS);
    let count = tasks
        .iter()
        .filter(|t| t.child_id == child_id && t.status == TaskStatus::Approved)
        .filter(|t| t.approved_at.map(|at| at >= window_start).unwrap_or(false))
        .count() as u32;

    if count == 0 {
        0
    } else if count % MAIL_METER_CYCLE_LEN == 0 {
        100
    } else {
        ((count % MAIL_METER_CYCLE_LEN) * 20) as u8
    }
}

impl FamilyStore {
    /// Recompute and store the meter. A ticket is owed only when the
    /// stored value actually moved.
    pub fn update_mail_meter(&self, child_id: &str) -> Result<MailMeterResult> {
        let mut guard = self.state();
        let state = &mut *guard;
        let now = Utc::now();

        let progress = compute_mail_meter(&state.tasks, child_id, now);
        let child = state
            .current_user
            .as_mut()
            .ok_or_else(|| anyhow!("No user is signed in"))?
            .child_mut(child_id)
            .ok_or_else(|| anyhow!("Child not found: {}", child_id))?;

        if child.mail_meter_progress == progress {
            return Ok(MailMeterResult { progress, tickets: Vec::new() });
        }

        debug!(
            "Mail meter for {}: {} -> {}",
            child.name, child.mail_meter_progress, progress
        );
        child.mail_meter_progress = progress;

        Ok(MailMeterResult {
            progress,
            tickets: vec![SyncTicket::new(SyncTask::PushChild {
                child_id: child_id.to_string(),
            })],
        })
    }

    /// Start mailbox verification: store a fresh six-digit code and owe
    /// its delivery to the notifier. Any previous verification is voided.
    pub fn send_mail_verification(&self, child_id: &str) -> Result<SendMailCodeResult> {
        let code = format!("{}", rand::rng().random_range(100_000..1_000_000));
        let expires_at = Utc::now() + Duration::minutes(MAIL_CODE_TTL_MINUTES);

        let mut state = self.state();
        let user = require_user_mut(&mut state)?;
        let child = require_child_mut(user, child_id)?;

        child.mail_code = Some(code);
        child.mail_code_expires_at = Some(expires_at);
        child.mail_verified = false;

        info!("📮 Mailbox verification started for {}", child.name);
        Ok(SendMailCodeResult {
            expires_at,
            tickets: vec![SyncTicket::new(SyncTask::SendMailCode {
                child_id: child_id.to_string(),
            })],
        })
    }

    /// Check a code the child read from their physical letter. Mismatch
    /// and expiry leave the stored code untouched so the child can retry
    /// or the parent can resend.
    pub fn verify_mail_code(&self, child_id: &str, code: &str) -> Result<VerifyMailCodeResult> {
        let now = Utc::now();
        let mut state = self.state();
        let user = require_user_mut(&mut state)?;
        let child = require_child_mut(user, child_id)?;

        let stored = match (&child.mail_code, child.mail_code_expires_at) {
            (Some(stored), Some(expires_at)) if expires_at > now => stored,
            (Some(_), _) => {
                warn!("Mailbox code for {} has expired", child.name);
                return Ok(VerifyMailCodeResult { verified: false, tickets: Vec::new() });
            }
            _ => return Ok(VerifyMailCodeResult { verified: false, tickets: Vec::new() }),
        };
        if stored != code {
            warn!("Wrong mailbox code for {}", child.name);
            return Ok(VerifyMailCodeResult { verified: false, tickets: Vec::new() });
        }

        child.mail_code = None;
        child.mail_code_expires_at = None;
        child.mail_verified = true;
        info!("📬 Mailbox verified for {}", child.name);

        Ok(VerifyMailCodeResult {
            verified: true,
            tickets: vec![SyncTicket::new(SyncTask::PushChild {
                child_id: child_id.to_string(),
            })],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::store_with_child;
    use super::*;
    use crate::domain::commands::tasks::CompleteTaskCommand;
    use crate::domain::models::TaskProof;

    fn approve_n(store: &FamilyStore, child_id: &str, n: usize) {
        let pending: Vec<String> = store
            .tasks_for_child_snapshot(child_id)
            .iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .map(|t| t.id.clone())
            .take(n)
            .collect();
        assert_eq!(pending.len(), n, "not enough pending tasks to approve");
        for task_id in pending {
            store
                .complete_task(CompleteTaskCommand { task_id: task_id.clone(), proof: TaskProof::None })
                .unwrap();
            store.approve_task(&task_id).unwrap();
        }
    }

    #[test]
    fn test_meter_is_zero_with_no_approvals() {
        let (store, child_id) = store_with_child();
        let result = store.update_mail_meter(&child_id).unwrap();
        assert_eq!(result.progress, 0);
        assert!(result.tickets.is_empty());
    }

    #[test]
    fn test_meter_steps_by_twenty_per_approval() {
        let (store, child_id) = store_with_child();

        approve_n(&store, &child_id, 1);
        assert_eq!(store.update_mail_meter(&child_id).unwrap().progress, 20);

        approve_n(&store, &child_id, 2);
        assert_eq!(store.update_mail_meter(&child_id).unwrap().progress, 60);
    }

    #[test]
    fn test_full_cycle_reads_one_hundred() {
        let (store, child_id) = store_with_child();
        approve_n(&store, &child_id, 5);

        let result = store.update_mail_meter(&child_id).unwrap();
        assert_eq!(result.progress, 100);
    }

    #[test]
    fn test_sixth_approval_rolls_the_cycle_over() {
        let (store, child_id) = store_with_child();
        approve_n(&store, &child_id, 5);
        store.regenerate_tasks(&child_id).unwrap();
        approve_n(&store, &child_id, 1);

        assert_eq!(store.update_mail_meter(&child_id).unwrap().progress, 20);
    }

    #[test]
    fn test_meter_ignores_approvals_outside_the_window() {
        let (store, child_id) = store_with_child();
        approve_n(&store, &child_id, 2);

        let stale = Utc::now() - Duration::days(MAIL_METER_WINDOW_DAYS + 1);
        let task_ids: Vec<String> = store
            .tasks_for_child_snapshot(&child_id)
            .iter()
            .filter(|t| t.status == TaskStatus::Approved)
            .map(|t| t.id.clone())
            .collect();
        store.with_task_mut(&task_ids[0], |t| t.approved_at = Some(stale));

        assert_eq!(store.update_mail_meter(&child_id).unwrap().progress, 20);
    }

    #[test]
    fn test_unchanged_meter_owes_no_ticket() {
        let (store, child_id) = store_with_child();
        approve_n(&store, &child_id, 1);

        // Approval already stored 20; the recompute agrees.
        let result = store.update_mail_meter(&child_id).unwrap();
        assert_eq!(result.progress, 20);
        assert!(result.tickets.is_empty());
    }

    #[test]
    fn test_send_mail_verification_stores_a_six_digit_code() {
        let (store, child_id) = store_with_child();

        let result = store.send_mail_verification(&child_id).unwrap();
        assert!(result.expires_at > Utc::now());
        assert!(matches!(result.tickets[0].task, SyncTask::SendMailCode { .. }));

        let child = store.child_snapshot(&child_id).unwrap();
        let code = child.mail_code.expect("code stored");
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
        assert!(!child.mail_verified);
    }

    #[test]
    fn test_verify_mail_code_happy_path_is_terminal() {
        let (store, child_id) = store_with_child();
        store.send_mail_verification(&child_id).unwrap();
        let code = store.child_snapshot(&child_id).unwrap().mail_code.unwrap();

        let result = store.verify_mail_code(&child_id, &code).unwrap();
        assert!(result.verified);

        let child = store.child_snapshot(&child_id).unwrap();
        assert!(child.mail_verified);
        assert!(child.mail_code.is_none());
        assert!(child.mail_code_expires_at.is_none());
    }

    #[test]
    fn test_wrong_code_leaves_the_stored_code_for_retry() {
        let (store, child_id) = store_with_child();
        store.send_mail_verification(&child_id).unwrap();
        let code = store.child_snapshot(&child_id).unwrap().mail_code.unwrap();
        let wrong = if code == "111111" { "222222" } else { "111111" };

        let result = store.verify_mail_code(&child_id, wrong).unwrap();
        assert!(!result.verified);
        assert!(result.tickets.is_empty());

        // The right code still works afterwards.
        assert!(store.verify_mail_code(&child_id, &code).unwrap().verified);
    }

    #[test]
    fn test_expired_code_does_not_verify() {
        let (store, child_id) = store_with_child();
        store.send_mail_verification(&child_id).unwrap();
        let code = store.child_snapshot(&child_id).unwrap().mail_code.unwrap();
        store.with_child_mut(&child_id, |c| {
            c.mail_code_expires_at = Some(Utc::now() - Duration::minutes(1));
        });

        let result = store.verify_mail_code(&child_id, &code).unwrap();
        assert!(!result.verified);
        assert!(!store.child_snapshot(&child_id).unwrap().mail_verified);
    }

    #[test]
    fn test_resending_voids_the_previous_verification() {
        let (store, child_id) = store_with_child();
        store.send_mail_verification(&child_id).unwrap();
        let code = store.child_snapshot(&child_id).unwrap().mail_code.unwrap();
        store.verify_mail_code(&child_id, &code).unwrap();
        assert!(store.child_snapshot(&child_id).unwrap().mail_verified);

        store.send_mail_verification(&child_id).unwrap();
        assert!(!store.child_snapshot(&child_id).unwrap().mail_verified);
    }

    #[test]
    fn test_verify_with_no_code_outstanding_is_false() {
        let (store, child_id) = store_with_child();
        let result = store.verify_mail_code(&child_id, "123456").unwrap();
        assert!(!result.verified);
    }
}
