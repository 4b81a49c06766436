//! Domain-level command and result types.
//!
//! These structs are the inputs and outputs of the store's operations. The
//! embedding application (UI layer) maps its own DTOs onto these; they are
//! deliberately plain data with no behavior. Results of optimistic mutations
//! carry the sync tickets describing the remote work still owed.

pub mod children {
    use crate::domain::models::{Child, Gender, Task};
    use crate::sync::SyncTicket;

    /// Input for adding a child profile.
    #[derive(Debug, Clone)]
    pub struct AddChildCommand {
        pub name: String,
        pub age: u8,
        pub gender: Gender,
    }

    /// Result of a locally-accepted child add. The remote side still has to
    /// confirm; the verification ticket is included.
    #[derive(Debug, Clone)]
    pub struct AddChildResult {
        pub child: Child,
        /// The child's first batch of daily tasks.
        pub tasks: Vec<Task>,
        pub tickets: Vec<SyncTicket>,
        pub success_message: String,
    }

    /// Outcome of an add-child request. Hitting the plan's child limit is a
    /// business answer, not an error.
    #[derive(Debug, Clone)]
    pub enum AddChildOutcome {
        Added(AddChildResult),
        LimitReached { max_children: u32, message: String },
    }

    /// Result of removing a child profile.
    #[derive(Debug, Clone)]
    pub struct RemoveChildResult {
        pub removed_task_count: usize,
        pub tickets: Vec<SyncTicket>,
        pub success_message: String,
    }
}

pub mod tasks {
    use crate::domain::models::{Badge, Task, TaskProof};
    use crate::sync::SyncTicket;

    /// Input for a child marking a task complete.
    #[derive(Debug, Clone)]
    pub struct CompleteTaskCommand {
        pub task_id: String,
        pub proof: TaskProof,
    }

    /// Result of completing a task. No points move yet.
    #[derive(Debug, Clone)]
    pub struct CompleteTaskResult {
        pub task: Task,
        pub tickets: Vec<SyncTicket>,
    }

    /// Result of a parent approving a completed task.
    #[derive(Debug, Clone)]
    pub struct ApproveTaskResult {
        pub task: Task,
        /// Points actually credited, after the multiplier.
        pub points_awarded: u32,
        pub multiplier: u32,
        pub unlocked_badges: Vec<Badge>,
        pub mail_meter_progress: u8,
        pub tickets: Vec<SyncTicket>,
    }

    /// Result of a parent rejecting a completed task.
    #[derive(Debug, Clone)]
    pub struct RejectTaskResult {
        pub task: Task,
        pub tickets: Vec<SyncTicket>,
    }

    /// Input for a parent-authored custom task.
    #[derive(Debug, Clone)]
    pub struct AddCustomTaskCommand {
        pub child_id: String,
        pub title: String,
        pub description: String,
        pub points: u32,
    }

    /// Result of adding a custom task. `points_capped` is set when the
    /// daily limit on point-earning custom tasks forced this one to zero
    /// points.
    #[derive(Debug, Clone)]
    pub struct AddCustomTaskResult {
        pub task: Task,
        pub points_capped: bool,
        pub tickets: Vec<SyncTicket>,
    }

    /// Result of regenerating a child's daily task set.
    #[derive(Debug, Clone)]
    pub struct RegenerateTasksResult {
        pub tasks: Vec<Task>,
        /// Whether this batch still earns points.
        pub earns_points: bool,
        pub regens_used_today: u32,
        pub tickets: Vec<SyncTicket>,
    }
}

pub mod points {
    use crate::domain::models::Badge;
    use crate::sync::SyncTicket;

    /// Result of a raw point award.
    #[derive(Debug, Clone)]
    pub struct PointAward {
        pub points: u32,
        pub total_points: u32,
        pub level: u32,
        pub level_up: bool,
        pub unlocked_badges: Vec<Badge>,
        pub tickets: Vec<SyncTicket>,
    }

    /// Result of a point deduction attempt. `success` is false when the
    /// balance was too small; nothing moved in that case.
    #[derive(Debug, Clone)]
    pub struct DeductPointsResult {
        pub success: bool,
        pub new_balance: u32,
        pub tickets: Vec<SyncTicket>,
    }

    /// Result of a streak mutation.
    #[derive(Debug, Clone)]
    pub struct StreakResult {
        pub streak_days: u32,
        pub tickets: Vec<SyncTicket>,
    }

    /// Result of an explicit achievement re-check.
    #[derive(Debug, Clone)]
    pub struct AchievementCheckResult {
        pub unlocked_badges: Vec<Badge>,
        pub tickets: Vec<SyncTicket>,
    }

    /// Input for redeeming a gift card reward.
    #[derive(Debug, Clone)]
    pub struct RedeemGiftCardCommand {
        pub child_id: String,
        pub card_id: String,
        pub card_name: String,
        pub cost: u32,
    }

    /// Result of a gift card redemption attempt. Failure is a structured
    /// answer (insufficient points, unknown child), never an `Err`.
    #[derive(Debug, Clone)]
    pub struct RedeemGiftCardResult {
        pub success: bool,
        pub message: String,
        pub new_balance: u32,
        pub badge: Option<crate::domain::models::Badge>,
        pub tickets: Vec<SyncTicket>,
    }

    /// Result of the once-per-day login check.
    #[derive(Debug, Clone)]
    pub struct DailyLoginResult {
        pub is_new_day: bool,
        pub bonus_awarded: bool,
        pub streak_days: u32,
        pub tickets: Vec<SyncTicket>,
    }
}

pub mod mail {
    use chrono::{DateTime, Utc};
    use crate::sync::SyncTicket;

    /// Result of issuing a mailbox verification code.
    #[derive(Debug, Clone)]
    pub struct SendMailCodeResult {
        pub expires_at: DateTime<Utc>,
        pub tickets: Vec<SyncTicket>,
    }

    /// Result of a code verification attempt. `verified` is false on
    /// mismatch or expiry.
    #[derive(Debug, Clone)]
    pub struct VerifyMailCodeResult {
        pub verified: bool,
        pub tickets: Vec<SyncTicket>,
    }

    /// Result of a mail meter recompute.
    #[derive(Debug, Clone)]
    pub struct MailMeterResult {
        pub progress: u8,
        pub tickets: Vec<SyncTicket>,
    }
}

pub mod session {
    use crate::sync::SyncTicket;

    /// Result of a passcode reset; the fresh passcode is shown to the
    /// parent exactly once.
    #[derive(Debug, Clone)]
    pub struct PasscodeResetResult {
        pub passcode: String,
        pub tickets: Vec<SyncTicket>,
    }
}

pub mod subscription {
    use crate::domain::models::Subscription;
    use crate::sync::SyncTicket;

    /// Result of a purchase or trial start.
    #[derive(Debug, Clone)]
    pub struct SubscriptionUpdateResult {
        pub subscription: Subscription,
        pub tickets: Vec<SyncTicket>,
    }
}
