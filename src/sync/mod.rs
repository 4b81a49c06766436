//! Sync vocabulary: tickets describing remote work owed after an
//! optimistic local mutation.
//!
//! Store operations return tickets instead of firing remote calls
//! themselves; the worker executes them and applies the store's
//! confirm/compensate hooks. Delete-style tasks carry the affected ids
//! because the local rows are already gone by the time the worker runs.

use uuid::Uuid;

pub mod worker;

pub use worker::SyncWorker;

/// The remote work a single ticket stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncTask {
    /// Re-run the child-limit check authoritatively; roll the local add
    /// back if the remote side rejects it.
    VerifyChildAdd { child_id: String },
    DeleteChild { child_id: String, task_ids: Vec<String> },
    /// Stats and badges writeback for one child.
    PushChild { child_id: String },
    PushTask { task_id: String },
    PushTasks { task_ids: Vec<String> },
    DeleteTasks { task_ids: Vec<String> },
    /// Upload the task's photo proof; swap in the durable URL on success.
    UploadTaskProof { task_id: String },
    UploadAvatar { child_id: String },
    PushUser,
    PushSubscription,
    PushShippingAddress,
    /// Deliver the pending mailbox verification code to the parent.
    SendMailCode { child_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTicket {
    pub id: Uuid,
    pub task: SyncTask,
}

impl SyncTicket {
    pub fn new(task: SyncTask) -> Self {
        SyncTicket { id: Uuid::new_v4(), task }
    }
}

/// What processing a ticket did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Remote state now matches the local mutation.
    Confirmed,
    /// The remote side rejected the mutation and the local state was
    /// compensated back.
    RolledBack,
    /// The remote work partially failed and local state keeps a degraded
    /// stand-in (e.g. a local photo reference instead of a durable URL).
    Degraded,
    /// The affected entity was gone locally before the ticket ran.
    Skipped,
}
