//! Executes sync tickets and the background refresh.
//!
//! ## Key Responsibilities
//! - Run the remote call each ticket stands for, off the store lock
//! - Apply the store's confirm/compensate hooks afterwards (child-add
//!   rollback, durable reference swaps)
//! - Keep remote failures away from local callers: every failure is
//!   logged here; uploads degrade to the retained local reference
//!
//! The worker holds snapshots across awaits, never the store lock.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use log::{debug, info, warn};

use crate::domain::store::FamilyStore;
use crate::notify::MailCodeNotifier;
use crate::remote::records::{
    RemoteBadgeRecord, RemoteChildRecord, RemoteShippingRecord, RemoteSubscriptionRecord,
    RemoteTaskRecord, RemoteUserRecord,
};
use crate::remote::{
    AssetKind, AssetSync, BadgeSync, ChildSync, RemoteGateway, ShippingSync, SubscriptionSync,
    TaskSync, UserSync,
};

use super::{SyncOutcome, SyncTask, SyncTicket};

pub struct SyncWorker {
    store: Arc<FamilyStore>,
    gateway: Arc<dyn RemoteGateway>,
    notifier: Option<Arc<dyn MailCodeNotifier>>,
}

impl SyncWorker {
    pub fn new(
        store: Arc<FamilyStore>,
        gateway: Arc<dyn RemoteGateway>,
        notifier: Option<Arc<dyn MailCodeNotifier>>,
    ) -> Self {
        SyncWorker { store, gateway, notifier }
    }

    /// Execute one ticket. Failures are logged here; callers that spawn
    /// tickets may drop the result.
    pub async fn process(&self, ticket: SyncTicket) -> Result<SyncOutcome> {
        let ticket_id = ticket.id;
        let result = self.dispatch(ticket.task).await;
        match &result {
            Ok(outcome) => debug!("Ticket {} finished: {:?}", ticket_id, outcome),
            Err(e) => warn!("Ticket {} failed: {}", ticket_id, e),
        }
        result
    }

    async fn dispatch(&self, task: SyncTask) -> Result<SyncOutcome> {
        match task {
            SyncTask::VerifyChildAdd { child_id } => self.verify_child_add(&child_id).await,
            SyncTask::DeleteChild { child_id, task_ids } => {
                self.delete_child(&child_id, &task_ids).await
            }
            SyncTask::PushChild { child_id } => self.push_child(&child_id).await,
            SyncTask::PushTask { task_id } => self.push_task(&task_id).await,
            SyncTask::PushTasks { task_ids } => self.push_tasks(&task_ids).await,
            SyncTask::DeleteTasks { task_ids } => self.delete_tasks(&task_ids).await,
            SyncTask::UploadTaskProof { task_id } => self.upload_task_proof(&task_id).await,
            SyncTask::UploadAvatar { child_id } => self.upload_avatar(&child_id).await,
            SyncTask::PushUser => self.push_user().await,
            SyncTask::PushSubscription => self.push_subscription().await,
            SyncTask::PushShippingAddress => self.push_shipping_address().await,
            SyncTask::SendMailCode { child_id } => self.send_mail_code(&child_id).await,
        }
    }

    /// Re-run the child-limit check against the authoritative side. A
    /// rejection compensates the optimistic local add; confirmation also
    /// seeds the starter tasks, which only exist locally until now.
    async fn verify_child_add(&self, child_id: &str) -> Result<SyncOutcome> {
        let user_id = match self.store.current_user_id() {
            Some(id) => id,
            None => return Ok(SyncOutcome::Skipped),
        };
        let child = match self.store.child_snapshot(child_id) {
            Some(child) => child,
            None => {
                debug!("Child {} is gone locally; nothing to verify", child_id);
                return Ok(SyncOutcome::Skipped);
            }
        };

        let record = RemoteChildRecord::from_domain(&user_id, &child);
        match self.gateway.create_child(&record).await? {
            Some(_) => {
                let tasks = self.store.tasks_for_child_snapshot(child_id);
                if !tasks.is_empty() {
                    let records: Vec<RemoteTaskRecord> =
                        tasks.iter().map(RemoteTaskRecord::from_domain).collect();
                    self.gateway.upsert_tasks(&records).await?;
                }
                info!("Child {} confirmed remotely", child.name);
                Ok(SyncOutcome::Confirmed)
            }
            None => {
                self.store.rollback_child_add(child_id);
                Ok(SyncOutcome::RolledBack)
            }
        }
    }

    async fn delete_child(&self, child_id: &str, task_ids: &[String]) -> Result<SyncOutcome> {
        if !task_ids.is_empty() {
            self.gateway.delete_tasks(task_ids).await?;
        }
        self.gateway.delete_child(child_id).await?;
        Ok(SyncOutcome::Confirmed)
    }

    /// Stats writeback plus the child's badges; the child record itself
    /// carries no badge rows.
    async fn push_child(&self, child_id: &str) -> Result<SyncOutcome> {
        let user_id = match self.store.current_user_id() {
            Some(id) => id,
            None => return Ok(SyncOutcome::Skipped),
        };
        let child = match self.store.child_snapshot(child_id) {
            Some(child) => child,
            None => {
                debug!("Child {} is gone locally; nothing to push", child_id);
                return Ok(SyncOutcome::Skipped);
            }
        };

        self.gateway
            .update_child(&RemoteChildRecord::from_domain(&user_id, &child))
            .await?;
        for badge in &child.badges {
            self.gateway.upsert_badge(&RemoteBadgeRecord::from_domain(badge)).await?;
        }
        Ok(SyncOutcome::Confirmed)
    }

    async fn push_task(&self, task_id: &str) -> Result<SyncOutcome> {
        let task = match self.store.task_snapshot(task_id) {
            Some(task) => task,
            None => {
                debug!("Task {} is gone locally; nothing to push", task_id);
                return Ok(SyncOutcome::Skipped);
            }
        };
        self.gateway.upsert_task(&RemoteTaskRecord::from_domain(&task)).await?;
        Ok(SyncOutcome::Confirmed)
    }

    async fn push_tasks(&self, task_ids: &[String]) -> Result<SyncOutcome> {
        let tasks = self.store.tasks_snapshot(task_ids);
        if tasks.is_empty() {
            debug!("None of {} tasks remain locally; nothing to push", task_ids.len());
            return Ok(SyncOutcome::Skipped);
        }
        let records: Vec<RemoteTaskRecord> =
            tasks.iter().map(RemoteTaskRecord::from_domain).collect();
        self.gateway.upsert_tasks(&records).await?;
        Ok(SyncOutcome::Confirmed)
    }

    async fn delete_tasks(&self, task_ids: &[String]) -> Result<SyncOutcome> {
        self.gateway.delete_tasks(task_ids).await?;
        Ok(SyncOutcome::Confirmed)
    }

    async fn upload_task_proof(&self, task_id: &str) -> Result<SyncOutcome> {
        let task = match self.store.task_snapshot(task_id) {
            Some(task) => task,
            None => {
                debug!("Task {} is gone locally; nothing to upload", task_id);
                return Ok(SyncOutcome::Skipped);
            }
        };
        let local_ref = match task.proof.photo_ref() {
            Some(r) => r.to_string(),
            None => {
                debug!("Task {} carries no photo; nothing to upload", task_id);
                return Ok(SyncOutcome::Skipped);
            }
        };

        match self.gateway.upload_asset(AssetKind::TaskProof, &local_ref).await {
            Ok(durable_url) => {
                if let Err(e) = self.store.apply_proof_upload(task_id, &durable_url) {
                    warn!("Uploaded proof for {} could not be applied: {}", task_id, e);
                    return Ok(SyncOutcome::Skipped);
                }
                if let Some(fresh) = self.store.task_snapshot(task_id) {
                    self.gateway.upsert_task(&RemoteTaskRecord::from_domain(&fresh)).await?;
                }
                Ok(SyncOutcome::Confirmed)
            }
            Err(e) => {
                warn!(
                    "Proof upload for {} failed, keeping the local reference: {}",
                    task_id, e
                );
                Ok(SyncOutcome::Degraded)
            }
        }
    }

    async fn upload_avatar(&self, child_id: &str) -> Result<SyncOutcome> {
        let user_id = match self.store.current_user_id() {
            Some(id) => id,
            None => return Ok(SyncOutcome::Skipped),
        };
        let child = match self.store.child_snapshot(child_id) {
            Some(child) => child,
            None => {
                debug!("Child {} is gone locally; nothing to upload", child_id);
                return Ok(SyncOutcome::Skipped);
            }
        };
        let local_ref = match &child.avatar_url {
            Some(r) => r.clone(),
            None => {
                debug!("Child {} has no avatar; nothing to upload", child_id);
                return Ok(SyncOutcome::Skipped);
            }
        };

        match self.gateway.upload_asset(AssetKind::Avatar, &local_ref).await {
            Ok(durable_url) => {
                if let Err(e) = self.store.apply_avatar_upload(child_id, &durable_url) {
                    warn!("Uploaded avatar for {} could not be applied: {}", child_id, e);
                    return Ok(SyncOutcome::Skipped);
                }
                if let Some(fresh) = self.store.child_snapshot(child_id) {
                    self.gateway
                        .update_child(&RemoteChildRecord::from_domain(&user_id, &fresh))
                        .await?;
                }
                Ok(SyncOutcome::Confirmed)
            }
            Err(e) => {
                warn!(
                    "Avatar upload for {} failed, keeping the local reference: {}",
                    child_id, e
                );
                Ok(SyncOutcome::Degraded)
            }
        }
    }

    async fn push_user(&self) -> Result<SyncOutcome> {
        let user = match self.store.current_user() {
            Some(user) => user,
            None => return Ok(SyncOutcome::Skipped),
        };
        self.gateway.update_user(&RemoteUserRecord::from_domain(&user)).await?;
        Ok(SyncOutcome::Confirmed)
    }

    async fn push_subscription(&self) -> Result<SyncOutcome> {
        let user = match self.store.current_user() {
            Some(user) => user,
            None => return Ok(SyncOutcome::Skipped),
        };
        let subscription = match &user.subscription {
            Some(subscription) => subscription,
            None => {
                debug!("No subscription to push");
                return Ok(SyncOutcome::Skipped);
            }
        };

        self.gateway
            .save_subscription(&RemoteSubscriptionRecord::from_domain(&user.id, subscription))
            .await?;
        self.gateway.save_plan_tag(&user.id, subscription.plan.as_str()).await?;
        Ok(SyncOutcome::Confirmed)
    }

    async fn push_shipping_address(&self) -> Result<SyncOutcome> {
        let user = match self.store.current_user() {
            Some(user) => user,
            None => return Ok(SyncOutcome::Skipped),
        };
        let address = match &user.shipping_address {
            Some(address) => address,
            None => {
                debug!("No shipping address to push");
                return Ok(SyncOutcome::Skipped);
            }
        };
        self.gateway
            .save_shipping_address(&RemoteShippingRecord::from_domain(&user.id, address))
            .await?;
        Ok(SyncOutcome::Confirmed)
    }

    /// Hand the stored verification code to the notifier. Without a
    /// notifier the code stays local (the log notifier covers dev builds).
    async fn send_mail_code(&self, child_id: &str) -> Result<SyncOutcome> {
        let user = match self.store.current_user() {
            Some(user) => user,
            None => return Ok(SyncOutcome::Skipped),
        };
        let child = match user.child(child_id) {
            Some(child) => child,
            None => {
                debug!("Child {} is gone locally; no code to deliver", child_id);
                return Ok(SyncOutcome::Skipped);
            }
        };
        let code = match &child.mail_code {
            Some(code) => code.clone(),
            None => {
                debug!("No code outstanding for {}", child_id);
                return Ok(SyncOutcome::Skipped);
            }
        };
        let notifier = match &self.notifier {
            Some(notifier) => notifier,
            None => {
                debug!("No notifier configured; code for {} stays local", child_id);
                return Ok(SyncOutcome::Skipped);
            }
        };

        notifier.send_code(&user.email, &child.name, &code).await?;
        info!("Verification code for {} handed to the notifier", child.name);
        Ok(SyncOutcome::Confirmed)
    }

    /// Authoritative full refresh: fetch everything, reassemble the domain
    /// user, replace the local snapshot in one set.
    pub async fn refresh_user_data(&self, user_id: &str) -> Result<()> {
        debug!("Refreshing user data for {}", user_id);

        let user_record = self
            .gateway
            .fetch_user(user_id)
            .await?
            .ok_or_else(|| anyhow!("User {} does not exist remotely", user_id))?;
        let mut user = user_record.into_domain()?;

        let mut children = Vec::new();
        for record in self.gateway.list_children(user_id).await? {
            children.push(record.into_domain()?);
        }
        for record in self.gateway.list_badges(user_id).await? {
            let badge = record.into_domain()?;
            if let Some(child) = children.iter_mut().find(|c| c.id == badge.child_id) {
                child.badges.push(badge);
            }
        }
        user.children = children;

        user.subscription = match self.gateway.fetch_subscription(user_id).await? {
            Some(record) => Some(record.into_domain()?),
            None => None,
        };
        user.shipping_address = self
            .gateway
            .fetch_shipping_address(user_id)
            .await?
            .map(|record| record.into_domain());

        let mut tasks = Vec::new();
        for record in self.gateway.list_tasks(user_id).await? {
            tasks.push(record.into_domain()?);
        }

        info!(
            "🔄 Refreshed {}: {} children, {} tasks",
            user.email,
            user.children.len(),
            tasks.len()
        );
        self.store.replace_snapshot(user, tasks);
        Ok(())
    }

    /// Refresh with retries and exponential backoff. Gives up after the
    /// configured attempts and keeps the last known good local state. An
    /// in-flight refresh is never cancelled; last write wins at
    /// `replace_snapshot`.
    pub async fn refresh_user_data_in_background(&self, user_id: &str) {
        let max_attempts = self.store.config().refresh_max_attempts;
        let mut delay = self.store.config().refresh_base_delay;
        self.store.set_loading(true);

        for attempt in 1..=max_attempts {
            match self.refresh_user_data(user_id).await {
                Ok(()) => {
                    self.store.set_loading(false);
                    return;
                }
                Err(e) => {
                    warn!("Refresh attempt {}/{} failed: {}", attempt, max_attempts, e);
                    if attempt < max_attempts {
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    }
                }
            }
        }

        warn!("Background refresh gave up; keeping the last known good data");
        self.store.set_loading(false);
    }
}
