//! # Posty Magic Mail Club Engine
//!
//! Client-side state and business-rules engine for the Posty Magic Mail
//! Club: parents assign daily tasks, children earn points, levels and
//! badges, and consistent effort fills a meter that ends in physical mail
//! from Posty the mascot.
//!
//! The engine owns all local state in [`FamilyStore`] and applies every
//! business rule synchronously under its lock. Mutations are optimistic:
//! they update local state immediately and hand back [`SyncTicket`]s
//! describing the remote work still owed. The [`SyncWorker`] executes
//! tickets against a [`RemoteGateway`] and applies the store's
//! confirm/compensate hooks, so a rejected child add rolls back and a
//! failed photo upload keeps the local reference.
//!
//! [`Engine`] bundles the pieces so an application embeds one type.

pub mod config;
pub mod domain;
pub mod notify;
pub mod remote;
pub mod sync;

use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::Utc;
use log::info;

use crate::domain::commands::children::{AddChildCommand, AddChildOutcome};
use crate::domain::commands::mail::SendMailCodeResult;
use crate::domain::commands::tasks::{ApproveTaskResult, CompleteTaskCommand, CompleteTaskResult};
use crate::domain::models::User;
use crate::remote::records::RemoteUserRecord;
use crate::remote::UserSync;

pub use config::EngineConfig;
pub use domain::store::FamilyStore;
pub use notify::{LogNotifier, MailCodeNotifier};
pub use remote::{InMemoryGateway, RemoteGateway};
pub use sync::{SyncOutcome, SyncTask, SyncTicket, SyncWorker};

/// The assembled engine. Owns the store and the worker; operations not
/// wrapped here are reached through the public `store` field, with their
/// tickets handed to [`Engine::dispatch`].
///
/// Requires a tokio runtime: ticket processing and the background refresh
/// run as spawned tasks.
pub struct Engine {
    pub store: Arc<FamilyStore>,
    pub worker: Arc<SyncWorker>,
    gateway: Arc<dyn RemoteGateway>,
}

impl Engine {
    pub fn new(
        gateway: Arc<dyn RemoteGateway>,
        notifier: Option<Arc<dyn MailCodeNotifier>>,
        config: EngineConfig,
    ) -> Self {
        let store = Arc::new(FamilyStore::new(config));
        let worker = Arc::new(SyncWorker::new(store.clone(), gateway.clone(), notifier));
        Engine { store, worker, gateway }
    }

    /// Engine against the in-memory gateway with the logging notifier.
    /// What demos and most tests run.
    pub fn in_memory() -> Self {
        Engine::new(
            Arc::new(InMemoryGateway::new()),
            Some(Arc::new(LogNotifier)),
            EngineConfig::default(),
        )
    }

    /// Fire tickets in the background. Outcomes and failures are logged by
    /// the worker. Tickets already dispatched by an engine wrapper must
    /// not be dispatched again.
    pub fn dispatch(&self, tickets: Vec<SyncTicket>) {
        for ticket in tickets {
            let worker = self.worker.clone();
            tokio::spawn(async move {
                let _ = worker.process(ticket).await;
            });
        }
    }

    /// Create the remote account and hydrate the local session.
    pub async fn register(&self, name: &str, email: &str) -> Result<User> {
        if self.gateway.fetch_user_by_email(email).await?.is_some() {
            return Err(anyhow!("Email already registered: {}", email));
        }

        let user = User::new(name.to_string(), email.to_string(), Utc::now());
        let record = self.gateway.create_user(&RemoteUserRecord::from_domain(&user)).await?;
        let user = record.into_domain()?;

        info!("📝 Registered {}", user.email);
        self.store.sign_in(user.clone(), Vec::new());
        Ok(user)
    }

    /// Sign an existing account in by email, then pull the rest of their
    /// data in the background.
    pub async fn sign_in(&self, email: &str) -> Result<User> {
        let record = self
            .gateway
            .fetch_user_by_email(email)
            .await?
            .ok_or_else(|| anyhow!("No account for {}", email))?;
        let user = record.into_domain()?;

        self.store.sign_in(user.clone(), Vec::new());
        self.refresh_in_background();
        Ok(user)
    }

    pub fn sign_out(&self) {
        self.store.sign_out();
    }

    /// Kick off the retrying background refresh for the signed-in user.
    /// A no-op when nobody is signed in.
    pub fn refresh_in_background(&self) {
        if let Some(user_id) = self.store.current_user_id() {
            let worker = self.worker.clone();
            tokio::spawn(async move {
                worker.refresh_user_data_in_background(&user_id).await;
            });
        }
    }

    /// Optimistic child add with spawned remote verification. The child is
    /// usable immediately; a remote rejection rolls the add back.
    pub fn add_child(&self, cmd: AddChildCommand) -> Result<AddChildOutcome> {
        let outcome = self.store.add_child(cmd)?;
        if let AddChildOutcome::Added(result) = &outcome {
            self.dispatch(result.tickets.clone());
        }
        Ok(outcome)
    }

    /// Task completion plus the spawned proof upload when a photo is
    /// attached.
    pub fn complete_task(&self, cmd: CompleteTaskCommand) -> Result<CompleteTaskResult> {
        let result = self.store.complete_task(cmd)?;
        self.dispatch(result.tickets.clone());
        Ok(result)
    }

    pub fn approve_task(&self, task_id: &str) -> Result<ApproveTaskResult> {
        let result = self.store.approve_task(task_id)?;
        self.dispatch(result.tickets.clone());
        Ok(result)
    }

    /// Issue a mailbox verification code and hand its delivery to the
    /// notifier.
    pub fn send_mail_verification(&self, child_id: &str) -> Result<SendMailCodeResult> {
        let result = self.store.send_mail_verification(child_id)?;
        self.dispatch(result.tickets.clone());
        Ok(result)
    }
}
