//! Remote gateway traits.
//!
//! One trait per entity family so alternative backends (or partial fakes in
//! tests) only implement what they care about. `RemoteGateway` bundles them
//! for the places that need the whole surface. All methods return
//! `anyhow::Result`; `Option` distinguishes "not there" from failure.

use anyhow::Result;
use async_trait::async_trait;

use super::records::{
    RemoteBadgeRecord, RemoteChildRecord, RemoteShippingRecord, RemoteSubscriptionRecord,
    RemoteTaskRecord, RemoteUserRecord,
};

/// What an uploaded asset is, which decides where it lands remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    TaskProof,
    Avatar,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::TaskProof => "proofs",
            AssetKind::Avatar => "avatars",
        }
    }
}

#[async_trait]
pub trait UserSync: Send + Sync {
    async fn create_user(&self, record: &RemoteUserRecord) -> Result<RemoteUserRecord>;
    async fn fetch_user(&self, user_id: &str) -> Result<Option<RemoteUserRecord>>;
    async fn fetch_user_by_email(&self, email: &str) -> Result<Option<RemoteUserRecord>>;
    async fn update_user(&self, record: &RemoteUserRecord) -> Result<()>;
}

#[async_trait]
pub trait ChildSync: Send + Sync {
    /// Create a child under its user. The remote side re-checks the plan's
    /// child limit authoritatively; `Ok(None)` means the limit rejected the
    /// add and the caller must compensate.
    async fn create_child(&self, record: &RemoteChildRecord) -> Result<Option<RemoteChildRecord>>;
    async fn update_child(&self, record: &RemoteChildRecord) -> Result<()>;
    async fn delete_child(&self, child_id: &str) -> Result<()>;
    async fn list_children(&self, user_id: &str) -> Result<Vec<RemoteChildRecord>>;
}

#[async_trait]
pub trait TaskSync: Send + Sync {
    async fn upsert_task(&self, record: &RemoteTaskRecord) -> Result<()>;
    async fn upsert_tasks(&self, records: &[RemoteTaskRecord]) -> Result<()>;
    async fn delete_tasks(&self, task_ids: &[String]) -> Result<()>;
    async fn list_tasks(&self, user_id: &str) -> Result<Vec<RemoteTaskRecord>>;
}

#[async_trait]
pub trait SubscriptionSync: Send + Sync {
    async fn fetch_subscription(&self, user_id: &str)
        -> Result<Option<RemoteSubscriptionRecord>>;
    async fn save_subscription(&self, record: &RemoteSubscriptionRecord) -> Result<()>;
    /// Lightweight plan tag, for surfaces that only need the plan name.
    async fn fetch_plan_tag(&self, user_id: &str) -> Result<Option<String>>;
    async fn save_plan_tag(&self, user_id: &str, plan: &str) -> Result<()>;
}

#[async_trait]
pub trait BadgeSync: Send + Sync {
    /// Upsert keyed by (child, badge id). Badges are append-mostly; an
    /// upsert of an existing badge updates its `redeemed` flag.
    async fn upsert_badge(&self, record: &RemoteBadgeRecord) -> Result<()>;
    async fn list_badges(&self, user_id: &str) -> Result<Vec<RemoteBadgeRecord>>;
}

#[async_trait]
pub trait ShippingSync: Send + Sync {
    /// One active address per user; saving replaces it.
    async fn save_shipping_address(&self, record: &RemoteShippingRecord) -> Result<()>;
    async fn fetch_shipping_address(&self, user_id: &str)
        -> Result<Option<RemoteShippingRecord>>;
}

#[async_trait]
pub trait AssetSync: Send + Sync {
    /// Upload a local asset and return its durable public URL. Callers keep
    /// the transient local reference when this fails.
    async fn upload_asset(&self, kind: AssetKind, local_ref: &str) -> Result<String>;
}

/// The full gateway surface. Blanket-implemented for anything that covers
/// every per-entity trait.
pub trait RemoteGateway:
    UserSync + ChildSync + TaskSync + SubscriptionSync + BadgeSync + ShippingSync + AssetSync
{
}

impl<T> RemoteGateway for T where
    T: UserSync + ChildSync + TaskSync + SubscriptionSync + BadgeSync + ShippingSync + AssetSync
{
}
