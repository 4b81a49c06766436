//! Plain domain data for the Posty engine.
//!
//! These models carry the core business information (users, children, tasks,
//! subscriptions, badges) and small derived helpers. They hold no I/O and no
//! service logic; services in the parent module mutate them through the store.

pub mod badge;
pub mod child;
pub mod subscription;
pub mod task;
pub mod user;

pub use badge::Badge;
pub use child::{AgeGroup, Child, Gender};
pub use subscription::{SignupType, Subscription, SubscriptionPlan, SubscriptionStatus};
pub use task::{NoPointsReason, Task, TaskCategory, TaskProof, TaskStatus};
pub use user::{ShippingAddress, User};
