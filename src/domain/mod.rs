//! # Domain Module
//!
//! All business logic for the mail club: models, the point economy, task
//! generation, plan gating and the state store that applies every rule.
//! It operates independently of any UI framework and of the remote
//! backend; sync is expressed as tickets the store hands back.
//!
//! ## Module Organization
//!
//! - **models**: entities (user, child, task, subscription, badge)
//! - **store**: the `FamilyStore` state container and every mutation
//! - **commands**: input and result shapes for store operations
//! - **task_generator**: age-banded daily task templates
//! - **subscription_limits**: plan capability rows and shipping cadence
//! - **achievements**: badge and sticker tables plus the pure evaluator
//!
//! ## Business Rules
//!
//! - Points split into a spendable balance and a lifetime total; levels
//!   derive from the lifetime total and never go down
//! - Task approval is the only transition that pays points
//! - Plan limits gate how many children a family can enroll
//! - Consistent approvals fill the mail meter that triggers physical mail

pub mod achievements;
pub mod commands;
pub mod models;
pub mod store;
pub mod subscription_limits;
pub mod task_generator;

pub use store::FamilyStore;
