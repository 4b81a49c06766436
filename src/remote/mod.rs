//! Remote sync gateway: the boundary between local state and the backing
//! service. Traits define the contract, records define the wire shapes,
//! and the in-memory gateway is the reference implementation tests use.

pub mod memory;
pub mod records;
pub mod traits;

pub use memory::InMemoryGateway;
pub use traits::{
    AssetKind, AssetSync, BadgeSync, ChildSync, RemoteGateway, ShippingSync, SubscriptionSync,
    TaskSync, UserSync,
};
