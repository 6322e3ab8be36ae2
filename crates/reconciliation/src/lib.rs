//! Delivery reconciliation.
//!
//! Matches an incoming delivery to the purchase order it fulfills and, in
//! one transaction, marks the order fulfilled and records the stock:
//! - `DeliveryClaim` validation
//! - `OrderMatcher` selecting the earliest outstanding order
//! - `FulfillmentCoordinator` running the transactional unit of work
//! - `ReconciliationService` as the public entry point

pub mod claim;
pub mod coordinator;
pub mod error;
pub mod matcher;
pub mod service;

pub use claim::{DeliveryClaim, ValidClaim};
pub use coordinator::FulfillmentCoordinator;
pub use error::ReconciliationError;
pub use matcher::{MatchOutcome, OrderMatcher};
pub use service::ReconciliationService;
