use thiserror::Error;

use crate::OrderId;

/// Errors that can occur when interacting with the entity store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A concurrent transaction fulfilled the order first.
    ///
    /// Raised by the conditional fulfillment update and by the unique
    /// constraint on the inventory record's order reference.
    #[error("Conflict on order {order_id}: {reason}")]
    Conflict { order_id: OrderId, reason: String },

    /// A row would violate a storage constraint.
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// The store refused the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Returns true if the error is a lost race against another transaction.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Result type for entity store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
