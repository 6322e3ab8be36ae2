//! Delivery claims and their validation.

use chrono::{DateTime, Utc};
use common::{ProductId, WarehouseId};
use serde::{Deserialize, Serialize};

use crate::error::ReconciliationError;

/// A physical stock arrival awaiting reconciliation, as reported by the caller.
///
/// Fields are raw so that malformed input can be represented and rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryClaim {
    pub product_id: i64,
    pub warehouse_id: i64,
    pub quantity: i64,
    pub delivered_at: DateTime<Utc>,
}

impl DeliveryClaim {
    pub fn new(
        product_id: i64,
        warehouse_id: i64,
        quantity: i64,
        delivered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            product_id,
            warehouse_id,
            quantity,
            delivered_at,
        }
    }

    /// Checks the claim's shape without touching any store.
    ///
    /// Identifiers and quantity must be positive and the delivery must not
    /// precede the Unix epoch. Every violation is reported in the message.
    pub fn validate(&self) -> Result<ValidClaim, ReconciliationError> {
        let mut problems = Vec::new();

        if self.product_id <= 0 {
            problems.push(format!("product_id must be positive, got {}", self.product_id));
        }
        if self.warehouse_id <= 0 {
            problems.push(format!(
                "warehouse_id must be positive, got {}",
                self.warehouse_id
            ));
        }
        if self.quantity <= 0 {
            problems.push(format!("quantity must be positive, got {}", self.quantity));
        }
        if self.delivered_at < DateTime::<Utc>::UNIX_EPOCH {
            problems.push(format!(
                "delivered_at must not precede the Unix epoch, got {}",
                self.delivered_at
            ));
        }

        if !problems.is_empty() {
            return Err(ReconciliationError::InvalidClaim(problems.join("; ")));
        }

        Ok(ValidClaim {
            product_id: ProductId::new(self.product_id),
            warehouse_id: WarehouseId::new(self.warehouse_id),
            quantity: self.quantity,
            delivered_at: self.delivered_at,
        })
    }
}

/// A delivery claim that passed [`DeliveryClaim::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidClaim {
    product_id: ProductId,
    warehouse_id: WarehouseId,
    quantity: i64,
    delivered_at: DateTime<Utc>,
}

impl ValidClaim {
    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        self.warehouse_id
    }

    /// Delivered quantity; always positive.
    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn delivered_at(&self) -> DateTime<Utc> {
        self.delivered_at
    }
}

impl TryFrom<DeliveryClaim> for ValidClaim {
    type Error = ReconciliationError;

    fn try_from(claim: DeliveryClaim) -> Result<Self, Self::Error> {
        claim.validate()
    }
}
