//! Selection of the order a delivery fulfills.

use chrono::{DateTime, Utc};
use common::{OrderId, ProductId};
use entity_store::{Order, OrderMatch, StoreTransaction};

/// Result of looking for the order a delivery fulfills.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// The earliest outstanding order for the delivery.
    Outstanding(Order),
    /// Nothing outstanding matches, but this order would have and is
    /// already fulfilled.
    AlreadyFulfilled(OrderId),
    NoMatch,
}

/// Finds the outstanding order a delivery satisfies.
///
/// An order qualifies when it is for the delivered product, was placed for
/// exactly the delivered quantity, was created strictly before the delivery
/// and has not been fulfilled. The earliest `created_at` wins; ties go to
/// the lowest order id, so repeated lookups over unchanged data agree.
///
/// The matcher only reads. Its answer is re-checked by the coordinator
/// before anything is written.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderMatcher;

impl OrderMatcher {
    /// Looks the order up inside an open transaction.
    pub async fn find_outstanding_order<T>(
        tx: &mut T,
        product_id: ProductId,
        quantity: i64,
        delivered_at: DateTime<Utc>,
    ) -> entity_store::Result<MatchOutcome>
    where
        T: StoreTransaction + ?Sized,
    {
        let query = OrderMatch::new(product_id, quantity, delivered_at);

        if let Some(order) = tx.find_outstanding_order(&query).await? {
            tracing::debug!(order_id = %order.id, "matched outstanding order");
            return Ok(MatchOutcome::Outstanding(order));
        }

        match tx.find_fulfilled_order(&query).await? {
            Some(order) => Ok(MatchOutcome::AlreadyFulfilled(order.id)),
            None => Ok(MatchOutcome::NoMatch),
        }
    }

    /// Applies the same policy to an in-memory snapshot of orders.
    pub fn match_snapshot(
        orders: &[Order],
        product_id: ProductId,
        quantity: i64,
        delivered_at: DateTime<Utc>,
    ) -> MatchOutcome {
        let query = OrderMatch::new(product_id, quantity, delivered_at);

        if let Some(order) = query.select_outstanding(orders) {
            return MatchOutcome::Outstanding(order.clone());
        }

        match query.select_fulfilled(orders) {
            Some(order) => MatchOutcome::AlreadyFulfilled(order.id),
            None => MatchOutcome::NoMatch,
        }
    }
}
