use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::{Order, ProductId};

/// Predicate selecting the order a delivery fulfills.
///
/// An order matches when it is for the same product, was placed for exactly
/// the delivered quantity, and was created strictly before the delivery.
/// Among matches the earliest `created_at` wins, ties going to the lowest
/// order id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderMatch {
    pub product_id: ProductId,
    pub quantity: i64,
    pub created_before: DateTime<Utc>,
}

impl OrderMatch {
    pub fn new(product_id: ProductId, quantity: i64, created_before: DateTime<Utc>) -> Self {
        Self {
            product_id,
            quantity,
            created_before,
        }
    }

    /// Returns true if `order` is outstanding and satisfies the predicate.
    pub fn matches(&self, order: &Order) -> bool {
        order.is_outstanding() && self.matches_ignoring_fulfillment(order)
    }

    /// Returns true if `order` satisfies the predicate, fulfilled or not.
    pub fn matches_ignoring_fulfillment(&self, order: &Order) -> bool {
        order.product_id == self.product_id
            && order.quantity == self.quantity
            && order.created_at < self.created_before
    }

    /// Selects the earliest outstanding match.
    pub fn select_outstanding<'a, I>(&self, orders: I) -> Option<&'a Order>
    where
        I: IntoIterator<Item = &'a Order>,
    {
        orders
            .into_iter()
            .filter(|order| self.matches(order))
            .min_by(|a, b| match_order(a, b))
    }

    /// Selects the earliest fulfilled match.
    pub fn select_fulfilled<'a, I>(&self, orders: I) -> Option<&'a Order>
    where
        I: IntoIterator<Item = &'a Order>,
    {
        orders
            .into_iter()
            .filter(|order| !order.is_outstanding() && self.matches_ignoring_fulfillment(order))
            .min_by(|a, b| match_order(a, b))
    }
}

/// Ordering used to pick among matching orders.
pub fn match_order(a: &Order, b: &Order) -> Ordering {
    a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id))
}
