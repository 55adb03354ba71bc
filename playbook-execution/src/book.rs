use crate::{
    error::ExecutionError,
    order::{Order, OrderId},
};
use indexmap::IndexMap;

/// Pending order book: `OrderId -> Order` in insertion order.
///
/// Insertion order IS the deterministic fill-evaluation order; removal uses
/// `shift_remove` to preserve it.
#[derive(Debug, Clone, Default)]
pub struct OrderBook {
    orders: IndexMap<OrderId, Order>,
    cap: usize,
}

impl OrderBook {
    pub fn new(cap: usize) -> Self {
        Self {
            orders: IndexMap::new(),
            cap,
        }
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Insert a pending order, enforcing the book cap.
    pub fn insert(&mut self, order: Order) -> Result<(), ExecutionError> {
        if self.orders.len() >= self.cap {
            return Err(ExecutionError::OrderBookFull { cap: self.cap });
        }
        self.orders.insert(order.id.clone(), order);
        Ok(())
    }

    pub fn remove(&mut self, id: &OrderId) -> Option<Order> {
        self.orders.shift_remove(id)
    }

    pub fn get_mut(&mut self, id: &OrderId) -> Option<&mut Order> {
        self.orders.get_mut(id)
    }

    /// Pending order ids in insertion order. Collected so fills can mutate the book
    /// while iterating.
    pub fn ids(&self) -> Vec<OrderId> {
        self.orders.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }

    pub fn clear(&mut self) {
        self.orders.clear();
    }
}
