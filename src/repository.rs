use std::collections::HashMap;

use bincode::error::{DecodeError, EncodeError};
use parking_lot::RwLock;
use thiserror::Error;

use crate::orders::Order;

/// Errors from an order storage backend.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("ParityDB error: {0}")]
    Parity(#[from] parity_db::Error),

    #[error("Bincode encode error: {0}")]
    BincodeEncode(#[from] EncodeError),

    #[error("Bincode decode error: {0}")]
    BincodeDecode(#[from] DecodeError),

    #[error("order id `{0}` already exists")]
    DuplicateId(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Storage for orders keyed by id.
///
/// - `create` is visible to the next `get`/`list` call.
/// - `update` on an unknown id returns `None` and stores nothing.
/// - `delete` reports whether the id existed, so a second delete returns `false`.
pub trait OrderRepository: Send + Sync {
    fn list(&self) -> RepositoryResult<Vec<Order>>;
    fn get(&self, id: &str) -> RepositoryResult<Option<Order>>;
    fn create(&self, order: Order) -> RepositoryResult<Order>;
    fn update(&self, id: &str, order: Order) -> RepositoryResult<Option<Order>>;
    fn delete(&self, id: &str) -> RepositoryResult<bool>;
}

/// Process-local map of orders. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<String, Order>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OrderRepository for InMemoryOrderRepository {
    fn list(&self) -> RepositoryResult<Vec<Order>> {
        let mut orders: Vec<Order> = self.orders.read().values().cloned().collect();
        orders.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
        Ok(orders)
    }

    fn get(&self, id: &str) -> RepositoryResult<Option<Order>> {
        Ok(self.orders.read().get(id).cloned())
    }

    fn create(&self, order: Order) -> RepositoryResult<Order> {
        let mut orders = self.orders.write();
        if orders.contains_key(&order.id) {
            return Err(RepositoryError::DuplicateId(order.id));
        }
        orders.insert(order.id.clone(), order.clone());
        Ok(order)
    }

    fn update(&self, id: &str, order: Order) -> RepositoryResult<Option<Order>> {
        let mut orders = self.orders.write();
        match orders.get_mut(id) {
            Some(slot) => {
                *slot = order.clone();
                Ok(Some(order))
            }
            None => Ok(None),
        }
    }

    fn delete(&self, id: &str) -> RepositoryResult<bool> {
        Ok(self.orders.write().remove(id).is_some())
    }
}
