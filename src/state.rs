use std::{path::Path, sync::Arc};

use crate::{
    repository::{InMemoryOrderRepository, RepositoryResult},
    service::OrderService,
    store::ParityDbOrderRepository,
};

#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<OrderService>,
}

impl AppState {
    pub fn new(service: OrderService) -> Self {
        Self {
            orders: Arc::new(service),
        }
    }

    /// Orders kept in process memory only.
    pub fn in_memory() -> Self {
        Self::new(OrderService::with_system_defaults(Arc::new(
            InMemoryOrderRepository::new(),
        )))
    }

    /// Orders persisted in a ParityDB under `path`.
    pub fn persistent(path: impl AsRef<Path>) -> RepositoryResult<Self> {
        let repo = ParityDbOrderRepository::open(path)?;
        Ok(Self::new(OrderService::with_system_defaults(Arc::new(repo))))
    }
}

impl Default for AppState {
    fn default() -> Self {
        AppState::in_memory()
    }
}
