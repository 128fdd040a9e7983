use crate::domain::ports::{Store, StoreBox};

/// Everything a [`LedgerEngine`](super::engine::LedgerEngine) needs at
/// construction.
pub struct EngineConfig {
    /// Persistence port backing every engine operation.
    pub store: StoreBox,
}

impl EngineConfig {
    pub fn new(store: StoreBox) -> Self {
        Self { store }
    }
}

impl<S: Store + 'static> From<S> for EngineConfig {
    fn from(store: S) -> Self {
        Self::new(Box::new(store))
    }
}
