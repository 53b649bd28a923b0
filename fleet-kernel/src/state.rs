use parking_lot::RwLock;
use std::sync::Arc;

/// Shared state: writers serialize on the write lock, readers share the read lock.
pub type Shared<T> = Arc<RwLock<T>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(RwLock::new(value))
}
