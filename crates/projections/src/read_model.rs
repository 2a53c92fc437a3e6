//! Queryable side of a projection.

/// A view that callers query directly, outside the event flow.
pub trait ReadModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Entries currently held. Reports 0 while a writer holds the lock.
    fn count(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.count() == 0
    }
}
