use serde::{Deserialize, Serialize};

/// Optimistic concurrency token attached to every persisted entity.
///
/// `initial()` marks an entity the store has never seen. The store assigns
/// `first()` when the entity is added and the next token on every successful
/// update, so a token only ever moves forward.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct VersionToken(i64);

impl VersionToken {
    /// Creates a token from a raw stored value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Token of an entity that has not been persisted yet.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Token assigned by the store on first write.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the token the store assigns after this one.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn is_initial(&self) -> bool {
        self.0 == 0
    }

    /// Returns the raw stored value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for VersionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for VersionToken {
    fn from(value: i64) -> Self {
        Self(value)
    }
}
