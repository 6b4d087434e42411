use serde::{Deserialize, Serialize};

/// Synchronization state of a cache facade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SyncStatus {
    /// No data yet, or state discarded after unsubscribe / gap
    #[default]
    Uninitialized,
    /// Snapshot fetch in flight; live events are held back
    Synchronizing,
    /// Continuity established, events applied as they arrive
    Live,
}

impl SyncStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, SyncStatus::Live)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_ready() {
        assert!(!SyncStatus::Uninitialized.is_ready());
        assert!(!SyncStatus::Synchronizing.is_ready());
        assert!(SyncStatus::Live.is_ready());
    }

    #[test]
    fn test_default() {
        assert_eq!(SyncStatus::default(), SyncStatus::Uninitialized);
    }
}
