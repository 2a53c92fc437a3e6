//! Trip state machine.

use common::smart_enum;

smart_enum! {
    /// The state of a trip in its lifecycle.
    ///
    /// State transitions:
    /// ```text
    /// Pending ──► InProgress ──► Completed
    ///    │            │
    ///    └────────────┴──► Cancelled
    /// ```
    #[derive(Default)]
    pub enum TripStatus {
        /// Created, not yet on the road.
        #[default]
        Pending = 1,

        /// Underway; checkpoints and incidents may be recorded.
        InProgress = 2,

        /// Delivered (terminal state).
        Completed = 3,

        /// Called off before delivery (terminal state).
        Cancelled = 4,
    }
}

impl TripStatus {
    pub fn can_start(&self) -> bool {
        matches!(self, TripStatus::Pending)
    }

    /// Returns true if checkpoints and incidents may be recorded.
    pub fn can_record(&self) -> bool {
        matches!(self, TripStatus::InProgress)
    }

    pub fn can_complete(&self) -> bool {
        matches!(self, TripStatus::InProgress)
    }

    pub fn can_cancel(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, TripStatus::Completed | TripStatus::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use common::SmartEnum;

    use super::*;

    #[test]
    fn default_status_is_pending() {
        assert_eq!(TripStatus::default(), TripStatus::Pending);
    }

    #[test]
    fn only_pending_can_start() {
        assert!(TripStatus::Pending.can_start());
        assert!(!TripStatus::InProgress.can_start());
        assert!(!TripStatus::Completed.can_start());
        assert!(!TripStatus::Cancelled.can_start());
    }

    #[test]
    fn only_in_progress_can_record_or_complete() {
        for status in TripStatus::ALL {
            let active = *status == TripStatus::InProgress;
            assert_eq!(status.can_record(), active);
            assert_eq!(status.can_complete(), active);
        }
    }

    #[test]
    fn non_terminal_states_can_cancel() {
        assert!(TripStatus::Pending.can_cancel());
        assert!(TripStatus::InProgress.can_cancel());
        assert!(!TripStatus::Completed.can_cancel());
        assert!(!TripStatus::Cancelled.can_cancel());
    }

    #[test]
    fn display_uses_variant_name() {
        assert_eq!(TripStatus::InProgress.to_string(), "InProgress");
        assert_eq!(TripStatus::from_name("inprogress", true), Some(TripStatus::InProgress));
    }
}
