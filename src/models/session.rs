use std::fmt;

/// Where the automation currently is in its cycle.
///
/// ```text
/// Idle --toggle--> Scanning --exact stack--> Selling --window--> Scanning
///                     |  \--excess-------> Preparing --split--> Selling
///                     |   \--in storage--> Preparing --move---> Scanning
///                     |    \--blocked----> Failback --sold----> Scanning
///                     \--nothing left----> Exhausted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CyclePhase {
    #[default]
    Idle,
    Scanning,
    /// Splitting a stack or relocating it from storage to the hotbar.
    Preparing,
    Selling,
    Failback,
    /// Nothing left to sell. Terminal until the next activation.
    Exhausted,
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::Preparing => "preparing",
            Self::Selling => "selling",
            Self::Failback => "failback",
            Self::Exhausted => "exhausted",
        };
        f.write_str(name)
    }
}

/// Point-in-time copy of the session flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub active: bool,
    pub cycle_in_flight: bool,
    pub in_failback: bool,
    pub resell_scheduled: bool,
    pub phase: CyclePhase,
}

impl SessionSnapshot {
    /// Failback and its resell task always come and go together.
    pub fn failback_consistent(&self) -> bool {
        self.in_failback == self.resell_scheduled
    }

    /// State every deactivation must leave behind.
    pub fn is_fully_stopped(&self) -> bool {
        !self.active && !self.cycle_in_flight && !self.in_failback && !self.resell_scheduled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_phase_is_idle() {
        assert_eq!(CyclePhase::default(), CyclePhase::Idle);
        assert_eq!(CyclePhase::Failback.to_string(), "failback");
    }

    #[test]
    fn test_snapshot_predicates() {
        let stopped = SessionSnapshot {
            active: false,
            cycle_in_flight: false,
            in_failback: false,
            resell_scheduled: false,
            phase: CyclePhase::Idle,
        };
        assert!(stopped.is_fully_stopped());
        assert!(stopped.failback_consistent());

        let torn = SessionSnapshot {
            in_failback: true,
            ..stopped
        };
        assert!(!torn.failback_consistent());
        assert!(!torn.is_fully_stopped());
    }
}
