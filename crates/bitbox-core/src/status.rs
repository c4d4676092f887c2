use serde::{Deserialize, Serialize};

/// Snapshot of a process's lifecycle state.
///
/// `Exited` and `Stopped` are both terminal; they differ only in whether
/// the kernel reported a normal exit code or a signal termination. The
/// split is derived from the recorded exit code, not tracked separately:
/// `code < 0` means `Stopped`, `code >= 0` means `Exited`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessStatus {
    /// The child has not yet terminated.
    Running,
    /// The child terminated with a normal (non-negative) exit code.
    Exited,
    /// The child terminated by signal.
    Stopped,
}

impl ProcessStatus {
    /// Derive a status from a recorded exit code, following the reference
    /// rule `code < 0 => Stopped`.
    pub fn from_exit_code(code: i32) -> Self {
        if code < 0 {
            ProcessStatus::Stopped
        } else {
            ProcessStatus::Exited
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProcessStatus::Running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_code_is_stopped() {
        assert_eq!(ProcessStatus::from_exit_code(-9), ProcessStatus::Stopped);
    }

    #[test]
    fn zero_and_positive_codes_are_exited() {
        assert_eq!(ProcessStatus::from_exit_code(0), ProcessStatus::Exited);
        assert_eq!(ProcessStatus::from_exit_code(1), ProcessStatus::Exited);
    }

    #[test]
    fn running_is_not_terminal() {
        assert!(!ProcessStatus::Running.is_terminal());
        assert!(ProcessStatus::Exited.is_terminal());
        assert!(ProcessStatus::Stopped.is_terminal());
    }
}
