use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::id::ProcessId;
use crate::status::ProcessStatus;

/// A diagnostic snapshot of one supervised process, for logging and
/// introspection rather than lifecycle control.
///
/// Unlike [`ProcessStatus`] alone, this carries enough structured data to
/// log a one-line summary of an operation (`process_id`, `status`, how
/// long the process has been tracked) without a caller needing to make a
/// second round trip to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub id: ProcessId,
    pub status: ProcessStatus,
    pub started_at: SystemTime,
}

impl ProcessInfo {
    pub fn new(id: ProcessId, status: ProcessStatus, started_at: SystemTime) -> Self {
        Self {
            id,
            status,
            started_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carries_the_fields_it_was_built_from() {
        let id = ProcessId::new();
        let now = SystemTime::now();
        let info = ProcessInfo::new(id, ProcessStatus::Running, now);
        assert_eq!(info.id, id);
        assert_eq!(info.status, ProcessStatus::Running);
        assert_eq!(info.started_at, now);
    }
}
