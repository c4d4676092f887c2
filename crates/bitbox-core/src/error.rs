use crate::id::ProcessId;

/// The error taxonomy returned by the supervisor's in-process API.
///
/// Each variant is a distinct tag callers can match on; transport
/// adapters map these to wire-level status codes, but that mapping is
/// their concern, not this crate's.
#[derive(thiserror::Error, Debug)]
pub enum SupervisorError {
    #[error("command '{0}' could not be resolved on the execution search path")]
    CommandNotFound(String),

    #[error("failed to spawn process: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("failed to create output sink: {0}")]
    SinkCreateFailed(#[source] std::io::Error),

    #[error("failed to open tail reader on output sink: {0}")]
    SinkOpenFailed(#[source] std::io::Error),

    #[error("failed to signal process: {0}")]
    SignalFailed(#[source] std::io::Error),

    #[error("no process registered for id {0}")]
    UnknownProcess(ProcessId),

    #[error("internal invariant violated: {0}")]
    InternalError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_not_found_displays_the_command() {
        let err = SupervisorError::CommandNotFound("/no/such/binary".into());
        assert_eq!(
            err.to_string(),
            "command '/no/such/binary' could not be resolved on the execution search path"
        );
    }

    #[test]
    fn unknown_process_displays_the_id() {
        let id = ProcessId::new();
        let err = SupervisorError::UnknownProcess(id);
        assert_eq!(err.to_string(), format!("no process registered for id {id}"));
    }

    #[test]
    fn spawn_failed_wraps_the_io_error() {
        let io_err = std::io::Error::other("boom");
        let err = SupervisorError::SpawnFailed(io_err);
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SupervisorError>();
    }
}
