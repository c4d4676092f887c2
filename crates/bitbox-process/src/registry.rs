//! Maps opaque process IDs to [`ProcessHandle`]s and mediates concurrent
//! lookups and mutations.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use bitbox_core::{ProcessId, ProcessInfo, ProcessStatus, SupervisorError};

use crate::handle::{ProcessHandle, SpawnOptions, Subscription, SupervisorOptions};

/// A registry of supervised processes, keyed by [`ProcessId`].
///
/// `start` spawns the child outside the write lock and only takes it
/// briefly to install the new handle; `stop`/`status`/`query` take the
/// read lock to look the handle up, then delegate to it directly. A
/// process that has exited remains queryable until the registry itself
/// is dropped — nothing here ever removes a handle implicitly.
pub struct Registry {
    processes: RwLock<HashMap<ProcessId, Arc<ProcessHandle>>>,
    options: SupervisorOptions,
}

impl Registry {
    pub fn new() -> Self {
        Self::with_options(SupervisorOptions::default())
    }

    pub fn with_options(options: SupervisorOptions) -> Self {
        Self {
            processes: RwLock::new(HashMap::new()),
            options,
        }
    }

    /// Spawn `command` with `args` and install it under a fresh ID.
    pub async fn start(&self, command: &str, args: &[String]) -> Result<ProcessId, SupervisorError> {
        self.start_with_options(command, args, &SpawnOptions::default())
            .await
    }

    pub async fn start_with_options(
        &self,
        command: &str,
        args: &[String],
        spawn_options: &SpawnOptions,
    ) -> Result<ProcessId, SupervisorError> {
        for _ in 0..self.options.id_retry_budget {
            let id = ProcessId::new();
            let handle =
                ProcessHandle::spawn(id, command, args, spawn_options, self.options.clone()).await?;

            let mut guard = self.processes.write().await;
            if guard.contains_key(&id) {
                drop(guard);
                // Collision against a concurrently-installed handle. Stop
                // the one we just spawned rather than orphaning it, then
                // retry with a fresh ID.
                let _ = handle.stop().await;
                continue;
            }
            guard.insert(id, Arc::new(handle));
            debug!(process_id = %id, command, "process registered");
            return Ok(id);
        }

        Err(SupervisorError::InternalError(
            "process id collided past the retry budget".into(),
        ))
    }

    /// Send an unconditional kill to the process and block until its
    /// terminal state is recorded.
    pub async fn stop(&self, id: ProcessId) -> Result<(), SupervisorError> {
        self.find(id).await?.stop().await
    }

    /// Non-blocking lifecycle snapshot.
    pub async fn status(&self, id: ProcessId) -> Result<ProcessStatus, SupervisorError> {
        Ok(self.find(id).await?.status())
    }

    /// Open a new subscription on the process's output.
    pub async fn query(&self, id: ProcessId) -> Result<Subscription, SupervisorError> {
        self.find(id).await?.subscribe().await
    }

    /// A diagnostic snapshot (id, status, spawn time) for logging and
    /// introspection; cheaper than assembling the same from `status` alone
    /// when a caller wants to report spawn age too.
    pub async fn info(&self, id: ProcessId) -> Result<ProcessInfo, SupervisorError> {
        Ok(self.find(id).await?.info())
    }

    /// Number of handles currently tracked, including terminated ones
    /// that have not been explicitly removed.
    pub async fn len(&self) -> usize {
        self.processes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn find(&self, id: ProcessId) -> Result<Arc<ProcessHandle>, SupervisorError> {
        self.processes
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(SupervisorError::UnknownProcess(id))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
