//! Tokio runtime spawner implementation.

use std::future::Future;

use tokio::runtime::{Builder, Handle, Runtime};

use crate::core::Spawn;

/// Spawner that runs scheduler loops and task pipelines on a tokio runtime.
#[derive(Clone)]
pub struct TokioSpawner {
    handle: Handle,
}

impl TokioSpawner {
    /// Spawner on an existing runtime.
    #[must_use]
    pub const fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Spawner on the runtime of the calling context.
    ///
    /// # Panics
    ///
    /// When called outside a tokio runtime.
    #[must_use]
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Build a multi-threaded runtime and a spawner on it. The caller owns
    /// the runtime and must keep it alive while schedulers run.
    ///
    /// # Errors
    ///
    /// When the runtime cannot be built.
    pub fn with_worker_threads(worker_threads: usize) -> Result<(Runtime, Self), std::io::Error> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(worker_threads)
            .thread_name("pending-sync")
            .enable_all()
            .build()?;
        let spawner = Self::new(runtime.handle().clone());
        Ok((runtime, spawner))
    }

    /// Runtime handle, for entering the runtime context.
    #[must_use]
    pub const fn handle(&self) -> &Handle {
        &self.handle
    }
}

impl Spawn for TokioSpawner {
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle.spawn(fut);
    }
}
