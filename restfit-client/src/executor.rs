//! Callback executors.
//!
//! The default call adapter can re-route completion callbacks through a
//! [`CallbackExecutor`] so they run on a caller-chosen context (an event
//! loop, a runtime, a test-controlled queue) instead of the transport's
//! I/O thread.

/// Runs completion callbacks on some execution context.
pub trait CallbackExecutor: Send + Sync {
    fn execute(&self, job: Box<dyn FnOnce() + Send>);
}

/// Runs callbacks inline on the delivering thread.
#[derive(Default)]
pub struct InlineExecutor;

impl CallbackExecutor for InlineExecutor {
    fn execute(&self, job: Box<dyn FnOnce() + Send>) {
        job();
    }
}

/// Spawns callbacks onto a tokio runtime.
pub struct TokioExecutor {
    handle: tokio::runtime::Handle,
}

impl TokioExecutor {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        TokioExecutor { handle }
    }

    /// Capture the runtime the caller is currently on.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime, like
    /// [`tokio::runtime::Handle::current`].
    pub fn current() -> Self {
        TokioExecutor {
            handle: tokio::runtime::Handle::current(),
        }
    }
}

impl CallbackExecutor for TokioExecutor {
    fn execute(&self, job: Box<dyn FnOnce() + Send>) {
        self.handle.spawn_blocking(job);
    }
}
