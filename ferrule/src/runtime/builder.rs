use super::Runtime;

use std::env;
use std::thread;

/// Environment variable read by [`RuntimeBuilder::from_env`].
pub const WORKER_THREADS_ENV: &str = "FERRULE_WORKER_THREADS";

const DEFAULT_THREAD_NAME: &str = "ferrule-worker";

/// Builder for configuring and creating a runtime.
///
/// # Examples
///
/// ```rust,ignore
/// let runtime = RuntimeBuilder::new()
///     .worker_threads(4)
///     .thread_name("pipeline")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct RuntimeBuilder {
    /// Capacity of the worker pool.
    worker_threads: usize,

    /// Prefix of worker and timer thread names.
    thread_name: String,
}

impl RuntimeBuilder {
    /// Creates a builder with one worker per available logical CPU,
    /// falling back to `1` if that cannot be determined.
    pub fn new() -> Self {
        let worker_threads = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Self {
            worker_threads,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }

    /// Creates a builder from defaults overridden by the environment.
    ///
    /// `FERRULE_WORKER_THREADS` sets the worker count; a value that is not a
    /// positive integer is logged and ignored.
    pub fn from_env() -> Self {
        let builder = Self::new();

        match env::var(WORKER_THREADS_ENV) {
            Ok(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => builder.worker_threads(n),
                _ => {
                    tracing::warn!(value = %raw, "ignoring invalid {WORKER_THREADS_ENV}");
                    builder
                }
            },
            Err(_) => builder,
        }
    }

    /// Sets the number of worker threads, i.e. how many units may run at
    /// the same time.
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    pub fn worker_threads(mut self, n: usize) -> Self {
        assert!(n > 0, "worker_threads must be > 0");

        self.worker_threads = n;
        self
    }

    /// Sets the prefix used to name runtime threads.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Starts the timer thread and the worker pool.
    pub fn build(self) -> Runtime {
        Runtime::new(self.worker_threads, &self.thread_name)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
