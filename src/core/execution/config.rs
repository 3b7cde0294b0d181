/// Configuration for simulation runs
///
/// Controls the bounds a single run is held to and how batches of
/// independent runs are spread over threads.

/// Enumeration of supported concurrency modes for batch runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencyMode {
    /// Runs execute one after another on the calling thread
    Sequential,
    /// Independent runs execute in parallel on a Rayon pool
    Rayon,
}

impl Default for ConcurrencyMode {
    fn default() -> Self {
        ConcurrencyMode::Sequential
    }
}

/// Configuration for simulation execution
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Deepest reaction cascade a single delivery may trigger before the run
    /// is stopped
    pub max_cascade_depth: usize,
    /// Upper bound on iterations for `always` protocols
    pub protocol_max_iterations: usize,
    /// How `run_batch` schedules runs
    pub concurrency_mode: ConcurrencyMode,
    /// The size of the thread pool for parallel batches
    /// Only relevant when concurrency_mode is Rayon
    pub thread_pool_size: Option<usize>,
}

impl SimulationConfig {
    pub const DEFAULT_MAX_CASCADE_DEPTH: usize = 64;
    pub const DEFAULT_PROTOCOL_MAX_ITERATIONS: usize = 5;

    /// Create a configuration with default bounds and sequential batches
    pub fn new() -> Self {
        Self {
            max_cascade_depth: Self::DEFAULT_MAX_CASCADE_DEPTH,
            protocol_max_iterations: Self::DEFAULT_PROTOCOL_MAX_ITERATIONS,
            concurrency_mode: ConcurrencyMode::default(),
            thread_pool_size: None,
        }
    }

    /// Set the concurrency mode for batch runs
    pub fn with_concurrency(mut self, mode: ConcurrencyMode) -> Self {
        self.concurrency_mode = mode;
        self
    }

    /// Set the thread pool size for parallel batches
    ///
    /// # Note
    /// This setting only affects execution when concurrency_mode is Rayon
    pub fn with_thread_pool_size(mut self, size: usize) -> Self {
        self.thread_pool_size = Some(size);
        self
    }

    pub fn with_max_cascade_depth(mut self, depth: usize) -> Self {
        self.max_cascade_depth = depth;
        self
    }

    pub fn with_protocol_max_iterations(mut self, iterations: usize) -> Self {
        self.protocol_max_iterations = iterations;
        self
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::new()
    }
}
