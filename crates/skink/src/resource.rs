use std::{
    fmt,
    time::{Duration, Instant},
};

use crate::error::{ErrorKind, NativeError};

/// Default maximum script call depth when using [`LimitedTracker`].
pub const DEFAULT_MAX_CALL_DEPTH: usize = 1_000;

/// Error returned when a resource limit is exceeded during execution.
///
/// This allows the embedder to enforce strict limits on allocation count,
/// evaluation steps, execution time, memory usage, and call depth.
#[derive(Debug, Clone)]
pub enum ResourceError {
    /// Maximum number of heap allocations exceeded.
    Allocation { limit: usize, count: usize },
    /// Maximum evaluation steps exceeded.
    Step { limit: usize, count: usize },
    /// Maximum execution time exceeded.
    Time { limit: Duration, elapsed: Duration },
    /// Maximum memory usage exceeded.
    Memory { limit: usize, used: usize },
    /// Maximum script call depth exceeded.
    Recursion { limit: usize, depth: usize },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allocation { limit, count } => {
                write!(f, "allocation limit exceeded: {count} > {limit}")
            }
            Self::Step { limit, count } => {
                write!(f, "evaluation step limit exceeded: {count} > {limit}")
            }
            Self::Time { limit, elapsed } => {
                write!(f, "time limit exceeded: {elapsed:?} > {limit:?}")
            }
            Self::Memory { limit, used } => {
                write!(f, "memory limit exceeded: {used} bytes > {limit} bytes")
            }
            Self::Recursion { .. } => {
                write!(f, "Maximum call stack size exceeded")
            }
        }
    }
}

impl std::error::Error for ResourceError {}

impl ResourceError {
    /// Converts this resource error into a script-visible error.
    ///
    /// Recursion and memory breaches surface as `RangeError`; step and time
    /// breaches as `EvaluatorError`, since scripts cannot meaningfully react
    /// to them but embedders may still want to catch the structured kind.
    pub(crate) fn into_native_error(self) -> NativeError {
        let kind = match self {
            Self::Memory { .. } | Self::Allocation { .. } | Self::Recursion { .. } => ErrorKind::Range,
            Self::Step { .. } | Self::Time { .. } => ErrorKind::Evaluator,
        };
        NativeError::new(kind, self.to_string())
    }
}

/// Configurable limits for script execution.
///
/// Used with [`LimitedTracker`]. A `None` field means that dimension is
/// unlimited.
#[derive(Debug, Clone, Default)]
pub struct ResourceLimits {
    /// Maximum number of heap allocations.
    pub max_allocations: Option<usize>,
    /// Maximum number of evaluation steps (roughly, statements executed).
    pub max_steps: Option<usize>,
    /// Maximum wall-clock execution time, checked at step boundaries.
    pub max_duration: Option<Duration>,
    /// Maximum estimated heap memory in bytes.
    pub max_memory: Option<usize>,
    /// Maximum script call depth. Defaults to [`DEFAULT_MAX_CALL_DEPTH`]
    /// when constructed via [`ResourceLimits::sandboxed`].
    pub max_call_depth: Option<usize>,
}

impl ResourceLimits {
    /// A conservative starting point for untrusted scripts.
    pub fn sandboxed() -> Self {
        Self {
            max_allocations: Some(1_000_000),
            max_steps: Some(10_000_000),
            max_duration: Some(Duration::from_secs(5)),
            max_memory: Some(64 * 1024 * 1024),
            max_call_depth: Some(DEFAULT_MAX_CALL_DEPTH),
        }
    }
}

/// Tracks resource usage during execution.
///
/// The heap reports allocations and frees; the evaluator reports steps and
/// call depth. Implementations decide whether to enforce limits.
pub trait ResourceTracker {
    /// Called before each heap allocation with the estimated size in bytes.
    fn on_allocate(&mut self, size: usize) -> Result<(), ResourceError>;

    /// Called when heap memory is released.
    fn on_free(&mut self, size: usize);

    /// Called once per executed statement.
    fn on_step(&mut self) -> Result<(), ResourceError>;

    /// Called before entering a script function with the new call depth.
    fn check_call_depth(&self, depth: usize) -> Result<(), ResourceError>;
}

/// Tracker that imposes no limits.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLimitTracker;

impl ResourceTracker for NoLimitTracker {
    fn on_allocate(&mut self, _size: usize) -> Result<(), ResourceError> {
        Ok(())
    }

    fn on_free(&mut self, _size: usize) {}

    fn on_step(&mut self) -> Result<(), ResourceError> {
        Ok(())
    }

    fn check_call_depth(&self, depth: usize) -> Result<(), ResourceError> {
        // Even without configured limits we refuse depths that would
        // overflow the host stack in a tree-walking evaluator. Debug builds
        // use a much lower ceiling since their frames are far larger.
        #[cfg(debug_assertions)]
        const HARD_DEPTH_LIMIT: usize = 120;
        #[cfg(not(debug_assertions))]
        const HARD_DEPTH_LIMIT: usize = 1_000;
        if depth > HARD_DEPTH_LIMIT {
            return Err(ResourceError::Recursion {
                limit: HARD_DEPTH_LIMIT,
                depth,
            });
        }
        Ok(())
    }
}

/// Tracker enforcing [`ResourceLimits`].
#[derive(Debug, Clone)]
pub struct LimitedTracker {
    limits: ResourceLimits,
    allocations: usize,
    steps: usize,
    memory_used: usize,
    started: Instant,
}

impl LimitedTracker {
    pub fn new(limits: ResourceLimits) -> Self {
        Self {
            limits,
            allocations: 0,
            steps: 0,
            memory_used: 0,
            started: Instant::now(),
        }
    }

    /// Current estimated memory use in bytes.
    pub fn memory_used(&self) -> usize {
        self.memory_used
    }

    /// Number of allocations so far.
    pub fn allocations(&self) -> usize {
        self.allocations
    }
}

impl ResourceTracker for LimitedTracker {
    fn on_allocate(&mut self, size: usize) -> Result<(), ResourceError> {
        self.allocations += 1;
        if let Some(limit) = self.limits.max_allocations {
            if self.allocations > limit {
                return Err(ResourceError::Allocation {
                    limit,
                    count: self.allocations,
                });
            }
        }
        self.memory_used = self.memory_used.saturating_add(size);
        if let Some(limit) = self.limits.max_memory {
            if self.memory_used > limit {
                return Err(ResourceError::Memory {
                    limit,
                    used: self.memory_used,
                });
            }
        }
        Ok(())
    }

    fn on_free(&mut self, size: usize) {
        self.memory_used = self.memory_used.saturating_sub(size);
    }

    fn on_step(&mut self) -> Result<(), ResourceError> {
        self.steps += 1;
        if let Some(limit) = self.limits.max_steps {
            if self.steps > limit {
                return Err(ResourceError::Step {
                    limit,
                    count: self.steps,
                });
            }
        }
        // Checking time on every step would be wasteful; every 1024 steps is
        // plenty of resolution for a wall-clock limit.
        if self.steps % 1024 == 0 {
            if let Some(limit) = self.limits.max_duration {
                let elapsed = self.started.elapsed();
                if elapsed > limit {
                    return Err(ResourceError::Time { limit, elapsed });
                }
            }
        }
        Ok(())
    }

    fn check_call_depth(&self, depth: usize) -> Result<(), ResourceError> {
        let limit = self.limits.max_call_depth.unwrap_or(DEFAULT_MAX_CALL_DEPTH);
        if depth > limit {
            return Err(ResourceError::Recursion { limit, depth });
        }
        Ok(())
    }
}
