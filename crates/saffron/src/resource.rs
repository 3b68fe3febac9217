//! Execution limits (§6 Configuration). Grounded on
//! `ouros::resource::{ResourceLimits, ResourceTracker, NoLimitTracker, LimitedTracker}`,
//! trimmed to the handful of limits a stack VM with a cooperative scheduler
//! actually needs: value-stack depth, call-frame depth, and a wall-clock
//! deadline checked at statement/yield boundaries. Allocation-count and
//! memory-byte limits are dropped — `Heap`'s own `next_gc` growth policy
//! already bounds memory growth (§4.6), and there is no separate allocator
//! to meter the way `ouros`'s Python-value allocator is metered.

use std::{
    fmt,
    time::{Duration, Instant},
};

/// Maximum value-stack depth (§4.5's `STACK_MAX`, `original_source/src/vm.h`).
pub const DEFAULT_STACK_MAX: usize = 4096;
/// Maximum call-frame depth (`original_source/src/vm.h`'s `FRAMES_MAX`).
pub const DEFAULT_FRAMES_MAX: usize = 512;

#[derive(Debug, Clone, PartialEq)]
pub enum ResourceError {
    StackOverflow { limit: usize },
    FrameOverflow { limit: usize },
    Time { limit: Duration, elapsed: Duration },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StackOverflow { limit } => write!(f, "stack overflow: exceeded {limit} slots"),
            Self::FrameOverflow { limit } => write!(f, "call stack overflow: exceeded {limit} frames"),
            Self::Time { limit, elapsed } => write!(f, "time limit exceeded: {elapsed:?} > {limit:?}"),
        }
    }
}

impl std::error::Error for ResourceError {}

/// Configurable limits. Embedders construct this programmatically — the CLI
/// exposes no flags for it, matching `ouros-cli`.
#[derive(Debug, Clone)]
pub struct Limits {
    pub max_stack: usize,
    pub max_frames: usize,
    pub max_time: Option<Duration>,
}

impl Default for Limits {
    fn default() -> Self {
        Self { max_stack: DEFAULT_STACK_MAX, max_frames: DEFAULT_FRAMES_MAX, max_time: None }
    }
}

pub trait ResourceTracker: fmt::Debug {
    fn check_stack_depth(&self, depth: usize) -> Result<(), ResourceError>;
    fn check_frame_depth(&self, depth: usize) -> Result<(), ResourceError>;
    /// Called at statement/yield boundaries (`ouros`'s same checkpoint
    /// granularity for `check_time`).
    fn check_time(&mut self) -> Result<(), ResourceError>;
}

/// The default tracker: enforces the fixed stack/frame ceilings (those are
/// not optional — they bound the VM's native stack usage too) but no
/// deadline.
#[derive(Debug, Clone, Default)]
pub struct NoLimitTracker;

impl ResourceTracker for NoLimitTracker {
    fn check_stack_depth(&self, depth: usize) -> Result<(), ResourceError> {
        if depth >= DEFAULT_STACK_MAX {
            Err(ResourceError::StackOverflow { limit: DEFAULT_STACK_MAX })
        } else {
            Ok(())
        }
    }

    fn check_frame_depth(&self, depth: usize) -> Result<(), ResourceError> {
        if depth >= DEFAULT_FRAMES_MAX {
            Err(ResourceError::FrameOverflow { limit: DEFAULT_FRAMES_MAX })
        } else {
            Ok(())
        }
    }

    fn check_time(&mut self) -> Result<(), ResourceError> {
        Ok(())
    }
}

/// A tracker with an explicit deadline, for sandboxed/embedder use.
#[derive(Debug, Clone)]
pub struct LimitedTracker {
    limits: Limits,
    deadline: Option<Instant>,
}

impl LimitedTracker {
    pub fn new(limits: Limits) -> Self {
        let deadline = limits.max_time.map(|d| Instant::now() + d);
        Self { limits, deadline }
    }
}

impl ResourceTracker for LimitedTracker {
    fn check_stack_depth(&self, depth: usize) -> Result<(), ResourceError> {
        if depth >= self.limits.max_stack {
            Err(ResourceError::StackOverflow { limit: self.limits.max_stack })
        } else {
            Ok(())
        }
    }

    fn check_frame_depth(&self, depth: usize) -> Result<(), ResourceError> {
        if depth >= self.limits.max_frames {
            Err(ResourceError::FrameOverflow { limit: self.limits.max_frames })
        } else {
            Ok(())
        }
    }

    fn check_time(&mut self) -> Result<(), ResourceError> {
        if let Some(deadline) = self.deadline {
            let now = Instant::now();
            if now >= deadline {
                let limit = self.limits.max_time.unwrap_or_default();
                return Err(ResourceError::Time { limit, elapsed: now.duration_since(deadline) + limit });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_limit_tracker_still_enforces_the_fixed_stack_ceiling() {
        let tracker = NoLimitTracker;
        assert!(tracker.check_stack_depth(DEFAULT_STACK_MAX - 1).is_ok());
        assert!(tracker.check_stack_depth(DEFAULT_STACK_MAX).is_err());
    }

    #[test]
    fn limited_tracker_with_no_deadline_never_times_out() {
        let mut tracker = LimitedTracker::new(Limits { max_time: None, ..Limits::default() });
        assert!(tracker.check_time().is_ok());
    }
}
