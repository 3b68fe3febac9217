//! Cooperative task scheduling (§4.7, §5).
//!
//! Ported from `original_source/src/libc/async.c` and `libc/task.c`: a
//! round-robin run queue plus a parallel sleeper list, not a generic
//! priority queue (the original's own `getTasks` carries a
//! `// TODO: Make the queue a heapq` that was never acted on; Saffron keeps
//! the linear scan rather than inventing a heap the reference never had).

use crate::{heap::HeapId, value::Value};

/// Bits of [`CallFrameObj::state`]. Mirrors the C original's anonymous
/// bitflag enum (`SPAWNED`, `PAUSED`, `EXECUTING`, `GENERATOR`, `FINISHED`)
/// restricted to the subset spec.md's task model actually uses.
pub mod frame_state {
    pub const SPAWNED: u8 = 1 << 0;
    pub const PAUSED: u8 = 1 << 1;
    pub const EXECUTING: u8 = 1 << 2;
    pub const FINISHED: u8 = 1 << 3;
}

/// The yield-op discriminant a task's `yield [op, ...]` list encodes in slot
/// 0 (§4.7). Only `SLEEP` is in scope; anything else is a runtime error.
pub const YIELD_SLEEP: i64 = 1;

/// One suspended or running call frame, tracked independently of the value
/// stack frame used for ordinary (non-task) calls. Corresponds to
/// `ObjCallFrame` in `original_source/src/vm.h`.
#[derive(Debug)]
pub struct CallFrameObj {
    pub closure: HeapId,
    pub ip: usize,
    /// Index into this frame's own private value stack (tasks do not share
    /// the main VM stack — each gets its own, per §5's isolation
    /// invariant), mirroring `ObjCallFrame.stack` in the original.
    pub stack: Vec<Value>,
    pub slots_base: usize,
    pub state: u8,
    /// Value stashed by `getTasks()` to wake a sleeper: `true` once its
    /// deadline has passed, consumed by the next `resume`.
    pub stored: Value,
    pub result: Value,
    pub parent: Option<HeapId>,
    /// Upvalues still open on this frame's own stack, most-recently-opened
    /// last. The reference keeps one VM-global open-upvalue list keyed by
    /// stack pointer; Saffron gives every frame a private stack instead
    /// (§5's task-isolation invariant), so the open list is private to the
    /// frame it points into as well.
    pub open_upvalues: Vec<HeapId>,
}

impl CallFrameObj {
    /// `state` starts at 0 (not `SPAWNED`): an ordinary call creates a frame
    /// that is neither a task root nor currently in any scheduler queue.
    /// `Vm::spawn_task` sets `SPAWNED` explicitly on the frames it hands to
    /// `Scheduler::spawn`.
    pub fn new(closure: HeapId, ip: usize) -> Self {
        Self {
            closure,
            ip,
            stack: Vec::new(),
            slots_base: 0,
            state: 0,
            stored: Value::Nil,
            result: Value::Nil,
            parent: None,
            open_upvalues: Vec::new(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state & frame_state::FINISHED != 0
    }
}

/// A `Task` value: a thin wrapper around the spawned call frame it tracks
/// (§3 `Task`). `getResult`/`isReady` read straight through to the frame.
#[derive(Debug)]
pub struct TaskObj {
    pub frame: HeapId,
}

struct Sleeper {
    frame: HeapId,
    wake_at: f64,
}

/// The round-robin scheduler: a run queue of task call frames plus a
/// sleeper list, advanced one step per `yield`/task switch (§4.7).
///
/// `now` is supplied by the caller (the VM) rather than read from a clock
/// here, so the scheduler itself stays deterministic and testable.
#[derive(Default)]
pub struct Scheduler {
    tasks: Vec<HeapId>,
    current: usize,
    sleepers: Vec<Sleeper>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self { tasks: Vec::new(), current: 0, sleepers: Vec::new() }
    }

    pub fn spawn(&mut self, frame: HeapId) {
        self.tasks.push(frame);
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn current_frame(&self) -> Option<HeapId> {
        self.tasks.get(self.current).copied()
    }

    /// Every frame the scheduler still holds a reference to, running or
    /// sleeping — used by the GC to root tasks the caller's own value stack
    /// no longer references directly (§4.6).
    pub fn all_frames(&self) -> impl Iterator<Item = HeapId> + '_ {
        self.tasks.iter().copied().chain(self.sleepers.iter().map(|s| s.frame))
    }

    /// The soonest deadline among sleeping tasks, if any. When the run queue
    /// is empty but a task is sleeping, this is how long the VM has to
    /// actually wait (there being only one OS thread) before anything in the
    /// program can make progress again.
    pub fn earliest_wake(&self) -> Option<f64> {
        self.sleepers.iter().map(|s| s.wake_at).fold(None, |acc, wake_at| {
            Some(acc.map_or(wake_at, |min: f64| min.min(wake_at)))
        })
    }

    /// Promotes sleepers whose deadline has passed onto the run queue.
    /// Ported from `getTasks()`: a linear scan, removing in place as it
    /// finds expired entries. Returns how many were promoted.
    pub fn wake_expired(&mut self, now: f64) -> usize {
        let mut promoted = 0;
        let mut i = 0;
        while i < self.sleepers.len() {
            if self.sleepers[i].wake_at < now {
                let sleeper = self.sleepers.remove(i);
                self.tasks.push(sleeper.frame);
                promoted += 1;
            } else {
                i += 1;
            }
        }
        promoted
    }

    /// Advances past the current task without suspending it (plain
    /// `yield;` with no op-list, or end of `handle_yield_value`'s default
    /// branch): round-robins to the next task.
    pub fn advance(&mut self, now: f64) {
        if (self.current + 1) >= self.tasks.len() {
            self.wake_expired(now);
        }
        if !self.tasks.is_empty() {
            self.current = (self.current + 1) % self.tasks.len();
        }
    }

    /// Puts the current task to sleep for `seconds` and switches to the
    /// next runnable task, exactly as `handle_yield_value`'s `SLEEP` case
    /// does: pop current out of the run queue, top up the queue from
    /// expired sleepers if it would otherwise go empty, then re-mod the
    /// cursor by the (possibly just-grown) queue length.
    pub fn sleep_current(&mut self, now: f64, seconds: f64) {
        if self.tasks.is_empty() {
            return;
        }
        let frame = self.tasks.remove(self.current);
        self.sleepers.push(Sleeper { frame, wake_at: now + seconds });
        if self.current >= self.tasks.len() {
            self.wake_expired(now);
        }
        if !self.tasks.is_empty() {
            self.current %= self.tasks.len();
        }
    }

    /// Removes a finished task's frame from the run queue without putting
    /// it to sleep (the task returned normally and its slot must not be
    /// revisited).
    pub fn retire_current(&mut self, now: f64) {
        if self.tasks.is_empty() {
            return;
        }
        self.tasks.remove(self.current);
        if self.current >= self.tasks.len() {
            self.wake_expired(now);
        }
        if !self.tasks.is_empty() {
            self.current %= self.tasks.len();
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::heap::HeapId;

    fn id(n: u32) -> HeapId {
        HeapId::from_raw(n)
    }

    #[test]
    fn sleeping_task_is_not_scheduled_again_until_its_deadline() {
        let mut sched = Scheduler::new();
        sched.spawn(id(1));
        sched.spawn(id(2));
        sched.sleep_current(0.0, 10.0);
        assert_eq!(sched.current_frame(), Some(id(2)));
        assert_eq!(sched.wake_expired(5.0), 0);
        assert_eq!(sched.wake_expired(11.0), 1);
    }

    #[test]
    fn retiring_the_last_task_leaves_the_queue_empty() {
        let mut sched = Scheduler::new();
        sched.spawn(id(1));
        sched.retire_current(0.0);
        assert!(sched.is_empty());
    }
}
