//! Three-phase (read / write / idle-write) task queues (spec.md §4.1).
//!
//! Rather than modeling each scheduled task as a suspended coroutine, this
//! follows spec.md §9's own guidance for languages without first-class
//! coroutines: each task is a boxed continuation (`FnOnce`) that `drain()`
//! invokes directly once its phase comes up. A continuation that schedules
//! more work onto the phase currently draining is picked up by the same
//! `drain()` call, because each phase's queue is drained to exhaustion
//! before moving to the next phase (spec.md §5's ordering guarantee falls
//! out of this for free — there is no executor in between to let a later
//! phase jump ahead).

use crate::config::ScrollConfig;
use crate::error::ScrollError;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque owner handle used by `cancel_jobs`. Blocks mint one via
/// [`next_owner_id`] at construction and tag every task they schedule with
/// it.
pub type OwnerId = u64;

static NEXT_OWNER_ID: AtomicU64 = AtomicU64::new(1);

/// Mints a fresh owner id. Single-threaded cooperative model (spec.md §5);
/// the atomic only exists so the counter can live in a `static`.
pub fn next_owner_id() -> OwnerId {
    NEXT_OWNER_ID.fetch_add(1, Ordering::Relaxed)
}

/// Delivered to every fulfilled task: the frame duration the scheduler
/// computed its load factor from, and that load factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerEvent {
    pub last_frame_time: f64,
    pub load_factor: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Read,
    Write,
    IdleWrite,
}

type Continuation = Box<dyn FnOnce(Result<SchedulerEvent, ScrollError>)>;

struct QueuedJob {
    owner: OwnerId,
    job: Continuation,
}

#[derive(Default)]
struct Queues {
    read: VecDeque<QueuedJob>,
    write: VecDeque<QueuedJob>,
    idle_write: VecDeque<QueuedJob>,
}

impl Queues {
    fn queue_mut(&mut self, phase: Phase) -> &mut VecDeque<QueuedJob> {
        match phase {
            Phase::Read => &mut self.read,
            Phase::Write => &mut self.write,
            Phase::IdleWrite => &mut self.idle_write,
        }
    }
}

/// Cheaply-cloneable handle to the shared scheduler state. All mutation
/// happens through short `RefCell` borrows that never span a continuation
/// call, so a continuation is free to schedule more work (including onto
/// its own phase) from inside `drain()`.
#[derive(Clone)]
pub struct Scheduler {
    queues: Rc<RefCell<Queues>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler {
            queues: Rc::new(RefCell::new(Queues::default())),
        }
    }

    pub fn schedule_read(
        &self,
        owner: OwnerId,
        job: impl FnOnce(Result<SchedulerEvent, ScrollError>) + 'static,
    ) {
        self.push(Phase::Read, owner, Box::new(job));
    }

    pub fn schedule_write(
        &self,
        owner: OwnerId,
        job: impl FnOnce(Result<SchedulerEvent, ScrollError>) + 'static,
    ) {
        self.push(Phase::Write, owner, Box::new(job));
    }

    pub fn schedule_idle_write(
        &self,
        owner: OwnerId,
        job: impl FnOnce(Result<SchedulerEvent, ScrollError>) + 'static,
    ) {
        self.push(Phase::IdleWrite, owner, Box::new(job));
    }

    fn push(&self, phase: Phase, owner: OwnerId, job: Continuation) {
        self.queues
            .borrow_mut()
            .queue_mut(phase)
            .push_back(QueuedJob { owner, job });
    }

    /// Cancels every pending task owned by `owner`, surfacing
    /// [`ScrollError::TaskCancelled`] to each. Tasks already fulfilled
    /// (already popped and run by a prior `drain`) are untouched since they
    /// are no longer in any queue.
    pub fn cancel_jobs(&self, owner: OwnerId) {
        let cancelled = {
            let mut queues = self.queues.borrow_mut();
            let mut out = Vec::new();
            Self::extract(&mut queues.read, owner, &mut out);
            Self::extract(&mut queues.write, owner, &mut out);
            Self::extract(&mut queues.idle_write, owner, &mut out);
            out
        };
        log::info!(
            "scheduler: cancelling {} pending task(s) for owner {}",
            cancelled.len(),
            owner
        );
        for job in cancelled {
            job(Err(ScrollError::TaskCancelled));
        }
    }

    fn extract(queue: &mut VecDeque<QueuedJob>, owner: OwnerId, out: &mut Vec<Continuation>) {
        let mut remaining = VecDeque::with_capacity(queue.len());
        while let Some(item) = queue.pop_front() {
            if item.owner == owner {
                out.push(item.job);
            } else {
                remaining.push_back(item);
            }
        }
        *queue = remaining;
    }

    /// Drains read, then write, then idle-write tasks, each phase to
    /// exhaustion, delivering `event` to every fulfilled task.
    pub fn drain(&self, event: SchedulerEvent) {
        self.drain_phase(Phase::Read, event);
        self.drain_phase(Phase::Write, event);
        self.drain_phase(Phase::IdleWrite, event);
    }

    fn drain_phase(&self, phase: Phase, event: SchedulerEvent) {
        loop {
            let next = {
                let mut queues = self.queues.borrow_mut();
                queues.queue_mut(phase).pop_front()
            };
            match next {
                Some(item) => (item.job)(Ok(event)),
                None => break,
            }
        }
    }

    #[cfg(test)]
    fn pending_counts(&self) -> (usize, usize, usize) {
        let q = self.queues.borrow();
        (q.read.len(), q.write.len(), q.idle_write.len())
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Linear ramp from `low_thresh_ms` to `hi_thresh_ms`, clamped to
/// `[0, max_load]` (spec.md §4.1).
pub fn compute_load_factor(avg_frame_ms: f64, config: &ScrollConfig) -> f64 {
    let span = config.hi_thresh_ms - config.low_thresh_ms;
    let ramp = (avg_frame_ms - config.low_thresh_ms) / span;
    ramp.clamp(0.0, config.max_load)
}
