//! # Scheduler
//!
//! Cooperative, virtual-clock task queue shared by the composer, rate-limited
//! handlers and directives.
//!
//! - **Microtasks** ([`Scheduler::next_tick`]) run in FIFO order when the host
//!   drains the queue, after the current call stack unwinds.
//! - **Timers** ([`Scheduler::set_timeout`]) fire in deadline order when the
//!   clock is advanced past them. Equal deadlines fire in scheduling order.
//!
//! The clock only moves through [`Scheduler::advance`], which makes timing
//! behavior deterministic in tests and lets an embedding host drive it from
//! its own event loop.
//!
//! Tasks may schedule further tasks; no borrow of the queue is held while a
//! task runs.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet, VecDeque};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use tracing::trace;

type Task = Box<dyn FnOnce()>;

/// Handle for a pending timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

struct TimerEvent {
    deadline: Duration,
    seq: u64,
    id: TimerId,
    task: Task,
}

impl PartialEq for TimerEvent {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for TimerEvent {}

impl PartialOrd for TimerEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap: earliest deadline first, then scheduling order
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct SchedulerState {
    now: Duration,
    seq: u64,
    microtasks: VecDeque<Task>,
    timers: BinaryHeap<TimerEvent>,
    live: HashSet<TimerId>,
}

#[derive(Clone, Default)]
pub struct Scheduler {
    state: Rc<RefCell<SchedulerState>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time
    pub fn now(&self) -> Duration {
        self.state.borrow().now
    }

    /// Queue a task to run after the current turn
    pub fn next_tick(&self, task: impl FnOnce() + 'static) {
        self.state.borrow_mut().microtasks.push_back(Box::new(task));
    }

    /// Queue a task to run once the clock passes `now + delay`
    pub fn set_timeout(&self, delay: Duration, task: impl FnOnce() + 'static) -> TimerId {
        let mut state = self.state.borrow_mut();
        state.seq += 1;
        let id = TimerId(state.seq);
        let event = TimerEvent {
            deadline: state.now + delay,
            seq: state.seq,
            id,
            task: Box::new(task),
        };
        state.timers.push(event);
        state.live.insert(id);
        trace!(timer = id.0, delay_ms = delay.as_millis() as u64, "Timer scheduled");
        id
    }

    /// Cancel a pending timer. Returns false if it already fired or was cancelled.
    pub fn clear_timeout(&self, id: TimerId) -> bool {
        self.state.borrow_mut().live.remove(&id)
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.state.borrow().live.contains(&id)
    }

    pub fn pending_timers(&self) -> usize {
        self.state.borrow().live.len()
    }

    pub fn pending_microtasks(&self) -> usize {
        self.state.borrow().microtasks.len()
    }

    /// Drain the microtask queue, including tasks queued while draining.
    /// Returns the number of tasks run.
    pub fn run_microtasks(&self) -> usize {
        let mut ran = 0;
        loop {
            let task = self.state.borrow_mut().microtasks.pop_front();
            match task {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    /// Move the clock forward, firing every timer whose deadline is reached.
    ///
    /// Microtasks are drained before the first timer and after each one, so
    /// work queued by a timer runs before the next timer fires. Returns the
    /// number of timers fired.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.now() + by;
        let mut fired = 0;
        self.run_microtasks();
        while let Some(task) = self.pop_due(target) {
            task();
            fired += 1;
            self.run_microtasks();
        }
        self.state.borrow_mut().now = target;
        fired
    }

    /// Advance until no timers remain, returning the number fired
    pub fn run_until_idle(&self) -> usize {
        let mut fired = 0;
        loop {
            self.run_microtasks();
            let next = {
                let mut state = self.state.borrow_mut();
                Self::discard_cancelled(&mut state);
                state.timers.peek().map(|event| event.deadline)
            };
            match next {
                Some(deadline) => {
                    let by = deadline.saturating_sub(self.now());
                    fired += self.advance(by);
                }
                None => return fired,
            }
        }
    }

    fn pop_due(&self, target: Duration) -> Option<Task> {
        let mut state = self.state.borrow_mut();
        Self::discard_cancelled(&mut state);
        if state.timers.peek()?.deadline > target {
            return None;
        }
        let event = state.timers.pop()?;
        state.live.remove(&event.id);
        state.now = event.deadline;
        trace!(timer = event.id.0, "Timer fired");
        Some(event.task)
    }

    fn discard_cancelled(state: &mut SchedulerState) {
        while let Some(event) = state.timers.peek() {
            if state.live.contains(&event.id) {
                break;
            }
            state.timers.pop();
        }
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Scheduler")
            .field("now", &state.now)
            .field("microtasks", &state.microtasks.len())
            .field("timers", &state.live.len())
            .finish()
    }
}
