//! Single-threaded logical clock driving the timer-based operators.
//!
//! The engine never spawns threads or reads the wall clock on its own.
//! Timed operators register callbacks on a [`Scheduler`]; the host decides
//! when logical time moves forward, either by calling [`Scheduler::advance`]
//! from its own loop, by draining everything with [`Scheduler::run_all`], or
//! by handing control to [`Scheduler::run_realtime`].

use crate::types::TimerId;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use tracing::debug;

type TimerCallback = Box<dyn FnOnce()>;

thread_local! {
    static CURRENT: Scheduler = Scheduler::new();
}

struct Timers {
    /// Logical time elapsed since the scheduler was created.
    now: Duration,
    next_id: u64,
    /// Pending callbacks ordered by deadline, then by scheduling order.
    queue: BTreeMap<(Duration, u64), TimerCallback>,
    /// Deadline of each pending timer, for cancellation.
    deadlines: HashMap<u64, Duration>,
}

/// Handle to a timer queue. Clones share the same queue.
#[derive(Clone)]
pub struct Scheduler {
    timers: Rc<RefCell<Timers>>,
}

impl Scheduler {
    /// Create an independent scheduler starting at logical time zero.
    pub fn new() -> Self {
        Self {
            timers: Rc::new(RefCell::new(Timers {
                now: Duration::ZERO,
                next_id: 1,
                queue: BTreeMap::new(),
                deadlines: HashMap::new(),
            })),
        }
    }

    /// The calling thread's default scheduler.
    pub fn current() -> Self {
        CURRENT.with(Scheduler::clone)
    }

    /// Logical time elapsed since creation.
    pub fn now(&self) -> Duration {
        self.timers.borrow().now
    }

    /// Run `callback` once `delay` of logical time has passed.
    pub fn schedule<F>(&self, delay: Duration, callback: F) -> TimerId
    where
        F: FnOnce() + 'static,
    {
        let mut timers = self.timers.borrow_mut();
        let id = timers.next_id;
        timers.next_id += 1;
        let deadline = timers.now + delay;
        timers.queue.insert((deadline, id), Box::new(callback));
        timers.deadlines.insert(id, deadline);
        debug!(timer = id, ?deadline, "timer scheduled");
        TimerId(id)
    }

    /// Cancel a pending timer. Returns false if it already fired or was
    /// cancelled.
    pub fn cancel(&self, id: TimerId) -> bool {
        let mut timers = self.timers.borrow_mut();
        match timers.deadlines.remove(&id.0) {
            Some(deadline) => {
                timers.queue.remove(&(deadline, id.0));
                debug!(timer = id.0, "timer cancelled");
                true
            }
            None => false,
        }
    }

    /// Number of timers waiting to fire.
    pub fn pending(&self) -> usize {
        self.timers.borrow().queue.len()
    }

    /// Deadline of the earliest pending timer.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers
            .borrow()
            .queue
            .keys()
            .next()
            .map(|(deadline, _)| *deadline)
    }

    /// Move logical time forward by `by`, firing every timer that falls
    /// due. Returns the number of callbacks run.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.now() + by;
        let mut fired = 0;
        while let Some(callback) = self.pop_due(Some(target)) {
            callback();
            fired += 1;
        }
        let mut timers = self.timers.borrow_mut();
        if timers.now < target {
            timers.now = target;
        }
        fired
    }

    /// Fire timers until none remain, including ones scheduled by the
    /// callbacks themselves.
    pub fn run_all(&self) -> usize {
        let mut fired = 0;
        while let Some(callback) = self.pop_due(None) {
            callback();
            fired += 1;
        }
        fired
    }

    /// Sleep on the wall clock until each deadline and fire it, returning
    /// once the queue is empty.
    pub fn run_realtime(&self) -> usize {
        let mut fired = 0;
        while let Some(deadline) = self.next_deadline() {
            let wait = deadline.saturating_sub(self.now());
            if !wait.is_zero() {
                std::thread::sleep(wait);
            }
            fired += self.advance(wait);
        }
        fired
    }

    /// Remove the earliest timer due at or before `limit` and move the clock
    /// to its deadline. The borrow is released before the caller runs it.
    fn pop_due(&self, limit: Option<Duration>) -> Option<TimerCallback> {
        let mut timers = self.timers.borrow_mut();
        let (deadline, id) = *timers.queue.keys().next()?;
        if limit.is_some_and(|limit| deadline > limit) {
            return None;
        }
        let callback = timers.queue.remove(&(deadline, id))?;
        timers.deadlines.remove(&id);
        if timers.now < deadline {
            timers.now = deadline;
        }
        Some(callback)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let timers = self.timers.borrow();
        f.debug_struct("Scheduler")
            .field("now", &timers.now)
            .field("pending", &timers.queue.len())
            .finish()
    }
}
