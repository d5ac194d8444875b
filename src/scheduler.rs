//! Deferred work: "run this after D".
//!
//! The sequencer only sees the [`Scheduler`] trait. [`TimerScheduler`] backs
//! it with a single timer thread; [`ManualScheduler`] is a hand-cranked clock
//! for tests.

use std::cmp::{Ordering as CmpOrdering, Reverse};
use std::collections::BinaryHeap;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{trace, warn};

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

pub trait Scheduler: Send + Sync {
    /// Run `task` once `delay` has elapsed from now. Never blocks.
    fn schedule(&self, delay: Duration, task: Task);
}

/// One pending task. Ordered by deadline, then by submission order.
struct Entry<T> {
    deadline: T,
    seq: u64,
    task: Task,
}

impl<T: Ord> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == CmpOrdering::Equal
    }
}

impl<T: Ord> Eq for Entry<T> {}

impl<T: Ord> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl<T: Ord> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        (&self.deadline, self.seq).cmp(&(&other.deadline, other.seq))
    }
}

/// Runs tasks on one dedicated timer thread, sequentially, in deadline order.
///
/// Dropping the scheduler does not discard work: the thread keeps running
/// until every already-scheduled task has fired, then exits.
pub struct TimerScheduler {
    submit: mpsc::Sender<Entry<Instant>>,
    seq: AtomicU64,
}

impl TimerScheduler {
    pub fn new() -> io::Result<Self> {
        let (tx, rx) = mpsc::channel::<Entry<Instant>>();
        thread::Builder::new()
            .name("keytone-timer".into())
            .spawn(move || run_timer(rx))?;
        Ok(Self {
            submit: tx,
            seq: AtomicU64::new(0),
        })
    }
}

impl Scheduler for TimerScheduler {
    fn schedule(&self, delay: Duration, task: Task) {
        let entry = Entry {
            deadline: Instant::now() + delay,
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            task,
        };
        // The timer thread only exits early if a task panicked on it
        if self.submit.send(entry).is_err() {
            warn!(?delay, "timer thread is gone, dropping scheduled task");
        }
    }
}

/// Pop the earliest entry if its deadline is at or before `now`.
fn pop_due<T: Ord>(heap: &mut BinaryHeap<Reverse<Entry<T>>>, now: &T) -> Option<Entry<T>> {
    if heap.peek().is_some_and(|Reverse(e)| e.deadline <= *now) {
        heap.pop().map(|Reverse(entry)| entry)
    } else {
        None
    }
}

fn run_timer(rx: mpsc::Receiver<Entry<Instant>>) {
    let mut heap: BinaryHeap<Reverse<Entry<Instant>>> = BinaryHeap::new();
    let mut open = true;

    loop {
        let now = Instant::now();
        while let Some(entry) = pop_due(&mut heap, &now) {
            (entry.task)();
        }

        let next_deadline = heap.peek().map(|Reverse(e)| e.deadline);
        match (next_deadline, open) {
            (None, false) => break,
            (Some(deadline), false) => {
                thread::sleep(deadline.saturating_duration_since(Instant::now()));
            }
            (None, true) => match rx.recv() {
                Ok(entry) => heap.push(Reverse(entry)),
                Err(_) => open = false,
            },
            (Some(deadline), true) => {
                let wait = deadline.saturating_duration_since(Instant::now());
                match rx.recv_timeout(wait) {
                    Ok(entry) => heap.push(Reverse(entry)),
                    Err(mpsc::RecvTimeoutError::Timeout) => {}
                    Err(mpsc::RecvTimeoutError::Disconnected) => open = false,
                }
            }
        }
    }
    trace!("timer thread finished");
}

/// A virtual clock that only moves when [`advance`](ManualScheduler::advance)
/// is called. Tasks run on the advancing thread.
#[derive(Default)]
pub struct ManualScheduler {
    state: Mutex<ManualState>,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    seq: u64,
    pending: BinaryHeap<Reverse<Entry<Duration>>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Time elapsed on the virtual clock.
    pub fn now(&self) -> Duration {
        self.state().now
    }

    /// Deadlines of tasks not yet run, earliest first.
    pub fn deadlines(&self) -> Vec<Duration> {
        let state = self.state();
        let mut deadlines: Vec<_> = state.pending.iter().map(|Reverse(e)| e.deadline).collect();
        deadlines.sort();
        deadlines
    }

    /// Move the clock forward, running due tasks in order as their deadlines pass.
    pub fn advance(&self, by: Duration) {
        let target = self.now() + by;
        loop {
            let task = {
                let mut state = self.state();
                let Some(entry) = pop_due(&mut state.pending, &target) else {
                    break;
                };
                state.now = state.now.max(entry.deadline);
                entry.task
            };
            // Lock released: the task may read the clock or schedule more work.
            task();
        }
        let mut state = self.state();
        state.now = state.now.max(target);
    }

    /// Run everything still pending.
    pub fn run_all(&self) {
        while let Some(last) = self.deadlines().last().copied() {
            let now = self.now();
            self.advance(last.saturating_sub(now));
        }
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: Task) {
        let mut state = self.state();
        let entry = Entry {
            deadline: state.now + delay,
            seq: state.seq,
            task,
        };
        state.seq += 1;
        state.pending.push(Reverse(entry));
    }
}
