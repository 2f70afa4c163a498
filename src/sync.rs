//! Blocking primitives shared by the interrupt thread, command callers and the
//! deferred work threads.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use log::{debug, warn};

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One-shot broadcast flag with a bounded wait, re-armable with [`Completion::reinit`].
#[derive(Debug)]
pub struct Completion {
  done: Mutex<bool>,
  cond: Condvar,
}

impl Completion {
  pub fn new(done: bool) -> Self {
    Self { done: Mutex::new(done), cond: Condvar::new() }
  }

  pub fn complete_all(&self) {
    *lock(&self.done) = true;
    self.cond.notify_all();
  }

  pub fn reinit(&self) {
    *lock(&self.done) = false;
  }

  pub fn is_done(&self) -> bool {
    *lock(&self.done)
  }

  /// Block until completed or `timeout` elapses. Returns `true` when completed.
  pub fn wait_timeout(&self, timeout: Duration) -> bool {
    let guard = lock(&self.done);
    let (guard, _) = self
      .cond
      .wait_timeout_while(guard, timeout, |done| !*done)
      .unwrap_or_else(PoisonError::into_inner);
    *guard
  }
}

type Job = Box<dyn Fn() + Send + 'static>;

#[derive(Default)]
struct WorkState {
  deadline: Option<Instant>,
  running: bool,
  completed: u64,
  shutdown: bool,
}

struct WorkShared {
  state: Mutex<WorkState>,
  cond: Condvar,
  job: Mutex<Option<Job>>,
}

/// Single-shot deferred task backed by a dedicated thread.
///
/// At most one run is pending at a time. Scheduling while a run is pending is
/// rejected; scheduling from inside the running job queues the next run.
pub(crate) struct DelayedWork {
  name: &'static str,
  shared: Arc<WorkShared>,
  worker: Option<JoinHandle<()>>,
  worker_id: ThreadId,
}

impl DelayedWork {
  pub fn new(name: &'static str) -> std::io::Result<Self> {
    let shared = Arc::new(WorkShared {
      state: Mutex::new(WorkState::default()),
      cond: Condvar::new(),
      job: Mutex::new(None),
    });
    let worker_shared = shared.clone();
    let worker = thread::Builder::new().name(name.into()).spawn(move || run(worker_shared))?;
    let worker_id = worker.thread().id();
    Ok(Self { name, shared, worker: Some(worker), worker_id })
  }

  /// Install the body executed on every run.
  pub fn bind(&self, job: impl Fn() + Send + 'static) {
    *lock(&self.shared.job) = Some(Box::new(job));
  }

  /// Queue a run after `delay_ms`. Returns `false` if one is already pending.
  pub fn schedule(&self, delay_ms: u32) -> bool {
    let mut state = lock(&self.shared.state);
    if state.shutdown || state.deadline.is_some() {
      return false;
    }
    state.deadline = Some(Instant::now() + Duration::from_millis(delay_ms.into()));
    self.shared.cond.notify_all();
    debug!("{}: scheduled in {}ms", self.name, delay_ms);
    true
  }

  /// Drop a pending run. A run already executing is not interrupted.
  pub fn cancel(&self) -> bool {
    let cancelled = lock(&self.shared.state).deadline.take().is_some();
    if cancelled {
      debug!("{}: cancelled", self.name);
    }
    cancelled
  }

  pub fn is_pending(&self) -> bool {
    lock(&self.shared.state).deadline.is_some()
  }

  /// Run any pending work now and wait for it, and for a run in progress, to finish.
  pub fn flush(&self) {
    if thread::current().id() == self.worker_id {
      warn!("{}: flush from own worker ignored", self.name);
      return;
    }
    let mut state = lock(&self.shared.state);
    let mut target = state.completed + u64::from(state.running);
    if state.deadline.is_some() {
      state.deadline = Some(Instant::now());
      target += 1;
      self.shared.cond.notify_all();
    }
    while !state.shutdown && state.completed < target {
      state = self.shared.cond.wait(state).unwrap_or_else(PoisonError::into_inner);
    }
  }
}

impl Drop for DelayedWork {
  fn drop(&mut self) {
    {
      let mut state = lock(&self.shared.state);
      state.shutdown = true;
      state.deadline = None;
      self.shared.cond.notify_all();
    }
    if let Some(worker) = self.worker.take() {
      // The last owner may be released by the job itself; never join our own thread.
      if thread::current().id() != self.worker_id {
        let _ = worker.join();
      }
    }
  }
}

fn run(shared: Arc<WorkShared>) {
  let mut state = lock(&shared.state);
  loop {
    if state.shutdown {
      break;
    }
    match state.deadline {
      None => {
        state = shared.cond.wait(state).unwrap_or_else(PoisonError::into_inner);
      }
      Some(at) => {
        let now = Instant::now();
        if now < at {
          state = shared.cond.wait_timeout(state, at - now).unwrap_or_else(PoisonError::into_inner).0;
          continue;
        }
        state.deadline = None;
        state.running = true;
        drop(state);

        if let Some(job) = lock(&shared.job).as_ref() {
          job();
        }

        state = lock(&shared.state);
        state.running = false;
        state.completed += 1;
        shared.cond.notify_all();
      }
    }
  }
}
