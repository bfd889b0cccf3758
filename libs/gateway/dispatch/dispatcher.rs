//! Event dispatcher
//!
//! # Architecture
//!
//! ```text
//! socket task ── dispatch(frame) ──┬─ table has room ──> crossbeam queue ──> worker threads (fixed pool)
//!   (never blocks)                 ├─ table full      ──> deferred queue (promoted as jobs finish)
//!                                  └─ priority job    ──> dedicated thread
//! ```
//!
//! The in-flight table is bounded by `max_in_flight`. Priority jobs (system
//! events) are always admitted and may push the table past the bound.

use super::job::{JobHandle, JobId};
use super::listener::{Listener, ListenerId};
use crate::core::protocol::GatewayFrame;
use crate::traits::{EventContext, EventHandler, GatewayError, Result, SystemEventHandler};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, trace, warn};

/// Worker pool sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Fixed worker threads for normal jobs
    pub worker_count: usize,
    /// Bound of the in-flight job table
    pub max_in_flight: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            max_in_flight: 64,
        }
    }
}

#[derive(Clone)]
enum Work {
    Listener(Arc<dyn EventHandler>),
    System(Arc<dyn SystemEventHandler>),
}

impl Work {
    fn run(&self, ctx: &EventContext) -> Option<Value> {
        match self {
            Work::Listener(handler) => handler.handle(ctx),
            Work::System(handler) => handler.handle(ctx),
        }
    }
}

struct Task {
    handle: JobHandle,
    ctx: EventContext,
    work: Work,
}

#[derive(Default)]
struct JobTable {
    in_flight: HashMap<JobId, JobHandle>,
    deferred: VecDeque<Task>,
}

struct Shared {
    task_tx: Sender<Task>,
    table: Mutex<JobTable>,
    max_in_flight: usize,
    shutdown: AtomicBool,
}

impl Shared {
    /// Run one task and free its slot, promoting a deferred task if any
    fn execute(&self, task: Task) {
        let Task { handle, ctx, work } = task;
        let event = handle.snapshot().event;

        let result = match catch_unwind(AssertUnwindSafe(|| work.run(&ctx))) {
            Ok(Some(value)) => {
                warn!(
                    "Handler for '{}' returned a value; listener handlers are fire-and-forget and \
                     should return None",
                    event
                );
                Some(value)
            }
            Ok(None) => None,
            Err(_) => {
                error!("Handler for '{}' panicked", event);
                None
            }
        };

        let process_time = ctx.received_at().elapsed();
        handle.finish(result, process_time);
        trace!("{} '{}' finished in {:?}", ctx.job_id(), event, process_time);

        self.release(ctx.job_id());
    }

    /// Free a job's slot and start the oldest deferred task if one fits
    fn release(&self, id: JobId) {
        let next = {
            let mut table = self.table.lock();
            table.in_flight.remove(&id);
            if table.in_flight.len() < self.max_in_flight {
                table.deferred.pop_front().map(|task| {
                    table
                        .in_flight
                        .insert(task.ctx.job_id(), task.handle.clone());
                    task
                })
            } else {
                None
            }
        };

        if let Some(task) = next {
            debug!("Promoting deferred {}", task.ctx.job_id());
            if self.task_tx.send(task).is_err() {
                debug!("Worker queue closed, dropping deferred job");
            }
        }
    }
}

/// Matches frames against listeners and runs handlers off the socket task
pub struct EventDispatcher {
    listeners: RwLock<Vec<(ListenerId, Listener)>>,
    system: RwLock<Vec<Arc<dyn SystemEventHandler>>>,
    shared: Arc<Shared>,
    workers: Mutex<Vec<std::thread::JoinHandle<()>>>,
    next_listener: AtomicU64,
    next_job: AtomicU64,
}

impl EventDispatcher {
    /// Create a dispatcher and start its worker threads
    ///
    /// Zero workers or a zero-sized job table is a configuration error.
    pub fn new(config: DispatcherConfig) -> Result<Arc<Self>> {
        if config.worker_count == 0 {
            return Err(GatewayError::Configuration(
                "dispatcher needs at least one background worker thread".to_string(),
            ));
        }
        if config.max_in_flight == 0 {
            return Err(GatewayError::Configuration(
                "dispatcher max_in_flight must be greater than zero".to_string(),
            ));
        }

        let (task_tx, task_rx) = unbounded::<Task>();
        let shared = Arc::new(Shared {
            task_tx,
            table: Mutex::new(JobTable::default()),
            max_in_flight: config.max_in_flight,
            shutdown: AtomicBool::new(false),
        });

        let mut workers = Vec::with_capacity(config.worker_count);
        for index in 0..config.worker_count {
            let shared = Arc::clone(&shared);
            let task_rx = task_rx.clone();
            let handle = std::thread::Builder::new()
                .name(format!("inkcord-worker-{}", index))
                .spawn(move || worker_loop(shared, task_rx))
                .map_err(|e| {
                    GatewayError::Configuration(format!("failed to start worker thread: {}", e))
                })?;
            workers.push(handle);
        }

        debug!(
            "Dispatcher started with {} workers, {} in-flight slots",
            config.worker_count, config.max_in_flight
        );

        Ok(Arc::new(Self {
            listeners: RwLock::new(Vec::new()),
            system: RwLock::new(Vec::new()),
            shared,
            workers: Mutex::new(workers),
            next_listener: AtomicU64::new(1),
            next_job: AtomicU64::new(1),
        }))
    }

    pub fn register(&self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        debug!(
            "Registered {} for op {} event {:?}",
            id,
            listener.opcode(),
            listener.event()
        );
        self.listeners.write().push((id, listener));
        id
    }

    pub fn unregister(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn register_system(&self, handler: Arc<dyn SystemEventHandler>) {
        debug!("Registered system handler for '{}'", handler.event());
        self.system.write().push(handler);
    }

    /// Dispatch one decoded frame
    ///
    /// Returns one handle per scheduled job (empty when nothing matched).
    /// Never waits for a handler.
    pub fn dispatch(&self, frame: Arc<GatewayFrame>, received_at: Instant) -> Vec<JobHandle> {
        if self.shared.shutdown.load(Ordering::Acquire) {
            debug!("Dispatcher is shut down, dropping frame op {}", frame.op);
            return Vec::new();
        }

        let matched: Vec<Arc<dyn EventHandler>> = self
            .listeners
            .read()
            .iter()
            .filter(|(_, listener)| listener.matches(&frame))
            .map(|(_, listener)| listener.handler())
            .collect();

        let event = if frame.event_name().is_empty() {
            format!("op:{}", frame.op)
        } else {
            frame.event_name().to_string()
        };

        if !matched.is_empty() {
            debug!("Found {} listeners for '{}'", matched.len(), event);
            return matched
                .into_iter()
                .map(|handler| {
                    self.schedule(
                        Arc::clone(&frame),
                        received_at,
                        event.clone(),
                        Work::Listener(handler),
                        false,
                    )
                })
                .collect();
        }

        let system = self
            .system
            .read()
            .iter()
            .find(|handler| frame.op == 0 && frame.t.as_deref() == Some(handler.event()))
            .cloned();

        match system {
            Some(handler) => vec![self.schedule(frame, received_at, event, Work::System(handler), true)],
            None => {
                trace!("No listener for '{}'", event);
                Vec::new()
            }
        }
    }

    fn schedule(
        &self,
        frame: Arc<GatewayFrame>,
        received_at: Instant,
        event: String,
        work: Work,
        priority: bool,
    ) -> JobHandle {
        let id = JobId(self.next_job.fetch_add(1, Ordering::Relaxed));
        let handle = JobHandle::new(id, event, priority);
        let task = Task {
            handle: handle.clone(),
            ctx: EventContext::new(frame, id, received_at),
            work,
        };

        let mut table = self.shared.table.lock();
        if priority {
            table.in_flight.insert(id, handle.clone());
            drop(table);
            self.spawn_priority(task);
        } else if table.in_flight.len() < self.shared.max_in_flight {
            table.in_flight.insert(id, handle.clone());
            drop(table);
            if self.shared.task_tx.send(task).is_err() {
                error!("Worker queue closed, {} was not scheduled", id);
            }
        } else {
            debug!(
                "Job table saturated ({} in flight), deferring {}",
                table.in_flight.len(),
                id
            );
            table.deferred.push_back(task);
        }

        handle
    }

    fn spawn_priority(&self, task: Task) {
        let shared = Arc::clone(&self.shared);
        let id = task.ctx.job_id();
        let handle = task.handle.clone();
        let received_at = task.ctx.received_at();
        let spawned = std::thread::Builder::new()
            .name(format!("inkcord-priority-{}", id.0))
            .spawn(move || shared.execute(task));
        if let Err(e) = spawned {
            error!("Failed to spawn priority worker for {}: {}", id, e);
            handle.finish(None, received_at.elapsed());
            self.shared.release(id);
        }
    }

    /// Jobs currently admitted to the table
    pub fn in_flight(&self) -> usize {
        self.shared.table.lock().in_flight.len()
    }

    /// Jobs waiting for a free slot
    pub fn deferred(&self) -> usize {
        self.shared.table.lock().deferred.len()
    }

    /// Stop accepting frames and join the worker threads
    ///
    /// Deferred jobs that never started are dropped.
    pub fn shutdown(&self) {
        self.shared.shutdown.store(true, Ordering::Release);
        let dropped = {
            let mut table = self.shared.table.lock();
            let dropped = table.deferred.len();
            table.deferred.clear();
            dropped
        };
        if dropped > 0 {
            warn!("Dropping {} deferred jobs on shutdown", dropped);
        }
        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        debug!("Waiting for {} worker threads to complete", workers.len());
        for handle in workers {
            let _ = handle.join();
        }
    }
}

fn worker_loop(shared: Arc<Shared>, task_rx: Receiver<Task>) {
    loop {
        match task_rx.recv_timeout(Duration::from_millis(50)) {
            Ok(task) => shared.execute(task),
            Err(RecvTimeoutError::Timeout) => {
                if shared.shutdown.load(Ordering::Acquire) {
                    debug!("Shutdown flag detected, worker thread exiting");
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                debug!("Worker queue closed, thread exiting");
                break;
            }
        }
    }
}
