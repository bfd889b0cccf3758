use parking_lot::{Condvar, Mutex};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Identifier of one dispatched job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub(crate) u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Status record of one handler execution
#[derive(Debug, Clone)]
pub struct DispatchJob {
    pub id: JobId,
    pub event: String,
    pub priority: bool,
    pub finished: bool,
    /// Frame receipt to handler completion
    pub process_time: Option<Duration>,
    /// Value a handler returned (a usage error, kept for inspection)
    pub result: Option<Value>,
}

struct JobRecord {
    job: Mutex<DispatchJob>,
    finished: Condvar,
    done_tx: watch::Sender<bool>,
}

/// Shared handle to a job; cheap to clone
#[derive(Clone)]
pub struct JobHandle {
    record: Arc<JobRecord>,
}

impl JobHandle {
    pub(crate) fn new(id: JobId, event: String, priority: bool) -> Self {
        let (done_tx, _) = watch::channel(false);
        Self {
            record: Arc::new(JobRecord {
                job: Mutex::new(DispatchJob {
                    id,
                    event,
                    priority,
                    finished: false,
                    process_time: None,
                    result: None,
                }),
                finished: Condvar::new(),
                done_tx,
            }),
        }
    }

    pub fn id(&self) -> JobId {
        self.record.job.lock().id
    }

    pub fn is_priority(&self) -> bool {
        self.record.job.lock().priority
    }

    pub fn is_finished(&self) -> bool {
        self.record.job.lock().finished
    }

    /// Copy of the current job record
    pub fn snapshot(&self) -> DispatchJob {
        self.record.job.lock().clone()
    }

    pub(crate) fn finish(&self, result: Option<Value>, process_time: Duration) {
        {
            let mut job = self.record.job.lock();
            job.finished = true;
            job.result = result;
            job.process_time = Some(process_time);
        }
        self.record.finished.notify_all();
        self.record.done_tx.send_replace(true);
    }

    /// Wait for completion from async code
    pub async fn wait(&self) -> DispatchJob {
        let mut rx = self.record.done_tx.subscribe();
        loop {
            if *rx.borrow_and_update() {
                break;
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
        self.snapshot()
    }

    /// Wait for completion from a plain thread; `None` on timeout
    pub fn wait_blocking(&self, timeout: Duration) -> Option<DispatchJob> {
        let mut job = self.record.job.lock();
        if !job.finished {
            let _ = self.record.finished.wait_for(&mut job, timeout);
        }
        job.finished.then(|| job.clone())
    }
}

impl fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("JobHandle").field(&self.snapshot()).finish()
    }
}
