use super::annotate;
use super::types::LineClassificationMap;
use crate::baseline::{
    BaselineProvider, BaselineSnapshot, BaselineUnavailable, Resolution, resolve_baseline,
    text_fingerprint,
};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{debug, warn};

/// Called from a worker thread after it queued a result
pub type Waker = Arc<dyn Fn() + Send + Sync>;

/// Fingerprints of the inputs a map was computed from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct InputFingerprint {
    pub baseline: u64,
    pub buffer: u64,
}

pub(crate) struct DiffJob {
    pub generation: u64,
    /// Baseline refresh count at dispatch
    pub baseline_epoch: u64,
    pub path: PathBuf,
    /// `None` asks the worker to resolve the baseline first
    pub baseline: Option<Arc<BaselineSnapshot>>,
    pub buffer: Arc<str>,
    pub previous: Option<InputFingerprint>,
}

#[derive(Debug)]
pub(crate) enum JobOutcome {
    Computed {
        map: LineClassificationMap,
        inputs: InputFingerprint,
    },
    /// Same inputs as the last published map
    Unchanged,
    Unavailable(BaselineUnavailable),
    Failed(String),
    Cancelled,
}

#[derive(Debug)]
pub(crate) struct JobResult {
    pub generation: u64,
    pub baseline_epoch: u64,
    /// Baseline the worker resolved, if it had to
    pub resolved: Option<Arc<BaselineSnapshot>>,
    pub outcome: JobOutcome,
}

fn is_stale(generation: u64, latest: &AtomicU64) -> bool {
    latest.load(Ordering::SeqCst) != generation
}

/// Resolve the baseline if needed, then diff and reduce the buffer snapshot.
///
/// Gives up early once `latest` has moved past the job's generation.
pub(crate) fn compute(
    job: DiffJob,
    provider: &dyn BaselineProvider,
    latest: &AtomicU64,
) -> JobResult {
    let DiffJob {
        generation,
        baseline_epoch,
        path,
        baseline,
        buffer,
        previous,
    } = job;
    let reply = |resolved: Option<Arc<BaselineSnapshot>>, outcome: JobOutcome| JobResult {
        generation,
        baseline_epoch,
        resolved,
        outcome,
    };

    if is_stale(generation, latest) {
        return reply(None, JobOutcome::Cancelled);
    }

    let (baseline, resolved) = match baseline {
        Some(baseline) => (baseline, None),
        None => match resolve_baseline(provider, &path) {
            Resolution::Ready(snapshot) => {
                let snapshot = Arc::new(snapshot);
                (Arc::clone(&snapshot), Some(snapshot))
            }
            Resolution::Unavailable(reason) => {
                return reply(None, JobOutcome::Unavailable(reason));
            }
            Resolution::Failed(e) => {
                return reply(None, JobOutcome::Failed(e.to_string()));
            }
        },
    };

    if is_stale(generation, latest) {
        return reply(resolved, JobOutcome::Cancelled);
    }

    let inputs = InputFingerprint {
        baseline: baseline.fingerprint(),
        buffer: text_fingerprint(&buffer),
    };
    if previous == Some(inputs) {
        return reply(resolved, JobOutcome::Unchanged);
    }

    let map = annotate(&baseline, &buffer);

    if is_stale(generation, latest) {
        return reply(resolved, JobOutcome::Cancelled);
    }
    reply(resolved, JobOutcome::Computed { map, inputs })
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Fixed set of threads sharing one job queue
pub(crate) struct WorkerPool {
    sender: Sender<DiffJob>,
    _handles: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
    /// Workers exit once the pool is dropped and the queue drains.
    pub fn spawn(
        threads: usize,
        provider: Arc<dyn BaselineProvider>,
        latest: Arc<AtomicU64>,
        results: Sender<JobResult>,
        waker: Option<Waker>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel();
        let receiver = Arc::new(Mutex::new(receiver));

        let mut handles = Vec::new();
        for id in 0..threads.max(1) {
            let receiver = Arc::clone(&receiver);
            let provider = Arc::clone(&provider);
            let latest = Arc::clone(&latest);
            let results = results.clone();
            let waker = waker.clone();

            let spawned = thread::Builder::new()
                .name(format!("diff-worker-{}", id))
                .spawn(move || Self::worker_loop(receiver, provider, latest, results, waker));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => warn!("Failed to spawn diff worker {}: {}", id, e),
            }
        }

        Self {
            sender,
            _handles: handles,
        }
    }

    /// Queue a job; `false` when no worker is left to run it
    pub fn submit(&self, job: DiffJob) -> bool {
        self.sender.send(job).is_ok()
    }

    fn worker_loop(
        receiver: Arc<Mutex<Receiver<DiffJob>>>,
        provider: Arc<dyn BaselineProvider>,
        latest: Arc<AtomicU64>,
        results: Sender<JobResult>,
        waker: Option<Waker>,
    ) {
        loop {
            let job = match receiver.lock() {
                Ok(receiver) => receiver.recv(),
                Err(_) => break,
            };
            let Ok(job) = job else {
                break;
            };

            let generation = job.generation;
            let baseline_epoch = job.baseline_epoch;
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                compute(job, provider.as_ref(), &latest)
            }))
            .unwrap_or_else(|payload| JobResult {
                generation,
                baseline_epoch,
                resolved: None,
                outcome: JobOutcome::Failed(format!(
                    "computation panicked: {}",
                    panic_message(payload)
                )),
            });

            if results.send(result).is_err() {
                break;
            }
            if let Some(waker) = &waker {
                waker();
            }
        }
        debug!("{:?} stopped", thread::current().name());
    }
}
