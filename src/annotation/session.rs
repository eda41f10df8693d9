use super::types::{LineClassificationMap, Tooltip};
use super::worker::{DiffJob, InputFingerprint, JobOutcome, JobResult, Waker, WorkerPool};
use crate::baseline::{BaselineProvider, BaselineSnapshot, BaselineUnavailable, line_count};
use crate::config::AnnotationSettings;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Receives every map the session publishes, on the thread that polls it.
pub trait AnnotationConsumer {
    fn on_annotations_updated(&mut self, map: Arc<LineClassificationMap>);
}

impl<F> AnnotationConsumer for F
where
    F: FnMut(Arc<LineClassificationMap>),
{
    fn on_annotations_updated(&mut self, map: Arc<LineClassificationMap>) {
        self(map)
    }
}

/// Whether a recomputation is pending, running, or neither
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    PendingDebounce { deadline: Instant },
    Computing { generation: u64 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Jobs handed to the workers
    pub dispatched: u64,
    /// Maps passed to the consumer
    pub published: u64,
    /// Results dropped because a newer computation replaced them
    pub discarded: u64,
}

#[derive(Debug, Clone)]
enum BaselineState {
    Unresolved,
    Ready(Arc<BaselineSnapshot>),
    Unavailable(BaselineUnavailable),
}

/// Keeps the change annotations of one open file up to date.
///
/// Lives on the interactive thread. Edits are reported with
/// [`on_buffer_changed`](Self::on_buffer_changed); the host then calls
/// [`poll`](Self::poll) from its event loop, which starts due computations on
/// the worker pool and publishes finished ones to the consumer. A result is
/// published only if no edit, refresh or deactivation happened after its
/// computation started.
pub struct AnnotationSession {
    path: PathBuf,
    settings: AnnotationSettings,
    state: SessionState,
    baseline: BaselineState,
    /// Bumped on every baseline refresh
    baseline_epoch: u64,
    /// Latest generation; bumped on every dispatch and cancellation
    generation: Arc<AtomicU64>,
    /// Next computation skips the debounce delay
    immediate: bool,
    active: bool,
    published: Arc<LineClassificationMap>,
    last_inputs: Option<InputFingerprint>,
    consumer: Box<dyn AnnotationConsumer>,
    pool: WorkerPool,
    results: Receiver<JobResult>,
    stats: SessionStats,
}

impl AnnotationSession {
    /// Start annotating `path`. The first computation is due immediately.
    pub fn new(
        path: impl Into<PathBuf>,
        provider: Arc<dyn BaselineProvider>,
        settings: &AnnotationSettings,
        consumer: impl AnnotationConsumer + 'static,
    ) -> Self {
        Self::build(path.into(), provider, settings, Box::new(consumer), None)
    }

    /// Like [`new`](Self::new), calling `waker` whenever a result is ready to
    /// be polled.
    pub fn with_waker(
        path: impl Into<PathBuf>,
        provider: Arc<dyn BaselineProvider>,
        settings: &AnnotationSettings,
        consumer: impl AnnotationConsumer + 'static,
        waker: Waker,
    ) -> Self {
        Self::build(path.into(), provider, settings, Box::new(consumer), Some(waker))
    }

    fn build(
        path: PathBuf,
        provider: Arc<dyn BaselineProvider>,
        settings: &AnnotationSettings,
        consumer: Box<dyn AnnotationConsumer>,
        waker: Option<Waker>,
    ) -> Self {
        let generation = Arc::new(AtomicU64::new(0));
        let (results_tx, results) = mpsc::channel();
        let pool = WorkerPool::spawn(
            settings.worker_threads,
            provider,
            Arc::clone(&generation),
            results_tx,
            waker,
        );
        info!("Annotating {:?}", path);

        Self {
            path,
            settings: settings.clone(),
            state: SessionState::PendingDebounce {
                deadline: Instant::now(),
            },
            baseline: BaselineState::Unresolved,
            baseline_epoch: 0,
            generation,
            immediate: true,
            active: true,
            published: Arc::new(LineClassificationMap::new()),
            last_inputs: None,
            consumer,
            pool,
            results,
            stats: SessionStats::default(),
        }
    }

    pub fn on_buffer_changed(&mut self, buffer: &str) {
        self.on_buffer_changed_at(Instant::now(), line_count(buffer));
    }

    /// Schedule a recomputation for a buffer of `line_count` lines edited at
    /// `now`, cancelling the one in flight.
    pub fn on_buffer_changed_at(&mut self, now: Instant, line_count: usize) {
        if !self.active {
            return;
        }
        if let BaselineState::Unavailable(reason) = self.baseline {
            debug!("Ignoring edit of {:?}: {:?}", self.path, reason);
            return;
        }
        self.cancel_in_flight();

        let delay = if self.immediate {
            Duration::ZERO
        } else {
            self.settings.debounce_delay(line_count)
        };
        self.state = SessionState::PendingDebounce {
            deadline: now + delay,
        };
    }

    pub fn on_baseline_invalidated(&mut self) {
        self.on_baseline_invalidated_at(Instant::now());
    }

    /// Drop the baseline and recompute right away against a fresh one
    pub fn on_baseline_invalidated_at(&mut self, now: Instant) {
        if !self.active {
            return;
        }
        debug!("Baseline of {:?} invalidated", self.path);
        self.cancel_in_flight();
        self.baseline = BaselineState::Unresolved;
        self.baseline_epoch += 1;
        self.last_inputs = None;
        self.immediate = true;
        self.state = SessionState::PendingDebounce { deadline: now };
    }

    /// Stop annotating. The consumer is not called again.
    pub fn on_deactivate(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        self.bump_generation();
        self.state = SessionState::Idle;
        info!("Stopped annotating {:?}", self.path);
    }

    pub fn poll(&mut self, buffer: &str) -> Option<Duration> {
        self.poll_at(Instant::now(), buffer)
    }

    /// Publish finished results, then start the pending computation if its
    /// deadline has passed, snapshotting `buffer`.
    ///
    /// Returns how long until the pending deadline, if one is still ahead.
    pub fn poll_at(&mut self, now: Instant, buffer: &str) -> Option<Duration> {
        if !self.active {
            return None;
        }
        while let Ok(result) = self.results.try_recv() {
            self.handle_result(result);
        }

        match self.state {
            SessionState::PendingDebounce { deadline } if now >= deadline => {
                self.dispatch(buffer);
                None
            }
            SessionState::PendingDebounce { deadline } => Some(deadline - now),
            SessionState::Idle | SessionState::Computing { .. } => None,
        }
    }

    /// Removed text at `line` in the last published map
    pub fn query_tooltip(&self, line: usize) -> Option<Tooltip> {
        self.published.tooltip(line)
    }

    /// Last published map
    pub fn annotations(&self) -> Arc<LineClassificationMap> {
        Arc::clone(&self.published)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    fn bump_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn cancel_in_flight(&mut self) {
        if let SessionState::Computing { generation } = self.state {
            debug!("Cancelling computation {} for {:?}", generation, self.path);
            self.bump_generation();
            self.state = SessionState::Idle;
        }
    }

    fn dispatch(&mut self, buffer: &str) {
        let baseline = match &self.baseline {
            BaselineState::Ready(snapshot) => Some(Arc::clone(snapshot)),
            BaselineState::Unresolved => None,
            BaselineState::Unavailable(_) => {
                self.state = SessionState::Idle;
                return;
            }
        };

        let generation = self.bump_generation();
        let job = DiffJob {
            generation,
            baseline_epoch: self.baseline_epoch,
            path: self.path.clone(),
            baseline,
            buffer: Arc::from(buffer),
            previous: self.last_inputs,
        };
        self.immediate = false;

        if self.pool.submit(job) {
            self.stats.dispatched += 1;
            self.state = SessionState::Computing { generation };
            debug!("Dispatched computation {} for {:?}", generation, self.path);
        } else {
            warn!("No diff worker available for {:?}", self.path);
            self.state = SessionState::Idle;
        }
    }

    fn handle_result(&mut self, result: JobResult) {
        let JobResult {
            generation,
            baseline_epoch,
            resolved,
            outcome,
        } = result;

        // A superseded job's baseline is still good if nothing refreshed it since
        if let Some(snapshot) = resolved
            && baseline_epoch == self.baseline_epoch
            && matches!(self.baseline, BaselineState::Unresolved)
        {
            debug!(
                "Adopted baseline of {:?} (tracked: {})",
                self.path,
                snapshot.is_tracked()
            );
            self.baseline = BaselineState::Ready(snapshot);
        }

        let current = self.state == SessionState::Computing { generation }
            && self.generation.load(Ordering::SeqCst) == generation;
        if !current {
            self.stats.discarded += 1;
            debug!("Discarded superseded computation {}", generation);
            return;
        }
        self.state = SessionState::Idle;

        match outcome {
            JobOutcome::Computed { map, inputs } => {
                self.last_inputs = Some(inputs);
                self.publish(Arc::new(map));
            }
            JobOutcome::Unchanged => {
                debug!("{:?} unchanged since last computation", self.path);
                self.publish(Arc::clone(&self.published));
            }
            JobOutcome::Unavailable(reason) => {
                info!("Not annotating {:?}: {:?}", self.path, reason);
                self.baseline = BaselineState::Unavailable(reason);
                self.last_inputs = None;
                self.publish(Arc::new(LineClassificationMap::new()));
            }
            JobOutcome::Failed(message) => {
                warn!("Annotation of {:?} failed: {}", self.path, message);
            }
            JobOutcome::Cancelled => {
                self.stats.discarded += 1;
            }
        }
    }

    fn publish(&mut self, map: Arc<LineClassificationMap>) {
        self.published = Arc::clone(&map);
        self.stats.published += 1;
        self.consumer.on_annotations_updated(map);
    }
}

impl Drop for AnnotationSession {
    fn drop(&mut self) {
        // Lets in-flight jobs stop at their next check
        self.bump_generation();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::annotate;
    use crate::annotation::types::LineClassification;
    use crate::baseline::{BaselineError, text_fingerprint};
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    type Lookup = Result<Vec<String>, BaselineError>;
    type Published = Rc<RefCell<Vec<Arc<LineClassificationMap>>>>;

    const FILE: &str = "/repo/notes.txt";

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn settings() -> AnnotationSettings {
        AnnotationSettings {
            worker_threads: 2,
            ..AnnotationSettings::default()
        }
    }

    fn session(provider: Arc<dyn BaselineProvider>) -> (AnnotationSession, Published) {
        let published: Published = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&published);
        let consumer = move |map: Arc<LineClassificationMap>| sink.borrow_mut().push(map);
        let session = AnnotationSession::new(FILE, provider, &settings(), consumer);
        (session, published)
    }

    /// Polls with the real clock until `done` holds
    fn wait_until(
        session: &mut AnnotationSession,
        buffer: &str,
        done: impl Fn(&AnnotationSession) -> bool,
    ) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done(session) {
            assert!(Instant::now() < deadline, "timed out in {:?}", session.state());
            session.poll_at(Instant::now(), buffer);
            thread::sleep(Duration::from_millis(2));
        }
    }

    fn published_count(n: u64) -> impl Fn(&AnnotationSession) -> bool {
        move |s| s.stats().published >= n
    }

    fn counting(
        calls: &Arc<AtomicUsize>,
        lookup: impl Fn(&Path, usize) -> Lookup + Send + Sync + 'static,
    ) -> Arc<dyn BaselineProvider> {
        let calls = Arc::clone(calls);
        Arc::new(move |p: &Path| -> Lookup {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            lookup(p, n)
        })
    }

    #[test]
    fn test_first_computation_is_not_delayed() {
        let provider: Arc<dyn BaselineProvider> =
            Arc::new(|_: &Path| -> Lookup { Ok(lines(&["a", "b", "c"])) });
        let (mut session, published) = session(provider);
        assert_eq!(session.path(), Path::new(FILE));
        let buffer = "a\nx\nc\n";

        session.poll_at(Instant::now(), buffer);
        assert!(matches!(session.state(), SessionState::Computing { .. }));

        wait_until(&mut session, buffer, published_count(1));
        assert_eq!(session.state(), SessionState::Idle);

        let map = session.annotations();
        assert_eq!(map.classification(2), LineClassification::Modified);
        assert_eq!(published.borrow().len(), 1);
        assert!(Arc::ptr_eq(&published.borrow()[0], &map));

        let tooltip = session.query_tooltip(2).unwrap();
        assert_eq!(tooltip.removed_text, "b");
        assert!(session.query_tooltip(99).is_none());
    }

    #[test]
    fn test_rapid_edits_coalesce_into_one_computation() {
        let provider: Arc<dyn BaselineProvider> =
            Arc::new(|_: &Path| -> Lookup { Ok(lines(&["a", "b"])) });
        let (mut session, _published) = session(provider);
        wait_until(&mut session, "a\nb", published_count(1));
        assert_eq!(session.stats().dispatched, 1);

        let start = Instant::now();
        for i in 0..5 {
            session.on_buffer_changed_at(start + Duration::from_millis(i * 10), 2);
            assert!(matches!(session.state(), SessionState::PendingDebounce { .. }));
        }

        // 200ms after the last edit at +40ms
        let wait = session.poll_at(start + Duration::from_millis(100), "a\nintermediate");
        assert_eq!(wait, Some(Duration::from_millis(140)));
        assert_eq!(session.stats().dispatched, 1);

        session.poll_at(start + Duration::from_millis(240), "a\nfinal\nline");
        assert_eq!(session.stats().dispatched, 2);

        wait_until(&mut session, "a\nfinal\nline", published_count(2));
        let map = session.annotations();
        assert_eq!(map.classification(2), LineClassification::Modified);
        assert_eq!(map.classification(3), LineClassification::Modified);
        assert_eq!(map.get(3).unwrap().removed_lines(), ["b"]);
        assert_eq!(session.stats().dispatched, 2);
    }

    #[test]
    fn test_debounce_delay_grows_with_buffer() {
        let provider: Arc<dyn BaselineProvider> = Arc::new(|_: &Path| -> Lookup { Ok(Vec::new()) });
        let (mut session, _published) = session(provider);
        wait_until(&mut session, "", published_count(1));

        let now = Instant::now();
        session.on_buffer_changed_at(now, 4500);
        assert_eq!(
            session.state(),
            SessionState::PendingDebounce {
                deadline: now + Duration::from_millis(600)
            }
        );
    }

    #[test]
    fn test_superseded_result_is_never_published() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let entered_tx = Mutex::new(entered_tx);
        let release_rx = Mutex::new(release_rx);
        let calls = Arc::new(AtomicUsize::new(0));

        // The first lookup blocks until released
        let provider = counting(&calls, move |_, n| {
            if n == 0 {
                let _ = entered_tx.lock().unwrap().send(());
                let _ = release_rx.lock().unwrap().recv();
            }
            Ok(lines(&["a", "b", "c"]))
        });
        let (mut session, published) = session(provider);

        let start = Instant::now();
        session.poll_at(start, "a\nFIRST\nc");
        entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        session.on_buffer_changed_at(start, 3);
        assert!(matches!(session.state(), SessionState::PendingDebounce { .. }));
        session.poll_at(start + Duration::from_secs(1), "a\nb\nSECOND");

        wait_until(&mut session, "a\nb\nSECOND", published_count(1));
        release_tx.send(()).unwrap();
        wait_until(&mut session, "a\nb\nSECOND", |s| s.stats().discarded >= 1);

        assert_eq!(published.borrow().len(), 1);
        let map = session.annotations();
        assert_eq!(map.classification(2), LineClassification::None);
        assert_eq!(map.classification(3), LineClassification::Modified);
        assert_eq!(session.stats().published, 1);
    }

    #[test]
    fn test_untracked_file_is_all_added_without_new_lookups() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = counting(&calls, |p, _| Err(BaselineError::NotTracked(p.to_path_buf())));
        let (mut session, _published) = session(provider);

        let buffer = "1\n2\n3\n4\n5\n";
        wait_until(&mut session, buffer, published_count(1));
        let map = session.annotations();
        assert_eq!(map.len(), 5);
        assert_eq!(map.summary().added, 5);
        assert!(map.iter().all(|(_, c)| c.removed_lines().is_empty()));

        let buffer = "1\n2\n3\n4\n5\n6\n";
        session.on_buffer_changed_at(Instant::now(), 6);
        wait_until(&mut session, buffer, published_count(2));
        assert_eq!(session.annotations().summary().added, 6);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_undecodable_baseline_disables_until_invalidated() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = counting(&calls, |p, _| {
            Err(BaselineError::Decode {
                path: p.to_path_buf(),
                source: String::from_utf8(vec![0xff]).unwrap_err(),
            })
        });
        let (mut session, published) = session(provider);

        wait_until(&mut session, "text", published_count(1));
        assert!(published.borrow()[0].is_empty());

        session.on_buffer_changed_at(Instant::now(), 1);
        assert_eq!(session.state(), SessionState::Idle);
        session.poll_at(Instant::now() + Duration::from_secs(60), "text");
        assert_eq!(session.stats().dispatched, 1);

        session.on_baseline_invalidated();
        wait_until(&mut session, "text", published_count(2));
        assert_eq!(session.stats().dispatched, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_missing_repository_clears_annotations() {
        let provider: Arc<dyn BaselineProvider> = Arc::new(|p: &Path| -> Lookup {
            Err(BaselineError::RepositoryNotFound(p.to_path_buf()))
        });
        let (mut session, published) = session(provider);

        wait_until(&mut session, "a\nb", published_count(1));
        assert!(published.borrow()[0].is_empty());

        session.on_buffer_changed_at(Instant::now(), 2);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_backend_failure_retries_on_next_edit() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = counting(&calls, |_, n| {
            if n == 0 {
                Err(BaselineError::Git("index.lock exists".to_string()))
            } else {
                Ok(lines(&["a"]))
            }
        });
        let (mut session, published) = session(provider);

        wait_until(&mut session, "a\nb", |s| {
            s.stats().dispatched == 1 && s.state() == SessionState::Idle
        });
        assert!(published.borrow().is_empty());

        session.on_buffer_changed_at(Instant::now(), 2);
        session.poll_at(Instant::now() + Duration::from_secs(1), "a\nb");
        wait_until(&mut session, "a\nb", published_count(1));
        assert_eq!(session.annotations().classification(2), LineClassification::Added);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_no_callback_after_deactivate() {
        let provider: Arc<dyn BaselineProvider> =
            Arc::new(|_: &Path| -> Lookup { Ok(lines(&["a"])) });
        let (mut session, published) = session(provider);

        session.poll_at(Instant::now(), "b");
        session.on_deactivate();
        assert!(!session.is_active());

        thread::sleep(Duration::from_millis(100));
        session.poll_at(Instant::now(), "b");
        session.on_buffer_changed_at(Instant::now(), 1);
        session.on_baseline_invalidated();
        session.poll_at(Instant::now() + Duration::from_secs(60), "b");

        assert!(published.borrow().is_empty());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_unchanged_inputs_republish_same_map() {
        let provider: Arc<dyn BaselineProvider> =
            Arc::new(|_: &Path| -> Lookup { Ok(lines(&["a"])) });
        let (mut session, published) = session(provider);
        wait_until(&mut session, "a\nb", published_count(1));

        session.on_buffer_changed_at(Instant::now(), 2);
        session.poll_at(Instant::now() + Duration::from_secs(1), "a\nb");
        assert_eq!(session.stats().dispatched, 2);
        wait_until(&mut session, "a\nb", published_count(2));

        let published = published.borrow();
        assert_eq!(published.len(), 2);
        assert!(Arc::ptr_eq(&published[0], &published[1]));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_result_from_older_generation_is_dropped_at_publish() {
        // Nothing resolves on the workers; results are fed in by hand
        let (_release, blocked) = mpsc::channel::<()>();
        let blocked = Mutex::new(blocked);
        let provider: Arc<dyn BaselineProvider> = Arc::new(move |_: &Path| -> Lookup {
            let _ = blocked.lock().unwrap().recv();
            Ok(lines(&["a"]))
        });
        let (mut session, published) = session(provider);

        let start = Instant::now();
        session.poll_at(start, "a\nold");
        let SessionState::Computing { generation: stale } = session.state() else {
            panic!("expected a computation, got {:?}", session.state());
        };

        session.on_buffer_changed_at(start, 2);
        session.poll_at(start + Duration::from_secs(1), "a\nnew");
        let SessionState::Computing { generation: current } = session.state() else {
            panic!("expected a computation, got {:?}", session.state());
        };
        assert!(current > stale);

        let baseline = BaselineSnapshot::tracked(lines(&["a"]));
        let result = |generation, buffer: &str| JobResult {
            generation,
            baseline_epoch: 0,
            resolved: None,
            outcome: JobOutcome::Computed {
                map: annotate(&baseline, buffer),
                inputs: InputFingerprint {
                    baseline: baseline.fingerprint(),
                    buffer: text_fingerprint(buffer),
                },
            },
        };

        // A finished map from the older generation must not reach the consumer
        session.handle_result(result(stale, "a\nold"));
        assert!(published.borrow().is_empty());
        assert_eq!(session.stats().published, 0);
        assert_eq!(session.stats().discarded, 1);
        assert_eq!(session.state(), SessionState::Computing { generation: current });

        session.handle_result(result(current, "a\nnew"));
        assert_eq!(session.stats().published, 1);
        assert_eq!(session.state(), SessionState::Idle);
        let map = session.annotations();
        assert_eq!(map.classification(2), LineClassification::Added);
        assert!(Arc::ptr_eq(&published.borrow()[0], &map));
    }

    #[test]
    fn test_invalidation_resolves_fresh_baseline() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = counting(&calls, |_, n| {
            if n == 0 {
                Ok(lines(&["a"]))
            } else {
                Ok(lines(&["a", "b"]))
            }
        });
        let (mut session, _published) = session(provider);

        wait_until(&mut session, "a\nb", published_count(1));
        assert_eq!(session.annotations().classification(2), LineClassification::Added);

        // After a commit of the buffer the same text has no changes
        session.on_baseline_invalidated();
        wait_until(&mut session, "a\nb", published_count(2));
        assert!(session.annotations().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
