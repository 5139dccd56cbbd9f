//! Request sessions: one current result per tool, stale results dropped.
//!
//! A [`Session`] owns one source and runs transform requests against it on
//! the rayon pool. Submitting returns immediately with a [`RequestToken`];
//! results come back over a channel in the order the work finished, which is
//! not necessarily the order it was requested.
//!
//! ```text
//! submit(q=80) → token 1 ──┐            ┌─ token 2 done → applied (current)
//! submit(q=20) → token 2 ──┴─ workers ──┤
//!                                       └─ token 1 done → discarded (stale)
//! ```
//!
//! Rules:
//!
//! - Tokens increase by one per submission. Only a completion whose token
//!   equals the latest issued token is applied; anything older is dropped
//!   unseen. In-flight work is never interrupted; ignoring it is the
//!   cancellation.
//! - With a non-zero debounce, requests wait on the session's debounce
//!   thread, not on the pool. Each new request restarts the wait and
//!   replaces the one pending, so a burst of edits decodes once.
//! - [`Session::clear`] withdraws everything: pending and in-flight work is
//!   dropped and the current result goes with it.
//! - An applied success replaces (and drops) the previous result. An applied
//!   failure leaves the last good result in place.

use crate::imaging::{ImageBackend, TransformRequest};
use crate::pipeline::{Pipeline, PipelineError, TransformResult};
use crate::source::ImageSource;
use rayon::ThreadPool;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// Generation number of a submitted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn value(self) -> u64 {
        self.0
    }
}

/// What happened to a request once it settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Its result is now current.
    Applied(RequestToken),
    /// It was the latest request and failed; the previous result stays current.
    Failed {
        token: RequestToken,
        error: PipelineError,
    },
    /// A newer request superseded it; any output was dropped.
    Superseded(RequestToken),
    /// The session was cleared; nothing is current.
    Cleared(RequestToken),
}

impl Outcome {
    pub fn token(&self) -> RequestToken {
        match self {
            Self::Applied(token) | Self::Superseded(token) | Self::Cleared(token) => *token,
            Self::Failed { token, .. } => *token,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("no request has been submitted")]
    Idle,
    #[error("timed out after {0:?} waiting for the latest result")]
    TimedOut(Duration),
}

struct Completion {
    token: RequestToken,
    /// `None` when the request was superseded before it ran.
    result: Option<Result<TransformResult, PipelineError>>,
}

/// A request waiting out the debounce.
struct Pending {
    token: RequestToken,
    request: TransformRequest,
    submitted: Instant,
}

/// Everything a job needs to run off the session's thread.
struct Dispatcher<B> {
    pipeline: Arc<Pipeline<B>>,
    source: ImageSource,
    latest: Arc<AtomicU64>,
    pool: Option<Arc<ThreadPool>>,
    done: Sender<Completion>,
}

impl<B> Clone for Dispatcher<B> {
    fn clone(&self) -> Self {
        Self {
            pipeline: Arc::clone(&self.pipeline),
            source: self.source.clone(),
            latest: Arc::clone(&self.latest),
            pool: self.pool.clone(),
            done: self.done.clone(),
        }
    }
}

impl<B: ImageBackend + 'static> Dispatcher<B> {
    fn is_latest(&self, token: RequestToken) -> bool {
        self.latest.load(Ordering::SeqCst) == token.0
    }

    /// Report a request that never ran.
    fn skip(&self, token: RequestToken) {
        // The session may be gone already; its result is then moot.
        let _ = self.done.send(Completion {
            token,
            result: None,
        });
    }

    /// Hand the request to the pool, unless it is already stale.
    fn dispatch(&self, token: RequestToken, request: TransformRequest) {
        if !self.is_latest(token) {
            self.skip(token);
            return;
        }
        let job = self.clone();
        let work = move || {
            let result = job
                .is_latest(token)
                .then(|| job.pipeline.run(&job.source, &request));
            let _ = job.done.send(Completion { token, result });
        };
        match &self.pool {
            Some(pool) => pool.spawn(work),
            None => rayon::spawn(work),
        }
    }

    /// Hold requests until `debounce` passes without a newer one.
    ///
    /// Runs on the session's debounce thread and exits once the session
    /// drops its sender.
    fn debounce_loop(self, rx: Receiver<Pending>, debounce: Duration) {
        while let Ok(mut pending) = rx.recv() {
            loop {
                let wait = (pending.submitted + debounce).saturating_duration_since(Instant::now());
                match rx.recv_timeout(wait) {
                    Ok(newer) => {
                        self.skip(pending.token);
                        pending = newer;
                    }
                    Err(RecvTimeoutError::Timeout) => break,
                    Err(RecvTimeoutError::Disconnected) => return,
                }
            }
            self.dispatch(pending.token, pending.request);
        }
    }
}

pub struct Session<B> {
    dispatcher: Dispatcher<B>,
    debounce: Duration,
    /// Feeds the debounce thread, started on first use.
    debouncer: Option<Sender<Pending>>,
    rx: Receiver<Completion>,
    current: Option<TransformResult>,
    /// Outcome of the latest request once it has settled.
    settled: Option<Outcome>,
}

impl<B: ImageBackend + 'static> Session<B> {
    pub fn new(pipeline: Arc<Pipeline<B>>, source: ImageSource, debounce: Duration) -> Self {
        let (done, rx) = mpsc::channel();
        Self {
            dispatcher: Dispatcher {
                pipeline,
                source,
                latest: Arc::new(AtomicU64::new(0)),
                pool: None,
                done,
            },
            debounce,
            debouncer: None,
            rx,
            current: None,
            settled: None,
        }
    }

    /// Run jobs on `pool` instead of the global rayon pool.
    pub fn with_pool(mut self, pool: Arc<ThreadPool>) -> Self {
        self.dispatcher.pool = Some(pool);
        self
    }

    pub fn source(&self) -> &ImageSource {
        &self.dispatcher.source
    }

    pub fn pipeline(&self) -> &Pipeline<B> {
        &self.dispatcher.pipeline
    }

    /// The result currently on display, if any request has succeeded yet.
    pub fn current(&self) -> Option<&TransformResult> {
        self.current.as_ref()
    }

    /// Token of the most recent submission.
    pub fn latest_token(&self) -> Option<RequestToken> {
        match self.dispatcher.latest.load(Ordering::SeqCst) {
            0 => None,
            n => Some(RequestToken(n)),
        }
    }

    /// Whether the latest submission has yet to settle.
    pub fn is_pending(&self) -> bool {
        self.latest_token().is_some() && self.settled.is_none()
    }

    /// Queue a request and return its token without waiting.
    pub fn submit(&mut self, request: TransformRequest) -> RequestToken {
        let token = self.next_token();
        self.settled = None;
        debug!(token = token.0, ?request, "Submitting request");

        if self.debounce.is_zero() {
            self.dispatcher.dispatch(token, request);
            return token;
        }
        let pending = Pending {
            token,
            request,
            submitted: Instant::now(),
        };
        let sent = self.debouncer().send(pending);
        if let Err(mpsc::SendError(pending)) = sent {
            // Debounce thread gone: run without waiting.
            self.debouncer = None;
            self.dispatcher.dispatch(pending.token, pending.request);
        }
        token
    }

    /// Withdraw every request and drop the current result.
    ///
    /// Pending and in-flight work is superseded by the returned token, which
    /// settles immediately as [`Outcome::Cleared`].
    pub fn clear(&mut self) -> RequestToken {
        let token = self.next_token();
        debug!(token = token.0, "Clearing session");
        self.current = None;
        self.settled = Some(Outcome::Cleared(token));
        token
    }

    /// Apply every completion that has already arrived.
    pub fn poll(&mut self) -> Vec<Outcome> {
        let mut outcomes = Vec::new();
        while let Ok(completion) = self.rx.try_recv() {
            outcomes.push(self.apply(completion));
        }
        outcomes
    }

    /// Block until the latest request settles, applying or discarding
    /// whatever arrives before it.
    pub fn wait_latest(&mut self, timeout: Duration) -> Result<Outcome, SessionError> {
        let latest = self.latest_token().ok_or(SessionError::Idle)?;
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(outcome) = &self.settled {
                if outcome.token() == latest {
                    return Ok(outcome.clone());
                }
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(completion) => {
                    self.apply(completion);
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return Err(SessionError::TimedOut(timeout));
                }
            }
        }
    }

    fn next_token(&self) -> RequestToken {
        RequestToken(self.dispatcher.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn debouncer(&mut self) -> &Sender<Pending> {
        let (dispatcher, debounce) = (&self.dispatcher, self.debounce);
        self.debouncer.get_or_insert_with(|| {
            let (tx, rx) = mpsc::channel();
            let dispatcher = dispatcher.clone();
            std::thread::spawn(move || dispatcher.debounce_loop(rx, debounce));
            tx
        })
    }

    fn apply(&mut self, completion: Completion) -> Outcome {
        let Completion { token, result } = completion;
        let is_latest = self.dispatcher.is_latest(token);

        let outcome = match result {
            Some(Ok(result)) if is_latest => {
                debug!(token = token.0, bytes = result.byte_size, "Applying result");
                // The previous result is released here.
                self.current = Some(result);
                Outcome::Applied(token)
            }
            Some(Err(error)) if is_latest => Outcome::Failed { token, error },
            _ => {
                debug!(token = token.0, "Discarding stale result");
                return Outcome::Superseded(token);
            }
        };
        self.settled = Some(outcome.clone());
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::imaging::{BackendError, OutputFormat, Quality};

    const WAIT: Duration = Duration::from_secs(10);

    fn session(debounce: Duration) -> Session<MockBackend> {
        let pipeline = Arc::new(Pipeline::new(MockBackend::with_dimensions(64, 48)));
        let source = ImageSource::from_bytes("cat.png", vec![0u8; 8]);
        Session::new(pipeline, source, debounce)
    }

    fn jpeg(quality: u32) -> TransformRequest {
        TransformRequest::compress(OutputFormat::Jpeg, Quality::new(quality))
    }

    #[test]
    fn tokens_increase_per_submission() {
        let mut s = session(Duration::ZERO);
        let a = s.submit(jpeg(10));
        let b = s.submit(jpeg(20));
        assert!(b > a);
        assert_eq!(s.latest_token(), Some(b));
    }

    #[test]
    fn waiting_without_submissions_is_idle() {
        let mut s = session(Duration::ZERO);
        assert_eq!(s.wait_latest(WAIT), Err(SessionError::Idle));
        assert!(!s.is_pending());
    }

    #[test]
    fn single_request_becomes_current() {
        let mut s = session(Duration::ZERO);
        let token = s.submit(jpeg(42));
        assert_eq!(s.wait_latest(WAIT), Ok(Outcome::Applied(token)));
        assert_eq!(s.current().unwrap().byte_size, 42);
        assert!(!s.is_pending());
    }

    #[test]
    fn slow_stale_result_is_never_applied() {
        let mut s = session(Duration::ZERO);
        s.pipeline()
            .backend()
            .delay_compress(80, Duration::from_millis(300));

        s.submit(jpeg(80));
        let latest = s.submit(jpeg(20));

        assert_eq!(s.wait_latest(WAIT), Ok(Outcome::Applied(latest)));
        assert_eq!(s.current().unwrap().byte_size, 20);

        // Let the slow request finish and drain it.
        std::thread::sleep(Duration::from_millis(600));
        for outcome in s.poll() {
            assert!(matches!(outcome, Outcome::Superseded(_)));
        }
        assert_eq!(s.current().unwrap().byte_size, 20);
    }

    #[test]
    fn fast_stale_result_is_discarded_too() {
        let mut s = session(Duration::ZERO);
        s.pipeline()
            .backend()
            .delay_compress(20, Duration::from_millis(200));

        s.submit(jpeg(80));
        let latest = s.submit(jpeg(20));

        assert_eq!(s.wait_latest(WAIT), Ok(Outcome::Applied(latest)));
        assert_eq!(s.current().unwrap().byte_size, 20);
    }

    #[test]
    fn slow_earlier_resize_does_not_overwrite_later_one() {
        let mut s = session(Duration::ZERO);
        s.pipeline()
            .backend()
            .delay_resize(400, Duration::from_millis(300));

        s.submit(TransformRequest::resize(400, 300));
        let latest = s.submit(TransformRequest::resize(200, 150));

        assert_eq!(s.wait_latest(WAIT), Ok(Outcome::Applied(latest)));
        std::thread::sleep(Duration::from_millis(600));
        s.poll();
        assert_eq!(s.current().unwrap().data, b"200x150");
    }

    #[test]
    fn failure_keeps_last_good_result() {
        let mut s = session(Duration::ZERO);
        s.submit(jpeg(50));
        s.wait_latest(WAIT).unwrap();

        s.pipeline()
            .backend()
            .fail_with(Some(BackendError::Encode("boom".into())));
        let token = s.submit(jpeg(60));

        let outcome = s.wait_latest(WAIT).unwrap();
        assert!(matches!(
            outcome,
            Outcome::Failed { token: t, error: PipelineError::ProcessingFailed { .. } } if t == token
        ));
        assert_eq!(s.current().unwrap().byte_size, 50);
    }

    #[test]
    fn debounce_collapses_a_burst() {
        let mut s = session(Duration::from_millis(150));
        s.submit(jpeg(10));
        s.submit(jpeg(20));
        let latest = s.submit(jpeg(30));

        assert_eq!(s.wait_latest(WAIT), Ok(Outcome::Applied(latest)));
        assert_eq!(s.pipeline().backend().get_operations(), vec![
            RecordedOp::Compress {
                format: OutputFormat::Jpeg,
                quality: 30
            }
        ]);
    }

    #[test]
    fn debounce_wait_does_not_occupy_pool_workers() {
        let pool = Arc::new(
            rayon::ThreadPoolBuilder::new()
                .num_threads(1)
                .build()
                .unwrap(),
        );
        let mut s = session(Duration::from_millis(100)).with_pool(pool);

        let started = Instant::now();
        for q in 1..=10 {
            s.submit(jpeg(q));
        }
        let latest = s.latest_token().unwrap();

        assert_eq!(s.wait_latest(WAIT), Ok(Outcome::Applied(latest)));
        let elapsed = started.elapsed();
        assert!(elapsed < Duration::from_millis(600), "settled after {elapsed:?}");
        assert_eq!(s.pipeline().backend().get_operations(), vec![
            RecordedOp::Compress {
                format: OutputFormat::Jpeg,
                quality: 10
            }
        ]);
    }

    #[test]
    fn each_submission_restarts_the_debounce() {
        let mut s = session(Duration::from_millis(150));
        s.submit(jpeg(10));
        std::thread::sleep(Duration::from_millis(100));
        let latest = s.submit(jpeg(20));

        assert_eq!(s.wait_latest(WAIT), Ok(Outcome::Applied(latest)));
        assert_eq!(s.pipeline().backend().get_operations().len(), 1);
    }

    #[test]
    fn clear_withdraws_pending_request() {
        let mut s = session(Duration::from_millis(100));
        s.submit(jpeg(40));
        let token = s.clear();

        assert_eq!(s.wait_latest(WAIT), Ok(Outcome::Cleared(token)));
        assert!(!s.is_pending());

        std::thread::sleep(Duration::from_millis(400));
        s.poll();
        assert!(s.current().is_none());
        assert!(s.pipeline().backend().get_operations().is_empty());
    }

    #[test]
    fn clear_drops_current_and_ignores_in_flight_work() {
        let mut s = session(Duration::ZERO);
        s.submit(jpeg(50));
        s.wait_latest(WAIT).unwrap();
        assert!(s.current().is_some());

        s.pipeline()
            .backend()
            .delay_compress(60, Duration::from_millis(200));
        s.submit(jpeg(60));
        s.clear();
        assert!(s.current().is_none());

        std::thread::sleep(Duration::from_millis(500));
        for outcome in s.poll() {
            assert!(matches!(outcome, Outcome::Superseded(_)));
        }
        assert!(s.current().is_none());
    }

    #[test]
    fn invalid_resize_fails_without_backend_call() {
        let mut s = session(Duration::ZERO);
        let token = s.submit(TransformRequest::resize(0, 10));

        assert_eq!(
            s.wait_latest(WAIT),
            Ok(Outcome::Failed {
                token,
                error: PipelineError::InvalidDimensions {
                    width: 0,
                    height: 10
                }
            })
        );
        assert!(s.current().is_none());
        assert!(s.pipeline().backend().get_operations().is_empty());
    }
}
