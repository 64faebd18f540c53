use super::sequence::SequenceSource;
use crate::error::{BackendError, BackendResult};
use parking_lot::Mutex;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Outcome of one poll tick (or one-off fetch). Failures are data, not panics.
#[derive(Debug, Clone, Serialize)]
pub struct PollResult<T> {
    pub seq: u64,
    pub timestamp: SystemTime,
    pub ok: bool,
    pub payload: Option<T>,
    #[serde(skip)]
    pub error: Option<BackendError>,
}

impl<T> PollResult<T> {
    pub fn success(seq: u64, payload: T) -> Self {
        Self {
            seq,
            timestamp: SystemTime::now(),
            ok: true,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn failure(seq: u64, error: BackendError) -> Self {
        Self {
            seq,
            timestamp: SystemTime::now(),
            ok: false,
            payload: None,
            error: Some(error),
        }
    }

    pub fn from_result(seq: u64, result: BackendResult<T>) -> Self {
        match result {
            Ok(payload) => Self::success(seq, payload),
            Err(error) => Self::failure(seq, error),
        }
    }

    pub fn error_kind(&self) -> Option<&'static str> {
        self.error.as_ref().map(BackendError::kind)
    }
}

/// Run `call` under an optional deadline. A deadline miss is a network failure.
pub async fn fetch_with_timeout<T, Fut>(call: Fut, timeout: Option<Duration>) -> BackendResult<T>
where
    Fut: Future<Output = BackendResult<T>>,
{
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::network(format!("timed out after {:?}", limit))),
        },
        None => call.await,
    }
}

/// Fixed-interval poll of one endpoint
#[derive(Debug, Clone)]
pub struct PollerSpec {
    pub name: String,
    pub interval: Duration,
    pub timeout: Option<Duration>,
}

impl PollerSpec {
    pub fn new<S: Into<String>>(name: S, interval: Duration) -> Self {
        Self {
            name: name.into(),
            interval,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Handle to a running poller.
///
/// Dropping the handle cancels the poller but does not wait for it.
pub struct PollHandle {
    name: String,
    token: CancellationToken,
    gate: Arc<Mutex<()>>,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop ticking. Once this returns no callback is running and none will start.
    ///
    /// Must not be called from inside this poller's own callback.
    pub fn cancel(&self) {
        self.token.cancel();
        // Wait out a callback that is already executing
        drop(self.gate.lock());
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map(JoinHandle::is_finished).unwrap_or(true)
    }

    /// Cancel and wait for the task to exit
    pub async fn stop(mut self) {
        self.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!("Poller '{}' task failed: {}", self.name, e);
                }
            }
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Start polling immediately and then every `spec.interval`.
///
/// Calls never overlap: a tick that comes due while a call is in flight is
/// skipped. Every result is tagged from `sequence` before it is handed to
/// `callback`, in tick order.
pub fn spawn_poller<T, F, Fut, C>(
    spec: PollerSpec,
    sequence: SequenceSource,
    parent: &CancellationToken,
    mut fetch: F,
    mut callback: C,
) -> PollHandle
where
    T: Send + 'static,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = BackendResult<T>> + Send + 'static,
    C: FnMut(PollResult<T>) + Send + 'static,
{
    let token = parent.child_token();
    let gate = Arc::new(Mutex::new(()));

    let task_token = token.clone();
    let task_gate = Arc::clone(&gate);
    let name = spec.name.clone();

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(spec.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        debug!("Poller '{}' started ({:?})", spec.name, spec.interval);

        loop {
            tokio::select! {
                biased;
                _ = task_token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let seq = sequence.next();
            let outcome = tokio::select! {
                biased;
                _ = task_token.cancelled() => break,
                outcome = fetch_with_timeout(fetch(), spec.timeout) => outcome,
            };

            if let Err(e) = &outcome {
                trace!("Poller '{}' tick {} failed: {}", spec.name, seq, e);
            }

            let result = PollResult::from_result(seq, outcome);
            let _gate = task_gate.lock();
            if task_token.is_cancelled() {
                break;
            }
            callback(result);
        }

        debug!("Poller '{}' stopped", spec.name);
    });

    PollHandle {
        name,
        token,
        gate,
        task: Some(task),
    }
}
