use super::sequence::SequenceSource;
use super::task::{spawn_poller, PollHandle, PollResult, PollerSpec};
use crate::error::BackendResult;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Owns every timer and in-flight task of one mounted screen.
///
/// Nothing a screen starts outlives [`ScreenScheduler::teardown`]: pollers are
/// cancelled through their gates and one-off tasks race a shared
/// cancellation token, so a late response has nowhere to land.
pub struct ScreenScheduler {
    name: String,
    token: CancellationToken,
    pollers: Vec<PollHandle>,
    tasks: Vec<(String, JoinHandle<()>)>,
    join_timeout: Duration,
}

impl ScreenScheduler {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            token: CancellationToken::new(),
            pollers: Vec::new(),
            tasks: Vec::new(),
            join_timeout: DEFAULT_JOIN_TIMEOUT,
        }
    }

    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Token cancelled on teardown; clone it into long-running loops
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_torn_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Start a poller owned by this screen
    pub fn poll<T, F, Fut, C>(&mut self, spec: PollerSpec, sequence: SequenceSource, fetch: F, callback: C)
    where
        T: Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = BackendResult<T>> + Send + 'static,
        C: FnMut(PollResult<T>) + Send + 'static,
    {
        if self.is_torn_down() {
            debug!("Screen '{}' torn down, not starting poller '{}'", self.name, spec.name);
            return;
        }
        let handle = spawn_poller(spec, sequence, &self.token, fetch, callback);
        self.pollers.push(handle);
    }

    /// Run a one-off task that is abandoned on teardown
    pub fn spawn<S, Fut>(&mut self, name: S, task: Fut)
    where
        S: Into<String>,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        if self.is_torn_down() {
            debug!("Screen '{}' torn down, not starting task '{}'", self.name, name);
            return;
        }

        self.tasks.retain(|(_, handle)| !handle.is_finished());

        let token = self.token.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                _ = task => {}
            }
        });
        self.tasks.push((name, handle));
    }

    pub fn poller_count(&self) -> usize {
        self.pollers.len()
    }

    pub fn active_tasks(&self) -> usize {
        self.tasks.iter().filter(|(_, h)| !h.is_finished()).count()
    }

    /// Cancel everything and wait for it to exit
    pub async fn teardown(&mut self) {
        if self.pollers.is_empty() && self.tasks.is_empty() && self.is_torn_down() {
            return;
        }

        self.token.cancel();
        for poller in &self.pollers {
            poller.cancel();
        }

        for poller in self.pollers.drain(..) {
            let name = poller.name().to_string();
            if tokio::time::timeout(self.join_timeout, poller.stop()).await.is_err() {
                warn!("Poller '{}' on screen '{}' did not stop in time", name, self.name);
            }
        }

        for (name, handle) in self.tasks.drain(..) {
            let abort = handle.abort_handle();
            if tokio::time::timeout(self.join_timeout, handle).await.is_err() {
                warn!("Task '{}' on screen '{}' did not stop in time, aborting", name, self.name);
                abort.abort();
            }
        }

        info!("Screen '{}' torn down", self.name);
    }
}

impl Drop for ScreenScheduler {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
