use core::pin::Pin;
use core::task::{Context, Poll};
use ohno::IntoAppError;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Semaphore, mpsc, oneshot};

const LOG_TARGET: &str = "  throttle";

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

struct Submission {
    permits: u32,
    job: Job,
}

/// Limits how many submitted tasks run at once.
///
/// [`Throttler::submit`] never waits: the task is queued and the call returns a
/// [`ThrottledTask`] handle right away. A single dispatcher admits queued tasks strictly in
/// submission order, each once enough of the `max_concurrent` slots are free, so at most
/// `max_concurrent` slots are ever held by running tasks.
///
/// Submissions must happen inside a Tokio runtime. The dispatcher runs on the runtime of the
/// submission that started it and is started again on the current runtime if that one has shut down.
#[derive(Debug)]
pub struct Throttler {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
    queue: Mutex<Option<mpsc::UnboundedSender<Submission>>>,
}

impl Throttler {
    /// Create a new throttler that allows at most `max_concurrent` tasks at a time.
    ///
    /// A limit of zero is raised to one.
    #[must_use]
    pub fn new(max_concurrent: usize) -> Arc<Self> {
        let max_concurrent = max_concurrent.clamp(1, Semaphore::MAX_PERMITS);

        Arc::new(Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            queue: Mutex::new(None),
        })
    }

    #[must_use]
    pub const fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Number of slots currently held by running tasks.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.max_concurrent - self.semaphore.available_permits()
    }

    /// Queue `task` for execution and return a handle to its output.
    ///
    /// `weight` is the number of slots the task occupies while it runs. It is raised to one and
    /// capped at `max_concurrent`, so a heavy task can still be admitted.
    pub fn submit<F, T>(&self, weight: u32, task: F) -> ThrottledTask<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();

        let submission = Submission {
            permits: self.permits_for(weight),
            job: Box::pin(async move {
                // The handle may have been dropped, in which case nobody wants the output
                let _ = tx.send(task.await);
            }),
        };

        self.enqueue(submission);
        ThrottledTask { rx }
    }

    fn permits_for(&self, weight: u32) -> u32 {
        let cap = u32::try_from(self.max_concurrent).unwrap_or(u32::MAX);
        weight.clamp(1, cap)
    }

    fn enqueue(&self, mut submission: Submission) {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(tx) = queue.as_ref() {
            match tx.send(submission) {
                Ok(()) => return,
                Err(mpsc::error::SendError(returned)) => {
                    log::debug!(target: LOG_TARGET, "Throttler dispatcher has stopped, restarting it");
                    submission = returned;
                }
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        drop(tokio::spawn(dispatch(Arc::clone(&self.semaphore), rx)));
        if tx.send(submission).is_err() {
            log::error!(target: LOG_TARGET, "Throttler dispatcher did not start, dropping submitted task");
        }
        *queue = Some(tx);
    }
}

/// Admit queued submissions one after another as slots free up.
async fn dispatch(semaphore: Arc<Semaphore>, mut queue: mpsc::UnboundedReceiver<Submission>) {
    while let Some(Submission { permits, job }) = queue.recv().await {
        let Ok(permit) = Arc::clone(&semaphore).acquire_many_owned(permits).await else {
            log::error!(target: LOG_TARGET, "Throttler semaphore closed unexpectedly");
            break;
        };

        drop(tokio::spawn(async move {
            job.await;
            drop(permit);
        }));
    }
}

/// Handle to a task submitted to a [`Throttler`].
///
/// Resolves to the task's output, or to an error if the task panicked or was dropped before
/// it could finish.
pub struct ThrottledTask<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> core::fmt::Debug for ThrottledTask<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ThrottledTask").finish_non_exhaustive()
    }
}

impl<T> Future for ThrottledTask<T> {
    type Output = crate::Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.into_app_err("throttled task ended without producing a result"))
    }
}
