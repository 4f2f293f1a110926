//! Steps: the hook and case bodies the runner executes.
//!
//! A step is declared in one of three styles and always completes with a
//! single `Result<(), Failure>`:
//!
//! - [`Step::sync`] / [`Step::try_sync`]: a plain closure returning `()` or
//!   `Result<(), E>`.
//! - [`Step::future`] / [`Step::try_future`]: a closure returning a future;
//!   the step completes when the future resolves.
//! - [`Step::callback`]: a closure handed a [`Done`] handle; the step
//!   completes when the handle is signalled.
//!
//! Every style races a timer. Whichever finishes first decides the outcome.
//! Panics are caught and reported with the location they were raised at.

use std::cell::Cell;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use futures_util::future::{self, LocalBoxFuture};
use futures_util::FutureExt;
use tokio::sync::oneshot;

use crate::error::{BoxError, Failure};

/// Outcome of a single step.
pub type Outcome = Result<(), Failure>;

/// A hook or case body, tagged with its completion style.
pub enum Step {
    Sync(Box<dyn Fn() -> Outcome>),
    Callback(Box<dyn Fn(Done)>),
    Future(Box<dyn Fn() -> LocalBoxFuture<'static, Outcome>>),
}

impl Step {
    /// A step that completes when the closure returns.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn() + 'static,
    {
        Step::Sync(Box::new(move || {
            f();
            Ok(())
        }))
    }

    /// Like [`sync`](Self::sync), failing with the returned error.
    ///
    /// ```rust,no_run
    /// use specrun::Step;
    ///
    /// let step = Step::try_sync(|| -> Result<(), std::num::ParseIntError> {
    ///     let _port: u16 = "8080".parse()?;
    ///     Ok(())
    /// });
    /// # drop(step);
    /// ```
    pub fn try_sync<F, E>(f: F) -> Self
    where
        F: Fn() -> Result<(), E> + 'static,
        E: Into<BoxError>,
    {
        Step::Sync(Box::new(move || f().map_err(Failure::from_error)))
    }

    /// A step that completes when the returned future resolves.
    ///
    /// ```rust,no_run
    /// use specrun::Step;
    /// use std::time::Duration;
    ///
    /// let step = Step::future(|| async {
    ///     tokio::time::sleep(Duration::from_millis(10)).await;
    /// });
    /// # drop(step);
    /// ```
    pub fn future<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        Step::Future(Box::new(move || f().map(Ok::<(), Failure>).boxed_local()))
    }

    /// Like [`future`](Self::future), failing with the error the future
    /// resolves to.
    pub fn try_future<F, Fut, E>(f: F) -> Self
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = Result<(), E>> + 'static,
        E: Into<BoxError>,
    {
        Step::Future(Box::new(move || {
            f().map(|result| result.map_err(Failure::from_error))
                .boxed_local()
        }))
    }

    /// A step that completes when the [`Done`] handle is signalled.
    ///
    /// ```rust,no_run
    /// use specrun::Step;
    ///
    /// let step = Step::callback(|done| {
    ///     std::thread::spawn(move || done.ok());
    /// });
    /// # drop(step);
    /// ```
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(Done) + 'static,
    {
        Step::Callback(Box::new(f))
    }

    pub fn style(&self) -> &'static str {
        match self {
            Step::Sync(_) => "sync",
            Step::Callback(_) => "callback",
            Step::Future(_) => "future",
        }
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Step::{}", self.style())
    }
}

/// Completion handle passed to callback-style steps.
///
/// Only the first signal counts; later ones (from clones, or after the step
/// already timed out) are ignored. The handle is `Send`, so it can be moved
/// into spawned tasks or threads.
#[derive(Clone)]
pub struct Done {
    slot: Arc<Mutex<Option<oneshot::Sender<Outcome>>>>,
}

impl Done {
    fn channel() -> (Done, oneshot::Receiver<Outcome>) {
        let (tx, rx) = oneshot::channel();
        let done = Done {
            slot: Arc::new(Mutex::new(Some(tx))),
        };
        (done, rx)
    }

    /// Signal success.
    pub fn ok(self) {
        self.signal(Ok(()));
    }

    /// Signal failure with `err`.
    pub fn fail(self, err: impl Into<BoxError>) {
        self.signal(Err(Failure::from_error(err)));
    }

    /// Signal with a result: success for `Ok`, failure for `Err`.
    pub fn finish<E: Into<BoxError>>(self, result: Result<(), E>) {
        self.signal(result.map_err(Failure::from_error));
    }

    /// Whether a signal has already been delivered.
    pub fn is_signalled(&self) -> bool {
        match self.slot.lock() {
            Ok(slot) => slot.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }

    fn signal(&self, outcome: Outcome) {
        let sender = match self.slot.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(tx) = sender {
            // The receiver is gone once the step timed out.
            let _ = tx.send(outcome);
        }
    }
}

impl std::fmt::Debug for Done {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Done")
            .field("signalled", &self.is_signalled())
            .finish()
    }
}

// ============================================================================
// Panic locations
// ============================================================================

thread_local! {
    static PANIC_LOCATION: Cell<Option<String>> = const { Cell::new(None) };
}

static LOCATION_HOOK: Once = Once::new();

/// Chain a panic hook that remembers where the last panic on each thread was
/// raised. The previous hook still runs.
fn record_panic_locations() {
    LOCATION_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let location = info.location().map(|l| l.to_string());
            let _ = PANIC_LOCATION.try_with(|slot| slot.set(location));
            previous(info);
        }));
    });
}

fn panic_failure(payload: Box<dyn std::any::Any + Send>) -> Failure {
    let location = PANIC_LOCATION.try_with(Cell::take).ok().flatten();
    Failure::from_panic(payload, location)
}

/// Run `step` under `limit`. An absent step succeeds immediately.
pub async fn run_step(step: Option<&Step>, limit: Duration) -> Outcome {
    let Some(step) = step else {
        return Ok(());
    };

    tracing::trace!(style = step.style(), limit_ms = limit.as_millis() as u64, "running step");
    record_panic_locations();
    let _ = PANIC_LOCATION.try_with(Cell::take);

    match tokio::time::timeout(limit, drive(step)).await {
        Ok(outcome) => outcome,
        Err(_) => {
            tracing::warn!(style = step.style(), limit_ms = limit.as_millis() as u64, "step timed out");
            Err(Failure::Timeout(limit))
        }
    }
}

async fn drive(step: &Step) -> Outcome {
    match step {
        Step::Sync(f) => catch_unwind(AssertUnwindSafe(|| f())).unwrap_or_else(|p| Err(panic_failure(p))),
        Step::Callback(f) => {
            let (done, rx) = Done::channel();
            let handle = done.clone();
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| f(handle))) {
                // A signal delivered before the panic still wins.
                done.signal(Err(panic_failure(payload)));
            }
            drop(done);
            match rx.await {
                Ok(outcome) => outcome,
                // Every handle dropped unsignalled: wait for the timer.
                Err(_) => future::pending().await,
            }
        }
        Step::Future(f) => {
            let fut = match catch_unwind(AssertUnwindSafe(|| f())) {
                Ok(fut) => fut,
                Err(payload) => return Err(panic_failure(payload)),
            };
            AssertUnwindSafe(fut)
                .catch_unwind()
                .await
                .unwrap_or_else(|p| Err(panic_failure(p)))
        }
    }
}
