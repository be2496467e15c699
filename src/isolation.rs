use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc,
    },
    thread,
    time::{Duration, Instant},
};

use log::debug;

use crate::{
    error::{EngineError, EngineResult, ErrorKind},
    position::Position,
};

/// Granularity at which the envelope re-checks cancellation while waiting on
/// a worker.
const POLL_SLICE: Duration = Duration::from_millis(10);

/// Cooperative cancellation signal shared between the caller, the executor
/// and plugin workers.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// The outcome a plugin callable produced on its worker thread: its own
/// Ok/Err result, with panics already turned into a message.
type WorkerOutcome<T> = Result<Result<T, String>, String>;

/// Run a plugin callable on a short-lived worker thread, racing it against
/// the timeout and the cancellation token.
///
/// The outer result reports envelope outcomes (timeout, panic, cancellation);
/// the inner one is the callable's own error, which the caller maps to its
/// domain kind. `worker_cancel` is the per-call token handed to the callable;
/// it is cancelled when the envelope gives up so that cancellation-aware
/// plugins can stop early.
pub fn run_isolated<T: Send + 'static>(
    what: &str,
    callable: impl FnOnce() -> Result<T, String> + Send + 'static,
    timeout: Duration,
    cancel: &CancelToken,
    worker_cancel: &CancelToken,
    position: Position,
) -> EngineResult<Result<T, String>> {
    let (sender, receiver) = mpsc::channel::<WorkerOutcome<T>>();

    let spawned = thread::Builder::new()
        .name(format!("prompty-{what}"))
        .spawn(move || {
            let outcome = catch_unwind(AssertUnwindSafe(callable)).map_err(|panic| {
                panic
                    .downcast_ref::<&str>()
                    .map(|message| (*message).to_owned())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "plugin panicked".to_owned())
            });
            // The receiver may be gone after a timeout; nothing to do then.
            let _ = sender.send(outcome);
        });

    if let Err(error) = spawned {
        return Err(EngineError::at(
            ErrorKind::PluginPanic,
            format!("could not spawn worker for {what}: {error}"),
            position,
        ));
    }

    let deadline = Instant::now() + timeout;

    loop {
        if cancel.is_cancelled() {
            worker_cancel.cancel();
            return Err(EngineError::at(
                ErrorKind::Resource,
                "execution cancelled",
                position,
            ));
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            worker_cancel.cancel();
            debug!("{what} timed out after {timeout:?}");
            return Err(EngineError::at(
                ErrorKind::PluginTimeout,
                format!("{what} exceeded its budget of {timeout:?}"),
                position,
            ));
        }

        match receiver.recv_timeout(remaining.min(POLL_SLICE)) {
            Ok(Ok(result)) => return Ok(result),
            Ok(Err(panic_message)) => {
                return Err(EngineError::at(
                    ErrorKind::PluginPanic,
                    format!("{what} panicked: {panic_message}"),
                    position,
                ))
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                return Err(EngineError::at(
                    ErrorKind::PluginPanic,
                    format!("worker for {what} disappeared"),
                    position,
                ))
            }
        }
    }
}
