// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

//! Supervised fire-and-forget launching
//! ====================================
//!
//! [`Launcher::launch`] runs a closure on its own thread and makes sure that a panic inside of it
//! is caught and written to a [`Logger`] instead of taking anything else down with it.
//! [`Launcher::launch_cancelable`] additionally reads a [`CancelSignal`] exactly once when the
//! thread starts and skips the work if it has already fired. The signal is not consulted again,
//! so work that is already running is never interrupted.
//!
//! Nothing is handed back to the caller: there is no join handle, no result and no way to wait.
//! Callers that need to know when work is done must pass their own channel or similar into the
//! closure. Each call gets its own thread (or tokio task for the async variants) and there is no
//! limit on how many may be running at once.
//!
//! Recovery relies on unwinding, so it does nothing for binaries built with `panic = "abort"`.
//! The process panic hook is left alone and still fires for every recovered panic, so with the
//! default hook the payload is printed to stderr in addition to the log line written here.

#![deny(
  clippy::expect_used,
  clippy::panic,
  clippy::todo,
  clippy::unimplemented,
  clippy::unreachable,
  clippy::unwrap_used
)]


pub mod panic;

use bd_cancellation::CancellationToken;
use bd_log::{GlobalLogger, Logger};
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, LazyLock};

#[cfg(test)]
#[ctor::ctor]
fn test_global_init() {
  bd_log::initialize();
}

const UNIT_THREAD_NAME: &str = "bd-safe-spawn";

//
// CancelSignal
//

/// Something that can be asked, once, whether work should still be started.
pub trait CancelSignal: Send + Sync + 'static {
  /// Returns a human readable reason if the signal has already fired.
  fn cancel_reason(&self) -> Option<String>;
}

impl CancelSignal for CancellationToken {
  fn cancel_reason(&self) -> Option<String> {
    self.err().map(|reason| reason.to_string())
  }
}

impl<T: CancelSignal> CancelSignal for Arc<T> {
  fn cancel_reason(&self) -> Option<String> {
    (**self).cancel_reason()
  }
}

//
// Outcome
//

// How a single unit of work ended. Only ever observed by tests and trace logging.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
  Skipped,
  CompletedNormally,
  CompletedViaRecovery,
}

fn log_cancelled(logger: &dyn Logger, reason: &str) -> Outcome {
  logger.log(&format!("Context canceled: {reason}"));
  Outcome::Skipped
}

fn log_recovered(logger: &dyn Logger, payload: &(dyn Any + Send)) -> Outcome {
  logger.log(&format!(
    "Recovered from panic: {}",
    panic::payload_message(payload)
  ));
  Outcome::CompletedViaRecovery
}

// Runs `work` behind a panic boundary, first checking `signal` if there is one. The signal check
// is inside the boundary as well since it may be caller supplied code.
pub(crate) fn supervise(
  logger: &dyn Logger,
  signal: Option<&dyn CancelSignal>,
  work: impl FnOnce(),
) -> Outcome {
  let result = catch_unwind(AssertUnwindSafe(|| {
    if let Some(reason) = signal.and_then(|signal| signal.cancel_reason()) {
      return log_cancelled(logger, &reason);
    }

    work();
    Outcome::CompletedNormally
  }));

  let outcome = result.unwrap_or_else(|payload| log_recovered(logger, payload.as_ref()));
  log::trace!("supervised work finished: {outcome:?}");
  outcome
}

pub(crate) async fn supervise_async(
  logger: &dyn Logger,
  signal: Option<&dyn CancelSignal>,
  work: impl Future<Output = ()>,
) -> Outcome {
  let result = AssertUnwindSafe(async {
    if let Some(reason) = signal.and_then(|signal| signal.cancel_reason()) {
      return log_cancelled(logger, &reason);
    }

    work.await;
    Outcome::CompletedNormally
  })
  .catch_unwind()
  .await;

  let outcome = result.unwrap_or_else(|payload| log_recovered(logger, payload.as_ref()));
  log::trace!("supervised task finished: {outcome:?}");
  outcome
}

//
// Launcher
//

/// Launches work on independent threads or tasks, reporting panics and skipped work to the
/// provided logger.
#[derive(Clone)]
pub struct Launcher {
  logger: Arc<dyn Logger>,
}

impl Default for Launcher {
  fn default() -> Self {
    Self::new(GlobalLogger::new())
  }
}

impl Launcher {
  #[must_use]
  pub fn new(logger: Arc<dyn Logger>) -> Self {
    Self { logger }
  }

  /// Runs `work` on a new thread. Returns immediately.
  pub fn launch(&self, work: impl FnOnce() + Send + 'static) {
    let logger = self.logger.clone();
    self.spawn_thread(move || {
      supervise(logger.as_ref(), None, work);
    });
  }

  /// Runs `work` on a new thread unless `signal` has already fired by the time that thread starts.
  /// Returns immediately.
  pub fn launch_cancelable(&self, signal: impl CancelSignal, work: impl FnOnce() + Send + 'static) {
    let logger = self.logger.clone();
    self.spawn_thread(move || {
      let signal: &dyn CancelSignal = &signal;
      supervise(logger.as_ref(), Some(signal), work);
    });
  }

  /// Runs `work` as a task on the current tokio runtime. Returns immediately.
  pub fn launch_async(&self, work: impl Future<Output = ()> + Send + 'static) {
    let logger = self.logger.clone();
    self.spawn_task(async move {
      supervise_async(logger.as_ref(), None, work).await;
    });
  }

  /// Runs `work` as a task on the current tokio runtime unless `signal` has already fired by the
  /// time the task is first polled. Returns immediately.
  pub fn launch_async_cancelable(
    &self,
    signal: impl CancelSignal,
    work: impl Future<Output = ()> + Send + 'static,
  ) {
    let logger = self.logger.clone();
    self.spawn_task(async move {
      let signal: &dyn CancelSignal = &signal;
      supervise_async(logger.as_ref(), Some(signal), work).await;
    });
  }

  fn spawn_thread(&self, unit: impl FnOnce() + Send + 'static) {
    // The join handle is dropped right away which detaches the thread.
    if let Err(e) = std::thread::Builder::new()
      .name(UNIT_THREAD_NAME.to_string())
      .spawn(unit)
    {
      self.logger.log(&format!("Failed to launch: {e}"));
    }
  }

  fn spawn_task(&self, unit: impl Future<Output = ()> + Send + 'static) {
    match tokio::runtime::Handle::try_current() {
      Ok(handle) => {
        handle.spawn(unit);
      },
      Err(e) => self.logger.log(&format!("Failed to launch: {e}")),
    }
  }
}

static DEFAULT_LAUNCHER: LazyLock<Launcher> = LazyLock::new(Launcher::default);

/// [`Launcher::launch`] reporting to the process wide logger.
pub fn launch(work: impl FnOnce() + Send + 'static) {
  DEFAULT_LAUNCHER.launch(work);
}

/// [`Launcher::launch_cancelable`] reporting to the process wide logger.
pub fn launch_cancelable(signal: impl CancelSignal, work: impl FnOnce() + Send + 'static) {
  DEFAULT_LAUNCHER.launch_cancelable(signal, work);
}
