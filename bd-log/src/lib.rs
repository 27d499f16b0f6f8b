// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#![deny(
  clippy::expect_used,
  clippy::panic,
  clippy::todo,
  clippy::unimplemented,
  clippy::unreachable,
  clippy::unwrap_used
)]

#[cfg(test)]
#[path = "./lib_test.rs"]
mod lib_test;


use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

const DEFAULT_FILTER_RULES: &str = "info";

//
// Logger
//

/// A sink for single line log messages. Components that need to report something out of band
/// (e.g. a recovered panic on a background thread) take one of these rather than writing to the
/// global logger directly, which lets tests capture exactly what was written.
pub trait Logger: Send + Sync {
  /// Writes a single log line.
  fn log(&self, msg: &str);
}

//
// GlobalLogger
//

/// Forwards every message to the process wide `log` facade at error level. Whatever the embedding
/// application installed (see [`initialize`]) decides where the line ends up.
#[derive(Default)]
pub struct GlobalLogger;

impl GlobalLogger {
  #[must_use]
  pub fn new() -> Arc<Self> {
    Arc::new(Self)
  }
}

impl Logger for GlobalLogger {
  fn log(&self, msg: &str) {
    log::error!("{msg}");
  }
}

// Initialize process wide logging to stderr. Should be called as early as possible in the program.
// Calling this more than once is harmless: only the first call installs a subscriber.
pub fn initialize() {
  // Gate ANSI on whether BD_LOG_ANSI is set. This avoids using this feature by default (e.g.
  // in k8s) but allows it to be enabled for local development should the user want it.
  let stderr = tracing_subscriber::fmt::layer()
    .with_writer(std::io::stderr)
    .with_ansi(std::env::var("BD_LOG_ANSI").is_ok())
    .with_line_number(true)
    .with_thread_names(true)
    .with_thread_ids(true)
    .compact();

  let filter = EnvFilter::new(
    std::env::var("RUST_LOG")
      .as_deref()
      .unwrap_or(DEFAULT_FILTER_RULES),
  );

  // try_init() also bridges records emitted via the log crate into tracing.
  if let Err(e) = Registry::default().with(filter).with(stderr).try_init() {
    log::debug!("logging already initialized: {e}");
  }
}
