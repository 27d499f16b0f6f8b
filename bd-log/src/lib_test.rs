// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use super::test::CapturingLogger;
use super::{GlobalLogger, Logger, initialize};
use pretty_assertions::assert_eq;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn initialize_twice() {
  initialize();
  initialize();

  GlobalLogger::new().log("written to the global logger");
}

#[test]
fn capturing_logger_keeps_order() {
  let logger = CapturingLogger::new();
  logger.log("first");
  logger.log("second");

  assert_eq!(logger.lines(), vec!["first".to_string(), "second".to_string()]);
}

#[test]
fn capturing_logger_waits_for_other_threads() {
  let logger = CapturingLogger::new();

  let writer = logger.clone();
  thread::spawn(move || {
    thread::sleep(Duration::from_millis(20));
    writer.log("from a thread");
  });

  assert_eq!(
    logger.wait_for_lines(1, Duration::from_secs(5)),
    vec!["from a thread".to_string()]
  );
}

#[test]
fn capturing_logger_wait_times_out() {
  let logger = CapturingLogger::new();
  logger.log("only one");

  let start = Instant::now();
  let lines = logger.wait_for_lines(2, Duration::from_millis(50));

  assert!(start.elapsed() >= Duration::from_millis(50));
  assert_eq!(lines, vec!["only one".to_string()]);
}
