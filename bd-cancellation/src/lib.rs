// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

//! Cancellation tokens
//! ===================
//!
//! A [`CancellationTrigger`] owns the cancelled state and hands out any number of
//! [`CancellationToken`]s that observe it. Cancellation is one way and carries a
//! [`CancelReason`]; the first reason recorded wins. Tokens may additionally carry a deadline,
//! after which they report [`CancelReason::DeadlineExceeded`] without anyone calling cancel.

#![deny(
  clippy::expect_used,
  clippy::panic,
  clippy::todo,
  clippy::unimplemented,
  clippy::unreachable,
  clippy::unwrap_used
)]


use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

//
// CancelReason
//

#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum CancelReason {
  #[error("canceled")]
  Canceled,
  #[error("deadline exceeded")]
  DeadlineExceeded,
  #[error("{0}")]
  Cause(String),
}

type CancelState = Option<CancelReason>;

//
// CancellationTrigger
//

/// The owning side of a cancellation. Dropping the trigger does not cancel anything; tokens made
/// from a dropped trigger simply can never be cancelled (other than by their own deadline).
#[derive(Debug)]
pub struct CancellationTrigger {
  state_tx: Arc<watch::Sender<CancelState>>,
}

impl Default for CancellationTrigger {
  fn default() -> Self {
    let (state_tx, _) = watch::channel(None);
    Self {
      state_tx: Arc::new(state_tx),
    }
  }
}

impl CancellationTrigger {
  #[must_use]
  pub fn make_token(&self) -> CancellationToken {
    CancellationToken {
      state_rx: self.state_tx.subscribe(),
      deadline: None,
    }
  }

  pub fn cancel(&self) {
    self.cancel_with(CancelReason::Canceled);
  }

  /// Cancels with the given reason. Returns false if already cancelled, in which case the
  /// original reason is kept.
  pub fn cancel_with(&self, reason: CancelReason) -> bool {
    self.state_tx.send_if_modified(|state| {
      if state.is_some() {
        return false;
      }
      log::debug!("cancelling: {reason}");
      *state = Some(reason);
      true
    })
  }

  #[must_use]
  pub fn is_cancelled(&self) -> bool {
    self.state_tx.borrow().is_some()
  }
}

//
// CancellationToken
//

/// The observing side of a cancellation. Clones share the same underlying state.
#[derive(Clone, Debug)]
pub struct CancellationToken {
  state_rx: watch::Receiver<CancelState>,
  deadline: Option<Instant>,
}

impl CancellationToken {
  /// A token that is never cancelled unless given a deadline.
  #[must_use]
  pub fn never() -> Self {
    let (_, state_rx) = watch::channel(None);
    Self {
      state_rx,
      deadline: None,
    }
  }

  /// Returns a token sharing this token's state that additionally expires at `deadline`. If this
  /// token already has an earlier deadline, that one is kept.
  #[must_use]
  pub fn with_deadline(&self, deadline: Instant) -> Self {
    Self {
      state_rx: self.state_rx.clone(),
      deadline: Some(self.deadline.map_or(deadline, |current| current.min(deadline))),
    }
  }

  /// Returns a token that additionally expires after `timeout`. A timeout too large to represent
  /// as an instant adds no deadline.
  #[must_use]
  pub fn with_timeout(&self, timeout: Duration) -> Self {
    Instant::now()
      .checked_add(timeout)
      .map_or_else(|| self.clone(), |deadline| self.with_deadline(deadline))
  }

  #[must_use]
  pub const fn deadline(&self) -> Option<Instant> {
    self.deadline
  }

  /// Reads the current state once. Returns the reason if the token has been cancelled or its
  /// deadline has passed.
  #[must_use]
  pub fn err(&self) -> Option<CancelReason> {
    if let Some(reason) = self.state_rx.borrow().as_ref() {
      return Some(reason.clone());
    }

    self
      .deadline
      .filter(|deadline| Instant::now() >= *deadline)
      .map(|_| CancelReason::DeadlineExceeded)
  }

  #[must_use]
  pub fn is_cancelled(&self) -> bool {
    self.err().is_some()
  }

  /// Returns once the token has been cancelled, with the reason. Never returns if the trigger has
  /// gone away without cancelling and there is no deadline.
  pub async fn cancelled(&mut self) -> CancelReason {
    loop {
      if let Some(reason) = self.state_rx.borrow_and_update().clone() {
        return reason;
      }

      match self.deadline {
        Some(deadline) => {
          tokio::select! {
            changed = self.state_rx.changed() => {
              if changed.is_err() {
                tokio::time::sleep_until(deadline).await;
              }
            },
            () = tokio::time::sleep_until(deadline) => {},
          }
          if Instant::now() >= deadline && self.state_rx.borrow().is_none() {
            return CancelReason::DeadlineExceeded;
          }
        },
        None => {
          if self.state_rx.changed().await.is_err() {
            std::future::pending::<()>().await;
          }
        },
      }
    }
  }
}
