// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./panic_test.rs"]
mod panic_test;

use std::any::Any;
use std::borrow::Cow;

const OPAQUE_PAYLOAD: &str = "<opaque panic payload>";

// Payload types other than strings that are commonly passed to panic_any() and that we know how
// to print.
macro_rules! display_payload {
  ($payload:expr, $($ty:ty),+) => {
    $(
      if let Some(value) = $payload.downcast_ref::<$ty>() {
        return Cow::Owned(value.to_string());
      }
    )+
  };
}

/// Renders a caught panic payload for a single log line. `panic!()` produces either a `&str` or a
/// `String`. Anything else comes from `std::panic::panic_any()` and is printed if it is a boxed
/// error, a `std::io::Error` or a primitive. Any other concrete type, including error types not
/// listed here, is replaced with a placeholder since an arbitrary `Any` cannot be formatted.
#[must_use]
pub fn payload_message(payload: &(dyn Any + Send)) -> Cow<'_, str> {
  if let Some(message) = payload.downcast_ref::<&str>() {
    return Cow::Borrowed(*message);
  }
  if let Some(message) = payload.downcast_ref::<String>() {
    return Cow::Borrowed(message.as_str());
  }
  if let Some(error) = payload.downcast_ref::<Box<dyn std::error::Error + Send + Sync>>() {
    return Cow::Owned(error.to_string());
  }
  if let Some(error) = payload.downcast_ref::<Box<dyn std::error::Error + Send>>() {
    return Cow::Owned(error.to_string());
  }
  if let Some(error) = payload.downcast_ref::<std::io::Error>() {
    return Cow::Owned(error.to_string());
  }

  display_payload!(
    payload, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, bool, char
  );

  Cow::Borrowed(OPAQUE_PAYLOAD)
}
