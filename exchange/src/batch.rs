// exchange/src/batch.rs

//! Batch orchestration over the single-channel [`Exchange`] primitive:
//! fail-fast multi-key send, sequential multi-key receive, and the
//! asynchronous fan-in receive that aggregates N independently-completing
//! receives into a single completion signal.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::error::ExchangeError;
use crate::exchange::{Exchange, ExchangeArgs, Slot, StatusCallback};
use crate::key::ParsedKey;

/// Sends `values[i]` on the channel named by `keys[i]`, in order, stopping at
/// the first parse or send failure.
///
/// The length precondition is checked before anything is sent: a mismatch
/// returns [`ExchangeError::SizeMismatch`] with zero side effects. On a
/// mid-batch failure, values already sent are not retracted; sends are
/// registrations into independent channels and rollback is not meaningful.
pub fn send_all<T, E>(
  exchange: &E,
  args: &ExchangeArgs,
  keys: &[String],
  values: Vec<T>,
) -> Result<(), ExchangeError>
where
  T: Send + 'static,
  E: Exchange<T> + ?Sized,
{
  if keys.len() != values.len() {
    return Err(ExchangeError::SizeMismatch {
      keys: keys.len(),
      values: values.len(),
    });
  }
  for (key, value) in keys.iter().zip(values) {
    let parsed = ParsedKey::parse(key)?;
    exchange.send(&parsed, args, value, false)?;
  }
  Ok(())
}

/// Receives one value per entry of `out`, in place, blocking the calling
/// thread for the duration of the batch.
///
/// Iteration order over the map is unspecified; each key is visited exactly
/// once. The first parse failure, receive failure, or dead value aborts the
/// remainder of the batch — entries already received stay populated, entries
/// not yet visited are left untouched. A dead value is fatal here, unlike in
/// [`recv_all_async`] where it is a per-key error.
pub fn recv_all_sync<T, E>(
  exchange: &E,
  out: &mut HashMap<String, T>,
  args: &ExchangeArgs,
) -> Result<(), ExchangeError>
where
  T: Send + 'static,
  E: Exchange<T> + ?Sized,
{
  for (key, slot) in out.iter_mut() {
    let parsed = ParsedKey::parse(key)?;
    let message = exchange.recv(&parsed, args)?;
    if message.is_dead {
      return Err(ExchangeError::InvalidValue(key.clone()));
    }
    *slot = message.value;
  }
  Ok(())
}

/// Shared completion tracking for one fan-in batch. Created at dispatch,
/// mutated under its mutex by each per-key completion, torn down by whichever
/// completion observes the remaining count reach zero.
struct CallState {
  agg: Mutex<Aggregate>,
}

struct Aggregate {
  remaining: usize,
  status: Result<(), ExchangeError>,
  /// Taken (exactly once) by the final completion, which invokes it after
  /// releasing the lock.
  done: Option<StatusCallback>,
}

impl Aggregate {
  /// First-error precedence: a recorded failure is never overwritten.
  fn merge(&mut self, status: Result<(), ExchangeError>) {
    if self.status.is_ok() {
      if let Err(e) = status {
        self.status = Err(e);
      }
    }
  }
}

/// Dispatches one asynchronous receive per key and delivers a single
/// aggregated completion.
///
/// All keys are parsed before anything is dispatched; a parse failure (or a
/// `keys`/`slots` length mismatch) invokes `done` immediately with the error
/// and dispatches nothing, since in-flight receives cannot be cancelled. An
/// empty batch invokes `done(Ok(()))` synchronously without allocating any
/// shared state.
///
/// Each per-key completion may run on an arbitrary thread at an arbitrary
/// time. A failed receive contributes its error; a received dead value
/// contributes [`ExchangeError::InvalidValue`] naming the key and delivers
/// nothing to the slot; otherwise the value is written into the key's slot
/// (one writer per slot). Completion statuses merge with first-error
/// precedence, and `done` fires exactly once, with the aggregate, after the
/// last completion — never while the internal lock is held, so `done` may
/// safely re-enter the exchange.
///
/// There is no fail-fast mid-batch: even after an error, the batch waits for
/// all N completions before reporting. If a dispatched receive never
/// completes, the batch never completes.
pub fn recv_all_async<T, E>(
  exchange: &E,
  args: &ExchangeArgs,
  keys: &[String],
  slots: &[Slot<T>],
  done: StatusCallback,
) where
  T: Send + 'static,
  E: Exchange<T> + ?Sized,
{
  if keys.len() != slots.len() {
    done(Err(ExchangeError::SizeMismatch {
      keys: keys.len(),
      values: slots.len(),
    }));
    return;
  }
  if keys.is_empty() {
    done(Ok(()));
    return;
  }

  // Validation phase: parse everything up front so a bad key never leaves
  // sibling receives in flight with no way to cancel them.
  let mut parsed_keys = Vec::with_capacity(keys.len());
  for key in keys {
    match ParsedKey::parse(key) {
      Ok(parsed) => parsed_keys.push(parsed),
      Err(e) => {
        done(Err(e));
        return;
      }
    }
  }

  trace!(keys = keys.len(), "dispatching fan-in receive");
  let state = Arc::new(CallState {
    agg: Mutex::new(Aggregate {
      remaining: keys.len(),
      status: Ok(()),
      done: Some(done),
    }),
  });

  for ((key, parsed), slot) in keys.iter().zip(parsed_keys).zip(slots) {
    let key = key.clone();
    let slot = slot.clone();
    let state = Arc::clone(&state);
    exchange.recv_async(
      &parsed,
      args,
      Box::new(move |result| {
        let status = match result {
          Ok(message) => {
            if message.is_dead {
              Err(ExchangeError::InvalidValue(key))
            } else {
              slot.fill(message.value);
              Ok(())
            }
          }
          Err(e) => Err(e),
        };

        let mut agg = state.agg.lock();
        agg.merge(status);
        agg.remaining -= 1;
        if agg.remaining == 0 {
          // Last completion: take the callback and the final status, then
          // drop the lock before running user code.
          let final_status = agg.status.clone();
          let done = agg.done.take();
          drop(agg);
          trace!("fan-in receive complete");
          if let Some(done) = done {
            done(final_status);
          }
        }
      }),
    );
  }
}

/// Future-based rendering of [`recv_all_async`]: resolves to the received
/// values in key order once every per-key receive has completed.
///
/// An error resolution still waits for all completions first (first error
/// wins); values received alongside the failure are discarded with the slots.
pub async fn recv_all<T, E>(
  exchange: &E,
  args: &ExchangeArgs,
  keys: &[String],
) -> Result<Vec<T>, ExchangeError>
where
  T: Send + 'static,
  E: Exchange<T> + ?Sized,
{
  let slots: Vec<Slot<T>> = Slot::allocate(keys.len());
  let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
  recv_all_async(
    exchange,
    args,
    keys,
    &slots,
    Box::new(move |status| {
      let _ = tx.send(status);
    }),
  );
  match rx.receive().await {
    Some(Ok(())) => {}
    Some(Err(e)) => return Err(e),
    // The aggregated callback was dropped without firing, which the fan-in
    // contract rules out; treat it as the exchange having gone away.
    None => return Err(ExchangeError::Closed),
  }
  let mut values = Vec::with_capacity(slots.len());
  for slot in &slots {
    match slot.take() {
      Some(value) => values.push(value),
      None => return Err(ExchangeError::Closed),
    }
  }
  Ok(values)
}
