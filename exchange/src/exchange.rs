// exchange/src/exchange.rs

use std::any::Any;
use std::fmt;
use std::sync::mpsc;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::ExchangeError;
use crate::key::ParsedKey;

/// Execution context handed to every primitive call (device context,
/// allocator hints, and the like). The orchestrators pass it through
/// unchanged and never inspect it.
#[derive(Clone, Default)]
pub struct ExchangeArgs {
  pub context: Option<Arc<dyn Any + Send + Sync>>,
}

impl fmt::Debug for ExchangeArgs {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ExchangeArgs")
      .field("context", &self.context.as_ref().map(|_| "..."))
      .finish()
  }
}

/// The payload a completed receive delivers.
#[derive(Debug, Clone)]
pub struct Message<T> {
  pub value: T,
  /// Marks a value produced along an inactive control-flow branch. A dead
  /// value is structurally present but semantically invalid; orchestrators
  /// convert it into [`ExchangeError::InvalidValue`] naming the key.
  pub is_dead: bool,
  /// The context the producing side supplied to `send`.
  pub send_args: ExchangeArgs,
}

/// One-shot completion for an asynchronous receive. Invoked exactly once,
/// from an unspecified thread, at an unspecified time.
pub type RecvCallback<T> = Box<dyn FnOnce(Result<Message<T>, ExchangeError>) + Send + 'static>;

/// Aggregated completion for a batch receive.
pub type StatusCallback = Box<dyn FnOnce(Result<(), ExchangeError>) + Send + 'static>;

/// The single-channel primitive the batch orchestrators are built on.
///
/// A channel matches one producer's `send` to one consumer's receive via key
/// equality. Implementations must be safe to drive from multiple threads and
/// must invoke each receive callback exactly once. No timeout or cancellation
/// surface is assumed: if a value never arrives, `recv` blocks and
/// `recv_async` never completes.
pub trait Exchange<T: Send + 'static>: Send + Sync {
  /// Synchronously produces `value` on the channel identified by `key`.
  fn send(&self, key: &ParsedKey, args: &ExchangeArgs, value: T, is_dead: bool) -> Result<(), ExchangeError>;

  /// Consumes the next value on the channel identified by `key`, invoking
  /// `done` exactly once when it is available (possibly before this call
  /// returns, possibly much later on another thread).
  fn recv_async(&self, key: &ParsedKey, args: &ExchangeArgs, done: RecvCallback<T>);

  /// Blocking receive, derived from [`Exchange::recv_async`] by parking the
  /// calling thread until the completion fires.
  fn recv(&self, key: &ParsedKey, args: &ExchangeArgs) -> Result<Message<T>, ExchangeError> {
    let (tx, rx) = mpsc::sync_channel(1);
    self.recv_async(
      key,
      args,
      Box::new(move |result| {
        let _ = tx.send(result);
      }),
    );
    // A dropped-without-send completion means the primitive broke its
    // exactly-once contract; report it as a closed exchange rather than
    // panicking on the caller's thread.
    rx.recv().unwrap_or(Err(ExchangeError::Closed))
  }
}

/// A pre-allocated, write-at-most-once output cell for one key of a batch
/// receive. Handles are cheap clones sharing the same cell: the caller keeps
/// one to read the result, the dispatched completion holds the other and is
/// the cell's only writer.
pub struct Slot<T> {
  cell: Arc<Mutex<Option<T>>>,
}

impl<T> Clone for Slot<T> {
  fn clone(&self) -> Self {
    Slot {
      cell: Arc::clone(&self.cell),
    }
  }
}

impl<T> Default for Slot<T> {
  fn default() -> Self {
    Slot::new()
  }
}

impl<T> Slot<T> {
  pub fn new() -> Self {
    Slot {
      cell: Arc::new(Mutex::new(None)),
    }
  }

  /// Allocates one empty slot per requested key.
  pub fn allocate(count: usize) -> Vec<Slot<T>> {
    (0..count).map(|_| Slot::new()).collect()
  }

  /// Whether a value has been delivered into this slot.
  pub fn is_set(&self) -> bool {
    self.cell.lock().is_some()
  }

  /// Removes and returns the delivered value, if any.
  pub fn take(&self) -> Option<T> {
    self.cell.lock().take()
  }

  /// Delivers the received value. Each slot has exactly one writer; a second
  /// fill indicates a broken exactly-once contract upstream.
  pub(crate) fn fill(&self, value: T) {
    let mut cell = self.cell.lock();
    debug_assert!(cell.is_none(), "output slot filled twice");
    *cell = Some(value);
  }
}

impl<T> fmt::Debug for Slot<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Slot").field("is_set", &self.is_set()).finish()
  }
}
