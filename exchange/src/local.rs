// exchange/src/local.rs

//! An in-process implementation of the [`Exchange`] primitive: producers and
//! consumers in the same process rendezvous through a keyed table of
//! single-channel queues.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::ExchangeError;
use crate::exchange::{Exchange, ExchangeArgs, Message, RecvCallback};
use crate::key::ParsedKey;

/// One channel's pending work. The queue is homogeneous: it holds either
/// buffered messages (sends that arrived before a receiver) or parked waiters
/// (receives that arrived before a sender), never a mix — a send drains a
/// waiter before anything is buffered, and vice versa.
enum Entry<T> {
  Buffered(Message<T>),
  Waiting(RecvCallback<T>),
}

struct Table<T> {
  channels: HashMap<ParsedKey, VecDeque<Entry<T>>>,
  closed: bool,
}

/// In-process keyed rendezvous.
///
/// `send` and `recv_async` do O(1) queue work under one table lock; receive
/// callbacks are always invoked after the lock has been released, so a
/// callback may re-enter the exchange freely. Buffered values that were never
/// received are dropped when the exchange is closed or dropped.
pub struct LocalExchange<T> {
  table: Mutex<Table<T>>,
}

impl<T> Default for LocalExchange<T> {
  fn default() -> Self {
    LocalExchange::new()
  }
}

impl<T> LocalExchange<T> {
  pub fn new() -> Self {
    LocalExchange {
      table: Mutex::new(Table {
        channels: HashMap::new(),
        closed: false,
      }),
    }
  }

  /// Tears the exchange down: every parked waiter is failed with
  /// [`ExchangeError::Closed`], buffered values are dropped, and all
  /// subsequent operations are refused. Idempotent.
  pub fn close(&self) {
    let drained = {
      let mut table = self.table.lock();
      if table.closed {
        return;
      }
      table.closed = true;
      let mut waiters = Vec::new();
      for (_, mut queue) in table.channels.drain() {
        while let Some(entry) = queue.pop_front() {
          if let Entry::Waiting(done) = entry {
            waiters.push(done);
          }
        }
      }
      waiters
    };
    debug!(waiters = drained.len(), "local exchange closed");
    for done in drained {
      done(Err(ExchangeError::Closed));
    }
  }

  /// Number of keys with pending work (buffered or waiting).
  pub fn pending_channels(&self) -> usize {
    self.table.lock().channels.len()
  }
}

impl<T> fmt::Debug for LocalExchange<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let table = self.table.lock();
    f.debug_struct("LocalExchange")
      .field("pending_channels", &table.channels.len())
      .field("closed", &table.closed)
      .finish()
  }
}

impl<T: Send + 'static> Exchange<T> for LocalExchange<T> {
  fn send(&self, key: &ParsedKey, args: &ExchangeArgs, value: T, is_dead: bool) -> Result<(), ExchangeError> {
    let message = Message {
      value,
      is_dead,
      send_args: args.clone(),
    };
    let mut table = self.table.lock();
    if table.closed {
      return Err(ExchangeError::Closed);
    }
    let queue = table.channels.entry(key.clone()).or_default();
    if matches!(queue.front(), Some(Entry::Waiting(_))) {
      let Some(Entry::Waiting(done)) = queue.pop_front() else {
        unreachable!("queue front changed under the table lock");
      };
      if queue.is_empty() {
        table.channels.remove(key);
      }
      drop(table);
      done(Ok(message));
    } else {
      queue.push_back(Entry::Buffered(message));
    }
    Ok(())
  }

  fn recv_async(&self, key: &ParsedKey, _args: &ExchangeArgs, done: RecvCallback<T>) {
    let mut table = self.table.lock();
    if table.closed {
      drop(table);
      done(Err(ExchangeError::Closed));
      return;
    }
    let queue = table.channels.entry(key.clone()).or_default();
    if matches!(queue.front(), Some(Entry::Buffered(_))) {
      let Some(Entry::Buffered(message)) = queue.pop_front() else {
        unreachable!("queue front changed under the table lock");
      };
      if queue.is_empty() {
        table.channels.remove(key);
      }
      drop(table);
      done(Ok(message));
    } else {
      queue.push_back(Entry::Waiting(done));
    }
  }
}
