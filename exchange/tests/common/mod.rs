#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use baton::{create_key, Exchange, ExchangeArgs, ExchangeError, LocalExchange, ParsedKey, RecvCallback};

pub const STRESS_TIMEOUT: Duration = Duration::from_secs(15);
pub const STRESS_BATCHES: usize = 200;

/// Canonical raw key for a named edge between two fixed test devices.
pub fn raw_key(edge: &str) -> String {
  create_key(
    "/job:worker/device:CPU:0",
    0x1,
    "/job:worker/device:CPU:1",
    edge,
    0,
    0,
  )
}

pub fn parsed_key(edge: &str) -> ParsedKey {
  ParsedKey::parse(&raw_key(edge)).unwrap()
}

/// An exchange wrapper that counts how many primitive operations were
/// actually dispatched, for asserting zero-side-effect properties.
pub struct CountingExchange<T> {
  inner: LocalExchange<T>,
  sends: AtomicUsize,
  recvs: AtomicUsize,
}

impl<T> CountingExchange<T> {
  pub fn new() -> Self {
    CountingExchange {
      inner: LocalExchange::new(),
      sends: AtomicUsize::new(0),
      recvs: AtomicUsize::new(0),
    }
  }

  pub fn sends_dispatched(&self) -> usize {
    self.sends.load(Ordering::SeqCst)
  }

  pub fn recvs_dispatched(&self) -> usize {
    self.recvs.load(Ordering::SeqCst)
  }

  pub fn inner(&self) -> &LocalExchange<T> {
    &self.inner
  }
}

impl<T: Send + 'static> Exchange<T> for CountingExchange<T> {
  fn send(&self, key: &ParsedKey, args: &ExchangeArgs, value: T, is_dead: bool) -> Result<(), ExchangeError> {
    self.sends.fetch_add(1, Ordering::SeqCst);
    self.inner.send(key, args, value, is_dead)
  }

  fn recv_async(&self, key: &ParsedKey, args: &ExchangeArgs, done: RecvCallback<T>) {
    self.recvs.fetch_add(1, Ordering::SeqCst);
    self.inner.recv_async(key, args, done)
  }
}
