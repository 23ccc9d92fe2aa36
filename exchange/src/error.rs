// exchange/src/error.rs

use core::fmt;

/// Error returned by exchange operations and batch orchestrators.
///
/// A batch call reports a single status. For the asynchronous fan-in path the
/// status is merged across completions with first-error precedence: once a
/// failure has been recorded, later completions (success or failure) do not
/// overwrite it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
  /// A raw key string does not decode into a channel identity. Carries the
  /// offending raw key. Surfaced before any side effect.
  MalformedKey(String),
  /// Batch inputs of unequal length. Surfaced before any send or dispatch.
  SizeMismatch {
    keys: usize,
    values: usize,
  },
  /// A received value's liveness flag marked it dead. Carries the key name;
  /// the value is not delivered to its slot.
  InvalidValue(String),
  /// The underlying exchange is closed (or was closed while a receive was
  /// parked) and refused the operation.
  Closed,
}

impl fmt::Display for ExchangeError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ExchangeError::MalformedKey(raw) => write!(f, "malformed rendezvous key: {:?}", raw),
      ExchangeError::SizeMismatch { keys, values } => write!(
        f,
        "keys and values are not the same size: {} keys, {} values",
        keys, values
      ),
      ExchangeError::InvalidValue(key) => {
        write!(f, "the value returned for {} was not valid", key)
      }
      ExchangeError::Closed => write!(f, "exchange closed"),
    }
  }
}

impl std::error::Error for ExchangeError {}
