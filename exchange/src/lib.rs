//! Keyed value rendezvous for concurrent Rust.
//!
//! Baton lets independent producer and consumer execution units hand off
//! named values through string-identified channels, without running on the
//! same thread or completing at the same time. On top of the single-channel
//! [`Exchange`] primitive it provides batch orchestration: fail-fast
//! multi-key send, sequential multi-key receive, and an asynchronous fan-in
//! receive that aggregates N concurrently-completing receives into exactly
//! one completion signal with first-error precedence — without ever invoking
//! user code while an internal lock is held.

pub mod batch;
pub mod error;
pub mod exchange;
pub mod key;
pub mod local;

// Public re-exports for convenience.
pub use batch::{recv_all, recv_all_async, recv_all_sync, send_all};
pub use error::ExchangeError;
pub use exchange::{Exchange, ExchangeArgs, Message, RecvCallback, Slot, StatusCallback};
pub use key::{create_key, ParsedKey};
pub use local::LocalExchange;
