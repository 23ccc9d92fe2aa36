// exchange/src/key.rs

use std::fmt;

use crate::error::ExchangeError;

/// The structured identity of a channel, produced by parsing a raw key string.
///
/// Two sides rendezvous on a channel iff their parsed keys compare equal, so
/// `ParsedKey` is `Eq + Hash` and usable as a table key. Immutable once
/// parsed.
///
/// The wire form is five `;`-separated fields:
///
/// ```text
/// src_device;src_incarnation_hex;dst_device;edge_name;frame_id:iter_id
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParsedKey {
  pub src_device: String,
  /// Incarnation of the producing device, hex-encoded in the raw key. Lets a
  /// restarted producer be distinguished from its previous life.
  pub src_incarnation: u64,
  pub dst_device: String,
  /// Name of the value travelling over this channel (e.g. a graph edge name).
  pub edge_name: String,
  pub frame_id: u64,
  pub iter_id: u64,
}

impl ParsedKey {
  /// Parses and validates a raw key string.
  ///
  /// Pure and stateless; safe to call concurrently from any thread. Any
  /// deviation from the wire form yields [`ExchangeError::MalformedKey`]
  /// carrying the raw string.
  pub fn parse(raw: &str) -> Result<ParsedKey, ExchangeError> {
    let malformed = || ExchangeError::MalformedKey(raw.to_string());

    let mut fields = raw.split(';');
    let src_device = fields.next().ok_or_else(malformed)?;
    let incarnation = fields.next().ok_or_else(malformed)?;
    let dst_device = fields.next().ok_or_else(malformed)?;
    let edge_name = fields.next().ok_or_else(malformed)?;
    let frame_iter = fields.next().ok_or_else(malformed)?;
    if fields.next().is_some() {
      return Err(malformed());
    }

    if src_device.is_empty() || dst_device.is_empty() || edge_name.is_empty() {
      return Err(malformed());
    }

    let src_incarnation = u64::from_str_radix(incarnation, 16).map_err(|_| malformed())?;

    let (frame, iter) = frame_iter.split_once(':').ok_or_else(malformed)?;
    let frame_id = frame.parse::<u64>().map_err(|_| malformed())?;
    let iter_id = iter.parse::<u64>().map_err(|_| malformed())?;

    Ok(ParsedKey {
      src_device: src_device.to_string(),
      src_incarnation,
      dst_device: dst_device.to_string(),
      edge_name: edge_name.to_string(),
      frame_id,
      iter_id,
    })
  }
}

impl fmt::Display for ParsedKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{};{:x};{};{};{}:{}",
      self.src_device, self.src_incarnation, self.dst_device, self.edge_name, self.frame_id, self.iter_id
    )
  }
}

/// Builds the canonical raw encoding of a channel key, so producers and
/// consumers derive identical strings. The inverse of [`ParsedKey::parse`].
pub fn create_key(
  src_device: &str,
  src_incarnation: u64,
  dst_device: &str,
  edge_name: &str,
  frame_id: u64,
  iter_id: u64,
) -> String {
  format!(
    "{};{:x};{};{};{}:{}",
    src_device, src_incarnation, dst_device, edge_name, frame_id, iter_id
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_round_trips_create_key() {
    let raw = create_key("/job:a/device:CPU:0", 0x1d, "/job:b/device:CPU:0", "edge_7", 2, 5);
    let parsed = ParsedKey::parse(&raw).unwrap();
    assert_eq!(parsed.src_device, "/job:a/device:CPU:0");
    assert_eq!(parsed.src_incarnation, 0x1d);
    assert_eq!(parsed.dst_device, "/job:b/device:CPU:0");
    assert_eq!(parsed.edge_name, "edge_7");
    assert_eq!(parsed.frame_id, 2);
    assert_eq!(parsed.iter_id, 5);
    assert_eq!(parsed.to_string(), raw);
  }

  #[test]
  fn parse_rejects_wrong_field_count() {
    for raw in ["", "a;1;b;x", "a;1;b;x;0:0;extra", "just-a-name"] {
      assert_eq!(
        ParsedKey::parse(raw),
        Err(ExchangeError::MalformedKey(raw.to_string()))
      );
    }
  }

  #[test]
  fn parse_rejects_bad_fields() {
    // Empty device / edge names.
    assert!(ParsedKey::parse(";1;b;x;0:0").is_err());
    assert!(ParsedKey::parse("a;1;;x;0:0").is_err());
    assert!(ParsedKey::parse("a;1;b;;0:0").is_err());
    // Non-hex incarnation.
    assert!(ParsedKey::parse("a;zz;b;x;0:0").is_err());
    // Malformed frame:iter pair.
    assert!(ParsedKey::parse("a;1;b;x;00").is_err());
    assert!(ParsedKey::parse("a;1;b;x;0:y").is_err());
  }

  #[test]
  fn equal_keys_hash_equal() {
    use std::collections::HashMap;
    let raw = create_key("src", 1, "dst", "e", 0, 0);
    let a = ParsedKey::parse(&raw).unwrap();
    let b = ParsedKey::parse(&raw).unwrap();
    let mut table = HashMap::new();
    table.insert(a, 1u32);
    assert_eq!(table.get(&b), Some(&1));
  }
}
