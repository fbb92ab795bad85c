//! Decoding of the kernel's binary event records.
//!
//! Each record is a fixed [`inotify_event`](crate::linux::inotify_event)
//! header followed by `len` bytes of name, NUL-padded by the kernel.

use crate::error::{Result, WatchError};
use crate::flags::Flags;
use crate::linux::EVENT_HEADER_LEN;
use crate::registry::WatchId;

/// One undecorated kernel record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Kernel watch descriptor (`-1` for queue overflow)
    pub wd: WatchId,
    /// Raw flag bitmask
    pub mask: u32,
    /// Rename correlation cookie, zero when unused
    pub cookie: u32,
    /// Name with trailing padding stripped
    pub name: Vec<u8>,
}

impl RawEvent {
    /// Decoded flag set
    pub fn flags(&self) -> Flags {
        Flags::decode(self.mask)
    }

    /// Serialize the record the way the kernel lays it out, NUL-padding the
    /// name to a multiple of the header size
    pub fn to_bytes(&self) -> Vec<u8> {
        let padded = if self.name.is_empty() {
            0
        } else {
            (self.name.len() + 1).next_multiple_of(EVENT_HEADER_LEN)
        };

        let mut out = Vec::with_capacity(EVENT_HEADER_LEN + padded);
        out.extend_from_slice(&self.wd.to_ne_bytes());
        out.extend_from_slice(&self.mask.to_ne_bytes());
        out.extend_from_slice(&self.cookie.to_ne_bytes());
        out.extend_from_slice(&(padded as u32).to_ne_bytes());
        out.extend_from_slice(&self.name);
        out.resize(EVENT_HEADER_LEN + padded, 0);
        out
    }
}

fn field(buffer: &[u8], at: usize) -> [u8; 4] {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buffer[at..at + 4]);
    bytes
}

/// Decode the record starting at `offset`, returning it and its total length.
///
/// Fails with [`WatchError::TruncatedRecord`] when the buffer ends before the
/// header or the name it declares; the caller should wait for more bytes.
pub fn decode_one(buffer: &[u8], offset: usize) -> Result<(RawEvent, usize)> {
    let available = buffer.len().saturating_sub(offset);
    if available < EVENT_HEADER_LEN {
        return Err(WatchError::TruncatedRecord {
            needed: EVENT_HEADER_LEN,
            available,
        });
    }

    let wd = i32::from_ne_bytes(field(buffer, offset));
    let mask = u32::from_ne_bytes(field(buffer, offset + 4));
    let cookie = u32::from_ne_bytes(field(buffer, offset + 8));
    let len = u32::from_ne_bytes(field(buffer, offset + 12)) as usize;

    let needed = EVENT_HEADER_LEN + len;
    if available < needed {
        return Err(WatchError::TruncatedRecord { needed, available });
    }

    let start = offset + EVENT_HEADER_LEN;
    let mut name = &buffer[start..start + len];
    while let [rest @ .., 0] = name {
        name = rest;
    }

    let event = RawEvent {
        wd,
        mask,
        cookie,
        name: name.to_vec(),
    };
    Ok((event, needed))
}

/// Decode every complete record in `buffer`.
///
/// Returns the records and the number of bytes they span; anything past that
/// is the start of a record still being delivered.
pub fn decode_all(buffer: &[u8]) -> (Vec<RawEvent>, usize) {
    let mut events = Vec::new();
    let mut consumed = 0;

    while buffer.len() - consumed >= EVENT_HEADER_LEN {
        match decode_one(buffer, consumed) {
            Ok((event, len)) => {
                events.push(event);
                consumed += len;
            }
            Err(_) => break,
        }
    }

    (events, consumed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linux::{IN_CREATE, IN_MODIFY, IN_MOVED_FROM};

    fn record(wd: i32, mask: u32, cookie: u32, name: &str) -> RawEvent {
        RawEvent {
            wd,
            mask,
            cookie,
            name: name.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_decode_one_strips_padding() {
        let event = record(3, IN_CREATE, 0, "a.txt");
        let bytes = event.to_bytes();
        assert_eq!(bytes.len(), 2 * EVENT_HEADER_LEN);

        let (decoded, len) = decode_one(&bytes, 0).unwrap();
        assert_eq!(decoded, event);
        assert_eq!(len, bytes.len());
        assert_eq!(decoded.flags(), Flags::CREATE);
    }

    #[test]
    fn test_decode_one_without_name() {
        let bytes = record(1, IN_MODIFY, 0, "").to_bytes();
        assert_eq!(bytes.len(), EVENT_HEADER_LEN);

        let (decoded, len) = decode_one(&bytes, 0).unwrap();
        assert!(decoded.name.is_empty());
        assert_eq!(len, EVENT_HEADER_LEN);
    }

    #[test]
    fn test_decode_one_at_offset() {
        let mut bytes = record(1, IN_MODIFY, 0, "").to_bytes();
        bytes.extend(record(2, IN_MOVED_FROM, 77, "b").to_bytes());

        let (decoded, _) = decode_one(&bytes, EVENT_HEADER_LEN).unwrap();
        assert_eq!(decoded.wd, 2);
        assert_eq!(decoded.cookie, 77);
        assert_eq!(decoded.name, b"b");
    }

    #[test]
    fn test_decode_one_truncated() {
        let bytes = record(1, IN_CREATE, 0, "name").to_bytes();

        match decode_one(&bytes[..10], 0) {
            Err(WatchError::TruncatedRecord { needed, available }) => {
                assert_eq!(needed, EVENT_HEADER_LEN);
                assert_eq!(available, 10);
            }
            other => panic!("unexpected result: {:?}", other),
        }

        match decode_one(&bytes[..bytes.len() - 1], 0) {
            Err(WatchError::TruncatedRecord { needed, available }) => {
                assert_eq!(needed, bytes.len());
                assert_eq!(available, bytes.len() - 1);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_decode_all() {
        let events = vec![
            record(1, IN_CREATE, 0, "a"),
            record(1, IN_MOVED_FROM, 9, "a-longer-name"),
            record(2, IN_MODIFY, 0, ""),
        ];
        let bytes: Vec<u8> = events.iter().flat_map(RawEvent::to_bytes).collect();

        let (decoded, consumed) = decode_all(&bytes);
        assert_eq!(decoded, events);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn test_decode_all_keeps_partial_tail() {
        let events = vec![
            record(1, IN_CREATE, 0, "a"),
            record(1, IN_CREATE, 0, "b"),
            record(1, IN_CREATE, 0, "c"),
        ];
        let bytes: Vec<u8> = events.iter().flat_map(RawEvent::to_bytes).collect();
        let last_len = events[2].to_bytes().len();

        let (decoded, consumed) = decode_all(&bytes[..bytes.len() - 1]);
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[..], events[..2]);
        assert_eq!(consumed, bytes.len() - last_len);
    }

    #[test]
    fn test_decode_all_empty() {
        let (decoded, consumed) = decode_all(&[]);
        assert!(decoded.is_empty());
        assert_eq!(consumed, 0);
    }
}
