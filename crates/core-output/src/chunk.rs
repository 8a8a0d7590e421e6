//! ChunkBuffer: fixed-capacity byte accumulator with UTF-8-aware flushing.
//!
//! Bytes are appended until the buffer is full. A forced flush then emits the
//! longest prefix that does not end inside a multi-byte sequence and moves the
//! incomplete tail to the front, so a character is never sliced across two
//! downstream writes. `finish` emits whatever is left, complete or not.
//!
//! Boundary rule (applied only when the buffer is full):
//! 1. Last byte ASCII: everything is emitted.
//! 2. Otherwise walk back over continuation bytes (`10xxxxxx`) to the lead.
//! 3. The lead announces a length: `110xxxxx` 2, `1110xxxx` 3, `11110xxx` 4.
//! 4. If the bytes from the lead to the end match that length everything is
//!    emitted. Otherwise the bytes before the lead are emitted and the lead
//!    plus its followers are carried.
//!
//! A carry is taken only when the tail is at most [`MAX_CARRY`] bytes and
//! something precedes it. Longer runs can never become a valid character and
//! carrying them could stall the buffer, so they are emitted as they are.
//!
//! Rule 1 looks only at the last byte. A buffer like `a E4 B8 b` (a broken
//! sequence followed by ASCII) is emitted whole.

use tracing::trace;

/// Longest tail that can still be completed: a 4-byte lead plus two followers.
pub const MAX_CARRY: usize = 3;
/// Smallest capacity that can hold a complete 4-byte sequence.
pub const MIN_CAPACITY: usize = 4;

#[inline]
pub(crate) const fn is_continuation(b: u8) -> bool {
    b & 0xC0 == 0x80
}

/// Total sequence length announced by a lead byte; `None` for bytes that
/// cannot start a multi-byte sequence.
#[inline]
pub const fn sequence_len(lead: u8) -> Option<usize> {
    if lead & 0xE0 == 0xC0 {
        Some(2)
    } else if lead & 0xF0 == 0xE0 {
        Some(3)
    } else if lead & 0xF8 == 0xF0 {
        Some(4)
    } else {
        None
    }
}

/// Length of the prefix of a full buffer that may be emitted now. The rest
/// (`buf.len() - split`) is carried to the next flush.
pub fn boundary_split(buf: &[u8]) -> usize {
    let len = buf.len();
    let Some(&last) = buf.last() else {
        return 0;
    };
    if last & 0x80 == 0 {
        return len;
    }

    let mut lead = len - 1;
    while lead > 0 && is_continuation(buf[lead]) {
        lead -= 1;
    }
    if is_continuation(buf[lead]) {
        // Nothing but continuation bytes; no lead to carry.
        return len;
    }

    let remaining = len - lead;
    if sequence_len(buf[lead]) == Some(remaining) {
        return len;
    }
    if remaining > MAX_CARRY || lead == 0 {
        return len;
    }
    lead
}

pub struct ChunkBuffer {
    buf: Box<[u8]>,
    len: usize,
}

impl ChunkBuffer {
    /// Create a buffer of `capacity` bytes, raised to [`MIN_CAPACITY`].
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_CAPACITY);
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes currently held (complete content plus any carried tail).
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Append one byte, flushing through `emit` when the buffer fills up.
    pub fn push<E, F>(&mut self, byte: u8, mut emit: F) -> Result<(), E>
    where
        F: FnMut(&[u8]) -> Result<(), E>,
    {
        self.buf[self.len] = byte;
        self.len += 1;
        if self.len == self.buf.len() {
            self.flush_boundary(&mut emit)?;
        }
        Ok(())
    }

    /// Append `bytes`. Equivalent to pushing them one at a time.
    pub fn extend<E, F>(&mut self, mut bytes: &[u8], mut emit: F) -> Result<(), E>
    where
        F: FnMut(&[u8]) -> Result<(), E>,
    {
        while !bytes.is_empty() {
            let room = self.buf.len() - self.len;
            let take = room.min(bytes.len());
            self.buf[self.len..self.len + take].copy_from_slice(&bytes[..take]);
            self.len += take;
            bytes = &bytes[take..];
            if self.len == self.buf.len() {
                self.flush_boundary(&mut emit)?;
            }
        }
        Ok(())
    }

    fn flush_boundary<E, F>(&mut self, emit: &mut F) -> Result<(), E>
    where
        F: FnMut(&[u8]) -> Result<(), E>,
    {
        let split = boundary_split(&self.buf[..self.len]);
        let carry = self.len - split;
        trace!(target: "output.chunk", emitted = split, carry, "chunk_flush");
        // Occupancy is settled before emitting: after a failed emit only the
        // carry remains.
        self.len = carry;
        let result = if split > 0 { emit(&self.buf[..split]) } else { Ok(()) };
        self.buf.copy_within(split..split + carry, 0);
        result
    }

    /// Emit everything still buffered, complete or not.
    pub fn finish<E, F>(&mut self, mut emit: F) -> Result<(), E>
    where
        F: FnMut(&[u8]) -> Result<(), E>,
    {
        if self.len == 0 {
            return Ok(());
        }
        let len = std::mem::take(&mut self.len);
        trace!(target: "output.chunk", emitted = len, "chunk_finish");
        emit(&self.buf[..len])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn recorder(flushes: &mut Vec<Vec<u8>>) -> impl FnMut(&[u8]) -> Result<(), Infallible> + '_ {
        move |chunk: &[u8]| {
            flushes.push(chunk.to_vec());
            Ok(())
        }
    }

    #[test]
    fn sequence_lengths() {
        assert_eq!(sequence_len(0xC3), Some(2));
        assert_eq!(sequence_len(0xE4), Some(3));
        assert_eq!(sequence_len(0xF0), Some(4));
        assert_eq!(sequence_len(0xFF), None);
        assert_eq!(sequence_len(0xF8), None);
        assert_eq!(sequence_len(b'a'), None);
    }

    #[test]
    fn capacity_is_raised_to_minimum() {
        assert_eq!(ChunkBuffer::with_capacity(0).capacity(), MIN_CAPACITY);
        assert_eq!(ChunkBuffer::with_capacity(1).capacity(), MIN_CAPACITY);
        assert_eq!(ChunkBuffer::with_capacity(256).capacity(), 256);
    }

    #[test]
    fn ascii_tail_flushes_everything() {
        // "héllo" then "!!" reaches capacity 8.
        let mut flushes = Vec::new();
        let mut cb = ChunkBuffer::with_capacity(8);
        for b in [b'h', 0xC3, 0xA9, b'l', b'l', b'o'] {
            cb.push(b, recorder(&mut flushes)).unwrap();
        }
        assert!(flushes.is_empty());
        assert_eq!(cb.len(), 6);
        cb.push(b'!', recorder(&mut flushes)).unwrap();
        assert!(flushes.is_empty());
        cb.push(b'!', recorder(&mut flushes)).unwrap();
        assert_eq!(flushes, vec!["héllo!!".as_bytes().to_vec()]);
        assert_eq!(cb.len(), 0);
    }

    #[test]
    fn complete_three_byte_sequence_at_end() {
        let mut flushes = Vec::new();
        let mut cb = ChunkBuffer::with_capacity(4);
        for b in [b'a', 0xE4, 0xB8, 0xAD] {
            cb.push(b, recorder(&mut flushes)).unwrap();
        }
        assert_eq!(flushes, vec![vec![b'a', 0xE4, 0xB8, 0xAD]]);
        assert!(cb.is_empty());
    }

    #[test]
    fn broken_sequence_before_ascii_flushes_whole_buffer() {
        let mut flushes = Vec::new();
        let mut cb = ChunkBuffer::with_capacity(4);
        for b in [b'a', 0xE4, 0xB8, b'b'] {
            cb.push(b, recorder(&mut flushes)).unwrap();
        }
        assert_eq!(flushes, vec![vec![b'a', 0xE4, 0xB8, b'b']]);
        assert!(cb.is_empty());
    }

    #[test]
    fn truncated_sequence_is_carried() {
        let mut flushes = Vec::new();
        let mut cb = ChunkBuffer::with_capacity(4);
        for b in [b'a', b'b', 0xE4, 0xB8] {
            cb.push(b, recorder(&mut flushes)).unwrap();
        }
        assert_eq!(flushes, vec![b"ab".to_vec()]);
        assert_eq!(cb.as_bytes(), &[0xE4, 0xB8]);
        cb.push(0xAD, recorder(&mut flushes)).unwrap();
        cb.finish(recorder(&mut flushes)).unwrap();
        assert_eq!(flushes, vec![b"ab".to_vec(), "中".as_bytes().to_vec()]);
    }

    #[test]
    fn lone_lead_at_end_is_carried() {
        let mut flushes = Vec::new();
        let mut cb = ChunkBuffer::with_capacity(4);
        cb.extend(&[b'x', b'y', b'z', 0xC3], recorder(&mut flushes)).unwrap();
        assert_eq!(flushes, vec![b"xyz".to_vec()]);
        assert_eq!(cb.as_bytes(), &[0xC3]);
    }

    #[test]
    fn four_byte_emoji_split_across_capacity() {
        let mut flushes = Vec::new();
        let mut cb = ChunkBuffer::with_capacity(5);
        cb.extend("abc🦄d".as_bytes(), recorder(&mut flushes)).unwrap();
        cb.finish(recorder(&mut flushes)).unwrap();
        assert_eq!(flushes, vec![b"abc".to_vec(), "🦄d".as_bytes().to_vec()]);
    }

    #[test]
    fn unmatched_lead_survives_to_finish() {
        let mut flushes = Vec::new();
        let mut cb = ChunkBuffer::with_capacity(4);
        cb.push(0xFF, recorder(&mut flushes)).unwrap();
        assert!(flushes.is_empty());
        cb.finish(recorder(&mut flushes)).unwrap();
        assert_eq!(flushes, vec![vec![0xFF]]);
    }

    #[test]
    fn invalid_lead_at_full_buffer_is_carried_then_emitted() {
        let mut flushes = Vec::new();
        let mut cb = ChunkBuffer::with_capacity(4);
        cb.extend(&[b'a', b'b', b'c', 0xFF], recorder(&mut flushes)).unwrap();
        assert_eq!(flushes, vec![b"abc".to_vec()]);
        cb.finish(recorder(&mut flushes)).unwrap();
        assert_eq!(flushes, vec![b"abc".to_vec(), vec![0xFF]]);
    }

    #[test]
    fn continuation_run_without_lead_flushes_all() {
        let mut flushes = Vec::new();
        let mut cb = ChunkBuffer::with_capacity(4);
        cb.extend(&[0x80, 0x81, 0x82, 0x83], recorder(&mut flushes)).unwrap();
        assert_eq!(flushes, vec![vec![0x80, 0x81, 0x82, 0x83]]);
        assert!(cb.is_empty());
    }

    #[test]
    fn overlong_tail_is_not_carried() {
        // Lead 0xC3 followed by three continuations: never valid, 4 bytes long.
        assert_eq!(boundary_split(&[b'a', 0xC3, 0x80, 0x80, 0x80]), 5);
        // Unmatched run of three after the lead fits the carry limit.
        assert_eq!(boundary_split(&[b'a', b'b', 0xC3, 0x80, 0x80]), 2);
    }

    #[test]
    fn finish_on_empty_emits_nothing() {
        let mut flushes = Vec::new();
        let mut cb = ChunkBuffer::with_capacity(8);
        cb.finish(recorder(&mut flushes)).unwrap();
        assert!(flushes.is_empty());
    }

    #[test]
    fn emit_error_propagates_and_keeps_carry() {
        let mut cb = ChunkBuffer::with_capacity(4);
        let err = cb
            .extend(&[b'a', b'b', 0xE4, 0xB8], |_chunk: &[u8]| Err("sink down"))
            .unwrap_err();
        assert_eq!(err, "sink down");
        assert_eq!(cb.as_bytes(), &[0xE4, 0xB8]);
    }
}
