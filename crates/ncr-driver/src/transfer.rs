//! Data window transfer
//!
//! Payload moves between the caller's buffer and a window one 32-bit word
//! at a time. Each word's native byte image is what lands in (or comes
//! from) the buffer. A trailing 1–3 byte remainder is handled with one more
//! full-word access:
//!
//! - read: the word is loaded and only its leading bytes are copied out
//! - write: the bytes are packed into a zeroed word before the store
//!
//! Windows are device memory, so every word goes through a register access,
//! never a bulk memory copy.

use crate::barrier::read_barrier;
use crate::error::Result;
use crate::regio::{read_be32, write_be32};
use crate::window::RegisterWindow;
use std::slice::{ChunksExact, ChunksExactMut};

const WORD: usize = 4;

/// Byte order of the words in a window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordOrder {
    /// Big-endian register accessors (NCA data window)
    BigEndian,
    /// Raw loads and stores (APB2SER memory overlay)
    Native,
}

impl WordOrder {
    fn load(self, window: &dyn RegisterWindow, offset: usize) -> Result<u32> {
        match self {
            Self::BigEndian => read_be32(window, offset),
            Self::Native => {
                let value = window.read_u32(offset)?;
                read_barrier();
                Ok(value)
            }
        }
    }

    fn store(self, window: &mut dyn RegisterWindow, offset: usize, value: u32) -> Result<()> {
        match self {
            Self::BigEndian => write_be32(window, offset, value),
            Self::Native => window.write_u32(offset, value),
        }
    }
}

/// Cursor over an outgoing buffer: whole words, then the remainder
#[derive(Debug)]
pub struct WordCursor<'a> {
    words: ChunksExact<'a, u8>,
}

impl<'a> WordCursor<'a> {
    /// Cursor over `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            words: data.chunks_exact(WORD),
        }
    }

    /// Next whole word, as its native-order value.
    pub fn next_word(&mut self) -> Option<u32> {
        self.words
            .next()
            .map(|chunk| u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
    }

    /// Trailing 0–3 bytes packed into a zeroed word, or `None` if there are
    /// none. Only meaningful once `next_word` has returned `None`.
    pub fn remainder_word(&self) -> Option<u32> {
        let tail = self.words.remainder();
        if tail.is_empty() {
            return None;
        }
        let mut bytes = [0u8; WORD];
        bytes[..tail.len()].copy_from_slice(tail);
        Some(u32::from_ne_bytes(bytes))
    }
}

/// Cursor over an incoming buffer: whole words, then the remainder
#[derive(Debug)]
pub struct WordCursorMut<'a> {
    words: ChunksExactMut<'a, u8>,
}

impl<'a> WordCursorMut<'a> {
    /// Cursor over `buffer`.
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self {
            words: buffer.chunks_exact_mut(WORD),
        }
    }

    /// Next whole-word slot.
    pub fn next_word(&mut self) -> Option<&mut [u8]> {
        self.words.next()
    }

    /// Trailing 0–3 bytes.
    pub fn into_remainder(self) -> &'a mut [u8] {
        self.words.into_remainder()
    }
}

/// Fill `buffer` from the window starting at `base`.
///
/// # Errors
///
/// Returns error if a word lies outside the window.
pub fn read_words(
    window: &dyn RegisterWindow,
    base: usize,
    order: WordOrder,
    buffer: &mut [u8],
) -> Result<()> {
    let mut cursor = WordCursorMut::new(buffer);
    let mut offset = base;

    while let Some(slot) = cursor.next_word() {
        slot.copy_from_slice(&order.load(window, offset)?.to_ne_bytes());
        offset += WORD;
    }

    let tail = cursor.into_remainder();
    if !tail.is_empty() {
        let word = order.load(window, offset)?.to_ne_bytes();
        tail.copy_from_slice(&word[..tail.len()]);
    }
    Ok(())
}

/// Copy `data` into the window starting at `base`.
///
/// # Errors
///
/// Returns error if a word lies outside the window.
pub fn write_words(
    window: &mut dyn RegisterWindow,
    base: usize,
    order: WordOrder,
    data: &[u8],
) -> Result<()> {
    let mut cursor = WordCursor::new(data);
    let mut offset = base;

    while let Some(word) = cursor.next_word() {
        order.store(window, offset, word)?;
        offset += WORD;
    }

    if let Some(word) = cursor.remainder_word() {
        order.store(window, offset, word)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::software::MemoryWindow;

    #[test]
    fn cursor_splits_words_and_remainder() {
        let data = [1u8, 2, 3, 4, 5, 6];
        let mut cursor = WordCursor::new(&data);
        assert_eq!(cursor.next_word(), Some(u32::from_ne_bytes([1, 2, 3, 4])));
        assert_eq!(cursor.next_word(), None);
        assert_eq!(cursor.remainder_word(), Some(u32::from_ne_bytes([5, 6, 0, 0])));
    }

    #[test]
    fn cursor_without_remainder() {
        let cursor = WordCursor::new(&[9u8; 8]);
        assert_eq!(cursor.remainder_word(), None);
    }

    #[test]
    fn five_byte_write_is_one_word_plus_padded_word() {
        let mut window = MemoryWindow::new(0x20);
        window.set_bytes(0, &[0xAA; 0x20]);
        write_words(&mut window, 0x8, WordOrder::Native, &[1, 2, 3, 4, 5]).unwrap();
        assert_eq!(window.bytes(0x8, 4), [1, 2, 3, 4]);
        assert_eq!(window.bytes(0xC, 4), [5, 0, 0, 0]);
        assert_eq!(window.bytes(0x10, 4), [0xAA; 4]);
        assert_eq!(window.write_count(), 2);
    }

    #[test]
    fn partial_read_leaves_rest_of_buffer() {
        let mut window = MemoryWindow::new(0x10);
        window.set_bytes(0, &[1, 2, 3, 4, 5, 6, 7, 8]);
        let mut buffer = [0xEEu8; 8];
        read_words(&window, 0, WordOrder::Native, &mut buffer[..5]).unwrap();
        assert_eq!(buffer, [1, 2, 3, 4, 5, 0xEE, 0xEE, 0xEE]);
        assert_eq!(window.read_count(), 2);
    }

    #[test]
    fn big_endian_round_trip() {
        let mut window = MemoryWindow::new(0x20);
        let data = [0x10u8, 0x20, 0x30, 0x40, 0x50, 0x60, 0x70];
        write_words(&mut window, 0, WordOrder::BigEndian, &data).unwrap();
        let mut back = [0u8; 7];
        read_words(&window, 0, WordOrder::BigEndian, &mut back).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn empty_transfer_touches_nothing() {
        let mut window = MemoryWindow::new(0x10);
        write_words(&mut window, 0, WordOrder::BigEndian, &[]).unwrap();
        read_words(&window, 0, WordOrder::BigEndian, &mut []).unwrap();
        assert_eq!(window.read_count() + window.write_count(), 0);
    }
}
