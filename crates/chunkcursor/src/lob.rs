//! Large text values.

use std::fmt;
use std::io;

use crate::error::{CursorError, Result};

/// Byte encoding for [`LargeTextHandle::byte_stream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    #[default]
    Utf8,
    Utf16Be,
    /// Non-ASCII characters become `?`.
    Ascii,
}

/// A materialized large text value with stream-style access.
///
/// Lengths and positions count characters, not bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LargeTextHandle {
    value: String,
    length: usize,
}

impl LargeTextHandle {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        let length = value.chars().count();
        Self { value, length }
    }

    /// Length in characters.
    #[must_use]
    pub const fn length(&self) -> usize {
        self.length
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Sequential character reader over the current value.
    #[must_use]
    pub fn character_stream(&self) -> CharacterStream {
        CharacterStream {
            chars: self.value.chars().collect(),
            position: 0,
        }
    }

    /// Encoded bytes of the current value.
    #[must_use]
    pub fn byte_stream(&self, encoding: TextEncoding) -> io::Cursor<Vec<u8>> {
        let bytes = match encoding {
            TextEncoding::Utf8 => self.value.as_bytes().to_vec(),
            TextEncoding::Utf16Be => self
                .value
                .encode_utf16()
                .flat_map(u16::to_be_bytes)
                .collect(),
            TextEncoding::Ascii => self
                .value
                .chars()
                .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                .collect(),
        };
        io::Cursor::new(bytes)
    }

    /// Up to `len` characters starting at 1-based `position`.
    pub fn substring(&self, position: usize, len: usize) -> Result<String> {
        if position == 0 || position > self.length + 1 {
            return Err(CursorError::invalid_argument(format!(
                "substring position {position} outside [1, {}]",
                self.length + 1
            )));
        }
        Ok(self.value.chars().skip(position - 1).take(len).collect())
    }

    /// Keep only the first `len` characters.
    pub fn truncate(&mut self, len: usize) -> Result<()> {
        if len > self.length {
            return Err(CursorError::invalid_argument(format!(
                "cannot truncate text of length {} to {len}",
                self.length
            )));
        }
        let byte_end = self
            .value
            .char_indices()
            .nth(len)
            .map_or(self.value.len(), |(i, _)| i);
        self.value.truncate(byte_end);
        self.length = len;
        Ok(())
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.value
    }
}

impl fmt::Display for LargeTextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Character reader returned by [`LargeTextHandle::character_stream`].
#[derive(Debug, Clone)]
pub struct CharacterStream {
    chars: Vec<char>,
    position: usize,
}

impl CharacterStream {
    /// Fill `buf` with the next characters and return how many were read.
    ///
    /// Returns 0 once the stream is exhausted.
    pub fn read(&mut self, buf: &mut [char]) -> usize {
        let remaining = &self.chars[self.position..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.position += n;
        n
    }

    /// Characters not yet read.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.chars.len() - self.position
    }

    /// Read everything that is left.
    pub fn read_to_string(&mut self) -> String {
        let rest: String = self.chars[self.position..].iter().collect();
        self.position = self.chars.len();
        rest
    }
}

impl Iterator for CharacterStream {
    type Item = char;

    fn next(&mut self) -> Option<char> {
        let c = self.chars.get(self.position).copied()?;
        self.position += 1;
        Some(c)
    }
}
