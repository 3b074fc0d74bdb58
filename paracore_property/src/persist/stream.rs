// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Side-file stream codec.
//!
//! Side files carry bulk data next to the main document stream. The same
//! logical sequence of values can be encoded in two forms:
//!
//! - **Binary**: fixed-width little-endian numbers; strings are a `u32` byte
//!   length followed by the bytes.
//! - **Text**: one number per line; strings are `<line count>:` followed by the
//!   text and a terminating newline. Line endings are normalized to `\n` on
//!   both sides, a lone `\r` is preserved.

use crate::error::PersistError;

/// Writes values into a side-file buffer.
#[derive(Debug)]
pub struct OutputStream<'a> {
    out: &'a mut Vec<u8>,
    binary: bool,
}

impl<'a> OutputStream<'a> {
    /// Creates a stream appending to `out`.
    pub fn new(out: &'a mut Vec<u8>, binary: bool) -> Self {
        Self { out, binary }
    }

    /// Returns `true` for the binary encoding.
    #[must_use]
    pub fn is_binary(&self) -> bool {
        self.binary
    }

    /// Writes an unsigned 32-bit integer.
    pub fn write_u32(&mut self, value: u32) {
        if self.binary {
            self.out.extend_from_slice(&value.to_le_bytes());
        } else {
            self.write_token(&value.to_string());
        }
    }

    /// Writes a signed 64-bit integer.
    pub fn write_i64(&mut self, value: i64) {
        if self.binary {
            self.out.extend_from_slice(&value.to_le_bytes());
        } else {
            self.write_token(&value.to_string());
        }
    }

    /// Writes a 64-bit float.
    ///
    /// The text form uses the shortest representation that round-trips.
    pub fn write_f64(&mut self, value: f64) {
        if self.binary {
            self.out.extend_from_slice(&value.to_le_bytes());
        } else {
            self.write_token(&format!("{value:?}"));
        }
    }

    /// Writes a boolean as a single byte or `0`/`1` token.
    pub fn write_bool(&mut self, value: bool) {
        if self.binary {
            self.out.push(u8::from(value));
        } else {
            self.write_token(if value { "1" } else { "0" });
        }
    }

    /// Writes a string.
    pub fn write_str(&mut self, value: &str) {
        if self.binary {
            let len = u32::try_from(value.len()).unwrap_or(u32::MAX);
            self.write_u32(len);
            self.out.extend_from_slice(&value.as_bytes()[..len as usize]);
            return;
        }

        // The line count lets the reader find the end even if an external
        // tool rewrote the line endings.
        let count = value.bytes().filter(|&b| b == b'\n').count();
        self.out.extend_from_slice(count.to_string().as_bytes());
        self.out.push(b':');

        let mut chars = value.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\r' {
                match chars.peek() {
                    Some('\n') => continue,
                    Some(_) => {}
                    None => break,
                }
            }
            let mut buf = [0_u8; 4];
            self.out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
        }
        self.out.push(b'\n');
    }

    /// Writes bytes as they are, in either encoding.
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.out.extend_from_slice(bytes);
    }

    fn write_token(&mut self, token: &str) {
        self.out.extend_from_slice(token.as_bytes());
        self.out.push(b'\n');
    }
}

/// Reads values from a side-file buffer.
#[derive(Debug)]
pub struct InputStream<'a> {
    data: &'a [u8],
    pos: usize,
    binary: bool,
}

impl<'a> InputStream<'a> {
    /// Creates a stream over `data`.
    pub fn new(data: &'a [u8], binary: bool) -> Self {
        Self {
            data,
            pos: 0,
            binary,
        }
    }

    /// Returns `true` for the binary encoding.
    #[must_use]
    pub fn is_binary(&self) -> bool {
        self.binary
    }

    /// Reads an unsigned 32-bit integer.
    pub fn read_u32(&mut self) -> Result<u32, PersistError> {
        if self.binary {
            Ok(u32::from_le_bytes(self.take_array("u32")?))
        } else {
            parse_token(self.next_token("u32")?)
        }
    }

    /// Reads a signed 64-bit integer.
    pub fn read_i64(&mut self) -> Result<i64, PersistError> {
        if self.binary {
            Ok(i64::from_le_bytes(self.take_array("i64")?))
        } else {
            parse_token(self.next_token("i64")?)
        }
    }

    /// Reads a 64-bit float.
    pub fn read_f64(&mut self) -> Result<f64, PersistError> {
        if self.binary {
            Ok(f64::from_le_bytes(self.take_array("f64")?))
        } else {
            parse_token(self.next_token("f64")?)
        }
    }

    /// Reads a boolean.
    pub fn read_bool(&mut self) -> Result<bool, PersistError> {
        if self.binary {
            let [b] = self.take_array::<1>("bool")?;
            Ok(b != 0)
        } else {
            Ok(self.next_token("bool")? != "0")
        }
    }

    /// Reads a string.
    pub fn read_string(&mut self) -> Result<String, PersistError> {
        if self.binary {
            let len = self.read_u32()? as usize;
            let bytes = self.take(len, "string")?;
            return String::from_utf8(bytes.to_vec()).map_err(|_| PersistError::InvalidText);
        }

        self.skip_whitespace();
        let colon = self.data[self.pos..]
            .iter()
            .position(|&b| b == b':')
            .ok_or(PersistError::Truncated("string header"))?;
        let header = core::str::from_utf8(&self.data[self.pos..self.pos + colon])
            .map_err(|_| PersistError::InvalidText)?;
        let lines: u32 = parse_token(header)?;
        self.pos += colon + 1;

        let mut out = Vec::new();
        let mut remaining = lines;
        // Each embedded line ends with '\n'; the final line ends with the
        // delimiter newline, which is not part of the value.
        while let Some(&b) = self.data.get(self.pos) {
            self.pos += 1;
            if b == b'\r' {
                match self.data.get(self.pos) {
                    Some(b'\n') => {
                        self.pos += 1;
                        if remaining == 0 {
                            break;
                        }
                        remaining -= 1;
                        out.push(b'\n');
                        continue;
                    }
                    _ => {
                        out.push(b'\r');
                        continue;
                    }
                }
            }
            if b == b'\n' {
                if remaining == 0 {
                    break;
                }
                remaining -= 1;
            }
            out.push(b);
        }
        String::from_utf8(out).map_err(|_| PersistError::InvalidText)
    }

    /// Returns everything not read yet.
    pub fn read_to_end(&mut self) -> &'a [u8] {
        let rest = &self.data[self.pos..];
        self.pos = self.data.len();
        rest
    }

    fn take(&mut self, len: usize, what: &'static str) -> Result<&'a [u8], PersistError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(PersistError::Truncated(what))?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self, what: &'static str) -> Result<[u8; N], PersistError> {
        let bytes = self.take(N, what)?;
        let mut out = [0_u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn skip_whitespace(&mut self) {
        while self
            .data
            .get(self.pos)
            .is_some_and(|b| b.is_ascii_whitespace())
        {
            self.pos += 1;
        }
    }

    fn next_token(&mut self, what: &'static str) -> Result<&'a str, PersistError> {
        self.skip_whitespace();
        let start = self.pos;
        while self
            .data
            .get(self.pos)
            .is_some_and(|b| !b.is_ascii_whitespace())
        {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(PersistError::Truncated(what));
        }
        core::str::from_utf8(&self.data[start..self.pos]).map_err(|_| PersistError::InvalidText)
    }
}

fn parse_token<T: core::str::FromStr>(token: &str) -> Result<T, PersistError> {
    token
        .parse()
        .map_err(|_| PersistError::InvalidNumber(token.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(binary: bool) {
        let mut buf = Vec::new();
        let mut out = OutputStream::new(&mut buf, binary);
        out.write_u32(3);
        out.write_i64(-42);
        out.write_f64(0.1);
        out.write_bool(true);
        out.write_str("two\nlines");
        out.write_str("");
        out.write_u32(7);

        let mut input = InputStream::new(&buf, binary);
        assert_eq!(input.read_u32().unwrap(), 3);
        assert_eq!(input.read_i64().unwrap(), -42);
        assert_eq!(input.read_f64().unwrap(), 0.1);
        assert!(input.read_bool().unwrap());
        assert_eq!(input.read_string().unwrap(), "two\nlines");
        assert_eq!(input.read_string().unwrap(), "");
        assert_eq!(input.read_u32().unwrap(), 7);
    }

    #[test]
    fn binary_stream_round_trip() {
        round_trip(true);
    }

    #[test]
    fn text_stream_round_trip() {
        round_trip(false);
    }

    #[test]
    fn text_strings_survive_crlf_rewrite() {
        let mut buf = Vec::new();
        OutputStream::new(&mut buf, false).write_str("a\nb");
        let rewritten: Vec<u8> = String::from_utf8(buf)
            .unwrap()
            .replace('\n', "\r\n")
            .into_bytes();
        let mut input = InputStream::new(&rewritten, false);
        assert_eq!(input.read_string().unwrap(), "a\nb");
    }

    #[test]
    fn text_string_header_counts_lines() {
        let mut buf = Vec::new();
        OutputStream::new(&mut buf, false).write_str("x\ny\nz");
        assert!(buf.starts_with(b"2:x\n"));
    }

    #[test]
    fn truncated_binary_is_an_error() {
        let data = [1_u8, 0];
        let mut input = InputStream::new(&data, true);
        assert_eq!(input.read_u32(), Err(PersistError::Truncated("u32")));
    }
}
