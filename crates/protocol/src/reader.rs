//! Space-delimited field reading and writing.
//!
//! Game frames are a verb followed by space-separated fields. Free text is
//! base64 encoded so it never contains a separator.

use crate::ProtocolError;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use std::fmt::Display;
use std::str::SplitAsciiWhitespace;

/// Encode free text for a frame field.
pub fn encode_text(text: &str) -> String {
    STANDARD.encode(text.as_bytes())
}

/// Decode a base64 text field.
pub fn decode_text(field: &'static str, value: &str) -> Result<String, ProtocolError> {
    let bytes = STANDARD
        .decode(value)
        .map_err(|_| ProtocolError::InvalidText(field))?;
    String::from_utf8(bytes).map_err(|_| ProtocolError::InvalidText(field))
}

/// Sequential reader over the fields of one frame.
pub struct FieldReader<'a> {
    fields: SplitAsciiWhitespace<'a>,
}

impl<'a> FieldReader<'a> {
    pub fn new(frame: &'a str) -> Self {
        Self {
            fields: frame.split_ascii_whitespace(),
        }
    }

    /// Read the next raw field.
    pub fn next_str(&mut self, field: &'static str) -> Result<&'a str, ProtocolError> {
        self.fields.next().ok_or(ProtocolError::MissingField(field))
    }

    pub fn next_u32(&mut self, field: &'static str) -> Result<u32, ProtocolError> {
        self.next_parsed(field)
    }

    pub fn next_i32(&mut self, field: &'static str) -> Result<i32, ProtocolError> {
        self.next_parsed(field)
    }

    pub fn next_u8(&mut self, field: &'static str) -> Result<u8, ProtocolError> {
        self.next_parsed(field)
    }

    /// Read a base64 text field.
    pub fn next_text(&mut self, field: &'static str) -> Result<String, ProtocolError> {
        let raw = self.next_str(field)?;
        decode_text(field, raw)
    }

    /// Ensure every field was consumed.
    pub fn finish(mut self) -> Result<(), ProtocolError> {
        match self.fields.next() {
            Some(_) => Err(ProtocolError::TrailingFields),
            None => Ok(()),
        }
    }

    fn next_parsed<T: std::str::FromStr>(&mut self, field: &'static str) -> Result<T, ProtocolError> {
        let raw = self.next_str(field)?;
        raw.parse().map_err(|_| ProtocolError::InvalidNumber {
            field,
            value: raw.to_string(),
        })
    }
}

/// Builder for an outgoing frame.
#[derive(Debug, Default)]
pub struct FieldWriter {
    buf: String,
}

impl FieldWriter {
    pub fn new(verb: char) -> Self {
        let mut buf = String::with_capacity(32);
        buf.push(verb);
        Self { buf }
    }

    pub fn put<T: Display>(&mut self, value: T) -> &mut Self {
        use std::fmt::Write;
        // Writing into a String cannot fail.
        let _ = write!(self.buf, " {value}");
        self
    }

    pub fn put_text(&mut self, text: &str) -> &mut Self {
        self.buf.push(' ');
        self.buf.push_str(&encode_text(text));
        self
    }

    pub fn finish(&mut self) -> String {
        std::mem::take(&mut self.buf)
    }
}
