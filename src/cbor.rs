//! CBOR encoding and decoding for COSE structures.
//!
//! Encoding goes through [`Encoder`], which writes into a caller-owned slice
//! or, in [`OutBuf::SizeOnly`] mode, only counts the bytes it would write.
//! Arrays, maps and byte-string wraps are opened and closed with their heads
//! inserted on close, so nothing needs to know item counts or lengths up
//! front. Decoding borrows from the input through `serde_cbor`.

use core::fmt;
use core::ops::{Deref, Range};
use serde::de::{self, Deserialize, Deserializer, Visitor};

/// Maximum depth of open arrays, maps and byte-string wraps.
pub const MAX_NESTING: usize = 15;

/// Number of tags not consumed by this crate that a decode can hand back.
pub const MAX_TAGS_TO_RETURN: usize = 4;

pub(crate) const MAJOR_UINT: u8 = 0;
pub(crate) const MAJOR_NEGINT: u8 = 1;
pub(crate) const MAJOR_BYTES: u8 = 2;
pub(crate) const MAJOR_TEXT: u8 = 3;
pub(crate) const MAJOR_ARRAY: u8 = 4;
pub(crate) const MAJOR_MAP: u8 = 5;
pub(crate) const MAJOR_TAG: u8 = 6;

const SIMPLE_NULL: u8 = 0xF6;

/// Failures of the CBOR layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CborError {
    #[error("output buffer too small")]
    BufferTooSmall,
    #[error("arrays, maps or wraps nested deeper than {}", MAX_NESTING)]
    NestingTooDeep,
    #[error("close does not match the most recently opened item")]
    CloseMismatch,
    #[error("map closed with an odd number of items")]
    OddMapItems,
    #[error("array, map or wrap left open")]
    StillOpen,
    #[error("more tags than can be returned")]
    TooManyTags,
    #[error("input is not well-formed CBOR")]
    NotWellFormed,
}

/// Where an [`Encoder`] puts its output.
#[derive(Debug)]
pub enum OutBuf<'a> {
    /// Count the bytes that would be produced without writing any.
    SizeOnly,
    /// Write into this buffer.
    Write(&'a mut [u8]),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Nest {
    Array,
    Map,
    BstrWrap,
}

#[derive(Clone, Copy, Debug)]
struct Frame {
    nest: Nest,
    start: usize,
    items: u64,
}

const EMPTY_FRAME: Frame = Frame {
    nest: Nest::Array,
    start: 0,
    items: 0,
};

/// Returns the head for `major` with argument `value`, and its length.
pub(crate) fn head(major: u8, value: u64) -> ([u8; 9], usize) {
    let mut out = [0u8; 9];
    let major = major << 5;
    let len = if value < 24 {
        out[0] = major | value as u8;
        1
    } else if value <= u64::from(u8::MAX) {
        out[0] = major | 24;
        out[1] = value as u8;
        2
    } else if value <= u64::from(u16::MAX) {
        out[0] = major | 25;
        out[1..3].copy_from_slice(&(value as u16).to_be_bytes());
        3
    } else if value <= u64::from(u32::MAX) {
        out[0] = major | 26;
        out[1..5].copy_from_slice(&(value as u32).to_be_bytes());
        5
    } else {
        out[0] = major | 27;
        out[1..9].copy_from_slice(&value.to_be_bytes());
        9
    };
    (out, len)
}

/// Incremental CBOR encoder over an [`OutBuf`].
///
/// Errors are latched: after the first one nothing more is written, but
/// lengths keep being accounted so the final size is still known. Check
/// [`Encoder::error_state`] or the result of [`Encoder::finish`].
pub struct Encoder<'a> {
    out: OutBuf<'a>,
    len: usize,
    frames: [Frame; MAX_NESTING],
    depth: usize,
    error: Option<CborError>,
}

impl<'a> Encoder<'a> {
    pub fn new(out: OutBuf<'a>) -> Self {
        Encoder {
            out,
            len: 0,
            frames: [EMPTY_FRAME; MAX_NESTING],
            depth: 0,
            error: None,
        }
    }

    pub fn is_size_only(&self) -> bool {
        matches!(self.out, OutBuf::SizeOnly)
    }

    /// Bytes produced (or accounted for) so far.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn error_state(&self) -> Option<CborError> {
        self.error
    }

    /// The bytes written so far, unless sizing only or an error occurred.
    pub fn written(&self) -> Option<&[u8]> {
        match (&self.out, self.error) {
            (OutBuf::Write(buf), None) => Some(&buf[..self.len]),
            _ => None,
        }
    }

    fn fail(&mut self, error: CborError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    fn count_item(&mut self) {
        if self.depth > 0 {
            self.frames[self.depth - 1].items += 1;
        }
    }

    fn append(&mut self, bytes: &[u8]) {
        let mut overflow = false;
        if let (OutBuf::Write(buf), None) = (&mut self.out, self.error) {
            match buf.get_mut(self.len..self.len + bytes.len()) {
                Some(dst) => dst.copy_from_slice(bytes),
                None => overflow = true,
            }
        }
        if overflow {
            self.fail(CborError::BufferTooSmall);
        }
        self.len += bytes.len();
    }

    fn append_zeros(&mut self, n: usize) {
        let mut overflow = false;
        if let (OutBuf::Write(buf), None) = (&mut self.out, self.error) {
            match buf.get_mut(self.len..self.len + n) {
                Some(dst) => dst.fill(0),
                None => overflow = true,
            }
        }
        if overflow {
            self.fail(CborError::BufferTooSmall);
        }
        self.len += n;
    }

    fn append_head(&mut self, major: u8, value: u64) {
        let (bytes, n) = head(major, value);
        self.append(&bytes[..n]);
    }

    /// Inserts a head at `at`, shifting everything after it. Returns the
    /// head length.
    fn insert_head(&mut self, at: usize, major: u8, value: u64) -> usize {
        let (bytes, n) = head(major, value);
        let mut overflow = false;
        if let (OutBuf::Write(buf), None) = (&mut self.out, self.error) {
            if self.len + n <= buf.len() {
                buf.copy_within(at..self.len, at + n);
                buf[at..at + n].copy_from_slice(&bytes[..n]);
            } else {
                overflow = true;
            }
        }
        if overflow {
            self.fail(CborError::BufferTooSmall);
        }
        self.len += n;
        n
    }

    pub fn add_uint(&mut self, value: u64) {
        self.count_item();
        self.append_head(MAJOR_UINT, value);
    }

    pub fn add_int(&mut self, value: i64) {
        if value >= 0 {
            self.add_uint(value as u64);
        } else {
            self.count_item();
            self.append_head(MAJOR_NEGINT, (-1 - value) as u64);
        }
    }

    pub fn add_text(&mut self, text: &str) {
        self.count_item();
        self.append_head(MAJOR_TEXT, text.len() as u64);
        self.append(text.as_bytes());
    }

    pub fn add_bytes(&mut self, bytes: &[u8]) {
        self.count_item();
        self.append_head(MAJOR_BYTES, bytes.len() as u64);
        self.append(bytes);
    }

    /// Adds only the head of a byte string of `len` bytes. The content is
    /// expected to follow out of band.
    pub fn add_bytes_len_only(&mut self, len: usize) {
        self.count_item();
        self.append_head(MAJOR_BYTES, len as u64);
    }

    /// Adds a zero-filled byte string of `len` bytes, standing in for a tag
    /// or signature during a size-only pass.
    pub fn add_placeholder_bytes(&mut self, len: usize) {
        self.count_item();
        self.append_head(MAJOR_BYTES, len as u64);
        self.append_zeros(len);
    }

    pub fn add_null(&mut self) {
        self.count_item();
        self.append(&[SIMPLE_NULL]);
    }

    /// Tags the next item. Tags are not items themselves.
    pub fn add_tag(&mut self, tag: u64) {
        self.append_head(MAJOR_TAG, tag);
    }

    /// Copies already-encoded bytes in as one item.
    pub fn add_encoded(&mut self, encoded: &[u8]) {
        self.count_item();
        self.append(encoded);
    }

    fn open(&mut self, nest: Nest) {
        self.count_item();
        if self.depth == MAX_NESTING {
            self.fail(CborError::NestingTooDeep);
            return;
        }
        self.frames[self.depth] = Frame {
            nest,
            start: self.len,
            items: 0,
        };
        self.depth += 1;
    }

    fn close(&mut self, nest: Nest) -> Option<Frame> {
        if self.depth == 0 || self.frames[self.depth - 1].nest != nest {
            self.fail(CborError::CloseMismatch);
            return None;
        }
        self.depth -= 1;
        Some(self.frames[self.depth])
    }

    pub fn open_array(&mut self) {
        self.open(Nest::Array);
    }

    pub fn close_array(&mut self) {
        if let Some(frame) = self.close(Nest::Array) {
            self.insert_head(frame.start, MAJOR_ARRAY, frame.items);
        }
    }

    pub fn open_map(&mut self) {
        self.open(Nest::Map);
    }

    pub fn close_map(&mut self) {
        if let Some(frame) = self.close(Nest::Map) {
            if frame.items % 2 != 0 {
                self.fail(CborError::OddMapItems);
            }
            self.insert_head(frame.start, MAJOR_MAP, frame.items / 2);
        }
    }

    /// Starts a byte string whose content is the CBOR added until the
    /// matching [`Encoder::close_bstr_wrap`].
    pub fn open_bstr_wrap(&mut self) {
        self.open(Nest::BstrWrap);
    }

    /// Closes a byte-string wrap. Returns where its content (without the
    /// head) sits in the output. The range stays valid until an enclosing
    /// array or map is closed, which shifts everything after its start.
    pub fn close_bstr_wrap(&mut self) -> Range<usize> {
        match self.close(Nest::BstrWrap) {
            Some(frame) => {
                let content_len = (self.len - frame.start) as u64;
                let n = self.insert_head(frame.start, MAJOR_BYTES, content_len);
                frame.start + n..self.len
            }
            None => self.len..self.len,
        }
    }

    /// Ends encoding, returning the total length.
    pub fn finish(self) -> Result<usize, CborError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        if self.depth != 0 {
            return Err(CborError::StillOpen);
        }
        Ok(self.len)
    }
}

/// Bounded list of CBOR tag numbers, outermost first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TagList<const N: usize> {
    tags: [u64; N],
    len: usize,
}

impl<const N: usize> Default for TagList<N> {
    fn default() -> Self {
        TagList {
            tags: [0; N],
            len: 0,
        }
    }
}

impl<const N: usize> TagList<N> {
    pub fn push(&mut self, tag: u64) -> Result<(), CborError> {
        if self.len == N {
            return Err(CborError::TooManyTags);
        }
        self.tags[self.len] = tag;
        self.len += 1;
        Ok(())
    }

    pub fn get(&self, n: usize) -> Option<u64> {
        self.as_slice().get(n).copied()
    }

    pub fn last(&self) -> Option<u64> {
        self.as_slice().last().copied()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.tags[..self.len]
    }
}

/// Reads the argument of the head at the start of `input`.
/// Returns (major type, argument, head length).
fn read_head(input: &[u8]) -> Result<(u8, u64, usize), CborError> {
    let first = *input.first().ok_or(CborError::NotWellFormed)?;
    let major = first >> 5;
    let info = first & 0x1F;
    let extra = match info {
        0..=23 => return Ok((major, u64::from(info), 1)),
        24 => 1,
        25 => 2,
        26 => 4,
        27 => 8,
        _ => return Err(CborError::NotWellFormed),
    };
    let bytes = input.get(1..1 + extra).ok_or(CborError::NotWellFormed)?;
    let value = bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
    Ok((major, value, 1 + extra))
}

/// Splits the tags in front of an encoded item from the item itself.
/// More than `N` tags is an error.
pub fn split_tags<const N: usize>(input: &[u8]) -> Result<(TagList<N>, &[u8]), CborError> {
    let mut tags = TagList::default();
    let mut rest = input;
    loop {
        let (major, value, n) = read_head(rest)?;
        if major != MAJOR_TAG {
            return Ok((tags, rest));
        }
        tags.push(value)?;
        rest = &rest[n..];
    }
}

/// A definite-length byte string borrowed from the input.
///
/// Text strings are rejected, so a field typed `Bstr` only ever matches
/// major type 2.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bstr<'a>(pub &'a [u8]);

impl Deref for Bstr<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.0
    }
}

impl<'de> Deserialize<'de> for Bstr<'de> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct BstrVisitor;

        impl<'de> Visitor<'de> for BstrVisitor {
            type Value = Bstr<'de>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "a byte string")
            }

            fn visit_borrowed_bytes<E: de::Error>(self, v: &'de [u8]) -> Result<Self::Value, E> {
                Ok(Bstr(v))
            }
        }

        deserializer.deserialize_bytes(BstrVisitor)
    }
}

/// Decodes a single CBOR item that must span all of `bytes`, borrowing
/// strings from it.
pub fn decode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, CborError> {
    // Definite-length strings are borrowed, so no scratch space is needed
    let mut scratch = [0u8; 0];
    serde_cbor::de::from_slice_with_scratch(bytes, &mut scratch).map_err(|e| {
        log::debug!("CBOR decode failed: {}", e);
        CborError::NotWellFormed
    })
}
