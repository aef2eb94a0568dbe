use std::io::Read;

use crate::writer::{
    MAJOR_ARRAY, MAJOR_BYTES, MAJOR_MAP, MAJOR_NINT, MAJOR_SIMPLE, MAJOR_TEXT, MAJOR_UINT,
    SIMPLE_FALSE, SIMPLE_FLOAT64, SIMPLE_NULL, SIMPLE_TRUE,
};
use crate::{Value, WireError};

/// The kind of the next item in the stream, without consuming it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemType {
    Int,
    Bytes,
    Text,
    Array,
    Map,
    Bool,
    Null,
    Float,
}

impl ItemType {
    fn name(self) -> &'static str {
        match self {
            ItemType::Int => "integer",
            ItemType::Bytes => "byte string",
            ItemType::Text => "text string",
            ItemType::Array => "array",
            ItemType::Map => "map",
            ItemType::Bool => "bool",
            ItemType::Null => "null",
            ItemType::Float => "float",
        }
    }
}

/// Streaming reader for the compact binary encoding.
///
/// Holds a one-byte lookahead so callers can branch on [`Reader::peek_type`]
/// (the protocol marks optional fields with an in-band null) before
/// committing to a typed read.
pub struct Reader<R: Read> {
    inner: R,
    peeked: Option<u8>,
}

impl<R: Read> Reader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            peeked: None,
        }
    }

    fn read_u8(&mut self) -> Result<u8, WireError> {
        if let Some(b) = self.peeked.take() {
            return Ok(b);
        }
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => return Err(WireError::UnexpectedEof),
                Ok(_) => return Ok(byte[0]),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(WireError::Io(e)),
            }
        }
    }

    fn peek_u8(&mut self) -> Result<u8, WireError> {
        if let Some(b) = self.peeked {
            return Ok(b);
        }
        let b = self.read_u8()?;
        self.peeked = Some(b);
        Ok(b)
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<(), WireError> {
        let mut filled = 0;
        if let Some(b) = self.peeked.take() {
            if buf.is_empty() {
                self.peeked = Some(b);
                return Ok(());
            }
            buf[0] = b;
            filled = 1;
        }
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => return Err(WireError::UnexpectedEof),
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(WireError::Io(e)),
            }
        }
        Ok(())
    }

    fn read_arg(&mut self, info: u8) -> Result<u64, WireError> {
        match info {
            0..=23 => Ok(info as u64),
            24 => Ok(self.read_u8()? as u64),
            25 => {
                let mut b = [0u8; 2];
                self.fill(&mut b)?;
                Ok(u16::from_be_bytes(b) as u64)
            }
            26 => {
                let mut b = [0u8; 4];
                self.fill(&mut b)?;
                Ok(u32::from_be_bytes(b) as u64)
            }
            27 => {
                let mut b = [0u8; 8];
                self.fill(&mut b)?;
                Ok(u64::from_be_bytes(b))
            }
            // 28-30 are reserved; 31 marks indefinite lengths, which the
            // protocol never emits.
            _ => Err(WireError::Malformed("unsupported length encoding")),
        }
    }

    fn read_head(&mut self) -> Result<(u8, u64), WireError> {
        let first = self.read_u8()?;
        let arg = self.read_arg(first & 0x1f)?;
        Ok((first >> 5, arg))
    }

    /// Classify the next item without consuming it.
    pub fn peek_type(&mut self) -> Result<ItemType, WireError> {
        let b = self.peek_u8()?;
        match b >> 5 {
            MAJOR_UINT | MAJOR_NINT => Ok(ItemType::Int),
            MAJOR_BYTES => Ok(ItemType::Bytes),
            MAJOR_TEXT => Ok(ItemType::Text),
            MAJOR_ARRAY => Ok(ItemType::Array),
            MAJOR_MAP => Ok(ItemType::Map),
            MAJOR_SIMPLE => match b {
                SIMPLE_TRUE | SIMPLE_FALSE => Ok(ItemType::Bool),
                SIMPLE_NULL => Ok(ItemType::Null),
                SIMPLE_FLOAT64 => Ok(ItemType::Float),
                _ => Err(WireError::Malformed("unsupported simple value")),
            },
            _ => Err(WireError::Malformed("unsupported major type")),
        }
    }

    /// True when the input has no further items.
    pub fn is_at_end(&mut self) -> Result<bool, WireError> {
        if self.peeked.is_some() {
            return Ok(false);
        }
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => return Ok(true),
                Ok(_) => {
                    self.peeked = Some(byte[0]);
                    return Ok(false);
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(WireError::Io(e)),
            }
        }
    }

    fn mismatch(&mut self, expected: &'static str) -> WireError {
        match self.peek_type() {
            Ok(found) => WireError::TypeMismatch {
                expected,
                found: found.name(),
            },
            Err(e) => e,
        }
    }

    /// Read a signed integer.
    pub fn read_int(&mut self) -> Result<i64, WireError> {
        match self.peek_type()? {
            ItemType::Int => {}
            _ => return Err(self.mismatch("integer")),
        }
        let (major, arg) = self.read_head()?;
        if major == MAJOR_UINT {
            i64::try_from(arg).map_err(|_| WireError::IntOverflow)
        } else {
            let magnitude = i64::try_from(arg).map_err(|_| WireError::IntOverflow)?;
            Ok(-1 - magnitude)
        }
    }

    /// Read a UTF-8 text string.
    pub fn read_string(&mut self) -> Result<String, WireError> {
        match self.peek_type()? {
            ItemType::Text => {}
            _ => return Err(self.mismatch("text string")),
        }
        let (_, len) = self.read_head()?;
        let bytes = self.read_payload(len)?;
        String::from_utf8(bytes).map_err(|_| WireError::Malformed("invalid utf-8 in text string"))
    }

    /// Read a byte string.
    pub fn read_bytes(&mut self) -> Result<Vec<u8>, WireError> {
        match self.peek_type()? {
            ItemType::Bytes => {}
            _ => return Err(self.mismatch("byte string")),
        }
        let (_, len) = self.read_head()?;
        self.read_payload(len)
    }

    fn read_payload(&mut self, len: u64) -> Result<Vec<u8>, WireError> {
        let len = usize::try_from(len).map_err(|_| WireError::LengthOverflow)?;
        let mut out = vec![0u8; len];
        self.fill(&mut out)?;
        Ok(out)
    }

    /// Read an array header, returning the announced item count.
    pub fn read_array_header(&mut self) -> Result<usize, WireError> {
        match self.peek_type()? {
            ItemType::Array => {}
            _ => return Err(self.mismatch("array")),
        }
        let (_, len) = self.read_head()?;
        usize::try_from(len).map_err(|_| WireError::LengthOverflow)
    }

    /// Read a map header, returning the announced pair count.
    pub fn read_map_header(&mut self) -> Result<usize, WireError> {
        match self.peek_type()? {
            ItemType::Map => {}
            _ => return Err(self.mismatch("map")),
        }
        let (_, len) = self.read_head()?;
        usize::try_from(len).map_err(|_| WireError::LengthOverflow)
    }

    /// Consume the null marker.
    pub fn read_null(&mut self) -> Result<(), WireError> {
        match self.peek_type()? {
            ItemType::Null => {}
            _ => return Err(self.mismatch("null")),
        }
        self.read_u8()?;
        Ok(())
    }

    pub fn read_bool(&mut self) -> Result<bool, WireError> {
        match self.peek_type()? {
            ItemType::Bool => {}
            _ => return Err(self.mismatch("bool")),
        }
        Ok(self.read_u8()? == SIMPLE_TRUE)
    }

    pub fn read_float(&mut self) -> Result<f64, WireError> {
        match self.peek_type()? {
            ItemType::Float => {}
            _ => return Err(self.mismatch("float")),
        }
        self.read_u8()?;
        let mut b = [0u8; 8];
        self.fill(&mut b)?;
        Ok(f64::from_be_bytes(b))
    }

    /// Read a text string, treating an in-band null as absent.
    pub fn read_nullable_string(&mut self) -> Result<Option<String>, WireError> {
        if self.peek_type()? == ItemType::Null {
            self.read_null()?;
            return Ok(None);
        }
        self.read_string().map(Some)
    }

    /// Read a signed integer, treating an in-band null as absent.
    pub fn read_nullable_int(&mut self) -> Result<Option<i64>, WireError> {
        if self.peek_type()? == ItemType::Null {
            self.read_null()?;
            return Ok(None);
        }
        self.read_int().map(Some)
    }

    /// Read a whole [`Value`] tree.
    pub fn read_value(&mut self) -> Result<Value, WireError> {
        match self.peek_type()? {
            ItemType::Int => Ok(Value::Int(self.read_int()?)),
            ItemType::Bytes => Ok(Value::Bytes(self.read_bytes()?)),
            ItemType::Text => Ok(Value::Text(self.read_string()?)),
            ItemType::Bool => Ok(Value::Bool(self.read_bool()?)),
            ItemType::Float => Ok(Value::Float(self.read_float()?)),
            ItemType::Null => {
                self.read_null()?;
                Ok(Value::Null)
            }
            ItemType::Array => {
                let len = self.read_array_header()?;
                let mut items = Vec::with_capacity(len.min(64));
                for _ in 0..len {
                    items.push(self.read_value()?);
                }
                Ok(Value::List(items))
            }
            ItemType::Map => {
                let len = self.read_map_header()?;
                let mut entries = Vec::with_capacity(len.min(64));
                for _ in 0..len {
                    let k = self.read_value()?;
                    let v = self.read_value()?;
                    entries.push((k, v));
                }
                Ok(Value::Map(entries))
            }
        }
    }

    /// Copy the next item's exact encoded bytes into `out` without
    /// interpreting it, recursing through nested arrays and maps.
    pub fn read_raw_item(&mut self, out: &mut Vec<u8>) -> Result<(), WireError> {
        let first = self.read_u8()?;
        out.push(first);
        let major = first >> 5;
        let info = first & 0x1f;
        let arg = match info {
            0..=23 => info as u64,
            24 => {
                let b = self.read_u8()?;
                out.push(b);
                b as u64
            }
            25 => {
                let mut b = [0u8; 2];
                self.fill(&mut b)?;
                out.extend_from_slice(&b);
                u16::from_be_bytes(b) as u64
            }
            26 => {
                let mut b = [0u8; 4];
                self.fill(&mut b)?;
                out.extend_from_slice(&b);
                u32::from_be_bytes(b) as u64
            }
            27 => {
                let mut b = [0u8; 8];
                self.fill(&mut b)?;
                out.extend_from_slice(&b);
                u64::from_be_bytes(b)
            }
            _ => return Err(WireError::Malformed("unsupported length encoding")),
        };
        match major {
            MAJOR_UINT | MAJOR_NINT => Ok(()),
            MAJOR_BYTES | MAJOR_TEXT => {
                let len = usize::try_from(arg).map_err(|_| WireError::LengthOverflow)?;
                let start = out.len();
                out.resize(start + len, 0);
                self.fill(&mut out[start..])?;
                Ok(())
            }
            MAJOR_ARRAY => {
                for _ in 0..arg {
                    self.read_raw_item(out)?;
                }
                Ok(())
            }
            MAJOR_MAP => {
                for _ in 0..arg {
                    self.read_raw_item(out)?;
                    self.read_raw_item(out)?;
                }
                Ok(())
            }
            MAJOR_SIMPLE => {
                // The argument bytes (bool/null markers, float payloads)
                // were already copied while decoding the head.
                Ok(())
            }
            _ => Err(WireError::Malformed("unsupported major type")),
        }
    }
}
