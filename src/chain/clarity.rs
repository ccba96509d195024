//! Clarity Value Decoder
//!
//! Minimal decoder for the hex-encoded Clarity values returned by read-only
//! contract calls on a Stacks node. Covers only the shapes the peg-in flow
//! consumes: unsigned integers, byte buffers, and the optional/response
//! wrappers around them.

use thiserror::Error;

/// Clarity serialization type tags
const TAG_UINT: u8 = 0x01;
const TAG_BUFFER: u8 = 0x02;
const TAG_RESPONSE_OK: u8 = 0x07;
const TAG_RESPONSE_ERR: u8 = 0x08;
const TAG_OPTIONAL_NONE: u8 = 0x09;
const TAG_OPTIONAL_SOME: u8 = 0x0a;

/// Decoder errors
#[derive(Debug, Error)]
pub enum ClarityError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("truncated value: expected {expected} more bytes, have {available}")]
    Truncated { expected: usize, available: usize },

    #[error("unsupported type tag: {0:#04x}")]
    UnsupportedTag(u8),

    #[error("unexpected value shape: expected {0}")]
    UnexpectedShape(&'static str),
}

/// A decoded Clarity value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClarityValue {
    UInt(u128),
    Buffer(Vec<u8>),
    OptionalNone,
    OptionalSome(Box<ClarityValue>),
    ResponseOk(Box<ClarityValue>),
    ResponseErr(Box<ClarityValue>),
}

impl ClarityValue {
    /// Decode a value from a hex string (with or without a `0x` prefix)
    pub fn from_hex(s: &str) -> Result<Self, ClarityError> {
        let stripped = s.trim().trim_start_matches("0x");
        let bytes = hex::decode(stripped).map_err(|e| ClarityError::InvalidHex(e.to_string()))?;
        let (value, rest) = decode(&bytes)?;
        if !rest.is_empty() {
            return Err(ClarityError::UnexpectedShape("single value"));
        }
        Ok(value)
    }

    /// Unwrap `(ok ...)` and `(some ...)` layers down to the inner value.
    ///
    /// `(err ...)` and `none` stop the descent and are returned as-is.
    pub fn unwrap_layers(self) -> ClarityValue {
        match self {
            ClarityValue::ResponseOk(inner) | ClarityValue::OptionalSome(inner) => {
                inner.unwrap_layers()
            }
            other => other,
        }
    }

    /// Interpret the (unwrapped) value as a uint
    pub fn as_uint(self) -> Result<u128, ClarityError> {
        match self.unwrap_layers() {
            ClarityValue::UInt(n) => Ok(n),
            _ => Err(ClarityError::UnexpectedShape("uint")),
        }
    }

    /// Interpret the (unwrapped) value as a buffer
    pub fn as_buffer(self) -> Result<Vec<u8>, ClarityError> {
        match self.unwrap_layers() {
            ClarityValue::Buffer(bytes) => Ok(bytes),
            _ => Err(ClarityError::UnexpectedShape("buffer")),
        }
    }
}

fn take<'a>(bytes: &'a [u8], n: usize) -> Result<(&'a [u8], &'a [u8]), ClarityError> {
    if bytes.len() < n {
        return Err(ClarityError::Truncated {
            expected: n,
            available: bytes.len(),
        });
    }
    Ok(bytes.split_at(n))
}

fn decode(bytes: &[u8]) -> Result<(ClarityValue, &[u8]), ClarityError> {
    let (tag, rest) = take(bytes, 1)?;

    match tag[0] {
        TAG_UINT => {
            let (raw, rest) = take(rest, 16)?;
            let mut buf = [0u8; 16];
            buf.copy_from_slice(raw);
            Ok((ClarityValue::UInt(u128::from_be_bytes(buf)), rest))
        }
        TAG_BUFFER => {
            let (len_raw, rest) = take(rest, 4)?;
            let mut len_buf = [0u8; 4];
            len_buf.copy_from_slice(len_raw);
            let len = u32::from_be_bytes(len_buf) as usize;
            let (data, rest) = take(rest, len)?;
            Ok((ClarityValue::Buffer(data.to_vec()), rest))
        }
        TAG_RESPONSE_OK => {
            let (inner, rest) = decode(rest)?;
            Ok((ClarityValue::ResponseOk(Box::new(inner)), rest))
        }
        TAG_RESPONSE_ERR => {
            let (inner, rest) = decode(rest)?;
            Ok((ClarityValue::ResponseErr(Box::new(inner)), rest))
        }
        TAG_OPTIONAL_NONE => Ok((ClarityValue::OptionalNone, rest)),
        TAG_OPTIONAL_SOME => {
            let (inner, rest) = decode(rest)?;
            Ok((ClarityValue::OptionalSome(Box::new(inner)), rest))
        }
        other => Err(ClarityError::UnsupportedTag(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_uint() {
        // uint 42
        let value = ClarityValue::from_hex("0x010000000000000000000000000000002a").unwrap();
        assert_eq!(value, ClarityValue::UInt(42));
    }

    #[test]
    fn test_decode_buffer() {
        // buff 0xaabbcc
        let value = ClarityValue::from_hex("0200000003aabbcc").unwrap();
        assert_eq!(value, ClarityValue::Buffer(vec![0xaa, 0xbb, 0xcc]));
    }

    #[test]
    fn test_decode_ok_wrapped_uint() {
        // (ok u5)
        let value = ClarityValue::from_hex("0x070100000000000000000000000000000005").unwrap();
        assert_eq!(value.as_uint().unwrap(), 5);
    }

    #[test]
    fn test_decode_some_buffer() {
        // (some 0x0102)
        let value = ClarityValue::from_hex("0x0a02000000020102").unwrap();
        assert_eq!(value.as_buffer().unwrap(), vec![0x01, 0x02]);
    }

    #[test]
    fn test_decode_none() {
        let value = ClarityValue::from_hex("0x09").unwrap();
        assert_eq!(value, ClarityValue::OptionalNone);
        assert!(value.as_buffer().is_err());
    }

    #[test]
    fn test_truncated_and_trailing() {
        assert!(matches!(
            ClarityValue::from_hex("0x01ff"),
            Err(ClarityError::Truncated { .. })
        ));
        // valid uint followed by junk
        assert!(ClarityValue::from_hex("0x0100000000000000000000000000000001ff").is_err());
    }

    #[test]
    fn test_unsupported_tag() {
        assert!(matches!(
            ClarityValue::from_hex("0x0c"),
            Err(ClarityError::UnsupportedTag(0x0c))
        ));
    }
}
