//! AMF0 encoder and decoder
//!
//! Reference: AMF0 File Format Specification
//!
//! ```text
//! 0x00 Number      0x01 Boolean     0x02 String      0x03 Object
//! 0x05 Null        0x06 Undefined   0x07 Reference   0x08 ECMA Array
//! 0x09 Object End  0x0A Strict Arr  0x0B Date        0x0C Long String
//! 0x0D Unsupported 0x0F XML         0x10 Typed Obj   0x11 AVM+ (AMF3)
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::value::{AmfObject, AmfValue};
use crate::error::AmfError;

const MARKER_NUMBER: u8 = 0x00;
const MARKER_BOOLEAN: u8 = 0x01;
const MARKER_STRING: u8 = 0x02;
const MARKER_OBJECT: u8 = 0x03;
const MARKER_NULL: u8 = 0x05;
const MARKER_UNDEFINED: u8 = 0x06;
const MARKER_REFERENCE: u8 = 0x07;
const MARKER_ECMA_ARRAY: u8 = 0x08;
const MARKER_OBJECT_END: u8 = 0x09;
const MARKER_STRICT_ARRAY: u8 = 0x0A;
const MARKER_DATE: u8 = 0x0B;
const MARKER_LONG_STRING: u8 = 0x0C;
const MARKER_UNSUPPORTED: u8 = 0x0D;
const MARKER_XML_DOCUMENT: u8 = 0x0F;
const MARKER_TYPED_OBJECT: u8 = 0x10;

const MAX_NESTING_DEPTH: usize = 64;

/// AMF0 decoder
///
/// Holds the reference table for one message; create a fresh decoder (or call
/// [`reset`](Self::reset)) per command.
pub struct Amf0Decoder {
    references: Vec<AmfValue>,
    depth: usize,
}

impl Amf0Decoder {
    pub fn new() -> Self {
        Self {
            references: Vec::new(),
            depth: 0,
        }
    }

    pub fn reset(&mut self) {
        self.references.clear();
        self.depth = 0;
    }

    /// Decode a single value, advancing `buf`
    pub fn decode(&mut self, buf: &mut Bytes) -> Result<AmfValue, AmfError> {
        if buf.is_empty() {
            return Err(AmfError::UnexpectedEof);
        }

        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            self.depth -= 1;
            return Err(AmfError::NestingTooDeep);
        }

        let marker = buf.get_u8();
        let result = self.decode_marker(marker, buf);
        self.depth -= 1;
        result
    }

    /// Decode values until the buffer is exhausted
    pub fn decode_all(&mut self, buf: &mut Bytes) -> Result<Vec<AmfValue>, AmfError> {
        let mut values = Vec::new();
        while buf.has_remaining() {
            values.push(self.decode(buf)?);
        }
        Ok(values)
    }

    fn decode_marker(&mut self, marker: u8, buf: &mut Bytes) -> Result<AmfValue, AmfError> {
        match marker {
            MARKER_NUMBER => {
                need(buf, 8)?;
                Ok(AmfValue::Number(buf.get_f64()))
            }
            MARKER_BOOLEAN => {
                need(buf, 1)?;
                Ok(AmfValue::Boolean(buf.get_u8() != 0))
            }
            MARKER_STRING => Ok(AmfValue::String(read_utf8(buf)?)),
            MARKER_LONG_STRING => Ok(AmfValue::String(read_utf8_long(buf)?)),
            MARKER_OBJECT => {
                let slot = self.reserve_reference();
                let obj = AmfValue::Object(self.read_properties(buf)?);
                self.references[slot] = obj.clone();
                Ok(obj)
            }
            MARKER_NULL => Ok(AmfValue::Null),
            MARKER_UNDEFINED | MARKER_UNSUPPORTED => Ok(AmfValue::Undefined),
            MARKER_REFERENCE => {
                need(buf, 2)?;
                let index = buf.get_u16();
                self.references
                    .get(index as usize)
                    .cloned()
                    .ok_or(AmfError::InvalidReference(index))
            }
            MARKER_ECMA_ARRAY => {
                // Count is only a hint; encoders get it wrong
                need(buf, 4)?;
                let _count = buf.get_u32();
                let slot = self.reserve_reference();
                let arr = AmfValue::EcmaArray(self.read_properties(buf)?);
                self.references[slot] = arr.clone();
                Ok(arr)
            }
            MARKER_STRICT_ARRAY => {
                need(buf, 4)?;
                let count = buf.get_u32() as usize;
                let slot = self.reserve_reference();
                let mut elements = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    elements.push(self.decode(buf)?);
                }
                let arr = AmfValue::Array(elements);
                self.references[slot] = arr.clone();
                Ok(arr)
            }
            MARKER_DATE => {
                need(buf, 10)?;
                let millis = buf.get_f64();
                let _timezone = buf.get_i16();
                Ok(AmfValue::Date(millis))
            }
            MARKER_XML_DOCUMENT => Ok(AmfValue::Xml(read_utf8_long(buf)?)),
            MARKER_TYPED_OBJECT => {
                let class_name = read_utf8(buf)?;
                let slot = self.reserve_reference();
                let properties = self.read_properties(buf)?;
                let obj = AmfValue::TypedObject {
                    class_name,
                    properties,
                };
                self.references[slot] = obj.clone();
                Ok(obj)
            }
            other => Err(AmfError::UnknownMarker(other)),
        }
    }

    fn reserve_reference(&mut self) -> usize {
        self.references.push(AmfValue::Null);
        self.references.len() - 1
    }

    /// Read key/value pairs up to the empty-key + 0x09 terminator
    ///
    /// A buffer that ends right after the empty key is accepted; some
    /// encoders drop the trailing end marker.
    fn read_properties(&mut self, buf: &mut Bytes) -> Result<AmfObject, AmfError> {
        let mut properties = AmfObject::new();
        loop {
            let key = read_utf8(buf)?;
            if key.is_empty() {
                if buf.is_empty() {
                    break;
                }
                if buf.get_u8() != MARKER_OBJECT_END {
                    return Err(AmfError::InvalidObjectEnd);
                }
                break;
            }
            let value = self.decode(buf)?;
            properties.insert(key, value);
        }
        Ok(properties)
    }
}

impl Default for Amf0Decoder {
    fn default() -> Self {
        Self::new()
    }
}

fn need(buf: &Bytes, n: usize) -> Result<(), AmfError> {
    if buf.remaining() < n {
        Err(AmfError::UnexpectedEof)
    } else {
        Ok(())
    }
}

fn read_utf8(buf: &mut Bytes) -> Result<String, AmfError> {
    need(buf, 2)?;
    let len = buf.get_u16() as usize;
    need(buf, len)?;
    String::from_utf8(buf.split_to(len).to_vec()).map_err(|_| AmfError::InvalidUtf8)
}

fn read_utf8_long(buf: &mut Bytes) -> Result<String, AmfError> {
    need(buf, 4)?;
    let len = buf.get_u32() as usize;
    need(buf, len)?;
    String::from_utf8(buf.split_to(len).to_vec()).map_err(|_| AmfError::InvalidUtf8)
}

/// AMF0 encoder
pub struct Amf0Encoder {
    buf: BytesMut,
}

impl Amf0Encoder {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(256),
        }
    }

    /// Take the encoded bytes, leaving the encoder empty
    pub fn finish(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn encode(&mut self, value: &AmfValue) {
        match value {
            AmfValue::Null => self.buf.put_u8(MARKER_NULL),
            AmfValue::Undefined => self.buf.put_u8(MARKER_UNDEFINED),
            AmfValue::Boolean(b) => {
                self.buf.put_u8(MARKER_BOOLEAN);
                self.buf.put_u8(u8::from(*b));
            }
            AmfValue::Number(n) => {
                self.buf.put_u8(MARKER_NUMBER);
                self.buf.put_f64(*n);
            }
            AmfValue::String(s) => {
                if s.len() > u16::MAX as usize {
                    self.buf.put_u8(MARKER_LONG_STRING);
                    self.buf.put_u32(s.len() as u32);
                } else {
                    self.buf.put_u8(MARKER_STRING);
                    self.buf.put_u16(s.len() as u16);
                }
                self.buf.put_slice(s.as_bytes());
            }
            AmfValue::Object(props) => {
                self.buf.put_u8(MARKER_OBJECT);
                self.write_properties(props);
            }
            AmfValue::EcmaArray(props) => {
                self.buf.put_u8(MARKER_ECMA_ARRAY);
                self.buf.put_u32(props.len() as u32);
                self.write_properties(props);
            }
            AmfValue::Array(elements) => {
                self.buf.put_u8(MARKER_STRICT_ARRAY);
                self.buf.put_u32(elements.len() as u32);
                for elem in elements {
                    self.encode(elem);
                }
            }
            AmfValue::Date(millis) => {
                self.buf.put_u8(MARKER_DATE);
                self.buf.put_f64(*millis);
                self.buf.put_i16(0);
            }
            AmfValue::Xml(s) => {
                self.buf.put_u8(MARKER_XML_DOCUMENT);
                self.buf.put_u32(s.len() as u32);
                self.buf.put_slice(s.as_bytes());
            }
            AmfValue::TypedObject {
                class_name,
                properties,
            } => {
                self.buf.put_u8(MARKER_TYPED_OBJECT);
                self.write_key(class_name);
                self.write_properties(properties);
            }
        }
    }

    pub fn encode_all(&mut self, values: &[AmfValue]) {
        for value in values {
            self.encode(value);
        }
    }

    fn write_properties(&mut self, props: &AmfObject) {
        for (key, val) in props.iter() {
            self.write_key(key);
            self.encode(val);
        }
        self.buf.put_u16(0);
        self.buf.put_u8(MARKER_OBJECT_END);
    }

    /// Property keys are short strings without a type marker
    fn write_key(&mut self, s: &str) {
        let len = s.len().min(u16::MAX as usize);
        self.buf.put_u16(len as u16);
        self.buf.put_slice(&s.as_bytes()[..len]);
    }
}

impl Default for Amf0Encoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode a sequence of values into one payload
pub fn encode_all(values: &[AmfValue]) -> Bytes {
    let mut encoder = Amf0Encoder::new();
    encoder.encode_all(values);
    encoder.finish()
}

/// Decode every value in `data`
pub fn decode_all(data: &[u8]) -> Result<Vec<AmfValue>, AmfError> {
    let mut buf = Bytes::copy_from_slice(data);
    Amf0Decoder::new().decode_all(&mut buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_values_roundtrip() {
        let values = vec![
            AmfValue::String("connect".into()),
            AmfValue::Number(1.0),
            AmfValue::Object(
                AmfObject::new()
                    .with("app", "live")
                    .with("fpad", false)
                    .with("capabilities", 15.0),
            ),
            AmfValue::Null,
        ];

        let encoded = encode_all(&values);
        assert_eq!(decode_all(&encoded).unwrap(), values);
    }

    #[test]
    fn test_wire_bytes_for_string_and_number() {
        let encoded = encode_all(&[AmfValue::String("ab".into()), AmfValue::Number(1.0)]);
        assert_eq!(
            &encoded[..],
            &[0x02, 0x00, 0x02, b'a', b'b', 0x00, 0x3F, 0xF0, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_long_string_switches_marker() {
        let long = "x".repeat(70_000);
        let encoded = encode_all(&[AmfValue::String(long.clone())]);
        assert_eq!(encoded[0], MARKER_LONG_STRING);
        assert_eq!(decode_all(&encoded).unwrap(), vec![AmfValue::String(long)]);
    }

    #[test]
    fn test_missing_object_end_is_accepted() {
        // Object with one property, then empty key and no 0x09
        let data = [
            MARKER_OBJECT, 0x00, 0x01, b'k', MARKER_NULL, 0x00, 0x00,
        ];
        let decoded = decode_all(&data).unwrap();
        assert_eq!(decoded[0].get("k"), Some(&AmfValue::Null));
    }

    #[test]
    fn test_reference_resolves_earlier_object() {
        let mut enc = Amf0Encoder::new();
        enc.encode(&AmfValue::Object(AmfObject::new().with("a", 1.0)));
        let mut bytes = BytesMut::from(&enc.finish()[..]);
        bytes.put_u8(MARKER_REFERENCE);
        bytes.put_u16(0);

        let decoded = decode_all(&bytes).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0], decoded[1]);
    }

    #[test]
    fn test_errors() {
        assert_eq!(decode_all(&[MARKER_NUMBER, 0x00]), Err(AmfError::UnexpectedEof));
        assert_eq!(decode_all(&[0x42]), Err(AmfError::UnknownMarker(0x42)));
        assert_eq!(
            decode_all(&[MARKER_REFERENCE, 0x00, 0x05]),
            Err(AmfError::InvalidReference(5))
        );

        let nested: Vec<u8> = std::iter::repeat([MARKER_STRICT_ARRAY, 0, 0, 0, 1])
            .take(MAX_NESTING_DEPTH + 1)
            .flatten()
            .collect();
        assert_eq!(decode_all(&nested), Err(AmfError::NestingTooDeep));
    }
}
