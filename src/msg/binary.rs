//! Binary message codec
//!
//! A message body is a bare sequence of fields; nested maps and lists
//! reuse the same layout inside their data section.
//!
//! Field layout:
//! ```text
//! [u8 type][u8 name length][u32 data length, big endian]
//! [name bytes][data bytes]
//!
//! 1 - Map     (data is a nested field sequence)
//! 2 - S64     (little endian, trailing zero bytes stripped)
//! 3 - Str     (UTF-8, no terminator)
//! 4 - Bin     (raw bytes)
//! 5 - List    (nested field sequence, member names empty)
//! 6 - Dbl     (IEEE 754 double, 8 bytes big endian)
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::value::{Msg, MsgValue};
use crate::error::MsgError;

// Field type bytes
const TYPE_MAP: u8 = 1;
const TYPE_S64: u8 = 2;
const TYPE_STR: u8 = 3;
const TYPE_BIN: u8 = 4;
const TYPE_LIST: u8 = 5;
const TYPE_DBL: u8 = 6;

/// Fixed part of a field header: type + name length + data length
const FIELD_HEADER_LEN: usize = 6;

/// Maximum nesting depth for maps/lists (prevent stack overflow)
const MAX_NESTING_DEPTH: usize = 64;

/// Binary message decoder
pub struct MsgDecoder {
    /// Current nesting depth
    depth: usize,
}

impl MsgDecoder {
    /// Create a new decoder
    pub fn new() -> Self {
        Self { depth: 0 }
    }

    /// Decode a complete message body, consuming the whole buffer
    pub fn decode(&mut self, buf: &mut Bytes) -> Result<Msg, MsgError> {
        self.depth = 0;
        self.decode_fields(buf)
    }

    fn decode_fields(&mut self, buf: &mut Bytes) -> Result<Msg, MsgError> {
        let mut msg = Msg::new();
        while buf.has_remaining() {
            let (name, value) = self.decode_field(buf)?;
            msg.append(name, value);
        }
        Ok(msg)
    }

    fn decode_field(&mut self, buf: &mut Bytes) -> Result<(String, MsgValue), MsgError> {
        if buf.remaining() < FIELD_HEADER_LEN {
            return Err(MsgError::UnexpectedEof);
        }

        let field_type = buf.get_u8();
        let name_len = buf.get_u8() as usize;
        let data_len = buf.get_u32() as usize;

        if buf.remaining() < name_len + data_len {
            return Err(MsgError::UnexpectedEof);
        }

        let name = String::from_utf8(buf.copy_to_bytes(name_len).to_vec())
            .map_err(|_| MsgError::InvalidUtf8)?;
        let mut data = buf.split_to(data_len);
        let value = self.decode_value(field_type, &mut data)?;

        Ok((name, value))
    }

    fn decode_value(&mut self, field_type: u8, data: &mut Bytes) -> Result<MsgValue, MsgError> {
        match field_type {
            TYPE_MAP => {
                self.descend()?;
                let map = self.decode_fields(data)?;
                self.depth -= 1;
                Ok(MsgValue::Map(map))
            }
            TYPE_S64 => Ok(MsgValue::S64(decode_s64(data))),
            TYPE_STR => {
                let s = String::from_utf8(data.copy_to_bytes(data.remaining()).to_vec())
                    .map_err(|_| MsgError::InvalidUtf8)?;
                Ok(MsgValue::Str(s))
            }
            TYPE_BIN => Ok(MsgValue::Bin(data.copy_to_bytes(data.remaining()))),
            TYPE_LIST => {
                self.descend()?;
                let mut items = Vec::new();
                while data.has_remaining() {
                    // Member names are empty on the wire and discarded
                    let (_, value) = self.decode_field(data)?;
                    items.push(value);
                }
                self.depth -= 1;
                Ok(MsgValue::List(items))
            }
            TYPE_DBL => {
                if data.remaining() != 8 {
                    return Err(MsgError::BadLength {
                        field_type: TYPE_DBL,
                        len: data.remaining(),
                    });
                }
                Ok(MsgValue::Dbl(data.get_f64()))
            }
            t => Err(MsgError::UnknownFieldType(t)),
        }
    }

    fn descend(&mut self) -> Result<(), MsgError> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(MsgError::NestingTooDeep);
        }
        Ok(())
    }
}

impl Default for MsgDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Integers are little endian with trailing zero bytes stripped; the
/// accumulation is unsigned, so only a full 8-byte value can be negative.
fn decode_s64(data: &mut Bytes) -> i64 {
    let mut v: u64 = 0;
    for &b in data.iter().rev() {
        v = (v << 8) | u64::from(b);
    }
    data.advance(data.remaining());
    v as i64
}

/// Binary message encoder
pub struct MsgEncoder {
    buf: BytesMut,
}

impl MsgEncoder {
    /// Create a new encoder
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(256),
        }
    }

    /// Create encoder with specific capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Get the encoded bytes and reset the encoder
    pub fn finish(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    /// Current encoded length
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if the encoder is empty
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Encode a message body
    pub fn encode(&mut self, msg: &Msg) {
        for (name, value) in msg.iter() {
            self.encode_field(name, value);
        }
    }

    fn encode_field(&mut self, name: &str, value: &MsgValue) {
        let (field_type, data) = encode_data(value);
        let name_len = name.len().min(0xFF);

        self.buf.put_u8(field_type);
        self.buf.put_u8(name_len as u8);
        self.buf.put_u32(data.len() as u32);
        self.buf.put_slice(&name.as_bytes()[..name_len]);
        self.buf.put_slice(&data);
    }
}

impl Default for MsgEncoder {
    fn default() -> Self {
        Self::new()
    }
}

fn encode_data(value: &MsgValue) -> (u8, Bytes) {
    match value {
        MsgValue::Map(map) => {
            let mut enc = MsgEncoder::new();
            enc.encode(map);
            (TYPE_MAP, enc.finish())
        }
        MsgValue::S64(v) => (TYPE_S64, encode_s64(*v)),
        MsgValue::Str(s) => (TYPE_STR, Bytes::copy_from_slice(s.as_bytes())),
        MsgValue::Bin(b) => (TYPE_BIN, b.clone()),
        MsgValue::List(items) => {
            let mut enc = MsgEncoder::new();
            for item in items {
                enc.encode_field("", item);
            }
            (TYPE_LIST, enc.finish())
        }
        MsgValue::Dbl(v) => {
            let mut buf = BytesMut::with_capacity(8);
            buf.put_f64(*v);
            (TYPE_DBL, buf.freeze())
        }
    }
}

fn encode_s64(v: i64) -> Bytes {
    let mut u = v as u64;
    let mut buf = BytesMut::with_capacity(8);
    while u != 0 {
        buf.put_u8((u & 0xFF) as u8);
        u >>= 8;
    }
    buf.freeze()
}

/// Convenience function to encode a message body
pub fn encode(msg: &Msg) -> Bytes {
    let mut encoder = MsgEncoder::new();
    encoder.encode(msg);
    encoder.finish()
}

/// Convenience function to decode a message body
pub fn decode(data: Bytes) -> Result<Msg, MsgError> {
    let mut decoder = MsgDecoder::new();
    let mut buf = data;
    decoder.decode(&mut buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_str_roundtrip() {
        let mut msg = Msg::new();
        msg.put_str("method", "hello");

        let decoded = decode(encode(&msg)).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_s64_roundtrip() {
        let mut msg = Msg::new();
        msg.put_s64("zero", 0);
        msg.put_s64("one", 1);
        msg.put_s64("page", 256);
        msg.put_s64("neg", -1);
        msg.put_s64("min", i64::MIN);
        msg.put_s64("max", i64::MAX);

        let decoded = decode(encode(&msg)).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_s64_wire_format() {
        let mut msg = Msg::new();
        msg.put_u32("seq", 1);

        let encoded = encode(&msg);
        // type 2, name length 3, data length 1, "seq", 0x01
        assert_eq!(&encoded[..], &[2, 3, 0, 0, 0, 1, b's', b'e', b'q', 1]);
    }

    #[test]
    fn test_s64_zero_has_empty_data() {
        let mut msg = Msg::new();
        msg.put_s64("n", 0);

        let encoded = encode(&msg);
        assert_eq!(&encoded[..], &[2, 1, 0, 0, 0, 0, b'n']);
    }

    #[test]
    fn test_s64_little_endian() {
        let mut msg = Msg::new();
        msg.put_s64("n", 0x0102);

        let encoded = encode(&msg);
        assert_eq!(&encoded[..], &[2, 1, 0, 0, 0, 2, b'n', 0x02, 0x01]);
    }

    #[test]
    fn test_negative_takes_eight_bytes() {
        let mut msg = Msg::new();
        msg.put_s64("n", -1);

        let encoded = encode(&msg);
        // Header + name + all eight 0xFF bytes
        assert_eq!(encoded.len(), FIELD_HEADER_LEN + 1 + 8);
    }

    #[test]
    fn test_bin_roundtrip() {
        let mut msg = Msg::new();
        msg.put_bin("challenge", Bytes::from(vec![7u8; 32]));

        let decoded = decode(encode(&msg)).unwrap();
        assert_eq!(decoded.get_bin("challenge").map(|b| b.len()), Some(32));
    }

    #[test]
    fn test_dbl_roundtrip() {
        let mut msg = Msg::new();
        msg.put_dbl("rate", 1.5);

        let decoded = decode(encode(&msg)).unwrap();
        assert_eq!(decoded.get("rate"), Some(&MsgValue::Dbl(1.5)));
    }

    #[test]
    fn test_nested_map_roundtrip() {
        let mut inner = Msg::new();
        inner.put_str("adapter", "DVB-T");
        inner.put_str("mux", "578MHz");

        let mut msg = Msg::new();
        msg.put_str("method", "subscriptionStart");
        msg.put_map("sourceinfo", inner);

        let decoded = decode(encode(&msg)).unwrap();
        let source = decoded.get_map("sourceinfo").unwrap();
        assert_eq!(source.get_str("adapter"), Some("DVB-T"));
        assert_eq!(source.get_str("mux"), Some("578MHz"));
    }

    #[test]
    fn test_list_members_are_unnamed() {
        let mut msg = Msg::new();
        msg.put_list("members", vec![MsgValue::S64(3), MsgValue::S64(5)]);

        let encoded = encode(&msg);
        // List header, then two member fields with empty names
        assert_eq!(encoded[0], 5);
        assert_eq!(encoded[1], 7); // "members"
        let body = &encoded[FIELD_HEADER_LEN + 7..];
        assert_eq!(body, &[2, 0, 0, 0, 0, 1, 3, 2, 0, 0, 0, 0, 1, 5]);

        let decoded = decode(encoded).unwrap();
        let members = decoded.get_list("members").unwrap();
        assert_eq!(members[0].as_s64(), Some(3));
        assert_eq!(members[1].as_s64(), Some(5));
    }

    #[test]
    fn test_list_of_maps_roundtrip() {
        let mut stream = Msg::new();
        stream.put_u32("index", 0);
        stream.put_str("type", "H264");

        let mut msg = Msg::new();
        msg.put_list("streams", vec![MsgValue::Map(stream)]);

        let decoded = decode(encode(&msg)).unwrap();
        let streams = decoded.get_list("streams").unwrap();
        assert_eq!(streams[0].as_map().and_then(|m| m.get_str("type")), Some("H264"));
    }

    #[test]
    fn test_field_order_preserved() {
        let mut msg = Msg::new();
        msg.put_str("method", "login");
        msg.put_u32("htspversion", 1);
        msg.put_u32("seq", 2);

        let decoded = decode(encode(&msg)).unwrap();
        let names: Vec<&str> = decoded.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["method", "htspversion", "seq"]);
    }

    #[test]
    fn test_duplicate_names_first_wins() {
        // Hand-built body with two "x" fields
        let mut buf = BytesMut::new();
        for v in [1u8, 2] {
            buf.put_u8(TYPE_S64);
            buf.put_u8(1);
            buf.put_u32(1);
            buf.put_u8(b'x');
            buf.put_u8(v);
        }

        let decoded = decode(buf.freeze()).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded.get_s64("x"), Some(1));
    }

    #[test]
    fn test_empty_message() {
        let msg = Msg::new();
        let encoded = encode(&msg);
        assert!(encoded.is_empty());

        let decoded = decode(encoded).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_decode_truncated_header() {
        let result = decode(Bytes::from_static(&[2, 1, 0]));
        assert!(matches!(result, Err(MsgError::UnexpectedEof)));
    }

    #[test]
    fn test_decode_truncated_data() {
        // Claims 4 data bytes, carries 1
        let result = decode(Bytes::from_static(&[2, 1, 0, 0, 0, 4, b'n', 1]));
        assert!(matches!(result, Err(MsgError::UnexpectedEof)));
    }

    #[test]
    fn test_decode_unknown_field_type() {
        let result = decode(Bytes::from_static(&[9, 1, 0, 0, 0, 0, b'n']));
        assert!(matches!(result, Err(MsgError::UnknownFieldType(9))));
    }

    #[test]
    fn test_decode_bad_dbl_length() {
        let result = decode(Bytes::from_static(&[6, 1, 0, 0, 0, 2, b'n', 0, 0]));
        assert!(matches!(result, Err(MsgError::BadLength { field_type: 6, len: 2 })));
    }

    #[test]
    fn test_nesting_depth_limit() {
        let mut msg = Msg::new();
        msg.put_str("leaf", "deep");
        for _ in 0..70 {
            let mut outer = Msg::new();
            outer.put_map("inner", msg);
            msg = outer;
        }

        let result = decode(encode(&msg));
        assert!(matches!(result, Err(MsgError::NestingTooDeep)));
    }

    #[test]
    fn test_encoder_len_and_empty() {
        let mut encoder = MsgEncoder::new();
        assert!(encoder.is_empty());
        assert_eq!(encoder.len(), 0);

        let mut msg = Msg::new();
        msg.put_u32("seq", 9);
        encoder.encode(&msg);
        assert!(!encoder.is_empty());
        assert!(encoder.len() > 0);
    }

    #[test]
    fn test_encoder_with_capacity() {
        let encoder = MsgEncoder::with_capacity(1024);
        assert!(encoder.is_empty());
    }

    #[test]
    fn test_hello_request_roundtrip() {
        let mut msg = Msg::request("hello");
        msg.put_str("clientname", "htsp-rs");
        msg.put_u32("htspversion", 1);
        msg.put_u32("seq", 1);

        let decoded = decode(encode(&msg)).unwrap();
        assert_eq!(decoded.method(), Some("hello"));
        assert_eq!(decoded.get_str("clientname"), Some("htsp-rs"));
        assert_eq!(decoded.get_u32("htspversion"), Some(1));
        assert_eq!(decoded.get_u32("seq"), Some(1));
    }
}
