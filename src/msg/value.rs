//! Message value types
//!
//! Every frame on the wire is a map of named fields. Fields keep their
//! insertion order, names may repeat (first occurrence wins on lookup),
//! and values are one of the six wire types.

use bytes::Bytes;

/// A single field value
#[derive(Debug, Clone, PartialEq)]
pub enum MsgValue {
    /// Nested field map (wire type 1)
    Map(Msg),

    /// Signed 64-bit integer (wire type 2)
    S64(i64),

    /// UTF-8 string (wire type 3)
    Str(String),

    /// Raw binary blob (wire type 4)
    Bin(Bytes),

    /// Ordered list of unnamed values (wire type 5)
    List(Vec<MsgValue>),

    /// IEEE 754 double (wire type 6)
    Dbl(f64),
}

impl MsgValue {
    /// Try to get this value as a string reference
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MsgValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as a signed integer
    pub fn as_s64(&self) -> Option<i64> {
        match self {
            MsgValue::S64(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get this value as a double
    pub fn as_dbl(&self) -> Option<f64> {
        match self {
            MsgValue::Dbl(v) => Some(*v),
            MsgValue::S64(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Try to get this value as a binary blob
    pub fn as_bin(&self) -> Option<&Bytes> {
        match self {
            MsgValue::Bin(b) => Some(b),
            _ => None,
        }
    }

    /// Try to get this value as a nested map
    pub fn as_map(&self) -> Option<&Msg> {
        match self {
            MsgValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Try to get this value as a list slice
    pub fn as_list(&self) -> Option<&[MsgValue]> {
        match self {
            MsgValue::List(l) => Some(l),
            _ => None,
        }
    }
}

impl From<i64> for MsgValue {
    fn from(v: i64) -> Self {
        MsgValue::S64(v)
    }
}

impl From<u32> for MsgValue {
    fn from(v: u32) -> Self {
        MsgValue::S64(v as i64)
    }
}

impl From<f64> for MsgValue {
    fn from(v: f64) -> Self {
        MsgValue::Dbl(v)
    }
}

impl From<String> for MsgValue {
    fn from(v: String) -> Self {
        MsgValue::Str(v)
    }
}

impl From<&str> for MsgValue {
    fn from(v: &str) -> Self {
        MsgValue::Str(v.to_string())
    }
}

impl From<Bytes> for MsgValue {
    fn from(v: Bytes) -> Self {
        MsgValue::Bin(v)
    }
}

impl From<Msg> for MsgValue {
    fn from(v: Msg) -> Self {
        MsgValue::Map(v)
    }
}

impl<V: Into<MsgValue>> From<Vec<V>> for MsgValue {
    fn from(v: Vec<V>) -> Self {
        MsgValue::List(v.into_iter().map(|x| x.into()).collect())
    }
}

/// An ordered map of named fields
///
/// Both requests and replies are `Msg` values; so are nested maps and the
/// members of the `streams` and `events` lists. Lookup is a linear scan,
/// which is the right trade for the handful of fields a message carries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Msg {
    fields: Vec<(String, MsgValue)>,
}

impl Msg {
    /// Create an empty message
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Create a request message with its `method` field set
    pub fn request(method: &str) -> Self {
        let mut msg = Self::new();
        msg.put_str("method", method);
        msg
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the message has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over fields in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MsgValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Look up a field by name (first match wins)
    pub fn get(&self, name: &str) -> Option<&MsgValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Remove a field by name, if present
    pub fn remove(&mut self, name: &str) {
        self.fields.retain(|(n, _)| n != name);
    }

    /// Set a field, replacing any existing field with the same name
    pub fn put(&mut self, name: &str, value: MsgValue) {
        self.remove(name);
        self.fields.push((name.to_string(), value));
    }

    /// Append a field without replacing duplicates
    ///
    /// The decoder uses this to preserve the wire exactly; [`Msg::put`] is
    /// the right call everywhere else.
    pub fn append(&mut self, name: String, value: MsgValue) {
        self.fields.push((name, value));
    }

    /// Set a string field
    pub fn put_str(&mut self, name: &str, value: &str) {
        self.put(name, MsgValue::Str(value.to_string()));
    }

    /// Set a signed integer field
    pub fn put_s64(&mut self, name: &str, value: i64) {
        self.put(name, MsgValue::S64(value));
    }

    /// Set an unsigned 32-bit field (stored as S64 on the wire)
    pub fn put_u32(&mut self, name: &str, value: u32) {
        self.put(name, MsgValue::S64(value as i64));
    }

    /// Set a binary field
    pub fn put_bin(&mut self, name: &str, value: Bytes) {
        self.put(name, MsgValue::Bin(value));
    }

    /// Set a nested map field
    pub fn put_map(&mut self, name: &str, value: Msg) {
        self.put(name, MsgValue::Map(value));
    }

    /// Set a list field
    pub fn put_list(&mut self, name: &str, value: Vec<MsgValue>) {
        self.put(name, MsgValue::List(value));
    }

    /// Set a double field
    pub fn put_dbl(&mut self, name: &str, value: f64) {
        self.put(name, MsgValue::Dbl(value));
    }

    /// Get a string field
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name)?.as_str()
    }

    /// Get a signed integer field
    pub fn get_s64(&self, name: &str) -> Option<i64> {
        self.get(name)?.as_s64()
    }

    /// Get an unsigned 32-bit field; out-of-range integers are rejected
    pub fn get_u32(&self, name: &str) -> Option<u32> {
        u32::try_from(self.get_s64(name)?).ok()
    }

    /// Get a binary field
    pub fn get_bin(&self, name: &str) -> Option<&Bytes> {
        self.get(name)?.as_bin()
    }

    /// Get a nested map field
    pub fn get_map(&self, name: &str) -> Option<&Msg> {
        self.get(name)?.as_map()
    }

    /// Get a list field
    pub fn get_list(&self, name: &str) -> Option<&[MsgValue]> {
        self.get(name)?.as_list()
    }

    /// The `method` field, present on requests and unsolicited messages
    pub fn method(&self) -> Option<&str> {
        self.get_str("method")
    }

    /// The server-reported `error` field, present on failed replies
    pub fn error_text(&self) -> Option<&str> {
        self.get_str("error")
    }
}
