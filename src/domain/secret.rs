//! Secret payloads.
//!
//! A [`Secret`] is the opaque mapping of string keys to string or byte values
//! returned to a caller. Values are wrapped so they never show up in `Debug`
//! output, log fields, or accidental serialization; the only way out is the
//! explicit [`Secret::into_response_data`] call made when building a response.

use std::collections::BTreeMap;
use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A string wrapper that redacts its contents in Debug, Display, and serialization.
///
/// Memory is zeroed when the value is dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretString(String);

impl Serialize for SecretString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // Never serialize the actual secret value
        serializer.serialize_str("[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(SecretString(value))
    }
}

impl SecretString {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Exposes the underlying secret value. Never log the result.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretString([REDACTED])")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SecretString {}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A single secret value
#[derive(Clone, PartialEq, Eq)]
pub enum SecretValue {
    Text(SecretString),
    Bytes(Vec<u8>),
}

impl SecretValue {
    /// Wire form: text as-is, bytes as standard base64
    fn expose(&self) -> Value {
        match self {
            SecretValue::Text(s) => Value::String(s.expose_secret().to_string()),
            SecretValue::Bytes(b) => Value::String(BASE64.encode(b)),
        }
    }
}

impl Drop for SecretValue {
    fn drop(&mut self) {
        if let SecretValue::Bytes(bytes) = self {
            bytes.zeroize();
        }
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretValue::Text(_) => write!(f, "Text([REDACTED])"),
            SecretValue::Bytes(b) => write!(f, "Bytes([REDACTED; {}])", b.len()),
        }
    }
}

/// Opaque secret payload returned to a caller
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret {
    values: BTreeMap<String, SecretValue>,
}

impl Secret {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text<K: Into<String>, V: Into<SecretString>>(mut self, key: K, value: V) -> Self {
        self.values.insert(key.into(), SecretValue::Text(value.into()));
        self
    }

    pub fn with_bytes<K: Into<String>>(mut self, key: K, value: Vec<u8>) -> Self {
        self.values.insert(key.into(), SecretValue::Bytes(value));
        self
    }

    pub fn get(&self, key: &str) -> Option<&SecretValue> {
        self.values.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Expose every value for the response body.
    ///
    /// This is the only place secret material leaves its wrapper.
    pub fn into_response_data(self) -> Map<String, Value> {
        self.values.iter().map(|(k, v)| (k.clone(), v.expose())).collect()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret").field("keys", &self.values.keys().collect::<Vec<_>>()).finish()
    }
}
