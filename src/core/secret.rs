//! Secret document.
//!
//! The decrypted form of a secret: the first line is the password, the rest
//! is the body. A body starting with a `---` line is additionally decoded as
//! a flat YAML map so single keys can be read and written. A broken YAML body
//! never makes the secret unreadable; the decode error is surfaced and the
//! body stays usable as opaque text.

use std::collections::BTreeMap;
use std::fmt;

use serde_yaml::Value;
use tracing::debug;
use zeroize::Zeroize;

use crate::error::{Result, SecretError};

const YAML_MARK: &str = "---";

/// A decoded secret.
#[derive(Clone, Default, PartialEq)]
pub struct Secret {
    password: String,
    body: String,
    data: Option<BTreeMap<String, Value>>,
}

impl Secret {
    /// Create a secret from a password and a body.
    ///
    /// YAML detection runs on the body; a decode failure leaves the body as
    /// plain text.
    pub fn new(password: &str, body: &str) -> Self {
        let mut s = Self {
            password: password.to_string(),
            body: body.to_string(),
            data: None,
        };
        if let Err(e) = s.decode_yaml() {
            debug!(error = %e, "body looks like YAML but failed to decode");
        }
        s
    }

    /// Parse decrypted bytes.
    ///
    /// Always returns a usable secret. The second element carries a YAML
    /// decode error, if any, for the caller to log or ignore.
    pub fn parse(buf: &[u8]) -> (Self, Option<crate::error::Error>) {
        let text = String::from_utf8_lossy(buf);
        let (first, rest) = match text.split_once('\n') {
            Some((first, rest)) => (first, rest),
            None => (text.as_ref(), ""),
        };

        let mut s = if first.trim_end_matches('\r') == YAML_MARK {
            // document without a password line
            Self {
                password: String::new(),
                body: text.to_string(),
                data: None,
            }
        } else {
            Self {
                password: first.trim_end_matches('\r').to_string(),
                body: rest.to_string(),
                data: None,
            }
        };

        let err = s.decode_yaml().err();
        (s, err)
    }

    fn is_yaml_body(body: &str) -> bool {
        body == YAML_MARK || body.starts_with("---\n") || body.starts_with("---\r\n")
    }

    fn decode_yaml(&mut self) -> Result<bool> {
        if !Self::is_yaml_body(&self.body) {
            return Ok(false);
        }

        let value: Value = serde_yaml::from_str(&self.body)?;
        let mut data = BTreeMap::new();
        match value {
            Value::Null => {}
            Value::Mapping(map) => {
                for (k, v) in map {
                    let key = scalar_to_string(&k).ok_or_else(|| {
                        <serde_yaml::Error as serde::de::Error>::custom("non-scalar mapping key")
                    })?;
                    data.insert(key, v);
                }
            }
            _ => {
                return Err(<serde_yaml::Error as serde::de::Error>::custom(
                    "YAML body is not a mapping",
                )
                .into())
            }
        }

        self.data = Some(data);
        Ok(true)
    }

    fn encode_yaml(&mut self) -> Result<()> {
        if let Some(data) = &self.data {
            let mut body = String::from("---\n");
            if !data.is_empty() {
                body.push_str(&serde_yaml::to_string(data)?);
            }
            self.body.zeroize();
            self.body = body;
        }
        Ok(())
    }

    /// The first line.
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Replace the first line.
    pub fn set_password(&mut self, pw: &str) {
        self.password.zeroize();
        self.password = pw.to_string();
    }

    /// Everything after the first line.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Replace the body and re-run YAML detection.
    ///
    /// Any previously decoded data is dropped. On a decode error the new body
    /// is kept as opaque text and the error is returned.
    pub fn set_body(&mut self, body: &str) -> Result<()> {
        self.body.zeroize();
        self.body = body.to_string();
        self.data = None;
        self.decode_yaml().map(|_| ())
    }

    /// Whether the body was decoded as YAML.
    pub fn is_yaml(&self) -> bool {
        self.data.is_some()
    }

    /// Sorted YAML keys (empty for plain bodies).
    pub fn keys(&self) -> Vec<String> {
        self.data
            .as_ref()
            .map(|d| d.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Read a scalar YAML value.
    pub fn value(&self, key: &str) -> Result<String> {
        let data = self.data.as_ref().ok_or(SecretError::YamlNoMarker)?;
        let v = data
            .get(key)
            .ok_or_else(|| SecretError::YamlKeyNotFound(key.to_string()))?;
        scalar_to_string(v).ok_or_else(|| SecretError::YamlValueUnsupported(key.to_string()).into())
    }

    /// Set a YAML value, regenerating the body.
    ///
    /// An empty secret becomes a YAML secret. A non-empty plain body is
    /// rejected.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        if self.data.is_none() && self.body.trim().is_empty() {
            self.data = Some(BTreeMap::new());
        }
        let data = self.data.as_mut().ok_or(SecretError::YamlNoMarker)?;
        data.insert(key.to_string(), Value::String(value.to_string()));
        self.encode_yaml()
    }

    /// Remove a YAML key, regenerating the body.
    pub fn delete_key(&mut self, key: &str) -> Result<()> {
        let data = self.data.as_mut().ok_or(SecretError::YamlNoMarker)?;
        if data.remove(key).is_none() {
            return Err(SecretError::YamlKeyNotFound(key.to_string()).into());
        }
        self.encode_yaml()
    }

    /// Serialize: password line, newline, body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.password.len() + self.body.len() + 1);
        buf.extend_from_slice(self.password.as_bytes());
        buf.push(b'\n');
        buf.extend_from_slice(self.body.as_bytes());
        buf
    }
}

fn scalar_to_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n{}", self.password, self.body)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret")
            .field("password", &"[redacted]")
            .field("body_len", &self.body.len())
            .field("yaml", &self.data.is_some())
            .finish()
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.password.zeroize();
        self.body.zeroize();
    }
}
