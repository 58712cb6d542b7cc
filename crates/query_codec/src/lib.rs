//! Reversible codec between structured state and the opaque token carried in
//! a URL query parameter.
//!
//! Encoding is `JSON -> cipher -> URL-safe base64 (no padding)`. The default
//! [`PassthroughCipher`] performs no transformation at all, so tokens are only
//! obscured from casual inspection. [`SealedCipher`] adds authenticated
//! encryption for deployments that need it.

use std::{fmt, str::FromStr, sync::Arc};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::debug;
use zeroize::Zeroize;

mod sealed;
pub use sealed::SealedCipher;

/// Secret used when configuration does not supply one.
pub const DEFAULT_SECRET: &str = "fallback-secret-key";

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("state could not be serialized to JSON: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("state must serialize to a JSON object, got {kind}")]
    NotAnObject { kind: &'static str },
    #[error("state could not be sealed")]
    Seal,
}

#[derive(Debug, Error)]
#[error("failed to derive query cipher key")]
pub struct KeyDerivationError;

#[derive(Debug, Error)]
#[error("unknown query cipher '{0}', expected 'passthrough' or 'sealed'")]
pub struct UnknownCipher(String);

#[derive(Clone, PartialEq, Eq)]
pub struct QuerySecret(String);

impl QuerySecret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Missing or blank values fall back to [`DEFAULT_SECRET`].
    pub fn from_optional(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if !v.is_empty() => Self::new(v),
            _ => Self::default(),
        }
    }

    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_SECRET
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl Default for QuerySecret {
    fn default() -> Self {
        Self::new(DEFAULT_SECRET)
    }
}

impl fmt::Debug for QuerySecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("QuerySecret(<redacted>)")
    }
}

impl Drop for QuerySecret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CipherKind {
    #[default]
    Passthrough,
    Sealed,
}

impl CipherKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Passthrough => "passthrough",
            Self::Sealed => "sealed",
        }
    }
}

impl FromStr for CipherKind {
    type Err = UnknownCipher;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "passthrough" | "plain" | "" => Ok(Self::Passthrough),
            "sealed" | "aead" => Ok(Self::Sealed),
            other => Err(UnknownCipher(other.to_string())),
        }
    }
}

impl fmt::Display for CipherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct CodecConfig {
    pub secret: QuerySecret,
    pub cipher: CipherKind,
}

/// Byte transform applied between the JSON text and the base64 token.
///
/// `open` must fail closed: tampered, truncated or foreign input yields
/// `None` rather than an error.
pub trait QueryCipher: Send + Sync {
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, EncodeError>;
    fn open(&self, sealed: &[u8]) -> Option<Vec<u8>>;
}

pub struct PassthroughCipher;

impl QueryCipher for PassthroughCipher {
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, EncodeError> {
        Ok(plaintext.to_vec())
    }

    fn open(&self, sealed: &[u8]) -> Option<Vec<u8>> {
        Some(sealed.to_vec())
    }
}

/// Opaque query-string token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone)]
pub struct QueryCodec {
    cipher: Arc<dyn QueryCipher>,
}

impl Default for QueryCodec {
    fn default() -> Self {
        Self::with_cipher(PassthroughCipher)
    }
}

impl fmt::Debug for QueryCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCodec").finish_non_exhaustive()
    }
}

impl QueryCodec {
    pub fn from_config(config: &CodecConfig) -> Result<Self, KeyDerivationError> {
        Ok(match config.cipher {
            CipherKind::Passthrough => Self::with_cipher(PassthroughCipher),
            CipherKind::Sealed => Self::with_cipher(SealedCipher::new(&config.secret)?),
        })
    }

    pub fn with_cipher(cipher: impl QueryCipher + 'static) -> Self {
        Self {
            cipher: Arc::new(cipher),
        }
    }

    /// Serializes `state` and turns it into a token. Deterministic: equal
    /// inputs always yield equal tokens.
    pub fn encode<T>(&self, state: &T) -> Result<Token, EncodeError>
    where
        T: Serialize + ?Sized,
    {
        let value = serde_json::to_value(state)?;
        if !value.is_object() {
            return Err(EncodeError::NotAnObject {
                kind: json_kind(&value),
            });
        }
        let json = serde_json::to_vec(&value)?;
        let sealed = self.cipher.seal(&json)?;
        Ok(Token(URL_SAFE_NO_PAD.encode(sealed)))
    }

    /// Inverts [`QueryCodec::encode`]. Any failure along the way yields `None`
    /// so the caller can fall back to its default state.
    pub fn decode<T>(&self, token: &str) -> Option<T>
    where
        T: DeserializeOwned,
    {
        let token = token.trim().trim_end_matches('=');
        if token.is_empty() {
            return None;
        }
        let bytes = match URL_SAFE_NO_PAD.decode(token) {
            Ok(bytes) => bytes,
            Err(error) => {
                debug!(%error, "query token is not valid base64");
                return None;
            }
        };
        let Some(json) = self.cipher.open(&bytes) else {
            debug!("query token failed to open");
            return None;
        };
        match serde_json::from_slice(&json) {
            Ok(state) => Some(state),
            Err(error) => {
                debug!(%error, "query token did not parse as state");
                None
            }
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

#[cfg(test)]
#[path = "tests/proptests.rs"]
mod proptests;
