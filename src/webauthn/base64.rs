// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use base64::{
    self,
    alphabet,
    engine::{general_purpose, DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};
use serde::{
    de::{self, Deserialize, Visitor},
    ser::{Serialize, Serializer},
};

use super::errors::Error;

/// base64url that accepts input with or without trailing padding.  Browsers
/// strip it, some native clients don't.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// decodes bytes from a base64url-encoded string
pub fn decode_str(v: &str) -> Result<Vec<u8>, Error> {
    URL_SAFE_LENIENT
        .decode(v)
        .map_err(|e| Error::MalformedEncoding(format!("base64url: {e}")))
}

/// encodes bytes as unpadded base64url
pub fn encode(v: &[u8]) -> String {
    general_purpose::URL_SAFE_NO_PAD.encode(v)
}

/// decodes bytes from a standard (RFC 4648 §4) base64 string, as used in
/// JOSE `x5c` headers and SafetyNet nonces
pub fn decode_std(v: &str) -> Result<Vec<u8>, Error> {
    general_purpose::STANDARD
        .decode(v)
        .map_err(|e| Error::MalformedEncoding(format!("base64: {e}")))
}

/// encodes bytes as standard, padded base64
pub fn encode_std(v: &[u8]) -> String {
    general_purpose::STANDARD.encode(v)
}

/// a `Vec<u8>` encoded as base64url in human readable serialization
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Bytes(Vec<u8>);

impl Bytes {
    pub fn new() -> Self {
        Bytes(Vec::new())
    }

    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl Default for Bytes {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&[u8]> for Bytes {
    fn from(v: &[u8]) -> Self {
        Self(v.to_owned())
    }
}

impl From<Vec<u8>> for Bytes {
    fn from(v: Vec<u8>) -> Self {
        Self(v)
    }
}

impl AsRef<[u8]> for Bytes {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl TryFrom<&str> for Bytes {
    type Error = Error;

    fn try_from(v: &str) -> Result<Self, Error> {
        decode_str(v).map(Bytes)
    }
}

impl Serialize for Bytes {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if serializer.is_human_readable() {
            serializer.collect_str(&base64::display::Base64Display::new(
                &self.0,
                &general_purpose::URL_SAFE_NO_PAD,
            ))
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Bytes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_any(BytesVisitor {})
    }
}

struct BytesVisitor;

impl<'de> Visitor<'de> for BytesVisitor {
    type Value = Bytes;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a text string or a byte string")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Bytes::try_from(v).map_err(de::Error::custom)
    }

    fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(Bytes::from(v))
    }

    fn visit_byte_buf<E>(self, v: Vec<u8>) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(Bytes::from(v))
    }
}
