// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Bounded CBOR decoding.
//!
//! Authenticators emit CBOR in a number of places (attestation objects, COSE
//! keys, extension maps), sometimes back-to-back in the same buffer.  The
//! functions in this module decode a single data item from the front of a
//! buffer, report how many bytes it occupied and refuse to recurse deeper than
//! a configured limit.

use super::errors::Error;
use ciborium::de::from_reader_with_recursion_limit;
pub use ciborium::Value;

/// Maximum nesting of arrays, maps and tags accepted by [`decode`].  WebAuthn
/// structures never go beyond four or five levels.
pub const DEFAULT_MAX_DEPTH: usize = 16;

/// Decode the first data item in `buf`, returning it together with the number
/// of bytes it occupied.
pub fn decode(buf: &[u8]) -> Result<(Value, usize), Error> {
    decode_with_limit(buf, DEFAULT_MAX_DEPTH)
}

/// Same as [`decode`] with an explicit nesting limit.
pub fn decode_with_limit(buf: &[u8], max_depth: usize) -> Result<(Value, usize), Error> {
    decode_inner(buf, max_depth, |m| Error::MalformedEncoding(format!("truncated input: {m}")))
}

/// Decode the first data item of a buffer whose enclosing structure has
/// already committed to the item being there.  Running out of input is then
/// reported as `TruncatedAuthenticatorData` rather than as an encoding error.
pub fn decode_embedded(buf: &[u8]) -> Result<(Value, usize), Error> {
    if buf.is_empty() {
        return Err(Error::TruncatedAuthenticatorData(
            "no data item present".to_string(),
        ));
    }

    decode_inner(buf, DEFAULT_MAX_DEPTH, |m| {
        Error::TruncatedAuthenticatorData(format!("data item cut short: {m}"))
    })
}

fn decode_inner(
    buf: &[u8],
    max_depth: usize,
    truncated: impl FnOnce(String) -> Error,
) -> Result<(Value, usize), Error> {
    if buf.is_empty() {
        return Err(Error::MalformedEncoding("empty input".to_string()));
    }

    let mut cursor = buf;

    let v: Value = from_reader_with_recursion_limit(&mut cursor, max_depth).map_err(|e| match e {
        ciborium::de::Error::Io(e) => truncated(e.to_string()),
        ciborium::de::Error::Syntax(off) => {
            Error::MalformedEncoding(format!("syntax error at offset {off}"))
        }
        ciborium::de::Error::Semantic(_, msg) => Error::MalformedEncoding(msg),
        ciborium::de::Error::RecursionLimitExceeded => {
            Error::MalformedEncoding(format!("nesting deeper than {max_depth} levels"))
        }
    })?;

    Ok((v, buf.len() - cursor.len()))
}

/// Decode `buf` as exactly one data item.  Trailing bytes are an error.
pub fn decode_exact(buf: &[u8]) -> Result<Value, Error> {
    let (v, consumed) = decode(buf)?;

    if consumed != buf.len() {
        return Err(Error::MalformedEncoding(format!(
            "{} trailing bytes after CBOR item",
            buf.len() - consumed
        )));
    }

    Ok(v)
}
