// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use ciborium::Value;

pub(crate) fn to_bstr(v: &Value, n: &str) -> Result<Vec<u8>, Error> {
    match v.as_bytes() {
        Some(b) => Ok(b.clone()),
        None => Err(Error::MalformedEncoding(format!("{n} MUST be bytes"))),
    }
}

pub(crate) fn to_tstr(v: &Value, n: &str) -> Result<String, Error> {
    match v.as_text() {
        Some(t) => Ok(t.to_string()),
        None => Err(Error::MalformedEncoding(format!("{n} MUST be text"))),
    }
}

pub(crate) fn to_int(v: &Value, n: &str) -> Result<i128, Error> {
    match v.as_integer() {
        Some(i) => Ok(i.into()),
        None => Err(Error::MalformedEncoding(format!("{n} MUST be integer"))),
    }
}

pub(crate) fn to_array<'a>(v: &'a Value, n: &str) -> Result<&'a Vec<Value>, Error> {
    v.as_array()
        .ok_or_else(|| Error::MalformedEncoding(format!("{n} MUST be array")))
}

pub(crate) fn to_map<'a>(v: &'a Value, n: &str) -> Result<&'a Vec<(Value, Value)>, Error> {
    v.as_map()
        .ok_or_else(|| Error::MalformedEncoding(format!("{n} MUST be map")))
}

/// Find the value associated with a text key
pub(crate) fn map_lookup<'a>(m: &'a [(Value, Value)], key: &str) -> Option<&'a Value> {
    m.iter()
        .find(|(k, _)| k.as_text() == Some(key))
        .map(|(_, v)| v)
}

/// Find the value associated with an integer label
pub(crate) fn map_lookup_int(m: &[(Value, Value)], label: i128) -> Option<&Value> {
    m.iter()
        .find(|(k, _)| k.as_integer().map(i128::from) == Some(label))
        .map(|(_, v)| v)
}

/// A mandatory member of an attestation statement
pub(crate) fn required<'a>(
    m: &'a [(Value, Value)],
    key: &str,
    what: &str,
) -> Result<&'a Value, Error> {
    map_lookup(m, key)
        .ok_or_else(|| Error::Verification(format!("missing {key} in {what} statement")))
}

/// Attestation statements are closed maps: every key must be a known text
/// key, and no key may appear twice.
pub(crate) fn check_keys(m: &[(Value, Value)], allowed: &[&str], what: &str) -> Result<(), Error> {
    let mut seen: Vec<&str> = Vec::with_capacity(m.len());

    for (k, _) in m.iter() {
        let k = match k.as_text() {
            Some(k) => k,
            None => {
                return Err(Error::Verification(format!(
                    "non-text key in {what} statement"
                )))
            }
        };

        if !allowed.contains(&k) {
            return Err(Error::Verification(format!(
                "unexpected key {k} in {what} statement"
            )));
        }

        if seen.contains(&k) {
            return Err(Error::Verification(format!(
                "duplicated key {k} in {what} statement"
            )));
        }

        seen.push(k);
    }

    Ok(())
}

/// `authenticatorData || clientDataHash`, the payload most attestation
/// formats sign over
pub(crate) fn signed_payload(auth_data: &[u8], client_data_hash: &[u8]) -> Vec<u8> {
    let mut v = Vec::with_capacity(auth_data.len() + client_data_hash.len());
    v.extend_from_slice(auth_data);
    v.extend_from_slice(client_data_hash);
    v
}

pub(crate) fn sha256(data: &[u8]) -> [u8; 32] {
    openssl::sha::sha256(data)
}

/// Constant-time comparison that tolerates different lengths
pub(crate) fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && openssl::memcmp::eq(a, b)
}
