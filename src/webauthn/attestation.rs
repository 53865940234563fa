// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::authdata::{Aaguid, AttestedCredentialData, AuthenticatorData};
use super::cbor;
use super::common::*;
use super::errors::Error;
use super::formats::{
    AndroidKey, AndroidKeyPolicy, AndroidSafetyNet, Apple, FidoU2f, NoneFormat, Packed,
    SafetyNetPolicy, Tpm,
};
use ciborium::Value;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The attestation statement formats registered in the IANA "WebAuthn
/// Attestation Statement Format Identifiers" registry that this crate knows
/// how to verify
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttestationFormat {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "packed")]
    Packed,
    #[serde(rename = "tpm")]
    Tpm,
    #[serde(rename = "android-key")]
    AndroidKey,
    #[serde(rename = "android-safetynet")]
    AndroidSafetyNet,
    #[serde(rename = "fido-u2f")]
    FidoU2f,
    #[serde(rename = "apple")]
    Apple,
}

impl AttestationFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttestationFormat::None => "none",
            AttestationFormat::Packed => "packed",
            AttestationFormat::Tpm => "tpm",
            AttestationFormat::AndroidKey => "android-key",
            AttestationFormat::AndroidSafetyNet => "android-safetynet",
            AttestationFormat::FidoU2f => "fido-u2f",
            AttestationFormat::Apple => "apple",
        }
    }

    /// Run the verifier for this format
    pub fn verify(
        &self,
        stmt: &Value,
        auth_data: &AuthenticatorData,
        client_data_hash: &[u8],
        policies: &FormatPolicies,
    ) -> Result<AttestationResult, Error> {
        log::debug!("verifying {} attestation statement", self.as_str());

        match self {
            AttestationFormat::None => NoneFormat.verify(stmt, auth_data, client_data_hash),
            AttestationFormat::Packed => Packed.verify(stmt, auth_data, client_data_hash),
            AttestationFormat::Tpm => Tpm.verify(stmt, auth_data, client_data_hash),
            AttestationFormat::AndroidKey => AndroidKey::new(policies.android_key)
                .verify(stmt, auth_data, client_data_hash),
            AttestationFormat::AndroidSafetyNet => {
                AndroidSafetyNet::new(policies.safetynet.clone())
                    .verify(stmt, auth_data, client_data_hash)
            }
            AttestationFormat::FidoU2f => FidoU2f.verify(stmt, auth_data, client_data_hash),
            AttestationFormat::Apple => Apple.verify(stmt, auth_data, client_data_hash),
        }
    }
}

impl FromStr for AttestationFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "none" => Ok(AttestationFormat::None),
            "packed" => Ok(AttestationFormat::Packed),
            "tpm" => Ok(AttestationFormat::Tpm),
            "android-key" => Ok(AttestationFormat::AndroidKey),
            "android-safetynet" => Ok(AttestationFormat::AndroidSafetyNet),
            "fido-u2f" => Ok(AttestationFormat::FidoU2f),
            "apple" => Ok(AttestationFormat::Apple),
            f => Err(Error::UnsupportedAttestationFormat(f.to_string())),
        }
    }
}

impl std::fmt::Display for AttestationFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Attestation types, see §6.5.4 of WebAuthn L3
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttestationType {
    None,
    #[serde(rename = "self")]
    SelfAttestation,
    AttCa,
    Basic,
    AnonCa,
    Ecdaa,
}

impl AttestationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttestationType::None => "none",
            AttestationType::SelfAttestation => "self",
            AttestationType::AttCa => "attca",
            AttestationType::Basic => "basic",
            AttestationType::AnonCa => "anonca",
            AttestationType::Ecdaa => "ecdaa",
        }
    }
}

/// What a format verifier established about an attestation statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationResult {
    pub attestation_type: AttestationType,
    /// DER certificates, leaf first; empty when there is nothing to chain
    pub trust_path: Vec<Vec<u8>>,
    pub aaguid: Aaguid,
}

/// Policy knobs for the formats that have any
#[derive(Debug, Clone, Default)]
pub struct FormatPolicies {
    pub android_key: AndroidKeyPolicy,
    pub safetynet: SafetyNetPolicy,
}

/// One verification procedure per attestation statement format
pub trait AttestationVerifier {
    /// Verify `stmt` (the attStmt map) against the authenticator data and the
    /// hash of the raw client data
    fn verify(
        &self,
        stmt: &Value,
        auth_data: &AuthenticatorData,
        client_data_hash: &[u8],
    ) -> Result<AttestationResult, Error>;
}

/// The attested credential data every registration must carry
pub(crate) fn attested(auth_data: &AuthenticatorData) -> Result<&AttestedCredentialData, Error> {
    auth_data
        .attested_credential
        .as_ref()
        .ok_or_else(|| Error::Verification("missing attested credential data".to_string()))
}

/// The CBOR attestation object returned by navigator.credentials.create()
#[derive(Debug, Clone, PartialEq)]
pub struct AttestationObject {
    pub fmt: String,
    pub att_stmt: Value,
    pub auth_data: Vec<u8>,
}

impl AttestationObject {
    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        let v = cbor::decode_exact(buf)?;
        let m = to_map(&v, "attestation object")?;

        let fmt = map_lookup(m, "fmt")
            .ok_or_else(|| Error::MalformedEncoding("missing fmt".to_string()))?;
        let att_stmt = map_lookup(m, "attStmt")
            .ok_or_else(|| Error::MalformedEncoding("missing attStmt".to_string()))?;
        let auth_data = map_lookup(m, "authData")
            .ok_or_else(|| Error::MalformedEncoding("missing authData".to_string()))?;

        if !att_stmt.is_map() {
            return Err(Error::MalformedEncoding("attStmt MUST be map".to_string()));
        }

        Ok(AttestationObject {
            fmt: to_tstr(fmt, "fmt")?,
            att_stmt: att_stmt.clone(),
            auth_data: to_bstr(auth_data, "authData")?,
        })
    }

    pub fn format(&self) -> Result<AttestationFormat, Error> {
        AttestationFormat::from_str(&self.fmt)
    }

    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        let v = Value::Map(vec![
            (Value::Text("fmt".to_string()), Value::Text(self.fmt.clone())),
            (Value::Text("attStmt".to_string()), self.att_stmt.clone()),
            (
                Value::Text("authData".to_string()),
                Value::Bytes(self.auth_data.clone()),
            ),
        ]);

        let mut buf = Vec::new();
        ciborium::ser::into_writer(&v, &mut buf)
            .map_err(|e| Error::MalformedEncoding(format!("encoding attestation object: {e}")))?;

        Ok(buf)
    }
}
