// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::attestation::{AttestationFormat, AttestationType};
use super::authdata::Aaguid;
use super::base64::Bytes;
use super::cose::CoseKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A verified credential, as returned by registration.  The caller persists it
/// and hands it back at every assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub id: Bytes,
    pub public_key: CoseKey,
    /// signature counter at registration, then as last persisted
    pub counter: u32,
    pub attestation_type: AttestationType,
    pub attestation_format: AttestationFormat,
    pub aaguid: Aaguid,
    pub created_at: DateTime<Utc>,
    pub user_verified: bool,
    pub backup_eligible: bool,
    pub backup_state: bool,
    #[serde(default)]
    pub transports: Vec<String>,
    /// the attestation chained to a configured root; false for `none` and
    /// `self` and for anything accepted under a permissive trust policy
    pub attestation_trusted: bool,
}

/// What navigator.credentials.get() returned, with binary members decoded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionResponse {
    pub credential_id: Bytes,
    pub authenticator_data: Bytes,
    pub signature: Bytes,
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: Bytes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_handle: Option<Bytes>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedAssertion {
    pub credential_id: Bytes,
    /// the counter to persist
    pub new_counter: u32,
    pub flags: u8,
    pub user_verified: bool,
    pub backup_state: bool,
    /// the counter did not advance and the policy let it through
    pub counter_warning: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assertion_response_json() {
        let j = r#"{
            "credentialId": "AQID",
            "authenticatorData": "BAUG",
            "signature": "BwgJ",
            "clientDataJSON": "e30"
        }"#;

        let r: AssertionResponse = serde_json::from_str(j).unwrap();

        assert_eq!(r.credential_id.as_slice(), &[1, 2, 3]);
        assert_eq!(r.authenticator_data.as_slice(), &[4, 5, 6]);
        assert_eq!(r.signature.as_slice(), &[7, 8, 9]);
        assert_eq!(r.client_data_json.as_slice(), b"{}");
        assert_eq!(r.user_handle, None);
    }

    #[test]
    fn credential_json() {
        let (_, key) = crate::webauthn::testutil::p256_credential();
        let c = Credential {
            id: Bytes::from(vec![0x11; 16]),
            public_key: key,
            counter: 5,
            attestation_type: AttestationType::SelfAttestation,
            attestation_format: AttestationFormat::Packed,
            aaguid: Aaguid::default(),
            created_at: Utc::now(),
            user_verified: true,
            backup_eligible: false,
            backup_state: false,
            transports: vec![],
            attestation_trusted: false,
        };

        let j = serde_json::to_value(&c).unwrap();
        assert_eq!(j["attestation_type"], "self");
        assert_eq!(j["attestation_format"], "packed");
        assert_eq!(j["id"], "EREREREREREREREREREREQ");

        let back: Credential = serde_json::from_value(j).unwrap();
        assert_eq!(back, c);
    }
}
