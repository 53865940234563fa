// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use crate::webauthn::attestation::*;
use crate::webauthn::authdata::AuthenticatorData;
use crate::webauthn::common::*;
use crate::webauthn::cose::{verify_signature, CoseAlgorithm};
use crate::webauthn::errors::Error;
use crate::webauthn::x509::{parse_x5c, trust_path, AttestationCert};
use ciborium::Value;

const PACKED_KEYS: [&str; 4] = ["alg", "sig", "x5c", "ecdaaKeyId"];
const PACKED_OU: &str = "Authenticator Attestation";

/// The `packed` format, see §8.2 of WebAuthn L3
#[derive(Debug, Default, Clone, Copy)]
pub struct Packed;

impl AttestationVerifier for Packed {
    fn verify(
        &self,
        stmt: &Value,
        auth_data: &AuthenticatorData,
        client_data_hash: &[u8],
    ) -> Result<AttestationResult, Error> {
        let m = to_map(stmt, "packed statement")?;
        check_keys(m, &PACKED_KEYS, "packed")?;

        if map_lookup(m, "ecdaaKeyId").is_some() {
            return Err(Error::UnsupportedAlgorithm("ECDAA".to_string()));
        }

        let alg = CoseAlgorithm::try_from(to_int(required(m, "alg", "packed")?, "alg")?)?;
        let sig = to_bstr(required(m, "sig", "packed")?, "sig")?;
        let acd = attested(auth_data)?;
        let payload = signed_payload(&auth_data.raw, client_data_hash);

        match map_lookup(m, "x5c") {
            Some(x5c) => {
                let certs = parse_x5c(x5c)?;
                let leaf = &certs[0];

                let leaf_key = leaf.public_key()?;
                verify_signature(alg, &leaf_key, &sig, &payload)?;
                check_leaf(leaf)?;
                leaf.check_aaguid(&acd.aaguid)?;

                Ok(AttestationResult {
                    attestation_type: AttestationType::Basic,
                    trust_path: trust_path(&certs)?,
                    aaguid: acd.aaguid,
                })
            }
            None => {
                if alg != acd.public_key.alg {
                    return Err(Error::Verification(format!(
                        "self attestation alg {alg:?} differs from credential alg {:?}",
                        acd.public_key.alg
                    )));
                }

                acd.public_key.verify_signature(&sig, &payload)?;

                Ok(AttestationResult {
                    attestation_type: AttestationType::SelfAttestation,
                    trust_path: vec![],
                    aaguid: acd.aaguid,
                })
            }
        }
    }
}

/// Packed attestation statement certificate requirements, see §8.2.1 of
/// WebAuthn L3
fn check_leaf(leaf: &AttestationCert) -> Result<(), Error> {
    if leaf.version != 2 {
        return Err(Error::Verification(format!(
            "attestation certificate must be v3, got v{}",
            leaf.version + 1
        )));
    }

    for (attr, v) in [
        ("C", &leaf.country),
        ("O", &leaf.organization),
        ("CN", &leaf.common_name),
    ] {
        if v.iter().all(|s| s.is_empty()) {
            return Err(Error::Verification(format!(
                "attestation certificate subject lacks {attr}"
            )));
        }
    }

    if leaf.organizational_unit != [PACKED_OU] {
        return Err(Error::Verification(format!(
            "attestation certificate subject OU must be \"{PACKED_OU}\", got {:?}",
            leaf.organizational_unit
        )));
    }

    if leaf.ca != Some(false) {
        return Err(Error::Verification(
            "attestation certificate must not be a CA".to_string(),
        ));
    }

    Ok(())
}
