// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use crate::webauthn::attestation::*;
use crate::webauthn::authdata::AuthenticatorData;
use crate::webauthn::common::*;
use crate::webauthn::cose::{verify_signature, CoseAlgorithm};
use crate::webauthn::errors::Error;
use crate::webauthn::x509::{parse_x5c, trust_path};
use ciborium::Value;
use x509_parser::der_parser::ber::{BerObject, BerObjectContent};
use x509_parser::der_parser::der::parse_der;

const ANDROID_KEY_KEYS: [&str; 3] = ["alg", "sig", "x5c"];

/// Android Key Attestation certificate extension
pub const OID_ANDROID_KEY_DESCRIPTION: &str = "1.3.6.1.4.1.11129.2.1.17";

const KEY_DESCRIPTION_CHALLENGE: usize = 4;
const KEY_DESCRIPTION_SOFTWARE_ENFORCED: usize = 6;
const KEY_DESCRIPTION_TEE_ENFORCED: usize = 7;

const TAG_PURPOSE: u32 = 1;
const TAG_ALL_APPLICATIONS: u32 = 600;
const TAG_ORIGIN: u32 = 702;

const KM_ORIGIN_GENERATED: u64 = 0;
const KM_PURPOSE_SIGN: u64 = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AndroidKeyPolicy {
    /// Accept origin and purpose from the software enforced authorization
    /// list, not just the TEE enforced one
    pub allow_software_enforced: bool,
}

/// The `android-key` format, see §8.4 of WebAuthn L3
#[derive(Debug, Default, Clone, Copy)]
pub struct AndroidKey {
    policy: AndroidKeyPolicy,
}

impl AndroidKey {
    pub fn new(policy: AndroidKeyPolicy) -> Self {
        AndroidKey { policy }
    }
}

impl AttestationVerifier for AndroidKey {
    fn verify(
        &self,
        stmt: &Value,
        auth_data: &AuthenticatorData,
        client_data_hash: &[u8],
    ) -> Result<AttestationResult, Error> {
        let m = to_map(stmt, "android-key statement")?;
        check_keys(m, &ANDROID_KEY_KEYS, "android-key")?;

        let alg = CoseAlgorithm::try_from(to_int(required(m, "alg", "android-key")?, "alg")?)?;
        let sig = to_bstr(required(m, "sig", "android-key")?, "sig")?;
        let certs = parse_x5c(required(m, "x5c", "android-key")?)?;

        let acd = attested(auth_data)?;
        let leaf = &certs[0];
        let leaf_key = leaf.public_key()?;

        verify_signature(
            alg,
            &leaf_key,
            &sig,
            &signed_payload(&auth_data.raw, client_data_hash),
        )?;

        if !acd.public_key.same_key_as(&leaf_key)? {
            return Err(Error::Verification(
                "attestation certificate key differs from the credential public key".to_string(),
            ));
        }

        let ext = leaf.extension(OID_ANDROID_KEY_DESCRIPTION).ok_or_else(|| {
            Error::Verification(format!(
                "attestation certificate lacks {OID_ANDROID_KEY_DESCRIPTION}"
            ))
        })?;

        let kd = KeyDescription::parse(&ext.value)?;

        if !ct_eq(&kd.attestation_challenge, client_data_hash) {
            return Err(Error::Verification(
                "attestationChallenge does not match clientDataHash".to_string(),
            ));
        }

        self.check_authorizations(&kd)?;

        log::debug!(
            "android-key attestation verified, security level {}",
            kd.attestation_security_level
        );

        Ok(AttestationResult {
            attestation_type: AttestationType::Basic,
            trust_path: trust_path(&certs)?,
            aaguid: acd.aaguid,
        })
    }
}

impl AndroidKey {
    fn check_authorizations(&self, kd: &KeyDescription) -> Result<(), Error> {
        if kd.software_enforced.all_applications || kd.tee_enforced.all_applications {
            return Err(Error::Verification(
                "key is scoped to all applications".to_string(),
            ));
        }

        let mut lists = vec![&kd.tee_enforced];
        if self.policy.allow_software_enforced {
            lists.push(&kd.software_enforced);
        }

        if !lists.iter().any(|l| l.origin == Some(KM_ORIGIN_GENERATED)) {
            return Err(Error::Verification(
                "key origin is not KM_ORIGIN_GENERATED".to_string(),
            ));
        }

        if !lists.iter().any(|l| l.purpose.contains(&KM_PURPOSE_SIGN)) {
            return Err(Error::Verification(
                "key purpose does not include KM_PURPOSE_SIGN".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct AuthorizationList {
    purpose: Vec<u64>,
    origin: Option<u64>,
    all_applications: bool,
}

#[derive(Debug, PartialEq, Eq)]
struct KeyDescription {
    attestation_security_level: u64,
    attestation_challenge: Vec<u8>,
    software_enforced: AuthorizationList,
    tee_enforced: AuthorizationList,
}

fn malformed(what: &str) -> Error {
    Error::Verification(format!("malformed KeyDescription: {what}"))
}

impl KeyDescription {
    fn parse(der: &[u8]) -> Result<Self, Error> {
        let (_, obj) = parse_der(der).map_err(|e| malformed(&e.to_string()))?;

        let items = match &obj.content {
            BerObjectContent::Sequence(items) => items,
            _ => return Err(malformed("not a SEQUENCE")),
        };

        if items.len() < 8 {
            return Err(malformed("too few elements"));
        }

        let attestation_challenge = match &items[KEY_DESCRIPTION_CHALLENGE].content {
            BerObjectContent::OctetString(b) => b.to_vec(),
            _ => return Err(malformed("attestationChallenge")),
        };

        Ok(KeyDescription {
            attestation_security_level: items[1]
                .as_u64()
                .map_err(|_| malformed("attestationSecurityLevel"))?,
            attestation_challenge,
            software_enforced: authorization_list(&items[KEY_DESCRIPTION_SOFTWARE_ENFORCED])?,
            tee_enforced: authorization_list(&items[KEY_DESCRIPTION_TEE_ENFORCED])?,
        })
    }
}

fn authorization_list(obj: &BerObject) -> Result<AuthorizationList, Error> {
    let items = match &obj.content {
        BerObjectContent::Sequence(items) => items,
        _ => return Err(malformed("AuthorizationList is not a SEQUENCE")),
    };

    let mut list = AuthorizationList::default();

    for item in items {
        // every entry is EXPLICIT context tagged
        let any = match &item.content {
            BerObjectContent::Unknown(any) => any,
            _ => continue,
        };

        match any.tag().0 {
            TAG_PURPOSE => {
                let (_, inner) = parse_der(any.data).map_err(|_| malformed("purpose"))?;
                match &inner.content {
                    BerObjectContent::Set(values) => {
                        for v in values {
                            list.purpose
                                .push(v.as_u64().map_err(|_| malformed("purpose"))?);
                        }
                    }
                    _ => return Err(malformed("purpose is not a SET")),
                }
            }
            TAG_ORIGIN => {
                let (_, inner) = parse_der(any.data).map_err(|_| malformed("origin"))?;
                list.origin = Some(inner.as_u64().map_err(|_| malformed("origin"))?);
            }
            TAG_ALL_APPLICATIONS => list.all_applications = true,
            _ => {}
        }
    }

    Ok(list)
}
