// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use crate::webauthn::attestation::*;
use crate::webauthn::authdata::AuthenticatorData;
use crate::webauthn::common::*;
use crate::webauthn::errors::Error;
use crate::webauthn::x509::{parse_x5c, trust_path};
use ciborium::Value;
use x509_parser::der_parser::ber::BerObjectContent;
use x509_parser::der_parser::der::parse_der;

const APPLE_KEYS: [&str; 2] = ["alg", "x5c"];

/// Apple anonymous attestation nonce extension
pub const OID_APPLE_NONCE: &str = "1.2.840.113635.100.8.2";

/// The `apple` format, see §8.8 of WebAuthn L3
#[derive(Debug, Default, Clone, Copy)]
pub struct Apple;

impl AttestationVerifier for Apple {
    fn verify(
        &self,
        stmt: &Value,
        auth_data: &AuthenticatorData,
        client_data_hash: &[u8],
    ) -> Result<AttestationResult, Error> {
        let m = to_map(stmt, "apple statement")?;
        check_keys(m, &APPLE_KEYS, "apple")?;

        let certs = parse_x5c(required(m, "x5c", "apple")?)?;
        let acd = attested(auth_data)?;
        let leaf = &certs[0];

        let nonce = sha256(&signed_payload(&auth_data.raw, client_data_hash));

        let ext = leaf.extension(OID_APPLE_NONCE).ok_or_else(|| {
            Error::Verification(format!("attestation certificate lacks {OID_APPLE_NONCE}"))
        })?;

        if !ct_eq(&nonce_from_extension(&ext.value)?, &nonce) {
            return Err(Error::Verification(
                "apple nonce does not match authData and clientDataHash".to_string(),
            ));
        }

        let leaf_key = leaf.public_key()?;
        if !acd.public_key.same_key_as(&leaf_key)? {
            return Err(Error::Verification(
                "attestation certificate key differs from the credential public key".to_string(),
            ));
        }

        Ok(AttestationResult {
            attestation_type: AttestationType::AnonCa,
            trust_path: trust_path(&certs)?,
            aaguid: acd.aaguid,
        })
    }
}

// SEQUENCE { [1] EXPLICIT OCTET STRING }
fn nonce_from_extension(der: &[u8]) -> Result<Vec<u8>, Error> {
    let malformed = || Error::Verification("malformed apple nonce extension".to_string());

    let (_, obj) = parse_der(der).map_err(|_| malformed())?;

    let any = match &obj.content {
        BerObjectContent::Sequence(items) => match items.first().map(|i| &i.content) {
            Some(BerObjectContent::Unknown(any)) if any.tag().0 == 1 => any,
            _ => return Err(malformed()),
        },
        _ => return Err(malformed()),
    };

    let (_, inner) = parse_der(any.data).map_err(|_| malformed())?;

    match inner.content {
        BerObjectContent::OctetString(b) => Ok(b.to_vec()),
        _ => Err(malformed()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webauthn::testutil::{self, CertSpec, Ext};
    use openssl::pkey::{PKey, Private};

    fn nonce_ext(nonce: &[u8; 32]) -> Ext {
        let mut der = vec![0x30, 0x24, 0xa1, 0x22, 0x04, 0x20];
        der.extend_from_slice(nonce);

        Ext::Der {
            oid: OID_APPLE_NONCE,
            critical: false,
            der,
        }
    }

    fn stmt(key: &PKey<Private>, nonce: &[u8; 32]) -> Value {
        let cert = testutil::cert(
            key,
            CertSpec {
                subject: &[
                    ("CN", "0123456789abcdef"),
                    ("O", "Apple Inc."),
                    ("ST", "California"),
                ],
                extensions: vec![nonce_ext(nonce)],
                ..Default::default()
            },
        );

        Value::Map(vec![
            (testutil::text("alg"), Value::Integer((-7).into())),
            (testutil::text("x5c"), testutil::x5c(&[&cert])),
        ])
    }

    #[test]
    fn anonymous_ca() {
        let (cred_key, cred) = testutil::p256_credential();
        let ad = testutil::registration_auth_data(&cred, [0; 16]);
        let cdh = sha256(b"client data");
        let nonce = sha256(&signed_payload(&ad.raw, &cdh));

        let r = Apple.verify(&stmt(&cred_key, &nonce), &ad, &cdh).unwrap();

        assert_eq!(r.attestation_type, AttestationType::AnonCa);
        assert_eq!(r.trust_path.len(), 1);
    }

    #[test]
    fn nonce_mismatch() {
        let (cred_key, cred) = testutil::p256_credential();
        let ad = testutil::registration_auth_data(&cred, [0; 16]);
        let cdh = sha256(b"client data");

        assert!(matches!(
            Apple.verify(&stmt(&cred_key, &[7; 32]), &ad, &cdh),
            Err(Error::Verification(_))
        ));
    }

    #[test]
    fn certificate_for_another_key() {
        let (_, cred) = testutil::p256_credential();
        let ad = testutil::registration_auth_data(&cred, [0; 16]);
        let cdh = sha256(b"client data");
        let nonce = sha256(&signed_payload(&ad.raw, &cdh));

        assert!(matches!(
            Apple.verify(&stmt(&testutil::p256_key(), &nonce), &ad, &cdh),
            Err(Error::Verification(_))
        ));
    }

    #[test]
    fn malformed_extension() {
        assert!(nonce_from_extension(&[0x04, 0x02, 0x00, 0x00]).is_err());
        // [2] instead of [1]
        assert!(nonce_from_extension(&[0x30, 0x06, 0xa2, 0x04, 0x04, 0x02, 0x00, 0x00]).is_err());
        assert_eq!(
            nonce_from_extension(&[0x30, 0x06, 0xa1, 0x04, 0x04, 0x02, 0xab, 0xcd]).unwrap(),
            vec![0xab, 0xcd]
        );
    }
}
