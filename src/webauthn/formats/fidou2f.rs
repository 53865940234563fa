// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use crate::webauthn::attestation::*;
use crate::webauthn::authdata::AuthenticatorData;
use crate::webauthn::common::*;
use crate::webauthn::cose::{verify_signature, CoseAlgorithm};
use crate::webauthn::errors::Error;
use crate::webauthn::x509::{parse_x5c, trust_path};
use ciborium::Value;
use openssl::nid::Nid;
use openssl::pkey::Id;

const FIDO_U2F_KEYS: [&str; 2] = ["sig", "x5c"];

/// The `fido-u2f` format, see §8.6 of WebAuthn L3
#[derive(Debug, Default, Clone, Copy)]
pub struct FidoU2f;

impl AttestationVerifier for FidoU2f {
    fn verify(
        &self,
        stmt: &Value,
        auth_data: &AuthenticatorData,
        client_data_hash: &[u8],
    ) -> Result<AttestationResult, Error> {
        let m = to_map(stmt, "fido-u2f statement")?;
        check_keys(m, &FIDO_U2F_KEYS, "fido-u2f")?;

        let sig = to_bstr(required(m, "sig", "fido-u2f")?, "sig")?;
        let certs = parse_x5c(required(m, "x5c", "fido-u2f")?)?;

        if certs.len() != 1 {
            return Err(Error::Verification(format!(
                "fido-u2f x5c must hold exactly one certificate, got {}",
                certs.len()
            )));
        }

        let att_key = certs[0].public_key()?;
        let on_p256 = att_key.id() == Id::EC
            && att_key.ec_key()?.group().curve_name() == Some(Nid::X9_62_PRIME256V1);

        if !on_p256 {
            return Err(Error::Verification(
                "fido-u2f attestation key must be an EC P-256 key".to_string(),
            ));
        }

        let acd = attested(auth_data)?;

        if !acd.aaguid.is_zero() {
            return Err(Error::Verification(format!(
                "fido-u2f AAGUID must be zero, got {}",
                acd.aaguid
            )));
        }

        let public_key_u2f = acd.public_key.x962_raw()?;

        let mut verification_data = Vec::with_capacity(
            1 + 32 + client_data_hash.len() + acd.credential_id.len() + public_key_u2f.len(),
        );
        verification_data.push(0x00);
        verification_data.extend_from_slice(&auth_data.rp_id_hash);
        verification_data.extend_from_slice(client_data_hash);
        verification_data.extend_from_slice(&acd.credential_id);
        verification_data.extend_from_slice(&public_key_u2f);

        verify_signature(CoseAlgorithm::ES256, &att_key, &sig, &verification_data)?;

        Ok(AttestationResult {
            attestation_type: AttestationType::Basic,
            trust_path: trust_path(&certs)?,
            aaguid: acd.aaguid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webauthn::testutil;

    fn fixture(aaguid: [u8; 16]) -> (Value, AuthenticatorData, [u8; 32]) {
        let (_, cred) = testutil::p256_credential();
        let ad = testutil::registration_auth_data(&cred, aaguid);
        let cdh = sha256(b"client data");

        let att_key = testutil::p256_key();
        let cert = testutil::self_signed(&att_key);

        let acd = ad.attested_credential.as_ref().unwrap();
        let mut data = vec![0x00];
        data.extend_from_slice(&ad.rp_id_hash);
        data.extend_from_slice(&cdh);
        data.extend_from_slice(&acd.credential_id);
        data.extend_from_slice(&cred.x962_raw().unwrap());

        let s = Value::Map(vec![
            (
                testutil::text("sig"),
                Value::Bytes(testutil::sign(&att_key, &data)),
            ),
            (testutil::text("x5c"), testutil::x5c(&[&cert])),
        ]);

        (s, ad, cdh)
    }

    #[test]
    fn basic() {
        let (s, ad, cdh) = fixture([0; 16]);

        let r = FidoU2f.verify(&s, &ad, &cdh).unwrap();
        assert_eq!(r.attestation_type, AttestationType::Basic);
        assert_eq!(r.trust_path.len(), 1);
    }

    #[test]
    fn tampered_cdh() {
        let (s, ad, mut cdh) = fixture([0; 16]);
        cdh[0] ^= 0xff;

        assert!(matches!(
            FidoU2f.verify(&s, &ad, &cdh),
            Err(Error::InvalidSignature(_))
        ));
    }

    #[test]
    fn non_zero_aaguid() {
        let (s, ad, cdh) = fixture(testutil::AAGUID);

        assert!(matches!(
            FidoU2f.verify(&s, &ad, &cdh),
            Err(Error::Verification(_))
        ));
    }

    #[test]
    fn rsa_attestation_key() {
        let (s, ad, cdh) = fixture([0; 16]);
        let cert = testutil::self_signed(&testutil::rsa_key());

        let mut m = s.as_map().unwrap().clone();
        m[1].1 = testutil::x5c(&[&cert]);

        assert!(matches!(
            FidoU2f.verify(&Value::Map(m), &ad, &cdh),
            Err(Error::Verification(_))
        ));
    }

    #[test]
    fn two_certificates() {
        let (s, ad, cdh) = fixture([0; 16]);
        let cert = testutil::self_signed(&testutil::p256_key());

        let mut m = s.as_map().unwrap().clone();
        m[1].1 = testutil::x5c(&[&cert, &cert]);

        assert!(matches!(
            FidoU2f.verify(&Value::Map(m), &ad, &cdh),
            Err(Error::Verification(_))
        ));
    }
}
