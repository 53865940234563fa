// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use crate::webauthn::attestation::*;
use crate::webauthn::authdata::AuthenticatorData;
use crate::webauthn::common::*;
use crate::webauthn::cose::{verify_signature, CoseAlgorithm, CoseKey, EcCurve, PublicKey};
use crate::webauthn::errors::Error;
use crate::webauthn::tpm::*;
use crate::webauthn::x509::{parse_x5c, trust_path, AttestationCert, OID_TCG_KP_AIK_CERTIFICATE};
use ciborium::Value;

const TPM_KEYS: [&str; 6] = ["ver", "alg", "x5c", "sig", "certInfo", "pubArea"];
const RSA_DEFAULT_EXPONENT: u32 = 65537;

/// The `tpm` format, see §8.3 of WebAuthn L3
#[derive(Debug, Default, Clone, Copy)]
pub struct Tpm;

impl AttestationVerifier for Tpm {
    fn verify(
        &self,
        stmt: &Value,
        auth_data: &AuthenticatorData,
        client_data_hash: &[u8],
    ) -> Result<AttestationResult, Error> {
        let m = to_map(stmt, "tpm statement")?;
        check_keys(m, &TPM_KEYS, "tpm")?;

        let ver = to_tstr(required(m, "ver", "tpm")?, "ver")?;
        if ver != "2.0" {
            return Err(Error::Verification(format!(
                "unsupported TPM version {ver}"
            )));
        }

        let alg = CoseAlgorithm::try_from(to_int(required(m, "alg", "tpm")?, "alg")?)?;
        let sig = to_bstr(required(m, "sig", "tpm")?, "sig")?;
        let raw_cert_info = to_bstr(required(m, "certInfo", "tpm")?, "certInfo")?;
        let raw_pub_area = to_bstr(required(m, "pubArea", "tpm")?, "pubArea")?;
        let certs = parse_x5c(required(m, "x5c", "tpm")?)?;

        let acd = attested(auth_data)?;

        let pub_area = PubArea::parse(&raw_pub_area)?;
        check_pub_area_key(&pub_area.key, &acd.public_key)?;

        let cert_info = CertInfo::parse(&raw_cert_info)?;

        let att_to_be_signed = signed_payload(&auth_data.raw, client_data_hash);
        if !ct_eq(&cert_info.extra_data, &alg.hash(&att_to_be_signed)?) {
            return Err(Error::Verification(
                "certInfo extraData does not match the hash of authData and clientDataHash"
                    .to_string(),
            ));
        }

        let mut name = pub_area.name_alg.to_be_bytes().to_vec();
        name.extend_from_slice(&name_hash(pub_area.name_alg, &raw_pub_area)?);

        if cert_info.attested_name != name {
            return Err(Error::Verification(
                "certInfo attested name does not match pubArea".to_string(),
            ));
        }

        let aik = &certs[0];
        let aik_key = aik.public_key()?;
        verify_signature(alg, &aik_key, &sig, &raw_cert_info)?;
        check_aik(aik)?;
        aik.check_aaguid(&acd.aaguid)?;

        log::debug!("TPM attestation verified, AIK chain of {}", certs.len());

        Ok(AttestationResult {
            attestation_type: AttestationType::AttCa,
            trust_path: trust_path(&certs)?,
            aaguid: acd.aaguid,
        })
    }
}

fn check_pub_area_key(tpm_key: &TpmPublicKey, cred: &CoseKey) -> Result<(), Error> {
    let matches = match (tpm_key, &cred.key) {
        (
            TpmPublicKey::Rsa {
                exponent, modulus, ..
            },
            PublicKey::Rsa { n, e },
        ) => {
            let tpm_e = if *exponent == 0 {
                RSA_DEFAULT_EXPONENT
            } else {
                *exponent
            };

            modulus == n && exponent_value(e) == Some(tpm_e)
        }
        (TpmPublicKey::Ecc { curve_id, x: tx, y: ty }, PublicKey::Ec2 { curve, x, y }) => {
            let tpm_curve = match *curve_id {
                TPM_ECC_NIST_P256 => Some(EcCurve::P256),
                TPM_ECC_NIST_P384 => Some(EcCurve::P384),
                TPM_ECC_NIST_P521 => Some(EcCurve::P521),
                _ => None,
            };

            tpm_curve == Some(*curve) && tx == x && ty == y
        }
        _ => false,
    };

    if !matches {
        return Err(Error::Verification(
            "pubArea key does not match the credential public key".to_string(),
        ));
    }

    Ok(())
}

// big-endian, leading zeros allowed
fn exponent_value(e: &[u8]) -> Option<u32> {
    let e = match e.iter().position(|b| *b != 0) {
        Some(i) => &e[i..],
        None => return Some(0),
    };

    if e.len() > 4 {
        return None;
    }

    Some(e.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32))
}

/// TPM attestation statement certificate requirements, see §8.3.1 of
/// WebAuthn L3
fn check_aik(aik: &AttestationCert) -> Result<(), Error> {
    if aik.version != 2 {
        return Err(Error::Verification(
            "AIK certificate must be v3".to_string(),
        ));
    }

    if !aik.subject_empty {
        return Err(Error::Verification(
            "AIK certificate subject must be empty".to_string(),
        ));
    }

    if !aik.has_san {
        return Err(Error::Verification(
            "AIK certificate lacks a subject alternative name".to_string(),
        ));
    }

    if !aik
        .extended_key_usage
        .iter()
        .any(|o| o == OID_TCG_KP_AIK_CERTIFICATE)
    {
        return Err(Error::Verification(format!(
            "AIK certificate EKU lacks {OID_TCG_KP_AIK_CERTIFICATE}"
        )));
    }

    if aik.ca != Some(false) {
        return Err(Error::Verification(
            "AIK certificate must not be a CA".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webauthn::testutil::{self, CertSpec, Ext};
    use crate::webauthn::tpm::encode;
    use openssl::pkey::{PKey, Private};

    struct Fixture {
        ad: AuthenticatorData,
        cdh: [u8; 32],
        aik: PKey<Private>,
        aik_cert: openssl::x509::X509,
        pub_area: Vec<u8>,
        cert_info: Vec<u8>,
    }

    impl Fixture {
        fn rsa() -> Self {
            let (_, cred) = testutil::rsa_credential();
            let n = match &cred.key {
                PublicKey::Rsa { n, .. } => n.clone(),
                _ => unreachable!(),
            };
            Self::with(cred, encode::rsa_pub_area(TPM_ALG_SHA256, &n, 0))
        }

        fn with(cred: CoseKey, pub_area: Vec<u8>) -> Self {
            let ad = testutil::registration_auth_data(&cred, testutil::AAGUID);
            let cdh = sha256(b"client data");

            let extra = sha256(&signed_payload(&ad.raw, &cdh));
            let name = encode::name(TPM_ALG_SHA256, &pub_area);
            let cert_info =
                encode::cert_info(TPM_GENERATED_VALUE, TPM_ST_ATTEST_CERTIFY, &extra, &name);

            let aik = testutil::rsa_key();
            let aik_cert = testutil::cert(
                &aik,
                CertSpec {
                    subject: &[],
                    extensions: vec![
                        Ext::Eku(OID_TCG_KP_AIK_CERTIFICATE),
                        Ext::SanDns("tpm.example.com"),
                        testutil::aaguid_ext(&testutil::AAGUID, false),
                    ],
                    ..Default::default()
                },
            );

            Fixture {
                ad,
                cdh,
                aik,
                aik_cert,
                pub_area,
                cert_info,
            }
        }

        fn stmt(&self) -> Value {
            let sig = testutil::sign(&self.aik, &self.cert_info);

            Value::Map(vec![
                (testutil::text("ver"), testutil::text("2.0")),
                (testutil::text("alg"), Value::Integer((-257).into())),
                (testutil::text("x5c"), testutil::x5c(&[&self.aik_cert])),
                (testutil::text("sig"), Value::Bytes(sig)),
                (testutil::text("certInfo"), Value::Bytes(self.cert_info.clone())),
                (testutil::text("pubArea"), Value::Bytes(self.pub_area.clone())),
            ])
        }
    }

    #[test]
    fn rsa_credential() {
        let f = Fixture::rsa();

        let r = Tpm.verify(&f.stmt(), &f.ad, &f.cdh).unwrap();

        assert_eq!(r.attestation_type, AttestationType::AttCa);
        assert_eq!(r.trust_path.len(), 1);
        assert_eq!(r.aaguid.0, testutil::AAGUID);
    }

    #[test]
    fn ecc_credential() {
        let (_, cred) = testutil::p256_credential();
        let pub_area = match &cred.key {
            PublicKey::Ec2 { x, y, .. } => {
                encode::ecc_pub_area(TPM_ALG_SHA256, TPM_ECC_NIST_P256, x, y)
            }
            _ => unreachable!(),
        };
        let f = Fixture::with(cred, pub_area);

        let r = Tpm.verify(&f.stmt(), &f.ad, &f.cdh).unwrap();
        assert_eq!(r.attestation_type, AttestationType::AttCa);
    }

    #[test]
    fn pub_area_for_another_key() {
        let mut f = Fixture::rsa();
        f.pub_area = encode::rsa_pub_area(TPM_ALG_SHA256, &[0xc3; 256], 0);

        assert!(matches!(
            Tpm.verify(&f.stmt(), &f.ad, &f.cdh),
            Err(Error::Verification(_))
        ));
    }

    #[test]
    fn extra_data_mismatch() {
        let f = Fixture::rsa();

        assert!(matches!(
            Tpm.verify(&f.stmt(), &f.ad, &sha256(b"other client data")),
            Err(Error::Verification(_))
        ));
    }

    #[test]
    fn name_mismatch() {
        let mut f = Fixture::rsa();
        let extra = sha256(&signed_payload(&f.ad.raw, &f.cdh));
        let name = encode::name(TPM_ALG_SHA1, &f.pub_area);
        f.cert_info = encode::cert_info(TPM_GENERATED_VALUE, TPM_ST_ATTEST_CERTIFY, &extra, &name);

        assert!(matches!(
            Tpm.verify(&f.stmt(), &f.ad, &f.cdh),
            Err(Error::Verification(_))
        ));
    }

    #[test]
    fn bad_signature() {
        let f = Fixture::rsa();

        let mut m = f.stmt().as_map().unwrap().clone();
        if let Value::Bytes(sig) = &mut m[3].1 {
            sig[10] ^= 0x01;
        }

        assert!(matches!(
            Tpm.verify(&Value::Map(m), &f.ad, &f.cdh),
            Err(Error::InvalidSignature(_))
        ));
    }

    #[test]
    fn aik_with_subject() {
        let mut f = Fixture::rsa();
        f.aik_cert = testutil::cert(
            &f.aik,
            CertSpec {
                extensions: vec![
                    Ext::Eku(OID_TCG_KP_AIK_CERTIFICATE),
                    Ext::SanDns("tpm.example.com"),
                ],
                ..Default::default()
            },
        );

        assert!(matches!(
            Tpm.verify(&f.stmt(), &f.ad, &f.cdh),
            Err(Error::Verification(_))
        ));
    }

    #[test]
    fn wrong_version() {
        let f = Fixture::rsa();

        let mut m = f.stmt().as_map().unwrap().clone();
        m[0].1 = testutil::text("1.2");

        assert!(matches!(
            Tpm.verify(&Value::Map(m), &f.ad, &f.cdh),
            Err(Error::Verification(_))
        ));
    }

    #[test]
    fn exponents() {
        assert_eq!(exponent_value(&[0x01, 0x00, 0x01]), Some(65537));
        assert_eq!(exponent_value(&[0x00, 0x01, 0x00, 0x01]), Some(65537));
        assert_eq!(exponent_value(&[1, 2, 3, 4, 5]), None);
    }
}
