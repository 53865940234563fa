// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Fixture generation shared by the unit tests

use super::authdata::{Aaguid, AuthenticatorData, AuthenticatorDataBuilder, Flag};
use super::cose::{CoseAlgorithm, CoseKey};
use ciborium::Value;
use openssl::asn1::{Asn1Object, Asn1OctetString, Asn1Time};
use openssl::bn::{BigNum, MsbOption};
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::sign::Signer;
use openssl::x509::extension::{BasicConstraints, ExtendedKeyUsage, SubjectAlternativeName};
use openssl::x509::{X509Builder, X509Extension, X509NameBuilder, X509};

pub const RP_ID: &str = "example.com";
pub const AAGUID: [u8; 16] = [
    0xf8, 0xa0, 0x11, 0xf3, 0x8c, 0x0a, 0x4d, 0x15, 0x80, 0x06, 0x17, 0x11, 0x1f, 0x9e, 0xdc, 0x7d,
];

pub fn p256_key() -> PKey<Private> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
}

pub fn rsa_key() -> PKey<Private> {
    PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap()
}

pub fn p256_credential() -> (PKey<Private>, CoseKey) {
    let k = p256_key();
    let c = CoseKey::from_pkey(CoseAlgorithm::ES256, &k).unwrap();
    (k, c)
}

pub fn rsa_credential() -> (PKey<Private>, CoseKey) {
    let k = rsa_key();
    let c = CoseKey::from_pkey(CoseAlgorithm::RS256, &k).unwrap();
    (k, c)
}

pub fn ed25519_credential() -> (PKey<Private>, CoseKey) {
    let k = PKey::generate_ed25519().unwrap();
    let c = CoseKey::from_pkey(CoseAlgorithm::EdDSA, &k).unwrap();
    (k, c)
}

/// Sign with SHA-256 (or one-shot for Ed25519)
pub fn sign(key: &PKey<Private>, data: &[u8]) -> Vec<u8> {
    if key.id() == openssl::pkey::Id::ED25519 {
        let mut s = Signer::new_without_digest(key).unwrap();
        return s.sign_oneshot_to_vec(data).unwrap();
    }

    let mut s = Signer::new(MessageDigest::sha256(), key).unwrap();
    s.update(data).unwrap();
    s.sign_to_vec().unwrap()
}

pub enum Ext {
    Der {
        oid: &'static str,
        critical: bool,
        der: Vec<u8>,
    },
    Eku(&'static str),
    SanDns(&'static str),
}

/// DER `OCTET STRING` wrapping an AAGUID, the value of the
/// id-fido-gen-ce-aaguid extension
pub fn aaguid_ext(aaguid: &[u8; 16], critical: bool) -> Ext {
    let mut der = vec![0x04, 0x10];
    der.extend_from_slice(aaguid);

    Ext::Der {
        oid: "1.3.6.1.4.1.45724.1.1.4",
        critical,
        der,
    }
}

pub struct CertSpec<'a> {
    pub subject: &'a [(&'a str, &'a str)],
    pub ca: bool,
    pub extensions: Vec<Ext>,
    pub issuer: Option<(&'a X509, &'a PKey<Private>)>,
}

impl Default for CertSpec<'_> {
    fn default() -> Self {
        CertSpec {
            subject: &[
                ("C", "US"),
                ("O", "Example Vendor"),
                ("OU", "Authenticator Attestation"),
                ("CN", "Example Authenticator"),
            ],
            ca: false,
            extensions: vec![],
            issuer: None,
        }
    }
}

pub fn cert(key: &PKey<Private>, spec: CertSpec) -> X509 {
    let mut b = X509Builder::new().unwrap();
    b.set_version(2).unwrap();

    let mut serial = BigNum::new().unwrap();
    serial.rand(64, MsbOption::MAYBE_ZERO, false).unwrap();
    b.set_serial_number(&serial.to_asn1_integer().unwrap())
        .unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    for (k, v) in spec.subject {
        name.append_entry_by_text(k, v).unwrap();
    }
    let name = name.build();

    b.set_subject_name(&name).unwrap();
    match spec.issuer {
        Some((c, _)) => b.set_issuer_name(c.subject_name()).unwrap(),
        None => b.set_issuer_name(&name).unwrap(),
    }

    b.set_pubkey(key).unwrap();
    b.set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    b.set_not_after(&Asn1Time::days_from_now(365).unwrap())
        .unwrap();

    let bc = if spec.ca {
        BasicConstraints::new().critical().ca().build().unwrap()
    } else {
        BasicConstraints::new().build().unwrap()
    };
    b.append_extension(bc).unwrap();

    for e in spec.extensions {
        let ext = match e {
            Ext::Der { oid, critical, der } => X509Extension::new_from_der(
                &Asn1Object::from_str(oid).unwrap(),
                critical,
                &Asn1OctetString::new_from_bytes(&der).unwrap(),
            )
            .unwrap(),
            Ext::Eku(oid) => ExtendedKeyUsage::new().other(oid).build().unwrap(),
            Ext::SanDns(dns) => SubjectAlternativeName::new()
                .dns(dns)
                .build(&b.x509v3_context(None, None))
                .unwrap(),
        };
        b.append_extension(ext).unwrap();
    }

    let signer = spec.issuer.map(|(_, k)| k).unwrap_or(key);
    b.sign(signer, MessageDigest::sha256()).unwrap();

    b.build()
}

pub fn self_signed(key: &PKey<Private>) -> X509 {
    cert(key, CertSpec::default())
}

/// Registration authenticator data for `key` with UP set
pub fn registration_auth_data(key: &CoseKey, aaguid: [u8; 16]) -> AuthenticatorData {
    let buf = AuthenticatorDataBuilder::new(RP_ID)
        .flag(Flag::UserPresent)
        .attested_credential(Aaguid(aaguid), &[0x11; 32], key)
        .build()
        .unwrap();

    AuthenticatorData::parse(&buf).unwrap()
}

pub fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

pub fn x5c(certs: &[&X509]) -> Value {
    Value::Array(
        certs
            .iter()
            .map(|c| Value::Bytes(c.to_der().unwrap()))
            .collect(),
    )
}
