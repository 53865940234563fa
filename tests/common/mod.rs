// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

#![allow(dead_code)]

use fido2_verifier::webauthn::{
    base64, Aaguid, AttestationObject, AuthenticatorDataBuilder, CoseAlgorithm, CoseKey, Flag,
};
use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::{hash, MessageDigest};
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::sign::Signer;
use openssl::x509::extension::BasicConstraints;
use openssl::x509::{X509Builder, X509NameBuilder, X509};

pub const RP_ID: &str = "example.com";
pub const ORIGIN: &str = "https://example.com";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn p256_key() -> PKey<Private> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
}

pub fn cose_key(key: &PKey<Private>) -> CoseKey {
    CoseKey::from_pkey(CoseAlgorithm::ES256, key).unwrap()
}

pub fn sha256(data: &[u8]) -> Vec<u8> {
    hash(MessageDigest::sha256(), data).unwrap().to_vec()
}

pub fn sign(key: &PKey<Private>, data: &[u8]) -> Vec<u8> {
    let mut s = Signer::new(MessageDigest::sha256(), key).unwrap();
    s.update(data).unwrap();
    s.sign_to_vec().unwrap()
}

/// authData || SHA-256(clientDataJSON)
pub fn signed_payload(auth_data: &[u8], client_data_json: &[u8]) -> Vec<u8> {
    let mut v = auth_data.to_vec();
    v.extend_from_slice(&sha256(client_data_json));
    v
}

pub fn client_data(type_: &str, challenge: &[u8]) -> Vec<u8> {
    format!(
        r#"{{"type":"{type_}","challenge":"{}","origin":"{ORIGIN}","crossOrigin":false}}"#,
        base64::encode(challenge)
    )
    .into_bytes()
}

/// A packed-conformant attestation certificate, self-signed unless an issuer
/// is given
pub fn attestation_cert(
    key: &PKey<Private>,
    ca: bool,
    issuer: Option<(&X509, &PKey<Private>)>,
) -> X509 {
    let mut b = X509Builder::new().unwrap();
    b.set_version(2).unwrap();

    let mut serial = BigNum::new().unwrap();
    serial.rand(64, MsbOption::MAYBE_ZERO, false).unwrap();
    b.set_serial_number(&serial.to_asn1_integer().unwrap())
        .unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("C", "SE").unwrap();
    name.append_entry_by_text("O", "Example Authenticators").unwrap();
    if ca {
        name.append_entry_by_text("CN", "Example Attestation Root")
            .unwrap();
    } else {
        name.append_entry_by_text("OU", "Authenticator Attestation")
            .unwrap();
        name.append_entry_by_text("CN", "Example Key").unwrap();
    }
    let name = name.build();

    b.set_subject_name(&name).unwrap();
    match issuer {
        Some((c, _)) => b.set_issuer_name(c.subject_name()).unwrap(),
        None => b.set_issuer_name(&name).unwrap(),
    }

    b.set_pubkey(key).unwrap();
    b.set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    b.set_not_after(&Asn1Time::days_from_now(30).unwrap())
        .unwrap();

    let bc = if ca {
        BasicConstraints::new().critical().ca().build().unwrap()
    } else {
        BasicConstraints::new().build().unwrap()
    };
    b.append_extension(bc).unwrap();

    let signer = issuer.map(|(_, k)| k).unwrap_or(key);
    b.sign(signer, MessageDigest::sha256()).unwrap();

    b.build()
}

pub struct Registration {
    pub credential_key: PKey<Private>,
    pub credential_id: Vec<u8>,
    pub attestation_object: Vec<u8>,
    pub client_data_json: Vec<u8>,
}

/// A packed registration whose statement is signed by `attestation`, or a
/// self attestation when `attestation` is `None`
pub fn packed_registration(
    challenge: &[u8],
    aaguid: [u8; 16],
    attestation: Option<(&PKey<Private>, &X509)>,
) -> Registration {
    let credential_key = p256_key();
    let credential_id = vec![0x5a; 32];

    let auth_data = AuthenticatorDataBuilder::new(RP_ID)
        .flag(Flag::UserPresent)
        .flag(Flag::UserVerified)
        .counter(1)
        .attested_credential(Aaguid(aaguid), &credential_id, &cose_key(&credential_key))
        .build()
        .unwrap();

    let client_data_json = client_data("webauthn.create", challenge);
    let payload = signed_payload(&auth_data, &client_data_json);

    let mut stmt = vec![(
        ciborium::Value::Text("alg".to_string()),
        ciborium::Value::Integer((-7).into()),
    )];

    match attestation {
        Some((key, leaf)) => {
            stmt.push((
                ciborium::Value::Text("sig".to_string()),
                ciborium::Value::Bytes(sign(key, &payload)),
            ));
            stmt.push((
                ciborium::Value::Text("x5c".to_string()),
                ciborium::Value::Array(vec![ciborium::Value::Bytes(leaf.to_der().unwrap())]),
            ));
        }
        None => stmt.push((
            ciborium::Value::Text("sig".to_string()),
            ciborium::Value::Bytes(sign(&credential_key, &payload)),
        )),
    }

    let attestation_object = AttestationObject {
        fmt: "packed".to_string(),
        att_stmt: ciborium::Value::Map(stmt),
        auth_data,
    }
    .encode()
    .unwrap();

    Registration {
        credential_key,
        credential_id,
        attestation_object,
        client_data_json,
    }
}

/// Authenticator data for an assertion with UP set
pub fn assertion_auth_data(counter: u32) -> Vec<u8> {
    AuthenticatorDataBuilder::new(RP_ID)
        .flag(Flag::UserPresent)
        .counter(counter)
        .build()
        .unwrap()
}
