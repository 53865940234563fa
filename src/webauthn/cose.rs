// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! COSE_Key parsing (RFC 9052/9053) and signature verification for the
//! algorithms WebAuthn authenticators use.

use super::cbor;
use super::common::*;
use super::errors::Error;
use ciborium::Value;
use openssl::bn::{BigNum, BigNumContext};
use openssl::ec::{EcGroup, EcKey, PointConversionForm};
use openssl::hash::{hash, MessageDigest};
use openssl::nid::Nid;
use openssl::pkey::{HasPublic, Id, PKey, PKeyRef, Public};
use openssl::rsa::{Padding, Rsa};
use openssl::sign::{RsaPssSaltlen, Verifier};
use serde::{Deserialize, Serialize};

const COSE_KTY_LABEL: i128 = 1;
const COSE_ALG_LABEL: i128 = 3;
const COSE_CRV_LABEL: i128 = -1;
const COSE_X_LABEL: i128 = -2;
const COSE_Y_LABEL: i128 = -3;
const COSE_N_LABEL: i128 = -1;
const COSE_E_LABEL: i128 = -2;

const COSE_KTY_OKP: i128 = 1;
const COSE_KTY_EC2: i128 = 2;
const COSE_KTY_RSA: i128 = 3;

/// COSE algorithm identifiers accepted for credential and attestation keys
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoseAlgorithm {
    ES256,
    ES384,
    ES512,
    EdDSA,
    PS256,
    PS384,
    PS512,
    RS256,
    RS384,
    RS512,
    /// RSASSA-PKCS1-v1_5 with SHA-1, only seen in TPM attestations
    RS1,
}

impl CoseAlgorithm {
    /// The IANA COSE algorithm identifier
    pub fn id(self) -> i64 {
        match self {
            CoseAlgorithm::ES256 => -7,
            CoseAlgorithm::ES384 => -35,
            CoseAlgorithm::ES512 => -36,
            CoseAlgorithm::EdDSA => -8,
            CoseAlgorithm::PS256 => -37,
            CoseAlgorithm::PS384 => -38,
            CoseAlgorithm::PS512 => -39,
            CoseAlgorithm::RS256 => -257,
            CoseAlgorithm::RS384 => -258,
            CoseAlgorithm::RS512 => -259,
            CoseAlgorithm::RS1 => -65535,
        }
    }

    fn digest(self) -> Option<MessageDigest> {
        match self {
            CoseAlgorithm::ES256 | CoseAlgorithm::PS256 | CoseAlgorithm::RS256 => {
                Some(MessageDigest::sha256())
            }
            CoseAlgorithm::ES384 | CoseAlgorithm::PS384 | CoseAlgorithm::RS384 => {
                Some(MessageDigest::sha384())
            }
            CoseAlgorithm::ES512 | CoseAlgorithm::PS512 | CoseAlgorithm::RS512 => {
                Some(MessageDigest::sha512())
            }
            CoseAlgorithm::RS1 => Some(MessageDigest::sha1()),
            CoseAlgorithm::EdDSA => None,
        }
    }

    /// Hash `data` with the digest this algorithm signs with.  EdDSA has no
    /// separate digest and is rejected.
    pub fn hash(self, data: &[u8]) -> Result<Vec<u8>, Error> {
        let md = self.digest().ok_or_else(|| {
            Error::UnsupportedAlgorithm(format!("{self:?} has no associated hash"))
        })?;

        Ok(hash(md, data)?.to_vec())
    }

    fn key_type(self) -> i128 {
        match self {
            CoseAlgorithm::ES256 | CoseAlgorithm::ES384 | CoseAlgorithm::ES512 => COSE_KTY_EC2,
            CoseAlgorithm::EdDSA => COSE_KTY_OKP,
            _ => COSE_KTY_RSA,
        }
    }
}

impl TryFrom<i128> for CoseAlgorithm {
    type Error = Error;

    fn try_from(v: i128) -> Result<Self, Error> {
        let alg = match v {
            -7 => CoseAlgorithm::ES256,
            -35 => CoseAlgorithm::ES384,
            -36 => CoseAlgorithm::ES512,
            -8 => CoseAlgorithm::EdDSA,
            -37 => CoseAlgorithm::PS256,
            -38 => CoseAlgorithm::PS384,
            -39 => CoseAlgorithm::PS512,
            -257 => CoseAlgorithm::RS256,
            -258 => CoseAlgorithm::RS384,
            -259 => CoseAlgorithm::RS512,
            -65535 => CoseAlgorithm::RS1,
            x => return Err(Error::UnsupportedAlgorithm(format!("COSE algorithm {x}"))),
        };

        Ok(alg)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EcCurve {
    P256,
    P384,
    P521,
}

impl EcCurve {
    fn from_cose(crv: i128) -> Result<Self, Error> {
        match crv {
            1 => Ok(EcCurve::P256),
            2 => Ok(EcCurve::P384),
            3 => Ok(EcCurve::P521),
            c => Err(Error::MalformedKey(format!("unknown EC2 curve {c}"))),
        }
    }

    /// Width in bytes of an affine coordinate
    pub fn coordinate_len(self) -> usize {
        match self {
            EcCurve::P256 => 32,
            EcCurve::P384 => 48,
            EcCurve::P521 => 66,
        }
    }

    pub(crate) fn nid(self) -> Nid {
        match self {
            EcCurve::P256 => Nid::X9_62_PRIME256V1,
            EcCurve::P384 => Nid::SECP384R1,
            EcCurve::P521 => Nid::SECP521R1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OkpCurve {
    Ed25519,
}

/// Public key material extracted from a COSE_Key
#[serde_with::serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kty")]
pub enum PublicKey {
    Ec2 {
        curve: EcCurve,
        #[serde_as(as = "serde_with::hex::Hex")]
        x: Vec<u8>,
        #[serde_as(as = "serde_with::hex::Hex")]
        y: Vec<u8>,
    },
    Rsa {
        #[serde_as(as = "serde_with::hex::Hex")]
        n: Vec<u8>,
        #[serde_as(as = "serde_with::hex::Hex")]
        e: Vec<u8>,
    },
    Okp {
        curve: OkpCurve,
        #[serde_as(as = "serde_with::hex::Hex")]
        x: Vec<u8>,
    },
}

/// A parsed COSE_Key: the signing algorithm and the key it applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoseKey {
    pub alg: CoseAlgorithm,
    pub key: PublicKey,
}

/// Parse a decoded COSE_Key map
pub fn parse_key(v: &Value) -> Result<CoseKey, Error> {
    let m = v
        .as_map()
        .ok_or_else(|| Error::MalformedKey("COSE_Key MUST be map".to_string()))?;

    let kty = required_int(m, COSE_KTY_LABEL, "kty")?;
    let alg = CoseAlgorithm::try_from(required_int(m, COSE_ALG_LABEL, "alg")?)?;

    if alg.key_type() != kty {
        return Err(Error::MalformedKey(format!(
            "key type {kty} is not compatible with {alg:?}"
        )));
    }

    let key = match kty {
        COSE_KTY_EC2 => {
            let curve = EcCurve::from_cose(required_int(m, COSE_CRV_LABEL, "crv")?)?;
            let x = required_bstr(m, COSE_X_LABEL, "x")?;
            let y = required_bstr(m, COSE_Y_LABEL, "y")?;

            let want = curve.coordinate_len();
            if x.len() != want || y.len() != want {
                return Err(Error::MalformedKey(format!(
                    "{curve:?} coordinates must be {want} bytes, got {} and {}",
                    x.len(),
                    y.len()
                )));
            }

            PublicKey::Ec2 { curve, x, y }
        }
        COSE_KTY_RSA => {
            let n = required_bstr(m, COSE_N_LABEL, "n")?;
            let e = required_bstr(m, COSE_E_LABEL, "e")?;

            if n.is_empty() || e.is_empty() {
                return Err(Error::MalformedKey("empty RSA modulus or exponent".to_string()));
            }

            PublicKey::Rsa { n, e }
        }
        COSE_KTY_OKP => {
            let crv = required_int(m, COSE_CRV_LABEL, "crv")?;
            if crv != 6 {
                return Err(Error::MalformedKey(format!("unknown OKP curve {crv}")));
            }

            let x = required_bstr(m, COSE_X_LABEL, "x")?;
            if x.len() != 32 {
                return Err(Error::MalformedKey(format!(
                    "Ed25519 key must be 32 bytes, got {}",
                    x.len()
                )));
            }

            PublicKey::Okp {
                curve: OkpCurve::Ed25519,
                x,
            }
        }
        k => return Err(Error::MalformedKey(format!("unknown key type {k}"))),
    };

    Ok(CoseKey { alg, key })
}

/// Decode and parse the COSE_Key at the front of `buf`, returning the key and
/// the number of bytes it occupied
pub fn parse_key_bytes(buf: &[u8]) -> Result<(CoseKey, usize), Error> {
    let (v, consumed) = cbor::decode(buf).map_err(|e| match e {
        Error::MalformedEncoding(m) => Error::MalformedKey(m),
        e => e,
    })?;

    Ok((parse_key(&v)?, consumed))
}

fn required_int(m: &[(Value, Value)], label: i128, n: &str) -> Result<i128, Error> {
    let v = map_lookup_int(m, label)
        .ok_or_else(|| Error::MalformedKey(format!("missing {n}")))?;

    to_int(v, n).map_err(|_| Error::MalformedKey(format!("{n} MUST be integer")))
}

fn required_bstr(m: &[(Value, Value)], label: i128, n: &str) -> Result<Vec<u8>, Error> {
    let v = map_lookup_int(m, label)
        .ok_or_else(|| Error::MalformedKey(format!("missing {n}")))?;

    to_bstr(v, n).map_err(|_| Error::MalformedKey(format!("{n} MUST be bytes")))
}

impl CoseKey {
    /// Encode back to a COSE_Key map
    pub fn to_value(&self) -> Value {
        let int = |i: i64| Value::Integer(i.into());

        let mut m = vec![
            (int(COSE_KTY_LABEL as i64), int(self.alg.key_type() as i64)),
            (int(COSE_ALG_LABEL as i64), int(self.alg.id())),
        ];

        match &self.key {
            PublicKey::Ec2 { curve, x, y } => {
                let crv = match curve {
                    EcCurve::P256 => 1,
                    EcCurve::P384 => 2,
                    EcCurve::P521 => 3,
                };
                m.push((int(COSE_CRV_LABEL as i64), int(crv)));
                m.push((int(COSE_X_LABEL as i64), Value::Bytes(x.clone())));
                m.push((int(COSE_Y_LABEL as i64), Value::Bytes(y.clone())));
            }
            PublicKey::Rsa { n, e } => {
                m.push((int(COSE_N_LABEL as i64), Value::Bytes(n.clone())));
                m.push((int(COSE_E_LABEL as i64), Value::Bytes(e.clone())));
            }
            PublicKey::Okp { x, .. } => {
                m.push((int(COSE_CRV_LABEL as i64), int(6)));
                m.push((int(COSE_X_LABEL as i64), Value::Bytes(x.clone())));
            }
        }

        Value::Map(m)
    }

    /// CBOR encoding of [`CoseKey::to_value`]
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(&self.to_value(), &mut buf)
            .map_err(|e| Error::MalformedEncoding(format!("encoding COSE_Key: {e}")))?;
        Ok(buf)
    }

    /// Build a COSE key from an OpenSSL public key.  EC keys must be on one of
    /// the supported NIST curves; RSA and Ed25519 keys are taken as-is.
    pub fn from_pkey<T: HasPublic>(alg: CoseAlgorithm, pkey: &PKeyRef<T>) -> Result<Self, Error> {
        let key = match pkey.id() {
            Id::EC => {
                let ec = pkey.ec_key()?;
                let curve = match ec.group().curve_name() {
                    Some(Nid::X9_62_PRIME256V1) => EcCurve::P256,
                    Some(Nid::SECP384R1) => EcCurve::P384,
                    Some(Nid::SECP521R1) => EcCurve::P521,
                    c => return Err(Error::MalformedKey(format!("unsupported curve {c:?}"))),
                };
                let mut ctx = BigNumContext::new()?;
                let mut x = BigNum::new()?;
                let mut y = BigNum::new()?;
                ec.public_key()
                    .affine_coordinates(ec.group(), &mut x, &mut y, &mut ctx)?;

                let len = curve.coordinate_len() as i32;
                PublicKey::Ec2 {
                    curve,
                    x: x.to_vec_padded(len)?,
                    y: y.to_vec_padded(len)?,
                }
            }
            Id::RSA => {
                let rsa = pkey.rsa()?;
                PublicKey::Rsa {
                    n: rsa.n().to_vec(),
                    e: rsa.e().to_vec(),
                }
            }
            Id::ED25519 => PublicKey::Okp {
                curve: OkpCurve::Ed25519,
                x: pkey.raw_public_key()?,
            },
            id => return Err(Error::MalformedKey(format!("unsupported key type {id:?}"))),
        };

        let k = CoseKey { alg, key };
        if k.alg.key_type() != k.kty() {
            return Err(Error::MalformedKey(format!(
                "{alg:?} cannot be used with a {:?} key",
                pkey.id()
            )));
        }

        Ok(k)
    }

    fn kty(&self) -> i128 {
        match self.key {
            PublicKey::Ec2 { .. } => COSE_KTY_EC2,
            PublicKey::Rsa { .. } => COSE_KTY_RSA,
            PublicKey::Okp { .. } => COSE_KTY_OKP,
        }
    }

    /// Build an OpenSSL public key from the COSE key material
    pub fn to_pkey(&self) -> Result<PKey<Public>, Error> {
        let pkey = match &self.key {
            PublicKey::Ec2 { curve, x, y } => {
                let group = EcGroup::from_curve_name(curve.nid())?;
                let x = BigNum::from_slice(x)?;
                let y = BigNum::from_slice(y)?;
                let ec = EcKey::from_public_key_affine_coordinates(&group, &x, &y)
                    .map_err(|e| Error::MalformedKey(format!("EC point not on curve: {e}")))?;
                PKey::from_ec_key(ec)?
            }
            PublicKey::Rsa { n, e } => {
                let rsa =
                    Rsa::from_public_components(BigNum::from_slice(n)?, BigNum::from_slice(e)?)?;
                PKey::from_rsa(rsa)?
            }
            PublicKey::Okp { x, .. } => PKey::public_key_from_raw_bytes(x, Id::ED25519)
                .map_err(|e| Error::MalformedKey(format!("Ed25519 key: {e}")))?,
        };

        Ok(pkey)
    }

    /// Verify `sig` over `data` with this key and its algorithm
    pub fn verify_signature(&self, sig: &[u8], data: &[u8]) -> Result<(), Error> {
        let pkey = self.to_pkey()?;
        verify_signature(self.alg, &pkey, sig, data)
    }

    /// The ANSI X9.62 uncompressed point (`0x04 || x || y`) of a P-256 key, as
    /// used by FIDO U2F
    pub fn x962_raw(&self) -> Result<Vec<u8>, Error> {
        match &self.key {
            PublicKey::Ec2 {
                curve: EcCurve::P256,
                x,
                y,
            } => {
                let mut v = Vec::with_capacity(65);
                v.push(0x04);
                v.extend_from_slice(x);
                v.extend_from_slice(y);
                Ok(v)
            }
            k => Err(Error::Verification(format!(
                "expecting an EC2 P-256 key, got {k:?}"
            ))),
        }
    }

    /// Whether this key is the same public key as `other`, e.g. the subject key
    /// of an attestation certificate
    pub fn same_key_as(&self, other: &PKeyRef<Public>) -> Result<bool, Error> {
        Ok(self.to_pkey()?.public_eq(other))
    }
}

/// Verify `sig` over `data` using `pkey` and the COSE algorithm `alg`.
///
/// ECDSA signatures are expected in ASN.1 DER form, as WebAuthn mandates.
pub fn verify_signature(
    alg: CoseAlgorithm,
    pkey: &PKeyRef<Public>,
    sig: &[u8],
    data: &[u8],
) -> Result<(), Error> {
    let expected_id = match alg.key_type() {
        COSE_KTY_EC2 => Id::EC,
        COSE_KTY_OKP => Id::ED25519,
        _ => Id::RSA,
    };

    if pkey.id() != expected_id {
        return Err(Error::Verification(format!(
            "{alg:?} cannot be used with a {:?} key",
            pkey.id()
        )));
    }

    let verified = match alg.digest() {
        None => {
            let mut verifier = Verifier::new_without_digest(pkey)?;
            verifier.verify_oneshot(sig, data)
        }
        Some(md) => {
            let mut verifier = Verifier::new(md, pkey)?;

            if matches!(
                alg,
                CoseAlgorithm::PS256 | CoseAlgorithm::PS384 | CoseAlgorithm::PS512
            ) {
                verifier.set_rsa_padding(Padding::PKCS1_PSS)?;
                verifier.set_rsa_pss_saltlen(RsaPssSaltlen::DIGEST_LENGTH)?;
            }

            verifier.update(data)?;
            verifier.verify(sig)
        }
    };

    // a structurally broken signature (e.g. bad DER) surfaces as an OpenSSL
    // error rather than `false`
    match verified {
        Ok(true) => Ok(()),
        Ok(false) => Err(Error::InvalidSignature(format!(
            "{alg:?} signature does not verify"
        ))),
        Err(e) => Err(Error::InvalidSignature(format!(
            "{alg:?} signature is malformed: {e}"
        ))),
    }
}

/// Encode an EC public key as an uncompressed point
pub(crate) fn ec_point_bytes(pkey: &PKeyRef<Public>) -> Result<Vec<u8>, Error> {
    let ec = pkey.ec_key()?;
    let mut ctx = BigNumContext::new()?;

    Ok(ec
        .public_key()
        .to_bytes(ec.group(), PointConversionForm::UNCOMPRESSED, &mut ctx)?)
}
