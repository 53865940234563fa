// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Authenticator data, see §6.1 of "Web Authentication: An API for accessing
//! Public Key Credentials Level 3"

use super::cbor;
use super::common::sha256;
use super::cose::{self, CoseKey};
use super::errors::Error;
use bitmask::*;
use ciborium::Value;
use serde::{Deserialize, Serialize};

const RP_ID_HASH_LEN: usize = 32;
const HEADER_LEN: usize = RP_ID_HASH_LEN + 1 + 4;
const AAGUID_LEN: usize = 16;

/// Upper bound on credential id length, see §5.8.3 of WebAuthn L3
pub const MAX_CREDENTIAL_ID_LEN: usize = 1023;

bitmask! {
    #[derive(Debug)]
    pub mask AuthenticatorFlags: u8 where flags Flag {
        UserPresent            = 0x01,
        UserVerified           = 0x04,
        BackupEligible         = 0x08,
        BackupState            = 0x10,
        AttestedCredentialData = 0x40,
        ExtensionData          = 0x80,
    }
}

const FLAG_BITS: [(Flag, u8); 6] = [
    (Flag::UserPresent, 0x01),
    (Flag::UserVerified, 0x04),
    (Flag::BackupEligible, 0x08),
    (Flag::BackupState, 0x10),
    (Flag::AttestedCredentialData, 0x40),
    (Flag::ExtensionData, 0x80),
];

impl AuthenticatorFlags {
    /// Interpret the flags byte.  Reserved bits are ignored.
    pub fn from_bits(b: u8) -> Self {
        let mut m = AuthenticatorFlags::none();

        for (f, bit) in FLAG_BITS.iter() {
            if b & bit != 0 {
                m.set(*f);
            }
        }

        m
    }

    pub fn bits(&self) -> u8 {
        FLAG_BITS
            .iter()
            .filter(|(f, _)| self.contains(*f))
            .fold(0, |acc, (_, bit)| acc | bit)
    }
}

/// Authenticator model identifier
#[serde_with::serde_as]
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Aaguid(#[serde_as(as = "serde_with::hex::Hex")] pub [u8; AAGUID_LEN]);

impl Aaguid {
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for Aaguid {
    type Error = Error;

    fn try_from(v: &[u8]) -> Result<Self, Error> {
        let a: [u8; AAGUID_LEN] = v.try_into().map_err(|_| {
            Error::MalformedEncoding(format!("AAGUID must be 16 bytes, got {}", v.len()))
        })?;

        Ok(Aaguid(a))
    }
}

impl std::fmt::Display for Aaguid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let h = hex::encode(self.0);
        write!(
            f,
            "{}-{}-{}-{}-{}",
            &h[0..8],
            &h[8..12],
            &h[12..16],
            &h[16..20],
            &h[20..32]
        )
    }
}

impl std::fmt::Debug for Aaguid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestedCredentialData {
    pub aaguid: Aaguid,
    pub credential_id: Vec<u8>,
    pub public_key: CoseKey,
    /// the COSE_Key exactly as it appeared in the authenticator data
    pub public_key_bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatorData {
    /// the bytes this was parsed from; attestation and assertion signatures
    /// cover exactly these
    pub raw: Vec<u8>,
    pub rp_id_hash: [u8; RP_ID_HASH_LEN],
    pub flags: u8,
    pub counter: u32,
    pub attested_credential: Option<AttestedCredentialData>,
    pub extensions: Option<Value>,
}

impl AuthenticatorData {
    /// Parse authenticator data as returned by an authenticator
    pub fn parse(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < HEADER_LEN {
            return Err(Error::TruncatedAuthenticatorData(format!(
                "got {} bytes, need at least {HEADER_LEN}",
                buf.len()
            )));
        }

        let mut rp_id_hash = [0u8; RP_ID_HASH_LEN];
        rp_id_hash.copy_from_slice(&buf[..RP_ID_HASH_LEN]);

        let flags = buf[RP_ID_HASH_LEN];
        let fs = AuthenticatorFlags::from_bits(flags);

        if fs.contains(Flag::BackupState) && !fs.contains(Flag::BackupEligible) {
            return Err(Error::InvalidFlags(
                "backup state set on a credential that is not backup eligible".to_string(),
            ));
        }

        let counter = u32::from_be_bytes([
            buf[RP_ID_HASH_LEN + 1],
            buf[RP_ID_HASH_LEN + 2],
            buf[RP_ID_HASH_LEN + 3],
            buf[RP_ID_HASH_LEN + 4],
        ]);

        let mut rest = &buf[HEADER_LEN..];

        let attested_credential = if fs.contains(Flag::AttestedCredentialData) {
            let (acd, consumed) = parse_attested_credential(rest)?;
            rest = &rest[consumed..];
            Some(acd)
        } else {
            None
        };

        let extensions = if fs.contains(Flag::ExtensionData) {
            if rest.is_empty() {
                return Err(Error::TruncatedAuthenticatorData(
                    "extension data flag set but no extensions present".to_string(),
                ));
            }

            let (v, consumed) = cbor::decode_embedded(rest)?;

            if !v.is_map() {
                return Err(Error::MalformedEncoding(
                    "extensions MUST be map".to_string(),
                ));
            }

            rest = &rest[consumed..];
            Some(v)
        } else {
            None
        };

        if !rest.is_empty() {
            return Err(Error::MalformedEncoding(format!(
                "{} unexpected trailing bytes in authenticator data",
                rest.len()
            )));
        }

        Ok(AuthenticatorData {
            raw: buf.to_vec(),
            rp_id_hash,
            flags,
            counter,
            attested_credential,
            extensions,
        })
    }

    pub fn flag_set(&self) -> AuthenticatorFlags {
        AuthenticatorFlags::from_bits(self.flags)
    }

    pub fn user_present(&self) -> bool {
        self.flag_set().contains(Flag::UserPresent)
    }

    pub fn user_verified(&self) -> bool {
        self.flag_set().contains(Flag::UserVerified)
    }

    pub fn backup_eligible(&self) -> bool {
        self.flag_set().contains(Flag::BackupEligible)
    }

    pub fn backup_state(&self) -> bool {
        self.flag_set().contains(Flag::BackupState)
    }

    /// The AAGUID of the attested credential, all-zero if there is none
    pub fn aaguid(&self) -> Aaguid {
        self.attested_credential
            .as_ref()
            .map(|a| a.aaguid)
            .unwrap_or_default()
    }
}

fn parse_attested_credential(buf: &[u8]) -> Result<(AttestedCredentialData, usize), Error> {
    let fixed = AAGUID_LEN + 2;

    if buf.len() < fixed {
        return Err(Error::TruncatedAuthenticatorData(format!(
            "attested credential data flag set but only {} bytes follow the header",
            buf.len()
        )));
    }

    let aaguid = Aaguid::try_from(&buf[..AAGUID_LEN])?;
    let l = u16::from_be_bytes([buf[AAGUID_LEN], buf[AAGUID_LEN + 1]]) as usize;

    if l > MAX_CREDENTIAL_ID_LEN {
        return Err(Error::MalformedEncoding(format!(
            "credential id length {l} exceeds {MAX_CREDENTIAL_ID_LEN}"
        )));
    }

    if buf.len() < fixed + l {
        return Err(Error::TruncatedAuthenticatorData(format!(
            "credential id claims {l} bytes, {} available",
            buf.len() - fixed
        )));
    }

    let credential_id = buf[fixed..fixed + l].to_vec();
    let key_buf = &buf[fixed + l..];

    if key_buf.is_empty() {
        return Err(Error::TruncatedAuthenticatorData(
            "missing credential public key".to_string(),
        ));
    }

    let (v, key_len) = cbor::decode_embedded(key_buf)?;
    let public_key = cose::parse_key(&v)?;

    Ok((
        AttestedCredentialData {
            aaguid,
            credential_id,
            public_key,
            public_key_bytes: key_buf[..key_len].to_vec(),
        },
        fixed + l + key_len,
    ))
}

/// Encodes authenticator data.  Useful to produce fixtures and to exercise
/// verifiers without an authenticator at hand.
#[derive(Debug)]
pub struct AuthenticatorDataBuilder {
    rp_id_hash: [u8; RP_ID_HASH_LEN],
    flags: AuthenticatorFlags,
    counter: u32,
    attested: Option<(Aaguid, Vec<u8>, CoseKey)>,
    extensions: Option<Value>,
}

impl AuthenticatorDataBuilder {
    pub fn new(rp_id: &str) -> Self {
        AuthenticatorDataBuilder {
            rp_id_hash: sha256(rp_id.as_bytes()),
            flags: AuthenticatorFlags::none(),
            counter: 0,
            attested: None,
            extensions: None,
        }
    }

    pub fn rp_id_hash(mut self, h: [u8; RP_ID_HASH_LEN]) -> Self {
        self.rp_id_hash = h;
        self
    }

    pub fn flag(mut self, f: Flag) -> Self {
        self.flags.set(f);
        self
    }

    pub fn counter(mut self, c: u32) -> Self {
        self.counter = c;
        self
    }

    /// Also sets the AT flag
    pub fn attested_credential(mut self, aaguid: Aaguid, id: &[u8], key: &CoseKey) -> Self {
        self.flags.set(Flag::AttestedCredentialData);
        self.attested = Some((aaguid, id.to_vec(), key.clone()));
        self
    }

    /// Also sets the ED flag
    pub fn extensions(mut self, ext: Value) -> Self {
        self.flags.set(Flag::ExtensionData);
        self.extensions = Some(ext);
        self
    }

    pub fn build(&self) -> Result<Vec<u8>, Error> {
        let mut buf = Vec::with_capacity(HEADER_LEN);

        buf.extend_from_slice(&self.rp_id_hash);
        buf.push(self.flags.bits());
        buf.extend_from_slice(&self.counter.to_be_bytes());

        if let Some((aaguid, id, key)) = &self.attested {
            let l = u16::try_from(id.len()).map_err(|_| {
                Error::MalformedEncoding(format!("credential id too long ({})", id.len()))
            })?;

            buf.extend_from_slice(aaguid.as_bytes());
            buf.extend_from_slice(&l.to_be_bytes());
            buf.extend_from_slice(id);
            buf.extend_from_slice(&key.to_bytes()?);
        }

        if let Some(ext) = &self.extensions {
            ciborium::ser::into_writer(ext, &mut buf)
                .map_err(|e| Error::MalformedEncoding(format!("encoding extensions: {e}")))?;
        }

        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webauthn::testutil;
    use hex_literal::hex;

    const AAGUID: [u8; 16] = hex!("2fc0579f811347eab116bb5a8db9202a");

    #[test]
    fn round_trip() {
        let (_, key) = testutil::p256_credential();
        let cred_id = hex!("0102030405060708");

        let buf = AuthenticatorDataBuilder::new("example.com")
            .flag(Flag::UserPresent)
            .flag(Flag::UserVerified)
            .counter(42)
            .attested_credential(Aaguid(AAGUID), &cred_id, &key)
            .build()
            .unwrap();

        let ad = AuthenticatorData::parse(&buf).unwrap();

        assert_eq!(ad.raw, buf);
        assert_eq!(ad.rp_id_hash, sha256(b"example.com"));
        assert_eq!(ad.flags, 0x45);
        assert!(ad.user_present());
        assert!(ad.user_verified());
        assert!(!ad.backup_eligible());
        assert_eq!(ad.counter, 42);
        assert!(ad.extensions.is_none());

        let acd = ad.attested_credential.unwrap();
        assert_eq!(acd.aaguid, Aaguid(AAGUID));
        assert_eq!(acd.credential_id, cred_id);
        assert_eq!(acd.public_key, key);
        assert_eq!(acd.public_key_bytes, key.to_bytes().unwrap());
    }

    #[test]
    fn extensions_follow_key() {
        let (_, key) = testutil::ed25519_credential();
        let ext = Value::Map(vec![(Value::Text("credProtect".to_string()), Value::Integer(2.into()))]);

        let buf = AuthenticatorDataBuilder::new("example.com")
            .flag(Flag::UserPresent)
            .attested_credential(Aaguid::default(), b"id", &key)
            .extensions(ext.clone())
            .build()
            .unwrap();

        let ad = AuthenticatorData::parse(&buf).unwrap();

        assert_eq!(ad.extensions, Some(ext));
        assert_eq!(ad.attested_credential.unwrap().public_key, key);
    }

    #[test]
    fn assertion_shape() {
        let buf = AuthenticatorDataBuilder::new("example.com")
            .flag(Flag::UserPresent)
            .counter(7)
            .build()
            .unwrap();

        assert_eq!(buf.len(), 37);

        let ad = AuthenticatorData::parse(&buf).unwrap();
        assert_eq!(ad.counter, 7);
        assert!(ad.attested_credential.is_none());
        assert!(ad.aaguid().is_zero());
    }

    #[test]
    fn truncated() {
        let (_, key) = testutil::p256_credential();
        let buf = AuthenticatorDataBuilder::new("example.com")
            .flag(Flag::UserPresent)
            .attested_credential(Aaguid(AAGUID), &[0xaa; 16], &key)
            .build()
            .unwrap();

        // header
        assert!(matches!(
            AuthenticatorData::parse(&buf[..36]),
            Err(Error::TruncatedAuthenticatorData(_))
        ));
        // inside the AAGUID
        assert!(matches!(
            AuthenticatorData::parse(&buf[..40]),
            Err(Error::TruncatedAuthenticatorData(_))
        ));
        // inside the credential id
        assert!(matches!(
            AuthenticatorData::parse(&buf[..60]),
            Err(Error::TruncatedAuthenticatorData(_))
        ));
        // right before the key
        assert!(matches!(
            AuthenticatorData::parse(&buf[..37 + 18 + 16]),
            Err(Error::TruncatedAuthenticatorData(_))
        ));
        // inside the key
        assert!(matches!(
            AuthenticatorData::parse(&buf[..37 + 18 + 16 + 10]),
            Err(Error::TruncatedAuthenticatorData(_))
        ));
        assert!(matches!(
            AuthenticatorData::parse(&buf[..buf.len() - 1]),
            Err(Error::TruncatedAuthenticatorData(_))
        ));

        // ED flag with nothing behind it
        let mut header = AuthenticatorDataBuilder::new("example.com")
            .flag(Flag::UserPresent)
            .build()
            .unwrap();
        header[32] |= 0x80;
        assert!(matches!(
            AuthenticatorData::parse(&header),
            Err(Error::TruncatedAuthenticatorData(_))
        ));

        // extensions cut short
        let with_ext = AuthenticatorDataBuilder::new("example.com")
            .flag(Flag::UserPresent)
            .extensions(Value::Map(vec![(
                Value::Text("credProtect".to_string()),
                Value::Integer(2.into()),
            )]))
            .build()
            .unwrap();
        assert!(AuthenticatorData::parse(&with_ext).is_ok());
        assert!(matches!(
            AuthenticatorData::parse(&with_ext[..with_ext.len() - 2]),
            Err(Error::TruncatedAuthenticatorData(_))
        ));
    }

    #[test]
    fn trailing_bytes() {
        let mut buf = AuthenticatorDataBuilder::new("example.com")
            .flag(Flag::UserPresent)
            .build()
            .unwrap();
        buf.push(0xa0);

        assert!(matches!(
            AuthenticatorData::parse(&buf),
            Err(Error::MalformedEncoding(_))
        ));
    }

    #[test]
    fn backup_state_requires_eligibility() {
        let buf = AuthenticatorDataBuilder::new("example.com")
            .flag(Flag::UserPresent)
            .flag(Flag::BackupState)
            .build()
            .unwrap();

        assert!(matches!(
            AuthenticatorData::parse(&buf),
            Err(Error::InvalidFlags(_))
        ));

        let buf = AuthenticatorDataBuilder::new("example.com")
            .flag(Flag::UserPresent)
            .flag(Flag::BackupEligible)
            .flag(Flag::BackupState)
            .build()
            .unwrap();

        let ad = AuthenticatorData::parse(&buf).unwrap();
        assert!(ad.backup_eligible() && ad.backup_state());
    }

    #[test]
    fn oversized_credential_id() {
        let mut buf = AuthenticatorDataBuilder::new("example.com")
            .flag(Flag::UserPresent)
            .flag(Flag::AttestedCredentialData)
            .build()
            .unwrap();
        buf.extend_from_slice(&AAGUID);
        buf.extend_from_slice(&1024u16.to_be_bytes());
        buf.extend_from_slice(&[0u8; 1024]);

        assert!(matches!(
            AuthenticatorData::parse(&buf),
            Err(Error::MalformedEncoding(_))
        ));
    }

    #[test]
    fn aaguid_display() {
        assert_eq!(
            Aaguid(AAGUID).to_string(),
            "2fc0579f-8113-47ea-b116-bb5a8db9202a"
        );
        assert_eq!(
            serde_json::to_string(&Aaguid(AAGUID)).unwrap(),
            "\"2fc0579f811347eab116bb5a8db9202a\""
        );
    }
}
