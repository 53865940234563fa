// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Attestation certificates.  Signature verification and chain building go
//! through OpenSSL, extensions and subject attributes are read with
//! x509-parser.

use super::authdata::Aaguid;
use super::common::*;
use super::errors::Error;
use ciborium::Value;
use openssl::pkey::{PKey, Public};
use openssl::x509::X509;
use x509_parser::der_parser::ber::BerObjectContent;
use x509_parser::der_parser::der::parse_der;
use x509_parser::prelude::*;

/// id-fido-gen-ce-aaguid
pub const OID_FIDO_GEN_CE_AAGUID: &str = "1.3.6.1.4.1.45724.1.1.4";
/// tcg-kp-AIKCertificate
pub const OID_TCG_KP_AIK_CERTIFICATE: &str = "2.23.133.8.3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub oid: String,
    pub critical: bool,
    pub value: Vec<u8>,
}

/// The parts of an attestation certificate the format verifiers look at
#[derive(Debug, Clone)]
pub struct AttestationCert {
    pub x509: X509,
    /// 0-based, as encoded: v3 is 2
    pub version: u32,
    pub subject_empty: bool,
    pub country: Vec<String>,
    pub organization: Vec<String>,
    pub organizational_unit: Vec<String>,
    pub common_name: Vec<String>,
    /// `None` when the basicConstraints extension is absent
    pub ca: Option<bool>,
    pub has_san: bool,
    pub san_dns: Vec<String>,
    pub extended_key_usage: Vec<String>,
    pub extensions: Vec<Extension>,
}

fn attr_strings<'a, 'b: 'a>(
    it: impl Iterator<Item = &'a AttributeTypeAndValue<'b>>,
) -> Result<Vec<String>, Error> {
    it.map(|a| {
        a.as_str()
            .map(|s| s.to_string())
            .map_err(|e| Error::MalformedEncoding(format!("subject attribute: {e}")))
    })
    .collect()
}

impl AttestationCert {
    pub fn from_der(der: &[u8]) -> Result<Self, Error> {
        let x509 = X509::from_der(der)
            .map_err(|e| Error::MalformedEncoding(format!("certificate: {e}")))?;

        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| Error::MalformedEncoding(format!("certificate: {e}")))?;

        let subject = cert.subject();
        let subject_empty = subject.iter().next().is_none();

        let ca = cert
            .basic_constraints()
            .map_err(|e| Error::MalformedEncoding(format!("basicConstraints: {e}")))?
            .map(|bc| bc.value.ca);

        let (has_san, san_dns) = match cert
            .subject_alternative_name()
            .map_err(|e| Error::MalformedEncoding(format!("subjectAltName: {e}")))?
        {
            Some(san) => (
                true,
                san.value
                    .general_names
                    .iter()
                    .filter_map(|n| match n {
                        GeneralName::DNSName(d) => Some(d.to_string()),
                        _ => None,
                    })
                    .collect(),
            ),
            None => (false, vec![]),
        };

        let extended_key_usage = cert
            .extended_key_usage()
            .map_err(|e| Error::MalformedEncoding(format!("extKeyUsage: {e}")))?
            .map(|eku| {
                eku.value
                    .other
                    .iter()
                    .map(|oid| oid.to_id_string())
                    .collect()
            })
            .unwrap_or_default();

        let extensions = cert
            .extensions()
            .iter()
            .map(|ext| Extension {
                oid: ext.oid.to_id_string(),
                critical: ext.critical,
                value: ext.value.to_vec(),
            })
            .collect();

        Ok(AttestationCert {
            version: cert.version().0,
            subject_empty,
            country: attr_strings(subject.iter_country())?,
            organization: attr_strings(subject.iter_organization())?,
            organizational_unit: attr_strings(subject.iter_organizational_unit())?,
            common_name: attr_strings(subject.iter_common_name())?,
            ca,
            has_san,
            san_dns,
            extended_key_usage,
            extensions,
            x509,
        })
    }

    pub fn public_key(&self) -> Result<PKey<Public>, Error> {
        Ok(self.x509.public_key()?)
    }

    pub fn der(&self) -> Result<Vec<u8>, Error> {
        Ok(self.x509.to_der()?)
    }

    pub fn extension(&self, oid: &str) -> Option<&Extension> {
        self.extensions.iter().find(|e| e.oid == oid)
    }

    /// The id-fido-gen-ce-aaguid extension, if present.  It must not be marked
    /// critical.
    pub fn aaguid(&self) -> Result<Option<Aaguid>, Error> {
        let ext = match self.extension(OID_FIDO_GEN_CE_AAGUID) {
            Some(ext) => ext,
            None => return Ok(None),
        };

        if ext.critical {
            return Err(Error::Verification(
                "AAGUID extension must not be critical".to_string(),
            ));
        }

        let (_, obj) = parse_der(&ext.value)
            .map_err(|e| Error::Verification(format!("AAGUID extension: {e}")))?;

        match obj.content {
            BerObjectContent::OctetString(b) => Ok(Some(Aaguid::try_from(b)?)),
            _ => Err(Error::Verification(
                "AAGUID extension MUST be an OCTET STRING".to_string(),
            )),
        }
    }

    /// When the certificate carries an AAGUID it must match the one in the
    /// authenticator data
    pub fn check_aaguid(&self, expected: &Aaguid) -> Result<(), Error> {
        match self.aaguid()? {
            Some(a) if a != *expected => Err(Error::Verification(format!(
                "certificate AAGUID {a} does not match authenticator data AAGUID {expected}"
            ))),
            _ => Ok(()),
        }
    }

    /// Whether `hostname` is the subject CN or one of the DNS SANs
    pub fn matches_hostname(&self, hostname: &str) -> bool {
        self.common_name.iter().any(|cn| cn == hostname)
            || self.san_dns.iter().any(|d| d == hostname)
    }
}

/// Decode an `x5c` array: one or more DER certificates, leaf first
pub fn parse_x5c(v: &Value) -> Result<Vec<AttestationCert>, Error> {
    let a = to_array(v, "x5c")?;

    if a.is_empty() {
        return Err(Error::Verification("empty x5c".to_string()));
    }

    a.iter()
        .map(|c| AttestationCert::from_der(&to_bstr(c, "x5c entry")?))
        .collect()
}

/// The DER trust path handed to the trust evaluator
pub fn trust_path(certs: &[AttestationCert]) -> Result<Vec<Vec<u8>>, Error> {
    certs.iter().map(|c| c.der()).collect()
}
