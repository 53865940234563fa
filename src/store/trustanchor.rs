// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use openssl::x509::X509;
use serde::Deserialize;

/// A root certificate trusted for attestations of a given statement format
#[derive(Clone, Deserialize, Debug)]
pub struct TrustAnchor {
    /// The attestation statement format identifier (e.g., "packed", "tpm")
    pub format: String,

    /// The root certificate, serialised using the textual encoding described
    /// in §5.1 of RFC7468
    #[serde(rename(deserialize = "pem"))]
    raw_pem: String,

    /// Whether the root is operated by an Attestation CA.  Packed attestations
    /// chaining to such a root are classified as AttCA rather than Basic.
    #[serde(rename(deserialize = "attestation-ca"), default)]
    pub attestation_ca: bool,

    #[serde(skip)]
    pub cert: Option<X509>,
}

impl TrustAnchor {
    pub fn new(format: &str, cert: X509, attestation_ca: bool) -> Self {
        Self {
            format: format.to_string(),
            raw_pem: String::new(),
            attestation_ca,
            cert: Some(cert),
        }
    }

    pub fn parse_cert(&mut self) -> Result<(), Error> {
        let cert =
            X509::from_pem(self.raw_pem.as_bytes()).map_err(|e| Error::Syntax(e.to_string()))?;

        self.cert = Some(cert);

        Ok(())
    }
}
