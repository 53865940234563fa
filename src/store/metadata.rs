// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use crate::webauthn::Aaguid;
use openssl::x509::X509;
use serde::{Deserialize, Serialize};

/// Certification and security status of an authenticator model, modelled
/// after the AuthenticatorStatus values of the FIDO Metadata Service
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthenticatorStatus {
    NotFidoCertified,
    FidoCertified,
    FidoCertifiedL1,
    FidoCertifiedL2,
    FidoCertifiedL3,
    SelfAssertionSubmitted,
    UpdateAvailable,
    UserVerificationBypass,
    AttestationKeyCompromise,
    UserKeyRemoteCompromise,
    UserKeyPhysicalCompromise,
    Revoked,
}

impl AuthenticatorStatus {
    /// Statuses under which no attestation from the model can be trusted
    pub fn is_compromised(&self) -> bool {
        matches!(
            self,
            AuthenticatorStatus::UserVerificationBypass
                | AuthenticatorStatus::AttestationKeyCompromise
                | AuthenticatorStatus::UserKeyRemoteCompromise
                | AuthenticatorStatus::UserKeyPhysicalCompromise
                | AuthenticatorStatus::Revoked
        )
    }
}

/// What is known about an authenticator model
#[derive(Clone, Deserialize, Debug)]
pub struct MetadataEntry {
    pub aaguid: Aaguid,

    #[serde(default)]
    pub description: String,

    pub status: AuthenticatorStatus,

    /// Attestation roots for the model, PEM encoded
    #[serde(rename(deserialize = "roots"), default)]
    raw_roots: Vec<String>,

    #[serde(skip)]
    pub roots: Vec<X509>,
}

impl MetadataEntry {
    pub fn new(aaguid: Aaguid, status: AuthenticatorStatus, roots: Vec<X509>) -> Self {
        Self {
            aaguid,
            description: String::new(),
            status,
            raw_roots: vec![],
            roots,
        }
    }

    pub fn parse_roots(&mut self) -> Result<(), Error> {
        self.roots = self
            .raw_roots
            .iter()
            .map(|pem| X509::from_pem(pem.as_bytes()).map_err(|e| Error::Syntax(e.to_string())))
            .collect::<Result<Vec<X509>, Error>>()?;

        Ok(())
    }
}
