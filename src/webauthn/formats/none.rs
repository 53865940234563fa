// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use crate::webauthn::attestation::*;
use crate::webauthn::authdata::AuthenticatorData;
use crate::webauthn::common::to_map;
use crate::webauthn::errors::Error;
use ciborium::Value;

/// The `none` format: the authenticator provides no attestation
#[derive(Debug, Default, Clone, Copy)]
pub struct NoneFormat;

impl AttestationVerifier for NoneFormat {
    fn verify(
        &self,
        stmt: &Value,
        auth_data: &AuthenticatorData,
        _client_data_hash: &[u8],
    ) -> Result<AttestationResult, Error> {
        let m = to_map(stmt, "none statement")?;

        if !m.is_empty() {
            return Err(Error::Verification(
                "unexpected statement for none format".to_string(),
            ));
        }

        let acd = attested(auth_data)?;

        Ok(AttestationResult {
            attestation_type: AttestationType::None,
            trust_path: vec![],
            aaguid: acd.aaguid,
        })
    }
}
