// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::attestation::{attested, AttestationFormat, AttestationObject, AttestationType};
use super::authdata::AuthenticatorData;
use super::base64::Bytes;
use super::clientdata::{client_data_hash, CeremonyType, CollectedClientData};
use super::common::ct_eq;
use super::credential::Credential;
use super::errors::Error;
use super::params::CeremonyParams;
use super::trust::TrustResult;
use super::verifier::Verifier;

impl Verifier<'_> {
    /// Verify the response to navigator.credentials.create(), see §7.1 of
    /// WebAuthn L3.  `attestation_object` and `client_data_json` are the raw
    /// bytes the client returned.
    pub fn verify_registration(
        &self,
        attestation_object: &[u8],
        client_data_json: &[u8],
        params: &CeremonyParams,
    ) -> Result<Credential, Error> {
        let cd = CollectedClientData::parse(client_data_json)?;
        cd.check_type(CeremonyType::Create)?;
        cd.check_challenge(&params.challenge)?;
        cd.check_origin(&params.origin, params.allow_cross_origin)?;

        let cdh = client_data_hash(client_data_json);

        let ao = AttestationObject::decode(attestation_object)?;
        let ad = AuthenticatorData::parse(&ao.auth_data)?;

        if !ct_eq(&ad.rp_id_hash, &params.rp_id_hash()) {
            return Err(Error::RpIdMismatch(format!(
                "rpIdHash is not the hash of {}",
                params.rp_id
            )));
        }

        if !ad.user_present() {
            return Err(Error::UserPresenceRequired);
        }

        if params.user_verification_required() && !ad.user_verified() {
            return Err(Error::UserVerificationRequired);
        }

        let acd = attested(&ad)?;

        if !params.algorithm_allowed(acd.public_key.alg) {
            return Err(Error::UnsupportedAlgorithm(format!(
                "credential algorithm {:?} not allowed",
                acd.public_key.alg
            )));
        }

        let format = ao.format()?;
        let result = format.verify(&ao.att_stmt, &ad, &cdh, &self.config().formats)?;

        log::debug!(
            "{format} statement verified as {} for {}",
            result.attestation_type.as_str(),
            result.aaguid
        );

        let trust = self.trust_evaluator().evaluate(
            &result.trust_path,
            result.attestation_type,
            format,
            &result.aaguid,
        )?;

        let (attestation_type, attestation_trusted) = match trust {
            TrustResult::Trusted { attestation_ca } => {
                let t = if attestation_ca
                    && format == AttestationFormat::Packed
                    && result.attestation_type == AttestationType::Basic
                {
                    AttestationType::AttCa
                } else {
                    result.attestation_type
                };
                (t, true)
            }
            TrustResult::NotApplicable | TrustResult::Unverified { .. } => {
                (result.attestation_type, false)
            }
        };

        Ok(Credential {
            id: Bytes::from(acd.credential_id.clone()),
            public_key: acd.public_key.clone(),
            counter: ad.counter,
            attestation_type,
            attestation_format: format,
            aaguid: result.aaguid,
            created_at: chrono::Utc::now(),
            user_verified: ad.user_verified(),
            backup_eligible: ad.backup_eligible(),
            backup_state: ad.backup_state(),
            transports: vec![],
            attestation_trusted,
        })
    }
}
