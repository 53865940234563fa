// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use crate::webauthn::attestation::*;
use crate::webauthn::authdata::AuthenticatorData;
use crate::webauthn::base64;
use crate::webauthn::common::*;
use crate::webauthn::errors::Error;
use crate::webauthn::x509::{trust_path, AttestationCert};
use chrono::{DateTime, Duration, TimeZone, Utc};
use ciborium::Value;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use openssl::pkey::Id;
use serde::Deserialize;

const SAFETYNET_KEYS: [&str; 2] = ["ver", "response"];
const SAFETYNET_HOSTNAME: &str = "attest.android.com";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyNetPolicy {
    /// How old a response `timestampMs` may be
    pub max_age: Duration,
    /// How far into the future a `timestampMs` may be
    pub clock_skew: Duration,
    pub require_cts_profile_match: bool,
}

impl Default for SafetyNetPolicy {
    fn default() -> Self {
        SafetyNetPolicy {
            max_age: Duration::seconds(60),
            clock_skew: Duration::seconds(60),
            require_cts_profile_match: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SafetyNetClaims {
    nonce: String,
    timestamp_ms: i64,
    #[serde(default)]
    cts_profile_match: bool,
    #[serde(default)]
    basic_integrity: bool,
    apk_package_name: Option<String>,
}

/// The `android-safetynet` format, see §8.5 of WebAuthn L3
#[derive(Debug, Clone)]
pub struct AndroidSafetyNet {
    policy: SafetyNetPolicy,
    now: DateTime<Utc>,
}

impl AndroidSafetyNet {
    pub fn new(policy: SafetyNetPolicy) -> Self {
        AndroidSafetyNet {
            policy,
            now: Utc::now(),
        }
    }

    fn check_timestamp(&self, timestamp_ms: i64) -> Result<(), Error> {
        let ts = Utc
            .timestamp_millis_opt(timestamp_ms)
            .single()
            .ok_or_else(|| {
                Error::Verification(format!("timestampMs {timestamp_ms} out of range"))
            })?;

        if ts < self.now - self.policy.max_age {
            return Err(Error::Verification(format!(
                "SafetyNet response is too old ({ts})"
            )));
        }

        if ts > self.now + self.policy.clock_skew {
            return Err(Error::Verification(format!(
                "SafetyNet response is from the future ({ts})"
            )));
        }

        Ok(())
    }
}

impl Default for AndroidSafetyNet {
    fn default() -> Self {
        Self::new(SafetyNetPolicy::default())
    }
}

fn jws_error(e: jsonwebtoken::errors::Error) -> Error {
    match e.kind() {
        jsonwebtoken::errors::ErrorKind::InvalidSignature => {
            Error::InvalidSignature(format!("SafetyNet JWS: {e}"))
        }
        _ => Error::Verification(format!("SafetyNet JWS: {e}")),
    }
}

impl AttestationVerifier for AndroidSafetyNet {
    fn verify(
        &self,
        stmt: &Value,
        auth_data: &AuthenticatorData,
        client_data_hash: &[u8],
    ) -> Result<AttestationResult, Error> {
        let m = to_map(stmt, "android-safetynet statement")?;
        check_keys(m, &SAFETYNET_KEYS, "android-safetynet")?;

        let ver = to_tstr(required(m, "ver", "android-safetynet")?, "ver")?;
        if ver.is_empty() {
            return Err(Error::Verification("empty SafetyNet version".to_string()));
        }

        let response = to_bstr(required(m, "response", "android-safetynet")?, "response")?;
        let jws = std::str::from_utf8(&response)
            .map_err(|e| Error::Verification(format!("SafetyNet response: {e}")))?;

        let acd = attested(auth_data)?;

        let header = decode_header(jws).map_err(jws_error)?;

        let certs = header
            .x5c
            .as_deref()
            .filter(|x5c| !x5c.is_empty())
            .ok_or_else(|| Error::Verification("SafetyNet JWS header lacks x5c".to_string()))?
            .iter()
            .map(|c| AttestationCert::from_der(&base64::decode_std(c)?))
            .collect::<Result<Vec<_>, Error>>()?;

        let leaf = &certs[0];
        if !leaf.matches_hostname(SAFETYNET_HOSTNAME) {
            return Err(Error::Verification(format!(
                "SafetyNet certificate is not issued to {SAFETYNET_HOSTNAME}"
            )));
        }

        let pem = leaf.public_key()?.public_key_to_pem()?;
        let key = match (header.alg, leaf.public_key()?.id()) {
            (Algorithm::RS256, Id::RSA) => DecodingKey::from_rsa_pem(&pem),
            (Algorithm::ES256, Id::EC) => DecodingKey::from_ec_pem(&pem),
            (alg, _) => {
                return Err(Error::UnsupportedAlgorithm(format!(
                    "SafetyNet JWS alg {alg:?}"
                )))
            }
        }
        .map_err(jws_error)?;

        let mut validation = Validation::new(header.alg);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;

        let claims = decode::<SafetyNetClaims>(jws, &key, &validation)
            .map_err(jws_error)?
            .claims;

        let expected_nonce =
            base64::encode_std(&sha256(&signed_payload(&auth_data.raw, client_data_hash)));

        if claims.nonce != expected_nonce {
            return Err(Error::Verification(
                "SafetyNet nonce does not match authData and clientDataHash".to_string(),
            ));
        }

        if self.policy.require_cts_profile_match && !claims.cts_profile_match {
            return Err(Error::Verification(
                "SafetyNet ctsProfileMatch is false".to_string(),
            ));
        }

        self.check_timestamp(claims.timestamp_ms)?;

        log::debug!(
            "SafetyNet response for {:?} verified, basicIntegrity {}",
            claims.apk_package_name,
            claims.basic_integrity
        );

        Ok(AttestationResult {
            attestation_type: AttestationType::Basic,
            trust_path: trust_path(&certs)?,
            aaguid: acd.aaguid,
        })
    }
}
