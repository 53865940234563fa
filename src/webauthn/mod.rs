// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! The webauthn module provides a [`Verifier`] for the two WebAuthn
//! ceremonies: registration, which checks an attestation object and yields a
//! [`Credential`], and authentication, which checks an assertion against a
//! stored [`Credential`].
//!
//! # Example
//!
//! The following example assumes that the attestation roots are available as
//! JSON and that the challenge was issued by the caller for this ceremony.
//!
//! ```
//! use fido2_verifier::store::MemoTrustAnchorStore;
//! use fido2_verifier::webauthn::{CeremonyParams, Credential, Error, Verifier};
//!
//! fn register(
//!     jta: &str,
//!     attestation_object: &[u8],
//!     client_data_json: &[u8],
//!     challenge: &[u8],
//! ) -> Result<Credential, Error> {
//!     let mut tas = MemoTrustAnchorStore::new();
//!     tas.load_json(jta).expect("loading trust anchors");
//!
//!     let params = CeremonyParams::new(challenge, "https://example.com", "example.com");
//!
//!     // decode the attestation object, check the client data binding, run
//!     // the statement format verifier and chain the attestation to a root
//!     Verifier::new(&tas).verify_registration(attestation_object, client_data_json, &params)
//! }
//! ```

pub use self::assertion::CounterPolicy;
pub use self::attestation::{
    AttestationFormat, AttestationObject, AttestationResult, AttestationType,
    AttestationVerifier, FormatPolicies,
};
pub use self::authdata::{
    Aaguid, AttestedCredentialData, AuthenticatorData, AuthenticatorDataBuilder,
    AuthenticatorFlags, Flag, MAX_CREDENTIAL_ID_LEN,
};
pub use self::clientdata::{client_data_hash, CeremonyType, CollectedClientData};
pub use self::cose::{
    parse_key, parse_key_bytes, CoseAlgorithm, CoseKey, EcCurve, OkpCurve, PublicKey,
};
pub use self::credential::{AssertionResponse, Credential, VerifiedAssertion};
pub use self::errors::{Error, ErrorKind};
pub use self::params::{CeremonyParams, UserVerification};
pub use self::trust::{TrustEvaluator, TrustPolicy, TrustResult};
pub use self::verifier::{Verifier, VerifierConfig};

pub mod base64;
pub mod cbor;
pub mod formats;
pub mod tpm;
pub mod x509;

mod assertion;
mod attestation;
mod authdata;
mod clientdata;
mod common;
mod cose;
mod credential;
mod errors;
mod params;
mod registration;
mod trust;
mod verifier;

#[cfg(test)]
pub(crate) mod testutil;
