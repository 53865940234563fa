// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! WebAuthn / FIDO2 attestation and assertion verification.
//!
//! This crate provides the verification core of a WebAuthn relying party.
//! For detailed information about the ceremonies and the data structures
//! involved, see the W3C "Web Authentication: An API for accessing Public Key
//! Credentials" [WebAuthn] specification.
//!
//! The API allows:
//! * Decoding attestation objects, authenticator data and COSE keys
//! * Verifying attestation statements in the `none`, `packed`, `tpm`,
//!   `android-key`, `android-safetynet`, `fido-u2f` and `apple` formats
//! * Chaining attestation certificates to user-supplied trust anchors,
//!   optionally consulting authenticator metadata
//! * Verifying assertions against a stored credential, including signature
//!   counter checks
//!
//! Challenge generation, credential storage and transport are left to the
//! caller.
//!
//! [WebAuthn]: https://www.w3.org/TR/webauthn-3/

pub mod store;
pub mod webauthn;
