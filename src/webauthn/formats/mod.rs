// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Attestation statement format verifiers, see §8 of WebAuthn L3

pub use self::androidkey::{AndroidKey, AndroidKeyPolicy};
pub use self::apple::Apple;
pub use self::fidou2f::FidoU2f;
pub use self::none::NoneFormat;
pub use self::packed::Packed;
pub use self::safetynet::{AndroidSafetyNet, SafetyNetPolicy};
pub use self::tpm::Tpm;

mod androidkey;
mod apple;
mod fidou2f;
mod none;
mod packed;
mod safetynet;
mod tpm;
