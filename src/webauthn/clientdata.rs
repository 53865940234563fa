// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::base64::Bytes;
use super::common::{ct_eq, sha256};
use super::errors::Error;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CeremonyType {
    Create,
    Get,
}

impl CeremonyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CeremonyType::Create => "webauthn.create",
            CeremonyType::Get => "webauthn.get",
        }
    }
}

/// CollectedClientData, see §5.8.1 of WebAuthn L3.  Members this crate does
/// not act upon (e.g., tokenBinding) are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CollectedClientData {
    #[serde(rename = "type")]
    pub type_: String,
    pub challenge: Bytes,
    pub origin: String,
    #[serde(rename = "crossOrigin", default)]
    pub cross_origin: Option<bool>,
    #[serde(rename = "topOrigin", default)]
    pub top_origin: Option<String>,
}

impl CollectedClientData {
    /// Parse the client data JSON exactly as the browser serialised it
    pub fn parse(raw: &[u8]) -> Result<Self, Error> {
        serde_json::from_slice(raw)
            .map_err(|e| Error::MalformedEncoding(format!("client data: {e}")))
    }

    pub fn check_type(&self, expected: CeremonyType) -> Result<(), Error> {
        if self.type_ != expected.as_str() {
            return Err(Error::CeremonyTypeMismatch(format!(
                "got {}, expecting {}",
                self.type_,
                expected.as_str()
            )));
        }

        Ok(())
    }

    pub fn check_challenge(&self, expected: &[u8]) -> Result<(), Error> {
        if !ct_eq(self.challenge.as_slice(), expected) {
            return Err(Error::ChallengeMismatch(
                "client data challenge does not match the expected challenge".to_string(),
            ));
        }

        Ok(())
    }

    /// Origins are compared as exact strings.  A cross-origin ceremony is only
    /// accepted when the relying party opted in.
    pub fn check_origin(&self, expected: &str, allow_cross_origin: bool) -> Result<(), Error> {
        if self.origin != expected {
            return Err(Error::OriginMismatch(format!(
                "got {}, expecting {expected}",
                self.origin
            )));
        }

        if self.cross_origin == Some(true) && !allow_cross_origin {
            return Err(Error::OriginMismatch(format!(
                "cross-origin ceremony (top origin {}) not allowed",
                self.top_origin.as_deref().unwrap_or("unknown")
            )));
        }

        Ok(())
    }
}

/// SHA-256 of the raw client data JSON.  The bytes are hashed as received,
/// never re-serialised.
pub fn client_data_hash(raw: &[u8]) -> [u8; 32] {
    sha256(raw)
}
