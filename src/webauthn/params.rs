// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::common::sha256;
use super::cose::CoseAlgorithm;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserVerification {
    Required,
    #[default]
    Preferred,
    Discouraged,
}

/// What the relying party expects from a ceremony.  The challenge, origin and
/// RP ID are owned by the caller; nothing here is read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CeremonyParams {
    pub challenge: Vec<u8>,
    /// scheme, host and (if not the default) port, e.g. "https://example.com"
    pub origin: String,
    pub rp_id: String,
    pub user_verification: UserVerification,
    pub allow_cross_origin: bool,
    /// credential algorithms accepted at registration; empty means any
    /// supported algorithm
    pub allowed_algorithms: Vec<CoseAlgorithm>,
}

impl CeremonyParams {
    pub fn new(challenge: &[u8], origin: &str, rp_id: &str) -> Self {
        CeremonyParams {
            challenge: challenge.to_vec(),
            origin: origin.to_string(),
            rp_id: rp_id.to_string(),
            user_verification: UserVerification::default(),
            allow_cross_origin: false,
            allowed_algorithms: vec![],
        }
    }

    pub fn require_user_verification(mut self) -> Self {
        self.user_verification = UserVerification::Required;
        self
    }

    pub fn with_cross_origin(mut self) -> Self {
        self.allow_cross_origin = true;
        self
    }

    pub fn with_algorithms(mut self, algs: &[CoseAlgorithm]) -> Self {
        self.allowed_algorithms = algs.to_vec();
        self
    }

    pub fn user_verification_required(&self) -> bool {
        self.user_verification == UserVerification::Required
    }

    pub fn rp_id_hash(&self) -> [u8; 32] {
        sha256(self.rp_id.as_bytes())
    }

    pub fn algorithm_allowed(&self, alg: CoseAlgorithm) -> bool {
        self.allowed_algorithms.is_empty() || self.allowed_algorithms.contains(&alg)
    }
}
