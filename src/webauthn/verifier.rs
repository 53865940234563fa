// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::assertion::CounterPolicy;
use super::attestation::FormatPolicies;
use super::trust::{TrustEvaluator, TrustPolicy};
use crate::store::{IMetadataStore, ITrustAnchorStore};

/// Relying party policies that outlive a single ceremony
#[derive(Debug, Clone, Default)]
pub struct VerifierConfig {
    pub trust_policy: TrustPolicy,
    pub counter_policy: CounterPolicy,
    pub formats: FormatPolicies,
}

/// Entry point for registration and assertion verification.  A verifier only
/// reads its stores, so one instance can be shared across threads.
pub struct Verifier<'a> {
    tas: &'a dyn ITrustAnchorStore,
    mds: Option<&'a dyn IMetadataStore>,
    config: VerifierConfig,
}

impl<'a> Verifier<'a> {
    pub fn new(tas: &'a dyn ITrustAnchorStore) -> Self {
        Verifier {
            tas,
            mds: None,
            config: VerifierConfig::default(),
        }
    }

    /// Consult `mds` for authenticator status and per-model roots
    pub fn with_metadata(mut self, mds: &'a dyn IMetadataStore) -> Self {
        self.mds = Some(mds);
        self
    }

    pub fn with_config(mut self, config: VerifierConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    pub(crate) fn trust_evaluator(&self) -> TrustEvaluator<'a> {
        TrustEvaluator::new(self.tas, self.mds, self.config.trust_policy)
    }
}
