// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Attestation trust-path evaluation: chain the certificates carried by an
//! attestation statement to a configured root.

use super::attestation::{AttestationFormat, AttestationType};
use super::authdata::Aaguid;
use super::errors::Error;
use crate::store::{IMetadataStore, ITrustAnchorStore};
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::{X509StoreContext, X509};

/// What to do with an attestation that cannot be chained to a root
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrustPolicy {
    /// Fail the registration with `UntrustedAttestation`
    #[default]
    Strict,
    /// Accept the credential but report the attestation as unverified
    Permissive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustResult {
    /// Nothing to chain: `none` and self attestation, or an empty trust path
    NotApplicable,
    /// The trust path chains to a configured root
    Trusted {
        /// the matched root is marked as an Attestation CA
        attestation_ca: bool,
    },
    /// Accepted under [`TrustPolicy::Permissive`] without a valid chain
    Unverified { reason: String },
}

pub struct TrustEvaluator<'a> {
    tas: &'a dyn ITrustAnchorStore,
    mds: Option<&'a dyn IMetadataStore>,
    policy: TrustPolicy,
}

impl<'a> TrustEvaluator<'a> {
    pub fn new(
        tas: &'a dyn ITrustAnchorStore,
        mds: Option<&'a dyn IMetadataStore>,
        policy: TrustPolicy,
    ) -> Self {
        TrustEvaluator { tas, mds, policy }
    }

    /// Evaluate a trust path (DER certificates, leaf first) produced by the
    /// `format` verifier
    pub fn evaluate(
        &self,
        chain: &[Vec<u8>],
        attestation_type: AttestationType,
        format: AttestationFormat,
        aaguid: &Aaguid,
    ) -> Result<TrustResult, Error> {
        if matches!(
            attestation_type,
            AttestationType::None | AttestationType::SelfAttestation
        ) || chain.is_empty()
        {
            return Ok(TrustResult::NotApplicable);
        }

        let mut roots = self.metadata_roots(aaguid)?;

        if roots.is_empty() {
            roots = self
                .tas
                .lookup(format.as_str())
                .map_err(|e| Error::UntrustedAttestation(format!("trust anchor store: {e}")))?
                .into_iter()
                .filter_map(|ta| ta.cert.map(|c| (c, ta.attestation_ca)))
                .collect();
        }

        if roots.is_empty() {
            return self.reject(format!("no trust anchor configured for {format}"));
        }

        let leaf = X509::from_der(&chain[0])?;
        let mut intermediates = Stack::new()?;
        for der in &chain[1..] {
            intermediates.push(X509::from_der(der)?)?;
        }

        let mut sb = X509StoreBuilder::new()?;
        for (root, _) in &roots {
            sb.add_cert(root.clone())?;
        }
        let store = sb.build();

        let mut ctx = X509StoreContext::new()?;
        let outcome = ctx.init(&store, &leaf, &intermediates, |c| {
            if !c.verify_cert()? {
                return Ok(Err(c.error().error_string().to_string()));
            }

            let root_der = match c.chain().and_then(|ch| ch.iter().last()) {
                Some(r) => Some(r.to_der()?),
                None => None,
            };

            Ok(Ok(root_der))
        })?;

        match outcome {
            Err(reason) => self.reject(format!("{format} trust path: {reason}")),
            Ok(root_der) => {
                let mut attestation_ca = false;

                if let Some(der) = root_der {
                    for (root, ca) in &roots {
                        if root.to_der()? == der {
                            attestation_ca = *ca;
                            break;
                        }
                    }
                }

                log::debug!(
                    "{format} trust path of {} chains to a configured root",
                    chain.len()
                );

                Ok(TrustResult::Trusted { attestation_ca })
            }
        }
    }

    // Roots from the metadata entry of the authenticator model, if any.  A
    // revoked or compromised model is never trusted.
    fn metadata_roots(&self, aaguid: &Aaguid) -> Result<Vec<(X509, bool)>, Error> {
        let mds = match self.mds {
            Some(mds) => mds,
            None => return Ok(vec![]),
        };

        let entry = match mds.lookup(aaguid) {
            Ok(Some(e)) => e,
            Ok(None) => return Ok(vec![]),
            Err(e) => {
                log::warn!("metadata lookup for {aaguid} failed: {e:?}");
                return Err(Error::UntrustedAttestation(format!(
                    "metadata unavailable for {aaguid}: {e}"
                )));
            }
        };

        if entry.status.is_compromised() {
            return Err(Error::UntrustedAttestation(format!(
                "authenticator {aaguid} has status {:?}",
                entry.status
            )));
        }

        Ok(entry.roots.into_iter().map(|r| (r, false)).collect())
    }

    fn reject(&self, reason: String) -> Result<TrustResult, Error> {
        match self.policy {
            TrustPolicy::Strict => Err(Error::UntrustedAttestation(reason)),
            TrustPolicy::Permissive => {
                log::warn!("accepting unverified attestation: {reason}");
                Ok(TrustResult::Unverified { reason })
            }
        }
    }
}
