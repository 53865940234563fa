// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use super::trustanchor::TrustAnchor;

/// Interface to the store where attestation roots are stashed.  Stores are
/// read concurrently by any number of verifications.
pub trait ITrustAnchorStore: Send + Sync {
    /// Lookup the trust anchors configured for the given attestation statement
    /// format.  An empty vector means none are configured.
    fn lookup(&self, format: &str) -> Result<Vec<TrustAnchor>, Error>;
}
