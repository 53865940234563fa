// Copyright 2023-2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use super::trustanchor::TrustAnchor;
use super::ITrustAnchorStore;
use multimap::MultiMap;
use std::sync::RwLock;

/// The store where attestation roots are stashed.  Roots are indexed by the
/// attestation statement format they apply to.
#[derive(Debug, Default)]
pub struct MemoTrustAnchorStore {
    p: RwLock<MultiMap<String, TrustAnchor>>,
}

impl MemoTrustAnchorStore {
    /// Returns a new empty TrustAnchorStore
    pub fn new() -> Self {
        Self {
            p: Default::default(),
        }
    }

    /// Add to an existing (and possibly empty) TrustAnchorStore the trust
    /// anchors loaded from the given JSON file
    pub fn load_json(&mut self, j: &str) -> Result<(), Error> {
        let tas: Vec<TrustAnchor> =
            serde_json::from_str(j).map_err(|e| Error::Syntax(e.to_string()))?;

        for mut ta in tas.into_iter() {
            ta.parse_cert()?;
            self.add(ta)?;
        }

        Ok(())
    }

    /// Add a single trust anchor.  It must carry a parsed certificate.
    pub fn add(&mut self, ta: TrustAnchor) -> Result<(), Error> {
        if ta.cert.is_none() {
            return Err(Error::Sema(format!(
                "trust anchor for {} has no certificate",
                ta.format
            )));
        }

        self.p.write()?.insert(ta.format.clone(), ta);

        Ok(())
    }
}

impl ITrustAnchorStore for MemoTrustAnchorStore {
    fn lookup(&self, format: &str) -> Result<Vec<TrustAnchor>, Error> {
        Ok(self.p.read()?.get_vec(format).cloned().unwrap_or_default())
    }
}
