// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use super::metadata::MetadataEntry;
use super::IMetadataStore;
use crate::webauthn::Aaguid;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory authenticator metadata, indexed by AAGUID
#[derive(Debug, Default)]
pub struct MemoMetadataStore {
    p: RwLock<HashMap<Aaguid, MetadataEntry>>,
}

impl MemoMetadataStore {
    pub fn new() -> Self {
        Self {
            p: Default::default(),
        }
    }

    /// Add to an existing (and possibly empty) MetadataStore the entries
    /// loaded from the given JSON file.  A later entry replaces an earlier one
    /// with the same AAGUID.
    pub fn load_json(&mut self, j: &str) -> Result<(), Error> {
        let entries: Vec<MetadataEntry> =
            serde_json::from_str(j).map_err(|e| Error::Syntax(e.to_string()))?;

        for mut e in entries.into_iter() {
            e.parse_roots()?;
            self.add(e)?;
        }

        Ok(())
    }

    pub fn add(&mut self, e: MetadataEntry) -> Result<(), Error> {
        self.p.write()?.insert(e.aaguid, e);

        Ok(())
    }
}

impl IMetadataStore for MemoMetadataStore {
    fn lookup(&self, aaguid: &Aaguid) -> Result<Option<MetadataEntry>, Error> {
        Ok(self.p.read()?.get(aaguid).cloned())
    }
}
