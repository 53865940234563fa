// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use super::metadata::MetadataEntry;
use crate::webauthn::Aaguid;

/// Interface to a source of authenticator metadata.  Implementations backed by
/// a remote service are expected to bound their own calls and report a
/// timeout as an error.
pub trait IMetadataStore: Send + Sync {
    /// Lookup the metadata for an authenticator model
    fn lookup(&self, aaguid: &Aaguid) -> Result<Option<MetadataEntry>, Error>;
}
