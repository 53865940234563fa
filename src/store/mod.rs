// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Trust configuration: attestation roots per statement format and
//! authenticator metadata per AAGUID.  Both are loaded from JSON once and
//! then only read, so a single store can back any number of concurrent
//! verifications.

pub use self::errors::Error;
pub use self::imetadatastore::IMetadataStore;
pub use self::itrustanchorstore::ITrustAnchorStore;
pub use self::memo_metadatastore::MemoMetadataStore;
pub use self::memo_trustanchorstore::MemoTrustAnchorStore;
pub use self::metadata::{AuthenticatorStatus, MetadataEntry};
pub use self::trustanchor::TrustAnchor;

mod errors;
mod imetadatastore;
mod itrustanchorstore;
mod memo_metadatastore;
mod memo_trustanchorstore;
mod metadata;
mod trustanchor;
