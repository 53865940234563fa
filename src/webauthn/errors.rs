// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

/// Coarse classification of verification failures.  Callers typically use
/// this to decide what to log and whether the failure is security relevant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Structural problems in the supplied bytes
    Format,
    /// Mismatch between the ceremony and the expected parameters; may signal a
    /// replay or a cross-site attempt
    Binding,
    /// Cryptographic or trust failure
    Trust,
    /// Ceremony policy violation
    Policy,
}

#[derive(thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("Malformed encoding: {0}")]
    MalformedEncoding(String),
    #[error("Malformed key: {0}")]
    MalformedKey(String),
    #[error("Truncated authenticator data: {0}")]
    TruncatedAuthenticatorData(String),
    #[error("Unsupported attestation format: {0}")]
    UnsupportedAttestationFormat(String),
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("Invalid flags: {0}")]
    InvalidFlags(String),
    #[error("Verification failed: {0}")]
    Verification(String),
    #[error("Challenge mismatch: {0}")]
    ChallengeMismatch(String),
    #[error("Origin mismatch: {0}")]
    OriginMismatch(String),
    #[error("RP ID mismatch: {0}")]
    RpIdMismatch(String),
    #[error("Ceremony type mismatch: {0}")]
    CeremonyTypeMismatch(String),
    #[error("Credential mismatch: {0}")]
    CredentialMismatch(String),
    #[error("Untrusted attestation: {0}")]
    UntrustedAttestation(String),
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
    #[error("Possible cloned authenticator: stored counter {stored}, received {received}")]
    PossibleClonedAuthenticator { stored: u32, received: u32 },
    #[error("Crypto failure: {0}")]
    Crypto(String),
    #[error("User presence required")]
    UserPresenceRequired,
    #[error("User verification required")]
    UserVerificationRequired,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MalformedEncoding(_)
            | Error::MalformedKey(_)
            | Error::TruncatedAuthenticatorData(_)
            | Error::UnsupportedAttestationFormat(_)
            | Error::UnsupportedAlgorithm(_)
            | Error::InvalidFlags(_)
            | Error::Verification(_) => ErrorKind::Format,
            Error::ChallengeMismatch(_)
            | Error::OriginMismatch(_)
            | Error::RpIdMismatch(_)
            | Error::CeremonyTypeMismatch(_)
            | Error::CredentialMismatch(_) => ErrorKind::Binding,
            Error::UntrustedAttestation(_)
            | Error::InvalidSignature(_)
            | Error::PossibleClonedAuthenticator { .. }
            | Error::Crypto(_) => ErrorKind::Trust,
            Error::UserPresenceRequired | Error::UserVerificationRequired => ErrorKind::Policy,
        }
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::MalformedEncoding(e)
            | Error::MalformedKey(e)
            | Error::TruncatedAuthenticatorData(e)
            | Error::UnsupportedAttestationFormat(e)
            | Error::UnsupportedAlgorithm(e)
            | Error::InvalidFlags(e)
            | Error::Verification(e)
            | Error::ChallengeMismatch(e)
            | Error::OriginMismatch(e)
            | Error::RpIdMismatch(e)
            | Error::CeremonyTypeMismatch(e)
            | Error::CredentialMismatch(e)
            | Error::UntrustedAttestation(e)
            | Error::InvalidSignature(e)
            | Error::Crypto(e) => {
                write!(f, "{}", e)
            }
            e => write!(f, "{}", e),
        }
    }
}

impl From<openssl::error::ErrorStack> for Error {
    fn from(e: openssl::error::ErrorStack) -> Self {
        Error::Crypto(e.to_string())
    }
}
