// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Assertion verification, see §7.2 of WebAuthn L3.  The checks run as a
//! fixed sequence of states and the first failure ends the ceremony.

use super::authdata::AuthenticatorData;
use super::clientdata::{client_data_hash, CeremonyType, CollectedClientData};
use super::common::{ct_eq, signed_payload};
use super::credential::{AssertionResponse, Credential, VerifiedAssertion};
use super::errors::Error;
use super::params::CeremonyParams;
use super::verifier::Verifier;

/// What to do when the signature counter did not advance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CounterPolicy {
    /// Fail with `PossibleClonedAuthenticator`
    #[default]
    Reject,
    /// Accept, set `counter_warning` and keep the stored counter
    Flag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AssertionState {
    Start,
    ChallengeChecked,
    OriginChecked,
    RpIdChecked,
    FlagsChecked,
    CounterChecked,
    SignatureChecked,
    Done,
}

struct Ceremony<'c> {
    state: AssertionState,
    params: &'c CeremonyParams,
    credential: &'c Credential,
    client_data: CollectedClientData,
    client_data_json: &'c [u8],
    auth_data: AuthenticatorData,
    signature: &'c [u8],
    counter_policy: CounterPolicy,
    counter_warning: bool,
}

impl Ceremony<'_> {
    fn advance(&mut self) -> Result<AssertionState, Error> {
        let next = match self.state {
            AssertionState::Start => {
                self.client_data.check_challenge(&self.params.challenge)?;
                AssertionState::ChallengeChecked
            }
            AssertionState::ChallengeChecked => {
                self.client_data
                    .check_origin(&self.params.origin, self.params.allow_cross_origin)?;
                AssertionState::OriginChecked
            }
            AssertionState::OriginChecked => {
                if !ct_eq(&self.auth_data.rp_id_hash, &self.params.rp_id_hash()) {
                    return Err(Error::RpIdMismatch(format!(
                        "rpIdHash is not the hash of {}",
                        self.params.rp_id
                    )));
                }
                AssertionState::RpIdChecked
            }
            AssertionState::RpIdChecked => {
                if !self.auth_data.user_present() {
                    return Err(Error::UserPresenceRequired);
                }
                if self.params.user_verification_required() && !self.auth_data.user_verified() {
                    return Err(Error::UserVerificationRequired);
                }
                AssertionState::FlagsChecked
            }
            AssertionState::FlagsChecked => {
                self.check_counter()?;
                AssertionState::CounterChecked
            }
            AssertionState::CounterChecked => {
                let data = signed_payload(
                    &self.auth_data.raw,
                    &client_data_hash(self.client_data_json),
                );
                self.credential
                    .public_key
                    .verify_signature(self.signature, &data)?;
                AssertionState::SignatureChecked
            }
            AssertionState::SignatureChecked | AssertionState::Done => AssertionState::Done,
        };

        log::trace!("assertion {:?} -> {:?}", self.state, next);
        self.state = next;

        Ok(next)
    }

    // Both counters at zero is an authenticator that does not count
    fn check_counter(&mut self) -> Result<(), Error> {
        let stored = self.credential.counter;
        let received = self.auth_data.counter;

        if (stored == 0 && received == 0) || received > stored {
            return Ok(());
        }

        match self.counter_policy {
            CounterPolicy::Reject => {
                Err(Error::PossibleClonedAuthenticator { stored, received })
            }
            CounterPolicy::Flag => {
                log::warn!(
                    "signature counter did not advance (stored {stored}, received {received})"
                );
                self.counter_warning = true;
                Ok(())
            }
        }
    }

    fn run(mut self) -> Result<VerifiedAssertion, Error> {
        while self.advance()? != AssertionState::Done {}

        let new_counter = if self.counter_warning {
            self.credential.counter
        } else {
            self.auth_data.counter
        };

        Ok(VerifiedAssertion {
            credential_id: self.credential.id.clone(),
            new_counter,
            flags: self.auth_data.flags,
            user_verified: self.auth_data.user_verified(),
            backup_state: self.auth_data.backup_state(),
            counter_warning: self.counter_warning,
        })
    }
}

impl Verifier<'_> {
    /// Verify the response to navigator.credentials.get() against the stored
    /// credential.  On success the caller persists `new_counter`.
    pub fn verify_assertion(
        &self,
        response: &AssertionResponse,
        credential: &Credential,
        params: &CeremonyParams,
    ) -> Result<VerifiedAssertion, Error> {
        let client_data = CollectedClientData::parse(response.client_data_json.as_slice())?;
        client_data.check_type(CeremonyType::Get)?;

        if response.credential_id != credential.id {
            return Err(Error::CredentialMismatch(
                "response is for a different credential".to_string(),
            ));
        }

        let auth_data = AuthenticatorData::parse(response.authenticator_data.as_slice())?;

        Ceremony {
            state: AssertionState::Start,
            params,
            credential,
            client_data,
            client_data_json: response.client_data_json.as_slice(),
            auth_data,
            signature: response.signature.as_slice(),
            counter_policy: self.config().counter_policy,
            counter_warning: false,
        }
        .run()
    }
}
